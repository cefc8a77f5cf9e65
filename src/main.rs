//! `copylibstocontainer`: copy Conan-built shared libraries linked into any of
//! the given binaries to an output directory.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, LevelFilter};

use copylibs::{detect_resolver, ensure_output_dir, run, Config, DEFAULT_MARKER};

#[derive(Parser, Debug)]
#[command(
    name = "copylibstocontainer",
    version,
    about = "Copy conan built shared libraries which are linked into any of the provided binaries to the provided directory"
)]
struct Cli {
    /// Output directory to copy libraries to (created if missing)
    #[arg(short, long, value_name = "DIR")]
    out: PathBuf,

    /// Special path to copy from
    #[arg(short, long, value_name = "SUBSTRING", default_value = DEFAULT_MARKER)]
    dir: String,

    /// Python interpreter with auditwheel installed
    #[arg(long, value_name = "PATH", env = "COPYLIBS_PYTHON", default_value = "python3")]
    python: String,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Binary (or binaries) to be checked for Conan shared library dependencies
    #[arg(required = true, value_name = "BINARY")]
    binary: Vec<PathBuf>,
}

impl Cli {
    /// Create the output directory before any work starts.
    fn prepare_output(&self) -> Result<()> {
        ensure_output_dir(&self.out).context("Invalid --out directory")?;
        Ok(())
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_target(false)
        .init();
}

fn try_main(cli: Cli) -> Result<()> {
    cli.prepare_output()?;
    let resolver = detect_resolver(&cli.python).context("Failed to select auditwheel adapter")?;

    let config = Config {
        binaries: cli.binary,
        marker: cli.dir,
        dest: cli.out,
    };
    run(&config, &resolver)
        .with_context(|| format!("Failed to copy libraries to {}", config.dest.display()))?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = try_main(cli) {
        error!("{:#}", e);
        process::exit(1);
    }
}
