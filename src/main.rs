//! devmon - Device state tracking for modem sessions
//!
//! This is the binary entry point. All logic lives in the library crates.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use devmon::replay;
use devmon_app::config::{load_settings, load_settings_strict, Variant, DEFAULT_CONFIG_PATH};
use devmon_core::logging::{self, LogTarget};

/// devmon - Device state tracking for modem sessions
#[derive(Parser, Debug)]
#[command(name = "devmon")]
#[command(about = "Device state tracking for modem sessions", long_about = None)]
struct Args {
    /// Write logs to a daily-rotated file in this directory instead of stderr
    #[arg(long, value_name = "DIR", global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a settings file and print the effective settings
    CheckConfig {
        #[arg(value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
        path: PathBuf,
    },

    /// Replay a scenario and print one JSON line per step
    Replay {
        #[arg(value_name = "SCENARIO")]
        scenario: PathBuf,

        /// Use this settings file instead of the scenario's `[settings]`
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Variants to track, overriding the settings (e.g. `ds,if`)
        #[arg(long, value_name = "VARIANT", value_delimiter = ',')]
        track: Option<Vec<Variant>>,

        /// Pretty-print each step report
        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let target = match args.log_dir {
        Some(dir) => LogTarget::File(dir),
        None => LogTarget::Stderr,
    };
    logging::init(target)?;

    match args.command {
        Command::CheckConfig { path } => match load_settings_strict(&path) {
            Ok(settings) => print!("{}", toml::to_string_pretty(&settings)?),
            Err(e) if e.is_fatal() => {
                eprintln!("{}: {}", path.display(), e);
                std::process::exit(2);
            }
            Err(e) => return Err(e).wrap_err_with(|| format!("checking {}", path.display())),
        },
        Command::Replay {
            scenario,
            config,
            track,
            pretty,
        } => {
            let mut scenario = replay::load_scenario(&scenario)
                .wrap_err_with(|| format!("loading {}", scenario.display()))?;
            if let Some(path) = config {
                scenario.settings = load_settings(&path);
            }
            if let Some(variants) = track {
                scenario.settings.devmon.tracking = variants;
            }
            for report in replay::run(&scenario)? {
                let line = if pretty {
                    serde_json::to_string_pretty(&report)?
                } else {
                    serde_json::to_string(&report)?
                };
                println!("{}", line);
            }
        }
    }

    Ok(())
}
