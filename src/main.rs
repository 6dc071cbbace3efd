use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;

use covgate::cli::{self, PresubmitArgs, Style};
use covgate::config::{GateConfig, DEFAULT_THRESHOLD_PERCENT};

/// covgate: gate pull requests on coverage regressions against a baseline.
#[derive(Parser)]
#[command(name = "covgate", version, about)]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare this pull request's profile with the postsubmit baseline,
    /// publish the report, and fail when coverage is too low.
    Presubmit(PresubmitArgs),

    /// Show per-file coverage of a single profile.
    Summary {
        /// Go coverage profile.
        profile: PathBuf,

        /// Only include these profile paths.
        #[arg(long = "file")]
        files: Vec<String>,

        /// Threshold in percent used to flag low files.
        #[arg(long, default_value_t = DEFAULT_THRESHOLD_PERCENT)]
        threshold: f64,
    },

    /// Compare two local profiles.
    Compare {
        /// Baseline profile.
        base: PathBuf,

        /// New profile.
        new: PathBuf,

        /// Only include these profile paths.
        #[arg(long = "file")]
        files: Vec<String>,

        /// Threshold in percent.
        #[arg(long, default_value_t = DEFAULT_THRESHOLD_PERCENT)]
        threshold: f64,

        /// Drop in percentage points tolerated before a file counts as regressed.
        #[arg(long, default_value_t = 0.0)]
        epsilon: f64,

        /// Output style.
        #[arg(long, value_enum, default_value = "text")]
        style: Style,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let (output, is_low) = match cli.command {
        Commands::Presubmit(args) => cli::cmd_presubmit(&args)?,
        Commands::Summary {
            profile,
            files,
            threshold,
        } => (cli::cmd_summary(&profile, &files, threshold)?, false),
        Commands::Compare {
            base,
            new,
            files,
            threshold,
            epsilon,
            style,
        } => {
            let gate = GateConfig::from_percent(threshold, epsilon)?;
            cli::cmd_compare(&base, &new, &files, &gate, &style)?
        }
    };

    print!("{output}");
    if is_low {
        log::error!("coverage is below the threshold");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
