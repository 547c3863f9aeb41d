mod commands;
mod helpers;

use clap::Parser;
use fequant_core::domain::QuantError;
use tracing_subscriber::EnvFilter;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let quant_error = error.as_quant_error();
            eprintln!("{}", quant_error.diagnostic_line());
            quant_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("fe-quant".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            init_logging(cli.verbose);
            dispatch_parsed(cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

/// `RUST_LOG` wins when set; otherwise each `-v` lowers the level from `warn`.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A subscriber may already be installed when `run` is called repeatedly.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "fe-quant",
    version,
    about = "Fe3+ quantification from Fe L2,3-edge EELS spectra"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Quantify Fe3+ content of a spectrum document and write a JSON report
    Quantify(commands::QuantifyArgs),
    /// Validate a run configuration and print it with defaults filled in
    CheckConfig(commands::CheckConfigArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Quantify(args) => commands::run_quantify_command(args),
        CliCommand::CheckConfig(args) => commands::run_check_config_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(QuantError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_quant_error(&self) -> QuantError {
        match self {
            Self::Usage(message) => {
                QuantError::input_validation("INPUT.CLI_USAGE", message.clone())
            }
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => QuantError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CliError, run};

    #[test]
    fn help_exits_cleanly() {
        let code = run(["--help"]).expect("help should not be an error");
        assert_eq!(code, 0);
    }

    #[test]
    fn unknown_subcommand_is_usage_error() {
        let error = run(["calibrate"]).expect_err("unknown subcommand should fail");
        assert!(matches!(error, CliError::Usage(_)));
        let quant_error = error.as_quant_error();
        assert_eq!(quant_error.code(), "INPUT.CLI_USAGE");
        assert_eq!(quant_error.exit_code(), 2);
    }

    #[test]
    fn internal_errors_map_to_io_category() {
        let error = CliError::from(anyhow::anyhow!("disk full"));
        let quant_error = error.as_quant_error();
        assert_eq!(quant_error.code(), "IO.CLI");
        assert_eq!(quant_error.exit_code(), 3);
    }
}
