mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use bond_valuation_core::BondValuationError;
use commands::bond::{ScheduleArgs, ValidateArgs, ValuateArgs};

/// Bond cash-flow projection and valuation
#[derive(Parser)]
#[command(
    name = "bondval",
    version,
    about = "Bond cash-flow schedules and valuation metrics",
    long_about = "Projects an inflation-indexed bond's period-by-period cash flows under \
                  Normal / Partial / Total grace periods and derives present value, \
                  duration, convexity and issuer / investor internal yields with \
                  decimal precision."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log derived parameters and metric totals to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Full valuation: derived parameters, schedule, metrics and summary
    Valuate(ValuateArgs),
    /// Period-by-period cash-flow schedule only
    Schedule(ScheduleArgs),
    /// Check bond terms and list every violation
    Validate(ValidateArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "bond_valuation_core=debug"
    } else {
        "bond_valuation_core=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Valuate(args) => commands::bond::run_valuate(args),
        Commands::Schedule(args) => commands::bond::run_schedule(args),
        Commands::Validate(args) => commands::bond::run_validate(args),
        Commands::Version => {
            println!("bondval {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            report_error(e.as_ref());
            process::exit(1);
        }
    }
}

fn report_error(e: &(dyn std::error::Error + 'static)) {
    match e.downcast_ref::<BondValuationError>() {
        Some(BondValuationError::Validation(errors)) => {
            eprintln!(
                "{}: {} invalid field(s)",
                "validation error".red().bold(),
                errors.len()
            );
            for err in errors.iter() {
                eprintln!("  - {}", err);
            }
        }
        Some(BondValuationError::Calculation(calc)) => {
            eprintln!("{}: {}", "calculation error".red().bold(), calc);
        }
        None => eprintln!("{}: {}", "error".red().bold(), e),
    }
}
