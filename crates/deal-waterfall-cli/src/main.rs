mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::scenarios::SensitivityArgs;
use commands::underwriting::{ProFormaArgs, UnderwriteArgs};
use commands::waterfall::{AnalyzeArgs, CashFlowsArgs, IrrArgs, WaterfallArgs};

/// Real estate deal underwriting, equity waterfalls and IRR
#[derive(Parser)]
#[command(
    name = "dwf",
    version,
    about = "Real estate deal underwriting, equity waterfalls and IRR",
    long_about = "A CLI for underwriting value-add real estate deals and splitting \
                  exit proceeds between LP and GP with decimal precision. Supports \
                  underwriting, annual pro formas, cash-flow projections, tiered \
                  waterfalls with optional catch-up, IRR, and sensitivity grids."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log pipeline steps to stderr (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Underwrite a value-add acquisition (NOI, exit value, value created)
    Underwrite(UnderwriteArgs),
    /// Build a flat annual pro forma with sale in the final year
    ProForma(ProFormaArgs),
    /// Project annual NOI, debt service and cash to equity
    CashFlows(CashFlowsArgs),
    /// Run exit cash through the LP/GP waterfall tiers
    Waterfall(WaterfallArgs),
    /// End-to-end deal analysis: stack, projection, waterfall and IRRs
    Analyze(AnalyzeArgs),
    /// Internal rate of return of a cash-flow series
    Irr(IrrArgs),
    /// Sweep one or two deal inputs and tabulate a return metric
    Sensitivity(SensitivityArgs),
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
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Underwrite(args) => commands::underwriting::run_underwrite(args),
        Commands::ProForma(args) => commands::underwriting::run_pro_forma(args),
        Commands::CashFlows(args) => commands::waterfall::run_cash_flows(args),
        Commands::Waterfall(args) => commands::waterfall::run_waterfall(args),
        Commands::Analyze(args) => commands::waterfall::run_analyze(args),
        Commands::Irr(args) => commands::waterfall::run_irr(args),
        Commands::Sensitivity(args) => commands::scenarios::run_sensitivity(args),
        Commands::Version => {
            println!("dwf {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
