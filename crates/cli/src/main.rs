mod cmd;
mod output;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::RecipeArgs;
use output::{OutputFormat, Status, print_status};

/// litepack - build and package TensorFlow Lite with Bazel
#[derive(Parser)]
#[command(name = "litepack")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  format: OutputFormat,

  #[command(flatten)]
  recipe: RecipeArgs,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Fetch the Bazel installer, triSYCL and the TensorFlow sources
  Source,

  /// Patch, configure and build the libraries
  Build,

  /// Copy built libraries and headers into the package directory
  Package,

  /// Print the package's link names and directories
  Info,

  /// Show the configure environment and build command without running them
  Plan,

  /// Fetch, build and package
  Run,
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Source => cmd::cmd_source(&cli.recipe, cli.format),
    Commands::Build => cmd::cmd_build(&cli.recipe, cli.format),
    Commands::Package => cmd::cmd_package(&cli.recipe, cli.format, cli.verbose),
    Commands::Info => cmd::cmd_info(&cli.recipe, cli.format),
    Commands::Plan => cmd::cmd_plan(&cli.recipe, cli.format),
    Commands::Run => cmd::cmd_run(&cli.recipe, cli.format, cli.verbose),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      print_status(Status::Failed, &format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}
