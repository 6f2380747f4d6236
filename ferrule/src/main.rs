//! Ferrule CLI

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ferrule::repl::{literal_args, Repl};
use ferrule::stdlib::runtime_with_stdlib;
use ferrule::{Error, Result, RuntimeConfig};

#[derive(Parser)]
#[command(name = "ferrule", version, about = "Ferrule - embeddable scripting runtime")]
struct Cli {
    /// Runtime configuration file (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Refuse privileged operations (environment, shell, modules)
    #[arg(long, global = true)]
    safe_mode: bool,

    /// Debug logging to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Call a registered function with literal arguments
    Call {
        /// Function name
        name: String,
        /// Arguments: JSON literals or bare words
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List registered functions and their prototypes
    Functions,
    /// Start the interactive shell
    Repl,
}

fn main() {
    let cli = Cli::parse();
    ferrule::init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => RuntimeConfig::load_from(path)?,
        None => RuntimeConfig::default(),
    }
    .with_safe_mode_override(cli.safe_mode);
    let mut rt = runtime_with_stdlib(&config)?;

    match cli.command {
        Command::Call { name, args, json } => {
            let args = literal_args(&args)?;
            let result = rt.run(|rt| rt.call_by_name(&name, args));
            let mut reports = rt.take_reports();
            if result.is_err() {
                // the failure itself, reported by main
                reports.pop();
            }
            for report in reports {
                eprintln!("warning: {report}");
            }
            let value = result?;
            if json {
                println!("{}", value.to_json());
            } else if !value.is_void() {
                println!("{value}");
            }
            Ok(())
        }
        Command::Functions => {
            for signature in rt.functions() {
                println!("{signature}");
            }
            Ok(())
        }
        Command::Repl => Repl::new(rt)
            .and_then(|mut repl| repl.run())
            .map_err(|e| Error::io_error(e.to_string())),
    }
}
