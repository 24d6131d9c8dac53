use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;
mod logging;
mod render;
mod state;

use state::{AppState, OutputMode};

/// SmartHVAC job client
#[derive(Parser, Debug)]
#[command(name = "smarthvac")]
#[command(version)]
#[command(about = "Submit HVAC simulation requests and follow their progress", long_about = None)]
struct Cli {
    /// Config file (default: $SMARTHVAC_CONFIG or ~/.smarthvac/config.json)
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long = "json", global = true)]
    json: bool,

    /// Emit logs as JSON
    #[arg(long = "log-json", global = true)]
    log_json: bool,

    /// Disable colored output
    #[arg(long = "no-color", global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a free-text simulation request
    Submit {
        /// Request text, e.g. "cool the server room to 20C"
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// List the most recent jobs
    List,
    /// Re-render the job list on every change until Ctrl-C
    Watch,
    /// Show one job and its result
    Show {
        /// Job id, e.g. job_20260115_103000
        job_id: String,
    },
    /// Write a probe document to check store connectivity
    Ping,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_json);

    let output = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human {
            color: !cli.no_color && std::io::stdout().is_terminal(),
        }
    };

    let state = match AppState::load(cli.config.as_deref(), output) {
        Ok(state) => state,
        Err(e) => {
            log::error!("Failed to start client: {}", e);
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let code = match &cli.command {
        Command::Submit { text } => commands::submit(&state, text).await,
        Command::List => commands::list(&state).await,
        Command::Watch => commands::watch(&state).await,
        Command::Show { job_id } => commands::show(&state, job_id).await,
        Command::Ping => commands::ping(&state).await,
    };

    state.context.shutdown();
    code
}
