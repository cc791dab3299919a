// CLI module - User-facing command-line interface

mod output;

use crate::error::{AppKeeperError, Result};
use crate::ipc::client::IpcClient;
use crate::ipc::protocol::{AppStartOptions, Command};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default socket path for daemon communication
const DEFAULT_SOCKET_PATH: &str = "/tmp/appkeeper.sock";

/// appkeeper - launch and watch local applications
#[derive(Parser)]
#[command(name = "appkeeper")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Control socket of the daemon
    #[arg(short, long, global = true, default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the daemon to launch an executable once
    Start {
        /// Path to the executable
        path: PathBuf,

        /// Working directory (defaults to the daemon user's home)
        #[arg(short, long)]
        cwd: Option<PathBuf>,

        /// Arguments to pass to the executable
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Check that the daemon answers
    Test,

    /// List processes the daemon is watching
    List,

    /// Print lifecycle signals as they happen
    Watch,
}

impl Cli {
    /// Run the CLI application
    pub fn run() -> Result<()> {
        let cli = Cli::parse();
        cli.execute()
    }

    /// Execute the parsed command
    fn execute(&self) -> Result<()> {
        let client = IpcClient::with_socket_path(&self.socket);

        if let Commands::Watch = self.command {
            output::print_info("Watching lifecycle signals (Ctrl+C to stop)");
            return client.subscribe(|event| {
                output::print_event(&event);
                true
            });
        }

        let response = client.send_command(self.build_command())?;

        match response.result {
            Ok(data) => {
                output::print_success(&data);
                Ok(())
            }
            Err(error_msg) => {
                output::print_error(&error_msg);
                Err(AppKeeperError::IpcError(error_msg))
            }
        }
    }

    /// Build an IPC command from the CLI arguments
    fn build_command(&self) -> Command {
        match &self.command {
            Commands::Start { path, cwd, args } => Command::AppStart(AppStartOptions {
                path: path.clone(),
                args: args.clone(),
                working_directory: cwd.clone(),
            }),
            Commands::Test => Command::Test,
            Commands::List => Command::List,
            Commands::Watch => Command::Subscribe,
        }
    }
}
