// Daemon core module
mod daemon_core {
    use appkeeper::config::{load_rows, DaemonConfig};
    use appkeeper::daemon::{PidFile, PidGuard};
    use appkeeper::error::{AppKeeperError, Result};
    use appkeeper::ipc::IpcServer;
    use appkeeper::process::{Supervisor, SupervisorHandle};
    use std::path::PathBuf;
    use tokio::signal::unix::{signal, SignalKind};

    /// Main daemon struct that coordinates all components
    pub struct Daemon {
        config: DaemonConfig,
        supervisor: Supervisor,
        ipc_server: IpcServer,
        /// Held until the daemon exits
        _pid_guard: PidGuard,
    }

    impl Daemon {
        /// Claim the PID file and bind the control socket
        pub fn new(config: DaemonConfig) -> Result<Self> {
            let pid_guard = PidFile::with_path(&config.pid_file).acquire()?;
            let supervisor = Supervisor::new(config.supervisor_config());

            let mut ipc_server = IpcServer::with_socket_path(&config.socket_path);
            ipc_server.start()?;
            tracing::info!(
                "IPC server listening on: {}",
                ipc_server.socket_path().display()
            );

            Ok(Self {
                config,
                supervisor,
                ipc_server,
                _pid_guard: pid_guard,
            })
        }

        /// Run until SIGINT or SIGTERM, then stop every child
        pub async fn run(self) -> Result<()> {
            let Daemon {
                config,
                supervisor,
                ipc_server,
                _pid_guard,
            } = self;

            let handle = supervisor.handle();
            let supervisor_task = tokio::spawn(supervisor.run());

            let replay = Self::replay_apps(handle.clone(), config.apps_file.clone());
            let replay_task = tokio::spawn(replay);

            tracing::info!("Daemon started (PID {})", std::process::id());

            let mut sigterm = signal(SignalKind::terminate())?;
            let mut sigint = signal(SignalKind::interrupt())?;

            tokio::select! {
                result = ipc_server.run(handle.clone()) => {
                    if let Err(e) = result {
                        tracing::error!("IPC server stopped: {}", e);
                    }
                }
                _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
                _ = sigint.recv() => tracing::info!("Received SIGINT"),
            }

            tracing::info!("Shutting down daemon gracefully...");
            replay_task.abort();

            handle.shutdown().await?;
            if let Err(e) = supervisor_task.await {
                tracing::error!("Supervisor task failed: {}", e);
            }

            drop(ipc_server);
            tracing::info!("Daemon stopped");
            Ok(())
        }

        async fn replay_apps(handle: SupervisorHandle, apps_file: PathBuf) {
            let rows = load_rows(&apps_file);
            match handle.replay_startup_config(&rows).await {
                Ok(ids) => tracing::debug!("Startup launches: {:?}", ids),
                Err(AppKeeperError::SupervisorUnavailable) => {
                    tracing::debug!("Startup replay interrupted by shutdown");
                }
                Err(e) => tracing::error!("Startup replay failed: {}", e),
            }
        }
    }
}

use appkeeper::config::DaemonConfig;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// appkeeper daemon - launches and watches local applications
#[derive(Parser)]
#[command(name = "appkeeper-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Apps file to replay at startup (overrides the settings file)
    #[arg(short, long)]
    apps: Option<PathBuf>,

    /// Control socket path (overrides the settings file)
    #[arg(short, long)]
    socket: Option<PathBuf>,
}

fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> appkeeper::error::Result<()> {
    let args = Args::parse();

    let mut config = DaemonConfig::load(args.config.as_deref())?;
    if let Some(apps) = args.apps {
        config.apps_file = apps;
    }
    if let Some(socket) = args.socket {
        config.socket_path = socket;
    }
    config.validate()?;

    init_logging(&config.log_level);

    let daemon = daemon_core::Daemon::new(config)?;
    daemon.run().await
}
