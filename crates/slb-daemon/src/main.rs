//! `slbd` - the SLB daemon binary.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use slb_core::Timestamp;
use slb_core::dirs::{ProjectDir, SlbHome};
use slb_daemon::{Daemon, DaemonContext, PidFile, pidfile_path, socket_path};
use slb_events::EventBus;
use slb_patterns::PatternEngine;
use slb_request::{RequestEngine, spawn_sweeper};
use slb_session::SessionManager;
use slb_store::Store;

#[derive(Debug, Parser)]
#[command(name = "slbd", about = "SLB daemon: local two-person-rule coordinator")]
struct Args {
    /// Project to serve; defaults to detection from the working directory.
    #[arg(long, env = "SLB_PROJECT")]
    project: Option<PathBuf>,

    /// Socket path override.
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Database path override.
    #[arg(long)]
    db: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let project = match args.project {
        Some(path) => ProjectDir::from_path(path),
        None => {
            let cwd = std::env::current_dir().context("cannot resolve working directory")?;
            ProjectDir::resolve(&cwd)
        }
    };
    project.ensure().context("cannot prepare project .slb directory")?;
    let project_path = project.root().display().to_string();

    let home = SlbHome::resolve().context("cannot resolve SLB home")?;
    home.ensure().context("cannot prepare SLB home")?;

    let config = slb_config::load(Some(&home.config_path()), Some(&project.config_path()))
        .context("configuration rejected")?;

    let db_path = args.db.unwrap_or_else(|| project.db_path());
    let store = Arc::new(
        Store::open(&db_path)
            .await
            .with_context(|| format!("cannot open store at {}", db_path.display()))?,
    );

    let patterns = Arc::new(PatternEngine::with_builtins());
    let bus = EventBus::new();
    let engine = Arc::new(RequestEngine::new(
        Arc::clone(&store),
        Arc::clone(&patterns),
        bus,
        config.clone(),
    ));
    let sessions = SessionManager::new(Arc::clone(&store));

    let socket = match args.socket {
        Some(path) => path,
        None => socket_path(project.root()).context("cannot derive socket path")?,
    };
    let pidfile = pidfile_path(project.root()).context("cannot derive pidfile path")?;
    let _pidfile = PidFile::acquire(&pidfile)?;

    // A previous unclean shutdown may have left the socket file behind; the
    // pidfile's liveness probe already proved no daemon owns it.
    let _ = std::fs::remove_file(&socket);
    let listener = UnixListener::bind(&socket)
        .with_context(|| format!("cannot bind {}", socket.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&socket, std::fs::Permissions::from_mode(0o600))?;
    }
    info!(socket = %socket.display(), project = %project_path, "slbd listening");

    let shutdown = CancellationToken::new();
    let sweeper = spawn_sweeper(
        Arc::clone(&engine),
        std::time::Duration::from_secs(config.timing.sweep_interval_secs),
        shutdown.child_token(),
    );

    let ctx = Arc::new(DaemonContext {
        store,
        patterns,
        engine,
        sessions,
        config,
        project_path,
        started_at: Timestamp::now(),
    });

    // INT/TERM trigger the graceful path.
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("cannot install SIGTERM handler");
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
                _ = sigterm.recv() => info!("received SIGTERM"),
            }
            shutdown.cancel();
        });
    }

    let result = Daemon::new(ctx).run(listener, shutdown.clone()).await;

    shutdown.cancel();
    let _ = sweeper.await;
    let _ = std::fs::remove_file(&socket);

    result.map_err(Into::into)
}
