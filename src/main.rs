mod app;
mod constants;
mod handlers;
mod instance;
mod layout;
mod state;
mod subscriptions;
mod surface;

use anyhow::Context;
use clap::Parser;
use nova_notifications_config::NotificationsConfig;
use nova_notifications_util::{InstanceId, NewNotification, NotifyRequest};
use std::{io::IsTerminal, path::PathBuf, process::ExitCode, sync::Arc};
use tokio::{
    signal::unix::{SignalKind, signal},
    sync::mpsc::{channel, unbounded_channel},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::{
    app::Orchestrator,
    constants::CHANNEL_BUFFER_SIZE,
    handlers::messages::Input,
    instance::{InstanceError, InstanceLock},
    subscriptions::{
        http,
        signal::{SignalListener, raise_primary},
        udp::{Broadcaster, UdpListener},
    },
    surface::HeadlessHost,
};

/// Background notification dispatcher.
#[derive(Debug, Parser)]
#[command(name = "novanotif", version, about)]
struct Args {
    /// Notification title
    #[arg(short, long)]
    title: Option<String>,
    /// Notification content
    #[arg(short, long)]
    content: Option<String>,
    /// Display time in milliseconds, 0 for the configured default
    #[arg(short = 'd', long)]
    timeout: Option<u64>,
    /// Also broadcast the notification to other instances over UDP
    #[arg(short, long)]
    broadcast: bool,
    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
    /// Configuration file to read instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Keep running in the background, detached from the terminal
    #[arg(long)]
    detach: bool,
}

impl Args {
    /// The notification given on the command line, if any.
    fn request(&self) -> Result<Option<NotifyRequest>, &'static str> {
        match (&self.title, &self.content) {
            (None, None) => Ok(None),
            (Some(_), Some(_)) => Ok(Some(NotifyRequest {
                title: self.title.clone(),
                content: self.content.clone(),
                timeout: self.timeout,
                broadcast: Some(self.broadcast),
            })),
            _ => Err("--title and --content must be given together"),
        }
    }
}

fn main() -> ExitCode {
    color_backtrace::install();
    let args = Args::parse();
    let filter = init_logging(args.verbose);

    let request = match args.request() {
        Ok(request) => request,
        Err(message) => {
            eprintln!("error: {message}");
            return ExitCode::FAILURE;
        }
    };

    let config = NotificationsConfig::load_or_default(args.config.as_deref());
    if config.verbose && !args.verbose && std::env::var_os(EnvFilter::DEFAULT_ENV).is_none() {
        if let Err(err) = filter.modify(|filter| *filter = EnvFilter::new("debug")) {
            warn!("Failed to raise log level: {err}");
        }
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("Failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    let dir = instance::runtime_dir();
    let acquired = if instance::is_detached() {
        InstanceLock::inherit(&dir)
    } else {
        InstanceLock::acquire(&dir)
    };
    let lock = match acquired {
        Ok(lock) => lock,
        Err(InstanceError::AlreadyRunning(path)) => {
            info!("Another instance holds {}", path.display());
            return runtime.block_on(secondary(&dir, config.server.port, request));
        }
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    if args.detach && !instance::is_detached() {
        return match instance::detach(&lock) {
            Ok(pid) => {
                info!("Continuing in the background as pid {pid}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                error!("{err}");
                ExitCode::FAILURE
            }
        };
    }

    let initial = match request.map(NotifyRequest::validate).transpose() {
        Ok(initial) => initial,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(primary(Arc::new(config), lock, initial)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) -> reload::Handle<EnvFilter, Registry> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    let (filter, handle) = reload::Layer::new(filter);
    let registry = tracing_subscriber::registry().with(filter);

    #[cfg(feature = "systemd")]
    if !std::io::stderr().is_terminal() {
        match tracing_journald::layer() {
            Ok(journald) => {
                registry.with(journald).init();
                return handle;
            }
            Err(err) => eprintln!("journald unavailable, logging to stderr: {err}"),
        }
    }

    registry
        .with(fmt::layer().with_target(false).with_ansi(std::io::stderr().is_terminal()))
        .init();
    handle
}

/// Poke the running instance and hand it our notification, if any.
async fn secondary(
    dir: &std::path::Path,
    port: u16,
    request: Option<NotifyRequest>,
) -> ExitCode {
    if let Err(err) = raise_primary(&instance::signal_path(dir)).await {
        warn!("Could not signal the running instance: {err:#}");
    }

    let Some(request) = request else {
        return ExitCode::SUCCESS;
    };

    match instance::forward(port, &request).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(InstanceError::NotRunning(port)) => {
            error!("The running instance is not accepting notifications on port {port}");
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn primary(
    config: Arc<NotificationsConfig>,
    lock: InstanceLock,
    initial: Option<NewNotification>,
) -> anyhow::Result<()> {
    let instance_id = InstanceId::generate();
    info!(%instance_id, "starting");

    let cancel = CancellationToken::new();
    let (tx, rx) = channel(CHANNEL_BUFFER_SIZE);
    let (surface_tx, surface_rx) = unbounded_channel();

    let listener = http::bind(config.server.port).await?;

    let mut orchestrator = Orchestrator::new(config.clone(), tx.clone(), surface_tx);
    if config.udp.enabled {
        match Broadcaster::bind(&config.udp, instance_id.clone()).await {
            Ok(broadcaster) => orchestrator = orchestrator.with_broadcaster(broadcaster),
            Err(err) => error!("Failed to create broadcast socket: {err}"),
        }
        match UdpListener::bind(&config.udp, instance_id.clone(), tx.clone()).await {
            Ok(udp) => {
                tokio::spawn(udp.run(cancel.clone()));
            }
            Err(err) => error!(
                "Failed to bind UDP port {}: {err}. Continuing with HTTP only",
                config.udp.port
            ),
        }
    }

    let signal_dir = lock
        .path()
        .parent()
        .map(std::path::Path::to_path_buf)
        .unwrap_or_else(instance::runtime_dir);
    match SignalListener::bind(&instance::signal_path(&signal_dir)) {
        Ok(listener) => {
            tokio::spawn(listener.run(tx.clone(), cancel.clone()));
        }
        Err(err) => warn!("Secondary invocations cannot raise surfaces: {err:#}"),
    }

    tokio::spawn(HeadlessHost::new(surface_rx, tx.clone()).run());

    if let Some(notification) = initial {
        tx.send(Input::Notify(notification))
            .await
            .context("orchestrator input closed")?;
    }

    let mut server = tokio::spawn(http::serve(listener, tx, cancel.clone()));
    let mut terminate = signal(SignalKind::terminate()).context("failed to watch SIGTERM")?;

    let result = tokio::select! {
        _ = orchestrator.run(rx) => Ok(()),
        served = &mut server => match served {
            Ok(result) => result,
            Err(err) => Err(err).context("HTTP task panicked"),
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            Ok(())
        }
        _ = terminate.recv() => {
            info!("Terminated, shutting down");
            Ok(())
        }
    };

    cancel.cancel();
    drop(lock);
    result
}
