//! Coordination signal between a secondary invocation and the primary instance.
//!
//! A secondary connects to the primary's Unix socket and writes one line. The
//! primary answers by raising its surfaces; it never admits anything from a signal.

use anyhow::{Context, Result};
use std::{
    io,
    path::{Path, PathBuf},
};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{UnixListener, UnixStream},
    sync::mpsc::Sender,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    constants::{MAX_SIGNAL_LINE, SIGNAL_READ_TIMEOUT},
    handlers::messages::Input,
};

const RAISE: &str = "raise";

pub struct SignalListener {
    listener: UnixListener,
    path: PathBuf,
}

impl SignalListener {
    /// Bind at `path`, replacing a socket left behind by a previous run.
    ///
    /// Only the lock holder may call this, so an existing file is always stale.
    pub fn bind(path: &Path) -> Result<Self> {
        match std::fs::remove_file(path) {
            Ok(()) => debug!("removed stale signal socket {}", path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to remove stale socket {}", path.display()));
            }
        }

        let listener = UnixListener::bind(path)
            .with_context(|| format!("failed to bind signal socket {}", path.display()))?;
        info!("Listening for secondary invocations on {}", path.display());

        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    pub async fn run(self, tx: Sender<Input>, cancel: CancellationToken) {
        loop {
            let stream = tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => stream,
                    Err(err) => {
                        error!("Failed to accept signal connection {}", err);
                        continue;
                    }
                },
            };

            // A silent client must not hold up the next one.
            tokio::spawn(handle_connection(stream, tx.clone()));
        }
    }
}

async fn handle_connection(stream: UnixStream, tx: Sender<Input>) {
    let mut line = String::new();
    let mut reader = BufReader::new(stream.take(MAX_SIGNAL_LINE));
    match tokio::time::timeout(SIGNAL_READ_TIMEOUT, reader.read_line(&mut line)).await {
        Ok(Ok(_)) => {}
        Ok(Err(err)) => {
            warn!("Failed to read coordination signal: {err}");
            return;
        }
        Err(_) => {
            warn!("Coordination client sent nothing within {SIGNAL_READ_TIMEOUT:?}");
            return;
        }
    }

    match line.trim() {
        RAISE => {
            debug!("secondary invocation asked to raise surfaces");
            if tx.send(Input::Raise).await.is_err() {
                debug!("orchestrator gone, dropping raise");
            }
        }
        other => warn!("Unknown coordination signal {other:?}"),
    }
}

impl Drop for SignalListener {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove signal socket {}: {err}", self.path.display());
            }
        }
    }
}

/// Ask the primary instance listening at `path` to raise its surfaces.
pub async fn raise_primary(path: &Path) -> Result<()> {
    let mut stream = UnixStream::connect(path)
        .await
        .with_context(|| format!("failed to connect to {}", path.display()))?;
    stream.write_all(format!("{RAISE}\n").as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}
