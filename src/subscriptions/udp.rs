//! Broadcast intake and outbound broadcast over UDP.

use nova_notifications_config::UdpConfig;
use nova_notifications_util::{BroadcastDatagram, IngestError, InstanceId, Notification};
use std::{
    io,
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};
use tokio::{net::UdpSocket, sync::mpsc::Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::{
    constants::{UDP_BUFFER_SIZE, UDP_MAX_RECV_FAILURES, UDP_RECV_BACKOFF},
    handlers::messages::Input,
};

/// Receives datagrams from other instances and hands the survivors to the orchestrator.
pub struct UdpListener {
    socket: UdpSocket,
    instance_id: InstanceId,
    shared_key: String,
    tx: Sender<Input>,
}

impl UdpListener {
    pub async fn bind(
        config: &UdpConfig,
        instance_id: InstanceId,
        tx: Sender<Input>,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, config.port)).await?;
        let listener = Self::from_socket(socket, config.shared_key.clone(), instance_id, tx);
        info!("UDP listener bound to {}", listener.local_addr()?);
        Ok(listener)
    }

    pub fn from_socket(
        socket: UdpSocket,
        shared_key: String,
        instance_id: InstanceId,
        tx: Sender<Input>,
    ) -> Self {
        Self {
            socket,
            instance_id,
            shared_key,
            tx,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut buffer = vec![0u8; UDP_BUFFER_SIZE];
        let mut backoff = RecvBackoff::default();

        loop {
            let (len, peer) = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.socket.recv_from(&mut buffer) => match result {
                    Ok(received) => received,
                    Err(err) => {
                        let Some(delay) = backoff.failed() else {
                            error!("UDP receive keeps failing, giving up: {err}");
                            break;
                        };
                        warn!("UDP receive error, retrying in {delay:?}: {err}");
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(delay) => continue,
                        }
                    }
                },
            };
            backoff.reset();
            trace!(%peer, len, "datagram received");

            match BroadcastDatagram::screen(&buffer[..len], &self.instance_id, &self.shared_key) {
                Ok(request) => {
                    debug!(%peer, title = %request.title, "accepted broadcast notification");
                    if self.tx.send(Input::Notify(request)).await.is_err() {
                        break;
                    }
                }
                Err(IngestError::Loopback) => {
                    debug!(%peer, "ignoring our own broadcast");
                }
                Err(IngestError::Auth) => {
                    warn!(%peer, "UDP message failed shared key check");
                }
                Err(err) => {
                    error!(%peer, "Invalid UDP notification message: {err}");
                }
            }
        }

        info!("UDP listener stopped");
    }
}

/// Doubling delay between failed receives, until the listener gives up.
#[derive(Debug, Default)]
struct RecvBackoff {
    failures: u32,
}

impl RecvBackoff {
    fn failed(&mut self) -> Option<Duration> {
        self.failures += 1;
        (self.failures <= UDP_MAX_RECV_FAILURES)
            .then(|| UDP_RECV_BACKOFF * 2u32.pow(self.failures - 1))
    }

    fn reset(&mut self) {
        self.failures = 0;
    }
}

/// Sends locally originated notifications to the other instances.
///
/// Fire-and-forget: failures are logged and never retried.
#[derive(Clone)]
pub struct Broadcaster {
    socket: Arc<UdpSocket>,
    target: (String, u16),
    instance_id: InstanceId,
    key: Option<String>,
}

impl Broadcaster {
    pub async fn bind(config: &UdpConfig, instance_id: InstanceId) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_broadcast(true)?;

        Ok(Self {
            socket: Arc::new(socket),
            target: (config.broadcast_address.clone(), config.broadcast_port),
            instance_id,
            key: config.shared_key().map(str::to_string),
        })
    }

    pub fn emit(&self, notification: &Notification) {
        let datagram = BroadcastDatagram::outbound(notification, &self.instance_id, self.key.as_deref());
        let bytes = match datagram.to_bytes() {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(id = %notification.id, "Failed to encode broadcast: {err}");
                return;
            }
        };

        let socket = self.socket.clone();
        let (host, port) = self.target.clone();
        tokio::spawn(async move {
            match socket.send_to(&bytes, (host.as_str(), port)).await {
                Ok(_) => debug!("UDP broadcast sent to {host}:{port}"),
                Err(err) => error!("Failed to send UDP broadcast to {host}:{port}: {err}"),
            }
        });
    }
}
