//! Single-instance coordination.
//!
//! The first process to take the lock becomes the primary. Later invocations
//! forward their notification over HTTP and poke the primary's signal socket.

use nova_notifications_util::{NotifyRequest, NotifyResponse};
use rustix::{
    fs::{FlockOperation, flock},
    io::{Errno, FdFlags, fcntl_getfd, fcntl_setfd},
};
use std::{
    fs::{File, OpenOptions},
    io,
    os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};
use tracing::{debug, info, warn};

use crate::constants::{DETACHED_ENV, FORWARD_TIMEOUT, LOCK_FD_ENV, LOCK_FILE, SIGNAL_SOCKET};

#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    #[error("another instance already holds {}", .0.display())]
    AlreadyRunning(PathBuf),
    #[error("failed to lock {}: {source}", .path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no running instance accepted the connection on port {0}")]
    NotRunning(u16),
    #[error("failed to forward notification: {0}")]
    Forward(#[from] reqwest::Error),
    #[error("the running instance rejected the notification: {0}")]
    Rejected(String),
    #[error("failed to start detached process: {0}")]
    Detach(#[source] io::Error),
}

/// Where the lock file and signal socket live.
pub fn runtime_dir() -> PathBuf {
    dirs::runtime_dir().unwrap_or_else(std::env::temp_dir)
}

pub fn signal_path(dir: &Path) -> PathBuf {
    dir.join(SIGNAL_SOCKET)
}

/// Exclusive lock held for the lifetime of the primary instance.
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    pub fn acquire(dir: &Path) -> Result<Self, InstanceError> {
        let path = dir.join(LOCK_FILE);
        let file = match OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(source) => return Err(InstanceError::Lock { path, source }),
        };

        match flock(&file, FlockOperation::NonBlockingLockExclusive) {
            Ok(()) => {
                debug!("acquired instance lock {}", path.display());
                Ok(Self { file, path })
            }
            Err(Errno::WOULDBLOCK) => Err(InstanceError::AlreadyRunning(path)),
            Err(errno) => Err(lock_error(path, errno)),
        }
    }

    /// Take over the lock handed down by the parent of a detached process.
    ///
    /// Falls back to [`InstanceLock::acquire`] when no descriptor was passed.
    pub fn inherit(dir: &Path) -> Result<Self, InstanceError> {
        let Some(raw_fd) = std::env::var(LOCK_FD_ENV)
            .ok()
            .and_then(|value| value.parse::<RawFd>().ok())
        else {
            return Self::acquire(dir);
        };

        Self::adopt(dir, raw_fd).or_else(|err| {
            warn!("Inherited lock descriptor {raw_fd} is unusable ({err}), locking again");
            Self::acquire(dir)
        })
    }

    fn adopt(dir: &Path, raw_fd: RawFd) -> Result<Self, InstanceError> {
        let path = dir.join(LOCK_FILE);

        // SAFETY: the descriptor is only borrowed until it is checked to be open.
        let borrowed = unsafe { BorrowedFd::borrow_raw(raw_fd) };
        let flags = match fcntl_getfd(borrowed) {
            Ok(flags) => flags,
            Err(errno) => return Err(lock_error(path, errno)),
        };
        // SAFETY: the parent passed this descriptor to us alone and nothing else owns it.
        let fd = unsafe { OwnedFd::from_raw_fd(raw_fd) };
        if let Err(errno) = fcntl_setfd(&fd, flags | FdFlags::CLOEXEC) {
            return Err(lock_error(path, errno));
        }

        // Same open file description as the parent's, so this only confirms the lock.
        match flock(&fd, FlockOperation::NonBlockingLockExclusive) {
            Ok(()) => {
                debug!("inherited instance lock {}", path.display());
                Ok(Self {
                    file: File::from(fd),
                    path,
                })
            }
            Err(Errno::WOULDBLOCK) => Err(InstanceError::AlreadyRunning(path)),
            Err(errno) => Err(lock_error(path, errno)),
        }
    }

    /// Let the lock descriptor survive `exec` so a child can keep holding it.
    fn share_with_child(&self) -> Result<RawFd, InstanceError> {
        let fd = self.file.as_fd();
        fcntl_getfd(fd)
            .and_then(|flags| fcntl_setfd(fd, flags.difference(FdFlags::CLOEXEC)))
            .map_err(|errno| InstanceError::Detach(errno.into()))?;
        Ok(fd.as_raw_fd())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn lock_error(path: PathBuf, errno: Errno) -> InstanceError {
    InstanceError::Lock {
        path,
        source: errno.into(),
    }
}

/// Hand a notification to the primary instance through its HTTP endpoint.
pub async fn forward(port: u16, request: &NotifyRequest) -> Result<NotifyResponse, InstanceError> {
    let url = format!("http://127.0.0.1:{port}/notify");
    let client = reqwest::Client::builder().timeout(FORWARD_TIMEOUT).build()?;

    let response = client.post(&url).json(request).send().await.map_err(|err| {
        if err.is_connect() {
            InstanceError::NotRunning(port)
        } else {
            InstanceError::Forward(err)
        }
    })?;

    let body: NotifyResponse = response.json().await?;
    if body.success {
        info!("Notification forwarded to the running instance");
        Ok(body)
    } else {
        Err(InstanceError::Rejected(body.error.unwrap_or_default()))
    }
}

/// Whether this process is already the detached child.
pub fn is_detached() -> bool {
    std::env::var_os(DETACHED_ENV).is_some()
}

/// Re-execute the current binary in its own process group with null stdio.
///
/// The child is marked with an environment variable so it never forks again,
/// and inherits `lock` so no other invocation can become primary in between.
pub fn detach(lock: &InstanceLock) -> Result<u32, InstanceError> {
    use std::os::unix::process::CommandExt;

    let exe = std::env::current_exe().map_err(InstanceError::Detach)?;
    let lock_fd = lock.share_with_child()?;
    let child = Command::new(exe)
        .args(std::env::args_os().skip(1))
        .env(DETACHED_ENV, "1")
        .env(LOCK_FD_ENV, lock_fd.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()
        .map_err(InstanceError::Detach)?;

    Ok(child.id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_lock_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let first = InstanceLock::acquire(dir.path()).unwrap();
        assert_eq!(first.path(), dir.path().join(LOCK_FILE));

        match InstanceLock::acquire(dir.path()) {
            Err(InstanceError::AlreadyRunning(path)) => assert_eq!(path, first.path()),
            other => panic!("expected AlreadyRunning, got {other:?}"),
        }
    }

    #[test]
    fn test_lock_is_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        drop(InstanceLock::acquire(dir.path()).unwrap());
        assert!(InstanceLock::acquire(dir.path()).is_ok());
    }

    #[test]
    fn test_missing_directory_is_a_lock_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            InstanceLock::acquire(&missing),
            Err(InstanceError::Lock { .. })
        ));
    }

    #[test]
    fn test_adopted_lock_stays_held() {
        use std::os::fd::IntoRawFd;

        let dir = tempfile::tempdir().unwrap();
        let parent = InstanceLock::acquire(dir.path()).unwrap();
        let raw_fd = parent.share_with_child().unwrap();
        let flags = fcntl_getfd(parent.file.as_fd()).unwrap();
        assert!(!flags.contains(FdFlags::CLOEXEC));
        assert_eq!(raw_fd, parent.file.as_raw_fd());

        // What the child ends up with after exec: the same open file description.
        let handed_down = parent.file.try_clone().unwrap().into_raw_fd();
        drop(parent);

        let child = InstanceLock::adopt(dir.path(), handed_down).unwrap();
        assert!(fcntl_getfd(child.file.as_fd()).unwrap().contains(FdFlags::CLOEXEC));
        assert!(matches!(
            InstanceLock::acquire(dir.path()),
            Err(InstanceError::AlreadyRunning(_))
        ));

        drop(child);
        assert!(InstanceLock::acquire(dir.path()).is_ok());
    }

    #[tokio::test]
    async fn test_forward_without_primary() {
        // Bind and drop to find a port nobody listens on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let request = NotifyRequest {
            title: Some("A".into()),
            content: Some("B".into()),
            ..NotifyRequest::default()
        };
        assert!(matches!(
            forward(port, &request).await,
            Err(InstanceError::NotRunning(p)) if p == port
        ));
    }

    #[tokio::test]
    async fn test_forward_to_primary() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        let listener = crate::subscriptions::http::bind(0).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let cancel = tokio_util::sync::CancellationToken::new();
        let server = tokio::spawn(crate::subscriptions::http::serve(listener, tx, cancel.clone()));

        let request = NotifyRequest {
            title: Some("A".into()),
            content: Some("B".into()),
            timeout: Some(1000),
            broadcast: None,
        };
        let response = forward(port, &request).await.unwrap();
        assert!(response.success);
        assert!(matches!(
            rx.recv().await,
            Some(crate::handlers::messages::Input::Notify(n)) if n.title == "A" && n.timeout_ms == Some(1000)
        ));

        let rejected = forward(port, &NotifyRequest::default()).await;
        assert!(matches!(rejected, Err(InstanceError::Rejected(_))));

        cancel.cancel();
        server.await.unwrap().unwrap();
    }
}
