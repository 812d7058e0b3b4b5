// Constants module for nova-notifications
// Centralizes magic numbers for better maintainability

use std::time::Duration;

// ============================================================================
// Layout Constants
// ============================================================================

/// Height assumed for a surface until it reports its rendered content height
pub(crate) const INITIAL_SURFACE_HEIGHT: u32 = 100;

/// Initial capacity for the active notification vector
pub(crate) const INITIAL_ACTIVE_CAPACITY: usize = 8;

// ============================================================================
// Animation Constants
// ============================================================================

/// Shortest transition the scheduler will run
pub(crate) const MIN_TRANSITION: Duration = Duration::from_millis(50);

/// Interval between animation frames (~60 Hz display refresh)
pub(crate) const FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

// ============================================================================
// Ingestion Constants
// ============================================================================

/// Largest accepted HTTP request body
pub(crate) const MAX_BODY_BYTES: usize = 1_000_000;

/// Receive buffer for UDP datagrams (maximum UDP payload)
pub(crate) const UDP_BUFFER_SIZE: usize = 65_507;

/// First delay after a failed UDP receive, doubled on each further failure
pub(crate) const UDP_RECV_BACKOFF: Duration = Duration::from_millis(100);

/// Consecutive failed UDP receives before the listener stops
pub(crate) const UDP_MAX_RECV_FAILURES: u32 = 8;

/// Message returned for accepted HTTP submissions
pub(crate) const ACCEPTED_MESSAGE: &str = "Notification received";

// ============================================================================
// Channel and Buffer Constants
// ============================================================================

/// Buffer size for the orchestrator input channel
pub(crate) const CHANNEL_BUFFER_SIZE: usize = 100;

// ============================================================================
// Instance Coordination Constants
// ============================================================================

/// Lock file guarding the single running instance
pub(crate) const LOCK_FILE: &str = "novanotif.lock";

/// Unix socket a secondary invocation pokes to raise the primary's surfaces
pub(crate) const SIGNAL_SOCKET: &str = "novanotif.sock";

/// How long the primary waits for a secondary to send its signal line
pub(crate) const SIGNAL_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest coordination signal line read from a secondary
pub(crate) const MAX_SIGNAL_LINE: u64 = 64;

/// Environment marker set on the re-executed background process
pub(crate) const DETACHED_ENV: &str = "NOVANOTIF_DETACHED";

/// Lock descriptor handed from the foreground process to its detached child
pub(crate) const LOCK_FD_ENV: &str = "NOVANOTIF_LOCK_FD";

/// How long a secondary invocation waits for the primary's HTTP reply
pub(crate) const FORWARD_TIMEOUT: Duration = Duration::from_secs(5);
