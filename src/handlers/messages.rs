use nova_notifications_util::{NewNotification, NotificationId, SurfaceEvent, Theme};

/// Everything the orchestrator reacts to, from every source
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Validated request from the HTTP endpoint, UDP listener or command line
    Notify(NewNotification),
    /// Interaction reported by a presentation surface
    Surface(SurfaceEvent),
    /// Countdown expired. Ignored unless `epoch` is the entry's current epoch
    Timeout { id: NotificationId, epoch: u64 },
    /// Close animation finished, the surface can be destroyed
    CloseFinished(NotificationId),
    /// Theme changed
    SetTheme(Theme),
    /// A secondary invocation poked the primary instance
    Raise,
}
