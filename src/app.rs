use nova_notifications_config::NotificationsConfig;
use nova_notifications_util::{
    Bounds, NewNotification, Notification, NotificationId, Point, ResolvedTheme, Status,
    SurfaceCommand, SurfaceEvent, Theme,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc::{Receiver, Sender, UnboundedSender};
use tracing::{debug, error, info, trace, warn};

use crate::{
    constants::INITIAL_SURFACE_HEIGHT,
    handlers::messages::Input,
    layout::{LayoutParams, StackItem, StackLayout, transition::TransitionScheduler},
    state::notifications::{ActiveEntry, Countdown, NotificationState},
    subscriptions::udp::Broadcaster,
};

/// Owns the active stack and the overflow queue and drives every surface.
///
/// All mutation happens inside [`Orchestrator::handle`], which never awaits.
/// Timers and animations run as separate tasks and report back through `Input`.
pub struct Orchestrator {
    config: Arc<NotificationsConfig>,
    layout: LayoutParams,
    state: NotificationState,
    transitions: TransitionScheduler,
    surfaces: UnboundedSender<SurfaceCommand>,
    tx: Sender<Input>,
    broadcaster: Option<Broadcaster>,
    theme: Theme,
    next_epoch: u64,
}

impl Orchestrator {
    pub fn new(
        config: Arc<NotificationsConfig>,
        tx: Sender<Input>,
        surfaces: UnboundedSender<SurfaceCommand>,
    ) -> Self {
        Self {
            layout: LayoutParams::from_config(&config),
            state: NotificationState::new(config.notification.max_queued),
            transitions: TransitionScheduler::new(surfaces.clone()),
            theme: config.theme,
            config,
            surfaces,
            tx,
            broadcaster: None,
            next_epoch: 0,
        }
    }

    pub fn with_broadcaster(mut self, broadcaster: Broadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub async fn run(mut self, mut rx: Receiver<Input>) {
        while let Some(input) = rx.recv().await {
            self.handle(input);
        }
        info!(
            active = self.state.active_count(),
            queued = self.state.queued().len(),
            "Input channel closed, orchestrator stopping"
        );
    }

    pub fn handle(&mut self, input: Input) {
        match input {
            Input::Notify(request) => {
                self.admit(request);
            }
            Input::Surface(event) => {
                trace!(id = %event.id(), ?event, "surface event");
                match event {
                    SurfaceEvent::PointerEnter(id) => self.pause(&id),
                    SurfaceEvent::PointerLeave(id) => self.resume(&id),
                    SurfaceEvent::Resized { id, height } => self.resize(&id, height),
                    SurfaceEvent::ManualCloseRequested(id) => self.close(&id),
                }
            }
            Input::Timeout { id, epoch } => self.expire(&id, epoch),
            Input::CloseFinished(id) => self.finish_close(&id),
            Input::SetTheme(theme) => self.set_theme(theme),
            Input::Raise => self.raise_all(),
        }
    }

    /// Activate immediately if a slot is free and nothing is waiting, queue otherwise.
    pub fn admit(&mut self, request: NewNotification) -> NotificationId {
        let notification = request.admit(self.config.notification.default_timeout);
        let id = notification.id.clone();

        if notification.should_broadcast() {
            if let Some(broadcaster) = &self.broadcaster {
                broadcaster.emit(&notification);
            }
        }

        if self.state.queued().is_empty() && self.has_free_slot() {
            self.activate(notification);
        } else {
            debug!(%id, queued = self.state.queued().len() + 1, "stack full, queueing");
            if let Some(evicted) = self.state.enqueue(notification) {
                warn!(
                    id = %evicted.id,
                    title = %evicted.title,
                    "Overflow queue full, dropping oldest queued notification"
                );
            }
        }

        trace!(%id, status = ?self.state.status(&id), "admitted");
        id
    }

    fn has_free_slot(&self) -> bool {
        let max_visible = self.config.notification.max_visible.max(1) as usize;
        self.state.occupied() < max_visible
    }

    fn activate(&mut self, notification: Notification) {
        let id = notification.id.clone();
        let width = self.layout.surface_width();
        let height = INITIAL_SURFACE_HEIGHT;
        self.state
            .push_active(ActiveEntry::new(notification, width, height, Point::default()));

        // Created off-screen and hidden; it slides in once its content height is known.
        let target = self.targets().get(&id).unwrap_or_default();
        let hidden_at = Point::new(self.layout.offscreen_x(), target.y);
        let theme = self.resolved_theme();
        let Some(entry) = self.state.get_mut(&id) else {
            return;
        };
        entry.position = target;
        let create = SurfaceCommand::Create {
            id: id.clone(),
            title: entry.notification.title.clone(),
            content: entry.notification.content.clone(),
            timeout_ms: entry.notification.timeout_ms,
            theme,
            bounds: Bounds {
                x: hidden_at.x,
                y: hidden_at.y,
                width,
                height,
            },
        };

        self.transitions.track(&id, hidden_at);
        self.send(create);
        debug!(%id, "notification active");
        self.start_countdown(&id);
    }

    /// Arm a fresh countdown of the notification's full timeout.
    fn start_countdown(&mut self, id: &NotificationId) {
        self.next_epoch += 1;
        let epoch = self.next_epoch;
        let tx = self.tx.clone();

        let Some(entry) = self.state.get_mut(id) else {
            return;
        };
        entry.cancel_timer();

        let timeout = Duration::from_millis(entry.notification.timeout_ms);
        let timer_id = id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if tx.send(Input::Timeout { id: timer_id, epoch }).await.is_err() {
                trace!("orchestrator gone before countdown fired");
            }
        })
        .abort_handle();

        entry.epoch = epoch;
        entry.timer = Some(Countdown { epoch, handle });
        trace!(%id, epoch, ?timeout, "countdown started");
    }

    fn expire(&mut self, id: &NotificationId, epoch: u64) {
        let Some(entry) = self.state.get_mut(id) else {
            debug!(%id, epoch, "timeout for a notification that is gone");
            return;
        };
        if entry.is_closing() || entry.paused || !entry.owns_epoch(epoch) {
            debug!(%id, epoch, current = entry.epoch, "ignoring stale timeout");
            return;
        }
        entry.timer = None;
        debug!(%id, "timed out");
        self.close(id);
    }

    pub fn pause(&mut self, id: &NotificationId) {
        let Some(entry) = self.state.get_mut(id) else {
            warn!(%id, "pointer entered an unknown notification");
            return;
        };
        if entry.paused || entry.is_closing() {
            return;
        }
        entry.cancel_timer();
        entry.paused = true;
        debug!(%id, "countdown paused");
    }

    /// Resuming restarts the full timeout, not the time left at pause.
    pub fn resume(&mut self, id: &NotificationId) {
        let Some(entry) = self.state.get_mut(id) else {
            warn!(%id, "pointer left an unknown notification");
            return;
        };
        if !entry.paused || entry.is_closing() {
            return;
        }
        entry.paused = false;
        debug!(%id, "countdown resumed");
        self.start_countdown(id);
    }

    /// Apply a content height reported by the surface and reposition the stack.
    ///
    /// The first report reveals the surface, which slides in from the right edge.
    pub fn resize(&mut self, id: &NotificationId, reported: f64) {
        let clamped = self.layout.clamp_height(reported);
        let Some(entry) = self.state.get_mut(id) else {
            warn!(%id, "resize for an unknown notification");
            return;
        };
        if entry.is_closing() {
            trace!(%id, "ignoring resize of a closing notification");
            return;
        }

        let height = clamped.unwrap_or_else(|| {
            error!(%id, reported, height = entry.height, "non-finite height, keeping last");
            entry.height
        });
        let changed = entry.height != height;
        let was_visible = entry.visible;
        let width = entry.width;
        entry.height = height;
        entry.visible = true;

        self.send(SurfaceCommand::Resize {
            id: id.clone(),
            width,
            height,
        });

        let targets = self.targets();
        let Some(target) = targets.get(id) else {
            return;
        };
        if let Some(entry) = self.state.get_mut(id) {
            entry.position = target;
        }

        let animation = &self.config.notification.animation;
        let slide_in = Duration::from_millis(animation.duration);
        let restack = Duration::from_millis(animation.re_stack_duration);

        if !was_visible {
            let start = Point::new(self.layout.offscreen_x(), target.y);
            self.transitions.track(id, start);
            self.send(SurfaceCommand::Show {
                id: id.clone(),
                bounds: Bounds {
                    x: start.x,
                    y: start.y,
                    width,
                    height,
                },
            });
            self.transitions.animate(id, target, slide_in);
            if changed {
                self.relayout(Some(id));
            }
        } else if changed {
            self.transitions.animate(id, target, restack);
            self.relayout(Some(id));
        } else if self.transitions.position(id) != Some(target) {
            self.transitions.animate(id, target, restack);
        }
    }

    /// Start closing. A second request for the same notification does nothing.
    pub fn close(&mut self, id: &NotificationId) {
        let Some(entry) = self.state.get_mut(id) else {
            warn!(%id, "close requested for an unknown notification");
            return;
        };
        if entry.is_closing() {
            debug!(%id, "already closing");
            return;
        }
        entry.status = Status::Closing;
        entry.paused = false;
        entry.cancel_timer();
        let from = entry.position;

        self.send(SurfaceCommand::Close { id: id.clone() });

        let duration = Duration::from_millis(self.config.notification.animation.duration);
        let current = self.transitions.position(id).unwrap_or(from);
        let offscreen = Point::new(self.layout.offscreen_x(), current.y);
        self.transitions.animate(id, offscreen, duration / 2);

        let tx = self.tx.clone();
        let finished = id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if tx.send(Input::CloseFinished(finished)).await.is_err() {
                trace!("orchestrator gone before close finished");
            }
        });
        debug!(%id, "closing");
    }

    /// Destroy the surface, restack the rest, and promote from the queue.
    pub fn finish_close(&mut self, id: &NotificationId) {
        let Some(mut entry) = self.state.remove_active(id) else {
            warn!(%id, "close finished for an unknown notification");
            return;
        };
        entry.cancel_timer();
        self.transitions.forget(id);
        self.send(SurfaceCommand::Destroy { id: id.clone() });
        debug!(%id, shown = ?entry.notification.duration_since(), "removed");

        self.relayout(None);

        while self.has_free_slot() {
            let Some(next) = self.state.dequeue() else {
                break;
            };
            debug!(id = %next.id, "promoting queued notification");
            self.activate(next);
        }
    }

    /// Move every stacked surface except `skip` to its computed slot.
    fn relayout(&mut self, skip: Option<&NotificationId>) {
        let targets = self.targets();
        let restack = Duration::from_millis(self.config.notification.animation.re_stack_duration);

        for (id, target) in targets.iter() {
            if Some(id) == skip {
                continue;
            }
            let Some(entry) = self.state.get_mut(id) else {
                continue;
            };
            entry.position = target;
            if !entry.visible {
                continue;
            }
            if self.transitions.position(id) != Some(target) {
                self.transitions.animate(id, target, restack);
            }
        }
    }

    fn targets(&self) -> StackLayout {
        self.layout.stack(self.state.stacked().map(|e| StackItem {
            id: e.id(),
            width: e.width,
            height: e.height,
        }))
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        let resolved = self.resolved_theme();
        info!(?theme, ?resolved, "theme changed");

        let ids: Vec<_> = self.state.stacked().map(|e| e.id().clone()).collect();
        for id in ids {
            self.send(SurfaceCommand::SetTheme {
                id,
                theme: resolved,
            });
        }
    }

    /// Bring every surface to the front, on request of a secondary invocation.
    pub fn raise_all(&mut self) {
        let ids: Vec<_> = self.state.stacked().map(|e| e.id().clone()).collect();
        debug!(count = ids.len(), "raising surfaces");
        for id in ids {
            self.send(SurfaceCommand::Raise { id });
        }
    }

    fn resolved_theme(&self) -> ResolvedTheme {
        // The headless host reports no dark-mode preference.
        ResolvedTheme::resolve(self.theme, None)
    }

    fn send(&self, command: SurfaceCommand) {
        if let Err(err) = self.surfaces.send(command) {
            error!(id = %err.0.id(), "Surface host is gone, dropping {:?}", err.0);
        }
    }
}
