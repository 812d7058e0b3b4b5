use nova_notifications_util::{NotificationId, Point, SurfaceCommand};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc::UnboundedSender, watch},
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, trace};

use crate::constants::{FRAME_INTERVAL, MIN_TRANSITION};

/// Cubic ease-out: fast start, gentle landing.
pub fn ease_out_cubic(progress: f64) -> f64 {
    1.0 - (1.0 - progress).powi(3)
}

struct Track {
    position: Arc<watch::Sender<Point>>,
    cancel: CancellationToken,
}

/// Animates surfaces between positions.
///
/// Each surface has at most one animation task. Starting a transition cancels the
/// surface's previous token first, so a superseded task stops before its next frame.
pub struct TransitionScheduler {
    surfaces: UnboundedSender<SurfaceCommand>,
    tracks: HashMap<NotificationId, Track>,
}

impl TransitionScheduler {
    pub fn new(surfaces: UnboundedSender<SurfaceCommand>) -> Self {
        Self {
            surfaces,
            tracks: HashMap::new(),
        }
    }

    /// Last position written to the surface.
    pub fn position(&self, id: &NotificationId) -> Option<Point> {
        self.tracks.get(id).map(|t| *t.position.borrow())
    }

    /// Record where a surface currently is without moving it.
    pub fn track(&mut self, id: &NotificationId, at: Point) {
        let track = self.supersede(id, at);
        track.position.send_replace(at);
    }

    /// Animate from the current position to `to` over `duration`.
    pub fn animate(&mut self, id: &NotificationId, to: Point, duration: Duration) {
        let track = self.supersede(id, to);
        let from = *track.position.borrow();

        let transition = Transition {
            id: id.clone(),
            from,
            to,
            duration: duration.max(MIN_TRANSITION),
        };
        let cancel = track.cancel.clone();
        let position = track.position.clone();
        let surfaces = self.surfaces.clone();

        trace!(%id, ?from, ?to, ?duration, "starting transition");
        tokio::spawn(transition.run(cancel, position, surfaces));
    }

    /// Stop animating a surface and drop its state.
    pub fn forget(&mut self, id: &NotificationId) {
        if let Some(track) = self.tracks.remove(id) {
            track.cancel.cancel();
        }
    }

    /// Cancel the current token of `id` and install a fresh one.
    fn supersede(&mut self, id: &NotificationId, initial: Point) -> &mut Track {
        let track = self.tracks.entry(id.clone()).or_insert_with(|| Track {
            position: Arc::new(watch::Sender::new(initial)),
            cancel: CancellationToken::new(),
        });
        track.cancel.cancel();
        track.cancel = CancellationToken::new();
        track
    }
}

impl Drop for TransitionScheduler {
    fn drop(&mut self) {
        for track in self.tracks.values() {
            track.cancel.cancel();
        }
    }
}

struct Transition {
    id: NotificationId,
    from: Point,
    to: Point,
    duration: Duration,
}

impl Transition {
    async fn run(
        self,
        cancel: CancellationToken,
        position: Arc<watch::Sender<Point>>,
        surfaces: UnboundedSender<SurfaceCommand>,
    ) {
        let started = Instant::now();
        let mut frames = tokio::time::interval(FRAME_INTERVAL);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last = self.from;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = frames.tick() => {}
            }

            let progress = started.elapsed().as_secs_f64() / self.duration.as_secs_f64();
            let progress = progress.min(1.0);
            let point = self.frame(progress).unwrap_or_else(|| {
                error!(id = %self.id, progress, "invalid animation frame, snapping to target");
                self.to
            });

            if point != last {
                position.send_replace(point);
                if surfaces
                    .send(SurfaceCommand::Move {
                        id: self.id.clone(),
                        position: point,
                    })
                    .is_err()
                {
                    return;
                }
                last = point;
            }

            if point == self.to || progress >= 1.0 {
                return;
            }
        }
    }

    /// Interpolated position at `progress`, or `None` if the arithmetic went non-finite.
    fn frame(&self, progress: f64) -> Option<Point> {
        let eased = ease_out_cubic(progress);
        let x = lerp(self.from.x, self.to.x, eased);
        let y = lerp(self.from.y, self.to.y, eased);
        if !(eased.is_finite() && x.is_finite() && y.is_finite()) {
            return None;
        }
        Some(Point::new(x.round() as i32, y.round() as i32))
    }
}

fn lerp(from: i32, to: i32, t: f64) -> f64 {
    f64::from(from) + (f64::from(to) - f64::from(from)) * t
}
