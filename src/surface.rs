//! Headless presentation host.
//!
//! Stands in for a real renderer: every command is logged, and each created
//! surface reports a content height estimated from its text so the engine can
//! lay it out. A graphical host consumes the same commands and sends the same events.

use nova_notifications_util::{SurfaceCommand, SurfaceEvent};
use tokio::sync::mpsc::{Sender, UnboundedReceiver};
use tracing::{debug, info, trace};

use crate::handlers::messages::Input;

const LINE_HEIGHT: f64 = 20.0;
const TITLE_HEIGHT: f64 = 28.0;
const PADDING: f64 = 24.0;

/// Rendered height of a one-line title above `content`.
pub fn estimate_height(content: &str) -> f64 {
    let lines = content.lines().count().max(1);
    TITLE_HEIGHT + PADDING + LINE_HEIGHT * lines as f64
}

pub struct HeadlessHost {
    commands: UnboundedReceiver<SurfaceCommand>,
    events: Sender<Input>,
}

impl HeadlessHost {
    pub fn new(commands: UnboundedReceiver<SurfaceCommand>, events: Sender<Input>) -> Self {
        Self { commands, events }
    }

    pub async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            if let Some(event) = self.apply(command) {
                if self.events.send(Input::Surface(event)).await.is_err() {
                    break;
                }
            }
        }
        debug!("surface host stopped");
    }

    fn apply(&self, command: SurfaceCommand) -> Option<SurfaceEvent> {
        match command {
            SurfaceCommand::Create {
                id,
                title,
                content,
                timeout_ms,
                theme,
                bounds,
            } => {
                info!(%id, ?theme, timeout_ms, "{title}: {content}");
                trace!(%id, origin = ?bounds.origin(), width = bounds.width, "surface created");
                Some(SurfaceEvent::Resized {
                    height: estimate_height(&content),
                    id,
                })
            }
            SurfaceCommand::Move { id, position } => {
                trace!(%id, x = position.x, y = position.y, "move");
                None
            }
            SurfaceCommand::Show { id, bounds } => {
                debug!(%id, ?bounds, "show");
                None
            }
            SurfaceCommand::Resize { id, width, height } => {
                debug!(%id, width, height, "resize");
                None
            }
            SurfaceCommand::SetTheme { id, theme } => {
                debug!(%id, ?theme, "theme");
                None
            }
            SurfaceCommand::Raise { id } => {
                debug!(%id, "raise");
                None
            }
            SurfaceCommand::Close { id } => {
                debug!(%id, "close");
                None
            }
            SurfaceCommand::Destroy { id } => {
                debug!(%id, "destroy");
                None
            }
        }
    }
}
