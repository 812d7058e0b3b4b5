//! Messages exchanged between the engine and the presentation surfaces.
//!
//! Each active notification owns one surface. The engine drives surfaces with
//! [`SurfaceCommand`]s and surfaces report user interaction back with
//! [`SurfaceEvent`]s.

use serde::{Deserialize, Serialize};

use crate::{NotificationId, Theme};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedTheme {
    Light,
    Dark,
}

impl ResolvedTheme {
    /// Resolve `System` using the host's dark-mode preference, `Light` if unknown.
    pub fn resolve(theme: Theme, prefers_dark: Option<bool>) -> Self {
        match theme {
            Theme::Light => Self::Light,
            Theme::Dark => Self::Dark,
            Theme::System if prefers_dark == Some(true) => Self::Dark,
            Theme::System => Self::Light,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Engine to surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SurfaceCommand {
    /// Create a hidden surface. It becomes visible on its first [`SurfaceCommand::Show`].
    Create {
        id: NotificationId,
        title: String,
        content: String,
        timeout_ms: u64,
        theme: ResolvedTheme,
        bounds: Bounds,
    },
    Show { id: NotificationId, bounds: Bounds },
    Resize { id: NotificationId, width: u32, height: u32 },
    Move { id: NotificationId, position: Point },
    SetTheme { id: NotificationId, theme: ResolvedTheme },
    /// Bring the surface to the front.
    Raise { id: NotificationId },
    /// Start the surface's own closing effect.
    Close { id: NotificationId },
    Destroy { id: NotificationId },
}

impl SurfaceCommand {
    pub fn id(&self) -> &NotificationId {
        match self {
            Self::Create { id, .. }
            | Self::Show { id, .. }
            | Self::Resize { id, .. }
            | Self::Move { id, .. }
            | Self::SetTheme { id, .. }
            | Self::Raise { id }
            | Self::Close { id }
            | Self::Destroy { id } => id,
        }
    }
}

/// Surface to engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SurfaceEvent {
    PointerEnter(NotificationId),
    PointerLeave(NotificationId),
    /// The rendered content height, before clamping.
    Resized { id: NotificationId, height: f64 },
    ManualCloseRequested(NotificationId),
}

impl SurfaceEvent {
    pub fn id(&self) -> &NotificationId {
        match self {
            Self::PointerEnter(id)
            | Self::PointerLeave(id)
            | Self::Resized { id, .. }
            | Self::ManualCloseRequested(id) => id,
        }
    }
}
