//! Stacking layout for active notifications.
//!
//! Surfaces are right-aligned and stacked top to bottom in admission order.
//! All functions here are pure; [`transition`] moves surfaces to the computed slots.

pub mod transition;

use nova_notifications_config::{NotificationsConfig, WorkArea};
use nova_notifications_util::{NotificationId, Point};

use crate::constants::INITIAL_SURFACE_HEIGHT;

/// Geometry inputs of the layout, copied out of the configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    pub area: WorkArea,
    pub margin_top: u32,
    pub margin_right: u32,
    pub spacing: u32,
    pub min_height: u32,
    pub max_width_ratio: f64,
    pub max_height_ratio: f64,
}

/// One member of the stack, in stack order
#[derive(Debug, Clone, Copy)]
pub struct StackItem<'a> {
    pub id: &'a NotificationId,
    pub width: u32,
    pub height: u32,
}

/// Target position of every stacked surface, in stack order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackLayout {
    slots: Vec<(NotificationId, Point)>,
}

impl StackLayout {
    pub fn get(&self, id: &NotificationId) -> Option<Point> {
        self.slots
            .iter()
            .find_map(|(slot_id, point)| (slot_id == id).then_some(*point))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NotificationId, Point)> {
        self.slots.iter().map(|(id, point)| (id, *point))
    }
}

impl LayoutParams {
    pub fn from_config(config: &NotificationsConfig) -> Self {
        let n = &config.notification;
        Self {
            area: config.display.work_area,
            margin_top: n.margin_top,
            margin_right: n.margin_right,
            spacing: n.spacing,
            min_height: n.min_height,
            max_width_ratio: n.max_width_ratio,
            max_height_ratio: n.max_height_ratio,
        }
    }

    /// Width given to every surface at admission.
    pub fn surface_width(&self) -> u32 {
        floor_ratio(self.area.width, self.max_width_ratio)
    }

    pub fn max_height(&self) -> u32 {
        floor_ratio(self.area.height, self.max_height_ratio)
    }

    /// Clamp a reported content height to `[min_height, max_height]`.
    ///
    /// Returns `None` for non-finite input; callers keep the last good height.
    pub fn clamp_height(&self, reported: f64) -> Option<u32> {
        if !reported.is_finite() {
            return None;
        }
        let clamped = reported.round().max(f64::from(self.min_height));
        Some((clamped as u32).min(self.max_height()))
    }

    /// Right-aligned x of a surface of the given width.
    pub fn target_x(&self, width: u32) -> i32 {
        let x = i64::from(self.area.width) - i64::from(width) - i64::from(self.margin_right);
        saturate(x)
    }

    /// x just past the right edge of the work area, where surfaces enter from and leave to.
    pub fn offscreen_x(&self) -> i32 {
        saturate(i64::from(self.area.width))
    }

    /// y of the first slot.
    pub fn top(&self) -> i32 {
        saturate(i64::from(self.margin_top) + i64::from(self.area.y))
    }

    /// Compute every slot of the stack.
    ///
    /// The i-th item lands at `marginTop + area.y + Σ_{j<i}(height_j + spacing)`.
    pub fn stack<'a, I>(&self, items: I) -> StackLayout
    where
        I: IntoIterator<Item = StackItem<'a>>,
    {
        let mut y = i64::from(self.top());
        let slots = items
            .into_iter()
            .map(|item| {
                let height = if item.height == 0 {
                    tracing::error!(id = %item.id, "zero height in layout, using default");
                    INITIAL_SURFACE_HEIGHT
                } else {
                    item.height
                };
                let point = Point::new(self.target_x(item.width), saturate(y));
                y += i64::from(height) + i64::from(self.spacing);
                (item.id.clone(), point)
            })
            .collect();

        StackLayout { slots }
    }
}

fn floor_ratio(length: u32, ratio: f64) -> u32 {
    let value = (f64::from(length) * ratio).floor();
    if value.is_finite() && value > 0.0 {
        value.min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

fn saturate(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> LayoutParams {
        LayoutParams::from_config(&NotificationsConfig::default())
    }

    fn ids(n: usize) -> Vec<NotificationId> {
        (0..n).map(|i| NotificationId::from(format!("n{i}").as_str())).collect()
    }

    #[test]
    fn test_surface_width_is_floored() {
        let mut p = params();
        assert_eq!(p.surface_width(), 384);

        p.area.width = 1366;
        assert_eq!(p.surface_width(), 273);
    }

    #[test]
    fn test_clamp_height_to_ratio() {
        let mut p = params();
        p.area.height = 1000;
        p.max_height_ratio = 0.33;

        assert_eq!(p.clamp_height(500.0), Some(330));
        assert_eq!(p.clamp_height(120.0), Some(120));
        assert_eq!(p.clamp_height(5.0), Some(30));
        assert_eq!(p.clamp_height(-40.0), Some(30));
    }

    #[test]
    fn test_clamp_height_rejects_non_finite() {
        let p = params();
        assert_eq!(p.clamp_height(f64::NAN), None);
        assert_eq!(p.clamp_height(f64::INFINITY), None);
    }

    #[test]
    fn test_target_x_is_right_aligned() {
        let p = params();
        assert_eq!(p.target_x(384), 1920 - 384 - 10);
        assert_eq!(p.offscreen_x(), 1920);
    }

    #[test]
    fn test_stack_positions() {
        let p = params();
        let ids = ids(3);
        let heights = [100, 250, 40];
        let layout = p.stack(ids.iter().zip(heights).map(|(id, height)| StackItem {
            id,
            width: 384,
            height,
        }));

        assert_eq!(layout.iter().count(), 3);
        assert_eq!(layout.get(&ids[0]), Some(Point::new(1526, 10)));
        assert_eq!(layout.get(&ids[1]), Some(Point::new(1526, 10 + 100 + 10)));
        assert_eq!(layout.get(&ids[2]), Some(Point::new(1526, 10 + 110 + 250 + 10)));
    }

    #[test]
    fn test_stack_includes_work_area_origin() {
        let mut p = params();
        p.area.y = 32;
        let ids = ids(2);
        let layout = p.stack(ids.iter().map(|id| StackItem {
            id,
            width: 384,
            height: 50,
        }));

        assert_eq!(layout.get(&ids[0]).map(|pt| pt.y), Some(42));
        assert_eq!(layout.get(&ids[1]).map(|pt| pt.y), Some(102));
    }

    #[test]
    fn test_stack_never_overlaps() {
        let p = params();
        let ids = ids(6);
        let heights = [30, 356, 31, 100, 77, 200];
        let layout = p.stack(ids.iter().zip(heights).map(|(id, height)| StackItem {
            id,
            width: 384,
            height,
        }));

        let ys: Vec<_> = layout.iter().map(|(_, pt)| pt.y).collect();
        for (i, pair) in ys.windows(2).enumerate() {
            assert!(pair[0] + heights[i] as i32 + p.spacing as i32 <= pair[1]);
        }
    }

    #[test]
    fn test_empty_stack() {
        let layout = params().stack(std::iter::empty());
        assert_eq!(layout, StackLayout::default());
        assert_eq!(layout.get(&NotificationId::from("x")), None);
    }
}
