use nova_notifications_util::{Notification, NotificationId, Point, Status};
use std::collections::VecDeque;
use tokio::task::AbortHandle;

use crate::constants::*;

/// An outstanding countdown for one active notification
#[derive(Debug)]
pub struct Countdown {
    pub epoch: u64,
    pub handle: AbortHandle,
}

/// A notification occupying a stack slot
#[derive(Debug)]
pub struct ActiveEntry {
    pub notification: Notification,
    pub status: Status,
    /// Clamped surface height
    pub height: u32,
    /// Fixed at admission
    pub width: u32,
    /// Last target position handed to the transition scheduler
    pub position: Point,
    /// False until the surface reports its first content height
    pub visible: bool,
    pub paused: bool,
    /// Bumped every time a countdown starts, so stale expirations can be told apart
    pub epoch: u64,
    pub timer: Option<Countdown>,
}

impl ActiveEntry {
    pub fn new(notification: Notification, width: u32, height: u32, position: Point) -> Self {
        Self {
            notification,
            status: Status::Active,
            height,
            width,
            position,
            visible: false,
            paused: false,
            epoch: 0,
            timer: None,
        }
    }

    pub fn id(&self) -> &NotificationId {
        &self.notification.id
    }

    pub fn is_closing(&self) -> bool {
        self.status == Status::Closing
    }

    /// Abort the outstanding countdown, returning whether there was one
    pub fn cancel_timer(&mut self) -> bool {
        match self.timer.take() {
            Some(countdown) => {
                countdown.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Whether `epoch` identifies the countdown currently owned by this entry
    pub fn owns_epoch(&self, epoch: u64) -> bool {
        self.timer.as_ref().is_some_and(|c| c.epoch == epoch)
    }
}

/// Manages the active stack and the overflow queue
///
/// Active entries are kept in admission order, which is also stack order.
/// The queue is FIFO and optionally bounded; when full, the oldest entry is evicted.
pub struct NotificationState {
    active: Vec<ActiveEntry>,
    queued: VecDeque<Notification>,
    /// Zero means unbounded
    max_queued: usize,
}

impl NotificationState {
    pub fn new(max_queued: usize) -> Self {
        Self {
            active: Vec::with_capacity(INITIAL_ACTIVE_CAPACITY),
            queued: VecDeque::new(),
            max_queued,
        }
    }

    pub fn queued(&self) -> &VecDeque<Notification> {
        &self.queued
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Entries holding a stack slot, i.e. not closing, in stack order
    pub fn stacked(&self) -> impl Iterator<Item = &ActiveEntry> {
        self.active.iter().filter(|e| !e.is_closing())
    }

    pub fn occupied(&self) -> usize {
        self.stacked().count()
    }

    pub fn get(&self, id: &NotificationId) -> Option<&ActiveEntry> {
        self.active.iter().find(|e| e.id() == id)
    }

    pub fn get_mut(&mut self, id: &NotificationId) -> Option<&mut ActiveEntry> {
        self.active.iter_mut().find(|e| e.id() == id)
    }

    pub fn status(&self, id: &NotificationId) -> Option<Status> {
        self.get(id).map(|e| e.status).or_else(|| {
            self.queued
                .iter()
                .any(|n| &n.id == id)
                .then_some(Status::Queued)
        })
    }

    pub fn push_active(&mut self, entry: ActiveEntry) {
        self.active.push(entry);
    }

    /// Append to the queue, returning the entry evicted to make room, if any
    pub fn enqueue(&mut self, notification: Notification) -> Option<Notification> {
        let evicted = if self.max_queued > 0 && self.queued.len() >= self.max_queued {
            self.queued.pop_front()
        } else {
            None
        };
        self.queued.push_back(notification);
        evicted
    }

    pub fn dequeue(&mut self) -> Option<Notification> {
        self.queued.pop_front()
    }

    pub fn remove_active(&mut self, id: &NotificationId) -> Option<ActiveEntry> {
        let pos = self.active.iter().position(|e| e.id() == id)?;
        let entry = self.active.remove(pos);

        if self.active.is_empty() {
            self.active.shrink_to(INITIAL_ACTIVE_CAPACITY);
        }

        Some(entry)
    }
}

impl Default for NotificationState {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nova_notifications_util::NewNotification;

    fn notification(title: &str) -> Notification {
        NewNotification::local(title, "body").admit(5000)
    }

    fn entry(title: &str) -> ActiveEntry {
        ActiveEntry::new(notification(title), 384, 100, Point::default())
    }

    #[test]
    fn test_queue_is_fifo() {
        let mut state = NotificationState::new(0);
        let a = notification("a");
        let b = notification("b");
        let c = notification("c");
        state.enqueue(a.clone());
        state.enqueue(b.clone());
        state.enqueue(c.clone());

        assert_eq!(state.dequeue(), Some(a));
        assert_eq!(state.dequeue(), Some(b));
        assert_eq!(state.dequeue(), Some(c));
        assert_eq!(state.dequeue(), None);
    }

    #[test]
    fn test_bounded_queue_evicts_oldest() {
        let mut state = NotificationState::new(2);
        let a = notification("a");
        let b = notification("b");
        let c = notification("c");

        assert_eq!(state.enqueue(a.clone()), None);
        assert_eq!(state.enqueue(b.clone()), None);
        assert_eq!(state.enqueue(c.clone()), Some(a));

        let titles: Vec<_> = state.queued().iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, ["b", "c"]);
    }

    #[test]
    fn test_unbounded_queue_never_evicts() {
        let mut state = NotificationState::new(0);
        for i in 0..500 {
            assert_eq!(state.enqueue(notification(&i.to_string())), None);
        }
        assert_eq!(state.queued().len(), 500);
    }

    #[test]
    fn test_remove_active_preserves_order() {
        let mut state = NotificationState::default();
        let first = entry("first");
        let second = entry("second");
        let third = entry("third");
        let second_id = second.id().clone();
        state.push_active(first);
        state.push_active(second);
        state.push_active(third);

        assert!(state.remove_active(&second_id).is_some());
        assert!(state.remove_active(&second_id).is_none());

        let titles: Vec<_> = state
            .stacked()
            .map(|e| e.notification.title.as_str())
            .collect();
        assert_eq!(titles, ["first", "third"]);
    }

    #[test]
    fn test_status_lookup() {
        let mut state = NotificationState::default();
        let active = entry("active");
        let active_id = active.id().clone();
        let queued = notification("queued");
        let queued_id = queued.id.clone();
        state.push_active(active);
        state.enqueue(queued);

        assert_eq!(state.status(&active_id), Some(Status::Active));
        assert_eq!(state.status(&queued_id), Some(Status::Queued));
        assert_eq!(state.status(&NotificationId::from("missing")), None);

        if let Some(e) = state.get_mut(&active_id) {
            e.status = Status::Closing;
        }
        assert_eq!(state.status(&active_id), Some(Status::Closing));
        assert_eq!(state.occupied(), 0);
        assert_eq!(state.active_count(), 1);
    }

    #[test]
    fn test_entry_without_timer() {
        let mut e = entry("idle");
        assert!(!e.cancel_timer());
        assert!(!e.owns_epoch(0));
    }
}
