//! Recurring task capability provided by the host.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Callback run on every tick of a recurring task.
pub type TaskCallback = Arc<dyn Fn() + Send + Sync>;

/// Host timer infrastructure.
///
/// Tick timing does not need to be exact: the scheduler re-derives whether a
/// check is due on every call.
pub trait TaskScheduler: Send + Sync {
    /// Register a named recurring task, replacing any task with that name.
    ///
    /// The callback must not be invoked from within this call.
    fn schedule_recurring(&self, name: &str, interval: Duration, callback: TaskCallback);

    /// De-register a named task. Unknown names are ignored.
    fn cancel_recurring(&self, name: &str);

    /// Whether a task with this name is registered.
    fn is_scheduled(&self, name: &str) -> bool;
}

struct ScheduledTask {
    interval: Duration,
    callback: TaskCallback,
}

/// Task registry whose ticks are driven explicitly by the host.
///
/// Suits hosts with their own event loop or cron hook: call
/// [`ManualTaskScheduler::fire_all`] from it.
#[derive(Default)]
pub struct ManualTaskScheduler {
    tasks: Mutex<BTreeMap<String, ScheduledTask>>,
}

impl ManualTaskScheduler {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one tick of a task. Returns false if it isn't registered.
    pub fn fire(&self, name: &str) -> bool {
        // Clone out so the callback can re-enter the registry
        let callback = self.tasks.lock().get(name).map(|t| t.callback.clone());
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Run one tick of every registered task. Returns how many ran.
    pub fn fire_all(&self) -> usize {
        let callbacks: Vec<TaskCallback> = self
            .tasks
            .lock()
            .values()
            .map(|t| t.callback.clone())
            .collect();
        for callback in &callbacks {
            callback();
        }
        callbacks.len()
    }

    /// Interval a task was registered with.
    pub fn interval(&self, name: &str) -> Option<Duration> {
        self.tasks.lock().get(name).map(|t| t.interval)
    }

    /// Names of registered tasks.
    pub fn names(&self) -> Vec<String> {
        self.tasks.lock().keys().cloned().collect()
    }
}

impl TaskScheduler for ManualTaskScheduler {
    fn schedule_recurring(&self, name: &str, interval: Duration, callback: TaskCallback) {
        self.tasks
            .lock()
            .insert(name.to_string(), ScheduledTask { interval, callback });
    }

    fn cancel_recurring(&self, name: &str) {
        self.tasks.lock().remove(name);
    }

    fn is_scheduled(&self, name: &str) -> bool {
        self.tasks.lock().contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, TaskCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (count, Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn test_schedule_fire_cancel() {
        let timer = ManualTaskScheduler::new();
        let (count, callback) = counter();

        timer.schedule_recurring("check", Duration::from_secs(3600), callback);
        assert!(timer.is_scheduled("check"));
        assert_eq!(timer.interval("check"), Some(Duration::from_secs(3600)));

        assert!(timer.fire("check"));
        assert!(timer.fire("check"));
        assert_eq!(count.load(Ordering::SeqCst), 2);

        timer.cancel_recurring("check");
        assert!(!timer.is_scheduled("check"));
        assert!(!timer.fire("check"));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fire_all() {
        let timer = ManualTaskScheduler::new();
        let (a, cb_a) = counter();
        let (b, cb_b) = counter();
        timer.schedule_recurring("a", Duration::from_secs(1), cb_a);
        timer.schedule_recurring("b", Duration::from_secs(1), cb_b);

        assert_eq!(timer.fire_all(), 2);
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
        assert_eq!(timer.names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_callback_may_cancel_itself() {
        let timer = Arc::new(ManualTaskScheduler::new());
        let t = Arc::downgrade(&timer);
        timer.schedule_recurring(
            "once",
            Duration::from_secs(1),
            Arc::new(move || {
                if let Some(t) = t.upgrade() {
                    t.cancel_recurring("once");
                }
            }),
        );

        assert!(timer.fire("once"));
        assert!(!timer.is_scheduled("once"));
    }
}
