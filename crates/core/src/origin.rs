//! Single-threaded execution context for front-end visible deliveries.
//!
//! Command results and event deliveries handed to callbacks are posted here,
//! so the front end observes them in order and from one thread only.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Handle to the origin thread. Cloning is cheap; the thread exits once
/// every handle has been dropped and the queue is drained.
#[derive(Clone)]
pub struct OriginContext {
    tx: mpsc::UnboundedSender<Task>,
}

impl OriginContext {
    /// Start a dedicated, named origin thread.
    pub fn start(name: &str) -> Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
        let thread_name = name.to_string();

        thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                while let Some(task) = rx.blocking_recv() {
                    if catch_unwind(AssertUnwindSafe(task)).is_err() {
                        error!("Task panicked on origin context '{}'", thread_name);
                    }
                }
                debug!("Origin context '{}' stopped", thread_name);
            })?;

        Ok(Self { tx })
    }

    /// Queue `task` to run on the origin thread.
    ///
    /// Returns false if the origin thread is gone.
    pub fn post<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx.send(Box::new(task)).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    #[test]
    fn test_tasks_run_in_order_on_named_thread() {
        let origin = OriginContext::start("origin-test").unwrap();
        let (tx, rx) = std_mpsc::channel();

        for i in 0..5 {
            let tx = tx.clone();
            assert!(origin.post(move || {
                let name = thread::current().name().map(str::to_string);
                tx.send((i, name)).unwrap();
            }));
        }

        for expected in 0..5 {
            let (i, name) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(i, expected);
            assert_eq!(name.as_deref(), Some("origin-test"));
        }
    }

    #[test]
    fn test_panicking_task_does_not_stop_context() {
        let origin = OriginContext::start("origin-panic").unwrap();
        let (tx, rx) = std_mpsc::channel();

        origin.post(|| panic!("boom"));
        origin.post(move || tx.send("still alive").unwrap());

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            "still alive"
        );
    }
}
