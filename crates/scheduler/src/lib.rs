//! Session scheduling primitives for the viewer.
//!
//! The viewer is single-threaded and cooperative: all deferred work (the
//! open-to-fetch delay, scrub retries) is queued against an explicit session
//! clock and drained by the controller's `tick`. This crate provides the two
//! building blocks: a deadline-ordered [`TimerQueue`] and a shared
//! [`CancellationToken`] for synchronous teardown.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use vellum_scheduler::TimerQueue;
//!
//! let mut timers: TimerQueue<&str> = TimerQueue::new();
//! timers.schedule(Duration::from_millis(100), "begin-fetch");
//! timers.schedule(Duration::from_millis(50), "scrub-pass");
//!
//! let due = timers.due(Duration::from_millis(60));
//! assert_eq!(due.len(), 1);
//! assert_eq!(due[0].payload, "scrub-pass");
//! assert_eq!(timers.len(), 1);
//! ```

mod cancel;
mod timer;

pub use cancel::CancellationToken;
pub use timer::{JobId, Scheduled, TimerQueue};
