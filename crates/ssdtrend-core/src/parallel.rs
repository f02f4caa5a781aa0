//! Bounded worker layer with per-task deadlines.
//!
//! Each task runs on its own detached thread, at most `workers` at a time.
//! A task that misses its deadline is reported as `None` and its thread is
//! abandoned, so a hung task costs a thread but never blocks the caller.

use std::collections::{HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::DEFAULT_PARALLEL_TIMEOUT_SECS;

/// Order of the returned outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultOrder {
    /// Input order.
    #[default]
    InOrder,
    /// Completion order; timeouts last.
    AnyOrder,
}

#[derive(Debug, Clone)]
pub struct ParallelOptions {
    pub workers: usize,
    /// Deadline of each task, counted from its start.
    pub timeout: Duration,
    pub ordering: ResultOrder,
}

impl Default for ParallelOptions {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            timeout: Duration::from_secs(DEFAULT_PARALLEL_TIMEOUT_SECS),
            ordering: ResultOrder::InOrder,
        }
    }
}

/// Result of one task; `value` is `None` on timeout or panic.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome<R> {
    pub index: usize,
    pub value: Option<R>,
}

/// Run `task` over `items`.
pub fn run_parallel<T, R, F>(items: Vec<T>, task: F, options: &ParallelOptions) -> Vec<TaskOutcome<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> R + Send + Sync + 'static,
{
    let total = items.len();
    let workers = options.workers.max(1);
    let task = Arc::new(task);
    let (tx, rx) = mpsc::channel::<(usize, Option<R>)>();

    let mut pending: VecDeque<(usize, T)> = items.into_iter().enumerate().collect();
    let mut running: HashMap<usize, Instant> = HashMap::new();
    let mut done: Vec<TaskOutcome<R>> = Vec::with_capacity(total);

    while done.len() < total {
        while running.len() < workers {
            let Some((index, item)) = pending.pop_front() else {
                break;
            };
            let task = Arc::clone(&task);
            let tx = tx.clone();
            running.insert(index, Instant::now() + options.timeout);
            // Detached: a hung task must not hold up the caller.
            thread::spawn(move || {
                let value = catch_unwind(AssertUnwindSafe(|| (*task)(item))).ok();
                let _ = tx.send((index, value));
            });
        }

        let Some(&nearest) = running.values().min() else {
            break;
        };
        let wait = nearest.saturating_duration_since(Instant::now());
        match rx.recv_timeout(wait) {
            Ok((index, value)) => {
                // Late results of abandoned tasks are dropped.
                if running.remove(&index).is_some() {
                    if value.is_none() {
                        log::error!("task {index} panicked");
                    }
                    done.push(TaskOutcome { index, value });
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                let now = Instant::now();
                let expired: Vec<usize> = running
                    .iter()
                    .filter(|(_, deadline)| **deadline <= now)
                    .map(|(&i, _)| i)
                    .collect();
                for index in expired {
                    running.remove(&index);
                    log::warn!("task {index} exceeded {:?}, abandoned", options.timeout);
                    done.push(TaskOutcome { index, value: None });
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    match options.ordering {
        ResultOrder::InOrder => done.sort_by_key(|o| o.index),
        ResultOrder::AnyOrder => {
            // Stable: completed tasks keep their completion order.
            done.sort_by_key(|o| o.value.is_none());
        }
    }
    done
}
