//! Worker tasks with cooperative cancellation
//!
//! Every long running operation (a playback loop, a plugin run) gets one
//! dedicated thread wrapped in a [`WorkerTask`]. The worker polls its
//! [`TaskContext`]; the owner stops it with a bounded, escalating shutdown:
//!
//! ```text
//!   stop(timeout)
//!     │ 1. cancel flag               ── wait(timeout) ──► Finished
//!     │ 2. interrupt flag + unpark   ── repeated waits ─► Finished
//!     ▼ 3. detach the thread, log an error                Detached
//! ```
//!
//! Rust cannot kill a thread, so the last tier leaves it running on its own
//! and forgets about it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError};

/// Sleep per `should_stop` poll while the task is paused
pub const DEFAULT_PAUSE_SLEEP: Duration = Duration::from_millis(100);

/// Default bound for each shutdown tier
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(3);

/// Number of interrupt rounds in the second shutdown tier
const INTERRUPT_ATTEMPTS: u32 = 10;

/// Granularity of [`TaskContext::sleep`]
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Lifecycle of a worker task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Running,
    /// Cancel flag set, waiting for the worker to notice
    Canceling,
    /// Cancel was ignored, interrupting repeatedly
    Interrupting,
    Finished,
    /// Worker did not react and was left behind
    Detached,
}

/// How [`WorkerTask::stop`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was running
    NotRunning,
    /// Worker finished after the cooperative cancel
    Finished,
    /// Worker finished only after being interrupted
    Interrupted,
    /// Worker never finished and has been detached
    Detached,
}

#[derive(Debug)]
struct TaskFlags {
    cancel: AtomicBool,
    interrupt: AtomicBool,
    paused: AtomicBool,
    pause_sleep: Duration,
    state: Mutex<TaskState>,
}

impl TaskFlags {
    fn set_state(&self, state: TaskState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn state(&self) -> TaskState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The worker side of a task
#[derive(Debug, Clone)]
pub struct TaskContext {
    flags: Arc<TaskFlags>,
}

impl TaskContext {
    /// Context that is never canceled (for running work inline)
    pub fn detached() -> Self {
        Self::with_pause_sleep(DEFAULT_PAUSE_SLEEP)
    }

    fn with_pause_sleep(pause_sleep: Duration) -> Self {
        Self {
            flags: Arc::new(TaskFlags {
                cancel: AtomicBool::new(false),
                interrupt: AtomicBool::new(false),
                paused: AtomicBool::new(false),
                pause_sleep,
                state: Mutex::new(TaskState::Idle),
            }),
        }
    }

    /// Poll for cancellation
    ///
    /// While the task is paused (e.g. a cancel confirmation is pending) this
    /// sleeps once for the fixed pause interval and then carries on, so a
    /// pause that is never lifted cannot block the worker forever.
    pub fn should_stop(&self) -> bool {
        if self.flags.paused.load(Ordering::Acquire) {
            thread::sleep(self.flags.pause_sleep);
        }
        self.is_canceled() || self.is_interrupted()
    }

    pub fn is_canceled(&self) -> bool {
        self.flags.cancel.load(Ordering::Acquire)
    }

    pub fn is_interrupted(&self) -> bool {
        self.flags.interrupt.load(Ordering::Acquire)
    }

    pub fn cancel(&self) {
        self.flags.cancel.store(true, Ordering::Release);
    }

    pub fn set_paused(&self, paused: bool) {
        self.flags.paused.store(paused, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::Acquire)
    }

    /// Sleep up to `duration`, waking early on cancel or interrupt
    ///
    /// Returns false if the sleep was cut short.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_canceled() || self.is_interrupted() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::park_timeout((deadline - now).min(SLEEP_SLICE));
        }
    }
}

/// A named worker thread with a bounded shutdown
#[derive(Debug)]
pub struct WorkerTask {
    name: String,
    context: TaskContext,
    handle: Option<JoinHandle<()>>,
    done_rx: Receiver<()>,
}

impl WorkerTask {
    /// Spawn `f` on a new thread
    pub fn spawn<F>(name: &str, f: F) -> std::io::Result<Self>
    where
        F: FnOnce(TaskContext) + Send + 'static,
    {
        Self::spawn_with_pause_sleep(name, DEFAULT_PAUSE_SLEEP, f)
    }

    pub fn spawn_with_pause_sleep<F>(name: &str, pause_sleep: Duration, f: F) -> std::io::Result<Self>
    where
        F: FnOnce(TaskContext) + Send + 'static,
    {
        let context = TaskContext::with_pause_sleep(pause_sleep);
        let worker_context = context.clone();
        // The sender drops when the thread exits, also on panic
        let (done_tx, done_rx) = channel::bounded::<()>(1);

        context.flags.set_state(TaskState::Running);
        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            let _done = done_tx;
            let flags = worker_context.flags.clone();
            f(worker_context);
            if flags.state() != TaskState::Detached {
                flags.set_state(TaskState::Finished);
            }
        })?;
        log::debug!("Worker task '{name}' started");

        Ok(Self {
            name: name.to_string(),
            context,
            handle: Some(handle),
            done_rx,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &TaskContext {
        &self.context
    }

    pub fn state(&self) -> TaskState {
        self.context.flags.state()
    }

    /// Ask the worker to stop at its next poll
    pub fn request_cancel(&self) {
        if self.is_running() {
            self.context.flags.set_state(TaskState::Canceling);
        }
        self.context.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait until the worker has finished, false on timeout
    pub fn wait(&mut self, timeout: Duration) -> bool {
        if self.handle.is_none() {
            return true;
        }
        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take() {
                    if handle.join().is_err() {
                        log::error!("Worker task '{}' panicked", self.name);
                    }
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
        }
    }

    /// Stop the worker, escalating if it does not react
    pub fn stop(&mut self, timeout: Duration) -> StopOutcome {
        if self.handle.is_none() {
            return StopOutcome::NotRunning;
        }

        self.request_cancel();
        if self.wait(timeout) {
            return StopOutcome::Finished;
        }

        log::warn!("Worker task '{}' ignores cancel, interrupting", self.name);
        self.context.flags.set_state(TaskState::Interrupting);
        self.context.flags.interrupt.store(true, Ordering::Release);
        let slice = timeout / INTERRUPT_ATTEMPTS;
        for _ in 0..INTERRUPT_ATTEMPTS {
            if let Some(handle) = &self.handle {
                handle.thread().unpark();
            }
            if self.wait(slice) {
                return StopOutcome::Interrupted;
            }
        }

        log::error!("Worker task '{}' does not terminate, detaching it", self.name);
        self.context.flags.set_state(TaskState::Detached);
        self.handle = None;
        StopOutcome::Detached
    }
}

impl Drop for WorkerTask {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop(DEFAULT_STOP_TIMEOUT);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_cooperative_stop() {
        let mut task = WorkerTask::spawn("test-coop", |ctx| {
            while !ctx.should_stop() {
                thread::sleep(Duration::from_millis(1));
            }
        })
        .unwrap();
        assert!(task.is_running());
        assert_eq!(task.stop(Duration::from_secs(2)), StopOutcome::Finished);
        assert_eq!(task.state(), TaskState::Finished);
        assert_eq!(task.stop(Duration::from_secs(2)), StopOutcome::NotRunning);
    }

    #[test]
    fn test_interrupt_wakes_sleeper() {
        // Ignores the cancel flag, only reacts to the interrupt
        let mut task = WorkerTask::spawn("test-interrupt", |ctx| {
            while !ctx.is_interrupted() {
                thread::park_timeout(Duration::from_secs(10));
            }
        })
        .unwrap();
        assert_eq!(task.stop(Duration::from_millis(200)), StopOutcome::Interrupted);
    }

    #[test]
    fn test_detach_unresponsive() {
        let release = Arc::new(AtomicBool::new(false));
        let flag = release.clone();
        let mut task = WorkerTask::spawn("test-detach", move |_ctx| {
            while !flag.load(Ordering::Acquire) {
                thread::sleep(Duration::from_millis(5));
            }
        })
        .unwrap();
        assert_eq!(task.stop(Duration::from_millis(50)), StopOutcome::Detached);
        assert_eq!(task.state(), TaskState::Detached);
        release.store(true, Ordering::Release);
    }

    #[test]
    fn test_wait_for_completion() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let mut task = WorkerTask::spawn("test-wait", move |_ctx| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        assert!(task.wait(Duration::from_secs(2)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!task.is_running());
    }

    #[test]
    fn test_pause_sleeps_then_resumes() {
        let ctx = TaskContext::with_pause_sleep(Duration::from_millis(20));
        ctx.set_paused(true);
        let start = Instant::now();
        assert!(!ctx.should_stop());
        assert!(start.elapsed() >= Duration::from_millis(20));
        ctx.cancel();
        assert!(ctx.should_stop());
        assert!(!ctx.sleep(Duration::from_secs(5)));
    }
}
