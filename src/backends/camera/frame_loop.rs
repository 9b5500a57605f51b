// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for capture and render loops
//!
//! Every independently clocked context in the pipeline (the test pattern
//! producer, the capture worker that delivers frames, the render thread) is a
//! [`LoopController`] running one closure repeatedly on a named thread until
//! it asks to stop or is told to stop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Action returned by the loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a loop running in a dedicated thread
///
/// # Example
///
/// ```ignore
/// let controller = LoopController::start("capture-worker", move || {
///     if let Some(frame) = slot.take_timeout(wait) {
///         on_frame(frame);
///     }
///     LoopAction::Continue
/// })?;
///
/// // Later, stop the loop and join the thread
/// controller.stop();
/// ```
pub struct LoopController {
    /// Thread handle for joining
    thread_handle: Option<JoinHandle<()>>,
    /// Signal to stop the loop
    stop_signal: Arc<AtomicBool>,
    /// Name for logging (also the OS thread name)
    name: String,
}

impl LoopController {
    /// Start a new loop in a separate thread
    ///
    /// The closure is called repeatedly until it returns `LoopAction::Stop`
    /// or [`LoopController::stop`] is called. The stop signal is checked
    /// before every iteration, so a single iteration should not block for
    /// long.
    pub fn start<F>(name: &str, mut loop_fn: F) -> std::io::Result<Self>
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        Self::start_with_init(name, || Ok(()), move |_: &mut ()| loop_fn())
    }

    /// Start a loop with initialization
    ///
    /// `init_fn` runs once on the new thread. If it fails the thread exits
    /// without ever running `loop_fn`.
    pub fn start_with_init<S, I, F>(name: &str, init_fn: I, mut loop_fn: F) -> std::io::Result<Self>
    where
        S: 'static,
        I: FnOnce() -> Result<S, String> + Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        Self::spawn(name, init_fn, move |state: &mut S, _: &AtomicBool| loop_fn(state))
    }

    /// Start a loop that runs once per `interval`
    ///
    /// Ticks are scheduled by a [`Pacer`]; a stop request interrupts the wait
    /// between ticks.
    pub fn start_paced<F>(name: &str, interval: Duration, mut tick_fn: F) -> std::io::Result<Self>
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        Self::spawn(
            name,
            move || Ok(Pacer::new(interval)),
            move |pacer: &mut Pacer, stop: &AtomicBool| {
                if !pacer.wait(stop) {
                    return LoopAction::Stop;
                }
                tick_fn()
            },
        )
    }

    fn spawn<S, I, F>(name: &str, init_fn: I, mut loop_fn: F) -> std::io::Result<Self>
    where
        S: 'static,
        I: FnOnce() -> Result<S, String> + Send + 'static,
        F: FnMut(&mut S, &AtomicBool) -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop_signal);
        let thread_name = name.to_string();

        info!(name = %name, "Starting loop");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(name = %thread_name, "Loop thread started");

                let mut state = match init_fn() {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(name = %thread_name, error = %e, "Loop initialization failed");
                        return;
                    }
                };

                while !thread_stop.load(Ordering::Acquire) {
                    if loop_fn(&mut state, &thread_stop) == LoopAction::Stop {
                        debug!(name = %thread_name, "Loop requested stop");
                        break;
                    }
                }

                info!(name = %thread_name, "Loop thread exiting");
            })?;

        Ok(Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        })
    }

    /// Name of the loop
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop without waiting for it
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting loop stop");
        self.stop_signal.store(true, Ordering::Release);
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending the stop signal
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            // Joining ourselves would deadlock (stop requested from inside the loop)
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Loop thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Loop thread finished");
            }
        }
    }
}

impl Drop for LoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "LoopController dropped, stopping loop");
            self.stop();
        }
    }
}

/// Fixed-rate ticker for loops that run on their own clock
///
/// Deadlines advance by exactly one interval per tick so the average rate
/// does not drift. When a tick runs so late that a whole interval was
/// missed, the schedule restarts from now instead of bursting to catch up.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    next_deadline: Instant,
}

impl Pacer {
    /// Create a pacer whose first tick is due immediately
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_micros(100)),
            next_deadline: Instant::now(),
        }
    }

    /// Tick interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleep until the next tick is due
    ///
    /// Returns early (with `false`) if `stop` is raised while waiting.
    pub fn wait(&mut self, stop: &AtomicBool) -> bool {
        let now = Instant::now();
        if now > self.next_deadline + self.interval {
            self.next_deadline = now;
        }

        // Sleep in short slices so a stop request is honoured promptly
        while let Some(remaining) = self.next_deadline.checked_duration_since(Instant::now()) {
            if stop.load(Ordering::Acquire) {
                return false;
            }
            if remaining.is_zero() {
                break;
            }
            thread::sleep(remaining.min(Duration::from_millis(10)));
        }

        self.next_deadline += self.interval;
        !stop.load(Ordering::Acquire)
    }
}
