// SPDX-License-Identifier: GPL-3.0-only
//! Producer thread lifecycle
//!
//! The producer runs on its own thread and checks a shared stop flag before
//! every step. It is always joined before the frame channel is closed, so it
//! never publishes into a channel that is being torn down.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::errors::{AppError, AppResult};

/// Returned by each producer step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    Stop,
}

/// Slot for the error that ended a producer thread
type Failure = Arc<Mutex<Option<AppError>>>;

/// Handle to a producer thread
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::AtomicBool;
/// use depthcam_view::backends::{CaptureLoopController, LoopAction};
///
/// let stop = Arc::new(AtomicBool::new(false));
/// let mut producer = CaptureLoopController::start_with_init(
///     "example",
///     stop,
///     || Ok(0u32),
///     |frames| {
///         *frames += 1;
///         Ok(if *frames == 3 { LoopAction::Stop } else { LoopAction::Continue })
///     },
/// );
/// producer.join();
/// assert!(producer.stop().is_ok());
/// ```
pub struct CaptureLoopController {
    name: String,
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    failure: Failure,
}

impl CaptureLoopController {
    /// Spawn a producer thread
    ///
    /// `init_fn` builds the per-thread state on the new thread. `step_fn` then
    /// runs until it returns `Stop` or an error, or until `stop` is set. An
    /// init or step error is kept and handed out by [`Self::stop`].
    pub fn start_with_init<S, I, F>(
        name: &str,
        stop: Arc<AtomicBool>,
        init_fn: I,
        step_fn: F,
    ) -> Self
    where
        S: Send + 'static,
        I: FnOnce() -> AppResult<S> + Send + 'static,
        F: FnMut(&mut S) -> AppResult<LoopAction> + Send + 'static,
    {
        let failure: Failure = Arc::new(Mutex::new(None));

        info!(name = %name, "Spawning producer thread");
        let handle = {
            let name = name.to_string();
            let stop = Arc::clone(&stop);
            let failure = Arc::clone(&failure);
            thread::spawn(move || {
                if let Err(e) = run_steps(&name, &stop, init_fn, step_fn) {
                    *failure.lock() = Some(e);
                }
            })
        };

        Self {
            name: name.to_string(),
            handle: Some(handle),
            stop,
            failure,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Set the stop flag without waiting
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Set the stop flag, join the thread and return the error that ended it
    ///
    /// The error is handed out once; later calls return `Ok(())`.
    pub fn stop(&mut self) -> AppResult<()> {
        self.request_stop();
        self.join();
        self.failure.lock().take().map_or(Ok(()), Err)
    }

    /// Wait for the thread to end on its own
    pub fn join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.join().is_err() {
            warn!(name = %self.name, "Producer thread panicked");
            *self.failure.lock() = Some(AppError::Other(format!(
                "producer thread '{}' panicked",
                self.name
            )));
        } else {
            debug!(name = %self.name, "Producer thread joined");
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.handle.is_some()
            && let Err(e) = self.stop()
        {
            warn!(name = %self.name, error = %e, "Producer thread ended with error");
        }
    }
}

/// Thread body: init once, then step until told to stop
fn run_steps<S, I, F>(name: &str, stop: &AtomicBool, init_fn: I, mut step_fn: F) -> AppResult<()>
where
    I: FnOnce() -> AppResult<S>,
    F: FnMut(&mut S) -> AppResult<LoopAction>,
{
    let mut state = init_fn().inspect_err(|e| {
        warn!(name = %name, error = %e, "Producer init failed");
    })?;

    while !stop.load(Ordering::SeqCst) {
        match step_fn(&mut state) {
            Ok(LoopAction::Continue) => {}
            Ok(LoopAction::Stop) => {
                debug!(name = %name, "Producer finished");
                break;
            }
            Err(e) => {
                error!(name = %name, error = %e, "Producer step failed");
                return Err(e);
            }
        }
    }

    info!(name = %name, "Producer thread exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    fn flag() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    #[test]
    fn test_loop_stops_itself() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut controller = CaptureLoopController::start_with_init(
            "test-loop",
            flag(),
            || Ok(()),
            move |_| {
                let count = counter_clone.fetch_add(1, Ordering::SeqCst);
                Ok(if count >= 10 {
                    LoopAction::Stop
                } else {
                    LoopAction::Continue
                })
            },
        );

        controller.join();
        assert_eq!(counter.load(Ordering::SeqCst), 11); // 0-10 inclusive
        assert!(controller.stop().is_ok());
    }

    #[test]
    fn test_shared_stop_signal() {
        let stop = flag();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut controller = CaptureLoopController::start_with_init(
            "test-loop",
            Arc::clone(&stop),
            || Ok(()),
            move |_| {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                Ok(LoopAction::Continue)
            },
        );

        thread::sleep(Duration::from_millis(30));
        stop.store(true, Ordering::SeqCst);
        controller.join();
        assert!(!controller.is_running());
        assert!(counter.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn test_loop_error_is_reported() {
        let mut controller = CaptureLoopController::start_with_init(
            "test-error",
            flag(),
            || Ok(()),
            |_| Err(AppError::Sensor("unplugged".to_string())),
        );

        // Let the thread end on its own error before the stop flag is set
        controller.join();
        let err = controller.stop().unwrap_err();
        assert!(matches!(err, AppError::Sensor(ref msg) if msg == "unplugged"));
        // Reported once
        assert!(controller.stop().is_ok());
    }

    #[test]
    fn test_init_failure() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);

        let mut controller = CaptureLoopController::start_with_init(
            "test-fail-init",
            flag(),
            || Err::<(), _>(AppError::Other("init failed".to_string())),
            move |_: &mut ()| {
                ran_clone.store(true, Ordering::SeqCst);
                Ok(LoopAction::Stop)
            },
        );

        assert!(controller.stop().is_err());
        // Step function should never run if init fails
        assert!(!ran.load(Ordering::SeqCst));
    }
}
