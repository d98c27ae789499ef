use log::{debug, error};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A fixed-interval repeating task on its own thread.
///
/// The first run happens immediately. Runs never overlap: the next one is
/// scheduled only after the previous returned. A panicking run is logged and
/// the schedule continues. Cancelling clears a liveness flag that is checked
/// before every run and again before waiting for the next one.
pub struct PeriodicTask {
    name: String,
    alive: Arc<AtomicBool>,
    wake: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    pub fn spawn<F>(name: &str, interval: Duration, mut run: F) -> std::io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let alive = Arc::new(AtomicBool::new(true));
        let (wake, sleeper) = mpsc::channel::<()>();
        let flag = Arc::clone(&alive);
        let thread_name = name.to_string();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while flag.load(Ordering::SeqCst) {
                    if panic::catch_unwind(AssertUnwindSafe(&mut run)).is_err() {
                        error!("{thread_name}: run panicked, continuing on schedule");
                    }

                    if !flag.load(Ordering::SeqCst) {
                        break;
                    }

                    match sleeper.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("{thread_name}: stopped");
            })?;

        Ok(Self {
            name: name.to_string(),
            alive,
            wake: Some(wake),
            handle: Some(handle),
        })
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Prevent any further run. A run already in progress is left to finish.
    pub fn cancel(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        // Dropping the sender wakes the thread out of its wait
        self.wake.take();
    }

    /// Cancel and wait for the thread to exit.
    pub fn join(mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                error!("{}: thread exited with a panic", self.name);
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
