//! Debounce Timer
//!
//! A cancellable deferred callback on a dedicated thread. Every `reset`
//! pushes the deadline out by `delay`; the callback runs once the deadline
//! passes with no further reset.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, RecvTimeoutError, Sender};

use crate::error::{Result, StoreError};

enum TimerCommand {
    /// (Re)arm to fire at the given instant
    Arm(Instant),
    /// Disarm without firing
    Cancel,
    Shutdown,
}

/// Debounced scheduler for a single callback
pub struct DebounceTimer {
    delay: Duration,
    commands: Sender<TimerCommand>,
    handle: Option<JoinHandle<()>>,
}

impl DebounceTimer {
    /// Spawn the timer thread. `on_fire` runs on that thread.
    pub fn spawn<F>(delay: Duration, on_fire: F) -> Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let (tx, rx) = channel::unbounded::<TimerCommand>();

        let handle = thread::Builder::new()
            .name("store-flush-timer".to_string())
            .spawn(move || {
                let mut deadline: Option<Instant> = None;
                loop {
                    let command = match deadline {
                        Some(at) => rx.recv_deadline(at),
                        None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                    };

                    match command {
                        Ok(TimerCommand::Arm(at)) => deadline = Some(at),
                        Ok(TimerCommand::Cancel) => deadline = None,
                        Ok(TimerCommand::Shutdown) => break,
                        Err(RecvTimeoutError::Timeout) => {
                            deadline = None;
                            on_fire();
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::trace!("Flush timer stopped");
            })
            .map_err(|e| StoreError::Timer(format!("failed to spawn timer thread: {}", e)))?;

        Ok(Self {
            delay,
            commands: tx,
            handle: Some(handle),
        })
    }

    /// Cancel any scheduled run and schedule a new one `delay` from now
    pub fn reset(&self) {
        let _ = self.commands.send(TimerCommand::Arm(Instant::now() + self.delay));
    }

    /// Cancel any scheduled run
    pub fn cancel(&self) {
        let _ = self.commands.send(TimerCommand::Cancel);
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        let _ = self.commands.send(TimerCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            // Dropped from inside the callback: the thread exits on its own
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}
