use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};

use super::cancel::CancelToken;
use super::event::WorkerEvent;

const STOP_POLL: Duration = Duration::from_millis(20);

/// Owner side of one running worker.
///
/// Dropping the handle stops the run and waits for it.
#[derive(Debug)]
pub struct WorkerHandle {
    label: String,
    events: Receiver<WorkerEvent>,
    cancel: CancelToken,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub(crate) fn new(
        label: String,
        events: Receiver<WorkerEvent>,
        cancel: CancelToken,
        join: JoinHandle<()>,
    ) -> Self {
        Self {
            label,
            events,
            cancel,
            join: Some(join),
        }
    }

    /// `kind locator` of the run, for logs.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Block until the next event. `None` once the run has ended and every
    /// event was consumed.
    pub fn recv(&self) -> Option<WorkerEvent> {
        self.events.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<WorkerEvent, RecvTimeoutError> {
        self.events.recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> Result<WorkerEvent, TryRecvError> {
        self.events.try_recv()
    }

    /// True once the worker thread has returned.
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Request cancellation and wait for the worker to exit.
    ///
    /// Events still queued (or pushed while stopping) are returned so the
    /// caller can apply a terminal event that raced the stop request. When
    /// this returns, the run's source handle has been released.
    pub fn stop(&mut self) -> Result<Vec<WorkerEvent>> {
        self.cancel.cancel();
        let mut drained = Vec::new();
        if let Some(join) = self.join.take() {
            // Keep draining so the worker never blocks on a full queue.
            loop {
                match self.events.recv_timeout(STOP_POLL) {
                    Ok(event) => drained.push(event),
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            join.join()
                .map_err(|_| anyhow!("detection worker for {} panicked", self.label))?;
            log::info!("detection worker for {} stopped", self.label);
        }
        drained.extend(self.events.try_iter());
        Ok(drained)
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if self.join.is_some() {
            if let Err(err) = self.stop() {
                log::warn!("{}", err);
            }
        }
    }
}
