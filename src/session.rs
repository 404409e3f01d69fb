//! Caller side of detection runs.
//!
//! `DetectionSession` owns at most one running worker. Starting a run stops
//! and joins the previous one first, so a camera or file is never opened by
//! two runs at once. Each run gets a history record that is written when the
//! run starts and updated once when it ends.

use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::storage::{HistoryStore, RecordId};
use crate::worker::{DetectionRequest, DetectionWorker, WorkerEvent, WorkerHandle};

struct ActiveRun {
    record_id: RecordId,
    handle: WorkerHandle,
}

pub struct DetectionSession<S: HistoryStore> {
    worker: DetectionWorker,
    store: S,
    active: Option<ActiveRun>,
}

impl<S: HistoryStore> DetectionSession<S> {
    pub fn new(worker: DetectionWorker, store: S) -> Self {
        Self {
            worker,
            store,
            active: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// History record of the active run.
    pub fn active_record(&self) -> Option<RecordId> {
        self.active.as_ref().map(|run| run.record_id)
    }

    /// Stop any prior run, record the new one and spawn it.
    pub fn start(&mut self, request: DetectionRequest) -> Result<RecordId> {
        self.stop()?;

        let placeholder = format!("Using model {} for detection...", request.model_file_name());
        let source = request.source();
        let record_id =
            self.store
                .create_record(source.kind_name(), &source.locator(), &placeholder)?;
        let handle = match self.worker.spawn(request) {
            Ok(handle) => handle,
            Err(err) => {
                record_start_failure(&mut self.store, record_id, &err)?;
                return Err(err);
            }
        };
        self.active = Some(ActiveRun { record_id, handle });
        Ok(record_id)
    }

    /// Whether the active run's thread has exited. Its remaining events may
    /// still be queued.
    pub fn worker_exited(&self) -> bool {
        self.active
            .as_ref()
            .map_or(true, |run| run.handle.is_finished())
    }

    /// Next event of the active run, waiting up to `timeout`.
    ///
    /// Terminal events update the history record and retire the run.
    /// `Ok(None)` means nothing arrived in time or no run is active.
    pub fn next_event(&mut self, timeout: Duration) -> Result<Option<WorkerEvent>> {
        let Some(run) = self.active.as_ref() else {
            return Ok(None);
        };
        match run.handle.recv_timeout(timeout) {
            Ok(event) => {
                if event.is_terminal() {
                    self.finish(&event)?;
                }
                Ok(Some(event))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                // Ended without a terminal event: cancelled or consumer-side stop.
                self.retire()?;
                Ok(None)
            }
        }
    }

    /// Cancel the active run and wait for it to release its source.
    ///
    /// A terminal event that raced the stop request is still recorded.
    pub fn stop(&mut self) -> Result<()> {
        let Some(mut run) = self.active.take() else {
            return Ok(());
        };
        let drained = run.handle.stop()?;
        if let Some(event) = drained.iter().find(|event| event.is_terminal()) {
            apply_terminal(&mut self.store, run.record_id, event)?;
        }
        Ok(())
    }

    fn finish(&mut self, event: &WorkerEvent) -> Result<()> {
        let mut run = self
            .active
            .take()
            .ok_or_else(|| anyhow!("no active run to finish"))?;
        apply_terminal(&mut self.store, run.record_id, event)?;
        run.handle.stop()?;
        Ok(())
    }

    fn retire(&mut self) -> Result<()> {
        if let Some(mut run) = self.active.take() {
            run.handle.stop()?;
        }
        Ok(())
    }
}

impl<S: HistoryStore> Drop for DetectionSession<S> {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::warn!("failed to stop detection run: {}", err);
        }
    }
}

/// A run that never started must not keep its placeholder summary.
fn record_start_failure<S: HistoryStore>(
    store: &mut S,
    record_id: RecordId,
    err: &anyhow::Error,
) -> Result<()> {
    store.update_summary(record_id, &format!("failed to start detection run: {:#}", err))
}

fn apply_terminal<S: HistoryStore>(
    store: &mut S,
    record_id: RecordId,
    event: &WorkerEvent,
) -> Result<()> {
    match event {
        WorkerEvent::RunFinished { summary } => store.update_summary(record_id, summary),
        WorkerEvent::RunFailed(err) => store.update_summary(record_id, &err.to_string()),
        _ => Ok(()),
    }
}
