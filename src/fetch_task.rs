use crate::logger::{log_debug, log_error};
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    SpawnFailed,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TaskPoll<T> {
    /// Nothing in flight.
    Idle,
    Pending,
    Finished(T),
    /// The worker went away without a result (it panicked).
    Lost,
}

/// A single-slot background job: at most one worker thread delivers a result
/// at any time. Finishing, losing or cancelling the job frees the slot.
pub struct FetchTask<T> {
    in_flight: Option<Receiver<T>>,
    started: u64,
}

impl<T: Send + 'static> FetchTask<T> {
    pub fn new() -> Self {
        Self {
            in_flight: None,
            started: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Number of jobs actually spawned so far.
    pub fn started_count(&self) -> u64 {
        self.started
    }

    pub fn start<F>(&mut self, job: F) -> StartOutcome
    where
        F: FnOnce() -> T + Send + 'static,
    {
        if self.in_flight.is_some() {
            log_debug("Fetch already in flight, ignoring start request");
            return StartOutcome::AlreadyRunning;
        }

        let (tx, rx) = channel();
        let spawned = thread::Builder::new()
            .name("pipdeck-fetch".to_string())
            .spawn(move || {
                // The receiver is gone if the job was cancelled; nothing to do then.
                let _ = tx.send(job());
            });

        match spawned {
            Ok(_) => {
                self.started += 1;
                self.in_flight = Some(rx);
                StartOutcome::Started
            }
            Err(e) => {
                log_error(&format!("Failed to spawn fetch thread: {}", e));
                StartOutcome::SpawnFailed
            }
        }
    }

    /// Non-blocking check for the in-flight result.
    pub fn poll(&mut self) -> TaskPoll<T> {
        let Some(rx) = &self.in_flight else {
            return TaskPoll::Idle;
        };

        match rx.try_recv() {
            Ok(value) => {
                self.in_flight = None;
                TaskPoll::Finished(value)
            }
            Err(TryRecvError::Empty) => TaskPoll::Pending,
            Err(TryRecvError::Disconnected) => {
                self.in_flight = None;
                TaskPoll::Lost
            }
        }
    }

    /// Blocks until the in-flight job finishes.
    pub fn wait(&mut self) -> TaskPoll<T> {
        let Some(rx) = self.in_flight.take() else {
            return TaskPoll::Idle;
        };

        match rx.recv() {
            Ok(value) => TaskPoll::Finished(value),
            Err(_) => TaskPoll::Lost,
        }
    }

    /// Detaches the in-flight job. Its result is dropped when it arrives; the
    /// worker itself runs to completion.
    pub fn cancel(&mut self) -> bool {
        let cancelled = self.in_flight.take().is_some();
        if cancelled {
            log_debug("In-flight fetch cancelled");
        }
        cancelled
    }
}

impl<T: Send + 'static> Default for FetchTask<T> {
    fn default() -> Self {
        Self::new()
    }
}
