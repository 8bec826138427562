//! Fire-and-forget wrappers that move reporting off the frame loop.
//!
//! Each wrapper owns a worker thread fed through a bounded channel. The
//! loop only ever does a non-blocking hand-off. Count reports keep the
//! newest snapshot and evict a stale pending one; frames are dropped while
//! the previous one is in flight and reported as [`ReportError::Busy`].
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::reporting::domain::frame_sink::FrameSink;
use crate::reporting::domain::report_sink::{CountsSnapshot, ReportError, ReportSink};
use crate::shared::frame::Frame;

/// Pending count reports. Each snapshot supersedes the previous one, so at
/// most one waits behind the request in flight.
pub const REPORT_QUEUE_CAPACITY: usize = 1;

/// Only the newest frame matters for a live preview.
pub const FRAME_QUEUE_CAPACITY: usize = 1;

/// A named thread draining a bounded queue with `handler`.
pub struct BackgroundWorker<T: Send + 'static> {
    name: String,
    sender: Option<Sender<T>>,
    // lets the submitting side evict a stale pending item
    receiver: Option<Receiver<T>>,
    handle: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> BackgroundWorker<T> {
    pub fn spawn(
        name: &str,
        capacity: usize,
        mut handler: impl FnMut(T) + Send + 'static,
    ) -> std::io::Result<Self> {
        let (sender, receiver) = crossbeam_channel::bounded::<T>(capacity);
        let worker_receiver = receiver.clone();
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                for item in worker_receiver {
                    handler(item);
                }
            })?;
        Ok(Self {
            name: name.to_string(),
            sender: Some(sender),
            receiver: Some(receiver),
            handle: Some(handle),
        })
    }

    pub fn is_full(&self) -> bool {
        self.sender.as_ref().map_or(true, Sender::is_full)
    }

    fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn stopped(&self) -> ReportError {
        ReportError::WorkerStopped(self.name.clone())
    }

    /// Queues `item`, rejecting it when the queue is full.
    pub fn try_submit(&self, item: T) -> Result<(), ReportError> {
        let Some(sender) = self.sender.as_ref().filter(|_| self.is_running()) else {
            return Err(self.stopped());
        };
        sender.try_send(item).map_err(|e| match e {
            TrySendError::Full(_) => ReportError::Busy(self.name.clone()),
            TrySendError::Disconnected(_) => self.stopped(),
        })
    }

    /// Queues `item`, evicting the oldest pending items to make room.
    pub fn submit_latest(&self, mut item: T) -> Result<(), ReportError> {
        let (Some(sender), Some(receiver)) = (self.sender.as_ref(), self.receiver.as_ref()) else {
            return Err(self.stopped());
        };
        if !self.is_running() {
            return Err(self.stopped());
        }
        loop {
            match sender.try_send(item) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(rejected)) => {
                    if receiver.try_recv().is_ok() {
                        log::trace!("{} worker dropped a stale item", self.name);
                    }
                    item = rejected;
                }
                Err(TrySendError::Disconnected(_)) => return Err(self.stopped()),
            }
        }
    }

    /// Stops accepting work and waits for queued items to finish.
    pub fn shutdown(&mut self) {
        drop(self.sender.take());
        drop(self.receiver.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("{} worker panicked", self.name);
            }
        }
    }
}

impl<T: Send + 'static> Drop for BackgroundWorker<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Sends count snapshots through an inner sink on a worker thread.
///
/// Only the newest snapshot is kept pending, so the report submitted last
/// (the final one from shutdown included) always reaches the inner sink.
/// Failures of the inner sink are logged on the worker; [`close`] waits for
/// at most the request in flight and the pending one.
///
/// [`close`]: ReportSink::close
pub struct BackgroundReportSink {
    worker: BackgroundWorker<CountsSnapshot>,
}

impl BackgroundReportSink {
    pub fn spawn(mut inner: Box<dyn ReportSink + Send>) -> std::io::Result<Self> {
        let worker = BackgroundWorker::spawn("report", REPORT_QUEUE_CAPACITY, move |snapshot| {
            match inner.report(&snapshot) {
                Ok(()) => log::debug!("Reported counts ({})", snapshot.summary()),
                Err(e) => log::warn!("Failed to report counts: {e}"),
            }
        })?;
        Ok(Self { worker })
    }
}

impl ReportSink for BackgroundReportSink {
    fn report(&mut self, snapshot: &CountsSnapshot) -> Result<(), ReportError> {
        self.worker.submit_latest(snapshot.clone())
    }

    fn close(&mut self) {
        self.worker.shutdown();
    }
}

/// Publishes frames through an inner sink on a worker thread, dropping new
/// frames while the previous one is still in flight.
pub struct BackgroundFrameSink {
    worker: BackgroundWorker<Frame>,
}

impl BackgroundFrameSink {
    pub fn spawn(mut inner: Box<dyn FrameSink + Send>) -> std::io::Result<Self> {
        let worker = BackgroundWorker::spawn("frame-stream", FRAME_QUEUE_CAPACITY, move |frame| {
            if let Err(e) = inner.publish(&frame) {
                log::debug!("Frame stream update failed: {e}");
            }
        })?;
        Ok(Self { worker })
    }
}

impl FrameSink for BackgroundFrameSink {
    fn publish(&mut self, frame: &Frame) -> Result<(), ReportError> {
        // checked first so a busy worker costs no frame copy
        if self.worker.is_full() {
            return Err(ReportError::Busy("frame-stream".into()));
        }
        self.worker.try_submit(frame.clone())
    }

    fn close(&mut self) {
        self.worker.shutdown();
    }
}
