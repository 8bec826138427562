use crate::reporting::domain::report_sink::ReportError;
use crate::shared::frame::Frame;

/// Best-effort destination for live preview frames.
pub trait FrameSink {
    fn publish(&mut self, frame: &Frame) -> Result<(), ReportError>;

    /// Flushes anything still pending. Default: no-op.
    fn close(&mut self) {}
}
