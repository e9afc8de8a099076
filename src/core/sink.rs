//! Sink writer trait for log destinations

use super::{error::Result, log_event::LogEvent};

/// A destination that persists or displays log events
///
/// Writers are driven by exactly one owner at a time (the router's lock or the
/// sink's worker thread), so methods take `&mut self`.
pub trait SinkWriter: Send {
    fn write(&mut self, event: &LogEvent) -> Result<()>;

    /// Make every event written so far durable
    fn flush(&mut self) -> Result<()>;

    /// Release resources; called once, after the final flush
    fn close(&mut self) -> Result<()> {
        self.flush()
    }

    fn name(&self) -> &str;
}

impl<W: SinkWriter + ?Sized> SinkWriter for Box<W> {
    fn write(&mut self, event: &LogEvent) -> Result<()> {
        (**self).write(event)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
