//! Console sink writer

use crate::core::{LogEvent, LogLevel, OutputFormat, Result, SinkWriter, TimestampFormat};
#[cfg(feature = "console")]
use colored::Colorize;
use std::io::Write;

enum Target {
    /// stdout, with Error and Fatal routed to stderr
    Std,
    Stream(Box<dyn Write + Send>),
}

pub struct ConsoleWriter {
    target: Target,
    use_colors: bool,
    timestamp_format: TimestampFormat,
    output_format: OutputFormat,
}

impl ConsoleWriter {
    pub fn new() -> Self {
        Self {
            target: Target::Std,
            use_colors: cfg!(feature = "console"),
            timestamp_format: TimestampFormat::default(),
            output_format: OutputFormat::default(),
        }
    }

    /// Write to an arbitrary stream instead of stdout/stderr; colors are off
    pub fn with_stream(stream: Box<dyn Write + Send>) -> Self {
        Self {
            target: Target::Stream(stream),
            use_colors: false,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors && cfg!(feature = "console");
        self
    }

    /// Set the output format for this writer
    ///
    /// # Example
    ///
    /// ```
    /// use rust_log_router::sinks::ConsoleWriter;
    /// use rust_log_router::OutputFormat;
    ///
    /// let writer = ConsoleWriter::new().with_output_format(OutputFormat::Json);
    /// ```
    #[must_use]
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    fn format(&self, event: &LogEvent) -> String {
        match self.output_format {
            OutputFormat::Text => {
                let level = format!("{:5}", event.level.to_str());
                OutputFormat::format_text(event, &self.timestamp_format, &self.colorize(level, event.level))
            }
            other => other.format(event, &self.timestamp_format),
        }
    }

    #[cfg(feature = "console")]
    fn colorize(&self, level: String, log_level: LogLevel) -> String {
        if self.use_colors {
            level.color(log_level.color_code()).to_string()
        } else {
            level
        }
    }

    #[cfg(not(feature = "console"))]
    fn colorize(&self, level: String, _log_level: LogLevel) -> String {
        level
    }
}

impl Default for ConsoleWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl SinkWriter for ConsoleWriter {
    fn write(&mut self, event: &LogEvent) -> Result<()> {
        let output = self.format(event);

        match &mut self.target {
            Target::Std => match event.level {
                LogLevel::Error | LogLevel::Fatal => {
                    writeln!(std::io::stderr().lock(), "{}", output)?
                }
                _ => writeln!(std::io::stdout().lock(), "{}", output)?,
            },
            Target::Stream(stream) => writeln!(stream, "{}", output)?,
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        match &mut self.target {
            Target::Std => {
                std::io::stdout().flush()?;
                std::io::stderr().flush()?;
            }
            Target::Stream(stream) => stream.flush()?,
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
