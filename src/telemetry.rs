//! Rendering of job events for human-facing sinks, plus tracing bootstrap.

use std::io::IsTerminal;

use crate::events::JobEvent;

pub const LINE_COLOR: &str = "\x1b[35m"; // magenta
pub const RESET_COLOR: &str = "\x1b[0m";

/// Formatter color mode for telemetry output.
///
/// - [`FormatterMode::Auto`]: detects TTY capability via `stderr.is_terminal()`
/// - [`FormatterMode::Colored`]: always include color codes
/// - [`FormatterMode::Plain`]: never include color codes (for logs/files)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatterMode {
    #[default]
    Auto,
    Colored,
    Plain,
}

impl FormatterMode {
    /// Returns true if this mode should use colored output.
    ///
    /// For `Auto` mode, performs TTY detection on each call.
    pub fn is_colored(&self) -> bool {
        match self {
            FormatterMode::Auto => std::io::stderr().is_terminal(),
            FormatterMode::Colored => true,
            FormatterMode::Plain => false,
        }
    }
}

/// Renders a [`JobEvent`] into the string a sink writes out.
pub trait TelemetryFormatter: Send + Sync {
    fn render_event(&self, event: &JobEvent) -> String;
}

/// Plain text formatter with optional ANSI color codes.
#[derive(Default)]
pub struct PlainFormatter {
    mode: FormatterMode,
}

impl PlainFormatter {
    /// Create a new formatter with auto-detected color mode.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new formatter with explicit color mode.
    #[must_use]
    pub fn with_mode(mode: FormatterMode) -> Self {
        Self { mode }
    }
}

impl TelemetryFormatter for PlainFormatter {
    fn render_event(&self, event: &JobEvent) -> String {
        if self.mode.is_colored() {
            format!("{LINE_COLOR}{event}{RESET_COLOR}\n")
        } else {
            format!("{event}\n")
        }
    }
}

/// Compact JSON formatter for machine-consumed logs.
#[derive(Default)]
pub struct JsonFormatter;

impl TelemetryFormatter for JsonFormatter {
    fn render_event(&self, event: &JobEvent) -> String {
        let mut line = event.to_json_value().to_string();
        line.push('\n');
        line
    }
}

/// Install a global tracing subscriber honoring `RUST_LOG`.
///
/// Intended for binaries and test harnesses; idempotent in the sense that a
/// second call is a no-op rather than a panic.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobId;

    #[test]
    fn plain_mode_has_no_ansi_codes() {
        let formatter = PlainFormatter::with_mode(FormatterMode::Plain);
        let rendered =
            formatter.render_event(&JobEvent::log(JobId::from("job_aaaaaaaaaaaa"), "hello"));
        assert_eq!(rendered, "[job_aaaaaaaaaaaa] hello\n");
    }

    #[test]
    fn json_formatter_emits_one_object_per_line() {
        let rendered = JsonFormatter.render_event(&JobEvent::diagnostic("runner", "up"));
        let value: serde_json::Value = serde_json::from_str(rendered.trim()).unwrap();
        assert_eq!(value["type"], "diagnostic");
    }
}
