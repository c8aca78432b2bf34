use std::io::{self, Result as IoResult, Stdout, Write};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use super::event::JobEvent;
use crate::telemetry::{PlainFormatter, TelemetryFormatter};
use crate::types::JobId;

/// Abstraction over an output target that consumes full JobEvent objects.
pub trait EventSink: Sync + Send {
    /// Handle a structured event. Sink decides how to serialize/format it.
    fn handle(&mut self, event: &JobEvent) -> IoResult<()>;
}

/// Stdout sink with optional formatting.
pub struct StdOutSink<F: TelemetryFormatter = PlainFormatter> {
    handle: Stdout,
    formatter: F,
}

impl Default for StdOutSink {
    fn default() -> Self {
        Self {
            handle: io::stdout(),
            formatter: PlainFormatter::new(),
        }
    }
}

impl<F: TelemetryFormatter> StdOutSink<F> {
    pub fn with_formatter(formatter: F) -> Self {
        Self {
            handle: io::stdout(),
            formatter,
        }
    }
}

impl<F: TelemetryFormatter> EventSink for StdOutSink<F> {
    fn handle(&mut self, event: &JobEvent) -> IoResult<()> {
        let rendered = self.formatter.render_event(event);
        self.handle.write_all(rendered.as_bytes())?;
        self.handle.flush()
    }
}

/// In-memory sink for testing and snapshots.
#[derive(Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<JobEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of all captured events.
    pub fn snapshot(&self) -> Vec<JobEvent> {
        self.entries.lock().unwrap().clone()
    }

    /// Log lines captured for one job, in arrival order.
    pub fn lines_for(&self, job_id: &JobId) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                JobEvent::Log { job_id: id, line, .. } if id == job_id => Some(line.clone()),
                _ => None,
            })
            .collect()
    }

    /// Clear all captured events.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl EventSink for MemorySink {
    fn handle(&mut self, event: &JobEvent) -> IoResult<()> {
        self.entries.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Channel-based sink for streaming to async consumers (e.g., web clients).
///
/// Events are forwarded to a tokio mpsc channel without blocking. Useful for
/// SSE endpoints, live dashboards, or polling UIs that want push instead.
/// A sink built with [`for_job`](Self::for_job) forwards only one job's
/// events, which is the shape a per-job streaming endpoint needs.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<JobEvent>,
    job_filter: Option<JobId>,
}

impl ChannelSink {
    /// Create a sink that forwards every event.
    ///
    /// # Example
    /// ```no_run
    /// use tokio::sync::mpsc;
    /// use jobmill::events::{ChannelSink, EventBus};
    ///
    /// let (tx, mut rx) = mpsc::unbounded_channel();
    /// let bus = EventBus::default();
    /// bus.add_sink(ChannelSink::new(tx));
    ///
    /// // In another task, consume events:
    /// tokio::spawn(async move {
    ///     while let Some(event) = rx.recv().await {
    ///         println!("Received: {}", event);
    ///     }
    /// });
    /// ```
    pub fn new(tx: mpsc::UnboundedSender<JobEvent>) -> Self {
        Self {
            tx,
            job_filter: None,
        }
    }

    /// Create a sink that forwards only the given job's events, dropping
    /// everything else (including bus-level diagnostics).
    pub fn for_job(job_id: JobId, tx: mpsc::UnboundedSender<JobEvent>) -> Self {
        Self {
            tx,
            job_filter: Some(job_id),
        }
    }
}

impl EventSink for ChannelSink {
    fn handle(&mut self, event: &JobEvent) -> IoResult<()> {
        if let Some(filter) = &self.job_filter {
            if event.job_id() != Some(filter) {
                return Ok(());
            }
        }
        self.tx
            .send(event.clone())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "channel receiver dropped"))
    }
}
