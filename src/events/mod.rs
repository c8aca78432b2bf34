//! Structured progress events and the bus that broadcasts them.
//!
//! The job store stays authoritative for logs and status; the event bus is
//! the observation channel layered on top, so external consumers (an SSE
//! endpoint, a dashboard, a test harness) can stream progress without ever
//! touching store internals. Producers push [`JobEvent`]s into a flume pipe;
//! a background listener broadcasts each event to every attached
//! [`EventSink`].

mod bus;
mod event;
mod sink;

pub use bus::EventBus;
pub use event::JobEvent;
pub use sink::{ChannelSink, EventSink, MemorySink, StdOutSink};
