use crate::error::Result;
use std::time::Instant;

/// Identifies a signal line, e.g. a BCM GPIO number
pub type PortId = u8;

/// A single falling edge seen on one of the Wiegand data lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub port: PortId,
    pub timestamp: Instant,
}

impl Edge {
    pub fn new(port: PortId, timestamp: Instant) -> Edge {
        Edge { port, timestamp }
    }
}

/// Callback handed to an [`EdgeSource`].  It runs in the source's interrupt context.
pub type EdgeSink = Box<dyn FnMut(Edge) + Send + 'static>;

/// Something that fires a notification on every edge of a single line.
///
/// Electrical setup (falling edge trigger, no pull resistor) is the source's business.
pub trait EdgeSource {
    /// Stable identifier of the line this source watches
    fn port(&self) -> PortId;

    /// Start delivering edges to `sink`, replacing any previous subscriber
    fn subscribe(&mut self, sink: EdgeSink) -> Result<()>;
}
