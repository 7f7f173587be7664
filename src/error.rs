use crate::edge::PortId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WiegandError>;

#[derive(Debug, Error)]
pub enum WiegandError {
    /// The decoder could not be created with the given sources or settings
    #[error("configuration error: {0}")]
    Configuration(String),
    /// An edge arrived from a port the decoder never registered
    #[error("port {port} is neither DATA0 ({data0}) nor DATA1 ({data1})")]
    InvalidPort {
        port: PortId,
        data0: PortId,
        data1: PortId,
    },
    /// A card handler panicked while being notified
    #[error("card handler panicked: {0}")]
    HandlerPanicked(String),
    #[error(transparent)]
    Gpio(#[from] rppal::gpio::Error),
}

impl WiegandError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        WiegandError::Configuration(msg.into())
    }
}
