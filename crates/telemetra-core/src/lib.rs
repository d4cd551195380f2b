//! Session actor for the Telemetra fusion core

mod actor;
mod buffer;
mod engine;
mod lap;

pub use actor::{spawn, EngineHandle};
pub use buffer::SampleBuffer;
pub use engine::TelemetryEngine;
pub use lap::{LapState, LapStateMachine, LapTransition};

use model::{Inbound, Outbound};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("undecodable message: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("engine channel closed")]
    ChannelClosed,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type InboundTx = crossbeam_channel::Sender<Inbound>;
pub type InboundRx = crossbeam_channel::Receiver<Inbound>;
pub type OutboundTx = crossbeam_channel::Sender<Outbound>;
pub type OutboundRx = crossbeam_channel::Receiver<Outbound>;

/// Anything that feeds host messages into the engine
#[async_trait::async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn run(&self, tx: InboundTx) -> Result<(), CoreError>;
}

pub fn channel<T>() -> (crossbeam_channel::Sender<T>, crossbeam_channel::Receiver<T>) {
    crossbeam_channel::unbounded()
}

/// Parse one message in the host wire format
/// (`{"type": "GPS_DATA", "payload": {...}}`).
pub fn decode_inbound(raw: &str) -> Result<Inbound, CoreError> {
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_is_a_decode_error() {
        let err = decode_inbound(r#"{"type":"REBOOT"}"#).unwrap_err();
        assert!(matches!(err, CoreError::Decode(_)));
    }

    #[test]
    fn known_type_decodes() {
        let msg = decode_inbound(r#"{"type":"SET_CALIBRATION","payload":{"biasY":0.02}}"#).unwrap();
        assert_eq!(msg, Inbound::SetCalibration(model::Calibration { bias_y: 0.02 }));
    }
}
