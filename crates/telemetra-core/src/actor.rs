use std::thread::{self, JoinHandle};

use model::{EngineConfig, Inbound, Outbound};
use tracing::{debug, info};

use crate::engine::TelemetryEngine;
use crate::{CoreError, InboundRx, InboundTx, OutboundRx, OutboundTx};

/// Host side of a running engine actor.
pub struct EngineHandle {
    tx: InboundTx,
    rx: OutboundRx,
    join: JoinHandle<()>,
}

/// Start the engine on its own thread. Messages are handled one at a time in
/// the order they were sent; the actor exits once every inbound sender is
/// dropped.
pub fn spawn(config: EngineConfig) -> Result<EngineHandle, CoreError> {
    let (tx, in_rx) = crate::channel::<Inbound>();
    let (out_tx, rx) = crate::channel::<Outbound>();
    let join = thread::Builder::new()
        .name("telemetra-engine".into())
        .spawn(move || run(TelemetryEngine::new(config), in_rx, out_tx))
        .map_err(anyhow::Error::from)?;
    Ok(EngineHandle { tx, rx, join })
}

fn run(mut engine: TelemetryEngine, rx: InboundRx, tx: OutboundTx) {
    for msg in rx.iter() {
        emit(&tx, engine.handle(msg));
    }
    if engine.is_running() {
        info!("inbound channel closed mid-session, flushing");
        emit(&tx, engine.handle(Inbound::StopSession));
    }
    debug!("engine actor stopped");
}

fn emit(tx: &OutboundTx, msgs: Vec<Outbound>) {
    for m in msgs {
        if tx.send(m).is_err() {
            debug!("outbound receiver dropped");
            return;
        }
    }
}

impl EngineHandle {
    pub fn sender(&self) -> InboundTx {
        self.tx.clone()
    }

    pub fn send(&self, msg: Inbound) -> Result<(), CoreError> {
        self.tx.send(msg).map_err(|_| CoreError::ChannelClosed)
    }

    /// Hand the outbound stream to the caller and close this handle's sender.
    /// The actor keeps running until clones from [`EngineHandle::sender`] are
    /// gone too.
    pub fn into_parts(self) -> (OutboundRx, JoinHandle<()>) {
        (self.rx, self.join)
    }

    /// Close the inbound side, wait for the actor and return everything it
    /// emitted that has not been received yet.
    pub fn finish(self) -> Result<Vec<Outbound>, CoreError> {
        let (rx, join) = self.into_parts();
        join.join()
            .map_err(|_| CoreError::Other(anyhow::anyhow!("engine thread panicked")))?;
        Ok(rx.try_iter().collect())
    }
}
