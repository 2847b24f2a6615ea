//! Structured diagnostics.
//!
//! Register operations report what they do through a [`DiagnosticSink`]
//! instead of printing. [`TracingSink`] forwards to `tracing`;
//! [`RecordingSink`] keeps the events so tests can assert on them.

use std::sync::{Arc, Mutex};

use spibridge_frame::Opcode;
use tracing::{debug, trace, warn};

use crate::error::ProtocolError;

/// Per-call transaction progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    FrameBuilt,
    Sent,
    AwaitingReply,
    Validated,
    Failed,
}

impl TransactionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransactionState::Validated | TransactionState::Failed)
    }
}

/// Which half of an exchange failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoStage {
    Send,
    Receive,
}

/// An event emitted by a register operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The caller's address had bit 7 set; the masked value was used.
    AddressMasked { requested: u8, used: u8 },
    /// A frame or burst header was built.
    FrameBuilt { opcode: Opcode, len: usize },
    /// One burst chunk completed its round trip.
    ChunkExchanged {
        opcode: Opcode,
        index: usize,
        size: usize,
    },
    /// The channel failed while sending or receiving.
    TransportFailure {
        opcode: Opcode,
        stage: IoStage,
        message: String,
    },
    /// A reply failed validation.
    ProtocolFailure {
        opcode: Opcode,
        error: ProtocolError,
    },
    /// The transaction moved to a new state.
    StateChanged {
        opcode: Opcode,
        state: TransactionState,
    },
}

/// Receives diagnostics from register operations.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, event: &Diagnostic);
}

/// Default sink: forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, event: &Diagnostic) {
        match event {
            Diagnostic::AddressMasked { requested, used } => {
                warn!(requested, used, "register address > 127, high bit masked");
            }
            Diagnostic::FrameBuilt { opcode, len } => {
                debug!(opcode = opcode.name(), len, "frame built");
            }
            Diagnostic::ChunkExchanged {
                opcode,
                index,
                size,
            } => {
                trace!(opcode = opcode.name(), index, size, "chunk exchanged");
            }
            Diagnostic::TransportFailure {
                opcode,
                stage,
                message,
            } => {
                warn!(opcode = opcode.name(), ?stage, error = %message, "transport failure");
            }
            Diagnostic::ProtocolFailure { opcode, error } => {
                warn!(opcode = opcode.name(), %error, "protocol validation failed");
            }
            Diagnostic::StateChanged { opcode, state } => {
                trace!(opcode = opcode.name(), ?state, "transaction state");
            }
        }
    }
}

/// Sink that records every event in order.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<Diagnostic>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far.
    pub fn events(&self) -> Vec<Diagnostic> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<Diagnostic> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    /// The sequence of states recorded for transactions.
    pub fn states(&self) -> Vec<TransactionState> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Diagnostic::StateChanged { state, .. } => Some(state),
                _ => None,
            })
            .collect()
    }
}

impl DiagnosticSink for RecordingSink {
    fn emit(&self, event: &Diagnostic) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
