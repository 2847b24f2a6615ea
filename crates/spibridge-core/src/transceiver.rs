use std::io::{Read, Write};

use spibridge_frame::{CommandFrame, Opcode, STATUS_OFFSET, STATUS_OK};
use spibridge_transport::{receive_exact, send_exact, TransportError};

use crate::diag::{Diagnostic, DiagnosticSink, IoStage, TransactionState};
use crate::error::{BridgeError, ProtocolError, Result};

/// Tracks one call through `Idle → FrameBuilt → Sent → AwaitingReply →
/// {Validated | Failed}` and reports each transition.
pub(crate) struct Transaction<'a> {
    opcode: Opcode,
    state: TransactionState,
    sink: &'a dyn DiagnosticSink,
}

impl<'a> Transaction<'a> {
    pub(crate) fn begin(opcode: Opcode, sink: &'a dyn DiagnosticSink) -> Self {
        sink.emit(&Diagnostic::StateChanged {
            opcode,
            state: TransactionState::Idle,
        });
        Self {
            opcode,
            state: TransactionState::Idle,
            sink,
        }
    }

    pub(crate) fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub(crate) fn frame_built(&mut self, len: usize) {
        self.sink.emit(&Diagnostic::FrameBuilt {
            opcode: self.opcode,
            len,
        });
        self.advance(TransactionState::FrameBuilt);
    }

    pub(crate) fn advance(&mut self, state: TransactionState) {
        if self.state == state || self.state.is_terminal() {
            return;
        }
        self.state = state;
        self.sink.emit(&Diagnostic::StateChanged {
            opcode: self.opcode,
            state,
        });
    }

    pub(crate) fn finish<T>(&mut self, result: &Result<T>) {
        let state = match result {
            Ok(_) => TransactionState::Validated,
            Err(_) => TransactionState::Failed,
        };
        self.advance(state);
    }
}

/// Sends frames on a borrowed handle and validates the replies.
///
/// Holding the handle by `&mut` is what guarantees a single in-flight
/// transaction per channel.
pub struct Transceiver<'a, T: ?Sized> {
    handle: &'a mut T,
    sink: &'a dyn DiagnosticSink,
}

impl<'a, T: Read + Write + ?Sized> Transceiver<'a, T> {
    pub fn new(handle: &'a mut T, sink: &'a dyn DiagnosticSink) -> Self {
        Self { handle, sink }
    }

    /// Run one single-register command and return the validated reply.
    ///
    /// The reply has the same length as the frame and `reply[0] == 0xFF`.
    pub fn transceive(&mut self, frame: &CommandFrame) -> Result<Vec<u8>> {
        let mut tx = Transaction::begin(frame.opcode(), self.sink);
        tx.frame_built(frame.len());

        let mut reply = vec![0u8; frame.len()];
        let result = self
            .exchange(&mut tx, frame.as_bytes(), &mut reply)
            .and_then(|()| self.check_status(tx.opcode(), &reply));
        tx.finish(&result);
        result.map(|()| reply)
    }

    pub(crate) fn sink(&self) -> &'a dyn DiagnosticSink {
        self.sink
    }

    /// Send `out` whole, then read exactly `out.len()` bytes into `reply`.
    pub(crate) fn exchange(
        &mut self,
        tx: &mut Transaction<'_>,
        out: &[u8],
        reply: &mut [u8],
    ) -> Result<()> {
        let expected = out.len();
        let reply = &mut reply[..expected];

        send_exact(&mut *self.handle, out)
            .map_err(|err| self.transport_failure(tx.opcode(), IoStage::Send, err))?;
        tx.advance(TransactionState::Sent);

        tx.advance(TransactionState::AwaitingReply);
        let actual = receive_exact(&mut *self.handle, reply)
            .map_err(|err| self.transport_failure(tx.opcode(), IoStage::Receive, err))?;
        if actual != expected {
            return Err(self.protocol_failure(
                tx.opcode(),
                ProtocolError::ShortResponse { expected, actual },
            ));
        }
        Ok(())
    }

    pub(crate) fn check_status(&self, opcode: Opcode, reply: &[u8]) -> Result<()> {
        match reply.get(STATUS_OFFSET) {
            Some(&STATUS_OK) => Ok(()),
            Some(&code) => Err(self.protocol_failure(opcode, ProtocolError::RemoteNack { code })),
            None => Err(self.protocol_failure(
                opcode,
                ProtocolError::ShortResponse {
                    expected: STATUS_OFFSET + 1,
                    actual: reply.len(),
                },
            )),
        }
    }

    fn transport_failure(&self, opcode: Opcode, stage: IoStage, err: TransportError) -> BridgeError {
        self.sink.emit(&Diagnostic::TransportFailure {
            opcode,
            stage,
            message: err.to_string(),
        });
        BridgeError::Transport(err)
    }

    fn protocol_failure(&self, opcode: Opcode, error: ProtocolError) -> BridgeError {
        self.sink.emit(&Diagnostic::ProtocolFailure {
            opcode,
            error: error.clone(),
        });
        BridgeError::Protocol(error)
    }
}
