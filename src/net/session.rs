use crate::entities::player::CharacterRecord;
use crate::net::messages::ServerMessage;
use crate::net::opcodes::Opcode;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u32);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session {0} is closed")]
    Closed(SessionId),
    #[error("send to session {session} failed: {reason}")]
    SendFailed { session: SessionId, reason: String },
}

/// A connected peer as seen by a zone. Encoding and transport belong to the
/// implementor; sends must not block the zone loop for long.
pub trait Session: Send + Sync {
    fn id(&self) -> SessionId;

    /// Character selected for this connection, if login completed.
    fn character(&self) -> Option<CharacterRecord>;

    /// Ordered, reliable delivery.
    fn send_stream(&self, message: ServerMessage, opcode: Opcode) -> Result<(), SessionError>;

    /// Best-effort delivery for frequent updates.
    fn send_data(&self, message: ServerMessage, opcode: Opcode) -> Result<(), SessionError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    pub struct Sent {
        pub opcode: Opcode,
        pub message: ServerMessage,
        pub stream: bool,
    }

    /// Session double that records every outbound message.
    #[derive(Debug)]
    pub struct RecordingSession {
        id: SessionId,
        character: Option<CharacterRecord>,
        sent: Mutex<Vec<Sent>>,
        closed: Mutex<bool>,
    }

    impl RecordingSession {
        pub fn new(id: u32, character: Option<CharacterRecord>) -> Arc<Self> {
            Arc::new(Self {
                id: SessionId(id),
                character,
                sent: Mutex::new(Vec::new()),
                closed: Mutex::new(false),
            })
        }

        pub fn close(&self) {
            *self.closed.lock() = true;
        }

        pub fn sent(&self) -> Vec<Sent> {
            self.sent.lock().clone()
        }

        pub fn take(&self) -> Vec<Sent> {
            std::mem::take(&mut *self.sent.lock())
        }

        pub fn with_opcode(&self, opcode: Opcode) -> Vec<ServerMessage> {
            self.sent
                .lock()
                .iter()
                .filter(|sent| sent.opcode == opcode)
                .map(|sent| sent.message.clone())
                .collect()
        }

        fn record(&self, message: ServerMessage, opcode: Opcode, stream: bool) -> Result<(), SessionError> {
            if *self.closed.lock() {
                return Err(SessionError::Closed(self.id));
            }
            self.sent.lock().push(Sent {
                opcode,
                message,
                stream,
            });
            Ok(())
        }
    }

    impl Session for RecordingSession {
        fn id(&self) -> SessionId {
            self.id
        }

        fn character(&self) -> Option<CharacterRecord> {
            self.character.clone()
        }

        fn send_stream(&self, message: ServerMessage, opcode: Opcode) -> Result<(), SessionError> {
            self.record(message, opcode, true)
        }

        fn send_data(&self, message: ServerMessage, opcode: Opcode) -> Result<(), SessionError> {
            self.record(message, opcode, false)
        }
    }
}
