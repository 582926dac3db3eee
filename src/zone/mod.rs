pub mod access;
pub mod backlog;
pub mod handlers;
pub mod instance;
pub mod manager;
mod spawning;
pub mod state;
#[cfg(test)]
pub(crate) mod testing;

use crate::entities::creature::EntityId;
use crate::net::payloads::PayloadError;
use crate::net::session::SessionId;
use crate::world::spawns::{SpawnError, SpawnPointId};
use crate::world::zone_data::DataError;
use thiserror::Error;

pub use backlog::{ZoneHandle, ZoneTask};
pub use instance::{ZoneInstance, ZoneServices};
pub use manager::ZoneManager;

#[derive(Debug, Error)]
pub enum ZoneError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error("no live npc with id {0}")]
    UnknownNpc(EntityId),
    #[error("session {0} is not attached to this zone")]
    UnknownSession(SessionId),
    #[error("spawn point {point} skipped: {source}")]
    Spawn {
        point: SpawnPointId,
        #[source]
        source: SpawnError,
    },
    #[error("packet from session {session} too short ({len} bytes)")]
    ShortPacket { session: SessionId, len: usize },
    #[error("malformed payload: {0}")]
    Payload(#[from] PayloadError),
    #[error("zone loop thread failed to start: {0}")]
    Thread(#[source] std::io::Error),
}
