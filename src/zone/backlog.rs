use crate::entities::creature::EntityId;
use crate::net::session::Session;
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Work produced outside the zone loop that must run inside it.
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneTask {
    NpcSay { npc: EntityId, message: String },
    Despawn { npc: EntityId },
    Broadcast { message: String },
}

pub enum Packet {
    Client {
        session: Arc<dyn Session>,
        data: Vec<u8>,
    },
    Internal(ZoneTask),
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Packet::Client { session, data } => f
                .debug_struct("Client")
                .field("session", &session.id())
                .field("len", &data.len())
                .finish(),
            Packet::Internal(task) => f.debug_tuple("Internal").field(task).finish(),
        }
    }
}

/// FIFO of unprocessed packets plus a single-slot wake signal. Producers
/// never block; a wake that is already pending absorbs new ones.
#[derive(Debug)]
pub struct Backlog {
    queue: Mutex<VecDeque<Packet>>,
    wake: Sender<()>,
}

impl Backlog {
    pub fn new() -> (Arc<Self>, Receiver<()>) {
        let (wake, woken) = bounded(1);
        let backlog = Arc::new(Self {
            queue: Mutex::new(VecDeque::new()),
            wake,
        });
        (backlog, woken)
    }

    pub fn push(&self, packet: Packet) {
        self.queue.lock().push_back(packet);
        match self.wake.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                tracing::debug!("zone loop gone, packet left in backlog");
            }
        }
    }

    /// Takes everything queued so far, oldest first.
    pub fn drain(&self) -> VecDeque<Packet> {
        std::mem::take(&mut *self.queue.lock())
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

/// Cloneable, thread-safe way to feed a zone. Carries no zone state, so it
/// can be used from quest handlers and worker threads alike.
#[derive(Debug, Clone)]
pub struct ZoneHandle {
    zone_id: u32,
    instance_id: u32,
    backlog: Arc<Backlog>,
}

impl ZoneHandle {
    pub fn new(zone_id: u32, instance_id: u32, backlog: Arc<Backlog>) -> Self {
        Self {
            zone_id,
            instance_id,
            backlog,
        }
    }

    pub fn zone_id(&self) -> u32 {
        self.zone_id
    }

    pub fn instance_id(&self) -> u32 {
        self.instance_id
    }

    pub fn submit(&self, task: ZoneTask) {
        self.backlog.push(Packet::Internal(task));
    }
}
