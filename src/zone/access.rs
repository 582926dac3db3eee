use super::instance::ZoneInstance;
use super::state::ZoneState;
use crate::entities::creature::{Entity, EntityId, EntityKind};
use crate::net::session::SessionId;
use crate::world::grid::CellCoord;
use crate::world::position::{Position, Velocity};

/// Owned copy of an entity's public state, safe to hand out of the lock.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub level: u8,
    pub position: Position,
    pub velocity: Velocity,
    pub cell: CellCoord,
    pub npc_type: Option<u32>,
    pub session: Option<SessionId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientInfo {
    pub session: SessionId,
    pub entity: EntityId,
}

impl ZoneState {
    fn snapshot_of(&self, entity: &Entity) -> EntitySnapshot {
        EntitySnapshot {
            id: entity.id(),
            name: entity.mob.name.clone(),
            kind: entity.kind(),
            level: entity.mob.level,
            position: entity.mob.position,
            velocity: entity.mob.velocity,
            cell: self.grid.cell_of(entity.position()),
            npc_type: entity.as_npc().map(|npc| npc.template.id),
            session: self.client_entities.get(&entity.id()).copied(),
        }
    }

    pub fn snapshot(&self, id: EntityId) -> Option<EntitySnapshot> {
        self.entities.get(&id).map(|entity| self.snapshot_of(entity))
    }

    pub fn client_infos(&self) -> Vec<ClientInfo> {
        let mut clients: Vec<ClientInfo> = self
            .clients
            .iter()
            .map(|(session, client)| ClientInfo {
                session: *session,
                entity: client.entity,
            })
            .collect();
        clients.sort_by_key(|client| client.entity);
        clients
    }

    pub fn npc_snapshots(&self) -> Vec<EntitySnapshot> {
        self.live_npcs().map(|entity| self.snapshot_of(entity)).collect()
    }

    pub fn entity_snapshots(&self) -> Vec<EntitySnapshot> {
        let mut entities: Vec<EntitySnapshot> = self
            .entities
            .values()
            .map(|entity| self.snapshot_of(entity))
            .collect();
        entities.sort_by_key(|entity| entity.id);
        entities
    }

    pub fn subscribers_sorted(&self, id: EntityId) -> Vec<EntityId> {
        let mut subscribers: Vec<EntityId> = self.subscriptions.audience(id).collect();
        subscribers.sort();
        subscribers
    }
}

/// Read-only views for code outside the zone loop. Each call takes the
/// read lock once and returns owned data.
impl ZoneInstance {
    pub fn clients(&self) -> Vec<ClientInfo> {
        self.read().client_infos()
    }

    pub fn client_by_session(&self, session: SessionId) -> Option<EntitySnapshot> {
        let state = self.read();
        let entity = state.client_entity(session)?;
        state.snapshot(entity)
    }

    pub fn client_by_entity(&self, entity: EntityId) -> Option<ClientInfo> {
        let state = self.read();
        let session = state.session_of(entity)?;
        Some(ClientInfo { session, entity })
    }

    pub fn npcs(&self) -> Vec<EntitySnapshot> {
        self.read().npc_snapshots()
    }

    pub fn npc_by_id(&self, id: EntityId) -> Option<EntitySnapshot> {
        let state = self.read();
        state
            .snapshot(id)
            .filter(|snapshot| snapshot.kind == EntityKind::Npc)
    }

    pub fn npc_by_name(&self, name: &str) -> Option<EntitySnapshot> {
        let state = self.read();
        let id = state.npc_named(name)?;
        state.snapshot(id)
    }

    pub fn entities(&self) -> Vec<EntitySnapshot> {
        self.read().entity_snapshots()
    }

    pub fn entity_by_id(&self, id: EntityId) -> Option<EntitySnapshot> {
        self.read().snapshot(id)
    }

    pub fn subscribers_of(&self, id: EntityId) -> Vec<EntityId> {
        self.read().subscribers_sorted(id)
    }

    pub fn cell_of_entity(&self, id: EntityId) -> Option<CellCoord> {
        self.read().cell_of(id)
    }

    pub fn broadcast_channel(&self, sender: &str, channel: i32, message: &str) -> usize {
        self.read().broadcast_channel(sender, channel, message)
    }

    pub fn broadcast_server(&self, message: &str) -> usize {
        self.read().broadcast_server(message)
    }
}
