use crate::config::ZoneConfig;
use crate::entities::creature::{Entity, EntityBody, EntityId};
use crate::entities::player::{CharacterRecord, PlayerState};
use crate::net::messages::{PositionUpdate, ServerMessage, SpawnInfo};
use crate::net::opcodes::Opcode;
use crate::net::session::{Session, SessionId};
use crate::persistence::store::CharacterStore;
use crate::scripting::quest::QuestTrigger;
use crate::world::buckets::CellIndex;
use crate::world::grid::{CellCoord, CellKey, SpatialGrid};
use crate::world::position::Position;
use crate::world::spawns::SpawnSchedule;
use crate::world::subscriptions::SubscriptionGraph;
use crate::world::zone_data::{ZoneData, ZoneRecord};
use rand::rngs::StdRng;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Binds a connected session to its entity for the life of the connection.
pub struct ClientEntry {
    pub session: Arc<dyn Session>,
    pub entity: EntityId,
    pending: Vec<EntityId>,
}

impl std::fmt::Debug for ClientEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientEntry")
            .field("session", &self.session.id())
            .field("entity", &self.entity)
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Stream,
    Data,
}

/// Sends one message, logging instead of propagating failures.
pub(crate) fn deliver(
    session: &dyn Session,
    message: ServerMessage,
    opcode: Opcode,
    delivery: Delivery,
) -> bool {
    let result = match delivery {
        Delivery::Stream => session.send_stream(message, opcode),
        Delivery::Data => session.send_data(message, opcode),
    };
    match result {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(session = %session.id(), ?opcode, error = %err, "send failed");
            false
        }
    }
}

/// Every piece of mutable state of one zone instance. Only the zone loop
/// writes to it; everyone else reads through the instance's lock.
pub struct ZoneState {
    pub(super) zone: ZoneRecord,
    pub(super) instance_id: u32,
    pub(super) data: Arc<ZoneData>,
    pub(super) grid: SpatialGrid,
    pub(super) cells: CellIndex,
    pub(super) subscriptions: SubscriptionGraph,
    pub(super) entities: HashMap<EntityId, Entity>,
    pub(super) clients: HashMap<SessionId, ClientEntry>,
    pub(super) client_entities: HashMap<EntityId, SessionId>,
    pub(super) npcs: BTreeSet<EntityId>,
    pub(super) npc_names: HashMap<String, EntityId>,
    dirty: Vec<EntityId>,
    dirty_slots: HashMap<EntityId, usize>,
    next_entity_id: u32,
    pub(super) schedule: SpawnSchedule,
    pub(super) rng: StdRng,
    pub(super) store: Arc<dyn CharacterStore>,
    pub(super) triggers: Vec<QuestTrigger>,
    pub(super) movement_scale: f64,
    pub(super) respawn_ceiling: Duration,
}

impl std::fmt::Debug for ZoneState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneState")
            .field("zone", &self.zone.id)
            .field("instance", &self.instance_id)
            .field("entities", &self.entities.len())
            .field("clients", &self.clients.len())
            .field("npcs", &self.npcs.len())
            .field("dirty", &self.dirty.len())
            .finish()
    }
}

pub(super) fn name_key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

impl ZoneState {
    pub fn new(
        instance_id: u32,
        data: Arc<ZoneData>,
        config: &ZoneConfig,
        store: Arc<dyn CharacterStore>,
        rng: StdRng,
        now: Instant,
    ) -> Self {
        let schedule = SpawnSchedule::new(data.spawn_points.iter(), now);
        Self {
            zone: data.zone.clone(),
            instance_id,
            grid: SpatialGrid::new(config.cell_size),
            cells: CellIndex::new(),
            subscriptions: SubscriptionGraph::new(),
            entities: HashMap::new(),
            clients: HashMap::new(),
            client_entities: HashMap::new(),
            npcs: BTreeSet::new(),
            npc_names: HashMap::new(),
            dirty: Vec::new(),
            dirty_slots: HashMap::new(),
            next_entity_id: 1,
            schedule,
            rng,
            store,
            triggers: Vec::new(),
            movement_scale: config.movement_scale,
            respawn_ceiling: config.respawn_ceiling(),
            data,
        }
    }

    pub fn zone(&self) -> &ZoneRecord {
        &self.zone
    }

    pub fn instance_id(&self) -> u32 {
        self.instance_id
    }

    pub fn grid(&self) -> SpatialGrid {
        self.grid
    }

    pub fn cells(&self) -> &CellIndex {
        &self.cells
    }

    pub fn subscriptions(&self) -> &SubscriptionGraph {
        &self.subscriptions
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn client_entity(&self, session: SessionId) -> Option<EntityId> {
        self.clients.get(&session).map(|client| client.entity)
    }

    pub fn session_of(&self, entity: EntityId) -> Option<SessionId> {
        self.client_entities.get(&entity).copied()
    }

    pub fn session(&self, session: SessionId) -> Option<&Arc<dyn Session>> {
        self.clients.get(&session).map(|client| &client.session)
    }

    pub fn is_client(&self, entity: EntityId) -> bool {
        self.client_entities.contains_key(&entity)
    }

    pub fn npc_named(&self, name: &str) -> Option<EntityId> {
        self.npc_names.get(&name_key(name)).copied()
    }

    /// Cell derived from the entity's current position.
    pub fn cell_of(&self, id: EntityId) -> Option<CellCoord> {
        self.entities
            .get(&id)
            .map(|entity| self.grid.cell_of(entity.position()))
    }

    pub fn spawn_info(&self, id: EntityId) -> Option<SpawnInfo> {
        let entity = self.entities.get(&id)?;
        Some(SpawnInfo::from_entity(entity, self.grid.cell_of(entity.position())))
    }

    pub fn dirty_len(&self) -> usize {
        self.dirty.len()
    }

    pub(super) fn allocate_id(&mut self) -> EntityId {
        let id = EntityId(self.next_entity_id);
        self.next_entity_id = self.next_entity_id.wrapping_add(1).max(1);
        id
    }

    /// Attaches a session. The entity is registered but not yet placed
    /// in the grid; that happens when the client enters the zone.
    pub fn add_client(&mut self, session: Arc<dyn Session>) -> EntityId {
        let session_id = session.id();
        if let Some(existing) = self.clients.get(&session_id) {
            return existing.entity;
        }
        let id = self.allocate_id();
        let player = PlayerState::new(session_id, session.character());
        let mob = player.build_mob(id);
        self.entities.insert(
            id,
            Entity {
                mob,
                body: EntityBody::Player(player),
            },
        );
        self.client_entities.insert(id, session_id);
        self.clients.insert(
            session_id,
            ClientEntry {
                session,
                entity: id,
                pending: Vec::new(),
            },
        );
        tracing::debug!(zone = self.zone.id, session = %session_id, entity = %id, "client attached");
        id
    }

    /// Places a client at its entry position, lets existing neighbors see
    /// it and flushes right away so both sides learn about each other.
    pub fn register_new_client(&mut self, id: EntityId, position: Position) {
        self.mark_moved(id, position);
        self.subscribe_existing_to_new(id);
        self.flush_updates();
    }

    /// Subscribes `id` to every other client around it and queues those
    /// clients so their positions reach the newcomer on the next flush.
    pub fn subscribe_existing_to_new(&mut self, id: EntityId) {
        let Some(cell) = self.cell_of(id) else {
            return;
        };
        let neighbors: Vec<EntityId> = self
            .cells
            .occupants_near(cell)
            .filter(|other| *other != id && self.client_entities.contains_key(other))
            .collect();
        for other in neighbors {
            self.subscriptions.subscribe(other, id);
            self.enqueue_dirty(other);
        }
    }

    fn enqueue_dirty(&mut self, id: EntityId) {
        let Some(entity) = self.entities.get_mut(&id) else {
            return;
        };
        if entity.mob.mark_dirty() {
            self.dirty_slots.insert(id, self.dirty.len());
            self.dirty.push(id);
        }
    }

    fn dequeue_dirty(&mut self, id: EntityId) {
        let Some(slot) = self.dirty_slots.remove(&id) else {
            return;
        };
        self.dirty.swap_remove(slot);
        if let Some(moved) = self.dirty.get(slot) {
            self.dirty_slots.insert(*moved, slot);
        }
    }

    /// Records a new position, queues the entity for the next flush and
    /// rebuilds subscriptions when it crossed into another cell.
    pub fn mark_moved(&mut self, id: EntityId, position: Position) {
        let Some(entity) = self.entities.get_mut(&id) else {
            tracing::debug!(zone = self.zone.id, entity = %id, "move for unknown entity");
            return;
        };
        entity.mob.position = position;
        self.enqueue_dirty(id);
        let key = self.grid.key_of(position);
        if self.cells.place(id, key).changed() {
            self.resubscribe(id, self.grid.cell_of(position));
        }
    }

    fn resubscribe(&mut self, id: EntityId, cell: CellCoord) {
        let audience: HashSet<EntityId> = self
            .cells
            .occupants_near(cell)
            .filter(|other| *other != id && self.client_entities.contains_key(other))
            .collect();
        self.subscriptions.set_audience(id, audience);

        if !self.client_entities.contains_key(&id) {
            return;
        }
        let near: HashSet<CellKey> = cell.neighborhood().map(CellCoord::key).collect();
        let cells = &self.cells;
        self.subscriptions.retain_watched(id, |target| {
            cells.cell_of(target).map_or(false, |key| near.contains(&key))
        });
        let targets: Vec<EntityId> = self
            .cells
            .occupants_near(cell)
            .filter(|other| *other != id)
            .collect();
        for target in targets {
            self.subscriptions.subscribe(target, id);
        }
    }

    /// Drops an entity from every index: registry, bucket, subscriptions
    /// in both directions and the dirty list.
    pub(super) fn teardown_entity(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(&id)?;
        self.cells.remove(id);
        self.subscriptions.remove_entity(id);
        self.dequeue_dirty(id);
        Some(entity)
    }

    /// Saves and detaches a session. Unknown sessions are ignored.
    pub fn remove_client(&mut self, session_id: SessionId) -> Option<EntityId> {
        let client = self.clients.get(&session_id)?;
        let id = client.entity;
        if let Some(record) = self.character_snapshot(id) {
            if let Err(err) = self.store.save_character(&record) {
                tracing::warn!(zone = self.zone.id, session = %session_id, error = %err, "character save failed");
            }
        }
        let audience: Vec<EntityId> = self.subscriptions.audience(id).collect();
        for watcher in audience {
            self.send_to_entity(
                watcher,
                ServerMessage::DeleteSpawn { spawn_id: id },
                Opcode::DeleteSpawn,
                Delivery::Stream,
            );
        }
        self.teardown_entity(id);
        self.clients.remove(&session_id);
        self.client_entities.remove(&id);
        tracing::debug!(zone = self.zone.id, session = %session_id, entity = %id, "client removed");
        Some(id)
    }

    /// Sends one batched position update to every client with something
    /// pending. Returns how many batches were sent.
    pub fn flush_updates(&mut self) -> usize {
        for client in self.clients.values_mut() {
            client.pending.clear();
        }
        let mut dirty = std::mem::take(&mut self.dirty);
        self.dirty_slots.clear();
        for id in &dirty {
            if let Some(entity) = self.entities.get_mut(id) {
                entity.mob.clear_dirty();
            }
            for subscriber in self.subscriptions.audience(*id) {
                let Some(session) = self.client_entities.get(&subscriber) else {
                    continue;
                };
                if let Some(client) = self.clients.get_mut(session) {
                    client.pending.push(*id);
                }
            }
        }
        dirty.clear();
        self.dirty = dirty;

        let mut sent = 0;
        for client in self.clients.values_mut() {
            if client.pending.is_empty() {
                continue;
            }
            let updates: Vec<PositionUpdate> = client
                .pending
                .iter()
                .filter_map(|id| self.entities.get(id))
                .map(PositionUpdate::from_entity)
                .collect();
            client.pending.clear();
            if deliver(
                client.session.as_ref(),
                ServerMessage::PositionUpdates(updates),
                Opcode::SpawnPositionUpdate,
                Delivery::Stream,
            ) {
                sent += 1;
            }
        }
        sent
    }

    pub(crate) fn send_to_session(
        &self,
        session: SessionId,
        message: ServerMessage,
        opcode: Opcode,
        delivery: Delivery,
    ) -> bool {
        match self.clients.get(&session) {
            Some(client) => deliver(client.session.as_ref(), message, opcode, delivery),
            None => false,
        }
    }

    pub(crate) fn send_to_entity(
        &self,
        entity: EntityId,
        message: ServerMessage,
        opcode: Opcode,
        delivery: Delivery,
    ) -> bool {
        match self.client_entities.get(&entity) {
            Some(session) => self.send_to_session(*session, message, opcode, delivery),
            None => false,
        }
    }

    /// Sends to every subscriber of `target` not listed in `skip`.
    pub(crate) fn send_to_audience(
        &self,
        target: EntityId,
        skip: &[EntityId],
        message: &ServerMessage,
        opcode: Opcode,
        delivery: Delivery,
    ) -> usize {
        self.subscriptions
            .audience(target)
            .filter(|subscriber| !skip.contains(subscriber))
            .filter(|subscriber| self.send_to_entity(*subscriber, message.clone(), opcode, delivery))
            .count()
    }

    pub(crate) fn send_to_all(&self, message: &ServerMessage, opcode: Opcode) -> usize {
        self.clients
            .values()
            .filter(|client| {
                deliver(client.session.as_ref(), message.clone(), opcode, Delivery::Stream)
            })
            .count()
    }

    pub fn broadcast_channel(&self, sender: &str, channel: i32, message: &str) -> usize {
        self.send_to_all(
            &ServerMessage::ChannelMessage {
                sender: sender.to_string(),
                channel,
                message: message.to_string(),
            },
            Opcode::ChannelMessage,
        )
    }

    pub fn broadcast_server(&self, message: &str) -> usize {
        self.broadcast_channel("", -1, message)
    }

    /// Broadcasts an NPC line on the say channel under its display name.
    pub fn npc_say(&self, npc: EntityId, message: &str) -> Option<usize> {
        if !self.npcs.contains(&npc) {
            return None;
        }
        let entity = self.entities.get(&npc)?;
        Some(self.broadcast_channel(&entity.mob.clean_name(), 0, message))
    }

    pub fn character_snapshot(&self, id: EntityId) -> Option<CharacterRecord> {
        let entity = self.entities.get(&id)?;
        let mut record = entity.as_player()?.snapshot(&entity.mob)?;
        record.zone_id = self.zone.id;
        record.instance_id = self.instance_id;
        Some(record)
    }

    pub fn character_snapshots(&self) -> Vec<CharacterRecord> {
        self.clients
            .values()
            .filter_map(|client| self.character_snapshot(client.entity))
            .collect()
    }

    pub fn take_triggers(&mut self) -> Vec<QuestTrigger> {
        std::mem::take(&mut self.triggers)
    }

    pub fn live_npcs(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.npcs.iter().filter_map(|id| self.entities.get(id))
    }
}
