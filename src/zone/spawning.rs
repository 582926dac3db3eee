use super::state::{name_key, ZoneState};
use super::ZoneError;
use crate::entities::creature::{Entity, EntityBody, EntityId};
use crate::entities::npc::NpcState;
use crate::net::messages::ServerMessage;
use crate::net::opcodes::Opcode;
use crate::scripting::quest::{QuestEventKind, QuestPayload, QuestTrigger};
use crate::world::movement::step_npc;
use crate::world::spawns::SpawnPoint;
use crate::zone::access::EntitySnapshot;
use std::sync::Arc;
use std::time::Instant;

impl ZoneState {
    /// One spawn tick: occupied points drive their NPC's movement, free
    /// points whose timer has passed spawn a new NPC. Returns the number
    /// of NPCs spawned.
    pub fn process_spawns(&mut self, now: Instant) -> usize {
        let data = Arc::clone(&self.data);
        let mut spawned = 0;
        for point in &data.spawn_points {
            if let Some(npc) = self.schedule.occupant(point.id) {
                self.step_npc(npc, now);
                continue;
            }
            if !self.schedule.is_due(point.id, now) {
                continue;
            }
            match self.spawn_npc(point, now) {
                Ok(_) => spawned += 1,
                Err(err) => {
                    tracing::warn!(zone = self.zone.id, instance = self.instance_id, error = %err, "spawn skipped");
                }
            }
        }
        spawned
    }

    fn step_npc(&mut self, id: EntityId, now: Instant) {
        let scale = self.movement_scale;
        let Some((mob, npc)) = self.entities.get_mut(&id).and_then(Entity::npc_parts_mut) else {
            return;
        };
        let outcome = step_npc(mob, npc, now, scale);
        let position = mob.position;
        let name = mob.name.clone();
        if outcome.moved {
            self.mark_moved(id, position);
        }
        if let Some(waypoint) = outcome.arrived {
            let receiver = self.snapshot(id);
            self.triggers.push(QuestTrigger {
                npc_name: name,
                kind: QuestEventKind::WaypointArrive,
                actor: None,
                receiver,
                payload: QuestPayload::Waypoint(waypoint),
            });
        }
    }

    /// Picks a template for `point`, places the NPC and announces it.
    pub fn spawn_npc(&mut self, point: &SpawnPoint, now: Instant) -> Result<EntityId, ZoneError> {
        let template = point
            .group
            .pick(&mut self.rng)
            .map_err(|source| ZoneError::Spawn {
                point: point.id,
                source,
            })?
            .clone();
        let id = self.allocate_id();
        let path = self.data.path_for(point, &template);
        let mob = template.spawn_mob(id, point.position);
        let npc = NpcState::new(Arc::clone(&template), Some(point.id), path, now);
        self.entities.insert(
            id,
            Entity {
                mob,
                body: EntityBody::Npc(npc),
            },
        );
        self.npcs.insert(id);
        self.npc_names.insert(name_key(&template.name), id);
        self.schedule.occupy(point.id, id, now + self.respawn_ceiling);
        self.mark_moved(id, point.position);
        self.flush_updates();

        if let Some(info) = self.spawn_info(id) {
            self.send_to_all(&ServerMessage::Spawn(info), Opcode::ZoneSpawns);
        }
        let receiver = self.snapshot(id);
        self.triggers.push(QuestTrigger {
            npc_name: template.name.clone(),
            kind: QuestEventKind::Spawn,
            actor: None,
            receiver,
            payload: QuestPayload::None,
        });
        tracing::debug!(zone = self.zone.id, npc = %id, name = %template.name, point = %point.id, "npc spawned");
        Ok(id)
    }

    /// Removes a live NPC and frees its spawn point on the point's own
    /// respawn delay.
    pub fn despawn_npc(&mut self, id: EntityId, now: Instant) -> Result<(), ZoneError> {
        if !self.npcs.contains(&id) {
            return Err(ZoneError::UnknownNpc(id));
        }
        let receiver: Option<EntitySnapshot> = self.snapshot(id);
        self.send_to_all(&ServerMessage::DeleteSpawn { spawn_id: id }, Opcode::DeleteSpawn);

        let entity = self.teardown_entity(id);
        self.npcs.remove(&id);
        let name = entity.as_ref().map(|entity| entity.mob.name.clone()).unwrap_or_default();
        let key = name_key(&name);
        if self.npc_names.get(&key) == Some(&id) {
            self.npc_names.remove(&key);
        }
        let point = entity
            .as_ref()
            .and_then(Entity::as_npc)
            .and_then(|npc| npc.spawn_point);
        if let Some(point) = point {
            let delay = self
                .data
                .spawn_points
                .iter()
                .find(|candidate| candidate.id == point)
                .map(|candidate| candidate.respawn_delay)
                .unwrap_or_default();
            self.schedule.release(id, now + delay);
        }
        self.triggers.push(QuestTrigger {
            npc_name: name,
            kind: QuestEventKind::Despawn,
            actor: None,
            receiver,
            payload: QuestPayload::None,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::position::Position;
    use crate::world::spawns::SpawnPointId;
    use crate::zone::testing::{connect, state_for, PATROL_ZONE};
    use std::time::Duration;

    #[test]
    fn construction_pass_spawns_every_point() {
        let mut state = state_for(PATROL_ZONE);
        let now = Instant::now();
        assert_eq!(state.process_spawns(now), 2);
        assert_eq!(state.live_npcs().count(), 2);
        assert!(state.npc_named("guard_gehnus").is_some());
        assert_eq!(state.process_spawns(now), 0);
    }

    #[test]
    fn spawn_notifies_clients_and_subscribes_nearby() {
        let mut state = state_for(PATROL_ZONE);
        let (session, player) = connect(&mut state, 1, "Alia", Position::new(10.0, 0.0, 0.0));
        session.take();
        state.process_spawns(Instant::now());
        let spawns = session.with_opcode(Opcode::ZoneSpawns);
        assert_eq!(spawns.len(), 2);
        let guard = state.npc_named("Guard_Gehnus").expect("guard");
        assert!(state.subscriptions().is_subscribed(guard, player));
        let far = state.npc_named("a_far_rat").expect("rat");
        assert!(!state.subscriptions().is_subscribed(far, player));
    }

    #[test]
    fn spawn_flushes_position_to_nearby_clients_at_once() {
        let mut state = state_for(PATROL_ZONE);
        let (session, _) = connect(&mut state, 1, "Alia", Position::new(10.0, 0.0, 0.0));
        session.take();
        state.process_spawns(Instant::now());
        assert_eq!(state.dirty_len(), 0);
        let guard = state.npc_named("guard_gehnus").expect("guard");
        let saw_guard = session
            .with_opcode(Opcode::SpawnPositionUpdate)
            .iter()
            .any(|sent| matches!(sent, ServerMessage::PositionUpdates(updates)
                if updates.iter().any(|update| update.spawn_id == guard)));
        assert!(saw_guard);
    }

    #[test]
    fn occupied_point_moves_its_npc() {
        let mut state = state_for(PATROL_ZONE);
        let start = Instant::now();
        state.process_spawns(start);
        let guard = state.npc_named("guard_gehnus").expect("guard");
        state.flush_updates();
        state.process_spawns(start + Duration::from_secs(1));
        let position = state.entity(guard).expect("guard").position();
        assert!(position.x > 0.0 && position.x < 100.0);
        assert_eq!(state.dirty_len(), 1);
    }

    #[test]
    fn despawn_frees_point_on_its_own_delay() {
        let mut state = state_for(PATROL_ZONE);
        let (session, _) = connect(&mut state, 1, "Alia", Position::new(0.0, 0.0, 0.0));
        let now = Instant::now();
        state.process_spawns(now);
        session.take();
        let guard = state.npc_named("guard_gehnus").expect("guard");

        state.despawn_npc(guard, now).expect("despawn");
        assert!(state.entity(guard).is_none());
        assert!(state.npc_named("guard_gehnus").is_none());
        assert!(!state.subscriptions().mentions(guard));
        assert_eq!(
            session.with_opcode(Opcode::DeleteSpawn),
            vec![ServerMessage::DeleteSpawn { spawn_id: guard }]
        );
        assert_eq!(
            state.schedule.next_spawn(SpawnPointId(1)),
            Some(now + Duration::from_secs(30))
        );
        assert_eq!(state.process_spawns(now + Duration::from_secs(29)), 0);
        assert_eq!(state.process_spawns(now + Duration::from_secs(30)), 1);
        assert!(matches!(
            state.despawn_npc(guard, now),
            Err(ZoneError::UnknownNpc(id)) if id == guard
        ));
    }

    #[test]
    fn name_index_survives_stale_despawn() {
        let mut state = state_for(PATROL_ZONE);
        let now = Instant::now();
        state.process_spawns(now);
        let first = state.npc_named("guard_gehnus").expect("guard");
        let data = Arc::clone(&state.data);
        let second = state.spawn_npc(&data.spawn_points[0], now).expect("second guard");
        assert_eq!(state.npc_named("guard_gehnus"), Some(second));
        state.despawn_npc(first, now).expect("despawn first");
        assert_eq!(state.npc_named("guard_gehnus"), Some(second));
    }

    #[test]
    fn spawn_and_despawn_raise_quest_triggers() {
        let mut state = state_for(PATROL_ZONE);
        let now = Instant::now();
        state.process_spawns(now);
        let kinds: Vec<QuestEventKind> = state.take_triggers().iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![QuestEventKind::Spawn, QuestEventKind::Spawn]);
        let guard = state.npc_named("guard_gehnus").expect("guard");
        state.despawn_npc(guard, now).expect("despawn");
        let triggers = state.take_triggers();
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].kind, QuestEventKind::Despawn);
        assert_eq!(triggers[0].npc_name, "Guard_Gehnus");
    }

    #[test]
    fn zero_weight_group_is_skipped_without_panic() {
        let mut state = state_for(&PATROL_ZONE.replace("chance: 5", "chance: 0"));
        assert_eq!(state.process_spawns(Instant::now()), 1);
    }
}
