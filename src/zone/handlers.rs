use super::state::{Delivery, ZoneState};
use super::ZoneError;
use crate::admin::commands::{CommandContext, CommandRegistry};
use crate::entities::creature::EntityId;
use crate::net::messages::{ServerMessage, SpawnInfo};
use crate::net::opcodes::Opcode;
use crate::net::payloads::{ChannelMessageRequest, ClientPositionUpdate, CommandMessage, EntityAnimation};
use crate::net::session::SessionId;
use crate::scripting::quest::{QuestEventKind, QuestPayload, QuestTrigger};
use crate::world::position::Velocity;
use crate::zone::backlog::ZoneHandle;
use std::collections::HashMap;

/// Collaborators a handler may need besides the zone state.
pub struct HandlerContext<'a> {
    pub commands: &'a CommandRegistry,
    pub zone: &'a ZoneHandle,
}

pub type PacketHandler =
    fn(&mut ZoneState, &HandlerContext<'_>, SessionId, &[u8]) -> Result<(), ZoneError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled(Opcode),
    Unhandled(Opcode),
}

/// Opcode -> handler table, fixed once the zone is built.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<Opcode, PacketHandler>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut opcodes: Vec<u16> = self.handlers.keys().map(|opcode| opcode.as_u16()).collect();
        opcodes.sort_unstable();
        f.debug_struct("HandlerRegistry").field("opcodes", &opcodes).finish()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl HandlerRegistry {
    pub fn standard() -> Self {
        let mut handlers: HashMap<Opcode, PacketHandler> = HashMap::new();
        handlers.insert(Opcode::ClientUpdate, handle_client_update);
        handlers.insert(Opcode::Animation, handle_animation);
        handlers.insert(Opcode::ChannelMessage, handle_channel_message);
        handlers.insert(Opcode::RequestClientZoneChange, handle_zone_change);
        handlers.insert(Opcode::Camp, handle_camp);
        handlers.insert(Opcode::GmCommand, handle_gm_command);
        Self { handlers }
    }

    /// Splits off the opcode and runs its handler.
    pub fn dispatch(
        &self,
        state: &mut ZoneState,
        ctx: &HandlerContext<'_>,
        session: SessionId,
        data: &[u8],
    ) -> Result<Dispatch, ZoneError> {
        let Some((header, payload)) = data.split_first_chunk::<2>() else {
            return Err(ZoneError::ShortPacket {
                session,
                len: data.len(),
            });
        };
        let opcode = Opcode::from_u16(u16::from_le_bytes(*header));
        let Some(handler) = self.handlers.get(&opcode) else {
            return Ok(Dispatch::Unhandled(opcode));
        };
        handler(state, ctx, session, payload)?;
        Ok(Dispatch::Handled(opcode))
    }
}

fn caller(state: &ZoneState, session: SessionId) -> Result<EntityId, ZoneError> {
    state
        .client_entity(session)
        .ok_or(ZoneError::UnknownSession(session))
}

fn handle_client_update(
    state: &mut ZoneState,
    _ctx: &HandlerContext<'_>,
    session: SessionId,
    payload: &[u8],
) -> Result<(), ZoneError> {
    let update = ClientPositionUpdate::decode(payload)?;
    let id = caller(state, session)?;
    let entity = state.entity_mut(id).ok_or(ZoneError::UnknownSession(session))?;
    entity.mob.velocity = Velocity::between(entity.mob.position, update.position);
    let animation_changed =
        !update.animation.is_empty() && entity.mob.animation != update.animation;
    if animation_changed {
        entity.mob.animation = update.animation.clone();
    }
    state.mark_moved(id, update.position);
    if animation_changed {
        state.send_to_audience(
            id,
            &[id],
            &ServerMessage::Animation {
                spawn_id: id,
                animation: update.animation,
            },
            Opcode::Animation,
            Delivery::Data,
        );
    }
    Ok(())
}

fn handle_animation(
    state: &mut ZoneState,
    _ctx: &HandlerContext<'_>,
    session: SessionId,
    payload: &[u8],
) -> Result<(), ZoneError> {
    let request = EntityAnimation::decode(payload)?;
    let sender = caller(state, session)?;
    let target = EntityId(request.spawn_id);
    if state.entity(target).is_none() {
        tracing::debug!(zone = state.zone().id, entity = %target, "animation for unknown entity");
        return Ok(());
    }
    state.send_to_audience(
        target,
        &[target, sender],
        &ServerMessage::Animation {
            spawn_id: target,
            animation: request.animation,
        },
        Opcode::Animation,
        Delivery::Data,
    );
    Ok(())
}

fn handle_channel_message(
    state: &mut ZoneState,
    _ctx: &HandlerContext<'_>,
    session: SessionId,
    payload: &[u8],
) -> Result<(), ZoneError> {
    let request = ChannelMessageRequest::decode(payload)?;
    let id = caller(state, session)?;
    let sender = state
        .entity(id)
        .map(|entity| entity.mob.name.clone())
        .unwrap_or_default();
    if let Some(npc) = state.npc_named(&request.target) {
        let npc_name = state
            .entity(npc)
            .map(|entity| entity.mob.name.clone())
            .unwrap_or_default();
        let trigger = QuestTrigger {
            npc_name,
            kind: QuestEventKind::Say,
            actor: state.snapshot(id),
            receiver: state.snapshot(npc),
            payload: QuestPayload::Message(request.message.clone()),
        };
        state.triggers.push(trigger);
    }
    state.broadcast_channel(&sender, request.channel, &request.message);
    Ok(())
}

fn handle_zone_change(
    state: &mut ZoneState,
    _ctx: &HandlerContext<'_>,
    session: SessionId,
    _payload: &[u8],
) -> Result<(), ZoneError> {
    let id = caller(state, session)?;
    let character = state.character_snapshot(id);
    let entry = character
        .as_ref()
        .map(|record| record.position)
        .unwrap_or(state.zone().safe_point);

    state.send_to_session(
        session,
        ServerMessage::NewZone(state.zone().clone()),
        Opcode::NewZone,
        Delivery::Stream,
    );
    if let Some(character) = character {
        state.send_to_session(
            session,
            ServerMessage::PlayerProfile {
                spawn_id: id,
                character,
            },
            Opcode::PlayerProfile,
            Delivery::Stream,
        );
    }
    let npcs: Vec<SpawnInfo> = state
        .npcs
        .iter()
        .filter_map(|npc| state.spawn_info(*npc))
        .collect();
    state.send_to_session(
        session,
        ServerMessage::Spawns(npcs),
        Opcode::BatchZoneSpawns,
        Delivery::Stream,
    );

    state.register_new_client(id, entry);

    let Some(newcomer) = state.spawn_info(id) else {
        return Ok(());
    };
    let others: Vec<EntityId> = state
        .client_infos()
        .into_iter()
        .map(|client| client.entity)
        .filter(|other| *other != id)
        .collect();
    for other in others {
        state.send_to_entity(
            other,
            ServerMessage::Spawn(newcomer.clone()),
            Opcode::ZoneSpawns,
            Delivery::Stream,
        );
        if let Some(info) = state.spawn_info(other) {
            state.send_to_session(
                session,
                ServerMessage::Spawn(info),
                Opcode::ZoneSpawns,
                Delivery::Stream,
            );
        }
    }
    Ok(())
}

fn handle_camp(
    state: &mut ZoneState,
    _ctx: &HandlerContext<'_>,
    session: SessionId,
    _payload: &[u8],
) -> Result<(), ZoneError> {
    caller(state, session)?;
    state.remove_client(session);
    Ok(())
}

fn handle_gm_command(
    state: &mut ZoneState,
    ctx: &HandlerContext<'_>,
    session: SessionId,
    payload: &[u8],
) -> Result<(), ZoneError> {
    let request = CommandMessage::decode(payload)?;
    let entity = caller(state, session)?;
    let mut command = CommandContext {
        state,
        session,
        entity,
        zone: ctx.zone,
    };
    match ctx.commands.dispatch(&mut command, &request.command, &request.args) {
        Ok(true) => {}
        Ok(false) => {
            tracing::debug!(session = %session, command = %request.command, "unknown command");
        }
        Err(err) => {
            command.reply(&format!("{}: {}", request.command, err));
            tracing::debug!(session = %session, command = %request.command, error = %err, "command failed");
        }
    }
    Ok(())
}
