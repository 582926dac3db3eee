use crate::entities::creature::EntityId;
use crate::entities::stats::Stats;
use crate::net::messages::ServerMessage;
use crate::net::opcodes::Opcode;
use crate::net::session::SessionId;
use crate::zone::backlog::{ZoneHandle, ZoneTask};
use crate::zone::state::{Delivery, ZoneState};
use base64::Engine;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 50;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("missing argument <{0}>")]
    MissingArgument(&'static str),
    #[error("invalid {name} '{value}'")]
    InvalidArgument { name: &'static str, value: String },
    #[error("{name} must be between {min} and {max}")]
    OutOfRange { name: &'static str, min: u32, max: u32 },
    #[error("caller has no entity in this zone")]
    NoCaller,
    #[error("command link encode failed: {0}")]
    Link(#[from] serde_json::Error),
}

/// What a command body may touch: the zone state it runs under, the
/// caller, and the zone handle for deferred work.
pub struct CommandContext<'a> {
    pub state: &'a mut ZoneState,
    pub session: SessionId,
    pub entity: EntityId,
    pub zone: &'a ZoneHandle,
}

impl CommandContext<'_> {
    /// System-channel reply to the caller only.
    pub fn reply(&self, text: &str) {
        self.state.send_to_session(
            self.session,
            ServerMessage::ChannelMessage {
                sender: String::new(),
                channel: -1,
                message: text.to_string(),
            },
            Opcode::ChannelMessage,
            Delivery::Stream,
        );
    }
}

pub type CommandHandler = fn(&mut CommandContext<'_>, &[String]) -> Result<(), CommandError>;

/// Lowercase command name -> handler. Built once per zone.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, CommandHandler>,
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("level", command_level);
        registry.register("where", command_where);
        registry.register("npcs", command_npcs);
        registry.register("despawn", command_despawn);
        registry
    }

    pub fn register(&mut self, name: &str, handler: CommandHandler) {
        self.handlers.insert(name.trim().to_ascii_lowercase(), handler);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(&name.trim().to_ascii_lowercase())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Runs `command`; `Ok(false)` when no such command exists.
    pub fn dispatch(
        &self,
        ctx: &mut CommandContext<'_>,
        command: &str,
        args: &[String],
    ) -> Result<bool, CommandError> {
        let name = command.trim().trim_start_matches(['#', '/']).to_ascii_lowercase();
        let Some(handler) = self.handlers.get(&name) else {
            return Ok(false);
        };
        handler(ctx, args)?;
        Ok(true)
    }
}

#[derive(Debug, Serialize)]
struct CommandLink<'a> {
    #[serde(rename = "linkType")]
    link_type: &'a str,
    label: &'a str,
    data: &'a str,
}

/// `{{base64(json)}}` token clients render as a clickable link.
pub fn command_link(link_type: &str, label: &str, data: &str) -> Result<String, CommandError> {
    let json = serde_json::to_string(&CommandLink {
        link_type,
        label,
        data,
    })?;
    Ok(format!(
        "{{{{{}}}}}",
        base64::engine::general_purpose::STANDARD.encode(json)
    ))
}

fn required<'a>(args: &'a [String], index: usize, name: &'static str) -> Result<&'a str, CommandError> {
    args.get(index)
        .map(|arg| arg.trim())
        .filter(|arg| !arg.is_empty())
        .ok_or(CommandError::MissingArgument(name))
}

fn command_level(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<(), CommandError> {
    let value = required(args, 0, "level")?;
    let level: u32 = value.parse().map_err(|_| CommandError::InvalidArgument {
        name: "level",
        value: value.to_string(),
    })?;
    if !(u32::from(MIN_LEVEL)..=u32::from(MAX_LEVEL)).contains(&level) {
        return Err(CommandError::OutOfRange {
            name: "level",
            min: MIN_LEVEL.into(),
            max: MAX_LEVEL.into(),
        });
    }
    let level = level as u8;
    let entity = ctx.state.entity_mut(ctx.entity).ok_or(CommandError::NoCaller)?;
    entity.mob.level = level;
    entity.mob.stats = Stats::for_level(level);
    let experience = match entity.as_player_mut().and_then(|player| player.character.as_mut()) {
        Some(record) => {
            record.level = level;
            record.experience
        }
        None => 0,
    };
    ctx.state.send_to_session(
        ctx.session,
        ServerMessage::LevelUpdate { level, experience },
        Opcode::LevelUpdate,
        Delivery::Data,
    );
    Ok(())
}

fn command_where(ctx: &mut CommandContext<'_>, _args: &[String]) -> Result<(), CommandError> {
    let snapshot = ctx.state.snapshot(ctx.entity).ok_or(CommandError::NoCaller)?;
    let position = snapshot.position;
    let cell = snapshot.cell;
    ctx.reply(&format!(
        "{} ({}): {:.1}, {:.1}, {:.1} heading {:.1} cell ({}, {}, {})",
        ctx.state.zone().long_name,
        ctx.state.zone().short_name,
        position.x,
        position.y,
        position.z,
        position.heading,
        cell.x,
        cell.y,
        cell.z
    ));
    Ok(())
}

fn command_npcs(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<(), CommandError> {
    let filter = args.join(" ").trim().to_ascii_lowercase();
    let mut npcs = ctx.state.npc_snapshots();
    npcs.retain(|npc| filter.is_empty() || npc.name.to_ascii_lowercase().contains(&filter));
    if npcs.is_empty() {
        ctx.reply("no npcs match");
        return Ok(());
    }
    for npc in npcs {
        let despawn = command_link("command", "despawn", &format!("#despawn {}", npc.id))?;
        ctx.reply(&format!(
            "{} {} lvl {} at {:.0}, {:.0}, {:.0} {}",
            npc.id,
            npc.name.replace('_', " "),
            npc.level,
            npc.position.x,
            npc.position.y,
            npc.position.z,
            despawn
        ));
    }
    Ok(())
}

fn command_despawn(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<(), CommandError> {
    let value = required(args, 0, "npc id")?;
    let id: u32 = value.parse().map_err(|_| CommandError::InvalidArgument {
        name: "npc id",
        value: value.to_string(),
    })?;
    ctx.zone.submit(ZoneTask::Despawn { npc: EntityId(id) });
    ctx.reply(&format!("despawn queued for {id}"));
    Ok(())
}
