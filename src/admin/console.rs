use crate::entities::creature::EntityId;
use crate::zone::backlog::ZoneTask;
use crate::zone::manager::ZoneManager;

/// Operator commands typed on the server's stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Zones,
    Start { zone: u32, instance: u32 },
    Npcs { zone: u32, instance: u32 },
    Clients { zone: u32, instance: u32 },
    Broadcast { zone: u32, instance: u32, message: String },
    Despawn { zone: u32, instance: u32, npc: EntityId },
    Shutdown,
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleOutcome {
    Continue(Vec<String>),
    Shutdown,
}

/// Lines without the `!` prefix are not commands.
pub fn parse_console_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let trimmed = line.trim();
    let Some(body) = trimmed.strip_prefix('!') else {
        return Ok(None);
    };
    let mut parts = body.split_whitespace();
    let command = parts
        .next()
        .ok_or_else(|| "console command missing name".to_string())?
        .to_ascii_lowercase();
    let parsed = match command.as_str() {
        "zones" | "online" => ConsoleCommand::Zones,
        "start" => {
            let (zone, instance) = parse_target(&mut parts)?;
            ConsoleCommand::Start { zone, instance }
        }
        "npcs" => {
            let (zone, instance) = parse_target(&mut parts)?;
            ConsoleCommand::Npcs { zone, instance }
        }
        "clients" => {
            let (zone, instance) = parse_target(&mut parts)?;
            ConsoleCommand::Clients { zone, instance }
        }
        "broadcast" | "say" => {
            let (zone, instance) = parse_target(&mut parts)?;
            let message = parts.collect::<Vec<_>>().join(" ");
            if message.is_empty() {
                return Err("console command missing message".to_string());
            }
            ConsoleCommand::Broadcast {
                zone,
                instance,
                message,
            }
        }
        "despawn" => {
            let (zone, instance) = parse_target(&mut parts)?;
            let npc = parse_u32(parts.next(), "npc id")?;
            ConsoleCommand::Despawn {
                zone,
                instance,
                npc: EntityId(npc),
            }
        }
        "shutdown" | "quit" => ConsoleCommand::Shutdown,
        _ => ConsoleCommand::Unknown(command),
    };
    Ok(Some(parsed))
}

/// Accepts `<zone>` or `<zone>:<instance>`.
fn parse_target<'a>(parts: &mut impl Iterator<Item = &'a str>) -> Result<(u32, u32), String> {
    let target = parts
        .next()
        .ok_or_else(|| "console command missing zone id".to_string())?;
    match target.split_once(':') {
        Some((zone, instance)) => Ok((
            parse_u32(Some(zone), "zone id")?,
            parse_u32(Some(instance), "instance id")?,
        )),
        None => Ok((parse_u32(Some(target), "zone id")?, 0)),
    }
}

fn parse_u32(value: Option<&str>, what: &str) -> Result<u32, String> {
    let value = value.ok_or_else(|| format!("console command missing {what}"))?;
    value
        .parse::<u32>()
        .map_err(|_| format!("console command expected {what}, got '{value}'"))
}

pub fn execute(manager: &ZoneManager, command: ConsoleCommand) -> ConsoleOutcome {
    let lines = match command {
        ConsoleCommand::Shutdown => return ConsoleOutcome::Shutdown,
        ConsoleCommand::Zones => {
            let zones = manager.running();
            if zones.is_empty() {
                vec!["no zones running".to_string()]
            } else {
                zones
                    .iter()
                    .map(|zone| {
                        format!(
                            "{}:{} {} clients={} npcs={} backlog={}",
                            zone.zone_id(),
                            zone.instance_id(),
                            zone.short_name(),
                            zone.clients().len(),
                            zone.npcs().len(),
                            zone.backlog_len()
                        )
                    })
                    .collect()
            }
        }
        ConsoleCommand::Start { zone, instance } => match manager.get_or_create(zone, instance) {
            Ok(running) => vec![format!("zone {}:{} {} running", zone, instance, running.short_name())],
            Err(err) => vec![format!("zone {zone}:{instance} failed: {err}")],
        },
        ConsoleCommand::Npcs { zone, instance } => match manager.get(zone, instance) {
            Some(running) => running
                .npcs()
                .iter()
                .map(|npc| {
                    format!(
                        "{} {} lvl {} at ({:.1}, {:.1}, {:.1})",
                        npc.id, npc.name, npc.level, npc.position.x, npc.position.y, npc.position.z
                    )
                })
                .collect(),
            None => vec![not_running(zone, instance)],
        },
        ConsoleCommand::Clients { zone, instance } => match manager.get(zone, instance) {
            Some(running) => running
                .clients()
                .iter()
                .map(|client| format!("session {} entity {}", client.session, client.entity))
                .collect(),
            None => vec![not_running(zone, instance)],
        },
        ConsoleCommand::Broadcast {
            zone,
            instance,
            message,
        } => match manager.get(zone, instance) {
            Some(running) => {
                running.submit(ZoneTask::Broadcast { message });
                vec!["broadcast queued".to_string()]
            }
            None => vec![not_running(zone, instance)],
        },
        ConsoleCommand::Despawn { zone, instance, npc } => match manager.get(zone, instance) {
            Some(running) => {
                running.submit(ZoneTask::Despawn { npc });
                vec![format!("despawn of {npc} queued")]
            }
            None => vec![not_running(zone, instance)],
        },
        ConsoleCommand::Unknown(name) => vec![format!("unknown console command '{name}'")],
    };
    ConsoleOutcome::Continue(lines)
}

fn not_running(zone: u32, instance: u32) -> String {
    format!("zone {zone}:{instance} is not running")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZoneConfig;
    use crate::persistence::store::MemoryCharacterStore;
    use crate::world::zone_data::StaticZoneSource;
    use crate::zone::instance::ZoneServices;
    use crate::zone::testing::{zone_data, PATROL_ZONE};
    use std::sync::Arc;

    #[test]
    fn ignores_plain_text() {
        assert_eq!(parse_console_command("hello"), Ok(None));
    }

    #[test]
    fn parses_targets_with_and_without_instance() {
        assert_eq!(
            parse_console_command("!npcs 2"),
            Ok(Some(ConsoleCommand::Npcs { zone: 2, instance: 0 }))
        );
        assert_eq!(
            parse_console_command("!DESPAWN 2:1 14"),
            Ok(Some(ConsoleCommand::Despawn {
                zone: 2,
                instance: 1,
                npc: EntityId(14)
            }))
        );
    }

    #[test]
    fn broadcast_keeps_full_message() {
        assert_eq!(
            parse_console_command("!broadcast 2 server restarts soon"),
            Ok(Some(ConsoleCommand::Broadcast {
                zone: 2,
                instance: 0,
                message: "server restarts soon".to_string()
            }))
        );
        assert!(parse_console_command("!broadcast 2").is_err());
    }

    #[test]
    fn rejects_bad_numbers_and_reports_unknown() {
        assert!(parse_console_command("!npcs two").is_err());
        assert!(parse_console_command("!").is_err());
        assert_eq!(
            parse_console_command("!fly"),
            Ok(Some(ConsoleCommand::Unknown("fly".to_string())))
        );
    }

    #[test]
    fn execute_reports_running_zones() {
        let source = StaticZoneSource::new().with_zone(zone_data(PATROL_ZONE));
        let manager = ZoneManager::new(
            ZoneServices::new(
                Arc::new(source),
                Arc::new(MemoryCharacterStore::new()),
                ZoneConfig::default(),
            )
            .with_rng_seed(3),
        );
        assert_eq!(
            execute(&manager, ConsoleCommand::Zones),
            ConsoleOutcome::Continue(vec!["no zones running".to_string()])
        );
        execute(&manager, ConsoleCommand::Start { zone: 2, instance: 0 });
        match execute(&manager, ConsoleCommand::Npcs { zone: 2, instance: 0 }) {
            ConsoleOutcome::Continue(lines) => assert_eq!(lines.len(), 2),
            ConsoleOutcome::Shutdown => panic!("unexpected shutdown"),
        }
        assert_eq!(execute(&manager, ConsoleCommand::Shutdown), ConsoleOutcome::Shutdown);
        manager.shutdown();
    }
}
