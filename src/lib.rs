pub mod admin;
pub mod config;
pub mod entities;
pub mod net;
pub mod persistence;
pub mod scripting;
pub mod telemetry;
pub mod world;
pub mod zone;

pub use net::packet::{PacketReader, PacketWriter};
pub use net::session::{Session, SessionError, SessionId};
pub use zone::{ZoneError, ZoneHandle, ZoneInstance, ZoneManager, ZoneServices, ZoneTask};

use admin::console::{execute, parse_console_command, ConsoleOutcome};
use config::{AppConfig, ConfigError};
use persistence::store::YamlCharacterStore;
use std::io::BufRead;
use std::sync::Arc;
use telemetry::logging::LogError;
use thiserror::Error;
use world::zone_data::{DataError, YamlZoneDataSource};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Log(#[from] LogError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error("no zone could be started")]
    NoZones,
}

/// Zone ids to start: every loadable zone, or only those whose short
/// name was asked for.
fn resolve_zone_ids(source: &YamlZoneDataSource, wanted: &[String]) -> Result<Vec<u32>, DataError> {
    let mut ids = Vec::new();
    let mut seen = Vec::new();
    for (path, loaded) in source.load_all()? {
        let data = match loaded {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "zone file skipped");
                continue;
            }
        };
        let short_name = data.zone.short_name.to_ascii_lowercase();
        if wanted.is_empty() || wanted.contains(&short_name) {
            ids.push(data.zone.id);
            seen.push(short_name);
        }
    }
    for name in wanted.iter().filter(|name| !seen.contains(name)) {
        tracing::warn!(zone = %name, "requested zone not found");
    }
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

pub fn run(args: &[String]) -> Result<(), RunError> {
    let config = AppConfig::from_args(args)?;
    let log_path = telemetry::logging::init(&config.root)?;
    let zone_config = config.zone_config()?;
    let source = YamlZoneDataSource::from_root(&config.root);
    let zone_ids = resolve_zone_ids(&source, &config.zones)?;

    println!("zonesim: starting");
    println!("- root: {}", config.root.display());
    println!("- log: {}", log_path.display());
    println!("- zone dir: {}", source.dir().display());
    println!("- cell size: {}", zone_config.cell_size);
    if zone_config.autosave_secs > 0 {
        println!("- autosave: every {}s", zone_config.autosave_secs);
    } else {
        println!("- autosave: disabled");
    }

    let store = Arc::new(YamlCharacterStore::from_root(&config.root));
    let manager = ZoneManager::new(ZoneServices::new(Arc::new(source), store, zone_config));
    for zone_id in zone_ids {
        match manager.get_or_create(zone_id, 0) {
            Ok(zone) => println!(
                "- zone {} ({}): {} npcs",
                zone.zone_id(),
                zone.short_name(),
                zone.npcs().len()
            ),
            Err(err) => eprintln!("zonesim: zone {zone_id} failed: {err}"),
        }
    }
    if manager.is_empty() {
        return Err(RunError::NoZones);
    }

    println!("zonesim: console ready (!zones, !npcs <zone>, !shutdown)");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(error = %err, "console read failed");
                break;
            }
        };
        let command = match parse_console_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                eprintln!("zonesim: {err}");
                continue;
            }
        };
        match execute(&manager, command) {
            ConsoleOutcome::Continue(lines) => {
                for line in lines {
                    println!("{line}");
                }
            }
            ConsoleOutcome::Shutdown => break,
        }
    }

    manager.shutdown();
    println!("zonesim: stopped");
    Ok(())
}
