use crate::entities::npc::NpcTemplate;
use crate::world::paths::{GridPath, WaypointRow};
use crate::world::position::Position;
use crate::world::spawns::{SpawnCandidate, SpawnGroup, SpawnPoint, SpawnPointId};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("zone {0} not found")]
    NotFound(u32),
    #[error("spawn point {spawn_point} references unknown path {path_id}")]
    UnknownPath { spawn_point: u32, path_id: u32 },
    #[error("npc type {npc_type} references unknown path {path_id}")]
    UnknownTemplatePath { npc_type: u32, path_id: u32 },
    #[error("spawn point {0} defined twice")]
    DuplicateSpawnPoint(u32),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ZoneRecord {
    pub id: u32,
    pub short_name: String,
    #[serde(default)]
    pub long_name: String,
    #[serde(default)]
    pub safe_point: Position,
}

/// Everything a zone instance needs from static data, resolved and
/// cross-checked. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct ZoneData {
    pub zone: ZoneRecord,
    pub templates: HashMap<u32, Arc<NpcTemplate>>,
    pub paths: HashMap<u32, Arc<GridPath>>,
    pub spawn_points: Vec<SpawnPoint>,
    pub warnings: Vec<String>,
}

pub trait ZoneDataSource: Send + Sync {
    fn load_zone(&self, zone_id: u32) -> Result<ZoneData, DataError>;
}

#[derive(Debug, Deserialize)]
struct ZoneFile {
    zone: ZoneRecord,
    #[serde(default)]
    npc_types: Vec<NpcTemplate>,
    #[serde(default)]
    paths: Vec<PathRow>,
    #[serde(default)]
    spawn_points: Vec<SpawnPointRow>,
}

#[derive(Debug, Deserialize)]
struct PathRow {
    id: u32,
    #[serde(default)]
    waypoints: Vec<WaypointRow>,
}

#[derive(Debug, Deserialize)]
struct SpawnPointRow {
    id: u32,
    x: f64,
    y: f64,
    z: f64,
    #[serde(default)]
    heading: f64,
    #[serde(default)]
    path_id: Option<u32>,
    #[serde(default)]
    respawn_ms: u64,
    group: SpawnGroupRow,
}

#[derive(Debug, Deserialize)]
struct SpawnGroupRow {
    id: u32,
    #[serde(default)]
    name: String,
    #[serde(default)]
    entries: Vec<SpawnEntryRow>,
}

#[derive(Debug, Deserialize)]
struct SpawnEntryRow {
    npc_type: u32,
    chance: i32,
}

impl ZoneData {
    pub fn from_yaml_str(text: &str, origin: &Path) -> Result<Self, DataError> {
        let file: ZoneFile = serde_yaml::from_str(text).map_err(|source| DataError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        file.resolve()
    }

    pub fn load_file(path: &Path) -> Result<Self, DataError> {
        let text = fs::read_to_string(path).map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text, path)
    }

    /// Path for an NPC: the spawn point's own path wins over the template's.
    pub fn path_for(&self, point: &SpawnPoint, template: &NpcTemplate) -> Option<Arc<GridPath>> {
        point
            .path_id
            .or(template.path_id)
            .and_then(|id| self.paths.get(&id).cloned())
    }
}

fn non_zero(id: Option<u32>) -> Option<u32> {
    id.filter(|value| *value != 0)
}

impl ZoneFile {
    fn resolve(self) -> Result<ZoneData, DataError> {
        let mut warnings = Vec::new();
        let paths: HashMap<u32, Arc<GridPath>> = self
            .paths
            .iter()
            .map(|row| (row.id, Arc::new(GridPath::from_rows(row.id, &row.waypoints))))
            .collect();

        let mut templates = HashMap::new();
        for mut template in self.npc_types {
            template.path_id = non_zero(template.path_id);
            if let Some(path_id) = template.path_id {
                if !paths.contains_key(&path_id) {
                    return Err(DataError::UnknownTemplatePath {
                        npc_type: template.id,
                        path_id,
                    });
                }
            }
            templates.insert(template.id, Arc::new(template));
        }

        let mut seen = HashSet::new();
        let mut spawn_points = Vec::with_capacity(self.spawn_points.len());
        for row in self.spawn_points {
            if !seen.insert(row.id) {
                return Err(DataError::DuplicateSpawnPoint(row.id));
            }
            let path_id = non_zero(row.path_id);
            if let Some(path_id) = path_id {
                if !paths.contains_key(&path_id) {
                    return Err(DataError::UnknownPath {
                        spawn_point: row.id,
                        path_id,
                    });
                }
            }
            let candidates = row
                .group
                .entries
                .iter()
                .map(|entry| {
                    let template = templates.get(&entry.npc_type).cloned();
                    if template.is_none() {
                        warnings.push(format!(
                            "spawn point {} group {} names unknown npc type {}",
                            row.id, row.group.id, entry.npc_type
                        ));
                    }
                    SpawnCandidate {
                        npc_type: entry.npc_type,
                        chance: entry.chance,
                        template,
                    }
                })
                .collect();
            spawn_points.push(SpawnPoint {
                id: SpawnPointId(row.id),
                position: Position::new(row.x, row.y, row.z).with_heading(row.heading),
                path_id,
                respawn_delay: Duration::from_millis(row.respawn_ms),
                group: SpawnGroup {
                    id: row.group.id,
                    name: row.group.name,
                    candidates,
                },
            });
        }
        spawn_points.sort_by_key(|point| point.id);

        Ok(ZoneData {
            zone: self.zone,
            templates,
            paths,
            spawn_points,
            warnings,
        })
    }
}

/// Reads `<root>/zones/*.yaml`, one zone per file.
#[derive(Debug, Clone)]
pub struct YamlZoneDataSource {
    dir: PathBuf,
}

impl YamlZoneDataSource {
    pub fn from_root(root: &Path) -> Self {
        Self {
            dir: root.join("zones"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn zone_files(&self) -> Result<Vec<PathBuf>, DataError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| DataError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map_or(false, |ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
            })
            .collect();
        files.sort();
        Ok(files)
    }

    pub fn load_all(&self) -> Result<Vec<(PathBuf, Result<ZoneData, DataError>)>, DataError> {
        Ok(self
            .zone_files()?
            .into_iter()
            .map(|path| {
                let loaded = ZoneData::load_file(&path);
                (path, loaded)
            })
            .collect())
    }
}

impl ZoneDataSource for YamlZoneDataSource {
    fn load_zone(&self, zone_id: u32) -> Result<ZoneData, DataError> {
        for path in self.zone_files()? {
            match ZoneData::load_file(&path) {
                Ok(data) if data.zone.id == zone_id => return Ok(data),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(zone_id, path = %path.display(), error = %err, "skipping unreadable zone file");
                }
            }
        }
        Err(DataError::NotFound(zone_id))
    }
}

/// Pre-built zone data keyed by zone id.
#[derive(Debug, Clone, Default)]
pub struct StaticZoneSource {
    zones: HashMap<u32, ZoneData>,
}

impl StaticZoneSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zone(mut self, data: ZoneData) -> Self {
        self.zones.insert(data.zone.id, data);
        self
    }
}

impl ZoneDataSource for StaticZoneSource {
    fn load_zone(&self, zone_id: u32) -> Result<ZoneData, DataError> {
        self.zones
            .get(&zone_id)
            .cloned()
            .ok_or(DataError::NotFound(zone_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QEYNOS: &str = r#"
zone:
  id: 1
  short_name: qeynos
  long_name: South Qeynos
  safe_point: { x: 10, y: 20, z: 0 }
npc_types:
  - { id: 100, name: Guard_Gehnus, level: 20, hp: 500, run_speed: 1.2, path_id: 7 }
  - { id: 101, name: a_rat, hp: 10 }
paths:
  - id: 7
    waypoints:
      - { x: 0, y: 0, z: 0, pause: 2 }
      - { x: 100, y: 0, z: 0 }
  - id: 8
    waypoints:
      - { x: 5, y: 5, z: 0 }
spawn_points:
  - id: 2
    x: 50
    y: 50
    z: 0
    respawn_ms: 30000
    group:
      id: 11
      name: rats
      entries:
        - { npc_type: 101, chance: 3 }
        - { npc_type: 999, chance: 1 }
  - id: 1
    x: 0
    y: 0
    z: 0
    path_id: 8
    respawn_ms: 60000
    group:
      id: 10
      entries:
        - { npc_type: 100, chance: 1 }
"#;

    fn load(text: &str) -> Result<ZoneData, DataError> {
        ZoneData::from_yaml_str(text, Path::new("test.yaml"))
    }

    #[test]
    fn resolves_templates_paths_and_spawn_points() {
        let data = load(QEYNOS).expect("zone");
        assert_eq!(data.zone.short_name, "qeynos");
        assert_eq!(data.zone.safe_point, Position::new(10.0, 20.0, 0.0));
        assert_eq!(data.templates.len(), 2);
        assert_eq!(data.paths[&7].len(), 2);
        let ids: Vec<u32> = data.spawn_points.iter().map(|point| point.id.0).collect();
        assert_eq!(ids, vec![1, 2]);
        let rats = &data.spawn_points[1];
        assert_eq!(rats.respawn_delay, Duration::from_secs(30));
        assert_eq!(rats.group.total_chance(), 3);
        assert_eq!(data.warnings.len(), 1);
        assert!(data.warnings[0].contains("999"));
    }

    #[test]
    fn spawn_point_path_overrides_template_path() {
        let data = load(QEYNOS).expect("zone");
        let guard = data.templates[&100].clone();
        let point = &data.spawn_points[0];
        assert_eq!(data.path_for(point, &guard).map(|path| path.id), Some(8));
        let rats = &data.spawn_points[1];
        assert_eq!(data.path_for(rats, &guard).map(|path| path.id), Some(7));
        let rat = data.templates[&101].clone();
        assert!(data.path_for(rats, &rat).is_none());
    }

    #[test]
    fn unknown_spawn_path_is_fatal() {
        let text = QEYNOS.replace("path_id: 8", "path_id: 55");
        assert!(matches!(
            load(&text),
            Err(DataError::UnknownPath { spawn_point: 1, path_id: 55 })
        ));
    }

    #[test]
    fn malformed_yaml_is_fatal() {
        assert!(matches!(load("zone: [oops"), Err(DataError::Parse { .. })));
    }

    #[test]
    fn yaml_source_finds_zone_by_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let zones = dir.path().join("zones");
        fs::create_dir_all(&zones).expect("zones dir");
        fs::write(zones.join("qeynos.yaml"), QEYNOS).expect("write");
        fs::write(zones.join("broken.yaml"), "zone: [").expect("write");
        fs::write(zones.join("notes.txt"), "ignored").expect("write");

        let source = YamlZoneDataSource::from_root(dir.path());
        assert_eq!(source.zone_files().expect("files").len(), 2);
        assert_eq!(source.load_zone(1).expect("zone 1").zone.id, 1);
        assert!(matches!(source.load_zone(2), Err(DataError::NotFound(2))));
    }

    #[test]
    fn missing_zone_dir_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = YamlZoneDataSource::from_root(dir.path());
        assert!(matches!(source.load_zone(1), Err(DataError::Io { .. })));
    }
}
