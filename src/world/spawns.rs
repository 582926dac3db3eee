use crate::entities::creature::EntityId;
use crate::entities::npc::NpcTemplate;
use crate::world::position::Position;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpawnPointId(pub u32);

impl std::fmt::Display for SpawnPointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One weighted choice in a spawn group. `template` is `None` when the
/// configured NPC type does not exist; such candidates are never picked.
#[derive(Debug, Clone)]
pub struct SpawnCandidate {
    pub npc_type: u32,
    pub chance: i32,
    pub template: Option<Arc<NpcTemplate>>,
}

#[derive(Debug, Clone)]
pub struct SpawnGroup {
    pub id: u32,
    pub name: String,
    pub candidates: Vec<SpawnCandidate>,
}

#[derive(Debug, Clone)]
pub struct SpawnPoint {
    pub id: SpawnPointId,
    pub position: Position,
    pub path_id: Option<u32>,
    pub respawn_delay: Duration,
    pub group: SpawnGroup,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpawnError {
    #[error("spawn group {group} has no valid candidates")]
    NoCandidates { group: u32 },
    #[error("spawn group {group} has non-positive total chance {total}")]
    InvalidWeight { group: u32, total: i64 },
}

impl SpawnGroup {
    pub fn total_chance(&self) -> i64 {
        self.valid_candidates()
            .map(|candidate| i64::from(candidate.chance))
            .sum()
    }

    fn valid_candidates(&self) -> impl DoubleEndedIterator<Item = &SpawnCandidate> {
        self.candidates
            .iter()
            .filter(|candidate| candidate.template.is_some())
    }

    /// Weighted draw over the valid candidates. A uniform roll in
    /// `[0, total)` selects the first candidate whose running sum exceeds it;
    /// the last valid candidate is the fallback.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&Arc<NpcTemplate>, SpawnError> {
        if self.valid_candidates().next().is_none() {
            return Err(SpawnError::NoCandidates { group: self.id });
        }
        let total = self.total_chance();
        if total <= 0 {
            return Err(SpawnError::InvalidWeight {
                group: self.id,
                total,
            });
        }
        let roll = rng.random_range(0..total);
        let mut running = 0i64;
        for candidate in self.valid_candidates() {
            running += i64::from(candidate.chance);
            if roll < running {
                if let Some(template) = candidate.template.as_ref() {
                    return Ok(template);
                }
            }
        }
        self.valid_candidates()
            .next_back()
            .and_then(|candidate| candidate.template.as_ref())
            .ok_or(SpawnError::NoCandidates { group: self.id })
    }
}

/// Respawn timers and occupancy for every spawn point of a zone.
#[derive(Debug, Default)]
pub struct SpawnSchedule {
    next_spawn: HashMap<SpawnPointId, Instant>,
    occupants: HashMap<SpawnPointId, EntityId>,
}

impl SpawnSchedule {
    /// Every point starts eligible at `now`.
    pub fn new<'a>(points: impl IntoIterator<Item = &'a SpawnPoint>, now: Instant) -> Self {
        Self {
            next_spawn: points.into_iter().map(|point| (point.id, now)).collect(),
            occupants: HashMap::new(),
        }
    }

    pub fn occupant(&self, point: SpawnPointId) -> Option<EntityId> {
        self.occupants.get(&point).copied()
    }

    pub fn next_spawn(&self, point: SpawnPointId) -> Option<Instant> {
        self.next_spawn.get(&point).copied()
    }

    pub fn is_due(&self, point: SpawnPointId, now: Instant) -> bool {
        self.next_spawn.get(&point).map_or(true, |due| now >= *due)
    }

    pub fn occupy(&mut self, point: SpawnPointId, npc: EntityId, recheck_at: Instant) {
        self.occupants.insert(point, npc);
        self.next_spawn.insert(point, recheck_at);
    }

    /// Frees whichever point `npc` occupies and schedules it for `respawn_at`.
    pub fn release(&mut self, npc: EntityId, respawn_at: Instant) -> Option<SpawnPointId> {
        let point = self
            .occupants
            .iter()
            .find(|(_, occupant)| **occupant == npc)
            .map(|(point, _)| *point)?;
        self.occupants.remove(&point);
        self.next_spawn.insert(point, respawn_at);
        Some(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn template(id: u32, name: &str) -> Arc<NpcTemplate> {
        Arc::new(NpcTemplate {
            id,
            name: name.to_string(),
            level: 1,
            race: 0,
            class: 0,
            gender: 0,
            hp: 10,
            mana: 0,
            ac: 0,
            run_speed: 1.0,
            path_id: None,
        })
    }

    fn group(entries: &[(u32, i32, bool)]) -> SpawnGroup {
        SpawnGroup {
            id: 42,
            name: "test_group".to_string(),
            candidates: entries
                .iter()
                .map(|(id, chance, known)| SpawnCandidate {
                    npc_type: *id,
                    chance: *chance,
                    template: known.then(|| template(*id, &format!("npc{id}"))),
                })
                .collect(),
        }
    }

    #[test]
    fn weighted_pick_converges_to_weights() {
        let group = group(&[(1, 1, true), (2, 1, true), (3, 2, true)]);
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let draws = 20_000;
        let mut counts = [0usize; 3];
        for _ in 0..draws {
            let picked = group.pick(&mut rng).expect("pick");
            counts[(picked.id - 1) as usize] += 1;
        }
        let share_c = counts[2] as f64 / draws as f64;
        let share_a = counts[0] as f64 / draws as f64;
        assert!((share_c - 0.5).abs() < 0.02, "share of C was {share_c}");
        assert!((share_a - 0.25).abs() < 0.02, "share of A was {share_a}");
    }

    #[test]
    fn zero_total_weight_is_reported() {
        let group = group(&[(1, 0, true), (2, 0, true)]);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            group.pick(&mut rng).map(|template| template.id),
            Err(SpawnError::InvalidWeight { group: 42, total: 0 })
        );
        let negative = self::group(&[(1, -5, true), (2, 2, true)]);
        assert!(matches!(
            negative.pick(&mut rng),
            Err(SpawnError::InvalidWeight { total: -3, .. })
        ));
    }

    #[test]
    fn empty_or_unknown_candidates_are_reported() {
        let mut rng = StdRng::seed_from_u64(2);
        assert!(matches!(group(&[]).pick(&mut rng), Err(SpawnError::NoCandidates { group: 42 })));
        assert!(matches!(
            group(&[(9, 10, false)]).pick(&mut rng),
            Err(SpawnError::NoCandidates { .. })
        ));
    }

    #[test]
    fn unknown_templates_are_skipped() {
        let group = group(&[(1, 50, false), (2, 5, true)]);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            assert_eq!(group.pick(&mut rng).expect("pick").id, 2);
        }
        assert_eq!(group.total_chance(), 5);
    }

    #[test]
    fn schedule_tracks_occupancy_and_timers() {
        let now = Instant::now();
        let point = SpawnPoint {
            id: SpawnPointId(5),
            position: Position::default(),
            path_id: None,
            respawn_delay: Duration::from_secs(30),
            group: group(&[(1, 1, true)]),
        };
        let mut schedule = SpawnSchedule::new([&point], now);
        assert!(schedule.is_due(point.id, now));

        schedule.occupy(point.id, EntityId(11), now + Duration::from_secs(86_400));
        assert_eq!(schedule.occupant(point.id), Some(EntityId(11)));
        assert!(!schedule.is_due(point.id, now + Duration::from_secs(60)));

        let respawn_at = now + point.respawn_delay;
        assert_eq!(schedule.release(EntityId(11), respawn_at), Some(point.id));
        assert_eq!(schedule.occupant(point.id), None);
        assert_eq!(schedule.next_spawn(point.id), Some(respawn_at));
        assert!(schedule.is_due(point.id, respawn_at));
        assert_eq!(schedule.release(EntityId(11), respawn_at), None);
    }
}
