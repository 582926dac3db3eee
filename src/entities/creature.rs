use crate::entities::npc::NpcState;
use crate::entities::player::PlayerState;
use crate::entities::stats::Stats;
use crate::world::position::{Position, Velocity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Player,
    Npc,
    Corpse,
}

pub const ANIMATION_IDLE: &str = "Idle1";
pub const ANIMATION_WALKING: &str = "Walking";

/// State shared by every simulated thing in a zone.
#[derive(Debug, Clone, PartialEq)]
pub struct Mob {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub position: Position,
    pub velocity: Velocity,
    pub animation: String,
    pub speed: f32,
    pub level: u8,
    pub stats: Stats,
    dirty: bool,
}

impl Mob {
    pub fn new(id: EntityId, name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            position: Position::default(),
            velocity: Velocity::ZERO,
            animation: String::new(),
            speed: 0.0,
            level: 1,
            stats: Stats::default(),
            dirty: false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flags the mob; returns true only on the clean-to-dirty transition.
    pub fn mark_dirty(&mut self) -> bool {
        let newly = !self.dirty;
        self.dirty = true;
        newly
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Display name: underscores become spaces.
    pub fn clean_name(&self) -> String {
        self.name.replace('_', " ")
    }

    /// Animation tag carried in position batches. NPCs derive it from
    /// velocity; players animate through explicit animation packets.
    pub fn broadcast_animation(&self) -> &str {
        match self.kind {
            EntityKind::Npc if self.velocity.is_zero() => ANIMATION_IDLE,
            EntityKind::Npc => ANIMATION_WALKING,
            _ => "",
        }
    }
}

#[derive(Debug, Clone)]
pub enum EntityBody {
    Player(PlayerState),
    Npc(NpcState),
    Corpse,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub mob: Mob,
    pub body: EntityBody,
}

impl Entity {
    pub fn id(&self) -> EntityId {
        self.mob.id
    }

    pub fn kind(&self) -> EntityKind {
        self.mob.kind
    }

    pub fn position(&self) -> Position {
        self.mob.position
    }

    pub fn as_npc(&self) -> Option<&NpcState> {
        match &self.body {
            EntityBody::Npc(npc) => Some(npc),
            _ => None,
        }
    }

    pub fn as_player(&self) -> Option<&PlayerState> {
        match &self.body {
            EntityBody::Player(player) => Some(player),
            _ => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut PlayerState> {
        match &mut self.body {
            EntityBody::Player(player) => Some(player),
            _ => None,
        }
    }

    /// Splits the borrow so movement can update the mob and path state together.
    pub fn npc_parts_mut(&mut self) -> Option<(&mut Mob, &mut NpcState)> {
        match &mut self.body {
            EntityBody::Npc(npc) => Some((&mut self.mob, npc)),
            _ => None,
        }
    }
}
