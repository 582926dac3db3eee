use crate::entities::creature::Mob;
use crate::entities::npc::NpcState;
use crate::world::paths::GridPath;
use crate::world::position::Velocity;
use std::time::Instant;

/// Fixed multiplier applied to template run speed, in world units per second.
pub const DEFAULT_MOVEMENT_SCALE: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepOutcome {
    /// The mob moved, or just came to a stop, and must be broadcast.
    pub moved: bool,
    /// Index of the waypoint reached during this step.
    pub arrived: Option<usize>,
}

/// Advances one NPC along its patrol path.
///
/// Paused NPCs only refresh their timestamp. Otherwise the NPC walks
/// `speed * scale * elapsed` units toward the current waypoint, snapping onto
/// it when the step would overshoot. Arrival zeroes velocity, starts the
/// waypoint's pause and advances the index cyclically.
pub fn step_npc(mob: &mut Mob, npc: &mut NpcState, now: Instant, scale: f64) -> StepOutcome {
    let Some(path) = npc.path.clone() else {
        return StepOutcome::default();
    };
    if path.is_empty() {
        return StepOutcome::default();
    }
    if npc.is_paused(now) {
        npc.last_update = now;
        return StepOutcome::default();
    }
    let Some(target) = path.get(npc.path_index).map(|waypoint| waypoint.position) else {
        npc.path_index = 0;
        return StepOutcome::default();
    };

    let elapsed = now.saturating_duration_since(npc.last_update).as_secs_f64();
    npc.last_update = now;

    let old_position = mob.position;
    let old_velocity = mob.velocity;
    let remaining = old_position.delta_to(target);
    let mut arrived = None;

    if remaining.length_squared() == 0.0 {
        mob.velocity = Velocity::ZERO;
        arrived = Some(arrive(npc, &path, now));
    } else if elapsed > 0.0 {
        let distance = remaining.length();
        let step = f64::from(mob.speed) * scale * elapsed;
        if step >= distance {
            mob.position.x = target.x;
            mob.position.y = target.y;
            mob.position.z = target.z;
            arrived = Some(arrive(npc, &path, now));
        } else {
            mob.position = old_position.offset(remaining, step / distance);
        }
        let displacement = old_position.delta_to(mob.position);
        if displacement.length_squared() > 0.0 {
            mob.position.heading = displacement.heading_degrees();
        }
        mob.velocity = if arrived.is_some() {
            Velocity::ZERO
        } else {
            displacement.per_second(elapsed)
        };
    }

    let stopped = !old_velocity.is_zero() && mob.velocity.is_zero();
    let relocated = !mob.position.same_place(old_position);
    StepOutcome {
        moved: stopped || relocated,
        arrived,
    }
}

fn arrive(npc: &mut NpcState, path: &GridPath, now: Instant) -> usize {
    let index = npc.path_index;
    let pause = path.get(index).map(|waypoint| waypoint.pause).unwrap_or_default();
    npc.pause_until = now + pause;
    npc.path_index = path.next_index(index);
    index
}
