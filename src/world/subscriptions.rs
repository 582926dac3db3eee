use crate::entities::creature::EntityId;
use std::collections::{HashMap, HashSet};

/// Who receives whose updates.
///
/// `audience[e]` holds the client entities that must hear about `e`;
/// `watching[c]` is the reverse edge set for client `c`. Both are kept in
/// lockstep so a departing client can be pruned without a full scan.
#[derive(Debug, Default)]
pub struct SubscriptionGraph {
    audience: HashMap<EntityId, HashSet<EntityId>>,
    watching: HashMap<EntityId, HashSet<EntityId>>,
}

impl SubscriptionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn audience(&self, target: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.audience.get(&target).into_iter().flatten().copied()
    }

    pub fn audience_len(&self, target: EntityId) -> usize {
        self.audience.get(&target).map_or(0, HashSet::len)
    }

    pub fn is_subscribed(&self, target: EntityId, subscriber: EntityId) -> bool {
        self.audience
            .get(&target)
            .map_or(false, |set| set.contains(&subscriber))
    }

    pub fn watched_by(&self, subscriber: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.watching.get(&subscriber).into_iter().flatten().copied()
    }

    /// Returns false when the edge already existed. Self-edges are refused.
    pub fn subscribe(&mut self, target: EntityId, subscriber: EntityId) -> bool {
        if target == subscriber {
            return false;
        }
        let added = self.audience.entry(target).or_default().insert(subscriber);
        if added {
            self.watching.entry(subscriber).or_default().insert(target);
        }
        added
    }

    pub fn unsubscribe(&mut self, target: EntityId, subscriber: EntityId) -> bool {
        let removed = remove_edge(&mut self.audience, target, subscriber);
        if removed {
            remove_edge(&mut self.watching, subscriber, target);
        }
        removed
    }

    /// Replaces the audience of `target`, diffing against the current one so
    /// that unchanged edges are left untouched.
    pub fn set_audience(&mut self, target: EntityId, next: HashSet<EntityId>) {
        let previous = self.audience.remove(&target).unwrap_or_default();
        for subscriber in previous.difference(&next) {
            remove_edge(&mut self.watching, *subscriber, target);
        }
        for subscriber in next.difference(&previous) {
            self.watching.entry(*subscriber).or_default().insert(target);
        }
        if !next.is_empty() {
            self.audience.insert(target, next);
        }
    }

    /// Drops every edge where `subscriber` watches an entity rejected by `keep`.
    pub fn retain_watched<F>(&mut self, subscriber: EntityId, mut keep: F)
    where
        F: FnMut(EntityId) -> bool,
    {
        let Some(watched) = self.watching.get(&subscriber) else {
            return;
        };
        let dropped: Vec<EntityId> = watched.iter().copied().filter(|id| !keep(*id)).collect();
        for target in dropped {
            self.unsubscribe(target, subscriber);
        }
    }

    /// Removes `id` as a key and as a member of every other audience.
    pub fn remove_entity(&mut self, id: EntityId) {
        if let Some(subscribers) = self.audience.remove(&id) {
            for subscriber in subscribers {
                remove_edge(&mut self.watching, subscriber, id);
            }
        }
        if let Some(targets) = self.watching.remove(&id) {
            for target in targets {
                remove_edge(&mut self.audience, target, id);
            }
        }
    }

    pub fn mentions(&self, id: EntityId) -> bool {
        self.audience.contains_key(&id)
            || self.watching.contains_key(&id)
            || self.audience.values().any(|set| set.contains(&id))
            || self.watching.values().any(|set| set.contains(&id))
    }
}

fn remove_edge(
    map: &mut HashMap<EntityId, HashSet<EntityId>>,
    from: EntityId,
    to: EntityId,
) -> bool {
    let Some(set) = map.get_mut(&from) else {
        return false;
    };
    let removed = set.remove(&to);
    if set.is_empty() {
        map.remove(&from);
    }
    removed
}
