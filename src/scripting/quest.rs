use crate::zone::access::EntitySnapshot;
use crate::zone::backlog::ZoneHandle;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Name under which a handler sees every NPC's events.
pub const GLOBAL_QUEST: &str = "";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuestEventKind {
    Say,
    Spawn,
    Despawn,
    WaypointArrive,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuestPayload {
    None,
    Message(String),
    Waypoint(usize),
}

/// An event raised inside the zone loop, waiting to be handed to quests
/// once the zone lock is released.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestTrigger {
    pub npc_name: String,
    pub kind: QuestEventKind,
    pub actor: Option<EntitySnapshot>,
    pub receiver: Option<EntitySnapshot>,
    pub payload: QuestPayload,
}

#[derive(Debug, Clone)]
pub struct QuestEvent {
    pub kind: QuestEventKind,
    pub actor: Option<EntitySnapshot>,
    pub receiver: Option<EntitySnapshot>,
    pub payload: QuestPayload,
    pub zone: ZoneHandle,
}

impl QuestTrigger {
    pub fn into_event(self, zone: ZoneHandle) -> (String, QuestEvent) {
        let event = QuestEvent {
            kind: self.kind,
            actor: self.actor,
            receiver: self.receiver,
            payload: self.payload,
            zone,
        };
        (self.npc_name, event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestFlow {
    Continue,
    Stop,
}

pub type QuestHandler = Arc<dyn Fn(&QuestEvent) -> QuestFlow + Send + Sync>;

/// NPC name -> event kind -> handler. Names are matched case-insensitively.
#[derive(Default)]
pub struct QuestInterface {
    handlers: RwLock<HashMap<String, HashMap<QuestEventKind, QuestHandler>>>,
}

impl std::fmt::Debug for QuestInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read();
        let mut names: Vec<&String> = handlers.keys().collect();
        names.sort();
        f.debug_struct("QuestInterface").field("npcs", &names).finish()
    }
}

fn quest_key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

impl QuestInterface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, npc_name: &str, kind: QuestEventKind, handler: F)
    where
        F: Fn(&QuestEvent) -> QuestFlow + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .entry(quest_key(npc_name))
            .or_default()
            .insert(kind, Arc::new(handler));
    }

    pub fn unregister(&self, npc_name: &str, kind: QuestEventKind) -> bool {
        let mut handlers = self.handlers.write();
        let key = quest_key(npc_name);
        let Some(kinds) = handlers.get_mut(&key) else {
            return false;
        };
        let removed = kinds.remove(&kind).is_some();
        if kinds.is_empty() {
            handlers.remove(&key);
        }
        removed
    }

    fn handler(&self, npc_name: &str, kind: QuestEventKind) -> Option<QuestHandler> {
        self.handlers
            .read()
            .get(&quest_key(npc_name))
            .and_then(|kinds| kinds.get(&kind))
            .cloned()
    }

    /// Runs the global handler, then the NPC's own unless the global one
    /// stopped propagation. Returns whether any handler ran.
    pub fn invoke(&self, npc_name: &str, event: &QuestEvent) -> bool {
        let mut ran = false;
        if let Some(global) = self.handler(GLOBAL_QUEST, event.kind) {
            ran = true;
            if global(event) == QuestFlow::Stop {
                return ran;
            }
        }
        if quest_key(npc_name).is_empty() {
            return ran;
        }
        if let Some(handler) = self.handler(npc_name, event.kind) {
            handler(event);
            ran = true;
        }
        ran
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::backlog::{Backlog, ZoneTask};
    use parking_lot::Mutex;

    fn event(kind: QuestEventKind, zone: ZoneHandle) -> QuestEvent {
        QuestEvent {
            kind,
            actor: None,
            receiver: None,
            payload: QuestPayload::Message("hail".to_string()),
            zone,
        }
    }

    #[test]
    fn named_handler_runs_after_global() {
        let (backlog, _woken) = Backlog::new();
        let zone = ZoneHandle::new(1, 0, backlog);
        let quests = QuestInterface::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&order);
        quests.register(GLOBAL_QUEST, QuestEventKind::Say, move |_| {
            seen.lock().push("global");
            QuestFlow::Continue
        });
        let seen = Arc::clone(&order);
        quests.register("Guard_Gehnus", QuestEventKind::Say, move |_| {
            seen.lock().push("guard");
            QuestFlow::Continue
        });
        assert!(quests.invoke("guard_gehnus", &event(QuestEventKind::Say, zone)));
        assert_eq!(*order.lock(), vec!["global", "guard"]);
    }

    #[test]
    fn global_stop_suppresses_named_handler() {
        let (backlog, _woken) = Backlog::new();
        let zone = ZoneHandle::new(1, 0, backlog);
        let quests = QuestInterface::new();
        let named = Arc::new(Mutex::new(0));
        quests.register(GLOBAL_QUEST, QuestEventKind::Say, |_| QuestFlow::Stop);
        let hits = Arc::clone(&named);
        quests.register("guard", QuestEventKind::Say, move |_| {
            *hits.lock() += 1;
            QuestFlow::Continue
        });
        assert!(quests.invoke("guard", &event(QuestEventKind::Say, zone)));
        assert_eq!(*named.lock(), 0);
    }

    #[test]
    fn missing_handler_is_a_no_op() {
        let (backlog, _woken) = Backlog::new();
        let zone = ZoneHandle::new(1, 0, backlog);
        let quests = QuestInterface::new();
        quests.register("guard", QuestEventKind::Spawn, |_| QuestFlow::Continue);
        assert!(!quests.invoke("guard", &event(QuestEventKind::Say, zone.clone())));
        assert!(!quests.invoke("rat", &event(QuestEventKind::Spawn, zone)));
        assert!(quests.unregister("GUARD", QuestEventKind::Spawn));
        assert!(!quests.unregister("guard", QuestEventKind::Spawn));
    }

    #[test]
    fn handlers_submit_follow_up_work() {
        let (backlog, _woken) = Backlog::new();
        let zone = ZoneHandle::new(1, 0, Arc::clone(&backlog));
        let quests = QuestInterface::new();
        quests.register("guard", QuestEventKind::Say, |event| {
            event.zone.submit(ZoneTask::Broadcast {
                message: "the guard nods".to_string(),
            });
            QuestFlow::Continue
        });
        quests.invoke("guard", &event(QuestEventKind::Say, zone));
        assert_eq!(backlog.len(), 1);
    }
}
