use super::backlog::{Backlog, Packet, ZoneHandle, ZoneTask};
use super::handlers::{Dispatch, HandlerContext, HandlerRegistry};
use super::state::ZoneState;
use super::ZoneError;
use crate::admin::commands::CommandRegistry;
use crate::config::ZoneConfig;
use crate::entities::creature::EntityId;
use crate::net::session::{Session, SessionId};
use crate::persistence::autosave::{autosave_zone, AutosaveConfig, AutosaveState};
use crate::persistence::store::CharacterStore;
use crate::scripting::quest::{QuestInterface, QuestTrigger};
use crate::world::zone_data::ZoneDataSource;
use crossbeam::channel::{bounded, select, tick, Receiver, Sender};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Collaborators shared by every zone instance a manager starts.
#[derive(Clone)]
pub struct ZoneServices {
    pub source: Arc<dyn ZoneDataSource>,
    pub store: Arc<dyn CharacterStore>,
    pub quests: Option<Arc<QuestInterface>>,
    pub commands: Arc<CommandRegistry>,
    pub config: ZoneConfig,
    /// Fixed seed for spawn selection; `None` seeds from the OS.
    pub rng_seed: Option<u64>,
}

impl std::fmt::Debug for ZoneServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneServices")
            .field("quests", &self.quests.is_some())
            .field("commands", &self.commands)
            .field("config", &self.config)
            .field("rng_seed", &self.rng_seed)
            .finish()
    }
}

impl ZoneServices {
    pub fn new(
        source: Arc<dyn ZoneDataSource>,
        store: Arc<dyn CharacterStore>,
        config: ZoneConfig,
    ) -> Self {
        Self {
            source,
            store,
            quests: None,
            commands: Arc::new(CommandRegistry::with_builtins()),
            config,
            rng_seed: None,
        }
    }

    pub fn with_quests(mut self, quests: Arc<QuestInterface>) -> Self {
        self.quests = Some(quests);
        self
    }

    pub fn with_commands(mut self, commands: CommandRegistry) -> Self {
        self.commands = Arc::new(commands);
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }
}

/// One running copy of a zone. All mutation happens on the loop thread
/// or under the write lock; readers go through the accessors in
/// `zone::access`.
pub struct ZoneInstance {
    zone_id: u32,
    instance_id: u32,
    short_name: String,
    state: Arc<RwLock<ZoneState>>,
    backlog: Arc<Backlog>,
    handle: ZoneHandle,
    stop: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ZoneInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneInstance")
            .field("zone_id", &self.zone_id)
            .field("instance_id", &self.instance_id)
            .field("short_name", &self.short_name)
            .field("running", &self.is_running())
            .finish()
    }
}

impl ZoneInstance {
    /// Loads the zone, runs one spawn pass and starts the loop thread.
    pub fn new(zone_id: u32, instance_id: u32, services: ZoneServices) -> Result<Self, ZoneError> {
        let data = services.source.load_zone(zone_id)?;
        for warning in &data.warnings {
            tracing::warn!(zone = zone_id, instance = instance_id, "{}", warning);
        }
        let short_name = data.zone.short_name.clone();
        let rng = match services.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let now = Instant::now();
        let mut state = ZoneState::new(
            instance_id,
            Arc::new(data),
            &services.config,
            Arc::clone(&services.store),
            rng,
            now,
        );
        let (backlog, woken) = Backlog::new();
        let handle = ZoneHandle::new(zone_id, instance_id, Arc::clone(&backlog));

        let spawned = state.process_spawns(now);
        let triggers = state.take_triggers();
        let state = Arc::new(RwLock::new(state));
        fire_triggers(services.quests.as_deref(), &handle, triggers);

        let (stop, stopped) = bounded::<()>(0);
        let zone_loop = ZoneLoop {
            state: Arc::clone(&state),
            backlog: Arc::clone(&backlog),
            handle: handle.clone(),
            handlers: HandlerRegistry::standard(),
            commands: Arc::clone(&services.commands),
            quests: services.quests.clone(),
            store: Arc::clone(&services.store),
            autosave: AutosaveState::new(
                AutosaveConfig {
                    interval_seconds: services.config.autosave_secs,
                },
                now,
            ),
            config: services.config.clone(),
        };
        let worker = thread::Builder::new()
            .name(format!("zone-{zone_id}-{instance_id}"))
            .spawn(move || zone_loop.run(woken, stopped))
            .map_err(ZoneError::Thread)?;

        tracing::info!(
            zone = zone_id,
            instance = instance_id,
            name = %short_name,
            spawned,
            "zone instance started"
        );
        Ok(Self {
            zone_id,
            instance_id,
            short_name,
            state,
            backlog,
            handle,
            stop: Mutex::new(Some(stop)),
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn zone_id(&self) -> u32 {
        self.zone_id
    }

    pub fn instance_id(&self) -> u32 {
        self.instance_id
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn handle(&self) -> ZoneHandle {
        self.handle.clone()
    }

    /// Attaches the session on its first packet, then queues the raw packet
    /// (opcode + payload) for the loop. Only waits on the state lock, never
    /// on the loop draining the backlog.
    pub fn handle_client_packet(&self, session: Arc<dyn Session>, data: Vec<u8>) {
        {
            let mut state = self.state.write();
            if state.client_entity(session.id()).is_none() {
                state.add_client(session.clone());
            }
        }
        self.backlog.push(Packet::Client { session, data });
    }

    pub fn submit(&self, task: ZoneTask) {
        self.handle.submit(task);
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    pub fn add_client(&self, session: Arc<dyn Session>) -> EntityId {
        self.state.write().add_client(session)
    }

    pub fn remove_client(&self, session: SessionId) -> Option<EntityId> {
        self.state.write().remove_client(session)
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, ZoneState> {
        self.state.read()
    }

    pub fn is_running(&self) -> bool {
        self.stop.lock().is_some()
    }

    /// Signals the loop and waits for it to exit. Safe to call twice.
    pub fn stop(&self) {
        let Some(stop) = self.stop.lock().take() else {
            return;
        };
        drop(stop);
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                tracing::error!(zone = self.zone_id, instance = self.instance_id, "zone loop panicked");
            }
        }
        tracing::info!(zone = self.zone_id, instance = self.instance_id, "zone instance stopped");
    }
}

impl Drop for ZoneInstance {
    fn drop(&mut self) {
        self.stop();
    }
}

fn fire_triggers(quests: Option<&QuestInterface>, zone: &ZoneHandle, triggers: Vec<QuestTrigger>) {
    let Some(quests) = quests else {
        return;
    };
    for trigger in triggers {
        let (npc_name, event) = trigger.into_event(zone.clone());
        quests.invoke(&npc_name, &event);
    }
}

/// State owned by the loop thread.
struct ZoneLoop {
    state: Arc<RwLock<ZoneState>>,
    backlog: Arc<Backlog>,
    handle: ZoneHandle,
    handlers: HandlerRegistry,
    commands: Arc<CommandRegistry>,
    quests: Option<Arc<QuestInterface>>,
    store: Arc<dyn CharacterStore>,
    autosave: AutosaveState,
    config: ZoneConfig,
}

impl ZoneLoop {
    fn run(mut self, woken: Receiver<()>, stopped: Receiver<()>) {
        let spawn_tick = tick(self.config.spawn_tick());
        let flush_tick = tick(self.config.flush_tick());
        let world_tick = tick(self.config.world_tick());
        loop {
            select! {
                recv(stopped) -> _ => break,
                recv(woken) -> _ => self.drain_backlog(),
                recv(spawn_tick) -> at => {
                    if let Ok(now) = at {
                        self.spawn_tick(now);
                    }
                }
                recv(flush_tick) -> _ => {
                    self.state.write().flush_updates();
                }
                recv(world_tick) -> at => {
                    if let Ok(now) = at {
                        self.world_tick(now);
                    }
                }
            }
        }
        tracing::debug!(
            zone = self.handle.zone_id(),
            instance = self.handle.instance_id(),
            left = self.backlog.len(),
            "zone loop exiting"
        );
    }

    fn drain_backlog(&self) {
        let packets = self.backlog.drain();
        if packets.is_empty() {
            return;
        }
        let triggers = {
            let mut guard = self.state.write();
            let state = &mut *guard;
            let ctx = HandlerContext {
                commands: &self.commands,
                zone: &self.handle,
            };
            for packet in packets {
                match packet {
                    Packet::Client { session, data } => {
                        let session_id = session.id();
                        match self.handlers.dispatch(state, &ctx, session_id, &data) {
                            Ok(Dispatch::Handled(_)) => {}
                            Ok(Dispatch::Unhandled(opcode)) => {
                                tracing::debug!(
                                    zone = state.zone().id,
                                    session = %session_id,
                                    opcode = opcode.as_u16(),
                                    "unhandled opcode"
                                );
                            }
                            Err(err) => {
                                tracing::warn!(
                                    zone = state.zone().id,
                                    instance = state.instance_id(),
                                    session = %session_id,
                                    error = %err,
                                    "packet dropped"
                                );
                            }
                        }
                    }
                    Packet::Internal(task) => run_task(state, task),
                }
            }
            state.take_triggers()
        };
        fire_triggers(self.quests.as_deref(), &self.handle, triggers);
    }

    fn spawn_tick(&self, now: Instant) {
        let triggers = {
            let mut state = self.state.write();
            state.process_spawns(now);
            state.take_triggers()
        };
        fire_triggers(self.quests.as_deref(), &self.handle, triggers);
    }

    fn world_tick(&mut self, now: Instant) {
        if !self.autosave.due(now) {
            return;
        }
        let report = autosave_zone(&self.state.read(), self.store.as_ref());
        self.autosave.mark_saved(now);
        for err in &report.errors {
            tracing::warn!(zone = self.handle.zone_id(), error = %err, "autosave failed");
        }
        tracing::info!(
            zone = self.handle.zone_id(),
            instance = self.handle.instance_id(),
            saved = report.saved,
            "autosave completed"
        );
    }
}

fn run_task(state: &mut ZoneState, task: ZoneTask) {
    match task {
        ZoneTask::NpcSay { npc, message } => {
            if state.npc_say(npc, &message).is_none() {
                tracing::debug!(zone = state.zone().id, npc = %npc, "say from unknown npc");
            }
        }
        ZoneTask::Despawn { npc } => {
            if let Err(err) = state.despawn_npc(npc, Instant::now()) {
                tracing::warn!(zone = state.zone().id, error = %err, "despawn rejected");
            }
        }
        ZoneTask::Broadcast { message } => {
            state.broadcast_server(&message);
        }
    }
}
