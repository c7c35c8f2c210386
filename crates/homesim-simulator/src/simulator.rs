//! The simulation coordinator
//!
//! Per home, one recurring tick task per domain and one context refresh
//! task drive the behavior engines; the refresh task's kind orders it
//! before the tick tasks of the same scheduling pass. Per-entity hidden
//! state lives here, never in the store. A failing entity tick is logged
//! and skipped; the simulator stays live for queries throughout.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Datelike, Duration, Utc};
use dashmap::DashMap;
use homesim_behaviors::{behavior_for, Behavior, BehaviorState, StateReader};
use homesim_context::{ContextGenerator, HomeContextParams, SimRng};
use homesim_core::{
    ChangeRecord, Domain, EntityId, HomeId, Profile, Region, ServiceCall, ServiceError, Snapshot,
    ALL_DOMAINS,
};
use homesim_event_bus::{EventBus, SubscriberId};
use homesim_homes::{EntitySpec, Home, HomeBuilder};
use homesim_runtime::{Scheduler, SimulationClock, TaskId, TaskKind};
use homesim_state_store::{EntityStore, StoreError, Transition};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{SimConfig, SimulatorError};

/// How a home joins the simulation
pub struct HomeSetup {
    index: usize,
    profile: Option<Profile>,
    region: Option<Region>,
    explicit: Option<(Home, Vec<EntitySpec>)>,
}

impl HomeSetup {
    /// Synthesize home `index` from the run seed
    pub fn synthesized(index: usize) -> Self {
        Self {
            index,
            profile: None,
            region: None,
            explicit: None,
        }
    }

    pub fn profile(mut self, profile: Profile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Register a pre-built home with explicit entity specs
    pub fn explicit(home: Home, specs: Vec<EntitySpec>) -> Self {
        Self {
            index: 0,
            profile: None,
            region: None,
            explicit: Some((home, specs)),
        }
    }
}

/// Run counters surfaced to external callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatorStats {
    pub homes: usize,
    pub entities: usize,
    pub ticks_executed: u64,
    pub events_published: u64,
}

/// Hidden per-entity engine state, serialized by its own lock
struct TickState {
    behavior: BehaviorState,
    rng: SimRng,
    last_tick: DateTime<Utc>,
}

struct EntityEntry {
    spec: EntitySpec,
    engine: &'static dyn Behavior,
    tick: Mutex<TickState>,
}

/// State shared between the coordinator and its scheduled tasks
struct Core {
    clock: Arc<SimulationClock>,
    scheduler: Arc<Scheduler>,
    bus: Arc<EventBus>,
    store: Arc<EntityStore>,
    context: ContextGenerator,
    homes: DashMap<HomeId, Home>,
    entities: DashMap<String, EntityEntry>,
    /// Entity keys of one home and domain, in registration order
    domain_members: DashMap<(HomeId, Domain), Vec<String>>,
    seed: u64,
}

impl StateReader for Core {
    fn read(&self, entity_id: &EntityId) -> Option<Snapshot> {
        self.store.get(&entity_id.to_string()).ok()
    }
}

impl Core {
    /// Tick every entity of one home and domain at virtual time `now`
    fn tick_home_domain(&self, home_id: &str, domain: Domain, now: DateTime<Utc>) {
        let Some(context) = self.context.snapshot(home_id, now) else {
            return;
        };
        let Some(members) = self.domain_members.get(&(home_id.to_string(), domain)) else {
            return;
        };

        for key in members.iter() {
            let Some(entry) = self.entities.get(key) else {
                continue;
            };
            let snapshot = match self.store.get(key) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(entity_id = %key, error = %err, "tick skipped, snapshot unavailable");
                    continue;
                }
            };

            let outcome = {
                let mut tick = entry.tick.lock().unwrap();
                let elapsed = now - tick.last_tick;
                tick.last_tick = now;
                let TickState { behavior, rng, .. } = &mut *tick;
                entry
                    .engine
                    .tick(&snapshot, &entry.spec, behavior, &context, elapsed, self, rng)
            };

            if let Some(outcome) = outcome {
                let transition = Transition::new(outcome.state, now)
                    .with_attributes(outcome.attribute_delta);
                // An engine emitting an illegal state is an invariant
                // violation; reject the tick, keep the entity live
                if let Err(err) = self.store.apply(key, transition) {
                    warn!(entity_id = %key, error = %err, "tick transition rejected");
                }
            }
        }
    }

    fn refresh_home_context(&self, home_id: &str, now: DateTime<Utc>) {
        self.context.snapshot(home_id, now);
        self.context.evict_before(now - Duration::hours(2));
    }
}

/// The simulation coordinator
pub struct Simulator {
    core: Arc<Core>,
    config: SimConfig,
    home_tasks: DashMap<HomeId, Vec<TaskId>>,
    run_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Simulator {
    pub fn new(config: SimConfig) -> Result<Self, SimulatorError> {
        let clock = Arc::new(SimulationClock::new(config.start_time, config.speed)?);
        let scheduler = Arc::new(Scheduler::new(Arc::clone(&clock)));
        let bus = Arc::new(EventBus::new());
        let store = Arc::new(EntityStore::new(Arc::clone(&bus)));
        let core = Arc::new(Core {
            clock,
            scheduler,
            bus,
            store,
            context: ContextGenerator::new(config.seed),
            homes: DashMap::new(),
            entities: DashMap::new(),
            domain_members: DashMap::new(),
            seed: config.seed,
        });
        let stats_core = Arc::clone(&core);
        core.scheduler.schedule_interval(
            Duration::hours(1),
            TaskKind::Housekeeping,
            move |at| {
                let core = Arc::clone(&stats_core);
                Box::pin(async move {
                    debug!(
                        sim_time = %at,
                        homes = core.homes.len(),
                        entities = core.store.len(),
                        ticks = core.scheduler.executed_count(),
                        events = core.bus.published_count(),
                        "housekeeping"
                    );
                    Ok(())
                })
            },
        );
        Ok(Self {
            core,
            config,
            home_tasks: DashMap::new(),
            run_handle: Mutex::new(None),
        })
    }

    /// Register a home: initial snapshots, engine state and tick tasks
    pub fn add_home(&self, setup: HomeSetup) -> Result<HomeId, SimulatorError> {
        let now = self.core.clock.now();
        let (home, specs) = match setup.explicit {
            Some(pair) => pair,
            None => {
                let mut builder =
                    HomeBuilder::new(self.core.seed, setup.index).year(now.year());
                if let Some(profile) = setup.profile {
                    builder = builder.profile(profile);
                }
                if let Some(region) = setup.region {
                    builder = builder.region(region);
                }
                builder.build()?
            }
        };
        let home_id = home.home_id.clone();
        if self.core.homes.contains_key(&home_id) {
            return Err(SimulatorError::HomeExists(home_id));
        }

        self.core.context.register_home(
            home_id.clone(),
            HomeContextParams {
                region: home.region,
                latitude: home.latitude,
                occupancy: home.occupancy,
                vacations: home.vacations.clone(),
            },
        );

        for spec in specs {
            let key = spec.entity_id.to_string();
            let engine = behavior_for(spec.domain());
            let mut rng = SimRng::new(self.core.seed).derive_str(&key);
            let (outcome, behavior) = engine.initial_state(&spec, &mut rng);

            self.core.store.register(Snapshot::new(
                spec.entity_id.clone(),
                outcome.state,
                outcome.attribute_delta,
                now,
                home_id.clone(),
            ))?;
            self.core
                .domain_members
                .entry((home_id.clone(), spec.domain()))
                .or_default()
                .push(key.clone());
            self.core.entities.insert(
                key,
                EntityEntry {
                    spec,
                    engine,
                    tick: Mutex::new(TickState {
                        behavior,
                        rng,
                        last_tick: now,
                    }),
                },
            );
        }

        let mut tasks = Vec::new();
        let core = Arc::clone(&self.core);
        let refresh_home = home_id.clone();
        tasks.push(self.core.scheduler.schedule_interval(
            self.config.context_refresh_interval,
            TaskKind::RefreshContext,
            move |at| {
                let core = Arc::clone(&core);
                let home_id = refresh_home.clone();
                Box::pin(async move {
                    core.refresh_home_context(&home_id, at);
                    Ok(())
                })
            },
        ));
        for domain in ALL_DOMAINS {
            if !self
                .core
                .domain_members
                .contains_key(&(home_id.clone(), *domain))
            {
                continue;
            }
            let core = Arc::clone(&self.core);
            let tick_home = home_id.clone();
            let domain = *domain;
            tasks.push(self.core.scheduler.schedule_interval(
                self.config.tick_interval,
                TaskKind::TickEntities,
                move |at| {
                    let core = Arc::clone(&core);
                    let home_id = tick_home.clone();
                    Box::pin(async move {
                        core.tick_home_domain(&home_id, domain, at);
                        Ok(())
                    })
                },
            ));
        }

        info!(
            home_id = %home_id,
            entities = home.total_entities,
            tasks = tasks.len(),
            "home registered"
        );
        self.home_tasks.insert(home_id.clone(), tasks);
        self.core.homes.insert(home_id.clone(), home);
        Ok(home_id)
    }

    /// Remove a home: cancel its tasks and drop its entities
    pub fn remove_home(&self, home_id: &str) -> Result<(), SimulatorError> {
        let (home_id, _) = self
            .core
            .homes
            .remove(home_id)
            .ok_or_else(|| SimulatorError::HomeNotFound(home_id.to_string()))?;

        if let Some((_, tasks)) = self.home_tasks.remove(&home_id) {
            for task in tasks {
                self.core.scheduler.cancel(task);
            }
        }
        for domain in ALL_DOMAINS {
            let Some((_, members)) = self
                .core
                .domain_members
                .remove(&(home_id.clone(), *domain))
            else {
                continue;
            };
            for key in members {
                self.core.entities.remove(&key);
                if let Err(err) = self.core.store.remove(&key) {
                    debug!(entity_id = %key, error = %err, "entity already gone");
                }
            }
        }
        self.core.context.remove_home(&home_id);
        info!(home_id = %home_id, "home removed");
        Ok(())
    }

    /// Spawn the scheduler loop. Idempotent while running.
    pub fn start(&self) {
        let mut handle = self.run_handle.lock().unwrap();
        if handle.is_some() {
            return;
        }
        let core = Arc::clone(&self.core);
        *handle = Some(tokio::spawn(async move { core.scheduler.run().await }));
        info!("simulator started");
    }

    /// Stop the simulation: no new passes are admitted, the in-flight pass
    /// completes, then subscriber queues are released. Terminal.
    pub async fn stop(&self) {
        self.core.scheduler.shutdown();
        let handle = self.run_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "scheduler loop join failed");
            }
        }
        self.core.bus.clear();
        info!("simulator stopped");
    }

    /// Execute everything due at the current virtual time
    ///
    /// For stepped (headless) driving; the spawned loop calls this itself.
    pub async fn run_pending(&self) -> usize {
        self.core.scheduler.run_pending().await
    }

    pub fn get_state(&self, entity_id: &str) -> Result<Snapshot, StoreError> {
        self.core.store.get(entity_id)
    }

    pub fn list_states(
        &self,
        domain: Option<Domain>,
        home_id: Option<&str>,
    ) -> Vec<Snapshot> {
        self.core.store.list(domain, home_id).collect()
    }

    /// Apply a service call through the target entity's engine, immediately
    pub fn apply_service_call(&self, call: ServiceCall) -> Result<ChangeRecord, ServiceError> {
        let key = call.entity_id.to_string();
        let entry = self
            .core
            .entities
            .get(&key)
            .ok_or_else(|| ServiceError::EntityNotFound(key.clone()))?;
        let actual = entry.spec.domain();
        if call.domain != actual {
            return Err(ServiceError::DomainMismatch {
                expected: call.domain,
                actual,
            });
        }

        let snapshot = self
            .core
            .store
            .get(&key)
            .map_err(|_| ServiceError::EntityNotFound(key.clone()))?;
        let outcome = {
            let mut tick = entry.tick.lock().unwrap();
            entry.engine.apply_service(&snapshot, &mut tick.behavior, &call)?
        };

        let now = self.core.clock.now();
        self.core
            .store
            .apply(
                &key,
                Transition::new(outcome.state, now).with_attributes(outcome.attribute_delta),
            )
            .map_err(|err| match err {
                StoreError::NotFound(id) => ServiceError::EntityNotFound(id),
                other => ServiceError::InvalidParam {
                    param: "state".to_string(),
                    reason: other.to_string(),
                },
            })
    }

    pub fn subscribe(&self) -> (SubscriberId, mpsc::Receiver<ChangeRecord>) {
        self.core.bus.subscribe()
    }

    pub fn subscribe_with_capacity(
        &self,
        capacity: usize,
    ) -> (SubscriberId, mpsc::Receiver<ChangeRecord>) {
        self.core.bus.subscribe_with_capacity(capacity)
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.core.bus.unsubscribe(id)
    }

    // Clock control passthrough

    pub fn now(&self) -> DateTime<Utc> {
        self.core.clock.now()
    }

    pub fn set_speed(&self, speed: f64) -> Result<(), SimulatorError> {
        Ok(self.core.clock.set_speed(speed)?)
    }

    pub fn speed(&self) -> f64 {
        self.core.clock.speed()
    }

    pub fn pause(&self) {
        self.core.clock.pause()
    }

    pub fn resume(&self) {
        self.core.clock.resume()
    }

    pub fn is_paused(&self) -> bool {
        self.core.clock.is_paused()
    }

    pub fn advance_to(&self, target: DateTime<Utc>) -> Result<(), SimulatorError> {
        Ok(self.core.clock.advance_to(target)?)
    }

    pub fn advance(&self, delta: Duration) -> Result<(), SimulatorError> {
        Ok(self.core.clock.advance(delta)?)
    }

    pub fn stats(&self) -> SimulatorStats {
        SimulatorStats {
            homes: self.core.homes.len(),
            entities: self.core.store.len(),
            ticks_executed: self.core.scheduler.executed_count(),
            events_published: self.core.bus.published_count(),
        }
    }
}
