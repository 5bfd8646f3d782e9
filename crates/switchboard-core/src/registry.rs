use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::Notify;

use crate::agents::Agent;
use crate::models::{AgentId, AgentSnapshot, Capability, CoreError, CoreErrorKind};

pub type RegistryResult<T> = Result<T, CoreError>;

#[derive(Default)]
struct SlotState {
    busy: AtomicBool,
    /// Lease tick of the most recent dispatch; zero until first use.
    last_used: AtomicU64,
}

struct RegisteredAgent {
    agent: Arc<dyn Agent>,
    state: Arc<SlotState>,
}

/// Capability-tagged agents in registration order.
#[derive(Default)]
pub struct AgentRegistry {
    slots: RwLock<Vec<RegisteredAgent>>,
    clock: AtomicU64,
    released: Notify,
}

pub enum LeaseOutcome {
    Leased(AgentLease),
    AllBusy,
    NoneRegistered,
}

/// Exclusive use of one agent. Dropping the lease frees the agent and wakes waiters.
pub struct AgentLease {
    agent: Arc<dyn Agent>,
    state: Arc<SlotState>,
    registry: Arc<AgentRegistry>,
}

impl AgentLease {
    pub fn agent(&self) -> Arc<dyn Agent> {
        self.agent.clone()
    }

    pub fn id(&self) -> &AgentId {
        &self.agent.descriptor().id
    }
}

impl Drop for AgentLease {
    fn drop(&mut self) {
        self.state.busy.store(false, Ordering::Release);
        self.registry.released.notify_waiters();
    }
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agents(
        agents: impl IntoIterator<Item = Arc<dyn Agent>>,
    ) -> RegistryResult<Self> {
        let registry = Self::new();
        for agent in agents {
            registry.register(agent)?;
        }
        Ok(registry)
    }

    pub fn register(&self, agent: Arc<dyn Agent>) -> RegistryResult<()> {
        let descriptor = agent.descriptor();
        if descriptor.capabilities.is_empty() {
            return Err(CoreError::new(
                CoreErrorKind::InvalidInput,
                format!("agent '{}' declares no capabilities", descriptor.id),
            )
            .with_agent(descriptor.id.clone()));
        }

        let mut slots = self.write_slots()?;
        if slots
            .iter()
            .any(|slot| slot.agent.descriptor().id == descriptor.id)
        {
            return Err(CoreError::new(
                CoreErrorKind::DuplicateAgent,
                format!("agent '{}' is already registered", descriptor.id),
            )
            .with_agent(descriptor.id.clone()));
        }

        tracing::info!(
            agent = %descriptor.id,
            capabilities = ?descriptor.capabilities,
            "registered agent"
        );
        slots.push(RegisteredAgent {
            agent: agent.clone(),
            state: Arc::new(SlotState::default()),
        });
        Ok(())
    }

    /// Removes an agent. A task already holding its lease finishes normally.
    pub fn unregister(&self, id: &AgentId) -> RegistryResult<bool> {
        let removed = {
            let mut slots = self.write_slots()?;
            let before = slots.len();
            slots.retain(|slot| &slot.agent.descriptor().id != id);
            slots.len() != before
        };

        if removed {
            tracing::info!(agent = %id, "unregistered agent");
            self.released.notify_waiters();
        }
        Ok(removed)
    }

    pub fn snapshot(&self) -> RegistryResult<Vec<AgentSnapshot>> {
        let slots = self.read_slots()?;
        Ok(slots
            .iter()
            .map(|slot| {
                let descriptor = slot.agent.descriptor();
                AgentSnapshot {
                    id: descriptor.id.clone(),
                    name: descriptor.name.clone(),
                    capabilities: descriptor.capabilities.clone(),
                    busy: slot.state.busy.load(Ordering::Acquire),
                }
            })
            .collect())
    }

    pub fn supports(&self, capability: Capability) -> RegistryResult<bool> {
        let slots = self.read_slots()?;
        Ok(slots
            .iter()
            .any(|slot| slot.agent.descriptor().supports(capability)))
    }

    pub fn len(&self) -> RegistryResult<usize> {
        Ok(self.read_slots()?.len())
    }

    pub fn is_empty(&self) -> RegistryResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Claims the least recently used idle agent for `capability`; equal recency falls back
    /// to registration order.
    pub fn lease(self: &Arc<Self>, capability: Capability) -> RegistryResult<LeaseOutcome> {
        let slots = self.read_slots()?;
        let mut candidates: Vec<&RegisteredAgent> = slots
            .iter()
            .filter(|slot| slot.agent.descriptor().supports(capability))
            .collect();
        if candidates.is_empty() {
            return Ok(LeaseOutcome::NoneRegistered);
        }

        candidates.sort_by_key(|slot| slot.state.last_used.load(Ordering::Acquire));
        for slot in candidates {
            if slot
                .state
                .busy
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let tick = self.clock.fetch_add(1, Ordering::AcqRel) + 1;
                slot.state.last_used.store(tick, Ordering::Release);
                return Ok(LeaseOutcome::Leased(AgentLease {
                    agent: slot.agent.clone(),
                    state: slot.state.clone(),
                    registry: self.clone(),
                }));
            }
        }

        Ok(LeaseOutcome::AllBusy)
    }

    pub(crate) fn release_signal(&self) -> &Notify {
        &self.released
    }

    fn read_slots(&self) -> RegistryResult<RwLockReadGuard<'_, Vec<RegisteredAgent>>> {
        self.slots.read().map_err(|_| poisoned())
    }

    fn write_slots(&self) -> RegistryResult<RwLockWriteGuard<'_, Vec<RegisteredAgent>>> {
        self.slots.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> CoreError {
    CoreError::new(CoreErrorKind::Internal, "agent registry lock poisoned")
}
