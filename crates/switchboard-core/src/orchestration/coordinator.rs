use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio::time::{Instant, timeout_at};

use crate::agents::Agent;
use crate::config::CoordinatorConfig;
use crate::models::{
    AgentId, AgentSnapshot, Capability, CoreError, CoreErrorKind, Task, TaskId, TaskRequest,
    TaskResponse, TaskStatus,
};
use crate::orchestration::{OrchestrationResult, TaskTable};
use crate::persistence::TaskStore;
use crate::registry::{AgentLease, AgentRegistry, LeaseOutcome};

/// Routes task requests to capable agents and runs them on a bounded pool of blocking
/// threads.
///
/// Cloning is cheap and every clone drives the same pool.
#[derive(Clone)]
pub struct TaskCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    registry: Arc<AgentRegistry>,
    config: CoordinatorConfig,
    table: TaskTable,
    permits: Arc<Semaphore>,
    accepting: AtomicBool,
    active: AtomicUsize,
    idle: Notify,
    task_store: Option<Arc<dyn TaskStore>>,
}

/// Counts a task from admission until its terminal state has been persisted.
struct ActiveTask {
    inner: Arc<CoordinatorInner>,
}

impl ActiveTask {
    fn begin(inner: &Arc<CoordinatorInner>) -> Self {
        inner.active.fetch_add(1, Ordering::SeqCst);
        Self {
            inner: inner.clone(),
        }
    }
}

impl Drop for ActiveTask {
    fn drop(&mut self) {
        if self.inner.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

impl TaskCoordinator {
    pub fn new(
        registry: Arc<AgentRegistry>,
        config: CoordinatorConfig,
    ) -> OrchestrationResult<Self> {
        Self::build(registry, config, None, TaskTable::new())
    }

    /// Persists every task once it reaches a terminal state. Ids continue after the
    /// highest stored id.
    pub fn with_task_store(
        registry: Arc<AgentRegistry>,
        config: CoordinatorConfig,
        task_store: Arc<dyn TaskStore>,
    ) -> OrchestrationResult<Self> {
        let next_task_id = task_store.next_task_id()?;
        Self::build(
            registry,
            config,
            Some(task_store),
            TaskTable::starting_at(next_task_id),
        )
    }

    fn build(
        registry: Arc<AgentRegistry>,
        config: CoordinatorConfig,
        task_store: Option<Arc<dyn TaskStore>>,
        table: TaskTable,
    ) -> OrchestrationResult<Self> {
        config.validate()?;
        let permits = Arc::new(Semaphore::new(config.max_workers));
        Ok(Self {
            inner: Arc::new(CoordinatorInner {
                registry,
                config,
                table,
                permits,
                accepting: AtomicBool::new(true),
                active: AtomicUsize::new(0),
                idle: Notify::new(),
                task_store,
            }),
        })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.inner.registry
    }

    pub fn register_agent(&self, agent: Arc<dyn Agent>) -> OrchestrationResult<()> {
        self.inner.registry.register(agent)
    }

    pub fn unregister_agent(&self, id: &AgentId) -> OrchestrationResult<bool> {
        self.inner.registry.unregister(id)
    }

    pub fn get_available_agents(&self) -> OrchestrationResult<Vec<AgentSnapshot>> {
        self.inner.registry.snapshot()
    }

    pub fn is_accepting(&self) -> bool {
        self.inner.accepting.load(Ordering::SeqCst)
    }

    /// Runs a task to completion. Failures of any kind come back inside the response.
    pub async fn execute_task(&self, request: TaskRequest) -> TaskResponse {
        let outcome = match self.submit(request).await {
            Ok(task_id) => self.wait_for_terminal(task_id, None).await,
            Err(error) => match error.task {
                Some(task_id) => self.snapshot(task_id).or(Err(error)),
                None => Err(error),
            },
        };

        match outcome {
            Ok(task) => TaskResponse::from(&task),
            Err(error) => TaskResponse::rejected(error),
        }
    }

    /// Records the task as `Pending` and returns without waiting for it.
    pub async fn submit(&self, request: TaskRequest) -> OrchestrationResult<TaskId> {
        let active = ActiveTask::begin(&self.inner);
        let capability = request.task_type;
        let task = self.inner.table.enqueue(request)?;

        if !self.is_accepting() {
            let error = shut_down_error(task.id, capability);
            if let Err(table_error) = self.inner.table.fail(task.id, error.clone()) {
                tracing::debug!(
                    task_id = task.id.0,
                    message = %table_error.message,
                    "task was already terminal"
                );
            }
            persist_terminal(&self.inner, task.id).await;
            return Err(error);
        }

        tracing::debug!(
            task_id = task.id.0,
            capability = capability.as_str(),
            "accepted task"
        );
        tokio::spawn(run_task(self.inner.clone(), task.id, capability, active));
        Ok(task.id)
    }

    /// Fails a task that has not been dispatched yet. A dispatched task keeps running and
    /// `false` is returned.
    pub fn cancel(&self, task_id: TaskId) -> OrchestrationResult<bool> {
        let cancelled = self.inner.table.cancel(task_id)?;
        if cancelled {
            tracing::info!(task_id = task_id.0, "cancelled pending task");
        }
        Ok(cancelled)
    }

    pub fn snapshot(&self, task_id: TaskId) -> OrchestrationResult<Task> {
        self.inner.table.snapshot(task_id)
    }

    pub fn status(&self, task_id: TaskId) -> OrchestrationResult<TaskStatus> {
        self.inner.table.status(task_id)
    }

    pub fn list_tasks(&self) -> OrchestrationResult<Vec<Task>> {
        self.inner.table.list()
    }

    pub async fn wait_for_terminal(
        &self,
        task_id: TaskId,
        timeout_duration: Option<Duration>,
    ) -> OrchestrationResult<Task> {
        let deadline = timeout_duration.map(|duration| Instant::now() + duration);
        let completion = self.inner.table.completion_signal(task_id)?;

        loop {
            let finished = completion.notified();
            let task = self.inner.table.snapshot(task_id)?;
            if task.status.is_terminal() {
                return Ok(task);
            }

            match deadline {
                Some(deadline) => timeout_at(deadline, finished).await.map_err(|_| {
                    CoreError::new(
                        CoreErrorKind::Timeout,
                        format!("timed out waiting for task '{}' to finish", task_id.0),
                    )
                    .with_task(task_id)
                    .with_capability(task.capability)
                })?,
                None => finished.await,
            }
        }
    }

    /// Stops accepting tasks and waits until everything already accepted is terminal.
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) {
        if self.inner.accepting.swap(false, Ordering::SeqCst) {
            tracing::info!(
                in_flight = self.inner.active.load(Ordering::SeqCst),
                "task coordinator draining"
            );
        }

        loop {
            let idle = self.inner.idle.notified();
            if self.inner.active.load(Ordering::SeqCst) == 0 {
                break;
            }
            idle.await;
        }

        if !self.inner.permits.is_closed() {
            self.inner.permits.close();
            tracing::info!("task coordinator shut down");
        }
    }
}

async fn run_task(
    inner: Arc<CoordinatorInner>,
    task_id: TaskId,
    capability: Capability,
    _active: ActiveTask,
) {
    if let Err(error) = drive_task(&inner, task_id, capability).await {
        tracing::warn!(
            task_id = task_id.0,
            capability = capability.as_str(),
            kind = ?error.kind,
            message = %error.message,
            "task failed before execution"
        );
        if let Err(table_error) = inner.table.fail(task_id, error) {
            tracing::debug!(
                task_id = task_id.0,
                message = %table_error.message,
                "task was already terminal"
            );
        }
    }

    persist_terminal(&inner, task_id).await;
}

/// Returns `Ok` once the task is terminal, or the error the task should fail with.
async fn drive_task(
    inner: &Arc<CoordinatorInner>,
    task_id: TaskId,
    capability: Capability,
) -> OrchestrationResult<()> {
    if !inner.registry.supports(capability)? {
        return Err(no_agent_available(task_id, capability));
    }

    // A task waiting on a busy agent holds no pool slot.
    let completion = inner.table.completion_signal(task_id)?;
    let Some(lease) = acquire_agent(inner, &completion, task_id, capability).await? else {
        return Ok(());
    };
    let Some(permit) = acquire_worker(inner, &completion, task_id, capability).await? else {
        return Ok(());
    };

    let task = match inner.table.dispatch(task_id, lease.id().clone()) {
        Ok(task) => task,
        Err(_) if inner.table.status(task_id)?.is_terminal() => return Ok(()),
        Err(error) => return Err(error),
    };
    tracing::debug!(
        task_id = task_id.0,
        agent = %lease.id(),
        capability = capability.as_str(),
        "dispatched task"
    );

    let outcome = execute_on_pool(inner, &task, lease, permit).await;
    match outcome {
        Ok(result) => {
            let task = inner.table.complete(task_id, result)?;
            tracing::info!(
                task_id = task_id.0,
                agent = ?task.agent,
                elapsed_ms = task.execution_time.unwrap_or_default().as_millis() as u64,
                "task completed"
            );
        }
        Err(error) => {
            let task = inner.table.fail(task_id, error)?;
            if let Some(error) = &task.error {
                tracing::warn!(
                    task_id = task_id.0,
                    agent = ?task.agent,
                    kind = ?error.kind,
                    message = %error.message,
                    "agent execution failed"
                );
            }
        }
    }

    Ok(())
}

async fn execute_on_pool(
    inner: &Arc<CoordinatorInner>,
    task: &Task,
    lease: AgentLease,
    permit: OwnedSemaphorePermit,
) -> OrchestrationResult<String> {
    let task_id = task.id;
    let capability = task.capability;
    let agent = lease.agent();
    let agent_id = lease.id().clone();
    let worker_inner = inner.clone();
    let mut handed = task.clone();

    let joined = tokio::task::spawn_blocking(move || {
        worker_inner.table.start(task_id)?;
        handed.status = TaskStatus::Running;
        agent.handle(&handed).map_err(|error| CoreError {
            agent: error.agent.or_else(|| Some(agent.descriptor().id.clone())),
            capability: Some(capability),
            task: Some(task_id),
            kind: CoreErrorKind::AgentExecution,
            message: error.message,
        })
    })
    .await;

    drop(lease);
    drop(permit);

    joined.unwrap_or_else(|join_error| {
        Err(CoreError::new(
            CoreErrorKind::AgentExecution,
            format!("agent '{agent_id}' aborted: {join_error}"),
        )
        .with_agent(agent_id.clone())
        .with_capability(capability)
        .with_task(task_id))
    })
}

/// Waits for a pool slot while holding the agent lease. `None` means the task was
/// cancelled while queued; the caller drops the lease.
async fn acquire_worker(
    inner: &Arc<CoordinatorInner>,
    completion: &Notify,
    task_id: TaskId,
    capability: Capability,
) -> OrchestrationResult<Option<OwnedSemaphorePermit>> {
    let cancelled = completion.notified();
    if inner.table.status(task_id)?.is_terminal() {
        return Ok(None);
    }

    tokio::select! {
        permit = inner.permits.clone().acquire_owned() => permit
            .map(Some)
            .map_err(|_| shut_down_error(task_id, capability)),
        _ = cancelled => Ok(None),
    }
}

/// Waits for an idle agent. `None` means the task was cancelled while queued.
async fn acquire_agent(
    inner: &Arc<CoordinatorInner>,
    completion: &Notify,
    task_id: TaskId,
    capability: Capability,
) -> OrchestrationResult<Option<AgentLease>> {
    loop {
        let released = inner.registry.release_signal().notified();
        let cancelled = completion.notified();
        if inner.table.status(task_id)?.is_terminal() {
            return Ok(None);
        }

        match inner.registry.lease(capability)? {
            LeaseOutcome::Leased(lease) => return Ok(Some(lease)),
            LeaseOutcome::NoneRegistered => return Err(no_agent_available(task_id, capability)),
            LeaseOutcome::AllBusy => {
                tokio::select! {
                    _ = released => {}
                    _ = cancelled => {}
                }
            }
        }
    }
}

async fn persist_terminal(inner: &Arc<CoordinatorInner>, task_id: TaskId) {
    let Some(task_store) = inner.task_store.clone() else {
        return;
    };
    let task = match inner.table.snapshot(task_id) {
        Ok(task) => task,
        Err(error) => {
            tracing::error!(
                task_id = task_id.0,
                message = %error.message,
                "failed to read task for persistence"
            );
            return;
        }
    };

    match tokio::task::spawn_blocking(move || task_store.save_task(&task)).await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => tracing::error!(
            task_id = task_id.0,
            kind = ?error.kind,
            message = %error.message,
            "failed to persist terminal task"
        ),
        Err(join_error) => tracing::error!(
            task_id = task_id.0,
            message = %join_error,
            "task persistence join failure"
        ),
    }
}

fn no_agent_available(task_id: TaskId, capability: Capability) -> CoreError {
    CoreError::new(
        CoreErrorKind::NoAgentAvailable,
        format!(
            "no registered agent supports capability '{}'",
            capability.as_str()
        ),
    )
    .with_task(task_id)
    .with_capability(capability)
}

fn shut_down_error(task_id: TaskId, capability: Capability) -> CoreError {
    CoreError::new(
        CoreErrorKind::ShutDown,
        "task coordinator is shut down and no longer accepts tasks",
    )
    .with_task(task_id)
    .with_capability(capability)
}
