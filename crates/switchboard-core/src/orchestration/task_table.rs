use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Instant, SystemTime};

use tokio::sync::Notify;

use crate::models::{AgentId, CoreError, CoreErrorKind, Task, TaskId, TaskRequest, TaskStatus};
use crate::orchestration::OrchestrationResult;

/// Owns every task the coordinator has accepted and enforces the status machine
/// `Pending -> Dispatched -> Running -> {Completed | Failed}`, plus `Pending -> Failed`.
pub struct TaskTable {
    state: Mutex<TableState>,
}

struct TableState {
    next_task_id: u64,
    tasks: HashMap<TaskId, TaskEntry>,
}

struct TaskEntry {
    task: Task,
    dispatched: Option<Instant>,
    completion: Arc<Notify>,
}

impl Default for TaskTable {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl TaskTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(next_task_id: u64) -> Self {
        Self {
            state: Mutex::new(TableState {
                next_task_id: next_task_id.max(1),
                tasks: HashMap::new(),
            }),
        }
    }

    pub fn enqueue(&self, request: TaskRequest) -> OrchestrationResult<Task> {
        let mut state = self.lock_state()?;
        let task_id = TaskId(state.next_task_id);
        state.next_task_id = state.next_task_id.saturating_add(1);

        let task = Task {
            id: task_id,
            description: request.description,
            capability: request.task_type,
            context: request.context,
            status: TaskStatus::Pending,
            agent: None,
            created_at: SystemTime::now(),
            dispatched_at: None,
            started_at: None,
            finished_at: None,
            execution_time: None,
            result: None,
            error: None,
        };
        state.tasks.insert(
            task_id,
            TaskEntry {
                task: task.clone(),
                dispatched: None,
                completion: Arc::new(Notify::new()),
            },
        );

        Ok(task)
    }

    /// Binds the task to `agent` and returns the copy handed to it.
    pub fn dispatch(&self, task_id: TaskId, agent: AgentId) -> OrchestrationResult<Task> {
        let mut state = self.lock_state()?;
        let entry = entry_mut(&mut state, task_id)?;
        ensure_transition(&entry.task, TaskStatus::Pending, TaskStatus::Dispatched)?;

        entry.task.status = TaskStatus::Dispatched;
        entry.task.agent = Some(agent);
        entry.task.dispatched_at = Some(SystemTime::now());
        entry.dispatched = Some(Instant::now());
        Ok(entry.task.clone())
    }

    pub fn start(&self, task_id: TaskId) -> OrchestrationResult<()> {
        let mut state = self.lock_state()?;
        let entry = entry_mut(&mut state, task_id)?;
        ensure_transition(&entry.task, TaskStatus::Dispatched, TaskStatus::Running)?;

        entry.task.status = TaskStatus::Running;
        entry.task.started_at = Some(SystemTime::now());
        Ok(())
    }

    pub fn complete(&self, task_id: TaskId, result: String) -> OrchestrationResult<Task> {
        let mut state = self.lock_state()?;
        let entry = entry_mut(&mut state, task_id)?;
        ensure_transition(&entry.task, TaskStatus::Running, TaskStatus::Completed)?;

        entry.task.result = Some(result);
        Ok(finish(entry, TaskStatus::Completed))
    }

    /// Fails any task that has not reached a terminal state.
    pub fn fail(&self, task_id: TaskId, error: CoreError) -> OrchestrationResult<Task> {
        let mut state = self.lock_state()?;
        let entry = entry_mut(&mut state, task_id)?;
        if entry.task.status.is_terminal() {
            return Err(invalid_task_transition(
                task_id,
                entry.task.status,
                TaskStatus::Failed,
            ));
        }

        let agent = entry.task.agent.clone();
        entry.task.error = Some(error.attributed(task_id, entry.task.capability, agent.as_ref()));
        Ok(finish(entry, TaskStatus::Failed))
    }

    /// Fails a task that is still `Pending`. Returns `false` once it has been dispatched
    /// or finished.
    pub fn cancel(&self, task_id: TaskId) -> OrchestrationResult<bool> {
        let mut state = self.lock_state()?;
        let entry = entry_mut(&mut state, task_id)?;
        if entry.task.status != TaskStatus::Pending {
            return Ok(false);
        }

        entry.task.error = Some(
            CoreError::new(
                CoreErrorKind::Cancelled,
                "task cancelled before dispatch",
            )
            .with_task(task_id)
            .with_capability(entry.task.capability),
        );
        finish(entry, TaskStatus::Failed);
        Ok(true)
    }

    pub fn snapshot(&self, task_id: TaskId) -> OrchestrationResult<Task> {
        let state = self.lock_state()?;
        state
            .tasks
            .get(&task_id)
            .map(|entry| entry.task.clone())
            .ok_or_else(|| task_lookup_error(task_id))
    }

    pub fn status(&self, task_id: TaskId) -> OrchestrationResult<TaskStatus> {
        Ok(self.snapshot(task_id)?.status)
    }

    /// Signalled once when the task reaches a terminal state.
    pub fn completion_signal(&self, task_id: TaskId) -> OrchestrationResult<Arc<Notify>> {
        let state = self.lock_state()?;
        state
            .tasks
            .get(&task_id)
            .map(|entry| entry.completion.clone())
            .ok_or_else(|| task_lookup_error(task_id))
    }

    pub fn list(&self) -> OrchestrationResult<Vec<Task>> {
        let state = self.lock_state()?;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .map(|entry| entry.task.clone())
            .collect();
        tasks.sort_by_key(|task| task.id);
        Ok(tasks)
    }

    fn lock_state(&self) -> OrchestrationResult<MutexGuard<'_, TableState>> {
        self.state
            .lock()
            .map_err(|_| CoreError::new(CoreErrorKind::Internal, "task table mutex poisoned"))
    }
}

fn entry_mut(state: &mut TableState, task_id: TaskId) -> OrchestrationResult<&mut TaskEntry> {
    state
        .tasks
        .get_mut(&task_id)
        .ok_or_else(|| task_lookup_error(task_id))
}

fn finish(entry: &mut TaskEntry, terminal: TaskStatus) -> Task {
    entry.task.status = terminal;
    entry.task.finished_at = Some(SystemTime::now());
    entry.task.execution_time = entry.dispatched.map(|dispatched| dispatched.elapsed());
    entry.completion.notify_waiters();
    entry.task.clone()
}

fn ensure_transition(
    task: &Task,
    expected: TaskStatus,
    desired: TaskStatus,
) -> OrchestrationResult<()> {
    if task.status == expected {
        return Ok(());
    }
    Err(invalid_task_transition(task.id, task.status, desired))
}

fn invalid_task_transition(task_id: TaskId, current: TaskStatus, desired: TaskStatus) -> CoreError {
    CoreError::new(
        CoreErrorKind::InvalidInput,
        format!(
            "task '{}' cannot transition from '{current:?}' to '{desired:?}'",
            task_id.0
        ),
    )
    .with_task(task_id)
}

fn task_lookup_error(task_id: TaskId) -> CoreError {
    CoreError::new(
        CoreErrorKind::InvalidInput,
        format!("unknown task id '{}'", task_id.0),
    )
    .with_task(task_id)
}
