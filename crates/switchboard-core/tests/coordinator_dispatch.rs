use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use switchboard_core::agents::{
    Agent, AgentResult, CalculatorAgent, ChatMessage, GENERAL_PROFILE, LanguageModel,
    PromptedAgent,
};
use switchboard_core::config::CoordinatorConfig;
use switchboard_core::models::{
    AgentDescriptor, Capability, CoreErrorKind, Role, Task, TaskRequest, TaskStatus,
};
use switchboard_core::orchestration::TaskCoordinator;
use switchboard_core::registry::AgentRegistry;

/// Answers with the last user message so tests can see what the agent was asked.
struct EchoModel;

impl LanguageModel for EchoModel {
    fn complete(&self, messages: &[ChatMessage]) -> AgentResult<String> {
        let prompt = messages
            .iter()
            .rev()
            .find(|message| message.role == Role::User)
            .map(|message| message.content.clone())
            .unwrap_or_default();
        Ok(format!("reviewed: {prompt}"))
    }
}

struct PanickingAgent {
    descriptor: AgentDescriptor,
}

impl Agent for PanickingAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    fn handle(&self, _task: &Task) -> AgentResult<String> {
        panic!("simulated agent panic");
    }
}

/// Sleeps while tracking how many calls overlap across every instance sharing the counters.
struct SlowAgent {
    descriptor: AgentDescriptor,
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Agent for SlowAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    fn handle(&self, task: &Task) -> AgentResult<String> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(60));
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(format!("done: {}", task.description))
    }
}

struct SleepingAgent {
    descriptor: AgentDescriptor,
    delay: Duration,
}

impl Agent for SleepingAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    fn handle(&self, task: &Task) -> AgentResult<String> {
        std::thread::sleep(self.delay);
        Ok(format!("slept on: {}", task.description))
    }
}

fn coordinator(agents: Vec<Arc<dyn Agent>>) -> TaskCoordinator {
    let registry = Arc::new(AgentRegistry::with_agents(agents).unwrap());
    TaskCoordinator::new(registry, CoordinatorConfig::default()).unwrap()
}

#[tokio::test]
async fn code_analysis_task_completes_with_agent_output() {
    let coordinator = coordinator(vec![Arc::new(PromptedAgent::code_analysis(Arc::new(
        EchoModel,
    )))]);

    let response = coordinator
        .execute_task(
            TaskRequest::new(Capability::CodeAnalysis, "Analyze this function")
                .with_context("code", "def test(): pass")
                .with_context("language", "python"),
        )
        .await;

    assert_eq!(response.status, TaskStatus::Completed);
    assert!(response.error.is_none());
    assert!(response.execution_time >= Duration::ZERO);
    assert_eq!(response.agent.as_ref().map(|id| id.as_str()), Some("code-analysis"));
    let result = response.result.unwrap();
    assert!(result.contains("Analyze this function"));
    assert!(result.contains("def test(): pass"));
}

#[tokio::test]
async fn task_without_capable_agent_fails_fast() {
    let coordinator = coordinator(vec![Arc::new(PromptedAgent::general(Arc::new(EchoModel)))]);

    let response = tokio::time::timeout(
        Duration::from_secs(1),
        coordinator.execute_task(TaskRequest::new(Capability::Search, "find the docs")),
    )
    .await
    .expect("no-agent failure must not wait for an agent");

    assert_eq!(response.status, TaskStatus::Failed);
    let error = response.error.unwrap();
    assert_eq!(error.kind, CoreErrorKind::NoAgentAvailable);
    assert_eq!(error.capability, Some(Capability::Search));
    assert_eq!(error.task, Some(response.task_id));
    assert!(response.result.is_none());
}

#[tokio::test]
async fn least_recently_used_agent_takes_the_next_task() {
    let model: Arc<dyn LanguageModel> = Arc::new(EchoModel);
    let coordinator = coordinator(vec![
        Arc::new(PromptedAgent::with_id(&GENERAL_PROFILE, "general-a", model.clone())),
        Arc::new(PromptedAgent::with_id(&GENERAL_PROFILE, "general-b", model)),
    ]);

    let mut picked = Vec::new();
    for index in 0..3 {
        let response = coordinator
            .execute_task(TaskRequest::new(Capability::General, format!("question {index}")))
            .await;
        assert!(response.is_completed());
        picked.push(response.agent.unwrap().0);
    }

    assert_eq!(picked, vec!["general-a", "general-b", "general-a"]);
}

#[tokio::test]
async fn panicking_agent_fails_only_its_own_task() {
    let coordinator = coordinator(vec![
        Arc::new(PanickingAgent {
            descriptor: AgentDescriptor::new("broken", "Broken agent", [Capability::Documentation]),
        }),
        Arc::new(PromptedAgent::general(Arc::new(EchoModel))),
    ]);

    let failed = coordinator
        .execute_task(TaskRequest::new(Capability::Documentation, "document this"))
        .await;
    assert_eq!(failed.status, TaskStatus::Failed);
    let error = failed.error.unwrap();
    assert_eq!(error.kind, CoreErrorKind::AgentExecution);
    assert_eq!(error.agent.as_ref().map(|id| id.as_str()), Some("broken"));

    let healthy = coordinator
        .execute_task(TaskRequest::new(Capability::General, "still there?"))
        .await;
    assert!(healthy.is_completed());

    let agents = coordinator.get_available_agents().unwrap();
    assert!(agents.iter().all(|agent| !agent.busy));
}

#[tokio::test]
async fn calculator_evaluates_arithmetic_and_reports_bad_input() {
    let coordinator = coordinator(vec![Arc::new(CalculatorAgent::new())]);

    let ok = coordinator
        .execute_task(
            TaskRequest::new(Capability::Calculation, "compute")
                .with_context("expression", "2 + 3 * 4"),
        )
        .await;
    assert_eq!(ok.result.as_deref(), Some("14"));

    let bad = coordinator
        .execute_task(TaskRequest::new(Capability::Calculation, "1 / 0"))
        .await;
    assert_eq!(bad.status, TaskStatus::Failed);
    assert_eq!(bad.error.unwrap().kind, CoreErrorKind::AgentExecution);
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let coordinator = coordinator(vec![Arc::new(CalculatorAgent::new())]);

    let error = coordinator
        .register_agent(Arc::new(CalculatorAgent::new()))
        .unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::DuplicateAgent);
    assert_eq!(coordinator.get_available_agents().unwrap().len(), 1);

    coordinator
        .register_agent(Arc::new(CalculatorAgent::with_id("calculator-2")))
        .unwrap();
    assert_eq!(coordinator.get_available_agents().unwrap().len(), 2);
}

#[tokio::test]
async fn worker_pool_bounds_concurrent_executions() {
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let agents: Vec<Arc<dyn Agent>> = (0..4)
        .map(|index| {
            Arc::new(SlowAgent {
                descriptor: AgentDescriptor::new(
                    format!("slow-{index}"),
                    "Slow agent",
                    [Capability::General],
                ),
                current: current.clone(),
                peak: peak.clone(),
            }) as Arc<dyn Agent>
        })
        .collect();
    let registry = Arc::new(AgentRegistry::with_agents(agents).unwrap());
    let coordinator =
        TaskCoordinator::new(registry, CoordinatorConfig::with_max_workers(2)).unwrap();

    let mut ids = Vec::new();
    for index in 0..6 {
        ids.push(
            coordinator
                .submit(TaskRequest::new(Capability::General, format!("job {index}")))
                .await
                .unwrap(),
        );
    }
    for id in ids {
        let task = coordinator
            .wait_for_terminal(id, Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.started_at.is_some());
        assert!(task.finished_at.is_some());
    }

    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(coordinator.list_tasks().unwrap().len(), 6);
}

#[tokio::test]
async fn tasks_waiting_on_a_busy_agent_leave_pool_slots_free() {
    let registry = Arc::new(
        AgentRegistry::with_agents(vec![
            Arc::new(SleepingAgent {
                descriptor: AgentDescriptor::new(
                    "slow-code",
                    "Slow code agent",
                    [Capability::CodeAnalysis],
                ),
                delay: Duration::from_millis(400),
            }) as Arc<dyn Agent>,
            Arc::new(PromptedAgent::general(Arc::new(EchoModel))),
        ])
        .unwrap(),
    );
    let coordinator =
        TaskCoordinator::new(registry, CoordinatorConfig::with_max_workers(2)).unwrap();

    let first = coordinator
        .submit(TaskRequest::new(Capability::CodeAnalysis, "first review"))
        .await
        .unwrap();
    let second = coordinator
        .submit(TaskRequest::new(Capability::CodeAnalysis, "second review"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = Instant::now();
    let general = coordinator
        .execute_task(TaskRequest::new(Capability::General, "quick question"))
        .await;
    assert!(general.is_completed());
    assert!(started.elapsed() < Duration::from_millis(250));
    assert!(!coordinator.status(first).unwrap().is_terminal());
    assert_eq!(coordinator.status(second).unwrap(), TaskStatus::Pending);

    for id in [first, second] {
        let task = coordinator
            .wait_for_terminal(id, Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
    }
}
