use std::sync::Arc;

use crate::agents::agent::{
    Agent, AgentResult, ChatMessage, LanguageModel, ensure_task_supported,
};
use crate::models::{AgentDescriptor, Capability, CoreError, CoreErrorKind, Role, Task};

/// Static shape of a model-backed agent: who it is and how it phrases a task.
pub struct AgentProfile {
    pub id: &'static str,
    pub name: &'static str,
    pub capability: Capability,
    pub system_prompt: &'static str,
    pub render_task: fn(&Task) -> String,
}

pub const CODE_ANALYSIS_PROFILE: AgentProfile = AgentProfile {
    id: "code-analysis",
    name: "Code analysis agent",
    capability: Capability::CodeAnalysis,
    system_prompt: "You review source code. Report defects, risky constructs and concrete \
                    improvements, citing the lines involved.",
    render_task: render_code_analysis,
};

pub const GENERAL_PROFILE: AgentProfile = AgentProfile {
    id: "general",
    name: "General assistant",
    capability: Capability::General,
    system_prompt: "You are a helpful assistant. Answer precisely and say when you are unsure.",
    render_task: render_plain,
};

pub const SEARCH_PROFILE: AgentProfile = AgentProfile {
    id: "search",
    name: "Search agent",
    capability: Capability::Search,
    system_prompt: "You answer lookup requests. Summarize the most relevant findings first \
                    and list sources when the context provides them.",
    render_task: render_search,
};

pub const DOCUMENTATION_PROFILE: AgentProfile = AgentProfile {
    id: "documentation",
    name: "Documentation agent",
    capability: Capability::Documentation,
    system_prompt: "You write developer documentation: purpose, usage, parameters and \
                    examples, in Markdown.",
    render_task: render_code_analysis,
};

pub struct PromptedAgent {
    descriptor: AgentDescriptor,
    profile: &'static AgentProfile,
    model: Arc<dyn LanguageModel>,
}

impl PromptedAgent {
    pub fn new(profile: &'static AgentProfile, model: Arc<dyn LanguageModel>) -> Self {
        Self::with_id(profile, profile.id, model)
    }

    /// Same profile under another id, for running several agents of one kind.
    pub fn with_id(
        profile: &'static AgentProfile,
        id: impl Into<String>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            descriptor: AgentDescriptor::new(id, profile.name, [profile.capability]),
            profile,
            model,
        }
    }

    pub fn code_analysis(model: Arc<dyn LanguageModel>) -> Self {
        Self::new(&CODE_ANALYSIS_PROFILE, model)
    }

    pub fn general(model: Arc<dyn LanguageModel>) -> Self {
        Self::new(&GENERAL_PROFILE, model)
    }

    pub fn search(model: Arc<dyn LanguageModel>) -> Self {
        Self::new(&SEARCH_PROFILE, model)
    }

    pub fn documentation(model: Arc<dyn LanguageModel>) -> Self {
        Self::new(&DOCUMENTATION_PROFILE, model)
    }

    fn messages(&self, task: &Task) -> Vec<ChatMessage> {
        vec![
            ChatMessage::new(Role::System, self.profile.system_prompt),
            ChatMessage::new(Role::User, (self.profile.render_task)(task)),
        ]
    }
}

impl Agent for PromptedAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    fn handle(&self, task: &Task) -> AgentResult<String> {
        ensure_task_supported(&self.descriptor, task)?;

        self.model
            .complete(&self.messages(task))
            .map_err(|error| CoreError {
                agent: Some(self.descriptor.id.clone()),
                capability: Some(task.capability),
                task: Some(task.id),
                kind: CoreErrorKind::AgentExecution,
                message: format!("language model call failed: {}", error.message),
            })
    }
}

fn render_plain(task: &Task) -> String {
    let mut prompt = task.description.clone();
    let extras: Vec<String> = task
        .context
        .iter()
        .map(|(key, value)| match value.as_str() {
            Some(text) => format!("{key}: {text}"),
            None => format!("{key}: {value}"),
        })
        .collect();
    if !extras.is_empty() {
        prompt.push_str("\n\nContext:\n");
        prompt.push_str(&extras.join("\n"));
    }
    prompt
}

fn render_code_analysis(task: &Task) -> String {
    let Some(code) = task.context_str("code") else {
        return render_plain(task);
    };
    let language = task.context_str("language").unwrap_or("");
    format!("{}\n\n```{language}\n{code}\n```", task.description)
}

fn render_search(task: &Task) -> String {
    match task.context_str("query") {
        Some(query) => format!("{}\n\nQuery: {query}", task.description),
        None => render_plain(task),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::SystemTime;

    use super::PromptedAgent;
    use crate::agents::{Agent, AgentResult, ChatMessage, LanguageModel};
    use crate::models::{
        Capability, CoreError, CoreErrorKind, Role, Task, TaskContext, TaskId, TaskStatus,
    };

    #[derive(Default)]
    struct RecordingModel {
        seen: Mutex<Vec<ChatMessage>>,
        fail: bool,
    }

    impl LanguageModel for RecordingModel {
        fn complete(&self, messages: &[ChatMessage]) -> AgentResult<String> {
            self.seen.lock().unwrap().extend_from_slice(messages);
            if self.fail {
                return Err(CoreError::new(CoreErrorKind::Internal, "model offline"));
            }
            Ok("ok".to_string())
        }
    }

    fn task(capability: Capability, context: TaskContext) -> Task {
        Task {
            id: TaskId(7),
            description: "review this".to_string(),
            capability,
            context,
            status: TaskStatus::Running,
            agent: None,
            created_at: SystemTime::now(),
            dispatched_at: None,
            started_at: None,
            finished_at: None,
            execution_time: None,
            result: None,
            error: None,
        }
    }

    #[test]
    fn code_analysis_fences_code_from_context() {
        let model = Arc::new(RecordingModel::default());
        let agent = PromptedAgent::code_analysis(model.clone());
        let mut context = TaskContext::new();
        context.insert("code".to_string(), "def test(): pass".into());
        context.insert("language".to_string(), "python".into());

        agent.handle(&task(Capability::CodeAnalysis, context)).unwrap();

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen[0].role, Role::System);
        assert!(seen[1].content.contains("```python\ndef test(): pass\n```"));
    }

    #[test]
    fn model_failures_surface_as_agent_execution_errors() {
        let model = Arc::new(RecordingModel {
            fail: true,
            ..RecordingModel::default()
        });
        let agent = PromptedAgent::general(model);

        let error = agent
            .handle(&task(Capability::General, TaskContext::new()))
            .unwrap_err();
        assert_eq!(error.kind, CoreErrorKind::AgentExecution);
        assert_eq!(error.agent.as_ref().map(|id| id.as_str()), Some("general"));
    }

    #[test]
    fn unsupported_capability_is_rejected_before_model_call() {
        let model = Arc::new(RecordingModel::default());
        let agent = PromptedAgent::search(model.clone());

        let error = agent
            .handle(&task(Capability::CodeAnalysis, TaskContext::new()))
            .unwrap_err();
        assert_eq!(error.kind, CoreErrorKind::InvalidInput);
        assert!(model.seen.lock().unwrap().is_empty());
    }
}
