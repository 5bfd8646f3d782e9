pub mod agent;
pub mod calculator;
pub mod factory;
pub mod prompted;

pub use agent::{Agent, AgentResult, ChatMessage, LanguageModel, ensure_task_supported};
pub use calculator::CalculatorAgent;
pub use factory::AgentFactory;
pub use prompted::{
    AgentProfile, CODE_ANALYSIS_PROFILE, DOCUMENTATION_PROFILE, GENERAL_PROFILE, PromptedAgent,
    SEARCH_PROFILE,
};
