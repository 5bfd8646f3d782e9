use std::sync::Arc;

use crate::agents::{
    Agent, CODE_ANALYSIS_PROFILE, CalculatorAgent, DOCUMENTATION_PROFILE, GENERAL_PROFILE,
    LanguageModel, PromptedAgent, SEARCH_PROFILE,
};
use crate::models::Capability;

/// Builds the stock agents. Registration is left to the caller.
pub struct AgentFactory;

impl AgentFactory {
    pub fn create(capability: Capability, model: Arc<dyn LanguageModel>) -> Arc<dyn Agent> {
        match capability {
            Capability::CodeAnalysis => Arc::new(PromptedAgent::new(&CODE_ANALYSIS_PROFILE, model)),
            Capability::General => Arc::new(PromptedAgent::new(&GENERAL_PROFILE, model)),
            Capability::Search => Arc::new(PromptedAgent::new(&SEARCH_PROFILE, model)),
            Capability::Documentation => {
                Arc::new(PromptedAgent::new(&DOCUMENTATION_PROFILE, model))
            }
            Capability::Calculation => Arc::new(CalculatorAgent::new()),
        }
    }

    pub fn create_all(model: Arc<dyn LanguageModel>) -> Vec<Arc<dyn Agent>> {
        Capability::ALL
            .iter()
            .map(|capability| Self::create(*capability, model.clone()))
            .collect()
    }
}
