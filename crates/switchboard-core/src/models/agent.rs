use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    CodeAnalysis,
    General,
    Search,
    Documentation,
    Calculation,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::CodeAnalysis,
        Capability::General,
        Capability::Search,
        Capability::Documentation,
        Capability::Calculation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CodeAnalysis => "code_analysis",
            Self::General => "general",
            Self::Search => "search",
            Self::Documentation => "documentation",
            Self::Calculation => "calculation",
        }
    }
}

impl std::str::FromStr for Capability {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "code_analysis" => Ok(Self::CodeAnalysis),
            "general" => Ok(Self::General),
            "search" => Ok(Self::Search),
            "documentation" => Ok(Self::Documentation),
            "calculation" => Ok(Self::Calculation),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AgentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub id: AgentId,
    pub name: String,
    pub capabilities: Vec<Capability>,
}

impl AgentDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        capabilities: impl IntoIterator<Item = Capability>,
    ) -> Self {
        let mut capabilities: Vec<Capability> = capabilities.into_iter().collect();
        capabilities.sort();
        capabilities.dedup();
        Self {
            id: AgentId::new(id),
            name: name.into(),
            capabilities,
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Point-in-time view of a registered agent.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub name: String,
    pub capabilities: Vec<Capability>,
    pub busy: bool,
}
