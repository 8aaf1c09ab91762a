//! Actor identity: who is talking to SLB.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether an actor is an autonomous agent or a human operator.
///
/// The distinction gates pattern removal: agents may add patterns but never
/// remove them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    /// An AI agent.
    Agent,
    /// A human operator.
    Human,
}

/// An identified actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Actor name.
    pub name: String,
    /// Agent or human.
    pub kind: ActorKind,
}

impl Actor {
    /// Create an agent actor.
    #[must_use]
    pub fn agent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ActorKind::Agent,
        }
    }

    /// Create a human actor.
    #[must_use]
    pub fn human(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ActorKind::Human,
        }
    }

    /// Resolve the actor name from the environment: `SLB_ACTOR` wins, then
    /// `AGENT_NAME`, then the fallback. Env-resolved actors are agents; a
    /// human identity is always an explicit claim.
    #[must_use]
    pub fn from_env(fallback: &str) -> Self {
        let name = std::env::var("SLB_ACTOR")
            .or_else(|_| std::env::var("AGENT_NAME"))
            .unwrap_or_else(|_| fallback.to_string());
        Self::agent(name)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ActorKind::Agent => write!(f, "agent:{}", self.name),
            ActorKind::Human => write!(f, "human:{}", self.name),
        }
    }
}
