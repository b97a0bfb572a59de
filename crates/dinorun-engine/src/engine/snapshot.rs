use serde::{Deserialize, Serialize};

use crate::{core::Obstacle, engine::agent::AgentSnapshot};

/// Read-only projection of one simulated frame for an external renderer.
///
/// Rendering from a snapshot never influences the simulation, so renderers
/// are free to skip frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub frame: u64,
    pub agents: Vec<AgentSnapshot>,
    pub obstacles: Vec<Obstacle>,
    /// Obstacles that have scrolled past the player.
    pub passed: u64,
}

impl WorldSnapshot {
    /// Best fitness among all agents, or `0.0` without agents.
    #[must_use]
    pub fn best_fitness(&self) -> f64 {
        self.agents
            .iter()
            .map(|agent| agent.fitness)
            .fold(0.0, f64::max)
    }

    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.agents.iter().filter(|agent| agent.alive).count()
    }
}
