//! Lockstep evaluation of a whole population.
//!
//! Each call to [`Simulation::step`] advances every living agent by exactly
//! one frame. Two world layouts are supported:
//!
//! - **Shared** - One obstacle stream for everybody. The stream is advanced
//!   once per frame and the resulting snapshot is read by every agent. Fitness
//!   is the distance traveled.
//! - **Isolated** - Every agent runs in its own world with its own stream.
//!   Fitness is the survival score.
//!
//! Agents only read their own network and an immutable obstacle snapshot, and
//! never write shared state, so with the `parallel` feature the per-agent
//! updates run on the rayon thread pool. Reductions such as picking the best
//! living agent happen after all agents have finished the frame.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use dinorun_brain::{
    Activation, DebugTrace, InputSchema, Network, Sensing, isolated_inputs, shared_inputs,
};
use dinorun_engine::{Agent, FitnessKind, Obstacle, ObstacleStream, WorldConfig, WorldSnapshot};
use serde::{Deserialize, Serialize};

/// World layout used during training.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::FromStr,
)]
#[serde(rename_all = "snake_case")]
pub enum WorldMode {
    #[default]
    Shared,
    Isolated,
}

impl WorldMode {
    #[must_use]
    pub fn fitness_kind(self) -> FitnessKind {
        match self {
            Self::Shared => FitnessKind::Distance,
            Self::Isolated => FitnessKind::Survival,
        }
    }

    /// Obstacle view networks are trained with in this layout.
    #[must_use]
    pub fn sensing(self) -> Sensing {
        match self {
            Self::Shared => Sensing::Shared,
            Self::Isolated => Sensing::Isolated,
        }
    }
}

/// How networks read the world.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrainConfig {
    pub schema: InputSchema,
    pub activation: Activation,
}

/// An agent together with the network controlling it.
///
/// Keeping both in one value makes it impossible for agents and networks to
/// drift out of index alignment.
#[derive(Debug, Clone)]
pub struct Member {
    pub agent: Agent,
    /// `None` if no network could be provided; such an agent never jumps.
    pub network: Option<Network>,
}

impl Member {
    fn decide(&self, inputs: &[f64], activation: Activation) -> bool {
        self.network
            .as_ref()
            .and_then(|network| network.decide(inputs, activation).ok())
            .unwrap_or(false)
    }
}

/// Fixed-size, ordered collection of agents and their networks.
#[derive(Debug, Clone, Default)]
pub struct Population {
    members: Vec<Member>,
}

impl Population {
    /// Creates a population with one fresh agent per network.
    #[must_use]
    pub fn new<I>(networks: I, world: &WorldConfig) -> Self
    where
        I: IntoIterator<Item = Option<Network>>,
    {
        let members = networks
            .into_iter()
            .map(|network| Member {
                agent: Agent::new(world),
                network,
            })
            .collect();
        Self { members }
    }

    #[must_use]
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Networks in population order.
    #[must_use]
    pub fn networks(&self) -> Vec<Option<Network>> {
        self.members.iter().map(|m| m.network.clone()).collect()
    }

    /// Fitness scores in population order.
    #[must_use]
    pub fn scores(&self) -> Vec<f64> {
        self.members.iter().map(|m| m.agent.fitness()).collect()
    }

    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.members.iter().filter(|m| m.agent.is_alive()).count()
    }

    #[must_use]
    pub fn all_dead(&self) -> bool {
        self.members.iter().all(|m| !m.agent.is_alive())
    }

    /// Index of the living agent with the highest fitness.
    #[must_use]
    pub fn best_living(&self) -> Option<usize> {
        self.members
            .iter()
            .enumerate()
            .filter(|(_, m)| m.agent.is_alive())
            .max_by(|(_, a), (_, b)| a.agent.fitness().total_cmp(&b.agent.fitness()))
            .map(|(i, _)| i)
    }

    /// Swaps in the networks of a new generation and resets every agent.
    ///
    /// The population takes the size of `networks`.
    pub fn replace_networks<I>(&mut self, networks: I, world: &WorldConfig)
    where
        I: IntoIterator<Item = Option<Network>>,
    {
        *self = Self::new(networks, world);
    }

    pub fn reset_agents(&mut self, world: &WorldConfig) {
        for member in &mut self.members {
            member.agent.reset(world);
        }
    }
}

/// Creates the stream of the `i`-th isolated world.
pub type StreamFactory = Box<dyn Fn(usize) -> Box<dyn ObstacleStream> + Send + Sync>;

struct IsolatedWorld {
    stream: Box<dyn ObstacleStream>,
    obstacles: Vec<Obstacle>,
}

fn fill_worlds(worlds: &mut Vec<IsolatedWorld>, factory: &StreamFactory, count: usize) {
    while worlds.len() < count {
        worlds.push(IsolatedWorld {
            stream: factory(worlds.len()),
            obstacles: Vec::new(),
        });
    }
}

enum Worlds {
    Shared {
        stream: Box<dyn ObstacleStream>,
        obstacles: Vec<Obstacle>,
    },
    Isolated {
        factory: StreamFactory,
        worlds: Vec<IsolatedWorld>,
    },
}

/// Advances a [`Population`] frame by frame.
pub struct Simulation {
    world: WorldConfig,
    brain: BrainConfig,
    worlds: Worlds,
    frame: u64,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("world", &self.world)
            .field("brain", &self.brain)
            .field("mode", &self.mode())
            .field("frame", &self.frame)
            .finish_non_exhaustive()
    }
}

fn update_member(
    member: &mut Member,
    obstacles: &[Obstacle],
    world: &WorldConfig,
    brain: BrainConfig,
) {
    if !member.agent.is_alive() {
        return;
    }
    let inputs = shared_inputs(&member.agent, obstacles, world, brain.schema);
    let jump = member.decide(&inputs, brain.activation);
    member
        .agent
        .update(jump, obstacles, world, FitnessKind::Distance);
}

fn update_isolated_member(
    member: &mut Member,
    isolated: &mut IsolatedWorld,
    world: &WorldConfig,
    brain: BrainConfig,
) {
    if !member.agent.is_alive() {
        return;
    }
    isolated.obstacles = isolated.stream.advance(world.scroll_speed);
    let inputs = isolated_inputs(&member.agent, world, brain.schema);
    let jump = member.decide(&inputs, brain.activation);
    member
        .agent
        .update(jump, &isolated.obstacles, world, FitnessKind::Survival);
}

impl Simulation {
    /// All agents share `stream`.
    #[must_use]
    pub fn shared(world: WorldConfig, brain: BrainConfig, stream: Box<dyn ObstacleStream>) -> Self {
        Self {
            world,
            brain,
            worlds: Worlds::Shared {
                stream,
                obstacles: Vec::new(),
            },
            frame: 0,
        }
    }

    /// Every agent gets its own stream from `factory`.
    #[must_use]
    pub fn isolated(world: WorldConfig, brain: BrainConfig, factory: StreamFactory) -> Self {
        Self {
            world,
            brain,
            worlds: Worlds::Isolated {
                factory,
                worlds: Vec::new(),
            },
            frame: 0,
        }
    }

    #[must_use]
    pub fn mode(&self) -> WorldMode {
        match self.worlds {
            Worlds::Shared { .. } => WorldMode::Shared,
            Worlds::Isolated { .. } => WorldMode::Isolated,
        }
    }

    #[must_use]
    pub fn world(&self) -> &WorldConfig {
        &self.world
    }

    #[must_use]
    pub fn brain(&self) -> BrainConfig {
        self.brain
    }

    /// Frames simulated since the last reset.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Returns `true` once every living agent has passed the last obstacle
    /// its stream will ever produce.
    ///
    /// Worlds of dead agents stop advancing and are not considered.
    #[must_use]
    pub fn is_exhausted(&self, population: &Population) -> bool {
        match &self.worlds {
            Worlds::Shared { stream, .. } => stream.is_exhausted(),
            Worlds::Isolated { worlds, .. } => {
                worlds.len() >= population.len()
                    && population
                        .members
                        .iter()
                        .zip(worlds)
                        .filter(|(member, _)| member.agent.is_alive())
                        .all(|(_, w)| w.stream.is_exhausted())
            }
        }
    }

    /// Rewinds all streams and agents for a new generation.
    pub fn reset(&mut self, population: &mut Population) {
        population.reset_agents(&self.world);
        self.frame = 0;
        match &mut self.worlds {
            Worlds::Shared { stream, obstacles } => {
                stream.reset();
                obstacles.clear();
            }
            Worlds::Isolated { factory, worlds } => {
                worlds.truncate(population.len());
                for world in worlds.iter_mut() {
                    world.stream.reset();
                    world.obstacles.clear();
                }
                fill_worlds(worlds, factory, population.len());
            }
        }
    }

    /// Advances every living agent by one frame.
    ///
    /// Returns `true` when every agent is dead, which ends the generation.
    pub fn step(&mut self, population: &mut Population) -> bool {
        let world = &self.world;
        let brain = self.brain;
        match &mut self.worlds {
            Worlds::Shared { stream, obstacles } => {
                *obstacles = stream.advance(world.scroll_speed);
                let obstacles = obstacles.as_slice();

                #[cfg(feature = "parallel")]
                {
                    population
                        .members
                        .par_iter_mut()
                        .for_each(|member| update_member(member, obstacles, world, brain));
                }
                #[cfg(not(feature = "parallel"))]
                {
                    for member in &mut population.members {
                        update_member(member, obstacles, world, brain);
                    }
                }
            }
            Worlds::Isolated { factory, worlds } => {
                fill_worlds(worlds, factory, population.len());

                #[cfg(feature = "parallel")]
                {
                    population
                        .members
                        .par_iter_mut()
                        .zip(worlds.par_iter_mut())
                        .for_each(|(member, isolated)| {
                            update_isolated_member(member, isolated, world, brain);
                        });
                }
                #[cfg(not(feature = "parallel"))]
                {
                    for (member, isolated) in population.members.iter_mut().zip(worlds.iter_mut())
                    {
                        update_isolated_member(member, isolated, world, brain);
                    }
                }
            }
        }
        self.frame += 1;
        population.all_dead()
    }

    /// Obstacles that agent `index` currently sees.
    #[must_use]
    pub fn obstacles_of(&self, index: usize) -> &[Obstacle] {
        match &self.worlds {
            Worlds::Shared { obstacles, .. } => obstacles,
            Worlds::Isolated { worlds, .. } => worlds
                .get(index)
                .map_or(&[][..], |w| w.obstacles.as_slice()),
        }
    }

    fn passed_of(&self, index: usize) -> u64 {
        match &self.worlds {
            Worlds::Shared { stream, .. } => stream.passed(),
            Worlds::Isolated { worlds, .. } => worlds.get(index).map_or(0, |w| w.stream.passed()),
        }
    }

    /// Decision trace of the best living agent, for visualizers.
    ///
    /// Returns `None` when every agent is dead or the best agent has no
    /// usable network.
    #[must_use]
    pub fn trace_best(&self, population: &Population) -> Option<(usize, DebugTrace)> {
        let index = population.best_living()?;
        let member = &population.members[index];
        let network = member.network.as_ref()?;
        let inputs = self.mode().sensing().inputs(
            &member.agent,
            self.obstacles_of(index),
            &self.world,
            self.brain.schema,
        );
        let trace = network
            .forward_with_trace(&inputs, self.brain.activation)
            .ok()?;
        Some((index, trace))
    }

    /// Read-only projection of the current frame.
    ///
    /// In isolated mode the obstacles shown are those of the best living agent
    /// (or the first agent once all are dead).
    #[must_use]
    pub fn snapshot(&self, population: &Population) -> WorldSnapshot {
        let focus = population.best_living().unwrap_or(0);
        WorldSnapshot {
            frame: self.frame,
            agents: population
                .members
                .iter()
                .map(|m| m.agent.snapshot())
                .collect(),
            obstacles: self.obstacles_of(focus).to_vec(),
            passed: self.passed_of(focus),
        }
    }
}
