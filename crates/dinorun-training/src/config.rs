use std::sync::Arc;

use dinorun_brain::{Activation, InputSchema, ShapeError, Topology};
use dinorun_engine::{
    DEFAULT_LEVEL_LENGTH, Level, LevelSeed, LevelStream, ObstacleStream, ProceduralStream,
    WorldConfig,
};
use serde::{Deserialize, Serialize};

use crate::{
    genetic::EvolutionParams,
    simulation::{BrainConfig, Simulation, StreamFactory, WorldMode},
};

/// A training configuration cannot be turned into a simulation.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display("level {number} does not exist")]
    UnknownLevel { number: u8 },
    #[display("seeded level must contain at least one obstacle")]
    EmptyLevel,
    #[display("population size must be at least 1")]
    EmptyPopulation,
    #[display("invalid network topology")]
    Topology(ShapeError),
}

/// Where the obstacles of a training run come from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObstacleSource {
    /// One of the numbered, human playable levels.
    Level { number: u8 },
    /// A level generated from an arbitrary seed.
    Seeded {
        seed: LevelSeed,
        #[serde(default = "default_level_length")]
        length: usize,
    },
    /// Endless random obstacles.
    ///
    /// In isolated mode the `i`-th world uses `seed + i`.
    Procedural { seed: u64 },
}

fn default_level_length() -> usize {
    DEFAULT_LEVEL_LENGTH
}

impl Default for ObstacleSource {
    fn default() -> Self {
        Self::Level { number: 1 }
    }
}

enum Layout {
    Level(Arc<Level>),
    Procedural { seed: u64 },
}

impl ObstacleSource {
    fn layout(&self, world: &WorldConfig) -> Result<Layout, ConfigError> {
        match *self {
            Self::Level { number } => Level::numbered(number, world)
                .map(|level| Layout::Level(Arc::new(level)))
                .ok_or(ConfigError::UnknownLevel { number }),
            Self::Seeded { length: 0, .. } => Err(ConfigError::EmptyLevel),
            Self::Seeded { seed, length } => {
                Ok(Layout::Level(Arc::new(Level::generate(seed, length, world))))
            }
            Self::Procedural { seed } => Ok(Layout::Procedural { seed }),
        }
    }

    /// Builds a single stream, as used by the shared world.
    pub fn stream(&self, world: &WorldConfig) -> Result<Box<dyn ObstacleStream>, ConfigError> {
        let stream: Box<dyn ObstacleStream> = match self.layout(world)? {
            Layout::Level(level) => Box::new(LevelStream::new(world.clone(), level)),
            Layout::Procedural { seed } => {
                Box::new(ProceduralStream::with_seed(world.clone(), seed))
            }
        };
        Ok(stream)
    }

    /// Builds a factory producing one stream per isolated world.
    ///
    /// Level based sources share one level between all worlds.
    pub fn factory(&self, world: &WorldConfig) -> Result<StreamFactory, ConfigError> {
        let layout = self.layout(world)?;
        let world = world.clone();
        let factory: StreamFactory = match layout {
            Layout::Level(level) => Box::new(move |_: usize| -> Box<dyn ObstacleStream> {
                Box::new(LevelStream::new(world.clone(), Arc::clone(&level)))
            }),
            Layout::Procedural { seed } => Box::new(move |i: usize| -> Box<dyn ObstacleStream> {
                Box::new(ProceduralStream::with_seed(
                    world.clone(),
                    seed.wrapping_add(i as u64),
                ))
            }),
        };
        Ok(factory)
    }
}

/// Everything needed to run a training session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub population_size: usize,
    pub mode: WorldMode,
    pub obstacles: ObstacleSource,
    pub schema: InputSchema,
    pub hidden_size: usize,
    pub activation: Activation,
    /// Ends a generation even if some agents are still alive.
    pub frame_limit: u64,
    /// Stops training once the best score of a generation reaches this value.
    pub score_goal: Option<f64>,
    pub max_generations: u64,
    /// Seed of the training RNG. A random seed is drawn if absent.
    pub seed: Option<u64>,
    pub world: WorldConfig,
    pub evolution: EvolutionParams,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            mode: WorldMode::Shared,
            obstacles: ObstacleSource::default(),
            schema: InputSchema::default(),
            hidden_size: 12,
            activation: Activation::default(),
            frame_limit: 20_000,
            score_goal: None,
            max_generations: 200,
            seed: None,
            world: WorldConfig::default(),
            evolution: EvolutionParams::default(),
        }
    }
}

impl TrainConfig {
    pub fn topology(&self) -> Result<Topology, ConfigError> {
        Topology::new(self.schema.input_size(), self.hidden_size).map_err(ConfigError::Topology)
    }

    #[must_use]
    pub fn brain(&self) -> BrainConfig {
        BrainConfig {
            schema: self.schema,
            activation: self.activation,
        }
    }

    /// Builds the simulation described by this configuration.
    pub fn simulation(&self) -> Result<Simulation, ConfigError> {
        if self.population_size == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        Ok(match self.mode {
            WorldMode::Shared => Simulation::shared(
                self.world.clone(),
                self.brain(),
                self.obstacles.stream(&self.world)?,
            ),
            WorldMode::Isolated => Simulation::isolated(
                self.world.clone(),
                self.brain(),
                self.obstacles.factory(&self.world)?,
            ),
        })
    }
}
