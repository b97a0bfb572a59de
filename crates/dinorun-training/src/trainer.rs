//! Generation loop tying the simulation and the evolution engine together.

use dinorun_brain::{ModelFile, Network};
use rand::{Rng, SeedableRng as _};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::{
    config::{ConfigError, TrainConfig},
    genetic::TrainingSession,
    simulation::{Population, Simulation},
};

/// Fitness statistics of one evaluated generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub generation: u64,
    /// Frames simulated before every agent died, the level ran out or the
    /// frame limit hit.
    pub frames: u64,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    /// Agents still alive when the generation ended.
    pub survivors: usize,
}

impl GenerationReport {
    fn new(generation: u64, frames: u64, scores: &[f64], survivors: usize) -> Self {
        let (min, max, sum) = scores.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), &s| (min.min(s), max.max(s), sum + s),
        );
        #[expect(clippy::cast_precision_loss)]
        let mean = if scores.is_empty() {
            0.0
        } else {
            sum / scores.len() as f64
        };
        Self {
            generation,
            frames,
            min: if scores.is_empty() { 0.0 } else { min },
            mean,
            max: if scores.is_empty() { 0.0 } else { max },
            survivors,
        }
    }
}

/// Why [`Trainer::run`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::IsVariant)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    GenerationLimit,
    ScoreGoal,
}

/// Drives a population through evaluate/evolve cycles.
#[derive(Debug)]
pub struct Trainer<R = Pcg32> {
    config: TrainConfig,
    session: TrainingSession,
    simulation: Simulation,
    population: Population,
    rng: R,
}

impl Trainer<Pcg32> {
    /// Creates a trainer seeded from `config.seed`, or from the thread RNG if
    /// no seed is configured.
    pub fn new(config: TrainConfig) -> Result<Self, ConfigError> {
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        tracing::debug!(seed, "training RNG seeded");
        Self::with_rng(config, Pcg32::seed_from_u64(seed))
    }
}

impl<R> Trainer<R>
where
    R: Rng,
{
    pub fn with_rng(config: TrainConfig, mut rng: R) -> Result<Self, ConfigError> {
        let topology = config.topology()?;
        tracing::debug!(
            inputs = topology.input_size(),
            hidden = topology.hidden_size(),
            parameters = topology.parameter_count(),
            "network topology"
        );
        let simulation = config.simulation()?;
        let session = TrainingSession::new(topology, config.evolution.clone());
        let networks = session.random_population(config.population_size, &mut rng);
        let population = Population::new(networks.into_iter().map(Some), &config.world);
        Ok(Self {
            config,
            session,
            simulation,
            population,
            rng,
        })
    }

    #[must_use]
    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    #[must_use]
    pub fn session(&self) -> &TrainingSession {
        &self.session
    }

    #[must_use]
    pub fn population(&self) -> &Population {
        &self.population
    }

    #[must_use]
    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Number of generations evaluated so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.session.generation()
    }

    /// Best network observed over all evaluated generations.
    #[must_use]
    pub fn best_network(&self) -> Option<&Network> {
        self.session.best_network()
    }

    /// Seeds the current population with copies of `network`, for example to
    /// continue training a persisted model.
    ///
    /// The first member gets `network` itself, the others mutated copies.
    /// Ignored if the network's topology does not match the configuration.
    pub fn seed_population(&mut self, network: &Network) {
        if network.topology() != self.session.topology() {
            tracing::warn!(
                expected = ?self.session.topology(),
                actual = ?network.topology(),
                "seed network has a different topology, ignoring it"
            );
            return;
        }
        let params = &self.config.evolution;
        let rng = &mut self.rng;
        let networks = (0..self.config.population_size).map(|i| {
            if i == 0 {
                Some(network.clone())
            } else {
                Some(network.mutate(
                    params.mutation_rate,
                    params.mutation_amount,
                    params.noise,
                    &mut *rng,
                ))
            }
        });
        self.population
            .replace_networks(networks.collect::<Vec<_>>(), &self.config.world);
    }

    /// Evaluates the current population, then breeds the next one.
    pub fn run_generation(&mut self) -> GenerationReport {
        let Self {
            config,
            session,
            simulation,
            population,
            rng,
        } = self;

        simulation.reset(population);
        while simulation.frame() < config.frame_limit
            && !simulation.step(population)
            && !simulation.is_exhausted(population)
        {}

        let scores = population.scores();
        let report = GenerationReport::new(
            session.generation(),
            simulation.frame(),
            &scores,
            population.alive_count(),
        );
        tracing::info!(
            generation = report.generation,
            frames = report.frames,
            min = report.min,
            mean = report.mean,
            max = report.max,
            survivors = report.survivors,
            "generation evaluated"
        );

        let parents = population.networks();
        let offspring =
            session.next_generation(&parents, &scores, config.population_size, rng);
        population.replace_networks(
            offspring.into_iter().map(|child| Some(child.network)),
            &config.world,
        );
        report
    }

    /// Runs generations until the generation limit or the score goal is
    /// reached, calling `on_generation` after each one.
    pub fn run<F>(&mut self, mut on_generation: F) -> StopReason
    where
        F: FnMut(&GenerationReport),
    {
        while self.session.generation() < self.config.max_generations {
            let report = self.run_generation();
            on_generation(&report);
            if self.config.score_goal.is_some_and(|goal| report.max >= goal) {
                tracing::info!(
                    generation = report.generation,
                    score = report.max,
                    "score goal reached"
                );
                return StopReason::ScoreGoal;
            }
        }
        StopReason::GenerationLimit
    }

    /// Persistable model of the best network so far.
    #[must_use]
    pub fn model(&self) -> Option<ModelFile> {
        self.session.best_network().map(|network| {
            ModelFile::new(
                network,
                self.config.schema,
                self.session.generation(),
                self.session.best_score(),
            )
            .with_sensing(self.config.mode.sensing())
        })
    }
}
