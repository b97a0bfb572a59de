use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use dinorun_brain::{Activation, InputSchema};
use dinorun_training::{ObstacleSource, TrainConfig, Trainer, WorldMode};

use crate::util::{self, Output};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct TrainArg {
    /// Training configuration file (JSON format)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of agents per generation
    #[arg(long)]
    population: Option<usize>,
    /// World layout: shared or isolated
    #[arg(long)]
    mode: Option<WorldMode>,
    /// Train on a numbered level
    #[arg(long, conflicts_with = "procedural")]
    level: Option<u8>,
    /// Train on endless random obstacles drawn from this seed
    #[arg(long)]
    procedural: Option<u64>,
    /// Input schema version
    #[arg(long)]
    schema: Option<u32>,
    /// Hidden layer size
    #[arg(long)]
    hidden: Option<usize>,
    /// Hidden layer activation: relu or leakyrelu
    #[arg(long)]
    activation: Option<Activation>,
    /// Maximum number of generations
    #[arg(long)]
    generations: Option<u64>,
    /// Maximum number of frames per generation
    #[arg(long)]
    frame_limit: Option<u64>,
    /// Stop once a generation reaches this score
    #[arg(long)]
    score_goal: Option<f64>,
    /// Seed of the training RNG
    #[arg(long)]
    seed: Option<u64>,
    /// Continue training from a model file
    #[arg(long)]
    resume: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

impl TrainArg {
    fn load_config(&self) -> anyhow::Result<TrainConfig> {
        let mut config: TrainConfig = match &self.config {
            Some(path) => util::read_json_file("training config", path)?,
            None => TrainConfig::default(),
        };
        if let Some(population) = self.population {
            config.population_size = population;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(number) = self.level {
            config.obstacles = ObstacleSource::Level { number };
        }
        if let Some(seed) = self.procedural {
            config.obstacles = ObstacleSource::Procedural { seed };
        }
        if let Some(version) = self.schema {
            config.schema = InputSchema::try_from(version)?;
        }
        if let Some(hidden) = self.hidden {
            config.hidden_size = hidden;
        }
        if let Some(activation) = self.activation {
            config.activation = activation;
        }
        if let Some(generations) = self.generations {
            config.max_generations = generations;
        }
        if let Some(frame_limit) = self.frame_limit {
            config.frame_limit = frame_limit;
        }
        if self.score_goal.is_some() {
            config.score_goal = self.score_goal;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        Ok(config)
    }
}

pub(crate) fn run(arg: &TrainArg) -> anyhow::Result<()> {
    let mut config = arg.load_config()?;

    let resumed = arg
        .resume
        .as_ref()
        .map(|path| -> anyhow::Result<_> {
            let model = util::read_model_file(path)?;
            model
                .load(config.schema)
                .with_context(|| format!("Failed to load model: {}", path.display()))
        })
        .transpose()?;
    if let Some(loaded) = &resumed {
        config.hidden_size = loaded.network.topology().hidden_size();
        if loaded.sensing != config.mode.sensing() {
            tracing::warn!(
                model = ?loaded.sensing,
                training = ?config.mode.sensing(),
                "resumed model was trained with a different obstacle view"
            );
        }
    }

    tracing::info!(
        population = config.population_size,
        mode = ?config.mode,
        obstacles = ?config.obstacles,
        schema = config.schema.version(),
        hidden = config.hidden_size,
        generations = config.max_generations,
        "starting training"
    );

    let mut trainer = Trainer::new(config).context("Invalid training configuration")?;
    if let Some(loaded) = &resumed {
        trainer.seed_population(&loaded.network);
    }

    let reason = trainer.run(|_| {});
    tracing::info!(
        ?reason,
        generations = trainer.generation(),
        best_score = trainer.session().best_score(),
        "training finished"
    );

    let model = trainer
        .model()
        .context("No generation was evaluated, nothing to save")?
        .with_trained_at(Utc::now());
    Output::save_json(&model, arg.output.clone())?;

    Ok(())
}
