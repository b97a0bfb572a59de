//! Neuroevolution of runner policies.
//!
//! - [`simulation`] - Lockstep evaluation of a [`Population`] in shared or isolated worlds
//! - [`genetic`] - The evolution engine producing the next generation of networks
//! - [`trainer`] - Generation loop combining both, with per-generation reports
//! - [`config`] - Serializable configuration of a training run
//!
//! # Example
//!
//! ```
//! use dinorun_training::{TrainConfig, Trainer};
//!
//! let config = TrainConfig {
//!     population_size: 8,
//!     frame_limit: 300,
//!     max_generations: 2,
//!     seed: Some(7),
//!     ..TrainConfig::default()
//! };
//! let mut trainer = Trainer::new(config)?;
//! trainer.run(|report| println!("{} {:.1}", report.generation, report.max));
//! assert!(trainer.model().is_some());
//! # Ok::<(), dinorun_training::ConfigError>(())
//! ```

pub use self::{config::*, simulation::*, trainer::*};

pub mod config;
pub mod genetic;
pub mod simulation;
pub mod trainer;
