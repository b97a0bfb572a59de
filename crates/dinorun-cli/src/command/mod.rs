use clap::{Parser, Subcommand};

use self::{auto_play::AutoPlayArg, migrate_model::MigrateModelArg, train::TrainArg};

mod auto_play;
mod migrate_model;
mod train;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// What mode to run the program in
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Train runner networks with the genetic algorithm
    Train(#[clap(flatten)] TrainArg),
    /// Let a trained model play a level headless
    #[command(name = "auto-play")]
    AutoPlay(#[clap(flatten)] AutoPlayArg),
    /// Rewrite a model file for another input schema version
    MigrateModel(#[clap(flatten)] MigrateModelArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Train(arg) => train::run(&arg)?,
        Mode::AutoPlay(arg) => auto_play::run(&arg)?,
        Mode::MigrateModel(arg) => migrate_model::run(&arg)?,
    }
    Ok(())
}
