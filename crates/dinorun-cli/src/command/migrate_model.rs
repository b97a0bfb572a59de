use std::path::PathBuf;

use anyhow::Context;
use dinorun_brain::InputSchema;

use crate::util::{self, Output};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct MigrateModelArg {
    /// Path to the model file (JSON format)
    model_path: PathBuf,
    /// Target input schema version
    #[arg(long)]
    to: u32,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &MigrateModelArg) -> anyhow::Result<()> {
    let MigrateModelArg {
        model_path,
        to,
        output,
    } = arg;

    let target = InputSchema::try_from(*to)?;
    let model = util::read_model_file(model_path)?;
    let migrated = model
        .migrate(target)
        .with_context(|| format!("Failed to migrate model: {}", model_path.display()))?;
    Output::save_json(&migrated, output.clone())?;

    Ok(())
}
