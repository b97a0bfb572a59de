use std::path::PathBuf;

use anyhow::Context;
use dinorun_brain::{Activation, DebugTrace};
use dinorun_engine::{GameSession, Level, LevelStream, WorldConfig, WorldSnapshot};
use serde::Serialize;

use crate::util::{self, Output};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct AutoPlayArg {
    /// Path to the model file (JSON format)
    model_path: PathBuf,
    /// Level to play
    #[arg(long, default_value_t = 1)]
    level: u8,
    /// Hidden layer activation the model was trained with
    #[arg(long, default_value = "leakyrelu")]
    activation: Activation,
    /// Maximum number of frames to simulate
    #[arg(long, default_value_t = 20_000)]
    frame_limit: u64,
    /// Write one JSON snapshot per frame to this file (JSON lines)
    #[arg(long)]
    frames: Option<PathBuf>,
    /// Output file path for the result
    #[arg(long)]
    output: Option<PathBuf>,
}

/// One line of the frame log.
#[derive(Debug, Serialize)]
struct FrameRecord<'a> {
    snapshot: &'a WorldSnapshot,
    trace: &'a DebugTrace,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlayResult {
    level: u8,
    frames: u64,
    /// Frames the runner was alive for.
    survived: u64,
    score: f64,
    passed: u64,
    cleared: bool,
}

pub(crate) fn run(arg: &AutoPlayArg) -> anyhow::Result<()> {
    let AutoPlayArg {
        model_path,
        level,
        activation,
        frame_limit,
        frames,
        output,
    } = arg;

    let model = util::read_model_file(model_path)?;
    let schema = model
        .schema()
        .with_context(|| format!("Invalid model file: {}", model_path.display()))?;
    let loaded = model
        .load(schema)
        .with_context(|| format!("Invalid model file: {}", model_path.display()))?;
    tracing::info!(
        schema = schema.version(),
        inputs = ?schema.labels(),
        sensing = ?loaded.sensing,
        generation = loaded.generation,
        best_score = loaded.best_score,
        "model loaded"
    );

    let world = WorldConfig::default();
    let stage = Level::numbered(*level, &world)
        .with_context(|| format!("Level {level} does not exist"))?;
    let mut session = GameSession::new(world.clone(), LevelStream::new(world.clone(), stage));
    let mut frame_log = frames.clone().map(Output::open).transpose()?;

    while session.state().is_playing() && !session.is_cleared() && session.frame() < *frame_limit
    {
        let mut trace = None;
        session.try_step_by(|agent, obstacles| {
            let inputs = loaded.sensing.inputs(agent, obstacles, &world, schema);
            let decided = loaded.network.forward_with_trace(&inputs, *activation)?;
            let jump = decided.decision;
            trace = Some(decided);
            anyhow::Ok(jump)
        })?;
        if let (Some(log), Some(trace)) = (&mut frame_log, &trace) {
            log.write_json_line(FrameRecord {
                snapshot: &session.snapshot(),
                trace,
            })?;
        }
    }

    let snapshot = session.snapshot();
    let result = PlayResult {
        level: *level,
        frames: session.frame(),
        survived: session.agent().frames_survived(),
        score: session.score(),
        passed: snapshot.passed,
        cleared: session.is_cleared(),
    };
    tracing::info!(
        frames = result.frames,
        score = result.score,
        passed = result.passed,
        cleared = result.cleared,
        "run finished"
    );
    Output::save_json(&result, output.clone())?;

    Ok(())
}
