use std::convert::Infallible;

use crate::{
    core::{Obstacle, WorldConfig},
    engine::{
        agent::{Agent, FitnessKind},
        snapshot::WorldSnapshot,
        stream::ObstacleStream,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::IsVariant)]
pub enum SessionState {
    Playing,
    GameOver,
}

/// Edge-triggered jump request.
///
/// Pressing sets the latch; the next frame consumes it. Holding a key down
/// (pressing repeatedly without a frame in between) still yields a single
/// jump request.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JumpLatch {
    pending: bool,
}

impl JumpLatch {
    pub fn press(&mut self) {
        self.pending = true;
    }

    /// Returns whether a jump was requested since the last call and clears
    /// the request.
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }
}

/// A single-player game, driven one frame at a time.
///
/// Used for human play and for running a trained model outside of training.
/// Scoring uses the survival bonus per frame.
///
/// # Example
///
/// ```
/// use dinorun_engine::{GameSession, Level, LevelStream, WorldConfig};
///
/// let world = WorldConfig::default();
/// let level = Level::numbered(1, &world).unwrap();
/// let mut session = GameSession::new(world.clone(), LevelStream::new(world, level));
///
/// while session.state().is_playing() && session.frame() < 1000 {
///     session.step();
/// }
/// assert!(session.state().is_game_over());
/// ```
#[derive(Debug)]
pub struct GameSession<S> {
    world: WorldConfig,
    agent: Agent,
    stream: S,
    obstacles: Vec<Obstacle>,
    latch: JumpLatch,
    state: SessionState,
    frame: u64,
}

impl<S> GameSession<S>
where
    S: ObstacleStream,
{
    #[must_use]
    pub fn new(world: WorldConfig, stream: S) -> Self {
        Self {
            agent: Agent::new(&world),
            world,
            stream,
            obstacles: Vec::new(),
            latch: JumpLatch::default(),
            state: SessionState::Playing,
            frame: 0,
        }
    }

    #[must_use]
    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    #[must_use]
    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    #[must_use]
    pub fn score(&self) -> f64 {
        self.agent.fitness()
    }

    #[must_use]
    pub fn world(&self) -> &WorldConfig {
        &self.world
    }

    /// Returns `true` once the player survived every obstacle of a finite
    /// stream.
    #[must_use]
    pub fn is_cleared(&self) -> bool {
        self.state.is_playing() && self.stream.is_exhausted()
    }

    /// Requests a jump on the next frame.
    pub fn press_jump(&mut self) {
        self.latch.press();
    }

    /// Advances the game by one frame, consuming any pending jump request.
    pub fn step(&mut self) {
        let jump = self.latch.take();
        self.step_with(jump);
    }

    /// Advances the game by one frame with an explicit decision, as issued by
    /// a controller that decides once per frame.
    pub fn step_with(&mut self, jump: bool) {
        let Ok(()) = self.try_step_by(|_, _| Ok::<_, Infallible>(jump));
    }

    /// Advances the game by one frame, asking `decide` whether to jump once
    /// the obstacles of the new frame are in place.
    ///
    /// `decide` is not called after game over. If it fails, the error is
    /// returned, the agent is left untouched and the frame is not counted.
    pub fn try_step_by<F, E>(&mut self, decide: F) -> Result<(), E>
    where
        F: FnOnce(&Agent, &[Obstacle]) -> Result<bool, E>,
    {
        if self.state.is_game_over() {
            return Ok(());
        }
        self.obstacles = self.stream.advance(self.world.scroll_speed);
        let jump = decide(&self.agent, &self.obstacles)?;
        let liveness = self
            .agent
            .update(jump, &self.obstacles, &self.world, FitnessKind::Survival);
        self.frame += 1;
        if liveness.is_dead() {
            self.state = SessionState::GameOver;
        }
        Ok(())
    }

    /// Restarts the game from the beginning of the stream.
    pub fn restart(&mut self) {
        self.stream.reset();
        self.agent.reset(&self.world);
        self.obstacles.clear();
        self.latch = JumpLatch::default();
        self.state = SessionState::Playing;
        self.frame = 0;
    }

    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            frame: self.frame,
            agents: vec![self.agent.snapshot()],
            obstacles: self.obstacles.clone(),
            passed: self.stream.passed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Level, LevelStream, ObstacleDescriptor};

    fn session_world() -> WorldConfig {
        WorldConfig::default()
    }

    fn single_obstacle_session() -> GameSession<LevelStream> {
        let world = session_world();
        let level = Level::new(vec![ObstacleDescriptor {
            gap_before_next: 0.0,
            width: 20.0,
            height: 18.0,
            ground_offset: 0.0,
        }]);
        GameSession::new(world.clone(), LevelStream::new(world, level))
    }

    #[test]
    fn test_latch_is_consumed_once() {
        let mut latch = JumpLatch::default();
        assert!(!latch.take());
        latch.press();
        latch.press();
        assert!(latch.take());
        assert!(!latch.take());
    }

    #[test]
    fn test_held_key_jumps_once() {
        let mut session = single_obstacle_session();
        session.press_jump();
        session.step();
        assert!(!session.agent().on_ground());
        assert_eq!(session.agent().frames_since_jump(), 0);

        // Pressing again mid-air has no effect on the trajectory.
        session.press_jump();
        session.step();
        assert_eq!(session.agent().frames_since_jump(), 1);
    }

    #[test]
    fn test_idle_player_hits_obstacle() {
        let mut session = single_obstacle_session();
        while session.state().is_playing() {
            session.step();
            assert!(session.frame() < 1000);
        }
        assert!(session.agent().liveness().is_dead());
        assert!(session.score() > 0.0);
    }

    #[test]
    fn test_timed_jump_clears_obstacle() {
        let mut session = single_obstacle_session();
        for _ in 0..2000 {
            if session
                .agent()
                .sensed()
                .is_some_and(|next| next.distance <= 30.0)
            {
                session.press_jump();
            }
            session.step();
        }
        assert!(session.state().is_playing());
        assert_eq!(session.snapshot().passed, 1);
        assert!(session.is_cleared());
    }

    #[test]
    fn test_decision_sees_current_frame_obstacles() {
        let mut session = single_obstacle_session();
        session
            .try_step_by(|agent, obstacles| {
                assert!(agent.sensed().is_none());
                assert_eq!(obstacles.len(), 1);
                Ok::<_, ()>(false)
            })
            .unwrap();
        let first_x = session.obstacles()[0].x;
        session
            .try_step_by(|_, obstacles| {
                assert_eq!(obstacles[0].x, first_x - session_world().scroll_speed);
                Ok::<_, ()>(true)
            })
            .unwrap();
        assert!(!session.agent().on_ground());
        assert_eq!(session.frame(), 2);
    }

    #[test]
    fn test_failed_decision_does_not_play_frame() {
        let mut session = single_obstacle_session();
        assert_eq!(session.try_step_by(|_, _| Err("no decision")), Err("no decision"));
        assert_eq!(session.frame(), 0);
        assert!(session.agent().on_ground());

        while session.state().is_playing() {
            session.step();
        }
        let mut called = false;
        session
            .try_step_by(|_, _| {
                called = true;
                Ok::<_, ()>(true)
            })
            .unwrap();
        assert!(!called);
    }

    #[test]
    fn test_restart_resets_everything() {
        let mut session = single_obstacle_session();
        session.step();
        session.step();
        session.restart();
        assert_eq!(session.frame(), 0);
        assert!(session.obstacles().is_empty());
        assert!(session.state().is_playing());
        assert_eq!(session.score(), 0.0);
        assert!(!session.is_cleared());
    }
}
