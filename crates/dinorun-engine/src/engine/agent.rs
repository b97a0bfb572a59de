use serde::{Deserialize, Serialize};

use crate::core::{NextObstacle, Obstacle, Rect, WorldConfig};

/// Liveness of an [`Agent`]. `Dead` is terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::IsVariant,
)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    Alive,
    Dead,
}

/// How an agent's fitness grows for every frame it survives.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::FromStr,
)]
#[serde(rename_all = "snake_case")]
pub enum FitnessKind {
    /// Horizontal distance traveled, i.e. the scroll speed per frame.
    #[default]
    Distance,
    /// Constant survival bonus per frame.
    Survival,
}

impl FitnessKind {
    /// Fitness gained for one survived frame.
    #[must_use]
    pub fn per_frame(self, world: &WorldConfig) -> f64 {
        match self {
            Self::Distance => world.scroll_speed,
            Self::Survival => world.score_per_frame,
        }
    }
}

/// One simulated player.
///
/// The horizontal position is fixed by the world; the agent only moves
/// vertically. An agent starts standing on the ground, alive, with zero
/// fitness, and is [`reset`](Self::reset) rather than recreated between
/// generations.
///
/// # Example
///
/// ```
/// use dinorun_engine::{Agent, FitnessKind, Obstacle, WorldConfig};
///
/// let world = WorldConfig::default();
/// let mut agent = Agent::new(&world);
///
/// // Jump over an obstacle sitting just in front of the player.
/// let mut obstacle = Obstacle::new(world.player_right() + 5.0, world.ground_y(), 20.0, 18.0);
/// agent.update(true, &[obstacle], &world, FitnessKind::Distance);
/// for _ in 0..20 {
///     obstacle.x -= world.scroll_speed;
///     agent.update(false, &[obstacle], &world, FitnessKind::Distance);
/// }
/// assert!(agent.liveness().is_alive());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    x: f64,
    y: f64,
    size: f64,
    velocity_y: f64,
    on_ground: bool,
    liveness: Liveness,
    fitness: f64,
    frames_since_jump: u32,
    frames_survived: u64,
    sensed: Option<NextObstacle>,
}

impl Agent {
    #[must_use]
    pub fn new(world: &WorldConfig) -> Self {
        Self {
            x: world.player_x,
            y: world.ground_y(),
            size: world.player_size,
            velocity_y: 0.0,
            on_ground: true,
            liveness: Liveness::Alive,
            fitness: 0.0,
            frames_since_jump: 0,
            frames_survived: 0,
            sensed: None,
        }
    }

    /// Puts the agent back into its initial state for a new generation.
    pub fn reset(&mut self, world: &WorldConfig) {
        *self = Self::new(world);
    }

    #[must_use]
    pub fn x(&self) -> f64 {
        self.x
    }

    #[must_use]
    pub fn y(&self) -> f64 {
        self.y
    }

    #[must_use]
    pub fn velocity_y(&self) -> f64 {
        self.velocity_y
    }

    #[must_use]
    pub fn on_ground(&self) -> bool {
        self.on_ground
    }

    #[must_use]
    pub fn liveness(&self) -> Liveness {
        self.liveness
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.liveness.is_alive()
    }

    #[must_use]
    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    #[must_use]
    pub fn frames_since_jump(&self) -> u32 {
        self.frames_since_jump
    }

    #[must_use]
    pub fn frames_survived(&self) -> u64 {
        self.frames_survived
    }

    /// The obstacle ahead as sensed at the end of the previous frame.
    #[must_use]
    pub fn sensed(&self) -> Option<&NextObstacle> {
        self.sensed.as_ref()
    }

    #[must_use]
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.size, self.size)
    }

    /// Advances the agent by one frame against the given obstacle snapshot.
    ///
    /// A jump request only has an effect while the agent stands on the
    /// ground. Dead agents are left untouched. The frame on which the agent
    /// collides does not add fitness.
    ///
    /// Returns the liveness after the update.
    pub fn update(
        &mut self,
        jump: bool,
        obstacles: &[Obstacle],
        world: &WorldConfig,
        fitness: FitnessKind,
    ) -> Liveness {
        if self.liveness.is_dead() {
            return self.liveness;
        }

        if jump && self.on_ground {
            self.velocity_y = world.jump_force;
            self.on_ground = false;
            self.frames_since_jump = 0;
        } else {
            self.frames_since_jump = self.frames_since_jump.saturating_add(1);
        }

        self.velocity_y += world.gravity;
        self.y += self.velocity_y;
        let ground_y = world.ground_y();
        if self.y >= ground_y {
            self.y = ground_y;
            self.velocity_y = 0.0;
            self.on_ground = true;
        }

        self.sensed = NextObstacle::find(obstacles, world);

        let rect = self.rect();
        if obstacles.iter().any(|obs| rect.intersects(&obs.rect())) {
            self.liveness = Liveness::Dead;
            return self.liveness;
        }

        self.fitness += fitness.per_frame(world);
        self.frames_survived += 1;
        self.liveness
    }

    #[must_use]
    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            x: self.x,
            y: self.y,
            size: self.size,
            alive: self.is_alive(),
            fitness: self.fitness,
        }
    }
}

/// Read-only view of an agent for renderers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub alive: bool,
    pub fitness: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Runs `frames` updates against a single ground obstacle that starts at
    /// `player_right + 5` and scrolls left from the second frame onwards.
    ///
    /// Returns the liveness after every frame.
    fn run_single_obstacle(jump_on_first: bool, frames: usize) -> Vec<Liveness> {
        let world = WorldConfig::default();
        let mut agent = Agent::new(&world);
        let mut obstacle = Obstacle::new(world.player_right() + 5.0, world.ground_y(), 20.0, 18.0);
        let mut history = Vec::new();
        for frame in 0..frames {
            if frame > 0 {
                obstacle.x -= world.scroll_speed;
            }
            let jump = jump_on_first && frame == 0;
            history.push(agent.update(jump, &[obstacle], &world, FitnessKind::Distance));
        }
        history
    }

    #[test]
    fn test_new_agent_stands_on_ground() {
        let world = WorldConfig::default();
        let agent = Agent::new(&world);
        assert_eq!(agent.y(), world.ground_y());
        assert!(agent.on_ground());
        assert!(agent.is_alive());
        assert_eq!(agent.fitness(), 0.0);
    }

    #[test]
    fn test_jump_sets_velocity_and_resets_counter() {
        let world = WorldConfig::default();
        let mut agent = Agent::new(&world);
        agent.update(false, &[], &world, FitnessKind::Distance);
        agent.update(false, &[], &world, FitnessKind::Distance);
        assert_eq!(agent.frames_since_jump(), 2);

        agent.update(true, &[], &world, FitnessKind::Distance);
        assert_eq!(agent.frames_since_jump(), 0);
        assert!(!agent.on_ground());
        assert!((agent.velocity_y() - (world.jump_force + world.gravity)).abs() < 1e-12);
        assert!(agent.y() < world.ground_y());
    }

    #[test]
    fn test_jump_ignored_while_airborne() {
        let world = WorldConfig::default();
        let mut agent = Agent::new(&world);
        agent.update(true, &[], &world, FitnessKind::Distance);
        let velocity_before = agent.velocity_y();

        agent.update(true, &[], &world, FitnessKind::Distance);
        assert!((agent.velocity_y() - (velocity_before + world.gravity)).abs() < 1e-12);
        assert_eq!(agent.frames_since_jump(), 1);
    }

    #[test]
    fn test_agent_lands_back_on_ground() {
        let world = WorldConfig::default();
        let mut agent = Agent::new(&world);
        agent.update(true, &[], &world, FitnessKind::Distance);
        for _ in 0..100 {
            agent.update(false, &[], &world, FitnessKind::Distance);
        }
        assert!(agent.on_ground());
        assert_eq!(agent.y(), world.ground_y());
        assert_eq!(agent.velocity_y(), 0.0);
    }

    #[test]
    fn test_single_obstacle_avoidance() {
        let history = run_single_obstacle(true, 30);
        assert!(history.iter().all(|l| l.is_alive()));
    }

    #[test]
    fn test_guaranteed_collision_on_first_overlap() {
        let history = run_single_obstacle(false, 30);
        // Frame 2 only touches edges, frame 3 overlaps.
        assert!(history[0].is_alive());
        assert!(history[1].is_alive());
        assert!(history[2].is_dead());
        assert!(history[3..].iter().all(|l| l.is_dead()));
    }

    #[test]
    fn test_death_frame_adds_no_fitness() {
        let world = WorldConfig::default();
        let mut agent = Agent::new(&world);
        let obstacle = Obstacle::new(world.player_x, world.ground_y(), 20.0, 18.0);
        agent.update(false, &[], &world, FitnessKind::Distance);
        agent.update(false, &[obstacle], &world, FitnessKind::Distance);
        assert!(agent.liveness().is_dead());
        assert_eq!(agent.fitness(), world.scroll_speed);
        assert_eq!(agent.frames_survived(), 1);
    }

    #[test]
    fn test_dead_agent_is_frozen() {
        let world = WorldConfig::default();
        let mut agent = Agent::new(&world);
        let obstacle = Obstacle::new(world.player_x, world.ground_y(), 20.0, 18.0);
        agent.update(false, &[obstacle], &world, FitnessKind::Survival);
        let frozen = agent.clone();
        agent.update(true, &[], &world, FitnessKind::Survival);
        assert_eq!(agent, frozen);
    }

    #[test]
    fn test_fitness_kinds() {
        let world = WorldConfig::default();
        let mut distance = Agent::new(&world);
        let mut survival = Agent::new(&world);
        for _ in 0..10 {
            distance.update(false, &[], &world, FitnessKind::Distance);
            survival.update(false, &[], &world, FitnessKind::Survival);
        }
        assert!((distance.fitness() - 50.0).abs() < 1e-9);
        assert!((survival.fitness() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_sensing_tracks_next_obstacle() {
        let world = WorldConfig::default();
        let mut agent = Agent::new(&world);
        assert!(agent.sensed().is_none());
        let obstacle = Obstacle::new(300.0, world.ground_y() - 24.0, 30.0, 20.0);
        agent.update(false, &[obstacle], &world, FitnessKind::Distance);
        let sensed = agent.sensed().unwrap();
        assert_eq!(sensed.distance, 300.0 - world.player_right());
        assert_eq!(sensed.ground_offset, 24.0);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let world = WorldConfig::default();
        let mut agent = Agent::new(&world);
        agent.update(true, &[], &world, FitnessKind::Distance);
        agent.reset(&world);
        assert_eq!(agent, Agent::new(&world));
    }
}
