use rand::{Rng, SeedableRng as _};
use rand_pcg::Pcg32;

use crate::core::{Obstacle, WorldConfig};

/// A source of obstacles, advanced once per frame.
///
/// Implementations own their obstacles. [`advance`](Self::advance) hands out
/// copies so that readers can never alias the stream's internal state.
pub trait ObstacleStream: Send {
    /// Scrolls every obstacle left by `scroll_speed`, drops obstacles that
    /// left the screen, spawns new ones and returns the resulting layout.
    fn advance(&mut self, scroll_speed: f64) -> Vec<Obstacle>;

    /// Clears all obstacles and rewinds the stream to its initial state.
    fn reset(&mut self);

    /// Number of obstacles that have scrolled past the player so far.
    fn passed(&self) -> u64;

    /// Returns `true` once the stream will never produce another obstacle.
    fn is_exhausted(&self) -> bool {
        false
    }
}

impl<S> ObstacleStream for Box<S>
where
    S: ObstacleStream + ?Sized,
{
    fn advance(&mut self, scroll_speed: f64) -> Vec<Obstacle> {
        (**self).advance(scroll_speed)
    }

    fn reset(&mut self) {
        (**self).reset();
    }

    fn passed(&self) -> u64 {
        (**self).passed()
    }

    fn is_exhausted(&self) -> bool {
        (**self).is_exhausted()
    }
}

/// Scrolls obstacles, drops those fully off-screen and tags the ones that
/// cleared the player.
///
/// Returns the number of obstacles newly tagged as scored.
pub(crate) fn scroll_obstacles(
    obstacles: &mut Vec<Obstacle>,
    scroll_speed: f64,
    world: &WorldConfig,
) -> u64 {
    for obs in obstacles.iter_mut() {
        obs.x -= scroll_speed;
    }
    obstacles.retain(|obs| obs.right() > 0.0);

    let mut newly_scored = 0;
    for obs in obstacles.iter_mut().filter(|obs| !obs.scored) {
        if obs.right() < world.player_x {
            obs.scored = true;
            newly_scored += 1;
        }
    }
    newly_scored
}

pub(crate) fn rightmost_edge(obstacles: &[Obstacle]) -> f64 {
    obstacles.iter().map(Obstacle::right).fold(0.0, f64::max)
}

/// Endless stream with randomized gaps and sizes.
///
/// A new obstacle appears as soon as the rightmost one has moved
/// `spawn_gap_min` away from the right border of the world. Widths and heights
/// are picked from the two extremes of their ranges, and obstacles float
/// 0, 1 or 2 player sizes above the ground.
#[derive(Debug, Clone)]
pub struct ProceduralStream<R = Pcg32> {
    world: WorldConfig,
    rng: R,
    obstacles: Vec<Obstacle>,
    passed: u64,
}

impl ProceduralStream<Pcg32> {
    /// Creates a procedural stream whose layout is fully determined by `seed`.
    #[must_use]
    pub fn with_seed(world: WorldConfig, seed: u64) -> Self {
        Self::new(world, Pcg32::seed_from_u64(seed))
    }
}

impl<R> ProceduralStream<R>
where
    R: Rng,
{
    #[must_use]
    pub fn new(world: WorldConfig, rng: R) -> Self {
        Self {
            world,
            rng,
            obstacles: Vec::new(),
            passed: 0,
        }
    }

    fn pick_extreme(&mut self, min: f64, max: f64) -> f64 {
        if self.rng.random_bool(0.5) { min } else { max }
    }

    fn spawn(&mut self) {
        let world = &self.world;
        let rightmost = rightmost_edge(&self.obstacles);
        let gap_min = world.spawn_gap_min;
        let gap_max = world.spawn_gap_max.max(gap_min);
        let should_spawn =
            self.obstacles.is_empty() || rightmost < world.world_width - gap_min;
        if !should_spawn {
            return;
        }

        let x = if self.obstacles.is_empty() {
            world.world_width
        } else {
            rightmost + self.rng.random_range(gap_min..=gap_max)
        };
        let (min_w, max_w) = (world.obstacle_min_width, world.obstacle_max_width);
        let (min_h, max_h) = (world.obstacle_min_height, world.obstacle_max_height);
        let player_size = world.player_size;
        let ground_y = world.ground_y();

        let width = self.pick_extreme(min_w, max_w);
        let height = self.pick_extreme(min_h, max_h);
        let level = f64::from(self.rng.random_range(0..3_u8));
        let y = (ground_y - level * player_size).round();
        self.obstacles.push(Obstacle::new(x, y, width, height));
    }
}

impl<R> ObstacleStream for ProceduralStream<R>
where
    R: Rng + Send,
{
    fn advance(&mut self, scroll_speed: f64) -> Vec<Obstacle> {
        self.passed += scroll_obstacles(&mut self.obstacles, scroll_speed, &self.world);
        self.spawn();
        self.obstacles.clone()
    }

    fn reset(&mut self) {
        self.obstacles.clear();
        self.passed = 0;
    }

    fn passed(&self) -> u64 {
        self.passed
    }
}
