use serde::{Deserialize, Serialize};

/// Physical constants of the runner world.
///
/// Coordinates follow screen conventions: `x` grows to the right, `y` grows
/// downwards, and every rectangle is described by its top-left corner. The
/// player stands on the ground when its top edge is at [`Self::ground_y`].
///
/// All fields are plain data so that a training run can be reproduced from a
/// JSON configuration file. The defaults describe the reference game.
///
/// # Example
///
/// ```
/// use dinorun_engine::WorldConfig;
///
/// let world = WorldConfig::default();
/// assert_eq!(world.ground_y(), 136.0);
/// assert!(world.jump_force < 0.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Visible width of the world; new obstacles enter at this x.
    pub world_width: f64,
    /// Height of the world; the ground line is at the bottom.
    pub world_height: f64,
    /// Side length of the (square) player.
    pub player_size: f64,
    /// Fixed horizontal position of the player's left edge.
    pub player_x: f64,
    /// Downward acceleration applied every frame.
    pub gravity: f64,
    /// Vertical velocity set by a jump (negative = upwards).
    pub jump_force: f64,
    /// Distance obstacles scroll to the left every frame.
    pub scroll_speed: f64,
    pub obstacle_min_width: f64,
    pub obstacle_max_width: f64,
    pub obstacle_min_height: f64,
    pub obstacle_max_height: f64,
    /// Largest distance an obstacle may float above the ground line.
    pub obstacle_max_ground_offset: f64,
    pub spawn_gap_min: f64,
    pub spawn_gap_max: f64,
    /// Survival bonus added per frame in isolated-world play.
    pub score_per_frame: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            world_width: 800.0,
            world_height: 160.0,
            player_size: 24.0,
            player_x: 60.0,
            gravity: 0.6,
            jump_force: -12.0,
            scroll_speed: 5.0,
            obstacle_min_width: 20.0,
            obstacle_max_width: 40.0,
            obstacle_min_height: 18.0,
            obstacle_max_height: 45.0,
            obstacle_max_ground_offset: 80.0,
            spawn_gap_min: 180.0,
            spawn_gap_max: 280.0,
            score_per_frame: 0.1,
        }
    }
}

impl WorldConfig {
    /// The `y` of the player's top edge while standing on the ground.
    #[must_use]
    pub fn ground_y(&self) -> f64 {
        self.world_height - self.player_size
    }

    /// The `x` of the player's right edge.
    #[must_use]
    pub fn player_right(&self) -> f64 {
        self.player_x + self.player_size
    }
}
