use serde::{Deserialize, Serialize};

use super::world::WorldConfig;

/// Axis-aligned rectangle described by its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Returns `true` if the two rectangles overlap with positive area.
    ///
    /// All four comparisons are strict, so rectangles that merely share an
    /// edge do not intersect.
    ///
    /// ```
    /// use dinorun_engine::Rect;
    ///
    /// let player = Rect::new(60.0, 136.0, 24.0, 24.0);
    /// let touching = Rect::new(84.0, 136.0, 20.0, 18.0);
    /// let overlapping = Rect::new(83.0, 136.0, 20.0, 18.0);
    /// assert!(!player.intersects(&touching));
    /// assert!(player.intersects(&overlapping));
    /// ```
    #[must_use]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.right() > other.x
            && self.x < other.right()
            && self.bottom() > other.y
            && self.y < other.bottom()
    }
}

/// A single obstacle scrolling through the world.
///
/// Obstacles are owned by an [`ObstacleStream`](crate::ObstacleStream).
/// Agents only ever see copies of them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Set by the stream once the obstacle has scrolled past the player.
    #[serde(default)]
    pub scored: bool,
}

impl Obstacle {
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            scored: false,
        }
    }

    #[must_use]
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }
}

/// One entry of a level definition.
///
/// This is the only thing the simulation needs to know about how a level was
/// produced: the horizontal gap separating the obstacle from the previous
/// one, its size, and how far above the ground line it floats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObstacleDescriptor {
    /// Gap between the previous obstacle's right edge and this obstacle's
    /// left edge. Ignored for the first obstacle of a level.
    pub gap_before_next: f64,
    pub width: f64,
    pub height: f64,
    pub ground_offset: f64,
}

impl ObstacleDescriptor {
    /// Places the descriptor at horizontal position `x`.
    #[must_use]
    pub fn place(&self, x: f64, world: &WorldConfig) -> Obstacle {
        Obstacle::new(
            x,
            (world.ground_y() - self.ground_offset).round(),
            self.width,
            self.height,
        )
    }
}

/// What an agent senses about the closest obstacle in front of it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NextObstacle {
    /// Distance from the player's right edge to the obstacle's left edge.
    pub distance: f64,
    pub width: f64,
    pub height: f64,
    /// Distance between the ground line and the obstacle's top edge.
    pub ground_offset: f64,
}

impl NextObstacle {
    /// Finds the nearest obstacle whose left edge is at or beyond the
    /// player's right edge.
    ///
    /// Returns `None` when nothing is ahead of the player.
    #[must_use]
    pub fn find(obstacles: &[Obstacle], world: &WorldConfig) -> Option<Self> {
        let player_right = world.player_right();
        obstacles
            .iter()
            .filter(|obs| obs.x >= player_right)
            .min_by(|a, b| a.x.total_cmp(&b.x))
            .map(|obs| Self {
                distance: obs.x - player_right,
                width: obs.width,
                height: obs.height,
                ground_offset: world.ground_y() - obs.y,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_contact_is_not_collision() {
        let player = Rect::new(60.0, 136.0, 24.0, 24.0);
        // right edge == left edge
        assert!(!player.intersects(&Rect::new(84.0, 136.0, 20.0, 18.0)));
        // left edge == right edge
        assert!(!player.intersects(&Rect::new(40.0, 136.0, 20.0, 18.0)));
        // bottom edge == top edge
        assert!(!player.intersects(&Rect::new(60.0, 160.0, 20.0, 18.0)));
        // top edge == bottom edge
        assert!(!player.intersects(&Rect::new(60.0, 100.0, 20.0, 36.0)));
    }

    #[test]
    fn test_one_unit_overlap_is_collision() {
        let player = Rect::new(60.0, 136.0, 24.0, 24.0);
        assert!(player.intersects(&Rect::new(83.0, 159.0, 20.0, 18.0)));
        assert!(player.intersects(&Rect::new(41.0, 117.0, 20.0, 20.0)));
    }

    #[test]
    fn test_next_obstacle_skips_obstacles_behind_player() {
        let world = WorldConfig::default();
        let obstacles = [
            Obstacle::new(70.0, 136.0, 20.0, 18.0),
            Obstacle::new(300.0, 112.0, 30.0, 20.0),
            Obstacle::new(200.0, 136.0, 40.0, 45.0),
        ];
        let next = NextObstacle::find(&obstacles, &world).unwrap();
        assert_eq!(next.distance, 200.0 - 84.0);
        assert_eq!(next.width, 40.0);
        assert_eq!(next.height, 45.0);
        assert_eq!(next.ground_offset, 0.0);
    }

    #[test]
    fn test_next_obstacle_none_when_clear() {
        let world = WorldConfig::default();
        assert_eq!(NextObstacle::find(&[], &world), None);
        let behind = [Obstacle::new(10.0, 136.0, 20.0, 18.0)];
        assert_eq!(NextObstacle::find(&behind, &world), None);
    }

    #[test]
    fn test_descriptor_placement_rounds_y() {
        let world = WorldConfig::default();
        let desc = ObstacleDescriptor {
            gap_before_next: 200.0,
            width: 30.0,
            height: 20.0,
            ground_offset: 10.4,
        };
        let obs = desc.place(800.0, &world);
        assert_eq!(obs.x, 800.0);
        assert_eq!(obs.y, 126.0);
        assert!(!obs.scored);
    }
}
