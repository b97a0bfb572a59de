//! Simulation of runners scrolling through obstacles.
//!
//! - [`Agent`] - One player: vertical physics, liveness and fitness
//! - [`ObstacleStream`] - Source of obstacles, advanced once per frame
//! - [`ProceduralStream`] - Endless stream with randomized gaps
//! - [`Level`] / [`LevelStream`] - Seeded, replayable obstacle sequences
//! - [`GameSession`] - Single-player game with an edge-triggered jump latch
//! - [`WorldSnapshot`] - Read-only projection of a frame for renderers
//!
//! # Frame Order
//!
//! Every frame first advances the obstacle stream, then updates each agent
//! against the resulting snapshot:
//!
//! 1. Apply a pending jump if the agent stands on the ground
//! 2. Apply gravity and integrate the vertical position
//! 3. Snap to the ground line
//! 4. Sense the next obstacle ahead
//! 5. Test collisions; any overlap kills the agent
//! 6. Accumulate fitness for the survived frame

pub use self::{agent::*, level::*, session::*, snapshot::*, stream::*};

mod agent;
mod level;
mod session;
mod snapshot;
mod stream;
