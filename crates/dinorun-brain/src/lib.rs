//! Policy networks for the runner.
//!
//! - [`network`] - Fixed-topology feed-forward [`Network`] with mutation and crossover
//! - [`inputs`] - Versioned encoding of sensed state into network inputs
//! - [`model`] - Persisted model file with a declared migration table
//!
//! Networks never see raw game state. Every feature goes through an
//! [`InputSchema`] that clamps it into a bounded range, and the schema version
//! travels with every persisted model so that weights are only ever applied to
//! inputs of the scale they were trained on.

pub use self::{inputs::*, model::*, network::*};

pub mod inputs;
pub mod model;
pub mod network;

/// A network's parameter arrays do not have the shapes of a valid topology.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ShapeError {
    #[display("{what} must have at least one unit")]
    Empty { what: &'static str },
    #[display("{name} has {actual} entries, expected {expected}")]
    Length {
        name: &'static str,
        expected: usize,
        actual: usize,
    },
    #[display("{name} row {row} has {actual} columns, expected {expected}")]
    RaggedRow {
        name: &'static str,
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[display("parameter {value} is not finite")]
    NonFinite { value: f64 },
    #[display("topologies differ: {left:?} vs {right:?}")]
    TopologyMismatch { left: Topology, right: Topology },
}

/// Input vector length does not match the network's input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("expected {expected} inputs, got {actual}")]
pub struct InputLengthError {
    pub expected: usize,
    pub actual: usize,
}
