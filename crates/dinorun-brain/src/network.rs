//! Fixed-topology feed-forward network.
//!
//! A [`Network`] maps a normalized feature vector to a jump probability
//! through one hidden layer:
//!
//! ```text
//! hidden[i] = activation(b1[i] + Σ_j W1[i][j] * inputs[j])
//! output    = sigmoid(b2[0] + Σ_i W2[0][i] * hidden[i])
//! ```
//!
//! Networks are immutable values. [`Network::mutate`] and
//! [`Network::crossover`] return new networks and never touch their receiver,
//! so a network can be shared between population members without aliasing
//! surprises.

use rand::{Rng, distr::Distribution as _};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::{InputLengthError, ShapeError};

/// Slope of [`Activation::LeakyRelu`] for negative inputs.
pub const LEAKY_RELU_SLOPE: f64 = 0.01;

/// Output above which the network requests a jump.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Hidden-layer activation function.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::FromStr,
)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    /// ReLU with a small slope for negative inputs, which keeps hidden units
    /// from dying permanently.
    #[default]
    LeakyRelu,
}

impl Activation {
    #[must_use]
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Self::Relu => x.max(0.0),
            Self::LeakyRelu => {
                if x > 0.0 {
                    x
                } else {
                    LEAKY_RELU_SLOPE * x
                }
            }
        }
    }
}

/// Distribution of the perturbation added by [`Network::mutate`].
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::FromStr,
)]
#[serde(rename_all = "snake_case")]
pub enum Noise {
    /// Uniform on `[-1, 1]`.
    Uniform,
    /// Standard normal.
    #[default]
    Gaussian,
}

impl Noise {
    pub fn sample<R>(self, rng: &mut R) -> f64
    where
        R: Rng + ?Sized,
    {
        match self {
            Self::Uniform => rng.random_range(-1.0..=1.0),
            Self::Gaussian => StandardNormal.sample(rng),
        }
    }
}

#[must_use]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Layer sizes of a [`Network`]. The output layer always has one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topology {
    input_size: usize,
    hidden_size: usize,
}

impl Topology {
    pub const OUTPUT_SIZE: usize = 1;

    /// Creates a topology. Both sizes must be at least one.
    pub fn new(input_size: usize, hidden_size: usize) -> Result<Self, ShapeError> {
        if input_size == 0 {
            return Err(ShapeError::Empty { what: "input layer" });
        }
        if hidden_size == 0 {
            return Err(ShapeError::Empty {
                what: "hidden layer",
            });
        }
        Ok(Self {
            input_size,
            hidden_size,
        })
    }

    #[must_use]
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    #[must_use]
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    #[must_use]
    pub fn output_size(&self) -> usize {
        Self::OUTPUT_SIZE
    }

    /// Total number of weights and biases.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.hidden_size * (self.input_size + 1) + Self::OUTPUT_SIZE * (self.hidden_size + 1)
    }
}

/// Per-unit values recorded by [`Network::forward_with_trace`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTrace {
    pub pre_activation: f64,
    pub post_activation: f64,
    pub bias: f64,
    pub weights: Vec<f64>,
}

/// Everything a visualizer needs to draw one decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugTrace {
    pub inputs: Vec<f64>,
    pub hidden: Vec<UnitTrace>,
    pub output: UnitTrace,
    /// `true` if the output exceeds [`DECISION_THRESHOLD`].
    pub decision: bool,
}

/// Feed-forward network with one hidden layer and a single sigmoid output.
///
/// # Invariants
///
/// - `w1` has `hidden_size` rows of `input_size` columns
/// - `b1` has `hidden_size` entries
/// - `w2` has one row of `hidden_size` columns
/// - `b2` has one entry
///
/// # Example
///
/// ```
/// use dinorun_brain::{Activation, Network, Topology};
/// use rand::SeedableRng as _;
/// use rand_pcg::Pcg32;
///
/// let mut rng = Pcg32::seed_from_u64(0);
/// let topology = Topology::new(4, 4).unwrap();
/// let network = Network::random(topology, &mut rng);
///
/// let output = network.forward(&[0.5, 0.0, 1.0, 0.03], Activation::LeakyRelu).unwrap();
/// assert!((0.0..=1.0).contains(&output));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    topology: Topology,
    w1: Vec<Vec<f64>>,
    b1: Vec<f64>,
    w2: Vec<Vec<f64>>,
    b2: Vec<f64>,
}

impl Network {
    /// Creates a network whose parameters are drawn independently and
    /// uniformly from `[-1, 1]`.
    pub fn random<R>(topology: Topology, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        let mut uniform = || rng.random_range(-1.0..=1.0);
        let Topology {
            input_size,
            hidden_size,
        } = topology;
        let w1 = (0..hidden_size)
            .map(|_| (0..input_size).map(|_| uniform()).collect())
            .collect();
        let b1 = (0..hidden_size).map(|_| uniform()).collect();
        let w2 = (0..Topology::OUTPUT_SIZE)
            .map(|_| (0..hidden_size).map(|_| uniform()).collect())
            .collect();
        let b2 = (0..Topology::OUTPUT_SIZE).map(|_| uniform()).collect();
        Self {
            topology,
            w1,
            b1,
            w2,
            b2,
        }
    }

    /// Builds a network from explicit parameter arrays, validating every
    /// shape invariant.
    pub fn from_parts(
        w1: Vec<Vec<f64>>,
        b1: Vec<f64>,
        w2: Vec<Vec<f64>>,
        b2: Vec<f64>,
    ) -> Result<Self, ShapeError> {
        let hidden_size = w1.len();
        let input_size = w1.first().map_or(0, Vec::len);
        let topology = Topology::new(input_size, hidden_size)?;

        check_matrix("W1", &w1, hidden_size, input_size)?;
        check_len("b1", &b1, hidden_size)?;
        check_matrix("W2", &w2, Topology::OUTPUT_SIZE, hidden_size)?;
        check_len("b2", &b2, Topology::OUTPUT_SIZE)?;
        if let Some(value) = [&w1, &w2]
            .into_iter()
            .flatten()
            .flatten()
            .chain(b1.iter().chain(&b2))
            .find(|value| !value.is_finite())
        {
            return Err(ShapeError::NonFinite { value: *value });
        }

        Ok(Self {
            topology,
            w1,
            b1,
            w2,
            b2,
        })
    }

    /// Consumes the network and returns `(W1, b1, W2, b2)`.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Vec<f64>>, Vec<f64>, Vec<Vec<f64>>, Vec<f64>) {
        (self.w1, self.b1, self.w2, self.b2)
    }

    #[must_use]
    pub fn topology(&self) -> Topology {
        self.topology
    }

    #[must_use]
    pub fn w1(&self) -> &[Vec<f64>] {
        &self.w1
    }

    #[must_use]
    pub fn b1(&self) -> &[f64] {
        &self.b1
    }

    #[must_use]
    pub fn w2(&self) -> &[Vec<f64>] {
        &self.w2
    }

    #[must_use]
    pub fn b2(&self) -> &[f64] {
        &self.b2
    }

    fn check_inputs(&self, inputs: &[f64]) -> Result<(), InputLengthError> {
        if inputs.len() == self.topology.input_size {
            Ok(())
        } else {
            Err(InputLengthError {
                expected: self.topology.input_size,
                actual: inputs.len(),
            })
        }
    }

    fn hidden_pre_activation<'a>(
        &'a self,
        inputs: &'a [f64],
    ) -> impl Iterator<Item = f64> + 'a {
        self.w1
            .iter()
            .zip(&self.b1)
            .map(move |(row, bias)| bias + dot(row, inputs))
    }

    /// Computes the jump probability for `inputs`.
    pub fn forward(&self, inputs: &[f64], activation: Activation) -> Result<f64, InputLengthError> {
        self.check_inputs(inputs)?;
        let hidden: Vec<f64> = self
            .hidden_pre_activation(inputs)
            .map(|x| activation.apply(x))
            .collect();
        Ok(sigmoid(self.b2[0] + dot(&self.w2[0], &hidden)))
    }

    /// Like [`Self::forward`], thresholded at [`DECISION_THRESHOLD`].
    pub fn decide(&self, inputs: &[f64], activation: Activation) -> Result<bool, InputLengthError> {
        Ok(self.forward(inputs, activation)? > DECISION_THRESHOLD)
    }

    /// Same computation as [`Self::forward`], recording every unit.
    pub fn forward_with_trace(
        &self,
        inputs: &[f64],
        activation: Activation,
    ) -> Result<DebugTrace, InputLengthError> {
        self.check_inputs(inputs)?;
        let hidden: Vec<UnitTrace> = self
            .hidden_pre_activation(inputs)
            .zip(self.w1.iter().zip(&self.b1))
            .map(|(pre, (weights, bias))| UnitTrace {
                pre_activation: pre,
                post_activation: activation.apply(pre),
                bias: *bias,
                weights: weights.clone(),
            })
            .collect();
        let post: Vec<f64> = hidden.iter().map(|unit| unit.post_activation).collect();
        let pre = self.b2[0] + dot(&self.w2[0], &post);
        let output = UnitTrace {
            pre_activation: pre,
            post_activation: sigmoid(pre),
            bias: self.b2[0],
            weights: self.w2[0].clone(),
        };
        Ok(DebugTrace {
            inputs: inputs.to_vec(),
            hidden,
            decision: output.post_activation > DECISION_THRESHOLD,
            output,
        })
    }

    /// Returns a copy where every parameter is, with probability `rate`,
    /// replaced by `w + amount * noise`.
    #[must_use]
    pub fn mutate<R>(&self, rate: f64, amount: f64, noise: Noise, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        let rate = rate.clamp(0.0, 1.0);
        let mut child = self.clone();
        for w in child.params_mut() {
            if rng.random_bool(rate) {
                *w += amount * noise.sample(rng);
            }
        }
        child
    }

    /// Uniform crossover: every parameter is taken from either parent with
    /// equal probability.
    pub fn crossover<R>(&self, other: &Self, rng: &mut R) -> Result<Self, ShapeError>
    where
        R: Rng + ?Sized,
    {
        if self.topology != other.topology {
            return Err(ShapeError::TopologyMismatch {
                left: self.topology,
                right: other.topology,
            });
        }
        let mut child = self.clone();
        for (w, theirs) in child.params_mut().zip(other.params()) {
            if rng.random_bool(0.5) {
                *w = *theirs;
            }
        }
        Ok(child)
    }

    /// Returns a copy with `input_size` input columns.
    ///
    /// Extra columns are dropped from the right; missing columns are appended
    /// with fresh uniform weights from `[-1, 1]`.
    #[must_use]
    pub fn with_input_size<R>(&self, input_size: usize, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        let input_size = input_size.max(1);
        let mut resized = self.clone();
        for row in &mut resized.w1 {
            row.truncate(input_size);
            while row.len() < input_size {
                row.push(rng.random_range(-1.0..=1.0));
            }
        }
        resized.topology.input_size = input_size;
        resized
    }

    fn params(&self) -> impl Iterator<Item = &f64> {
        self.w1
            .iter()
            .flatten()
            .chain(&self.b1)
            .chain(self.w2.iter().flatten())
            .chain(&self.b2)
    }

    fn params_mut(&mut self) -> impl Iterator<Item = &mut f64> {
        self.w1
            .iter_mut()
            .flatten()
            .chain(&mut self.b1)
            .chain(self.w2.iter_mut().flatten())
            .chain(&mut self.b2)
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn check_len(name: &'static str, values: &[f64], expected: usize) -> Result<(), ShapeError> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(ShapeError::Length {
            name,
            expected,
            actual: values.len(),
        })
    }
}

fn check_matrix(
    name: &'static str,
    rows: &[Vec<f64>],
    expected_rows: usize,
    expected_cols: usize,
) -> Result<(), ShapeError> {
    if rows.len() != expected_rows {
        return Err(ShapeError::Length {
            name,
            expected: expected_rows,
            actual: rows.len(),
        });
    }
    if let Some((row, values)) = rows
        .iter()
        .enumerate()
        .find(|(_, values)| values.len() != expected_cols)
    {
        return Err(ShapeError::RaggedRow {
            name,
            row,
            expected: expected_cols,
            actual: values.len(),
        });
    }
    Ok(())
}
