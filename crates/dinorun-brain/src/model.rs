//! Persisted model files.
//!
//! A model file is a JSON document:
//!
//! ```json
//! {
//!   "version": 3,
//!   "sensing": "shared",
//!   "generation": 42,
//!   "bestScore": 1234.5,
//!   "brain": { "W1": [[...]], "b1": [...], "W2": [[...]], "b2": [...] },
//!   "trainedAt": "2026-01-01T00:00:00Z"
//! }
//! ```
//!
//! `version` is the [`InputSchema`] version the weights were trained against
//! and `sensing` the [`Sensing`] convention their inputs were read with. Both
//! are optional: files written before versioning only carry `generation`,
//! `bestScore` and `brain`. Such files get the schema matching the width of
//! `W1`, and shared sensing.
//!
//! Loading validates the version and every array shape, then migrates the
//! weights to the schema the caller runs with. An unknown version is an error.
//! A `W1` whose width disagrees with the declared version is resized to it
//! with a warning. Migrations are declared in a table of adjacent `(from, to)`
//! steps; a load that needs a step missing from the table fails instead of
//! guessing.
//!
//! Padding columns introduced by resizing or migration come from a fixed-seed
//! generator, so loading the same file twice yields identical weights.

use chrono::{DateTime, Utc};
use rand::SeedableRng as _;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::{InputSchema, Network, Sensing, ShapeError, UnknownSchemaError};

/// Seed of the generator used for padding columns during migration.
const MIGRATION_SEED: u64 = 0x6d2b_79f5;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ModelError {
    #[display("malformed model JSON: {_0}")]
    Parse(serde_json::Error),
    #[display("invalid model file: {_0}")]
    UnknownVersion(UnknownSchemaError),
    #[display("invalid model file: {_0}")]
    Shape(ShapeError),
    #[display("no migration from input schema v{} to v{}", from.version(), to.version())]
    NoMigration { from: InputSchema, to: InputSchema },
}

/// The four parameter arrays of a network, as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrainWeights {
    #[serde(rename = "W1")]
    pub w1: Vec<Vec<f64>>,
    pub b1: Vec<f64>,
    #[serde(rename = "W2")]
    pub w2: Vec<Vec<f64>>,
    pub b2: Vec<f64>,
}

impl From<Network> for BrainWeights {
    fn from(network: Network) -> Self {
        let (w1, b1, w2, b2) = network.into_parts();
        Self { w1, b1, w2, b2 }
    }
}

impl TryFrom<BrainWeights> for Network {
    type Error = ShapeError;

    fn try_from(weights: BrainWeights) -> Result<Self, Self::Error> {
        Network::from_parts(weights.w1, weights.b1, weights.w2, weights.b2)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelFile {
    /// Input schema version, `0` when the file does not declare one.
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub sensing: Sensing,
    pub generation: u64,
    pub best_score: f64,
    pub brain: BrainWeights,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<DateTime<Utc>>,
}

/// A network loaded from a model file together with its metadata.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub network: Network,
    pub schema: InputSchema,
    pub sensing: Sensing,
    pub generation: u64,
    pub best_score: f64,
    /// Schema the file was stored with, if it differed from [`Self::schema`].
    pub migrated_from: Option<InputSchema>,
}

type Transform = fn(&Network, &mut Pcg32) -> Network;

struct Migration {
    from: InputSchema,
    to: InputSchema,
    transform: Transform,
}

fn resize(network: &Network, schema: InputSchema, rng: &mut Pcg32) -> Network {
    network.with_input_size(schema.input_size(), rng)
}

/// Declared migrations between adjacent schema versions.
///
/// Upgrades append freshly randomized columns for the new features; downgrades
/// drop the trailing columns.
static MIGRATIONS: [Migration; 4] = [
    Migration {
        from: InputSchema::V1,
        to: InputSchema::V2,
        transform: |n, rng| resize(n, InputSchema::V2, rng),
    },
    Migration {
        from: InputSchema::V2,
        to: InputSchema::V3,
        transform: |n, rng| resize(n, InputSchema::V3, rng),
    },
    Migration {
        from: InputSchema::V3,
        to: InputSchema::V2,
        transform: |n, rng| resize(n, InputSchema::V2, rng),
    },
    Migration {
        from: InputSchema::V2,
        to: InputSchema::V1,
        transform: |n, rng| resize(n, InputSchema::V1, rng),
    },
];

/// Chains adjacent migrations from `from` towards `to`.
fn migration_path(
    from: InputSchema,
    to: InputSchema,
) -> Result<Vec<&'static Migration>, ModelError> {
    let mut path = Vec::new();
    let mut current = from;
    while current != to {
        let direction = to.cmp(&current);
        let step = MIGRATIONS
            .iter()
            .find(|m| m.from == current && m.to.cmp(&current) == direction)
            .ok_or(ModelError::NoMigration { from, to })?;
        path.push(step);
        current = step.to;
    }
    Ok(path)
}

/// Migrates `network` from schema `from` to schema `to`.
pub fn migrate_network(
    network: &Network,
    from: InputSchema,
    to: InputSchema,
) -> Result<Network, ModelError> {
    let mut rng = Pcg32::seed_from_u64(MIGRATION_SEED);
    let mut migrated = network.clone();
    for step in migration_path(from, to)? {
        tracing::debug!(
            from = step.from.version(),
            to = step.to.version(),
            "migrating model weights"
        );
        migrated = (step.transform)(&migrated, &mut rng);
    }
    Ok(migrated)
}

impl ModelFile {
    /// Creates a model file for `network`, trained against `schema`.
    ///
    /// A non-finite `best_score` is stored as `0`.
    #[must_use]
    pub fn new(network: &Network, schema: InputSchema, generation: u64, best_score: f64) -> Self {
        Self {
            version: schema.version(),
            sensing: Sensing::default(),
            generation,
            best_score: if best_score.is_finite() {
                best_score
            } else {
                0.0
            },
            brain: network.clone().into(),
            trained_at: None,
        }
    }

    #[must_use]
    pub fn with_sensing(mut self, sensing: Sensing) -> Self {
        self.sensing = sensing;
        self
    }

    #[must_use]
    pub fn with_trained_at(mut self, trained_at: DateTime<Utc>) -> Self {
        self.trained_at = Some(trained_at);
        self
    }

    /// Parses a model file without validating it.
    pub fn from_json(text: &str) -> Result<Self, ModelError> {
        serde_json::from_str(text).map_err(ModelError::Parse)
    }

    pub fn to_json(&self) -> Result<String, ModelError> {
        serde_json::to_string_pretty(self).map_err(ModelError::Parse)
    }

    /// Schema the stored weights belong to.
    ///
    /// This is the declared version if there is one. Otherwise it is the schema
    /// whose input size equals the width of `W1`, falling back to the default
    /// schema for widths no schema has.
    pub fn schema(&self) -> Result<InputSchema, ModelError> {
        if self.version != 0 {
            return InputSchema::try_from(self.version).map_err(ModelError::UnknownVersion);
        }
        let width = self.brain.w1.first().map_or(0, Vec::len);
        Ok(InputSchema::from_input_size(width).unwrap_or_default())
    }

    /// Validates the file and returns its network with the input width of
    /// [`Self::schema`].
    ///
    /// Weights of another width are trimmed or padded to fit.
    pub fn network(&self) -> Result<Network, ModelError> {
        let schema = self.schema()?;
        let network = Network::try_from(self.brain.clone()).map_err(ModelError::Shape)?;
        let actual = network.topology().input_size();
        if actual == schema.input_size() {
            return Ok(network);
        }
        tracing::warn!(
            version = schema.version(),
            expected = schema.input_size(),
            actual,
            "model weights do not match their input schema, resizing"
        );
        let mut rng = Pcg32::seed_from_u64(MIGRATION_SEED);
        Ok(network.with_input_size(schema.input_size(), &mut rng))
    }

    /// Validates the file and returns its network migrated to `target`.
    pub fn load(&self, target: InputSchema) -> Result<LoadedModel, ModelError> {
        let stored = self.schema()?;
        let network = migrate_network(&self.network()?, stored, target)?;
        if stored != target {
            tracing::info!(
                from = stored.version(),
                to = target.version(),
                "migrated model to current input schema"
            );
        }
        Ok(LoadedModel {
            network,
            schema: target,
            sensing: self.sensing,
            generation: self.generation,
            best_score: self.best_score,
            migrated_from: (stored != target).then_some(stored),
        })
    }

    /// Rewrites the file for schema `target`, keeping its metadata.
    pub fn migrate(&self, target: InputSchema) -> Result<Self, ModelError> {
        let loaded = self.load(target)?;
        Ok(Self {
            version: target.version(),
            sensing: self.sensing,
            generation: self.generation,
            best_score: self.best_score,
            brain: loaded.network.into(),
            trained_at: self.trained_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{Activation, Topology};

    use super::*;

    fn network(schema: InputSchema) -> Network {
        let mut rng = Pcg32::seed_from_u64(99);
        Network::random(Topology::new(schema.input_size(), 5).unwrap(), &mut rng)
    }

    #[test]
    fn test_round_trip_preserves_forward_output() {
        let network = network(InputSchema::V3);
        let model = ModelFile::new(&network, InputSchema::V3, 12, 345.6);
        let json = model.to_json().unwrap();
        let loaded = ModelFile::from_json(&json)
            .unwrap()
            .load(InputSchema::V3)
            .unwrap();

        let inputs = [0.3, -0.2, 1.0, 0.04, 0.1, 0.2, 0.5];
        let before = network.forward(&inputs, Activation::LeakyRelu).unwrap();
        let after = loaded.network.forward(&inputs, Activation::LeakyRelu).unwrap();
        assert_eq!(before.to_bits(), after.to_bits());
        assert_eq!(loaded.network, network);
        assert_eq!(loaded.generation, 12);
        assert_eq!(loaded.best_score, 345.6);
        assert!(loaded.migrated_from.is_none());
    }

    #[test]
    fn test_json_uses_persisted_field_names() {
        let model = ModelFile::new(&network(InputSchema::V1), InputSchema::V1, 1, 2.0);
        let value: serde_json::Value = serde_json::from_str(&model.to_json().unwrap()).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["sensing"], "shared");
        assert_eq!(value["bestScore"], 2.0);
        assert!(value["brain"]["W1"].is_array());
        assert!(value["brain"]["b1"].is_array());
        assert!(value["brain"]["W2"].is_array());
        assert!(value["brain"]["b2"].is_array());
        assert!(value.get("trainedAt").is_none());
    }

    #[test]
    fn test_missing_array_is_rejected() {
        let json = r#"{
            "version": 1, "generation": 0, "bestScore": 0,
            "brain": { "W1": [[0, 0, 0, 0]], "b1": [0], "W2": [[0]] }
        }"#;
        assert!(matches!(ModelFile::from_json(json), Err(ModelError::Parse(_))));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let mut model = ModelFile::new(&network(InputSchema::V1), InputSchema::V1, 0, 0.0);
        model.version = 7;
        assert!(matches!(
            model.load(InputSchema::V1),
            Err(ModelError::UnknownVersion(UnknownSchemaError { version: 7 }))
        ));
    }

    #[test]
    fn test_wider_weights_are_trimmed_to_version() {
        let original = network(InputSchema::V2);
        let mut model = ModelFile::new(&original, InputSchema::V2, 0, 0.0);
        model.version = 1;
        let network = model.network().unwrap();
        assert_eq!(network.topology().input_size(), 4);
        for (old, new) in original.w1().iter().zip(network.w1()) {
            assert_eq!(&new[..], &old[..4]);
        }
    }

    #[test]
    fn test_narrower_weights_are_padded_to_version() {
        let original = network(InputSchema::V1);
        let mut model = ModelFile::new(&original, InputSchema::V1, 0, 0.0);
        model.version = 3;
        let a = model.load(InputSchema::V3).unwrap();
        let b = model.load(InputSchema::V3).unwrap();
        assert_eq!(a.network, b.network);
        assert_eq!(a.network.topology().input_size(), 7);
        assert!(a.migrated_from.is_none());
        for (old, new) in original.w1().iter().zip(a.network.w1()) {
            assert_eq!(&new[..4], &old[..]);
        }
    }

    #[test]
    fn test_unversioned_file_infers_schema_from_width() {
        let json = r#"{
            "generation": 5,
            "bestScore": 12.5,
            "brain": {
                "W1": [[0.1, 0.2, 0.3, 0.4], [0.5, 0.6, 0.7, 0.8]],
                "b1": [0, 0],
                "W2": [[1, -1]],
                "b2": [0]
            }
        }"#;
        let model = ModelFile::from_json(json).unwrap();
        assert_eq!(model.version, 0);
        assert_eq!(model.sensing, Sensing::Shared);
        assert_eq!(model.schema().unwrap(), InputSchema::V1);

        let loaded = model.load(InputSchema::V3).unwrap();
        assert_eq!(loaded.migrated_from, Some(InputSchema::V1));
        assert_eq!(loaded.network.topology().input_size(), 7);
        assert_eq!(&loaded.network.w1()[1][..4], &[0.5, 0.6, 0.7, 0.8]);
        assert_eq!(loaded.generation, 5);
    }

    #[test]
    fn test_unversioned_file_of_unknown_width_gets_default_schema() {
        let mut model = ModelFile::new(&network(InputSchema::V1), InputSchema::V1, 0, 0.0);
        model.version = 0;
        for row in &mut model.brain.w1 {
            row.push(0.25);
        }
        assert_eq!(model.schema().unwrap(), InputSchema::V3);
        let network = model.network().unwrap();
        assert_eq!(network.topology().input_size(), 7);
        assert!(network.w1().iter().all(|row| row[4] == 0.25));
    }

    #[test]
    fn test_sensing_round_trips() {
        let model = ModelFile::new(&network(InputSchema::V2), InputSchema::V2, 0, 1.0)
            .with_sensing(Sensing::Isolated);
        let json = model.to_json().unwrap();
        assert!(json.contains("\"sensing\": \"isolated\""));
        let loaded = ModelFile::from_json(&json).unwrap().load(InputSchema::V2).unwrap();
        assert_eq!(loaded.sensing, Sensing::Isolated);
        assert_eq!(model.migrate(InputSchema::V3).unwrap().sensing, Sensing::Isolated);
    }

    #[test]
    fn test_ragged_weights_are_rejected() {
        let mut model = ModelFile::new(&network(InputSchema::V1), InputSchema::V1, 0, 0.0);
        model.brain.w1[2].pop();
        assert!(matches!(
            model.load(InputSchema::V1),
            Err(ModelError::Shape(ShapeError::RaggedRow { row: 2, .. }))
        ));
    }

    #[test]
    fn test_upgrade_pads_deterministically() {
        let original = network(InputSchema::V1);
        let model = ModelFile::new(&original, InputSchema::V1, 3, 10.0);
        let a = model.load(InputSchema::V3).unwrap();
        let b = model.load(InputSchema::V3).unwrap();
        assert_eq!(a.network, b.network);
        assert_eq!(a.network.topology().input_size(), 7);
        assert_eq!(a.migrated_from, Some(InputSchema::V1));
        for (old, new) in original.w1().iter().zip(a.network.w1()) {
            assert_eq!(&new[..4], &old[..]);
        }
        assert_eq!(a.network.w2(), original.w2());
    }

    #[test]
    fn test_downgrade_trims_columns() {
        let original = network(InputSchema::V3);
        let model = ModelFile::new(&original, InputSchema::V3, 3, 10.0);
        let migrated = model.migrate(InputSchema::V1).unwrap();
        assert_eq!(migrated.version, 1);
        let network = migrated.network().unwrap();
        for (old, new) in original.w1().iter().zip(network.w1()) {
            assert_eq!(&new[..], &old[..4]);
        }
    }

    #[test]
    fn test_migration_path_is_chained() {
        let path = migration_path(InputSchema::V3, InputSchema::V1).unwrap();
        let steps: Vec<_> = path.iter().map(|m| (m.from, m.to)).collect();
        assert_eq!(
            steps,
            [
                (InputSchema::V3, InputSchema::V2),
                (InputSchema::V2, InputSchema::V1)
            ]
        );
        assert!(migration_path(InputSchema::V2, InputSchema::V2).unwrap().is_empty());
    }

    #[test]
    fn test_non_finite_best_score_is_stored_as_zero() {
        let network = network(InputSchema::V1);
        let model = ModelFile::new(&network, InputSchema::V1, 0, f64::NEG_INFINITY);
        assert_eq!(model.best_score, 0.0);
        assert!(ModelFile::from_json(&model.to_json().unwrap()).is_ok());
    }

    #[test]
    fn test_trained_at_round_trips() {
        let trained_at = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let model = ModelFile::new(&network(InputSchema::V2), InputSchema::V2, 0, 1.0)
            .with_trained_at(trained_at);
        let back = ModelFile::from_json(&model.to_json().unwrap()).unwrap();
        assert_eq!(back, model);
    }
}
