//! Model artifact persistence
//!
//! Layout of an artifact file:
//! - 8 bytes magic `IRISRF\0\0`
//! - 2 bytes format version (little endian)
//! - 32 bytes SHA256 of the payload
//! - bincode payload `{ metadata, forest }`
//!
//! Files are written to a uniquely named temp file in the target directory,
//! synced, then renamed into place.

use crate::error::{IrisError, ModelLoadError, Result};
use crate::forest::RandomForest;
use crate::model::{ModelMetadata, TrainedModel};
use bincode::Options;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

const MAGIC: &[u8; 8] = b"IRISRF\0\0";

/// Current artifact format version
pub const FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = MAGIC.len() + 2 + 32;

/// Largest payload accepted on load; a 100-tree iris forest is well under 1 MiB
const MAX_PAYLOAD_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Serialize)]
struct PayloadRef<'a> {
    metadata: &'a ModelMetadata,
    forest: &'a RandomForest,
}

#[derive(Deserialize)]
struct Payload {
    metadata: ModelMetadata,
    forest: RandomForest,
}

/// Encode a model into artifact bytes
pub fn to_bytes(model: &TrainedModel) -> Result<Vec<u8>> {
    let payload = bincode::serialize(&PayloadRef {
        metadata: model.metadata(),
        forest: model.forest(),
    })
    .map_err(|e| IrisError::Encode(e.to_string()))?;
    Ok(frame(&payload))
}

/// Prefix an encoded payload with magic, format version and checksum
fn frame(payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&Sha256::digest(payload));
    bytes.extend_from_slice(payload);
    bytes
}

/// Decode artifact bytes back into a model
pub fn from_bytes(bytes: &[u8]) -> std::result::Result<TrainedModel, ModelLoadError> {
    if bytes.len() < HEADER_LEN {
        return Err(ModelLoadError::Corrupt(format!(
            "artifact is {} bytes, shorter than the {} byte header",
            bytes.len(),
            HEADER_LEN
        )));
    }

    let (magic, rest) = bytes.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(ModelLoadError::Corrupt("not an iris model artifact".to_string()));
    }

    let (version, rest) = rest.split_at(2);
    let version = u16::from_le_bytes([version[0], version[1]]);
    if version != FORMAT_VERSION {
        return Err(ModelLoadError::IncompatibleVersion(format!(
            "artifact format version {} is not supported (expected {})",
            version, FORMAT_VERSION
        )));
    }

    let (expected_checksum, payload) = rest.split_at(32);
    if payload.len() as u64 > MAX_PAYLOAD_BYTES {
        return Err(ModelLoadError::Corrupt(format!(
            "payload of {} bytes exceeds the {} byte limit",
            payload.len(),
            MAX_PAYLOAD_BYTES
        )));
    }
    let actual_checksum = Sha256::digest(payload);
    if actual_checksum.as_slice() != expected_checksum {
        return Err(ModelLoadError::Corrupt(format!(
            "checksum mismatch: expected {}, got {}",
            hex::encode(expected_checksum),
            hex::encode(actual_checksum)
        )));
    }

    // Same wire format as `bincode::serialize`, with a size cap
    let Payload { metadata, forest } = bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_PAYLOAD_BYTES)
        .deserialize(payload)
        .map_err(|e| ModelLoadError::Corrupt(format!("undecodable payload: {}", e)))?;

    if metadata.feature_names != ModelMetadata::contract_feature_names() {
        return Err(ModelLoadError::IncompatibleVersion(format!(
            "feature order {:?} does not match {:?}",
            metadata.feature_names,
            ModelMetadata::contract_feature_names()
        )));
    }
    if metadata.class_names != ModelMetadata::contract_class_names() {
        return Err(ModelLoadError::IncompatibleVersion(format!(
            "class labels {:?} do not match {:?}",
            metadata.class_names,
            ModelMetadata::contract_class_names()
        )));
    }
    forest
        .validate(metadata.n_samples)
        .map_err(ModelLoadError::Corrupt)?;

    Ok(TrainedModel::new(metadata, forest))
}

/// Save a model to `path`, returning the hex checksum of the payload
pub fn save(model: &TrainedModel, path: &Path) -> Result<String> {
    let bytes = to_bytes(model)?;
    let checksum = hex::encode(&bytes[MAGIC.len() + 2..HEADER_LEN]);

    let io_err = |source: std::io::Error| IrisError::ModelSave {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent).map_err(io_err)?;
            parent
        }
        None => Path::new("."),
    };

    // Dropping the temp file on any error below removes it
    let mut file = NamedTempFile::new_in(parent).map_err(io_err)?;
    file.write_all(&bytes).map_err(io_err)?;
    file.as_file().sync_all().map_err(io_err)?;
    file.persist(path).map_err(|e| io_err(e.error))?;

    info!(
        version = %model.metadata().version,
        path = %path.display(),
        size = bytes.len(),
        checksum = %checksum,
        "Model artifact saved"
    );

    Ok(checksum)
}

/// Load a model from `path`
pub fn load(path: &Path) -> std::result::Result<TrainedModel, ModelLoadError> {
    let bytes = fs::read(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => ModelLoadError::NotFound(path.to_path_buf()),
        _ => ModelLoadError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let model = from_bytes(&bytes)?;
    debug!(
        version = %model.metadata().version,
        path = %path.display(),
        size = bytes.len(),
        "Model artifact loaded"
    );
    Ok(model)
}

/// Hex SHA256 of a forest's encoding, used to derive model versions
pub(crate) fn fingerprint(forest: &RandomForest) -> Result<String> {
    let bytes = bincode::serialize(forest).map_err(|e| IrisError::Encode(e.to_string()))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::load_iris;
    use crate::forest::{ForestConfig, TreeNode};
    use crate::models::{FeatureImportance, NUM_FEATURES};
    use crate::training::train;
    use tempfile::TempDir;

    fn small_model() -> TrainedModel {
        train(&load_iris(), &ForestConfig::default().with_n_estimators(8)).unwrap()
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_bytes_round_trip() {
        let model = small_model();
        let bytes = to_bytes(&model).unwrap();
        assert_eq!(&bytes[..8], MAGIC);
        let restored = from_bytes(&bytes).unwrap();
        assert_eq!(restored, model);
    }

    #[test]
    fn test_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("models").join("iris.bin");
        let model = small_model();

        let checksum = save(&model, &path).unwrap();
        assert_eq!(checksum.len(), 64);
        assert_eq!(entries(path.parent().unwrap()), vec!["iris.bin"]);

        let restored = load(&path).unwrap();
        assert_eq!(restored, model);
        for (features, _) in load_iris() {
            assert_eq!(
                restored.forest().predict_proba(&features),
                model.forest().predict_proba(&features)
            );
        }
    }

    #[test]
    fn test_failed_save_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        // Renaming a file over a non-empty directory fails
        let path = temp_dir.path().join("occupied");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), b"x").unwrap();

        let err = save(&small_model(), &path).unwrap_err();
        assert!(matches!(err, IrisError::ModelSave { .. }));
        assert_eq!(entries(temp_dir.path()), vec!["occupied"]);
    }

    #[test]
    fn test_concurrent_saves_to_same_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("iris.bin");
        let model = small_model();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| save(&model, &path).unwrap());
            }
        });

        assert_eq!(load(&path).unwrap(), model);
        assert_eq!(entries(temp_dir.path()), vec!["iris.bin"]);
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = load(&temp_dir.path().join("absent.bin")).unwrap_err();
        assert!(matches!(err, ModelLoadError::NotFound(_)));
    }

    #[test]
    fn test_truncated_artifact() {
        let bytes = to_bytes(&small_model()).unwrap();
        let err = from_bytes(&bytes[..20]).unwrap_err();
        assert!(matches!(err, ModelLoadError::Corrupt(_)));

        let err = from_bytes(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, ModelLoadError::Corrupt(_)));
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = to_bytes(&small_model()).unwrap();
        bytes[0] = b'X';
        let err = from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, ModelLoadError::Corrupt(_)));
    }

    #[test]
    fn test_flipped_payload_byte() {
        let mut bytes = to_bytes(&small_model()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let err = from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn test_unknown_format_version() {
        let mut bytes = to_bytes(&small_model()).unwrap();
        bytes[8..10].copy_from_slice(&99u16.to_le_bytes());
        let err = from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, ModelLoadError::IncompatibleVersion(_)));
    }

    #[test]
    fn test_reordered_feature_contract() {
        let model = small_model();
        let mut metadata = model.metadata().clone();
        metadata.feature_names.swap(0, 1);
        let tampered = TrainedModel::new(metadata, model.forest().clone());
        let bytes = to_bytes(&tampered).unwrap();

        let err = from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, ModelLoadError::IncompatibleVersion(_)));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let model = small_model();
        let a = fingerprint(model.forest()).unwrap();
        let b = fingerprint(model.forest()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    /// Mirrors the encoded layout of `RandomForest` so arbitrary trees can be
    /// framed with a valid header and checksum
    #[derive(Serialize)]
    struct RawTree {
        nodes: Vec<TreeNode>,
        impurity_decrease: [f64; NUM_FEATURES],
    }

    #[derive(Serialize)]
    struct RawForest {
        trees: Vec<RawTree>,
        config: ForestConfig,
        importance: FeatureImportance,
    }

    #[derive(Serialize)]
    struct RawPayload<'a> {
        metadata: &'a ModelMetadata,
        forest: RawForest,
    }

    fn framed_forest(metadata: &ModelMetadata, nodes: Vec<TreeNode>) -> Vec<u8> {
        let payload = bincode::serialize(&RawPayload {
            metadata,
            forest: RawForest {
                trees: vec![RawTree {
                    nodes,
                    impurity_decrease: [0.25; NUM_FEATURES],
                }],
                config: metadata.config.clone(),
                importance: FeatureImportance::new([0.25; NUM_FEATURES]),
            },
        })
        .unwrap();
        frame(&payload)
    }

    #[test]
    fn test_raw_layout_matches_forest_encoding() {
        let model = small_model();
        let leaf = vec![TreeNode::Leaf {
            class_counts: [50, 50, 50],
        }];
        let model_bytes = framed_forest(model.metadata(), leaf);
        let restored = from_bytes(&model_bytes).unwrap();
        assert_eq!(restored.forest().trees().len(), 1);
        assert_eq!(restored.forest().trees()[0].depth(), 0);
    }

    #[test]
    fn test_deeply_nested_tree_is_corrupt() {
        let model = small_model();
        let depth = 200_000;
        let mut nodes = Vec::with_capacity(2 * depth + 1);
        for i in 0..depth {
            nodes.push(TreeNode::Split {
                feature: 0,
                threshold: i as f64,
                left: 2 * i + 1,
                right: 2 * i + 2,
            });
            nodes.push(TreeNode::Leaf {
                class_counts: [1, 0, 0],
            });
        }
        nodes.push(TreeNode::Leaf {
            class_counts: [0, 0, 1],
        });

        let err = from_bytes(&framed_forest(model.metadata(), nodes)).unwrap_err();
        assert!(matches!(err, ModelLoadError::Corrupt(_)), "{}", err);
    }

    #[test]
    fn test_cyclic_tree_is_corrupt() {
        let model = small_model();
        let nodes = vec![
            TreeNode::Split {
                feature: 2,
                threshold: 2.5,
                left: 1,
                right: 0,
            },
            TreeNode::Leaf {
                class_counts: [150, 0, 0],
            },
        ];

        let err = from_bytes(&framed_forest(model.metadata(), nodes)).unwrap_err();
        assert!(matches!(err, ModelLoadError::Corrupt(_)), "{}", err);
    }
}
