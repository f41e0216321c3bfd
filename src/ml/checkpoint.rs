//! Model checkpoint persistence
//!
//! A checkpoint bundles the trained weights with the scaler they were trained
//! against, so a restored model reproduces predictions exactly. The weights
//! are burn's binary record of [`PriceLstm`]; config, metadata and scaler sit
//! next to them in one bincode envelope.
//! Writes are atomic (temp file + rename); a missing file loads as `None`.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bincode::Options;
use burn::module::Module;
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::models::price_lstm::PriceLstmRecord;
use super::{device, InferenceBackend, ModelConfig, ModelMetadata, PriceLstm, ScalerState};
use crate::error::{ForecastError, ForecastResult};

/// Bumped whenever the on-disk layout changes
pub const CHECKPOINT_FORMAT_VERSION: u32 = 2;

/// Upper bound on checkpoint size, guards against corrupt length prefixes
const MAX_CHECKPOINT_BYTES: u64 = 512 * 1024 * 1024;

type WeightRecorder = BinBytesRecorder<FullPrecisionSettings>;

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_CHECKPOINT_BYTES)
        .reject_trailing_bytes()
}

/// On-disk envelope
#[derive(Serialize, Deserialize)]
struct CheckpointFile {
    format_version: u32,
    config: ModelConfig,
    metadata: ModelMetadata,
    scaler: ScalerState,
    weights: Vec<u8>,
}

#[derive(Debug)]
pub struct Checkpoint {
    pub config: ModelConfig,
    pub metadata: ModelMetadata,
    pub scaler: ScalerState,
    pub model: PriceLstm<InferenceBackend>,
}

impl Checkpoint {
    pub fn new(
        config: ModelConfig,
        metadata: ModelMetadata,
        model: PriceLstm<InferenceBackend>,
        scaler: ScalerState,
    ) -> Self {
        Self {
            config,
            metadata,
            scaler,
            model,
        }
    }

    /// Write the checkpoint to `path`, replacing any previous file atomically.
    pub fn save(&self, path: &Path) -> ForecastResult<()> {
        let weights = Recorder::<InferenceBackend>::record(
            &WeightRecorder::default(),
            self.model.clone().into_record(),
            (),
        )
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{e:?}")))
        .map_err(io_error(path))?;

        let file = CheckpointFile {
            format_version: CHECKPOINT_FORMAT_VERSION,
            config: self.config.clone(),
            metadata: self.metadata.clone(),
            scaler: self.scaler,
            weights,
        };
        let bytes = codec()
            .serialize(&file)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            .map_err(io_error(path))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }

        let temp_path = temp_path(path);
        {
            let mut file = File::create(&temp_path).map_err(io_error(&temp_path))?;
            file.write_all(&bytes).map_err(io_error(&temp_path))?;
            file.sync_all().map_err(io_error(&temp_path))?;
        }
        fs::rename(&temp_path, path).map_err(io_error(path))?;

        debug!(path = %path.display(), bytes = bytes.len(), "Checkpoint saved");
        Ok(())
    }

    /// Read a checkpoint. `Ok(None)` when nothing was saved yet; a file that
    /// exists but does not decode to a usable model is `CheckpointCorrupt`.
    pub fn load(path: &Path) -> ForecastResult<Option<Self>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ForecastError::CheckpointIo {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let corrupt = |reason: String| ForecastError::CheckpointCorrupt {
            path: path.to_path_buf(),
            reason,
        };

        let file: CheckpointFile = codec()
            .deserialize(&bytes)
            .map_err(|e| corrupt(format!("decode failed: {e}")))?;
        if file.format_version != CHECKPOINT_FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported format version {} (expected {})",
                file.format_version, CHECKPOINT_FORMAT_VERSION
            )));
        }
        if !file.scaler.is_valid() {
            return Err(corrupt("scaler state is invalid".to_string()));
        }

        let record: PriceLstmRecord<InferenceBackend> = Recorder::<InferenceBackend>::load(
            &WeightRecorder::default(),
            file.weights,
            &device(),
        )
        .map_err(|e| corrupt(format!("weights failed to decode: {e:?}")))?;

        let fresh = PriceLstm::<InferenceBackend>::new(&file.config, &device());
        let expected_params = fresh.num_params();
        let model = fresh.load_record(record);
        if model.num_params() != expected_params {
            return Err(corrupt(format!(
                "weights hold {} parameters, config expects {expected_params}",
                model.num_params()
            )));
        }
        if let Some(reason) = non_finite_output(&model, &file.config) {
            return Err(corrupt(reason));
        }

        debug!(
            path = %path.display(),
            model_id = %file.metadata.model_id,
            "Checkpoint loaded"
        );
        Ok(Some(Self {
            config: file.config,
            metadata: file.metadata,
            scaler: file.scaler,
            model,
        }))
    }
}

/// Restored weights must map in-range windows to finite forecasts.
fn non_finite_output(
    model: &PriceLstm<InferenceBackend>,
    config: &ModelConfig,
) -> Option<String> {
    [0.0, 1.0].into_iter().find_map(|level| {
        let window = vec![level; config.sequence_length];
        let output = model.forward_window(&window, &device());
        let unusable =
            output.len() != config.prediction_hours || output.iter().any(|v| !v.is_finite());
        unusable.then(|| format!("weights produce an unusable forecast for a window of {level}"))
    })
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ForecastError {
    let path = path.to_path_buf();
    move |source| ForecastError::CheckpointIo { path, source }
}

/// `<path>.tmp`, next to the target so the final rename stays on one
/// filesystem.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::ValidationMetrics;
    use tempfile::tempdir;

    fn sample_config() -> ModelConfig {
        ModelConfig {
            sequence_length: 4,
            prediction_hours: 2,
            hidden_size: 3,
            num_layers: 2,
            dropout: 0.1,
            head_size: 2,
            seed: 5,
        }
    }

    fn sample_checkpoint() -> Checkpoint {
        let config = sample_config();
        let model = PriceLstm::<InferenceBackend>::seeded(&config, &device());
        let scaler = ScalerState::fit(&[12.5, 80.0, 41.0]).unwrap();
        let metadata = ModelMetadata {
            model_id: "price_lstm_test".to_string(),
            version: "0.0.0".to_string(),
            trained_at: chrono::Utc::now(),
            training_samples: 10,
            epochs: 3,
            final_loss: 0.02,
            validation_metrics: ValidationMetrics::new(1.0, 1.5, 4.0, 0.8),
        };
        Checkpoint::new(config, metadata, model, scaler)
    }

    fn forecast(checkpoint: &Checkpoint) -> Vec<f64> {
        checkpoint
            .model
            .forward_window(&[0.2, 0.9, 0.4, 0.6], &device())
    }

    #[test]
    fn test_load_nonexistent_file() {
        let dir = tempdir().unwrap();
        let loaded = Checkpoint::load(&dir.path().join("missing.bin")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_save_and_load_is_exact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("model.bin");
        let checkpoint = sample_checkpoint();

        checkpoint.save(&path).unwrap();
        assert!(path.exists());
        assert!(!dir.path().join("nested").join("model.bin.tmp").exists());

        let loaded = Checkpoint::load(&path).unwrap().unwrap();
        assert_eq!(loaded.config, checkpoint.config);
        assert_eq!(loaded.metadata, checkpoint.metadata);
        assert_eq!(loaded.scaler, checkpoint.scaler);
        assert_eq!(loaded.model.num_params(), checkpoint.model.num_params());
        assert_eq!(forecast(&loaded), forecast(&checkpoint));
    }

    #[test]
    fn test_save_overwrites_previous() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let first = sample_checkpoint();
        first.save(&path).unwrap();

        let mut second = sample_checkpoint();
        second.metadata.model_id = "price_lstm_second".to_string();
        second.save(&path).unwrap();

        let loaded = Checkpoint::load(&path).unwrap().unwrap();
        assert_eq!(loaded.metadata.model_id, "price_lstm_second");
    }

    #[test]
    fn test_temp_file_keeps_the_full_name() {
        assert_eq!(
            temp_path(Path::new("models/x.bin")),
            PathBuf::from("models/x.bin.tmp")
        );
        assert_ne!(
            temp_path(Path::new("models/x.bin")),
            temp_path(Path::new("models/x.dat"))
        );
        assert_eq!(
            temp_path(Path::new("model.tmp")),
            PathBuf::from("model.tmp.tmp")
        );
    }

    #[test]
    fn test_path_with_tmp_extension_saves() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.tmp");
        sample_checkpoint().save(&path).unwrap();

        assert!(!dir.path().join("model.tmp.tmp").exists());
        let loaded = Checkpoint::load(&path).unwrap().unwrap();
        assert_eq!(loaded.metadata.model_id, "price_lstm_test");
    }

    #[test]
    fn test_sibling_checkpoints_do_not_collide() {
        let dir = tempdir().unwrap();
        let bin = dir.path().join("x.bin");
        let dat = dir.path().join("x.dat");

        let first = sample_checkpoint();
        let mut second = sample_checkpoint();
        second.metadata.model_id = "price_lstm_dat".to_string();

        // a leftover temp file from one sibling must not leak into the other
        fs::write(temp_path(&bin), b"half written").unwrap();
        second.save(&dat).unwrap();
        first.save(&bin).unwrap();

        let model_id = |path: &Path| Checkpoint::load(path).unwrap().unwrap().metadata.model_id;
        assert_eq!(model_id(&bin), "price_lstm_test");
        assert_eq!(model_id(&dat), "price_lstm_dat");
    }

    #[test]
    fn test_stale_temp_file_is_ignored_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bin");
        sample_checkpoint().save(&path).unwrap();
        fs::write(temp_path(&path), b"interrupted save").unwrap();

        let loaded = Checkpoint::load(&path).unwrap().unwrap();
        assert_eq!(loaded.metadata.model_id, "price_lstm_test");
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bin");
        fs::write(&path, b"definitely not a model").unwrap();

        let result = Checkpoint::load(&path);
        assert!(matches!(result, Err(ForecastError::CheckpointCorrupt { .. })));
    }

    #[test]
    fn test_truncated_file_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bin");
        sample_checkpoint().save(&path).unwrap();

        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        let result = Checkpoint::load(&path);
        assert!(matches!(result, Err(ForecastError::CheckpointCorrupt { .. })));
    }

    #[test]
    fn test_invalid_scaler_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let mut checkpoint = sample_checkpoint();
        checkpoint.scaler.scale = 0.0;
        checkpoint.save(&path).unwrap();

        match Checkpoint::load(&path) {
            Err(ForecastError::CheckpointCorrupt { reason, .. }) => {
                assert!(reason.contains("scaler"))
            }
            other => panic!("expected corrupt checkpoint, got {other:?}"),
        }
    }

    #[test]
    fn test_weights_not_matching_config_are_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let mut checkpoint = sample_checkpoint();
        checkpoint.config.hidden_size = 7;
        checkpoint.save(&path).unwrap();

        let result = Checkpoint::load(&path);
        assert!(matches!(result, Err(ForecastError::CheckpointCorrupt { .. })));
    }
}
