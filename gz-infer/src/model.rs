//! On-disk model store and reload plumbing.
//!
//! A model directory holds `model.json` (manifest) and one or more
//! safetensors weight blobs. The reference backend is a linear readout over
//! the feature planes; anything fulfilling the `Evaluator` contract can
//! replace it.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytemuck::{cast_slice, pod_collect_to_vec};
use gz_features::{feature_len, Features};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use safetensors::tensor::{Dtype, TensorView};
use safetensors::SafeTensors;
use serde::{Deserialize, Serialize};

use crate::evaluator::{Evaluator, InferError, Prediction};

pub const MANIFEST_NAME: &str = "model.json";
pub const WEIGHTS_NAME: &str = "weights.safetensors";

/// `model.json`: topology identifier plus the weight-blob manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    pub format: String,
    pub board_size: usize,
    pub weight_files: Vec<String>,
}

impl ModelManifest {
    pub fn load(dir: &Path) -> Result<ModelManifest, InferError> {
        let raw = fs::read_to_string(dir.join(MANIFEST_NAME))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Linear policy/value readout over the flat feature vector.
pub struct LinearModel {
    n: usize,
    policy_w: Vec<f32>,
    policy_b: Vec<f32>,
    value_w: Vec<f32>,
    value_b: f32,
}

impl LinearModel {
    pub fn board_size(&self) -> usize {
        self.n
    }

    /// Load a model directory.
    pub fn load(dir: impl AsRef<Path>) -> Result<LinearModel, InferError> {
        let dir = dir.as_ref();
        let manifest = ModelManifest::load(dir)?;
        if manifest.format != "linear_v1" {
            return Err(InferError::Shape(format!(
                "unsupported model format {:?}",
                manifest.format
            )));
        }
        let blob_name = manifest
            .weight_files
            .first()
            .ok_or_else(|| InferError::Shape("manifest lists no weight files".into()))?;
        let bytes = fs::read(dir.join(blob_name))?;
        let st = SafeTensors::deserialize(&bytes)?;

        let n = manifest.board_size;
        let f = feature_len(n);
        let cells = n * n;

        let policy_w = tensor_f32(&st, "policy_w", &[f, cells])?;
        let policy_b = tensor_f32(&st, "policy_b", &[cells])?;
        let value_w = tensor_f32(&st, "value_w", &[f])?;
        let value_b = tensor_f32(&st, "value_b", &[1])?[0];

        Ok(LinearModel {
            n,
            policy_w,
            policy_b,
            value_w,
            value_b,
        })
    }

    /// Write a freshly initialized model into `dir` (the bootstrap path for
    /// a first cycle with no production model yet).
    pub fn create_random(dir: impl AsRef<Path>, n: usize, seed: u64) -> Result<(), InferError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let f = feature_len(n);
        let cells = n * n;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut sample = |len: usize| -> Vec<f32> {
            (0..len).map(|_| rng.gen_range(-0.01f32..0.01)).collect()
        };

        let policy_w = sample(f * cells);
        let policy_b = sample(cells);
        let value_w = sample(f);
        let value_b = vec![0.0f32];

        let mut tensors: BTreeMap<String, TensorView<'_>> = BTreeMap::new();
        tensors.insert(
            "policy_w".into(),
            TensorView::new(Dtype::F32, vec![f, cells], cast_slice(&policy_w))?,
        );
        tensors.insert(
            "policy_b".into(),
            TensorView::new(Dtype::F32, vec![cells], cast_slice(&policy_b))?,
        );
        tensors.insert(
            "value_w".into(),
            TensorView::new(Dtype::F32, vec![f], cast_slice(&value_w))?,
        );
        tensors.insert(
            "value_b".into(),
            TensorView::new(Dtype::F32, vec![1], cast_slice(&value_b))?,
        );
        let blob = safetensors::serialize(&tensors, &None)?;
        fs::write(dir.join(WEIGHTS_NAME), blob)?;

        let manifest = ModelManifest {
            format: "linear_v1".into(),
            board_size: n,
            weight_files: vec![WEIGHTS_NAME.into()],
        };
        fs::write(
            dir.join(MANIFEST_NAME),
            serde_json::to_vec_pretty(&manifest)?,
        )?;
        Ok(())
    }
}

fn tensor_f32(st: &SafeTensors, name: &str, shape: &[usize]) -> Result<Vec<f32>, InferError> {
    let view = st
        .tensor(name)
        .map_err(|_| InferError::Shape(format!("missing tensor {name:?}")))?;
    if view.shape() != shape {
        return Err(InferError::Shape(format!(
            "tensor {name:?} has shape {:?}, expected {:?}",
            view.shape(),
            shape
        )));
    }
    Ok(pod_collect_to_vec(view.data()))
}

impl Evaluator for LinearModel {
    fn predict_batch(&self, inputs: &[Features]) -> Result<Vec<Prediction>, InferError> {
        let cells = self.n * self.n;
        let f = feature_len(self.n);
        let mut out = Vec::with_capacity(inputs.len());
        for input in inputs {
            if input.n != self.n || input.data.len() != f {
                return Err(InferError::Shape(format!(
                    "input for board size {} fed to model of size {}",
                    input.n, self.n
                )));
            }
            let mut logits = self.policy_b.clone();
            let mut value = self.value_b;
            for (i, &x) in input.data.iter().enumerate() {
                if x == 0.0 {
                    continue;
                }
                let row = &self.policy_w[i * cells..(i + 1) * cells];
                for (l, &w) in logits.iter_mut().zip(row) {
                    *l += x * w;
                }
                value += x * self.value_w[i];
            }
            out.push(Prediction {
                policy: softmax(&logits),
                value: value.tanh(),
            });
        }
        Ok(out)
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut out: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = out.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        for v in &mut out {
            *v /= sum;
        }
    } else {
        let u = 1.0 / out.len() as f32;
        for v in &mut out {
            *v = u;
        }
    }
    out
}

/// blake3 digest over the manifest and every weight blob it lists.
pub fn model_fingerprint(dir: impl AsRef<Path>) -> Result<String, InferError> {
    let dir = dir.as_ref();
    let mut hasher = blake3::Hasher::new();
    let manifest_raw = fs::read(dir.join(MANIFEST_NAME))?;
    hasher.update(&manifest_raw);
    let manifest: ModelManifest = serde_json::from_slice(&manifest_raw)?;
    for blob in &manifest.weight_files {
        hasher.update(&fs::read(dir.join(blob))?);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Fetch `model.json` (and its blobs) from `base_url` unless the server
/// reports the cached ETag. Returns the new ETag when anything was written.
pub fn fetch_remote_if_changed(
    base_url: &str,
    dir: &Path,
    etag: Option<&str>,
) -> Result<Option<String>, InferError> {
    let manifest_url = format!("{}/{}", base_url.trim_end_matches('/'), MANIFEST_NAME);
    let mut req = ureq::get(&manifest_url);
    if let Some(tag) = etag {
        req = req.set("If-None-Match", tag);
    }
    let resp = match req.call() {
        Ok(r) => r,
        Err(ureq::Error::Status(304, _)) => return Ok(None),
        Err(e) => return Err(InferError::Http(e.to_string())),
    };
    let new_etag = resp.header("etag").unwrap_or_default().to_string();
    let manifest_raw = resp
        .into_string()
        .map_err(|e| InferError::Http(e.to_string()))?;
    let manifest: ModelManifest = serde_json::from_str(&manifest_raw)?;

    fs::create_dir_all(dir)?;
    for blob in &manifest.weight_files {
        let url = format!("{}/{}", base_url.trim_end_matches('/'), blob);
        let resp = ureq::get(&url)
            .call()
            .map_err(|e| InferError::Http(e.to_string()))?;
        let mut bytes = Vec::new();
        resp.into_reader()
            .read_to_end(&mut bytes)
            .map_err(InferError::Io)?;
        write_atomic(&dir.join(blob), &bytes)?;
    }
    write_atomic(&dir.join(MANIFEST_NAME), manifest_raw.as_bytes())?;
    Ok(Some(new_etag))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), InferError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Tracks staleness of a model directory, by file mtime or by remote ETag.
pub struct ModelWatcher {
    dir: PathBuf,
    url: Option<String>,
    last_mtime: Option<SystemTime>,
    last_etag: Option<String>,
}

impl ModelWatcher {
    pub fn new(dir: impl Into<PathBuf>, url: Option<String>) -> ModelWatcher {
        ModelWatcher {
            dir: dir.into(),
            url,
            last_mtime: None,
            last_etag: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reload the model if its source changed since the last check.
    pub fn check_reload(&mut self) -> Result<Option<LinearModel>, InferError> {
        if let Some(url) = self.url.clone() {
            if let Some(tag) =
                fetch_remote_if_changed(&url, &self.dir, self.last_etag.as_deref())?
            {
                self.last_etag = Some(tag);
                return Ok(Some(LinearModel::load(&self.dir)?));
            }
            return Ok(None);
        }

        let mtime = fs::metadata(self.dir.join(MANIFEST_NAME))?.modified()?;
        if self.last_mtime != Some(mtime) {
            self.last_mtime = Some(mtime);
            return Ok(Some(LinearModel::load(&self.dir)?));
        }
        Ok(None)
    }
}
