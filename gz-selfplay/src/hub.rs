//! Shared model access for the worker pool.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use gz_infer::{InferError, LinearModel, ModelWatcher};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Hands workers the current production model and, with the configured
/// probability, a past-model opponent. Loaded checkpoints are cached;
/// reloads swap a guarded pointer so in-flight games keep their old model.
pub struct ModelHub {
    prod: RwLock<Arc<LinearModel>>,
    watcher: Mutex<ModelWatcher>,
    past_dir: PathBuf,
    past_model_probability: f64,
    cache: Mutex<HashMap<PathBuf, Arc<LinearModel>>>,
}

impl ModelHub {
    pub fn new(
        model_dir: &Path,
        past_dir: &Path,
        past_model_probability: f64,
    ) -> Result<ModelHub, InferError> {
        let mut watcher = ModelWatcher::new(model_dir, None);
        let prod = watcher
            .check_reload()?
            .ok_or_else(|| InferError::Shape("initial model load returned nothing".into()))?;
        Ok(ModelHub {
            prod: RwLock::new(Arc::new(prod)),
            watcher: Mutex::new(watcher),
            past_dir: past_dir.to_path_buf(),
            past_model_probability,
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn production(&self) -> Arc<LinearModel> {
        self.prod.read().expect("hub poisoned").clone()
    }

    /// Reload the production model if its directory changed. Returns true
    /// when a new model was swapped in.
    pub fn refresh(&self) -> Result<bool, InferError> {
        let mut watcher = self.watcher.lock().expect("hub poisoned");
        match watcher.check_reload()? {
            Some(model) => {
                *self.prod.write().expect("hub poisoned") = Arc::new(model);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Pick an opponent for the next game: a random past checkpoint with
    /// the configured probability, the production model otherwise (or when
    /// no past checkpoints exist or one fails to load).
    pub fn opponent_for(&self, rng: &mut ChaCha8Rng) -> Arc<LinearModel> {
        if rng.gen_bool(self.past_model_probability.clamp(0.0, 1.0)) {
            if let Some(model) = self.random_past(rng) {
                return model;
            }
        }
        self.production()
    }

    fn random_past(&self, rng: &mut ChaCha8Rng) -> Option<Arc<LinearModel>> {
        let mut dirs: Vec<PathBuf> = std::fs::read_dir(&self.past_dir)
            .ok()?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .map(|e| e.path())
            .collect();
        if dirs.is_empty() {
            return None;
        }
        dirs.sort();
        let pick = dirs[rng.gen_range(0..dirs.len())].clone();

        let mut cache = self.cache.lock().expect("hub poisoned");
        if let Some(hit) = cache.get(&pick) {
            return Some(hit.clone());
        }
        match LinearModel::load(&pick) {
            Ok(model) => {
                let model = Arc::new(model);
                cache.insert(pick, model.clone());
                Some(model)
            }
            Err(_) => None,
        }
    }
}
