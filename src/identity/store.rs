// Worker Identity Store
//
// Worker names look like "{model}-{XXXXXX}" and are generated at most once
// per installation.

use super::device::device_model;
use super::prefs::PreferenceStore;
use crate::error::MinerError;
use crate::types::WorkerIdentity;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::path::Path;

pub const PREFS_NAMESPACE: &str = "miner_prefs";
pub const WORKER_NAME_KEY: &str = "worker_name";
const SUFFIX_LEN: usize = 6;

#[derive(Debug, Clone)]
pub struct WorkerIdentityStore {
    prefs: PreferenceStore,
    model_override: Option<String>,
}

impl WorkerIdentityStore {
    pub fn new(data_dir: &Path, model_override: Option<String>) -> Self {
        Self {
            prefs: PreferenceStore::open(data_dir, PREFS_NAMESPACE),
            model_override,
        }
    }

    /// Return the stored worker name, generating and persisting one on first use
    pub fn get_or_create(&self) -> Result<WorkerIdentity, MinerError> {
        if let Some(name) = self.prefs.get_string(WORKER_NAME_KEY)? {
            return Ok(WorkerIdentity::new(name));
        }

        let model = device_model(self.model_override.as_deref());
        let name = generate_worker_name(&model, &random_suffix());
        self.prefs.put_string(WORKER_NAME_KEY, &name)?;

        tracing::info!(worker = %name, "Generated new worker name");
        Ok(WorkerIdentity::new(name))
    }
}

fn generate_worker_name(model: &str, suffix: &str) -> String {
    format!("{}-{}", model.replace(' ', "-"), suffix)
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect()
}
