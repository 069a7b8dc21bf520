//! JSON codecs for module states.
//!
//! Modules opt in through [`Module::register_codecs`](crate::mvi::Module::register_codecs).
//! The merged [`SerializationContext`] turns a [`StateSnapshot`] into one
//! opaque blob and back:
//!
//! ```json
//! { "version": 1, "states": { "counter": { "count": 3 } } }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mvi::ModuleState;
use crate::store::{ModuleKey, StateRef, StateSnapshot};

const BLOB_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("State registered as '{module}' has an unexpected type")]
    StateMismatch { module: &'static str },

    #[error("Unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
}

type EncodeFn = Box<dyn Fn(&StateRef) -> Result<serde_json::Value, CodecError> + Send + Sync>;
type DecodeFn = Box<dyn Fn(serde_json::Value) -> Result<StateRef, CodecError> + Send + Sync>;

struct StateCodec {
    name: &'static str,
    key: ModuleKey,
    encode: EncodeFn,
    decode: DecodeFn,
}

/// Codecs collected while the store is built.
#[derive(Default)]
pub struct CodecRegistry {
    codecs: Vec<StateCodec>,
}

impl CodecRegistry {
    /// Register `S` under `name`, the key used in the blob.
    pub fn register<S>(&mut self, name: &'static str)
    where
        S: ModuleState + Serialize + DeserializeOwned,
    {
        let key = ModuleKey::of::<S>();
        if let Some(existing) = self.codecs.iter().position(|c| c.key == key || c.name == name) {
            tracing::warn!(name, state = key.state_type_name(), "Replacing state codec");
            self.codecs.remove(existing);
        }

        self.codecs.push(StateCodec {
            name,
            key,
            encode: Box::new(move |state: &StateRef| {
                let state = (**state)
                    .downcast_ref::<S>()
                    .ok_or(CodecError::StateMismatch { module: name })?;
                Ok(serde_json::to_value(state)?)
            }),
            decode: Box::new(|value: serde_json::Value| {
                let state: S = serde_json::from_value(value)?;
                Ok(Arc::new(state) as StateRef)
            }),
        });
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    pub(crate) fn into_context(self) -> SerializationContext {
        let codecs: Vec<Arc<StateCodec>> = self.codecs.into_iter().map(Arc::new).collect();
        SerializationContext {
            by_key: codecs.iter().map(|c| (c.key, Arc::clone(c))).collect(),
            by_name: codecs.iter().map(|c| (c.name, Arc::clone(c))).collect(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Blob {
    version: u32,
    states: BTreeMap<String, serde_json::Value>,
}

/// Encoder/decoder shared by persistence and any debugging transport.
#[derive(Default)]
pub struct SerializationContext {
    by_key: HashMap<ModuleKey, Arc<StateCodec>>,
    by_name: HashMap<&'static str, Arc<StateCodec>>,
}

impl SerializationContext {
    /// Names of every module with a codec, sorted.
    pub fn modules(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.by_name.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Encode every state in `snapshot` that has a codec.
    pub fn encode(&self, snapshot: &StateSnapshot) -> Result<Vec<u8>, CodecError> {
        let mut states = BTreeMap::new();
        for (key, state) in snapshot.entries() {
            if let Some(codec) = self.by_key.get(key) {
                states.insert(codec.name.to_string(), (codec.encode)(state)?);
            }
        }
        Ok(serde_json::to_vec(&Blob {
            version: BLOB_VERSION,
            states,
        })?)
    }

    /// Decode a blob. Entries without a matching codec are skipped.
    pub fn decode(&self, blob: &[u8]) -> Result<StateSnapshot, CodecError> {
        let blob: Blob = serde_json::from_slice(blob)?;
        if blob.version != BLOB_VERSION {
            return Err(CodecError::UnsupportedVersion(blob.version));
        }

        let mut states = HashMap::new();
        for (name, value) in blob.states {
            match self.by_name.get(name.as_str()) {
                Some(codec) => {
                    states.insert(codec.key, (codec.decode)(value)?);
                }
                None => tracing::warn!(module = %name, "No codec for persisted state, skipping"),
            }
        }
        Ok(StateSnapshot::new(states))
    }
}
