//! Model registry and reference store
//!
//! The [`Registry`] resolves model names to frozen descriptors; the
//! [`Store`] resolves (model, key attribute, key value) triples to live
//! instances for reference-typed attributes. Both are plain objects passed
//! by reference, with one process-default instance each for ergonomics.
//!
//! Neither structure synchronizes beyond the lock guarding the process
//! defaults; concurrent registration is out of contract.

use crate::error::{Error, Result};
use crate::instance::{Instance, ModelDescriptor};
use crate::values::Value;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Process-default registry
static GLOBAL_REGISTRY: Lazy<RwLock<Registry>> = Lazy::new(|| RwLock::new(Registry::new()));

/// Process-default store
static GLOBAL_STORE: Lazy<RwLock<Store>> = Lazy::new(|| RwLock::new(Store::new()));

/// Model-name to descriptor resolution
#[derive(Debug, Default)]
pub struct Registry {
    models: IndexMap<String, Arc<ModelDescriptor>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor under its model name; a later registration
    /// of the same name wins
    pub fn register(&mut self, descriptor: Arc<ModelDescriptor>) {
        let name = descriptor.name().to_string();
        if self.models.contains_key(&name) {
            tracing::debug!(model = %name, "re-registering model");
        }
        self.models.insert(name, descriptor);
    }

    /// Look up a descriptor by model name
    pub fn get(&self, name: &str) -> Option<Arc<ModelDescriptor>> {
        self.models.get(name).cloned()
    }

    /// Look up a descriptor by model name, failing on unknown names
    pub fn lookup(&self, name: &str) -> Result<Arc<ModelDescriptor>> {
        self.get(name)
            .ok_or_else(|| Error::Lookup(format!("no model registered under '{}'", name)))
    }

    /// Check whether a model name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Number of registered models
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Check whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Access the process-default registry
    pub fn global() -> &'static RwLock<Registry> {
        &GLOBAL_REGISTRY
    }

    /// Register a descriptor in the process-default registry
    pub fn global_register(descriptor: Arc<ModelDescriptor>) {
        GLOBAL_REGISTRY
            .write()
            .expect("registry lock poisoned")
            .register(descriptor);
    }

    /// Look up a descriptor in the process-default registry
    pub fn global_lookup(name: &str) -> Result<Arc<ModelDescriptor>> {
        GLOBAL_REGISTRY
            .read()
            .expect("registry lock poisoned")
            .lookup(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StoreKey {
    model: String,
    key_attribute: String,
    key: String,
}

/// Object store backing cross-document reference resolution
#[derive(Debug, Default)]
pub struct Store {
    objects: HashMap<StoreKey, Instance>,
}

impl Store {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instance under the value of its key attribute
    pub fn register(&mut self, key_attribute: &str, instance: Instance) -> Result<()> {
        let key = instance.get(key_attribute)?;
        if key.is_blank() {
            return Err(Error::Lookup(format!(
                "instance of '{}' has no usable key value in '{}'",
                instance.model_name(),
                key_attribute
            )));
        }
        let store_key = StoreKey {
            model: instance.model_name().to_string(),
            key_attribute: key_attribute.to_string(),
            key: key.lexical(),
        };
        self.objects.insert(store_key, instance);
        Ok(())
    }

    /// Resolve a (model, key attribute, key value) triple to an instance.
    /// A miss is `None`, not an error.
    pub fn resolve(&self, model: &str, key_attribute: &str, key: &Value) -> Option<&Instance> {
        let store_key = StoreKey {
            model: model.to_string(),
            key_attribute: key_attribute.to_string(),
            key: key.lexical(),
        };
        self.objects.get(&store_key)
    }

    /// Number of stored instances
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Access the process-default store
    pub fn global() -> &'static RwLock<Store> {
        &GLOBAL_STORE
    }

    /// Register an instance in the process-default store
    pub fn global_register(key_attribute: &str, instance: Instance) -> Result<()> {
        GLOBAL_STORE
            .write()
            .expect("store lock poisoned")
            .register(key_attribute, instance)
    }

    /// Resolve a reference triple in the process-default store
    pub fn global_resolve(model: &str, key_attribute: &str, key: &Value) -> Option<Instance> {
        GLOBAL_STORE
            .read()
            .expect("store lock poisoned")
            .resolve(model, key_attribute, key)
            .cloned()
    }
}
