//! Logged-in user state.
//!
//! # Design
//! `Session` is an explicit context object handed to the client operations
//! that need an identity. Persistence sits behind `SessionStore`: the
//! session loads the user once at startup and saves or removes the user's
//! dictionary form under `logged-in-user` on every login, refresh and
//! logout. Where it is stored is up to the host.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::marshal::ApiRecord;
use crate::models::Employee;

/// Storage key for the logged-in user's dictionary.
pub const LOGGED_IN_USER_KEY: &str = "logged-in-user";

/// Key-value persistence for session state.
pub trait SessionStore: Send + Sync {
    fn load(&self, key: &str) -> Option<Value>;
    fn save(&self, key: &str, value: Value);
    fn remove(&self, key: &str);
}

/// Lets the host keep a handle on a store it also hands to a `Session`.
impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    fn load(&self, key: &str) -> Option<Value> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: Value) {
        (**self).save(key, value)
    }

    fn remove(&self, key: &str) {
        (**self).remove(key)
    }
}

/// A `SessionStore` that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, key: &str) -> Option<Value> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn save(&self, key: &str, value: Value) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.to_string(), value);
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }
}

pub struct Session {
    user: Option<Employee>,
    store: Box<dyn SessionStore>,
}

impl Session {
    /// Restore the logged-in user from `store`. An entry that no longer
    /// decodes is treated as no user.
    pub fn load(store: Box<dyn SessionStore>) -> Self {
        let user = store
            .load(LOGGED_IN_USER_KEY)
            .and_then(|value| match value {
                Value::Object(object) => Some(object),
                _ => None,
            })
            .and_then(|object| match Employee::from_json(&object) {
                Ok(employee) => Some(employee),
                Err(e) => {
                    warn!(error = %e, "stored user could not be decoded");
                    None
                }
            });
        debug!(logged_in = user.is_some(), "session loaded");
        Self { user, store }
    }

    pub fn user(&self) -> Option<&Employee> {
        self.user.as_ref()
    }

    /// The logged-in user, or `NoLoggedInUser`.
    pub fn require_user(&self) -> Result<&Employee, ApiError> {
        self.user.as_ref().ok_or(ApiError::NoLoggedInUser)
    }

    /// Fail with `UserAlreadyLoggedIn` when a user is present.
    pub fn ensure_logged_out(&self) -> Result<(), ApiError> {
        match &self.user {
            Some(user) => Err(ApiError::UserAlreadyLoggedIn {
                user_uri: user.resource_uri.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Replace the logged-in user and persist it.
    pub fn set_user(&mut self, employee: Employee) {
        self.store
            .save(LOGGED_IN_USER_KEY, Value::Object(employee.to_json()));
        self.user = Some(employee);
    }

    /// Forget the logged-in user, in memory and in the store.
    pub fn clear(&mut self) {
        self.store.remove(LOGGED_IN_USER_KEY);
        self.user = None;
    }
}
