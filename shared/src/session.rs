//! Session Store: the single bearer credential, held in memory and mirrored
//! to the key-value capability under `authToken`.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::capabilities::{KeyValue, KvResult, AUTH_TOKEN_KEY};
use crate::event::{Event, Secret};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    token: Option<Secret>,
}

impl Session {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    #[must_use]
    pub fn token(&self) -> Option<&Secret> {
        self.token.as_ref()
    }

    /// Blank tokens never authenticate.
    pub fn authenticate(&mut self, token: Secret) -> bool {
        if token.is_blank() {
            self.token = None;
            return false;
        }
        self.token = Some(token);
        true
    }

    pub fn clear(&mut self) {
        self.token = None;
    }
}

pub struct SessionStore<'a> {
    kv: &'a KeyValue<Event>,
}

impl<'a> SessionStore<'a> {
    #[must_use]
    pub fn new(kv: &'a KeyValue<Event>) -> Self {
        Self { kv }
    }

    pub fn load<F>(&self, callback: F)
    where
        F: FnOnce(KvResult) -> Event + Send + Sync + 'static,
    {
        self.kv.get(AUTH_TOKEN_KEY.to_string(), callback);
    }

    pub fn save<F>(&self, token: &Secret, callback: F)
    where
        F: FnOnce(KvResult) -> Event + Send + Sync + 'static,
    {
        self.kv.set(
            AUTH_TOKEN_KEY.to_string(),
            token.expose().as_bytes().to_vec(),
            callback,
        );
    }

    pub fn clear<F>(&self, callback: F)
    where
        F: FnOnce(KvResult) -> Event + Send + Sync + 'static,
    {
        self.kv.delete(AUTH_TOKEN_KEY.to_string(), callback);
    }
}

/// Interpret a load result. Storage failures and malformed values degrade to
/// "no session" and are only logged.
#[must_use]
pub fn token_from(result: KvResult) -> Option<Secret> {
    match result {
        Ok(Some(bytes)) => match String::from_utf8(bytes) {
            Ok(text) if !text.trim().is_empty() => Some(Secret::new(text)),
            Ok(_) => {
                warn!("stored credential is blank, ignoring");
                None
            }
            Err(_) => {
                warn!("stored credential is not valid UTF-8, ignoring");
                None
            }
        },
        Ok(None) => {
            debug!("no stored credential");
            None
        }
        Err(e) => {
            warn!(error = %e, "failed to load stored credential");
            None
        }
    }
}
