//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the authenticated session
//! extracted for each protected request.

use crate::adapters::{db::PgStore, memory::MemoryStore};
use crate::config::Config;
use crate::web::hub::StatusHub;
use crate::web::token::{Claims, TokenIssuer};
use doorlock_core::passcode::StoredPasscodeVerifier;
use doorlock_core::ports::{
    AuditLog, CredentialStore, DeviceController, PasscodeVerifier, SettingsStore, UserDirectory,
};
use std::sync::Arc;

//=========================================================================================
// Stores
//=========================================================================================

/// The repository ports, usually all backed by the same adapter.
#[derive(Clone)]
pub struct Stores {
    pub credentials: Arc<dyn CredentialStore>,
    pub logs: Arc<dyn AuditLog>,
    pub settings: Arc<dyn SettingsStore>,
    pub users: Arc<dyn UserDirectory>,
}

impl Stores {
    pub fn postgres(store: Arc<PgStore>) -> Self {
        Self {
            credentials: store.clone(),
            logs: store.clone(),
            settings: store.clone(),
            users: store,
        }
    }

    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            credentials: store.clone(),
            logs: store.clone(),
            settings: store.clone(),
            users: store,
        }
    }
}

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub credentials: Arc<dyn CredentialStore>,
    pub logs: Arc<dyn AuditLog>,
    pub settings: Arc<dyn SettingsStore>,
    pub users: Arc<dyn UserDirectory>,
    pub verifier: Arc<dyn PasscodeVerifier>,
    pub device: Arc<dyn DeviceController>,
    pub tokens: Arc<TokenIssuer>,
    pub hub: StatusHub,
}

impl AppState {
    pub fn new(config: Arc<Config>, stores: Stores, device: Arc<dyn DeviceController>) -> Self {
        let tokens = Arc::new(TokenIssuer::new(&config.jwt_secret));
        let verifier = Arc::new(StoredPasscodeVerifier::new(stores.credentials.clone()));
        Self {
            config,
            credentials: stores.credentials,
            logs: stores.logs,
            settings: stores.settings,
            users: stores.users,
            verifier,
            device,
            tokens,
            hub: StatusHub::default(),
        }
    }
}

//=========================================================================================
// Session (Specific to One Authenticated Request)
//=========================================================================================

/// Inserted into request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct Session {
    pub claims: Claims,
    /// The raw token, forwarded to the actuator as a bearer credential.
    pub token: String,
}
