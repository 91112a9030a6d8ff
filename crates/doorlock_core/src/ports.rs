//! crates/doorlock_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the door lock's core logic.
//! Stores, the remote actuator and the passcode check are all reached through
//! these traits so the core never depends on a database or HTTP client.

use crate::domain::{
    Credential, LockAction, LogEntry, LogFilter, NewLogEntry, NewUser, Settings, SettingsPatch,
    User, UserPatch,
};
use async_trait::async_trait;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The error taxonomy shared by every port operation.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid passcode")]
    InvalidCode,
    #[error("Actuator unreachable: {0}")]
    ActuatorUnreachable(String),
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An internal failure occurred: {0}")]
    InternalFailure(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Repository Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_surname(&self, surname: &str) -> PortResult<Credential>;

    /// The single active credential record.
    async fn first_credential(&self) -> PortResult<Credential>;

    /// Returns the number of records updated.
    async fn update_passcode(&self, passcode: &str) -> PortResult<u64>;

    /// Returns the number of records updated.
    async fn update_surname(&self, surname: &str) -> PortResult<u64>;
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: NewLogEntry) -> PortResult<LogEntry>;

    /// Entries matching the filter, newest first.
    async fn list(&self, filter: &LogFilter) -> PortResult<Vec<LogEntry>>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self) -> PortResult<Settings>;

    async fn update(&self, patch: SettingsPatch) -> PortResult<Settings>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn list(&self) -> PortResult<Vec<User>>;

    async fn create(&self, user: NewUser) -> PortResult<User>;

    async fn update(&self, id: Uuid, patch: UserPatch) -> PortResult<User>;

    async fn delete(&self, id: Uuid) -> PortResult<()>;
}

//=========================================================================================
// Door Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait PasscodeVerifier: Send + Sync {
    /// `Ok(())` iff the candidate matches the stored passcode exactly.
    async fn verify(&self, candidate: &str) -> PortResult<()>;
}

/// The physical controller, reached with the caller's bearer token.
#[async_trait]
pub trait DeviceController: Send + Sync {
    async fn actuate(&self, action: LockAction, bearer: &str) -> PortResult<()>;

    /// Sounds the physical chime.
    async fn ring(&self) -> PortResult<()>;
}

/// Lock commands as seen by a door panel, which holds its own session.
#[async_trait]
pub trait DoorActuator: Send + Sync {
    async fn lock(&self) -> PortResult<()>;

    async fn unlock(&self) -> PortResult<()>;

    async fn perform(&self, action: LockAction) -> PortResult<()> {
        match action {
            LockAction::Lock => self.lock().await,
            LockAction::Unlock => self.unlock().await,
        }
    }
}
