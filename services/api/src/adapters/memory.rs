//! services/api/src/adapters/memory.rs
//!
//! An in-process store implementing every repository port. Used when no
//! database is configured and by the integration tests.

use async_trait::async_trait;
use chrono::Utc;
use doorlock_core::domain::{
    Credential, LogEntry, LogFilter, NewLogEntry, NewUser, Settings, SettingsPatch, User,
    UserPatch,
};
use doorlock_core::ports::{
    AuditLog, CredentialStore, PortError, PortResult, SettingsStore, UserDirectory,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::password::hash_password;

#[derive(Default)]
pub struct MemoryStore {
    credentials: RwLock<Vec<Credential>>,
    /// Newest first.
    logs: RwLock<Vec<LogEntry>>,
    settings: RwLock<Settings>,
    users: RwLock<Vec<User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding one credential built from the given secrets.
    pub fn seeded(surname: &str, password: &str, passcode: &str) -> PortResult<Self> {
        let credential = Credential {
            id: Uuid::new_v4(),
            surname: surname.to_string(),
            password_hash: hash_password(password)?,
            passcode: passcode.to_string(),
        };
        Ok(Self {
            credentials: RwLock::new(vec![credential]),
            ..Self::default()
        })
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_surname(&self, surname: &str) -> PortResult<Credential> {
        self.credentials
            .read()
            .await
            .iter()
            .find(|c| c.surname == surname)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Credential for {} not found", surname)))
    }

    async fn first_credential(&self) -> PortResult<Credential> {
        self.credentials
            .read()
            .await
            .first()
            .cloned()
            .ok_or_else(|| PortError::NotFound("No credential record".to_string()))
    }

    async fn update_passcode(&self, passcode: &str) -> PortResult<u64> {
        let mut credentials = self.credentials.write().await;
        for credential in credentials.iter_mut() {
            credential.passcode = passcode.to_string();
        }
        Ok(credentials.len() as u64)
    }

    async fn update_surname(&self, surname: &str) -> PortResult<u64> {
        let mut credentials = self.credentials.write().await;
        Ok(match credentials.first_mut() {
            Some(credential) => {
                credential.surname = surname.to_string();
                1
            }
            None => 0,
        })
    }
}

#[async_trait]
impl AuditLog for MemoryStore {
    async fn append(&self, entry: NewLogEntry) -> PortResult<LogEntry> {
        let entry = LogEntry {
            id: Uuid::new_v4(),
            kind: entry.kind,
            actor: entry.actor,
            time: Utc::now(),
            success: entry.success,
            details: entry.details,
        };
        self.logs.write().await.insert(0, entry.clone());
        Ok(entry)
    }

    async fn list(&self, filter: &LogFilter) -> PortResult<Vec<LogEntry>> {
        let logs = self.logs.read().await;
        Ok(logs
            .iter()
            .filter(|entry| filter.matches(entry))
            .skip(filter.offset.unwrap_or(0))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get(&self) -> PortResult<Settings> {
        Ok(self.settings.read().await.clone())
    }

    async fn update(&self, patch: SettingsPatch) -> PortResult<Settings> {
        let mut settings = self.settings.write().await;
        settings.apply(patch);
        Ok(settings.clone())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn list(&self) -> PortResult<Vec<User>> {
        Ok(self.users.read().await.clone())
    }

    async fn create(&self, user: NewUser) -> PortResult<User> {
        let user = user.into_user(Uuid::new_v4(), Utc::now());
        self.users.write().await.push(user.clone());
        Ok(user)
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> PortResult<User> {
        let mut users = self.users.write().await;
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", id)))?;
        user.apply(patch);
        Ok(user.clone())
    }

    async fn delete(&self, id: Uuid) -> PortResult<()> {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|u| u.id != id);
        if users.len() == before {
            return Err(PortError::NotFound(format!("User {} not found", id)));
        }
        Ok(())
    }
}
