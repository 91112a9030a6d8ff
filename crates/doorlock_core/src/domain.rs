//! crates/doorlock_core/src/domain.rs
//!
//! Defines the pure, core data structures for the door lock.
//! These structs are independent of any database; they carry serde derives
//! because the dashboard consumes them as JSON unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Credentials and Principals
//=========================================================================================

// Only used internally for login and passcode checks - contains sensitive data
#[derive(Debug, Clone)]
pub struct Credential {
    pub id: Uuid,
    pub surname: String,
    pub password_hash: String,
    pub passcode: String,
}

impl Credential {
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id,
            surname: self.surname.clone(),
        }
    }
}

/// The authenticated owner, as embedded in a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub surname: String,
}

//=========================================================================================
// Door State
//=========================================================================================

/// A command for the physical lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockAction {
    Lock,
    Unlock,
}

impl LockAction {
    /// The action that flips a lock currently in the given state.
    pub fn toggle_from(locked: bool) -> Self {
        if locked {
            LockAction::Unlock
        } else {
            LockAction::Lock
        }
    }

    pub fn leaves_locked(self) -> bool {
        matches!(self, LockAction::Lock)
    }
}

/// Cached mirror of the actuator's state. Advisory until the next status push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DoorStatus {
    pub locked: bool,
    pub door_open: bool,
    pub homekit_paired: bool,
    pub last_updated: DateTime<Utc>,
}

impl Default for DoorStatus {
    fn default() -> Self {
        Self {
            locked: true,
            door_open: false,
            homekit_paired: false,
            last_updated: Utc::now(),
        }
    }
}

/// A full state report pushed by the actuator. `None` means the actuator
/// could not read that value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusSnapshot {
    pub locked: Option<bool>,
    pub door_open: Option<bool>,
    pub homekit_paired: bool,
}

//=========================================================================================
// Activity Log
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Unlock,
    Lock,
    Doorbell,
    Settings,
    Login,
    FailedAttempt,
    UserAdded,
    UserRemoved,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Unlock => "unlock",
            LogKind::Lock => "lock",
            LogKind::Doorbell => "doorbell",
            LogKind::Settings => "settings",
            LogKind::Login => "login",
            LogKind::FailedAttempt => "failed_attempt",
            LogKind::UserAdded => "user_added",
            LogKind::UserRemoved => "user_removed",
        }
    }
}

impl From<LockAction> for LogKind {
    fn from(action: LockAction) -> Self {
        match action {
            LockAction::Lock => LogKind::Lock,
            LockAction::Unlock => LogKind::Unlock,
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unlock" => Ok(LogKind::Unlock),
            "lock" => Ok(LogKind::Lock),
            "doorbell" => Ok(LogKind::Doorbell),
            "settings" => Ok(LogKind::Settings),
            "login" => Ok(LogKind::Login),
            "failed_attempt" => Ok(LogKind::FailedAttempt),
            "user_added" => Ok(LogKind::UserAdded),
            "user_removed" => Ok(LogKind::UserRemoved),
            other => Err(format!("unknown log type '{}'", other)),
        }
    }
}

/// A single audit trail entry. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LogEntry {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: LogKind,
    #[serde(rename = "user")]
    pub actor: String,
    pub time: DateTime<Utc>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewLogEntry {
    #[serde(rename = "type")]
    pub kind: LogKind,
    #[serde(rename = "user")]
    pub actor: String,
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub details: Option<String>,
}

impl NewLogEntry {
    pub fn new(kind: LogKind, actor: impl Into<String>, success: bool) -> Self {
        Self {
            kind,
            actor: actor.into(),
            success,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Selection over the log, newest first. `offset` is applied before `limit`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub kind: Option<LogKind>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl LogFilter {
    pub fn matches(&self, entry: &LogEntry) -> bool {
        self.kind.map_or(true, |kind| entry.kind == kind)
    }
}

//=========================================================================================
// Settings
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Seconds.
    pub auto_lock_delay: u32,
    pub doorbell_enabled: bool,
    pub notifications_enabled: bool,
    #[serde(rename = "homeKitPin")]
    pub homekit_pin: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_lock_delay: 30,
            doorbell_enabled: true,
            notifications_enabled: true,
            homekit_pin: "123-45-678".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub auto_lock_delay: Option<u32>,
    pub doorbell_enabled: Option<bool>,
    pub notifications_enabled: Option<bool>,
    #[serde(rename = "homeKitPin")]
    pub homekit_pin: Option<String>,
}

impl Settings {
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(delay) = patch.auto_lock_delay {
            self.auto_lock_delay = delay;
        }
        if let Some(enabled) = patch.doorbell_enabled {
            self.doorbell_enabled = enabled;
        }
        if let Some(enabled) = patch.notifications_enabled {
            self.notifications_enabled = enabled;
        }
        if let Some(pin) = patch.homekit_pin {
            self.homekit_pin = pin;
        }
    }
}

//=========================================================================================
// Household Users
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    User,
    Guest,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::User => "user",
            UserRole::Guest => "guest",
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "user" => Ok(UserRole::User),
            "guest" => Ok(UserRole::Guest),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// A household member listed on the dashboard. Not a login credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub passcode: String,
    pub is_active: bool,
    pub last_access: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub passcode: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl NewUser {
    pub fn into_user(self, id: Uuid, created_at: DateTime<Utc>) -> User {
        User {
            id,
            name: self.name,
            email: self.email,
            role: self.role,
            passcode: self.passcode,
            is_active: self.is_active,
            last_access: None,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<UserRole>,
    pub passcode: Option<String>,
    pub is_active: Option<bool>,
}

impl User {
    pub fn apply(&mut self, patch: UserPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(passcode) = patch.passcode {
            self.passcode = passcode;
        }
        if let Some(active) = patch.is_active {
            self.is_active = active;
        }
    }
}

fn default_true() -> bool {
    true
}
