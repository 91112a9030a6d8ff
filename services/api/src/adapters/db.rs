//! services/api/src/adapters/db.rs
//!
//! The PostgreSQL adapter. One `PgStore` implements every repository port
//! from the core crate on top of a shared `sqlx` pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use doorlock_core::domain::{
    Credential, LogEntry, LogFilter, LogKind, NewLogEntry, NewUser, Settings, SettingsPatch, User,
    UserPatch, UserRole,
};
use doorlock_core::ports::{
    AuditLog, CredentialStore, PortError, PortResult, SettingsStore, UserDirectory,
};
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::config::SeedCredential;
use crate::password::hash_password;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Inserts the seed credential when the table is empty. Returns whether a row was written.
    pub async fn seed_credential_if_empty(&self, seed: &SeedCredential) -> PortResult<bool> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM credentials")
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        if count > 0 {
            return Ok(false);
        }

        let password_hash = hash_password(&seed.password)?;
        sqlx::query(
            "INSERT INTO credentials (id, surname, password_hash, passcode) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(&seed.surname)
        .bind(password_hash)
        .bind(&seed.passcode)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        info!("Seeded credential for {}", seed.surname);
        Ok(true)
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::InternalFailure(e.to_string())
}

/// LIMIT and OFFSET binds for a log query. Values past `i64::MAX` are the caller's mistake.
fn page_bounds(filter: &LogFilter) -> PortResult<(Option<i64>, i64)> {
    let to_bind = |value: usize, name: &str| {
        i64::try_from(value)
            .map_err(|_| PortError::MalformedInput(format!("{} {} is out of range", name, value)))
    };
    let limit = filter.limit.map(|l| to_bind(l, "limit")).transpose()?;
    let offset = to_bind(filter.offset.unwrap_or(0), "offset")?;
    Ok((limit, offset))
}

fn not_found_or(e: sqlx::Error, what: impl FnOnce() -> String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what()),
        _ => unexpected(e),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct CredentialRecord {
    id: Uuid,
    surname: String,
    password_hash: String,
    passcode: String,
}
impl CredentialRecord {
    fn to_domain(self) -> Credential {
        Credential {
            id: self.id,
            surname: self.surname,
            password_hash: self.password_hash,
            passcode: self.passcode,
        }
    }
}

#[derive(FromRow)]
struct LogRecord {
    id: Uuid,
    kind: String,
    actor: String,
    time: DateTime<Utc>,
    success: bool,
    details: Option<String>,
}
impl LogRecord {
    fn to_domain(self) -> PortResult<LogEntry> {
        Ok(LogEntry {
            id: self.id,
            kind: self
                .kind
                .parse::<LogKind>()
                .map_err(PortError::InternalFailure)?,
            actor: self.actor,
            time: self.time,
            success: self.success,
            details: self.details,
        })
    }
}

#[derive(FromRow)]
struct SettingsRecord {
    auto_lock_delay: i32,
    doorbell_enabled: bool,
    notifications_enabled: bool,
    homekit_pin: String,
}
impl SettingsRecord {
    fn to_domain(self) -> Settings {
        Settings {
            auto_lock_delay: self.auto_lock_delay.max(0) as u32,
            doorbell_enabled: self.doorbell_enabled,
            notifications_enabled: self.notifications_enabled,
            homekit_pin: self.homekit_pin,
        }
    }
}

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    name: String,
    email: String,
    role: String,
    passcode: String,
    is_active: bool,
    last_access: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        Ok(User {
            id: self.id,
            name: self.name,
            email: self.email,
            role: self
                .role
                .parse::<UserRole>()
                .map_err(PortError::InternalFailure)?,
            passcode: self.passcode,
            is_active: self.is_active,
            last_access: self.last_access,
            created_at: self.created_at,
        })
    }
}

const USER_COLUMNS: &str =
    "id, name, email, role, passcode, is_active, last_access, created_at";

//=========================================================================================
// Repository Port Implementations
//=========================================================================================

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_by_surname(&self, surname: &str) -> PortResult<Credential> {
        let record = sqlx::query_as::<_, CredentialRecord>(
            "SELECT id, surname, password_hash, passcode FROM credentials WHERE surname = $1",
        )
        .bind(surname)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or(e, || format!("Credential for {} not found", surname)))?;
        Ok(record.to_domain())
    }

    async fn first_credential(&self) -> PortResult<Credential> {
        let record = sqlx::query_as::<_, CredentialRecord>(
            "SELECT id, surname, password_hash, passcode FROM credentials ORDER BY created_at ASC LIMIT 1",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or(e, || "No credential record".to_string()))?;
        Ok(record.to_domain())
    }

    async fn update_passcode(&self, passcode: &str) -> PortResult<u64> {
        let result = sqlx::query("UPDATE credentials SET passcode = $1")
            .bind(passcode)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected())
    }

    async fn update_surname(&self, surname: &str) -> PortResult<u64> {
        let result = sqlx::query(
            "UPDATE credentials SET surname = $1 WHERE id = (SELECT id FROM credentials ORDER BY created_at ASC LIMIT 1)",
        )
        .bind(surname)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AuditLog for PgStore {
    async fn append(&self, entry: NewLogEntry) -> PortResult<LogEntry> {
        let record = sqlx::query_as::<_, LogRecord>(
            "INSERT INTO activity_logs (id, kind, actor, success, details) VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, kind, actor, time, success, details",
        )
        .bind(Uuid::new_v4())
        .bind(entry.kind.as_str())
        .bind(&entry.actor)
        .bind(entry.success)
        .bind(&entry.details)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn list(&self, filter: &LogFilter) -> PortResult<Vec<LogEntry>> {
        let (limit, offset) = page_bounds(filter)?;
        let records = sqlx::query_as::<_, LogRecord>(
            "SELECT id, kind, actor, time, success, details FROM activity_logs \
             WHERE ($1::TEXT IS NULL OR kind = $1) \
             ORDER BY time DESC LIMIT $2 OFFSET $3",
        )
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(LogRecord::to_domain).collect()
    }
}

#[async_trait]
impl SettingsStore for PgStore {
    async fn get(&self) -> PortResult<Settings> {
        let record = sqlx::query_as::<_, SettingsRecord>(
            "SELECT auto_lock_delay, doorbell_enabled, notifications_enabled, homekit_pin FROM settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(SettingsRecord::to_domain).unwrap_or_default())
    }

    async fn update(&self, patch: SettingsPatch) -> PortResult<Settings> {
        let mut settings = SettingsStore::get(self).await?;
        settings.apply(patch);
        sqlx::query(
            "INSERT INTO settings (id, auto_lock_delay, doorbell_enabled, notifications_enabled, homekit_pin) \
             VALUES (1, $1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET auto_lock_delay = $1, doorbell_enabled = $2, \
             notifications_enabled = $3, homekit_pin = $4",
        )
        .bind(settings.auto_lock_delay as i32)
        .bind(settings.doorbell_enabled)
        .bind(settings.notifications_enabled)
        .bind(&settings.homekit_pin)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(settings)
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn list(&self) -> PortResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM household_users ORDER BY created_at ASC",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(UserRecord::to_domain).collect()
    }

    async fn create(&self, user: NewUser) -> PortResult<User> {
        let user = user.into_user(Uuid::new_v4(), Utc::now());
        sqlx::query(
            "INSERT INTO household_users (id, name, email, role, passcode, is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(&user.passcode)
        .bind(user.is_active)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(user)
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM household_users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or(e, || format!("User {} not found", id)))?;

        let mut user = record.to_domain()?;
        user.apply(patch);
        sqlx::query(
            "UPDATE household_users SET name = $2, email = $3, role = $4, passcode = $5, is_active = $6 \
             WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(&user.passcode)
        .bind(user.is_active)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM household_users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_bounds_pass_ordinary_values_through() {
        let filter = LogFilter {
            kind: None,
            limit: Some(20),
            offset: Some(40),
        };
        assert_eq!(page_bounds(&filter).unwrap(), (Some(20), 40));
        assert_eq!(page_bounds(&LogFilter::default()).unwrap(), (None, 0));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn oversized_page_bounds_are_malformed() {
        let huge = usize::MAX;
        for filter in [
            LogFilter {
                limit: Some(huge),
                ..Default::default()
            },
            LogFilter {
                offset: Some(huge),
                ..Default::default()
            },
        ] {
            assert!(matches!(
                page_bounds(&filter),
                Err(PortError::MalformedInput(_))
            ));
        }
    }
}
