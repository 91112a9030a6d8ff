//! services/api/src/adapters/actuator.rs
//!
//! The HTTP client for the lock controller. Each command is a single GET
//! carrying the caller's session token as a bearer credential.

use async_trait::async_trait;
use doorlock_core::domain::LockAction;
use doorlock_core::ports::{DeviceController, PortError, PortResult};
use std::time::Duration;
use tracing::debug;

pub struct RemoteActuator {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteActuator {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, action: LockAction) -> String {
        let path = match action {
            LockAction::Lock => "/api/lock-door",
            LockAction::Unlock => "/api/open-door",
        };
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl DeviceController for RemoteActuator {
    async fn actuate(&self, action: LockAction, bearer: &str) -> PortResult<()> {
        let url = self.endpoint(action);
        debug!(%url, "Sending actuator command");

        let response = self
            .client
            .get(&url)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| PortError::ActuatorUnreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PortError::ActuatorUnreachable(format!(
                "controller answered {}: {}",
                status, body
            )));
        }
        Ok(())
    }

    async fn ring(&self) -> PortResult<()> {
        let url = format!("{}/api/ring", self.base_url);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| PortError::ActuatorUnreachable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(PortError::ActuatorUnreachable(format!(
                "controller answered {} to ring",
                response.status()
            )));
        }
        Ok(())
    }
}
