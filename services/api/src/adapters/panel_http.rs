//! services/api/src/adapters/panel_http.rs
//!
//! The kiosk's client for the API server. It logs in with the household
//! credential, keeps the session token, and exposes the passcode check and
//! lock commands through the core ports so a `DoorPanel` can drive them.

use async_trait::async_trait;
use doorlock_core::domain::LockAction;
use doorlock_core::ports::{DoorActuator, PasscodeVerifier, PortError, PortResult};
use reqwest::{header, StatusCode};
use serde_json::json;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{info, warn};

use crate::web::middleware::SESSION_COOKIE;

pub struct HttpPanelClient {
    client: reqwest::Client,
    base_url: String,
    surname: String,
    password: String,
    token: RwLock<Option<String>>,
}

impl HttpPanelClient {
    pub fn new(
        base_url: impl Into<String>,
        surname: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            surname: surname.into(),
            password: password.into(),
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// The current session token, if logged in.
    pub fn token(&self) -> Option<String> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_token(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    /// Logs in and stores the session token from the `Set-Cookie` header.
    pub async fn login(&self) -> PortResult<()> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "surname": self.surname, "password": self.password }))
            .send()
            .await
            .map_err(|e| PortError::ActuatorUnreachable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED => return Err(PortError::InvalidCredentials),
            status => {
                return Err(PortError::ActuatorUnreachable(format!(
                    "login answered {}",
                    status
                )))
            }
        }

        let token = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(cookie_token)
            .ok_or_else(|| {
                PortError::InternalFailure("login response carried no session cookie".to_string())
            })?;
        self.set_token(Some(token));
        info!("Panel logged in as {}", self.surname);
        Ok(())
    }

    /// Asks the server to ring every connected panel.
    pub async fn trigger_doorbell(&self) -> PortResult<()> {
        let response = self
            .client
            .post(self.url("/doorbell/trigger"))
            .send()
            .await
            .map_err(|e| PortError::ActuatorUnreachable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(PortError::ActuatorUnreachable(format!(
                "doorbell answered {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn send_command(&self, action: LockAction) -> PortResult<StatusCode> {
        let path = match action {
            LockAction::Lock => "/door/lock",
            LockAction::Unlock => "/door/unlock",
        };
        let mut request = self.client.post(self.url(path));
        if let Some(token) = self.token() {
            request = request.header(header::COOKIE, format!("{}={}", SESSION_COOKIE, token));
        }
        let response = request
            .send()
            .await
            .map_err(|e| PortError::ActuatorUnreachable(e.to_string()))?;
        Ok(response.status())
    }

    /// Sends a lock command, logging in again once if the session was refused.
    async fn command(&self, action: LockAction) -> PortResult<()> {
        let mut status = self.send_command(action).await?;
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(%status, "Panel session refused, logging in again");
            self.login().await?;
            status = self.send_command(action).await?;
        }
        if !status.is_success() {
            return Err(PortError::ActuatorUnreachable(format!(
                "{:?} answered {}",
                action, status
            )));
        }
        Ok(())
    }
}

/// The session token out of one `Set-Cookie` value.
fn cookie_token(set_cookie: &str) -> Option<String> {
    let first = set_cookie.split(';').next()?;
    let (name, value) = first.trim().split_once('=')?;
    (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
}

#[async_trait]
impl PasscodeVerifier for HttpPanelClient {
    async fn verify(&self, candidate: &str) -> PortResult<()> {
        let response = self
            .client
            .post(self.url("/door/verify-passcode"))
            .json(&json!({ "passcode": candidate }))
            .send()
            .await
            .map_err(|e| PortError::ActuatorUnreachable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED => Err(PortError::InvalidCode),
            status => Err(PortError::ActuatorUnreachable(format!(
                "verify-passcode answered {}",
                status
            ))),
        }
    }
}

#[async_trait]
impl DoorActuator for HttpPanelClient {
    async fn lock(&self) -> PortResult<()> {
        self.command(LockAction::Lock).await
    }

    async fn unlock(&self) -> PortResult<()> {
        self.command(LockAction::Unlock).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HttpPanelClient {
        HttpPanelClient::new(server.uri(), "Novak", "secret", Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn extracts_token_from_set_cookie() {
        assert_eq!(
            cookie_token("token=abc.def; HttpOnly; Path=/").as_deref(),
            Some("abc.def")
        );
        assert_eq!(cookie_token("theme=dark; Path=/"), None);
    }

    #[tokio::test]
    async fn login_then_unlock_sends_cookie() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(json!({ "surname": "Novak", "password": "secret" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "token=abc; HttpOnly; Path=/")
                    .set_body_json(json!({ "success": true })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/door/unlock"))
            .and(header_eq("cookie", "token=abc"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let panel = client(&server);
        panel.login().await.unwrap();
        assert_eq!(panel.token().as_deref(), Some("abc"));
        panel.unlock().await.unwrap();
    }

    #[tokio::test]
    async fn wrong_passcode_is_invalid_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/door/verify-passcode"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client(&server).verify("000000").await.unwrap_err();
        assert!(matches!(err, PortError::InvalidCode));
    }

    #[tokio::test]
    async fn gateway_failure_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/door/lock"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = client(&server).lock().await.unwrap_err();
        assert!(matches!(err, PortError::ActuatorUnreachable(_)));
    }
}
