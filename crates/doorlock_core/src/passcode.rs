//! crates/doorlock_core/src/passcode.rs
//!
//! Door passcode rules and the store-backed verifier.
//!
//! The passcode is compared in clear, unlike the login secret which is only
//! ever stored as a hash.

use crate::ports::{CredentialStore, PasscodeVerifier, PortError, PortResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Digits in a door passcode.
pub const PASSCODE_LEN: usize = 6;

pub fn is_numeric(candidate: &str) -> bool {
    !candidate.is_empty() && candidate.bytes().all(|b| b.is_ascii_digit())
}

/// Checks a replacement passcode: exactly six ASCII digits.
pub fn validate_new_passcode(passcode: &str) -> PortResult<()> {
    if passcode.len() != PASSCODE_LEN || !is_numeric(passcode) {
        return Err(PortError::MalformedInput(format!(
            "passcode must be exactly {} digits",
            PASSCODE_LEN
        )));
    }
    Ok(())
}

/// Verifies candidates against the single stored credential.
pub struct StoredPasscodeVerifier<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> StoredPasscodeVerifier<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S> PasscodeVerifier for StoredPasscodeVerifier<S>
where
    S: CredentialStore + ?Sized,
{
    async fn verify(&self, candidate: &str) -> PortResult<()> {
        if !is_numeric(candidate) {
            return Err(PortError::InvalidCode);
        }

        match self.store.first_credential().await {
            Ok(credential) if credential.passcode == candidate => Ok(()),
            // A missing record and a mismatch are indistinguishable to the caller.
            Ok(_) | Err(PortError::NotFound(_)) => Err(PortError::InvalidCode),
            Err(e) => Err(e),
        }
    }
}
