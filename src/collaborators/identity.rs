//! PIN verification
//!
//! Identity lives outside the engine. The orchestrator only asks one
//! question, "is this PIN valid for this user", through
//! [`CredentialVerifier`]. [`PinDirectory`] answers it from an in-memory
//! table for sandbox deployments and tests.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::types::{UserId, WalletError};

/// Length of a wallet PIN
pub const PIN_LENGTH: usize = 5;

#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// `Ok(false)` for a wrong PIN or an unknown user
    async fn verify_credential(&self, user: &str, pin: &str) -> Result<bool, WalletError>;
}

/// In-memory PIN table
#[derive(Debug, Default)]
pub struct PinDirectory {
    pins: DashMap<UserId, String>,
}

impl PinDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or replace the PIN of a user
    pub fn enroll(&self, user: &str, pin: &str) -> Result<(), WalletError> {
        if !is_well_formed(pin) {
            return Err(WalletError::InvalidCredential);
        }
        self.pins.insert(user.to_string(), pin.to_string());
        Ok(())
    }
}

fn is_well_formed(pin: &str) -> bool {
    pin.len() == PIN_LENGTH && pin.bytes().all(|b| b.is_ascii_digit())
}

#[async_trait]
impl CredentialVerifier for PinDirectory {
    async fn verify_credential(&self, user: &str, pin: &str) -> Result<bool, WalletError> {
        Ok(self
            .pins
            .get(user)
            .is_some_and(|stored| stored.value().as_str() == pin))
    }
}
