//! Credential storage
//!
//! The four credential entities (farmers, admins, password records, OTPs)
//! live behind the [`CredentialStore`] trait. Two interchangeable backends
//! implement it: MongoDB when a connection URI is configured, and a
//! process-local map store otherwise. The rest of the system is written
//! against the trait only, so the two must behave identically for every
//! method here.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::models::{Admin, Farmer, FarmerUpdate, OtpPurpose, RegistrationData, UserType};

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// How long an issued OTP stays valid.
pub const OTP_TTL_MINUTES: i64 = 5;

/// Storage failure surfaced to the auth service.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint (farmer email, admin email, password key)
    /// rejected the write.
    #[error("record already exists")]
    Duplicate,

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Uniform storage interface for the auth service.
///
/// All writes to credential entities are funneled through these methods;
/// no other component touches the underlying collections.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Cheap backend reachability check, used by the readiness probe.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn find_farmer_by_email(&self, email: &str) -> Result<Option<Farmer>, StoreError>;

    async fn find_farmer_by_id(&self, id: &str) -> Result<Option<Farmer>, StoreError>;

    /// Create a farmer for `email`, filling the profile from
    /// `registration` where given. `estimated_income` is computed at
    /// creation time. Fails with [`StoreError::Duplicate`] when the email
    /// is already registered.
    async fn create_farmer(
        &self,
        email: &str,
        registration: Option<RegistrationData>,
    ) -> Result<Farmer, StoreError>;

    /// Apply a partial update, recomputing `estimated_income` when land
    /// size, land unit, or sustainable practices are present. Returns
    /// `None` when no such farmer exists.
    async fn update_farmer(
        &self,
        id: &str,
        update: FarmerUpdate,
    ) -> Result<Option<Farmer>, StoreError>;

    async fn all_farmers(&self) -> Result<Vec<Farmer>, StoreError>;

    async fn find_admin_by_email(&self, email: &str) -> Result<Option<Admin>, StoreError>;

    async fn find_admin_by_id(&self, id: &str) -> Result<Option<Admin>, StoreError>;

    async fn create_admin(&self, email: &str, name: &str) -> Result<Admin, StoreError>;

    /// Hash and persist a password for `(user_id, user_type)`, replacing
    /// any existing record for that principal.
    async fn store_password(
        &self,
        user_id: &str,
        user_type: UserType,
        password: &str,
    ) -> Result<(), StoreError>;

    async fn verify_password(
        &self,
        user_id: &str,
        user_type: UserType,
        password: &str,
    ) -> Result<bool, StoreError>;

    /// Store a fresh OTP for `email`, discarding any prior one first.
    async fn store_otp(
        &self,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> Result<(), StoreError>;

    /// Check `code` against the active OTP for `email`. Consumes the
    /// record on success; mismatch or expiry returns `false` and leaves
    /// the record in place.
    async fn verify_otp(&self, email: &str, code: &str) -> Result<bool, StoreError>;
}

/// Select a storage backend from configuration.
///
/// A configured URI selects MongoDB; a connection failure at startup
/// degrades to the in-memory store with a warning rather than aborting
/// boot. No URI means in-memory from the start.
pub async fn open(config: &DatabaseConfig) -> Arc<dyn CredentialStore> {
    match &config.uri {
        Some(uri) => match MongoStore::connect(uri, &config.name).await {
            Ok(store) => {
                info!(database = %config.name, "MongoDB credential store ready");
                Arc::new(store)
            }
            Err(e) => {
                warn!(
                    "MongoDB unavailable ({}). Falling back to in-memory store; \
                     data will not survive a restart.",
                    e
                );
                Arc::new(MemoryStore::new())
            }
        },
        None => {
            info!("No database URI configured; using in-memory credential store");
            Arc::new(MemoryStore::new())
        }
    }
}
