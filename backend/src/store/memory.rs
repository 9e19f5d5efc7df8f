//! Process-local credential store
//!
//! Backs the service when no database URI is configured, or when MongoDB
//! is unreachable at startup. All four entity maps sit behind a single
//! `RwLock`, so a create holds the write lock across its existence check
//! and insert. Data lives for the lifetime of the process only.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;

use crate::auth::password;
use crate::models::{
    Admin, Farmer, FarmerUpdate, OtpPurpose, OtpRecord, RegistrationData, UserType,
};
use crate::store::{CredentialStore, StoreError, OTP_TTL_MINUTES};

#[derive(Default)]
struct Inner {
    /// Farmers keyed by id; email lookups scan values.
    farmers: HashMap<String, Farmer>,
    admins: HashMap<String, Admin>,
    /// Argon2 hashes keyed by principal.
    passwords: HashMap<(String, UserType), String>,
    /// At most one record per email.
    otps: HashMap<String, OtpRecord>,
}

/// In-memory credential store.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Code of the active OTP for `email`, if any.
    ///
    /// Test support: lets harnesses complete OTP flows without an email
    /// channel. Does not consume the record.
    pub async fn active_otp(&self, email: &str) -> Option<String> {
        self.inner
            .read()
            .await
            .otps
            .get(&email.to_lowercase())
            .map(|record| record.code.clone())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_farmer_by_email(&self, email: &str) -> Result<Option<Farmer>, StoreError> {
        let email = email.to_lowercase();
        let inner = self.inner.read().await;
        Ok(inner.farmers.values().find(|f| f.email == email).cloned())
    }

    async fn find_farmer_by_id(&self, id: &str) -> Result<Option<Farmer>, StoreError> {
        Ok(self.inner.read().await.farmers.get(id).cloned())
    }

    async fn create_farmer(
        &self,
        email: &str,
        registration: Option<RegistrationData>,
    ) -> Result<Farmer, StoreError> {
        let normalized = email.to_lowercase();
        let mut inner = self.inner.write().await;
        if inner.farmers.values().any(|f| f.email == normalized) {
            return Err(StoreError::Duplicate);
        }
        let farmer = Farmer::new(email, registration);
        inner.farmers.insert(farmer.id.clone(), farmer.clone());
        Ok(farmer)
    }

    async fn update_farmer(
        &self,
        id: &str,
        update: FarmerUpdate,
    ) -> Result<Option<Farmer>, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(farmer) = inner.farmers.get_mut(id) else {
            return Ok(None);
        };
        update.apply(farmer);
        Ok(Some(farmer.clone()))
    }

    async fn all_farmers(&self) -> Result<Vec<Farmer>, StoreError> {
        let inner = self.inner.read().await;
        let mut farmers: Vec<Farmer> = inner.farmers.values().cloned().collect();
        farmers.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(farmers)
    }

    async fn find_admin_by_email(&self, email: &str) -> Result<Option<Admin>, StoreError> {
        let email = email.to_lowercase();
        let inner = self.inner.read().await;
        Ok(inner.admins.values().find(|a| a.email == email).cloned())
    }

    async fn find_admin_by_id(&self, id: &str) -> Result<Option<Admin>, StoreError> {
        Ok(self.inner.read().await.admins.get(id).cloned())
    }

    async fn create_admin(&self, email: &str, name: &str) -> Result<Admin, StoreError> {
        let normalized = email.to_lowercase();
        let mut inner = self.inner.write().await;
        if inner.admins.values().any(|a| a.email == normalized) {
            return Err(StoreError::Duplicate);
        }
        let admin = Admin::new(email, name);
        inner.admins.insert(admin.id.clone(), admin.clone());
        Ok(admin)
    }

    async fn store_password(
        &self,
        user_id: &str,
        user_type: UserType,
        password: &str,
    ) -> Result<(), StoreError> {
        // Hash outside the lock; argon2 runs on the blocking pool.
        let hash = password::hash_async(password.to_string()).await?;
        let mut inner = self.inner.write().await;
        inner
            .passwords
            .insert((user_id.to_string(), user_type), hash);
        Ok(())
    }

    async fn verify_password(
        &self,
        user_id: &str,
        user_type: UserType,
        password: &str,
    ) -> Result<bool, StoreError> {
        let hash = {
            let inner = self.inner.read().await;
            inner
                .passwords
                .get(&(user_id.to_string(), user_type))
                .cloned()
        };
        match hash {
            Some(hash) => Ok(password::verify_async(password.to_string(), hash).await?),
            None => Ok(false),
        }
    }

    async fn store_otp(
        &self,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> Result<(), StoreError> {
        let email = email.to_lowercase();
        let record = OtpRecord {
            email: email.clone(),
            code: code.to_string(),
            purpose,
            expires: Utc::now() + Duration::minutes(OTP_TTL_MINUTES),
        };
        let mut inner = self.inner.write().await;
        // Insert replaces any prior record for the email.
        inner.otps.insert(email, record);
        Ok(())
    }

    async fn verify_otp(&self, email: &str, code: &str) -> Result<bool, StoreError> {
        let email = email.to_lowercase();
        let mut inner = self.inner.write().await;
        let Some(record) = inner.otps.get(&email) else {
            return Ok(false);
        };
        if record.code != code || record.expires <= Utc::now() {
            return Ok(false);
        }
        inner.otps.remove(&email);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LandUnit;

    #[tokio::test]
    async fn test_otp_single_use() {
        let store = MemoryStore::new();
        store
            .store_otp("a@example.com", "123456", OtpPurpose::Login)
            .await
            .unwrap();

        assert!(store.verify_otp("a@example.com", "123456").await.unwrap());
        assert!(!store.verify_otp("a@example.com", "123456").await.unwrap());
    }

    #[tokio::test]
    async fn test_otp_mismatch_keeps_record() {
        let store = MemoryStore::new();
        store
            .store_otp("a@example.com", "123456", OtpPurpose::Login)
            .await
            .unwrap();

        assert!(!store.verify_otp("a@example.com", "654321").await.unwrap());
        // Wrong guesses do not consume the code.
        assert!(store.verify_otp("a@example.com", "123456").await.unwrap());
    }

    #[tokio::test]
    async fn test_otp_overwrite_invalidates_prior() {
        let store = MemoryStore::new();
        store
            .store_otp("a@example.com", "111111", OtpPurpose::Registration)
            .await
            .unwrap();
        store
            .store_otp("a@example.com", "222222", OtpPurpose::Login)
            .await
            .unwrap();

        assert!(!store.verify_otp("a@example.com", "111111").await.unwrap());
        assert!(store.verify_otp("a@example.com", "222222").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_otp_rejected() {
        let store = MemoryStore::new();
        store
            .store_otp("a@example.com", "123456", OtpPurpose::Login)
            .await
            .unwrap();

        // Age the record past the 5-minute window.
        store
            .inner
            .write()
            .await
            .otps
            .get_mut("a@example.com")
            .unwrap()
            .expires = Utc::now() - Duration::minutes(1);

        assert!(!store.verify_otp("a@example.com", "123456").await.unwrap());
    }

    #[tokio::test]
    async fn test_password_round_trip() {
        let store = MemoryStore::new();
        store
            .store_password("farmer-1", UserType::Farmer, "secret123")
            .await
            .unwrap();

        assert!(store
            .verify_password("farmer-1", UserType::Farmer, "secret123")
            .await
            .unwrap());
        assert!(!store
            .verify_password("farmer-1", UserType::Farmer, "wrong")
            .await
            .unwrap());
        // Same id under a different principal type has no record.
        assert!(!store
            .verify_password("farmer-1", UserType::Admin, "secret123")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_store_password_replaces_prior() {
        let store = MemoryStore::new();
        store
            .store_password("farmer-1", UserType::Farmer, "secret123")
            .await
            .unwrap();
        store
            .store_password("farmer-1", UserType::Farmer, "rotated456")
            .await
            .unwrap();

        assert!(!store
            .verify_password("farmer-1", UserType::Farmer, "secret123")
            .await
            .unwrap());
        assert!(store
            .verify_password("farmer-1", UserType::Farmer, "rotated456")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_farmer_email_rejected() {
        let store = MemoryStore::new();
        store.create_farmer("a@example.com", None).await.unwrap();

        let err = store
            .create_farmer("A@Example.COM", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));
    }

    #[tokio::test]
    async fn test_update_recomputes_income() {
        let store = MemoryStore::new();
        let farmer = store.create_farmer("a@example.com", None).await.unwrap();
        assert_eq!(farmer.estimated_income, 0);

        let update = FarmerUpdate {
            land_size: Some(5.0),
            land_unit: Some(LandUnit::Hectares),
            sustainable_practices: Some(vec![]),
            ..Default::default()
        };
        let updated = store
            .update_farmer(&farmer.id, update)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.estimated_income, 5000);
    }

    #[tokio::test]
    async fn test_update_unknown_farmer_returns_none() {
        let store = MemoryStore::new();
        let result = store
            .update_farmer("missing", FarmerUpdate::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_all_farmers_in_creation_order() {
        let store = MemoryStore::new();
        store.create_farmer("first@example.com", None).await.unwrap();
        store.create_farmer("second@example.com", None).await.unwrap();

        let all = store.all_farmers().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].email, "first@example.com");
        assert_eq!(all[1].email, "second@example.com");
    }

    #[tokio::test]
    async fn test_admin_lookup_by_email_and_id() {
        let store = MemoryStore::new();
        let admin = store.create_admin("ops@example.com", "Ops").await.unwrap();

        let by_email = store
            .find_admin_by_email("Ops@Example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, admin.id);
        let by_id = store.find_admin_by_id(&admin.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "ops@example.com");
    }
}
