//! MongoDB credential store
//!
//! Typed collections per entity. Uniqueness lives in unique indexes
//! created at connect time, and OTP/session cleanup in TTL indexes, so a
//! racing duplicate write surfaces as an E11000 error rather than a
//! second document. Farmer updates go through the shared merge routine in
//! `models`, keeping behavior identical to the in-memory backend.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::{doc, DateTime as BsonDateTime};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};

use crate::auth::password;
use crate::models::{
    Admin, Farmer, FarmerUpdate, OtpPurpose, RegistrationData, UserType,
};
use crate::store::{CredentialStore, StoreError, OTP_TTL_MINUTES};

/// Stored argon2 hash for one principal.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordDoc {
    user_id: String,
    user_type: UserType,
    hash: String,
}

/// One-time code document. `expires` is a BSON date so the TTL index can
/// sweep stale records.
#[derive(Debug, Serialize, Deserialize)]
struct OtpDoc {
    email: String,
    code: String,
    purpose: OtpPurpose,
    expires: BsonDateTime,
}

/// MongoDB-backed credential store.
pub struct MongoStore {
    farmers: Collection<Farmer>,
    admins: Collection<Admin>,
    passwords: Collection<PasswordDoc>,
    otps: Collection<OtpDoc>,
    db: Database,
}

impl MongoStore {
    /// Connect, verify the server responds, and ensure all indexes exist.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| StoreError::Backend(format!("MongoDB connection failed: {e}")))?;
        let db = client.database(db_name);

        // The driver connects lazily; ping now so an unreachable server
        // fails here and the caller can fall back to the memory store.
        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::Backend(format!("MongoDB ping failed: {e}")))?;

        let store = Self {
            farmers: db.collection("farmers"),
            admins: db.collection("admins"),
            passwords: db.collection("passwords"),
            otps: db.collection("otps"),
            db,
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let unique = || IndexOptions::builder().unique(true).build();
        let ttl = || {
            IndexOptions::builder()
                .expire_after(std::time::Duration::ZERO)
                .build()
        };

        self.farmers
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique())
                    .build(),
            )
            .await
            .map_err(backend_err)?;

        self.admins
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique())
                    .build(),
            )
            .await
            .map_err(backend_err)?;

        self.passwords
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "userId": 1, "userType": 1 })
                    .options(unique())
                    .build(),
            )
            .await
            .map_err(backend_err)?;

        self.otps
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "expires": 1 })
                    .options(ttl())
                    .build(),
            )
            .await
            .map_err(backend_err)?;

        // Provisioned for future token revocation; no flow writes here yet.
        let sessions = self
            .db
            .collection::<mongodb::bson::Document>("sessions");
        sessions
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "token": 1 })
                    .options(unique())
                    .build(),
            )
            .await
            .map_err(backend_err)?;
        sessions
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "expiresAt": 1 })
                    .options(ttl())
                    .build(),
            )
            .await
            .map_err(backend_err)?;

        Ok(())
    }
}

fn backend_err(e: mongodb::error::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Map a write error, translating duplicate-key (E11000) rejections into
/// [`StoreError::Duplicate`].
fn write_err(e: mongodb::error::Error) -> StoreError {
    if is_duplicate_key(&e) {
        StoreError::Duplicate
    } else {
        backend_err(e)
    }
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        *e.kind,
        mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(ref we))
            if we.code == 11000
    )
}

#[async_trait]
impl CredentialStore for MongoStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn find_farmer_by_email(&self, email: &str) -> Result<Option<Farmer>, StoreError> {
        self.farmers
            .find_one(doc! { "email": email.to_lowercase() })
            .await
            .map_err(backend_err)
    }

    async fn find_farmer_by_id(&self, id: &str) -> Result<Option<Farmer>, StoreError> {
        self.farmers
            .find_one(doc! { "_id": id })
            .await
            .map_err(backend_err)
    }

    async fn create_farmer(
        &self,
        email: &str,
        registration: Option<RegistrationData>,
    ) -> Result<Farmer, StoreError> {
        let farmer = Farmer::new(email, registration);
        self.farmers.insert_one(&farmer).await.map_err(write_err)?;
        Ok(farmer)
    }

    async fn update_farmer(
        &self,
        id: &str,
        update: FarmerUpdate,
    ) -> Result<Option<Farmer>, StoreError> {
        let Some(mut farmer) = self.find_farmer_by_id(id).await? else {
            return Ok(None);
        };
        update.apply(&mut farmer);
        self.farmers
            .replace_one(doc! { "_id": id }, &farmer)
            .await
            .map_err(backend_err)?;
        Ok(Some(farmer))
    }

    async fn all_farmers(&self) -> Result<Vec<Farmer>, StoreError> {
        let mut cursor = self
            .farmers
            .find(doc! {})
            .sort(doc! { "createdAt": 1 })
            .await
            .map_err(backend_err)?;

        let mut farmers = Vec::new();
        while let Some(farmer) = cursor.try_next().await.map_err(backend_err)? {
            farmers.push(farmer);
        }
        Ok(farmers)
    }

    async fn find_admin_by_email(&self, email: &str) -> Result<Option<Admin>, StoreError> {
        self.admins
            .find_one(doc! { "email": email.to_lowercase() })
            .await
            .map_err(backend_err)
    }

    async fn find_admin_by_id(&self, id: &str) -> Result<Option<Admin>, StoreError> {
        self.admins
            .find_one(doc! { "_id": id })
            .await
            .map_err(backend_err)
    }

    async fn create_admin(&self, email: &str, name: &str) -> Result<Admin, StoreError> {
        let admin = Admin::new(email, name);
        self.admins.insert_one(&admin).await.map_err(write_err)?;
        Ok(admin)
    }

    async fn store_password(
        &self,
        user_id: &str,
        user_type: UserType,
        password: &str,
    ) -> Result<(), StoreError> {
        let hash = password::hash_async(password.to_string()).await?;
        let record = PasswordDoc {
            user_id: user_id.to_string(),
            user_type,
            hash,
        };
        self.passwords
            .replace_one(
                doc! { "userId": user_id, "userType": user_type.as_str() },
                &record,
            )
            .upsert(true)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn verify_password(
        &self,
        user_id: &str,
        user_type: UserType,
        password: &str,
    ) -> Result<bool, StoreError> {
        let record = self
            .passwords
            .find_one(doc! { "userId": user_id, "userType": user_type.as_str() })
            .await
            .map_err(backend_err)?;
        match record {
            Some(record) => Ok(password::verify_async(password.to_string(), record.hash).await?),
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
        let expires = Utc::now() + Duration::minutes(OTP_TTL_MINUTES);
        let record = OtpDoc {
            email: email.clone(),
            code: code.to_string(),
            purpose,
            expires: BsonDateTime::from_millis(expires.timestamp_millis()),
        };

        // One active OTP per email: discard priors before inserting.
        self.otps
            .delete_many(doc! { "email": &email })
            .await
            .map_err(backend_err)?;
        self.otps.insert_one(&record).await.map_err(backend_err)?;
        Ok(())
    }

    async fn verify_otp(&self, email: &str, code: &str) -> Result<bool, StoreError> {
        let email = email.to_lowercase();
        let Some(record) = self
            .otps
            .find_one(doc! { "email": &email })
            .await
            .map_err(backend_err)?
        else {
            return Ok(false);
        };

        // Expiry is checked here as well: the TTL sweep runs only about
        // once a minute, so a stale record can still be present.
        let expired = record.expires.timestamp_millis() <= Utc::now().timestamp_millis();
        if record.code != code || expired {
            return Ok(false);
        }

        self.otps
            .delete_one(doc! { "email": &email, "code": code })
            .await
            .map_err(backend_err)?;
        Ok(true)
    }
}
