//! Credential flow orchestration
//!
//! `AuthService` is the only component that writes to the credential
//! store, and the only consumer of the token service and notifier. It is
//! stateless: every operation fetches what it needs per call.
//!
//! OTP login doubles as registration. Verifying a code for an email with
//! no farmer record creates one, so callers get a [`LoginOutcome`] that
//! says which of the two happened.

use std::sync::Arc;

use rand::Rng;
use serde::Serialize;
use tracing::info;
use validator::ValidateEmail;

use crate::auth::TokenService;
use crate::error::ApiError;
use crate::models::{Admin, Farmer, FarmerUpdate, OtpPurpose, RegistrationData, UserType};
use crate::notify::Notifier;
use crate::store::{CredentialStore, StoreError};

/// Minimum accepted password length.
const MIN_PASSWORD_LEN: usize = 6;

/// Shared failure message for password logins. Unknown email and wrong
/// password answer identically so the endpoints cannot be used to probe
/// which addresses are registered.
const INVALID_CREDENTIALS: &str = "Invalid credentials";

const INVALID_TOKEN: &str = "Invalid or expired token";

/// Result of an OTP or social login: whether the farmer record existed
/// before the call.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Existing(Farmer),
    Created(Farmer),
}

impl LoginOutcome {
    pub fn farmer(&self) -> &Farmer {
        match self {
            Self::Existing(farmer) | Self::Created(farmer) => farmer,
        }
    }

    pub fn into_farmer(self) -> Farmer {
        match self {
            Self::Existing(farmer) | Self::Created(farmer) => farmer,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// A session resolved to its full principal record.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Principal {
    Farmer(Farmer),
    Admin(Admin),
}

/// Result of a social-login callback.
#[derive(Debug)]
pub enum SocialOutcome {
    /// Provider supplied a verified email; the farmer is signed in.
    Authenticated {
        outcome: LoginOutcome,
        token: String,
    },
    /// No verified email yet; the client should visit the provider's
    /// login page.
    Redirect { redirect_url: String },
}

/// Orchestrates OTP, password, and session flows over an injected store.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    tokens: TokenService,
    notifier: Arc<Notifier>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        tokens: TokenService,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            store,
            tokens,
            notifier,
        }
    }

    /// Issue a login OTP for `email` and dispatch it.
    ///
    /// Delivery is best-effort: the notifier logs the code when it cannot
    /// send, so a degraded email channel never fails the request.
    pub async fn request_login_otp(&self, email: &str) -> Result<(), ApiError> {
        if !email.validate_email() {
            return Err(ApiError::Validation("A valid email is required".to_string()));
        }

        let code = generate_otp();
        self.store
            .store_otp(email, &code, OtpPurpose::Login)
            .await?;
        self.notifier.send_otp(email, &code).await;
        Ok(())
    }

    /// Verify an OTP and sign the farmer in, creating the account on
    /// first contact. Returns the outcome and a bearer token.
    pub async fn complete_otp_login(
        &self,
        email: &str,
        otp: &str,
        registration: Option<RegistrationData>,
    ) -> Result<(LoginOutcome, String), ApiError> {
        if !self.store.verify_otp(email, otp).await? {
            return Err(ApiError::Validation("Invalid or expired OTP".to_string()));
        }

        let outcome = self.load_or_create_farmer(email, registration).await?;
        let token = self.tokens.generate(&outcome.farmer().id, UserType::Farmer)?;
        Ok((outcome, token))
    }

    /// Register a farmer with an email and password.
    pub async fn register_farmer(
        &self,
        email: &str,
        password: &str,
        name: Option<String>,
        phone: Option<String>,
    ) -> Result<(Farmer, String), ApiError> {
        if !email.validate_email() {
            return Err(ApiError::Validation("A valid email is required".to_string()));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(ApiError::Validation(
                "Password must be at least 6 characters".to_string(),
            ));
        }
        if self.store.find_farmer_by_email(email).await?.is_some() {
            return Err(ApiError::Validation("Email already registered".to_string()));
        }

        let registration = RegistrationData {
            name,
            phone,
            ..Default::default()
        };
        let farmer = match self.store.create_farmer(email, Some(registration)).await {
            Ok(farmer) => farmer,
            // The store's unique constraint is the real guard against two
            // racing registrations passing the existence check above.
            Err(StoreError::Duplicate) => {
                return Err(ApiError::Validation("Email already registered".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        self.store
            .store_password(&farmer.id, UserType::Farmer, password)
            .await?;
        self.spawn_welcome(&farmer);

        let token = self.tokens.generate(&farmer.id, UserType::Farmer)?;
        Ok((farmer, token))
    }

    /// Password login for a farmer account.
    pub async fn login_farmer(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(Farmer, String), ApiError> {
        let farmer = self
            .store
            .find_farmer_by_email(email)
            .await?
            .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        let valid = self
            .store
            .verify_password(&farmer.id, UserType::Farmer, password)
            .await?;
        if !valid {
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        let token = self.tokens.generate(&farmer.id, UserType::Farmer)?;
        Ok((farmer, token))
    }

    /// Password login for an operator account.
    pub async fn login_admin(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(Admin, String), ApiError> {
        let admin = self
            .store
            .find_admin_by_email(email)
            .await?
            .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        let valid = self
            .store
            .verify_password(&admin.id, UserType::Admin, password)
            .await?;
        if !valid {
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        let token = self.tokens.generate(&admin.id, UserType::Admin)?;
        Ok((admin, token))
    }

    /// Resolve a bearer token to its full principal record. Fails when
    /// the token is invalid, expired, or the principal no longer exists.
    pub async fn verify_session(&self, token: &str) -> Result<Principal, ApiError> {
        let claims = self
            .tokens
            .verify(token)
            .ok_or_else(|| ApiError::Unauthorized(INVALID_TOKEN.to_string()))?;

        let principal = match claims.user_type {
            UserType::Farmer => self
                .store
                .find_farmer_by_id(&claims.user_id)
                .await?
                .map(Principal::Farmer),
            UserType::Admin => self
                .store
                .find_admin_by_id(&claims.user_id)
                .await?
                .map(Principal::Admin),
        };
        principal.ok_or_else(|| ApiError::Unauthorized(INVALID_TOKEN.to_string()))
    }

    /// Apply a partial profile update for the farmer the token belongs to.
    pub async fn update_farmer_profile(
        &self,
        token: &str,
        update: FarmerUpdate,
    ) -> Result<Farmer, ApiError> {
        let claims = self
            .tokens
            .verify(token)
            .ok_or_else(|| ApiError::Unauthorized(INVALID_TOKEN.to_string()))?;
        if claims.user_type != UserType::Farmer {
            return Err(ApiError::Unauthorized("Farmer account required".to_string()));
        }

        self.store
            .update_farmer(&claims.user_id, update)
            .await?
            .ok_or_else(|| ApiError::NotFound("Farmer not found".to_string()))
    }

    /// Handle a social-login callback.
    ///
    /// With a provider-verified email this behaves like the OTP path's
    /// load-or-create; without one it answers with the provider's login
    /// page on the web client.
    pub async fn social_login(
        &self,
        provider: &str,
        email: Option<String>,
        name: Option<String>,
    ) -> Result<SocialOutcome, ApiError> {
        let Some(email) = email else {
            let redirect_url = format!("{}/login/{}", self.notifier.client_base_url(), provider);
            return Ok(SocialOutcome::Redirect { redirect_url });
        };
        if !email.validate_email() {
            return Err(ApiError::Validation("A valid email is required".to_string()));
        }

        let registration = name.map(|name| RegistrationData {
            name: Some(name),
            ..Default::default()
        });
        let outcome = self.load_or_create_farmer(&email, registration).await?;
        let token = self.tokens.generate(&outcome.farmer().id, UserType::Farmer)?;
        Ok(SocialOutcome::Authenticated { outcome, token })
    }

    /// Create the default operator account when absent. Runs at startup;
    /// a no-op on every boot after the first.
    pub async fn bootstrap_admin(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<(), ApiError> {
        if self.store.find_admin_by_email(email).await?.is_some() {
            return Ok(());
        }

        let admin = match self.store.create_admin(email, name).await {
            Ok(admin) => admin,
            // Another instance bootstrapped first.
            Err(StoreError::Duplicate) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        self.store
            .store_password(&admin.id, UserType::Admin, password)
            .await?;
        info!(email = %admin.email, "default admin account created");
        Ok(())
    }

    async fn load_or_create_farmer(
        &self,
        email: &str,
        registration: Option<RegistrationData>,
    ) -> Result<LoginOutcome, ApiError> {
        if let Some(farmer) = self.store.find_farmer_by_email(email).await? {
            return Ok(LoginOutcome::Existing(farmer));
        }

        match self.store.create_farmer(email, registration).await {
            Ok(farmer) => {
                self.spawn_welcome(&farmer);
                Ok(LoginOutcome::Created(farmer))
            }
            // Lost a creation race; whoever won owns the record now.
            Err(StoreError::Duplicate) => {
                let farmer = self
                    .store
                    .find_farmer_by_email(email)
                    .await?
                    .ok_or_else(|| ApiError::NotFound("Farmer not found".to_string()))?;
                Ok(LoginOutcome::Existing(farmer))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fire-and-forget welcome mail on its own task, so a slow or failing
    /// provider cannot delay or fail the signup that triggered it. The
    /// notifier logs delivery failures itself.
    fn spawn_welcome(&self, farmer: &Farmer) {
        let notifier = Arc::clone(&self.notifier);
        let email = farmer.email.clone();
        let name = farmer.name.clone();
        let income = farmer.estimated_income;
        tokio::spawn(async move {
            notifier.send_welcome(&email, &name, income).await;
        });
    }
}

/// Generate a 6-digit numeric one-time code.
fn generate_otp() -> String {
    let mut rng = rand::thread_rng();
    (0..6)
        .map(|_| char::from(b'0' + rng.gen_range(0..10)))
        .collect()
}
