//! Authentication endpoints
//!
//! Thin translation layer between HTTP bodies and `AuthService` calls.
//! Body fields arrive as options and are checked explicitly, so missing
//! input surfaces as a 400 with a readable message rather than a
//! framework rejection.

use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::Bearer;
use crate::error::{ApiError, ApiResult};
use crate::models::{Admin, Farmer, FarmerUpdate, RegistrationData};
use crate::services::{Principal, SocialOutcome};
use crate::state::AppState;

/// Create auth routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/send-otp", post(send_otp))
        .route("/verify-otp", post(verify_otp))
        .route("/admin-login", post(admin_login))
        .route("/farmer-register", post(farmer_register))
        .route("/farmer-login", post(farmer_login))
        .route("/verify", get(verify))
        .route("/update-profile", put(update_profile))
        .route("/logout", post(logout))
        .route("/social/:provider", post(social_login))
}

fn require(field: Option<String>, message: &str) -> Result<String, ApiError> {
    match field {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ApiError::Validation(message.to_string())),
    }
}

#[derive(Serialize)]
struct MessageResponse {
    success: bool,
    message: String,
}

#[derive(Debug, Deserialize)]
struct SendOtpRequest {
    email: Option<String>,
}

/// Request a login OTP
///
/// POST /api/auth/send-otp
async fn send_otp(
    State(state): State<AppState>,
    Json(req): Json<SendOtpRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let email = require(req.email, "Email is required")?;
    state.auth.request_login_otp(&email).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "OTP sent to your email".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyOtpRequest {
    email: Option<String>,
    otp: Option<String>,
    registration_data: Option<RegistrationData>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FarmerAuthResponse {
    success: bool,
    user: Farmer,
    token: String,
    new_user: bool,
}

/// Verify an OTP and sign in, creating the account on first contact
///
/// POST /api/auth/verify-otp
async fn verify_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpRequest>,
) -> ApiResult<Json<FarmerAuthResponse>> {
    let email = require(req.email, "Email is required")?;
    let otp = require(req.otp, "OTP is required")?;

    let (outcome, token) = state
        .auth
        .complete_otp_login(&email, &otp, req.registration_data)
        .await?;
    let new_user = outcome.is_new();
    Ok(Json(FarmerAuthResponse {
        success: true,
        user: outcome.into_farmer(),
        token,
        new_user,
    }))
}

#[derive(Debug, Deserialize)]
struct CredentialsRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
struct AdminAuthResponse {
    success: bool,
    user: Admin,
    token: String,
}

/// Operator login
///
/// POST /api/auth/admin-login
async fn admin_login(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> ApiResult<Json<AdminAuthResponse>> {
    let email = require(req.email, "Email is required")?;
    let password = require(req.password, "Password is required")?;

    let (admin, token) = state.auth.login_admin(&email, &password).await?;
    Ok(Json(AdminAuthResponse {
        success: true,
        user: admin,
        token,
    }))
}

#[derive(Debug, Deserialize)]
struct FarmerRegisterRequest {
    email: Option<String>,
    password: Option<String>,
    name: Option<String>,
    phone: Option<String>,
}

#[derive(Serialize)]
struct FarmerSessionResponse {
    success: bool,
    user: Farmer,
    token: String,
}

/// Register a farmer with a password
///
/// POST /api/auth/farmer-register
async fn farmer_register(
    State(state): State<AppState>,
    Json(req): Json<FarmerRegisterRequest>,
) -> ApiResult<Json<FarmerSessionResponse>> {
    let email = require(req.email, "Email is required")?;
    let password = require(req.password, "Password is required")?;

    let (farmer, token) = state
        .auth
        .register_farmer(&email, &password, req.name, req.phone)
        .await?;
    Ok(Json(FarmerSessionResponse {
        success: true,
        user: farmer,
        token,
    }))
}

/// Password login for a farmer
///
/// POST /api/auth/farmer-login
async fn farmer_login(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> ApiResult<Json<FarmerSessionResponse>> {
    let email = require(req.email, "Email is required")?;
    let password = require(req.password, "Password is required")?;

    let (farmer, token) = state.auth.login_farmer(&email, &password).await?;
    Ok(Json(FarmerSessionResponse {
        success: true,
        user: farmer,
        token,
    }))
}

#[derive(Serialize)]
struct SessionResponse {
    success: bool,
    user: Principal,
}

/// Resolve the current session to its principal record
///
/// GET /api/auth/verify
async fn verify(
    State(state): State<AppState>,
    Bearer(token): Bearer,
) -> ApiResult<Json<SessionResponse>> {
    let user = state.auth.verify_session(&token).await?;
    Ok(Json(SessionResponse {
        success: true,
        user,
    }))
}

#[derive(Serialize)]
struct FarmerResponse {
    success: bool,
    user: Farmer,
}

/// Partial profile update for the authenticated farmer
///
/// PUT /api/auth/update-profile
async fn update_profile(
    State(state): State<AppState>,
    Bearer(token): Bearer,
    Json(update): Json<FarmerUpdate>,
) -> ApiResult<Json<FarmerResponse>> {
    let farmer = state.auth.update_farmer_profile(&token, update).await?;
    Ok(Json(FarmerResponse {
        success: true,
        user: farmer,
    }))
}

/// Tokens are stateless, so logout is a client-side discard; the
/// endpoint exists for the dashboard to call.
///
/// POST /api/auth/logout
async fn logout() -> Json<MessageResponse> {
    Json(MessageResponse {
        success: true,
        message: "Logged out".to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct SocialLoginRequest {
    email: Option<String>,
    name: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum SocialLoginResponse {
    #[serde(rename_all = "camelCase")]
    Authenticated {
        success: bool,
        user: Farmer,
        token: String,
        new_user: bool,
    },
    #[serde(rename_all = "camelCase")]
    Redirect {
        success: bool,
        redirect_url: String,
    },
}

/// Social-login callback glue
///
/// POST /api/auth/social/:provider
async fn social_login(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(req): Json<SocialLoginRequest>,
) -> ApiResult<Json<SocialLoginResponse>> {
    match state.auth.social_login(&provider, req.email, req.name).await? {
        SocialOutcome::Authenticated { outcome, token } => {
            let new_user = outcome.is_new();
            Ok(Json(SocialLoginResponse::Authenticated {
                success: true,
                user: outcome.into_farmer(),
                token,
                new_user,
            }))
        }
        SocialOutcome::Redirect { redirect_url } => Ok(Json(SocialLoginResponse::Redirect {
            success: true,
            redirect_url,
        })),
    }
}
