//! Business logic services
//!
//! The auth service owns every credential flow; routes stay thin.

pub mod auth;

pub use auth::{AuthService, LoginOutcome, Principal, SocialOutcome};
