// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod session;
pub mod user;
pub mod verification_code;

pub use session::{AccessToken, UserSession};
pub use user::{DashboardStats, NewUser, Provider, User, UserListing};
pub use verification_code::{VerificationAction, VerificationCode};

/// A stored enum column held a value this build does not know.
#[derive(Debug, thiserror::Error)]
#[error("unknown variant: {0}")]
pub struct UnknownVariant(pub String);
