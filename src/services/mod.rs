// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Business logic services.

pub mod access_token;
pub mod api_client;
pub mod identity;
pub mod mailer;
pub mod oauth;
pub mod session;
pub mod token;
pub mod verification;

pub use access_token::AccessTokenLedger;
pub use api_client::ApiClient;
pub use identity::IdentityService;
pub use mailer::{HttpMailer, LogMailer, Mailer};
pub use oauth::{OAuthClient, OAuthProvider};
pub use session::SessionLedger;
pub use token::{TokenCodec, TokenError, TokenPayload};
pub use verification::VerificationCodeStore;
