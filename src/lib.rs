// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account service: registration, login (password and OAuth), password
//! reset, email verification and session tracking.
//!
//! The crate serves two tiers from one router: a JSON API under `/api`
//! guarded by bearer tokens, and a cookie-driven front end that calls the
//! API over HTTP.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod validation;

use std::sync::Arc;

use config::Config;
use db::SqliteDb;
use services::{
    ApiClient, IdentityService, Mailer, OAuthClient, TokenCodec, VerificationCodeStore,
};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub identity: IdentityService,
    pub api_client: ApiClient,
    pub oauth: OAuthClient,
}

impl AppState {
    /// Wire services together. The store and mailer are owned by the caller.
    pub fn new(
        config: Config,
        db: SqliteDb,
        tokens: TokenCodec,
        mailer: Arc<dyn Mailer>,
    ) -> anyhow::Result<Self> {
        let codes = VerificationCodeStore::new(db.clone(), mailer, config.frontend_url.clone());
        let identity = IdentityService::new(db, tokens, codes);
        let api_client = ApiClient::new(&config.api_url)?;
        let oauth = OAuthClient::new(config.oauth.clone(), &config.frontend_url)?;

        Ok(Self {
            config,
            identity,
            api_client,
            oauth,
        })
    }
}
