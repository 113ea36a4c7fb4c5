// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account service server
//!
//! Registration, login, password reset, email verification and session
//! tracking behind a JSON API and a cookie-driven front end.

use account_service::{
    config::Config,
    db::SqliteDb,
    services::{HttpMailer, LogMailer, Mailer, TokenCodec},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting account service");

    let db = SqliteDb::connect(&config.database_url).await?;
    tracing::info!(url = %config.database_url, "Database ready");

    let tokens = TokenCodec::from_pem_files(
        &config.jwt_private_key_path,
        &config.jwt_public_key_path,
    )?;

    let mailer: Arc<dyn Mailer> = match config.mail.clone() {
        Some(mail) => {
            tracing::info!(api_url = %mail.api_url, "Mail API configured");
            Arc::new(HttpMailer::new(mail)?)
        }
        None => {
            tracing::warn!("MAIL_API_KEY not set; emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    tracing::info!(
        google = config.oauth.google.is_some(),
        facebook = config.oauth.facebook.is_some(),
        "OAuth providers"
    );

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), db, tokens, mailer)?);

    // Build router
    let app = account_service::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("account_service=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
