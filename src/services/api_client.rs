// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP client the front-end tier uses to call the JSON API.
//!
//! Every call forwards the caller's token as the `Authorization` header.
//! Transport and decode failures are logged and come back as `None`.

use std::time::Duration;

use anyhow::Context;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct ApiClient {
    http_client: reqwest::Client,
    /// `{API_URL}/api`
    base_url: String,
}

impl ApiClient {
    pub fn new(api_url: &str) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed building API HTTP client")?;

        Ok(Self {
            http_client,
            base_url: format!("{}/api", api_url.trim_end_matches('/')),
        })
    }

    pub async fn get(&self, token: Option<&str>, path: &str) -> Option<Value> {
        self.send::<()>(Method::GET, token, path, None).await
    }

    pub async fn post<B: Serialize>(
        &self,
        token: Option<&str>,
        path: &str,
        body: &B,
    ) -> Option<Value> {
        self.send(Method::POST, token, path, Some(body)).await
    }

    pub async fn patch<B: Serialize>(
        &self,
        token: Option<&str>,
        path: &str,
        body: &B,
    ) -> Option<Value> {
        self.send(Method::PATCH, token, path, Some(body)).await
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        token: Option<&str>,
        path: &str,
        body: Option<&B>,
    ) -> Option<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http_client
            .request(method.clone(), &url)
            .header(reqwest::header::AUTHORIZATION, token.unwrap_or_default());
        if let Some(body) = body {
            request = request.json(body);
        }

        let result = async {
            request
                .send()
                .await?
                .error_for_status()?
                .json::<Value>()
                .await
        }
        .await;

        match result {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(method = %method, url = %url, error = %e, "API call failed");
                None
            }
        }
    }
}
