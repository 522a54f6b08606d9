// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use paperdesk_app::{ProfileSnapshot, RecognitionRequest, SubmissionReply, VerifyReply};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:23333";

#[derive(Debug, Serialize)]
struct TokenVerifyRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    detail: Option<serde_json::Value>,
}

/// Blocking client for the local paper controller.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("controller.base_url must not be empty");
        }
        let parsed = Url::parse(&base_url)
            .with_context(|| format!("controller.base_url {base_url:?} is not a valid URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "controller.base_url {base_url:?} must use http or https, got {}",
                parsed.scheme()
            );
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Checks that the controller answers on its root route.
    pub fn ping(&self) -> Result<()> {
        let response = self
            .http
            .get(format!("{}/", self.base_url))
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(())
    }

    /// Sends the profile snapshot to `/llm_verify`.
    ///
    /// The body is read as `{code, message}` whatever the HTTP status, so a
    /// validation failure from the controller shows up as an unknown response
    /// rather than a transport error.
    pub fn verify_profile(&self, snapshot: &ProfileSnapshot) -> VerifyReply {
        let result = self
            .http
            .post(format!("{}/llm_verify", self.base_url))
            .json(&snapshot.to_json())
            .send()
            .and_then(|response| response.text());
        match result {
            Ok(body) => VerifyReply::from_json_body(&body),
            Err(error) => {
                tracing::warn!(%error, "profile verification request failed");
                VerifyReply::Transport(error.to_string())
            }
        }
    }

    pub fn verify_token(&self, token: &str) -> VerifyReply {
        let result = self
            .http
            .post(format!("{}/mineru_verify", self.base_url))
            .json(&TokenVerifyRequest { token })
            .send()
            .and_then(|response| response.text());
        match result {
            Ok(body) => VerifyReply::from_json_body(&body),
            Err(error) => {
                tracing::warn!(%error, "token verification request failed");
                VerifyReply::Transport(error.to_string())
            }
        }
    }

    pub fn start_recognition(&self, request: &RecognitionRequest) -> SubmissionReply {
        let response = match self
            .http
            .post(format!("{}/start_recognition", self.base_url))
            .json(request)
            .send()
        {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(%error, "recognition request failed");
                return SubmissionReply::Network(error.to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            let reason = status
                .canonical_reason()
                .map_or_else(|| status.as_u16().to_string(), str::to_owned);
            tracing::warn!(status = status.as_u16(), "controller refused recognition");
            return SubmissionReply::ServerError(reason);
        }

        match response.text() {
            Ok(body) => SubmissionReply::from_success_body(&body),
            Err(error) => SubmissionReply::Network(error.to_string()),
        }
    }
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- start the paper controller or set controller.base_url ({})",
        base_url,
        error
    )
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(detail) = parsed.detail
    {
        let detail = match detail {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        };
        if !detail.is_empty() {
            return anyhow!("server error ({}): {}", status.as_u16(), detail);
        }
    }

    if body.len() < 100 && !body.contains('{') && !body.trim().is_empty() {
        return anyhow!("server error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("server returned {}", status.as_u16())
}
