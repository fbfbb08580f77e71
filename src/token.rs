use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::LoginEnvironment;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    auth_type: &'static str,
    credentials: Credentials<'a>,
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

impl<'a> LoginRequest<'a> {
    fn user_pass(login: &'a LoginEnvironment) -> Self {
        Self {
            auth_type: "USER_PASS",
            credentials: Credentials {
                username: &login.bot_username,
                password: &login.bot_password,
            },
        }
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    bearer: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TokenOutcome {
    Issued(Option<String>),
    Rejected(StatusCode),
}

impl fmt::Display for TokenOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenOutcome::Issued(Some(token)) => write!(f, "Bearer Token: {token}"),
            TokenOutcome::Issued(None) => write!(f, "Bearer Token: None"),
            TokenOutcome::Rejected(status) => write!(
                f,
                "Failed to get bearer token, status code: {}",
                status.as_u16()
            ),
        }
    }
}

/// Logs in against the bot platform. Only an HTTP 200 counts as success;
/// any other status is reported back rather than raised.
pub async fn fetch_bearer_token(
    client: &reqwest::Client,
    login_url: &str,
    login: &LoginEnvironment,
) -> Result<TokenOutcome> {
    let response = client
        .post(login_url)
        .json(&LoginRequest::user_pass(login))
        .send()
        .await
        .context("Failed to send login request")?;

    let status = response.status();
    if status != StatusCode::OK {
        tracing::warn!(%status, "Login rejected");
        return Ok(TokenOutcome::Rejected(status));
    }

    let body: LoginResponse = response
        .json()
        .await
        .context("Failed to parse login response")?;

    Ok(TokenOutcome::Issued(body.bearer))
}
