//! Requester for the Telegram Bot API.
//!
//! Every response comes wrapped in the same envelope: `{ok, result}` on
//! success, `{ok, error_code, description, parameters}` on failure, where
//! `parameters` may carry the server's `retry_after` and
//! `migrate_to_chat_id` hints. The requester decodes the envelope and hands
//! the caller either the typed payload or an [`ApiError`]; retry policy
//! lives with the callers (the fetcher counts failures, outbound actions are
//! single-shot best-effort).

use crate::update::User;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

const API_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not parse API response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("API response was ok but carried no result")]
    MissingResult,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// An `ok: false` response from the API.
#[derive(Debug, Clone, Error)]
#[error("telegram API error: {error_code}: {description:?}")]
pub struct ApiError {
    pub error_code: i64,
    pub description: String,
    pub parameters: ApiErrorParameters,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorParameters {
    #[serde(default)]
    pub retry_after: Option<u64>,
    #[serde(default)]
    pub migrate_to_chat_id: Option<i64>,
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        self.error_code == 401
    }
}

/// HTTP client for one bot token. Cheap to clone and safe to share between
/// tasks; reqwest pools the underlying connections.
#[derive(Clone)]
pub struct ApiRequester {
    http: reqwest::Client,
    base_url: String,
}

impl ApiRequester {
    /// `host` is the API server without a scheme, e.g. `api.telegram.org`.
    pub fn new(host: &str, token: &str) -> Result<Self, RequestError> {
        let http = reqwest::Client::builder()
            .timeout(API_REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: format!("https://{host}/bot{token}"),
        })
    }

    /// POSTs a JSON body to `endpoint` and decodes the envelope.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<T, RequestError> {
        let response = self
            .http
            .post(self.endpoint_url(endpoint))
            .json(body)
            .send()
            .await?;

        decode(response).await
    }

    /// GETs `endpoint` with URL-encoded parameters and decodes the envelope.
    pub async fn request_form<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, RequestError> {
        let response = self
            .http
            .get(self.endpoint_url(endpoint))
            .query(params)
            .send()
            .await?;

        decode(response).await
    }

    /// The user record that represents this bot.
    pub async fn get_me(&self) -> Result<User, RequestError> {
        self.request_form("getMe", &[]).await
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RequestError> {
    let body = response.text().await?;
    let envelope: ApiEnvelope<T> = serde_json::from_str(&body)?;

    envelope.into_result()
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct ApiEnvelope<T> {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    description: String,
    #[serde(default)]
    parameters: ApiErrorParameters,
}

impl<T> ApiEnvelope<T> {
    fn into_result(self) -> Result<T, RequestError> {
        if !self.ok {
            return Err(ApiError {
                error_code: self.error_code,
                description: self.description,
                parameters: self.parameters,
            }
            .into());
        }

        self.result.ok_or(RequestError::MissingResult)
    }
}
