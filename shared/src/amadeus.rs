//! Amadeus travel API client.
//!
//! Covers the part of the API the Lambdas use: OAuth2 client-credentials
//! token management and the flight offers search resource.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::Credentials;
use crate::models::{FlightOffersQuery, FlightOffersResponse};
use crate::Error;

const PRODUCTION_URL: &str = "https://api.amadeus.com";
const TEST_URL: &str = "https://test.api.amadeus.com";

const TOKEN_PATH: &str = "/v1/security/oauth2/token";
const FLIGHT_OFFERS_PATH: &str = "/v2/shopping/flight-offers";

/// Tokens this close to expiry are refreshed before use.
const TOKEN_BUFFER_SECS: i64 = 10;

/// Which Amadeus environment to talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hostname {
    Production,
    Test,
    /// Explicit base URL, e.g. a local stub.
    Custom(String),
}

impl Hostname {
    pub fn base_url(&self) -> &str {
        match self {
            Hostname::Production => PRODUCTION_URL,
            Hostname::Test => TEST_URL,
            Hostname::Custom(url) => url.trim_end_matches('/'),
        }
    }
}

impl FromStr for Hostname {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "production" => Ok(Hostname::Production),
            "test" => Ok(Hostname::Test),
            url if url.starts_with("http://") || url.starts_with("https://") => {
                Ok(Hostname::Custom(url.to_string()))
            }
            other => Err(Error::Config(format!(
                "Unknown Amadeus hostname '{}': expected 'production', 'test' or a URL",
                other
            ))),
        }
    }
}

/// Category of an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No response was received.
    Network,
    /// A response arrived but its body could not be decoded.
    Parser,
    /// 5xx
    Server,
    /// 401
    Authentication,
    /// 404
    NotFound,
    /// Any other 4xx
    Client,
    Unknown,
}

impl ErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ErrorKind::Authentication,
            404 => ErrorKind::NotFound,
            400..=499 => ErrorKind::Client,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Unknown,
        }
    }

    /// Stable error code reported to callers.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Network => "NetworkError",
            ErrorKind::Parser => "ParserError",
            ErrorKind::Server => "ServerError",
            ErrorKind::Authentication => "AuthenticationError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Client => "ClientError",
            ErrorKind::Unknown => "UnknownError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Failure talking to the Amadeus API.
#[derive(Error, Debug, Clone)]
#[error("{kind}: {message}")]
pub struct AmadeusError {
    pub kind: ErrorKind,
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    pub message: String,
    /// Human readable explanation extracted from the response body.
    pub description: Option<String>,
    /// Raw response body.
    pub body: Option<String>,
}

impl AmadeusError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            description: None,
            body: None,
        }
    }

    /// Build an error from a non-success response.
    pub fn from_status(status: u16, body: Option<String>) -> Self {
        let description = body.as_deref().and_then(describe);
        Self {
            kind: ErrorKind::from_status(status),
            status: Some(status),
            message: format!("Amadeus API responded with status {}", status),
            description,
            body,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

/// Pull a readable description out of an Amadeus error body.
///
/// API errors carry an `errors` array of `{ title, detail }` objects, while
/// the token endpoint uses OAuth2's `error_description`.
fn describe(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;

    if let Some(errors) = value.get("errors").and_then(Value::as_array) {
        let parts: Vec<String> = errors
            .iter()
            .filter_map(|e| {
                let title = e.get("title").and_then(Value::as_str);
                let detail = e.get("detail").and_then(Value::as_str);
                match (title, detail) {
                    (Some(t), Some(d)) => Some(format!("{}: {}", t, d)),
                    (Some(t), None) => Some(t.to_string()),
                    (None, Some(d)) => Some(d.to_string()),
                    (None, None) => None,
                }
            })
            .collect();
        if !parts.is_empty() {
            return Some(parts.join("; "));
        }
    }

    value
        .get("error_description")
        .and_then(Value::as_str)
        .map(String::from)
}

/// The flight offers search capability.
#[async_trait]
pub trait FlightOffersSearch: Send + Sync {
    async fn flight_offers_search(
        &self,
        query: &FlightOffersQuery,
    ) -> Result<FlightOffersResponse, AmadeusError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + TimeDelta::seconds(TOKEN_BUFFER_SECS) < self.expires_at
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

/// Client for the Amadeus self-service API.
pub struct AmadeusClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    token: RwLock<Option<AccessToken>>,
}

impl AmadeusClient {
    /// Create a new client from resolved credentials.
    pub fn new(credentials: &Credentials) -> crate::Result<Self> {
        Self::with_http_client(reqwest::Client::new(), credentials)
    }

    /// Create a client that reuses an existing HTTP client.
    pub fn with_http_client(
        http: reqwest::Client,
        credentials: &Credentials,
    ) -> crate::Result<Self> {
        let hostname: Hostname = credentials.hostname.parse()?;

        Ok(Self {
            http,
            base_url: hostname.base_url().to_string(),
            client_id: credentials.api_key.clone(),
            client_secret: credentials.api_secret.clone(),
            token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Return a valid bearer token, fetching a new one if needed.
    async fn access_token(&self) -> Result<String, AmadeusError> {
        {
            let token = self.token.read().await;
            if let Some(token) = token.as_ref() {
                if token.is_fresh(Utc::now()) {
                    return Ok(token.value.clone());
                }
            }
        }

        let token = self.fetch_token().await?;
        let value = token.value.clone();

        // Concurrent refreshes may race here; any of them is valid.
        *self.token.write().await = Some(token);

        Ok(value)
    }

    async fn fetch_token(&self) -> Result<AccessToken, AmadeusError> {
        debug!(base_url = %self.base_url, "requesting Amadeus access token");

        let response = self
            .http
            .post(format!("{}{}", self.base_url, TOKEN_PATH))
            .form(&TokenRequest {
                grant_type: "client_credentials",
                client_id: &self.client_id,
                client_secret: &self.client_secret,
            })
            .send()
            .await
            .map_err(|e| AmadeusError::new(ErrorKind::Network, e.to_string()))?;

        let token: TokenResponse = decode(response).await?;

        info!(expires_in = token.expires_in, "obtained Amadeus access token");

        Ok(AccessToken {
            expires_at: token_expiry(Utc::now(), token.expires_in)?,
            value: token.access_token,
        })
    }

    async fn get<Q, T>(&self, path: &str, query: &Q) -> Result<T, AmadeusError>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self.access_token().await?;

        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| AmadeusError::new(ErrorKind::Network, e.to_string()))?;

        decode(response).await
    }
}

#[async_trait]
impl FlightOffersSearch for AmadeusClient {
    async fn flight_offers_search(
        &self,
        query: &FlightOffersQuery,
    ) -> Result<FlightOffersResponse, AmadeusError> {
        self.get(FLIGHT_OFFERS_PATH, query).await
    }
}

/// When a token issued at `now` with lifetime `expires_in` seconds expires.
fn token_expiry(now: DateTime<Utc>, expires_in: i64) -> Result<DateTime<Utc>, AmadeusError> {
    TimeDelta::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            AmadeusError::new(
                ErrorKind::Parser,
                format!("Invalid token lifetime: expires_in={}", expires_in),
            )
        })
}

/// Decode a JSON response body, mapping failures onto `AmadeusError`.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AmadeusError> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| AmadeusError::new(ErrorKind::Network, e.to_string()))?;

    if !(200..300).contains(&status) {
        return Err(AmadeusError::from_status(status, Some(body)));
    }

    serde_json::from_str(&body).map_err(|e| AmadeusError {
        kind: ErrorKind::Parser,
        status: Some(status),
        message: format!("Failed to parse Amadeus response: {}", e),
        description: None,
        body: Some(body),
    })
}
