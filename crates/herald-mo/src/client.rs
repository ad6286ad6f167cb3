//! Async HTTP client for the master-data GraphQL API.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::sync::{Mutex, OnceCell};
use uuid::Uuid;

use crate::{Error, Result};

/// Refresh the token this long before it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

// ─── Settings ────────────────────────────────────────────────────────────────

/// Connection settings, deserialised from the `mo` config section.
#[derive(Debug, Clone, Deserialize)]
pub struct MoSettings {
  pub url:             String,
  #[serde(default = "default_graphql_version")]
  pub graphql_version: u32,
  pub client_id:       String,
  pub client_secret:   String,
  pub auth_server:     String,
  #[serde(default = "default_auth_realm")]
  pub auth_realm:      String,
  #[serde(default = "default_timeout_seconds")]
  pub timeout_seconds: u64,
}

fn default_graphql_version() -> u32 { 22 }

fn default_auth_realm() -> String { "mo".to_owned() }

fn default_timeout_seconds() -> u64 { 30 }

impl MoSettings {
  /// `{url}/graphql/v{version}`
  pub fn graphql_url(&self) -> String {
    format!("{}/graphql/v{}", self.url.trim_end_matches('/'), self.graphql_version)
  }

  /// `{auth_server}/realms/{realm}/protocol/openid-connect/token`
  pub fn token_url(&self) -> String {
    format!(
      "{}/realms/{}/protocol/openid-connect/token",
      self.auth_server.trim_end_matches('/'),
      self.auth_realm
    )
  }
}

// ─── Wire envelopes ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct GraphQlRequest<'a> {
  query:     &'a str,
  variables: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlResponse<T> {
  data:   Option<T>,
  #[serde(default)]
  errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
  message: String,
}

impl<T> GraphQlResponse<T> {
  pub(crate) fn into_data(self) -> Result<T> {
    if !self.errors.is_empty() {
      let messages: Vec<_> = self.errors.into_iter().map(|e| e.message).collect();
      return Err(Error::GraphQl(messages.join("; ")));
    }
    self.data.ok_or(Error::MissingData)
  }
}

#[derive(Deserialize)]
struct TokenResponse {
  access_token: String,
  expires_in:   u64,
}

struct CachedToken {
  access_token: String,
  expires_at:   Instant,
}

impl CachedToken {
  fn is_fresh(&self, now: Instant) -> bool { now + TOKEN_EXPIRY_MARGIN < self.expires_at }
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// GraphQL client with a cached bearer token.
pub struct MoClient {
  http:     reqwest::Client,
  settings: MoSettings,
  token:    Mutex<Option<CachedToken>>,
  root:     OnceCell<Uuid>,
}

impl MoClient {
  pub fn new(settings: MoSettings) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(settings.timeout_seconds))
      .build()?;
    Ok(Self { http, settings, token: Mutex::new(None), root: OnceCell::new() })
  }

  pub fn settings(&self) -> &MoSettings { &self.settings }

  /// A valid access token, fetched with client credentials when the cached
  /// one is missing or about to expire.
  async fn access_token(&self) -> Result<String> {
    let mut cached = self.token.lock().await;
    if let Some(token) = cached.as_ref()
      && token.is_fresh(Instant::now())
    {
      return Ok(token.access_token.clone());
    }

    let url = self.settings.token_url();
    tracing::debug!(%url, "fetching access token");
    let resp = self
      .http
      .post(&url)
      .form(&[
        ("grant_type", "client_credentials"),
        ("client_id", self.settings.client_id.as_str()),
        ("client_secret", self.settings.client_secret.as_str()),
      ])
      .send()
      .await?;
    let resp = check_status(url, resp).await?;
    let token: TokenResponse = resp.json().await?;

    let access_token = token.access_token.clone();
    *cached = Some(CachedToken {
      access_token: token.access_token,
      expires_at:   Instant::now() + Duration::from_secs(token.expires_in),
    });
    Ok(access_token)
  }

  /// Run `query` with `variables` and decode its `data`.
  pub async fn query<T: DeserializeOwned>(
    &self,
    query: &str,
    variables: serde_json::Value,
  ) -> Result<T> {
    let token = self.access_token().await?;
    let url = self.settings.graphql_url();

    let resp = self
      .http
      .post(&url)
      .bearer_auth(token)
      .json(&GraphQlRequest { query, variables })
      .send()
      .await?;
    let resp = check_status(url, resp).await?;

    let body: GraphQlResponse<T> = resp.json().await?;
    body.into_data()
  }

  /// The organisation root, queried once and then cached.
  pub(crate) async fn cached_root(&self) -> Result<Uuid> {
    self
      .root
      .get_or_try_init(|| async {
        let data: crate::queries::RootOrgData =
          self.query(crate::queries::ROOT_ORG, serde_json::json!({})).await?;
        Ok::<_, Error>(data.org.uuid)
      })
      .await
      .copied()
  }
}

async fn check_status(url: String, resp: reqwest::Response) -> Result<reqwest::Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let body = resp.text().await.unwrap_or_default();
  Err(Error::Status { url, status, body })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn settings() -> MoSettings {
    serde_json::from_value(serde_json::json!({
      "url": "http://mo:5000/",
      "client_id": "herald",
      "client_secret": "secret",
      "auth_server": "http://keycloak:8080/auth",
    }))
    .unwrap()
  }

  #[test]
  fn urls_use_version_and_realm() {
    let s = settings();
    assert_eq!(s.graphql_url(), "http://mo:5000/graphql/v22");
    assert_eq!(
      s.token_url(),
      "http://keycloak:8080/auth/realms/mo/protocol/openid-connect/token"
    );
  }

  #[test]
  fn token_is_refreshed_before_expiry() {
    let now = Instant::now();
    let token = CachedToken {
      access_token: "t".into(),
      expires_at:   now + Duration::from_secs(60),
    };
    assert!(token.is_fresh(now));
    assert!(!token.is_fresh(now + Duration::from_secs(31)));
  }

  #[test]
  fn graphql_errors_win_over_data() {
    let body: GraphQlResponse<serde_json::Value> = serde_json::from_value(serde_json::json!({
      "data": {"org": null},
      "errors": [{"message": "boom"}, {"message": "bang"}],
    }))
    .unwrap();
    let err = body.into_data().unwrap_err();
    assert!(matches!(err, Error::GraphQl(ref m) if m == "boom; bang"));
  }

  #[test]
  fn missing_data_is_an_error() {
    let body: GraphQlResponse<serde_json::Value> =
      serde_json::from_value(serde_json::json!({})).unwrap();
    assert!(matches!(body.into_data(), Err(Error::MissingData)));
  }
}
