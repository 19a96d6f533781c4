//! crates/signal_hub_client/src/adapters/http.rs
//!
//! Shared HTTP plumbing for the gateway adapters: base URLs, the anon key,
//! the bearer token of the current session, and the mapping from HTTP
//! status codes to the gateway error taxonomy.

use std::sync::RwLock;

use reqwest::{Client, RequestBuilder, Response, StatusCode};

use signal_hub_core::ports::{GatewayError, GatewayResult};

use crate::config::Config;

pub struct HttpGateway {
    client: Client,
    base_url: String,
    anon_key: String,
    /// Access token of the signed-in session; requests fall back to the
    /// anon key while signed out.
    access_token: RwLock<Option<String>>,
}

impl HttpGateway {
    pub fn new(config: &Config) -> Self {
        Self::from_parts(&config.gateway_url, &config.gateway_key)
    }

    pub fn from_parts(base_url: &str, anon_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            access_token: RwLock::new(None),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    pub fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    pub fn rpc_url(&self, procedure: &str) -> String {
        format!("{}/rest/v1/rpc/{procedure}", self.base_url)
    }

    pub fn storage_url(&self, path: &str) -> String {
        format!("{}/storage/v1/{path}", self.base_url)
    }

    pub fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().expect("access token lock poisoned") = token;
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token
            .read()
            .expect("access token lock poisoned")
            .is_some()
    }

    fn bearer(&self) -> String {
        self.access_token
            .read()
            .expect("access token lock poisoned")
            .clone()
            .unwrap_or_else(|| self.anon_key.clone())
    }

    /// Attaches the api key and bearer token, sends the request, and maps
    /// transport failures and non-success statuses into `GatewayError`.
    pub async fn execute(&self, builder: RequestBuilder) -> GatewayResult<Response> {
        let response = builder
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
            .send()
            .await
            .map_err(network)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(map_status(status, body))
    }
}

pub fn map_status(status: StatusCode, body: String) -> GatewayError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Auth(body),
        StatusCode::NOT_FOUND => GatewayError::NotFound(body),
        status if status.is_client_error() => GatewayError::Validation(body),
        status => GatewayError::Unexpected(format!("{status}: {body}")),
    }
}

pub fn network(err: reqwest::Error) -> GatewayError {
    GatewayError::Network(err.to_string())
}

pub fn decode(err: impl std::fmt::Display) -> GatewayError {
    GatewayError::Unexpected(format!("Malformed gateway response: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_the_taxonomy() {
        assert!(matches!(
            map_status(StatusCode::UNAUTHORIZED, String::new()),
            GatewayError::Auth(_)
        ));
        assert!(matches!(
            map_status(StatusCode::NOT_FOUND, String::new()),
            GatewayError::NotFound(_)
        ));
        assert!(matches!(
            map_status(StatusCode::UNPROCESSABLE_ENTITY, String::new()),
            GatewayError::Validation(_)
        ));
        assert!(matches!(
            map_status(StatusCode::BAD_GATEWAY, String::new()),
            GatewayError::Unexpected(_)
        ));
    }
}
