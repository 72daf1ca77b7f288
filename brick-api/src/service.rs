use crate::models::{
    BrickApiConfig, BulkProgressRequest, InventoryPayload, ProgressRow, RemoteProgressRow,
    SetFlagsPatch, SetPayload,
};
use reqwest::{RequestBuilder, Response, StatusCode};

/// Error type for backend calls
#[derive(Debug)]
pub enum ApiError {
    NetworkError(String),
    JsonError(String),
    /// Non-2xx response (status code, response body)
    StatusError(u16, String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            ApiError::JsonError(msg) => write!(f, "JSON error: {}", msg),
            ApiError::StatusError(status, body) => {
                write!(f, "Server returned status {}: {}", status, body)
            }
        }
    }
}

impl std::error::Error for ApiError {}

/// Client for the tracker backend REST API
pub struct BrickApiClient {
    config: BrickApiConfig,
    client: reqwest::Client,
}

impl BrickApiClient {
    /// Create a new client; fails only if the TLS backend cannot be initialised
    pub fn new(config: BrickApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .connect_timeout(std::time::Duration::from_secs(10))
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .user_agent("BrickTracker/0.1.0")
            .build()
            .map_err(|e| ApiError::NetworkError(format!("Client build failed: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &BrickApiConfig {
        &self.config
    }

    /// Create or update a set for the current user
    pub async fn put_set(&self, set: &SetPayload) -> Result<(), ApiError> {
        let url = self.url(&format!("api/sets/{}", set.set_num));
        let response = self.send(self.client.put(&url).json(set)).await?;
        expect_success(response).await
    }

    /// Delete a set; a missing set counts as deleted
    pub async fn delete_set(&self, set_num: &str) -> Result<(), ApiError> {
        let url = self.url(&format!("api/sets/{}", set_num));
        let response = self.send(self.client.delete(&url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            log::debug!("Set {} already absent remotely", set_num);
            return Ok(());
        }
        expect_success(response).await
    }

    pub async fn patch_set_flags(
        &self,
        set_num: &str,
        patch: &SetFlagsPatch,
    ) -> Result<(), ApiError> {
        let url = self.url(&format!("api/sets/{}", set_num));
        let response = self.send(self.client.patch(&url).json(patch)).await?;
        expect_success(response).await
    }

    pub async fn put_progress(&self, set_num: &str, row: &ProgressRow) -> Result<(), ApiError> {
        let url = self.url(&format!("api/progress/{}", set_num));
        let response = self.send(self.client.put(&url).json(row)).await?;
        expect_success(response).await
    }

    /// Upsert many rows; the server applies them in one transaction
    pub async fn post_progress_bulk(
        &self,
        set_num: &str,
        rows: &[ProgressRow],
    ) -> Result<(), ApiError> {
        let url = self.url(&format!("api/progress/{}/bulk", set_num));
        let body = BulkProgressRequest {
            updates: rows.to_vec(),
        };
        let response = self.send(self.client.post(&url).json(&body)).await?;
        expect_success(response).await
    }

    pub async fn get_progress(&self, set_num: &str) -> Result<Vec<RemoteProgressRow>, ApiError> {
        let url = self.url(&format!("api/progress/{}", set_num));
        let response = self.send(self.client.get(&url)).await?;
        parse_json(response).await
    }

    pub async fn get_sets(&self) -> Result<Vec<SetPayload>, ApiError> {
        let url = self.url("api/sets");
        let response = self.send(self.client.get(&url)).await?;
        parse_json(response).await
    }

    pub async fn get_inventory(&self, set_num: &str) -> Result<InventoryPayload, ApiError> {
        let url = self.url(&format!("api/sets/{}/inventory", set_num));
        let response = self.send(self.client.get(&url)).await?;
        parse_json(response).await
    }

    /// Returns true if the backend answers its health endpoint
    pub async fn probe(&self) -> bool {
        let url = self.url("api/health");
        match self.send(self.client.get(&url)).await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                log::debug!("Health probe failed: {}", e);
                false
            }
        }
    }

    fn url(&self, path: &str) -> String {
        build_url(&self.config.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let mut request = request
            .header("Accept", "application/json")
            .header("X-Client-Id", &self.config.client_id);
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        request
            .send()
            .await
            .map_err(|e| ApiError::NetworkError(format!("Request failed: {}", e)))
    }
}

fn build_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

async fn expect_success(response: Response) -> Result<(), ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::StatusError(status.as_u16(), body))
}

async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::StatusError(status.as_u16(), body));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::JsonError(format!("Failed to parse response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_joins_slashes() {
        assert_eq!(
            build_url("https://bricks.example.com/", "/api/sets/75192-1"),
            "https://bricks.example.com/api/sets/75192-1"
        );
        assert_eq!(
            build_url("http://localhost:3000", "api/health"),
            "http://localhost:3000/api/health"
        );
    }

    #[test]
    fn test_status_error_display() {
        let err = ApiError::StatusError(503, "maintenance".to_string());
        assert_eq!(err.to_string(), "Server returned status 503: maintenance");
    }

    #[tokio::test]
    async fn test_probe_unreachable_host_is_offline() {
        let client = BrickApiClient::new(BrickApiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..BrickApiConfig::default()
        })
        .unwrap();

        assert!(!client.probe().await);
    }
}
