//! Client for the control API: room key resolution and camera lists.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::config::Settings;
use crate::error::{AuthError, FetchError};
use crate::protocol::{Camera, ControlInfo};
use crate::OurResult;

const CONTROL_INFO_PATH: &str = "/api/v1/controlInfo";
const CAMERAS_PATH: &str = "/api/v1/cameras";

/// Outcome of an API call before it is classified into a domain error.
#[derive(Debug)]
enum ApiFailure {
    Unauthorized,
    Other(String),
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(settings: &Settings) -> OurResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self::with_client(settings.api_base_url()?, client))
    }

    pub fn with_client(base_url: Url, client: reqwest::Client) -> Self {
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET /api/v1/controlInfo?key=<key>`
    pub async fn get_control_info(&self, key: &str) -> Result<ControlInfo, AuthError> {
        let url = self
            .base_url
            .join(CONTROL_INFO_PATH)
            .map_err(|e| AuthError::Generic(format!("Invalid control API address: {e}")))?;

        match self.get_json(url, &[("key", key)]).await {
            Ok(info) => Ok(info),
            Err(ApiFailure::Unauthorized) => Err(AuthError::InvalidCode),
            Err(ApiFailure::Other(message)) => Err(AuthError::Generic(message)),
        }
    }

    /// `GET /api/v1/cameras?room=&controlGroup=&controlKey=`
    pub async fn get_cameras(&self, info: &ControlInfo) -> Result<Vec<Camera>, FetchError> {
        let url = self
            .base_url
            .join(CAMERAS_PATH)
            .map_err(|e| FetchError::Generic(format!("Invalid control API address: {e}")))?;

        let query = [
            ("room", info.room.as_str()),
            ("controlGroup", info.control_group.as_str()),
            ("controlKey", info.control_key.as_str()),
        ];
        match self.get_json(url, &query).await {
            Ok(cameras) => Ok(cameras),
            Err(ApiFailure::Unauthorized) => Err(FetchError::NotAuthorized(info.room.clone())),
            Err(ApiFailure::Other(message)) => Err(FetchError::Generic(message)),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<T, ApiFailure> {
        debug!("GET {url}");
        let response = self
            .client
            .get(url.clone())
            .query(query)
            .send()
            .await
            .map_err(|e| {
                warn!("Request to {url} failed: {e}");
                ApiFailure::Other(format!("Unable to reach the control server: {e}"))
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiFailure::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                format!("Request failed with status {status}")
            } else {
                body.trim().to_string()
            };
            warn!("Request to {url} returned {status}: {message}");
            return Err(ApiFailure::Other(message));
        }

        response.json::<T>().await.map_err(|e| {
            warn!("Unable to decode response from {url}: {e}");
            ApiFailure::Other(format!("Unexpected response from the control server: {e}"))
        })
    }
}
