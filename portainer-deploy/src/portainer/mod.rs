//! Portainer management API client.
//!
//! Covers the calls the deployment needs outside the Docker proxy: authentication, endpoint and
//! team listing, and resource control updates. [`PortainerApi`] is the seam the workflow depends
//! on; [`PortainerClient`] is the reqwest implementation.

pub mod models;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use crate::config::PortainerConfig;
use crate::errors::ApiError;
use crate::http::{Timeout, build_client, ensure_slash, expect_success};
use crate::types::{Credential, ResourceControlId};
pub use models::{Endpoint, ResourceControlUpdate, Team};
use models::{AuthenticateRequest, AuthenticateResponse};

/// The management API calls used by a deployment.
#[async_trait]
pub trait PortainerApi: Send + Sync {
    /// `POST /auth`: exchange login and password for a bearer token
    async fn authenticate(&self, username: &str, password: &str) -> Result<Credential, ApiError>;

    /// `GET /endpoints`
    async fn list_endpoints(&self, credential: &Credential) -> Result<Vec<Endpoint>, ApiError>;

    /// `GET /teams`
    async fn list_teams(&self, credential: &Credential) -> Result<Vec<Team>, ApiError>;

    /// `PUT /resource_controls/{id}`
    async fn update_resource_control(
        &self,
        credential: &Credential,
        id: ResourceControlId,
        update: &ResourceControlUpdate,
    ) -> Result<(), ApiError>;
}

/// reqwest implementation of [`PortainerApi`].
#[derive(Debug, Clone)]
pub struct PortainerClient {
    client: Client,
    base_url: Url,
}

impl PortainerClient {
    pub fn new(config: &PortainerConfig) -> Result<Self, ApiError> {
        Ok(Self {
            client: build_client(Timeout::Total(config.request_timeout), config.accept_invalid_certs)?,
            base_url: ensure_slash(&config.url),
        })
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path)?)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, credential: &Credential, path: &str) -> Result<T, ApiError> {
        let url = self.url(path)?;
        debug!(%url, "GET");

        let response = self.client.get(url).header("Authorization", credential.bearer()).send().await?;
        let body = expect_success(response).await?.text().await?;
        debug!(path, body = %body, "Portainer response");

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl PortainerApi for PortainerClient {
    #[instrument(skip(self, password))]
    async fn authenticate(&self, username: &str, password: &str) -> Result<Credential, ApiError> {
        let url = self.url("auth")?;
        let response = self
            .client
            .post(url)
            .json(&AuthenticateRequest { username, password })
            .send()
            .await?;
        let response: AuthenticateResponse = expect_success(response).await?.json().await?;
        Ok(Credential::new(response.jwt))
    }

    #[instrument(skip_all)]
    async fn list_endpoints(&self, credential: &Credential) -> Result<Vec<Endpoint>, ApiError> {
        self.get_json(credential, "endpoints").await
    }

    #[instrument(skip_all)]
    async fn list_teams(&self, credential: &Credential) -> Result<Vec<Team>, ApiError> {
        self.get_json(credential, "teams").await
    }

    #[instrument(skip(self, credential))]
    async fn update_resource_control(
        &self,
        credential: &Credential,
        id: ResourceControlId,
        update: &ResourceControlUpdate,
    ) -> Result<(), ApiError> {
        let url = self.url(&format!("resource_controls/{id}"))?;
        debug!(%url, body = %serde_json::to_string(update)?, "PUT");

        let response = self
            .client
            .put(url)
            .header("Authorization", credential.bearer())
            .json(update)
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }
}
