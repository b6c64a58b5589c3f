//! Docker engine calls routed through Portainer's proxy at `/endpoints/{id}/docker/`.
//!
//! [`DockerProxy`] is the seam the workflow depends on; [`DockerProxyClient`] is the reqwest
//! implementation. Every call carries the Portainer bearer token and targets a single endpoint.

pub mod models;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use reqwest::Client;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::PortainerConfig;
use crate::errors::ApiError;
use crate::http::{Timeout, build_client, ensure_slash, expect_status};
use crate::types::{Credential, EndpointId};
pub use models::{ContainerCreateRequest, ContainerCreateResponse, ContainerSummary, RegistryAuth};
use models::PullProgress;

/// Container engine operations used by a deployment.
#[async_trait]
pub trait DockerProxy: Send + Sync {
    /// `GET containers/json`, all states, containers named exactly `name`
    async fn list_containers(&self, credential: &Credential, endpoint: EndpointId, name: &str) -> Result<Vec<ContainerSummary>, ApiError>;

    /// `DELETE containers/{id}?force=true&v=true`, succeeds only on 204
    async fn remove_container(&self, credential: &Credential, endpoint: EndpointId, container_id: &str) -> Result<(), ApiError>;

    /// `POST images/create?fromImage=<image>` with an `X-Registry-Auth` header, succeeds only on 200
    async fn pull_image(&self, credential: &Credential, endpoint: EndpointId, image: &str, auth: &RegistryAuth) -> Result<(), ApiError>;

    /// `POST containers/create?name=<name>`, succeeds on 200 or 201
    async fn create_container(
        &self,
        credential: &Credential,
        endpoint: EndpointId,
        name: &str,
        spec: &ContainerCreateRequest,
    ) -> Result<ContainerCreateResponse, ApiError>;
}

/// Encode the `X-Registry-Auth` header value: base64 of the JSON auth object
pub fn encode_registry_auth(auth: &RegistryAuth) -> Result<String, ApiError> {
    Ok(general_purpose::STANDARD.encode(serde_json::to_vec(auth)?))
}

/// First engine error reported in an image pull progress stream, if any.
///
/// The engine answers 200 as soon as the pull starts and reports failures (unknown tag, registry
/// unreachable) as `{"error": ...}` lines in the stream.
pub fn pull_stream_error(body: &str) -> Option<String> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<PullProgress>(line).ok())
        .find_map(|progress| progress.error)
}

/// reqwest implementation of [`DockerProxy`].
#[derive(Debug, Clone)]
pub struct DockerProxyClient {
    client: Client,
    base_url: Url,
}

impl DockerProxyClient {
    pub fn new(config: &PortainerConfig) -> Result<Self, ApiError> {
        Ok(Self {
            client: build_client(Timeout::Read(config.engine_timeout), config.accept_invalid_certs)?,
            base_url: ensure_slash(&config.url),
        })
    }

    fn url(&self, endpoint: EndpointId, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(&format!("endpoints/{endpoint}/docker/{path}"))?)
    }
}

#[async_trait]
impl DockerProxy for DockerProxyClient {
    #[instrument(skip(self, credential))]
    async fn list_containers(&self, credential: &Credential, endpoint: EndpointId, name: &str) -> Result<Vec<ContainerSummary>, ApiError> {
        // The engine's name filter is an unanchored regex against "/<name>"
        let filters = serde_json::json!({ "name": [format!("^/{name}$")] }).to_string();
        let url = self.url(endpoint, "containers/json")?;

        let response = self
            .client
            .get(url)
            .query(&[("all", "true"), ("filters", filters.as_str())])
            .header("Authorization", credential.bearer())
            .send()
            .await?;
        let body = expect_status(response, &[200]).await?.text().await?;
        debug!(body = %body, "Container list response");

        let containers: Vec<ContainerSummary> = serde_json::from_str(&body)?;
        Ok(containers.into_iter().filter(|c| c.has_name(name)).collect())
    }

    #[instrument(skip(self, credential))]
    async fn remove_container(&self, credential: &Credential, endpoint: EndpointId, container_id: &str) -> Result<(), ApiError> {
        let url = self.url(endpoint, &format!("containers/{container_id}"))?;

        let response = self
            .client
            .delete(url)
            .query(&[("force", "true"), ("v", "true")])
            .header("Authorization", credential.bearer())
            .send()
            .await?;
        expect_status(response, &[204]).await?;
        Ok(())
    }

    #[instrument(skip(self, credential, auth))]
    async fn pull_image(&self, credential: &Credential, endpoint: EndpointId, image: &str, auth: &RegistryAuth) -> Result<(), ApiError> {
        let url = self.url(endpoint, "images/create")?;

        let response = self
            .client
            .post(url)
            .query(&[("fromImage", image)])
            .header("Authorization", credential.bearer())
            .header("X-Registry-Auth", encode_registry_auth(auth)?)
            .send()
            .await?;

        // Draining the body waits for the pull to finish
        let body = expect_status(response, &[200]).await?.text().await?;
        debug!(body = %body, "Image pull progress");

        if let Some(error) = pull_stream_error(&body) {
            warn!(image, error = %error, "Engine reported a pull failure");
            return Err(ApiError::Engine(error));
        }
        Ok(())
    }

    #[instrument(skip(self, credential, spec))]
    async fn create_container(
        &self,
        credential: &Credential,
        endpoint: EndpointId,
        name: &str,
        spec: &ContainerCreateRequest,
    ) -> Result<ContainerCreateResponse, ApiError> {
        let url = self.url(endpoint, "containers/create")?;
        debug!(body = %serde_json::to_string(spec)?, "Container create request");

        let response = self
            .client
            .post(url)
            .query(&[("name", name)])
            .header("Authorization", credential.bearer())
            .json(spec)
            .send()
            .await?;
        let body = expect_status(response, &[200, 201]).await?.text().await?;
        debug!(body = %body, "Container create response");

        Ok(serde_json::from_str(&body)?)
    }
}
