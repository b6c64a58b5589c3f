//! Recording mock clients for exercising the deployment workflow without a Portainer instance
//! (available with `test-utils` feature).
//!
//! Responses are queued per call and returned in FIFO order; a call with nothing queued fails
//! with an [`ApiError::Engine`] naming the call. Every call is recorded and can be inspected
//! afterwards.
//!
//! # Example
//! ```ignore
//! let portainer = MockPortainer::new();
//! portainer.add_auth(Ok(Credential::new("jwt")));
//! portainer.add_endpoints(Ok(vec![Endpoint { id: 1, name: Some("local".into()) }]));
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::docker::{ContainerCreateRequest, ContainerCreateResponse, ContainerSummary, DockerProxy, RegistryAuth};
use crate::errors::ApiError;
use crate::portainer::{Endpoint, PortainerApi, ResourceControlUpdate, Team};
use crate::types::{Credential, EndpointId, ResourceControlId};

type Queue<T> = Arc<Mutex<VecDeque<Result<T, ApiError>>>>;

fn next<T>(queue: &Queue<T>, call: &str) -> Result<T, ApiError> {
    queue
        .lock()
        .pop_front()
        .unwrap_or_else(|| Err(ApiError::Engine(format!("No mock response configured for {call}"))))
}

/// Record of a call made to [`MockPortainer`].
#[derive(Debug, Clone, PartialEq)]
pub enum PortainerCall {
    Authenticate { username: String, password: String },
    ListEndpoints { token: String },
    ListTeams { token: String },
    UpdateResourceControl { token: String, id: ResourceControlId, update: ResourceControlUpdate },
}

#[derive(Clone, Default)]
pub struct MockPortainer {
    auth: Queue<Credential>,
    endpoints: Queue<Vec<Endpoint>>,
    teams: Queue<Vec<Team>>,
    resource_controls: Queue<()>,
    calls: Arc<Mutex<Vec<PortainerCall>>>,
}

impl MockPortainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_auth(&self, response: Result<Credential, ApiError>) {
        self.auth.lock().push_back(response);
    }

    pub fn add_endpoints(&self, response: Result<Vec<Endpoint>, ApiError>) {
        self.endpoints.lock().push_back(response);
    }

    pub fn add_teams(&self, response: Result<Vec<Team>, ApiError>) {
        self.teams.lock().push_back(response);
    }

    pub fn add_resource_control_result(&self, response: Result<(), ApiError>) {
        self.resource_controls.lock().push_back(response);
    }

    pub fn get_calls(&self) -> Vec<PortainerCall> {
        self.calls.lock().clone()
    }

    /// `(resource control id, update)` for every update call, in order
    pub fn resource_control_updates(&self) -> Vec<(ResourceControlId, ResourceControlUpdate)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                PortainerCall::UpdateResourceControl { id, update, .. } => Some((*id, update.clone())),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl PortainerApi for MockPortainer {
    async fn authenticate(&self, username: &str, password: &str) -> Result<Credential, ApiError> {
        self.calls.lock().push(PortainerCall::Authenticate {
            username: username.to_string(),
            password: password.to_string(),
        });
        next(&self.auth, "authenticate")
    }

    async fn list_endpoints(&self, credential: &Credential) -> Result<Vec<Endpoint>, ApiError> {
        self.calls.lock().push(PortainerCall::ListEndpoints {
            token: credential.token().to_string(),
        });
        next(&self.endpoints, "list_endpoints")
    }

    async fn list_teams(&self, credential: &Credential) -> Result<Vec<Team>, ApiError> {
        self.calls.lock().push(PortainerCall::ListTeams {
            token: credential.token().to_string(),
        });
        next(&self.teams, "list_teams")
    }

    async fn update_resource_control(
        &self,
        credential: &Credential,
        id: ResourceControlId,
        update: &ResourceControlUpdate,
    ) -> Result<(), ApiError> {
        self.calls.lock().push(PortainerCall::UpdateResourceControl {
            token: credential.token().to_string(),
            id,
            update: update.clone(),
        });
        next(&self.resource_controls, "update_resource_control")
    }
}

/// Record of a call made to [`MockDocker`].
#[derive(Debug, Clone, PartialEq)]
pub enum DockerCall {
    ListContainers { endpoint: EndpointId, name: String },
    RemoveContainer { endpoint: EndpointId, container_id: String },
    PullImage { endpoint: EndpointId, image: String, registry: String },
    CreateContainer { endpoint: EndpointId, name: String, spec: ContainerCreateRequest },
}

#[derive(Clone, Default)]
pub struct MockDocker {
    containers: Queue<Vec<ContainerSummary>>,
    removals: Queue<()>,
    pulls: Queue<()>,
    creates: Queue<ContainerCreateResponse>,
    calls: Arc<Mutex<Vec<DockerCall>>>,
}

impl MockDocker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_containers(&self, response: Result<Vec<ContainerSummary>, ApiError>) {
        self.containers.lock().push_back(response);
    }

    pub fn add_removal(&self, response: Result<(), ApiError>) {
        self.removals.lock().push_back(response);
    }

    pub fn add_pull(&self, response: Result<(), ApiError>) {
        self.pulls.lock().push_back(response);
    }

    pub fn add_create(&self, response: Result<ContainerCreateResponse, ApiError>) {
        self.creates.lock().push_back(response);
    }

    pub fn get_calls(&self) -> Vec<DockerCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl DockerProxy for MockDocker {
    async fn list_containers(&self, _credential: &Credential, endpoint: EndpointId, name: &str) -> Result<Vec<ContainerSummary>, ApiError> {
        self.calls.lock().push(DockerCall::ListContainers {
            endpoint,
            name: name.to_string(),
        });
        next(&self.containers, "list_containers")
    }

    async fn remove_container(&self, _credential: &Credential, endpoint: EndpointId, container_id: &str) -> Result<(), ApiError> {
        self.calls.lock().push(DockerCall::RemoveContainer {
            endpoint,
            container_id: container_id.to_string(),
        });
        next(&self.removals, "remove_container")
    }

    async fn pull_image(&self, _credential: &Credential, endpoint: EndpointId, image: &str, auth: &RegistryAuth) -> Result<(), ApiError> {
        self.calls.lock().push(DockerCall::PullImage {
            endpoint,
            image: image.to_string(),
            registry: auth.serveraddress.clone(),
        });
        next(&self.pulls, "pull_image")
    }

    async fn create_container(
        &self,
        _credential: &Credential,
        endpoint: EndpointId,
        name: &str,
        spec: &ContainerCreateRequest,
    ) -> Result<ContainerCreateResponse, ApiError> {
        self.calls.lock().push(DockerCall::CreateContainer {
            endpoint,
            name: name.to_string(),
            spec: spec.clone(),
        });
        next(&self.creates, "create_container")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_returns_responses_in_order() {
        let mock = MockPortainer::new();
        mock.add_auth(Ok(Credential::new("first")));
        mock.add_auth(Ok(Credential::new("second")));

        assert_eq!(mock.authenticate("u", "p").await.unwrap().token(), "first");
        assert_eq!(mock.authenticate("u", "p").await.unwrap().token(), "second");
        assert!(mock.authenticate("u", "p").await.is_err());
        assert_eq!(mock.get_calls().len(), 3);
    }

    #[tokio::test]
    async fn test_mock_docker_records_calls() {
        let mock = MockDocker::new();
        mock.add_removal(Ok(()));

        mock.remove_container(&Credential::new("t"), 3, "abc").await.unwrap();

        assert_eq!(
            mock.get_calls(),
            vec![DockerCall::RemoveContainer {
                endpoint: 3,
                container_id: "abc".into()
            }]
        );
    }
}
