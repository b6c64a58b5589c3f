//! The deployment workflow.
//!
//! A run moves through a fixed sequence of states, each transition consuming the previous state:
//!
//! ```text
//! Configured -> Authenticated -> EndpointResolved -> Cleaned -> ImagePulled -> Created -> DeploymentResult
//! ```
//!
//! Every transition performs exactly one workflow step against the remote APIs. The first failure
//! ends the run with an [`Error`] that names the step; completed steps are never rolled back, so
//! a failure after cleanup leaves the endpoint without the old container (see
//! [`Error::side_effects`]).
//!
//! The credential and the resolved endpoint are carried in the state values themselves rather
//! than on the [`Deployer`], which holds nothing but the two API clients.

use tracing::{debug, info, instrument, warn};

use crate::access_control::apply_access_control;
use crate::config::Config;
use crate::container_spec::build_container_spec;
use crate::docker::{ContainerCreateRequest, ContainerCreateResponse, DockerProxy, RegistryAuth};
use crate::errors::Error;
use crate::portainer::PortainerApi;
use crate::types::{ContainerId, Credential, EndpointRef, ResourceControlId, Step, abbrev_container_id};

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentResult {
    pub endpoint: EndpointRef,
    pub container_id: ContainerId,
    pub resource_control_id: ResourceControlId,
    /// Warnings the engine returned when creating the container
    pub warnings: Vec<String>,
    /// Ids of the containers removed before the new one was created
    pub removed_containers: Vec<ContainerId>,
}

/// Authenticated context for every call after endpoint resolution.
#[derive(Debug, Clone)]
pub struct Session {
    pub credential: Credential,
    pub endpoint: EndpointRef,
}

// Workflow states

#[derive(Debug)]
pub struct Configured {
    spec: ContainerCreateRequest,
}

#[derive(Debug)]
pub struct Authenticated {
    spec: ContainerCreateRequest,
    credential: Credential,
}

#[derive(Debug)]
pub struct EndpointResolved {
    spec: ContainerCreateRequest,
    session: Session,
}

#[derive(Debug)]
pub struct Cleaned {
    spec: ContainerCreateRequest,
    session: Session,
    removed: Vec<ContainerId>,
}

#[derive(Debug)]
pub struct ImagePulled {
    spec: ContainerCreateRequest,
    session: Session,
    removed: Vec<ContainerId>,
}

#[derive(Debug)]
pub struct Created {
    session: Session,
    removed: Vec<ContainerId>,
    created: ContainerCreateResponse,
}

/// A deployment run in state `S`.
#[derive(Debug)]
pub struct Deployment<'a, S> {
    config: &'a Config,
    state: S,
}

impl<'a> Deployment<'a, Configured> {
    /// Build and validate the container payload. No remote call is made before this succeeds.
    pub fn new(config: &'a Config) -> Result<Self, Error> {
        let spec = build_container_spec(&config.container)?;
        debug!(image = %spec.image, "Container payload built");
        Ok(Self {
            config,
            state: Configured { spec },
        })
    }

    #[instrument(skip_all, fields(step = %Step::Authenticate))]
    pub async fn authenticate<P>(self, api: &P) -> Result<Deployment<'a, Authenticated>, Error>
    where
        P: PortainerApi + ?Sized,
    {
        let portainer = &self.config.portainer;
        info!(url = %portainer.url, login = %portainer.login, "Authenticating against Portainer");

        let credential = api
            .authenticate(&portainer.login, &portainer.password)
            .await
            .map_err(|source| Error::Auth { source })?;

        Ok(Deployment {
            config: self.config,
            state: Authenticated {
                spec: self.state.spec,
                credential,
            },
        })
    }
}

impl<'a> Deployment<'a, Authenticated> {
    /// Find the configured endpoint by exact name. The first match wins.
    #[instrument(skip_all, fields(step = %Step::ResolveEndpoint))]
    pub async fn resolve_endpoint<P>(self, api: &P) -> Result<Deployment<'a, EndpointResolved>, Error>
    where
        P: PortainerApi + ?Sized,
    {
        let name = &self.config.portainer.endpoint;
        info!(endpoint = %name, "Resolving endpoint");

        let endpoints = api
            .list_endpoints(&self.state.credential)
            .await
            .map_err(|source| Error::EndpointLookup { source })?;
        debug!(count = endpoints.len(), "Fetched Portainer endpoints");

        let endpoint = endpoints
            .into_iter()
            .find(|e| e.name.as_deref() == Some(name.as_str()))
            .ok_or_else(|| Error::EndpointNotFound { name: name.clone() })?;
        info!(endpoint_id = endpoint.id, endpoint = %name, "Endpoint resolved");

        Ok(Deployment {
            config: self.config,
            state: EndpointResolved {
                spec: self.state.spec,
                session: Session {
                    credential: self.state.credential,
                    endpoint: EndpointRef {
                        id: endpoint.id,
                        name: name.clone(),
                    },
                },
            },
        })
    }
}

impl<'a> Deployment<'a, EndpointResolved> {
    /// Force-remove every container carrying the configured name, one at a time.
    #[instrument(skip_all, fields(step = %Step::RemoveOldContainers, endpoint_id = self.state.session.endpoint.id))]
    pub async fn remove_old_containers<D>(self, docker: &D) -> Result<Deployment<'a, Cleaned>, Error>
    where
        D: DockerProxy + ?Sized,
    {
        let name = &self.config.container.name;
        let session = &self.state.session;
        info!(container = %name, "Removing old containers");

        let containers = docker
            .list_containers(&session.credential, session.endpoint.id, name)
            .await
            .map_err(|source| Error::Cleanup {
                container: name.clone(),
                source,
            })?;

        if containers.is_empty() {
            info!(container = %name, "No existing container to remove");
        }

        let mut removed = Vec::with_capacity(containers.len());
        for container in containers {
            docker
                .remove_container(&session.credential, session.endpoint.id, &container.id)
                .await
                .map_err(|source| Error::Cleanup {
                    container: container.id.clone(),
                    source,
                })?;
            info!(
                container_id = abbrev_container_id(&container.id),
                image = %container.image,
                state = container.state.as_deref().unwrap_or("unknown"),
                "Removed old container"
            );
            removed.push(container.id);
        }

        Ok(Deployment {
            config: self.config,
            state: Cleaned {
                spec: self.state.spec,
                session: self.state.session,
                removed,
            },
        })
    }
}

impl<'a> Deployment<'a, Cleaned> {
    #[instrument(skip_all, fields(step = %Step::PullImage, endpoint_id = self.state.session.endpoint.id))]
    pub async fn pull_image<D>(self, docker: &D) -> Result<Deployment<'a, ImagePulled>, Error>
    where
        D: DockerProxy + ?Sized,
    {
        let container = &self.config.container;
        let image = container.image_ref();
        info!(image = %image, registry = %container.registry, "Pulling image");

        let auth = RegistryAuth {
            serveraddress: container.registry.clone(),
        };
        let session = &self.state.session;
        docker
            .pull_image(&session.credential, session.endpoint.id, &image, &auth)
            .await
            .map_err(|source| Error::Pull {
                image: image.clone(),
                source,
            })?;
        info!(image = %image, "Image pulled");

        Ok(Deployment {
            config: self.config,
            state: ImagePulled {
                spec: self.state.spec,
                session: self.state.session,
                removed: self.state.removed,
            },
        })
    }
}

impl<'a> Deployment<'a, ImagePulled> {
    /// Create the container. Engine warnings are logged and kept on the result.
    #[instrument(skip_all, fields(step = %Step::CreateContainer, endpoint_id = self.state.session.endpoint.id))]
    pub async fn create_container<D>(self, docker: &D) -> Result<Deployment<'a, Created>, Error>
    where
        D: DockerProxy + ?Sized,
    {
        let name = &self.config.container.name;
        info!(container = %name, image = %self.state.spec.image, "Creating container");

        let session = &self.state.session;
        let created = docker
            .create_container(&session.credential, session.endpoint.id, name, &self.state.spec)
            .await
            .map_err(|source| Error::Create {
                name: name.clone(),
                source,
            })?;

        for warning in &created.warnings {
            warn!(container = %name, warning = %warning, "Engine warning on container creation");
        }
        info!(
            container = %name,
            container_id = abbrev_container_id(&created.id),
            resource_control_id = ?created.resource_control_id(),
            "Container created"
        );

        Ok(Deployment {
            config: self.config,
            state: Created {
                session: self.state.session,
                removed: self.state.removed,
                created,
            },
        })
    }
}

impl Deployment<'_, Created> {
    /// Apply the configured access control to the new container's resource control.
    ///
    /// The container is left in place if this fails.
    #[instrument(skip_all, fields(step = %Step::ApplyAccessControl))]
    pub async fn apply_access_control<P>(self, api: &P) -> Result<DeploymentResult, Error>
    where
        P: PortainerApi + ?Sized,
    {
        let Created {
            session,
            removed,
            created,
        } = self.state;

        let resource_control_id = created.resource_control_id().ok_or_else(|| Error::AccessControl {
            message: format!(
                "Portainer returned no resource control for container {}",
                abbrev_container_id(&created.id)
            ),
            source: None,
        })?;
        info!(resource_control_id, teams = ?self.config.access.teams, "Applying access control");

        apply_access_control(api, &session.credential, resource_control_id, &self.config.access).await?;

        Ok(DeploymentResult {
            endpoint: session.endpoint,
            container_id: created.id,
            resource_control_id,
            warnings: created.warnings,
            removed_containers: removed,
        })
    }
}

/// Runs deployments against a pair of API clients.
#[derive(Debug, Clone)]
pub struct Deployer<P, D> {
    portainer: P,
    docker: D,
}

impl<P, D> Deployer<P, D>
where
    P: PortainerApi,
    D: DockerProxy,
{
    pub fn new(portainer: P, docker: D) -> Self {
        Self { portainer, docker }
    }

    /// Run every step in order and stop at the first failure.
    #[instrument(skip_all, fields(container = %config.container.name, endpoint = %config.portainer.endpoint))]
    pub async fn run(&self, config: &Config) -> Result<DeploymentResult, Error> {
        let result = Deployment::new(config)?
            .authenticate(&self.portainer)
            .await?
            .resolve_endpoint(&self.portainer)
            .await?
            .remove_old_containers(&self.docker)
            .await?
            .pull_image(&self.docker)
            .await?
            .create_container(&self.docker)
            .await?
            .apply_access_control(&self.portainer)
            .await?;

        info!(
            container_id = abbrev_container_id(&result.container_id),
            resource_control_id = result.resource_control_id,
            endpoint_id = result.endpoint.id,
            removed = result.removed_containers.len(),
            "Deployment complete"
        );
        Ok(result)
    }
}
