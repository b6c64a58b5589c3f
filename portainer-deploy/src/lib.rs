//! # portainer-deploy: container deployment through Portainer
//!
//! `portainer-deploy` is a build pipeline step that (re)deploys a single container image onto a
//! Docker host managed by [Portainer](https://www.portainer.io/). It is run once per deployment,
//! typically right after the image was built and pushed, and exits non-zero if any step fails.
//!
//! ## What It Does
//!
//! A run performs these steps, strictly in order, against the Portainer management API and the
//! Docker engine API that Portainer proxies under `/endpoints/{id}/docker/`:
//!
//! 1. **Authenticate** with the configured login and password, obtaining a bearer token
//! 2. **Resolve the endpoint** (Docker host) by exact name
//! 3. **Remove old containers** carrying the configured container name, forcing removal
//! 4. **Pull the image** `image:tag`, passing the registry address to the engine
//! 5. **Create the container** with its published ports, volumes and restart policy
//! 6. **Apply access control**: restrict the container's Portainer resource control to the
//!    configured teams and visibility
//!
//! There is no retry and no rollback. The first failure ends the run and is reported with the
//! step it happened in; failures after step 3 leave the endpoint changed (the old container is
//! gone, or the new one exists without its access restrictions) and the error log says so.
//!
//! ## Architecture
//!
//! The workflow lives in [`deploy`], modelled as a chain of typed states where each transition
//! performs one step. It talks to the outside world only through two traits:
//!
//! - [`portainer::PortainerApi`]: authentication, endpoints, teams and resource controls
//! - [`docker::DockerProxy`]: container listing, removal and creation, image pulls
//!
//! Both have `reqwest` implementations ([`portainer::PortainerClient`],
//! [`docker::DockerProxyClient`]) and recording mocks in `test_utils` (behind the `test-utils`
//! feature) for exercising the workflow without a Portainer instance.
//!
//! The container-create payload is derived from configuration by [`container_spec`] before any
//! network call, so malformed port or volume settings fail the run without touching the host.
//!
//! ## Configuration
//!
//! See [`config`] for the file format and environment overrides, and `deploy.example.yaml` at
//! the repository root for an annotated example.

pub mod access_control;
pub mod config;
pub mod container_spec;
pub mod deploy;
pub mod docker;
pub mod errors;
pub mod http;
pub mod portainer;
pub mod telemetry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

#[cfg(test)]
mod test;

pub use config::Config;
pub use deploy::{Deployer, DeploymentResult};
pub use errors::{ApiError, Error};

use docker::DockerProxyClient;
use portainer::PortainerClient;

/// Run one deployment against the Portainer instance in `config`.
pub async fn deploy(config: &Config) -> Result<DeploymentResult, Error> {
    let portainer = PortainerClient::new(&config.portainer)
        .map_err(|e| Error::config(format!("failed to build Portainer HTTP client: {e}")))?;
    let docker = DockerProxyClient::new(&config.portainer)
        .map_err(|e| Error::config(format!("failed to build Docker proxy HTTP client: {e}")))?;

    Deployer::new(portainer, docker).run(config).await
}
