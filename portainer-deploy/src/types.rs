//! Common type definitions shared by the clients and the deployment workflow.
//!
//! # ID Types
//!
//! Portainer identifies endpoints, teams and resource controls with plain integers, while the
//! Docker engine uses opaque string ids for containers. These are wrapped in type aliases so
//! signatures say which id they expect:
//!
//! - [`EndpointId`]: Portainer endpoint (Docker host) identifier
//! - [`TeamId`]: Portainer team identifier
//! - [`ResourceControlId`]: Portainer resource control identifier
//! - [`ContainerId`]: Docker container identifier
//!
//! # Workflow Steps
//!
//! [`Step`] names each stage of a deployment so that failures can be reported against the stage
//! that produced them.

use std::fmt;

pub type EndpointId = i64;
pub type TeamId = i64;
pub type ResourceControlId = i64;
pub type ContainerId = String;

/// Abbreviate a Docker container id to the 12 characters the Docker CLI shows
pub fn abbrev_container_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

/// Bearer token returned by `POST /auth`.
///
/// Only lives for the duration of a single deployment run. The `Debug` implementation redacts the
/// token so it can be carried in instrumented structs without leaking into logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// The orchestration target a deployment runs against, resolved by name once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRef {
    pub id: EndpointId,
    pub name: String,
}

/// A stage of the deployment workflow, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Loading and validating configuration, building the container payload
    Configure,
    Authenticate,
    ResolveEndpoint,
    RemoveOldContainers,
    PullImage,
    CreateContainer,
    ApplyAccessControl,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Configure => "configure",
            Step::Authenticate => "authenticate",
            Step::ResolveEndpoint => "resolve endpoint",
            Step::RemoveOldContainers => "remove old containers",
            Step::PullImage => "pull image",
            Step::CreateContainer => "create container",
            Step::ApplyAccessControl => "apply access control",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
