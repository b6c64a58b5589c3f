//! Docker Engine API types, as proxied by Portainer under `/endpoints/{id}/docker/`.
//!
//! Only the fields the deployment needs are modelled. Field names follow the engine's
//! PascalCase JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{ContainerId, ResourceControlId};

/// Serializes as `{}`, the value the engine expects in `ExposedPorts` and `Volumes` maps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyObject {}

/// Body of `POST /containers/create`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerCreateRequest {
    /// Image reference (`image:tag`).
    pub image: String,
    /// Open stdin.
    pub open_stdin: bool,
    /// TTY allocation.
    pub tty: bool,
    /// Container-side volume paths declared on the container.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub volumes: BTreeMap<String, EmptyObject>,
    /// Exposed ports, keyed `port/protocol`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposed_ports: Option<BTreeMap<String, EmptyObject>>,
    /// Host config.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_config: Option<HostConfig>,
    /// Networking config.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub networking_config: Option<NetworkingConfig>,
}

/// Host configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostConfig {
    /// Network mode.
    pub network_mode: String,
    /// Restart policy.
    pub restart_policy: RestartPolicy,
    /// Port bindings, keyed like `ExposedPorts`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_bindings: Option<BTreeMap<String, Vec<PortBinding>>>,
    /// Binds (`hostPath:containerPath` volume mounts).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binds: Option<Vec<String>>,
    pub publish_all_ports: bool,
    /// Auto remove container when it exits.
    pub auto_remove: bool,
    /// Privileged mode.
    pub privileged: bool,
    /// Run an init process inside the container.
    pub init: bool,
}

/// Port binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PortBinding {
    /// Host port.
    pub host_port: String,
}

/// Restart policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RestartPolicy {
    /// Policy name.
    pub name: String,
}

/// Networking configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkingConfig {
    /// Endpoints config, keyed by network name.
    pub endpoints_config: BTreeMap<String, EndpointSettings>,
}

/// Per-network endpoint settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSettings {
    #[serde(rename = "IPAMConfig")]
    pub ipam_config: EndpointIpamConfig,
}

/// Static address assignment; left empty so the engine allocates addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointIpamConfig {
    #[serde(rename = "IPv4Address")]
    pub ipv4_address: String,
    #[serde(rename = "IPv6Address")]
    pub ipv6_address: String,
}

/// Entry of `GET /containers/json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSummary {
    pub id: ContainerId,
    /// Names, each with a leading `/`.
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub state: Option<String>,
}

impl ContainerSummary {
    /// Whether one of the container's names is exactly `name`
    pub fn has_name(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.strip_prefix('/').unwrap_or(n) == name)
    }
}

/// Response of `POST /containers/create` through Portainer.
///
/// Portainer adds a `Portainer` object carrying the resource control it attached to the new
/// container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerCreateResponse {
    pub id: ContainerId,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub portainer: Option<PortainerMetadata>,
}

impl ContainerCreateResponse {
    pub fn resource_control_id(&self) -> Option<ResourceControlId> {
        self.portainer.as_ref()?.resource_control.as_ref().map(|rc| rc.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PortainerMetadata {
    #[serde(default)]
    pub resource_control: Option<ResourceControlRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceControlRef {
    pub id: ResourceControlId,
}

/// One line of the `POST /images/create` progress stream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullProgress {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `X-Registry-Auth` payload for pulls from a registry that needs no credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryAuth {
    pub serveraddress: String,
}

/// The engine sends `"Warnings": null` when there is nothing to report.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
