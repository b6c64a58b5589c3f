//! Translation of the container configuration into the engine's container-create payload.
//!
//! Published ports are written as `protocol/containerPort/hostPort` triples separated by commas,
//! e.g. `tcp/8080/80,udp/53/53`. Each triple exposes `containerPort/protocol` on the container and
//! binds it to `hostPort` on the host. Volumes map a host directory or named volume to a
//! container directory and become both a declared container volume and a `host:container` bind.
//!
//! The network mode is always `bridge`. When ports are published, the payload also carries a
//! networking config for the bridge network with empty IPAM addresses so the engine allocates
//! them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::config::ContainerConfig;
use crate::docker::models::{
    ContainerCreateRequest, EmptyObject, EndpointIpamConfig, EndpointSettings, HostConfig, NetworkingConfig, PortBinding, RestartPolicy,
};
use crate::errors::Error;

const NETWORK_MODE: &str = "bridge";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
    Sctp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Sctp => "sctp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            "sctp" => Ok(Protocol::Sctp),
            other => Err(format!("unknown protocol '{other}' (expected tcp, udp or sctp)")),
        }
    }
}

/// One parsed `protocol/containerPort/hostPort` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishedPort {
    pub protocol: Protocol,
    pub container_port: u16,
    pub host_port: u16,
}

impl PublishedPort {
    /// Key used in `ExposedPorts` and `PortBindings`, e.g. `8080/tcp`
    pub fn key(&self) -> String {
        format!("{}/{}", self.container_port, self.protocol)
    }
}

impl FromStr for PublishedPort {
    type Err = Error;

    fn from_str(entry: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = entry.split('/').map(str::trim).collect();
        let [protocol, container_port, host_port] = segments.as_slice() else {
            return Err(Error::config(format!(
                "published port '{}' must have the form protocol/containerPort/hostPort",
                entry.trim()
            )));
        };

        let protocol = protocol
            .parse::<Protocol>()
            .map_err(|e| Error::config(format!("published port '{}': {e}", entry.trim())))?;
        let parse_port = |value: &str, what: &str| -> Result<u16, Error> {
            match value.parse::<u16>() {
                Ok(port) if port > 0 => Ok(port),
                _ => Err(Error::config(format!(
                    "published port '{}': invalid {what} '{value}'",
                    entry.trim()
                ))),
            }
        };

        Ok(PublishedPort {
            protocol,
            container_port: parse_port(*container_port, "container port")?,
            host_port: parse_port(*host_port, "host port")?,
        })
    }
}

/// Parse a comma-separated list of published ports.
///
/// Blank entries (a trailing comma, or an entirely blank string) are ignored; any other entry
/// that is not a valid triple fails the whole list.
pub fn parse_published_ports(spec: &str) -> Result<Vec<PublishedPort>, Error> {
    spec.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(str::parse::<PublishedPort>)
        .collect()
}

/// Check that every volume has a source and an absolute container path.
pub fn validate_volumes(volumes: &BTreeMap<String, String>) -> Result<(), Error> {
    for (source, target) in volumes {
        if source.trim().is_empty() {
            return Err(Error::config(format!("volume for '{target}' has an empty host path or volume name")));
        }
        if !target.trim().starts_with('/') {
            return Err(Error::config(format!(
                "volume '{source}' must map to an absolute container path, got '{target}'"
            )));
        }
    }
    Ok(())
}

/// `hostPath:containerPath` bind strings, one per volume entry
pub fn volume_binds(volumes: &BTreeMap<String, String>) -> Vec<String> {
    volumes
        .iter()
        .map(|(source, target)| format!("{}:{}", source.trim(), target.trim()))
        .collect()
}

/// Build the container-create payload for `config`.
///
/// Fails with [`Error::Config`] on malformed published ports or volumes; nothing is sent to the
/// engine in that case.
pub fn build_container_spec(config: &ContainerConfig) -> Result<ContainerCreateRequest, Error> {
    let ports = match &config.published_ports {
        Some(spec) => parse_published_ports(spec)?,
        None => Vec::new(),
    };
    validate_volumes(&config.volumes)?;

    let mut request = ContainerCreateRequest {
        image: config.image_ref(),
        open_stdin: false,
        tty: false,
        volumes: config
            .volumes
            .values()
            .map(|target| (target.trim().to_string(), EmptyObject {}))
            .collect(),
        ..Default::default()
    };

    if ports.is_empty() && config.legacy_volume_binds {
        // Engine defaults for everything host-related, binds included
        return Ok(request);
    }

    let mut host_config = HostConfig {
        network_mode: NETWORK_MODE.to_string(),
        restart_policy: RestartPolicy {
            name: config.restart_policy.as_str().to_string(),
        },
        ..Default::default()
    };

    if !config.volumes.is_empty() {
        host_config.binds = Some(volume_binds(&config.volumes));
    }

    if !ports.is_empty() {
        let mut exposed_ports = BTreeMap::new();
        let mut port_bindings: BTreeMap<String, Vec<PortBinding>> = BTreeMap::new();
        for port in &ports {
            exposed_ports.insert(port.key(), EmptyObject {});
            port_bindings.entry(port.key()).or_default().push(PortBinding {
                host_port: port.host_port.to_string(),
            });
        }
        host_config.port_bindings = Some(port_bindings);
        request.exposed_ports = Some(exposed_ports);

        let mut endpoints_config = BTreeMap::new();
        endpoints_config.insert(
            NETWORK_MODE.to_string(),
            EndpointSettings {
                ipam_config: EndpointIpamConfig::default(),
            },
        );
        request.networking_config = Some(NetworkingConfig { endpoints_config });
    }

    request.host_config = Some(host_config);
    Ok(request)
}

/// Pretty-printed JSON of the payload [`build_container_spec`] produces, as shown by `--validate`
pub fn render_container_spec(config: &ContainerConfig) -> Result<String, Error> {
    let spec = build_container_spec(config)?;
    serde_json::to_string_pretty(&spec).map_err(|e| Error::config(format!("failed to serialize container payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RestartPolicyKind;
    use serde_json::json;

    fn container(ports: Option<&str>) -> ContainerConfig {
        ContainerConfig {
            image: "app".into(),
            tag: "1.0".into(),
            name: "app-1".into(),
            registry: "registry.example.com".into(),
            published_ports: ports.map(String::from),
            restart_policy: RestartPolicyKind::UnlessStopped,
            volumes: BTreeMap::new(),
            legacy_volume_binds: false,
        }
    }

    #[test]
    fn test_parse_published_ports() {
        let ports = parse_published_ports("tcp/8080/80,udp/53/53").unwrap();
        assert_eq!(
            ports,
            vec![
                PublishedPort {
                    protocol: Protocol::Tcp,
                    container_port: 8080,
                    host_port: 80,
                },
                PublishedPort {
                    protocol: Protocol::Udp,
                    container_port: 53,
                    host_port: 53,
                },
            ]
        );
        assert_eq!(ports[0].key(), "8080/tcp");
        assert_eq!(ports[1].key(), "53/udp");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let ports = parse_published_ports(" tcp / 8080 / 80 ,  UDP/53/5353 ").unwrap();
        assert_eq!(ports[0].key(), "8080/tcp");
        assert_eq!(ports[0].host_port, 80);
        assert_eq!(ports[1].key(), "53/udp");
        assert_eq!(ports[1].host_port, 5353);
    }

    #[test]
    fn test_parse_ignores_blank_entries() {
        assert_eq!(parse_published_ports("tcp/8080/80,").unwrap().len(), 1);
        assert!(parse_published_ports("  ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_wrong_segment_count() {
        for spec in ["tcp/8080", "tcp/8080/80/1", "8080", "tcp/8080/80,udp/53"] {
            let err = parse_published_ports(spec).unwrap_err();
            assert!(matches!(err, Error::Config { .. }), "{spec} should be a config error");
            assert!(err.to_string().contains("protocol/containerPort/hostPort"));
        }
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        assert!(parse_published_ports("http/8080/80").unwrap_err().to_string().contains("unknown protocol"));
        assert!(parse_published_ports("tcp/eighty/80").unwrap_err().to_string().contains("container port"));
        assert!(parse_published_ports("tcp/8080/70000").unwrap_err().to_string().contains("host port"));
        assert!(parse_published_ports("tcp/0/80").is_err());
    }

    #[test]
    fn test_spec_with_ports() {
        let spec = build_container_spec(&container(Some("tcp/8080/80,udp/53/53"))).unwrap();

        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            json!({
                "Image": "app:1.0",
                "OpenStdin": false,
                "Tty": false,
                "ExposedPorts": {"8080/tcp": {}, "53/udp": {}},
                "HostConfig": {
                    "NetworkMode": "bridge",
                    "RestartPolicy": {"Name": "unless-stopped"},
                    "PortBindings": {
                        "8080/tcp": [{"HostPort": "80"}],
                        "53/udp": [{"HostPort": "53"}]
                    },
                    "PublishAllPorts": false,
                    "AutoRemove": false,
                    "Privileged": false,
                    "Init": false
                },
                "NetworkingConfig": {
                    "EndpointsConfig": {
                        "bridge": {"IPAMConfig": {"IPv4Address": "", "IPv6Address": ""}}
                    }
                }
            })
        );
    }

    #[test]
    fn test_duplicate_port_keys_accumulate_bindings() {
        let spec = build_container_spec(&container(Some("tcp/8080/80,tcp/8080/8080"))).unwrap();
        let bindings = spec.host_config.unwrap().port_bindings.unwrap();
        assert_eq!(bindings["8080/tcp"].len(), 2);
        assert_eq!(spec.exposed_ports.unwrap().len(), 1);
    }

    #[test]
    fn test_volumes_become_binds_and_declared_volumes() {
        let mut config = container(Some("tcp/8080/80"));
        config.volumes.insert("/srv/app/data".into(), "/data".into());
        config.volumes.insert("app-logs".into(), "/var/log/app".into());

        let spec = build_container_spec(&config).unwrap();

        let declared: Vec<_> = spec.volumes.keys().cloned().collect();
        assert_eq!(declared, vec!["/data".to_string(), "/var/log/app".to_string()]);

        let binds = spec.host_config.unwrap().binds.unwrap();
        assert_eq!(binds.len(), 2);
        assert!(binds.contains(&"/srv/app/data:/data".to_string()));
        assert!(binds.contains(&"app-logs:/var/log/app".to_string()));
    }

    #[test]
    fn test_no_ports_still_binds_volumes() {
        let mut config = container(None);
        config.volumes.insert("/srv/app/data".into(), "/data".into());

        let spec = build_container_spec(&config).unwrap();

        assert!(spec.exposed_ports.is_none());
        assert!(spec.networking_config.is_none());
        let host_config = spec.host_config.unwrap();
        assert!(host_config.port_bindings.is_none());
        assert_eq!(host_config.binds, Some(vec!["/srv/app/data:/data".to_string()]));
        assert_eq!(host_config.restart_policy.name, "unless-stopped");
    }

    #[test]
    fn test_legacy_mode_drops_host_config_without_ports() {
        let mut config = container(Some(""));
        config.legacy_volume_binds = true;
        config.volumes.insert("/srv/app/data".into(), "/data".into());

        let spec = build_container_spec(&config).unwrap();

        assert!(spec.host_config.is_none());
        assert!(spec.exposed_ports.is_none());
        assert!(spec.networking_config.is_none());
        // The container still declares the volume, it is just not bound to the host path
        assert!(spec.volumes.contains_key("/data"));
    }

    #[test]
    fn test_legacy_mode_with_ports_matches_default() {
        let mut config = container(Some("tcp/8080/80"));
        config.volumes.insert("/srv/app/data".into(), "/data".into());
        let fixed = build_container_spec(&config).unwrap();

        config.legacy_volume_binds = true;
        let legacy = build_container_spec(&config).unwrap();

        assert_eq!(fixed, legacy);
    }

    #[test]
    fn test_malformed_ports_fail_spec() {
        assert!(matches!(
            build_container_spec(&container(Some("tcp/8080"))),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_volume_validation() {
        let mut volumes = BTreeMap::new();
        volumes.insert("/srv".to_string(), "/data".to_string());
        assert!(validate_volumes(&volumes).is_ok());

        volumes.insert("logs".to_string(), "logs".to_string());
        assert!(validate_volumes(&volumes).unwrap_err().to_string().contains("absolute container path"));

        let mut volumes = BTreeMap::new();
        volumes.insert(" ".to_string(), "/data".to_string());
        assert!(validate_volumes(&volumes).is_err());
    }

    #[test]
    fn test_render_container_spec() {
        let rendered = render_container_spec(&container(Some("tcp/8080/80"))).unwrap();

        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value, serde_json::to_value(build_container_spec(&container(Some("tcp/8080/80"))).unwrap()).unwrap());
        assert_eq!(value["HostConfig"]["RestartPolicy"]["Name"], "unless-stopped");
        assert!(rendered.contains('\n'));

        let err = render_container_spec(&container(Some("tcp/8080"))).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
