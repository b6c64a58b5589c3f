//! Deployment configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `deploy.yaml` but can be specified via `-f` flag or the
//! `PORTAINER_DEPLOY_CONFIG` environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `deploy.yaml`)
//! 2. **Environment variables** - Variables prefixed with `PORTAINER_DEPLOY_` override YAML values
//! 3. **PORTAINER_PASSWORD** - Special case: overrides `portainer.password` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `PORTAINER_DEPLOY_CONTAINER__TAG=1.4.2` sets the `container.tag` field, which is how a build
//! pipeline usually injects the version it just built.
//!
//! ## Configuration Structure
//!
//! - **portainer**: API URL, credentials, target endpoint name, TLS and timeout settings
//! - **container**: image, tag, container name, registry, published ports, restart policy, volumes
//! - **access**: teams, administrators-only and public flags applied to the created container
//!
//! See `deploy.example.yaml` at the repository root for an annotated example.
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Deploy the tag produced by this pipeline run
//! PORTAINER_DEPLOY_CONTAINER__TAG=1.4.2
//!
//! # Provide the Portainer password without writing it to the config file
//! PORTAINER_PASSWORD=...
//!
//! # Target a different endpoint
//! PORTAINER_DEPLOY_PORTAINER__ENDPOINT=staging
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, time::Duration};
use url::Url;

use crate::container_spec::{parse_published_ports, validate_volumes};
use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "PORTAINER_DEPLOY_CONFIG", default_value = "deploy.yaml")]
    pub config: String,

    /// Validate configuration, print the container payload and exit without contacting Portainer.
    #[arg(long)]
    pub validate: bool,

    /// Log debug output for this crate (including HTTP bodies) unless RUST_LOG is set
    #[arg(short, long)]
    pub verbose: bool,
}

/// Root configuration for a deployment run.
///
/// Immutable once loaded; the workflow only ever borrows it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Connection to the Portainer management API
    pub portainer: PortainerConfig,
    /// The container to (re)create
    pub container: ContainerConfig,
    /// Access restrictions applied to the created container
    #[serde(default)]
    pub access: AccessConfig,
}

/// Portainer connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PortainerConfig {
    /// Base URL of the Portainer API (e.g. "https://portainer.example.com:9443/api/")
    pub url: Url,
    /// Portainer user name
    pub login: String,
    /// Portainer password. Prefer the PORTAINER_PASSWORD environment variable.
    #[serde(skip_serializing)]
    pub password: String,
    /// Name of the endpoint (Docker host) to deploy to
    pub endpoint: String,
    /// Disable TLS certificate and hostname verification for all Portainer calls.
    ///
    /// Only meant for endpoints with self-signed certificates; every run logs a warning while
    /// this is enabled.
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Timeout for management API calls (auth, endpoints, teams, resource controls)
    #[serde(default = "PortainerConfig::default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Connect and per-read timeout for calls proxied to the Docker engine. There is no limit on
    /// the whole call: an image pull streams progress for as long as the download takes and
    /// only fails when the engine goes quiet for longer than this.
    #[serde(default = "PortainerConfig::default_engine_timeout", with = "humantime_serde")]
    pub engine_timeout: Duration,
}

impl PortainerConfig {
    fn default_request_timeout() -> Duration {
        Duration::from_secs(30)
    }

    fn default_engine_timeout() -> Duration {
        Duration::from_secs(120)
    }
}

/// Restart policy kinds understood by the Docker engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicyKind {
    #[default]
    No,
    Always,
    UnlessStopped,
    OnFailure,
}

impl RestartPolicyKind {
    /// Name as sent in `HostConfig.RestartPolicy.Name`
    pub fn as_str(&self) -> &'static str {
        match self {
            RestartPolicyKind::No => "no",
            RestartPolicyKind::Always => "always",
            RestartPolicyKind::UnlessStopped => "unless-stopped",
            RestartPolicyKind::OnFailure => "on-failure",
        }
    }
}

/// Container to deploy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerConfig {
    /// Image repository, without tag (e.g. "registry.example.com/team/app")
    pub image: String,
    /// Image tag
    pub tag: String,
    /// Container name. Existing containers with this name are removed first.
    pub name: String,
    /// Registry address passed to the engine when pulling
    pub registry: String,
    /// Comma-separated `protocol/containerPort/hostPort` entries, e.g. "tcp/8080/80,udp/53/53"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_ports: Option<String>,
    #[serde(default)]
    pub restart_policy: RestartPolicyKind,
    /// Host directory or named volume -> container directory
    #[serde(default)]
    pub volumes: BTreeMap<String, String>,
    /// Only send the host config (binds, restart policy, port bindings) when ports are published.
    ///
    /// Older deployments relied on this: without published ports the container was created with
    /// engine defaults and the configured volumes were not bound.
    #[serde(default)]
    pub legacy_volume_binds: bool,
}

impl ContainerConfig {
    /// Full image reference, `image:tag`
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }
}

/// Access control applied to the created container.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccessConfig {
    /// Names of the Portainer teams granted access
    pub teams: Vec<String>,
    /// Restrict the container to Portainer administrators
    pub administrators_only: bool,
    /// Make the container visible to every Portainer user
    pub public: bool,
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables override specific values. PORTAINER_DEPLOY_CONFIG names the
            // file itself and is not a config key.
            .merge(Env::prefixed("PORTAINER_DEPLOY_").ignore(&["CONFIG"]).split("__"))
            // Pipelines usually expose the secret under a plain name
            .merge(Env::raw().only(&["PORTAINER_PASSWORD"]).map(|_| "portainer.password".into()))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        let required = [
            ("portainer.login", &self.portainer.login),
            ("portainer.password", &self.portainer.password),
            ("portainer.endpoint", &self.portainer.endpoint),
            ("container.image", &self.container.image),
            ("container.tag", &self.container.tag),
            ("container.name", &self.container.name),
            ("container.registry", &self.container.registry),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(Error::config(format!("{field} must not be empty")));
            }
        }

        if !matches!(self.portainer.url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "portainer.url must be an http(s) URL, got '{}'",
                self.portainer.url
            )));
        }

        if self.portainer.request_timeout.is_zero() || self.portainer.engine_timeout.is_zero() {
            return Err(Error::config("portainer.request_timeout and portainer.engine_timeout must be positive"));
        }

        if let Some(ports) = &self.container.published_ports {
            parse_published_ports(ports)?;
        }
        validate_volumes(&self.container.volumes)?;

        if self.access.teams.iter().any(|team| team.trim().is_empty()) {
            return Err(Error::config("access.teams must not contain empty team names"));
        }

        Ok(())
    }
}
