use crate::types::Step;
use thiserror::Error as ThisError;

/// Transport-level failure of a single call against the Portainer API or its Docker proxy.
#[derive(ThisError, Debug)]
pub enum ApiError {
    /// Connection, TLS, timeout or body decoding failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a status the call does not accept
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request URL could not be built from the configured base URL
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The Docker engine reported a failure inside an otherwise successful response stream
    #[error("{0}")]
    Engine(String),
}

impl ApiError {
    /// HTTP status of the failed call, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Failure of a deployment run.
///
/// Every variant is terminal: the workflow stops at the first error and does not roll back the
/// steps that already completed. [`Error::step`] identifies the step that failed.
#[derive(ThisError, Debug)]
pub enum Error {
    /// Malformed or missing configuration (port specs, volumes, required values)
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Failed to authenticate against Portainer: {source}")]
    Auth {
        #[source]
        source: ApiError,
    },

    #[error("Failed to list Portainer endpoints: {source}")]
    EndpointLookup {
        #[source]
        source: ApiError,
    },

    #[error("Endpoint with name '{name}' not found")]
    EndpointNotFound { name: String },

    #[error("Failed to remove old container '{container}': {source}")]
    Cleanup {
        container: String,
        #[source]
        source: ApiError,
    },

    #[error("Failed to pull image '{image}': {source}")]
    Pull {
        image: String,
        #[source]
        source: ApiError,
    },

    #[error("Failed to create container '{name}': {source}")]
    Create {
        name: String,
        #[source]
        source: ApiError,
    },

    #[error("Team with name '{team}' not found")]
    TeamNotFound { team: String },

    #[error("Failed to apply access control: {message}")]
    AccessControl {
        message: String,
        #[source]
        source: Option<ApiError>,
    },
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config { message: message.into() }
    }

    /// The workflow step this error aborted
    pub fn step(&self) -> Step {
        match self {
            Error::Config { .. } => Step::Configure,
            Error::Auth { .. } => Step::Authenticate,
            Error::EndpointLookup { .. } | Error::EndpointNotFound { .. } => Step::ResolveEndpoint,
            Error::Cleanup { .. } => Step::RemoveOldContainers,
            Error::Pull { .. } => Step::PullImage,
            Error::Create { .. } => Step::CreateContainer,
            Error::TeamNotFound { .. } | Error::AccessControl { .. } => Step::ApplyAccessControl,
        }
    }

    /// Whether the run had already changed the endpoint when it failed.
    ///
    /// Old containers are removed before the pull, so anything from the pull onwards leaves the
    /// endpoint without the previous container; access control failures leave the new container
    /// running without its restrictions.
    pub fn side_effects(&self) -> Option<&'static str> {
        match self.step() {
            Step::Configure | Step::Authenticate | Step::ResolveEndpoint => None,
            Step::RemoveOldContainers => Some("some old containers may already have been removed"),
            Step::PullImage | Step::CreateContainer => Some("old containers were removed but no new container was created"),
            Step::ApplyAccessControl => Some("the new container exists but its access control was not applied"),
        }
    }
}
