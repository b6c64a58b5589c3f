//! Portainer management API request and response bodies.

use serde::{Deserialize, Serialize};

use crate::types::{EndpointId, TeamId};

/// Body of `POST /auth`.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticateRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Response of `POST /auth`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticateResponse {
    pub jwt: String,
}

/// Entry of `GET /endpoints`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Endpoint {
    pub id: EndpointId,
    #[serde(default)]
    pub name: Option<String>,
}

/// Entry of `GET /teams`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Team {
    pub id: TeamId,
    pub name: String,
}

/// Body of `PUT /resource_controls/{id}`.
///
/// `AdministratorsOnly` is only sent when set, so the default payload is just the public flag
/// and the team list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceControlUpdate {
    pub public: bool,
    pub teams: Vec<TeamId>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub administrators_only: bool,
}
