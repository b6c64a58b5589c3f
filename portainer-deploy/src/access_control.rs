//! Access control for the created container.
//!
//! Portainer attaches a resource control to every container created through its proxy. After
//! creation the configured team names are resolved against the team list and the resource
//! control is updated with the team ids and the public flag in a single call.

use std::collections::HashMap;
use tracing::{debug, info, instrument};

use crate::config::AccessConfig;
use crate::errors::Error;
use crate::portainer::{PortainerApi, ResourceControlUpdate, Team};
use crate::types::{Credential, ResourceControlId, TeamId};

/// Team name to id lookup, built from one `GET /teams` response.
#[derive(Debug, Clone, Default)]
pub struct TeamMap(HashMap<String, TeamId>);

impl TeamMap {
    /// Build the lookup. If Portainer reports the same name twice, the first team wins.
    pub fn from_teams(teams: Vec<Team>) -> Self {
        let mut map = HashMap::with_capacity(teams.len());
        for team in teams {
            map.entry(team.name).or_insert(team.id);
        }
        Self(map)
    }

    pub fn get(&self, name: &str) -> Option<TeamId> {
        self.0.get(name).copied()
    }

    /// Resolve every name, in order. The first unknown name aborts with [`Error::TeamNotFound`].
    pub fn resolve(&self, names: &[String]) -> Result<Vec<TeamId>, Error> {
        names
            .iter()
            .map(|name| self.get(name).ok_or_else(|| Error::TeamNotFound { team: name.clone() }))
            .collect()
    }
}

/// Build the resource control update for `settings` against an already fetched team map.
pub fn build_update(teams: &TeamMap, settings: &AccessConfig) -> Result<ResourceControlUpdate, Error> {
    Ok(ResourceControlUpdate {
        public: settings.public,
        teams: teams.resolve(&settings.teams)?,
        administrators_only: settings.administrators_only,
    })
}

/// Restrict the resource control `resource_control_id` to the configured teams and visibility.
#[instrument(skip(api, credential, settings), fields(teams = ?settings.teams, public = settings.public))]
pub async fn apply_access_control<P>(
    api: &P,
    credential: &Credential,
    resource_control_id: ResourceControlId,
    settings: &AccessConfig,
) -> Result<ResourceControlUpdate, Error>
where
    P: PortainerApi + ?Sized,
{
    let teams = api.list_teams(credential).await.map_err(|e| Error::AccessControl {
        message: "failed to list teams".to_string(),
        source: Some(e),
    })?;
    debug!(count = teams.len(), "Fetched Portainer teams");

    let update = build_update(&TeamMap::from_teams(teams), settings)?;

    api.update_resource_control(credential, resource_control_id, &update)
        .await
        .map_err(|e| Error::AccessControl {
            message: format!("failed to update resource control {resource_control_id}"),
            source: Some(e),
        })?;

    info!(
        resource_control_id,
        team_ids = ?update.teams,
        public = update.public,
        administrators_only = update.administrators_only,
        "Access control applied"
    );
    Ok(update)
}
