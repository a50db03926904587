//! Station identity and idempotent self-registration.

use std::sync::OnceLock;

use sitelink_cloud::{CloudClient, StationRegistration};

use crate::config::StationConfig;
use crate::error::Result;

/// The configured station id and, once known, the backend record id.
#[derive(Debug)]
pub struct StationIdentity {
    configured_id: String,
    resolved_id: OnceLock<i64>,
}

impl StationIdentity {
    pub fn new(configured_id: impl Into<String>) -> Self {
        Self {
            configured_id: configured_id.into(),
            resolved_id: OnceLock::new(),
        }
    }

    pub fn configured_id(&self) -> &str {
        &self.configured_id
    }

    pub fn resolved_id(&self) -> Option<i64> {
        self.resolved_id.get().copied()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_id.get().is_some()
    }

    /// Record the backend id. Only the first call has an effect.
    pub fn resolve(&self, id: i64) -> i64 {
        *self.resolved_id.get_or_init(|| id)
    }

    /// Id to use in backend paths: the record id when known.
    pub fn station_id(&self) -> String {
        match self.resolved_id() {
            Some(id) => id.to_string(),
            None => self.configured_id.clone(),
        }
    }
}

/// Find this station's backend record, creating it if needed.
///
/// Looks the station up by name first. When nothing matches, registers it;
/// if registration fails the lookup is repeated once. Returns `None` when
/// the station could not be resolved; the caller keeps using the
/// configured id.
pub async fn resolve_station(
    cloud: &CloudClient,
    station: &StationConfig,
    identity: &StationIdentity,
) -> Result<Option<i64>> {
    if let Some(id) = identity.resolved_id() {
        return Ok(Some(id));
    }

    let name = station.name();

    if let Some(existing) = cloud.get_base_station_by_name(name).await? {
        tracing::info!(station = %name, id = existing.id, "Found station record");
        return Ok(Some(identity.resolve(existing.id)));
    }

    let registration = StationRegistration {
        name: name.to_string(),
        location: station.location.clone(),
        latitude: station.latitude,
        longitude: station.longitude,
        description: station.description.clone(),
    };

    match cloud.register_station(&registration).await {
        Ok(created) => {
            tracing::info!(station = %name, id = created.id, "Registered station");
            Ok(Some(identity.resolve(created.id)))
        }
        Err(e) => {
            tracing::warn!(station = %name, error = %e, "Station registration failed, looking up again");

            match cloud.get_base_station_by_name(name).await? {
                Some(existing) => {
                    tracing::info!(station = %name, id = existing.id, "Found station record");
                    Ok(Some(identity.resolve(existing.id)))
                }
                None => {
                    tracing::warn!(
                        station = %name,
                        fallback = %identity.configured_id(),
                        "Station could not be resolved, using configured id"
                    );
                    Ok(None)
                }
            }
        }
    }
}
