//! Business logic services

pub mod auth;
pub mod catalog;
pub mod circulation;
pub mod stats;

use crate::{
    config::{AuthConfig, CirculationConfig},
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub circulation: circulation::CirculationService,
    pub stats: stats::StatsService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(
        repository: Repository,
        auth_config: AuthConfig,
        circulation_config: CirculationConfig,
    ) -> Self {
        Self {
            auth: auth::AuthService::new(repository.clone(), auth_config),
            catalog: catalog::CatalogService::new(repository.clone()),
            circulation: circulation::CirculationService::new(
                repository.clone(),
                circulation_config.clone(),
            ),
            stats: stats::StatsService::new(repository, circulation_config.fine_per_day),
        }
    }
}
