//! Business logic services

pub mod catalog;
pub mod circulation;
pub mod coordinator;
pub mod fines;
pub mod reports;
pub mod returns;
pub mod scans;
pub mod shelves;

use crate::{config::AppConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub shelves: shelves::ShelvesService,
    pub circulation: circulation::CirculationService,
    pub fines: fines::FinesService,
    pub reports: reports::ReportsService,
    pub scans: scans::ScanPoller,
    pub coordinator: coordinator::RequestCoordinator,
}

impl Services {
    /// Create all services over one repository, sharing a single request coordinator.
    ///
    /// Fails when the configured circulation settings are out of range.
    pub fn new(repository: Repository, config: &AppConfig) -> AppResult<Self> {
        let coordinator = coordinator::RequestCoordinator::new(&config.coordinator);

        let shelves = shelves::ShelvesService::new(repository.clone(), coordinator.clone());
        let fines = fines::FinesService::new(repository.clone(), coordinator.clone());

        let circulation = circulation::CirculationService::new(
            repository.clone(),
            coordinator.clone(),
            fines.clone(),
            config.circulation.fine_per_day,
        )?;

        Ok(Self {
            catalog: catalog::CatalogService::new(repository.clone(), coordinator.clone(), shelves.clone()),
            circulation,
            reports: reports::ReportsService::new(repository.clone(), coordinator.clone()),
            scans: scans::ScanPoller::new(repository.scans, &config.scanner),
            shelves,
            fines,
            coordinator,
        })
    }
}
