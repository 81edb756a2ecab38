use std::collections::HashMap;

use crate::config::Config;
use crate::model::{Application, ServiceEntry};

/// Listing entry for an enabled GUI application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSummary<'a> {
    pub id: &'a str,
    pub display_name: &'a str,
    pub owning_user: &'a str,
}

/// Immutable view of the configured applications and services, built once
/// per run and borrowed by everything that needs it.
#[derive(Debug, Clone)]
pub struct Registry {
    interactive_user: String,
    applications: Vec<Application>,
    services: Vec<ServiceEntry>,
    conflicts: HashMap<String, Vec<String>>,
}

impl Registry {
    pub fn new(
        interactive_user: String,
        applications: Vec<Application>,
        services: Vec<ServiceEntry>,
    ) -> Self {
        let conflicts = conflict_table(&services);
        Self {
            interactive_user,
            applications,
            services,
            conflicts,
        }
    }

    pub fn from_config(config: &Config, interactive_user: String) -> Self {
        Self::new(
            interactive_user,
            config.applications.clone(),
            config.services.clone(),
        )
    }

    pub fn interactive_user(&self) -> &str {
        &self.interactive_user
    }

    pub fn applications(&self) -> &[Application] {
        &self.applications
    }

    pub fn services(&self) -> &[ServiceEntry] {
        &self.services
    }

    /// Enabled GUI applications in configuration order.
    pub fn list_enabled_gui_applications(&self) -> Vec<AppSummary<'_>> {
        self.enabled_gui()
            .map(|app| AppSummary {
                id: &app.id,
                display_name: &app.display_name,
                owning_user: app.user.as_deref().unwrap_or(&self.interactive_user),
            })
            .collect()
    }

    pub fn enabled_gui_ids(&self) -> Vec<&str> {
        self.enabled_gui().map(|app| app.id.as_str()).collect()
    }

    pub fn enabled_gui_application(&self, app_id: &str) -> Option<&Application> {
        self.enabled_gui().find(|app| app.id == app_id)
    }

    /// Service behind an enabled GUI application.
    pub fn resolve_service(&self, app_id: &str) -> Option<&ServiceEntry> {
        let app = self.enabled_gui_application(app_id)?;
        self.service(app.service_id())
    }

    pub fn service(&self, service_id: &str) -> Option<&ServiceEntry> {
        self.services.iter().find(|s| s.id == service_id)
    }

    /// Services that must be stopped before `service_id` may run. Never
    /// contains `service_id` itself.
    pub fn conflicts_of(&self, service_id: &str) -> &[String] {
        self.conflicts
            .get(service_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn enabled_gui(&self) -> impl Iterator<Item = &Application> {
        self.applications
            .iter()
            .filter(|app| app.enabled && app.is_gui_frontend())
    }
}

fn conflict_table(services: &[ServiceEntry]) -> HashMap<String, Vec<String>> {
    services
        .iter()
        .map(|svc| {
            let others: Vec<String> = match &svc.conflicts {
                Some(explicit) => explicit
                    .iter()
                    .filter(|id| **id != svc.id)
                    .cloned()
                    .collect(),
                None => services
                    .iter()
                    .filter(|other| other.id != svc.id)
                    .map(|other| other.id.clone())
                    .collect(),
            };
            (svc.id.clone(), others)
        })
        .collect()
}
