use std::path::PathBuf;

use crate::backend::detach::{self, Continuation};
use crate::backend::users::{self, UserInfo};
use crate::backend::{
    status, AutostartConfigurator, Registry, SelfReexec, ServiceControl, ShellController,
    ShortcutInstaller, Switcher,
};
use crate::config::Config;
use crate::error::ConfigError;
use crate::util::Owner;

/// Everything one invocation needs: the loaded configuration, the registry
/// built from it, and who we are running for.
pub struct App {
    config: Config,
    config_path: Option<PathBuf>,
    registry: Registry,
    user: Option<UserInfo>,
    current_user: String,
}

impl App {
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = Config::load(config_path.as_deref(), users::elevated_by_sudo())?;
        let username = config.interactive_user()?;
        let user = users::lookup(&username);
        if user.is_none() {
            log::warn!("User {} not found in the passwd database", username);
        }
        let registry = Registry::from_config(&config, username);
        let current_user = users::current_username()
            .unwrap_or_else(|| registry.interactive_user().to_string());

        Ok(Self {
            config,
            config_path,
            registry,
            user,
            current_user,
        })
    }

    fn home(&self) -> PathBuf {
        if let Some(user) = &self.user {
            return user.home.clone();
        }
        let name = self.registry.interactive_user();
        if name == self.current_user {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
        PathBuf::from("/home").join(name)
    }

    fn owner(&self) -> Option<Owner> {
        self.user.as_ref().map(UserInfo::owner)
    }

    fn autostart(&self) -> AutostartConfigurator<'_> {
        let path = self
            .config
            .shell_startup
            .clone()
            .unwrap_or_else(|| self.home().join(".bashrc"));
        AutostartConfigurator::new(
            &self.registry,
            path,
            self.config.install_path.clone(),
            self.config_path.clone(),
            self.owner(),
        )
    }

    fn shortcuts(&self) -> ShortcutInstaller<'_> {
        let home = self.home();
        ShortcutInstaller {
            registry: &self.registry,
            install_path: self.config.install_path.clone(),
            config: self.config_path.clone(),
            shortcut_dir: self.config.shortcut_dir.clone(),
            icons_dir: self
                .config
                .icons_dir
                .clone()
                .unwrap_or_else(|| home.join("Pictures/icons")),
            media_dir: self.config.media_dir.clone(),
            ports_dir: self
                .config
                .ports_dir
                .clone()
                .unwrap_or_else(|| home.join("RetroPie/roms/ports")),
            port_images_dir: self.config.port_images_dir.clone(),
            sudoers_path: self.config.sudoers_path.clone(),
            owner: self.owner(),
        }
    }

    fn controller(&self) -> ShellController<'_> {
        ShellController::new(&self.registry, self.current_user.clone())
    }

    fn detacher(&self) -> SelfReexec {
        let exe = std::env::current_exe().unwrap_or_else(|e| {
            log::warn!("Cannot determine current executable: {}", e);
            self.config.install_path.clone()
        });
        SelfReexec {
            exe,
            config: self.config_path.clone(),
            log_path: self.config.detach_log.clone(),
        }
    }

    /// Switch to `app_id`; with `boot`, also make it the boot application
    /// once the switch succeeded.
    pub fn switch(&self, app_id: &str, boot: bool) -> bool {
        let control = self.controller();
        let detacher = self.detacher();
        let switcher = Switcher::new(
            &self.registry,
            &control,
            &detacher,
            self.config.detach,
            detach::in_graphical_session(),
        );

        let report = switcher.switch(app_id);
        if report.succeeded() && boot {
            // persistence failures are logged but do not undo the switch
            self.autostart().set_autostart(app_id);
        }
        report.succeeded()
    }

    /// Second half of a switch that left the desktop session.
    pub fn resume(&self, start: String, stop: Vec<String>) -> bool {
        let control = self.controller();
        let detacher = self.detacher();
        let switcher = Switcher::new(
            &self.registry,
            &control,
            &detacher,
            self.config.detach,
            false,
        );
        switcher.resume(&Continuation { start, stop }).succeeded()
    }

    pub fn stop_service(&self, service_id: &str) -> bool {
        self.controller().stop(service_id)
    }

    pub fn start_service(&self, service_id: &str) -> bool {
        self.controller().start(service_id)
    }

    /// `None` removes the autostart block.
    pub fn set_boot_app(&self, app_id: Option<&str>) -> bool {
        match app_id {
            Some(app_id) => self.autostart().set_autostart(app_id),
            None => self.autostart().clear_autostart(),
        }
    }

    pub fn list(&self) -> bool {
        let boot = self.autostart().current_autostart();
        println!("Applications (user: {}):", self.registry.interactive_user());
        for app in self.registry.list_enabled_gui_applications() {
            let service = self
                .registry
                .resolve_service(app.id)
                .map(|s| s.id.as_str())
                .unwrap_or("-");
            let marker = if boot.as_deref() == Some(app.id) {
                " (boot app)"
            } else {
                ""
            };
            println!(
                "  {:<18} {:<20} service={:<18} user={}{}",
                app.id, app.display_name, service, app.owning_user, marker
            );
        }
        if boot.is_none() {
            println!("No boot application configured");
        }
        true
    }

    pub fn status(&self) -> bool {
        for svc in status::probe(self.registry.services()) {
            let state = if svc.is_running() {
                let pids: Vec<String> = svc.pids.iter().map(u32::to_string).collect();
                format!("running (pid {})", pids.join(", "))
            } else {
                "stopped".to_string()
            };
            println!("  {:<18} {:<20} {}", svc.id, svc.class.to_string(), state);
        }
        true
    }

    pub fn install_shortcut(&self, app_id: &str) -> bool {
        match self.shortcuts().install(app_id) {
            Ok(_) => true,
            Err(e) => {
                log::error!("Failed to create shortcut for {}: {}", app_id, e);
                false
            }
        }
    }

    pub fn remove_shortcut(&self, app_id: &str) -> bool {
        match self.shortcuts().uninstall(app_id) {
            Ok(true) => true,
            Ok(false) => {
                log::info!("No shortcut installed for {}", app_id);
                true
            }
            Err(e) => {
                log::error!("Failed to remove shortcut for {}: {}", app_id, e);
                false
            }
        }
    }

    /// Install all switching glue and the autostart block.
    pub fn setup(&self, boot_app: Option<&str>) -> bool {
        let gui_ids = self.registry.enabled_gui_ids();
        let Some(&first) = gui_ids.first() else {
            log::error!("No enabled GUI apps found in configuration");
            return false;
        };
        log::info!(
            "Found {} enabled GUI apps: {}",
            gui_ids.len(),
            gui_ids.join(", ")
        );

        let requested = boot_app.or(self.config.default_boot_app.as_deref());
        let boot = match requested {
            Some(id) if gui_ids.contains(&id) => id,
            other => {
                log::warn!("Invalid or missing boot app: {}", other.unwrap_or("none"));
                log::info!("Using first available GUI app: {}", first);
                first
            }
        };

        let shortcuts = self.shortcuts();
        if let Err(e) = shortcuts.install_sudoers() {
            log::error!("Failed to install sudoers entry: {}", e);
            return false;
        }
        for id in &gui_ids {
            if let Err(e) = shortcuts.install(id) {
                log::error!("Failed to create shortcut for {}: {}", id, e);
                return false;
            }
        }
        if let Err(e) = shortcuts.install_port_scripts() {
            log::warn!("RetroPie integration failed: {}", e);
        }

        if !self.autostart().set_autostart(boot) {
            return false;
        }
        log::info!("App switching setup completed successfully");
        true
    }
}
