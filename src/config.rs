use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use crate::backend::detach::DetachPolicy;
use crate::error::ConfigError;
use crate::model::{AppKind, Application, ServiceClass, ServiceEntry};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/frontend-switch/config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Interactive (kiosk) user. Falls back to `SUDO_USER`, then `USER`.
    pub user: Option<String>,
    /// Absolute path of the installed binary, as referenced from the
    /// shell-startup file, desktop entries and the sudoers drop-in.
    pub install_path: PathBuf,
    /// Shell-startup file holding the autostart block. Defaults to
    /// `~user/.bashrc`.
    pub shell_startup: Option<PathBuf>,
    pub default_boot_app: Option<String>,
    pub applications: Vec<Application>,
    pub services: Vec<ServiceEntry>,
    pub detach: DetachPolicy,
    /// Where the detached continuation writes its output.
    pub detach_log: PathBuf,
    pub shortcut_dir: PathBuf,
    /// Defaults to `~user/Pictures/icons`.
    pub icons_dir: Option<PathBuf>,
    /// Icons shipped with the installation, copied into `icons_dir`.
    pub media_dir: Option<PathBuf>,
    /// Defaults to `~user/RetroPie/roms/ports`.
    pub ports_dir: Option<PathBuf>,
    pub port_images_dir: PathBuf,
    pub sudoers_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user: None,
            install_path: PathBuf::from("/usr/local/bin/frontend-switch"),
            shell_startup: None,
            default_boot_app: Some("kodi".into()),
            applications: vec![
                app("kodi", "Kodi", AppKind::Gui, None, None),
                app("retropie", "RetroPie", AppKind::Gui, None, Some("emulationstation")),
                app("emulationstation", "EmulationStation", AppKind::Gui, None, None),
                app("desktop", "Desktop", AppKind::Gui, Some("root"), None),
                app("moonlight", "Moonlight", AppKind::Cli, None, None),
            ],
            services: vec![
                service(
                    "kodi",
                    ServiceClass::MediaCenter,
                    &["killall", "kodi.bin"],
                    &["setsid", "-f", "kodi-standalone"],
                    &["kodi.bin", "kodi"],
                ),
                service(
                    "emulationstation",
                    ServiceClass::EmulatorFrontend,
                    &["killall", "emulationstation"],
                    &["setsid", "-f", "emulationstation"],
                    &["emulationstation"],
                ),
                service(
                    "desktop",
                    ServiceClass::Desktop,
                    &["systemctl", "stop", "lightdm"],
                    &["systemctl", "start", "lightdm"],
                    &["lightdm"],
                ),
            ],
            detach: DetachPolicy::default(),
            detach_log: PathBuf::from("/tmp/frontend-switch.log"),
            shortcut_dir: PathBuf::from("/usr/share/applications"),
            icons_dir: None,
            media_dir: None,
            ports_dir: None,
            port_images_dir: PathBuf::from(
                "/opt/retropie/configs/all/emulationstation/downloaded_images/ports",
            ),
            sudoers_path: PathBuf::from("/etc/sudoers.d/frontend-switch"),
        }
    }
}

fn app(
    id: &str,
    display_name: &str,
    kind: AppKind,
    user: Option<&str>,
    service: Option<&str>,
) -> Application {
    Application {
        id: id.into(),
        display_name: display_name.into(),
        kind,
        user: user.map(Into::into),
        enabled: true,
        service: service.map(Into::into),
    }
}

fn service(
    id: &str,
    class: ServiceClass,
    stop: &[&str],
    start: &[&str],
    process_names: &[&str],
) -> ServiceEntry {
    let owned = |args: &[&str]| args.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    ServiceEntry {
        id: id.into(),
        class,
        privilege: None,
        stop: owned(stop),
        start: owned(start),
        conflicts: None,
        process_names: owned(process_names),
    }
}

impl Config {
    /// Load and validate the configuration. A missing file yields the
    /// built-in defaults; an unreadable or malformed one is an error.
    ///
    /// With `require_trusted` (running elevated through sudo) the file must
    /// be owned by root and writable by nobody else, since its commands run
    /// with root privileges.
    pub fn load(path: Option<&Path>, require_trusted: bool) -> Result<Self, ConfigError> {
        let path = config_path(path);
        let config = match read_config(&path, require_trusted)? {
            Some(config) => config,
            None => {
                log::debug!("{} not found, using built-in defaults", path.display());
                Config::default()
            }
        };

        for warning in config.validate()? {
            log::warn!("Configuration warning: {}", warning);
        }
        Ok(config)
    }

    /// Check cross references. Returns the warnings; errors are fatal.
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if matches!(self.user.as_deref(), Some(u) if u.trim().is_empty()) {
            errors.push("\"user\" must not be empty".to_string());
        }
        if self.applications.is_empty() {
            errors.push("no applications configured".to_string());
        }
        if !self.install_path.is_absolute() {
            errors.push(format!(
                "install_path {} must be absolute",
                self.install_path.display()
            ));
        }

        let mut service_ids = HashSet::new();
        for svc in &self.services {
            if !service_ids.insert(svc.id.as_str()) {
                errors.push(format!("service '{}' is defined twice", svc.id));
            }
            if svc.stop.is_empty() || svc.start.is_empty() {
                errors.push(format!("service '{}' needs both stop and start commands", svc.id));
            }
        }
        for svc in &self.services {
            for other in svc.conflicts.iter().flatten() {
                if !service_ids.contains(other.as_str()) {
                    errors.push(format!(
                        "service '{}' conflicts with unknown service '{}'",
                        svc.id, other
                    ));
                }
            }
        }

        let mut app_ids = HashSet::new();
        for app in &self.applications {
            if !app_ids.insert(app.id.as_str()) {
                errors.push(format!("application '{}' is defined twice", app.id));
            }
            if app.is_gui_frontend() && !service_ids.contains(app.service_id()) {
                errors.push(format!(
                    "application '{}' refers to unknown service '{}'",
                    app.id,
                    app.service_id()
                ));
            }
        }

        if !self.applications.iter().any(|a| a.enabled && a.is_gui_frontend()) {
            warnings.push("no enabled GUI applications; nothing can be switched to".to_string());
        }
        if let Some(boot) = &self.default_boot_app {
            let valid = self
                .applications
                .iter()
                .any(|a| &a.id == boot && a.enabled && a.is_gui_frontend());
            if !valid {
                warnings.push(format!(
                    "default_boot_app '{}' is not an enabled GUI application",
                    boot
                ));
            }
        }

        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// The kiosk user every front-end runs as.
    pub fn interactive_user(&self) -> Result<String, ConfigError> {
        if let Some(user) = &self.user {
            return Ok(user.clone());
        }
        ["SUDO_USER", "USER"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.is_empty())
            .ok_or(ConfigError::NoUser)
    }
}

fn read_config(path: &Path, require_trusted: bool) -> Result<Option<Config>, ConfigError> {
    let read_error = |source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    };
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(read_error(source)),
    };

    if require_trusted {
        let meta = file.metadata().map_err(read_error)?;
        if let Some(reason) = trust_problem(meta.uid(), meta.mode()) {
            return Err(ConfigError::Untrusted {
                path: path.to_path_buf(),
                reason,
            });
        }
    }

    let data = std::io::read_to_string(file).map_err(read_error)?;
    serde_json::from_str(&data)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Why a configuration file owned by `uid` with `mode` may not drive
/// commands run as root.
pub fn trust_problem(uid: u32, mode: u32) -> Option<&'static str> {
    if uid != 0 {
        Some("file is not owned by root")
    } else if mode & 0o022 != 0 {
        Some("file is writable by group or others")
    } else {
        None
    }
}

fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
