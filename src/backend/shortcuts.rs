use std::fs;
use std::path::{Path, PathBuf};

use super::registry::Registry;
use crate::error::{ShortcutError, WriteError};
use crate::model::ServiceClass;
use crate::util::{self, Owner};

const DESKTOP_ENTRY: &str = "\
[Desktop Entry]
Type=Application
Name=Start {display_name}
Comment=Switch to {display_name}
Exec=sudo {switch_command}
Icon={icon}
Terminal=false
Categories=AudioVideo;Video;Player;TV;
";

const PORT_SCRIPT: &str = "\
#!/bin/bash
# Launch {display_name} from RetroPie
sudo {switch_command}
";

/// Where the switching glue for each application gets installed.
pub struct ShortcutInstaller<'a> {
    pub registry: &'a Registry,
    pub install_path: PathBuf,
    /// Configuration file the generated launchers pass on.
    pub config: Option<PathBuf>,
    pub shortcut_dir: PathBuf,
    pub icons_dir: PathBuf,
    /// Source of `<app_id>.png` icons shipped with the installation.
    pub media_dir: Option<PathBuf>,
    pub ports_dir: PathBuf,
    /// EmulationStation artwork for the ports menu.
    pub port_images_dir: PathBuf,
    pub sudoers_path: PathBuf,
    pub owner: Option<Owner>,
}

impl ShortcutInstaller<'_> {
    pub fn desktop_file(&self, app_id: &str) -> PathBuf {
        self.shortcut_dir.join(format!("{}.desktop", app_id))
    }

    fn icon_file(&self, app_id: &str) -> PathBuf {
        self.icons_dir.join(format!("{}.png", app_id))
    }

    fn render(&self, template: &str, app_id: &str, display_name: &str) -> String {
        let command = util::switch_command(&self.install_path, self.config.as_deref(), app_id);
        template
            .replace("{display_name}", display_name)
            .replace("{switch_command}", &command)
            .replace("{icon}", &self.icon_file(app_id).to_string_lossy())
    }

    fn ensure_dir(&self, dir: &Path) -> Result<(), ShortcutError> {
        if dir.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(dir).map_err(|source| {
            ShortcutError::Write(WriteError::Io {
                path: dir.to_path_buf(),
                source,
            })
        })?;
        if let Some(owner) = self.owner {
            util::chown_path(dir, owner)?;
        }
        Ok(())
    }

    fn copy_owned(&self, from: &Path, to: &Path) -> Result<(), ShortcutError> {
        fs::copy(from, to).map_err(|source| ShortcutError::Copy {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        })?;
        if let Some(owner) = self.owner {
            util::chown_path(to, owner)?;
        }
        Ok(())
    }

    /// Copy `<media_dir>/<app_id>.png` into the icons directory. `Ok(false)`
    /// when there is no media directory or no icon for this application.
    pub fn install_icon(&self, app_id: &str) -> Result<bool, ShortcutError> {
        let Some(media_dir) = &self.media_dir else {
            return Ok(false);
        };
        let source = media_dir.join(format!("{}.png", app_id));
        if !source.is_file() {
            log::warn!("No icon for {} at {}", app_id, source.display());
            return Ok(false);
        }
        self.ensure_dir(&self.icons_dir)?;
        let dest = self.icon_file(app_id);
        self.copy_owned(&source, &dest)?;
        log::info!("Copied icon for {} to {}", app_id, self.icons_dir.display());
        Ok(true)
    }

    /// Desktop entry that switches to `app_id` when clicked.
    pub fn install(&self, app_id: &str) -> Result<PathBuf, ShortcutError> {
        let app = self
            .registry
            .enabled_gui_application(app_id)
            .ok_or_else(|| ShortcutError::UnknownApp(app_id.to_string()))?;

        if let Err(e) = self.install_icon(app_id) {
            log::warn!("Failed to copy icon for {}: {}", app_id, e);
        }

        let dest = self.desktop_file(app_id);
        let content = self.render(DESKTOP_ENTRY, &app.id, &app.display_name);
        util::write_atomic(&dest, &content, Some(0o644), None)?;
        log::info!("Created {}", dest.display());
        Ok(dest)
    }

    /// Remove the desktop entry. `Ok(false)` when there was none.
    pub fn uninstall(&self, app_id: &str) -> Result<bool, ShortcutError> {
        let dest = self.desktop_file(app_id);
        match fs::remove_file(&dest) {
            Ok(()) => {
                log::info!("Removed {}", dest.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(ShortcutError::Remove { path: dest, source }),
        }
    }

    /// "Launch X.sh" scripts in the RetroPie ports menu for every GUI
    /// application other than the emulator front-end itself, each with its
    /// icon when one is available. Returns the number of scripts written;
    /// zero when RetroPie is not installed.
    pub fn install_port_scripts(&self) -> Result<usize, ShortcutError> {
        let roms_dir = self.ports_dir.parent().unwrap_or(Path::new("/"));
        if !roms_dir.is_dir() {
            log::warn!(
                "RetroPie roms directory not found at {}, skipping integration",
                roms_dir.display()
            );
            return Ok(0);
        }
        self.ensure_dir(&self.ports_dir)?;

        let mut written = 0;
        for app in self.registry.applications() {
            if !(app.enabled && app.is_gui_frontend()) {
                continue;
            }
            let is_emulator = self
                .registry
                .service(app.service_id())
                .is_some_and(|svc| svc.class == ServiceClass::EmulatorFrontend);
            if is_emulator {
                continue;
            }

            let dest = self
                .ports_dir
                .join(format!("Launch {}.sh", app.display_name));
            let content = self.render(PORT_SCRIPT, &app.id, &app.display_name);
            util::write_atomic(&dest, &content, Some(0o755), self.owner)?;
            log::info!("Added {} to RetroPie ports", app.display_name);
            written += 1;

            if let Err(e) = self.install_port_image(&app.id, &app.display_name) {
                log::warn!("Failed to add icon for {} in RetroPie: {}", app.display_name, e);
            }
        }
        Ok(written)
    }

    /// `Launch <display_name>.png` next to the other ports artwork, taken
    /// from the installed icon or else straight from the media directory.
    fn install_port_image(&self, app_id: &str, display_name: &str) -> Result<bool, ShortcutError> {
        let installed = self.icon_file(app_id);
        let source = if installed.is_file() {
            installed
        } else {
            match &self.media_dir {
                Some(media_dir) if media_dir.join(format!("{}.png", app_id)).is_file() => {
                    media_dir.join(format!("{}.png", app_id))
                }
                _ => return Ok(false),
            }
        };
        self.ensure_dir(&self.port_images_dir)?;
        let dest = self
            .port_images_dir
            .join(format!("Launch {}.png", display_name));
        self.copy_owned(&source, &dest)?;
        log::info!("Added custom icon for {} in RetroPie", display_name);
        Ok(true)
    }

    /// Let the interactive user run the switcher through sudo without a
    /// password.
    pub fn install_sudoers(&self) -> Result<(), ShortcutError> {
        let content = sudoers_line(self.registry.interactive_user(), &self.install_path);
        util::write_atomic(&self.sudoers_path, &content, Some(0o440), None)?;
        log::info!("Created sudoers entry {}", self.sudoers_path.display());
        Ok(())
    }
}

pub fn sudoers_line(user: &str, install_path: &Path) -> String {
    format!("{} ALL=(ALL) NOPASSWD: {}\n", user, install_path.display())
}
