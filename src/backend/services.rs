use std::process::{Command, ExitStatus, Stdio};

use nix::sys::signal::Signal;

use super::registry::Registry;
use super::users;
use crate::model::ServiceEntry;

/// Start/stop capability for front-end services. The switch logic only ever
/// talks to this trait.
pub trait ServiceControl {
    /// Ask the service to terminate. `false` covers "was not running" too.
    fn stop(&self, service_id: &str) -> bool;

    /// Launch the service. `true` means the launch command succeeded, not
    /// that the application is up.
    fn start(&self, service_id: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Stop,
    Start,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Stop => write!(f, "stop"),
            Action::Start => write!(f, "start"),
        }
    }
}

/// Runs the configured stop/start commands as the user each service needs.
pub struct ShellController<'a> {
    registry: &'a Registry,
    current_user: String,
}

impl<'a> ShellController<'a> {
    pub fn new(registry: &'a Registry, current_user: String) -> Self {
        Self {
            registry,
            current_user,
        }
    }

    /// The full argv for an action, including any `sudo` wrapper.
    pub fn command_line(&self, service: &ServiceEntry, action: Action) -> Vec<String> {
        let argv = match action {
            Action::Stop => &service.stop,
            Action::Start => &service.start,
        };
        let target = users::target_user(service.privilege(), self.registry.interactive_user());
        users::run_as_argv(target, &self.current_user, argv)
    }

    fn run(&self, service_id: &str, action: Action) -> bool {
        let Some(service) = self.registry.service(service_id) else {
            log::error!("Unknown service: {}", service_id);
            return false;
        };

        let argv = self.command_line(service, action);
        let Some((program, args)) = argv.split_first() else {
            log::error!("No {} command configured for {}", action, service_id);
            return false;
        };

        match action {
            Action::Stop => log::info!("Killing {}...", service_id),
            Action::Start => log::info!("Starting {}...", service_id),
        }
        log::debug!("Running: {}", argv.join(" "));

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => {
                log::info!("Successfully {} {}", past_tense(action), service_id);
                true
            }
            Ok(status) => {
                let msg = format!(
                    "Failed to {} {} ({})",
                    action,
                    service_id,
                    describe_status(&status)
                );
                match action {
                    Action::Stop => log::warn!("{}", msg),
                    Action::Start => log::error!("{}", msg),
                }
                false
            }
            Err(e) => {
                log::error!("Error running {} for {}: {}", program, service_id, e);
                false
            }
        }
    }
}

impl ServiceControl for ShellController<'_> {
    fn stop(&self, service_id: &str) -> bool {
        self.run(service_id, Action::Stop)
    }

    fn start(&self, service_id: &str) -> bool {
        self.run(service_id, Action::Start)
    }
}

fn past_tense(action: Action) -> &'static str {
    match action {
        Action::Stop => "killed",
        Action::Start => "started",
    }
}

pub fn describe_status(status: &ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {}", code),
        None => {
            use std::os::unix::process::ExitStatusExt;
            match status.signal().map(Signal::try_from) {
                Some(Ok(sig)) => format!("killed by {}", sig),
                Some(Err(_)) => "killed by unknown signal".to_string(),
                None => "unknown exit status".to_string(),
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::registry::fixture::{self, registry};
    use crate::model::ServiceClass;

    fn shell_registry() -> Registry {
        let mut ok = fixture::service("kodi", ServiceClass::MediaCenter);
        ok.stop = vec!["true".into()];
        ok.start = vec!["true".into()];
        let mut bad = fixture::service("emulationstation", ServiceClass::EmulatorFrontend);
        bad.stop = vec!["false".into()];
        bad.start = vec!["sh".into(), "-c".into(), "exit 3".into()];
        Registry::new("pi".into(), registry().applications().to_vec(), vec![ok, bad])
    }

    #[test]
    fn desktop_commands_go_through_sudo() {
        let registry = registry();
        let controller = ShellController::new(&registry, "pi".into());
        let desktop = registry.service("desktop").unwrap();
        assert_eq!(
            controller.command_line(desktop, Action::Stop),
            ["sudo", "stop", "desktop"]
        );
        let kodi = registry.service("kodi").unwrap();
        assert_eq!(controller.command_line(kodi, Action::Start), ["start", "kodi"]);
    }

    #[test]
    fn user_commands_drop_privileges_when_root() {
        let registry = registry();
        let controller = ShellController::new(&registry, "root".into());
        let kodi = registry.service("kodi").unwrap();
        assert_eq!(
            controller.command_line(kodi, Action::Stop),
            ["sudo", "-u", "pi", "stop", "kodi"]
        );
    }

    #[test]
    fn exit_status_maps_to_bool() {
        let registry = shell_registry();
        // run as "pi" so nothing is wrapped in sudo
        let controller = ShellController::new(&registry, "pi".into());
        assert!(controller.stop("kodi"));
        assert!(controller.start("kodi"));
        assert!(!controller.stop("emulationstation"));
        assert!(!controller.start("emulationstation"));
    }

    #[test]
    fn unknown_service_runs_nothing() {
        let registry = registry();
        let controller = ShellController::new(&registry, "pi".into());
        assert!(!controller.stop("steam"));
        assert!(!controller.start("steam"));
    }

    #[test]
    fn missing_program_is_a_failure() {
        let mut svc = fixture::service("kodi", ServiceClass::MediaCenter);
        svc.start = vec!["/nonexistent/frontend-switch-test".into()];
        let registry = Registry::new("pi".into(), Vec::new(), vec![svc]);
        let controller = ShellController::new(&registry, "pi".into());
        assert!(!controller.start("kodi"));
    }

    #[test]
    fn describes_exit_and_signal() {
        let exited = Command::new("sh").args(["-c", "exit 3"]).status().unwrap();
        assert_eq!(describe_status(&exited), "exit code 3");
        let killed = Command::new("sh")
            .args(["-c", "kill -TERM $$"])
            .status()
            .unwrap();
        assert_eq!(describe_status(&killed), "killed by SIGTERM");
    }
}
