use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

/// When a switch that tears down the desktop session hands its remaining
/// work to a detached process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetachPolicy {
    /// Whenever the desktop session is among the services to stop.
    #[default]
    Always,
    /// Only when this process runs inside a graphical session.
    Auto,
    Never,
}

impl DetachPolicy {
    pub fn requires_detach(self, stops_session: bool, in_graphical_session: bool) -> bool {
        stops_session
            && match self {
                DetachPolicy::Always => true,
                DetachPolicy::Auto => in_graphical_session,
                DetachPolicy::Never => false,
            }
    }
}

/// The rest of a switch, to be finished outside the session being killed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation {
    pub start: String,
    pub stop: Vec<String>,
}

impl Continuation {
    /// Arguments of the hidden `resume` subcommand that replays this.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["resume".to_string(), "--start".to_string(), self.start.clone()];
        for id in &self.stop {
            args.push("--stop".to_string());
            args.push(id.clone());
        }
        args
    }
}

pub trait Detach {
    /// Hand the continuation to an independent process. Returns once the
    /// hand-off happened, not when the continuation finished.
    fn detach(&self, continuation: &Continuation) -> bool;
}

/// Re-executes this binary in a new session.
pub struct SelfReexec {
    pub exe: PathBuf,
    pub config: Option<PathBuf>,
    pub log_path: PathBuf,
}

impl SelfReexec {
    pub fn command_args(&self, continuation: &Continuation) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(config) = &self.config {
            args.push("--config".to_string());
            args.push(config.to_string_lossy().to_string());
        }
        args.extend(continuation.to_args());
        args
    }

    fn output(&self) -> Stdio {
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
        {
            Ok(file) => Stdio::from(file),
            Err(e) => {
                log::warn!(
                    "Cannot open {} for the detached switch: {}",
                    self.log_path.display(),
                    e
                );
                Stdio::null()
            }
        }
    }
}

impl Detach for SelfReexec {
    fn detach(&self, continuation: &Continuation) -> bool {
        use std::os::unix::process::CommandExt;

        let stderr = self.output();
        let mut cmd = Command::new(&self.exe);
        cmd.args(self.command_args(continuation))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(stderr);

        // SAFETY: setsid is async-signal-safe and touches no parent state.
        unsafe {
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }

        match cmd.spawn() {
            Ok(child) => {
                log::info!(
                    "Continuing switch to {} in detached process {}",
                    continuation.start,
                    child.id()
                );
                true
            }
            Err(e) => {
                log::error!("Failed to start {}: {}", self.exe.display(), e);
                false
            }
        }
    }
}

/// Whether this process is hosted by an X11 or Wayland session.
pub fn in_graphical_session() -> bool {
    ["DISPLAY", "WAYLAND_DISPLAY"]
        .iter()
        .any(|var| std::env::var_os(var).is_some_and(|v| !v.is_empty()))
}

#[cfg(test)]
pub(crate) mod fake {
    use super::{Continuation, Detach};
    use std::cell::RefCell;

    pub struct RecordingDetacher {
        pub handed_off: RefCell<Vec<Continuation>>,
        pub succeed: bool,
    }

    impl RecordingDetacher {
        pub fn new(succeed: bool) -> Self {
            Self {
                handed_off: RefCell::new(Vec::new()),
                succeed,
            }
        }
    }

    impl Detach for RecordingDetacher {
        fn detach(&self, continuation: &Continuation) -> bool {
            self.handed_off.borrow_mut().push(continuation.clone());
            self.succeed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(DetachPolicy::Always, true, false, true)]
    #[test_case(DetachPolicy::Always, false, true, false)]
    #[test_case(DetachPolicy::Auto, true, true, true)]
    #[test_case(DetachPolicy::Auto, true, false, false)]
    #[test_case(DetachPolicy::Never, true, true, false)]
    fn policy(policy: DetachPolicy, stops_session: bool, graphical: bool, expected: bool) {
        assert_eq!(policy.requires_detach(stops_session, graphical), expected);
    }

    #[test]
    fn reexec_args_carry_config_and_plan() {
        let reexec = SelfReexec {
            exe: PathBuf::from("/usr/local/bin/frontend-switch"),
            config: Some(PathBuf::from("/etc/fs.json")),
            log_path: PathBuf::from("/tmp/fs.log"),
        };
        let plan = Continuation {
            start: "kodi".into(),
            stop: vec!["desktop".into()],
        };
        assert_eq!(
            reexec.command_args(&plan),
            ["--config", "/etc/fs.json", "resume", "--start", "kodi", "--stop", "desktop"]
        );
    }

    #[test]
    fn spawns_detached_child() {
        let dir = tempfile::tempdir().unwrap();
        let reexec = SelfReexec {
            exe: PathBuf::from("true"),
            config: None,
            log_path: dir.path().join("detach.log"),
        };
        let plan = Continuation {
            start: "kodi".into(),
            stop: Vec::new(),
        };
        assert!(reexec.detach(&plan));
        assert!(dir.path().join("detach.log").exists());
    }

    #[test]
    fn missing_binary_fails_hand_off() {
        let reexec = SelfReexec {
            exe: PathBuf::from("/nonexistent/frontend-switch"),
            config: None,
            log_path: PathBuf::from("/nonexistent-dir/detach.log"),
        };
        let plan = Continuation {
            start: "kodi".into(),
            stop: Vec::new(),
        };
        assert!(!reexec.detach(&plan));
    }

    #[test]
    fn policy_parses_lowercase() {
        let policy: DetachPolicy = serde_json::from_str("\"auto\"").unwrap();
        assert_eq!(policy, DetachPolicy::Auto);
    }
}
