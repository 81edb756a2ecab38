use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Refusing {} under sudo: {reason}", .path.display())]
    Untrusted { path: PathBuf, reason: &'static str },

    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("Cannot determine the interactive user (set \"user\" in the configuration)")]
    NoUser,
}

#[derive(Debug, thiserror::Error)]
pub enum AutostartError {
    #[error("Unknown or disabled GUI application: {0}")]
    UnknownApp(String),

    #[error("Cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Write(#[from] WriteError),
}

#[derive(Debug, thiserror::Error)]
pub enum ShortcutError {
    #[error("Unknown or disabled GUI application: {0}")]
    UnknownApp(String),

    #[error("Cannot remove {}: {source}", .path.display())]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot copy {} to {}: {source}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Failure of a whole-file rewrite, tagged with the step that failed.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("Parent directory of {} does not exist", .0.display())]
    MissingParent(PathBuf),

    #[error("Cannot write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot change owner of {}: {source}", .path.display())]
    Chown { path: PathBuf, source: nix::Error },
}
