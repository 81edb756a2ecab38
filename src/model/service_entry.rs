use serde::{Deserialize, Serialize};

/// The three mutually exclusive kinds of full-screen front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceClass {
    MediaCenter,
    EmulatorFrontend,
    Desktop,
}

impl std::fmt::Display for ServiceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceClass::MediaCenter => write!(f, "Media center"),
            ServiceClass::EmulatorFrontend => write!(f, "Emulator front-end"),
            ServiceClass::Desktop => write!(f, "Desktop"),
        }
    }
}

/// Which OS user a service's start/stop commands must run as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privilege {
    Root,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub id: String,
    pub class: ServiceClass,
    /// Overrides the class default (root for the desktop session, the
    /// interactive user for everything else).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privilege: Option<Privilege>,
    pub stop: Vec<String>,
    pub start: Vec<String>,
    /// Explicit conflict list. When absent the service conflicts with every
    /// other configured service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicts: Option<Vec<String>>,
    /// Process names used by `status` to spot a running instance.
    #[serde(default)]
    pub process_names: Vec<String>,
}

impl ServiceEntry {
    pub fn privilege(&self) -> Privilege {
        self.privilege.unwrap_or(match self.class {
            ServiceClass::Desktop => Privilege::Root,
            _ => Privilege::User,
        })
    }

    /// Stopping this service tears down the graphical session that may be
    /// hosting the caller.
    pub fn hosts_session(&self) -> bool {
        self.class == ServiceClass::Desktop
    }
}
