use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppKind {
    #[default]
    Gui,
    Cli,
}

/// A configured application. GUI applications are switch targets; the rest
/// (e.g. a streaming client launched from inside another front-end) are only
/// listed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub kind: AppKind,
    /// Owning OS user; `None` means the interactive user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Service driven by this application, when it differs from `id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl Application {
    pub fn is_gui_frontend(&self) -> bool {
        self.kind == AppKind::Gui
    }

    pub fn service_id(&self) -> &str {
        self.service.as_deref().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_entry_is_enabled_gui() {
        let app: Application =
            serde_json::from_str(r#"{"id":"kodi","display_name":"Kodi"}"#).unwrap();
        assert!(app.enabled);
        assert!(app.is_gui_frontend());
        assert_eq!(app.service_id(), "kodi");
        assert!(app.user.is_none());
    }

    #[test]
    fn service_alias_overrides_id() {
        let app: Application = serde_json::from_str(
            r#"{"id":"retropie","display_name":"RetroPie","service":"emulationstation"}"#,
        )
        .unwrap();
        assert_eq!(app.service_id(), "emulationstation");
    }
}
