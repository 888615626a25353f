use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Action — the closed taxonomy of sensitive operations
// ---------------------------------------------------------------------------

/// Every operation that must consult the policy engine before mutating state.
///
/// Exhaustive (no #[non_exhaustive]) so adding an action forces compile-time
/// review of all match sites. The universal wildcard `*` is a pattern, not an
/// action, and is handled by the request layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "db.read")]
    DbRead,
    #[serde(rename = "db.write")]
    DbWrite,
    #[serde(rename = "db.delete")]
    DbDelete,
    #[serde(rename = "project.create")]
    ProjectCreate,
    #[serde(rename = "project.open")]
    ProjectOpen,
    #[serde(rename = "project.save")]
    ProjectSave,
    #[serde(rename = "project.delete")]
    ProjectDelete,
    #[serde(rename = "project.switch")]
    ProjectSwitch,
    #[serde(rename = "project.clone")]
    ProjectClone,
    #[serde(rename = "widget.open")]
    WidgetOpen,
    #[serde(rename = "widget.close")]
    WidgetClose,
    #[serde(rename = "widget.execute")]
    WidgetExecute,
    #[serde(rename = "widget.install")]
    WidgetInstall,
    #[serde(rename = "widget.uninstall")]
    WidgetUninstall,
    #[serde(rename = "settings.read")]
    SettingsRead,
    #[serde(rename = "settings.write")]
    SettingsWrite,
    #[serde(rename = "export.site")]
    ExportSite,
    #[serde(rename = "system.boot")]
    SystemBoot,
    #[serde(rename = "system.log")]
    SystemLog,
    #[serde(rename = "system.debug")]
    SystemDebug,
}

impl Action {
    /// Every recognized action, in taxonomy order.
    pub const ALL: [Action; 20] = [
        Action::DbRead,
        Action::DbWrite,
        Action::DbDelete,
        Action::ProjectCreate,
        Action::ProjectOpen,
        Action::ProjectSave,
        Action::ProjectDelete,
        Action::ProjectSwitch,
        Action::ProjectClone,
        Action::WidgetOpen,
        Action::WidgetClose,
        Action::WidgetExecute,
        Action::WidgetInstall,
        Action::WidgetUninstall,
        Action::SettingsRead,
        Action::SettingsWrite,
        Action::ExportSite,
        Action::SystemBoot,
        Action::SystemLog,
        Action::SystemDebug,
    ];

    /// The dotted wire name for this action.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::DbRead => "db.read",
            Action::DbWrite => "db.write",
            Action::DbDelete => "db.delete",
            Action::ProjectCreate => "project.create",
            Action::ProjectOpen => "project.open",
            Action::ProjectSave => "project.save",
            Action::ProjectDelete => "project.delete",
            Action::ProjectSwitch => "project.switch",
            Action::ProjectClone => "project.clone",
            Action::WidgetOpen => "widget.open",
            Action::WidgetClose => "widget.close",
            Action::WidgetExecute => "widget.execute",
            Action::WidgetInstall => "widget.install",
            Action::WidgetUninstall => "widget.uninstall",
            Action::SettingsRead => "settings.read",
            Action::SettingsWrite => "settings.write",
            Action::ExportSite => "export.site",
            Action::SystemBoot => "system.boot",
            Action::SystemLog => "system.log",
            Action::SystemDebug => "system.debug",
        }
    }

    /// Parse a dotted action name. Returns None for anything outside the
    /// taxonomy, including the wildcard `*`.
    pub fn parse(name: &str) -> Option<Action> {
        Action::ALL.iter().copied().find(|a| a.as_str() == name)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_actions() {
        assert_eq!(Action::parse("project.save"), Some(Action::ProjectSave));
        assert_eq!(Action::parse("db.write"), Some(Action::DbWrite));
        assert_eq!(Action::parse("widget.execute"), Some(Action::WidgetExecute));
        assert_eq!(Action::parse("system.boot"), Some(Action::SystemBoot));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(Action::parse("totally.unknown"), None);
        assert_eq!(Action::parse(""), None);
        assert_eq!(Action::parse("project"), None);
        assert_eq!(Action::parse("project.save "), None);
    }

    #[test]
    fn test_wildcard_is_not_an_action() {
        assert_eq!(Action::parse("*"), None);
    }

    #[test]
    fn test_all_roundtrips_through_parse() {
        for action in Action::ALL {
            assert_eq!(Action::parse(action.as_str()), Some(action));
        }
    }

    #[test]
    fn test_all_names_unique() {
        let mut names: Vec<&str> = Action::ALL.iter().map(|a| a.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Action::ALL.len());
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&Action::ProjectSave).unwrap();
        assert_eq!(json, "\"project.save\"");
        let back: Action = serde_json::from_str("\"widget.execute\"").unwrap();
        assert_eq!(back, Action::WidgetExecute);
    }

    #[test]
    fn test_display_matches_as_str() {
        assert_eq!(Action::ExportSite.to_string(), "export.site");
    }
}
