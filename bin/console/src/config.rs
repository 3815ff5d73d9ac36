//! Console configuration.
//!
//! Loaded via the `config` crate from an optional YAML file, then from
//! `PARLANCE__*` environment variables (`PARLANCE__DIALOG__PACING__ENABLED=false`).
//! Every setting has a default, so no file is needed.

use parlance_core::{User, UserId};
use parlance_dialog::DialogConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Console configuration composed from library configs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsoleConfig {
    /// Dialog engine settings.
    #[serde(default)]
    pub dialog: DialogConfig,

    /// The simulated chat user.
    #[serde(default)]
    pub user: UserConfig,

    /// Where to load assets from instead of the bundled ones.
    #[serde(default)]
    pub assets: AssetPaths,
}

/// The simulated chat user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub first_name: Option<String>,

    /// Whether the bot says "Sie" until told otherwise.
    #[serde(default = "default_formal_address")]
    pub formal_address: bool,

    /// Admins may `/reset` the conversation.
    #[serde(default)]
    pub is_admin: bool,
}

fn default_formal_address() -> bool {
    true
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            first_name: None,
            formal_address: default_formal_address(),
            is_admin: false,
        }
    }
}

impl UserConfig {
    /// A user with a fresh id and these settings.
    #[must_use]
    pub fn to_user(&self) -> User {
        let mut user = User::new(UserId::new()).with_formal_address(self.formal_address);
        if let Some(name) = &self.first_name {
            user = user.with_first_name(name);
        }
        if self.is_admin {
            user = user.as_admin();
        }
        user
    }
}

/// Optional asset overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AssetPaths {
    /// A template YAML file, or a directory of them.
    #[serde(default)]
    pub templates: Option<PathBuf>,
    #[serde(default)]
    pub questionnaires: Option<PathBuf>,
    /// Keyword intent rules.
    #[serde(default)]
    pub intents: Option<PathBuf>,
}

impl ConsoleConfig {
    /// Loads the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed, or a value has
    /// the wrong type.
    pub fn load(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(config::File::from(file).required(true));
        }
        builder
            .add_source(
                config::Environment::with_prefix("PARLANCE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlance_dialog::NoRulePolicy;
    use std::io::Write;

    #[test]
    fn console_config_has_correct_defaults() {
        let config = ConsoleConfig::default();
        assert!(config.user.formal_address);
        assert!(!config.user.is_admin);
        assert_eq!(config.assets, AssetPaths::default());
        assert_eq!(config.dialog, DialogConfig::default());
    }

    #[test]
    fn files_override_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .expect("temp file");
        write!(
            file,
            "user:\n  first_name: Anna\n  formal_address: false\ndialog:\n  no_rule_policy: silent\n  pacing:\n    enabled: false\n"
        )
        .expect("write config");

        let config = ConsoleConfig::load(Some(file.path())).expect("valid config");

        assert_eq!(config.user.first_name.as_deref(), Some("Anna"));
        assert!(!config.user.formal_address);
        assert_eq!(config.dialog.no_rule_policy, NoRulePolicy::Silent);
        assert!(!config.dialog.pacing.enabled);
        assert_eq!(config.dialog.pacing.short_ms, 1300);
    }

    #[test]
    fn missing_files_are_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("absent.yaml");
        assert!(ConsoleConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn users_carry_their_settings() {
        let config = UserConfig {
            first_name: Some("Ben".to_string()),
            formal_address: false,
            is_admin: true,
        };
        let user = config.to_user();
        assert_eq!(user.first_name.as_deref(), Some("Ben"));
        assert!(!user.formal_address);
        assert!(user.is_admin);
    }
}
