const DOCUMENTATION: &str = r#"# Cairn preferences. You may edit this file, but be aware that formatting and comments will not
# be preserved, and all keys and values are case sensitive.

# history_limit = 1000     Keep at most this many undo steps. 0 keeps everything.
# strict_kinds = true      Only accept the built-in kinds and their fields (see the `kinds` command).
# echo_events = false      Print every appearance, disappearance and field change as it happens.
# log_level = "warn"       One of "off", "error", "warn", "info", "debug", "trace".

"#;

#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}
impl From<LogLevel> for log::LevelFilter {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Off => Self::Off,
            LogLevel::Error => Self::Error,
            LogLevel::Warn => Self::Warn,
            LogLevel::Info => Self::Info,
            LogLevel::Debug => Self::Debug,
            LogLevel::Trace => Self::Trace,
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Preferences {
    /// Zero for unlimited.
    pub history_limit: usize,
    pub strict_kinds: bool,
    pub echo_events: bool,
    pub log_level: LogLevel,
    #[serde(skip)]
    failed_to_load: bool,
}
impl Default for Preferences {
    fn default() -> Self {
        Self {
            history_limit: 1000,
            strict_kinds: true,
            echo_events: false,
            log_level: LogLevel::default(),
            failed_to_load: false,
        }
    }
}
impl Preferences {
    const FILENAME: &'static str = "preferences.toml";
    /// Shared global preferences, loaded from the user's preferences directory.
    /// (Or defaulted, if unavailable for some reason)
    #[must_use]
    pub fn get() -> &'static Self {
        static GLOBAL_PREFERENCES: std::sync::OnceLock<Preferences> = std::sync::OnceLock::new();

        GLOBAL_PREFERENCES.get_or_init(|| match super::preferences_dir() {
            None => Self::no_path(),
            Some(mut dir) => {
                dir.push(Self::FILENAME);
                Self::load_or_default(&dir)
            }
        })
    }
    #[must_use]
    fn no_path() -> Self {
        Self {
            failed_to_load: true,
            ..Default::default()
        }
    }
    #[must_use]
    fn load_or_default(path: &std::path::Path) -> Self {
        // Never written is not a failure, just a first run.
        if !path.exists() {
            return Self::default();
        }
        let loaded: anyhow::Result<Self> = try_block::try_block! {
            let string = std::fs::read_to_string(path)?;
            Ok(Self::from_toml(&string)?)
        };
        loaded.unwrap_or_else(|_| Self::no_path())
    }
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::ser::to_string_pretty(self)
    }
    #[must_use]
    pub fn history_limit(&self) -> Option<std::num::NonZeroUsize> {
        std::num::NonZeroUsize::new(self.history_limit)
    }
    /// Return true if the user's preferences exist but could not be read.
    /// The defaults are in use instead.
    #[must_use]
    pub fn did_fail_to_load(&self) -> bool {
        self.failed_to_load
    }
    /// Write to the preferences directory, returning where.
    pub fn save(&self) -> anyhow::Result<std::path::PathBuf> {
        let mut preferences =
            super::preferences_dir().ok_or_else(|| anyhow::anyhow!("No preferences dir found"))?;
        // Explicity do *not* create recursively. If not found, the user probably has a good reason.
        // Ignore errors (could already exist). Any real errors will be emitted by file access below.
        let _ = std::fs::DirBuilder::new().create(&preferences);

        preferences.push(Self::FILENAME);
        let string = DOCUMENTATION.to_owned() + &self.to_toml()?;
        std::fs::write(&preferences, string)?;
        Ok(preferences)
    }
}
