//! Configuration for the console driver

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::mainloop::ResizeStrategy;

/// Environment variable set by hosts that support true color and the
/// alternate screen
pub const DEFAULT_RICH_TERMINAL_ENV: &str = "WT_SESSION";

/// Driver configuration
///
/// `None` fields are detected from the environment by [`DriverConfig::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Restrict output to the 16 ANSI colors
    pub force_16_colors: Option<bool>,
    /// Environment variable whose presence marks a rich terminal host
    pub rich_terminal_env: String,
    /// Switch to the alternate screen for the session
    pub use_alternate_screen: Option<bool>,
    /// How window size changes are detected
    pub resize: ResizeStrategy,
    /// How long a double click waits for a third press
    pub double_click_latch_ms: u64,
    /// Re-emit interval for a held button
    pub continuous_press_interval_ms: u64,
    /// Re-emit press events while a button is held
    pub want_continuous_button_pressed: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            force_16_colors: None,
            rich_terminal_env: DEFAULT_RICH_TERMINAL_ENV.to_string(),
            use_alternate_screen: None,
            resize: ResizeStrategy::default(),
            double_click_latch_ms: 300,
            continuous_press_interval_ms: 100,
            want_continuous_button_pressed: false,
        }
    }
}

/// Configuration with every detection settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub rich_terminal: bool,
    pub force_16_colors: bool,
    pub use_alternate_screen: bool,
    pub resize: ResizeStrategy,
    pub double_click_latch: Duration,
    pub continuous_press_interval: Duration,
    pub want_continuous_button_pressed: bool,
}

impl ResolvedConfig {
    /// Default configuration resolved against the process environment
    pub fn from_env() -> Self {
        DriverConfig::default().resolve()
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        DriverConfig::default().resolve_with(|_| None)
    }
}

impl DriverConfig {
    /// Load configuration from a file
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from default location or return default config
    pub fn load_or_default() -> Self {
        // Try to load from ~/.config/ansi-console/config.json
        if let Some(config_dir) = dirs_config_path() {
            let config_path = config_dir.join("config.json");
            if config_path.exists() {
                if let Ok(config) = Self::load(&config_path) {
                    return config;
                }
            }
        }
        Self::default()
    }

    /// Settle detection against the process environment
    pub fn resolve(&self) -> ResolvedConfig {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Settle detection against an arbitrary environment lookup
    pub fn resolve_with(&self, env: impl Fn(&str) -> Option<String>) -> ResolvedConfig {
        let truecolor = env("COLORTERM")
            .map(|value| value == "truecolor" || value == "24bit")
            .unwrap_or(false);
        let rich_terminal = env(&self.rich_terminal_env).is_some() || truecolor;

        ResolvedConfig {
            rich_terminal,
            force_16_colors: self.force_16_colors.unwrap_or(!rich_terminal),
            use_alternate_screen: self.use_alternate_screen.unwrap_or(rich_terminal),
            resize: self.resize,
            double_click_latch: Duration::from_millis(self.double_click_latch_ms),
            continuous_press_interval: Duration::from_millis(self.continuous_press_interval_ms),
            want_continuous_button_pressed: self.want_continuous_button_pressed,
        }
    }
}

/// Get the configuration directory path
fn dirs_config_path() -> Option<std::path::PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|home| std::path::PathBuf::from(home).join(".config").join("ansi-console"))
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
