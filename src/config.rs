use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::browser::AutofillBrowser;
use crate::error::{Error, Result};

/// Top-level configuration, usually read from `jobfill.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub fill: FillConfig,
    pub selectors: SelectorConfig,
    pub browser: BrowserConfig,
}

/// Text-generation endpoint settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible server; `/completions` is appended.
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1234/v1".into(),
            model: "local-model".into(),
            api_key: None,
            temperature: 0.2,
            max_tokens: 512,
            timeout_secs: 120,
        }
    }
}

/// Behaviour of the fill loop.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FillConfig {
    /// Applicant profile (resume, contact details, preferences).
    pub profile: String,
    /// Read into `profile` at load time when set.
    pub profile_path: Option<String>,
    pub settle_delay_ms: u64,
    pub typing_delay_ms: u64,
    pub popup_delay_ms: u64,
    pub max_retries: u32,
    pub button_attempts: u32,
    pub max_pages: u32,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            profile: String::new(),
            profile_path: None,
            settle_delay_ms: 2000,
            typing_delay_ms: 200,
            popup_delay_ms: 500,
            max_retries: 3,
            button_attempts: 3,
            max_pages: 25,
        }
    }
}

impl FillConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn typing_delay(&self) -> Duration {
        Duration::from_millis(self.typing_delay_ms)
    }

    pub fn popup_delay(&self) -> Duration {
        Duration::from_millis(self.popup_delay_ms)
    }
}

/// Site-specific DOM hooks.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Element whose text reads like "current step of total steps".
    pub progress: String,
    /// Attribute carrying the widget type of composite inputs.
    pub widget_type_attribute: String,
    /// Widget-type value that marks a multi-select input.
    pub multi_select_widget: String,
    /// Candidate navigation controls.
    pub buttons: String,
    /// Options inside an opened popup listbox.
    pub listbox_option: String,
    /// Chosen entries ("pills") of a multi-select widget.
    pub selected_item: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            progress: r#"[data-automation-id="progressBarActiveStep"]"#.into(),
            widget_type_attribute: "data-uxi-widget-type".into(),
            multi_select_widget: "selectinput".into(),
            buttons: r#"button, [role="button"], input[type="submit"]"#.into(),
            listbox_option: r#"[role="listbox"] [role="option"]"#.into(),
            selected_item: r#"[data-automation-id="selectedItem"]"#.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub chrome_path: Option<String>,
    /// DevTools websocket/HTTP URL of an already running browser. When set the
    /// filler attaches to it instead of launching a new one.
    pub debugger_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            viewport_width: 1920,
            viewport_height: 1080,
            chrome_path: None,
            debugger_url: None,
            timeout_secs: 30,
        }
    }
}

impl BrowserConfig {
    /// Default timeout for operations like `wait_for_selector`.
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let config = Self::from_toml(&raw)?;
        config.finish()
    }

    /// Configuration from defaults plus environment (and `.env`) only.
    pub fn from_env() -> Result<Self> {
        Self::default().finish()
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    fn finish(mut self) -> Result<Self> {
        let _ = dotenvy::dotenv();
        self.apply_env(|key| std::env::var(key).ok());
        self.load_profile()?;
        self.validate()?;
        Ok(self)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("JOBFILL_LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = var("JOBFILL_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(key) = var("JOBFILL_LLM_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(path) = var("JOBFILL_PROFILE_PATH") {
            self.fill.profile_path = Some(path);
        }
    }

    fn load_profile(&mut self) -> Result<()> {
        if let Some(ref path) = self.fill.profile_path {
            self.fill.profile = std::fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("cannot read profile {path}: {e}")))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.llm.base_url.trim().is_empty() {
            return Err(Error::Config("llm.base_url must not be empty".into()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(Error::Config("llm.model must not be empty".into()));
        }
        if self.fill.max_retries == 0 {
            return Err(Error::Config("fill.max_retries must be at least 1".into()));
        }
        if self.fill.button_attempts == 0 {
            return Err(Error::Config("fill.button_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

pub struct BrowserBuilder {
    config: BrowserConfig,
}

impl BrowserBuilder {
    pub fn new() -> Self {
        Self {
            config: BrowserConfig::default(),
        }
    }

    pub fn from_config(config: BrowserConfig) -> Self {
        Self { config }
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    /// Attach to a running browser instead of launching one.
    pub fn debugger_url(mut self, url: impl Into<String>) -> Self {
        self.config.debugger_url = Some(url.into());
        self
    }

    /// Set the default timeout for operations like `wait_for_selector`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_secs = timeout.as_secs();
        self
    }

    pub fn build_config(self) -> BrowserConfig {
        self.config
    }

    pub async fn build(self) -> Result<AutofillBrowser> {
        let config = self.build_config();
        match config.debugger_url.clone() {
            Some(url) => AutofillBrowser::connect(&url, config).await,
            None => AutofillBrowser::launch(config).await,
        }
    }
}

impl Default for BrowserBuilder {
    fn default() -> Self {
        Self::new()
    }
}
