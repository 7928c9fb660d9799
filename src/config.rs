use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{JarvisError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_agent_name")]
    pub agent_name: String,

    /// IANA timezone used by the date/time skill (e.g. "Asia/Kolkata").
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// City substituted when the model asks for weather without a location.
    /// Empty means no default: the assistant asks the user instead.
    /// Can be overridden with the `DEFAULT_CITY` env var.
    #[serde(default)]
    pub default_city: String,

    /// Argument values treated as "the model didn't know" and cleared before
    /// a tool runs.  Empty means the built-in list.
    #[serde(default)]
    pub placeholders: Vec<String>,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub repl: ReplConfig,

    #[serde(default)]
    pub skills: SkillsConfig,
}

// -- LLM -----------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// API key for the chat-completions endpoint.
    /// Can be overridden with the `GROQ_API_KEY` env var.
    #[serde(default)]
    pub api_key: String,

    /// OpenAI-compatible base URL (default: "https://api.groq.com/openai/v1").
    /// Can be overridden with the `GROQ_BASE_URL` env var.
    #[serde(default)]
    pub base_url: String,

    /// Model identifier (default: "llama-3.3-70b-versatile").
    /// Can be overridden with the `GROQ_MODEL` env var.
    #[serde(default)]
    pub model: String,

    /// Response cap for the first round, where the model may request tools.
    #[serde(default = "default_tool_max_tokens")]
    pub tool_max_tokens: u32,

    /// Response cap for the final round after tool results are appended.
    #[serde(default = "default_final_max_tokens")]
    pub final_max_tokens: u32,

    /// Response cap for file summaries produced by the text skill.
    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,

    /// Per-request timeout in seconds (0 = 300s).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

// -- REPL ----------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReplConfig {
    /// Lines must contain this word (or a direct command) to be handled.
    #[serde(default = "default_wake_word")]
    pub wake_word: String,

    #[serde(default = "default_exit_words")]
    pub exit_words: Vec<String>,

    /// Keywords that bypass the wake-word filter.
    #[serde(default = "default_direct_commands")]
    pub direct_commands: Vec<String>,
}

// -- Skills --------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SkillsConfig {
    #[serde(default)]
    pub datetime: ToggleConfig,

    #[serde(default)]
    pub weather: WeatherSkillConfig,

    #[serde(default)]
    pub file: FileSkillConfig,

    #[serde(default)]
    pub system: ToggleConfig,

    #[serde(default)]
    pub web: ToggleConfig,

    #[serde(default)]
    pub memory: MemorySkillConfig,

    #[serde(default)]
    pub screenshot: ScreenshotSkillConfig,

    #[serde(default)]
    pub text: ToggleConfig,

    #[serde(default)]
    pub email: EmailSkillConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToggleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherSkillConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// OpenWeatherMap API key.
    /// Can be overridden with the `OPENWEATHERMAP_API_KEY` env var.
    #[serde(default)]
    pub api_key: String,

    /// Country code appended to numeric (postal code) lookups.
    #[serde(default = "default_weather_country")]
    pub country: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileSkillConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory the file skill is confined to (default: the desktop).
    #[serde(default)]
    pub dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemorySkillConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// JSON file backing the memory skill (default: `$data_dir/memory.json`).
    /// Can be overridden with the `JARVIS_MEMORY_FILE` env var.
    #[serde(default)]
    pub file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailSkillConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Mailbox login.  Can be overridden with the `EMAIL_ADDRESS` env var.
    #[serde(default)]
    pub address: String,

    /// Mailbox password (an app password for Gmail).
    /// Can be overridden with the `EMAIL_PASSWORD` env var.
    #[serde(default)]
    pub password: String,

    /// IMAP server, port 993 (default: "imap.gmail.com").
    /// Can be overridden with the `EMAIL_IMAP_SERVER` env var.
    #[serde(default = "default_imap_server")]
    pub imap_server: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScreenshotSkillConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Output directory (default: `<desktop>/Jarvis_Screenshots`).
    #[serde(default)]
    pub dir: String,
}

// -- Defaults ------------------------------------------------------------

fn default_agent_name() -> String {
    "Jarvis".to_string()
}

fn default_timezone() -> String {
    "Asia/Kolkata".to_string()
}

fn default_tool_max_tokens() -> u32 {
    250
}

fn default_final_max_tokens() -> u32 {
    200
}

fn default_summary_max_tokens() -> u32 {
    150
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_wake_word() -> String {
    "jarvis".to_string()
}

fn default_exit_words() -> Vec<String> {
    ["exit", "quit", "shutdown", "close", "stop", "stop listening"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_direct_commands() -> Vec<String> {
    [
        "open", "volume", "search", "create", "write", "read", "make", "who", "what", "when",
        "where", "how", "why", "thank", "hello",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_weather_country() -> String {
    "in".to_string()
}

fn default_imap_server() -> String {
    "imap.gmail.com".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: String::new(),
            model: String::new(),
            tool_max_tokens: default_tool_max_tokens(),
            final_max_tokens: default_final_max_tokens(),
            summary_max_tokens: default_summary_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            wake_word: default_wake_word(),
            exit_words: default_exit_words(),
            direct_commands: default_direct_commands(),
        }
    }
}

impl Default for ToggleConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for WeatherSkillConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
            country: default_weather_country(),
        }
    }
}

impl Default for FileSkillConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: String::new(),
        }
    }
}

impl Default for MemorySkillConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file: String::new(),
        }
    }
}

impl Default for EmailSkillConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: String::new(),
            password: String::new(),
            imap_server: default_imap_server(),
        }
    }
}

impl Default for ScreenshotSkillConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: String::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agent_name: default_agent_name(),
            timezone: default_timezone(),
            default_city: String::new(),
            placeholders: Vec::new(),
            llm: LlmConfig::default(),
            repl: ReplConfig::default(),
            skills: SkillsConfig::default(),
        }
    }
}

// -- Config impl ---------------------------------------------------------

/// Environment variable if set and non-empty, else the configured value if
/// non-empty, else `None`.
pub fn env_or(var: &str, configured: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| {
            if configured.trim().is_empty() {
                None
            } else {
                Some(configured.to_string())
            }
        })
}

impl Config {
    /// Load config from the given path, or the default XDG config location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path(),
        };

        let config = if config_path.exists() {
            info!("loading config from {}", config_path.display());
            let contents = std::fs::read_to_string(&config_path).map_err(JarvisError::Io)?;
            toml::from_str(&contents)
                .map_err(|e| JarvisError::Config(format!("parse error: {e}")))?
        } else {
            info!("no config file found, using defaults");
            Config::default()
        };

        Ok(config)
    }

    /// Returns the default config file path: `$XDG_CONFIG_HOME/jarvis/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("jarvis")
            .join("config.toml")
    }

    /// Returns the data directory: `$XDG_DATA_HOME/jarvis/`
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join("jarvis")
    }

    /// The user's desktop, falling back to `~/Desktop`.
    pub fn desktop_dir() -> PathBuf {
        dirs::desktop_dir().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("Desktop")
        })
    }

    /// The backend API key. Its absence is fatal at startup.
    pub fn api_key(&self) -> Result<String> {
        env_or("GROQ_API_KEY", &self.llm.api_key).ok_or_else(|| {
            JarvisError::Config(
                "API key required: set GROQ_API_KEY env var or llm.api_key in config".into(),
            )
        })
    }

    /// Default location for weather lookups, if one is configured.
    pub fn default_location(&self) -> Option<String> {
        env_or("DEFAULT_CITY", &self.default_city)
    }

    pub fn weather_api_key(&self) -> Option<String> {
        env_or("OPENWEATHERMAP_API_KEY", &self.skills.weather.api_key)
    }

    pub fn file_dir(&self) -> PathBuf {
        if self.skills.file.dir.is_empty() {
            Self::desktop_dir()
        } else {
            PathBuf::from(&self.skills.file.dir)
        }
    }

    pub fn memory_file(&self) -> PathBuf {
        env_or("JARVIS_MEMORY_FILE", &self.skills.memory.file)
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::data_dir().join("memory.json"))
    }

    pub fn email_address(&self) -> Option<String> {
        env_or("EMAIL_ADDRESS", &self.skills.email.address)
    }

    pub fn email_password(&self) -> Option<String> {
        env_or("EMAIL_PASSWORD", &self.skills.email.password)
    }

    pub fn imap_server(&self) -> String {
        env_or("EMAIL_IMAP_SERVER", &self.skills.email.imap_server)
            .unwrap_or_else(default_imap_server)
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        if self.skills.screenshot.dir.is_empty() {
            Self::desktop_dir().join("Jarvis_Screenshots")
        } else {
            PathBuf::from(&self.skills.screenshot.dir)
        }
    }

    /// Generate the default config file contents.
    pub fn default_config_contents() -> &'static str {
        include_str!("../config.example.toml")
    }
}
