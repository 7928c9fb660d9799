mod config;
mod engine;
mod error;
mod llm;
mod repl;
mod skills;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::engine::{ConversationEngine, EngineSettings, LocationFallback, PlaceholderSet};
use crate::llm::{ChatBackend, OpenAiCompatBackend};
use crate::skills::SkillRegistry;
use crate::skills::datetime::DateTimeSkill;
use crate::skills::email::EmailSkill;
use crate::skills::file::FileSkill;
use crate::skills::memory::MemorySkill;
use crate::skills::screenshot::ScreenshotSkill;
use crate::skills::system::SystemSkill;
use crate::skills::text::TextSkill;
use crate::skills::weather::WeatherSkill;
use crate::skills::web::WebSkill;
use crate::skills::Skill;

#[tokio::main]
async fn main() {
    // Load .env file (if present) before anything reads env vars
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    if args.iter().any(|a| a == "--default-config") {
        print!("{}", Config::default_config_contents());
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);

    let config = match Config::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to load config: {e}");
            std::process::exit(1);
        }
    };

    info!(agent_name = %config.agent_name, timezone = %config.timezone, "jarvis starting");

    let backend: Arc<dyn ChatBackend> = match OpenAiCompatBackend::new(&config) {
        Ok(b) => Arc::new(b),
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let registry = build_skill_registry(&config, backend.clone());
    info!(
        skills = ?registry.skill_names(),
        tools = registry.len(),
        "skill registry initialized"
    );

    if args.iter().any(|a| a == "--check") {
        run_checks(&config, &registry);
        return;
    }

    let mut engine = ConversationEngine::new(
        backend,
        Arc::new(registry),
        EngineSettings::from_config(&config),
    )
    .with_policy(LocationFallback::weather(config.default_location()));
    if !config.placeholders.is_empty() {
        engine = engine.with_placeholders(PlaceholderSet::new(&config.placeholders));
    }

    let mut session = repl::Session::new(&config.repl);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());

    tokio::select! {
        result = repl::run(&engine, &mut session, stdin, tokio::io::stdout()) => {
            if let Err(e) = result {
                error!("input loop failed: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
        }
    }

    info!("jarvis stopped");
}

/// Build the skill registry from config.  Skills that fail to initialize
/// are skipped with a warning.
fn build_skill_registry(config: &Config, backend: Arc<dyn ChatBackend>) -> SkillRegistry {
    let skills_cfg = &config.skills;
    let mut skills: Vec<Box<dyn Skill>> = Vec::new();

    if skills_cfg.datetime.enabled {
        skills.push(Box::new(DateTimeSkill::new(&config.timezone)));
    }

    if skills_cfg.weather.enabled {
        match WeatherSkill::new(
            config.weather_api_key(),
            config.default_location(),
            &skills_cfg.weather.country,
        ) {
            Ok(skill) => skills.push(Box::new(skill)),
            Err(e) => warn!("weather skill disabled: {e}"),
        }
    }

    if skills_cfg.file.enabled {
        match FileSkill::new(config.file_dir()) {
            Ok(skill) => skills.push(Box::new(skill)),
            Err(e) => warn!("file skill disabled: {e}"),
        }
    }

    if skills_cfg.system.enabled {
        skills.push(Box::new(SystemSkill));
    }

    if skills_cfg.web.enabled {
        skills.push(Box::new(WebSkill));
    }

    if skills_cfg.memory.enabled {
        skills.push(Box::new(MemorySkill::new(config.memory_file())));
    }

    if skills_cfg.screenshot.enabled {
        skills.push(Box::new(ScreenshotSkill::new(config.screenshot_dir())));
    }

    if skills_cfg.text.enabled {
        skills.push(Box::new(TextSkill::new(
            backend,
            Config::desktop_dir(),
            config.llm.summary_max_tokens,
        )));
    }

    if skills_cfg.email.enabled {
        skills.push(Box::new(EmailSkill::new(
            config.email_address(),
            config.email_password(),
            &config.imap_server(),
        )));
    }

    let mut registry = SkillRegistry::new();
    for skill in &skills {
        registry.register(skill.as_ref());
    }
    registry
}

fn run_checks(config: &Config, registry: &SkillRegistry) {
    info!("running pre-flight checks...");
    info!("config: OK");
    info!("  agent_name: {}", config.agent_name);
    info!("  timezone: {}", config.timezone);
    info!(
        "  default location: {}",
        config.default_location().unwrap_or_else(|| "(none, will ask)".into())
    );
    info!("  memory file: {}", config.memory_file().display());

    if config.weather_api_key().is_none() && config.skills.weather.enabled {
        warn!("  OPENWEATHERMAP_API_KEY not set: weather lookups will report an error");
    }
    if config.skills.email.enabled
        && (config.email_address().is_none() || config.email_password().is_none())
    {
        warn!("  EMAIL_ADDRESS/EMAIL_PASSWORD not set: email checks will report an error");
    }

    for schema in registry.tool_schemas() {
        info!("  tool: {}", schema.name);
    }
    match serde_json::to_string(&registry.tool_definitions()) {
        Ok(payload) => info!("  tool payload: {} bytes", payload.len()),
        Err(e) => error!("  tool payload: cannot serialize: {e}"),
    }
    info!("checks complete");
}

fn print_usage() {
    println!(
        "jarvis — text-mode assistant with tool calling

USAGE:
    jarvis [OPTIONS]

OPTIONS:
    --config <PATH>     Path to config file (default: ~/.config/jarvis/config.toml)
    --default-config    Print default config to stdout and exit
    --check             Validate config and list available tools, then exit
    -h, --help          Print this help message

INPUT:
    Lines containing the wake word (\"jarvis\") or a direct command such as
    \"open\", \"what\" or \"search\" are answered. \"pause\" and \"resume\" toggle
    listening; \"exit\", \"quit\" or \"stop\" end the session.

ENVIRONMENT:
    GROQ_API_KEY            Required. Chat-completions API key.
    GROQ_MODEL              Model id (default: llama-3.3-70b-versatile)
    GROQ_BASE_URL           OpenAI-compatible base URL (default: Groq)
    DEFAULT_CITY            Location used for weather questions without one
    OPENWEATHERMAP_API_KEY  Weather lookups
    JARVIS_MEMORY_FILE      JSON file backing the memory skill
    EMAIL_ADDRESS           Mailbox login for the email skill
    EMAIL_PASSWORD          Mailbox password
    EMAIL_IMAP_SERVER       IMAP server (default: imap.gmail.com)
    RUST_LOG                Optional. Tracing filter (default: info).
"
    );
}
