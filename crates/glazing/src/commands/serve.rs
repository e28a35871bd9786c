//! Serve command - runs the chat server in the foreground.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Args;

use glazing_config::{GlazingConfig, LlmConfig, resolve_api_key};
use glazing_llm::{OpenAiConfig, TokenSource, TokenSourceConfig};
use glazing_server::{AppState, Server, ServerConfig, SessionStore};

use super::Context;

/// Arguments for the serve command.
///
/// CLI arguments override config file and environment values.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<IpAddr>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Answer with canned responses instead of calling the LLM backend
    #[arg(long)]
    pub fake_llm: bool,

    /// Model (overrides config)
    #[arg(long)]
    pub model: Option<String>,
}

/// Run the serve command.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    // ── Load configuration ──────────────────────────────────────────────

    let loaded = super::load_config(ctx)?;

    for warning in &loaded.warnings {
        eprintln!("warning: {}", warning);
    }

    if ctx.verbose {
        let sources = loaded.loaded_from();
        if sources.is_empty() {
            println!("No config files found, using defaults + environment + CLI args");
        } else {
            for source in sources {
                println!("Loaded config: {}", source.display());
            }
        }
    }

    let mut config = loaded.config;
    apply_cli_overrides(&mut config, &args);
    config.validate()?;

    // ── Token source ────────────────────────────────────────────────────

    let llm = config.llm();
    let api_key = resolve_api_key(&llm, |name| std::env::var(name).ok());
    if let Some(ref secret) = api_key {
        tracing::debug!(source = %secret.source, "Resolved API key");
    }

    let source = TokenSource::from_config(&token_source_config(
        &llm,
        api_key.map(|secret| secret.value),
    ))
    .context("Failed to configure token source")?;

    let system_prompt = llm
        .load_system_prompt()
        .context("Failed to load system prompt")?;

    tracing::info!(
        llm = %source.name(),
        system_prompt_chars = system_prompt.len(),
        "Token source ready"
    );

    // ── Application state ───────────────────────────────────────────────

    let mut state = AppState::new(source, server_config(&config, system_prompt));

    let session = config.session();
    if session.redis.enabled {
        let url = session.redis.url();
        match SessionStore::connect(&url, Duration::from_secs(session.ttl_secs)).await {
            Ok(store) => {
                tracing::info!(%url, "Connected to Redis");
                state = state.with_store(store);
            }
            Err(e) => {
                tracing::error!(
                    %url,
                    error = %e,
                    "Failed to connect to Redis, continuing without session persistence"
                );
            }
        }
    }

    // ── Run ─────────────────────────────────────────────────────────────

    let server = Server::from_state(state);
    println!("Glazing listening on {}", server.bind_address());
    server.run().await?;

    Ok(())
}

/// Apply CLI flags on top of file and environment configuration.
fn apply_cli_overrides(config: &mut GlazingConfig, args: &ServeArgs) {
    if args.bind.is_some() || args.port.is_some() {
        let mut server = config.server();
        let ip = args.bind.unwrap_or(server.bind.ip());
        let port = args.port.unwrap_or(server.bind.port());
        server.bind = SocketAddr::new(ip, port);
        config.server = Some(server);
    }

    if args.fake_llm || args.model.is_some() {
        let mut llm = config.llm();
        if args.fake_llm {
            llm.use_fake = true;
        }
        if let Some(ref model) = args.model {
            llm.model = model.clone();
        }
        config.llm = Some(llm);
    }
}

/// Translate the `[llm]` section into token source settings.
fn token_source_config(llm: &LlmConfig, api_key: Option<String>) -> TokenSourceConfig {
    let backend = OpenAiConfig::default()
        .with_api_key(api_key)
        .with_base_url(&llm.base_url)
        .with_model(&llm.model)
        .with_temperature(llm.temperature)
        .with_timeout(llm.timeout());

    TokenSourceConfig {
        use_fallback: llm.use_fake,
        backend,
        api_key_file: llm.api_key_file.clone(),
        fallback_min_delay: Duration::from_millis(llm.fallback_min_delay_ms),
        fallback_max_delay: Duration::from_millis(llm.fallback_max_delay_ms),
    }
}

/// Translate the `[server]` section into runtime server settings.
fn server_config(config: &GlazingConfig, system_prompt: String) -> ServerConfig {
    let server = config.server();
    ServerConfig::new()
        .with_bind_address(server.bind)
        .with_cors_origins(server.cors_origins.clone())
        .with_keepalive_interval(server.keepalive_interval())
        .with_max_ws_message_size(server.max_ws_message_size)
        .with_system_prompt(system_prompt)
}
