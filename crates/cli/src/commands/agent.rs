//! `forgeloop agent` — Interactive or single-message chat mode.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use forgeloop_agent::{AgentLoop, CancellationToken, DelegateTool, ProviderResolver};
use forgeloop_config::{AppConfig, RoleConfig, WELL_KNOWN_PROVIDERS, env_key_name};
use forgeloop_core::agent::{AgentResult, PriorHistory};
use forgeloop_core::event::EventBus;
use forgeloop_core::provider::Transcript;
use forgeloop_providers::ProviderRouter;
use forgeloop_tools::{Workspace, default_registry};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::render;
use crate::session::SavedSession;

/// Providers that run locally and need no API key.
const LOCAL_PROVIDERS: &[&str] = &["ollama", "vllm"];

#[derive(Args, Debug, Default)]
pub struct AgentArgs {
    /// Send a single message instead of entering interactive mode
    #[arg(short, long)]
    pub message: Option<String>,

    /// Provider to talk to (overrides `default_provider`)
    #[arg(long)]
    pub provider: Option<String>,

    /// Model to use (overrides the provider's default)
    #[arg(long)]
    pub model: Option<String>,

    /// Run as a configured role (its prompt, tools and provider)
    #[arg(long)]
    pub role: Option<String>,

    /// Continue a saved session
    #[arg(long, value_name = "FILE")]
    pub resume: Option<PathBuf>,

    /// Save the transcript after every turn
    #[arg(long, value_name = "FILE")]
    pub save: Option<PathBuf>,

    /// Override `agent.max_iterations`
    #[arg(long)]
    pub max_iterations: Option<u32>,
}

/// Everything needed to build a fresh agent for each turn.
struct ChatContext {
    config: AppConfig,
    router: Arc<ProviderRouter>,
    provider_name: String,
    model: Option<String>,
    role_name: Option<String>,
    role: Option<RoleConfig>,
    workspace: Workspace,
    events: EventBus,
}

impl ChatContext {
    fn system_prompt(&self) -> &str {
        match &self.role {
            Some(role) => &role.system_prompt,
            None => &self.config.system_prompt,
        }
    }

    /// A loop wired to `cancel`; its delegation tool shares the token.
    fn build_agent(&self, cancel: &CancellationToken) -> Result<AgentLoop, Box<dyn std::error::Error>> {
        let (provider_name, model) = match &self.role {
            Some(role) => (
                role.provider.as_deref().unwrap_or(&self.provider_name),
                self.model.as_deref().or(role.model.as_deref()),
            ),
            None => (self.provider_name.as_str(), self.model.as_deref()),
        };
        let provider = self.router.resolve(Some(provider_name), model)?;

        let base = default_registry(
            self.workspace.clone(),
            Duration::from_secs(self.config.workspace.command_timeout_secs),
        );
        let delegate = DelegateTool::from_config(&self.config, base.clone(), self.router.clone())
            .with_events(self.events.clone())
            .with_cancellation(cancel.clone());

        let (mut tools, can_delegate) = match &self.role {
            Some(role) => (base.subset(&role.tools), role.can_delegate),
            None => (base, true),
        };
        if can_delegate && !self.config.roles.is_empty() {
            tools.register(Arc::new(delegate));
        }
        debug!(tools = ?tools.names(), "Agent tools");

        let max_iterations = self
            .role
            .as_ref()
            .map_or(self.config.agent.max_iterations, |r| r.max_iterations);

        Ok(AgentLoop::new(provider, tools)
            .with_settings(&self.config.agent)
            .with_max_iterations(max_iterations)
            .with_events(self.events.clone())
            .with_cancellation(cancel.clone()))
    }

    /// Run one user message; Ctrl-C cancels it at the next turn boundary.
    async fn turn(
        &self,
        message: &str,
        prior: PriorHistory,
    ) -> Result<AgentResult, Box<dyn std::error::Error>> {
        let cancel = CancellationToken::new();
        let agent = self.build_agent(&cancel)?;
        let run = agent.run(message, prior, self.system_prompt());
        tokio::pin!(run);

        let result = tokio::select! {
            result = &mut run => result,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("  Cancelling after the current step...");
                cancel.cancel();
                run.await
            }
        };
        Ok(result?)
    }
}

pub async fn run(args: AgentArgs, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(max) = args.max_iterations {
        config.agent.max_iterations = max.max(1);
    }

    let role = match &args.role {
        Some(name) => Some(
            config
                .roles
                .get(name)
                .cloned()
                .ok_or_else(|| format!("Unknown role '{name}'"))?,
        ),
        None => None,
    };

    let provider_name = args
        .provider
        .clone()
        .unwrap_or_else(|| config.default_provider.clone());
    select_provider(&mut config, &provider_name, |key| std::env::var(key).ok())?;

    // Check for an API key early and give a clear error
    let effective = role
        .as_ref()
        .and_then(|r| r.provider.clone())
        .unwrap_or_else(|| provider_name.clone());
    if config.api_key_for(&effective).is_none() && !LOCAL_PROVIDERS.contains(&effective.as_str()) {
        eprintln!();
        eprintln!("  ERROR: No API key configured for '{effective}'!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    {}", env_key_name(&effective));
        eprintln!("    FORGELOOP_API_KEY   (used for every provider)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let workspace = Workspace::new(config.workspace.root());
    workspace.ensure_root().await?;

    let ctx = ChatContext {
        router: Arc::new(forgeloop_providers::build_from_config(&config)),
        provider_name,
        model: args.model.clone(),
        role_name: args.role.clone(),
        role,
        workspace,
        events: EventBus::default(),
        config,
    };
    let renderer = render::spawn(&ctx.events, verbose);

    let mut transcript: Option<Transcript> = match &args.resume {
        Some(path) => {
            let session = SavedSession::load(path)?;
            info!(path = %path.display(), entries = session.transcript.len(), "Resuming session");
            Some(session.transcript)
        }
        None => None,
    };

    let outcome = match args.message.as_deref() {
        Some(message) => single(&ctx, message, transcript, args.save.as_deref()).await,
        None => interactive(&ctx, &mut transcript, args.save.as_deref()).await,
    };

    renderer.abort();
    outcome
}

/// Make `name` the default provider, picking up `<NAME>_API_KEY` if the
/// configuration has no key for it.
fn select_provider(
    config: &mut AppConfig,
    name: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    if !WELL_KNOWN_PROVIDERS.contains(&name) && !config.providers.contains_key(name) {
        return Err(format!(
            "Unknown provider '{name}'. Add a [providers.{name}] section with an api_url."
        )
        .into());
    }
    config.default_provider = name.to_string();
    if let Some(key) = lookup(&env_key_name(name)) {
        config.providers.entry(name.to_string()).or_default().api_key = Some(key);
    }
    Ok(())
}

fn prior(transcript: Option<Transcript>) -> PriorHistory {
    transcript.map_or(PriorHistory::None, PriorHistory::Transcript)
}

fn save(
    ctx: &ChatContext,
    path: Option<&std::path::Path>,
    transcript: &Transcript,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = path {
        SavedSession::new(&ctx.provider_name, transcript.clone()).save(path)?;
        debug!(path = %path.display(), "Session saved");
    }
    Ok(())
}

async fn single(
    ctx: &ChatContext,
    message: &str,
    transcript: Option<Transcript>,
    save_path: Option<&std::path::Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = ctx.turn(message, prior(transcript)).await?;
    save(ctx, save_path, &result.transcript)?;
    println!("{}", result.text);
    Ok(())
}

async fn interactive(
    ctx: &ChatContext,
    transcript: &mut Option<Transcript>,
    save_path: Option<&std::path::Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("  forgeloop — interactive mode");
    println!();
    println!("  Provider:  {}", ctx.provider_name);
    println!("  Workspace: {}", ctx.workspace.root().display());
    if let Some(role) = &ctx.role_name {
        println!("  Role:      {role}");
    }
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' to quit. Ctrl+C cancels the running task.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        use std::io::Write;
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        match ctx.turn(line, prior(transcript.clone())).await {
            Ok(result) => {
                println!();
                for text_line in result.text.lines() {
                    println!("  Assistant > {text_line}");
                }
                println!();
                save(ctx, save_path, &result.transcript)?;
                *transcript = Some(result.transcript);
            }
            Err(e) => {
                // The transcript is left as it was before the failed turn
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}
