use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use kairos::agent::ResponsePipeline;
use kairos::config::{self, mask_secret, Config};
use kairos::resources::ResourceSet;
use kairos::shell::{render, ChatSession, HttpBackend};
use kairos::{gateway, providers, ChatBackendKind, ConfigCommands};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CompletionShell {
    #[value(name = "bash")]
    Bash,
    #[value(name = "fish")]
    Fish,
    #[value(name = "zsh")]
    Zsh,
    #[value(name = "powershell")]
    PowerShell,
    #[value(name = "elvish")]
    Elvish,
}

/// `Kairos` - customer support assistant for the Kairos video platform.
#[derive(Parser, Debug)]
#[command(name = "kairos")]
#[command(version)]
#[command(about = "Customer support assistant that classifies, triages and answers inquiries.", long_about = None)]
struct Cli {
    /// Directory holding config.toml (default: ~/.kairos)
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start an interactive support chat
    #[command(long_about = "\
Start an interactive support chat.

By default the pipeline runs in this process. With --backend http each \
turn is sent to a running gateway instead.

Examples:
  kairos chat
  kairos chat --backend http --url http://127.0.0.1:5000")]
    Chat {
        /// Where each turn is processed
        #[arg(long, value_enum, default_value_t = ChatBackendKind::Direct)]
        backend: ChatBackendKind,

        /// Gateway base URL for --backend http (default: config gateway.host/port)
        #[arg(long)]
        url: Option<String>,
    },

    /// Answer a single message and exit
    Ask {
        /// The customer message
        #[arg(short, long)]
        message: String,

        /// Print the full result as JSON instead of the rendered reply
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP gateway (POST /chat)
    #[command(long_about = "\
Start the HTTP gateway.

Serves POST /chat and GET /health. Bind address defaults to the values in \
your config file (gateway.host / gateway.port).

Examples:
  kairos gateway                  # use config defaults
  kairos gateway -p 8080          # listen on port 8080
  kairos gateway --host 0.0.0.0   # bind to all interfaces")]
    Gateway {
        /// Port to listen on (use 0 for random available port); defaults to config gateway.port
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to; defaults to config gateway.host
        #[arg(long)]
        host: Option<String>,
    },

    /// Show the effective configuration
    Status,

    /// List supported LLM providers
    Providers,

    /// Manage configuration
    #[command(long_about = "\
Manage Kairos configuration.

Examples:
  kairos config schema              # print JSON Schema to stdout
  kairos config path                # print the config file location")]
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },

    /// Generate shell completion script to stdout
    #[command(long_about = "\
Generate shell completion scripts for `kairos`.

Examples:
  source <(kairos completions bash)
  kairos completions zsh > ~/.zfunc/_kairos")]
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

fn build_pipeline(config: &Config) -> Result<ResponsePipeline> {
    let resources = ResourceSet::load(&config.resources_path())?;
    let provider = providers::create_provider_from_config(config)?;
    Ok(ResponsePipeline::new(Arc::from(provider), Arc::new(resources)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(config_dir) = &cli.config_dir {
        if config_dir.trim().is_empty() {
            bail!("--config-dir cannot be empty");
        }
        std::env::set_var("KAIROS_CONFIG_DIR", config_dir);
    }

    // Completions must remain stdout-only and should not load config or initialize logging.
    if let Commands::Completions { shell } = &cli.command {
        let mut stdout = std::io::stdout().lock();
        write_shell_completion(*shell, &mut stdout)?;
        return Ok(());
    }

    // A missing .env is fine; variables may come from the environment.
    let _ = dotenvy::dotenv();

    // Initialize logging - respects RUST_LOG env var, defaults to INFO
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let config = Config::load_or_init().await?;

    match cli.command {
        Commands::Completions { .. } => unreachable!(),

        Commands::Chat { backend, url } => match backend {
            ChatBackendKind::Direct => {
                let pipeline = build_pipeline(&config)?;
                run_chat(ChatSession::new(pipeline)).await
            }
            ChatBackendKind::Http => {
                let url = url.unwrap_or_else(|| {
                    format!("http://{}:{}", config.gateway.host, config.gateway.port)
                });
                let backend = HttpBackend::new(
                    &url,
                    Duration::from_secs(config.gateway.request_timeout_secs),
                );
                run_chat(ChatSession::new(backend)).await
            }
        },

        Commands::Ask { message, json } => {
            let message = message.trim();
            if message.is_empty() {
                bail!("message is required");
            }
            let pipeline = build_pipeline(&config)?;
            let result = pipeline.generate_response(message, &[]).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", render::render_reply(&result.response));
            }
            Ok(())
        }

        Commands::Gateway { port, host } => {
            let port = port.unwrap_or(config.gateway.port);
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            if port == 0 {
                info!("Starting Kairos gateway on {host} (random port)");
            } else {
                info!("Starting Kairos gateway on {host}:{port}");
            }
            gateway::run_gateway(&host, port, config).await
        }

        Commands::Status => {
            print_status(&config);
            Ok(())
        }

        Commands::Providers => {
            let providers = providers::list_providers();
            let current = config.default_provider.trim().to_ascii_lowercase();
            println!("Supported providers ({} total):\n", providers.len());
            println!("  ID (use in config)  DESCRIPTION");
            println!("  ─────────────────── ───────────");
            for p in &providers {
                let marker = if p.name == current { " (active)" } else { "" };
                println!(
                    "  {:<19} {} [{}] key: {}{}",
                    p.name, p.display_name, p.default_url, p.credential_env, marker
                );
            }
            let custom_marker = if current.starts_with("custom:") {
                " (active)"
            } else {
                ""
            };
            println!("\n  custom:<URL>        Any OpenAI-compatible endpoint{custom_marker}");
            Ok(())
        }

        Commands::Config { config_command } => match config_command {
            ConfigCommands::Schema => {
                let schema = schemars::schema_for!(config::Config);
                println!("{}", serde_json::to_string_pretty(&schema)?);
                Ok(())
            }
            ConfigCommands::Path => {
                println!("{}", config.config_path.display());
                Ok(())
            }
        },
    }
}

async fn run_chat<B: kairos::shell::ChatBackend>(mut session: ChatSession<B>) -> Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    session.run(stdin.lock(), &mut stdout).await
}

fn print_status(config: &Config) {
    let credential = match providers::create_provider_from_config(config) {
        Ok(provider) => match (config.api_key.as_deref(), provider.missing_credential()) {
            (Some(key), _) if !key.trim().is_empty() => mask_secret(key.trim()),
            (_, None) => "set via environment".to_string(),
            (_, Some(var)) => format!("missing (set {var})"),
        },
        Err(e) => format!("provider error: {e}"),
    };
    let resources_dir = config.resources_path();

    println!("Kairos Status");
    println!();
    println!("Version:     {}", env!("CARGO_PKG_VERSION"));
    println!("Config:      {}", config.config_path.display());
    println!();
    println!("Provider:    {}", config.default_provider);
    println!("   Model:       {}", config.default_model);
    println!(
        "   API URL:     {}",
        config.api_url.as_deref().unwrap_or("(provider default)")
    );
    println!(
        "   Temperature: {}",
        config
            .temperature
            .map_or_else(|| "(provider default)".to_string(), |t| t.to_string())
    );
    println!("   Timeout:     {}s", config.provider_timeout_secs);
    println!("   API key:     {credential}");
    println!();
    println!(
        "Resources:   {}{}",
        resources_dir.display(),
        if resources_dir.is_dir() { "" } else { " (missing)" }
    );
    println!(
        "Gateway:     {}:{} (timeout {}s)",
        config.gateway.host, config.gateway.port, config.gateway.request_timeout_secs
    );
}

fn write_shell_completion<W: Write>(shell: CompletionShell, writer: &mut W) -> Result<()> {
    use clap_complete::generate;
    use clap_complete::shells;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, bin_name.clone(), writer),
        CompletionShell::PowerShell => {
            generate(shells::PowerShell, &mut cmd, bin_name.clone(), writer);
        }
        CompletionShell::Elvish => generate(shells::Elvish, &mut cmd, bin_name, writer),
    }

    writer.flush()?;
    Ok(())
}
