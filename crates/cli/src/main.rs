use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chat-helper")]
#[command(about = "Signal command bridge to a tool-using Ollama agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config.json.
    Init {
        /// Config file path (default: CHAT_HELPER_CONFIG or ~/.chat-helper/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Listen on Signal and answer /e, /c and /h commands until SIGINT/SIGTERM.
    Run {
        /// Config file path (default: CHAT_HELPER_CONFIG or ~/.chat-helper/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Ollama model to use (overrides config and OLLAMA_MODEL)
        #[arg(long, short)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("chat-helper {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Run { config, model }) => {
            if let Err(e) = run_bridge(config, model).await {
                log::error!("chat-helper failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let created = lib::init::init_config_dir(&path)?;
    if created {
        println!("wrote default configuration to {}", path.display());
    } else {
        println!("configuration already exists at {}", path.display());
    }
    Ok(())
}

async fn run_bridge(
    config_path: Option<std::path::PathBuf>,
    model: Option<String>,
) -> anyhow::Result<()> {
    let (mut config, path) = lib::config::load_config(config_path)?;
    if let Some(m) = model.filter(|m| !m.trim().is_empty()) {
        config.agent.model = m.trim().to_string();
    }
    log::info!("using config {}", path.display());
    lib::bridge::run_bridge(config).await
}
