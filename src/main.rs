use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use promptlens::cli::commands;
use promptlens::gate::ClientTraits;

#[derive(Parser)]
#[command(name = "promptlens")]
#[command(
    version,
    about = "Score, critique and reword LLM prompts of any length"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a prompt: score, suggestions and a reworded version
    Analyze {
        #[arg(help = "Prompt text (or use --file)")]
        text: Option<String>,
        #[arg(long, short, help = "Read the prompt from a file")]
        file: Option<PathBuf>,
        #[arg(long, help = "Caller identity for the cooldown gate")]
        identity: Option<String>,
        #[arg(long, help = "Quota fingerprint (overrides client traits)")]
        fingerprint: Option<String>,
        #[command(flatten)]
        traits: TraitArgs,
        #[arg(long, help = "Print the result as JSON")]
        json: bool,
    },

    /// Show the token count and chunk plan without calling the service
    Plan {
        #[arg(help = "Prompt text (or use --file)")]
        text: Option<String>,
        #[arg(long, short, help = "Read the prompt from a file")]
        file: Option<PathBuf>,
        #[arg(long, help = "Print the plan as JSON")]
        json: bool,
    },

    /// Show today's quota usage
    Limit {
        #[arg(long, help = "Fingerprint to check (default: this machine)")]
        fingerprint: Option<String>,
        #[arg(long, help = "Consume one analysis from the quota")]
        consume: bool,
        #[arg(long, help = "Print the status as JSON")]
        json: bool,
    },

    /// Manage the result cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage the saved API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Client traits hashed into the quota fingerprint; unset fields fall back
/// to this machine's values
#[derive(Args)]
struct TraitArgs {
    #[arg(long)]
    user_agent: Option<String>,
    #[arg(long)]
    language: Option<String>,
    #[arg(long)]
    platform: Option<String>,
    #[arg(long)]
    timezone: Option<String>,
    #[arg(long, help = "Screen size, e.g. 1920x1080")]
    screen: Option<String>,
}

impl TraitArgs {
    fn into_traits(self) -> ClientTraits {
        let local = ClientTraits::local();
        ClientTraits {
            user_agent: self.user_agent.unwrap_or(local.user_agent),
            language: self.language.unwrap_or(local.language),
            platform: self.platform.unwrap_or(local.platform),
            timezone: self.timezone.unwrap_or(local.timezone),
            screen: self.screen.unwrap_or(local.screen),
        }
    }
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show entry counts and age range
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Remove entries past the retention window
    Sweep,
    /// Remove every cached result
    Clear,
}

#[derive(Subcommand)]
enum KeyAction {
    /// Save an API key
    Set { key: String },
    /// Show the saved key (masked)
    Show,
    /// Remove the saved key
    Clear,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'g', long, help = "Show global config file only")]
        global: bool,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mpromptlens encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Analyze {
            text,
            file,
            identity,
            fingerprint,
            traits,
            json,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::analyze::run(commands::analyze::AnalyzeOptions {
                text,
                file,
                identity,
                fingerprint,
                traits: traits.into_traits(),
                json,
            }))?;
        }
        Commands::Plan { text, file, json } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::plan::run(text, file, json))?;
        }
        Commands::Limit {
            fingerprint,
            consume,
            json,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::limit::run(fingerprint, consume, json))?;
        }
        Commands::Cache { action } => {
            let rt = Runtime::new()?;
            match action {
                CacheAction::Stats { json } => rt.block_on(commands::cache::stats(json))?,
                CacheAction::Sweep => rt.block_on(commands::cache::sweep())?,
                CacheAction::Clear => rt.block_on(commands::cache::clear())?,
            }
        }
        Commands::Key { action } => {
            let rt = Runtime::new()?;
            match action {
                KeyAction::Set { key } => rt.block_on(commands::key::set(&key))?,
                KeyAction::Show => rt.block_on(commands::key::show())?,
                KeyAction::Clear => rt.block_on(commands::key::clear())?,
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { global, format } => {
                commands::config::show(global, &format)?;
            }
            ConfigAction::Path => {
                commands::config::path()?;
            }
            ConfigAction::Init { global, force } => {
                if global {
                    commands::config::init_global(force)?;
                } else {
                    commands::config::init_project(force)?;
                }
            }
        },
    }

    Ok(())
}
