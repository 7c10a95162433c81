//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use postdesk_core::{config, logging};

mod commands;

#[derive(Parser)]
#[command(name = "postdesk")]
#[command(version = "0.1")]
#[command(about = "Admin panel client: sign in, manage posts, send contact messages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend base URL (overrides config)
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    /// Answer yes to confirmation prompts
    #[arg(short = 'y', long, global = true)]
    yes: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Sign in with email/password or Google
    Login {
        /// Account email
        #[arg(long, requires = "password", conflicts_with = "google")]
        email: Option<String>,
        /// Account password
        #[arg(long, env = "POSTDESK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Sign in through the Google popup flow
        #[arg(long)]
        google: bool,
    },

    /// Sign out and clear the stored token
    Logout,

    /// Show the signed-in admin after re-checking authorization
    Whoami,

    /// Manage posts
    Posts {
        #[command(subcommand)]
        command: PostCommands,
    },

    /// Run the slide carousel in the terminal
    Carousel {
        /// Number of slides (defaults to configured captions, else 3)
        #[arg(long)]
        slides: Option<usize>,
        /// Seconds between automatic advances
        #[arg(long, value_name = "SECS")]
        interval_secs: Option<u64>,
        /// Automatic advances before exiting (defaults to one full cycle)
        #[arg(long)]
        rounds: Option<u32>,
    },

    /// Send a message through the public contact form
    Contact {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        message: String,
        /// Token issued by the bot-mitigation widget
        #[arg(long, env = "POSTDESK_TURNSTILE_TOKEN", hide_env_values = true)]
        turnstile_token: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum PostCommands {
    /// Lists posts
    List,
    /// Uploads a new post
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        excerpt: String,
        /// HTML file with the post body
        #[arg(long, value_name = "PATH")]
        file: PathBuf,
    },
    /// Shows a post's editable fields
    Show {
        #[arg(value_name = "POST_ID")]
        id: String,
    },
    /// Edits a post; fields not given keep their current values
    Edit {
        #[arg(value_name = "POST_ID")]
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Replacement HTML file
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
    },
    /// Deletes a post
    Delete {
        #[arg(value_name = "POST_ID")]
        id: String,
        /// Title shown in the confirmation prompt
        #[arg(long)]
        title: Option<String>,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // Config commands must work even with a broken config file.
    if let Commands::Config { command } = &cli.command {
        return match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        };
    }

    let config = config::Config::load().context("load config")?;
    let _log_guard = logging::init(&config.log)?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli, config).await })
}

async fn dispatch(cli: Cli, config: config::Config) -> Result<()> {
    let Cli {
        command,
        base_url,
        yes,
    } = cli;
    let app = commands::App::new(config, base_url, yes)?;

    match command {
        Commands::Login {
            email,
            password,
            google,
        } => commands::auth::login(&app, email, password, google).await,
        Commands::Logout => commands::auth::logout(&app).await,
        Commands::Whoami => commands::auth::whoami(&app).await,

        Commands::Posts { command } => match command {
            PostCommands::List => commands::posts::list(&app).await,
            PostCommands::Create {
                title,
                excerpt,
                file,
            } => commands::posts::create(&app, title, excerpt, &file).await,
            PostCommands::Show { id } => commands::posts::show(&app, &id).await,
            PostCommands::Edit {
                id,
                title,
                description,
                file,
            } => {
                commands::posts::edit(
                    &app,
                    &id,
                    commands::posts::EditArgs {
                        title,
                        description,
                        file,
                    },
                )
                .await
            }
            PostCommands::Delete { id, title } => {
                commands::posts::delete(&app, &id, title.as_deref()).await
            }
        },

        Commands::Carousel {
            slides,
            interval_secs,
            rounds,
        } => commands::carousel::run(&app, slides, interval_secs, rounds).await,

        Commands::Contact {
            name,
            email,
            subject,
            message,
            turnstile_token,
        } => {
            let message = postdesk_core::contact::ContactMessage {
                name,
                email,
                subject,
                message,
            };
            commands::contact::send(&app, &message, turnstile_token.as_deref()).await
        }

        Commands::Config { .. } => Ok(()),
    }
}
