//! Renomarket CLI - browse the marketplace and manage a session from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Log in (token pair is persisted in RENOMARKET_TOKEN_FILE)
//! rm-cli login -e claire@renov.fr
//!
//! # Browse the catalog (falls back to demo data when the backend is down)
//! rm-cli catalog products --search parquet
//!
//! # Manage the cart
//! rm-cli cart add 65f1c0ffee -q 2
//! rm-cli cart set 65f1c0ffee 3
//!
//! # Follow a conversation until Ctrl-C
//! rm-cli messages watch 65f1c0ffee
//! ```
//!
//! # Commands
//!
//! - `login`, `register`, `logout`, `whoami` - Session management
//! - `cart` - Show and edit the cart
//! - `catalog` - Products, projects, professionals, articles, forum, ideabooks
//! - `messages` - Conversations, with live polling via `watch`
//! - `access` - Check whether a front-end route needs a session

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use renomarket_client::ClientConfig;
use renomarket_client::Marketplace;
use renomarket_client::api::FileTokenStore;
use renomarket_core::UserType;
use secrecy::SecretString;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "rm-cli")]
#[command(author, version, about = "Renomarket marketplace CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session tokens
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "RENOMARKET_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and log into it
    Register(RegisterArgs),
    /// Forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Show and edit the cart
    Cart {
        #[command(subcommand)]
        action: Option<CartAction>,
    },
    /// Browse the catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
    /// Private messages
    Messages {
        #[command(subcommand)]
        action: MessagesAction,
    },
    /// Check whether a front-end route requires a session
    Access {
        /// Route path, e.g. `/messages`
        path: String,
    },
}

#[derive(Args)]
struct RegisterArgs {
    #[arg(long)]
    first_name: String,

    #[arg(long)]
    last_name: String,

    #[arg(short, long)]
    email: String,

    #[arg(short, long, env = "RENOMARKET_PASSWORD", hide_env_values = true)]
    password: String,

    #[arg(long)]
    phone: Option<String>,

    /// Account type (`particulier` or `professionnel`)
    #[arg(long, default_value = "particulier")]
    user_type: UserType,

    /// Company name (professional accounts)
    #[arg(long)]
    company: Option<String>,

    /// SIRET number (professional accounts)
    #[arg(long)]
    siret: Option<String>,

    /// Trade offered; repeat for several
    #[arg(long = "specialty")]
    specialties: Vec<String>,
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart (default)
    Show,
    /// Add a product
    Add {
        product_id: String,
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set a line's quantity (0 removes it)
    Set { product_id: String, quantity: u32 },
    /// Remove a product
    Remove { product_id: String },
    /// Empty the cart
    Clear,
}

#[derive(Args)]
struct ListArgs {
    /// Full-text search
    #[arg(short, long)]
    search: Option<String>,

    #[arg(short, long)]
    category: Option<String>,

    #[arg(long)]
    page: Option<u32>,

    #[arg(long)]
    limit: Option<u32>,
}

#[derive(Subcommand)]
enum CatalogAction {
    /// List products
    Products(ListArgs),
    /// Show one product
    Product { id: String },
    /// List projects
    Projects(ListArgs),
    /// Show one project
    Project { id: String },
    /// List professionals
    Professionals(ListArgs),
    /// List articles
    Articles(ListArgs),
    /// Show one article
    Article { id: String },
    /// List forum topics
    Forum(ListArgs),
    /// List your ideabooks
    Ideabooks,
    /// Autocomplete suggestions
    Suggest { text: String },
}

#[derive(Subcommand)]
enum MessagesAction {
    /// List conversations
    List,
    /// Show a conversation's messages
    Show { conversation_id: String },
    /// Reply in a conversation
    Send {
        conversation_id: String,
        content: String,
    },
    /// Start a conversation with another user
    Start { recipient_id: String, content: String },
    /// Mark a conversation as read
    Read { conversation_id: String },
    /// Poll conversations (or one conversation) until Ctrl-C
    Watch { conversation_id: Option<String> },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "renomarket_client=info,renomarket_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, config).await {
        tracing::error!("Command failed: {e}");
        eprintln!("{}", e.user_message());
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), CliError> {
    let tokens = FileTokenStore::open(config.token_file.clone())?;
    let market = Marketplace::new(config, Arc::new(tokens))?;

    match cli.command {
        Commands::Login { email, password } => {
            commands::session::login(&market, &email, &SecretString::from(password)).await?;
        }
        Commands::Register(args) => {
            commands::session::register(&market, args.into_request()).await?;
        }
        Commands::Logout => commands::session::logout(&market),
        Commands::Whoami => commands::session::whoami(&market).await?,
        Commands::Cart { action } => {
            commands::session::require_session(&market).await?;
            match action.unwrap_or(CartAction::Show) {
                CartAction::Show => commands::cart::show(&market).await?,
                CartAction::Add {
                    product_id,
                    quantity,
                } => commands::cart::add(&market, &product_id, quantity).await?,
                CartAction::Set {
                    product_id,
                    quantity,
                } => commands::cart::set(&market, &product_id, quantity).await?,
                CartAction::Remove { product_id } => {
                    commands::cart::remove(&market, &product_id).await?;
                }
                CartAction::Clear => commands::cart::clear(&market).await?,
            }
        }
        Commands::Catalog { action } => run_catalog(&market, action).await?,
        Commands::Messages { action } => {
            commands::session::require_session(&market).await?;
            match action {
                MessagesAction::List => commands::messages::list(&market).await?,
                MessagesAction::Show { conversation_id } => {
                    commands::messages::show(&market, &conversation_id).await?;
                }
                MessagesAction::Send {
                    conversation_id,
                    content,
                } => commands::messages::send(&market, &conversation_id, &content).await?,
                MessagesAction::Start {
                    recipient_id,
                    content,
                } => commands::messages::start(&market, &recipient_id, &content).await?,
                MessagesAction::Read { conversation_id } => {
                    commands::messages::read(&market, &conversation_id).await?;
                }
                MessagesAction::Watch { conversation_id } => {
                    commands::messages::watch(&market, conversation_id).await;
                }
            }
        }
        Commands::Access { path } => commands::session::access(&market, &path).await,
    }
    Ok(())
}

async fn run_catalog(market: &Marketplace, action: CatalogAction) -> Result<(), CliError> {
    use commands::catalog;

    match action {
        CatalogAction::Products(args) => catalog::products(market, &args.into_query()).await?,
        CatalogAction::Product { id } => catalog::product(market, &id).await?,
        CatalogAction::Projects(args) => catalog::projects(market, &args.into_query()).await?,
        CatalogAction::Project { id } => catalog::project(market, &id).await?,
        CatalogAction::Professionals(args) => {
            catalog::professionals(market, &args.into_query()).await?;
        }
        CatalogAction::Articles(args) => catalog::articles(market, &args.into_query()).await?,
        CatalogAction::Article { id } => catalog::article(market, &id).await?,
        CatalogAction::Forum(args) => catalog::forum(market, &args.into_query()).await?,
        CatalogAction::Ideabooks => {
            commands::session::require_session(market).await?;
            catalog::ideabooks(market).await?;
        }
        CatalogAction::Suggest { text } => catalog::suggest(market, &text).await?,
    }
    Ok(())
}

impl ListArgs {
    fn into_query(self) -> renomarket_client::models::ListQuery {
        renomarket_client::models::ListQuery {
            page: self.page,
            limit: self.limit,
            search: self.search,
            category: self.category,
        }
    }
}

impl RegisterArgs {
    fn into_request(self) -> renomarket_client::models::RegisterRequest {
        use renomarket_client::models::{ProfessionalInfo, RegisterRequest};

        let professional_info = self.company.map(|company_name| ProfessionalInfo {
            company_name,
            siret: self.siret,
            specialties: self.specialties,
            ..ProfessionalInfo::default()
        });

        RegisterRequest {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            password: SecretString::from(self.password),
            user_type: self.user_type,
            phone: self.phone,
            professional_info,
        }
    }
}
