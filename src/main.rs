//! Babel Chat - bilingual assistant chat API
//!
//! Users chat in their own language. Every message is stored twice, once
//! in the canonical language the completion engine works in and once as
//! shown to the user. Assistant answers are produced in the background
//! and land in a placeholder message that clients poll for.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use clap::{Parser, Subcommand};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod config;
mod conversation;
mod core;
mod providers;
mod routes;
mod store;
mod translation;

#[cfg(test)]
mod testing;

use config::{prompts::resolve_system_prompt, Config};
use crate::core::{CompletionClient, Pipeline, ProductionQueue};
use providers::OpenAICompatProvider;
use store::Store;
use translation::{HttpTranslator, IdentityTranslator, Translator};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<Store>,
    pub translator: Arc<dyn Translator>,
    pub queue: ProductionQueue,
}

#[derive(Debug, Parser)]
#[command(name = "babel-chat", version, about = "Bilingual assistant chat API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Create an account in the configured database
    CreateUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        email: String,
        /// Staff accounts see every chat and post assistant messages directly
        #[arg(long)]
        staff: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "babel_chat=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let store = Arc::new(Store::new(&config.database_path()).await?);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, store).await,
        Command::CreateUser {
            username,
            password,
            email,
            staff,
        } => {
            if store.find_user_by_username(&username).await?.is_some() {
                anyhow::bail!("user '{}' already exists", username);
            }
            let user = store.create_user(&username, &password, &email, staff).await?;
            tracing::info!(user_id = user.id, username = %user.username, staff, "created user");
            Ok(())
        }
    }
}

async fn serve(config: Config, store: Arc<Store>) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let system_prompt = resolve_system_prompt(config.prompt_file.as_deref()).await?;

    let translator: Arc<dyn Translator> = match &config.translation_url {
        Some(url) => Arc::new(HttpTranslator::new(
            url.as_str(),
            config.translation_api_key.clone(),
            config.translation_timeout,
        )?),
        None => {
            tracing::warn!("BABEL_TRANSLATION_URL is not set, messages will not be translated");
            Arc::new(IdentityTranslator)
        }
    };

    let provider = Arc::new(OpenAICompatProvider::new(config.completion_url.as_str())?);
    let completion = CompletionClient::new(
        provider,
        translator.clone(),
        system_prompt,
        config.display_language.as_str(),
    );
    let pipeline = Arc::new(Pipeline::new(store.clone(), completion));
    let queue = ProductionQueue::start(pipeline, config.workers, config.job_timeout);

    tracing::info!(
        completion = %config.completion_url,
        workers = config.workers,
        display = %config.display_language,
        canonical = %config.canonical_language,
        "production queue ready"
    );

    let state = AppState {
        config: Arc::new(config),
        store,
        translator,
        queue,
    };

    let app = Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("Babel Chat API running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
