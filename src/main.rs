use std::{
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    process::exit,
    sync::Arc,
};

use dotenvy::dotenv;
use log::{error, info, LevelFilter};

use crate::{
    config::Config,
    http::AppState,
    providers::{GithubAvatarProvider, HttpHintProvider, HttpQuestionProvider},
    store::Store,
};

pub(crate) mod config;
pub(crate) mod error;
pub(crate) mod games;
pub(crate) mod http;
pub(crate) mod leaderboard;
pub(crate) mod model;
pub(crate) mod providers;
pub(crate) mod scoring;
pub(crate) mod session;
pub(crate) mod store;
pub(crate) mod token;

// Cargo package version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::builder()
        .filter_module("trivianet", LevelFilter::Info)
        .parse_default_env()
        .init();

    let config = Config::from_env();

    info!("Starting trivianet on port {} (v{})", config.port, VERSION);

    let store = match Store::connect(&config.redis_url).await {
        Ok(store) => store,
        Err(err) => {
            error!("Failed to connect to state store: {err}");
            exit(1);
        }
    };

    let state = AppState {
        store,
        questions: Arc::new(HttpQuestionProvider::new(
            config.question_provider_url.clone(),
            config.question_provider_key.clone(),
        )),
        hints: Arc::new(HttpHintProvider::new(
            config.hint_provider_url.clone(),
            config.hint_provider_key.clone(),
        )),
        avatars: Arc::new(GithubAvatarProvider::new(config.avatar_provider_url.clone())),
    };

    let router = http::router(state, &config.allowed_origin);

    let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port));

    if let Err(err) = axum::Server::bind(&addr)
        .serve(router.into_make_service())
        .await
    {
        error!("Server error: {}", err);
        exit(1);
    }
}
