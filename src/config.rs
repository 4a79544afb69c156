use std::{env, str::FromStr};

/// Reads an environment variable and parses it, falling back to `default`
/// when the variable is absent. Generalizes the teacher's single-setting
/// `QUIZLER_PORT` lookup into a reusable helper for the larger settings
/// surface this service needs.
fn from_env_or<V: FromStr>(key: &str, default: V) -> V {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .unwrap_or_else(|_| panic!("{key} was set but could not be parsed")),
        Err(_) => default,
    }
}

fn require_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("missing required environment variable {key}"))
}

/// Process configuration, assembled once at startup from the environment.
pub struct Config {
    pub port: u16,
    pub allowed_origin: String,
    pub redis_url: String,
    pub question_provider_url: String,
    pub question_provider_key: String,
    pub hint_provider_url: String,
    pub hint_provider_key: String,
    pub avatar_provider_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: from_env_or("TRIVIANET_PORT", 80u16),
            allowed_origin: from_env_or(
                "TRIVIANET_ALLOWED_ORIGIN",
                "http://localhost:3000".to_string(),
            ),
            redis_url: from_env_or("TRIVIANET_REDIS_URL", "redis://127.0.0.1/".to_string()),
            question_provider_url: require_env("TRIVIANET_QUESTION_PROVIDER_URL"),
            question_provider_key: require_env("TRIVIANET_QUESTION_PROVIDER_KEY"),
            hint_provider_url: require_env("TRIVIANET_HINT_PROVIDER_URL"),
            hint_provider_key: require_env("TRIVIANET_HINT_PROVIDER_KEY"),
            avatar_provider_url: from_env_or(
                "TRIVIANET_AVATAR_PROVIDER_URL",
                "https://api.github.com/users".to_string(),
            ),
        }
    }
}
