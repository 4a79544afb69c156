use async_trait::async_trait;
use serde::Deserialize;

use crate::{error::ServerError, model::Question};

/// Produces a structured question set from a free-text prompt. Backed by an
/// external question-generation service; modeled here purely as an HTTP call,
/// the same way the original implementation treats its quiz file source as
/// an opaque upstream response to be parsed, not reimplemented.
#[async_trait]
pub trait QuestionProvider: Send + Sync {
    async fn generate(&self, user_prompt: &str) -> Result<Vec<Question>, ServerError>;
}

/// Produces a short natural-language hint given the question text and the
/// correct/wrong option text. Grounded on the original's Groq-backed
/// `get_ai_help`, modeled here as an opaque HTTP call.
#[async_trait]
pub trait HintProvider: Send + Sync {
    async fn hint(&self, question: &str, correct: &str, wrong: &str) -> Result<String, ServerError>;
}

/// Resolves a small avatar descriptor for a player name. Grounded on the
/// original's trivial GitHub-avatar lookup.
#[async_trait]
pub trait AvatarProvider: Send + Sync {
    async fn lookup(&self, player_name: &str) -> Option<String>;
}

pub struct HttpQuestionProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpQuestionProvider {
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }
}

#[derive(Deserialize)]
struct QuestionCatalogResponse {
    questions: Vec<Question>,
}

#[async_trait]
impl QuestionProvider for HttpQuestionProvider {
    async fn generate(&self, user_prompt: &str) -> Result<Vec<Question>, ServerError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "prompt": user_prompt }))
            .send()
            .await
            .map_err(|_| ServerError::CatalogUnavailable)?;

        if !response.status().is_success() {
            return Err(ServerError::CatalogUnavailable);
        }

        let body: QuestionCatalogResponse = response
            .json()
            .await
            .map_err(|_| ServerError::CatalogUnavailable)?;

        if body.questions.is_empty() {
            return Err(ServerError::CatalogUnavailable);
        }

        Ok(body.questions)
    }
}

pub struct HttpHintProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpHintProvider {
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }
}

#[derive(Deserialize)]
struct HintResponse {
    hint: String,
}

#[async_trait]
impl HintProvider for HttpHintProvider {
    async fn hint(&self, question: &str, correct: &str, wrong: &str) -> Result<String, ServerError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "question": question,
                "answerCorrect": correct,
                "answerIncorrect": wrong,
            }))
            .send()
            .await
            .map_err(|_| ServerError::Unexpected)?;

        if !response.status().is_success() {
            return Err(ServerError::Unexpected);
        }

        let body: HintResponse = response.json().await.map_err(|_| ServerError::Unexpected)?;
        Ok(body.hint)
    }
}

pub struct GithubAvatarProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl GithubAvatarProvider {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[derive(Deserialize)]
struct GithubUser {
    avatar_url: String,
}

#[async_trait]
impl AvatarProvider for GithubAvatarProvider {
    async fn lookup(&self, player_name: &str) -> Option<String> {
        let url = format!("{}/{}", self.endpoint, player_name);
        let response = self.client.get(&url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let user: GithubUser = response.json().await.ok()?;
        Some(user.avatar_url)
    }
}
