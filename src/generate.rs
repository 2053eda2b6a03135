//! Plan and code generation through a chat-completions style model API.
//!
//! The model is a black box that returns text. Nothing about the shape of
//! that text is trusted; code output goes through
//! [`crate::patch::normalize::normalize`] before anything is published.

use async_trait::async_trait;
use log::*;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{Result, config::GeneratorConfig, error::PatchpilotError};

pub const PLAN_SYSTEM_PROMPT: &str = "You plan tasks for developers.";
pub const CODE_SYSTEM_PROMPT: &str = "You generate file patches as JSON.";
/// Plan text used when the model answers with nothing.
pub const NO_PLAN_GENERATED: &str = "No plan generated.";

/// Text generation capability.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, system: &str, user: &str) -> Result<String>;
}

/// User prompt asking for a step-by-step implementation plan.
pub fn plan_prompt(title: &str, description: &str) -> String {
    format!(
        r#"
You are a senior software engineer. Create a **step-by-step implementation plan** for this ticket:
Title: {title}
Description: {description}
"#
    )
}

/// User prompt asking for file contents as `{"files": [...]}` JSON.
pub fn code_prompt(title: &str, description: &str) -> String {
    format!(
        r#"
You are a senior full-stack engineer.
Implement the following ticket:

Title: {title}
Description: {description}

**Return ONLY valid JSON in this format (no explanations):**
{{
  "files": [
    {{
      "path": "src/components/Example.tsx",
      "content": "CODE_HERE"
    }},
    {{
      "path": "src/app/page.tsx",
      "content": "CODE_HERE"
    }}
  ]
}}
"#
    )
}

/// Ask `generator` for an implementation plan.
pub async fn generate_plan(
    generator: &dyn Generator,
    title: &str,
    description: &str,
) -> Result<String> {
    let plan = generator
        .generate(PLAN_SYSTEM_PROMPT, &plan_prompt(title, description))
        .await?;

    if plan.trim().is_empty() {
        warn!("model returned an empty plan for: {title}");
        return Ok(NO_PLAN_GENERATED.to_string());
    }

    Ok(plan)
}

/// Ask `generator` for file contents. The answer is returned untouched.
pub async fn generate_code(
    generator: &dyn Generator,
    title: &str,
    description: &str,
) -> Result<String> {
    generator
        .generate(CODE_SYSTEM_PROMPT, &code_prompt(title, description))
        .await
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

/// [`Generator`] backed by an OpenAI-compatible `/chat/completions`
/// endpoint.
pub struct ChatCompletions {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<SecretString>,
    model: String,
    max_tokens: u32,
}

impl ChatCompletions {
    pub fn new(
        config: &GeneratorConfig,
        model: impl Into<String>,
        max_tokens: u32,
        api_key: Option<SecretString>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key,
            model: model.into(),
            max_tokens,
        })
    }

    /// Generator configured for implementation plans.
    pub fn planner(
        config: &GeneratorConfig,
        api_key: Option<SecretString>,
    ) -> Result<Self> {
        Self::new(config, &config.plan_model, config.plan_max_tokens, api_key)
    }

    /// Generator configured for code patches.
    pub fn coder(
        config: &GeneratorConfig,
        api_key: Option<SecretString>,
    ) -> Result<Self> {
        Self::new(config, &config.code_model, config.code_max_tokens, api_key)
    }
}

#[async_trait]
impl Generator for ChatCompletions {
    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: self.max_tokens,
        };

        debug!("requesting completion from {} ({})", self.api_url, self.model);

        let mut req = self.client.post(&self.api_url).json(&body);

        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key.expose_secret());
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            error!("completion request failed: {status}: {text}");
            return Err(PatchpilotError::provider(status.as_u16(), text));
        }

        let chat: ChatResponse = serde_json::from_str(&text)?;

        Ok(chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        http::{HeaderMap, StatusCode},
        routing::post,
    };
    use serde_json::{Value, json};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1/chat/completions")
    }

    fn config_for(api_url: String) -> GeneratorConfig {
        GeneratorConfig {
            api_url,
            ..GeneratorConfig::default()
        }
    }

    #[test]
    fn prompts_embed_ticket_fields() {
        let plan = plan_prompt("Add login", "Users need a login form");
        assert!(plan.contains("step-by-step implementation plan"));
        assert!(plan.contains("Title: Add login"));
        assert!(plan.contains("Description: Users need a login form"));

        let code = code_prompt("Add login", "Users need a login form");
        assert!(code.contains("Return ONLY valid JSON"));
        assert!(code.contains("\"files\": ["));
        assert!(code.contains("Title: Add login"));
    }

    #[tokio::test]
    async fn generate_plan_substitutes_empty_answers() {
        let mut generator = MockGenerator::new();
        generator
            .expect_generate()
            .withf(|system, user| {
                system == PLAN_SYSTEM_PROMPT && user.contains("Title: Fix bug")
            })
            .times(1)
            .returning(|_, _| Ok("   ".to_string()));

        let plan = generate_plan(&generator, "Fix bug", "").await.unwrap();

        assert_eq!(plan, NO_PLAN_GENERATED);
    }

    #[tokio::test]
    async fn generate_code_returns_raw_answer() {
        let mut generator = MockGenerator::new();
        generator
            .expect_generate()
            .withf(|system, _| system == CODE_SYSTEM_PROMPT)
            .returning(|_, _| Ok("```json\n{\"files\": []}\n```".to_string()));

        let code = generate_code(&generator, "t", "d").await.unwrap();

        assert_eq!(code, "```json\n{\"files\": []}\n```");
    }

    #[tokio::test]
    async fn chat_completions_sends_messages_and_reads_first_choice() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(
                    headers.get("authorization").unwrap(),
                    "Bearer sk-test"
                );
                assert_eq!(body["model"], "gpt-4o-mini");
                assert_eq!(body["max_tokens"], 300);
                assert_eq!(body["messages"][0]["role"], "system");
                assert_eq!(body["messages"][1]["content"], "plan this");
                Json(json!({
                    "choices": [{"message": {"role": "assistant", "content": "1. Do it"}}]
                }))
            }),
        );
        let config = config_for(serve(router).await);

        let generator = ChatCompletions::planner(
            &config,
            Some(SecretString::from("sk-test".to_string())),
        )
        .unwrap();

        let text = generator.generate("system", "plan this").await.unwrap();

        assert_eq!(text, "1. Do it");
    }

    #[tokio::test]
    async fn chat_completions_tolerates_missing_choices() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({"choices": []})) }),
        );
        let config = config_for(serve(router).await);

        let generator = ChatCompletions::coder(&config, None).unwrap();

        assert_eq!(generator.generate("s", "u").await.unwrap(), "");
    }

    #[tokio::test]
    async fn chat_completions_surfaces_provider_errors() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                (StatusCode::SERVICE_UNAVAILABLE, "model overloaded")
            }),
        );
        let config = config_for(serve(router).await);

        let generator = ChatCompletions::coder(&config, None).unwrap();
        let err = generator.generate("s", "u").await.unwrap_err();

        assert!(matches!(
            err,
            PatchpilotError::Provider { status: 503, ref message } if message == "model overloaded"
        ));
    }
}
