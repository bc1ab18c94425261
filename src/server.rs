use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;

use crate::settings::Settings;

#[derive(Debug, Deserialize)]
pub struct ResponseBody {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ReplyBody {
    pub message: Value,
}

async fn respond(Json(body): Json<ResponseBody>) -> Json<ReplyBody> {
    tracing::debug!(len = body.message.len(), "stub /response");
    Json(ReplyBody { message: Value::String("System response".into()) })
}

#[derive(Debug, Deserialize)]
pub struct MultiAgentBody {
    #[serde(default)]
    pub system_prompt_analytica: String,
    #[serde(default)]
    pub system_prompt_creativa: String,
    #[serde(default)]
    pub system_prompt_pragmatica: String,
    pub user_prompt: String,
}

async fn multi_agent(Json(body): Json<MultiAgentBody>) -> Json<ReplyBody> {
    tracing::debug!(prompt = %body.user_prompt, "stub /multiAgent");
    let answer = |persona: &str, prompt: &str, input: &str| format!("[{persona}: {prompt}] {input}");
    let analytica = answer("Analytica", &body.system_prompt_analytica, &body.user_prompt);
    let creativa = answer("Creativa", &body.system_prompt_creativa, &analytica);
    let pragmatica = answer("Pragmatica", &body.system_prompt_pragmatica, &creativa);
    let final_analytica = answer("Analytica", &body.system_prompt_analytica, &pragmatica);
    Json(ReplyBody {
        message: json!({
            "Analytica": analytica,
            "Creativa": creativa,
            "Pragmatica": pragmatica,
            "Final_Analytica": final_analytica,
        }),
    })
}

#[derive(Debug, Deserialize)]
pub struct SettingsBody {
    pub settings: Settings,
}

async fn get_settings() -> Json<Value> {
    Json(json!({ "settings": Settings::default() }))
}

async fn post_settings(Json(body): Json<SettingsBody>) -> Json<Value> {
    Json(json!({ "message": "Settings created!", "settings": body.settings }))
}

/// Local stand-in for the chat backend, speaking both request shapes.
pub fn router() -> Router {
    Router::new()
        .route("/response", post(respond))
        .route("/multiAgent", post(multi_agent))
        .route("/settings", axum::routing::get(get_settings).post(post_settings))
}

pub async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "stub backend listening");
    axum::serve(listener, router()).await?;
    Ok(())
}
