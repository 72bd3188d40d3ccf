//! Liveness endpoint plus a small inbound-command route for the gateway
//! webhook to call.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::commands::{CommandContext, CommandHandler};

#[derive(Clone)]
pub struct AppState {
    pub commands: Arc<CommandHandler>,
}

#[derive(Debug, Deserialize)]
pub struct InboundCommand {
    pub user_id: String,
    pub guild_id: String,
    pub channel_id: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct CommandReply {
    pub reply: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/command", post(command))
        .with_state(state)
}

/// Bare 200 responder for host-platform uptime checks.
async fn liveness() -> &'static str {
    "Bot is running!"
}

async fn command(
    State(state): State<AppState>,
    Json(inbound): Json<InboundCommand>,
) -> Result<Json<CommandReply>, StatusCode> {
    let ctx = CommandContext {
        user_id: inbound.user_id,
        guild_id: inbound.guild_id,
        channel_id: inbound.channel_id,
    };
    match state.commands.handle(&ctx, &inbound.text).await {
        Ok(reply) => Ok(Json(CommandReply { reply })),
        Err(e) => {
            error!(error = %e, "Command handling failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
