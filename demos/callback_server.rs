//! Example: WeChat Official Account callback server
//!
//! Wires a `WebhookHandler` into an axum server:
//! 1. Answers the GET URL-verification handshake (plain or encrypted)
//! 2. Verifies and decrypts POST message deliveries
//! 3. Dispatches messages to type handlers and returns the reply XML
//!
//! Prerequisites:
//! - Configure your callback URL, Token and (optionally) EncodingAESKey in
//!   the Official Account admin console
//! - Ensure your callback URL is publicly accessible
//!
//! Running this example:
//! ```bash
//! WXOA_APPID=your_appid \
//! WXOA_TOKEN=your_callback_token \
//! WXOA_ENCODING_AES_KEY=your_43_char_aes_key \
//! cargo run --example callback_server
//! ```
//!
//! Leave WXOA_ENCODING_AES_KEY unset to run in plain (unencrypted) mode.
//!
//! The server listens on http://127.0.0.1:3000
//! - GET/POST /wechat - Official Account callback endpoint
//! - GET      /health - Health check endpoint

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use std::sync::Arc;
use tracing::{error, info};
use wxoa_rs::{CallbackQuery, HttpMethod, ReplyContent, WebhookHandler, WebhookRequest};

/// Handle the callback endpoint for every method; the webhook handler
/// answers 501 for anything but GET/POST.
async fn wechat_callback(
    State(handler): State<Arc<WebhookHandler>>,
    method: Method,
    Query(query): Query<CallbackQuery>,
    body: String,
) -> Response {
    let method = match method {
        Method::GET => HttpMethod::Get,
        Method::POST => HttpMethod::Post,
        _ => HttpMethod::Other,
    };
    let body = if body.is_empty() { None } else { Some(body) };

    match handler.handle(WebhookRequest { method, query, body }).await {
        Ok(response) => {
            info!(status = response.status, "callback handled");
            let mut builder = Response::builder().status(response.status);
            if let Some(content_type) = response.content_type {
                builder = builder.header(header::CONTENT_TYPE, content_type);
            }
            builder
                .body(Body::from(response.body))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(e) => {
            error!("message handler failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let token = std::env::var("WXOA_TOKEN").unwrap_or_else(|_| "testtoken".to_string());
    let appid = std::env::var("WXOA_APPID").unwrap_or_else(|_| "wx1234567890abcdef".to_string());
    let aes_key = std::env::var("WXOA_ENCODING_AES_KEY").ok();

    let handler = match aes_key {
        Some(key) => {
            info!("starting in encrypted mode");
            WebhookHandler::with_encryption(&appid, &token, &key)?
        }
        None => {
            info!("starting in plain mode");
            WebhookHandler::new(&token)
        }
    };

    let handler = handler
        .text(|msg| async move {
            let content = msg.content.unwrap_or_default();
            Ok(Some(ReplyContent::Text(format!("you said: {content}"))))
        })
        .event(|msg| async move {
            match msg.event.as_deref() {
                Some("subscribe") => Ok(Some(ReplyContent::Text("welcome!".into()))),
                _ => Ok(None),
            }
        })
        .any(|msg| async move {
            info!(msg_type = %msg.msg_type, "unhandled message type");
            Ok(None)
        });

    let app = Router::new()
        .route("/health", get(health))
        .route("/wechat", any(wechat_callback))
        .with_state(Arc::new(handler));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
