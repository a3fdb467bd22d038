//! Webhook handler: handshake verification, delivery dispatch, reply wrap-up.
//!
//! The pipeline for one inbound call:
//! signature check (cryptor-signed in encrypted mode) -> body parse ->
//! decrypt if encrypted -> dispatch by `MsgType` -> render reply XML ->
//! re-encrypt and re-sign if encrypted -> HTTP response.
//!
//! The handler owns no HTTP transport. Callers adapt their server's request
//! into a [`WebhookRequest`] and write the returned [`WebhookResponse`] back
//! out; the callback_server demo shows the axum wiring.
//!
//! Failure policy: signature and receiver-id mismatches resolve to HTTP 400,
//! a missing or unparseable body to HTTP 500, other methods to HTTP 501 —
//! none of these surface as errors. Errors returned by registered message
//! handlers are the one exception: they propagate out of [`WebhookHandler::handle`]
//! untouched, for the caller's error layer to deal with.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use tracing::{debug, instrument, warn};

use crate::crypto::{url_signature, CryptoError, Decrypted, MsgCrypt};
use crate::message::{parse_encrypted, parse_inbound, CallbackQuery, InboundMessage};
use crate::reply::{render_encrypted_envelope, render_reply, ReplyContent};

/// Error type produced by user-registered message handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type HandlerFuture = Pin<Box<dyn Future<Output = Result<Option<ReplyContent>, BoxError>> + Send>>;
type MessageHandler = Box<dyn Fn(InboundMessage) -> HandlerFuture + Send + Sync>;

/// HTTP method of the inbound call. Anything but GET/POST answers 501.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Other,
}

/// Transport-agnostic view of the inbound request.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub method: HttpMethod,
    pub query: CallbackQuery,
    /// Raw POST body (XML or JSON). `None` on GET.
    pub body: Option<String>,
}

/// Transport-agnostic response: status, optional content type, body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub body: String,
}

impl WebhookResponse {
    fn text(body: String) -> Self {
        Self {
            status: 200,
            content_type: Some("text/plain; charset=utf-8"),
            body,
        }
    }

    fn xml(body: String) -> Self {
        Self {
            status: 200,
            content_type: Some("application/xml"),
            body,
        }
    }

    fn bad_request(reason: &'static str) -> Self {
        Self {
            status: 400,
            content_type: Some("text/plain; charset=utf-8"),
            body: reason.to_string(),
        }
    }

    fn internal_error(reason: &'static str) -> Self {
        Self {
            status: 500,
            content_type: Some("text/plain; charset=utf-8"),
            body: reason.to_string(),
        }
    }

    fn not_implemented() -> Self {
        Self {
            status: 501,
            content_type: Some("text/plain; charset=utf-8"),
            body: "Not Implemented".to_string(),
        }
    }
}

/// Inbound webhook handler for one Official Account.
///
/// Built fluently at setup time; the registry is read-only afterwards, so a
/// shared reference serves concurrent requests without synchronization.
///
/// ```ignore
/// let handler = WebhookHandler::with_encryption(appid, token, aes_key)?
///     .text(|msg| async move {
///         Ok(Some(ReplyContent::Text(format!(
///             "you said: {}",
///             msg.content.unwrap_or_default()
///         ))))
///     })
///     .any(|_msg| async move { Ok(None) });
/// ```
pub struct WebhookHandler {
    token: String,
    cryptor: Option<MsgCrypt>,
    handlers: HashMap<String, MessageHandler>,
}

impl WebhookHandler {
    /// Handler for plain (unencrypted) transfer mode; only the callback
    /// Token is needed.
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            cryptor: None,
            handlers: HashMap::new(),
        }
    }

    /// Handler for encrypted (or mixed) transfer mode. All three credentials
    /// are required up front and immutable afterwards.
    pub fn with_encryption(
        appid: &str,
        token: &str,
        encoding_aes_key: &str,
    ) -> Result<Self, CryptoError> {
        let cryptor = MsgCrypt::new(appid, token, encoding_aes_key)?;
        Ok(Self {
            token: token.to_string(),
            cryptor: Some(cryptor),
            handlers: HashMap::new(),
        })
    }

    /// Register a handler for a message type. Lookup order at dispatch time
    /// is exact type, then `"any"`, then a built-in no-op replying nothing.
    pub fn on<F, Fut>(mut self, msg_type: &str, handler: F) -> Self
    where
        F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<ReplyContent>, BoxError>> + Send + 'static,
    {
        self.handlers.insert(
            msg_type.to_string(),
            Box::new(move |msg| -> HandlerFuture { Box::pin(handler(msg)) }),
        );
        self
    }

    /// Shorthand for `on("text", ..)`.
    pub fn text<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<ReplyContent>, BoxError>> + Send + 'static,
    {
        self.on("text", handler)
    }

    /// Shorthand for `on("image", ..)`.
    pub fn image<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<ReplyContent>, BoxError>> + Send + 'static,
    {
        self.on("image", handler)
    }

    /// Shorthand for `on("voice", ..)`.
    pub fn voice<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<ReplyContent>, BoxError>> + Send + 'static,
    {
        self.on("voice", handler)
    }

    /// Shorthand for `on("shortvideo", ..)`.
    pub fn shortvideo<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<ReplyContent>, BoxError>> + Send + 'static,
    {
        self.on("shortvideo", handler)
    }

    /// Shorthand for `on("location", ..)`.
    pub fn location<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<ReplyContent>, BoxError>> + Send + 'static,
    {
        self.on("location", handler)
    }

    /// Shorthand for `on("link", ..)`.
    pub fn link<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<ReplyContent>, BoxError>> + Send + 'static,
    {
        self.on("link", handler)
    }

    /// Shorthand for `on("event", ..)`.
    pub fn event<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<ReplyContent>, BoxError>> + Send + 'static,
    {
        self.on("event", handler)
    }

    /// Shorthand for `on("hardware", ..)`.
    pub fn hardware<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<ReplyContent>, BoxError>> + Send + 'static,
    {
        self.on("hardware", handler)
    }

    /// Shorthand for `on("device_text", ..)`.
    pub fn device_text<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<ReplyContent>, BoxError>> + Send + 'static,
    {
        self.on("device_text", handler)
    }

    /// Shorthand for `on("device_event", ..)`.
    pub fn device_event<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<ReplyContent>, BoxError>> + Send + 'static,
    {
        self.on("device_event", handler)
    }

    /// Catch-all handler, consulted when no exact type matches.
    pub fn any<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<ReplyContent>, BoxError>> + Send + 'static,
    {
        self.on("any", handler)
    }

    /// Process one inbound webhook call.
    ///
    /// Returns `Err` only when a registered message handler fails; every
    /// pipeline-internal rejection is an `Ok` response with the matching
    /// HTTP status.
    #[instrument(skip_all, fields(method = ?request.method))]
    pub async fn handle(&self, request: WebhookRequest) -> Result<WebhookResponse, BoxError> {
        match request.method {
            HttpMethod::Get => Ok(self.handshake(&request.query)),
            HttpMethod::Post => self.delivery(&request).await,
            HttpMethod::Other => {
                warn!("unsupported http method");
                Ok(WebhookResponse::not_implemented())
            }
        }
    }

    /// GET: the one-time URL-ownership handshake.
    fn handshake(&self, query: &CallbackQuery) -> WebhookResponse {
        let echostr = query.echostr.clone().unwrap_or_default();
        if query.is_encrypted() {
            let Some(cryptor) = &self.cryptor else {
                warn!("encrypted handshake but no aes key configured");
                return WebhookResponse::internal_error("encryption not configured");
            };
            let supplied = query.msg_signature.as_deref().unwrap_or_default();
            let expected = cryptor.signature(&query.timestamp, &query.nonce, &echostr);
            if supplied != expected {
                warn!("handshake message signature mismatch");
                return WebhookResponse::bad_request("Invalid signature");
            }
            match cryptor.decrypt(&echostr) {
                Ok(Decrypted::Message(echo)) => {
                    debug!("encrypted handshake verified");
                    WebhookResponse::text(echo)
                }
                Ok(Decrypted::ReceiverMismatch) => {
                    warn!("handshake echostr addressed to another appid");
                    WebhookResponse::bad_request("Appid mismatch")
                }
                Err(e) => {
                    warn!(error = %e, "handshake echostr failed to decrypt");
                    WebhookResponse::bad_request("Invalid ciphertext")
                }
            }
        } else {
            let supplied = query.signature.as_deref().unwrap_or_default();
            let expected = url_signature(&self.token, &query.timestamp, &query.nonce);
            if supplied != expected {
                warn!("handshake url signature mismatch");
                return WebhookResponse::bad_request("Invalid signature");
            }
            debug!("plain handshake verified");
            WebhookResponse::text(echostr)
        }
    }

    /// POST: an actual message delivery.
    async fn delivery(&self, request: &WebhookRequest) -> Result<WebhookResponse, BoxError> {
        let query = &request.query;
        let Some(body) = request.body.as_deref() else {
            warn!("delivery without a body");
            return Ok(WebhookResponse::internal_error(
                "malformed body, expected parsed XML/JSON",
            ));
        };

        // In encrypted mode the reply must be wrapped with the same cryptor.
        let mut reply_cryptor: Option<&MsgCrypt> = None;

        let message = if query.is_encrypted() {
            let envelope = match parse_encrypted(body) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(error = %e, "unparseable encrypted delivery body");
                    return Ok(WebhookResponse::internal_error(
                        "malformed body, expected parsed XML/JSON",
                    ));
                }
            };
            let Some(cryptor) = &self.cryptor else {
                warn!("encrypted delivery but no aes key configured");
                return Ok(WebhookResponse::internal_error("encryption not configured"));
            };
            let supplied = query.msg_signature.as_deref().unwrap_or_default();
            let expected = cryptor.signature(&query.timestamp, &query.nonce, &envelope.encrypt);
            if supplied != expected {
                warn!("delivery message signature mismatch");
                return Ok(WebhookResponse::bad_request("Invalid signature"));
            }
            let decrypted = match cryptor.decrypt(&envelope.encrypt) {
                Ok(Decrypted::Message(xml)) => xml,
                Ok(Decrypted::ReceiverMismatch) => {
                    warn!("delivery envelope addressed to another appid");
                    return Ok(WebhookResponse::bad_request("Appid mismatch"));
                }
                Err(e) => {
                    warn!(error = %e, "delivery envelope failed to decrypt");
                    return Ok(WebhookResponse::bad_request("Invalid ciphertext"));
                }
            };
            reply_cryptor = Some(cryptor);
            match parse_inbound(&decrypted) {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "unparseable decrypted message");
                    return Ok(WebhookResponse::internal_error(
                        "malformed body, expected parsed XML/JSON",
                    ));
                }
            }
        } else {
            let message = match parse_inbound(body) {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "unparseable delivery body");
                    return Ok(WebhookResponse::internal_error(
                        "malformed body, expected parsed XML/JSON",
                    ));
                }
            };
            let supplied = query.signature.as_deref().unwrap_or_default();
            let expected = url_signature(&self.token, &query.timestamp, &query.nonce);
            if supplied != expected {
                warn!("delivery url signature mismatch");
                return Ok(WebhookResponse::bad_request("Invalid signature"));
            }
            message
        };

        debug!(
            msg_type = %message.msg_type,
            from = %message.from_user_name,
            "dispatching inbound message"
        );

        // The reply goes back to the original sender: names swap.
        let reply_to = message.from_user_name.clone();
        let reply_from = message.to_user_name.clone();

        // exact type -> "any" -> built-in no-op
        let reply = match self
            .handlers
            .get(&message.msg_type)
            .or_else(|| self.handlers.get("any"))
        {
            Some(handler) => handler(message).await?,
            None => None,
        };

        let reply_xml = match &reply {
            Some(content) => render_reply(content, &reply_to, &reply_from),
            None => String::new(),
        };

        let body = match reply_cryptor {
            Some(cryptor) => {
                let ciphered = match cryptor.encrypt(&reply_xml) {
                    Ok(ciphered) => ciphered,
                    Err(e) => {
                        warn!(error = %e, "failed to encrypt reply");
                        return Ok(WebhookResponse::internal_error("encryption failed"));
                    }
                };
                let signature = cryptor.signature(&query.timestamp, &query.nonce, &ciphered);
                render_encrypted_envelope(&ciphered, &signature, &query.timestamp, &query.nonce)
            }
            None => reply_xml,
        };

        Ok(WebhookResponse::xml(body))
    }
}
