//! Inbound callback data model.
//!
//! Query parameters, the parsed inbound message, and the encrypted-delivery
//! wrapper. Bodies arrive as the platform's flat CDATA-wrapped XML; JSON
//! variants of the same shape are accepted too, with format detection on
//! the first non-space byte.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("xml parse error: {0}")]
    Xml(String),
    #[error("json parse error: {0}")]
    Json(String),
}

/// Query parameters of a callback request (GET handshake or POST delivery).
///
/// Every field is defaultable: a missing `timestamp`/`nonce` simply produces
/// a signature that cannot match, which the pipeline rejects with HTTP 400.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub msg_signature: Option<String>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub echostr: Option<String>,
    #[serde(default)]
    pub encrypt_type: Option<String>,
}

impl CallbackQuery {
    /// Whether the request uses the encrypted transfer mode: the platform
    /// sends `encrypt_type=aes` together with a `msg_signature`.
    pub fn is_encrypted(&self) -> bool {
        self.encrypt_type.as_deref() == Some("aes") && self.msg_signature.is_some()
    }
}

/// An inbound user/event message, parsed per request and never persisted.
///
/// `msg_type` stays a plain string: the handler registry is keyed by it and
/// the platform's tag set is open (text, image, voice, video, shortvideo,
/// location, link, event, device_text, ...).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename = "xml")]
pub struct InboundMessage {
    #[serde(rename = "ToUserName")]
    pub to_user_name: String,
    #[serde(rename = "FromUserName")]
    pub from_user_name: String,
    #[serde(rename = "CreateTime", default)]
    pub create_time: i64,
    #[serde(rename = "MsgType")]
    pub msg_type: String,
    #[serde(rename = "MsgId")]
    pub msg_id: Option<i64>,
    #[serde(rename = "Content")]
    pub content: Option<String>,
    #[serde(rename = "PicUrl")]
    pub pic_url: Option<String>,
    #[serde(rename = "MediaId")]
    pub media_id: Option<String>,
    #[serde(rename = "Format")]
    pub format: Option<String>,
    #[serde(rename = "Recognition")]
    pub recognition: Option<String>,
    #[serde(rename = "ThumbMediaId")]
    pub thumb_media_id: Option<String>,
    #[serde(rename = "Location_X")]
    pub location_x: Option<f64>,
    #[serde(rename = "Location_Y")]
    pub location_y: Option<f64>,
    #[serde(rename = "Scale")]
    pub scale: Option<u32>,
    #[serde(rename = "Label")]
    pub label: Option<String>,
    #[serde(rename = "Title")]
    pub title: Option<String>,
    #[serde(rename = "Description")]
    pub description: Option<String>,
    #[serde(rename = "Url")]
    pub url: Option<String>,
    #[serde(rename = "Event")]
    pub event: Option<String>,
    #[serde(rename = "EventKey")]
    pub event_key: Option<String>,
    #[serde(rename = "Ticket")]
    pub ticket: Option<String>,
}

/// Encrypted delivery wrapper: the body carries only the base64 envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename = "xml")]
pub struct EncryptedDelivery {
    #[serde(rename = "ToUserName", default)]
    pub to_user_name: Option<String>,
    #[serde(rename = "Encrypt", alias = "encrypt")]
    pub encrypt: String,
}

/// Callback body wrapper format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    Xml,
    Json,
}

/// Detect the wrapper format from the first non-space byte.
pub fn detect_format(body: &str) -> BodyFormat {
    let s = body.trim_start();
    if s.starts_with('{') || s.starts_with('[') {
        BodyFormat::Json
    } else {
        BodyFormat::Xml
    }
}

/// Parse a plaintext delivery body (XML or JSON) into an [`InboundMessage`].
pub fn parse_inbound(body: &str) -> Result<InboundMessage, ParseError> {
    match detect_format(body) {
        BodyFormat::Xml => {
            serde_xml_rs::from_str(body).map_err(|e| ParseError::Xml(e.to_string()))
        }
        BodyFormat::Json => {
            serde_json::from_str(body).map_err(|e| ParseError::Json(e.to_string()))
        }
    }
}

/// Parse an encrypted delivery body into its [`EncryptedDelivery`] wrapper.
pub fn parse_encrypted(body: &str) -> Result<EncryptedDelivery, ParseError> {
    match detect_format(body) {
        BodyFormat::Xml => {
            serde_xml_rs::from_str(body).map_err(|e| ParseError::Xml(e.to_string()))
        }
        BodyFormat::Json => {
            serde_json::from_str(body).map_err(|e| ParseError::Json(e.to_string()))
        }
    }
}
