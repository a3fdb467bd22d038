#![doc = r#"
wxoa-rs

Inbound-message gateway for WeChat Official Account webhooks: callback
signature verification, AES-256-CBC message encryption/decryption, reply
building and async dispatch by message type.

The crate is transport-agnostic. Adapt your HTTP server's request into a
`WebhookRequest`, hand it to a configured `WebhookHandler`, and write the
returned `WebhookResponse` back out. Access-token acquisition and the REST
APIs are not part of this crate.

Quick usage:

```ignore
use wxoa_rs::{HttpMethod, ReplyContent, WebhookHandler, WebhookRequest};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let handler = WebhookHandler::with_encryption(
        "your_appid",
        "your_callback_token",
        "your_43_char_encoding_aes_key",
    )?
    .text(|msg| async move {
        let content = msg.content.unwrap_or_default();
        Ok(Some(ReplyContent::Text(format!("you said: {content}"))))
    })
    .any(|_msg| async move { Ok(None) });

    // per request, from your HTTP server of choice:
    // let response = handler.handle(WebhookRequest { method, query, body }).await?;

    Ok(())
}
```
"#]

pub mod crypto;
pub mod handler;
pub mod keygen;
pub mod message;
pub mod padding;
pub mod reply;

pub use crypto::{sha1_signature, url_signature, CryptoError, Decrypted, MsgCrypt};
pub use handler::{BoxError, HttpMethod, WebhookHandler, WebhookRequest, WebhookResponse};
pub use message::{CallbackQuery, InboundMessage};
pub use padding::Pkcs7Padding;
pub use reply::{NewsItem, ReplyContent};
