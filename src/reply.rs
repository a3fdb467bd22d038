//! Reply content model and XML rendering.
//!
//! A handler answers an inbound message with one [`ReplyContent`] value;
//! the serializer maps each variant to the platform's reply XML shape,
//! CDATA-wrapping every string field. Replies are built once, sent once.

use std::time::{SystemTime, UNIX_EPOCH};

/// One article of a news reply (at most ten are displayed by the client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItem {
    pub title: String,
    pub description: String,
    pub pic_url: String,
    pub url: String,
}

/// Reply payload chosen by a message handler.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyContent {
    Text(String),
    Image {
        media_id: String,
    },
    Voice {
        media_id: String,
    },
    Video {
        media_id: String,
        title: String,
        description: String,
    },
    Music {
        media_id: String,
        title: String,
        description: String,
        music_url: String,
        hq_music_url: String,
    },
    News(Vec<NewsItem>),
    /// Hand the session over to the customer-service system, optionally to
    /// a specific service account.
    TransferCustomerService {
        kf_account: Option<String>,
    },
}

impl From<&str> for ReplyContent {
    fn from(s: &str) -> Self {
        ReplyContent::Text(s.to_string())
    }
}

impl From<String> for ReplyContent {
    fn from(s: String) -> Self {
        ReplyContent::Text(s)
    }
}

impl From<Vec<NewsItem>> for ReplyContent {
    fn from(items: Vec<NewsItem>) -> Self {
        ReplyContent::News(items)
    }
}

impl ReplyContent {
    /// The `MsgType` tag this variant serializes under.
    pub fn msg_type(&self) -> &'static str {
        match self {
            ReplyContent::Text(_) => "text",
            ReplyContent::Image { .. } => "image",
            ReplyContent::Voice { .. } => "voice",
            ReplyContent::Video { .. } => "video",
            ReplyContent::Music { .. } => "music",
            ReplyContent::News(_) => "news",
            ReplyContent::TransferCustomerService { .. } => "transfer_customer_service",
        }
    }
}

fn push_cdata(out: &mut String, tag: &str, value: &str) {
    out.push('<');
    out.push_str(tag);
    out.push_str("><![CDATA[");
    // a literal "]]>" inside the value must be split across two sections
    out.push_str(&value.replace("]]>", "]]]]><![CDATA[>"));
    out.push_str("]]></");
    out.push_str(tag);
    out.push('>');
}

fn push_raw(out: &mut String, tag: &str, value: &str) {
    out.push('<');
    out.push_str(tag);
    out.push('>');
    out.push_str(value);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Render a reply into the platform's reply XML.
///
/// `to_user` is the original sender, `from_user` the account itself — the
/// caller passes the inbound names swapped.
pub fn render_reply(content: &ReplyContent, to_user: &str, from_user: &str) -> String {
    let mut out = String::with_capacity(256);
    out.push_str("<xml>");
    push_cdata(&mut out, "ToUserName", to_user);
    push_cdata(&mut out, "FromUserName", from_user);
    push_raw(&mut out, "CreateTime", &unix_now().to_string());
    push_cdata(&mut out, "MsgType", content.msg_type());
    match content {
        ReplyContent::Text(text) => {
            push_cdata(&mut out, "Content", text);
        }
        ReplyContent::Image { media_id } => {
            out.push_str("<Image>");
            push_cdata(&mut out, "MediaId", media_id);
            out.push_str("</Image>");
        }
        ReplyContent::Voice { media_id } => {
            out.push_str("<Voice>");
            push_cdata(&mut out, "MediaId", media_id);
            out.push_str("</Voice>");
        }
        ReplyContent::Video {
            media_id,
            title,
            description,
        } => {
            out.push_str("<Video>");
            push_cdata(&mut out, "MediaId", media_id);
            push_cdata(&mut out, "Title", title);
            push_cdata(&mut out, "Description", description);
            out.push_str("</Video>");
        }
        ReplyContent::Music {
            media_id,
            title,
            description,
            music_url,
            hq_music_url,
        } => {
            out.push_str("<Music>");
            push_cdata(&mut out, "Title", title);
            push_cdata(&mut out, "Description", description);
            push_cdata(&mut out, "MusicUrl", music_url);
            push_cdata(&mut out, "HQMusicUrl", hq_music_url);
            push_cdata(&mut out, "ThumbMediaId", media_id);
            out.push_str("</Music>");
        }
        ReplyContent::News(items) => {
            push_raw(&mut out, "ArticleCount", &items.len().to_string());
            out.push_str("<Articles>");
            for item in items {
                out.push_str("<item>");
                push_cdata(&mut out, "Title", &item.title);
                push_cdata(&mut out, "Description", &item.description);
                push_cdata(&mut out, "PicUrl", &item.pic_url);
                push_cdata(&mut out, "Url", &item.url);
                out.push_str("</item>");
            }
            out.push_str("</Articles>");
        }
        ReplyContent::TransferCustomerService { kf_account } => {
            if let Some(account) = kf_account {
                out.push_str("<TransInfo>");
                push_cdata(&mut out, "KfAccount", account);
                out.push_str("</TransInfo>");
            }
        }
    }
    out.push_str("</xml>");
    out
}

/// Render the encrypted response envelope wrapping a ciphered reply.
pub fn render_encrypted_envelope(
    encrypt: &str,
    msg_signature: &str,
    timestamp: &str,
    nonce: &str,
) -> String {
    let mut out = String::with_capacity(encrypt.len() + 160);
    out.push_str("<xml>");
    push_cdata(&mut out, "Encrypt", encrypt);
    push_cdata(&mut out, "MsgSignature", msg_signature);
    push_raw(&mut out, "TimeStamp", timestamp);
    push_cdata(&mut out, "Nonce", nonce);
    out.push_str("</xml>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_reply_shape() {
        let xml = render_reply(&ReplyContent::Text("world".into()), "openid123", "gh_account");
        assert!(xml.starts_with("<xml><ToUserName><![CDATA[openid123]]></ToUserName>"));
        assert!(xml.contains("<FromUserName><![CDATA[gh_account]]></FromUserName>"));
        assert!(xml.contains("<MsgType><![CDATA[text]]></MsgType>"));
        assert!(xml.contains("<Content><![CDATA[world]]></Content>"));
        assert!(xml.ends_with("</xml>"));
    }

    #[test]
    fn string_coercions() {
        assert_eq!(ReplyContent::from("hi"), ReplyContent::Text("hi".into()));
        assert_eq!(
            ReplyContent::from(vec![] as Vec<NewsItem>),
            ReplyContent::News(vec![])
        );
    }

    #[test]
    fn news_reply_counts_articles() {
        let items = vec![
            NewsItem {
                title: "t1".into(),
                description: "d1".into(),
                pic_url: "http://p/1.png".into(),
                url: "http://u/1".into(),
            },
            NewsItem {
                title: "t2".into(),
                description: "d2".into(),
                pic_url: "http://p/2.png".into(),
                url: "http://u/2".into(),
            },
        ];
        let xml = render_reply(&ReplyContent::News(items), "to", "from");
        assert!(xml.contains("<ArticleCount>2</ArticleCount>"));
        assert!(xml.contains("<MsgType><![CDATA[news]]></MsgType>"));
        assert_eq!(xml.matches("<item>").count(), 2);
        assert!(xml.contains("<Title><![CDATA[t1]]></Title>"));
        assert!(xml.contains("<Url><![CDATA[http://u/2]]></Url>"));
    }

    #[test]
    fn transfer_reply_with_and_without_account() {
        let xml = render_reply(
            &ReplyContent::TransferCustomerService { kf_account: None },
            "to",
            "from",
        );
        assert!(xml.contains("<MsgType><![CDATA[transfer_customer_service]]></MsgType>"));
        assert!(!xml.contains("TransInfo"));

        let xml = render_reply(
            &ReplyContent::TransferCustomerService {
                kf_account: Some("kf2001@corp".into()),
            },
            "to",
            "from",
        );
        assert!(xml.contains("<TransInfo><KfAccount><![CDATA[kf2001@corp]]></KfAccount></TransInfo>"));
    }

    #[test]
    fn music_reply_uses_thumb_media_id() {
        let xml = render_reply(
            &ReplyContent::Music {
                media_id: "m1".into(),
                title: "song".into(),
                description: "desc".into(),
                music_url: "http://music".into(),
                hq_music_url: "http://music/hq".into(),
            },
            "to",
            "from",
        );
        assert!(xml.contains("<ThumbMediaId><![CDATA[m1]]></ThumbMediaId>"));
        assert!(xml.contains("<HQMusicUrl><![CDATA[http://music/hq]]></HQMusicUrl>"));
    }

    #[test]
    fn cdata_terminator_is_split() {
        let xml = render_reply(&ReplyContent::Text("a]]>b".into()), "to", "from");
        assert!(xml.contains("<Content><![CDATA[a]]]]><![CDATA[>b]]></Content>"));
    }

    #[test]
    fn encrypted_envelope_shape() {
        let xml = render_encrypted_envelope("Y2lwaGVy", "deadbeef", "1234567", "abcd");
        assert_eq!(
            xml,
            "<xml><Encrypt><![CDATA[Y2lwaGVy]]></Encrypt>\
             <MsgSignature><![CDATA[deadbeef]]></MsgSignature>\
             <TimeStamp>1234567</TimeStamp>\
             <Nonce><![CDATA[abcd]]></Nonce></xml>"
        );
    }
}
