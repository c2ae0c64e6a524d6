//! Slack webhook wire types.
//!
//! Member names on the wire are fixed by the incoming-webhook contract and are
//! pinned with `#[serde(rename)]`; the Rust field names are free to differ.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// A single title/value entry inside an attachment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Field {
    #[serde(rename = "title")]
    pub title: String,
    #[serde(rename = "value")]
    pub value: String,
    #[serde(rename = "short", default)]
    pub short_display: bool,
}

impl Field {
    pub fn new(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
            short_display: false,
        }
    }

    /// A field rendered side by side with other short fields.
    pub fn short(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            short_display: true,
            ..Self::new(title, value)
        }
    }
}

/// A styled block attached to a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    #[serde(rename = "fallback")]
    pub fallback_text: String,
    #[serde(rename = "pretext")]
    pub pre_text: String,
    #[serde(rename = "text")]
    pub text: String,
    /// Empty means the renderer's default color.
    #[serde(rename = "color")]
    pub color: String,
    #[serde(rename = "fields")]
    pub fields: Vec<Field>,
    #[serde(rename = "mrkdwn_in", default = "default_markdown_in")]
    pub markdown_in: Vec<String>,
}

fn default_markdown_in() -> Vec<String> {
    vec!["fields".to_string()]
}

impl Attachment {
    /// An attachment with only fallback text set; fields render as markdown.
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self {
            fallback_text: fallback_text.into(),
            pre_text: String::new(),
            text: String::new(),
            color: String::new(),
            fields: Vec::new(),
            markdown_in: default_markdown_in(),
        }
    }
}

/// The complete message posted to the webhook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Payload {
    #[serde(rename = "channel")]
    pub channel: Option<String>,
    #[serde(rename = "username")]
    pub username: Option<String>,
    #[serde(rename = "icon_url")]
    pub icon_url: Option<String>,
    #[serde(rename = "icon_emoji")]
    pub icon_emoji: Option<String>,
    #[serde(rename = "text")]
    pub text: String,
    #[serde(rename = "attachments")]
    pub attachments: Vec<Attachment>,
    #[serde(rename = "link_names", with = "link_names_flag")]
    pub link_names: bool,
}

impl Payload {
    /// Encodes the payload as a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Encodes a payload into the JSON document sent to the webhook.
pub fn encode(payload: &Payload) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(payload)?)
}

/// `link_names` travels as the integer 0 or 1.
mod link_names_flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(u8::deserialize(deserializer)? != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn sample_payload() -> Payload {
        let mut attachment = Attachment::new("[ERROR] orders in api on host-1");
        attachment.color = "danger".to_string();
        attachment.fields.push(Field::short("Logger", "orders"));

        Payload {
            channel: Some("ops".to_string()),
            username: Some("bot".to_string()),
            text: "hi".to_string(),
            attachments: vec![attachment],
            ..Default::default()
        }
    }

    #[test]
    fn test_payload_uses_wire_member_names() {
        let value: Value = serde_json::from_slice(&encode(&sample_payload()).unwrap()).unwrap();
        let object = value.as_object().unwrap();

        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "attachments",
                "channel",
                "icon_emoji",
                "icon_url",
                "link_names",
                "text",
                "username"
            ]
        );

        assert_eq!(value["channel"], "ops");
        assert_eq!(value["username"], "bot");
        assert_eq!(value["text"], "hi");
        assert_eq!(value["icon_url"], Value::Null);
        assert_eq!(value["icon_emoji"], Value::Null);
        assert_eq!(value["link_names"], 0);
        assert_eq!(value["attachments"][0]["color"], "danger");
    }

    #[test]
    fn test_attachment_and_field_wire_shape() {
        let value: Value = serde_json::from_str(&sample_payload().to_json().unwrap()).unwrap();

        assert_eq!(
            value["attachments"][0],
            json!({
                "fallback": "[ERROR] orders in api on host-1",
                "pretext": "",
                "text": "",
                "color": "danger",
                "fields": [{ "title": "Logger", "value": "orders", "short": true }],
                "mrkdwn_in": ["fields"],
            })
        );
    }

    #[test]
    fn test_link_names_is_numeric() {
        let payload = Payload {
            link_names: true,
            ..Default::default()
        };
        let value: Value = serde_json::from_str(&payload.to_json().unwrap()).unwrap();
        assert_eq!(value["link_names"], 1);

        let back: Payload = serde_json::from_value(value).unwrap();
        assert!(back.link_names);
    }

    #[test]
    fn test_field_short_defaults_to_false() {
        let field: Field = serde_json::from_str(r#"{"title":"a","value":"b"}"#).unwrap();
        assert!(!field.short_display);
    }
}
