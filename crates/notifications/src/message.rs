//! Outgoing notification payloads.

use std::fmt;
use std::str::FromStr;

use matchmaker_database::User;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Template identifiers understood by the relay.
pub mod templates {
    pub const EMAIL_VERIFICATION: &str = "email-verification";
    pub const PHONE_VERIFICATION: &str = "phone-verification";
    pub const WELCOME: &str = "welcome";
    pub const AVAILABILITY_CHECK: &str = "availability-check";
    pub const AVAILABILITY_RESPONSE: &str = "availability-response";
    pub const SUGGESTION_STATUS: &str = "suggestion-status";
    pub const SHARE_CONTACT_DETAILS: &str = "share-contact-details";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Whatsapp,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Email => f.write_str("email"),
            Channel::Whatsapp => f.write_str("whatsapp"),
        }
    }
}

/// Language of the rendered message. Hebrew unless stated otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    He,
    En,
}

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::He => "he",
            Locale::En => "en",
        }
    }

    /// Unknown or missing values fall back to Hebrew.
    pub fn from_tag(tag: Option<&str>) -> Self {
        tag.and_then(|value| value.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "he" => Ok(Locale::He),
            "en" => Ok(Locale::En),
            other => Err(format!("unsupported locale '{other}'")),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recipient {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub locale: Locale,
}

impl Recipient {
    pub fn address(&self, channel: Channel) -> Option<&str> {
        match channel {
            Channel::Email => Some(self.email.as_str()).filter(|email| !email.is_empty()),
            Channel::Whatsapp => self.phone.as_deref().filter(|phone| !phone.is_empty()),
        }
    }
}

impl From<&User> for Recipient {
    fn from(user: &User) -> Self {
        Self {
            name: user.full_name(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            locale: Locale::from_tag(Some(&user.language)),
        }
    }
}

/// A single message handed to a sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub channel: Channel,
    pub to: String,
    pub template: String,
    pub locale: Locale,
    pub data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn locale_falls_back_to_hebrew() {
        assert_eq!(Locale::from_tag(Some("EN")), Locale::En);
        assert_eq!(Locale::from_tag(Some("fr")), Locale::He);
        assert_eq!(Locale::from_tag(None), Locale::He);
    }

    #[test]
    fn notification_serializes_relay_shape() {
        let notification = Notification {
            channel: Channel::Whatsapp,
            to: "+972500000000".into(),
            template: templates::PHONE_VERIFICATION.into(),
            locale: Locale::He,
            data: json!({ "code": "123456" }),
        };

        let value = serde_json::to_value(&notification).unwrap();
        assert_eq!(
            value,
            json!({
                "channel": "whatsapp",
                "to": "+972500000000",
                "template": "phone-verification",
                "locale": "he",
                "data": { "code": "123456" }
            })
        );
    }

    #[test]
    fn recipient_without_phone_has_no_whatsapp_address() {
        let recipient = Recipient {
            name: "Dana Levi".into(),
            email: "dana@example.com".into(),
            phone: Some(String::new()),
            locale: Locale::He,
        };
        assert_eq!(recipient.address(Channel::Email), Some("dana@example.com"));
        assert_eq!(recipient.address(Channel::Whatsapp), None);
    }
}
