//! Builds domain messages and fans them out over the enabled channels.

use std::sync::Arc;
use std::time::Duration;

use matchmaker_config::AppConfig;
use matchmaker_database::SuggestionStatus;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::{NotificationError, NotificationResult};
use crate::message::{templates, Channel, Notification, Recipient};
use crate::sender::{LogSender, NotificationSender, RelaySender};

const BOTH: &[Channel] = &[Channel::Email, Channel::Whatsapp];
const EMAIL_ONLY: &[Channel] = &[Channel::Email];

/// Which side of a suggestion a message is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    First,
    Second,
    Matchmaker,
}

/// Who hears about a suggestion entering `status`, and over which channels.
pub fn audience(status: SuggestionStatus) -> Vec<(Party, &'static [Channel])> {
    use SuggestionStatus::*;

    match status {
        Draft => vec![(Party::Matchmaker, EMAIL_ONLY)],
        PendingFirstParty => vec![(Party::First, BOTH)],
        PendingSecondParty => vec![(Party::Second, BOTH)],
        FirstPartyApproved
        | FirstPartyDeclined
        | FirstPartyInterested
        | SecondPartyApproved
        | SecondPartyDeclined
        | AwaitingMatchmakerApproval => vec![(Party::Matchmaker, BOTH)],
        ContactDetailsShared => vec![
            (Party::First, BOTH),
            (Party::Second, BOTH),
            (Party::Matchmaker, EMAIL_ONLY),
        ],
        AwaitingFirstDateFeedback => vec![(Party::First, BOTH), (Party::Second, BOTH)],
        Engaged | Married => vec![
            (Party::First, BOTH),
            (Party::Second, BOTH),
            (Party::Matchmaker, BOTH),
        ],
        _ => Vec::new(),
    }
}

/// A suggestion whose status just changed.
#[derive(Debug, Clone)]
pub struct SuggestionNotice {
    pub suggestion_id: String,
    pub status: SuggestionStatus,
    pub status_label: String,
    pub matchmaker: Recipient,
    pub first_party: Recipient,
    pub second_party: Recipient,
}

impl SuggestionNotice {
    fn recipient(&self, party: Party) -> &Recipient {
        match party {
            Party::First => &self.first_party,
            Party::Second => &self.second_party,
            Party::Matchmaker => &self.matchmaker,
        }
    }

    fn counterpart(&self, party: Party) -> Option<&Recipient> {
        match party {
            Party::First => Some(&self.second_party),
            Party::Second => Some(&self.first_party),
            Party::Matchmaker => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryFailure {
    pub to: String,
    pub channel: Channel,
    pub error: String,
}

/// Outcome of a fan-out. Failures never abort the remaining deliveries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    pub delivered: Vec<(String, Channel)>,
    pub failures: Vec<DeliveryFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn merge(&mut self, other: DispatchReport) {
        self.delivered.extend(other.delivered);
        self.failures.extend(other.failures);
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: Arc<dyn NotificationSender>,
    email_enabled: bool,
    whatsapp_enabled: bool,
    public_base_url: String,
    support_email: String,
}

impl NotificationDispatcher {
    pub fn new(sender: Arc<dyn NotificationSender>) -> Self {
        Self {
            sender,
            email_enabled: true,
            whatsapp_enabled: true,
            public_base_url: "http://localhost:3000".to_string(),
            support_email: "support@matchmaker.local".to_string(),
        }
    }

    /// Relay delivery when `notifications.relay_url` is set, log-only otherwise.
    pub fn from_config(config: &AppConfig) -> NotificationResult<Self> {
        let settings = &config.notifications;
        let sender: Arc<dyn NotificationSender> = match &settings.relay_url {
            Some(url) => Arc::new(RelaySender::new(
                url.clone(),
                settings.relay_token.clone(),
                Duration::from_secs(settings.request_timeout_seconds),
            )?),
            None => Arc::new(LogSender),
        };

        info!(sender = sender.name(), "notification dispatcher ready");

        Ok(Self {
            sender,
            email_enabled: settings.email_enabled,
            whatsapp_enabled: settings.whatsapp_enabled,
            public_base_url: config.http.public_base_url.trim_end_matches('/').to_string(),
            support_email: settings.support_email.clone(),
        })
    }

    pub fn with_channels(mut self, email: bool, whatsapp: bool) -> Self {
        self.email_enabled = email;
        self.whatsapp_enabled = whatsapp;
        self
    }

    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn sender_name(&self) -> &'static str {
        self.sender.name()
    }

    fn channel_enabled(&self, channel: Channel) -> bool {
        match channel {
            Channel::Email => self.email_enabled,
            Channel::Whatsapp => self.whatsapp_enabled,
        }
    }

    /// Deliver one message over one channel.
    pub async fn deliver(
        &self,
        channel: Channel,
        recipient: &Recipient,
        template: &str,
        data: Value,
    ) -> NotificationResult<()> {
        if !self.channel_enabled(channel) {
            return Err(NotificationError::ChannelDisabled(channel));
        }
        let to = recipient
            .address(channel)
            .ok_or(NotificationError::MissingAddress(channel))?;

        let notification = Notification {
            channel,
            to: to.to_string(),
            template: template.to_string(),
            locale: recipient.locale,
            data,
        };
        self.sender.send(&notification).await
    }

    /// Deliver the same message over each of `channels`, collecting failures.
    /// Disabled channels are skipped silently.
    pub async fn fan_out(
        &self,
        recipient: &Recipient,
        channels: &[Channel],
        template: &str,
        data: Value,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        for &channel in channels {
            if !self.channel_enabled(channel) {
                continue;
            }
            match self.deliver(channel, recipient, template, data.clone()).await {
                Ok(()) => report.delivered.push((recipient.email.clone(), channel)),
                Err(err) => {
                    warn!(%channel, template, error = %err, "notification delivery failed");
                    report.failures.push(DeliveryFailure {
                        to: recipient.email.clone(),
                        channel,
                        error: err.to_string(),
                    });
                }
            }
        }

        report
    }

    pub async fn send_verification_code(
        &self,
        recipient: &Recipient,
        channel: Channel,
        code: &str,
        expires_in_hours: i64,
    ) -> NotificationResult<()> {
        let template = match channel {
            Channel::Email => templates::EMAIL_VERIFICATION,
            Channel::Whatsapp => templates::PHONE_VERIFICATION,
        };
        let data = json!({
            "name": recipient.name,
            "code": code,
            "expiresInHours": expires_in_hours,
            "supportEmail": self.support_email,
        });
        self.deliver(channel, recipient, template, data).await
    }

    pub async fn send_welcome(&self, recipient: &Recipient) -> DispatchReport {
        let data = json!({
            "name": recipient.name,
            "dashboardUrl": format!("{}/profile", self.public_base_url),
            "supportEmail": self.support_email,
        });
        self.fan_out(recipient, EMAIL_ONLY, templates::WELCOME, data).await
    }

    /// Ask a candidate whether they are free for a new suggestion.
    pub async fn send_availability_check(
        &self,
        recipient: &Recipient,
        matchmaker_name: &str,
        inquiry_id: &str,
        note: Option<&str>,
    ) -> NotificationResult<()> {
        let data = json!({
            "name": recipient.name,
            "matchmakerName": matchmaker_name,
            "inquiryId": inquiry_id,
            "note": note,
            "responseUrl": format!("{}/availability/{inquiry_id}", self.public_base_url),
        });
        self.deliver(Channel::Email, recipient, templates::AVAILABILITY_CHECK, data)
            .await
    }

    pub async fn send_availability_response(
        &self,
        matchmaker: &Recipient,
        party_name: &str,
        is_available: bool,
        note: Option<&str>,
    ) -> NotificationResult<()> {
        let data = json!({
            "name": matchmaker.name,
            "partyName": party_name,
            "isAvailable": is_available,
            "note": note,
        });
        self.deliver(Channel::Email, matchmaker, templates::AVAILABILITY_RESPONSE, data)
            .await
    }

    /// Notify everyone the new status concerns. Contact details are included
    /// for the parties once they are shared.
    pub async fn send_suggestion_update(&self, notice: &SuggestionNotice) -> DispatchReport {
        let mut report = DispatchReport::default();

        for (party, channels) in audience(notice.status) {
            let recipient = notice.recipient(party);
            let review_url = match party {
                Party::Matchmaker => format!(
                    "{}/dashboard/suggestions/{}",
                    self.public_base_url, notice.suggestion_id
                ),
                _ => format!(
                    "{}/suggestions/{}/review",
                    self.public_base_url, notice.suggestion_id
                ),
            };

            let mut data = json!({
                "name": recipient.name,
                "suggestionId": notice.suggestion_id,
                "status": notice.status,
                "statusLabel": notice.status_label,
                "matchmakerName": notice.matchmaker.name,
                "firstPartyName": notice.first_party.name,
                "secondPartyName": notice.second_party.name,
                "url": review_url,
            });

            let template = match (notice.status, notice.counterpart(party)) {
                (SuggestionStatus::ContactDetailsShared, Some(other)) => {
                    data["contact"] = json!({
                        "name": other.name,
                        "email": other.email,
                        "phone": other.phone,
                    });
                    templates::SHARE_CONTACT_DETAILS
                }
                _ => templates::SUGGESTION_STATUS,
            };

            report.merge(self.fan_out(recipient, channels, template, data).await);
        }

        report
    }
}
