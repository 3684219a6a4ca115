//! # Matchmaker Notifications
//!
//! Email and WhatsApp delivery. Messages are described by a template name plus
//! JSON data and handed to a [`NotificationSender`]: either the HTTP relay, which
//! renders and forwards them to the real providers, or a log-only sender for
//! development.

pub mod dispatcher;
pub mod error;
pub mod message;
pub mod sender;

pub use dispatcher::{audience, DeliveryFailure, DispatchReport, NotificationDispatcher, Party, SuggestionNotice};
pub use error::{NotificationError, NotificationResult};
pub use message::{templates, Channel, Locale, Notification, Recipient};
pub use sender::{LogSender, NotificationSender, RelaySender};

/// Senders for exercising code that notifies, without a relay.
pub mod test_support {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::{NotificationError, NotificationResult};
    use crate::message::Notification;
    use crate::sender::NotificationSender;

    /// Keeps every notification it is given. With `failing` set it records
    /// nothing and reports a relay error instead.
    #[derive(Debug, Default)]
    pub struct RecordingSender {
        sent: Mutex<Vec<Notification>>,
        failing: bool,
    }

    impl RecordingSender {
        pub fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                failing: true,
            }
        }

        pub fn sent(&self) -> Vec<Notification> {
            self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
        }

        pub fn templates(&self) -> Vec<String> {
            self.sent().into_iter().map(|n| n.template).collect()
        }
    }

    #[async_trait]
    impl NotificationSender for RecordingSender {
        async fn send(&self, notification: &Notification) -> NotificationResult<()> {
            if self.failing {
                return Err(NotificationError::Relay {
                    status: 503,
                    body: "relay unavailable".to_string(),
                });
            }
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(notification.clone());
            }
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }
}
