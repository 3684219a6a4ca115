use thiserror::Error;

use crate::message::Channel;

pub type NotificationResult<T> = Result<T, NotificationError>;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("{0} delivery is disabled")]
    ChannelDisabled(Channel),
    #[error("recipient has no {0} address")]
    MissingAddress(Channel),
    #[error("relay rejected notification with status {status}: {body}")]
    Relay { status: u16, body: String },
    #[error("relay request failed: {0}")]
    Http(#[from] reqwest::Error),
}
