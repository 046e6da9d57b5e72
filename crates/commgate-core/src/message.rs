//! Message log entries.
//!
//! Every attempted send is recorded, whether it was delivered or blocked.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::types::{MessageId, PrincipalId};

/// Outcome of a send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Blocked,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(DeliveryStatus::Sent),
            "blocked" => Ok(DeliveryStatus::Blocked),
            _ => Err(CoreError::UnknownDeliveryStatus(s.to_string())),
        }
    }
}

/// A recorded send attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: MessageId,
    pub sender_id: PrincipalId,
    pub receiver_id: PrincipalId,
    pub subject: Option<String>,
    pub body: String,
    pub status: DeliveryStatus,
    /// Why the message was blocked. `None` for delivered messages.
    pub reason: Option<String>,
    /// Unix ms.
    pub sent_at: i64,
}

impl MessageRecord {
    pub fn is_blocked(&self) -> bool {
        self.status == DeliveryStatus::Blocked
    }
}

/// A send attempt that has not been recorded yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub sender_id: PrincipalId,
    pub receiver_id: PrincipalId,
    pub subject: Option<String>,
    pub body: String,
    pub status: DeliveryStatus,
    pub reason: Option<String>,
    pub sent_at: i64,
}

impl NewMessage {
    pub fn into_record(self, id: MessageId) -> MessageRecord {
        MessageRecord {
            id,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            subject: self.subject,
            body: self.body,
            status: self.status,
            reason: self.reason,
            sent_at: self.sent_at,
        }
    }
}
