//! One-time verification codes

use serde::{Deserialize, Serialize};

string_enum! {
    VerificationType("verification_type") {
        Email => "EMAIL",
        PhoneWhatsapp => "PHONE_WHATSAPP",
    }
}

string_enum! {
    VerificationStatus("status") {
        Pending => "PENDING",
        Completed => "COMPLETED",
        Expired => "EXPIRED",
        Failed => "FAILED",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub id: i64,
    pub public_id: String,
    pub user_id: Option<i64>,
    pub verification_type: VerificationType,
    pub target: String,
    #[serde(skip_serializing, default)]
    pub token: String,
    pub status: VerificationStatus,
    pub attempts: i64,
    pub expires_at: String,
    pub completed_at: Option<String>,
    pub created_at: String,
}
