//! One-time codes for email and WhatsApp verification.

use chrono::{Duration, Utc};
use matchmaker_database::{
    timestamp, SqliteConnection, User, UserRepository, Verification, VerificationRepository, VerificationStatus,
    VerificationType,
};
use matchmaker_notifications::{Channel, NotificationDispatcher, Recipient};
use rand::Rng;
use sqlx::SqlitePool;
use tracing::info;

use crate::types::{VerificationError, VerificationResult};

/// Minimum gap between two codes for the same target.
pub const RESEND_COOLDOWN_SECONDS: i64 = 60;

/// Six random decimal digits, zero padded.
pub fn generate_otp() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{code:06}")
}

fn channel_for(kind: VerificationType) -> Channel {
    match kind {
        VerificationType::Email => Channel::Email,
        VerificationType::PhoneWhatsapp => Channel::Whatsapp,
    }
}

#[derive(Clone)]
pub struct VerificationService {
    pool: SqlitePool,
    users: UserRepository,
    verifications: VerificationRepository,
    dispatcher: NotificationDispatcher,
    otp_ttl_hours: i64,
}

impl VerificationService {
    pub fn new(pool: SqlitePool, dispatcher: NotificationDispatcher, otp_ttl_hours: i64) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            verifications: VerificationRepository::new(pool.clone()),
            pool,
            dispatcher,
            otp_ttl_hours,
        }
    }

    pub fn otp_ttl_hours(&self) -> i64 {
        self.otp_ttl_hours
    }

    /// Expire any pending code for `target` and issue a fresh one.
    ///
    /// Runs on the caller's connection so registration can create the account
    /// and its first code atomically.
    pub async fn create_verification(
        conn: &mut SqliteConnection,
        user_id: Option<i64>,
        kind: VerificationType,
        target: &str,
        expires_in_hours: i64,
    ) -> VerificationResult<Verification> {
        VerificationRepository::expire_pending(&mut *conn, target, kind).await?;
        let expires_at = timestamp::from_now(Duration::hours(expires_in_hours));
        let verification =
            VerificationRepository::create(&mut *conn, user_id, kind, target, &generate_otp(), &expires_at).await?;
        Ok(verification)
    }

    /// Check `code` against the newest pending verification for `target`.
    ///
    /// Failed attempts are committed before the error is returned. On success the
    /// owning account moves one step along its verification lifecycle.
    pub async fn verify_code(&self, code: &str, kind: VerificationType, target: &str) -> VerificationResult<User> {
        let code = code.trim();
        let target = normalize_target(kind, target);
        let mut tx = self.pool.begin().await?;

        let Some(verification) = VerificationRepository::find_pending(&mut tx, &target, kind).await? else {
            let previous = VerificationRepository::find_by_token(&mut tx, code, &target, kind).await?;
            return Err(match previous.map(|v| v.status) {
                Some(VerificationStatus::Completed) => VerificationError::AlreadyUsed,
                Some(VerificationStatus::Expired) => VerificationError::Expired,
                _ => VerificationError::NoActiveRequest,
            });
        };

        if verification.token != code {
            VerificationRepository::record_attempt(&mut tx, verification.id).await?;
            tx.commit().await?;
            return Err(VerificationError::WrongCode);
        }

        let expired = timestamp::parse(&verification.expires_at).map_or(true, |at| at <= Utc::now());
        if expired {
            VerificationRepository::mark_expired(&mut tx, verification.id).await?;
            tx.commit().await?;
            return Err(VerificationError::Expired);
        }

        let user_id = verification
            .user_id
            .ok_or(VerificationError::MissingUser(verification.id))?;

        VerificationRepository::mark_completed(&mut tx, verification.id).await?;
        match kind {
            VerificationType::Email => UserRepository::mark_email_verified(&mut tx, user_id).await?,
            VerificationType::PhoneWhatsapp => UserRepository::mark_phone_verified(&mut tx, user_id).await?,
        }
        let user = UserRepository::find_by_id_in(&mut tx, user_id)
            .await?
            .ok_or(VerificationError::MissingUser(verification.id))?;
        tx.commit().await?;

        info!(user_id = user.id, kind = %kind, status = %user.status, "verification completed");
        Ok(user)
    }

    /// Issue and deliver a new code for an account still waiting on `kind`.
    pub async fn resend(&self, kind: VerificationType, target: &str) -> VerificationResult<Verification> {
        let target = normalize_target(kind, target);
        let user = match kind {
            VerificationType::Email => self
                .users
                .find_by_email(&target)
                .await?
                .filter(|user| !user.is_verified),
            VerificationType::PhoneWhatsapp => self
                .users
                .find_by_phone(&target)
                .await?
                .filter(|user| !user.is_phone_verified),
        }
        .ok_or(VerificationError::NotPending(kind))?;

        self.issue_and_send(&user, kind, &target).await
    }

    /// Attach `phone` to the account and send it a WhatsApp code.
    pub async fn send_phone_code(&self, user: &User, phone: &str) -> VerificationResult<Verification> {
        self.users.update_phone(user.id, phone).await?;
        let user = User {
            phone: Some(phone.to_string()),
            ..user.clone()
        };
        self.issue_and_send(&user, VerificationType::PhoneWhatsapp, phone).await
    }

    async fn issue_and_send(&self, user: &User, kind: VerificationType, target: &str) -> VerificationResult<Verification> {
        self.ensure_cooldown_elapsed(kind, target).await?;

        let mut tx = self.pool.begin().await?;
        let verification =
            Self::create_verification(&mut tx, Some(user.id), kind, target, self.otp_ttl_hours).await?;
        tx.commit().await?;

        self.dispatcher
            .send_verification_code(
                &Recipient::from(user),
                channel_for(kind),
                &verification.token,
                self.otp_ttl_hours,
            )
            .await?;

        info!(user_id = user.id, kind = %kind, "verification code sent");
        Ok(verification)
    }

    async fn ensure_cooldown_elapsed(&self, kind: VerificationType, target: &str) -> VerificationResult<()> {
        let Some(latest) = self.verifications.latest_for_target(target, kind).await? else {
            return Ok(());
        };
        let Some(created_at) = timestamp::parse(&latest.created_at) else {
            return Ok(());
        };

        let elapsed = (Utc::now() - created_at).num_seconds();
        if elapsed < RESEND_COOLDOWN_SECONDS {
            return Err(VerificationError::ResendTooSoon(RESEND_COOLDOWN_SECONDS - elapsed));
        }
        Ok(())
    }
}

/// Emails are matched case-insensitively; phone targets are kept as given.
fn normalize_target(kind: VerificationType, target: &str) -> String {
    match kind {
        VerificationType::Email => target.trim().to_lowercase(),
        VerificationType::PhoneWhatsapp => target.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_is_six_digits() {
        for _ in 0..200 {
            let code = generate_otp();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn email_targets_are_lowercased() {
        assert_eq!(normalize_target(VerificationType::Email, " Dana@Example.com "), "dana@example.com");
        assert_eq!(normalize_target(VerificationType::PhoneWhatsapp, "+97250"), "+97250");
    }
}
