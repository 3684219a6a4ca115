//! Registration, login and the authenticated account lookup.

use chrono::{DateTime, Utc};
use matchmaker_database::{
    DatabaseError, NewUser, ProfileDraft, ProfileRepository, User, UserRepository, UserStatus, VerificationType,
};
use matchmaker_notifications::{Channel, Locale, NotificationDispatcher, Recipient};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use super::verification_service::VerificationService;
use crate::types::{UserError, UserResult};
use crate::utils::{hash_password, require, validate_email, validate_password, verify_password, Claims, JwtManager};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub marketing_consent: bool,
}

#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    pub user: User,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

#[derive(Clone)]
pub struct AccountService {
    pool: SqlitePool,
    users: UserRepository,
    profiles: ProfileRepository,
    jwt: JwtManager,
    dispatcher: NotificationDispatcher,
    otp_ttl_hours: i64,
}

impl AccountService {
    pub fn new(pool: SqlitePool, jwt: JwtManager, dispatcher: NotificationDispatcher, otp_ttl_hours: i64) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            profiles: ProfileRepository::new(pool.clone()),
            pool,
            jwt,
            dispatcher,
            otp_ttl_hours,
        }
    }

    pub fn jwt(&self) -> &JwtManager {
        &self.jwt
    }

    /// Create a candidate account and email it the first verification code.
    ///
    /// The account, an empty profile and the code are written in one transaction. Delivery happens
    /// after commit and a failure there only gets logged; the user can ask for
    /// a new code.
    pub async fn register(&self, request: RegistrationRequest, locale: Locale) -> UserResult<RegistrationOutcome> {
        let email = require(request.email.as_deref(), "email")?;
        let password = request.password.as_deref().filter(|p| !p.is_empty()).ok_or(UserError::MissingField("password"))?;
        let first_name = require(request.first_name.as_deref(), "firstName")?;
        let last_name = require(request.last_name.as_deref(), "lastName")?;

        validate_email(email)?;
        validate_password(password)?;

        let email = email.to_lowercase();
        if self.users.email_exists(&email).await? {
            return Err(UserError::EmailTaken);
        }

        let language = Locale::from_tag(request.language.as_deref().or(Some(locale.as_str())));
        let new_user = NewUser {
            password_hash: Some(hash_password(password)?),
            phone: request.phone.clone().filter(|phone| !phone.trim().is_empty()),
            language: language.as_str().to_string(),
            marketing_consent: request.marketing_consent,
            ..NewUser::candidate(email.clone(), first_name, last_name)
        };

        let mut tx = self.pool.begin().await?;
        let user = UserRepository::create(&mut tx, &new_user).await.map_err(|err| match err {
            DatabaseError::Duplicate(_) => UserError::EmailTaken,
            other => other.into(),
        })?;
        ProfileRepository::insert(&mut tx, user.id, &ProfileDraft::default()).await?;
        let verification = VerificationService::create_verification(
            &mut tx,
            Some(user.id),
            VerificationType::Email,
            &email,
            self.otp_ttl_hours,
        )
        .await?;
        tx.commit().await?;

        info!(user_id = user.id, "candidate registered");

        let recipient = Recipient::from(&user);
        if let Err(err) = self
            .dispatcher
            .send_verification_code(&recipient, Channel::Email, &verification.token, self.otp_ttl_hours)
            .await
        {
            warn!(user_id = user.id, error = %err, "failed to send verification email after registration");
        }

        let message = match locale {
            Locale::He => "ההרשמה בוצעה בהצלחה. קוד אימות נשלח לכתובת המייל שלך.",
            Locale::En => "Registration successful. A verification code has been sent to your email.",
        };

        Ok(RegistrationOutcome {
            user,
            message: message.to_string(),
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> UserResult<LoginOutcome> {
        let user = self
            .users
            .find_by_email(email.trim())
            .await?
            .ok_or(UserError::InvalidCredentials)?;

        let matches = user
            .password_hash
            .as_deref()
            .is_some_and(|hash| verify_password(password, hash));
        if !matches {
            return Err(UserError::InvalidCredentials);
        }

        if user.status == UserStatus::Blocked {
            return Err(UserError::AccountBlocked);
        }

        self.users.touch_login(user.id).await?;
        self.profiles.touch_last_active(user.id).await?;

        let issued = self.jwt.generate_token(&user)?;
        info!(user_id = user.id, "user logged in");

        Ok(LoginOutcome {
            token: issued.token,
            expires_at: issued.expires_at,
            user,
        })
    }

    pub async fn me(&self, user_id: i64) -> UserResult<User> {
        self.users.find_by_id(user_id).await?.ok_or(UserError::UserNotFound)
    }

    /// Validate a bearer token and make sure its account still exists and is not blocked.
    pub async fn authenticate(&self, token: &str) -> UserResult<(Claims, User)> {
        let claims = self.jwt.validate_token(token)?;
        let user = self.me(claims.uid).await?;
        if user.status == UserStatus::Blocked {
            return Err(UserError::AccountBlocked);
        }
        Ok((claims, user))
    }
}
