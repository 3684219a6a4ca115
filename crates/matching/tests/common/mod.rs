//! Shared fixtures for the matching integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use matchmaker_config::DatabaseConfig;
use matchmaker_database::{
    initialize_database, Gender, NewUser, ProfileDraft, ProfileRepository, User, UserRepository, UserRole, UserStatus,
};
use matchmaker_matching::Actor;
use matchmaker_notifications::test_support::RecordingSender;
use matchmaker_notifications::NotificationDispatcher;
use sqlx::SqlitePool;
use tempfile::TempDir;

pub type TestResult<T = ()> = anyhow::Result<T>;

pub struct TestContext {
    pub pool: SqlitePool,
    pub sender: Arc<RecordingSender>,
    pub dispatcher: NotificationDispatcher,
    _temp_dir: TempDir,
}

impl TestContext {
    pub async fn new() -> TestResult<Self> {
        Self::with_sender(Arc::new(RecordingSender::default())).await
    }

    pub async fn with_sender(sender: Arc<RecordingSender>) -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let config = DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("matching.db").display()),
            max_connections: 1,
        };
        let pool = initialize_database(&config).await?;
        Ok(Self {
            pool,
            dispatcher: NotificationDispatcher::new(sender.clone()),
            sender,
            _temp_dir: temp_dir,
        })
    }

    pub async fn user(&self, email: &str, first_name: &str, role: UserRole) -> TestResult<User> {
        let mut new_user = NewUser::candidate(email, first_name, "Cohen");
        new_user.role = role;
        new_user.status = UserStatus::Active;
        let mut conn = self.pool.acquire().await?;
        Ok(UserRepository::create(&mut conn, &new_user).await?)
    }

    pub async fn matchmaker(&self, email: &str) -> TestResult<(User, Actor)> {
        let user = self.user(email, "Rivka", UserRole::Matchmaker).await?;
        let actor = Actor::new(user.id, user.role);
        Ok((user, actor))
    }

    /// Active candidate with a visible, available profile.
    pub async fn candidate(&self, email: &str, first_name: &str, gender: Gender) -> TestResult<(User, Actor)> {
        let user = self.user(email, first_name, UserRole::Candidate).await?;
        let draft = ProfileDraft {
            gender: Some(gender),
            birth_date: Some("1995-04-10".to_string()),
            ..ProfileDraft::default()
        };
        ProfileRepository::new(self.pool.clone()).create(user.id, &draft).await?;
        let actor = Actor::new(user.id, user.role);
        Ok((user, actor))
    }

    pub fn profiles(&self) -> ProfileRepository {
        ProfileRepository::new(self.pool.clone())
    }
}
