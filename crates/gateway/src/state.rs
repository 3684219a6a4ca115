//! Shared application state for the gateway

use std::sync::Arc;

use matchmaker_config::AppConfig;
use matchmaker_matching::{AvailabilityService, PriorityService, SuggestionService};
use matchmaker_notifications::NotificationDispatcher;
use matchmaker_orchestrator::{CompletionProvider, JobRunner, MatchingEngine};
use matchmaker_referrals::ReferralService;
use matchmaker_users::{AccountService, JwtManager, ProfileService, VerificationService};
use sqlx::SqlitePool;

use crate::error::{GatewayError, GatewayResult};
use crate::rate_limit::RateLimiter;

/// Referral cookie settings used by the click and registration handlers.
#[derive(Debug, Clone)]
pub struct ReferralCookieSettings {
    pub name: String,
    pub max_age_days: i64,
}

/// AI scoring services. Absent when no model API key is configured.
#[derive(Clone)]
pub struct MatchingServices {
    pub engine: Arc<MatchingEngine>,
    pub jobs: JobRunner,
}

/// Shared application state containing all services
#[derive(Clone)]
pub struct GatewayState {
    /// Database connection pool
    pub pool: SqlitePool,
    pub accounts: Arc<AccountService>,
    pub profiles: Arc<ProfileService>,
    pub verifications: Arc<VerificationService>,
    pub suggestions: Arc<SuggestionService>,
    pub availability: Arc<AvailabilityService>,
    pub priority: Arc<PriorityService>,
    pub referrals: Arc<ReferralService>,
    pub matching: Option<MatchingServices>,
    pub rate_limiter: RateLimiter,
    pub referral_cookie: ReferralCookieSettings,
    pub registration_per_hour: u32,
    /// Read client addresses from X-Forwarded-For / X-Real-IP
    pub trust_proxy_headers: bool,
}

impl GatewayState {
    /// Wire every domain service onto one pool and dispatcher.
    pub fn new(
        pool: SqlitePool,
        config: &AppConfig,
        dispatcher: NotificationDispatcher,
        provider: Option<Arc<dyn CompletionProvider>>,
        rate_limiter: RateLimiter,
    ) -> Self {
        let otp_ttl_hours = config.auth.otp_ttl_hours;
        let accounts = AccountService::new(
            pool.clone(),
            JwtManager::from_config(&config.auth),
            dispatcher.clone(),
            otp_ttl_hours,
        );

        let matching = provider.map(|provider| {
            let engine = Arc::new(MatchingEngine::new(
                pool.clone(),
                provider,
                config.ai.max_candidates_to_analyze,
            ));
            MatchingServices {
                jobs: JobRunner::new(pool.clone(), Arc::clone(&engine)),
                engine,
            }
        });

        Self {
            accounts: Arc::new(accounts),
            profiles: Arc::new(ProfileService::new(pool.clone())),
            verifications: Arc::new(VerificationService::new(pool.clone(), dispatcher.clone(), otp_ttl_hours)),
            suggestions: Arc::new(SuggestionService::new(pool.clone(), dispatcher.clone())),
            availability: Arc::new(AvailabilityService::new(pool.clone(), dispatcher)),
            priority: Arc::new(PriorityService::new(pool.clone())),
            referrals: Arc::new(ReferralService::new(pool.clone(), &config.referrals)),
            matching,
            rate_limiter,
            referral_cookie: ReferralCookieSettings {
                name: config.referrals.cookie_name.clone(),
                max_age_days: config.referrals.cookie_max_age_days,
            },
            registration_per_hour: config.rate_limit.registration_per_hour,
            trust_proxy_headers: config.http.trust_proxy_headers,
            pool,
        }
    }

    /// The AI matching services, or 503 when the model is not configured.
    pub fn matching(&self) -> GatewayResult<&MatchingServices> {
        self.matching
            .as_ref()
            .ok_or_else(|| GatewayError::ServiceUnavailable("AI matching is not configured".to_string()))
    }
}
