//! Referral campaigns end to end against a real SQLite database.

use matchmaker_config::{DatabaseConfig, ReferralConfig};
use matchmaker_database::{
    initialize_database, timestamp, NewCampaign, NewUser, ReferralCampaign, ReferralRepository, ReferralStatus,
    ReferrerTier, User, UserRepository,
};
use matchmaker_referrals::{
    CampaignPatch, CampaignRequest, CampaignSettings, ClickContext, PrizeTier, ReferralCookie, ReferralError,
    ReferralLookup, ReferralService, RegisterReferrer,
};
use sqlx::SqlitePool;
use tempfile::TempDir;

type TestResult<T = ()> = anyhow::Result<T>;

const PRIZES: &str = r#"[{"threshold": 1, "prize": "Coffee"}, {"threshold": 3, "prize": "Dinner", "prizeValue": 300}]"#;

struct TestContext {
    pool: SqlitePool,
    service: ReferralService,
    _temp_dir: TempDir,
}

impl TestContext {
    async fn new() -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let config = DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("referrals.db").display()),
            max_connections: 1,
        };
        let pool = initialize_database(&config).await?;
        Ok(Self {
            service: ReferralService::new(pool.clone(), &ReferralConfig::default()),
            pool,
            _temp_dir: temp_dir,
        })
    }

    async fn campaign(&self, slug: &str, settings: Option<&str>) -> TestResult<ReferralCampaign> {
        Ok(ReferralRepository::new(self.pool.clone())
            .create_campaign(&NewCampaign {
                slug: slug.to_string(),
                name: "Spring Wave".to_string(),
                description: None,
                is_active: true,
                starts_at: "2020-01-01T00:00:00.000Z".to_string(),
                ends_at: "2099-01-01T00:00:00.000Z".to_string(),
                prize_tiers: Some(PRIZES.to_string()),
                settings: settings.map(str::to_string),
            })
            .await?)
    }

    async fn user(&self, email: &str) -> TestResult<User> {
        let mut conn = self.pool.acquire().await?;
        Ok(UserRepository::create(&mut conn, &NewUser::candidate(email, "Noa", "Levi")).await?)
    }

    fn register(&self, slug: &str, name: &str) -> RegisterReferrer {
        RegisterReferrer {
            campaign_slug: slug.to_string(),
            name: name.to_string(),
            ..RegisterReferrer::default()
        }
    }

    fn click(code: &str, ip: &str) -> ClickContext {
        ClickContext {
            code: code.to_string(),
            ip_address: Some(ip.to_string()),
            session_id: Some(format!("session-{ip}")),
            ..ClickContext::default()
        }
    }
}

#[tokio::test]
async fn referrer_codes_are_generated_or_validated() -> TestResult {
    let ctx = TestContext::new().await?;
    ctx.campaign("spring", None).await?;

    let dana = ctx.service.create_referrer(ctx.register("spring", "Dana")).await?;
    assert_eq!(dana.code, "DANA");
    assert_eq!(dana.tier, ReferrerTier::Community);
    let second = ctx.service.create_referrer(ctx.register("spring", "Dana")).await?;
    assert_eq!(second.code, "DANA1");
    let hebrew = ctx.service.create_referrer(ctx.register("spring", "שרה")).await?;
    assert_eq!(hebrew.code, "SHRH");

    let mut request = ctx.register("spring", "Yossi");
    request.preferred_code = Some("yossi2024".to_string());
    request.tier = Some(ReferrerTier::Ambassador);
    let yossi = ctx.service.create_referrer(request).await?;
    assert_eq!(yossi.code, "YOSSI2024");
    assert_eq!(yossi.tier, ReferrerTier::Ambassador);

    let mut taken = ctx.register("spring", "Other");
    taken.preferred_code = Some("dana".to_string());
    let err = ctx.service.create_referrer(taken).await.unwrap_err();
    assert_eq!(err.code(), "CODE_TAKEN");

    let mut malformed = ctx.register("spring", "Other");
    malformed.preferred_code = Some("a-b".to_string());
    let err = ctx.service.create_referrer(malformed).await.unwrap_err();
    assert!(matches!(err, ReferralError::InvalidCodeFormat));

    let err = ctx.service.create_referrer(ctx.register("autumn", "Dana")).await.unwrap_err();
    assert!(matches!(err, ReferralError::CampaignNotFound(_)));
    Ok(())
}

#[tokio::test]
async fn clicks_are_tracked_until_the_ip_cap() -> TestResult {
    let ctx = TestContext::new().await?;
    let campaign = ctx.campaign("spring", Some(r#"{"maxReferralsPerIP": 2}"#)).await?;
    let dana = ctx.service.create_referrer(ctx.register("spring", "Dana")).await?;

    let first = ctx.service.track_click(TestContext::click("dana", "10.0.0.1")).await?;
    let referral_id = first.referral_id.clone().expect("recorded");
    let cookie = ReferralCookie::parse(first.cookie.as_deref().expect("cookie"), chrono::Utc::now()).expect("valid");
    assert_eq!(cookie.code, "DANA");
    assert_eq!(cookie.referral_id, referral_id);

    ctx.service.track_click(TestContext::click("DANA", "10.0.0.1")).await?;
    let capped = ctx.service.track_click(TestContext::click("DANA", "10.0.0.1")).await?;
    assert!(capped.referral_id.is_none());
    assert!(capped.cookie.is_none());
    ctx.service.track_click(TestContext::click("DANA", "10.0.0.2")).await?;

    let stats = ctx.service.referrer_stats(&dana.code).await?;
    assert_eq!(stats.click_count, 3);
    assert_eq!(stats.recent_referrals.len(), 3);

    let campaign_stats = ctx.service.campaign_with_stats(campaign.id).await?;
    assert_eq!(campaign_stats.total_clicks, 3);
    assert_eq!(campaign_stats.total_referrers, 1);

    let err = ctx.service.track_click(TestContext::click("NOPE", "10.0.0.3")).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_CODE");
    Ok(())
}

#[tokio::test]
async fn clicks_on_a_finished_campaign_are_rejected() -> TestResult {
    let ctx = TestContext::new().await?;
    let campaign = ctx.campaign("spring", None).await?;
    let dana = ctx.service.create_referrer(ctx.register("spring", "Dana")).await?;
    sqlx::query("UPDATE referral_campaigns SET ends_at = '2021-01-01T00:00:00.000Z' WHERE id = ?")
        .bind(campaign.id)
        .execute(&ctx.pool)
        .await?;

    let err = ctx.service.track_click(TestContext::click(&dana.code, "10.0.0.1")).await.unwrap_err();
    assert!(matches!(err, ReferralError::CampaignInactive));
    assert!(ctx.service.get_active_campaign(None).await?.is_none());
    assert!(ctx.service.get_active_campaign(Some("spring")).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn registration_links_the_cookie_and_the_funnel_only_moves_forward() -> TestResult {
    let ctx = TestContext::new().await?;
    let campaign = ctx.campaign("spring", None).await?;
    let dana = ctx.service.create_referrer(ctx.register("spring", "Dana")).await?;
    let click = ctx.service.track_click(TestContext::click(&dana.code, "10.0.0.1")).await?;
    let cookie = click.cookie.expect("cookie");

    let noa = ctx.user("noa@example.com").await?;
    let linked = ctx.service.link_from_cookie(noa.id, &cookie).await?.expect("linked");
    assert_eq!(linked.status, ReferralStatus::Registered);
    assert_eq!(linked.user_id, Some(noa.id));
    assert!(linked.registered_at.is_some());

    let other = ctx.user("other@example.com").await?;
    let err = ctx.service.link_from_cookie(other.id, &cookie).await.unwrap_err();
    assert_eq!(err.code(), "REFERRAL_ALREADY_USED");
    let err = ctx.service.link_user_to_referral(other.id, "missing", None).await.unwrap_err();
    assert_eq!(err.code(), "REFERRAL_NOT_FOUND");

    let by_user = ReferralLookup {
        user_id: Some(noa.id),
        ..ReferralLookup::default()
    };
    let progress = ctx.service.update_referral_status(by_user.clone(), ReferralStatus::Verified).await?;
    assert_eq!(progress.referrer_code, "DANA");
    assert_eq!(progress.new_verified_count, Some(1));

    let unchanged = ctx.service.update_referral_status(by_user, ReferralStatus::Started).await?;
    assert_eq!(unchanged.new_verified_count, None);

    let stats = ctx.service.referrer_stats("dana").await?;
    assert_eq!(stats.registration_count, 1);
    assert_eq!(stats.verified_count, 1);
    assert_eq!(stats.rank, 1);
    assert_eq!(stats.prizes_earned.len(), 1);
    assert_eq!(stats.next_prize.as_ref().map(|p| p.remaining), Some(2));
    assert_eq!(stats.campaign.name, "Spring Wave");

    let campaign_stats = ctx.service.campaign_with_stats(campaign.id).await?;
    assert_eq!(campaign_stats.total_registrations, 1);
    assert_eq!(campaign_stats.total_verified, 1);
    assert!((campaign_stats.conversion_rate - 100.0).abs() < f64::EPSILON);

    let err = ctx
        .service
        .update_referral_status(
            ReferralLookup {
                session_id: Some("unknown".to_string()),
                ..ReferralLookup::default()
            },
            ReferralStatus::Completed,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ReferralError::NoReferral));
    Ok(())
}

#[tokio::test]
async fn expired_cookie_is_ignored() -> TestResult {
    let ctx = TestContext::new().await?;
    let noa = ctx.user("noa@example.com").await?;
    let stale = ReferralCookie::new("DANA", "ref", 30, chrono::Utc::now() - chrono::Duration::days(31));
    assert!(ctx.service.link_from_cookie(noa.id, &stale.encode()).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn leaderboard_ranks_by_verified_referrals() -> TestResult {
    let ctx = TestContext::new().await?;
    let campaign = ctx.campaign("spring", None).await?;
    let dana = ctx.service.create_referrer(ctx.register("spring", "Dana")).await?;
    let yossi = ctx.service.create_referrer(ctx.register("spring", "Yossi")).await?;

    let click = ctx.service.track_click(TestContext::click(&yossi.code, "10.0.0.9")).await?;
    ctx.service
        .update_referral_status(
            ReferralLookup {
                referral_id: click.referral_id,
                ..ReferralLookup::default()
            },
            ReferralStatus::Verified,
        )
        .await?;

    let board = ctx.service.leaderboard(campaign.id, None, Some("dana")).await?;
    assert_eq!(board.len(), 2);
    assert_eq!(board[0].code, yossi.code);
    assert_eq!(board[0].rank, 1);
    assert!(!board[0].is_current_user);
    assert_eq!(board[1].code, dana.code);
    assert!(board[1].is_current_user);

    assert_eq!(ctx.service.referrer_stats(&dana.code).await?.rank, 2);
    assert!(timestamp::parse(&campaign.created_at).is_some());
    Ok(())
}

#[tokio::test]
async fn a_zero_ip_cap_means_unlimited_clicks() -> TestResult {
    let ctx = TestContext::new().await?;
    ctx.campaign("spring", Some(r#"{"maxReferralsPerIP": 0}"#)).await?;
    let dana = ctx.service.create_referrer(ctx.register("spring", "Dana")).await?;

    for _ in 0..3 {
        let outcome = ctx.service.track_click(TestContext::click(&dana.code, "10.0.0.1")).await?;
        assert!(outcome.referral_id.is_some());
        assert!(outcome.cookie.is_some());
    }
    assert_eq!(ctx.service.referrer_stats(&dana.code).await?.click_count, 3);
    Ok(())
}

#[tokio::test]
async fn an_unknown_referral_id_does_not_fall_back_to_the_user() -> TestResult {
    let ctx = TestContext::new().await?;
    ctx.campaign("spring", None).await?;
    let dana = ctx.service.create_referrer(ctx.register("spring", "Dana")).await?;
    let click = ctx.service.track_click(TestContext::click(&dana.code, "10.0.0.1")).await?;
    let noa = ctx.user("noa@example.com").await?;
    ctx.service.link_from_cookie(noa.id, &click.cookie.expect("cookie")).await?;

    let err = ctx
        .service
        .update_referral_status(
            ReferralLookup {
                referral_id: Some("missing".to_string()),
                user_id: Some(noa.id),
                session_id: Some("session-10.0.0.1".to_string()),
            },
            ReferralStatus::Verified,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ReferralError::NoReferral));
    assert_eq!(ctx.service.referrer_stats(&dana.code).await?.verified_count, 0);
    Ok(())
}

fn campaign_request(slug: &str) -> CampaignRequest {
    CampaignRequest {
        name: "Summer Wave".to_string(),
        slug: slug.to_string(),
        description: Some("Bring a friend".to_string()),
        start_date: "2020-01-01T00:00:00Z".to_string(),
        end_date: "2099-01-01T00:00:00Z".to_string(),
        prize_tiers: Some(vec![PrizeTier {
            threshold: 2,
            prize: "Voucher".to_string(),
            prize_value: Some(100.0),
            icon: None,
        }]),
        settings: Some(CampaignSettings {
            max_referrals_per_ip: 1,
            ..CampaignSettings::default()
        }),
    }
}

#[tokio::test]
async fn created_campaigns_accept_referrers_and_honour_their_settings() -> TestResult {
    let ctx = TestContext::new().await?;
    let campaign = ctx.service.create_campaign(campaign_request("summer-2025")).await?;
    assert!(campaign.is_active);
    assert_eq!(campaign.starts_at, "2020-01-01T00:00:00.000Z");

    let dana = ctx.service.create_referrer(ctx.register("summer-2025", "Dana")).await?;
    assert!(ctx.service.track_click(TestContext::click(&dana.code, "10.0.0.1")).await?.referral_id.is_some());
    let capped = ctx.service.track_click(TestContext::click(&dana.code, "10.0.0.1")).await?;
    assert!(capped.referral_id.is_none());

    let stats = ctx.service.referrer_stats(&dana.code).await?;
    assert_eq!(stats.next_prize.map(|p| p.prize), Some("Voucher".to_string()));

    let err = ctx.service.create_campaign(campaign_request("summer-2025")).await.unwrap_err();
    assert_eq!(err.code(), "SLUG_TAKEN");
    Ok(())
}

#[tokio::test]
async fn invalid_campaigns_are_rejected() -> TestResult {
    let ctx = TestContext::new().await?;

    let bad_slug = ctx.service.create_campaign(campaign_request("Summer Wave")).await.unwrap_err();
    assert!(matches!(bad_slug, ReferralError::Validation(_)));

    let mut backwards = campaign_request("backwards");
    backwards.end_date = "2019-01-01T00:00:00Z".to_string();
    assert!(matches!(
        ctx.service.create_campaign(backwards).await,
        Err(ReferralError::Validation(_))
    ));

    let mut bad_date = campaign_request("bad-date");
    bad_date.start_date = "next week".to_string();
    assert!(matches!(
        ctx.service.create_campaign(bad_date).await,
        Err(ReferralError::Validation(_))
    ));
    Ok(())
}

#[tokio::test]
async fn campaign_updates_merge_over_stored_values() -> TestResult {
    let ctx = TestContext::new().await?;
    let campaign = ctx.service.create_campaign(campaign_request("summer")).await?;

    let paused = ctx
        .service
        .update_campaign(
            campaign.id,
            CampaignPatch {
                is_active: Some(false),
                ..CampaignPatch::default()
            },
        )
        .await?;
    assert!(!paused.is_active);
    assert_eq!(paused.name, "Summer Wave");
    assert_eq!(paused.prize_tiers, campaign.prize_tiers);
    assert!(ctx.service.get_active_campaign(Some("summer")).await?.is_none());

    let err = ctx
        .service
        .update_campaign(campaign.id + 50, CampaignPatch::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CAMPAIGN_NOT_FOUND");
    Ok(())
}
