//! Availability inquiries against a real SQLite database.

mod common;

use std::sync::Arc;

use common::{TestContext, TestResult};
use matchmaker_database::{AvailabilityStatus, Gender, InquiryFilter, InquiryOrder, UserRole};
use matchmaker_matching::{AvailabilityError, AvailabilityService};
use matchmaker_notifications::test_support::RecordingSender;
use matchmaker_notifications::{templates, Locale};

#[tokio::test]
async fn inquiry_is_emailed_and_blocks_a_second_one() -> TestResult {
    let ctx = TestContext::new().await?;
    let (matchmaker, _) = ctx.matchmaker("mm@example.com").await?;
    let (party, _) = ctx.candidate("avi@example.com", "Avi", Gender::Male).await?;
    let service = AvailabilityService::new(ctx.pool.clone(), ctx.dispatcher.clone());

    let inquiry = service
        .send_inquiry(matchmaker.id, party.id, Some("Someone in mind"), Locale::En)
        .await?;
    assert_eq!(inquiry.first_party_id, party.id);
    assert_eq!(inquiry.second_party_id, party.id);
    assert!(inquiry.first_party_response.is_none());

    let sent = ctx.sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].template, templates::AVAILABILITY_CHECK);
    assert_eq!(sent[0].locale, Locale::En);
    assert_eq!(sent[0].data["inquiryId"], inquiry.public_id.as_str());

    let err = service
        .send_inquiry(matchmaker.id, party.id, None, Locale::He)
        .await
        .unwrap_err();
    assert!(matches!(err, AvailabilityError::AlreadyActive));
    Ok(())
}

#[tokio::test]
async fn inquiry_survives_email_failure() -> TestResult {
    let ctx = TestContext::with_sender(Arc::new(RecordingSender::failing())).await?;
    let (matchmaker, _) = ctx.matchmaker("mm@example.com").await?;
    let (party, _) = ctx.candidate("avi@example.com", "Avi", Gender::Male).await?;
    let service = AvailabilityService::new(ctx.pool.clone(), ctx.dispatcher.clone());

    let inquiry = service.send_inquiry(matchmaker.id, party.id, None, Locale::He).await?;
    assert!(service.get_inquiry(&inquiry.public_id).await.is_ok());
    Ok(())
}

#[tokio::test]
async fn response_updates_profile_and_tells_the_matchmaker() -> TestResult {
    let ctx = TestContext::new().await?;
    let (matchmaker, _) = ctx.matchmaker("mm@example.com").await?;
    let (party, _) = ctx.candidate("avi@example.com", "Avi", Gender::Male).await?;
    let (stranger, _) = ctx.candidate("dan@example.com", "Dan", Gender::Male).await?;
    let service = AvailabilityService::new(ctx.pool.clone(), ctx.dispatcher.clone());
    let inquiry = service.send_inquiry(matchmaker.id, party.id, None, Locale::He).await?;

    let err = service
        .update_response(&inquiry.public_id, stranger.id, true, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AvailabilityError::NotAParty));

    let answered = service
        .update_response(&inquiry.public_id, party.id, false, Some("Travelling until March"))
        .await?;
    assert_eq!(answered.first_party_response, Some(false));
    assert_eq!(answered.second_party_response, Some(false));

    let profile = ctx.profiles().find_by_user_id(party.id).await?.expect("profile");
    assert_eq!(profile.availability_status, Some(AvailabilityStatus::Unavailable));
    assert_eq!(profile.availability_note.as_deref(), Some("Travelling until March"));

    let response = ctx
        .sender
        .sent()
        .into_iter()
        .find(|n| n.template == templates::AVAILABILITY_RESPONSE)
        .expect("matchmaker notified");
    assert_eq!(response.to, "mm@example.com");
    assert_eq!(response.data["partyName"], "Avi Cohen");
    assert_eq!(response.data["isAvailable"], false);

    let completed = service
        .list_inquiries(party.id, InquiryFilter::Completed, InquiryOrder::UpdatedAt, None)
        .await?;
    assert_eq!(completed.len(), 1);
    let pending = service
        .list_inquiries(matchmaker.id, InquiryFilter::Pending, InquiryOrder::CreatedAt, Some(10))
        .await?;
    assert!(pending.is_empty());
    Ok(())
}

#[tokio::test]
async fn expired_and_unknown_inquiries_are_rejected() -> TestResult {
    let ctx = TestContext::new().await?;
    let (matchmaker, _) = ctx.matchmaker("mm@example.com").await?;
    let (party, _) = ctx.candidate("avi@example.com", "Avi", Gender::Male).await?;
    let service = AvailabilityService::new(ctx.pool.clone(), ctx.dispatcher.clone());
    let inquiry = service.send_inquiry(matchmaker.id, party.id, None, Locale::He).await?;

    sqlx::query("UPDATE availability_inquiries SET expires_at = '2020-01-01T00:00:00.000Z'")
        .execute(&ctx.pool)
        .await?;

    let err = service
        .update_response(&inquiry.public_id, party.id, true, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AvailabilityError::Expired));

    let expired = service
        .list_inquiries(party.id, InquiryFilter::Expired, InquiryOrder::CreatedAt, None)
        .await?;
    assert_eq!(expired.len(), 1);

    let err = service.update_response("nope", party.id, true, None).await.unwrap_err();
    assert!(matches!(err, AvailabilityError::NotFound { .. }));

    // An expired inquiry no longer blocks a new one.
    service.send_inquiry(matchmaker.id, party.id, None, Locale::He).await?;
    Ok(())
}

#[tokio::test]
async fn details_and_stats_cover_inquired_candidates() -> TestResult {
    let ctx = TestContext::new().await?;
    let (matchmaker, _) = ctx.matchmaker("mm@example.com").await?;
    let (avi, _) = ctx.candidate("avi@example.com", "Avi", Gender::Male).await?;
    let (noa, _) = ctx.candidate("noa@example.com", "Noa", Gender::Female).await?;
    let (dan, _) = ctx.candidate("dan@example.com", "Dan", Gender::Male).await?;
    let service = AvailabilityService::new(ctx.pool.clone(), ctx.dispatcher.clone());

    let first = service.send_inquiry(matchmaker.id, avi.id, None, Locale::He).await?;
    service.send_inquiry(matchmaker.id, noa.id, None, Locale::He).await?;
    service.send_inquiry(matchmaker.id, dan.id, None, Locale::He).await?;
    service.update_response(&first.public_id, avi.id, false, None).await?;
    sqlx::query("UPDATE profiles SET availability_status = NULL WHERE user_id = ?")
        .bind(dan.id)
        .execute(&ctx.pool)
        .await?;

    let stats = service.stats(matchmaker.id).await?;
    assert_eq!(stats.available, 1);
    assert_eq!(stats.unavailable, 1);
    assert_eq!(stats.dating, 0);
    assert_eq!(stats.pending, 1);

    let details = service.get_inquiry(&first.public_id).await?;
    assert_eq!(details.matchmaker.map(|m| m.email).as_deref(), Some("mm@example.com"));
    assert_eq!(
        details.first_party.and_then(|p| p.availability_status).as_deref(),
        Some("UNAVAILABLE")
    );
    Ok(())
}

#[tokio::test]
async fn answering_without_a_profile_is_not_found() -> TestResult {
    let ctx = TestContext::new().await?;
    let (matchmaker, _) = ctx.matchmaker("mm@example.com").await?;
    let party = ctx.user("bare@example.com", "Bare", UserRole::Candidate).await?;
    let service = AvailabilityService::new(ctx.pool.clone(), ctx.dispatcher.clone());
    let inquiry = service.send_inquiry(matchmaker.id, party.id, None, Locale::He).await?;

    let err = service
        .update_response(&inquiry.public_id, party.id, true, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AvailabilityError::ProfileNotFound { user_id } if user_id == party.id));

    let details = service.get_inquiry(&inquiry.public_id).await?;
    assert!(details.inquiry.first_party_response.is_none());
    assert!(details.inquiry.second_party_response.is_none());
    Ok(())
}
