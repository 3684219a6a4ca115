//! Availability inquiries: a matchmaker asks a candidate whether they are free
//! for a new suggestion and the candidate answers.

use chrono::Duration;
use matchmaker_database::{
    timestamp, AvailabilityInquiry, AvailabilityRepository, AvailabilityStats, AvailabilityStatus, InquiryFilter,
    InquiryOrder, InquiryParty, ProfileRepository, User, UserRepository,
};
use matchmaker_notifications::{Locale, NotificationDispatcher, Recipient};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::types::{AvailabilityError, AvailabilityResult};

pub const INQUIRY_TTL_HOURS: i64 = 24;

/// An inquiry with the people it concerns.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryDetails {
    #[serde(flatten)]
    pub inquiry: AvailabilityInquiry,
    pub matchmaker: Option<InquiryParty>,
    pub first_party: Option<InquiryParty>,
    pub second_party: Option<InquiryParty>,
}

#[derive(Clone)]
pub struct AvailabilityService {
    pool: SqlitePool,
    inquiries: AvailabilityRepository,
    profiles: ProfileRepository,
    users: UserRepository,
    dispatcher: NotificationDispatcher,
}

impl AvailabilityService {
    pub fn new(pool: SqlitePool, dispatcher: NotificationDispatcher) -> Self {
        Self {
            inquiries: AvailabilityRepository::new(pool.clone()),
            profiles: ProfileRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            pool,
            dispatcher,
        }
    }

    /// Open a 24 hour inquiry for `first_party_id` and email them about it.
    pub async fn send_inquiry(
        &self,
        matchmaker_id: i64,
        first_party_id: i64,
        note: Option<&str>,
        locale: Locale,
    ) -> AvailabilityResult<AvailabilityInquiry> {
        let matchmaker = self.user(matchmaker_id).await?;
        let party = self.user(first_party_id).await?;

        if self.inquiries.find_active_for_first_party(party.id).await?.is_some() {
            return Err(AvailabilityError::AlreadyActive);
        }

        let expires_at = timestamp::from_now(Duration::hours(INQUIRY_TTL_HOURS));
        let inquiry = self
            .inquiries
            .create(matchmaker.id, party.id, party.id, note, &expires_at)
            .await?;
        info!(inquiry_id = %inquiry.public_id, matchmaker_id, user_id = party.id, "availability inquiry sent");

        let recipient = Recipient {
            locale,
            ..Recipient::from(&party)
        };
        if let Err(err) = self
            .dispatcher
            .send_availability_check(&recipient, &matchmaker.full_name(), &inquiry.public_id, note)
            .await
        {
            warn!(inquiry_id = %inquiry.public_id, user_id = party.id, error = %err, "availability check email failed");
        }

        Ok(inquiry)
    }

    /// Record a party's answer and mirror it onto their profile.
    pub async fn update_response(
        &self,
        inquiry_id: &str,
        user_id: i64,
        is_available: bool,
        note: Option<&str>,
    ) -> AvailabilityResult<AvailabilityInquiry> {
        let inquiry = self.find(inquiry_id).await?;
        if inquiry.is_expired_at(&timestamp::now()) {
            return Err(AvailabilityError::Expired);
        }
        if !inquiry.is_party(user_id) {
            return Err(AvailabilityError::NotAParty);
        }

        let availability = if is_available {
            AvailabilityStatus::Available
        } else {
            AvailabilityStatus::Unavailable
        };

        let mut tx = self.pool.begin().await?;
        if !ProfileRepository::set_availability(&mut tx, user_id, availability, note).await? {
            return Err(AvailabilityError::ProfileNotFound { user_id });
        }
        // A single-candidate inquiry names them on both sides; both answers are recorded
        // so it counts as completed.
        if inquiry.first_party_id == user_id {
            AvailabilityRepository::set_response(&mut tx, inquiry.id, true, is_available).await?;
        }
        if inquiry.second_party_id == user_id {
            AvailabilityRepository::set_response(&mut tx, inquiry.id, false, is_available).await?;
        }
        tx.commit().await?;

        info!(inquiry_id = %inquiry.public_id, user_id, is_available, "availability response recorded");
        self.notify_matchmaker(&inquiry, user_id, is_available, note).await;

        self.find(inquiry_id).await
    }

    pub async fn get_inquiry(&self, inquiry_id: &str) -> AvailabilityResult<InquiryDetails> {
        let inquiry = self.find(inquiry_id).await?;
        Ok(InquiryDetails {
            matchmaker: self.inquiries.party(inquiry.matchmaker_id).await?,
            first_party: self.inquiries.party(inquiry.first_party_id).await?,
            second_party: self.inquiries.party(inquiry.second_party_id).await?,
            inquiry,
        })
    }

    /// Current availability of every candidate the matchmaker has asked about.
    pub async fn stats(&self, matchmaker_id: i64) -> AvailabilityResult<AvailabilityStats> {
        let party_ids = self.inquiries.party_ids_for_matchmaker(matchmaker_id).await?;
        let mut stats = AvailabilityStats::default();
        for (status, total) in self.profiles.count_by_availability(&party_ids).await? {
            match status {
                Some(AvailabilityStatus::Available) => stats.available += total,
                Some(AvailabilityStatus::Unavailable) => stats.unavailable += total,
                Some(AvailabilityStatus::Dating) => stats.dating += total,
                None => stats.pending += total,
                Some(_) => {}
            }
        }
        Ok(stats)
    }

    pub async fn list_inquiries(
        &self,
        user_id: i64,
        filter: InquiryFilter,
        order: InquiryOrder,
        limit: Option<i64>,
    ) -> AvailabilityResult<Vec<AvailabilityInquiry>> {
        Ok(self.inquiries.list_for_user(user_id, filter, order, limit).await?)
    }

    async fn find(&self, inquiry_id: &str) -> AvailabilityResult<AvailabilityInquiry> {
        self.inquiries
            .find_by_public_id(inquiry_id)
            .await?
            .ok_or_else(|| AvailabilityError::NotFound { id: inquiry_id.to_string() })
    }

    async fn user(&self, user_id: i64) -> AvailabilityResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AvailabilityError::UserNotFound { id: user_id })
    }

    async fn notify_matchmaker(&self, inquiry: &AvailabilityInquiry, user_id: i64, is_available: bool, note: Option<&str>) {
        let people = match self.users.find_many(&[inquiry.matchmaker_id, user_id]).await {
            Ok(people) => people,
            Err(err) => {
                warn!(inquiry_id = %inquiry.public_id, error = %err, "could not load inquiry participants");
                return;
            }
        };
        let matchmaker = people.iter().find(|u| u.id == inquiry.matchmaker_id);
        let party = people.iter().find(|u| u.id == user_id);
        let (Some(matchmaker), Some(party)) = (matchmaker, party) else {
            return;
        };

        if let Err(err) = self
            .dispatcher
            .send_availability_response(&Recipient::from(matchmaker), &party.full_name(), is_available, note)
            .await
        {
            warn!(inquiry_id = %inquiry.public_id, matchmaker_id = matchmaker.id, error = %err, "availability response email failed");
        }
    }
}
