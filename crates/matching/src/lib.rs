//! # Matchmaker Matching Crate
//!
//! The matchmaker's working tools:
//!
//! - **Suggestions**: [`SuggestionService`] drives a suggestion through its
//!   status lifecycle, see [`utils::status`] for the transition table
//! - **Availability**: [`AvailabilityService`] asks candidates whether they are free
//! - **Priority**: [`PriorityService`] scores candidates so the most urgent come first

pub mod services;
pub mod types;
pub mod utils;

pub use services::{
    category_for, profile_completeness, AvailabilityService, CreateSuggestion, InquiryDetails, PriorityBreakdown,
    PriorityInputs, PriorityService, PriorityStats, PrioritySummary, StatusUpdate, SuggestionService, SuggestionView,
    UpdateCounts, UserPriority, INQUIRY_TTL_HOURS,
};
pub use types::{Actor, AvailabilityError, AvailabilityResult, SuggestionError, SuggestionResult};
pub use utils::{StatusAction, SuggestionRole};
