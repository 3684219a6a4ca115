pub mod availability_service;
pub mod priority_service;
pub mod suggestion_service;

pub use availability_service::{AvailabilityService, InquiryDetails, INQUIRY_TTL_HOURS};
pub use priority_service::{
    category_for, profile_completeness, PriorityBreakdown, PriorityInputs, PriorityService, PrioritySummary, PriorityStats,
    UpdateCounts, UserPriority,
};
pub use suggestion_service::{CreateSuggestion, StatusUpdate, SuggestionService, SuggestionView};
