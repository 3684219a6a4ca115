pub mod status;

pub use status::{
    allowed_transitions, availability_effect, available_actions, calculate_age, can_transition, days_left, progress,
    secondary_transition, stamp_column, status_label, validate_transition, StatusAction, SuggestionRole,
};
