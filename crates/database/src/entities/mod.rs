//! Domain entities for the database layer
//!
//! Enumerations are stored as their upper-case text form; `string_enum!`
//! generates the conversions used by the repositories.

/// Declares a text-backed enum with `as_str`, `FromStr`, `Display` and an
/// `ALL` listing. Parsing failures name the column they came from.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($field:literal) {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::types::DatabaseError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    other => Err(crate::types::DatabaseError::InvalidValue {
                        field: $field,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub mod availability;
pub mod matching;
pub mod profile;
pub mod referral;
pub mod suggestion;
pub mod user;
pub mod verification;

#[cfg(test)]
mod tests {
    use super::suggestion::SuggestionStatus;
    use super::user::UserStatus;
    use crate::types::DatabaseError;

    #[test]
    fn enum_text_matches_serde_representation() {
        for status in SuggestionStatus::ALL {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<SuggestionStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn unknown_text_reports_the_column() {
        let err = "SLEEPING".parse::<UserStatus>().unwrap_err();
        match err {
            DatabaseError::InvalidValue { field, value } => {
                assert_eq!(field, "status");
                assert_eq!(value, "SLEEPING");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
