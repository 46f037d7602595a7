use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
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

str_enum!(SourceSystem {
    SystemA => "metavision",
    SystemB => "hix",
});

// Stored values match the status strings downstream dashboards already read.
str_enum!(LetterOutcome {
    Success => "Success",
    LengthError => "LengthError",
    ModelError => "ModelError",
    ValidationError => "ValidationError",
});

str_enum!(AttemptStatus {
    Success => "Success",
    LengthError => "LengthError",
    ModelError => "ModelError",
    ValidationError => "ValidationError",
    RedactionError => "RedactionError",
    EmptyPatientFile => "EmptyPatientFile",
    UnknownDepartment => "UnknownDepartment",
    StorageError => "StorageError",
    Internal => "Internal",
});

str_enum!(Environment {
    Acc => "acc",
    Prod => "prod",
    Bulk => "bulk",
    Eval => "eval",
});

impl LetterOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<LetterOutcome> for AttemptStatus {
    fn from(outcome: LetterOutcome) -> Self {
        match outcome {
            LetterOutcome::Success => Self::Success,
            LetterOutcome::LengthError => Self::LengthError,
            LetterOutcome::ModelError => Self::ModelError,
            LetterOutcome::ValidationError => Self::ValidationError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn source_system_uses_ehr_names() {
        assert_eq!(SourceSystem::SystemA.as_str(), "metavision");
        assert_eq!(SourceSystem::from_str("hix").unwrap(), SourceSystem::SystemB);
    }

    #[test]
    fn invalid_enum_value_is_rejected() {
        let err = Environment::from_str("staging").unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::InvalidEnum { ref field, ref value } if field == "Environment" && value == "staging"
        ));
    }

    #[test]
    fn serde_uses_stored_strings() {
        let json = serde_json::to_string(&LetterOutcome::LengthError).unwrap();
        assert_eq!(json, "\"LengthError\"");
        let env: Environment = serde_json::from_str("\"bulk\"").unwrap();
        assert_eq!(env, Environment::Bulk);
    }

    #[test]
    fn letter_outcome_maps_to_attempt_status() {
        assert_eq!(AttemptStatus::from(LetterOutcome::ModelError), AttemptStatus::ModelError);
        assert!(LetterOutcome::Success.is_success());
        assert!(!LetterOutcome::ValidationError.is_success());
    }
}
