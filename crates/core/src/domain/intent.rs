use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Classified purpose of the latest user message. Exactly one label per
/// turn; the classifier re-runs from scratch on every inbound message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    CodeModification,
    DebuggingInquiry,
    GeneralChat,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeModification => "CODE_MODIFICATION",
            Self::DebuggingInquiry => "DEBUGGING_INQUIRY",
            Self::GeneralChat => "GENERAL_CHAT",
        }
    }
}

impl std::str::FromStr for Intent {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "CODE_MODIFICATION" => Ok(Self::CodeModification),
            "DEBUGGING_INQUIRY" => Ok(Self::DebuggingInquiry),
            "GENERAL_CHAT" => Ok(Self::GeneralChat),
            other => Err(DomainError::UnknownIntent(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Intent;

    #[test]
    fn parses_labels_with_surrounding_whitespace() {
        let intent: Intent = "  CODE_MODIFICATION \n".parse().expect("parse");
        assert_eq!(intent, Intent::CodeModification);
    }

    #[test]
    fn rejects_unknown_label() {
        assert!("MAKE_COFFEE".parse::<Intent>().is_err());
    }

    #[test]
    fn round_trips_through_label() {
        for intent in [Intent::CodeModification, Intent::DebuggingInquiry, Intent::GeneralChat] {
            assert_eq!(intent.as_str().parse::<Intent>().expect("parse"), intent);
        }
    }
}
