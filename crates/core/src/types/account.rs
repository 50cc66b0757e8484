//! Account kinds.

use serde::{Deserialize, Serialize};

/// Error returned when parsing an unknown account kind.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid user type: {0} (expected `particulier` or `professionnel`)")]
pub struct AccountKindError(pub String);

/// Whether an account belongs to a private customer or a professional.
///
/// Professionals carry extra profile information (company, SIRET,
/// specialties) and have access to seller features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    /// Private customer.
    #[default]
    Particulier,
    /// Trade professional (architect, contractor, supplier...).
    Professionnel,
}

impl UserType {
    /// Wire representation of this account kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Particulier => "particulier",
            Self::Professionnel => "professionnel",
        }
    }

    /// Returns `true` for professional accounts.
    #[must_use]
    pub const fn is_professional(self) -> bool {
        matches!(self, Self::Professionnel)
    }
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserType {
    type Err = AccountKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "particulier" => Ok(Self::Particulier),
            "professionnel" => Ok(Self::Professionnel),
            _ => Err(AccountKindError(s.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_type_wire_format() {
        assert_eq!(
            serde_json::to_string(&UserType::Professionnel).unwrap(),
            "\"professionnel\""
        );
        let parsed: UserType = serde_json::from_str("\"particulier\"").unwrap();
        assert_eq!(parsed, UserType::Particulier);
    }

    #[test]
    fn test_user_type_from_str() {
        assert_eq!(
            "professionnel".parse::<UserType>().unwrap(),
            UserType::Professionnel
        );
        assert!("admin".parse::<UserType>().is_err());
        assert!(UserType::Professionnel.is_professional());
        assert!(!UserType::Particulier.is_professional());
    }
}
