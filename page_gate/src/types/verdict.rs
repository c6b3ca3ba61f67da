// Verdict types for token validation
//
// Reason codes are the contract toward the presentation layer and must stay
// stable.

use super::Token;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Why the validator denied a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenyReason {
    /// No token with the presented value, or the store could not answer
    TokenNotFound,
    /// Token has been deactivated
    TokenInactive,
    /// Token is past its expiry
    TokenExpired,
    /// Token does not cover the requested page
    PageNotAllowed,
}

impl DenyReason {
    pub const ALL: [DenyReason; 4] = [
        DenyReason::TokenNotFound,
        DenyReason::TokenInactive,
        DenyReason::TokenExpired,
        DenyReason::PageNotAllowed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::TokenNotFound => "TOKEN_NOT_FOUND",
            DenyReason::TokenInactive => "TOKEN_INACTIVE",
            DenyReason::TokenExpired => "TOKEN_EXPIRED",
            DenyReason::PageNotAllowed => "PAGE_NOT_ALLOWED",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every reason the error view can be asked to display.
///
/// Extends `DenyReason` with `PageNotFound`, which comes from content
/// resolution rather than from the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RestrictionReason {
    TokenNotFound,
    TokenInactive,
    TokenExpired,
    PageNotAllowed,
    PageNotFound,
}

impl RestrictionReason {
    pub const ALL: [RestrictionReason; 5] = [
        RestrictionReason::TokenNotFound,
        RestrictionReason::TokenInactive,
        RestrictionReason::TokenExpired,
        RestrictionReason::PageNotAllowed,
        RestrictionReason::PageNotFound,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RestrictionReason::TokenNotFound => "TOKEN_NOT_FOUND",
            RestrictionReason::TokenInactive => "TOKEN_INACTIVE",
            RestrictionReason::TokenExpired => "TOKEN_EXPIRED",
            RestrictionReason::PageNotAllowed => "PAGE_NOT_ALLOWED",
            RestrictionReason::PageNotFound => "PAGE_NOT_FOUND",
        }
    }

    /// Message shown on the access-restricted view
    pub fn message(&self) -> &'static str {
        match self {
            RestrictionReason::TokenNotFound => "This access link is not valid.",
            RestrictionReason::TokenInactive => "This access link has been deactivated.",
            RestrictionReason::TokenExpired => "This access link has expired.",
            RestrictionReason::PageNotAllowed => {
                "This access link does not include the requested page."
            }
            RestrictionReason::PageNotFound => "The requested page does not exist.",
        }
    }
}

impl From<DenyReason> for RestrictionReason {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::TokenNotFound => RestrictionReason::TokenNotFound,
            DenyReason::TokenInactive => RestrictionReason::TokenInactive,
            DenyReason::TokenExpired => RestrictionReason::TokenExpired,
            DenyReason::PageNotAllowed => RestrictionReason::PageNotAllowed,
        }
    }
}

impl fmt::Display for RestrictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RestrictionReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|reason| reason.as_str() == s)
            .ok_or_else(|| format!("unknown reason code: {}", s))
    }
}

/// Outcome of validating a token against a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// All checks passed; carries the token as it was read
    Valid { token: Token },
    /// First failing check
    Invalid { reason: DenyReason },
}

impl Verdict {
    pub fn invalid(reason: DenyReason) -> Self {
        Verdict::Invalid { reason }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid { .. })
    }

    pub fn reason(&self) -> Option<DenyReason> {
        match self {
            Verdict::Valid { .. } => None,
            Verdict::Invalid { reason } => Some(*reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_are_stable() {
        let codes: Vec<&str> = RestrictionReason::ALL.iter().map(|r| r.as_str()).collect();
        assert_eq!(
            codes,
            [
                "TOKEN_NOT_FOUND",
                "TOKEN_INACTIVE",
                "TOKEN_EXPIRED",
                "PAGE_NOT_ALLOWED",
                "PAGE_NOT_FOUND"
            ]
        );

        for reason in DenyReason::ALL {
            let widened = RestrictionReason::from(reason);
            assert_eq!(reason.as_str(), widened.as_str());
            assert_eq!(
                serde_json::to_value(reason).unwrap(),
                serde_json::Value::String(reason.as_str().to_string())
            );
        }
    }

    #[test]
    fn test_deny_reason_deserializes_from_code() {
        for reason in DenyReason::ALL {
            let code = serde_json::Value::String(reason.as_str().to_string());
            let parsed: DenyReason = serde_json::from_value(code).unwrap();
            assert_eq!(parsed, reason);
        }
        assert!(serde_json::from_value::<DenyReason>(serde_json::json!("token_expired")).is_err());
    }

    #[test]
    fn test_restriction_reason_parse() {
        assert_eq!(
            "PAGE_NOT_FOUND".parse::<RestrictionReason>(),
            Ok(RestrictionReason::PageNotFound)
        );
        assert!("page_not_found".parse::<RestrictionReason>().is_err());
        assert!("".parse::<RestrictionReason>().is_err());
    }
}
