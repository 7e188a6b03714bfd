//! Retrieval-time access control.
//!
//! Turns the caller's identity into an [`AccessPredicate`] that the index
//! transport applies as a filter. Computed per request and never cached,
//! since the user may change between requests on the same session.

use std::fmt;

/// Principal that unauthenticated requests are matched against.
pub const ANONYMOUS_PRINCIPAL: &str = "anonymous";

/// Field of the index holding each document's allowed principals.
pub const ALLOWED_PRINCIPALS_FIELD: &str = "allowed_users";

/// Restriction applied to a retrieval query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccessPredicate {
    /// No restriction.
    MatchAll,
    /// Only documents whose allowed-principal set contains this principal.
    AllowedPrincipal(String),
}

impl AccessPredicate {
    /// Build the predicate for a request. Total over its inputs.
    pub fn build(user_id: Option<&str>, security_enabled: bool) -> Self {
        if !security_enabled {
            return AccessPredicate::MatchAll;
        }
        let principal = user_id.unwrap_or(ANONYMOUS_PRINCIPAL);
        AccessPredicate::AllowedPrincipal(principal.to_string())
    }

    /// Render as an OData `$filter` expression, or `None` for no restriction.
    ///
    /// Single quotes in the principal are doubled per OData string literal rules.
    pub fn to_odata_filter(&self) -> Option<String> {
        match self {
            AccessPredicate::MatchAll => None,
            AccessPredicate::AllowedPrincipal(principal) => Some(format!(
                "{ALLOWED_PRINCIPALS_FIELD}/any(u: u eq '{}')",
                principal.replace('\'', "''")
            )),
        }
    }

    /// Whether a document tagged with `allowed` principals passes this predicate.
    pub fn permits<S: AsRef<str>>(&self, allowed: &[S]) -> bool {
        match self {
            AccessPredicate::MatchAll => true,
            AccessPredicate::AllowedPrincipal(principal) => {
                allowed.iter().any(|p| p.as_ref() == principal)
            }
        }
    }
}

impl fmt::Display for AccessPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_odata_filter() {
            Some(filter) => write!(f, "{filter}"),
            None => write!(f, "*"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_matches_everything() {
        assert_eq!(AccessPredicate::build(Some("u1"), false), AccessPredicate::MatchAll);
        assert_eq!(AccessPredicate::build(None, false), AccessPredicate::MatchAll);
        assert!(AccessPredicate::MatchAll.to_odata_filter().is_none());
    }

    #[test]
    fn test_enabled_with_user() {
        let p = AccessPredicate::build(Some("alice@firm.com"), true);
        assert_eq!(
            p.to_odata_filter().as_deref(),
            Some("allowed_users/any(u: u eq 'alice@firm.com')")
        );
    }

    #[test]
    fn test_enabled_without_user_is_anonymous() {
        let p = AccessPredicate::build(None, true);
        assert_eq!(p, AccessPredicate::AllowedPrincipal("anonymous".into()));
        assert!(p.permits(&["anonymous", "bob"]));
        assert!(!p.permits(&["bob"]));
    }

    #[test]
    fn test_quotes_are_escaped() {
        let p = AccessPredicate::build(Some("o'brien"), true);
        assert_eq!(
            p.to_odata_filter().as_deref(),
            Some("allowed_users/any(u: u eq 'o''brien')")
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(AccessPredicate::MatchAll.to_string(), "*");
    }
}
