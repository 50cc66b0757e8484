//! Client-side route protection.
//!
//! Decides what a front end should do before rendering a path. Nothing here
//! is enforced by the backend; protected API calls still answer `401` on
//! their own.

use crate::services::AuthState;

/// Path prefixes that require a logged-in user.
pub const PROTECTED_PREFIXES: &[&str] = &["/profile", "/messages", "/dashboard"];

/// Login page that protected routes redirect to.
pub const LOGIN_PATH: &str = "/login";

/// Outcome of checking a path against the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Render the page.
    Allow,
    /// Session is still loading; render a placeholder and check again.
    Wait,
    /// Send the visitor to the login page, coming back afterwards.
    RedirectToLogin {
        /// `/login?redirect=<path>`
        redirect: String,
    },
}

/// Route guard over a fixed set of protected prefixes.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    prefixes: Vec<String>,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(PROTECTED_PREFIXES.iter().copied())
    }
}

impl RouteGuard {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `path` needs a session. Matches whole segments, so
    /// `/profile/edit` is protected but `/profiles` is not.
    #[must_use]
    pub fn is_protected(&self, path: &str) -> bool {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        self.prefixes.iter().any(|prefix| {
            path.strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }

    /// Decide how to handle `path` for the given session state.
    #[must_use]
    pub fn check(&self, path: &str, state: &AuthState) -> RouteDecision {
        if !self.is_protected(path) {
            return RouteDecision::Allow;
        }

        match state {
            AuthState::Authenticated(_) => RouteDecision::Allow,
            AuthState::Loading => RouteDecision::Wait,
            AuthState::Unauthenticated => RouteDecision::RedirectToLogin {
                redirect: login_redirect(path),
            },
        }
    }
}

/// `/login?redirect=<path>` with the path URL-encoded.
#[must_use]
pub fn login_redirect(path: &str) -> String {
    format!("{LOGIN_PATH}?redirect={}", urlencoding::encode(path))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::User;

    fn authenticated() -> AuthState {
        let user: User = serde_json::from_value(serde_json::json!({
            "_id": "u1", "firstName": "Zoé", "lastName": "Garnier", "email": "zoe@renov.fr"
        }))
        .unwrap();
        AuthState::Authenticated(Box::new(user))
    }

    #[test]
    fn test_public_paths_always_allowed() {
        let guard = RouteGuard::default();
        for path in ["/", "/products/p1", "/profiles", "/forum"] {
            assert_eq!(guard.check(path, &AuthState::Unauthenticated), RouteDecision::Allow);
        }
    }

    #[test]
    fn test_protected_paths_follow_session_state() {
        let guard = RouteGuard::default();

        assert_eq!(guard.check("/messages", &authenticated()), RouteDecision::Allow);
        assert_eq!(guard.check("/dashboard/orders", &AuthState::Loading), RouteDecision::Wait);
        assert_eq!(
            guard.check("/profile/edit", &AuthState::Unauthenticated),
            RouteDecision::RedirectToLogin {
                redirect: "/login?redirect=%2Fprofile%2Fedit".to_string()
            }
        );
    }

    #[test]
    fn test_query_string_does_not_hide_protection() {
        let guard = RouteGuard::default();
        assert!(guard.is_protected("/messages?conversation=c1"));
        assert!(!guard.is_protected("/messagesx"));
    }
}
