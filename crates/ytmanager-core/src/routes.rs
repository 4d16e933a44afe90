//! Navigable views and the guard that gates the protected ones.

use std::fmt;

use crate::auth::SessionState;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Login,
    Signup,
    Dashboard,
    ProjectDetail(String),
    CreateProject,
    ChannelSelection,
    Profile,
    /// Landing point after YouTube account linking
    OauthCallback,
}

impl Route {
    /// Resolve a path. Query strings and fragments are ignored and unknown
    /// paths fall through to `Home`.
    pub fn parse(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or("");
        let path = path.trim_end_matches('/');

        match path {
            "" => Route::Home,
            "/login" => Route::Login,
            "/signup" => Route::Signup,
            "/dashboard" => Route::Dashboard,
            "/create-project" => Route::CreateProject,
            "/channel-selection" => Route::ChannelSelection,
            "/profile" => Route::Profile,
            "/oauth-callback" => Route::OauthCallback,
            _ => match path.strip_prefix("/projects/") {
                Some(id) if !id.is_empty() && !id.contains('/') => {
                    Route::ProjectDetail(id.to_string())
                }
                _ => Route::Home,
            },
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Login => "/login".to_string(),
            Route::Signup => "/signup".to_string(),
            Route::Dashboard => "/dashboard".to_string(),
            Route::ProjectDetail(id) => format!("/projects/{}", id),
            Route::CreateProject => "/create-project".to_string(),
            Route::ChannelSelection => "/channel-selection".to_string(),
            Route::Profile => "/profile".to_string(),
            Route::OauthCallback => "/oauth-callback".to_string(),
        }
    }

    pub fn is_protected(&self) -> bool {
        matches!(
            self,
            Route::Dashboard
                | Route::ProjectDetail(_)
                | Route::CreateProject
                | Route::ChannelSelection
                | Route::Profile
        )
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session not loaded yet, render nothing
    Defer,
    Allow,
    Redirect(Route),
}

pub fn guard(state: &SessionState, route: &Route) -> GuardDecision {
    if !route.is_protected() {
        return GuardDecision::Allow;
    }

    match state {
        SessionState::Unknown => GuardDecision::Defer,
        SessionState::Absent => GuardDecision::Redirect(Route::Login),
        SessionState::Present(_) => GuardDecision::Allow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryTokenStore, SessionManager};

    #[test]
    fn test_parse_known_paths() {
        assert_eq!(Route::parse("/"), Route::Home);
        assert_eq!(Route::parse(""), Route::Home);
        assert_eq!(Route::parse("/login"), Route::Login);
        assert_eq!(Route::parse("/dashboard/"), Route::Dashboard);
        assert_eq!(Route::parse("/profile?tab=1"), Route::Profile);
        assert_eq!(Route::parse("/oauth-callback#code=abc"), Route::OauthCallback);
        assert_eq!(
            Route::parse("/projects/3f2a"),
            Route::ProjectDetail("3f2a".to_string())
        );
    }

    #[test]
    fn test_parse_unknown_paths_fall_back_home() {
        assert_eq!(Route::parse("/nope"), Route::Home);
        assert_eq!(Route::parse("/projects/"), Route::Home);
        assert_eq!(Route::parse("/projects/1/notes"), Route::Home);
        assert_eq!(Route::parse("/Dashboard"), Route::Home);
    }

    #[test]
    fn test_path_round_trips_through_parse() {
        let routes = [
            Route::Home,
            Route::Signup,
            Route::ProjectDetail("42".to_string()),
            Route::CreateProject,
            Route::ChannelSelection,
        ];
        for route in routes {
            assert_eq!(Route::parse(&route.path()), route);
        }
    }

    #[test]
    fn test_public_routes_always_allowed() {
        for route in [Route::Home, Route::Login, Route::Signup, Route::OauthCallback] {
            assert!(!route.is_protected());
            assert_eq!(guard(&SessionState::Unknown, &route), GuardDecision::Allow);
            assert_eq!(guard(&SessionState::Absent, &route), GuardDecision::Allow);
        }
    }

    #[test]
    fn test_protected_route_decisions() {
        let route = Route::ProjectDetail("7".to_string());
        assert!(route.is_protected());
        assert_eq!(guard(&SessionState::Unknown, &route), GuardDecision::Defer);
        assert_eq!(
            guard(&SessionState::Absent, &route),
            GuardDecision::Redirect(Route::Login)
        );

        let mut session = SessionManager::new(MemoryTokenStore::new());
        session.login(crate::auth::claims::encode_test_token(
            serde_json::json!({"role": "editor"}),
        ));
        assert_eq!(guard(session.state(), &route), GuardDecision::Allow);
    }
}
