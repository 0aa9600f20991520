use uuid::Uuid;

pub const SIGN_IN_PATH: &str = "/signin";
pub const CHAT_PATH: &str = "/chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SignIn,
    Home,
    /// Latest thread, or an offer to start one
    ChatIndex,
    ChatThread(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Render(Route),
    Redirect(String),
}

impl Route {
    /// Parse a path; unknown paths and malformed thread ids redirect
    pub fn parse(path: &str) -> Result<Route, Navigation> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "" => Ok(Route::Home),
            SIGN_IN_PATH => Ok(Route::SignIn),
            CHAT_PATH => Ok(Route::ChatIndex),
            _ => match trimmed.strip_prefix("/chat/") {
                Some(raw) => Uuid::parse_str(raw)
                    .map(Route::ChatThread)
                    .map_err(|_| Navigation::Redirect(CHAT_PATH.to_string())),
                None => Err(Navigation::Redirect("/".to_string())),
            },
        }
    }

    pub fn requires_auth(&self) -> bool {
        matches!(self, Route::ChatIndex | Route::ChatThread(_))
    }

    pub fn path(&self) -> String {
        match self {
            Route::SignIn => SIGN_IN_PATH.to_string(),
            Route::Home => "/".to_string(),
            Route::ChatIndex => CHAT_PATH.to_string(),
            Route::ChatThread(uuid) => format!("{CHAT_PATH}/{uuid}"),
        }
    }
}

/// Decide what a path shows before any thread lookup
pub fn guard(path: &str, authenticated: bool) -> Navigation {
    match Route::parse(path) {
        Ok(route) if route.requires_auth() && !authenticated => {
            Navigation::Redirect(SIGN_IN_PATH.to_string())
        }
        Ok(route) => Navigation::Render(route),
        Err(redirect) => redirect,
    }
}

/// Outcome for a thread route once the lookup has answered
pub fn after_lookup(route: Route, thread_found: bool) -> Navigation {
    match route {
        Route::ChatThread(_) if !thread_found => Navigation::Redirect(CHAT_PATH.to_string()),
        other => Navigation::Render(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "7f1d6a3e-2b1c-4d5e-9f00-123456789abc";

    #[test]
    fn test_parse_known_routes() {
        assert_eq!(Route::parse("/"), Ok(Route::Home));
        assert_eq!(Route::parse("/signin"), Ok(Route::SignIn));
        assert_eq!(Route::parse("/chat/"), Ok(Route::ChatIndex));
        let uuid = Uuid::parse_str(ID).unwrap();
        assert_eq!(Route::parse(&format!("/chat/{ID}?x=1")), Ok(Route::ChatThread(uuid)));
        assert_eq!(Route::ChatThread(uuid).path(), format!("/chat/{ID}"));
    }

    #[test]
    fn test_malformed_and_unknown_paths_redirect() {
        assert_eq!(
            Route::parse("/chat/not-a-uuid"),
            Err(Navigation::Redirect("/chat".into()))
        );
        assert_eq!(Route::parse("/admin"), Err(Navigation::Redirect("/".into())));
    }

    #[test]
    fn test_unauthenticated_chat_goes_to_signin() {
        assert_eq!(guard("/chat", false), Navigation::Redirect("/signin".into()));
        assert_eq!(
            guard(&format!("/chat/{ID}"), false),
            Navigation::Redirect("/signin".into())
        );
        assert_eq!(guard("/", false), Navigation::Render(Route::Home));
        assert_eq!(guard("/chat", true), Navigation::Render(Route::ChatIndex));
    }

    #[test]
    fn test_unknown_thread_redirects_to_chat() {
        let route = Route::ChatThread(Uuid::parse_str(ID).unwrap());
        assert_eq!(after_lookup(route, false), Navigation::Redirect("/chat".into()));
        assert_eq!(after_lookup(route, true), Navigation::Render(route));
    }
}
