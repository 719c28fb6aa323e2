use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use super::jwt::TokenPair;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

fn session_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

pub fn set_session(jar: CookieJar, pair: &TokenPair, secure: bool) -> CookieJar {
    jar.add(session_cookie(ACCESS_COOKIE, pair.access_token.clone(), secure))
        .add(session_cookie(REFRESH_COOKIE, pair.refresh_token.clone(), secure))
}

/// Expires both session cookies, keeping the attributes they were set with.
pub fn clear_session(jar: CookieJar, secure: bool) -> CookieJar {
    jar.remove(session_cookie(ACCESS_COOKIE, String::new(), secure))
        .remove(session_cookie(REFRESH_COOKIE, String::new(), secure))
}

/// Non-empty cookie value, if present.
pub fn read(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value().to_owned())
        .filter(|v| !v.is_empty())
}
