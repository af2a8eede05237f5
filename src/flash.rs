//! One-shot notices carried across a redirect in an encrypted cookie.

use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};

use crate::error::AppError;

const FLASH_COOKIE: &str = "cycle_flash";

pub fn set(jar: PrivateCookieJar, message: impl Into<String>) -> PrivateCookieJar {
    let cookie = Cookie::build((FLASH_COOKIE, message.into()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    jar.add(cookie)
}

/// Reads the pending notice and clears it. Empty when there is none.
pub fn take(jar: PrivateCookieJar) -> (PrivateCookieJar, String) {
    match jar.get(FLASH_COOKIE) {
        Some(cookie) => {
            let message = cookie.value().to_owned();
            (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), message)
        }
        None => (jar, String::new()),
    }
}

pub fn redirect(jar: PrivateCookieJar, message: impl Into<String>, to: &str) -> Response {
    (set(jar, message), Redirect::to(to)).into_response()
}

/// Turns a domain error into a notice on the page at `to`; anything else
/// keeps propagating as a failed request.
pub fn recover(jar: PrivateCookieJar, err: AppError, to: &str) -> Result<Response, AppError> {
    if err.is_notice() {
        Ok(redirect(jar, err.to_string(), to))
    } else {
        Err(err)
    }
}
