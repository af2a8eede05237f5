use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::cookie::{CookieJar, PrivateCookieJar};
use serde::Deserialize;

use crate::{
    auth::{self, CurrentUser},
    error::AppError,
    flash,
    routes::PageContext,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(landing))
        .route("/login", get(login_form).post(login_submit))
        .route("/signup", get(signup_form).post(signup_submit))
        .route("/logout", post(logout))
}

#[derive(Template)]
#[template(path = "landing.html")]
struct LandingTemplate {
    page: PageContext,
}

async fn landing(current: CurrentUser, jar: PrivateCookieJar) -> Response {
    if current.is_logged_in() {
        return Redirect::to("/dashboard").into_response();
    }
    let (jar, notice) = flash::take(jar);
    (
        jar,
        AskamaTemplateResponse::into_response(LandingTemplate {
            page: PageContext::new(&current, notice),
        }),
    )
        .into_response()
}

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    page: PageContext,
    show_error: bool,
    error_message: String,
    email: String,
}

async fn login_form(current: CurrentUser, jar: PrivateCookieJar) -> Response {
    let (jar, notice) = flash::take(jar);
    (
        jar,
        AskamaTemplateResponse::into_response(LoginTemplate {
            page: PageContext::new(&current, notice),
            show_error: false,
            error_message: String::new(),
            email: String::new(),
        }),
    )
        .into_response()
}

#[derive(Deserialize)]
struct LoginForm {
    email: String,
    password: String,
}

async fn login_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    match auth::authenticate_user(&state, &form.email, &form.password).await {
        Ok(user) => {
            let session_id = auth::create_session(&state, user.id).await?;
            Ok((
                auth::apply_session_cookie(jar, &session_id),
                Redirect::to("/dashboard"),
            )
                .into_response())
        }
        Err(AppError::Unauthorized) => Ok(render_login_error(
            form.email,
            "Invalid email or password".into(),
        )),
        Err(AppError::InvalidInput(msg)) => Ok(render_login_error(form.email, msg)),
        Err(err) => Err(err),
    }
}

fn render_login_error(email: String, message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        AskamaTemplateResponse::into_response(LoginTemplate {
            page: PageContext::default(),
            show_error: true,
            error_message: message,
            email,
        }),
    )
        .into_response()
}

#[derive(Template)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    page: PageContext,
    show_error: bool,
    error_message: String,
    name: String,
    email: String,
    bio: String,
}

async fn signup_form(current: CurrentUser) -> Response {
    AskamaTemplateResponse::into_response(SignupTemplate {
        page: PageContext::new(&current, String::new()),
        show_error: false,
        error_message: String::new(),
        name: String::new(),
        email: String::new(),
        bio: String::new(),
    })
}

#[derive(Deserialize)]
struct SignupForm {
    name: String,
    email: String,
    password: String,
    password_confirm: String,
    #[serde(default)]
    bio: String,
}

async fn signup_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    if form.password != form.password_confirm {
        return Ok(render_signup_error(form, "Passwords do not match".into()));
    }

    match auth::register_user(
        &state,
        &form.name,
        &form.email,
        &form.password,
        Some(form.bio.as_str()),
    )
    .await
    {
        Ok(user) => {
            let session_id = auth::create_session(&state, user.id).await?;
            Ok((
                auth::apply_session_cookie(jar, &session_id),
                Redirect::to("/dashboard"),
            )
                .into_response())
        }
        Err(AppError::InvalidInput(msg)) => Ok(render_signup_error(form, msg)),
        Err(err) => Err(err),
    }
}

fn render_signup_error(form: SignupForm, message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        AskamaTemplateResponse::into_response(SignupTemplate {
            page: PageContext::default(),
            show_error: true,
            error_message: message,
            name: form.name,
            email: form.email,
            bio: form.bio,
        }),
    )
        .into_response()
}

async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    if let Some(cookie) = jar.get(auth::SESSION_COOKIE) {
        auth::destroy_session(&state, cookie.value()).await?;
    }
    Ok((auth::clear_session_cookie(jar), Redirect::to("/")))
}
