//! Settings pages for users and organizations. Every handler goes through
//! the settings guard before reading or changing anything.

use axum::{
    extract::{OriginalUri, Path, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};

use crate::{
    dtos::settings::{AvatarForm, ProfileForm},
    middleware::Session,
    models::{ProfileChange, SubjectRef, SELF_ALIAS},
    services::{Guarded, ServiceError},
    utils::gravatar_url,
    AppState,
};

pub async fn profile(
    State(state): State<AppState>,
    Session(principal): Session,
    Path(user): Path<String>,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, ServiceError> {
    let target = SubjectRef::parse(&user);
    let outcome = state.settings.profile(principal.as_ref(), &target).await?;
    Ok(respond(&state, &uri, outcome, |view| Json(view).into_response()))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Session(principal): Session,
    Path(user): Path<String>,
    OriginalUri(uri): OriginalUri,
    Form(form): Form<ProfileForm>,
) -> Result<Response, ServiceError> {
    let target = SubjectRef::parse(&user);
    let outcome = state
        .settings
        .apply(principal.as_ref(), &target, ProfileChange::Name(form.name))
        .await?;
    Ok(respond(&state, &uri, outcome, |account| {
        Redirect::to(&profile_path(&account.login)).into_response()
    }))
}

pub async fn update_avatar(
    State(state): State<AppState>,
    Session(principal): Session,
    Path(user): Path<String>,
    OriginalUri(uri): OriginalUri,
    Form(form): Form<AvatarForm>,
) -> Result<Response, ServiceError> {
    if form.gravatar_email.trim().is_empty() {
        return Err(ServiceError::Validation(
            "GravatarEmail is required".to_string(),
        ));
    }
    let target = SubjectRef::parse(&user);
    let change = ProfileChange::AvatarUrl(gravatar_url(&form.gravatar_email));
    let outcome = state
        .settings
        .apply(principal.as_ref(), &target, change)
        .await?;
    Ok(respond(&state, &uri, outcome, |account| {
        Redirect::to(&profile_path(&account.login)).into_response()
    }))
}

pub async fn keys_page(
    State(state): State<AppState>,
    Session(principal): Session,
    Path(user): Path<String>,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, ServiceError> {
    let target = SubjectRef::parse(&user);
    let outcome = state.settings.view(principal.as_ref(), &target).await?;
    Ok(respond(&state, &uri, outcome, |context| {
        Json(context).into_response()
    }))
}

fn respond<T>(
    state: &AppState,
    uri: &Uri,
    outcome: Guarded<T>,
    done: impl FnOnce(T) -> Response,
) -> Response {
    match outcome {
        Guarded::Done(value) => done(value),
        Guarded::RedirectToAuthentication => {
            Redirect::to(&login_redirect(&state.config.settings.login_url, uri)).into_response()
        }
        Guarded::RedirectToSelf { login } => (
            StatusCode::FOUND,
            [(header::LOCATION, self_redirect(uri, &login))],
        )
            .into_response(),
    }
}

fn profile_path(login: &str) -> String {
    format!("/{}/.settings/profile", urlencoding::encode(login))
}

/// Login page URL that returns to the requested page afterwards.
pub fn login_redirect(login_url: &str, uri: &Uri) -> String {
    let return_to = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    let separator = if login_url.contains('?') { '&' } else { '?' };
    format!(
        "{login_url}{separator}return-to={}",
        urlencoding::encode(return_to)
    )
}

/// The requested path with its leading self alias replaced by `login`.
pub fn self_redirect(uri: &Uri, login: &str) -> String {
    let path = uri.path();
    let rest = path
        .strip_prefix('/')
        .and_then(|p| p.strip_prefix(SELF_ALIAS))
        .unwrap_or(path);
    let mut location = format!("/{}{}", urlencoding::encode(login), rest);
    if let Some(query) = uri.query() {
        location.push('?');
        location.push_str(query);
    }
    location
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_redirect_rewrites_alias_segment() {
        let uri: Uri = "/.me/.settings/profile?tab=emails".parse().unwrap();
        assert_eq!(
            self_redirect(&uri, "alice"),
            "/alice/.settings/profile?tab=emails"
        );
    }

    #[test]
    fn test_login_redirect_carries_return_path() {
        let uri: Uri = "/alice/.settings/keys".parse().unwrap();
        assert_eq!(
            login_redirect("/login", &uri),
            "/login?return-to=%2Falice%2F.settings%2Fkeys"
        );
        assert_eq!(
            login_redirect("https://sso.example.com/auth?app=registry", &uri),
            "https://sso.example.com/auth?app=registry&return-to=%2Falice%2F.settings%2Fkeys"
        );
    }
}
