//! Token issuance handlers.
//!
//! Each handler issues its tokens, mails them, records a notice for the
//! principal and answers with the acknowledgment plus the caller's redirect.

use accountlink_auth::action::{EMAIL_CHANGE_TEMPLATE, RECOVERY_TEMPLATE};
use accountlink_auth::{
    Action, Principal, PrincipalStore, TokenParams, TokenRequest, ensure_self_service,
};
use accountlink_notifications::{MailContext, Mailer, NoticeKind, Notifier};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;
use crate::http::extract::ActingPrincipal;
use crate::passwords::{check_password_strength, hash_password};
use crate::state::AppState;
use crate::store::{AccountStore, StoreError, normalize_email};

#[derive(Debug, Serialize)]
pub struct IssuanceResponse {
    pub notice: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub callback: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
    #[serde(default)]
    pub callback: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailChangeRequest {
    pub email: String,
    #[serde(default)]
    pub callback: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SecurityActionRequest {
    #[serde(default)]
    pub callback: Option<String>,
}

/// `POST /register`
pub async fn register_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<IssuanceResponse>), ApiError> {
    let password_hash = match request.password {
        Some(password) => {
            check_password_strength(&password).map_err(ApiError::validation)?;
            Some(hash_in_background(password).await?)
        }
        None => None,
    };

    let record = state
        .accounts
        .create(&request.username, &request.email, password_hash)
        .await?;
    let principal = record.principal();

    // An account only stays once its confirmation link went out.
    if let Err(err) = send_registration_mail(&state, &principal).await {
        state.accounts.delete(record.id).await?;
        tracing::warn!(
            principal_id = record.id,
            "Registration rolled back, confirmation mail not delivered"
        );
        return Err(err);
    }

    let notice = format!(
        "Your account was created. A confirmation link was sent to {}.",
        principal.email()
    );
    state
        .notifier
        .notify(&principal, NoticeKind::Success, &notice)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(IssuanceResponse {
            notice,
            redirect: request.callback,
        }),
    ))
}

/// `POST /password-reset`
pub async fn password_reset_handler(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetRequest>,
) -> Result<Json<IssuanceResponse>, ApiError> {
    let principal = state
        .accounts
        .find_by_email(&request.email)
        .await?
        .ok_or_else(|| ApiError::not_found("No account is registered with this email address"))?;

    let action = Action::PasswordReset;
    let token = state
        .issuer
        .issue(&TokenRequest::new(principal.clone(), action))?;

    send_action_mail(
        &state,
        &principal,
        action,
        &token,
        "If you did not ask for a new password, you can ignore this message.".into(),
    )
    .await?;

    let notice = format!("A password reset link was sent to {}.", principal.email());
    state
        .notifier
        .notify(&principal, NoticeKind::Success, &notice)
        .await?;

    Ok(Json(IssuanceResponse {
        notice,
        redirect: request.callback,
    }))
}

/// `POST /security/email-change/{id}`
///
/// The new address receives a login link; the previous address receives a
/// longer-lived recovery link that restores it. The address is replaced only
/// after both mails were delivered.
pub async fn email_change_handler(
    State(state): State<AppState>,
    ActingPrincipal(acting_id): ActingPrincipal,
    Path(id): Path<u64>,
    Json(request): Json<EmailChangeRequest>,
) -> Result<Json<IssuanceResponse>, ApiError> {
    let acting = acting_principal(&state, acting_id).await?;
    let previous = target_principal(&state, id).await?;
    ensure_self_service(&acting, &previous)?;

    let new_email = normalize_email(&request.email)?;
    if new_email == previous.email() {
        return Err(ApiError::bad_request(
            "The new email address is the same as the current one",
        ));
    }

    if state.accounts.find_by_email(&new_email).await?.is_some() {
        return Err(StoreError::Duplicate { field: "email" }.into());
    }
    let current = previous.with_email(new_email.as_str());

    let mut params = TokenParams::new();
    params.insert("field".into(), json!("email"));
    let bundle = state
        .issuer
        .issue_identity_change(&previous, &current, params)?;
    let recovery = bundle
        .recovery
        .as_deref()
        .ok_or_else(|| ApiError::internal("identity change issued no recovery token"))?;

    let mut recovery_context = base_context(&state, &previous);
    recovery_context.insert("new_email".into(), json!(current.email()));
    recovery_context.insert(
        "link".into(),
        json!(state.confirmation_link(Action::AccountRecovery, recovery)),
    );
    state
        .mailer
        .send(
            previous.email(),
            "Your {{site_name}} email address was changed",
            RECOVERY_TEMPLATE,
            &recovery_context,
        )
        .await?;

    let mut primary_context = base_context(&state, &current);
    primary_context.insert(
        "link".into(),
        json!(state.confirmation_link(bundle.action, &bundle.primary)),
    );
    state
        .mailer
        .send(
            current.email(),
            "Confirm your new {{site_name}} email address",
            EMAIL_CHANGE_TEMPLATE,
            &primary_context,
        )
        .await?;

    let current = state.accounts.update_email(id, &new_email).await?.principal();
    tracing::info!(principal_id = id, "Email address changed");

    let notice = format!("Your email address was changed to {}.", current.email());
    state
        .notifier
        .notify(&current, NoticeKind::Success, &notice)
        .await?;

    Ok(Json(IssuanceResponse {
        notice,
        redirect: request.callback,
    }))
}

/// `POST /security/{action}/{id}`
///
/// Self-service actions only. The mail also carries a password reset link
/// for the case that someone else requested the action.
pub async fn security_action_handler(
    State(state): State<AppState>,
    ActingPrincipal(acting_id): ActingPrincipal,
    Path((action, id)): Path<(String, u64)>,
    request: Option<Json<SecurityActionRequest>>,
) -> Result<Json<IssuanceResponse>, ApiError> {
    let action: Action = action.parse()?;
    if !action.is_self_service() {
        return Err(ApiError::not_found(format!(
            "Action '{action}' cannot be requested here"
        )));
    }

    let acting = acting_principal(&state, acting_id).await?;
    let target = target_principal(&state, id).await?;
    ensure_self_service(&acting, &target)?;

    let bundle = state
        .issuer
        .issue_with_reset(&target, action, TokenParams::new())?;
    let reset = bundle
        .reset
        .as_deref()
        .ok_or_else(|| ApiError::internal("self-service issuance produced no reset token"))?;

    let footer = format!(
        "If you did not ask for this, reset your password instead: {}",
        state.confirmation_link(Action::PasswordReset, reset)
    );
    send_action_mail(&state, &target, action, &bundle.primary, footer).await?;

    let descriptor = state.issuer.dispatcher().describe(action);
    let notice = format!(
        "{}: a confirmation link was sent to {}.",
        descriptor.title,
        target.email()
    );
    state
        .notifier
        .notify(&target, NoticeKind::Success, &notice)
        .await?;

    Ok(Json(IssuanceResponse {
        notice,
        redirect: request.and_then(|Json(r)| r.callback),
    }))
}

async fn send_registration_mail(state: &AppState, principal: &Principal) -> Result<(), ApiError> {
    let action = Action::AccountCreate;
    let token = state
        .issuer
        .issue(&TokenRequest::new(principal.clone(), action))?;

    let mut context = base_context(state, principal);
    context.insert("link".into(), json!(state.confirmation_link(action, &token)));
    let descriptor = state.issuer.dispatcher().describe(action);
    state
        .mailer
        .send(
            principal.email(),
            "Welcome to {{site_name}}",
            descriptor.template,
            &context,
        )
        .await?;
    Ok(())
}

/// Mails a token with the message metadata of its action.
async fn send_action_mail(
    state: &AppState,
    principal: &Principal,
    action: Action,
    token: &str,
    footer: String,
) -> Result<(), ApiError> {
    let descriptor = state.issuer.dispatcher().describe(action);

    let mut context = base_context(state, principal);
    context.insert("title".into(), json!(descriptor.title));
    context.insert("description".into(), json!(descriptor.description));
    context.insert("button_label".into(), json!(descriptor.button_label));
    context.insert("link".into(), json!(state.confirmation_link(action, token)));
    context.insert("footer".into(), json!(footer));

    state
        .mailer
        .send(
            principal.email(),
            "{{site_name}}: {{title}}",
            descriptor.template,
            &context,
        )
        .await?;
    Ok(())
}

fn base_context(state: &AppState, principal: &Principal) -> MailContext {
    let mut context = MailContext::new();
    context.insert("site_name".into(), json!(state.site_name));
    context.insert("username".into(), json!(principal.username()));
    context
}

async fn acting_principal(state: &AppState, id: u64) -> Result<Principal, ApiError> {
    state
        .accounts
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::unauthenticated("Unknown acting principal"))
}

async fn target_principal(state: &AppState, id: u64) -> Result<Principal, ApiError> {
    state
        .accounts
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Account {id} not found")))
}

/// Runs Argon2 off the async workers.
pub(crate) async fn hash_in_background(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .map_err(|e| ApiError::internal(e.to_string()))
}
