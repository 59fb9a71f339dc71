use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use accountlink_auth::action::{
    EMAIL_CHANGE_TEMPLATE, RECOVERY_TEMPLATE, REGISTER_TEMPLATE, TOKEN_TEMPLATE,
};
use accountlink_auth::{FixedClock, PrincipalStore};
use accountlink_notifications::{
    LogMailer, MailContext, Mailer, NotificationError, SentMail, TemplateRenderer,
};
use accountlink_server::http::PRINCIPAL_HEADER;
use accountlink_server::passwords::verify_password;
use accountlink_server::{AccountStore, AppConfig, AppState, MemoryAccountStore, router};
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header::CONTENT_TYPE},
};
use async_trait::async_trait;
use serde_json::{Value, json};
use time::Duration;
use time::macros::datetime;
use tower::ServiceExt;

/// Captures mail like the log transport, but can be switched to refuse it.
struct SwitchableMailer {
    inner: LogMailer,
    failing: AtomicBool,
}

#[async_trait]
impl Mailer for SwitchableMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        template: &str,
        context: &MailContext,
    ) -> Result<(), NotificationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError::SendFailed("relay unavailable".into()));
        }
        self.inner.send(to, subject, template, context).await
    }
}

struct TestApp {
    app: Router,
    clock: Arc<FixedClock>,
    accounts: Arc<MemoryAccountStore>,
    delivery: Arc<SwitchableMailer>,
}

impl TestApp {
    fn new() -> Self {
        let mut cfg = AppConfig::default();
        cfg.tokens.secret = "integration-test-secret-0123456789abcdef".into();
        cfg.server.public_url = Some("https://accounts.test".into());

        let clock = Arc::new(FixedClock::new(datetime!(2024-05-01 08:00 UTC)));
        let accounts = Arc::new(MemoryAccountStore::new());
        let delivery = Arc::new(SwitchableMailer {
            inner: LogMailer::new(Arc::new(TemplateRenderer::with_defaults())),
            failing: AtomicBool::new(false),
        });
        let state =
            AppState::with_services(&cfg, clock.clone(), accounts.clone(), delivery.clone())
                .expect("state");

        Self {
            app: router(state),
            clock,
            accounts,
            delivery,
        }
    }

    fn mailer(&self) -> &LogMailer {
        &self.delivery.inner
    }

    fn fail_deliveries(&self, failing: bool) {
        self.delivery.failing.store(failing, Ordering::SeqCst);
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        principal: Option<u64>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(id) = principal {
            builder = builder.header(PRINCIPAL_HEADER, id.to_string());
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn post(&self, uri: &str, principal: Option<u64>, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, principal, Some(body)).await
    }

    /// Registers an account, confirms it and clears its mail and notices.
    async fn registered(&self, username: &str, email: &str) -> u64 {
        let (status, _) = self
            .post(
                "/register",
                None,
                json!({ "username": username, "email": email }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let mail = self.last_mail().await;
        let (status, body) = self
            .post(
                "/confirm/account_create",
                None,
                json!({ "token": token_in(&mail) }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let id = body["principal_id"].as_u64().unwrap();
        self.call(Method::GET, &format!("/notices/{id}"), Some(id), None)
            .await;
        id
    }

    async fn last_mail(&self) -> SentMail {
        self.mailer().take().await.pop().expect("a mail was sent")
    }
}

/// Pulls the token out of the first confirmation link in a mail body.
fn token_in(mail: &SentMail) -> String {
    token_after(&mail.content.body, 0)
}

fn token_after(body: &str, skip: usize) -> String {
    body.match_indices("?token=")
        .nth(skip)
        .map(|(at, marker)| {
            body[at + marker.len()..]
                .chars()
                .take_while(|c| !c.is_whitespace())
                .collect()
        })
        .expect("confirmation link in mail")
}

#[tokio::test]
async fn registration_is_confirmed_once() {
    let t = TestApp::new();

    let (status, body) = t
        .post(
            "/register",
            None,
            json!({ "username": "alice", "email": "a@x.com", "callback": "/welcome" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["redirect"], "/welcome");

    let mail = t.last_mail().await;
    assert_eq!(mail.to, "a@x.com");
    assert_eq!(mail.template, REGISTER_TEMPLATE);
    assert_eq!(mail.content.subject, "Welcome to AccountLink");
    assert!(
        mail.content
            .body
            .contains("https://accounts.test/confirm/account_create?token=")
    );
    let token = token_in(&mail);

    let (status, page) = t
        .call(
            Method::GET,
            &format!("/confirm/account_create?token={token}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["title"], "Account creation");
    assert_eq!(page["username"], "alice");

    let (status, body) = t
        .post("/confirm/account_create", None, json!({ "token": token }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["login"], false);
    let id = body["principal_id"].as_u64().unwrap();
    assert!(t.accounts.get(id).await.unwrap().unwrap().active);

    let (status, body) = t
        .post("/confirm/account_create", None, json!({ "token": token }))
        .await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"], "already_consumed");

    let (status, body) = t
        .call(
            Method::GET,
            &format!("/confirm/account_create?token={token}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"], "already_consumed");
}

#[tokio::test]
async fn registration_rejects_reserved_and_duplicate_names() {
    let t = TestApp::new();
    t.registered("alice", "a@x.com").await;

    let (status, body) = t
        .post(
            "/register",
            None,
            json!({ "username": "register", "email": "r@x.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_failed");

    let (status, body) = t
        .post(
            "/register",
            None,
            json!({ "username": "alice2", "email": "A@x.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate");

    let (status, _) = t
        .post(
            "/register",
            None,
            json!({ "username": "bob", "email": "b@x.com", "password": "weak" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn password_reset_for_unknown_email_is_not_found() {
    let t = TestApp::new();

    let (status, body) = t
        .post("/password-reset", None, json!({ "email": "ghost@x.com" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
    assert!(t.mailer().sent().await.is_empty());
}

#[tokio::test]
async fn password_reset_sets_new_password() {
    let t = TestApp::new();
    let id = t.registered("alice", "a@x.com").await;

    let (status, _) = t
        .post("/password-reset", None, json!({ "email": "a@x.com" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let mail = t.last_mail().await;
    assert_eq!(mail.template, TOKEN_TEMPLATE);
    assert!(mail.content.subject.contains("Password reset"));
    let token = token_in(&mail);

    t.clock.advance(Duration::hours(1));

    // A missing password does not spend the token.
    let (status, _) = t
        .post("/confirm/password_reset", None, json!({ "token": token }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = t
        .post(
            "/confirm/password_reset",
            None,
            json!({ "token": token, "password": "Secret123" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["login"], false);

    let hash = t.accounts.get(id).await.unwrap().unwrap().password_hash.unwrap();
    assert!(verify_password("Secret123", &hash).unwrap());
}

#[tokio::test]
async fn expired_link_is_gone() {
    let t = TestApp::new();
    t.registered("alice", "a@x.com").await;

    t.post("/password-reset", None, json!({ "email": "a@x.com" }))
        .await;
    let token = token_in(&t.last_mail().await);

    t.clock.advance(Duration::hours(25));
    let (status, body) = t
        .post(
            "/confirm/password_reset",
            None,
            json!({ "token": token, "password": "Secret123" }),
        )
        .await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"], "expired");
}

#[tokio::test]
async fn token_for_another_action_is_rejected() {
    let t = TestApp::new();
    let id = t.registered("alice", "a@x.com").await;

    t.post("/password-reset", None, json!({ "email": "a@x.com" }))
        .await;
    let token = token_in(&t.last_mail().await);

    let (status, body) = t
        .post("/confirm/account_delete", None, json!({ "token": token }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "action_mismatch");
    assert!(t.accounts.get(id).await.unwrap().is_some());

    let (status, body) = t
        .post("/confirm/account_delete", None, json!({ "token": "garbage" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "malformed");
}

#[tokio::test]
async fn email_change_mails_both_addresses_and_recovery_restores() {
    let t = TestApp::new();
    let id = t.registered("alice", "a@x.com").await;

    let (status, body) = t
        .post(
            &format!("/security/email-change/{id}"),
            Some(id),
            json!({ "email": "new@x.com", "callback": "/profile" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["redirect"], "/profile");
    assert_eq!(t.accounts.get(id).await.unwrap().unwrap().email, "new@x.com");

    let mails = t.mailer().take().await;
    assert_eq!(mails.len(), 2);
    let recovery_mail = &mails[0];
    let primary_mail = &mails[1];

    assert_eq!(recovery_mail.to, "a@x.com");
    assert_eq!(recovery_mail.template, RECOVERY_TEMPLATE);
    assert!(recovery_mail.content.body.contains("changed to new@x.com"));
    assert_eq!(primary_mail.to, "new@x.com");
    assert_eq!(primary_mail.template, EMAIL_CHANGE_TEMPLATE);

    // The primary link expires after a day, the recovery link lives on.
    t.clock.advance(Duration::days(3));
    let (status, _) = t
        .post(
            "/confirm/user_login",
            None,
            json!({ "token": token_in(primary_mail) }),
        )
        .await;
    assert_eq!(status, StatusCode::GONE);

    let (status, body) = t
        .post(
            "/confirm/account_recovery",
            None,
            json!({ "token": token_in(recovery_mail) }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["login"], true);
    let restored = t.accounts.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(restored.email(), "a@x.com");
}

#[tokio::test]
async fn login_link_for_a_replaced_email_is_forbidden() {
    let t = TestApp::new();
    let id = t.registered("alice", "a@x.com").await;

    t.post(
        &format!("/security/email-change/{id}"),
        Some(id),
        json!({ "email": "new@x.com" }),
    )
    .await;
    let mails = t.mailer().take().await;

    t.post(
        "/confirm/account_recovery",
        None,
        json!({ "token": token_in(&mails[0]) }),
    )
    .await;

    let (status, body) = t
        .post(
            "/confirm/user_login",
            None,
            json!({ "token": token_in(&mails[1]) }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn email_change_guards() {
    let t = TestApp::new();
    let alice = t.registered("alice", "a@x.com").await;
    let bob = t.registered("bob", "b@x.com").await;

    let uri = format!("/security/email-change/{alice}");

    let (status, body) = t.post(&uri, None, json!({ "email": "c@x.com" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");

    let (status, body) = t.post(&uri, Some(bob), json!({ "email": "c@x.com" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, body) = t.post(&uri, Some(alice), json!({ "email": "A@x.com" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (status, body) = t.post(&uri, Some(alice), json!({ "email": "b@x.com" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate");

    assert!(t.mailer().sent().await.is_empty());
}

#[tokio::test]
async fn self_service_deletion_with_reset_link() {
    let t = TestApp::new();
    let id = t.registered("alice", "a@x.com").await;

    let (status, _) = t
        .call(
            Method::POST,
            &format!("/security/account_delete/{id}"),
            Some(id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let mail = t.last_mail().await;
    assert_eq!(mail.template, TOKEN_TEMPLATE);
    assert!(mail.content.body.contains("Delete my account"));
    assert!(mail.content.body.contains("/confirm/password_reset?token="));
    let delete_token = token_in(&mail);
    let reset_token = token_after(&mail.content.body, 1);

    let (status, page) = t
        .call(
            Method::GET,
            &format!("/confirm/password_reset?token={reset_token}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["requires_password"], true);

    let (status, body) = t
        .post(
            "/confirm/account_delete",
            None,
            json!({ "token": delete_token }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["login"], false);
    assert!(t.accounts.get(id).await.unwrap().is_none());

    let (status, _) = t
        .post(
            "/confirm/password_reset",
            None,
            json!({ "token": reset_token, "password": "Secret123" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn self_service_routes_reject_other_actions_and_principals() {
    let t = TestApp::new();
    let alice = t.registered("alice", "a@x.com").await;
    let bob = t.registered("bob", "b@x.com").await;

    let (status, body) = t
        .call(
            Method::POST,
            &format!("/security/bogus_action/{alice}"),
            Some(alice),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unknown_action");

    let (status, _) = t
        .call(
            Method::POST,
            &format!("/security/account_recovery/{alice}"),
            Some(alice),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = t
        .call(
            Method::POST,
            &format!("/security/user_login/{alice}"),
            Some(bob),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
    assert!(t.mailer().sent().await.is_empty());
}

#[tokio::test]
async fn login_link_logs_in() {
    let t = TestApp::new();
    let id = t.registered("alice", "a@x.com").await;

    t.call(
        Method::POST,
        &format!("/security/user_login/{id}"),
        Some(id),
        None,
    )
    .await;
    let token = token_in(&t.last_mail().await);

    let (status, body) = t
        .post("/confirm/user_login", None, json!({ "token": token }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["login"], true);
    assert_eq!(body["principal_id"], id);
}

#[tokio::test]
async fn notices_are_drained_by_their_owner() {
    let t = TestApp::new();
    let id = t.registered("alice", "a@x.com").await;

    t.post("/password-reset", None, json!({ "email": "a@x.com" }))
        .await;

    let (status, _) = t
        .call(Method::GET, &format!("/notices/{id}"), Some(id + 1), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, notices) = t
        .call(Method::GET, &format!("/notices/{id}"), Some(id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let notices = notices.as_array().unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0]["kind"], "success");
    assert!(
        notices[0]["message"]
            .as_str()
            .unwrap()
            .contains("a@x.com")
    );

    let (_, notices) = t
        .call(Method::GET, &format!("/notices/{id}"), Some(id), None)
        .await;
    assert_eq!(notices, json!([]));
}

#[tokio::test]
async fn failed_delivery_leaves_accounts_untouched() {
    let t = TestApp::new();
    let id = t.registered("alice", "a@x.com").await;

    t.fail_deliveries(true);
    let (status, body) = t
        .post(
            &format!("/security/email-change/{id}"),
            Some(id),
            json!({ "email": "new@x.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "delivery_failed");
    assert_eq!(t.accounts.get(id).await.unwrap().unwrap().email, "a@x.com");

    let (status, _) = t
        .post(
            "/register",
            None,
            json!({ "username": "bob", "email": "b@x.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(t.accounts.len().await, 1);

    // Once mail flows again the same registration goes through.
    t.fail_deliveries(false);
    let (status, _) = t
        .post(
            "/register",
            None,
            json!({ "username": "bob", "email": "b@x.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(t.last_mail().await.to, "b@x.com");
}

#[tokio::test]
async fn recovery_waits_while_the_old_address_is_taken() {
    let t = TestApp::new();
    let alice = t.registered("alice", "a@x.com").await;

    t.post(
        &format!("/security/email-change/{alice}"),
        Some(alice),
        json!({ "email": "new@x.com" }),
    )
    .await;
    let recovery_token = token_in(&t.mailer().take().await[0]);

    let bob = t.registered("bob", "a@x.com").await;
    let (status, body) = t
        .post(
            "/confirm/account_recovery",
            None,
            json!({ "token": recovery_token }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate");

    // The link was not spent by the refusal.
    let (status, _) = t
        .call(
            Method::GET,
            &format!("/confirm/account_recovery?token={recovery_token}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    t.call(
        Method::POST,
        &format!("/security/account_delete/{bob}"),
        Some(bob),
        None,
    )
    .await;
    let delete_token = token_in(&t.last_mail().await);
    let (status, _) = t
        .post(
            "/confirm/account_delete",
            None,
            json!({ "token": delete_token }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t
        .post(
            "/confirm/account_recovery",
            None,
            json!({ "token": recovery_token }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(t.accounts.get(alice).await.unwrap().unwrap().email, "a@x.com");
}

#[tokio::test]
async fn credential_login_requires_an_activated_account() {
    let t = TestApp::new();

    let (status, _) = t
        .post(
            "/register",
            None,
            json!({ "username": "alice", "email": "a@x.com", "password": "Secret123" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let token = token_in(&t.last_mail().await);

    let credentials = json!({ "login": "alice", "password": "Secret123" });
    let (status, body) = t.post("/login", None, credentials.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    t.post("/confirm/account_create", None, json!({ "token": token }))
        .await;

    let (status, body) = t.post("/login", None, credentials).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["login"], true);
    let id = body["principal_id"].as_u64().unwrap();

    let (status, body) = t
        .post(
            "/login",
            None,
            json!({ "login": "A@x.com", "password": "Secret123" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["principal_id"], id);

    let (status, body) = t
        .post(
            "/login",
            None,
            json!({ "login": "alice", "password": "Secret124" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");
}

#[tokio::test]
async fn passwordless_accounts_cannot_use_credential_login() {
    let t = TestApp::new();
    t.registered("bob", "b@x.com").await;

    let (status, _) = t
        .post(
            "/login",
            None,
            json!({ "login": "bob", "password": "Secret123" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = t
        .post(
            "/login",
            None,
            json!({ "login": "ghost", "password": "Secret123" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
