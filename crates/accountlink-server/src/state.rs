use std::sync::Arc;

use accountlink_auth::{
    Clock, ConfigError, ConsumedTokenLedger, MemoryTokenLedger, SystemClock, TokenIssuer,
    TokenVerifier,
};
use accountlink_notifications::{FlashNotifier, Mailer, NotificationError, TemplateRenderer};

use crate::config::AppConfig;
use crate::store::{AccountStore, MemoryAccountStore};

/// Failure to wire the services from configuration.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("tokens: {0}")]
    Tokens(#[from] ConfigError),

    #[error("mailer: {0}")]
    Mailer(#[from] NotificationError),
}

/// Shared services handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub issuer: Arc<TokenIssuer>,
    pub verifier: Arc<TokenVerifier>,
    pub ledger: Arc<dyn ConsumedTokenLedger>,
    pub accounts: Arc<dyn AccountStore>,
    pub mailer: Arc<dyn Mailer>,
    pub notifier: Arc<FlashNotifier>,
    pub clock: Arc<dyn Clock>,
    /// Product name used in mail templates.
    pub site_name: String,
    /// Base URL of confirmation links, without a trailing slash.
    pub base_url: String,
}

impl AppState {
    /// Wires in-memory storage and the configured mail transport.
    pub fn from_config(cfg: &AppConfig) -> Result<Self, StateError> {
        let renderer = Arc::new(TemplateRenderer::with_defaults());
        let mailer = cfg.mailer.build_mailer(renderer)?;
        Self::with_services(
            cfg,
            Arc::new(SystemClock),
            Arc::new(MemoryAccountStore::new()),
            mailer,
        )
    }

    /// Builds the token services from `cfg` around caller-provided collaborators.
    pub fn with_services(
        cfg: &AppConfig,
        clock: Arc<dyn Clock>,
        accounts: Arc<dyn AccountStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, StateError> {
        let codec = cfg.tokens.build_codec()?;
        let issuer = cfg.tokens.build_issuer(codec.clone(), clock.clone())?;
        let ledger: Arc<dyn ConsumedTokenLedger> = Arc::new(MemoryTokenLedger::new());
        let verifier = cfg
            .tokens
            .build_verifier(codec, clock.clone(), ledger.clone());

        Ok(Self {
            issuer: Arc::new(issuer),
            verifier: Arc::new(verifier),
            ledger,
            accounts,
            mailer,
            notifier: Arc::new(FlashNotifier::new()),
            clock,
            site_name: cfg.mailer.site_name.clone(),
            base_url: cfg.base_url(),
        })
    }

    /// Link the recipient follows to confirm `action` with `token`.
    pub fn confirmation_link(&self, action: accountlink_auth::Action, token: &str) -> String {
        format!(
            "{}/confirm/{}?token={}",
            self.base_url,
            action,
            urlencoding::encode(token)
        )
    }
}
