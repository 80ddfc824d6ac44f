//! Authenticated sessions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use amnesia_core::{AmnesiaError, ApiConfig, Result, UserKeys};

use crate::api::{Account, SocialApi};
use crate::client::TwitterClient;

/// A verified login: the account, the keys that proved it and a client bound to them.
#[derive(Clone)]
pub struct Session {
    /// Account the keys belong to.
    pub account: Account,
    /// Keys used for every request of this session.
    pub keys: UserKeys,
    /// When the credentials were verified.
    pub logged_in_at: DateTime<Utc>,
    client: Arc<dyn SocialApi>,
}

impl Session {
    /// Client for this session's account.
    pub fn client(&self) -> Arc<dyn SocialApi> {
        Arc::clone(&self.client)
    }

    /// Owner id used by the feed endpoints.
    pub fn user_id(&self) -> &str {
        &self.account.user_id
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("account", &self.account)
            .field("keys", &self.keys)
            .field("logged_in_at", &self.logged_in_at)
            .finish_non_exhaustive()
    }
}

/// Builds a provider client for a key bundle.
pub trait Connector: Send + Sync {
    /// Create an unverified client.
    fn connect(&self, keys: &UserKeys) -> Result<Arc<dyn SocialApi>>;
}

/// Connects to the Twitter REST API.
#[derive(Debug, Clone, Default)]
pub struct TwitterConnector {
    config: ApiConfig,
}

impl TwitterConnector {
    /// Create a connector using the given API settings.
    pub fn new(config: ApiConfig) -> Self {
        Self { config }
    }
}

impl Connector for TwitterConnector {
    fn connect(&self, keys: &UserKeys) -> Result<Arc<dyn SocialApi>> {
        Ok(Arc::new(TwitterClient::new(&self.config, keys)?))
    }
}

/// Owns the current session, if any.
///
/// A failed login never disturbs an existing session.
pub struct SessionManager {
    connector: Arc<dyn Connector>,
    current: Option<Session>,
}

impl SessionManager {
    /// Create a manager without a session.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            current: None,
        }
    }

    /// Create a manager talking to Twitter.
    pub fn twitter(config: ApiConfig) -> Self {
        Self::new(Arc::new(TwitterConnector::new(config)))
    }

    /// Verify `keys` and make them the current session.
    #[instrument(skip_all)]
    pub async fn login(&mut self, keys: UserKeys) -> Result<Session> {
        let missing = keys.missing_fields();
        if !missing.is_empty() {
            return Err(AmnesiaError::auth(format!(
                "Missing credentials: {}",
                missing.join(", ")
            )));
        }

        let client = self.connector.connect(&keys)?;
        let account = match client.verify_credentials().await {
            Ok(account) => account,
            Err(e) => {
                warn!(error = %e, "Credential verification failed");
                return Err(e);
            }
        };

        info!(screen_name = %account.screen_name, "Logged in");

        let session = Session {
            account,
            keys,
            logged_in_at: Utc::now(),
            client,
        };
        self.current = Some(session.clone());
        Ok(session)
    }

    /// The current session, if logged in.
    pub fn current_session(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// The current session, or [`AmnesiaError::NotLoggedIn`].
    pub fn require(&self) -> Result<&Session> {
        self.current.as_ref().ok_or(AmnesiaError::NotLoggedIn)
    }

    /// Whether a session is active.
    pub fn is_logged_in(&self) -> bool {
        self.current.is_some()
    }

    /// Drop the current session. Returns the account that was logged in.
    pub fn logout(&mut self) -> Option<Account> {
        let session = self.current.take()?;
        info!(screen_name = %session.account.screen_name, "Logged out");
        Some(session.account)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}
