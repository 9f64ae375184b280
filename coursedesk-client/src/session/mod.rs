//! Session manager
//!
//! Owns the authentication state of the running client: the token pair, the
//! signed-in user, their role and permissions. Everything else in the
//! application reads [`SessionSnapshot`]s and goes through the manager's
//! operations to change anything.
//!
//! ```no_run
//! use coursedesk_client::{Credentials, SessionConfig, SessionManager};
//!
//! # async fn example() -> Result<(), coursedesk_client::SessionError> {
//! let session = SessionManager::connect(SessionConfig::from_env())?;
//! session.initialize().await;
//!
//! if !session.is_authenticated() {
//!     let outcome = session
//!         .login(&Credentials::new("admin@example.com", "secret"))
//!         .await;
//!     if !outcome.success {
//!         eprintln!("login failed: {:?}", outcome.error);
//!     }
//! }
//!
//! let can_edit = session.snapshot().has_permission("courses:write");
//! # let _ = can_edit;
//! # Ok(())
//! # }
//! ```

mod monitor;
mod resolver;
mod types;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use shared::{TokenPair, UserRecord};
use shared::util::{now_millis, now_secs};
use tokio::sync::{RwLock, watch};

use crate::service::{AuthService, HttpApi, RoleService};
use crate::store::{FileStore, PersistedSession, SessionStore};
use crate::token::{self, TokenStatus};
use crate::{SessionConfig, SessionError, SessionResult};
use monitor::{MonitorHandle, SessionMonitor};
use types::Session;

pub use monitor::ValidationOutcome;
pub use resolver::{RoleResolver, Strategy};
pub use types::{Credentials, LoginOutcome, RoleResolution, SessionSnapshot, SessionState};

type SharedRefresh = Shared<BoxFuture<'static, SessionResult<()>>>;

/// Refresh in progress, tagged with the session epoch it belongs to
struct Flight {
    epoch: u64,
    future: SharedRefresh,
}

#[derive(Default)]
struct SessionSlot {
    state: SessionState,
    session: Option<Session>,
}

pub(crate) struct Inner {
    config: SessionConfig,
    auth: Arc<dyn AuthService>,
    roles: Arc<dyn RoleService>,
    store: PersistedSession,
    slot: RwLock<SessionSlot>,
    /// Bumped whenever the session is replaced or ended. Only advanced while
    /// the `slot` write lock is held.
    epoch: AtomicU64,
    snapshot: watch::Sender<SessionSnapshot>,
    refresh_inflight: Mutex<Option<Flight>>,
    monitor: Mutex<Option<MonitorHandle>>,
}

/// Handle to the process's session.
///
/// Cheap to clone; every clone drives the same session. Build one at start-up
/// and pass it to whatever needs it.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state())
            .field("base_url", &self.inner.config.base_url)
            .finish()
    }
}

impl SessionManager {
    pub fn new(
        config: SessionConfig,
        auth: Arc<dyn AuthService>,
        roles: Arc<dyn RoleService>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let (snapshot, _) = watch::channel(SessionSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                config,
                auth,
                roles,
                store: PersistedSession::new(store),
                slot: RwLock::new(SessionSlot::default()),
                epoch: AtomicU64::new(0),
                snapshot,
                refresh_inflight: Mutex::new(None),
                monitor: Mutex::new(None),
            }),
        }
    }

    /// Manager backed by the REST API and a file store, both taken from `config`
    pub fn connect(config: SessionConfig) -> SessionResult<Self> {
        let api = Arc::new(HttpApi::from_config(&config)?);
        let store = Arc::new(FileStore::open(&config.store_path)?);
        Ok(Self::new(config, api.clone(), api, store))
    }

    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    // ========== Read-only projection ==========

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Receive a new snapshot on every session change
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.inner.snapshot.borrow().state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.state() == SessionState::Loading
    }

    /// Current access token, for attaching to outgoing API calls
    pub async fn access_token(&self) -> Option<String> {
        let slot = self.inner.slot.read().await;
        slot.session.as_ref().map(|s| s.access_token.clone())
    }

    fn publish(&self, slot: &SessionSlot) {
        self.inner
            .snapshot
            .send_replace(SessionSnapshot::build(slot.state, slot.session.as_ref()));
    }

    fn current_epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }

    /// Start a new session epoch. Caller holds the `slot` write lock.
    ///
    /// Any refresh still in flight belongs to the previous epoch; it is
    /// detached here so nobody joins it, and its result is discarded.
    fn advance_epoch(&self) -> u64 {
        self.inner
            .refresh_inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    // ========== Start-up ==========

    /// Rehydrate the persisted session.
    ///
    /// Ends `Authenticated` only when the stored token is usable (refreshing
    /// it if expired) and the role resolves; anything else clears the store.
    /// Never leaves the manager in `Loading`.
    pub async fn initialize(&self) -> SessionState {
        let epoch = self.enter_loading().await;
        let _loading = LoadingGuard {
            manager: self,
            epoch,
        };

        match self.restore().await {
            Ok(Some(session)) => {
                let (user_id, role) = (session.user.id.clone(), session.user.role.clone());
                match self.install(session, Some(epoch), false).await {
                    Ok(()) => tracing::info!(user_id = %user_id, role = %role, "Session restored"),
                    Err(e) => tracing::debug!(error = %e, "Restored session not installed"),
                }
            }
            Ok(None) => {
                tracing::debug!("No persisted session");
                let mut slot = self.inner.slot.write().await;
                self.leave_loading(&mut slot, epoch);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Persisted session rejected");
                if let Err(e) = self.sign_out(Some(epoch), false).await {
                    tracing::warn!(error = %e, "Failed to clear persisted session");
                }
            }
        }

        self.state()
    }

    async fn enter_loading(&self) -> u64 {
        let mut slot = self.inner.slot.write().await;
        let epoch = self.advance_epoch();
        self.stop_monitor();
        slot.state = SessionState::Loading;
        slot.session = None;
        self.publish(&slot);
        epoch
    }

    /// `Loading` of `epoch` becomes `Unauthenticated`; any later epoch is left alone
    fn leave_loading(&self, slot: &mut SessionSlot, epoch: u64) {
        if slot.state == SessionState::Loading && self.current_epoch() == epoch {
            slot.state = SessionState::Unauthenticated;
            slot.session = None;
            self.publish(slot);
        }
    }

    async fn restore(&self) -> SessionResult<Option<Session>> {
        let store = &self.inner.store;
        let (Some(access_token), Some(_), Some(user)) =
            (store.access_token()?, store.refresh_token()?, store.user()?)
        else {
            return Ok(None);
        };

        let claims = token::decode_claims(&access_token)?;

        let access_token = if claims.is_expired(now_secs()) {
            tracing::info!(user_id = %user.id, "Persisted access token expired, refreshing");
            self.refresh().await?;
            store
                .access_token()?
                .ok_or_else(|| SessionError::InvalidToken("refreshed token not persisted".into()))?
        } else {
            access_token
        };
        let refresh_token = store.refresh_token()?.ok_or(SessionError::NoRefreshToken)?;

        let role_id = user.role_id.clone().or(claims.role_id);
        let resolution = RoleResolver::new(self.inner.roles.as_ref(), &access_token)
            .resolve(&user.role, role_id.as_deref())
            .await?;

        Ok(Some(Session {
            access_token,
            refresh_token,
            user,
            role: Some(resolution.role),
            permissions: resolution.permissions,
        }))
    }

    // ========== Login ==========

    /// Sign in.
    ///
    /// Reports success only once role and permissions are resolved. Failures
    /// come back inside the outcome. If the credentials are refused the
    /// current session, if any, is kept; once new tokens are issued the
    /// previous session is over whatever happens next.
    pub async fn login(&self, credentials: &Credentials) -> LoginOutcome {
        let (tokens, user) = match self.authenticate(credentials).await {
            Ok(issued) => issued,
            Err(e) => {
                tracing::warn!(email = %credentials.email, error = %e, "Login rejected");
                let mut slot = self.inner.slot.write().await;
                if slot.state == SessionState::Uninitialized {
                    slot.state = SessionState::Unauthenticated;
                    self.publish(&slot);
                }
                return LoginOutcome::failed(e);
            }
        };

        let result = match self.begin_login(&tokens).await {
            Ok(epoch) => self.complete_login(epoch, tokens, user).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(outcome) => {
                if let Some(user) = &outcome.user {
                    tracing::info!(user_id = %user.id, role = %user.role, "Signed in");
                }
                outcome
            }
            Err(e) => {
                // Tokens may stay for a later refresh, but never a user record
                // without a resolved session behind it
                tracing::warn!(email = %credentials.email, error = %e, "Login failed");
                LoginOutcome::failed(e)
            }
        }
    }

    /// Exchange credentials for tokens and read who they belong to
    async fn authenticate(&self, credentials: &Credentials) -> SessionResult<(TokenPair, UserRecord)> {
        let tokens = self.inner.auth.login(credentials).await?;

        let claims = token::decode_claims(&tokens.access_token)?;
        let user_id = claims
            .user_id
            .ok_or_else(|| SessionError::InvalidToken("missing userId claim".into()))?;
        let role = claims
            .role_name
            .ok_or_else(|| SessionError::InvalidToken("missing roleName claim".into()))?;

        let user = UserRecord {
            id: user_id,
            email: credentials.email.clone(),
            full_name: claims.full_name,
            role,
            role_id: claims.role_id,
            department: None,
            last_login: Some(now_millis()),
        };
        Ok((tokens, user))
    }

    /// End whatever session was live and persist the new token pair
    async fn begin_login(&self, tokens: &TokenPair) -> SessionResult<u64> {
        let (epoch, previous) = {
            let mut slot = self.inner.slot.write().await;
            let epoch = self.advance_epoch();
            self.stop_monitor();
            let previous = slot.session.take().map(|s| s.access_token);
            slot.state = SessionState::Unauthenticated;
            self.publish(&slot);

            self.inner.store.remove_user()?;
            self.inner.store.save_tokens(tokens)?;
            (epoch, previous)
        };

        if let Some(access_token) = previous {
            self.notify_logout(access_token);
        }
        Ok(epoch)
    }

    async fn complete_login(
        &self,
        epoch: u64,
        tokens: TokenPair,
        user: UserRecord,
    ) -> SessionResult<LoginOutcome> {
        let resolution = RoleResolver::new(self.inner.roles.as_ref(), &tokens.access_token)
            .resolve(&user.role, user.role_id.as_deref())
            .await
            .map_err(SessionError::permission_resolution)?;

        let session = Session {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            user,
            role: Some(resolution.role),
            permissions: resolution.permissions,
        };
        let outcome = LoginOutcome::succeeded(&session);
        self.install(session, Some(epoch), true).await?;
        Ok(outcome)
    }

    /// Make `session` the live one, unless the epoch moved on since `expected`
    async fn install(
        &self,
        session: Session,
        expected: Option<u64>,
        persist_user: bool,
    ) -> SessionResult<()> {
        let mut slot = self.inner.slot.write().await;
        if expected.is_some_and(|epoch| epoch != self.current_epoch()) {
            return Err(SessionError::Superseded);
        }
        if persist_user {
            self.inner.store.save_user(&session.user)?;
        }

        let epoch = self.advance_epoch();
        slot.state = SessionState::Authenticated;
        slot.session = Some(session);
        self.publish(&slot);
        self.start_monitor(epoch);
        Ok(())
    }

    // ========== Roles ==========

    /// Resolve `role_name` and install the result on the live session.
    ///
    /// Role and permissions are replaced together; readers never see one
    /// without the other.
    pub async fn resolve_role_and_permissions(
        &self,
        role_name: &str,
        role_id: Option<&str>,
    ) -> SessionResult<RoleResolution> {
        let epoch = self.current_epoch();
        let access_token = match self.access_token().await {
            Some(token) => token,
            None => self
                .inner
                .store
                .access_token()?
                .ok_or_else(|| SessionError::Unauthorized("not signed in".into()))?,
        };

        let resolution = RoleResolver::new(self.inner.roles.as_ref(), &access_token)
            .resolve(role_name, role_id)
            .await?;

        let mut slot = self.inner.slot.write().await;
        if self.current_epoch() != epoch {
            return Err(SessionError::Superseded);
        }
        if let Some(session) = slot.session.as_mut() {
            session.role = Some(resolution.role.clone());
            session.permissions = resolution.permissions.clone();
        }
        self.publish(&slot);

        Ok(resolution)
    }

    // ========== Refresh ==========

    /// Exchange the refresh token for a new pair.
    ///
    /// Concurrent callers share one request and its result. Any failure signs
    /// the session out before it is returned. A refresh overtaken by logout or
    /// a new login changes nothing and reports [`SessionError::Superseded`].
    pub async fn refresh(&self) -> SessionResult<()> {
        let epoch = self.current_epoch();
        let flight = {
            let mut inflight = self
                .inner
                .refresh_inflight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match inflight.as_ref().filter(|f| f.epoch == epoch) {
                Some(flight) => {
                    tracing::debug!("Joining in-flight token refresh");
                    flight.future.clone()
                }
                None => {
                    let this = self.clone();
                    let future = async move {
                        let result = this.refresh_once(epoch).await;
                        let mut inflight = this
                            .inner
                            .refresh_inflight
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner);
                        if inflight.as_ref().is_some_and(|f| f.epoch == epoch) {
                            inflight.take();
                        }
                        result
                    }
                    .boxed()
                    .shared();
                    *inflight = Some(Flight {
                        epoch,
                        future: future.clone(),
                    });
                    future
                }
            }
        };
        flight.await
    }

    async fn refresh_once(&self, epoch: u64) -> SessionResult<()> {
        let result = self.exchange_refresh_token(epoch).await;
        match &result {
            Err(SessionError::Superseded) => {
                tracing::debug!("Token refresh overtaken by a session change, discarded");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed, signing out");
                if let Err(e) = self.sign_out(Some(epoch), true).await {
                    tracing::warn!(error = %e, "Failed to clear session after refresh failure");
                }
            }
            Ok(()) => {}
        }
        result
    }

    async fn exchange_refresh_token(&self, epoch: u64) -> SessionResult<()> {
        let refresh_token = self
            .inner
            .store
            .refresh_token()?
            .ok_or(SessionError::NoRefreshToken)?;

        let issued = self.inner.auth.refresh(&refresh_token).await;

        let mut slot = self.inner.slot.write().await;
        if self.current_epoch() != epoch {
            return Err(SessionError::Superseded);
        }
        let tokens = issued?;
        token::decode_claims(&tokens.access_token)?;
        self.inner.store.save_tokens(&tokens)?;

        if let Some(session) = slot.session.as_mut() {
            session.access_token = tokens.access_token;
            session.refresh_token = tokens.refresh_token;
        }
        tracing::debug!("Access token refreshed");
        Ok(())
    }

    // ========== Logout ==========

    /// Sign out. Idempotent.
    ///
    /// Local state is cleared first; the server is told afterwards from a
    /// detached task whose failure is only logged.
    pub async fn logout(&self) -> SessionResult<()> {
        self.sign_out(None, true).await
    }

    /// Tear the session down, unless the epoch moved on since `expected`
    async fn sign_out(&self, expected: Option<u64>, notify_server: bool) -> SessionResult<()> {
        let (held, cleared) = {
            let mut slot = self.inner.slot.write().await;
            if expected.is_some_and(|epoch| epoch != self.current_epoch()) {
                return Ok(());
            }
            self.advance_epoch();
            self.stop_monitor();

            let held = slot
                .session
                .take()
                .map(|s| s.access_token)
                .or_else(|| self.inner.store.access_token().ok().flatten());
            slot.state = SessionState::Unauthenticated;
            self.publish(&slot);
            (held, self.inner.store.clear())
        };

        if notify_server && let Some(access_token) = held {
            self.notify_logout(access_token);
            tracing::info!("Signed out");
        }
        cleared.map_err(Into::into)
    }

    fn notify_logout(&self, access_token: String) {
        let auth = Arc::clone(&self.inner.auth);
        tokio::spawn(async move {
            if let Err(e) = auth.logout(&access_token).await {
                tracing::debug!(error = %e, "Server logout notification failed");
            }
        });
    }

    // ========== Validation ==========

    /// One validation pass: refresh when the token is unreadable or close to
    /// expiry. Runs on the background interval; callable directly too.
    pub async fn validate(&self) -> ValidationOutcome {
        let access_token = {
            let slot = self.inner.slot.read().await;
            if slot.state != SessionState::Authenticated {
                return ValidationOutcome::Idle;
            }
            match slot.session.as_ref() {
                Some(session) => session.access_token.clone(),
                None => return ValidationOutcome::Idle,
            }
        };

        match token::assess(&access_token, now_secs(), self.inner.config.refresh_threshold) {
            TokenStatus::Valid { expires_in } => ValidationOutcome::Valid { expires_in },
            TokenStatus::RefreshDue { expires_in } => {
                tracing::info!(expires_in, "Access token close to expiry, refreshing");
                self.refresh_for_validation().await
            }
            TokenStatus::Invalid(e) => {
                tracing::warn!(error = %e, "Access token unreadable, refreshing");
                self.refresh_for_validation().await
            }
        }
    }

    async fn refresh_for_validation(&self) -> ValidationOutcome {
        match self.refresh().await {
            Ok(()) => ValidationOutcome::Refreshed,
            Err(SessionError::Superseded) => ValidationOutcome::Idle,
            Err(e) => ValidationOutcome::SignedOut(e),
        }
    }

    fn start_monitor(&self, epoch: u64) {
        let handle = SessionMonitor::spawn(self, epoch);
        let previous = self
            .inner
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.stop();
        }
    }

    fn stop_monitor(&self) {
        let handle = self
            .inner
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.stop();
        }
    }

    /// Deregister the monitor of `epoch` once its task has exited
    fn release_monitor(&self, epoch: u64) {
        let mut monitor = self
            .inner
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if monitor.as_ref().is_some_and(|m| m.epoch() == epoch) {
            monitor.take();
        }
    }

    /// True while the background validation task is running
    pub fn is_monitoring(&self) -> bool {
        self.inner
            .monitor
            .lock()
            .map(|m| m.as_ref().is_some_and(|m| !m.is_finished()))
            .unwrap_or(false)
    }
}

/// Leaves `Loading` if `initialize` is abandoned mid-way
struct LoadingGuard<'a> {
    manager: &'a SessionManager,
    epoch: u64,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let epoch = self.epoch;
        if let Ok(mut slot) = self.manager.inner.slot.try_write() {
            self.manager.leave_loading(&mut slot, epoch);
            return;
        }

        // Lock busy: finish the transition once it is free
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let manager = self.manager.clone();
            runtime.spawn(async move {
                let mut slot = manager.inner.slot.write().await;
                manager.leave_loading(&mut slot, epoch);
            });
        }
    }
}
