//! Session store: who is signed in, and the token lifecycle.
//!
//! # Phases
//!
//! ```text
//! Uninitialized ──initialize()──▶ Initializing ──┬──▶ Authenticated
//!                                                 └──▶ Anonymous
//! Anonymous ──login()/register()──▶ Authenticated ──logout()──▶ Anonymous
//! ```
//!
//! `Initializing` resolves exactly once. If the user logs in or out while the
//! startup validation is still in flight, that explicit action wins and the
//! validation result is dropped. A login or logout before `initialize()` is
//! treated the same way: the session passes through `Initializing`, which the
//! explicit action resolves, and a later `initialize()` does nothing.
//!
//! The credential slot is only written while the state cell is locked, so
//! the persisted token and the published phase never disagree.
//!
//! The cart and wishlist stores observe sign-in/sign-out through
//! [`SessionListener`]; they are called synchronously from the transition, so
//! a sign-out has cleared both stores by the time `logout()` returns.

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use thiserror::Error;
use tokio::sync::watch;

use cartwheel_core::{Email, ProfilePatch, User, UserId};

use crate::api::{ApiClient, ApiError, AuthGrant, LoginRequest, Registration, ShopApi};
use crate::credentials::{CredentialError, CredentialStore};
use crate::sync::lock;

const LOGIN_FAILED: &str = "Invalid email or password";
const REGISTER_FAILED: &str = "Registration failed. Please try again.";
const REGISTER_SUCCEEDED: &str = "Account created successfully";
const SESSION_NOT_SAVED: &str = "Could not save your session. Please try again.";

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    Uninitialized,
    Initializing,
    Authenticated,
    Anonymous,
}

/// Point-in-time view of the session, as published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub user: Option<User>,
}

impl SessionSnapshot {
    const fn new() -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            user: None,
        }
    }

    /// `true` iff a user is signed in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// `true` until the startup session check has resolved.
    #[must_use]
    pub const fn initializing(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Uninitialized | SessionPhase::Initializing
        )
    }
}

/// A successful login or registration.
#[derive(Debug, Clone)]
pub struct AuthSuccess {
    pub user: User,
    /// Message to show the user.
    pub message: String,
}

/// A failed login or registration. The session is left untouched.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Input was rejected before anything was sent.
    #[error("{0}")]
    Invalid(String),

    /// The backend rejected the request or could not be reached.
    #[error("{message}")]
    Failed {
        message: String,
        #[source]
        source: ApiError,
    },

    /// The issued token could not be persisted.
    #[error("{message}")]
    Credential {
        message: String,
        #[source]
        source: CredentialError,
    },
}

impl AuthError {
    /// Human-readable message for the login/register form.
    #[must_use]
    pub fn user_message(&self) -> &str {
        match self {
            Self::Invalid(message)
            | Self::Failed { message, .. }
            | Self::Credential { message, .. } => message,
        }
    }

    fn failed(source: ApiError, default: &str) -> Self {
        let message = source.server_message().unwrap_or(default).to_string();
        Self::Failed { message, source }
    }
}

/// Observer of authentication transitions.
pub(crate) trait SessionListener: Send + Sync {
    /// Called after the session signed in (or switched user) with `true`,
    /// or signed out with `false`.
    fn session_changed(self: Arc<Self>, authenticated: bool);
}

/// Owns the current user and the persisted credential.
///
/// Cheap to clone; clones share state.
pub struct SessionStore<A = ApiClient> {
    inner: Arc<SessionInner<A>>,
}

struct SessionInner<A> {
    api: Arc<A>,
    credentials: Arc<dyn CredentialStore>,
    state: watch::Sender<SessionSnapshot>,
    login_prompt: AtomicBool,
    listeners: Mutex<Vec<Weak<dyn SessionListener>>>,
}

impl<A> Clone for SessionStore<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: ShopApi> SessionStore<A> {
    #[must_use]
    pub fn new(api: Arc<A>, credentials: Arc<dyn CredentialStore>) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::new());
        Self {
            inner: Arc::new(SessionInner {
                api,
                credentials,
                state,
                login_prompt: AtomicBool::new(false),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    // =========================================================================
    // Readers
    // =========================================================================

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.inner.state.borrow().phase
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.inner.state.borrow().user.clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    #[must_use]
    pub fn is_initializing(&self) -> bool {
        self.inner.state.borrow().initializing()
    }

    /// Receive every subsequent session change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Validate the persisted credential, once per process.
    ///
    /// Never fails: any problem (unreadable credential, rejected token,
    /// network error) degrades to an anonymous session and purges the token.
    pub async fn initialize(&self) {
        let started = self.inner.state.send_if_modified(|s| {
            if s.phase == SessionPhase::Uninitialized {
                s.phase = SessionPhase::Initializing;
                true
            } else {
                false
            }
        });
        if !started {
            return;
        }

        let token = match self.inner.credentials.load() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "could not read persisted credential");
                None
            }
        };

        if token.is_none() {
            self.resolve_initialization(None);
            return;
        }

        match self.inner.api.current_user().await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "restored session");
                self.resolve_initialization(Some(user));
            }
            Err(e) => {
                tracing::warn!(error = %e, "session validation failed; signing out");
                self.resolve_initialization(None);
            }
        }
    }

    fn resolve_initialization(&self, user: Option<User>) {
        let mut signed_in = false;
        self.inner.state.send_if_modified(|s| {
            if s.phase != SessionPhase::Initializing {
                // An explicit login/logout already settled the session.
                return false;
            }
            match user {
                Some(user) => {
                    s.phase = SessionPhase::Authenticated;
                    s.user = Some(user);
                    signed_in = true;
                }
                None => {
                    if let Err(e) = self.inner.credentials.clear() {
                        tracing::warn!(error = %e, "could not purge rejected credential");
                    }
                    s.phase = SessionPhase::Anonymous;
                    s.user = None;
                }
            }
            true
        });

        if signed_in {
            self.notify_listeners(true);
        }
    }

    /// Create an account and sign in with it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] with a user-facing message if validation fails,
    /// the backend rejects the registration, or the token cannot be saved.
    pub async fn register(&self, registration: Registration) -> Result<AuthSuccess, AuthError> {
        let email = validate_email(&registration.email)?;
        if registration.name.trim().is_empty() {
            return Err(AuthError::Invalid("Please enter your name".to_string()));
        }
        validate_password(&registration.password)?;

        let registration = Registration {
            email: email.into_inner(),
            ..registration
        };

        let grant = self
            .inner
            .api
            .register(&registration)
            .await
            .map_err(|e| AuthError::failed(e, REGISTER_FAILED))?;

        let user = self.start_session(grant)?;
        Ok(AuthSuccess {
            user,
            message: REGISTER_SUCCEEDED.to_string(),
        })
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] with a user-facing message if validation fails,
    /// the backend rejects the credentials, or the token cannot be saved.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSuccess, AuthError> {
        let email = validate_email(email)?;
        validate_password(password)?;

        let request = LoginRequest {
            email: email.into_inner(),
            password: password.to_owned(),
        };

        let grant = self
            .inner
            .api
            .login(&request)
            .await
            .map_err(|e| AuthError::failed(e, LOGIN_FAILED))?;

        let user = self.start_session(grant)?;
        let message = format!("Welcome back, {}!", user.display_name());
        Ok(AuthSuccess { user, message })
    }

    fn start_session(&self, grant: AuthGrant) -> Result<User, AuthError> {
        let AuthGrant { token, user } = grant;
        self.transition(SessionPhase::Authenticated, Some(user.clone()), |credentials| {
            credentials.save(&token)
        })
        .map_err(|source| AuthError::Credential {
            message: SESSION_NOT_SAVED.to_string(),
            source,
        })?;

        tracing::info!(user_id = %user.id, "signed in");
        self.close_login_prompt();
        Ok(user)
    }

    /// Sign out locally. No network call; safe to repeat.
    pub fn logout(&self) {
        let Ok(()) = self.transition::<Infallible>(SessionPhase::Anonymous, None, |credentials| {
            if let Err(e) = credentials.clear() {
                tracing::warn!(error = %e, "could not delete persisted credential");
            }
            Ok(())
        });
    }

    /// Merge `patch` into the signed-in user. Display state only; nothing is
    /// sent to the backend.
    pub fn update_profile(&self, patch: ProfilePatch) {
        self.inner.state.send_if_modified(|s| match s.user.as_mut() {
            Some(user) => {
                user.apply(patch);
                true
            }
            None => false,
        });
    }

    /// Move to `phase`, running `persist` against the credential slot under
    /// the same lock. The phase is left as it was if `persist` fails.
    fn transition<E>(
        &self,
        phase: SessionPhase,
        user: Option<User>,
        persist: impl FnOnce(&dyn CredentialStore) -> Result<(), E>,
    ) -> Result<(), E> {
        // Not yet initialized: pass through Initializing, which this
        // transition then resolves.
        let passed_through = self.inner.state.send_if_modified(|s| {
            if s.phase == SessionPhase::Uninitialized {
                s.phase = SessionPhase::Initializing;
                true
            } else {
                false
            }
        });

        let mut persisted = Ok(());
        let mut previous: Option<UserId> = None;
        let next: Option<UserId> = user.as_ref().map(|u| u.id.clone());

        self.inner.state.send_if_modified(|s| {
            if let Err(e) = persist(self.inner.credentials.as_ref()) {
                persisted = Err(e);
                if passed_through && s.phase == SessionPhase::Initializing {
                    s.phase = SessionPhase::Uninitialized;
                    return true;
                }
                return false;
            }
            previous = s.user.as_ref().map(|u| u.id.clone());
            let changed = s.phase != phase || s.user != user;
            s.phase = phase;
            s.user = user;
            changed
        });
        persisted?;

        match (previous, next) {
            (None, None) => {}
            (Some(_), None) => self.notify_listeners(false),
            (None, Some(_)) => self.notify_listeners(true),
            (Some(before), Some(after)) if before != after => self.notify_listeners(true),
            (Some(_), Some(_)) => {}
        }
        Ok(())
    }

    // =========================================================================
    // Login prompt
    // =========================================================================

    #[must_use]
    pub fn show_login_prompt(&self) -> bool {
        self.inner.login_prompt.load(Ordering::Acquire)
    }

    pub fn open_login_prompt(&self) {
        self.inner.login_prompt.store(true, Ordering::Release);
    }

    pub fn close_login_prompt(&self) {
        self.inner.login_prompt.store(false, Ordering::Release);
    }

    /// `true` if signed in; otherwise opens the login prompt and returns
    /// `false`.
    pub fn require_auth(&self) -> bool {
        if self.is_authenticated() {
            return true;
        }
        self.open_login_prompt();
        false
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    pub(crate) fn add_listener(&self, listener: Weak<dyn SessionListener>) {
        lock(&self.inner.listeners).push(listener);
    }

    fn notify_listeners(&self, authenticated: bool) {
        let live: Vec<Arc<dyn SessionListener>> = {
            let mut listeners = lock(&self.inner.listeners);
            listeners.retain(|l| l.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in live {
            listener.session_changed(authenticated);
        }
    }
}

fn validate_email(email: &str) -> Result<Email, AuthError> {
    Email::parse(email).map_err(|_| AuthError::Invalid("Please enter a valid email address".to_string()))
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.is_empty() {
        return Err(AuthError::Invalid("Please enter your password".to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::credentials::{AuthToken, MemoryCredentialStore};
    use crate::test_support::{FakeApi, registration};

    fn store(api: &Arc<FakeApi>) -> SessionStore<FakeApi> {
        SessionStore::new(Arc::clone(api), api.credentials())
    }

    #[tokio::test]
    async fn test_initialize_without_token_skips_network() {
        let api = Arc::new(FakeApi::new());
        let session = store(&api);
        assert!(session.is_initializing());

        session.initialize().await;

        assert_eq!(session.phase(), SessionPhase::Anonymous);
        assert!(!session.is_initializing());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_initialize_restores_valid_token() {
        let api = Arc::new(FakeApi::new());
        api.sign_in_as("asha@example.com");
        let session = store(&api);

        session.initialize().await;

        assert_eq!(session.phase(), SessionPhase::Authenticated);
        assert_eq!(session.user().unwrap().email, "asha@example.com");
        assert_eq!(api.calls(), ["GET /auth/me"]);
    }

    #[tokio::test]
    async fn test_initialize_purges_rejected_token() {
        let api = Arc::new(FakeApi::new());
        api.credentials().save(&AuthToken::new("stale")).unwrap();
        let session = store(&api);

        session.initialize().await;

        assert_eq!(session.phase(), SessionPhase::Anonymous);
        assert!(session.user().is_none());
        assert!(api.credentials().load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_initialize_runs_once() {
        let api = Arc::new(FakeApi::new());
        api.sign_in_as("asha@example.com");
        let session = store(&api);

        session.initialize().await;
        session.initialize().await;

        assert_eq!(api.calls(), ["GET /auth/me"]);
    }

    #[tokio::test]
    async fn test_login_success_persists_token() {
        let api = Arc::new(FakeApi::new());
        let session = store(&api);
        session.open_login_prompt();

        let success = session.login("asha@example.com", "hunter22").await.unwrap();

        assert_eq!(success.message, "Welcome back, Asha!");
        assert!(session.is_authenticated());
        assert!(!session.show_login_prompt());
        assert!(api.credentials().load().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_login_failure_leaves_state_untouched() {
        let api = Arc::new(FakeApi::new());
        let session = store(&api);
        session.initialize().await;

        let err = session.login("asha@example.com", "wrong").await.unwrap_err();

        assert_eq!(err.user_message(), "Invalid email or password");
        assert!(!session.is_authenticated());
        assert!(api.credentials().load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_validates_before_network() {
        let api = Arc::new(FakeApi::new());
        let session = store(&api);

        let err = session.login("not-an-email", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::Invalid(_)));

        let err = session.login("asha@example.com", "").await.unwrap_err();
        assert!(matches!(err, AuthError::Invalid(_)));

        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_login_failure_uses_default_without_server_message() {
        let api = Arc::new(FakeApi::new());
        api.fail("login");
        let session = store(&api);

        let err = session.login("asha@example.com", "hunter22").await.unwrap_err();
        assert_eq!(err.user_message(), "Invalid email or password");
    }

    #[tokio::test]
    async fn test_register_success_and_duplicate() {
        let api = Arc::new(FakeApi::new());
        let session = store(&api);

        let success = session
            .register(registration("Ravi", "ravi@example.com"))
            .await
            .unwrap();
        assert_eq!(success.message, "Account created successfully");
        assert_eq!(session.user().unwrap().name, "Ravi");

        session.logout();
        let err = session
            .register(registration("Ravi", "ravi@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "User already exists");
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_is_idempotent_and_offline() {
        let api = Arc::new(FakeApi::new());
        let session = store(&api);
        session.initialize().await;

        session.logout();
        session.logout();

        assert_eq!(session.phase(), SessionPhase::Anonymous);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_logout_clears_credential() {
        let api = Arc::new(FakeApi::new());
        let session = store(&api);
        session.login("asha@example.com", "hunter22").await.unwrap();

        session.logout();

        assert!(!session.is_authenticated());
        assert!(api.credentials().load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_during_initialization_wins() {
        let api = Arc::new(FakeApi::new());
        api.credentials().save(&AuthToken::new("stale")).unwrap();
        let session = store(&api);

        // Mark initialization started, then log in before it resolves.
        session.inner.state.send_modify(|s| s.phase = SessionPhase::Initializing);
        session.login("asha@example.com", "hunter22").await.unwrap();
        session.resolve_initialization(None);

        assert!(session.is_authenticated());
        assert!(api.credentials().load().unwrap().is_some());
    }

    /// Signals when a save has started, then holds the slot for a while so
    /// another thread can try to resolve startup validation mid-save.
    struct SlowSave {
        inner: MemoryCredentialStore,
        started: Mutex<Option<std::sync::mpsc::Sender<()>>>,
    }

    impl CredentialStore for SlowSave {
        fn load(&self) -> Result<Option<AuthToken>, CredentialError> {
            self.inner.load()
        }

        fn save(&self, token: &AuthToken) -> Result<(), CredentialError> {
            self.inner.save(token)?;
            if let Some(started) = lock(&self.started).take() {
                let _ = started.send(());
            }
            std::thread::sleep(Duration::from_millis(50));
            Ok(())
        }

        fn clear(&self) -> Result<(), CredentialError> {
            self.inner.clear()
        }
    }

    #[tokio::test]
    async fn test_validation_resolving_during_login_keeps_fresh_token() {
        let api = Arc::new(FakeApi::new());
        let (tx, rx) = std::sync::mpsc::channel();
        let slot = Arc::new(SlowSave {
            inner: MemoryCredentialStore::with_token("stale"),
            started: Mutex::new(Some(tx)),
        });
        let session = SessionStore::new(Arc::clone(&api), Arc::clone(&slot) as Arc<dyn CredentialStore>);
        session.inner.state.send_modify(|s| s.phase = SessionPhase::Initializing);

        let resolver = {
            let session = session.clone();
            std::thread::spawn(move || {
                rx.recv().unwrap();
                session.resolve_initialization(None);
            })
        };
        session.login("asha@example.com", "hunter22").await.unwrap();
        resolver.join().unwrap();

        assert!(session.is_authenticated());
        assert_eq!(slot.load().unwrap().unwrap().expose(), "tok-u1");
    }

    #[tokio::test]
    async fn test_login_before_initialize_resolves_initializing() {
        let api = Arc::new(FakeApi::new());
        let session = store(&api);
        let mut rx = session.subscribe();

        session.login("asha@example.com", "hunter22").await.unwrap();
        session.initialize().await;

        assert_eq!(session.phase(), SessionPhase::Authenticated);
        assert!(!session.is_initializing());
        assert!(rx.borrow_and_update().is_authenticated());
        assert!(!api.calls().contains(&"GET /auth/me".to_string()));
    }

    #[tokio::test]
    async fn test_logout_before_initialize_resolves_initializing() {
        let api = Arc::new(FakeApi::new());
        api.sign_in_as("asha@example.com");
        let session = store(&api);

        session.logout();
        session.initialize().await;

        assert_eq!(session.phase(), SessionPhase::Anonymous);
        assert!(api.credentials().load().unwrap().is_none());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_save_before_initialize_leaves_uninitialized() {
        struct Broken;

        impl CredentialStore for Broken {
            fn load(&self) -> Result<Option<AuthToken>, CredentialError> {
                Ok(None)
            }

            fn save(&self, _token: &AuthToken) -> Result<(), CredentialError> {
                Err(CredentialError::Empty)
            }

            fn clear(&self) -> Result<(), CredentialError> {
                Ok(())
            }
        }

        let api = Arc::new(FakeApi::new());
        let session = SessionStore::new(Arc::clone(&api), Arc::new(Broken) as Arc<dyn CredentialStore>);

        let err = session.login("asha@example.com", "hunter22").await.unwrap_err();

        assert!(matches!(err, AuthError::Credential { .. }));
        assert_eq!(session.phase(), SessionPhase::Uninitialized);
        session.initialize().await;
        assert_eq!(session.phase(), SessionPhase::Anonymous);
    }

    #[tokio::test]
    async fn test_update_profile_is_local() {
        let api = Arc::new(FakeApi::new());
        let session = store(&api);
        session.login("asha@example.com", "hunter22").await.unwrap();
        let calls_before = api.calls().len();

        session.update_profile(ProfilePatch {
            name: Some("Asha R".to_string()),
            ..ProfilePatch::default()
        });

        assert_eq!(session.user().unwrap().name, "Asha R");
        assert_eq!(api.calls().len(), calls_before);
    }

    #[tokio::test]
    async fn test_update_profile_when_signed_out_is_noop() {
        let api = Arc::new(FakeApi::new());
        let session = store(&api);
        session.update_profile(ProfilePatch {
            name: Some("Nobody".to_string()),
            ..ProfilePatch::default()
        });
        assert!(session.user().is_none());
    }

    #[tokio::test]
    async fn test_require_auth_opens_prompt() {
        let api = Arc::new(FakeApi::new());
        let session = store(&api);

        assert!(!session.require_auth());
        assert!(session.show_login_prompt());

        session.close_login_prompt();
        session.login("asha@example.com", "hunter22").await.unwrap();
        assert!(session.require_auth());
        assert!(!session.show_login_prompt());
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let api = Arc::new(FakeApi::new());
        let session = store(&api);
        let mut rx = session.subscribe();

        session.login("asha@example.com", "hunter22").await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_authenticated());

        session.logout();
        assert!(!rx.borrow_and_update().is_authenticated());
    }
}
