//! Credentialed requests with a single-flight token refresh.
//!
//! A `SessionManager` owns the credential pair for one logical session.
//! Authenticated requests carry the current access token; a 401 triggers at
//! most one refresh, shared by every caller that was rejected with the same
//! token, followed by exactly one retry.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::error::GENERIC_FAILURE;
use crate::api::{validate, AccountKind, ApiError, Envelope, OperationResult, SessionRequest, Transport};

use super::{AuthEvent, AuthState, CredentialPair, TokenStore};

/// Upper bound on one refresh round trip.
pub const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 15;

const LOGIN_FAILED: &str = "Login failed.";
const OTP_VERIFICATION_FAILED: &str = "OTP verification failed.";

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub account: AccountKind,
    pub refresh_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            account: AccountKind::User,
            refresh_timeout: Duration::from_secs(DEFAULT_REFRESH_TIMEOUT_SECS),
        }
    }
}

impl SessionOptions {
    pub fn for_account(account: AccountKind) -> Self {
        Self {
            account,
            ..Self::default()
        }
    }
}

type RefreshOutcome = Result<(), ApiError>;
type PendingRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// The live credentials. `epoch` changes on every login and logout so a
/// refresh started in one session cannot install tokens into the next.
#[derive(Default)]
struct Slot {
    pair: Option<CredentialPair>,
    epoch: u64,
    /// Epoch and refresh token of the last refresh that failed. A 401 that
    /// lands after that refresh finished must not try the same token again.
    failed_refresh: Option<(u64, String)>,
}

impl Slot {
    fn refresh_already_failed(&self) -> bool {
        match (self.failed_refresh.as_ref(), self.pair.as_ref()) {
            (Some((epoch, token)), Some(pair)) => *epoch == self.epoch && *token == pair.refresh_token,
            _ => false,
        }
    }
}

struct Inner {
    transport: Arc<dyn Transport>,
    store: Arc<dyn TokenStore>,
    options: SessionOptions,
    credentials: RwLock<Slot>,
    pending: Mutex<Option<PendingRefresh>>,
    state: watch::Sender<AuthState>,
}

/// Session manager for one account. Clone is cheap and every clone shares
/// the same credentials and in-flight refresh.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Create a manager, restoring any credentials the store already holds.
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn TokenStore>, options: SessionOptions) -> Self {
        let pair = match store.load() {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "Failed to load stored credentials, starting signed out");
                None
            }
        };
        debug!(restored = pair.is_some(), account = %options.account, "Session manager created");

        let initial = if pair.is_some() {
            AuthState::restored()
        } else {
            AuthState::default()
        };
        let (state, _) = watch::channel(initial);

        Self {
            inner: Arc::new(Inner {
                transport,
                store,
                options,
                credentials: RwLock::new(Slot {
                    pair,
                    ..Slot::default()
                }),
                pending: Mutex::new(None),
                state,
            }),
        }
    }

    pub fn account(&self) -> AccountKind {
        self.inner.options.account
    }

    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_slot().pair.is_some()
    }

    pub fn credentials(&self) -> Option<CredentialPair> {
        self.read_slot().pair.clone()
    }

    pub(crate) fn publish(&self, event: AuthEvent) {
        self.inner.state.send_modify(|state| *state = state.apply(event));
    }

    // ===== Request issuing =====

    /// Send once. No refresh on 401.
    pub async fn issue(&self, request: &SessionRequest) -> OperationResult<Envelope> {
        Self::envelope_result(self.execute(request).await)
    }

    /// Send, and on 401 refresh once and retry once.
    pub async fn issue_with_refresh(&self, request: &SessionRequest) -> OperationResult<Envelope> {
        Self::envelope_result(self.execute_with_refresh(request).await)
    }

    fn envelope_result(result: Result<Envelope, ApiError>) -> OperationResult<Envelope> {
        Self::envelope_result_or(result, GENERIC_FAILURE)
    }

    /// Success carries the server's message; failure the error's message,
    /// or `fallback` when it has none.
    pub(crate) fn envelope_result_or(result: Result<Envelope, ApiError>, fallback: &str) -> OperationResult<Envelope> {
        match result {
            Ok(envelope) => {
                let message = envelope.message.clone();
                OperationResult::ok(envelope).with_message(message)
            }
            Err(err) => OperationResult::failure(err.user_message(fallback)),
        }
    }

    pub(crate) async fn execute(&self, request: &SessionRequest) -> Result<Envelope, ApiError> {
        let token = self.token_for(request);
        self.send(request, token).await
    }

    pub(crate) async fn execute_with_refresh(&self, request: &SessionRequest) -> Result<Envelope, ApiError> {
        let token = self.token_for(request);
        match self.send(request, token.clone()).await {
            Err(err) if request.requires_auth && err.is_auth_expired() => {
                debug!(path = %request.path, "Access token rejected");
            }
            other => return other,
        }

        if let Err(e) = self.refresh_after_rejection(token.as_deref()).await {
            warn!(path = %request.path, error = %e, "Session refresh failed");
            self.publish(AuthEvent::SessionExpired);
            return Err(ApiError::SessionExpired);
        }

        match self.execute(request).await {
            Err(err) if err.is_auth_expired() => {
                warn!(path = %request.path, "Refreshed token rejected");
                self.publish(AuthEvent::SessionExpired);
                Err(ApiError::SessionExpired)
            }
            other => other,
        }
    }

    fn token_for(&self, request: &SessionRequest) -> Option<String> {
        if request.requires_auth {
            self.read_slot().pair.as_ref().map(|p| p.access_token.clone())
        } else {
            None
        }
    }

    async fn send(&self, request: &SessionRequest, access_token: Option<String>) -> Result<Envelope, ApiError> {
        let response = self.inner.transport.send(request.to_http(access_token, None)).await?;
        Envelope::from_response(response)
    }

    // ===== Refresh =====

    /// Renew the access token. Joins a refresh already in flight.
    pub async fn refresh(&self) -> OperationResult<()> {
        let pending = {
            let mut pending = self.lock_pending();
            pending.get_or_insert_with(|| self.start_refresh()).clone()
        };
        match pending.await {
            Ok(()) => OperationResult::ok(()),
            Err(e) => OperationResult::failure(e.user_message(GENERIC_FAILURE)),
        }
    }

    /// Refresh after `rejected` was refused. Waits on an in-flight refresh
    /// if there is one, and skips refreshing when the token has already
    /// been replaced since the rejected request was sent. Fails without a
    /// request when a refresh with the current refresh token already failed.
    async fn refresh_after_rejection(&self, rejected: Option<&str>) -> RefreshOutcome {
        let pending = {
            let mut pending = self.lock_pending();
            match pending.as_ref() {
                Some(inflight) => inflight.clone(),
                None => {
                    {
                        let slot = self.read_slot();
                        let current = slot.pair.as_ref().map(|p| p.access_token.as_str());
                        if current != rejected {
                            debug!("Access token already replaced, retrying without refresh");
                            return Ok(());
                        }
                        if slot.refresh_already_failed() {
                            debug!("Refresh token already rejected, not refreshing again");
                            return Err(ApiError::SessionExpired);
                        }
                    }
                    let inflight = self.start_refresh();
                    *pending = Some(inflight.clone());
                    inflight
                }
            }
        };
        pending.await
    }

    fn start_refresh(&self) -> PendingRefresh {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        async move {
            let Some(inner) = weak.upgrade() else {
                return Err(ApiError::SessionExpired);
            };
            let manager = SessionManager { inner };
            let outcome = manager.run_refresh().await;
            manager.lock_pending().take();
            if outcome.is_ok() {
                manager.publish(AuthEvent::Refreshed);
            }
            outcome
        }
        .boxed()
        .shared()
    }

    async fn run_refresh(&self) -> RefreshOutcome {
        let (refresh_token, epoch) = {
            let slot = self.read_slot();
            match slot.pair.as_ref() {
                Some(pair) => (pair.refresh_token.clone(), slot.epoch),
                None => {
                    debug!("No refresh token stored");
                    return Err(ApiError::SessionExpired);
                }
            }
        };

        let outcome = self.exchange_refresh_token(&refresh_token, epoch).await;
        if outcome.is_err() {
            self.record_failed_refresh(epoch, refresh_token);
        }
        outcome
    }

    async fn exchange_refresh_token(&self, refresh_token: &str, epoch: u64) -> RefreshOutcome {
        let request = SessionRequest::post(
            self.inner.options.account.endpoint("refresh-token"),
            json!({ "refreshToken": refresh_token }),
        );
        let send = self
            .inner
            .transport
            .send(request.to_http(None, Some(refresh_token.to_string())));
        let response = tokio::time::timeout(self.inner.options.refresh_timeout, send)
            .await
            .map_err(|_| ApiError::Transport("Token refresh timed out".into()))??;

        let envelope = Envelope::from_response(response)?;
        let access = envelope
            .string_field("accessToken")
            .ok_or_else(|| ApiError::InvalidResponse("refresh response is missing accessToken".into()))?;
        // Servers that rotate refresh tokens send the new one back.
        let refresh = envelope
            .string_field("refreshToken")
            .unwrap_or_else(|| refresh_token.to_string());
        let pair = CredentialPair::new(access, refresh);

        let mut slot = self.write_slot();
        if slot.epoch != epoch {
            debug!("Session changed during refresh, discarding new tokens");
            return Err(ApiError::SessionExpired);
        }
        self.inner
            .store
            .save(&pair)
            .map_err(|e| ApiError::Storage(e.to_string()))?;
        slot.pair = Some(pair);
        slot.failed_refresh = None;
        info!(account = %self.inner.options.account, "Access token refreshed");
        Ok(())
    }

    fn record_failed_refresh(&self, epoch: u64, refresh_token: String) {
        let mut slot = self.write_slot();
        if slot.epoch == epoch {
            slot.failed_refresh = Some((epoch, refresh_token));
        }
    }

    // ===== Login / logout =====

    /// Log in and install a fresh credential pair.
    pub async fn login(&self, email: &str, password: &str) -> OperationResult<Envelope> {
        self.publish(AuthEvent::Requested);
        let result = self.login_inner(email, password).await;
        match result {
            Ok(ref envelope) => {
                info!(account = %self.account(), "Logged in");
                self.publish(AuthEvent::LoggedIn {
                    user: envelope.field("user").cloned(),
                });
            }
            Err(ref e) => self.publish(AuthEvent::Failed {
                message: e.user_message(LOGIN_FAILED),
            }),
        }
        Self::envelope_result_or(result, LOGIN_FAILED)
    }

    async fn login_inner(&self, email: &str, password: &str) -> Result<Envelope, ApiError> {
        validate::email(email)?;
        validate::password(password)?;
        let request = SessionRequest::post(
            self.inner.options.account.endpoint("login"),
            json!({ "email": email, "password": password }),
        );
        self.establish(&request).await
    }

    /// Verify an emailed OTP; the server answers with a credential pair.
    pub async fn verify_otp(&self, email: &str, otp: &str) -> OperationResult<Envelope> {
        self.publish(AuthEvent::Requested);
        let result = self.verify_otp_inner(email, otp).await;
        match result {
            Ok(ref envelope) => {
                info!(account = %self.account(), "OTP verified");
                self.publish(AuthEvent::OtpVerified {
                    message: envelope.message.clone(),
                });
            }
            Err(ref e) => self.publish(AuthEvent::Failed {
                message: e.user_message(OTP_VERIFICATION_FAILED),
            }),
        }
        Self::envelope_result_or(result, OTP_VERIFICATION_FAILED)
    }

    async fn verify_otp_inner(&self, email: &str, otp: &str) -> Result<Envelope, ApiError> {
        validate::email(email)?;
        validate::otp(otp)?;
        let request = SessionRequest::post(
            self.inner.options.account.endpoint("verify-otp"),
            json!({ "email": email, "otp": otp }),
        );
        self.establish(&request).await
    }

    async fn establish(&self, request: &SessionRequest) -> Result<Envelope, ApiError> {
        let envelope = self.execute(request).await?;
        let pair = CredentialPair::from_envelope(&envelope)?;
        self.replace_session(pair)?;
        Ok(envelope)
    }

    /// Overwrite the stored pair and start a new epoch.
    fn replace_session(&self, pair: CredentialPair) -> Result<(), ApiError> {
        let mut slot = self.write_slot();
        self.inner
            .store
            .save(&pair)
            .map_err(|e| ApiError::Storage(e.to_string()))?;
        slot.pair = Some(pair);
        slot.epoch += 1;
        slot.failed_refresh = None;
        Ok(())
    }

    /// Drop both tokens. Never fails; store errors are logged.
    pub fn logout(&self) {
        {
            let mut slot = self.write_slot();
            if let Err(e) = self.inner.store.clear() {
                warn!(error = %e, "Failed to clear stored credentials");
            }
            slot.pair = None;
            slot.epoch += 1;
            slot.failed_refresh = None;
        }
        info!(account = %self.account(), "Logged out");
        self.publish(AuthEvent::LoggedOut);
    }

    // ===== Locks =====

    fn read_slot(&self) -> RwLockReadGuard<'_, Slot> {
        self.inner.credentials.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slot(&self) -> RwLockWriteGuard<'_, Slot> {
        self.inner.credentials.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pending(&self) -> MutexGuard<'_, Option<PendingRefresh>> {
        self.inner.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
