use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use crate::db::models::{AuthUser, Session};

/// Kinds of auth-state transitions, mirroring the events the hosted auth
/// service emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

type Observer = Arc<dyn Fn(Option<&AuthUser>, AuthEvent) + Send + Sync>;

struct StoreInner {
    session: RwLock<Option<Session>>,
    observers: Mutex<Vec<(u64, Observer)>>,
    next_observer_id: AtomicU64,
    // Serializes the mutate-then-notify sequence so a second event cannot
    // interleave mid-fan-out.
    fanout: Mutex<()>,
}

/// Single source of truth for the current session, with observer fan-out.
///
/// The store holds one session slot, mutated only through event dispatch,
/// and an ordered registry of observers. Every dispatch writes the new state
/// first and then notifies all observers registered at that moment against
/// that same snapshot, in registration order. Handles are cheap to clone and
/// share one inner state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                session: RwLock::new(None),
                observers: Mutex::new(Vec::new()),
                next_observer_id: AtomicU64::new(0),
                fanout: Mutex::new(()),
            }),
        }
    }

    /// Registers an observer for auth-state transitions.
    ///
    /// The observer is invoked once with `AuthEvent::InitialSession` and the
    /// state at call time, synchronously, before this method returns, so a
    /// late-joining consumer never starts stale. Dropping the returned
    /// [`Subscription`] does not unregister the observer; call
    /// [`Subscription::unsubscribe`] for that.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(Option<&AuthUser>, AuthEvent) + Send + Sync + 'static,
    {
        let observer: Observer = Arc::new(observer);
        let id = self.inner.next_observer_id.fetch_add(1, Ordering::Relaxed);

        self.inner
            .observers
            .lock()
            .expect("observer registry lock poisoned")
            .push((id, observer.clone()));

        let user = self.current_user();
        invoke(id, &observer, user.as_ref(), AuthEvent::InitialSession);

        log::debug!("Registered auth observer {}", id);

        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Latest known user, without blocking on any in-flight work. Returns
    /// `None` both before the first notification and after sign-out.
    pub fn current_user(&self) -> Option<AuthUser> {
        self.inner
            .session
            .read()
            .expect("session slot lock poisoned")
            .as_ref()
            .map(|s| s.user.clone())
    }

    /// Full session envelope, including the tokens that authorize data API
    /// calls.
    pub fn current_session(&self) -> Option<Session> {
        self.inner
            .session
            .read()
            .expect("session slot lock poisoned")
            .clone()
    }

    pub(crate) fn access_token(&self) -> Option<String> {
        self.inner
            .session
            .read()
            .expect("session slot lock poisoned")
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    pub fn observer_count(&self) -> usize {
        self.inner
            .observers
            .lock()
            .expect("observer registry lock poisoned")
            .len()
    }

    /// Applies a provider event: stores the new session, then notifies every
    /// observer registered at this moment, in registration order, with the
    /// state just written. Driven by the auth client; not a public surface.
    pub(crate) fn dispatch(&self, event: AuthEvent, session: Option<Session>) {
        let _serialized = self
            .inner
            .fanout
            .lock()
            .expect("fan-out lock poisoned");

        let user = session.as_ref().map(|s| s.user.clone());
        *self
            .inner
            .session
            .write()
            .expect("session slot lock poisoned") = session;

        // Snapshot the registry so observers may subscribe or unsubscribe
        // during fan-out; such changes take effect from the next event.
        let observers: Vec<(u64, Observer)> = self
            .inner
            .observers
            .lock()
            .expect("observer registry lock poisoned")
            .clone();

        log::debug!(
            "Auth event {:?} fanned out to {} observers",
            event,
            observers.len()
        );

        for (id, observer) in observers {
            invoke(id, &observer, user.as_ref(), event);
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

// A panicking observer must not take down the dispatcher or starve the
// observers after it.
fn invoke(id: u64, observer: &Observer, user: Option<&AuthUser>, event: AuthEvent) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| observer(user, event)));
    if outcome.is_err() {
        log::error!("Auth observer {} panicked during {:?} notification", id, event);
    }
}

/// Removal handle returned by [`SessionStore::subscribe`].
pub struct Subscription {
    id: u64,
    inner: Weak<StoreInner>,
}

impl Subscription {
    /// Removes the observer from future notifications. Idempotent: calling
    /// it again, or after the store is gone, is a no-op.
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.inner.upgrade() {
            let mut observers = inner
                .observers
                .lock()
                .expect("observer registry lock poisoned");
            let before = observers.len();
            observers.retain(|(id, _)| *id != self.id);
            if observers.len() < before {
                log::debug!("Removed auth observer {}", self.id);
            }
        }
    }
}
