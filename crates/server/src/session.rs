//! Client sessions and their counter ledgers.
//!
//! A session is identified by a cookie. The server hands out a fresh id on
//! first contact; the ledger behind it is created the first time a counter is
//! bumped and lives until the session has been idle for `session.ttl_secs`.
//! Ledgers are never persisted.

use crate::metrics;
use crate::state::AppState;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::HeaderValue;
use axum::http::header::SET_COOKIE;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use dashmap::{DashMap, mapref::entry::Entry};
use folio_core::CounterMetric;
use folio_core::config::SessionConfig;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Per-session record of which `(metric, slug)` pairs were already credited.
pub trait CounterLedger: Send + Sync {
    /// Claim the pair. Returns `false` if it was already claimed.
    ///
    /// Check and insert happen as one step, so of several concurrent callers
    /// for the same pair exactly one gets `true`.
    fn try_reserve(&self, metric: CounterMetric, slug: &str) -> bool;

    /// Give back a reservation whose increment did not happen.
    fn release(&self, metric: CounterMetric, slug: &str);
}

/// In-memory ledger.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    credited: Mutex<HashSet<(CounterMetric, String)>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashSet<(CounterMetric, String)>> {
        self.credited.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Counter ledger mutex was poisoned, recovering with into_inner()");
            poisoned.into_inner()
        })
    }

    pub fn contains(&self, metric: CounterMetric, slug: &str) -> bool {
        self.entries().contains(&(metric, slug.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CounterLedger for MemoryLedger {
    fn try_reserve(&self, metric: CounterMetric, slug: &str) -> bool {
        self.entries().insert((metric, slug.to_string()))
    }

    fn release(&self, metric: CounterMetric, slug: &str) {
        self.entries().remove(&(metric, slug.to_string()));
    }
}

struct SessionEntry {
    ledger: Arc<MemoryLedger>,
    last_seen: Instant,
}

/// Sessions keyed by cookie id.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

struct SessionStoreInner {
    sessions: DashMap<Uuid, SessionEntry>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(SessionStoreInner {
                sessions: DashMap::new(),
                ttl,
            }),
        }
    }

    /// Ledger of the given session, created on first use. Refreshes the idle timer.
    pub fn ledger(&self, id: Uuid) -> Arc<MemoryLedger> {
        match self.inner.sessions.entry(id) {
            Entry::Occupied(mut entry) => {
                let entry = entry.get_mut();
                entry.last_seen = Instant::now();
                entry.ledger.clone()
            }
            Entry::Vacant(entry) => {
                metrics::ACTIVE_SESSIONS.inc();
                let ledger = Arc::new(MemoryLedger::new());
                entry.insert(SessionEntry {
                    ledger: ledger.clone(),
                    last_seen: Instant::now(),
                });
                ledger
            }
        }
    }

    /// Drop sessions idle for longer than the TTL. Returns the number evicted.
    ///
    /// A ledger still held by an in-flight request is kept until that
    /// request lets go of it.
    pub fn cleanup(&self) -> usize {
        let ttl = self.inner.ttl;
        let mut evicted = 0;
        self.inner.sessions.retain(|_, entry| {
            let in_use = Arc::strong_count(&entry.ledger) > 1;
            let keep = in_use || entry.last_seen.elapsed() < ttl;
            if !keep {
                evicted += 1;
            }
            keep
        });
        if evicted > 0 {
            metrics::ACTIVE_SESSIONS.sub(evicted as i64);
            metrics::SESSIONS_EVICTED.inc_by(evicted as u64);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sessions.is_empty()
    }
}

/// Spawn a background task that periodically evicts idle sessions.
pub fn spawn_cleanup_task(store: SessionStore, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let evicted = store.cleanup();
            if evicted > 0 {
                tracing::info!(evicted = evicted, "Session cleanup task evicted idle sessions");
            }
        }
    })
}

/// Session id attached to every request by [`session_middleware`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionId(pub Uuid);

fn session_cookie(config: &SessionConfig, id: Uuid) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), id.to_string()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(config.secure)
        .build()
}

/// Resolve the session cookie, issuing a new one when absent or malformed.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let config = &state.config.session;
    let existing = CookieJar::from_headers(req.headers())
        .get(&config.cookie_name)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok());

    let (id, issued) = match existing {
        Some(id) => (id, false),
        None => (Uuid::new_v4(), true),
    };
    req.extensions_mut().insert(SessionId(id));

    let mut response = next.run(req).await;
    if issued {
        match HeaderValue::from_str(&session_cookie(config, id).to_string()) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => tracing::warn!(error = %e, "Failed to encode session cookie"),
        }
    }
    response
}

/// The caller's session and its counter ledger.
pub struct Session {
    pub id: Uuid,
    pub ledger: Arc<dyn CounterLedger>,
}

impl FromRequestParts<AppState> for Session {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Without the middleware the request still gets a one-off ledger.
        let id = parts
            .extensions
            .get::<SessionId>()
            .map(|session| session.0)
            .unwrap_or_else(Uuid::new_v4);
        Ok(Session {
            id,
            ledger: state.sessions.ledger(id),
        })
    }
}
