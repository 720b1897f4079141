//! Request orchestration: one scrape per session at a time.
//!
//! Each session moves through `Idle -> Validating -> Scraping -> Ready | Failed`.
//! Starting a scrape while the session is Validating or Scraping is rejected
//! with [`AppError::Busy`]. A scrape that is dropped mid-flight or hits the
//! deadline ends in `Failed` and its partial leads are thrown away. The last
//! successful result of a session survives later failures so it can still be
//! exported.
use crate::collector;
use crate::config::Config;
use crate::errors::AppError;
use crate::fetcher::{Fetcher, SearchQuery};
use crate::models::{ScrapeRequest, ScrapeResult};
use crate::stats;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use utoipa::ToSchema;

/// Session used when the client does not send `x-session-id`.
pub const ANONYMOUS_SESSION: &str = "anonymous";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScrapePhase {
    Idle,
    Validating,
    Scraping,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Default)]
pub enum ScrapeState {
    #[default]
    Idle,
    Validating,
    Scraping,
    Ready(Arc<ScrapeResult>),
    Failed(String),
}

impl ScrapeState {
    pub fn phase(&self) -> ScrapePhase {
        match self {
            ScrapeState::Idle => ScrapePhase::Idle,
            ScrapeState::Validating => ScrapePhase::Validating,
            ScrapeState::Scraping => ScrapePhase::Scraping,
            ScrapeState::Ready(_) => ScrapePhase::Ready,
            ScrapeState::Failed(_) => ScrapePhase::Failed,
        }
    }

    pub fn in_flight(&self) -> bool {
        matches!(self, ScrapeState::Validating | ScrapeState::Scraping)
    }
}

/// What a client can see about its session.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionStatus {
    pub state: ScrapePhase,
    /// Reason of the last failure, when `state` is `failed`.
    pub error: Option<String>,
    /// Whether `GET /api/v1/export` has something to serve.
    pub export_available: bool,
    /// Lead count of the last successful scrape.
    pub last_total: Option<usize>,
    /// Query of the last successful scrape.
    pub last_query: Option<String>,
    pub last_location: Option<String>,
    /// When the last successful scrape finished.
    #[schema(value_type = Option<String>, format = DateTime)]
    pub last_completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct SessionInner {
    state: ScrapeState,
    last_ready: Option<Arc<ScrapeResult>>,
}

#[derive(Debug, Default)]
struct Session {
    inner: Mutex<SessionInner>,
}

impl Session {
    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Marks a session as busy for the lifetime of one scrape.
///
/// Dropping it before [`InFlight::finish`] means the scrape future was
/// abandoned, which leaves the session `Failed`.
struct InFlight {
    session: Arc<Session>,
    finished: bool,
}

impl InFlight {
    fn begin(session: Arc<Session>) -> Result<Self, AppError> {
        {
            let mut inner = session.lock();
            if inner.state.in_flight() {
                return Err(AppError::Busy);
            }
            inner.state = ScrapeState::Validating;
        }

        Ok(Self {
            session,
            finished: false,
        })
    }

    fn set(&self, state: ScrapeState) {
        self.session.lock().state = state;
    }

    fn finish(mut self, outcome: &Result<Arc<ScrapeResult>, AppError>) {
        let mut inner = self.session.lock();
        match outcome {
            Ok(result) => {
                inner.state = ScrapeState::Ready(result.clone());
                inner.last_ready = Some(result.clone());
            }
            Err(e) => inner.state = ScrapeState::Failed(e.to_string()),
        }
        drop(inner);
        self.finished = true;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("Scrape abandoned before completion, discarding partial results");
            self.set(ScrapeState::Failed(AppError::Cancelled.to_string()));
        }
    }
}

/// Result-count limits applied during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeLimits {
    pub default_max_results: usize,
    pub max_results_cap: usize,
}

impl Default for ScrapeLimits {
    fn default() -> Self {
        Self {
            default_max_results: 20,
            max_results_cap: 200,
        }
    }
}

/// Drives scrapes end to end and tracks per-session state.
///
/// Sessions live in a bounded cache keyed by the client-chosen session id.
/// A session evicted for capacity while its scrape runs no longer blocks a new
/// start under the same id; the finished scrape puts its session back only if
/// nothing replaced it meanwhile.
pub struct Orchestrator {
    fetcher: Arc<dyn Fetcher>,
    limits: ScrapeLimits,
    scrape_timeout: Duration,
    sessions: Cache<String, Arc<Session>>,
}

impl Orchestrator {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        limits: ScrapeLimits,
        scrape_timeout: Duration,
        session_ttl: Duration,
        session_capacity: u64,
    ) -> Self {
        let sessions = Cache::builder()
            .time_to_idle(session_ttl)
            .max_capacity(session_capacity)
            .build();

        Self {
            fetcher,
            limits,
            scrape_timeout,
            sessions,
        }
    }

    pub fn from_config(fetcher: Arc<dyn Fetcher>, config: &Config) -> Self {
        Self::new(
            fetcher,
            ScrapeLimits {
                default_max_results: config.default_max_results,
                max_results_cap: config.max_results_cap,
            },
            config.scrape_timeout(),
            config.session_ttl(),
            config.session_capacity,
        )
    }

    /// Checks the request and turns it into a [`SearchQuery`].
    ///
    /// The query must not be blank. `maxResults` may be a number or a numeric
    /// string; it defaults when absent, must be at least 1, and is clamped to
    /// the configured cap.
    pub fn validate(&self, request: &ScrapeRequest) -> Result<SearchQuery, AppError> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(AppError::BadRequest(
                "Search query cannot be empty".to_string(),
            ));
        }

        let location = request
            .location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string);

        Ok(SearchQuery {
            query: query.to_string(),
            location,
            limit: parse_max_results(request.max_results.as_ref(), self.limits)?,
        })
    }

    /// Runs one scrape for `session_id`.
    pub async fn scrape(
        &self,
        session_id: &str,
        request: ScrapeRequest,
    ) -> Result<Arc<ScrapeResult>, AppError> {
        let session = self.session(session_id).await;
        let flight = InFlight::begin(session.clone())?;

        let outcome = self.run(&flight, &request).await;
        flight.finish(&outcome);

        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(async { session })
            .await;
        outcome
    }

    async fn run(
        &self,
        flight: &InFlight,
        request: &ScrapeRequest,
    ) -> Result<Arc<ScrapeResult>, AppError> {
        let query = self.validate(request)?;

        flight.set(ScrapeState::Scraping);
        tracing::info!(
            "Starting scrape for '{}' in '{}' (max {})",
            query.query,
            query.location.as_deref().unwrap_or(""),
            query.limit
        );

        let leads = tokio::time::timeout(
            self.scrape_timeout,
            collector::collect(self.fetcher.fetch(&query), query.limit),
        )
        .await
        .map_err(|_| {
            AppError::Timeout(format!(
                "scrape for '{}' exceeded {}s",
                query.text_query(),
                self.scrape_timeout.as_secs()
            ))
        })??;

        let stats = stats::summarize(&leads);
        tracing::info!(
            "Scraping completed. Found {} leads ({} with phone, {} with website)",
            stats.total,
            stats.with_phone,
            stats.with_website
        );

        Ok(Arc::new(ScrapeResult {
            query: query.query,
            location: query.location,
            leads,
            stats,
            completed_at: Utc::now(),
        }))
    }

    pub async fn status(&self, session_id: &str) -> SessionStatus {
        let Some(session) = self.sessions.get(session_id).await else {
            return SessionStatus {
                state: ScrapePhase::Idle,
                error: None,
                export_available: false,
                last_total: None,
                last_query: None,
                last_location: None,
                last_completed_at: None,
            };
        };

        let inner = session.lock();
        let last = inner.last_ready.as_deref();
        SessionStatus {
            state: inner.state.phase(),
            error: match &inner.state {
                ScrapeState::Failed(reason) => Some(reason.clone()),
                _ => None,
            },
            export_available: last.is_some(),
            last_total: last.map(|r| r.stats.total),
            last_query: last.map(|r| r.query.clone()),
            last_location: last.and_then(|r| r.location.clone()),
            last_completed_at: last.map(|r| r.completed_at),
        }
    }

    /// Last successful result of the session, if any.
    pub async fn last_result(&self, session_id: &str) -> Option<Arc<ScrapeResult>> {
        let session = self.sessions.get(session_id).await?;
        let inner = session.lock();
        inner.last_ready.clone()
    }

    async fn session(&self, session_id: &str) -> Arc<Session> {
        self.sessions
            .get_with(session_id.to_string(), async {
                Arc::new(Session::default())
            })
            .await
    }
}

fn parse_max_results(value: Option<&Value>, limits: ScrapeLimits) -> Result<usize, AppError> {
    let invalid = || AppError::BadRequest("maxResults must be a positive integer".to_string());

    let requested = match value {
        None | Some(Value::Null) => return Ok(limits.default_max_results),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(limits.default_max_results),
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| invalid())?,
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            })
            .ok_or_else(invalid)?,
        Some(_) => return Err(invalid()),
    };

    if requested < 1 {
        return Err(invalid());
    }

    Ok(usize::try_from(requested)
        .unwrap_or(usize::MAX)
        .min(limits.max_results_cap))
}
