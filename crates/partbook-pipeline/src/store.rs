//! The process-wide score store.
//!
//! A mutex-guarded map from score identifier to session state. Critical
//! sections hold only map lookups and inserts; raster work never happens
//! under the lock. Sessions expire after a TTL of inactivity, and cached
//! raster bytes are bounded by an LRU budget: when the total exceeds it,
//! least-recently-used scores are evicted first.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use image::GrayImage;
use log::info;

use partbook_core::{LayoutParams, Part, PartbookError, Result, Score, ScoreId};
use partbook_detect::Detection;

/// Default raster budget: 2 GiB across all cached scores.
pub const DEFAULT_RASTER_BUDGET: u64 = 2 * 1024 * 1024 * 1024;

/// Default session TTL: one hour of inactivity.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);

/// Store configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Total cached raster bytes allowed across scores.
    pub raster_budget: u64,
    /// Idle time after which a session is evicted.
    pub session_ttl: Duration,
}

impl Default for StoreConfig {
    #[inline]
    fn default() -> Self {
        Self {
            raster_budget: DEFAULT_RASTER_BUDGET,
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }
}

/// One planned part plus its rendered output, if generation ran.
#[derive(Debug, Clone)]
pub struct PlannedPart {
    /// The planned part.
    pub part: Part,
    /// Layout parameters used for the last generation.
    pub params: Option<LayoutParams>,
    /// Rendered output pages from the last generation.
    pub rendered: Option<Vec<GrayImage>>,
}

/// Session state for one score: the score itself plus per-request caches.
#[derive(Debug)]
pub struct ScoreSession {
    /// The ingested score.
    pub score: Score,
    /// Cached detection results keyed by page index, remembering the
    /// display width they were computed for.
    pub detections: Mutex<HashMap<usize, (f64, Detection)>>,
    /// Parts from the most recent partition call, in partition order.
    pub parts: Mutex<Vec<PlannedPart>>,
}

impl ScoreSession {
    /// Wrap a freshly ingested score.
    #[must_use = "constructors return a new instance"]
    pub fn new(score: Score) -> Self {
        Self {
            score,
            detections: Mutex::new(HashMap::new()),
            parts: Mutex::new(Vec::new()),
        }
    }
}

struct Entry {
    session: Arc<ScoreSession>,
    last_access: Instant,
}

/// Mutex-guarded score map with TTL and LRU-by-raster-bytes eviction.
pub struct ScoreStore {
    config: StoreConfig,
    entries: Mutex<HashMap<ScoreId, Entry>>,
}

impl std::fmt::Debug for ScoreStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoreStore")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish()
    }
}

impl ScoreStore {
    /// Empty store with the given configuration.
    #[must_use = "constructors return a new instance"]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live sessions.
    #[must_use = "returns the session count"]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store holds no sessions.
    #[must_use = "returns whether the store is empty"]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ScoreId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a session, evicting expired sessions first.
    pub fn insert(&self, session: Arc<ScoreSession>) {
        let id = session.score.id().clone();
        let mut entries = self.lock();
        Self::evict_expired(&mut entries, self.config.session_ttl);
        entries.insert(
            id,
            Entry {
                session,
                last_access: Instant::now(),
            },
        );
    }

    /// Look up a session, refreshing its TTL deadline.
    ///
    /// # Errors
    ///
    /// [`PartbookError::UnknownScoreId`] when the id names no live session.
    pub fn get(&self, id: &ScoreId) -> Result<Arc<ScoreSession>> {
        let mut entries = self.lock();
        Self::evict_expired(&mut entries, self.config.session_ttl);
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| PartbookError::UnknownScoreId(id.to_string()))?;
        entry.last_access = Instant::now();
        Ok(Arc::clone(&entry.session))
    }

    /// Drop a session explicitly.
    pub fn remove(&self, id: &ScoreId) {
        self.lock().remove(id);
    }

    /// Enforce the raster budget: evict least-recently-used scores (other
    /// than `current`) until the cached raster total fits.
    ///
    /// # Errors
    ///
    /// [`PartbookError::CacheExhausted`] when the budget cannot be met even
    /// with every other score evicted.
    pub fn enforce_budget(&self, current: &ScoreId) -> Result<()> {
        let mut entries = self.lock();
        loop {
            let in_use: u64 = entries
                .values()
                .map(|e| e.session.score.cached_raster_bytes())
                .sum();
            if in_use <= self.config.raster_budget {
                return Ok(());
            }
            let victim = entries
                .iter()
                .filter(|(id, _)| *id != current)
                .min_by_key(|(_, e)| e.last_access)
                .map(|(id, _)| id.clone());
            match victim {
                Some(id) => {
                    info!("raster budget exceeded ({in_use} bytes), evicting score {id}");
                    if let Some(entry) = entries.remove(&id) {
                        entry.session.score.release_rasters();
                    }
                }
                None => {
                    return Err(PartbookError::CacheExhausted {
                        in_use,
                        budget: self.config.raster_budget,
                    });
                }
            }
        }
    }

    fn evict_expired(entries: &mut HashMap<ScoreId, Entry>, ttl: Duration) {
        let now = Instant::now();
        entries.retain(|id, entry| {
            let live = now.duration_since(entry.last_access) <= ttl;
            if !live {
                info!("evicting expired session {id}");
                entry.session.score.release_rasters();
            }
            live
        });
    }
}
