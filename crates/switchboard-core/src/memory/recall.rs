use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::memory::{MemoryResult, MemoryStore};
use crate::models::{MemoryId, MemoryRecord, ScoredMemory, SessionId};
use crate::persistence::MemoryScope;

/// Score for a query (or one of its terms) equal to one of the record's tags.
pub const TAG_MATCH_SCORE: f64 = 3.0;
/// Score for the whole query appearing inside the record's content.
pub const CONTENT_MATCH_SCORE: f64 = 2.0;

/// Ranks stored memories against a free-text query.
///
/// `score = importance weight × match score × 0.5^(age / half life)`; records the query does
/// not match at all are left out. Equal scores keep insertion order.
pub struct RecallEngine {
    store: Arc<MemoryStore>,
    half_life: Duration,
}

impl RecallEngine {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        let half_life = store.config().recency_half_life();
        Self { store, half_life }
    }

    /// A zero half life turns recency decay off.
    pub fn with_half_life(store: Arc<MemoryStore>, half_life: Duration) -> Self {
        Self { store, half_life }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn recall(
        &self,
        query: &str,
        limit: usize,
        session_id: Option<&SessionId>,
    ) -> MemoryResult<Vec<MemoryRecord>> {
        Ok(self
            .recall_scored(query, limit, session_id)?
            .into_iter()
            .map(|scored| scored.record)
            .collect())
    }

    /// `recall` with the configured default limit.
    pub fn recall_default(
        &self,
        query: &str,
        session_id: Option<&SessionId>,
    ) -> MemoryResult<Vec<MemoryRecord>> {
        self.recall(query, self.store.config().default_recall_limit, session_id)
    }

    pub fn recall_scored(
        &self,
        query: &str,
        limit: usize,
        session_id: Option<&SessionId>,
    ) -> MemoryResult<Vec<ScoredMemory>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let scope = match session_id {
            Some(id) => MemoryScope::Session(id.clone()),
            None => MemoryScope::All,
        };
        let candidates = self.store.memories(&scope)?;

        let query = Query::parse(query);
        let now = SystemTime::now();
        let mut ranked: Vec<ScoredMemory> = candidates
            .into_iter()
            .filter_map(|record| {
                let score = score(&record, &query, now, self.half_life)?;
                Some(ScoredMemory { record, score })
            })
            .collect();
        // Candidates arrive in insertion order and the sort is stable.
        ranked.sort_by(|left, right| right.score.total_cmp(&left.score));
        ranked.truncate(limit);

        let ids: Vec<MemoryId> = ranked.iter().map(|scored| scored.record.id).collect();
        match self.store.record_access(&ids) {
            Ok(()) => {
                for scored in &mut ranked {
                    scored.record.access_count += 1;
                }
            }
            Err(error) => tracing::warn!(
                kind = ?error.kind,
                message = %error.message,
                "failed to update memory access counts"
            ),
        }

        tracing::debug!(
            returned = ranked.len(),
            session = session_id.map(SessionId::as_str),
            "recalled memories"
        );
        Ok(ranked)
    }
}

/// Lowercased query text plus its whitespace-separated terms.
struct Query {
    text: String,
    terms: Vec<String>,
}

impl Query {
    fn parse(raw: &str) -> Self {
        let text = raw.trim().to_lowercase();
        let terms = text.split_whitespace().map(str::to_string).collect();
        Self { text, terms }
    }

    fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

fn score(
    record: &MemoryRecord,
    query: &Query,
    now: SystemTime,
    half_life: Duration,
) -> Option<f64> {
    let matched = match_score(record, query)?;
    let age = now.duration_since(record.created_at).unwrap_or(Duration::ZERO);
    Some(record.importance.weight() * matched * recency_decay(age, half_life))
}

fn match_score(record: &MemoryRecord, query: &Query) -> Option<f64> {
    if query.is_empty() {
        return Some(1.0);
    }

    if record.tags.contains(&query.text)
        || query.terms.iter().any(|term| record.tags.contains(term))
    {
        return Some(TAG_MATCH_SCORE);
    }

    let content = record.content.to_lowercase();
    if content.contains(&query.text) {
        return Some(CONTENT_MATCH_SCORE);
    }

    let found = query
        .terms
        .iter()
        .filter(|term| {
            content.contains(term.as_str())
                || record.tags.iter().any(|tag| tag.contains(term.as_str()))
        })
        .count();
    if found == 0 {
        None
    } else {
        Some(found as f64 / query.terms.len() as f64)
    }
}

fn recency_decay(age: Duration, half_life: Duration) -> f64 {
    if half_life.is_zero() {
        return 1.0;
    }
    0.5_f64.powf(age.as_secs_f64() / half_life.as_secs_f64())
}
