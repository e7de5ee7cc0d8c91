//! Cross-collection conflict detection and resolution.
//!
//! When collections disagree about the same topic, one result wins and the
//! others are kept with a disposition so the disagreement can be disclosed.
//! Resolution order:
//! 1. A result from an updates collection beats one from a base collection.
//! 2. Otherwise the higher score wins.
//! 3. Remaining ties go to the collection name, then the result id, ascending.
//!
//! Everything here is pure over its inputs except the stat counters.

use crate::types::{
    Conflict, ConflictCandidate, Disposition, ResolutionRule, ResultsByCollection, SearchResult,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"];

/// Process-lifetime resolution counters.
#[derive(Debug, Default)]
pub struct ResolutionStats {
    conflicts_detected: AtomicU64,
    conflicts_resolved: AtomicU64,
    temporal_resolutions: AtomicU64,
    relevance_resolutions: AtomicU64,
    outdated_reported: AtomicU64,
    alternate_reported: AtomicU64,
}

impl ResolutionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            conflicts_detected: self.conflicts_detected.load(AtomicOrdering::Relaxed),
            conflicts_resolved: self.conflicts_resolved.load(AtomicOrdering::Relaxed),
            temporal_resolutions: self.temporal_resolutions.load(AtomicOrdering::Relaxed),
            relevance_resolutions: self.relevance_resolutions.load(AtomicOrdering::Relaxed),
            outdated_reported: self.outdated_reported.load(AtomicOrdering::Relaxed),
            alternate_reported: self.alternate_reported.load(AtomicOrdering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ResolutionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub conflicts_detected: u64,
    pub conflicts_resolved: u64,
    pub temporal_resolutions: u64,
    pub relevance_resolutions: u64,
    pub outdated_reported: u64,
    pub alternate_reported: u64,
}

impl StatsSnapshot {
    /// Share of detected conflicts that were resolved; 0.0 before any detection.
    pub fn resolution_rate(&self) -> f64 {
        if self.conflicts_detected == 0 {
            0.0
        } else {
            self.conflicts_resolved as f64 / self.conflicts_detected as f64
        }
    }
}

/// Detects and resolves conflicts between collections.
#[derive(Debug, Clone, Default)]
pub struct ConflictResolver {
    stats: Arc<ResolutionStats>,
}

impl ConflictResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share counters with other resolvers (or inspect them from a test).
    pub fn with_stats(stats: Arc<ResolutionStats>) -> Self {
        Self { stats }
    }

    pub fn get_stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Find topics on which two or more collections' top results disagree.
    ///
    /// Each collection is represented by its top-scoring result per topic.
    /// Results without a `topic` never conflict. Candidates come back in
    /// topic order, their results in collection order.
    pub fn detect_conflicts(
        &self,
        results_by_collection: &ResultsByCollection,
    ) -> Vec<ConflictCandidate> {
        let mut by_topic: BTreeMap<String, BTreeMap<&str, &SearchResult>> = BTreeMap::new();

        for (collection, results) in results_by_collection {
            for result in results {
                let Some(topic) = result.topic() else {
                    continue;
                };
                let slot = by_topic.entry(topic).or_default();
                let replace = slot
                    .get(collection.as_str())
                    .map_or(true, |current| outranks_within_collection(result, current));
                if replace {
                    slot.insert(collection.as_str(), result);
                }
            }
        }

        let candidates: Vec<ConflictCandidate> = by_topic
            .into_iter()
            .filter(|(_, tops)| tops.len() >= 2)
            .filter(|(_, tops)| {
                let tops: Vec<&SearchResult> = tops.values().copied().collect();
                tops.iter()
                    .enumerate()
                    .any(|(i, a)| tops[i + 1..].iter().any(|b| disagree(a, b)))
            })
            .map(|(topic, tops)| ConflictCandidate {
                topic,
                results: tops.into_values().cloned().collect(),
            })
            .collect();

        if !candidates.is_empty() {
            self.stats
                .conflicts_detected
                .fetch_add(candidates.len() as u64, AtomicOrdering::Relaxed);
            for candidate in &candidates {
                tracing::info!(
                    "Conflict on topic '{}' between {:?}",
                    candidate.topic,
                    candidate.collections()
                );
            }
        }

        candidates
    }

    /// Pick a winner for every candidate and merge.
    ///
    /// Returns all input results with losers removed and winners annotated
    /// (`conflict_winner`, `superseded`), plus one report per conflict that
    /// keeps each loser with its disposition.
    ///
    /// A loser is any result on the topic, from a collection other than the
    /// winner's, that disagrees with the winner. Results that agree with the
    /// winner stay in the merged set untouched.
    pub fn resolve_conflicts(
        &self,
        results_by_collection: &ResultsByCollection,
        conflicts: &[ConflictCandidate],
    ) -> (Vec<SearchResult>, Vec<Conflict>) {
        let mut reports = Vec::with_capacity(conflicts.len());
        let mut losers: HashSet<(String, String)> = HashSet::new();
        let mut winner_notes: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();

        for candidate in conflicts {
            let Some(report) = self.resolve_one(results_by_collection, candidate) else {
                continue;
            };

            for loser in &report.losers {
                losers.insert((loser.collection.clone(), loser.id.clone()));
            }
            winner_notes
                .entry((report.winner.collection.clone(), report.winner.id.clone()))
                .or_default()
                .extend(report.losers.iter().map(|l| l.collection.clone()));

            reports.push(report);
        }

        let mut resolved = Vec::new();
        for (collection, results) in results_by_collection {
            for result in results {
                let key = (collection.clone(), result.id.clone());
                if losers.contains(&key) {
                    continue;
                }
                let mut result = result.clone();
                if let Some(superseded) = winner_notes.get(&key) {
                    let mut superseded = superseded.clone();
                    superseded.sort();
                    superseded.dedup();
                    result.set_metadata("conflict_winner", serde_json::Value::Bool(true));
                    result.set_metadata("superseded", serde_json::json!(superseded));
                }
                resolved.push(result);
            }
        }

        (resolved, reports)
    }

    fn resolve_one(
        &self,
        results_by_collection: &ResultsByCollection,
        candidate: &ConflictCandidate,
    ) -> Option<Conflict> {
        let mut ranked: Vec<&SearchResult> = candidate.results.iter().collect();
        ranked.sort_by(|a, b| resolution_order(a, b));

        let (winner, rest) = ranked.split_first()?;
        let losing: Vec<&str> = rest
            .iter()
            .filter(|r| disagree(winner, r))
            .map(|r| r.collection.as_str())
            .collect();
        if losing.is_empty() {
            return None;
        }

        let winner_is_updates = winner.is_updates();
        let losers: Vec<SearchResult> = losing
            .iter()
            .filter_map(|collection| results_by_collection.get(*collection))
            .flatten()
            .filter(|r| r.topic().as_deref() == Some(candidate.topic.as_str()))
            .filter(|r| disagree(winner, r))
            .map(|loser| {
                let mut loser = loser.clone();
                loser.disposition = Some(if winner_is_updates && !loser.is_updates() {
                    Disposition::Outdated
                } else {
                    Disposition::Alternate
                });
                loser
            })
            .collect();

        let rule = if losers
            .iter()
            .any(|l| l.disposition == Some(Disposition::Outdated))
        {
            ResolutionRule::Temporal
        } else {
            ResolutionRule::Relevance
        };

        let outdated = losers
            .iter()
            .filter(|l| l.disposition == Some(Disposition::Outdated))
            .count() as u64;
        let alternate = losers.len() as u64 - outdated;

        self.stats
            .conflicts_resolved
            .fetch_add(1, AtomicOrdering::Relaxed);
        let by_rule = match rule {
            ResolutionRule::Temporal => &self.stats.temporal_resolutions,
            ResolutionRule::Relevance => &self.stats.relevance_resolutions,
        };
        by_rule.fetch_add(1, AtomicOrdering::Relaxed);
        self.stats
            .outdated_reported
            .fetch_add(outdated, AtomicOrdering::Relaxed);
        self.stats
            .alternate_reported
            .fetch_add(alternate, AtomicOrdering::Relaxed);

        tracing::debug!(
            "Resolved '{}' for '{}' by {:?} over {} result(s)",
            candidate.topic,
            winner.collection,
            rule,
            losers.len()
        );

        Some(Conflict {
            topic: candidate.topic.clone(),
            collections: candidate
                .results
                .iter()
                .filter(|r| {
                    r.collection == winner.collection || losing.contains(&r.collection.as_str())
                })
                .map(|r| r.collection.clone())
                .collect(),
            winner: (*winner).clone(),
            losers,
            rule,
        })
    }
}

/// Total order used to pick winners: updates first, then score, then names.
fn resolution_order(a: &SearchResult, b: &SearchResult) -> Ordering {
    b.is_updates()
        .cmp(&a.is_updates())
        .then_with(|| b.score.total_cmp(&a.score))
        .then_with(|| a.collection.cmp(&b.collection))
        .then_with(|| a.id.cmp(&b.id))
}

fn outranks_within_collection(candidate: &SearchResult, current: &SearchResult) -> bool {
    match candidate.score.total_cmp(&current.score) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => candidate.id < current.id,
    }
}

/// Whether two results on the same topic make different claims.
///
/// Compares `value` when both carry one, then `effective_date`, then text.
fn disagree(a: &SearchResult, b: &SearchResult) -> bool {
    if let (Some(va), Some(vb)) = (a.metadata.get("value"), b.metadata.get("value")) {
        return normalize_value(va) != normalize_value(vb);
    }

    if let (Some(da), Some(db)) = (
        a.metadata_str("effective_date"),
        b.metadata_str("effective_date"),
    ) {
        return match (parse_date(da), parse_date(db)) {
            (Some(da), Some(db)) => da != db,
            _ => da.trim() != db.trim(),
        };
    }

    normalize_text(&a.text) != normalize_text(&b.text)
}

fn normalize_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.trim().to_lowercase(),
        other => other.to_string(),
    }
}

fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}
