//! Vote tallying.
//!
//! [`compute`] turns the stored options and votes of a poll into per-option
//! counts and percentages. [`PollTally::record_vote`] applies the optimistic
//! increment after a successful submission, and [`TallyCache`] remembers the
//! last tally per poll together with whether it came straight from storage.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::RwLock;
use votebox_db::entities::{poll_option, vote};

/// Vote count and share of a single option.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionTally {
    pub option_id: String,
    pub text: String,
    pub count: u64,
    /// Share of all counted votes, in percent, rounded to one decimal place.
    pub percentage: f64,
}

impl OptionTally {
    /// Percentage rendered with exactly one decimal (`"33.3"`, `"0.0"`).
    #[must_use]
    pub fn percentage_label(&self) -> String {
        format!("{:.1}", self.percentage)
    }
}

/// Tally of one poll as seen by one viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollTally {
    pub poll_id: String,
    /// Options in their stored order.
    pub options: Vec<OptionTally>,
    pub total_votes: u64,
    pub has_voted: bool,
    /// Option the viewer picked, when known.
    pub viewer_choice: Option<String>,
}

fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64 * 1000.0).round() / 10.0
}

/// Tally the votes of a poll.
///
/// Votes whose option is not in `options` are left out of every count and of
/// the total, but still mark the viewer as having voted.
#[must_use]
pub fn compute(
    poll_id: &str,
    options: &[poll_option::Model],
    votes: &[vote::Model],
    viewer_id: Option<&str>,
) -> PollTally {
    let mut counts: HashMap<&str, u64> = options.iter().map(|o| (o.id.as_str(), 0)).collect();
    let mut viewer_choice = None;
    let mut has_voted = false;

    for v in votes {
        if let Some(count) = counts.get_mut(v.option_id.as_str()) {
            *count += 1;
        }
        if viewer_id == Some(v.user_id.as_str()) {
            has_voted = true;
            viewer_choice = Some(v.option_id.clone());
        }
    }

    let total_votes: u64 = counts.values().sum();

    let options = options
        .iter()
        .map(|o| {
            let count = counts.get(o.id.as_str()).copied().unwrap_or_default();
            OptionTally {
                option_id: o.id.clone(),
                text: o.text.clone(),
                count,
                percentage: percentage(count, total_votes),
            }
        })
        .collect();

    PollTally {
        poll_id: poll_id.to_string(),
        options,
        total_votes,
        has_voted,
        viewer_choice,
    }
}

impl PollTally {
    /// Whether `option_id` is one of this poll's options.
    #[must_use]
    pub fn contains_option(&self, option_id: &str) -> bool {
        self.options.iter().any(|o| o.option_id == option_id)
    }

    /// Count a vote that storage has just accepted.
    ///
    /// Returns `false` and changes nothing when the option is unknown.
    pub fn record_vote(&mut self, option_id: &str, user_id: &str) -> bool {
        let Some(option) = self.options.iter_mut().find(|o| o.option_id == option_id) else {
            return false;
        };
        option.count += 1;
        self.total_votes += 1;

        let total = self.total_votes;
        for o in &mut self.options {
            o.percentage = percentage(o.count, total);
        }

        self.has_voted = true;
        self.viewer_choice = Some(option_id.to_string());
        tracing::trace!(poll_id = %self.poll_id, %option_id, %user_id, "Recorded optimistic vote");
        true
    }

    /// Same counts with the viewer-specific fields cleared.
    #[must_use]
    pub fn anonymous(&self) -> Self {
        Self {
            has_voted: false,
            viewer_choice: None,
            ..self.clone()
        }
    }
}

/// Where a cached tally came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TallyState {
    /// Computed from storage.
    Authoritative,
    /// Computed from storage, then bumped by optimistic increments.
    Provisional,
}

/// A cached tally.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedTally {
    pub tally: PollTally,
    pub state: TallyState,
}

/// Last known tally per poll, shared by every viewer.
///
/// Entries hold counts only; viewer-specific fields are cleared on the way in.
/// Nothing expires on its own: owners call [`TallyCache::prune`] to drop
/// polls nobody is watching, and a dropped poll is recomputed on next read.
#[derive(Debug, Default)]
pub struct TallyCache {
    entries: RwLock<HashMap<String, CachedTally>>,
}

impl TallyCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the cached tally of a poll.
    pub async fn get(&self, poll_id: &str) -> Option<CachedTally> {
        self.entries.read().await.get(poll_id).cloned()
    }

    /// Store a tally freshly computed from storage, replacing any entry.
    pub async fn store_authoritative(&self, tally: &PollTally) {
        self.entries.write().await.insert(
            tally.poll_id.clone(),
            CachedTally {
                tally: tally.anonymous(),
                state: TallyState::Authoritative,
            },
        );
    }

    /// Count a vote that storage has just accepted against the cached entry.
    ///
    /// The increment runs under the write lock, so concurrent voters never
    /// start from the same count. When the entry is missing or does not know
    /// the option, `base` is bumped instead and nothing is cached; the next
    /// read goes back to storage.
    ///
    /// Returns the counts-only tally after the vote.
    pub async fn apply_vote(&self, base: &PollTally, option_id: &str, user_id: &str) -> PollTally {
        let mut entries = self.entries.write().await;
        if let Some(cached) = entries.get_mut(&base.poll_id) {
            if cached.tally.record_vote(option_id, user_id) {
                cached.tally = cached.tally.anonymous();
                cached.state = TallyState::Provisional;
                return cached.tally.clone();
            }
            entries.remove(&base.poll_id);
        }
        drop(entries);

        let mut tally = base.anonymous();
        tally.record_vote(option_id, user_id);
        tally.anonymous()
    }

    /// Drop the entry of a poll that was edited or deleted.
    pub async fn invalidate(&self, poll_id: &str) {
        self.entries.write().await.remove(poll_id);
    }

    /// Drop every entry `keep` rejects and return how many went.
    pub async fn prune(&self, keep: impl Fn(&str) -> bool) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|poll_id, _| keep(poll_id));
        before - entries.len()
    }

    /// Number of cached polls.
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn options(n: usize) -> Vec<poll_option::Model> {
        (0..n)
            .map(|i| poll_option::Model {
                id: format!("opt{i}"),
                text: format!("Option {i}"),
                poll_id: "poll1".to_string(),
                position: i as i32,
            })
            .collect()
    }

    fn votes_for(counts: &[usize]) -> Vec<vote::Model> {
        let mut votes = Vec::new();
        for (i, &n) in counts.iter().enumerate() {
            for j in 0..n {
                votes.push(vote::Model {
                    id: format!("v{i}_{j}"),
                    option_id: format!("opt{i}"),
                    user_id: format!("user{i}_{j}"),
                    poll_id: "poll1".to_string(),
                    created_at: Utc::now().into(),
                });
            }
        }
        votes
    }

    fn labels(tally: &PollTally) -> Vec<String> {
        tally.options.iter().map(OptionTally::percentage_label).collect()
    }

    #[test]
    fn test_percentages_round_to_one_decimal() {
        let tally = compute("poll1", &options(3), &votes_for(&[10, 5, 15]), None);

        assert_eq!(labels(&tally), ["33.3", "16.7", "50.0"]);
        assert_eq!(tally.total_votes, 30);
    }

    #[test]
    fn test_no_votes_gives_zero_percentages() {
        let tally = compute("poll1", &options(3), &[], None);

        assert_eq!(labels(&tally), ["0.0", "0.0", "0.0"]);
        assert!(tally.options.iter().all(|o| o.percentage == 0.0));
        assert_eq!(tally.total_votes, 0);
    }

    #[test]
    fn test_counts_sum_to_total_and_percentages_to_hundred() {
        let tally = compute("poll1", &options(4), &votes_for(&[3, 7, 1, 2]), None);

        let sum: u64 = tally.options.iter().map(|o| o.count).sum();
        assert_eq!(sum, tally.total_votes);
        assert_eq!(sum, 13);

        let pct: f64 = tally.options.iter().map(|o| o.percentage).sum();
        assert!((pct - 100.0).abs() < 0.5, "percentages sum to {pct}");
    }

    #[test]
    fn test_options_keep_supplied_order() {
        let mut opts = options(3);
        opts.reverse();
        let tally = compute("poll1", &opts, &[], None);

        let ids: Vec<_> = tally.options.iter().map(|o| o.option_id.as_str()).collect();
        assert_eq!(ids, ["opt2", "opt1", "opt0"]);
    }

    #[test]
    fn test_has_voted_tracks_viewer() {
        let votes = votes_for(&[1, 2]);

        let voter = compute("poll1", &options(2), &votes, Some("user1_1"));
        assert!(voter.has_voted);
        assert_eq!(voter.viewer_choice.as_deref(), Some("opt1"));

        let other = compute("poll1", &options(2), &votes, Some("someone_else"));
        assert!(!other.has_voted);
        assert!(other.viewer_choice.is_none());

        let anonymous = compute("poll1", &options(2), &votes, None);
        assert!(!anonymous.has_voted);

        // Same inputs, same answer
        assert_eq!(voter, compute("poll1", &options(2), &votes, Some("user1_1")));
    }

    #[test]
    fn test_votes_for_unknown_option_are_not_counted() {
        let mut votes = votes_for(&[1, 1]);
        votes.push(vote::Model {
            id: "stray".to_string(),
            option_id: "deleted_option".to_string(),
            user_id: "viewer".to_string(),
            poll_id: "poll1".to_string(),
            created_at: Utc::now().into(),
        });

        let tally = compute("poll1", &options(2), &votes, Some("viewer"));

        assert_eq!(tally.total_votes, 2);
        assert_eq!(labels(&tally), ["50.0", "50.0"]);
        assert!(tally.has_voted);
    }

    #[test]
    fn test_record_vote_updates_counts_and_percentages() {
        let mut tally = compute("poll1", &options(2), &votes_for(&[1, 0]), Some("me"));

        assert!(tally.record_vote("opt1", "me"));

        assert_eq!(tally.total_votes, 2);
        assert_eq!(tally.options[1].count, 1);
        assert_eq!(labels(&tally), ["50.0", "50.0"]);
        assert!(tally.has_voted);
        assert_eq!(tally.viewer_choice.as_deref(), Some("opt1"));
    }

    #[test]
    fn test_record_vote_unknown_option_is_noop() {
        let mut tally = compute("poll1", &options(2), &votes_for(&[1, 0]), None);
        let before = tally.clone();

        assert!(!tally.record_vote("nope", "me"));
        assert_eq!(tally, before);
    }

    #[tokio::test]
    async fn test_cache_refetch_supersedes_provisional() {
        let cache = TallyCache::new();
        let base = compute("poll1", &options(2), &[], Some("me"));
        cache.store_authoritative(&base).await;

        let after = cache.apply_vote(&base, "opt0", "me").await;
        assert_eq!(after.total_votes, 1);
        assert!(!after.has_voted);

        let cached = cache.get("poll1").await.unwrap();
        assert_eq!(cached.state, TallyState::Provisional);
        assert_eq!(cached.tally.total_votes, 1);
        assert!(!cached.tally.has_voted);

        let fresh = compute("poll1", &options(2), &votes_for(&[2, 1]), None);
        cache.store_authoritative(&fresh).await;

        let cached = cache.get("poll1").await.unwrap();
        assert_eq!(cached.state, TallyState::Authoritative);
        assert_eq!(cached.tally.total_votes, 3);
    }

    #[tokio::test]
    async fn test_apply_vote_builds_on_cached_entry_not_base() {
        let cache = TallyCache::new();
        let base = compute("poll1", &options(2), &[], None);
        cache.store_authoritative(&base).await;

        // Both voters hold the same stale copy
        cache.apply_vote(&base, "opt0", "alice").await;
        let after = cache.apply_vote(&base, "opt1", "bob").await;

        assert_eq!(after.total_votes, 2);
        assert_eq!(labels(&after), ["50.0", "50.0"]);
        let cached = cache.get("poll1").await.unwrap();
        assert_eq!(cached.tally, after);
    }

    #[tokio::test]
    async fn test_apply_vote_drops_entry_missing_the_option() {
        let cache = TallyCache::new();
        cache.store_authoritative(&compute("poll1", &[], &[], None)).await;
        let base = compute("poll1", &options(2), &votes_for(&[1, 0]), None);

        let after = cache.apply_vote(&base, "opt1", "me").await;

        assert_eq!(after.total_votes, 2);
        assert!(cache.get("poll1").await.is_none());
    }

    #[tokio::test]
    async fn test_apply_vote_without_entry_caches_nothing() {
        let cache = TallyCache::new();
        let base = compute("poll1", &options(2), &[], None);

        let after = cache.apply_vote(&base, "opt0", "me").await;

        assert_eq!(after.total_votes, 1);
        assert_eq!(cache.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_prune_keeps_only_selected_polls() {
        let cache = TallyCache::new();
        for poll_id in ["poll1", "poll2", "poll3"] {
            cache.store_authoritative(&compute(poll_id, &[], &[], None)).await;
        }

        let dropped = cache.prune(|poll_id| poll_id == "poll2").await;

        assert_eq!(dropped, 2);
        assert_eq!(cache.entry_count().await, 1);
        assert!(cache.get("poll2").await.is_some());
    }

    #[tokio::test]
    async fn test_cache_invalidate() {
        let cache = TallyCache::new();
        cache
            .store_authoritative(&compute("poll1", &options(2), &[], None))
            .await;

        cache.invalidate("poll1").await;

        assert!(cache.get("poll1").await.is_none());
    }
}
