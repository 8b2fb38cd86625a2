//! Differential precise coverage.
//!
//! `Profiler.takePreciseCoverage` resets the target's counters on every take,
//! so the tracker folds each take into a cumulative map. Snapshots are copies
//! of that map; a per-range count never decreases between `start` and `stop`.
//!
//! # Example
//!
//! ```ignore
//! let tracker = session.coverage_tracker();
//! tracker.start().await?;
//!
//! let before = tracker.checkpoint().await;
//! // ... run one test ...
//! tracker.finish_test("scroll_down", before).await;
//!
//! tracker.stop().await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::ProfilerCommand;

use super::Session;

// ============================================================================
// Types
// ============================================================================

/// Identifies one covered block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RangeKey {
    /// Script id within the target.
    pub script_id: String,
    /// Script URL (empty for anonymous scripts).
    pub url: String,
    /// Enclosing function name (empty for top-level code).
    pub function_name: String,
    /// Start offset in the script source.
    pub start_offset: u64,
    /// End offset in the script source.
    pub end_offset: u64,
}

/// Cumulative hit counts at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageSnapshot {
    /// Target the counts belong to.
    pub target: String,
    /// Capture time, milliseconds since the Unix epoch.
    pub captured_at_ms: u64,
    /// Hit count per range.
    pub ranges: BTreeMap<RangeKey, u64>,
}

impl CoverageSnapshot {
    /// Returns the hit count for a range, zero if never seen.
    #[inline]
    #[must_use]
    pub fn hits(&self, range: &RangeKey) -> u64 {
        self.ranges.get(range).copied().unwrap_or_default()
    }
}

/// One range's hits attributed to an interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageEntry {
    /// The range.
    #[serde(flatten)]
    pub range: RangeKey,
    /// Hits between the two snapshots.
    pub hits: u64,
}

/// Hits attributed to the interval between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageDelta {
    /// Target the counts belong to.
    pub target: String,
    /// Test label, set by [`CoverageTracker::persist`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Capture time of the earlier snapshot.
    pub from_ms: u64,
    /// Capture time of the later snapshot.
    pub to_ms: u64,
    /// Ranges with a non-zero difference, in range order.
    pub entries: Vec<CoverageEntry>,
}

impl CoverageDelta {
    /// Returns `true` if nothing ran in the interval.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total hits across all entries.
    #[must_use]
    pub fn total_hits(&self) -> u64 {
        self.entries.iter().map(|entry| entry.hits).sum()
    }
}

/// Computes per-range `after - before`, clamped at zero.
///
/// Ranges whose difference is zero are omitted.
#[must_use]
pub fn delta(before: &CoverageSnapshot, after: &CoverageSnapshot) -> CoverageDelta {
    if before.target != after.target {
        warn!(before = %before.target, after = %after.target, "Coverage delta across different targets");
    }

    let entries = after
        .ranges
        .iter()
        .filter_map(|(range, &hits)| {
            let diff = hits.saturating_sub(before.hits(range));
            (diff > 0).then(|| CoverageEntry {
                range: range.clone(),
                hits: diff,
            })
        })
        .collect();

    CoverageDelta {
        target: after.target.clone(),
        label: None,
        from_ms: before.captured_at_ms,
        to_ms: after.captured_at_ms,
        entries,
    }
}

// ============================================================================
// Wire Format
// ============================================================================

#[derive(Deserialize)]
struct TakeResult {
    result: Vec<ScriptCoverage>,
}

#[derive(Deserialize)]
struct ScriptCoverage {
    #[serde(rename = "scriptId")]
    script_id: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    functions: Vec<FunctionCoverage>,
}

#[derive(Deserialize)]
struct FunctionCoverage {
    #[serde(rename = "functionName", default)]
    function_name: String,
    #[serde(default)]
    ranges: Vec<RangeCoverage>,
}

#[derive(Deserialize)]
struct RangeCoverage {
    #[serde(rename = "startOffset")]
    start_offset: u64,
    #[serde(rename = "endOffset")]
    end_offset: u64,
    count: u64,
}

/// Adds one take's counts to the cumulative map. Returns the ranges touched.
fn fold_take(totals: &mut BTreeMap<RangeKey, u64>, reply: Value) -> Result<usize> {
    let take: TakeResult = serde_json::from_value(reply)
        .map_err(|e| Error::coverage(format!("malformed takePreciseCoverage reply: {e}")))?;

    let mut touched = 0;
    for script in take.result {
        for function in script.functions {
            for range in function.ranges {
                let key = RangeKey {
                    script_id: script.script_id.clone(),
                    url: script.url.clone(),
                    function_name: function.function_name.clone(),
                    start_offset: range.start_offset,
                    end_offset: range.end_offset,
                };
                let total = totals.entry(key).or_default();
                *total = total.saturating_add(range.count);
                touched += 1;
            }
        }
    }
    Ok(touched)
}

// ============================================================================
// CoverageTracker
// ============================================================================

#[derive(Default)]
struct TrackerState {
    started: bool,
    totals: BTreeMap<RangeKey, u64>,
    /// File stem to the label that claimed it.
    stems: FxHashMap<String, String>,
}

impl TrackerState {
    /// Returns the file stem for `label`, suffixing `-2`, `-3`, ... when a
    /// different label already sanitized to the same stem.
    fn claim_stem(&mut self, label: &str) -> String {
        let base = sanitize_label(label);
        let mut stem = base.clone();
        let mut n = 1;

        loop {
            match self.stems.get(&stem) {
                Some(owner) if owner == label => return stem,
                Some(_) => {
                    n += 1;
                    stem = format!("{base}-{n}");
                }
                None => break,
            }
        }

        if n > 1 {
            warn!(label, stem, "Coverage label collides with an earlier label");
        }
        self.stems.insert(stem.clone(), label.to_string());
        stem
    }
}

/// Precise coverage collection for one session.
pub struct CoverageTracker {
    session: Session,
    output_dir: PathBuf,
    state: Mutex<TrackerState>,
}

impl std::fmt::Debug for CoverageTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoverageTracker")
            .field("target_id", self.session.target_id())
            .field("output_dir", &self.output_dir)
            .field("started", &self.state.lock().started)
            .finish()
    }
}

impl CoverageTracker {
    /// Creates a tracker writing deltas to `output_dir`.
    #[must_use]
    pub fn new(session: Session, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            session,
            output_dir: output_dir.into(),
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// Returns the output directory.
    #[inline]
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Returns `true` between `start` and `stop`.
    #[inline]
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    /// Enables the profiler, starts precise coverage and resets counts.
    ///
    /// # Errors
    ///
    /// - [`Error::Coverage`] if already started
    /// - any error from the profiler commands
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.started {
                return Err(Error::coverage("coverage already started"));
            }
            state.started = true;
            state.totals.clear();
        }

        let result = async {
            self.session.send_command(ProfilerCommand::Enable).await?;
            self.session
                .send_command(ProfilerCommand::StartPreciseCoverage {
                    call_count: true,
                    detailed: true,
                })
                .await
        }
        .await;

        if let Err(e) = result {
            self.state.lock().started = false;
            return Err(e);
        }

        info!(target_id = %self.session.target_id(), "Coverage started");
        Ok(())
    }

    /// Captures the cumulative counts without resetting them.
    ///
    /// # Errors
    ///
    /// - [`Error::Coverage`] if not started or the reply is malformed
    /// - any error from the profiler command
    pub async fn snapshot(&self) -> Result<CoverageSnapshot> {
        if !self.is_started() {
            return Err(Error::coverage("coverage not started"));
        }

        let reply = self
            .session
            .send_command(ProfilerCommand::TakePreciseCoverage)
            .await?;

        let mut state = self.state.lock();
        let touched = fold_take(&mut state.totals, reply)?;
        debug!(target_id = %self.session.target_id(), touched, total = state.totals.len(), "Coverage taken");

        Ok(CoverageSnapshot {
            target: self.session.target_id().to_string(),
            captured_at_ms: now_ms(),
            ranges: state.totals.clone(),
        })
    }

    /// Writes a delta to `<output_dir>/<label>.json`.
    ///
    /// The label is sanitized into a file name and recorded in the output.
    /// Distinct labels that sanitize alike get a numeric suffix; writing
    /// the same label again overwrites its file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::Json`] if the write fails.
    pub fn persist(&self, delta: &CoverageDelta, label: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir).map_err(Error::Io)?;

        let stem = self.state.lock().claim_stem(label);
        let path = self.output_dir.join(format!("{stem}.json"));
        let labelled = CoverageDelta {
            label: Some(label.to_string()),
            ..delta.clone()
        };
        let bytes = serde_json::to_vec_pretty(&labelled)?;
        fs::write(&path, bytes).map_err(Error::Io)?;

        debug!(path = %path.display(), entries = delta.entries.len(), "Coverage delta written");
        Ok(path)
    }

    /// Stops precise coverage and disables the profiler.
    ///
    /// Does nothing if coverage was not started.
    ///
    /// # Errors
    ///
    /// Returns any error from the profiler commands.
    pub async fn stop(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if !state.started {
                return Ok(());
            }
            state.started = false;
        }

        self.session
            .send_command(ProfilerCommand::StopPreciseCoverage)
            .await?;
        self.session.send_command(ProfilerCommand::Disable).await?;

        info!(target_id = %self.session.target_id(), "Coverage stopped");
        Ok(())
    }
}

// ============================================================================
// CoverageTracker - Per-Test Helpers
// ============================================================================

impl CoverageTracker {
    /// Takes a snapshot, logging and discarding any failure.
    pub async fn checkpoint(&self) -> Option<CoverageSnapshot> {
        match self.snapshot().await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(target_id = %self.session.target_id(), error = %e, "Coverage checkpoint failed");
                None
            }
        }
    }

    /// Attributes coverage since `before` to one test and writes it.
    ///
    /// Returns the written path. Any failure, including a missing `before`,
    /// is logged and yields `None`.
    pub async fn finish_test(&self, label: &str, before: Option<CoverageSnapshot>) -> Option<PathBuf> {
        let Some(before) = before else {
            warn!(label, "No coverage baseline for test");
            return None;
        };
        let after = self.checkpoint().await?;

        match self.persist(&delta(&before, &after), label) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(label, error = %e, "Coverage persist failed");
                None
            }
        }
    }
}

// ============================================================================
// Session - Coverage
// ============================================================================

impl Session {
    /// Creates a coverage tracker writing to the configured coverage dir.
    #[must_use]
    pub fn coverage_tracker(&self) -> CoverageTracker {
        CoverageTracker::new(self.clone(), self.inner.options.coverage_dir.clone())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Maps a test label onto a safe file stem.
fn sanitize_label(label: &str) -> String {
    let stem: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let stem = stem.trim_matches('.');
    if stem.is_empty() {
        "unnamed".to_string()
    } else {
        stem.to_string()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use proptest::prelude::*;
    use serde_json::json;

    use std::time::Duration;

    use crate::harness::SessionOptions;
    use crate::session::core::tests::session_pair;
    use crate::transport::connection::tests::{RemoteEnd, connected_pair, next_json, push_json};

    fn key(start: u64) -> RangeKey {
        RangeKey {
            script_id: "7".into(),
            url: "chrome-extension://abc/content.js".into(),
            function_name: "onKey".into(),
            start_offset: start,
            end_offset: start + 10,
        }
    }

    fn snapshot(at: u64, counts: &[(u64, u64)]) -> CoverageSnapshot {
        CoverageSnapshot {
            target: "T1".into(),
            captured_at_ms: at,
            ranges: counts.iter().map(|&(start, hits)| (key(start), hits)).collect(),
        }
    }

    fn take_reply(counts: &[(u64, u64)]) -> Value {
        let ranges: Vec<Value> = counts
            .iter()
            .map(|&(start, count)| json!({ "startOffset": start, "endOffset": start + 10, "count": count }))
            .collect();
        json!({
            "result": [{
                "scriptId": "7",
                "url": "chrome-extension://abc/content.js",
                "functions": [{ "functionName": "onKey", "ranges": ranges, "isBlockCoverage": true }]
            }]
        })
    }

    /// Answers the next request, asserting its method.
    async fn answer(remote: &mut RemoteEnd, method: &str, result: Value) {
        let request = next_json(remote).await;
        assert_eq!(request["method"], method);
        push_json(remote, json!({ "id": request["id"], "result": result })).await;
    }

    #[test]
    fn test_delta_subtracts_and_omits_zero() {
        let before = snapshot(1, &[(0, 3), (20, 5)]);
        let after = snapshot(2, &[(0, 3), (20, 9), (40, 1)]);

        let d = delta(&before, &after);
        assert_eq!(d.from_ms, 1);
        assert_eq!(d.to_ms, 2);
        assert_eq!(d.entries.len(), 2);
        assert_eq!(d.entries[0].range, key(20));
        assert_eq!(d.entries[0].hits, 4);
        assert_eq!(d.entries[1].hits, 1);
        assert_eq!(d.total_hits(), 5);
    }

    #[test]
    fn test_delta_clamps_at_zero() {
        let before = snapshot(1, &[(0, 10)]);
        let after = snapshot(2, &[(0, 4)]);
        assert!(delta(&before, &after).is_empty());
    }

    #[test]
    fn test_fold_take_accumulates() {
        let mut totals = BTreeMap::new();
        fold_take(&mut totals, take_reply(&[(0, 2)])).unwrap();
        fold_take(&mut totals, take_reply(&[(0, 3), (20, 1)])).unwrap();

        assert_eq!(totals[&key(0)], 5);
        assert_eq!(totals[&key(20)], 1);
    }

    #[test]
    fn test_fold_take_rejects_malformed() {
        let mut totals = BTreeMap::new();
        let err = fold_take(&mut totals, json!({ "result": "nope" })).unwrap_err();
        assert!(matches!(err, Error::Coverage { .. }));
    }

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label("scroll down / fast"), "scroll_down___fast");
        assert_eq!(sanitize_label("hints::link-1.v2"), "hints__link-1.v2");
        assert_eq!(sanitize_label("../.."), "_");
        assert_eq!(sanitize_label(""), "unnamed");
    }

    #[tokio::test]
    async fn test_persist_writes_labelled_json() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _remote) = session_pair().await;
        let tracker = CoverageTracker::new(session, dir.path().join("cov"));

        let d = delta(&snapshot(1, &[]), &snapshot(2, &[(0, 2)]));
        let path = tracker.persist(&d, "tab close").unwrap();

        assert_eq!(path, dir.path().join("cov").join("tab_close.json"));
        let written: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["label"], "tab close");
        assert_eq!(written["entries"][0]["hits"], 2);
        assert_eq!(written["entries"][0]["function_name"], "onKey");
    }

    #[tokio::test]
    async fn test_colliding_labels_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _remote) = session_pair().await;
        let tracker = CoverageTracker::new(session, dir.path());
        let d = delta(&snapshot(1, &[]), &snapshot(2, &[(0, 1)]));

        let spaced = tracker.persist(&d, "a b").unwrap();
        let underscored = tracker.persist(&d, "a_b").unwrap();
        let again = tracker.persist(&d, "a b").unwrap();

        assert_eq!(spaced, dir.path().join("a_b.json"));
        assert_eq!(underscored, dir.path().join("a_b-2.json"));
        assert_eq!(again, spaced);

        let written: Value = serde_json::from_slice(&fs::read(&underscored).unwrap()).unwrap();
        assert_eq!(written["label"], "a_b");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_timed_out_take_degrades_and_tracker_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let (connection, mut remote) = connected_pair().await;
        let options = SessionOptions::new().with_command_timeout(Duration::from_millis(50));
        let session = Session::from_connection(connection, options);
        let tracker = Arc::new(CoverageTracker::new(session.clone(), dir.path()));

        let started = tokio::spawn({
            let tracker = Arc::clone(&tracker);
            async move {
                tracker.start().await?;
                Ok::<_, Error>(tracker.checkpoint().await)
            }
        });
        answer(&mut remote, "Profiler.enable", json!({})).await;
        answer(&mut remote, "Profiler.startPreciseCoverage", json!({})).await;
        answer(&mut remote, "Profiler.takePreciseCoverage", take_reply(&[(0, 1)])).await;
        let before = started.await.expect("join").expect("start");
        assert!(before.is_some());

        // Takes go unanswered until the command deadline passes
        assert!(tracker.checkpoint().await.is_none());
        assert!(tracker.finish_test("slow take", before.clone()).await.is_none());
        assert!(tracker.is_started());
        assert_eq!(session.connection().pending_count(), 0);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

        for _ in 0..2 {
            let request = next_json(&mut remote).await;
            assert_eq!(request["method"], "Profiler.takePreciseCoverage");
        }

        let finished = tokio::spawn({
            let tracker = Arc::clone(&tracker);
            async move { tracker.finish_test("after recovery", before).await }
        });
        answer(&mut remote, "Profiler.takePreciseCoverage", take_reply(&[(0, 2)])).await;

        let path = finished.await.expect("join").expect("delta written");
        let written: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["entries"][0]["hits"], 2);
    }

    #[tokio::test]
    async fn test_lifecycle_against_remote() {
        let (session, mut remote) = session_pair().await;
        let tracker = Arc::new(session.coverage_tracker());

        let start = tokio::spawn({
            let tracker = Arc::clone(&tracker);
            async move { tracker.start().await }
        });
        answer(&mut remote, "Profiler.enable", json!({})).await;
        let request = next_json(&mut remote).await;
        assert_eq!(request["method"], "Profiler.startPreciseCoverage");
        assert_eq!(request["params"]["callCount"], true);
        assert_eq!(request["params"]["detailed"], true);
        push_json(&mut remote, json!({ "id": request["id"], "result": {} })).await;
        start.await.expect("join").expect("start");
        assert!(tracker.is_started());

        let err = tracker.start().await.unwrap_err();
        assert!(matches!(err, Error::Coverage { .. }));

        let first = tokio::spawn({
            let tracker = Arc::clone(&tracker);
            async move { tracker.snapshot().await }
        });
        answer(&mut remote, "Profiler.takePreciseCoverage", take_reply(&[(0, 2)])).await;
        let first = first.await.expect("join").expect("snapshot");

        let second = tokio::spawn({
            let tracker = Arc::clone(&tracker);
            async move { tracker.snapshot().await }
        });
        answer(&mut remote, "Profiler.takePreciseCoverage", take_reply(&[(0, 1)])).await;
        let second = second.await.expect("join").expect("snapshot");

        assert_eq!(first.hits(&key(0)), 2);
        assert_eq!(second.hits(&key(0)), 3);
        assert_eq!(delta(&first, &second).total_hits(), 1);

        let stop = tokio::spawn({
            let tracker = Arc::clone(&tracker);
            async move { tracker.stop().await }
        });
        answer(&mut remote, "Profiler.stopPreciseCoverage", json!({})).await;
        answer(&mut remote, "Profiler.disable", json!({})).await;
        stop.await.expect("join").expect("stop");
        assert!(!tracker.is_started());
    }

    #[tokio::test]
    async fn test_checkpoint_degrades_to_none() {
        let (session, _remote) = session_pair().await;
        let tracker = session.coverage_tracker();

        assert!(tracker.checkpoint().await.is_none());
        assert!(tracker.finish_test("never-started", None).await.is_none());
    }

    proptest! {
        #[test]
        fn prop_delta_never_negative(
            before in proptest::collection::btree_map(0u64..16, 0u64..1000, 0..16),
            after in proptest::collection::btree_map(0u64..16, 0u64..1000, 0..16),
        ) {
            let before: Vec<_> = before.into_iter().collect();
            let after: Vec<_> = after.into_iter().collect();
            let b = snapshot(1, &before);
            let a = snapshot(2, &after);

            for entry in delta(&b, &a).entries {
                prop_assert!(entry.hits > 0);
                prop_assert!(entry.hits <= a.hits(&entry.range));
                prop_assert_eq!(entry.hits, a.hits(&entry.range) - b.hits(&entry.range));
            }
        }

        #[test]
        fn prop_cumulative_snapshots_are_monotonic(
            takes in proptest::collection::vec(
                proptest::collection::vec((0u64..8, 0u64..50), 0..8),
                1..6,
            ),
        ) {
            let mut totals = BTreeMap::new();
            let mut previous = BTreeMap::new();

            for take in takes {
                fold_take(&mut totals, take_reply(&take)).unwrap();
                for (range, &hits) in &previous {
                    prop_assert!(totals[range] >= hits);
                }
                previous = totals.clone();
            }
        }
    }
}
