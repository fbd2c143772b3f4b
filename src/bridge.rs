//! Serializing access to the scripting bridge
//!
//! Mail is a single shared resource: every script goes through one
//! [`ScriptBridge`] so that no two scripts run against the application at the
//! same time. Waiters are serviced in arrival order (`tokio::sync::Mutex` is
//! fair). A script that has been issued runs to completion even if the caller
//! stops waiting, because the lock guard moves into the task running it.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::applescript::{ScriptRunner, ScriptValue};
use crate::errors::{AppError, AppResult};

/// Handle to the exclusive script execution context
///
/// Cheap to clone; all clones share the same lock and runner.
pub struct ScriptBridge<R> {
    runner: Arc<Mutex<R>>,
}

impl<R> Clone for ScriptBridge<R> {
    fn clone(&self) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
        }
    }
}

impl<R: ScriptRunner> ScriptBridge<R> {
    /// Wrap a runner in a serializing bridge
    pub fn new(runner: R) -> Self {
        Self {
            runner: Arc::new(Mutex::new(runner)),
        }
    }

    /// Run one script with exclusive access to the application
    ///
    /// # Errors
    ///
    /// - `ScriptExecutionFailed` / `ScriptCreationFailed` from the runner
    /// - `Internal` if the execution task panicked
    pub async fn execute(&self, source: String) -> AppResult<ScriptValue> {
        let runner = Arc::clone(&self.runner).lock_owned().await;
        let task = tokio::spawn(async move {
            let started = Instant::now();
            tracing::trace!(script = %source, "running AppleScript");
            let result = runner.run(&source).await;
            tracing::debug!(
                elapsed_ms = duration_ms(started),
                ok = result.is_ok(),
                "AppleScript finished"
            );
            result
        });
        task.await
            .map_err(|e| AppError::Internal(format!("script task failed: {e}")))?
    }

    /// Run a script and read its result as scalar text
    pub async fn run_text(&self, source: String) -> AppResult<String> {
        Ok(self.execute(source).await?.into_text())
    }

    /// Run a script and read its result as a list of scalar items
    pub async fn run_list(&self, source: String) -> AppResult<Vec<String>> {
        Ok(self.execute(source).await?.into_items())
    }

    /// Run a script returning one record as a positional list
    pub async fn run_cells(&self, source: String) -> AppResult<Vec<String>> {
        Ok(self.execute(source).await?.into_cells())
    }

    /// Run a script returning a list of positional rows
    pub async fn run_rows(&self, source: String) -> AppResult<Vec<Vec<String>>> {
        Ok(self.execute(source).await?.into_rows())
    }

    /// Run a script and compare its result with `"true"`
    pub async fn run_bool(&self, source: String) -> AppResult<bool> {
        Ok(self.run_text(source).await? == "true")
    }
}

/// Calculate elapsed milliseconds, saturating at `u64::MAX`
pub fn duration_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Parse an integer result, falling back to `default` on failure
pub fn parse_int(text: &str, default: i64) -> i64 {
    text.trim().parse::<i64>().unwrap_or(default)
}

/// Parse a boolean result by comparing with `"true"`
pub fn parse_bool(text: &str) -> bool {
    text == "true"
}

/// Zip parallel field lists into records, stopping at the shortest list
///
/// Mail answers each field query independently, so the lists can disagree in
/// length when mailbox contents change between queries. Rows beyond the
/// shortest list are dropped.
pub fn zip_columns(columns: Vec<(&str, Vec<String>)>) -> Vec<Map<String, Value>> {
    let rows = columns.iter().map(|(_, values)| values.len()).min().unwrap_or(0);
    if columns.iter().any(|(_, values)| values.len() != rows) {
        tracing::warn!(
            lengths = ?columns.iter().map(|(field, values)| (*field, values.len())).collect::<Vec<_>>(),
            kept = rows,
            "field lists disagree in length; truncating to the shortest"
        );
    }

    let mut records: Vec<Map<String, Value>> = (0..rows).map(|_| Map::new()).collect();
    for (field, values) in columns {
        for (record, value) in records.iter_mut().zip(values) {
            record.insert(field.to_owned(), Value::String(value));
        }
    }
    records
}

/// Name the cells of each row; rows with too few cells are skipped
pub fn rows_to_records(fields: &[&str], rows: Vec<Vec<String>>) -> Vec<Map<String, Value>> {
    rows.into_iter()
        .filter(|row| row.len() >= fields.len())
        .map(|row| {
            fields
                .iter()
                .zip(row)
                .map(|(field, cell)| ((*field).to_owned(), Value::String(cell)))
                .collect()
        })
        .collect()
}

/// Scripted runner that records every script it receives
#[cfg(test)]
pub(crate) mod fake {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use crate::applescript::{ScriptRunner, ScriptValue};
    use crate::errors::AppResult;

    #[derive(Clone, Default)]
    pub(crate) struct RecordingRunner {
        scripts: Arc<Mutex<Vec<String>>>,
        replies: Arc<Mutex<VecDeque<AppResult<ScriptValue>>>>,
    }

    impl RecordingRunner {
        /// Queue the result of the next script; unqueued scripts return `missing value`
        pub(crate) fn reply(&self, result: AppResult<ScriptValue>) -> &Self {
            self.replies.lock().expect("replies lock").push_back(result);
            self
        }

        pub(crate) fn reply_text(&self, text: &str) -> &Self {
            self.reply(Ok(ScriptValue::Text(text.to_owned())))
        }

        pub(crate) fn reply_list(&self, items: &[&str]) -> &Self {
            self.reply(Ok(ScriptValue::List(
                items
                    .iter()
                    .map(|item| ScriptValue::Text((*item).to_owned()))
                    .collect(),
            )))
        }

        pub(crate) fn scripts(&self) -> Vec<String> {
            self.scripts.lock().expect("scripts lock").clone()
        }
    }

    impl ScriptRunner for RecordingRunner {
        async fn run(&self, source: &str) -> AppResult<ScriptValue> {
            self.scripts
                .lock()
                .expect("scripts lock")
                .push(source.to_owned());
            self.replies
                .lock()
                .expect("replies lock")
                .pop_front()
                .unwrap_or(Ok(ScriptValue::Missing))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use tokio::sync::Notify;

    use super::fake::RecordingRunner;
    use super::{ScriptBridge, duration_ms, parse_int, rows_to_records, zip_columns};
    use crate::applescript::{ScriptRunner, ScriptValue};
    use crate::errors::AppResult;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_owned()).collect()
    }

    #[test]
    fn zip_truncates_to_shortest_column() {
        let records = zip_columns(vec![
            ("id", strings(&["1", "2", "3", "4", "5"])),
            ("subject", strings(&["a", "b", "c", "d", "e"])),
            ("sender", strings(&["x", "y", "z"])),
        ]);
        assert_eq!(records.len(), 3);
        assert_eq!(records[2]["id"], "3");
        assert_eq!(records[2]["subject"], "c");
        assert_eq!(records[2]["sender"], "z");
    }

    #[test]
    fn zip_of_no_columns_is_empty() {
        assert!(zip_columns(Vec::new()).is_empty());
    }

    #[test]
    fn rows_become_named_records() {
        let records = rows_to_records(
            &["id", "subject"],
            vec![strings(&["1", "Hello"]), strings(&["2"]), strings(&["3", "Bye", "x"])],
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["subject"], "Hello");
        assert_eq!(records[1]["id"], "3");
        assert!(!records[1].contains_key("x"));
    }

    #[test]
    fn parse_int_uses_default_on_garbage() {
        assert_eq!(parse_int(" 12 ", 0), 12);
        assert_eq!(parse_int("", 0), 0);
        assert_eq!(parse_int("soon", -1), -1);
    }

    /// Records the highest number of scripts observed running at once
    struct OverlapProbe {
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl ScriptRunner for OverlapProbe {
        async fn run(&self, _source: &str) -> AppResult<ScriptValue> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(ScriptValue::Text("done".to_owned()))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn scripts_never_overlap() {
        let peak = Arc::new(AtomicUsize::new(0));
        let bridge = ScriptBridge::new(OverlapProbe {
            running: Arc::new(AtomicUsize::new(0)),
            peak: Arc::clone(&peak),
        });

        let calls = (0..8).map(|i| {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.run_text(format!("return {i}")).await })
        });
        for call in calls.collect::<Vec<_>>() {
            let text = call.await.expect("task must join").expect("script must succeed");
            assert_eq!(text, "done");
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn duration_ms_counts_elapsed_time() {
        let started = Instant::now();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(duration_ms(started) >= 5);
    }

    #[tokio::test]
    async fn waiters_run_in_arrival_order() {
        let runner = RecordingRunner::default();
        let bridge = ScriptBridge::new(runner.clone());
        let held = bridge.runner.lock().await;

        let mut calls = Vec::new();
        for i in 0..5 {
            let bridge = bridge.clone();
            calls.push(tokio::spawn(async move {
                bridge.execute(format!("return {i}")).await
            }));
            // let the call queue on the lock before issuing the next one
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(runner.scripts().is_empty());

        drop(held);
        for call in calls {
            call.await.expect("task must join").expect("script must succeed");
        }
        assert_eq!(
            runner.scripts(),
            strings(&["return 0", "return 1", "return 2", "return 3", "return 4"])
        );
    }

    /// Signals when a script starts and records it once finished
    struct SlowRunner {
        started: Arc<Notify>,
        finished: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptRunner for SlowRunner {
        async fn run(&self, source: &str) -> AppResult<ScriptValue> {
            self.started.notify_one();
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.finished
                .lock()
                .expect("finished lock")
                .push(source.to_owned());
            Ok(ScriptValue::Text("done".to_owned()))
        }
    }

    #[tokio::test]
    async fn issued_script_completes_when_caller_is_aborted() {
        let started = Arc::new(Notify::new());
        let finished = Arc::new(Mutex::new(Vec::new()));
        let bridge = ScriptBridge::new(SlowRunner {
            started: Arc::clone(&started),
            finished: Arc::clone(&finished),
        });

        let caller = {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.run_text("first".to_owned()).await })
        };
        started.notified().await;
        caller.abort();
        let joined = caller.await;
        assert!(joined.expect_err("caller must be cancelled").is_cancelled());

        // the next script only gets the lock once the first has finished
        let text = bridge
            .run_text("second".to_owned())
            .await
            .expect("script must succeed");
        assert_eq!(text, "done");
        assert_eq!(
            *finished.lock().expect("finished lock"),
            strings(&["first", "second"])
        );
    }
}
