// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StateError;

pub const STATE_FILENAME: &str = "podcast_state.json";

/// Per-show watermarks and the last completed run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// When the last run completed, for observability only
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    /// Release date of the newest episode already processed, keyed by show id
    #[serde(default, rename = "show_latest_release")]
    watermarks: BTreeMap<String, NaiveDate>,
}

impl State {
    /// The stored watermark for a show, if any
    pub fn watermark(&self, show_id: &str) -> Option<NaiveDate> {
        self.watermarks.get(show_id).copied()
    }

    /// The stored watermark, or `floor` when the show has none
    pub fn get_watermark(&self, show_id: &str, floor: NaiveDate) -> NaiveDate {
        self.watermark(show_id).unwrap_or(floor)
    }

    /// Move a show's watermark forward to `date`.
    ///
    /// Never moves a watermark backwards. Returns `true` if the stored value changed.
    pub fn advance_watermark(&mut self, show_id: &str, date: NaiveDate) -> bool {
        match self.watermarks.get_mut(show_id) {
            Some(current) if *current >= date => false,
            Some(current) => {
                *current = date;
                true
            }
            None => {
                self.watermarks.insert(show_id.to_string(), date);
                true
            }
        }
    }

    pub fn record_run(&mut self, finished_at: DateTime<Utc>) {
        self.last_run = Some(finished_at);
    }

    pub fn show_count(&self) -> usize {
        self.watermarks.len()
    }
}

/// JSON file holding the [`State`] between runs
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at the default filename inside `data_dir`
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(STATE_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted state.
    ///
    /// A missing or unreadable file yields the default state, which makes the
    /// next run rescan everything inside the lookback window.
    pub fn load(&self) -> State {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "state file not found, starting fresh");
                return State::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not read state file");
                return State::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not parse state file");
                State::default()
            }
        }
    }

    /// Persist the full state, replacing the previous file atomically
    pub fn save(&self, state: &State) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StateError::CreateDirectoryFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(state)?;

        // Unique per process so concurrent invocations never share a temp file
        let tmp_path = self
            .path
            .with_extension(format!("json.{}.tmp", std::process::id()));

        std::fs::write(&tmp_path, json).map_err(|e| StateError::WriteFailed {
            path: tmp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp_path);
            StateError::WriteFailed {
                path: self.path.clone(),
                source: e,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn load_missing_file_returns_default() {
        let dir = tempdir().unwrap();
        let store = StateStore::in_dir(dir.path());

        let state = store.load();

        assert_eq!(state, State::default());
        assert!(state.last_run.is_none());
    }

    #[test]
    fn load_corrupt_file_returns_default() {
        let dir = tempdir().unwrap();
        let store = StateStore::in_dir(dir.path());
        std::fs::write(store.path(), "{ not json").unwrap();

        assert_eq!(store.load(), State::default());
    }

    #[test]
    fn get_watermark_falls_back_to_floor() {
        let mut state = State::default();
        state.advance_watermark("known", date(2024, 1, 5));

        assert_eq!(state.get_watermark("known", date(2024, 1, 1)), date(2024, 1, 5));
        assert_eq!(state.get_watermark("unknown", date(2024, 1, 3)), date(2024, 1, 3));
    }

    #[test]
    fn advance_watermark_never_moves_backwards() {
        let mut state = State::default();

        assert!(state.advance_watermark("show", date(2024, 1, 9)));
        assert!(!state.advance_watermark("show", date(2024, 1, 2)));
        assert!(!state.advance_watermark("show", date(2024, 1, 9)));
        assert_eq!(state.watermark("show"), Some(date(2024, 1, 9)));

        assert!(state.advance_watermark("show", date(2024, 1, 12)));
        assert_eq!(state.watermark("show"), Some(date(2024, 1, 12)));
    }

    #[test]
    fn save_then_load_preserves_watermarks_and_last_run() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested").join(STATE_FILENAME));

        let mut state = State::default();
        state.advance_watermark("show-b", date(2024, 1, 9));
        state.advance_watermark("show-a", date(2023, 12, 31));
        state.record_run("2024-01-10T08:00:00Z".parse().unwrap());

        store.save(&state).unwrap();
        let loaded = store.load();

        assert_eq!(loaded, state);
        assert_eq!(loaded.show_count(), 2);
    }

    #[test]
    fn save_writes_readable_json_and_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let store = StateStore::in_dir(dir.path());

        let mut state = State::default();
        state.advance_watermark("show-1", date(2024, 1, 9));
        store.save(&state).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(json["show_latest_release"]["show-1"], "2024-01-09");
        assert!(json["last_run"].is_null());

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn failed_write_keeps_previous_file() {
        let dir = tempdir().unwrap();
        let store = StateStore::in_dir(dir.path());

        let mut previous = State::default();
        previous.advance_watermark("show", date(2024, 1, 5));
        store.save(&previous).unwrap();

        // Occupy the temp path so the write cannot happen
        let tmp_path = store
            .path()
            .with_extension(format!("json.{}.tmp", std::process::id()));
        std::fs::create_dir(&tmp_path).unwrap();

        let mut next = previous.clone();
        next.advance_watermark("show", date(2024, 1, 9));
        let result = store.save(&next);

        assert!(matches!(result, Err(StateError::WriteFailed { .. })));
        assert_eq!(store.load(), previous);
    }

    #[test]
    fn save_onto_directory_fails_without_leftovers() {
        let dir = tempdir().unwrap();
        let target = dir.path().join(STATE_FILENAME);
        std::fs::create_dir(&target).unwrap();
        let store = StateStore::new(target.clone());

        let result = store.save(&State::default());

        assert!(matches!(
            result,
            Err(StateError::WriteFailed { ref path, .. }) if *path == target
        ));
        assert!(target.is_dir());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn loads_state_written_with_offset_timestamps() {
        let dir = tempdir().unwrap();
        let store = StateStore::in_dir(dir.path());
        std::fs::write(
            store.path(),
            r#"{
  "last_run": "2024-01-10T08:00:00.123456+00:00",
  "show_latest_release": {"abc": "2024-01-09"}
}"#,
        )
        .unwrap();

        let state = store.load();

        assert_eq!(state.watermark("abc"), Some(date(2024, 1, 9)));
        assert!(state.last_run.is_some());
    }
}
