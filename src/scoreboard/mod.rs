//! Persisted best-time records, keyed by board shape.
//!
//! The scoreboard owns its backing file exclusively. Records are stored as
//! a JSON object mapping `"d0:d1:...:bombs"` keys to lists of
//! `[name, centiseconds]` pairs. Individually malformed keys or entries
//! are skipped with a logged warning; they never abort loading the rest
//! of the file.
//!
//! Updates are read-modify-write, so writers take an exclusive file lock
//! for the whole cycle.

use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::core::{Dims, Field};
use crate::error::{GameError, GameResult};

const KEY_SEP: char = ':';

/// A single record: player name and elapsed centiseconds.
pub type ScoreEntry = (String, u64);

/// Best-time records backed by a JSON file.
pub struct Scoreboard {
    path: PathBuf,
    scores: FxHashMap<String, Vec<ScoreEntry>>,
}

impl Scoreboard {
    /// Conventional scoreboard file name.
    pub const DEFAULT_FILE: &'static str = "scores.dat";

    /// Load the scoreboard, creating an empty file when missing.
    ///
    /// I/O failures and a syntactically invalid JSON document are errors;
    /// everything below that level degrades entry by entry.
    pub fn open(path: impl AsRef<Path>) -> GameResult<Self> {
        let path = path.as_ref().to_path_buf();
        info!(path = %path.display(), "loading scoreboard");

        if !path.exists() {
            info!("scoreboard file is missing and will be created");
            fs::write(&path, "{}")?;
        }

        let text = fs::read_to_string(&path)?;
        let doc: Value = serde_json::from_str(&text)?;
        let scores = check(doc);

        info!("scoreboard loaded");
        Ok(Self { path, scores })
    }

    /// Append a record for the given field shape and persist it.
    ///
    /// The backing file is re-read under an exclusive lock before writing,
    /// so concurrent writers never lose each other's records.
    pub fn add_score(&mut self, field: &Field, name: &str, centis: u64) -> GameResult<()> {
        if centis == 0 {
            return Err(GameError::InvalidScore);
        }

        let key = key_for(field.size(), field.bomb_count());
        info!(%key, name, centis, "adding scoreboard record");

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)?;
        file.lock_exclusive()?;

        let result = Self::locked_update(&mut file, &key, name, centis);
        let _ = file.unlock();

        self.scores = result?;
        info!("record written");
        Ok(())
    }

    fn locked_update(
        file: &mut fs::File,
        key: &str,
        name: &str,
        centis: u64,
    ) -> GameResult<FxHashMap<String, Vec<ScoreEntry>>> {
        let mut text = String::new();
        file.read_to_string(&mut text)?;

        let doc: Value = if text.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&text).unwrap_or_else(|err| {
                warn!(error = %err, "scoreboard file is corrupt, rewriting");
                Value::Object(Default::default())
            })
        };

        let mut scores = check(doc);
        scores
            .entry(key.to_string())
            .or_default()
            .push((name.to_string(), centis));

        let payload = serde_json::to_string(&scores)?;
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(payload.as_bytes())?;
        Ok(scores)
    }

    /// Board shapes present in the scoreboard.
    pub fn params(&self) -> impl Iterator<Item = (Dims, usize)> + '_ {
        self.scores.keys().filter_map(|key| parse_key(key))
    }

    /// Records for one board shape, sorted ascending by time.
    #[must_use]
    pub fn scores(&self, dims: &[usize], bombs: usize) -> Vec<ScoreEntry> {
        let key = key_for(dims, bombs);
        let mut entries = self.scores.get(&key).cloned().unwrap_or_default();
        entries.sort_by_key(|(_, time)| *time);
        entries
    }
}

fn key_for(dims: &[usize], bombs: usize) -> String {
    let mut parts: Vec<String> = dims.iter().map(ToString::to_string).collect();
    parts.push(bombs.to_string());
    parts.join(&KEY_SEP.to_string())
}

fn parse_key(key: &str) -> Option<(Dims, usize)> {
    let mut parts: Vec<usize> = Vec::new();
    for part in key.split(KEY_SEP) {
        parts.push(part.parse().ok()?);
    }
    if parts.len() < 3 {
        return None;
    }
    let bombs = parts.pop()?;
    Some((Dims::from_slice(&parts), bombs))
}

/// Validate a loaded document entry by entry, keeping whatever is usable.
fn check(doc: Value) -> FxHashMap<String, Vec<ScoreEntry>> {
    info!("checking scoreboard data");
    let mut result = FxHashMap::default();

    let Value::Object(entries) = doc else {
        error!("scoreboard data is not an object, nothing loaded");
        return result;
    };

    let mut skipped = 0usize;
    for (key, values) in entries {
        let Some((dims, bombs)) = parse_key(&key) else {
            warn!(%key, "malformed scoreboard key, skipping");
            skipped += 1;
            continue;
        };
        if dims.iter().any(|&d| d == 0) || bombs == 0 {
            warn!(%key, "non-positive scoreboard key component, skipping");
            skipped += 1;
            continue;
        }

        let Value::Array(values) = values else {
            warn!(%key, "scoreboard entry is not a list, skipping");
            skipped += 1;
            continue;
        };

        let mut items = Vec::with_capacity(values.len());
        for value in values {
            match score_item(&value) {
                Some(item) => items.push(item),
                None => {
                    warn!(%key, %value, "malformed scoreboard item, skipping");
                    skipped += 1;
                }
            }
        }
        result.insert(key, items);
    }

    if skipped > 0 {
        warn!(skipped, "scoreboard file has errors");
    }
    result
}

fn score_item(value: &Value) -> Option<ScoreEntry> {
    let pair = value.as_array()?;
    if pair.len() != 2 {
        return None;
    }
    let name = pair[0].as_str()?;
    let time = pair[1].as_u64()?;
    if time == 0 {
        return None;
    }
    Some((name.to_string(), time))
}
