//! Compressed save-stream codec.
//!
//! A saved game is a zlib-compressed UTF-8 JSON object with three fields:
//! `field` (the field's textual form), `states` (the full undo history as
//! state strings, oldest first) and `time` (elapsed centiseconds).
//!
//! Unknown top-level keys are warned about and skipped; a missing key or a
//! wrong value type is fatal. Individual state strings that fail to parse
//! are skipped with a warning so one corrupt history entry does not lose
//! the whole save.

use std::io::{Read, Write};
use std::sync::Arc;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::core::{Field, GameState};
use crate::error::{GameError, GameResult};

const KEY_FIELD: &str = "field";
const KEY_STATES: &str = "states";
const KEY_TIME: &str = "time";

/// Write a compressed save payload.
pub(crate) fn encode<W: Write>(
    field: &Field,
    states: &[GameState],
    time: u64,
    writer: W,
) -> GameResult<()> {
    let doc = json!({
        KEY_FIELD: field.to_string(),
        KEY_STATES: states.iter().map(ToString::to_string).collect::<Vec<_>>(),
        KEY_TIME: time,
    });

    let mut encoder = ZlibEncoder::new(writer, Compression::default());
    serde_json::to_writer(&mut encoder, &doc)?;
    encoder.finish()?;
    Ok(())
}

/// Read and fully validate a compressed save payload.
///
/// Nothing is committed anywhere: the caller decides what to do with the
/// parsed field, history and elapsed time, which keeps a failed load from
/// touching a live game.
pub(crate) fn decode<R: Read>(reader: R) -> GameResult<(Arc<Field>, Vec<GameState>, u64)> {
    let mut text = String::new();
    ZlibDecoder::new(reader).read_to_string(&mut text)?;

    let doc: Value = serde_json::from_str(&text)?;
    let obj = doc
        .as_object()
        .ok_or_else(|| GameError::parse("save payload is not an object"))?;

    for key in obj.keys() {
        if !matches!(key.as_str(), KEY_FIELD | KEY_STATES | KEY_TIME) {
            warn!(key, "unknown field in save payload, skipping");
        }
    }

    let field_text = obj
        .get(KEY_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| GameError::parse("missing or non-string `field`"))?;
    info!("parsing field");
    let field = Arc::new(field_text.parse::<Field>()?);

    let raw_states = obj
        .get(KEY_STATES)
        .and_then(Value::as_array)
        .ok_or_else(|| GameError::parse("missing or non-list `states`"))?;

    let time = obj
        .get(KEY_TIME)
        .and_then(Value::as_u64)
        .ok_or_else(|| GameError::parse("missing or non-integer `time`"))?;

    let mut states = Vec::with_capacity(raw_states.len());
    for (idx, raw) in raw_states.iter().enumerate() {
        let Some(state_text) = raw.as_str() else {
            warn!(idx, "non-string game state in save payload, skipping");
            continue;
        };
        match GameState::parse(state_text, field.clone()) {
            Ok(state) => states.push(state),
            Err(err) => warn!(idx, error = %err, "unparsable game state, skipping"),
        }
    }

    Ok((field, states, time))
}
