//! FlashForge command encoding and reply decoding.
//!
//! Requests are single G-code words prefixed with `~`. Replies look like:
//!
//! ```text
//! CMD M105 Received.
//! T0:210.0/215.0 T1:0.0/0.0 B:60.0/60.0
//! ok
//! ```
//!
//! The header must name the command that was sent and the reply must end
//! with the `ok` line. Body tokens that do not parse are skipped; fields
//! whose token is missing decode as [`Reading::Unknown`].

use serde::Serialize;

use crate::error::ParseError;
use crate::status::{FieldId, FieldValue, MachineStatus, MoveMode, Reading, StatusField};

/// Final line of every reply.
pub const TERMINATOR: &[u8] = b"ok\r\n";

/// One narrow telemetry query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum QueryKind {
    /// Nozzle and bed temperatures (`M105`).
    Temperature,
    /// Print progress (`M27`).
    Progress,
    /// Machine status, move mode and active file (`M119`).
    MachineState,
    /// Layer counter (`M27`, layer line only).
    Layer,
}

impl QueryKind {
    /// Order in which a poll cycle issues the queries.
    pub const SEQUENCE: [QueryKind; 4] = [
        QueryKind::Temperature,
        QueryKind::Progress,
        QueryKind::MachineState,
        QueryKind::Layer,
    ];

    /// G-code word sent for this query.
    pub fn command(self) -> &'static str {
        match self {
            Self::Temperature => "M105",
            Self::Progress | Self::Layer => "M27",
            Self::MachineState => "M119",
        }
    }

    /// Fields this query is responsible for.
    pub fn fields(self) -> &'static [FieldId] {
        match self {
            Self::Temperature => &[
                FieldId::NozzleTempActual,
                FieldId::NozzleTempTarget,
                FieldId::BedTempActual,
                FieldId::BedTempTarget,
            ],
            Self::Progress => &[FieldId::ProgressPercent],
            Self::MachineState => &[
                FieldId::MachineStatus,
                FieldId::MoveMode,
                FieldId::CurrentFile,
            ],
            Self::Layer => &[FieldId::CurrentLayer],
        }
    }
}

/// Reply bytes from one round trip, tagged with the query that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// Originating query.
    pub query: QueryKind,
    /// Reply bytes including the terminator.
    pub bytes: Vec<u8>,
}

impl RawResponse {
    /// Wrap reply bytes.
    pub fn new(query: QueryKind, bytes: Vec<u8>) -> Self {
        Self { query, bytes }
    }
}

/// Request bytes for a query.
pub fn encode(kind: QueryKind) -> Vec<u8> {
    format!("~{}\r\n", kind.command()).into_bytes()
}

/// Decode a reply into the fields owned by `kind`.
///
/// Every owned field is returned, known or unknown.
pub fn decode(kind: QueryKind, raw: &RawResponse) -> Result<Vec<StatusField>, ParseError> {
    let text = String::from_utf8_lossy(&raw.bytes);
    let body = unframe(kind, &text)?;

    let mut fields: Vec<StatusField> = kind
        .fields()
        .iter()
        .map(|&id| StatusField::unknown(id))
        .collect();

    let mut set = |id: FieldId, value: FieldValue| {
        if let Some(f) = fields.iter_mut().find(|f| f.id == id) {
            f.reading = Reading::Known(value);
        }
    };

    match kind {
        QueryKind::Temperature => {
            for (label, actual, target) in body.iter().copied().flat_map(temperature_tokens) {
                let (actual_id, target_id) = match label.as_str() {
                    "T0" => (FieldId::NozzleTempActual, FieldId::NozzleTempTarget),
                    "B" => (FieldId::BedTempActual, FieldId::BedTempTarget),
                    _ => continue,
                };
                if let Some(v) = actual {
                    set(actual_id, FieldValue::Number(v));
                }
                if let Some(v) = target {
                    set(target_id, FieldValue::Number(v));
                }
            }
        }
        QueryKind::Progress => {
            for line in &body {
                let Some(rest) = line.strip_prefix("SD printing byte") else {
                    continue;
                };
                if let Some(pct) = fraction(rest).and_then(|(done, total)| percent(done, total)) {
                    set(FieldId::ProgressPercent, FieldValue::Number(pct));
                }
            }
        }
        QueryKind::Layer => {
            for (key, value) in body.iter().copied().filter_map(labelled) {
                if key.eq_ignore_ascii_case("layer") {
                    let current = value.split('/').next().unwrap_or_default().trim();
                    if let Ok(n) = current.parse::<u32>() {
                        set(FieldId::CurrentLayer, FieldValue::Integer(n));
                    }
                }
            }
        }
        QueryKind::MachineState => {
            for (key, value) in body.iter().copied().filter_map(labelled) {
                match key.to_ascii_lowercase().as_str() {
                    "machinestatus" if !value.is_empty() => set(
                        FieldId::MachineStatus,
                        FieldValue::MachineStatus(MachineStatus::from_device(value)),
                    ),
                    "movemode" if !value.is_empty() => set(
                        FieldId::MoveMode,
                        FieldValue::MoveMode(MoveMode::from_device(value)),
                    ),
                    "currentfile" => set(FieldId::CurrentFile, FieldValue::Text(value.to_string())),
                    _ => {}
                }
            }
        }
    }

    Ok(fields)
}

/// Check header and terminator, returning the body lines.
fn unframe<'a>(kind: QueryKind, text: &'a str) -> Result<Vec<&'a str>, ParseError> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let (Some(first), Some(last)) = (lines.first(), lines.last()) else {
        return Err(ParseError::Empty);
    };
    if !last.eq_ignore_ascii_case("ok") {
        return Err(ParseError::MissingTerminator);
    }

    let expected = format!("CMD {} Received.", kind.command());
    if !first.eq_ignore_ascii_case(&expected) {
        return Err(ParseError::Framing(format!(
            "expected {expected:?}, got {first:?}"
        )));
    }

    Ok(lines[1..lines.len() - 1].to_vec())
}

/// Split `Key: value` lines.
fn labelled(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    Some((key.trim(), value.trim()))
}

/// Parse `a/b` into two numbers.
fn fraction(s: &str) -> Option<(f64, f64)> {
    let (a, b) = s.split_once('/')?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}

/// Percentage in `0..=100`; `None` for negative or non-finite counters.
fn percent(done: f64, total: f64) -> Option<f64> {
    if !done.is_finite() || !total.is_finite() || done < 0.0 || total < 0.0 {
        return None;
    }
    if total == 0.0 {
        return Some(0.0);
    }
    Some((done * 100.0 / total).clamp(0.0, 100.0))
}

/// Tokens like `T0:210.0/215.0`; either number may be missing or malformed.
fn temperature_tokens(line: &str) -> Vec<(String, Option<f64>, Option<f64>)> {
    // Some firmware prints `T0:26.0 /0.0`.
    let joined = line.replace(" /", "/").replace("/ ", "/");
    joined
        .split_whitespace()
        .filter_map(|token| {
            let (label, value) = token.split_once(':')?;
            let (actual, target) = value.split_once('/').unwrap_or((value, ""));
            Some((label.to_string(), actual.parse::<f64>().ok(), target.parse::<f64>().ok()))
        })
        .collect()
}
