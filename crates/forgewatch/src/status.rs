//! Printer status types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Machine state as reported by `M119`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MachineStatus {
    /// Idle and ready for a job.
    Ready,
    /// Printing from storage.
    Building,
    /// Print paused.
    Paused,
    /// Print finished.
    Completed,
    /// Busy with a non-print operation (homing, calibration, loading).
    Busy,
    /// Firmware reports an error.
    Error,
    /// Anything else, kept verbatim.
    Other(String),
}

impl MachineStatus {
    /// Parse from the device word, e.g. `BUILDING_FROM_SD`.
    pub fn from_device(word: &str) -> Self {
        match word.to_ascii_uppercase().as_str() {
            "READY" => Self::Ready,
            "BUILDING_FROM_SD" | "BUILDING" => Self::Building,
            "PAUSED" => Self::Paused,
            "BUILDING_COMPLETED" | "COMPLETED" => Self::Completed,
            "BUSY" => Self::Busy,
            s if s.contains("ERROR") => Self::Error,
            _ => Self::Other(word.to_string()),
        }
    }
}

/// Motion state as reported by `M119`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MoveMode {
    /// Axes idle.
    Ready,
    /// Executing moves.
    Moving,
    /// Motion paused.
    Paused,
    /// Homing axes.
    Homing,
    /// Anything else, kept verbatim.
    Other(String),
}

impl MoveMode {
    /// Parse from the device word, e.g. `MOVING`.
    pub fn from_device(word: &str) -> Self {
        match word.to_ascii_uppercase().as_str() {
            "READY" => Self::Ready,
            "MOVING" => Self::Moving,
            "PAUSED" => Self::Paused,
            "HOMING" => Self::Homing,
            _ => Self::Other(word.to_string()),
        }
    }
}

/// Identifier of one telemetry field. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldId {
    /// Print progress, 0-100.
    ProgressPercent,
    /// Nozzle temperature.
    NozzleTempActual,
    /// Nozzle target temperature.
    NozzleTempTarget,
    /// Bed temperature.
    BedTempActual,
    /// Bed target temperature.
    BedTempTarget,
    /// Machine status.
    MachineStatus,
    /// Move mode.
    MoveMode,
    /// Name of the active file.
    CurrentFile,
    /// Layer being printed.
    CurrentLayer,
}

impl FieldId {
    /// Every field, in display order.
    pub const ALL: [FieldId; 9] = [
        FieldId::ProgressPercent,
        FieldId::NozzleTempActual,
        FieldId::NozzleTempTarget,
        FieldId::BedTempActual,
        FieldId::BedTempTarget,
        FieldId::MachineStatus,
        FieldId::MoveMode,
        FieldId::CurrentFile,
        FieldId::CurrentLayer,
    ];

    /// Display unit, if the field has one.
    pub fn unit(self) -> Option<&'static str> {
        match self {
            Self::ProgressPercent => Some("%"),
            Self::NozzleTempActual
            | Self::NozzleTempTarget
            | Self::BedTempActual
            | Self::BedTempTarget => Some("°C"),
            _ => None,
        }
    }
}

/// A concrete decoded value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Temperatures and progress.
    Number(f64),
    /// Layer counter.
    Integer(u32),
    /// Machine status word.
    MachineStatus(MachineStatus),
    /// Move mode word.
    MoveMode(MoveMode),
    /// File name.
    Text(String),
}

/// A field's state: a value, or explicitly unknown.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Reading {
    /// No value this cycle.
    #[default]
    Unknown,
    /// Decoded value.
    Known(FieldValue),
}

impl Reading {
    /// Whether the reading carries a value.
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// The value, if known.
    pub fn value(&self) -> Option<&FieldValue> {
        match self {
            Self::Known(v) => Some(v),
            Self::Unknown => None,
        }
    }
}

// Unknown serializes as null so consumers see every key.
impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unknown => serializer.serialize_none(),
            Self::Known(v) => serializer.serialize_some(v),
        }
    }
}

/// One decoded telemetry value tagged with its field.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusField {
    /// Which field.
    pub id: FieldId,
    /// Its reading.
    pub reading: Reading,
}

impl StatusField {
    /// Field with a value.
    pub fn known(id: FieldId, value: FieldValue) -> Self {
        Self {
            id,
            reading: Reading::Known(value),
        }
    }

    /// Field without a value.
    pub fn unknown(id: FieldId) -> Self {
        Self {
            id,
            reading: Reading::Unknown,
        }
    }
}

/// Full printer snapshot for one poll cycle.
///
/// Every [`FieldId`] is present; the map cannot be mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterStatus {
    fields: BTreeMap<FieldId, Reading>,
    polled_at: DateTime<Utc>,
    complete: bool,
}

impl PrinterStatus {
    /// Build a snapshot; fields not supplied are filled in as unknown.
    pub fn assemble(
        fields: impl IntoIterator<Item = StatusField>,
        polled_at: DateTime<Utc>,
        complete: bool,
    ) -> Self {
        let mut map: BTreeMap<FieldId, Reading> =
            FieldId::ALL.iter().map(|&id| (id, Reading::Unknown)).collect();
        for field in fields {
            map.insert(field.id, field.reading);
        }
        Self {
            fields: map,
            polled_at,
            complete,
        }
    }

    /// Reading for one field.
    pub fn get(&self, id: FieldId) -> &Reading {
        // assemble() seeds every id
        &self.fields[&id]
    }

    /// All fields in display order.
    pub fn fields(&self) -> impl Iterator<Item = StatusField> + '_ {
        self.fields.iter().map(|(&id, reading)| StatusField {
            id,
            reading: reading.clone(),
        })
    }

    /// When the cycle that produced this snapshot started.
    pub fn polled_at(&self) -> DateTime<Utc> {
        self.polled_at
    }

    /// True only if every sub-query succeeded and parsed.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    fn number(&self, id: FieldId) -> Option<f64> {
        match self.get(id).value() {
            Some(FieldValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// Print progress (0-100).
    pub fn progress_percent(&self) -> Option<f64> {
        self.number(FieldId::ProgressPercent)
    }

    /// Nozzle temperature (°C).
    pub fn nozzle_temp(&self) -> Option<f64> {
        self.number(FieldId::NozzleTempActual)
    }

    /// Nozzle target temperature (°C).
    pub fn nozzle_target(&self) -> Option<f64> {
        self.number(FieldId::NozzleTempTarget)
    }

    /// Bed temperature (°C).
    pub fn bed_temp(&self) -> Option<f64> {
        self.number(FieldId::BedTempActual)
    }

    /// Bed target temperature (°C).
    pub fn bed_target(&self) -> Option<f64> {
        self.number(FieldId::BedTempTarget)
    }

    /// Machine status.
    pub fn machine_status(&self) -> Option<&MachineStatus> {
        match self.get(FieldId::MachineStatus).value() {
            Some(FieldValue::MachineStatus(s)) => Some(s),
            _ => None,
        }
    }

    /// Move mode.
    pub fn move_mode(&self) -> Option<&MoveMode> {
        match self.get(FieldId::MoveMode).value() {
            Some(FieldValue::MoveMode(m)) => Some(m),
            _ => None,
        }
    }

    /// Active file name.
    pub fn current_file(&self) -> Option<&str> {
        match self.get(FieldId::CurrentFile).value() {
            Some(FieldValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Current layer.
    pub fn current_layer(&self) -> Option<u32> {
        match self.get(FieldId::CurrentLayer).value() {
            Some(FieldValue::Integer(n)) => Some(*n),
            _ => None,
        }
    }
}
