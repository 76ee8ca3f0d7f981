//! Plain-text rendering of a cached status.

use std::fmt::Write;

use forgewatch::{CachedStatus, FieldId, FieldValue, MachineStatus, MoveMode, PrinterEndpoint, Reading};

fn label(id: FieldId) -> &'static str {
    match id {
        FieldId::ProgressPercent => "Progress",
        FieldId::NozzleTempActual => "Nozzle",
        FieldId::NozzleTempTarget => "Nozzle desired",
        FieldId::BedTempActual => "Bed",
        FieldId::BedTempTarget => "Bed desired",
        FieldId::MachineStatus => "Machine status",
        FieldId::MoveMode => "Move mode",
        FieldId::CurrentFile => "Current file",
        FieldId::CurrentLayer => "Layer",
    }
}

fn value_text(value: &FieldValue) -> String {
    match value {
        FieldValue::Number(n) => format!("{n:.1}"),
        FieldValue::Integer(n) => n.to_string(),
        FieldValue::MachineStatus(MachineStatus::Other(s)) => s.clone(),
        FieldValue::MachineStatus(s) => format!("{s:?}"),
        FieldValue::MoveMode(MoveMode::Other(s)) => s.clone(),
        FieldValue::MoveMode(m) => format!("{m:?}"),
        FieldValue::Text(s) if s.is_empty() => "-".into(),
        FieldValue::Text(s) => s.clone(),
    }
}

/// Render one cached status as a block of `label: value` lines.
pub fn render(endpoint: &PrinterEndpoint, cached: &CachedStatus) -> String {
    let mut out = String::new();
    let state = if cached.available {
        "available"
    } else if cached.is_stale() {
        "unavailable (showing last known values)"
    } else {
        "unavailable"
    };
    let _ = writeln!(out, "{endpoint} [{}]: {state}", endpoint.device_id());

    if let Some(status) = &cached.status {
        for field in status.fields() {
            let text = match &field.reading {
                Reading::Known(v) => {
                    let unit = field.id.unit().unwrap_or("");
                    format!("{}{unit}", value_text(v))
                }
                Reading::Unknown => "unknown".into(),
            };
            let _ = writeln!(out, "  {:<15} {text}", format!("{}:", label(field.id)));
        }
        let _ = writeln!(out, "  polled at {}", status.polled_at().to_rfc3339());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use forgewatch::{PollOutcome, PrinterStatus, StatusCache, StatusField};

    #[test]
    fn test_render_partial_and_stale() {
        let status = PrinterStatus::assemble(
            [
                StatusField::known(FieldId::NozzleTempActual, FieldValue::Number(210.0)),
                StatusField::known(FieldId::CurrentFile, FieldValue::Text(String::new())),
            ],
            Utc::now(),
            false,
        );
        let cache = StatusCache::new();
        cache.publish(&PollOutcome::PartialSuccess(status));
        let endpoint = PrinterEndpoint::new("10.0.0.5", 8899);

        let text = render(&endpoint, &cache.current());
        assert!(text.starts_with("10.0.0.5:8899 [flashforge_adventurer_3_10.0.0.5]: available"));
        assert!(text.contains("Nozzle:         210.0°C"));
        assert!(text.contains("Progress:       unknown"));
        assert!(text.contains("Current file:   -"));

        let stale = cache.publish(&PollOutcome::Failure(forgewatch::ErrorKind::Unreachable));
        let text = render(&endpoint, &stale);
        assert!(text.contains("showing last known values"));
    }
}
