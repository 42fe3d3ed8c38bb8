//! Result export
//!
//! Renders a job's outcome list as a downloadable byte stream in the
//! operator console's formats. The CSV shape (header, 是/否 flags, quoted
//! fields, timestamp layout) is fixed by the console's importer.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::models::ProbeOutcome;
use crate::constants::export;
use crate::errors::{ExportError, ExportResult};

/// Export output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// CSV with the operator console's header
    Csv,
    /// JSON envelope with metadata
    Json,
}

impl std::str::FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(ExportError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }
}

/// Which outcomes to include in an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFilter {
    /// Every outcome
    #[default]
    All,
    /// Only credentials that authenticated
    OnlyValid,
    /// Only credentials that failed classification
    OnlyInvalid,
}

impl ExportFilter {
    fn keeps(&self, outcome: &ProbeOutcome) -> bool {
        match self {
            Self::All => true,
            Self::OnlyValid => outcome.valid,
            Self::OnlyInvalid => !outcome.valid,
        }
    }
}

#[derive(Serialize)]
struct JsonEnvelope<'a> {
    task_id: &'a str,
    results: Vec<&'a ProbeOutcome>,
    exported_at: DateTime<Utc>,
}

/// Render a filtered outcome list in the requested format
pub fn render_export(
    task_id: &str,
    outcomes: &[ProbeOutcome],
    format: ExportFormat,
    filter: ExportFilter,
) -> ExportResult<Vec<u8>> {
    let filtered: Vec<&ProbeOutcome> = outcomes.iter().filter(|o| filter.keeps(o)).collect();

    match format {
        ExportFormat::Csv => Ok(render_csv(&filtered)),
        ExportFormat::Json => {
            let envelope = JsonEnvelope {
                task_id,
                results: filtered,
                exported_at: Utc::now(),
            };
            Ok(serde_json::to_vec_pretty(&envelope)?)
        }
    }
}

fn render_csv(outcomes: &[&ProbeOutcome]) -> Vec<u8> {
    let mut buffer = String::with_capacity(64 * (outcomes.len() + 1));
    buffer.push_str(export::CSV_HEADER);
    buffer.push('\n');

    for outcome in outcomes {
        let valid = if outcome.valid {
            export::CSV_VALID
        } else {
            export::CSV_INVALID
        };
        let checked_at = outcome
            .checked_at
            .format(export::CSV_TIMESTAMP_FORMAT)
            .to_string();

        buffer.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            outcome.key_id,
            quote(&outcome.key),
            outcome.group_id,
            valid,
            outcome.response_time_ms,
            quote(&outcome.error_message),
            quote(&checked_at),
        ));
    }

    buffer.into_bytes()
}

/// Quote a CSV field, doubling embedded quotes
fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn outcome(key_id: u64, valid: bool, error: &str) -> ProbeOutcome {
        ProbeOutcome {
            key_id,
            key: format!("sk-{key_id}"),
            group_id: 9,
            valid,
            response_time_ms: 42,
            error_message: error.to_string(),
            checked_at: Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap(),
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("xml".parse::<ExportFormat>().is_err());
    }

    /// CSV layout is pinned by the console's importer: header text, 是/否
    /// flags, quoting, timestamp format.
    #[test]
    fn test_csv_layout() {
        let outcomes = vec![outcome(1, true, ""), outcome(2, false, "unauthorized")];
        let bytes =
            render_export("batch_9_0", &outcomes, ExportFormat::Csv, ExportFilter::All).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next().unwrap(),
            "密鑰ID,密鑰,分組ID,有效,回應時間(ms),錯誤訊息,檢查時間"
        );
        assert_eq!(
            lines.next().unwrap(),
            "1,\"sk-1\",9,是,42,\"\",\"2025-03-14 09:26:53\""
        );
        assert_eq!(
            lines.next().unwrap(),
            "2,\"sk-2\",9,否,42,\"unauthorized\",\"2025-03-14 09:26:53\""
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_csv_escapes_embedded_quotes() {
        let mut bad = outcome(3, false, "server said \"no\"");
        bad.key = "sk-\"odd\"".to_string();
        let bytes =
            render_export("batch_9_0", &[bad], ExportFormat::Csv, ExportFilter::All).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"sk-\"\"odd\"\"\""));
        assert!(text.contains("\"server said \"\"no\"\"\""));
    }

    #[test]
    fn test_filters() {
        let outcomes = vec![
            outcome(1, true, ""),
            outcome(2, false, "unauthorized"),
            outcome(3, true, ""),
        ];

        let csv = |filter| {
            let bytes = render_export("t", &outcomes, ExportFormat::Csv, filter).unwrap();
            String::from_utf8(bytes).unwrap().lines().count() - 1
        };

        assert_eq!(csv(ExportFilter::All), 3);
        assert_eq!(csv(ExportFilter::OnlyValid), 2);
        assert_eq!(csv(ExportFilter::OnlyInvalid), 1);
    }

    #[test]
    fn test_json_envelope() {
        let outcomes = vec![outcome(1, true, "")];
        let bytes = render_export(
            "batch_9_7",
            &outcomes,
            ExportFormat::Json,
            ExportFilter::All,
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["task_id"], "batch_9_7");
        assert_eq!(value["results"].as_array().unwrap().len(), 1);
        assert_eq!(value["results"][0]["key_id"], 1);
        assert!(value["exported_at"].is_string());
    }
}
