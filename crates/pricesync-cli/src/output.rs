use std::io::Write;

use pricesync_core::RunReport;

use crate::error::CliError;

/// Writes the run report to stdout as one JSON document.
pub fn render(report: &RunReport, pretty: bool) -> Result<(), CliError> {
    let rendered = render_to_string(report, pretty)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}")?;
    stdout.flush()?;
    Ok(())
}

fn render_to_string(report: &RunReport, pretty: bool) -> Result<String, serde_json::Error> {
    if pretty {
        serde_json::to_string_pretty(report)
    } else {
        serde_json::to_string(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricesync_core::{ReconciliationResult, RunState, WriteMode, WriteTally};
    use serde_json::Value;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn report() -> RunReport {
        RunReport {
            run_id: Uuid::nil(),
            started_at: OffsetDateTime::UNIX_EPOCH,
            finished_at: OffsetDateTime::UNIX_EPOCH,
            write_mode: WriteMode::Batch,
            state: RunState::Done,
            result: ReconciliationResult {
                intents: Vec::new(),
                records_seen: 4,
                symbols_extracted: 2,
                quotes_resolved: 0,
                updates: WriteTally::default(),
            },
        }
    }

    #[test]
    fn report_is_flat_json_with_rfc3339_timestamps() {
        let rendered = render_to_string(&report(), false).expect("serializes");
        let value: Value = serde_json::from_str(&rendered).expect("valid json");

        assert_eq!(value["state"], "done");
        assert_eq!(value["write_mode"], "batch");
        assert_eq!(value["records_seen"], 4);
        assert_eq!(value["updates"]["attempted"], 0);
        assert_eq!(value["started_at"], "1970-01-01T00:00:00Z");
        assert!(!rendered.contains('\n'));
    }

    #[test]
    fn pretty_output_is_indented() {
        let rendered = render_to_string(&report(), true).expect("serializes");
        assert!(rendered.contains("\n  \"run_id\""));
    }
}
