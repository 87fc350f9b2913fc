//! Delimited-text export of phase timings.

use std::io::Write;

use vismon_types::PhaseTimingResult;

use crate::error::ExportError;

/// Header row written before any timing.
pub const CSV_HEADER: &str = "timestamp,project,component,phase,duration_ms";

/// Write timings as comma-separated text: a header, then one line per result.
///
/// `timestamp` is the phase start in milliseconds since the Unix epoch and
/// `duration_ms` carries three decimals. Returns the number of data lines.
pub fn write_timings_csv<'a, W, I>(mut writer: W, timings: I) -> Result<usize, ExportError>
where
    W: Write,
    I: IntoIterator<Item = &'a PhaseTimingResult>,
{
    writeln!(writer, "{}", CSV_HEADER)?;
    let mut lines = 0;
    for t in timings {
        writeln!(
            writer,
            "{},{},{},{},{:.3}",
            t.start_ms,
            escape(&t.project),
            escape(&t.component),
            escape(&t.phase),
            t.duration.as_millis_f64()
        )?;
        lines += 1;
    }
    writer.flush()?;
    Ok(lines)
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vismon_types::Microseconds;

    #[test]
    fn writes_header_and_rows() {
        let timings = vec![
            PhaseTimingResult::ending_at("load", "importer", "Batch", 2_000, Microseconds(1_500)),
            PhaseTimingResult::ending_at("save", "writer", "Batch", 3_000, Microseconds(250)),
        ];
        let mut out = Vec::new();
        let lines = write_timings_csv(&mut out, &timings).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(lines, 2);
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows[0], CSV_HEADER);
        assert_eq!(rows[1], "1999,Batch,importer,load,1.500");
        assert_eq!(rows[2], "3000,Batch,writer,save,0.250");
    }

    #[test]
    fn quotes_awkward_fields() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn empty_history_writes_header_only() {
        let mut out = Vec::new();
        assert_eq!(write_timings_csv(&mut out, &Vec::<PhaseTimingResult>::new()).unwrap(), 0);
        assert_eq!(String::from_utf8(out).unwrap(), format!("{}\n", CSV_HEADER));
    }
}
