use std::path::Path;

#[derive(Debug)]
pub enum SpikesError {
    Read { path: String, message: String },
    Malformed { line: usize, message: String },
}

impl SpikesError {
    pub fn message(&self) -> String {
        match self {
            SpikesError::Read { path, message } => format!("Cannot read {path}: {message}"),
            SpikesError::Malformed { line, message } => {
                format!("Spike report line {line}: {message}")
            }
        }
    }
}

/// Recorded activity: (time, gid) events sorted by time.
#[derive(Debug, Clone, Default)]
pub struct SpikeReport {
    pub events: Vec<(f32, u32)>,
}

impl SpikeReport {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn start_time(&self) -> f32 {
        self.events.first().map(|(t, _)| *t).unwrap_or(0.0)
    }

    pub fn end_time(&self) -> f32 {
        self.events.last().map(|(t, _)| *t).unwrap_or(0.0)
    }

    /// Events with time in `[from, to)`.
    pub fn events_between(&self, from: f32, to: f32) -> &[(f32, u32)] {
        let start = self.events.partition_point(|(t, _)| *t < from);
        let end = self.events.partition_point(|(t, _)| *t < to);
        &self.events[start..end]
    }
}

/// Parse a spike report: `time gid` per row, `#` comments.
pub fn parse_spikes(source: &str) -> Result<SpikeReport, SpikesError> {
    let mut events = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let text = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        if text.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = text.split_whitespace().collect();
        if fields.len() != 2 {
            return Err(SpikesError::Malformed {
                line,
                message: format!("expected 2 fields, found {}", fields.len()),
            });
        }
        let time = fields[0]
            .parse::<f32>()
            .ok()
            .filter(|t| t.is_finite())
            .ok_or_else(|| SpikesError::Malformed {
                line,
                message: format!("cannot parse time from {:?}", fields[0]),
            })?;
        let gid = fields[1]
            .parse::<u32>()
            .map_err(|_| SpikesError::Malformed {
                line,
                message: format!("cannot parse gid from {:?}", fields[1]),
            })?;
        events.push((time, gid));
    }

    events.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(SpikeReport { events })
}

pub fn load_spikes(path: &Path) -> Result<SpikeReport, SpikesError> {
    let source = std::fs::read_to_string(path).map_err(|err| SpikesError::Read {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    let report = parse_spikes(&source)?;
    tracing::info!(
        path = %path.display(),
        events = report.events.len(),
        "Loaded spike report"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_sort_by_time() {
        let report = parse_spikes("5.0 2\n1.5 1\n3.0 2\n").expect("parse");
        assert_eq!(report.events, vec![(1.5, 1), (3.0, 2), (5.0, 2)]);
        assert_eq!(report.start_time(), 1.5);
        assert_eq!(report.end_time(), 5.0);
    }

    #[test]
    fn events_between_is_half_open() {
        let report = parse_spikes("1.0 1\n2.0 2\n3.0 3\n").expect("parse");
        let window = report.events_between(1.0, 3.0);
        assert_eq!(window, &[(1.0, 1), (2.0, 2)]);
    }

    #[test]
    fn comments_are_skipped() {
        let report = parse_spikes("# header\n1.0 7 # spike\n").expect("parse");
        assert_eq!(report.events, vec![(1.0, 7)]);
    }

    #[test]
    fn short_row_reports_line() {
        let err = parse_spikes("1.0 1\n2.5\n").unwrap_err();
        assert!(matches!(err, SpikesError::Malformed { line: 2, .. }));
    }

    #[test]
    fn bad_gid_is_an_error() {
        let err = parse_spikes("1.0 x\n").unwrap_err();
        assert!(matches!(err, SpikesError::Malformed { line: 1, .. }));
    }
}
