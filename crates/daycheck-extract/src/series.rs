use time::OffsetDateTime;

use crate::message::MessageType;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Num(f64),
    Text(String),
}

impl Value {
    /// Numeric cells are recognised at load time; everything else stays text.
    pub fn parse(cell: &str) -> Self {
        match cell.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Value::Num(v),
            _ => Value::Text(cell.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Num(v) => Some(*v),
            Value::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Num(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Absolute epoch seconds (UTC).
    pub ts: f64,
    pub values: Vec<Value>,
}

/// Timestamp-indexed rows of one message type, strictly increasing in `ts`.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    kind: MessageType,
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl TimeSeries {
    /// Sorts rows by timestamp and drops repeated timestamps, keeping the
    /// first row seen for each.
    pub fn new(kind: MessageType, columns: Vec<String>, mut rows: Vec<Row>) -> Self {
        rows.retain(|r| r.ts.is_finite());
        rows.sort_by(|a, b| a.ts.total_cmp(&b.ts));
        rows.dedup_by(|later, first| later.ts == first.ts);
        Self { kind, columns, rows }
    }

    pub fn kind(&self) -> MessageType { self.kind }
    pub fn rows(&self) -> &[Row] { &self.rows }
    pub fn len(&self) -> usize { self.rows.len() }
    pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    pub fn first_ts(&self) -> Option<f64> { self.rows.first().map(|r| r.ts) }
    pub fn last_ts(&self) -> Option<f64> { self.rows.last().map(|r| r.ts) }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Numeric values of a column in time order; `None` if the column does
    /// not exist. Non-numeric cells are skipped.
    pub fn numeric(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .filter_map(|r| r.values.get(idx).and_then(Value::as_f64))
                .collect(),
        )
    }

    /// Most recent numeric value of a column.
    pub fn last_numeric(&self, name: &str) -> Option<f64> {
        let idx = self.column_index(name)?;
        self.rows
            .iter()
            .rev()
            .find_map(|r| r.values.get(idx).and_then(Value::as_f64))
    }

    /// Cells of a column rendered as text, in time order. Numeric cells are
    /// formatted back so free-text columns with digits-only rows stay aligned.
    pub fn text(&self, name: &str) -> Option<Vec<String>> {
        let idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .filter_map(|r| r.values.get(idx))
                .map(|v| match v {
                    Value::Text(s) => s.clone(),
                    Value::Num(n) => n.to_string(),
                })
                .collect(),
        )
    }
}

/// First and last event-marker timestamps of a flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightWindow {
    pub start: f64,
    pub end: f64,
}

impl FlightWindow {
    pub fn from_series(ev: &TimeSeries) -> Option<Self> {
        Some(Self { start: ev.first_ts()?, end: ev.last_ts()? })
    }

    pub fn duration_s(&self) -> f64 {
        self.end - self.start
    }

    pub fn start_datetime(&self) -> Option<OffsetDateTime> {
        epoch_to_datetime(self.start)
    }
}

pub fn epoch_to_datetime(ts: f64) -> Option<OffsetDateTime> {
    if !ts.is_finite() {
        return None;
    }
    let nanos = (ts * 1e9).round() as i128;
    OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(ts: f64, v: f64) -> Row {
        Row { ts, values: vec![Value::Num(v)] }
    }

    #[test]
    fn rows_are_sorted_and_deduplicated() {
        let s = TimeSeries::new(
            MessageType::PowerRail,
            vec!["Vcc".into()],
            vec![row(3.0, 5.3), row(1.0, 5.1), row(2.0, 5.2), row(1.0, 9.9), row(f64::NAN, 1.0)],
        );
        let ts: Vec<f64> = s.rows().iter().map(|r| r.ts).collect();
        assert_eq!(ts, vec![1.0, 2.0, 3.0]);
        assert_eq!(s.numeric("Vcc").unwrap(), vec![5.1, 5.2, 5.3]);
    }

    #[test]
    fn missing_column_is_none_not_empty() {
        let s = TimeSeries::new(MessageType::PowerRail, vec!["Vcc".into()], vec![row(1.0, 5.0)]);
        assert!(s.numeric("VServo").is_none());
        assert_eq!(s.last_numeric("Vcc"), Some(5.0));
    }

    #[test]
    fn window_spans_first_to_last_marker() {
        let ev = TimeSeries::new(
            MessageType::EventMarker,
            vec!["Id".into()],
            vec![row(1_650_561_440.0, 10.0), row(1_650_562_040.5, 11.0)],
        );
        let w = FlightWindow::from_series(&ev).unwrap();
        assert_eq!(w.duration_s(), 600.5);
        assert_eq!(w.start_datetime().unwrap().unix_timestamp(), 1_650_561_440);
    }
}
