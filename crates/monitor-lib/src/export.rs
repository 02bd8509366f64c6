//! Export of sample sets and breach events
//!
//! Pure serializations to CSV and pretty-printed JSON. Delivering the
//! payload (download, file write) is left to the caller. Empty inputs are
//! refused with [`MonitorError::NothingToExport`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};
use crate::models::{AlertEvent, Sample, TimeWindow};

/// Fixed column order of the sample CSV
pub const SAMPLE_CSV_HEADER: [&str; 10] = [
    "Timestamp",
    "Repository",
    "CPU",
    "Memory",
    "Disk",
    "Network",
    "ResponseTime",
    "RequestCount",
    "ErrorRate",
    "ActiveConnections",
];

/// Fixed column order of the breach CSV
pub const BREACH_CSV_HEADER: [&str; 8] = [
    "Timestamp",
    "Repository",
    "Metric",
    "Value",
    "Threshold",
    "Severity",
    "Resolved",
    "Id",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = MonitorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(MonitorError::UnknownFormat(other.to_string())),
        }
    }
}

/// What is being exported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    #[default]
    Samples,
    Breaches,
}

impl ExportKind {
    fn slug(&self) -> &'static str {
        match self {
            ExportKind::Samples => "metrics",
            ExportKind::Breaches => "breaches",
        }
    }
}

/// Descriptive header carried by JSON exports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub export_date: DateTime<Utc>,
    /// Repository name, or the scope label for fleet-wide exports
    pub repository_name: String,
    pub time_range: TimeWindow,
}

/// Serialized export ready for file delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    pub filename: String,
    pub mime_type: String,
    pub body: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SampleDocument<'a> {
    #[serde(flatten)]
    metadata: &'a ExportMetadata,
    samples: &'a [Sample],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BreachDocument<'a> {
    #[serde(flatten)]
    metadata: &'a ExportMetadata,
    events: &'a [AlertEvent],
}

/// Round-trippable absolute timestamp used in CSV rows
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serialize samples to CSV.
///
/// Percentages, network and response time carry two decimals, error rate
/// four. A missing connection count is written as `0`.
pub fn to_csv(samples: &[Sample]) -> Result<String> {
    if samples.is_empty() {
        return Err(MonitorError::NothingToExport);
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(SAMPLE_CSV_HEADER)?;

    for s in samples {
        writer.write_record([
            format_timestamp(&s.timestamp),
            s.entity_id.clone(),
            format!("{:.2}", s.cpu),
            format!("{:.2}", s.memory),
            format!("{:.2}", s.disk),
            format!("{:.2}", s.network),
            format!("{:.2}", s.response_time),
            s.request_count.to_string(),
            format!("{:.4}", s.error_rate),
            s.active_connections.unwrap_or(0).to_string(),
        ])?;
    }

    finish(writer)
}

/// Serialize samples to a pretty-printed JSON document
pub fn to_json(samples: &[Sample], metadata: &ExportMetadata) -> Result<String> {
    if samples.is_empty() {
        return Err(MonitorError::NothingToExport);
    }
    Ok(serde_json::to_string_pretty(&SampleDocument { metadata, samples })?)
}

/// Serialize breach events to CSV, in the order given
pub fn breaches_to_csv(events: &[AlertEvent]) -> Result<String> {
    if events.is_empty() {
        return Err(MonitorError::NothingToExport);
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(BREACH_CSV_HEADER)?;

    for e in events {
        writer.write_record([
            format_timestamp(&e.timestamp),
            e.entity_id.clone(),
            e.metric_key.to_string(),
            format!("{:.2}", e.value),
            format!("{:.2}", e.threshold),
            e.severity.to_string(),
            e.resolved.to_string(),
            e.id.clone(),
        ])?;
    }

    finish(writer)
}

/// Serialize breach events to a pretty-printed JSON document
pub fn breaches_to_json(events: &[AlertEvent], metadata: &ExportMetadata) -> Result<String> {
    if events.is_empty() {
        return Err(MonitorError::NothingToExport);
    }
    Ok(serde_json::to_string_pretty(&BreachDocument { metadata, events })?)
}

/// `{scope}-{metrics|breaches}-{window}-{YYYY-MM-DD}.{ext}`
pub fn export_filename(
    scope_label: &str,
    kind: ExportKind,
    window: TimeWindow,
    format: ExportFormat,
    date: DateTime<Utc>,
) -> String {
    let scope: String = scope_label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    format!(
        "{}-{}-{}-{}.{}",
        scope,
        kind.slug(),
        window,
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| MonitorError::Serialization(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| MonitorError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertSeverity, Entity, EntityScope, MetricKey};
    use crate::store::MetricStore;
    use crate::store::tests::{sample_at, t0};
    use chrono::Duration;

    fn three_samples() -> Vec<Sample> {
        let mut a = sample_at("web", t0(), 12.3456);
        a.memory = 45.678;
        a.network = 3.1;
        a.response_time = 250.126;
        a.error_rate = 0.123456;
        a.request_count = 1523;

        let mut b = sample_at("web", t0() + Duration::seconds(5), 99.999);
        b.active_connections = None;
        b.error_rate = 4.5;

        let mut c = sample_at("db", t0() + Duration::milliseconds(10_250), 0.0);
        c.disk = 87.5;
        c.active_connections = Some(1200);

        vec![a, b, c]
    }

    fn rounded(value: f64, decimals: i32) -> f64 {
        let factor = 10f64.powi(decimals);
        (value * factor).round() / factor
    }

    #[test]
    fn test_csv_round_trip() {
        let samples = three_samples();
        let csv_text = to_csv(&samples).unwrap();

        let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, SAMPLE_CSV_HEADER.to_vec());

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);

        for (row, sample) in rows.iter().zip(&samples) {
            assert_eq!(row.len(), 10);

            let ts = DateTime::parse_from_rfc3339(&row[0]).unwrap().with_timezone(&Utc);
            assert_eq!(ts, sample.timestamp);
            assert_eq!(&row[1], sample.entity_id);

            let num = |i: usize| row[i].parse::<f64>().unwrap();
            assert!((num(2) - rounded(sample.cpu, 2)).abs() < 1e-9);
            assert!((num(3) - rounded(sample.memory, 2)).abs() < 1e-9);
            assert!((num(4) - rounded(sample.disk, 2)).abs() < 1e-9);
            assert!((num(5) - rounded(sample.network, 2)).abs() < 1e-9);
            assert!((num(6) - rounded(sample.response_time, 2)).abs() < 1e-9);
            assert_eq!(row[7].parse::<u64>().unwrap(), sample.request_count);
            assert!((num(8) - rounded(sample.error_rate, 4)).abs() < 1e-9);
            assert_eq!(
                row[9].parse::<u32>().unwrap(),
                sample.active_connections.unwrap_or(0)
            );
        }
    }

    #[test]
    fn test_csv_timestamp_round_trips_stored_sample() {
        let mut store = MetricStore::new();
        store.register(Entity::new("web", "Web", "service"));
        let precise = t0() + Duration::nanoseconds(123_456_789);
        store.append("web", sample_at("web", precise, 10.0)).unwrap();

        let samples = store.query(&EntityScope::All, TimeWindow::OneHour, precise);
        let csv_text = to_csv(&samples).unwrap();
        let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
        let row = reader.records().next().unwrap().unwrap();

        assert_eq!(&row[0], "2024-03-01T12:00:00.123Z");
        let parsed = DateTime::parse_from_rfc3339(&row[0]).unwrap();
        assert_eq!(parsed.with_timezone(&Utc), samples[0].timestamp);
    }

    #[test]
    fn test_csv_precision_and_missing_connections() {
        let csv_text = to_csv(&three_samples()).unwrap();
        let lines: Vec<&str> = csv_text.lines().collect();

        assert_eq!(
            lines[0],
            "Timestamp,Repository,CPU,Memory,Disk,Network,ResponseTime,RequestCount,ErrorRate,ActiveConnections"
        );
        assert_eq!(
            lines[1],
            "2024-03-01T12:00:00.000Z,web,12.35,45.68,40.00,3.10,250.13,1523,0.1235,42"
        );
        assert!(lines[2].ends_with(",4.5000,0"));
        assert!(lines[3].starts_with("2024-03-01T12:00:10.250Z,db,"));
    }

    #[test]
    fn test_json_document_shape() {
        let samples = three_samples();
        let metadata = ExportMetadata {
            export_date: t0(),
            repository_name: "web".to_string(),
            time_range: TimeWindow::SevenDays,
        };

        let json = to_json(&samples, &metadata).unwrap();
        assert!(json.contains('\n'), "pretty-printed");

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["repositoryName"], "web");
        assert_eq!(value["timeRange"], "7d");
        assert!(value["exportDate"].is_string());
        assert_eq!(value["samples"].as_array().unwrap().len(), 3);
        assert_eq!(value["samples"][0]["entityId"], "web");

        let back: Vec<Sample> = serde_json::from_value(value["samples"].clone()).unwrap();
        assert_eq!(back, samples);
    }

    #[test]
    fn test_empty_exports_are_refused() {
        let metadata = ExportMetadata {
            export_date: t0(),
            repository_name: "all".to_string(),
            time_range: TimeWindow::OneDay,
        };
        assert!(matches!(to_csv(&[]), Err(MonitorError::NothingToExport)));
        assert!(matches!(to_json(&[], &metadata), Err(MonitorError::NothingToExport)));
        assert!(matches!(breaches_to_csv(&[]), Err(MonitorError::NothingToExport)));
        assert!(matches!(
            breaches_to_json(&[], &metadata),
            Err(MonitorError::NothingToExport)
        ));
    }

    #[test]
    fn test_breach_csv() {
        let event = AlertEvent {
            id: "web:cpu:1".to_string(),
            entity_id: "web".to_string(),
            metric_key: MetricKey::Cpu,
            value: 104.5,
            threshold: 90.0,
            severity: AlertSeverity::Critical,
            timestamp: t0(),
            resolved: false,
        };
        let text = breaches_to_csv(&[event]).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Timestamp,Repository,Metric,Value,Threshold,Severity,Resolved,Id");
        assert_eq!(
            lines[1],
            "2024-03-01T12:00:00.000Z,web,cpu,104.50,90.00,critical,false,web:cpu:1"
        );
    }

    #[test]
    fn test_export_filename_and_format() {
        let name = export_filename(
            "payments api",
            ExportKind::Samples,
            TimeWindow::OneDay,
            ExportFormat::Csv,
            t0(),
        );
        assert_eq!(name, "payments-api-metrics-24h-2024-03-01.csv");
        assert_eq!("JSON".parse::<ExportFormat>().unwrap().mime_type(), "application/json");
        let err = "xml".parse::<ExportFormat>().unwrap_err();
        assert!(matches!(err, MonitorError::UnknownFormat(ref f) if f == "xml"));
    }
}
