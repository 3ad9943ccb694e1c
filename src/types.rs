//! Core types shared by the query builder, decoder and transformer.

use chrono::{DateTime, Utc};

use crate::duration;

/// Names of the tag keys used to select a host and a service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectorConfig {
    /// Tag key holding the host name.
    pub hostname_tag: String,
    /// Tag key holding the service name.
    pub servicename_tag: String,
}

impl SelectorConfig {
    /// Create a selector with custom tag keys.
    pub fn new(hostname_tag: impl Into<String>, servicename_tag: impl Into<String>) -> Self {
        Self {
            hostname_tag: hostname_tag.into(),
            servicename_tag: servicename_tag.into(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self::new("hostname", "service")
    }
}

/// Parameters of a single perfdata request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricQuery {
    /// Host the check belongs to.
    pub host_name: String,
    /// Service the check belongs to, ignored for host checks.
    pub service_name: String,
    /// Check command, used as the measurement name.
    pub check_command: String,
    /// Inclusive lower bound, unix seconds.
    pub from: i64,
    /// Whether this is a host check (no service clause).
    pub is_host_check: bool,
    /// Glob patterns a metric must match to be returned. Empty means all.
    pub include_metrics: Vec<String>,
    /// Exact metric names to drop from the result.
    pub exclude_metrics: Vec<String>,
}

impl MetricQuery {
    /// Create a query starting at `from` (unix seconds).
    pub fn new(
        host_name: impl Into<String>,
        service_name: impl Into<String>,
        check_command: impl Into<String>,
        from: i64,
        is_host_check: bool,
    ) -> Self {
        Self {
            host_name: host_name.into(),
            service_name: service_name.into(),
            check_command: check_command.into(),
            from,
            is_host_check,
            include_metrics: Vec::new(),
            exclude_metrics: Vec::new(),
        }
    }

    /// Create a query covering the ISO-8601 `duration` up to `now`.
    ///
    /// An unparsable duration falls back to twelve hours.
    pub fn from_duration(
        host_name: impl Into<String>,
        service_name: impl Into<String>,
        check_command: impl Into<String>,
        now: DateTime<Utc>,
        duration: &str,
        is_host_check: bool,
    ) -> Self {
        let from = duration::parse_from(now, duration);
        Self::new(host_name, service_name, check_command, from, is_host_check)
    }

    /// Only return metrics matching one of these glob patterns.
    pub fn with_include(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.include_metrics = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Drop metrics with exactly these names.
    pub fn with_exclude(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclude_metrics = names.into_iter().map(Into::into).collect();
        self
    }
}

/// A single decoded data row.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    /// Measurement the row came from.
    pub series_name: String,
    /// Metric identity (the `metric` tag).
    pub metric_name: String,
    /// Row timestamp, unix seconds.
    pub timestamp: i64,
    /// Observed value (or the count, for count queries).
    pub value: Option<f64>,
    /// Warning threshold.
    pub warning: Option<f64>,
    /// Critical threshold.
    pub critical: Option<f64>,
    /// Unit of measurement.
    pub unit: Option<String>,
}

/// Known columns of an InfluxDB 1.x CSV response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    /// Measurement name (`name`).
    Name,
    /// Comma-separated `key=value` tag list (`tags`).
    Tags,
    /// A dedicated `metric` column.
    Metric,
    /// Row timestamp (`time`).
    Time,
    /// Value column (`value`, or `count` for count queries).
    Value,
    /// Warning threshold (`warn`).
    Warn,
    /// Critical threshold (`crit`).
    Crit,
    /// Unit (`unit`).
    Unit,
    /// Any column we do not read.
    Ignored,
}

impl Column {
    /// Classify a header cell.
    pub fn from_header(name: &str) -> Self {
        match name {
            "name" => Self::Name,
            "tags" => Self::Tags,
            "metric" => Self::Metric,
            "time" => Self::Time,
            "value" | "count" => Self::Value,
            "warn" => Self::Warn,
            "crit" => Self::Crit,
            "unit" => Self::Unit,
            _ => Self::Ignored,
        }
    }
}

/// Column positions for one table of the response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableLayout {
    /// Table index this layout belongs to.
    pub position: usize,
    /// Column kinds in wire order.
    pub columns: Vec<Column>,
}

impl TableLayout {
    /// Layout used when the response carries no header row.
    pub fn default_layout() -> Self {
        Self {
            position: 0,
            columns: vec![
                Column::Name,
                Column::Tags,
                Column::Time,
                Column::Value,
                Column::Warn,
                Column::Crit,
                Column::Unit,
            ],
        }
    }

    /// Index of the first column of the given kind.
    pub fn index_of(&self, column: Column) -> Option<usize> {
        self.columns.iter().position(|c| *c == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_selector_tags() {
        let s = SelectorConfig::default();
        assert_eq!(s.hostname_tag, "hostname");
        assert_eq!(s.servicename_tag, "service");
    }

    #[test]
    fn test_count_column_is_value() {
        assert_eq!(Column::from_header("count"), Column::Value);
        assert_eq!(Column::from_header("mean"), Column::Ignored);
    }

    #[test]
    fn test_query_filters_default_empty() {
        let q = MetricQuery::new("h", "s", "load", 0, true).with_exclude(["load15"]);
        assert!(q.include_metrics.is_empty());
        assert_eq!(q.exclude_metrics, vec!["load15".to_string()]);
    }
}
