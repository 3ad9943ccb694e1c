//! Grouping of decoded records into per-metric datasets.

use futures::{Stream, StreamExt};
use glob::Pattern;

use crate::downsample::MetricCounts;
use crate::error::Result;
use crate::response::{CRITICAL_SERIES, Response, VALUE_SERIES, WARNING_SERIES};
use crate::types::Record;

/// True if `metric_name` matches one of the shell-glob `patterns`, or if
/// there are no patterns at all.
///
/// Invalid patterns never match.
pub fn is_included<S: AsRef<str>>(metric_name: &str, patterns: &[S]) -> bool {
    if patterns.is_empty() {
        return true;
    }

    patterns.iter().any(|p| {
        Pattern::new(p.as_ref())
            .map(|pattern| pattern.matches(metric_name))
            .unwrap_or(false)
    })
}

/// True if `metric_name` is one of `names`. Names are compared exactly,
/// glob characters have no meaning here.
pub fn is_excluded<S: AsRef<str>>(metric_name: &str, names: &[S]) -> bool {
    names.iter().any(|n| n.as_ref() == metric_name)
}

/// Consume `records` once and build the response.
///
/// Series that never carry a value are removed at the end, so checks
/// without thresholds only return a `value` series.
pub async fn transform<S, P, E>(records: S, include: &[P], exclude: &[E]) -> Result<Response>
where
    S: Stream<Item = Result<Record>>,
    P: AsRef<str>,
    E: AsRef<str>,
{
    let mut records = std::pin::pin!(records);
    let mut response = Response::new();

    while let Some(record) = records.next().await {
        let record = record?;

        if !is_included(&record.metric_name, include) {
            continue;
        }
        if is_excluded(&record.metric_name, exclude) {
            continue;
        }

        let dataset = response.dataset_mut(&record.metric_name);
        dataset.set_unit(record.unit.as_deref());
        dataset.push(
            record.timestamp,
            [
                (VALUE_SERIES, record.value),
                (WARNING_SERIES, record.warning),
                (CRITICAL_SERIES, record.critical),
            ],
        );
    }

    for dataset in response.datasets_mut() {
        dataset.prune_empty_series();
    }

    Ok(response)
}

/// Collect the per-metric point counts of a count query response.
pub async fn count_metrics<S>(records: S) -> Result<MetricCounts>
where
    S: Stream<Item = Result<Record>>,
{
    let mut records = std::pin::pin!(records);
    let mut counts = MetricCounts::new();

    while let Some(record) = records.next().await {
        let record = record?;
        counts.insert(record.metric_name, record.value.unwrap_or(0.0) as i64);
    }

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use futures::stream;
    use pretty_assertions::assert_eq;

    const NONE: &[&str] = &[];

    fn record(metric: &str, ts: i64, value: Option<f64>) -> Record {
        Record {
            series_name: "load".to_string(),
            metric_name: metric.to_string(),
            timestamp: ts,
            value,
            warning: None,
            critical: None,
            unit: None,
        }
    }

    fn ok_stream(records: Vec<Record>) -> impl Stream<Item = Result<Record>> {
        stream::iter(records.into_iter().map(Ok))
    }

    #[test]
    fn test_is_included() {
        assert!(is_included("anything", NONE));
        assert!(is_included("cpu_user", &["cpu*"]));
        assert!(!is_included("mem", &["cpu*"]));
        assert!(is_included("load5", &["mem", "load?"]));
        assert!(is_included("disk_b", &["disk_[ab]"]));
        assert!(!is_included("disk_c", &["disk_[ab]"]));
        assert!(!is_included("x", &["[unclosed"]));
    }

    #[test]
    fn test_is_excluded() {
        assert!(!is_excluded("anything", NONE));
        assert!(is_excluded("cpu_user", &["cpu_user"]));
        assert!(!is_excluded("cpu_user", &["cpu*"]));
    }

    #[tokio::test]
    async fn test_prunes_null_thresholds() {
        let records = vec![
            record("load", 1, Some(0.1)),
            record("load", 2, Some(0.2)),
            record("load", 3, Some(0.3)),
        ];
        let response = transform(ok_stream(records), NONE, NONE).await.unwrap();

        let dataset = response.get("load").unwrap();
        assert_eq!(dataset.timestamps, vec![1, 2, 3]);
        assert_eq!(dataset.series_names(), vec!["value"]);
        assert_eq!(dataset.series("value").unwrap().values.len(), 3);
    }

    #[tokio::test]
    async fn test_first_seen_order() {
        let records = vec![
            record("b", 1, Some(1.0)),
            record("a", 1, Some(1.0)),
            record("b", 2, Some(2.0)),
        ];
        let response = transform(ok_stream(records), NONE, NONE).await.unwrap();

        assert_eq!(response.metric_names(), vec!["b", "a"]);
        assert_eq!(response.get("b").unwrap().timestamps.len(), 2);
    }

    #[tokio::test]
    async fn test_filters() {
        let records = vec![
            record("load1", 1, Some(1.0)),
            record("load5", 1, Some(1.0)),
            record("load15", 1, Some(1.0)),
            record("procs", 1, Some(1.0)),
        ];
        let response = transform(ok_stream(records), &["load*"], &["load5"])
            .await
            .unwrap();
        assert_eq!(response.metric_names(), vec!["load1", "load15"]);
    }

    #[tokio::test]
    async fn test_thresholds_and_units() {
        let mut first = record("rta", 1, Some(0.1));
        first.warning = Some(0.2);
        let mut second = record("rta", 2, Some(0.1));
        second.unit = Some("s".to_string());
        second.critical = Some(0.5);
        let mut third = record("rta", 3, None);
        third.unit = Some("ms".to_string());

        let response = transform(ok_stream(vec![first, second, third]), NONE, NONE)
            .await
            .unwrap();
        let dataset = response.get("rta").unwrap();

        assert_eq!(dataset.unit, "s");
        assert_eq!(dataset.series_names(), vec!["value", "warning", "critical"]);
        assert_eq!(
            dataset.series("critical").unwrap().values,
            vec![None, Some(0.5), None]
        );
        assert_eq!(
            dataset.series("value").unwrap().values,
            vec![Some(0.1), Some(0.1), None]
        );
    }

    #[tokio::test]
    async fn test_all_null_dataset_is_kept() {
        let response = transform(ok_stream(vec![record("pl", 1, None)]), NONE, NONE)
            .await
            .unwrap();
        let dataset = response.get("pl").unwrap();
        assert_eq!(dataset.timestamps, vec![1]);
        assert!(dataset.series.is_empty());
    }

    #[tokio::test]
    async fn test_error_propagates() {
        let records = stream::iter(vec![
            Ok(record("a", 1, Some(1.0))),
            Err(Error::Decode {
                row: 3,
                message: "bad".to_string(),
            }),
        ]);
        let result = transform(records, NONE, NONE).await;
        assert!(matches!(result, Err(Error::Decode { row: 3, .. })));
    }

    #[tokio::test]
    async fn test_count_metrics() {
        let records = vec![
            record("load1", 0, Some(50000.0)),
            record("load5", 0, Some(49999.0)),
        ];
        let counts = count_metrics(ok_stream(records)).await.unwrap();
        assert_eq!(counts.get("load1"), Some(50000));
        assert_eq!(counts.representative(), Some(49999));
    }
}
