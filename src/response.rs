//! Per-metric datasets handed to the graph renderer.

use std::collections::HashMap;

use serde::Serialize;

/// Name of the series holding observed values.
pub const VALUE_SERIES: &str = "value";
/// Name of the series holding warning thresholds.
pub const WARNING_SERIES: &str = "warning";
/// Name of the series holding critical thresholds.
pub const CRITICAL_SERIES: &str = "critical";

/// One named column of values aligned with a dataset's timestamps.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl Series {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    /// True if no value in the series is set.
    pub fn is_all_null(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }
}

/// All series of one metric.
///
/// Every series has exactly one value per timestamp.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Dataset {
    pub metric_name: String,
    pub unit: String,
    pub timestamps: Vec<i64>,
    pub series: Vec<Series>,
}

impl Dataset {
    pub fn new(metric_name: impl Into<String>) -> Self {
        Self {
            metric_name: metric_name.into(),
            unit: String::new(),
            timestamps: Vec::new(),
            series: Vec::new(),
        }
    }

    /// Get a series by name.
    pub fn series(&self, name: &str) -> Option<&Series> {
        self.series.iter().find(|s| s.name == name)
    }

    /// Names of the series in this dataset.
    pub fn series_names(&self) -> Vec<&str> {
        self.series.iter().map(|s| s.name.as_str()).collect()
    }

    /// Append one row. Series missing so far are created and back-filled
    /// with nulls so lengths stay equal to the timestamp count.
    pub(crate) fn push(&mut self, timestamp: i64, columns: [(&str, Option<f64>); 3]) {
        let row = self.timestamps.len();
        self.timestamps.push(timestamp);

        for (name, value) in columns {
            let i = match self.series.iter().position(|s| s.name == name) {
                Some(i) => i,
                None => {
                    let mut series = Series::new(name);
                    series.values.resize(row, None);
                    self.series.push(series);
                    self.series.len() - 1
                }
            };
            self.series[i].values.push(value);
        }
    }

    /// Keep the first non-empty unit.
    pub(crate) fn set_unit(&mut self, unit: Option<&str>) {
        if self.unit.is_empty() {
            if let Some(unit) = unit.filter(|u| !u.is_empty()) {
                self.unit = unit.to_string();
            }
        }
    }

    /// Drop series without a single value.
    pub(crate) fn prune_empty_series(&mut self) {
        self.series.retain(|s| !s.is_all_null());
    }
}

/// Datasets in the order their metrics first appeared.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Response {
    datasets: Vec<Dataset>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    /// Get the dataset for a metric.
    pub fn get(&self, metric_name: &str) -> Option<&Dataset> {
        self.index.get(metric_name).map(|&i| &self.datasets[i])
    }

    pub fn metric_names(&self) -> Vec<&str> {
        self.datasets
            .iter()
            .map(|d| d.metric_name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn into_datasets(self) -> Vec<Dataset> {
        self.datasets
    }

    /// Dataset for `metric_name`, created at the end if missing.
    pub(crate) fn dataset_mut(&mut self, metric_name: &str) -> &mut Dataset {
        let i = match self.index.get(metric_name) {
            Some(&i) => i,
            None => {
                self.datasets.push(Dataset::new(metric_name));
                let i = self.datasets.len() - 1;
                self.index.insert(metric_name.to_string(), i);
                i
            }
        };
        &mut self.datasets[i]
    }

    pub(crate) fn datasets_mut(&mut self) -> impl Iterator<Item = &mut Dataset> {
        self.datasets.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_lengths_aligned() {
        let mut d = Dataset::new("load1");
        d.push(
            1,
            [
                (VALUE_SERIES, Some(1.0)),
                (WARNING_SERIES, None),
                (CRITICAL_SERIES, None),
            ],
        );
        d.push(
            2,
            [
                (VALUE_SERIES, Some(2.0)),
                (WARNING_SERIES, Some(5.0)),
                (CRITICAL_SERIES, None),
            ],
        );
        for s in &d.series {
            assert_eq!(s.values.len(), d.timestamps.len());
        }
        assert_eq!(
            d.series(WARNING_SERIES).unwrap().values,
            vec![None, Some(5.0)]
        );
    }

    #[test]
    fn test_first_unit_wins() {
        let mut d = Dataset::new("rta");
        d.set_unit(None);
        d.set_unit(Some(""));
        d.set_unit(Some("ms"));
        d.set_unit(Some("s"));
        assert_eq!(d.unit, "ms");
    }

    #[test]
    fn test_serializes_as_list() {
        let mut r = Response::new();
        r.dataset_mut("b");
        r.dataset_mut("a");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json[0]["metric_name"], "b");
        assert_eq!(json[1]["metric_name"], "a");
        assert_eq!(json[0]["unit"], "");
    }
}
