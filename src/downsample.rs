//! Downsample window calculation.

/// Number of points per metric, in first-seen order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricCounts {
    entries: Vec<(String, i64)>,
    last: Option<usize>,
}

impl MetricCounts {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the count for `metric`, overwriting an earlier count in place.
    pub fn insert(&mut self, metric: impl Into<String>, count: i64) {
        let metric = metric.into();
        match self.entries.iter().position(|(m, _)| *m == metric) {
            Some(i) => {
                self.entries[i].1 = count;
                self.last = Some(i);
            }
            None => {
                self.entries.push((metric, count));
                self.last = Some(self.entries.len() - 1);
            }
        }
    }

    /// Count for `metric`.
    pub fn get(&self, metric: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(m, _)| m == metric)
            .map(|(_, c)| *c)
    }

    /// The count used for the downsample decision.
    ///
    /// Metrics of one check share a time range and usually have equal counts,
    /// so this is simply the most recently written entry, not the maximum.
    pub fn representative(&self) -> Option<i64> {
        self.last.map(|i| self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(metric, count)` in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.entries.iter().map(|(m, c)| (m.as_str(), *c))
    }
}

impl<S: Into<String>> FromIterator<(S, i64)> for MetricCounts {
    fn from_iter<I: IntoIterator<Item = (S, i64)>>(iter: I) -> Self {
        let mut counts = Self::new();
        for (metric, count) in iter {
            counts.insert(metric, count);
        }
        counts
    }
}

/// Bucket width in seconds for the value query, or 0 for no downsampling.
///
/// A count exactly equal to `max_data_points` is not downsampled.
pub fn aggregate_window(from: i64, now: i64, counts: &MetricCounts, max_data_points: i64) -> i64 {
    if max_data_points <= 0 {
        return 0;
    }

    let Some(points) = counts.representative() else {
        return 0;
    };

    if points < max_data_points {
        return 0;
    }

    if points > max_data_points {
        return ((now - from) as f64 / max_data_points as f64).round() as i64;
    }

    0
}
