//! InfluxQL query construction.
//!
//! Host and service names are interpolated as-is. A single quote in either
//! name produces a broken (or altered) query; callers must not pass
//! untrusted names until escaping is added.

use crate::types::SelectorConfig;

/// Builds the InfluxQL statements for one check.
#[derive(Clone, Debug)]
pub struct QueryBuilder<'a> {
    check_command: &'a str,
    selector: &'a SelectorConfig,
    host_name: &'a str,
    service_name: &'a str,
    is_host_check: bool,
    from: i64,
}

impl<'a> QueryBuilder<'a> {
    /// Create a builder for `check_command` starting at `from` (unix seconds).
    pub fn new(
        check_command: &'a str,
        selector: &'a SelectorConfig,
        host_name: &'a str,
        service_name: &'a str,
        is_host_check: bool,
        from: i64,
    ) -> Self {
        Self {
            check_command,
            selector,
            host_name,
            service_name,
            is_host_check,
            from,
        }
    }

    /// The `WHERE` selector, without surrounding parentheses.
    pub fn selector_clause(&self) -> String {
        let mut clause = format!("{} = '{}'", self.selector.hostname_tag, self.host_name);
        if !self.is_host_check {
            clause.push_str(&format!(
                " AND {} = '{}'",
                self.selector.servicename_tag, self.service_name
            ));
        }
        clause
    }

    fn where_clause(&self) -> String {
        format!(
            "WHERE ({}) AND time >= {}s AND time <= now()",
            self.selector_clause(),
            self.from
        )
    }

    /// Number of points per metric in the requested range.
    pub fn count_query(&self) -> String {
        format!(
            "SELECT COUNT(value) FROM \"{}\" {} GROUP BY metric",
            self.check_command,
            self.where_clause()
        )
    }

    /// Values and thresholds per metric.
    ///
    /// A positive `window_seconds` keeps the last observation of every
    /// bucket of that width.
    pub fn value_query(&self, window_seconds: i64) -> String {
        if window_seconds <= 0 {
            return format!(
                "SELECT value, warn, crit, unit FROM \"{}\" {} GROUP BY metric",
                self.check_command,
                self.where_clause()
            );
        }

        format!(
            "SELECT LAST(value) AS value, LAST(warn) AS warn, LAST(crit) AS crit, LAST(unit) AS unit \
             FROM \"{}\" {} GROUP BY time({}s), metric",
            self.check_command,
            self.where_clause(),
            window_seconds
        )
    }
}

/// Reachability probe for `database`. The name is not quoted.
pub fn status_query(database: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", database)
}
