//! InfluxDB 1.x perfdata client.
//!
//! This module provides the [`Client`] that runs the two-step count/value
//! protocol, and the [`Transport`] seam it sends requests through.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use reqwest::{Method, Url};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::StreamReader;
use tracing::{debug, error};

use crate::config::Config;
use crate::downsample::{MetricCounts, aggregate_window};
use crate::error::{Error, Result};
use crate::parser::decode;
use crate::query::{QueryBuilder, status_query};
use crate::response::Response;
use crate::transform::{count_metrics, transform};
use crate::types::{MetricQuery, SelectorConfig};

/// Path of the InfluxDB 1.x query endpoint.
pub const QUERY_ENDPOINT: &str = "/query";

/// A response body, read lazily.
pub type Body = Pin<Box<dyn AsyncRead + Send>>;

/// One HTTP request against the query endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryRequest {
    pub method: Method,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub username: String,
    pub password: String,
}

impl QueryRequest {
    fn new(method: Method, username: &str, password: &str) -> Self {
        Self {
            method,
            path: QUERY_ENDPOINT.to_string(),
            params: Vec::new(),
            headers: Vec::new(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    /// Value of a query parameter.
    pub fn get_param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of a request header.
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Sends requests to InfluxDB and hands back the body as a stream.
///
/// Implementations map a non-2xx status to [`Error::Http`], an unreachable
/// server to [`Error::Connection`] and an expired timeout to
/// [`Error::Timeout`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: QueryRequest) -> Result<Body>;
}

/// [`Transport`] backed by reqwest.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    /// Create a transport with the timeout and TLS settings of `config`.
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(!config.tls_verify())
            .build()?;
        Self::with_http_client(http, &config.influx.api_url)
    }

    /// Create a transport with a custom reqwest client.
    ///
    /// This allows you to configure proxies, connection pools, etc.
    pub fn with_http_client(http: reqwest::Client, url: &str) -> Result<Self> {
        let base_url = Url::parse(url)
            .map_err(|e| Error::Config(format!("Invalid InfluxDB URL '{}': {}", url, e)))?;
        Ok(Self { http, base_url })
    }

    /// Get the base URL.
    pub fn url(&self) -> &Url {
        &self.base_url
    }

    /// Build the full URL for an API endpoint, keeping any path prefix.
    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: QueryRequest) -> Result<Body> {
        let endpoint = self.endpoint(&request.path);

        let mut builder = self
            .http
            .request(request.method, &endpoint)
            .basic_auth(&request.username, Some(&request.password))
            .query(&request.params);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = builder.send().await?.error_for_status()?;

        // Convert the response body to an async reader
        let reader = StreamReader::new(response.bytes_stream().map_err(std::io::Error::other));
        Ok(Box::pin(reader))
    }
}

/// Outcome of a reachability check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Response body, or a description of the failure.
    pub output: String,
    /// Whether the check failed.
    pub error: bool,
}

impl StatusReport {
    fn ok(output: String) -> Self {
        Self {
            output,
            error: false,
        }
    }

    fn failed(output: String) -> Self {
        Self {
            output,
            error: true,
        }
    }

    fn from_error(e: &Error) -> Self {
        let output = match e {
            Error::Connection(msg) | Error::Timeout(msg) => format!("Connection error: {}", msg),
            Error::Http { status, reason } => format!("HTTP error: {} - {}", status, reason),
            Error::Request(msg) => format!("Request error: {}", msg),
            other => format!("General error: {}", other),
        };
        Self::failed(output)
    }
}

/// InfluxDB 1.x perfdata client.
///
/// Holds only read-only connection settings; clones share the transport and
/// may be used from concurrent tasks.
///
/// # Example
///
/// ```ignore
/// use perfdata_influxdb::{Client, Config, MetricQuery};
///
/// let config = Config::load_or_default("/etc/perfdata-influxdb.toml");
/// let client = Client::new(&config)?;
/// let query = MetricQuery::new("web01", "load", "load", 1700000000, false);
/// for dataset in client.get_metrics(&query).await?.datasets() {
///     println!("{} [{}]: {} points", dataset.metric_name, dataset.unit, dataset.timestamps.len());
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    database: String,
    username: String,
    password: String,
    max_data_points: i64,
    selector: SelectorConfig,
}

impl Client {
    /// Create a client talking HTTP to the configured server.
    pub fn new(config: &Config) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client using a custom transport.
    pub fn with_transport(config: &Config, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            database: config.influx.api_database.clone(),
            username: config.influx.api_username.clone(),
            password: config.influx.api_password.clone(),
            max_data_points: config.influx.api_max_data_points,
            selector: config.selector(),
        }
    }

    /// Get the database name.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Fetch all datasets of a check, downsampled if needed.
    pub async fn get_metrics(&self, query: &MetricQuery) -> Result<Response> {
        self.get_metrics_at(query, Utc::now().timestamp()).await
    }

    /// Like [`Client::get_metrics`] with an explicit current time (unix seconds).
    ///
    /// Always issues the count query first, even when downsampling is
    /// disabled, then the value query built from its result.
    pub async fn get_metrics_at(&self, query: &MetricQuery, now: i64) -> Result<Response> {
        let builder = self.builder(query);

        let counts = self.fetch_counts(&builder).await?;
        let window = aggregate_window(query.from, now, &counts, self.max_data_points);
        debug!(
            check = %query.check_command,
            points = ?counts.representative(),
            max_data_points = self.max_data_points,
            window,
            "computed aggregate window"
        );

        let q = builder.value_query(window);
        let body = self.send_csv(q).await?;

        transform(
            decode(body, true),
            &query.include_metrics,
            &query.exclude_metrics,
        )
        .await
    }

    /// Number of points per metric in the requested range.
    pub async fn get_metric_counts(&self, query: &MetricQuery) -> Result<MetricCounts> {
        self.fetch_counts(&self.builder(query)).await
    }

    /// Check that the server is reachable and the database can be queried.
    ///
    /// Never fails; problems are reported in the returned [`StatusReport`].
    pub async fn status(&self) -> StatusReport {
        let request = QueryRequest::new(Method::GET, &self.username, &self.password)
            .param("db", &self.database)
            .param("q", status_query(&self.database))
            .header("Content-Type", "application/json");

        debug!(database = %self.database, "checking InfluxDB status");

        let report = match self.transport.send(request).await {
            Ok(mut body) => {
                let mut output = String::new();
                match body.read_to_string(&mut output).await {
                    Ok(_) => StatusReport::ok(output),
                    Err(e) => StatusReport::failed(format!("General error: {}", e)),
                }
            }
            Err(e) => StatusReport::from_error(&e),
        };

        if report.error {
            error!(output = %report.output, "InfluxDB status check failed");
        }
        report
    }

    fn builder<'a>(&'a self, query: &'a MetricQuery) -> QueryBuilder<'a> {
        QueryBuilder::new(
            &query.check_command,
            &self.selector,
            &query.host_name,
            &query.service_name,
            query.is_host_check,
            query.from,
        )
    }

    async fn fetch_counts(&self, builder: &QueryBuilder<'_>) -> Result<MetricCounts> {
        let body = self.send_csv(builder.count_query()).await?;
        count_metrics(decode(body, true)).await
    }

    async fn send_csv(&self, q: String) -> Result<Body> {
        debug!(database = %self.database, query = %q, "calling query API");

        let request = QueryRequest::new(Method::POST, &self.username, &self.password)
            .param("db", &self.database)
            .param("q", q)
            .param("epoch", "s")
            .header("Accept", "application/csv");

        self.transport.send(request).await
    }
}
