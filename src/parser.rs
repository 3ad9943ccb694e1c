//! Async parser for the CSV format of the InfluxDB 1.x `/query` endpoint.
//!
//! A response holds one table per series of the `GROUP BY`, each introduced
//! by its own header row:
//!
//! ```text
//! name,tags,time,value,warn,crit,unit
//! load,metric=load1,1700000000,0.42,5,10,
//! load,metric=load1,1700000060,0.40,5,10,
//!
//! name,tags,time,value,warn,crit,unit
//! load,metric=load5,1700000000,0.37,4,8,
//! ```
//!
//! Malformed rows fail fast: the first row that cannot be decoded ends the
//! stream with an [`Error::Decode`] carrying its row number.

use std::pin::Pin;

use async_stream::stream;
use csv_async::{AsyncReaderBuilder, StringRecord, Trim};
use futures::Stream;
use tokio::io::AsyncRead;

use crate::error::{Error, Result};
use crate::types::{Column, Record, TableLayout};

/// A lazily decoded sequence of records.
pub type RecordStream = Pin<Box<dyn Stream<Item = Result<Record>> + Send>>;

/// Async streaming parser for InfluxDB 1.x CSV.
///
/// This parser reads an async byte stream and yields [`Record`]s one at a
/// time, without loading the entire response into memory.
///
/// # Example
///
/// ```ignore
/// use perfdata_influxdb::parser::CsvRecordParser;
///
/// let body: &[u8] = b"name,tags,time,value\nload,metric=load1,1700000000,0.5\n";
/// let mut parser = CsvRecordParser::new(body, true);
/// while let Some(record) = parser.next().await? {
///     println!("{} = {:?}", record.metric_name, record.value);
/// }
/// ```
pub struct CsvRecordParser<R: AsyncRead + Unpin> {
    csv: csv_async::AsyncReader<R>,
    row: StringRecord,
    rows_read: u64,
    has_header: bool,
    table_position: usize,
    table: Option<TableLayout>,
}

impl<R: AsyncRead + Unpin + Send> CsvRecordParser<R> {
    /// Create a new parser.
    ///
    /// With `has_header` set, header rows are read from the body and may
    /// repeat before every table. Otherwise every row is data in the layout
    /// `name,tags,time,value,warn,crit,unit`.
    pub fn new(reader: R, has_header: bool) -> Self {
        let csv = AsyncReaderBuilder::new()
            .has_headers(false) // Headers repeat per table, we track them ourselves
            .trim(Trim::Fields)
            .flexible(true)
            .create_reader(reader);

        Self {
            csv,
            row: StringRecord::new(),
            rows_read: 0,
            has_header,
            table_position: 0,
            table: if has_header {
                None
            } else {
                Some(TableLayout::default_layout())
            },
        }
    }

    /// Parse and return the next record.
    ///
    /// Returns:
    /// - `Ok(Some(record))` - Successfully decoded a data row
    /// - `Ok(None)` - End of stream (EOF)
    /// - `Err(e)` - Read or decode error
    pub async fn next(&mut self) -> Result<Option<Record>> {
        loop {
            let more = self
                .csv
                .read_record(&mut self.row)
                .await
                .map_err(read_error)?;
            if !more {
                return Ok(None);
            }
            self.rows_read += 1;

            let row_number = self
                .row
                .position()
                .map(|p| p.line())
                .unwrap_or(self.rows_read);

            // Separator lines between tables
            if self.row.iter().all(str::is_empty) {
                continue;
            }

            if self.is_header_row() {
                self.table = Some(parse_header(&self.row, self.table_position, row_number)?);
                self.table_position += 1;
                continue;
            }

            let table = match &self.table {
                Some(t) => t,
                None => {
                    return Err(Error::decode(
                        row_number,
                        "data row found before any header row",
                    ));
                }
            };

            return parse_row(&self.row, table, row_number).map(Some);
        }
    }

    /// A header names a `time` column and has no empty cells. Once a table
    /// is open, a row with an integer where that table's `time` column sits
    /// is data, whatever its other cells say.
    fn is_header_row(&self) -> bool {
        if !self.has_header || !self.row.iter().any(|cell| cell == "time") {
            return false;
        }
        if self.row.iter().any(str::is_empty) {
            return false;
        }

        match self.table.as_ref().and_then(|t| t.index_of(Column::Time)) {
            Some(i) => self
                .row
                .get(i)
                .is_none_or(|cell| cell.parse::<i64>().is_err()),
            None => true,
        }
    }

    /// Number of tables (header blocks) seen so far.
    pub fn tables_seen(&self) -> usize {
        self.table_position
    }

    /// Turn the parser into a stream that ends after the first error.
    pub fn into_stream(self) -> RecordStream
    where
        R: 'static,
    {
        let mut parser = self;
        Box::pin(stream! {
            loop {
                match parser.next().await {
                    Ok(Some(record)) => yield Ok(record),
                    Ok(None) => break, // EOF
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        })
    }
}

/// Decode `reader` into a lazy, single-pass stream of records.
pub fn decode<R>(reader: R, has_header: bool) -> RecordStream
where
    R: AsyncRead + Unpin + Send + 'static,
{
    CsvRecordParser::new(reader, has_header).into_stream()
}

/// I/O failures under the CSV reader keep their kind.
fn read_error(e: csv_async::Error) -> Error {
    let message = e.to_string();
    match e.into_kind() {
        csv_async::ErrorKind::Io(io) => Error::from_body_io(io),
        _ => Error::Csv(format!("CSV read error: {}", message)),
    }
}

fn parse_header(row: &StringRecord, position: usize, row_number: u64) -> Result<TableLayout> {
    let layout = TableLayout {
        position,
        columns: row.iter().map(Column::from_header).collect(),
    };

    if layout.index_of(Column::Metric).is_none() && layout.index_of(Column::Tags).is_none() {
        return Err(Error::decode(
            row_number,
            "header has neither a metric nor a tags column",
        ));
    }

    Ok(layout)
}

fn parse_row(row: &StringRecord, table: &TableLayout, row_number: u64) -> Result<Record> {
    if row.len() != table.columns.len() {
        return Err(Error::decode(
            row_number,
            format!(
                "column count mismatch: expected {}, got {}",
                table.columns.len(),
                row.len()
            ),
        ));
    }

    let mut series_name = String::new();
    let mut metric_name = None;
    let mut tags = None;
    let mut timestamp = None;
    let mut value = None;
    let mut warning = None;
    let mut critical = None;
    let mut unit = None;

    for (column, cell) in table.columns.iter().zip(row.iter()) {
        match column {
            Column::Name => series_name = cell.to_string(),
            Column::Tags => tags = Some(cell),
            Column::Metric => metric_name = Some(cell.to_string()),
            Column::Time => {
                let ts = cell.parse::<i64>().map_err(|e| {
                    Error::decode(row_number, format!("invalid timestamp '{}': {}", cell, e))
                })?;
                timestamp = Some(ts);
            }
            Column::Value => value = parse_float(cell, "value", row_number)?,
            Column::Warn => warning = parse_float(cell, "warn", row_number)?,
            Column::Crit => critical = parse_float(cell, "crit", row_number)?,
            Column::Unit if !cell.is_empty() => unit = Some(cell.to_string()),
            Column::Unit | Column::Ignored => {}
        }
    }

    let metric_name = match metric_name.or_else(|| tags.and_then(metric_from_tags)) {
        Some(m) => m,
        None => return Err(Error::decode(row_number, "row carries no metric tag")),
    };

    let timestamp = match timestamp {
        Some(ts) => ts,
        None => return Err(Error::decode(row_number, "row has no time column")),
    };

    Ok(Record {
        series_name,
        metric_name,
        timestamp,
        value,
        warning,
        critical,
        unit,
    })
}

/// Empty cells are null; anything else must be a number.
fn parse_float(cell: &str, column_name: &str, row_number: u64) -> Result<Option<f64>> {
    if cell.is_empty() {
        return Ok(None);
    }

    cell.parse::<f64>().map(Some).map_err(|e| {
        Error::decode(
            row_number,
            format!("invalid number '{}' for column '{}': {}", cell, column_name, e),
        )
    })
}

/// Extract the `metric` entry from a `key=value,key=value` tag list.
fn metric_from_tags(tags: &str) -> Option<String> {
    tags.split(',')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "metric")
        .map(|(_, value)| value.to_string())
}
