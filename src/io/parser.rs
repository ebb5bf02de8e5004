//! Record parsing for line-oriented text formats.
//!
//! Every format starts from newline-delimited UTF-8 lines with a trailing
//! `\r` removed, so CRLF files parse like LF files. Empty lines are skipped.
//!
//! - **CSV**: the first line is the header. The separator is auto-detected on
//!   the header among `,`, `;` and `\t` by the largest field count (earlier
//!   candidates win ties). Quoted fields are honoured.
//! - **TSV**: like CSV with a fixed tab separator and no quoting.
//! - **NDJSON**: one JSON document per line.
//! - **Lines**: each line as a JSON string.
//!
//! A malformed line ends the stream with [`StreamError::Parse`] carrying its
//! 1-based line number.

use crate::error::StreamError;
use crate::stream::{lines, Operator, Transform};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

const CSV_SEPARATORS: [u8; 3] = [b',', b';', b'\t'];

/// Text formats understood by [`parser`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Csv,
    Tsv,
    Ndjson,
    #[default]
    Lines,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Csv => "csv",
            Self::Tsv => "tsv",
            Self::Ndjson => "ndjson",
            Self::Lines => "lines",
        })
    }
}

impl FromStr for Format {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "tsv" => Ok(Self::Tsv),
            "ndjson" | "json" | "jsonl" => Ok(Self::Ndjson),
            "lines" | "text" | "txt" => Ok(Self::Lines),
            other => Err(StreamError::composition(format!("unsupported format: {other}"))),
        }
    }
}

/// Transform from raw text or byte chunks to parsed records.
pub fn parser<C>(format: Format) -> Transform<C, Value>
where
    C: AsRef<[u8]> + Send + 'static,
{
    let records: Transform<String, Value> = match format {
        Format::Csv => Transform::from_operator(Records::new(Csv::detect())),
        Format::Tsv => Transform::from_operator(Records::new(Csv::tab())),
        Format::Ndjson => Transform::from_operator(Records::new(Ndjson)),
        Format::Lines => Transform::from_operator(Records::new(PlainLines)),
    };
    lines::<C>().merge(records)
}

/// Turns one non-empty line into at most one record.
trait LineFormat: Send + 'static {
    fn parse(&mut self, line: &str, number: usize) -> Result<Option<Value>, StreamError>;
}

struct Records<F> {
    format: F,
    number: usize,
}

impl<F> Records<F> {
    fn new(format: F) -> Self {
        Self { format, number: 0 }
    }
}

impl<F: LineFormat> Operator<String, Value> for Records<F> {
    fn transform(&mut self, line: String, out: &mut Vec<Value>) -> Result<(), StreamError> {
        self.number += 1;
        let line = line.strip_suffix('\r').unwrap_or(&line);
        if line.is_empty() {
            return Ok(());
        }
        if let Some(record) = self.format.parse(line, self.number)? {
            out.push(record);
        }
        Ok(())
    }
}

struct PlainLines;

impl LineFormat for PlainLines {
    fn parse(&mut self, line: &str, _number: usize) -> Result<Option<Value>, StreamError> {
        Ok(Some(Value::String(line.to_owned())))
    }
}

struct Ndjson;

impl LineFormat for Ndjson {
    fn parse(&mut self, line: &str, number: usize) -> Result<Option<Value>, StreamError> {
        serde_json::from_str(line).map(Some).map_err(|err| StreamError::Parse {
            line: number,
            message: err.to_string(),
        })
    }
}

struct Csv {
    separator: Option<u8>,
    quoting: bool,
    header: Option<Vec<String>>,
}

impl Csv {
    fn detect() -> Self {
        Self {
            separator: None,
            quoting: true,
            header: None,
        }
    }

    fn tab() -> Self {
        Self {
            separator: Some(b'\t'),
            quoting: false,
            header: None,
        }
    }

    fn fields(&self, line: &str, separator: u8, number: usize) -> Result<Vec<String>, StreamError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .quoting(self.quoting)
            .delimiter(separator)
            .from_reader(line.as_bytes());
        let mut record = csv::StringRecord::new();
        reader.read_record(&mut record).map_err(|err| StreamError::Parse {
            line: number,
            message: err.to_string(),
        })?;
        Ok(record.iter().map(str::to_owned).collect())
    }
}

fn detect_separator(header: &str) -> u8 {
    let mut best = (0, CSV_SEPARATORS[0]);
    for sep in CSV_SEPARATORS {
        let count = header.bytes().filter(|b| *b == sep).count() + 1;
        if count > best.0 {
            best = (count, sep);
        }
    }
    best.1
}

impl LineFormat for Csv {
    fn parse(&mut self, line: &str, number: usize) -> Result<Option<Value>, StreamError> {
        let separator = *self.separator.get_or_insert_with(|| detect_separator(line));
        let values = self.fields(line, separator, number)?;
        let Some(header) = &self.header else {
            self.header = Some(values);
            return Ok(None);
        };
        let mut row = Map::with_capacity(header.len());
        for (i, key) in header.iter().enumerate() {
            let value = values.get(i).map_or(Value::Null, |v| Value::String(v.clone()));
            row.insert(key.clone(), value);
        }
        Ok(Some(Value::Object(row)))
    }
}
