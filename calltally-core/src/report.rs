//! Output formatting - table, JSON and CSV.

use serde::Serialize;
use std::io::{self, Write};

use crate::config::{Mode, OutputFormat};

/// One ranked receiver/method pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairRow {
    pub receiver: String,
    pub method: String,
    pub count: u64,
}

/// One ranked method or receiver name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRow {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rows {
    Pairs(Vec<PairRow>),
    Names(Vec<NameRow>),
}

/// Ranked result of a scan session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub mode: Mode,
    pub rows: Rows,
}

impl Report {
    pub fn len(&self) -> usize {
        match &self.rows {
            Rows::Pairs(rows) => rows.len(),
            Rows::Names(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row counts in rank order.
    pub fn counts(&self) -> Vec<u64> {
        match &self.rows {
            Rows::Pairs(rows) => rows.iter().map(|r| r.count).collect(),
            Rows::Names(rows) => rows.iter().map(|r| r.count).collect(),
        }
    }

    /// Count for `receiver.method`, if that pair was ranked.
    pub fn pair(&self, receiver: &str, method: &str) -> Option<u64> {
        match &self.rows {
            Rows::Pairs(rows) => rows
                .iter()
                .find(|r| r.receiver == receiver && r.method == method)
                .map(|r| r.count),
            Rows::Names(_) => None,
        }
    }

    /// Count for a ranked method or receiver name.
    pub fn name(&self, name: &str) -> Option<u64> {
        match &self.rows {
            Rows::Names(rows) => rows.iter().find(|r| r.name == name).map(|r| r.count),
            Rows::Pairs(_) => None,
        }
    }

    /// Display labels in rank order: `receiver.method` or the bare name.
    pub fn labels(&self) -> Vec<String> {
        match &self.rows {
            Rows::Pairs(rows) => rows
                .iter()
                .map(|r| format!("{}.{}", r.receiver, r.method))
                .collect(),
            Rows::Names(rows) => rows.iter().map(|r| r.name.clone()).collect(),
        }
    }
}

/// Renders `report` in `format`.
pub fn write_report<W: Write>(report: &Report, format: OutputFormat, out: &mut W) -> io::Result<()> {
    match format {
        OutputFormat::Table => write_table(report, out),
        OutputFormat::Json => write_json(report, out),
        OutputFormat::Csv => write_csv(report, out),
    }
}

fn write_table<W: Write>(report: &Report, out: &mut W) -> io::Result<()> {
    let labels = report.labels();
    let counts = report.counts();
    let count_w = counts
        .iter()
        .map(|c| c.to_string().len())
        .max()
        .unwrap_or(1);

    for (label, count) in labels.iter().zip(counts) {
        writeln!(out, "{:>width$}  {}", count, label, width = count_w)?;
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    mode: &'static str,
    rows: JsonRows<'a>,
}

/// Name rows are keyed by `method` or `receiver` depending on the mode.
#[derive(Serialize)]
#[serde(untagged)]
enum JsonRows<'a> {
    Pairs(&'a [PairRow]),
    Methods(Vec<MethodRow<'a>>),
    Receivers(Vec<ReceiverRow<'a>>),
}

#[derive(Serialize)]
struct MethodRow<'a> {
    method: &'a str,
    count: u64,
}

#[derive(Serialize)]
struct ReceiverRow<'a> {
    receiver: &'a str,
    count: u64,
}

fn write_json<W: Write>(report: &Report, out: &mut W) -> io::Result<()> {
    let rows = match (&report.rows, report.mode) {
        (Rows::Pairs(rows), _) => JsonRows::Pairs(rows),
        (Rows::Names(rows), Mode::Receivers) => JsonRows::Receivers(
            rows.iter()
                .map(|r| ReceiverRow {
                    receiver: &r.name,
                    count: r.count,
                })
                .collect(),
        ),
        (Rows::Names(rows), _) => JsonRows::Methods(
            rows.iter()
                .map(|r| MethodRow {
                    method: &r.name,
                    count: r.count,
                })
                .collect(),
        ),
    };
    let payload = JsonReport {
        mode: report.mode.as_str(),
        rows,
    };
    serde_json::to_writer_pretty(&mut *out, &payload).map_err(io::Error::other)?;
    writeln!(out)
}

fn write_csv<W: Write>(report: &Report, out: &mut W) -> io::Result<()> {
    match &report.rows {
        Rows::Pairs(rows) => {
            writeln!(out, "receiver,method,count")?;
            for r in rows {
                writeln!(out, "{},{},{}", csv_field(&r.receiver), csv_field(&r.method), r.count)?;
            }
        }
        Rows::Names(rows) => {
            let header = if report.mode == Mode::Receivers {
                "receiver"
            } else {
                "method"
            };
            writeln!(out, "{},count", header)?;
            for r in rows {
                writeln!(out, "{},{}", csv_field(&r.name), r.count)?;
            }
        }
    }
    Ok(())
}

/// Quotes a field when it holds a comma, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
