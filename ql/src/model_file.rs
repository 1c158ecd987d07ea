//! Text persistence of a [QTable].
//!
//! One line per state: `<state>:<row>`, e.g. `(-1, 0, 1):[(-45.0, 1), (0.0, 0), (12.5, 4)]`.
//! The grammar is restricted to integer tuples and a list of `(float, int)` pairs:
//!
//! ```text
//! line  := state ':' row
//! state := '(' [ int { ',' int } [','] ] ')'
//! row   := '[' [ entry { ',' entry } [','] ] ']'
//! entry := '(' number ',' int [','] ')'
//! ```
//!
//! `number` is a decimal float or one of `inf`, `-inf`, `NaN`.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use itertools::Itertools;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::state::{Offset, State};
use crate::table::{QEntry, QTable};

#[derive(Error, Debug)]
pub enum ModelFileError {
    #[error("line {line}, column {column}: expected {expected}")]
    Expected {
        line: usize,
        column: usize,
        expected: &'static str,
    },

    #[error("line {line}: invalid number '{text}'")]
    InvalidNumber { line: usize, text: String },

    #[error("line {line}: state value {value} is not one of -1, 0, 1")]
    InvalidOffset { line: usize, value: i64 },

    #[error("line {line}: row has {got} entries, expected {expected}")]
    RowLength { line: usize, got: usize, expected: usize },

    #[error("line {line}: state has {got} features, previous lines have {expected}")]
    Arity { line: usize, got: usize, expected: usize },

    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

/// Reads a table from `path`. Any failure yields an empty table.
pub fn load(path: &Path, action_space: usize) -> QTable {
    match File::open(path)
        .map_err(|source| ModelFileError::Io {
            operation: format!("open {}", path.display()),
            source,
        })
        .and_then(|file| read_table(BufReader::new(file), action_space))
    {
        Ok(table) => {
            log::info!("loaded model with {} states from {}", table.len(), path.display());
            table
        }
        Err(e) => {
            log::warn!("starting with an empty model: {}", e);
            QTable::new(action_space)
        }
    }
}

/// Writes into a sibling temp file which then replaces `path`, so a failed save keeps the previous model
pub fn save(table: &QTable, path: &Path) -> Result<(), ModelFileError> {
    let io_err = |operation: &str| {
        let operation = format!("{} {}", operation, path.display());
        move |source| ModelFileError::Io { operation, source }
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file = NamedTempFile::new_in(dir).map_err(io_err("create temp file for"))?;
    let mut writer = BufWriter::new(file);
    write_table(table, &mut writer).map_err(io_err("write"))?;
    let file = writer.into_inner().map_err(|e| io_err("flush")(e.into_error()))?;
    file.as_file().sync_all().map_err(io_err("sync"))?;
    file.persist(path).map_err(|e| io_err("replace")(e.error))?;
    log::info!("saved model with {} states to {}", table.len(), path.display());
    Ok(())
}

pub fn read_table<R: BufRead>(reader: R, action_space: usize) -> Result<QTable, ModelFileError> {
    let mut table = QTable::new(action_space);
    for (idx, text) in reader.lines().enumerate() {
        let line = idx + 1;
        let text = text.map_err(|source| ModelFileError::Io {
            operation: format!("read line {}", line),
            source,
        })?;
        if text.trim().is_empty() {
            continue;
        }
        let (state, row) = parse_line(&text, line)?;
        if row.len() != action_space {
            return Err(ModelFileError::RowLength {
                line,
                got: row.len(),
                expected: action_space,
            });
        }
        if let Some(expected) = table.arity().filter(|&a| a != state.len()) {
            return Err(ModelFileError::Arity {
                line,
                got: state.len(),
                expected,
            });
        }
        table.insert_row(state, row);
    }
    Ok(table)
}

pub fn write_table<W: Write>(table: &QTable, writer: &mut W) -> std::io::Result<()> {
    for (state, row) in table.iter() {
        writeln!(writer, "{}:{}", state, format_row(row))?;
    }
    Ok(())
}

/// `[(value, count), ...]`; values use the shortest representation that reads back exactly,
/// non-finite ones are written as `inf`, `-inf` or `NaN`
pub fn format_row(row: &[QEntry]) -> String {
    format!(
        "[{}]",
        row.iter().map(|e| format!("({:?}, {})", e.value, e.count)).join(", ")
    )
}

pub fn parse_line(text: &str, line: usize) -> Result<(State, Vec<QEntry>), ModelFileError> {
    let mut cursor = Cursor::new(text, line);
    let state = cursor.state()?;
    cursor.expect(':', "':' between state and row")?;
    let row = cursor.row()?;
    cursor.end()?;
    Ok((state, row))
}

pub fn parse_state(text: &str) -> Result<State, ModelFileError> {
    let mut cursor = Cursor::new(text, 1);
    let state = cursor.state()?;
    cursor.end()?;
    Ok(state)
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str, line: usize) -> Self {
        Self { text, pos: 0, line }
    }

    fn state(&mut self) -> Result<State, ModelFileError> {
        let values = self.sequence('(', ')', "state tuple", |c| c.integer())?;
        values
            .into_iter()
            .map(|value| {
                Offset::try_from_value(value).ok_or(ModelFileError::InvalidOffset {
                    line: self.line,
                    value,
                })
            })
            .collect()
    }

    fn row(&mut self) -> Result<Vec<QEntry>, ModelFileError> {
        self.sequence('[', ']', "row list", |c| c.entry())
    }

    fn entry(&mut self) -> Result<QEntry, ModelFileError> {
        self.expect('(', "'(' opening an entry")?;
        let value = self.float()?;
        self.expect(',', "',' between value and count")?;
        let count = self.integer()?;
        let count = u64::try_from(count).map_err(|_| ModelFileError::InvalidNumber {
            line: self.line,
            text: count.to_string(),
        })?;
        self.skip_ws();
        if self.peek() == Some(',') {
            self.pos += 1;
        }
        self.expect(')', "')' closing an entry")?;
        Ok(QEntry::new(value, count))
    }

    /// `open [item {, item} [,]] close`
    fn sequence<T>(
        &mut self,
        open: char,
        close: char,
        what: &'static str,
        mut item: impl FnMut(&mut Self) -> Result<T, ModelFileError>,
    ) -> Result<Vec<T>, ModelFileError> {
        self.expect(open, what)?;
        let mut items = vec![];
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(items);
            }
            items.push(item(self)?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(c) if c == close => {
                    self.pos += 1;
                    return Ok(items);
                }
                _ => return Err(self.expected("',' or closing bracket")),
            }
        }
    }

    fn integer(&mut self) -> Result<i64, ModelFileError> {
        let text = self.number_text();
        text.parse().map_err(|_| ModelFileError::InvalidNumber {
            line: self.line,
            text: text.to_string(),
        })
    }

    fn float(&mut self) -> Result<f64, ModelFileError> {
        let text = self.number_text();
        text.parse().map_err(|_| ModelFileError::InvalidNumber {
            line: self.line,
            text: text.to_string(),
        })
    }

    fn number_text(&mut self) -> &'a str {
        self.skip_ws();
        let text = self.text;
        let rest = &text[self.pos..];
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.')))
            .unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn expect(&mut self, c: char, expected: &'static str) -> Result<(), ModelFileError> {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            Ok(())
        } else {
            Err(self.expected(expected))
        }
    }

    fn end(&mut self) -> Result<(), ModelFileError> {
        self.skip_ws();
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.expected("end of line")),
        }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) {
        let rest = &self.text[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn expected(&self, expected: &'static str) -> ModelFileError {
        ModelFileError::Expected {
            line: self.line,
            column: self.pos + 1,
            expected,
        }
    }
}
