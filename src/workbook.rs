use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use calamine::{Data, Reader, Xlsx, open_workbook};
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};

use crate::record::StatValue;

pub const MAX_SHEET_NAME: usize = 31;
const FORBIDDEN_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            Cell::Text(s) => s.trim().parse::<f64>().ok(),
            Cell::Empty | Cell::Bool(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Int(v) => write!(f, "{v}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<&StatValue> for Cell {
    fn from(value: &StatValue) -> Self {
        match value {
            StatValue::Int(v) => Cell::Int(*v),
            StatValue::Float(v) => Cell::Float(*v),
            StatValue::Bool(v) => Cell::Bool(*v),
            StatValue::Text(s) => Cell::Text(s.clone()),
        }
    }
}

impl From<&Data> for Cell {
    fn from(value: &Data) -> Self {
        match value {
            Data::Empty => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Int(v) => Cell::Int(*v),
            Data::Float(v) => Cell::Float(*v),
            Data::Bool(v) => Cell::Bool(*v),
            other => Cell::Text(other.to_string()),
        }
    }
}

/// A named sheet: one header row followed by data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(name: impl Into<String>, header: &[&str]) -> Self {
        Self {
            name: name.into(),
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    /// Appends `other`'s rows, matching columns by header name. Columns not
    /// seen before are added to the right; gaps are left empty.
    pub fn append(&mut self, other: &Table) {
        let mapping: Vec<usize> = other
            .header
            .iter()
            .map(|name| match self.column(name) {
                Some(idx) => idx,
                None => {
                    self.header.push(name.clone());
                    self.header.len() - 1
                }
            })
            .collect();
        let width = self.header.len();
        for row in &mut self.rows {
            row.resize(width, Cell::Empty);
        }
        for row in &other.rows {
            let mut out = vec![Cell::Empty; width];
            for (src, cell) in row.iter().enumerate() {
                if let Some(&dst) = mapping.get(src) {
                    out[dst] = cell.clone();
                }
            }
            self.rows.push(out);
        }
    }

    /// Keeps the first row for each distinct value in `column`. Returns
    /// `false` without touching the table when the column is absent.
    pub fn dedup_by(&mut self, column: &str) -> bool {
        let Some(idx) = self.column(column) else {
            return false;
        };
        let mut seen = HashSet::new();
        self.rows.retain(|row| {
            let key = row.get(idx).map(|c| c.to_string()).unwrap_or_default();
            seen.insert(key)
        });
        true
    }

    /// Drops rows whose `column` value is one of `values`.
    pub fn remove_where(&mut self, column: &str, values: &[&str]) -> usize {
        let Some(idx) = self.column(column) else {
            return 0;
        };
        let before = self.rows.len();
        self.rows.retain(|row| {
            let key = row.get(idx).map(|c| c.to_string()).unwrap_or_default();
            !values.contains(&key.as_str())
        });
        before - self.rows.len()
    }

    pub fn values(&self, column: &str) -> Vec<&Cell> {
        let Some(idx) = self.column(column) else {
            return Vec::new();
        };
        self.rows.iter().filter_map(|row| row.get(idx)).collect()
    }
}

/// Makes `raw` acceptable as an Excel sheet name: forbidden characters become
/// `_`, leading/trailing apostrophes go, and the result is cut to 31 chars.
pub fn sheet_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if FORBIDDEN_SHEET_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let trimmed = cleaned.trim_matches('\'');
    let name: String = trimmed.chars().take(MAX_SHEET_NAME).collect();
    if name.is_empty() {
        "Sheet".to_string()
    } else {
        name
    }
}

/// Returns `name`, or a suffixed variant that is not in `taken`
/// (case-insensitive, like Excel).
pub fn unique_sheet_name(name: String, taken: &[String]) -> String {
    let clashes = |candidate: &str| {
        taken
            .iter()
            .any(|t| t.to_lowercase() == candidate.to_lowercase())
    };
    if !clashes(&name) {
        return name;
    }
    for n in 2.. {
        let suffix = format!("~{n}");
        let keep = MAX_SHEET_NAME.saturating_sub(suffix.chars().count());
        let base: String = name.chars().take(keep).collect();
        let candidate = format!("{base}{suffix}");
        if !clashes(&candidate) {
            return candidate;
        }
    }
    unreachable!("sheet name suffixes are unbounded")
}

pub fn write_workbook(path: &Path, tables: &[Table]) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    for table in tables {
        let sheet = workbook.add_worksheet();
        sheet.set_name(&table.name)?;
        write_table(sheet, table)?;
    }
    workbook.save(path)
}

fn write_table(worksheet: &mut Worksheet, table: &Table) -> Result<(), XlsxError> {
    for (col_idx, value) in table.header.iter().enumerate() {
        worksheet.write_string(0, col_idx as u16, value)?;
    }
    for (row_idx, row) in table.rows.iter().enumerate() {
        let r = row_idx as u32 + 1;
        for (col_idx, cell) in row.iter().enumerate() {
            let c = col_idx as u16;
            match cell {
                Cell::Empty => {}
                Cell::Text(s) => {
                    worksheet.write_string(r, c, s)?;
                }
                Cell::Int(v) => {
                    worksheet.write_number(r, c, *v as f64)?;
                }
                Cell::Float(v) => {
                    worksheet.write_number(r, c, *v)?;
                }
                Cell::Bool(v) => {
                    worksheet.write_boolean(r, c, *v)?;
                }
            }
        }
    }
    Ok(())
}

/// Opens an xlsx file for reading.
pub struct SheetReader {
    inner: Xlsx<std::io::BufReader<std::fs::File>>,
}

impl SheetReader {
    pub fn open(path: &Path) -> Result<Self, calamine::XlsxError> {
        let inner: Xlsx<_> = open_workbook(path)?;
        Ok(Self { inner })
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.inner.sheet_names()
    }

    /// Reads the sheet at `position` as a [`Table`]. The first row is the
    /// header.
    pub fn table_at(&mut self, position: usize) -> Result<Option<Table>, calamine::XlsxError> {
        let names = self.inner.sheet_names();
        let Some(name) = names.get(position) else {
            return Ok(None);
        };
        let range = self.inner.worksheet_range(name)?;
        // calamine trims leading empty rows/columns; pad back to A1.
        let (row_off, col_off) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));

        let mut grid: Vec<Vec<Cell>> = Vec::new();
        for _ in 0..row_off {
            grid.push(Vec::new());
        }
        for row in range.rows() {
            let mut out = vec![Cell::Empty; col_off];
            out.extend(row.iter().map(Cell::from));
            grid.push(out);
        }

        let mut rows = grid.into_iter();
        let header = rows
            .next()
            .unwrap_or_default()
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>();
        let width = header.len();
        let rows = rows
            .map(|mut row| {
                while row.len() > width && row.last().is_some_and(Cell::is_empty) {
                    row.pop();
                }
                row
            })
            .collect();

        Ok(Some(Table {
            name: name.clone(),
            header,
            rows,
        }))
    }
}

pub fn read_tables(path: &Path) -> Result<Vec<Table>, calamine::XlsxError> {
    let mut reader = SheetReader::open(path)?;
    let count = reader.sheet_names().len();
    let mut tables = Vec::with_capacity(count);
    for position in 0..count {
        if let Some(table) = reader.table_at(position)? {
            tables.push(table);
        }
    }
    Ok(tables)
}
