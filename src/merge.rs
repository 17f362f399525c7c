use std::fs;
use std::path::{Path, PathBuf};

use crate::category::{Category, WorkbookKey};
use crate::error::MergeError;
use crate::export::STAT_COLUMN;
use crate::workbook::{SheetReader, Table, write_workbook};

/// Passing/Possession panel totals that only make sense with their
/// Forward/Midfield/Defensive prefix.
pub const LINE_BREAK_STATS: [&str; 6] = [
    "Around Attempted",
    "Around Completed",
    "Over Attempted",
    "Over Completed",
    "Through Attempted",
    "Through Completed",
];

const DETAIL_SHEET: usize = 2;
const TEAM_SHEET: usize = 3;

/// A per-image workbook that was left out of a merge.
#[derive(Debug, Clone)]
pub struct MergeFileError {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct MergeReport {
    pub path: PathBuf,
    pub template: PathBuf,
    pub inputs: usize,
    pub merged_rows: usize,
    pub duplicates_dropped: usize,
    pub line_breaks_dropped: usize,
    pub skipped: Vec<MergeFileError>,
}

/// Consolidates the per-image workbooks of each category.
#[derive(Debug, Clone)]
pub struct Merger {
    input_dir: PathBuf,
    output_dir: PathBuf,
}

impl Merger {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Per-image workbooks of `category`, ordered by image index.
    pub fn inputs(&self, category: &Category) -> Result<Vec<(WorkbookKey, PathBuf)>, MergeError> {
        let entries = fs::read_dir(&self.input_dir).map_err(|source| MergeError::List {
            path: self.input_dir.clone(),
            source,
        })?;
        let mut found: Vec<(WorkbookKey, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter_map(|path| WorkbookKey::from_path(&path).map(|key| (key, path)))
            .filter(|(key, _)| &key.category == category)
            .collect();
        found.sort_by_key(|(key, _)| key.index);
        Ok(found)
    }

    /// Merges every workbook of `category` into `Stats_<category>_Final.xlsx`.
    /// Returns `Ok(None)` when there is nothing to merge.
    pub fn merge(&self, category: &Category) -> Result<Option<MergeReport>, MergeError> {
        let inputs = self.inputs(category)?;
        if inputs.is_empty() {
            log::info!("no {category} workbooks found in {}", self.input_dir.display());
            return Ok(None);
        }

        let mut skipped = Vec::new();
        let mut template = None;
        for (_, path) in &inputs {
            match SheetReader::open(path) {
                Ok(reader) => {
                    template = Some((path.clone(), reader));
                    break;
                }
                Err(err) => {
                    log::warn!("skipping {}: {err}", path.display());
                    skipped.push(skip(path, format!("unreadable: {err}")));
                }
            }
        }
        let Some((template_path, mut reader)) = template else {
            return Err(MergeError::NoReadableInput(inputs.len()));
        };

        let needed = category.template_sheet_count();
        let mut sheet_names = reader.sheet_names();
        let found = sheet_names.len();
        if found < needed {
            log::error!(
                "{} has {found} sheets, {category} needs {needed}",
                template_path.display()
            );
            return Err(MergeError::MalformedTemplate {
                path: template_path,
                found,
                needed,
            });
        }

        let mut fixed = Vec::new();
        for position in [0, 1] {
            fixed.push(template_sheet(&mut reader, position, &template_path)?);
        }
        // Sheet count checked above.
        let detail_name = sheet_names.swap_remove(DETAIL_SHEET);
        let team_table = if category.is_summary() {
            Some(template_sheet(&mut reader, TEAM_SHEET, &template_path)?)
        } else {
            None
        };

        let mut combined: Option<Table> = None;
        let mut used = 0usize;
        for (_, path) in &inputs {
            if skipped.iter().any(|s: &MergeFileError| &s.path == path) {
                continue;
            }
            match read_detail_sheet(path) {
                Ok(table) => {
                    used += 1;
                    match combined.as_mut() {
                        Some(acc) => acc.append(&table),
                        None => combined = Some(table),
                    }
                }
                Err(reason) => {
                    log::warn!("skipping {}: {reason}", path.display());
                    skipped.push(skip(path, reason));
                }
            }
        }
        let Some(mut combined) = combined else {
            return Err(MergeError::NoReadableInput(inputs.len()));
        };

        let before = combined.rows.len();
        if !combined.dedup_by(STAT_COLUMN) {
            log::warn!("{category}: no '{STAT_COLUMN}' column, keeping duplicate rows");
        }
        let duplicates_dropped = before - combined.rows.len();

        let line_breaks_dropped = if category.drops_line_breaks() {
            combined.remove_where(STAT_COLUMN, &LINE_BREAK_STATS)
        } else {
            0
        };

        // The combined sheet keeps the template's sheet name.
        combined.name = detail_name;
        let merged_rows = combined.rows.len();

        let mut tables = fixed;
        tables.push(combined);
        tables.extend(team_table);

        let path = self.output_dir.join(category.final_file_name());
        write_workbook(&path, &tables).map_err(|source| MergeError::Write {
            path: path.clone(),
            source,
        })?;
        log::info!(
            "merged {used} {category} workbooks into {} ({merged_rows} stats)",
            path.display()
        );

        Ok(Some(MergeReport {
            path,
            template: template_path,
            inputs: used,
            merged_rows,
            duplicates_dropped,
            line_breaks_dropped,
            skipped,
        }))
    }

    /// Merges each category in turn. A failure in one category is logged and
    /// does not stop the others.
    pub fn merge_all<'a>(
        &self,
        categories: impl IntoIterator<Item = &'a Category>,
    ) -> Vec<(Category, Result<Option<MergeReport>, MergeError>)> {
        categories
            .into_iter()
            .map(|category| {
                let result = self.merge(category);
                if let Err(err) = &result {
                    log::error!("merge of {category} failed: {err}");
                }
                (category.clone(), result)
            })
            .collect()
    }
}

fn read_detail_sheet(path: &Path) -> Result<Table, String> {
    let mut reader = SheetReader::open(path).map_err(|err| format!("unreadable: {err}"))?;
    let count = reader.sheet_names().len();
    if count <= DETAIL_SHEET {
        return Err(format!("only {count} sheets"));
    }
    match reader.table_at(DETAIL_SHEET) {
        Ok(Some(table)) => Ok(table),
        Ok(None) => Err(format!("only {count} sheets")),
        Err(err) => Err(format!("failed reading detail sheet: {err}")),
    }
}

fn template_sheet(
    reader: &mut SheetReader,
    position: usize,
    path: &Path,
) -> Result<Table, MergeError> {
    match reader.table_at(position) {
        Ok(Some(table)) => Ok(table),
        Ok(None) => Err(MergeError::MalformedTemplate {
            path: path.to_path_buf(),
            found: reader.sheet_names().len(),
            needed: position + 1,
        }),
        Err(source) => {
            log::error!("failed reading {}: {source}", path.display());
            Err(MergeError::TemplateRead {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}

fn skip(path: &Path, reason: String) -> MergeFileError {
    MergeFileError {
        path: path.to_path_buf(),
        reason,
    }
}
