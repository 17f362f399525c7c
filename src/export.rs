use std::fmt;
use std::path::PathBuf;

use serde_json::Value;

use crate::category::WorkbookKey;
use crate::error::ExportError;
use crate::record::{ExtractionRecord, PlayerEntry, StatList, StatValue};
use crate::workbook::{Cell, Table, sheet_name, unique_sheet_name, write_workbook};

pub const MISSING: &str = "N/A";
pub const SUMMARY_SHEET: &str = "Summary";
pub const PLAYER_LIST_SHEET: &str = "Player List";
pub const PLAYER_LIST_COLUMNS: [&str; 5] = ["position", "name", "match_rating", "goals", "assists"];
pub const STAT_COLUMN: &str = "Stat";
pub const VALUE_COLUMN: &str = "Value";

/// An optional sheet that was left out of a per-image workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportWarning {
    EmptyPlayerList,
    EmptyPlayerStats,
    EmptyTeamStats,
}

impl fmt::Display for ExportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ExportWarning::EmptyPlayerList => "player list is empty, skipping 'Player List' sheet",
            ExportWarning::EmptyPlayerStats => {
                "detailed player stats are empty, skipping player stats sheet"
            }
            ExportWarning::EmptyTeamStats => "detailed team stats are empty, skipping team stats sheet",
        };
        f.write_str(msg)
    }
}

#[derive(Debug, Clone)]
pub struct ExportReport {
    pub path: PathBuf,
    pub key: WorkbookKey,
    pub sheets: Vec<String>,
    pub warnings: Vec<ExportWarning>,
}

/// Writes one workbook per extraction record into a scratch directory.
#[derive(Debug, Clone)]
pub struct Exporter {
    dir: PathBuf,
}

impl Exporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Validates a raw response object and exports it. Nothing is written when
    /// validation fails.
    pub fn export_value(&self, value: &Value, index: usize) -> Result<ExportReport, ExportError> {
        let record = ExtractionRecord::from_value(value)?;
        self.export(&record, index)
    }

    pub fn export(&self, record: &ExtractionRecord, index: usize) -> Result<ExportReport, ExportError> {
        let key = WorkbookKey::new(record.category(), index);
        let path = self.dir.join(key.file_name());
        log::info!("saving {} to {}", key.category, path.display());

        let (tables, warnings) = build_tables(record);
        for warning in &warnings {
            log::warn!("{}: {warning}", path.display());
        }

        write_workbook(&path, &tables).map_err(|source| {
            log::error!("failed saving {}: {source}", path.display());
            ExportError::Write {
                path: path.clone(),
                source,
            }
        })?;

        log::info!("saved {} ({} sheets)", path.display(), tables.len());
        Ok(ExportReport {
            path,
            key,
            sheets: tables.into_iter().map(|t| t.name).collect(),
            warnings,
        })
    }
}

/// Lays out the sheets of a per-image workbook, in order, together with the
/// optional sheets that were skipped.
pub fn build_tables(record: &ExtractionRecord) -> (Vec<Table>, Vec<ExportWarning>) {
    let category = record.category();
    let mut tables = vec![summary_table(record)];
    let mut warnings = Vec::new();

    if record.player_list.is_empty() {
        warnings.push(ExportWarning::EmptyPlayerList);
    } else {
        tables.push(player_list_table(&record.player_list));
    }

    let player_stats = &record.selected_player_detailed_stats.stats;
    if player_stats.is_empty() {
        warnings.push(ExportWarning::EmptyPlayerStats);
    } else {
        let player = record.featured_player.name.as_deref().unwrap_or(MISSING);
        let name = detailed_sheet_name(category.label(), player, &tables);
        tables.push(stats_table(name, player_stats));
    }

    if category.is_summary() {
        match record.team_stats().filter(|s| !s.is_empty()) {
            Some(team_stats) => {
                let team = record.team_name.as_deref().unwrap_or(MISSING);
                let name = detailed_sheet_name(category.label(), team, &tables);
                tables.push(stats_table(name, team_stats));
            }
            None => warnings.push(ExportWarning::EmptyTeamStats),
        }
    }

    (tables, warnings)
}

fn detailed_sheet_name(category: &str, owner: &str, existing: &[Table]) -> String {
    let taken: Vec<String> = existing.iter().map(|t| t.name.clone()).collect();
    unique_sheet_name(sheet_name(&format!("{category}_{owner}")), &taken)
}

fn summary_table(record: &ExtractionRecord) -> Table {
    let featured = &record.featured_player;
    let mut table = Table::new(SUMMARY_SHEET, &["Field", VALUE_COLUMN]);
    let rows = [
        ("Team Name", opt_text(record.team_name.as_deref())),
        ("Featured Player Name", opt_text(featured.name.as_deref())),
        ("Featured Player OVR", opt_value(featured.overall_rating.as_ref())),
        ("Featured Player MR", opt_value(featured.match_rating.as_ref())),
        (
            "Detailed Stats Category",
            Cell::text(record.detailed_stats_category.clone()),
        ),
    ];
    for (field, value) in rows {
        table.push_row(vec![Cell::text(field), value]);
    }
    table
}

fn player_list_table(players: &[PlayerEntry]) -> Table {
    let mut table = Table::new(PLAYER_LIST_SHEET, &PLAYER_LIST_COLUMNS);
    for player in players {
        let columns = [
            &player.position,
            &player.name,
            &player.match_rating,
            &player.goals,
            &player.assists,
        ];
        table.push_row(
            columns
                .into_iter()
                .map(|v| v.as_ref().map(Cell::from).unwrap_or(Cell::Int(0)))
                .collect(),
        );
    }
    table
}

fn stats_table(name: String, stats: &StatList) -> Table {
    let mut table = Table::new(name, &[STAT_COLUMN, VALUE_COLUMN]);
    for (stat, value) in stats.iter() {
        table.push_row(vec![Cell::text(stat), Cell::from(value)]);
    }
    table
}

fn opt_text(value: Option<&str>) -> Cell {
    Cell::text(value.unwrap_or(MISSING))
}

fn opt_value(value: Option<&StatValue>) -> Cell {
    value.map(Cell::from).unwrap_or_else(|| Cell::text(MISSING))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(category: &str, players: Value, team_stats: Value) -> ExtractionRecord {
        let value = json!({
            "team_name": "Spurs",
            "featured_player": {"name": "Hleb", "overall_rating": 84},
            "player_list": players,
            "detailed_stats_category": category,
            "selected_player_detailed_stats": {"player_name": "Hleb", "stats": {"Goals": 1}},
            "selected_team_detailed_stats": {"stats": team_stats}
        });
        ExtractionRecord::from_value(&value).expect("valid record")
    }

    #[test]
    fn summary_sheet_fills_missing_with_na() {
        let rec = record("Shooting", json!([]), json!({}));
        let (tables, _) = build_tables(&rec);
        let summary = &tables[0];
        assert_eq!(summary.name, "Summary");
        assert_eq!(summary.rows.len(), 5);
        assert_eq!(summary.rows[2][1], Cell::Int(84));
        assert_eq!(summary.rows[3][1], Cell::text("N/A"));
    }

    #[test]
    fn player_list_fills_absent_columns_with_zero() {
        let rec = record("Shooting", json!([{"name": "Hleb", "position": "CAM"}]), json!({}));
        let (tables, warnings) = build_tables(&rec);
        assert!(warnings.is_empty());
        let players = &tables[1];
        assert_eq!(players.header, PLAYER_LIST_COLUMNS.to_vec());
        assert_eq!(
            players.rows[0],
            vec![
                Cell::text("CAM"),
                Cell::text("Hleb"),
                Cell::Int(0),
                Cell::Int(0),
                Cell::Int(0)
            ]
        );
        assert_eq!(tables[2].name, "Shooting_Hleb");
    }

    #[test]
    fn team_sheet_only_for_summary_category() {
        let players = json!([{"name": "Hleb"}]);
        let (shooting, _) = build_tables(&record("Shooting", players.clone(), json!({"Goals": 5})));
        assert_eq!(shooting.len(), 3);

        let (summary, warnings) = build_tables(&record("Summary", players.clone(), json!({"Goals": 5})));
        assert_eq!(summary.len(), 4);
        assert!(warnings.is_empty());
        assert_eq!(summary[3].name, "Summary_Spurs");

        let (summary, warnings) = build_tables(&record("Summary", players, json!({})));
        assert_eq!(summary.len(), 3);
        assert_eq!(warnings, vec![ExportWarning::EmptyTeamStats]);
    }

    #[test]
    fn clashing_detailed_names_get_suffix() {
        let value = json!({
            "team_name": "Hleb",
            "featured_player": {"name": "Hleb"},
            "player_list": [],
            "detailed_stats_category": "Summary",
            "selected_player_detailed_stats": {"stats": {"Goals": 1}},
            "selected_team_detailed_stats": {"stats": {"Goals": 2}}
        });
        let rec = ExtractionRecord::from_value(&value).expect("valid");
        let (tables, _) = build_tables(&rec);
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Summary", "Summary_Hleb", "Summary_Hleb~2"]);
    }
}
