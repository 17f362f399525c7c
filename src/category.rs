use std::fmt;
use std::path::Path;

pub const WORKBOOK_EXT: &str = "xlsx";
const FILE_PREFIX: &str = "Stats_";
const FINAL_SUFFIX: &str = "_Final";

/// Stats panel tab shown on the results screen.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    Summary,
    Shooting,
    Passing,
    Possession,
    Defending,
    Goalkeeping,
    Other(String),
}

impl Category {
    pub const KNOWN: [Category; 6] = [
        Category::Shooting,
        Category::Possession,
        Category::Passing,
        Category::Goalkeeping,
        Category::Defending,
        Category::Summary,
    ];

    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "Summary" => Category::Summary,
            "Shooting" => Category::Shooting,
            "Passing" => Category::Passing,
            "Possession" => Category::Possession,
            "Defending" => Category::Defending,
            "Goalkeeping" => Category::Goalkeeping,
            other => Category::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Category::Summary => "Summary",
            Category::Shooting => "Shooting",
            Category::Passing => "Passing",
            Category::Possession => "Possession",
            Category::Defending => "Defending",
            Category::Goalkeeping => "Goalkeeping",
            Category::Other(label) => label,
        }
    }

    pub fn is_summary(&self) -> bool {
        matches!(self, Category::Summary)
    }

    /// Passing and Possession panels carry unprefixed line-break totals that
    /// are dropped from merged output.
    pub fn drops_line_breaks(&self) -> bool {
        let label = self.label();
        label.contains("Passing") || label.contains("Possession")
    }

    /// Sheets a per-image workbook of this category must have to serve as a
    /// merge template.
    pub fn template_sheet_count(&self) -> usize {
        if self.is_summary() { 4 } else { 3 }
    }

    pub fn final_file_name(&self) -> String {
        format!("{FILE_PREFIX}{}{FINAL_SUFFIX}.{WORKBOOK_EXT}", self.label())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity of one per-image workbook: which panel it came from and the
/// position of its image in the run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkbookKey {
    pub category: Category,
    pub index: usize,
}

impl WorkbookKey {
    pub fn new(category: Category, index: usize) -> Self {
        Self { category, index }
    }

    pub fn file_name(&self) -> String {
        format!(
            "{FILE_PREFIX}{}_{}.{WORKBOOK_EXT}",
            self.category.label(),
            self.index
        )
    }

    /// Inverse of [`WorkbookKey::file_name`]. The index is taken from the last
    /// `_`-separated part, so a label containing underscores stays intact.
    pub fn parse_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(&format!(".{WORKBOOK_EXT}"))?;
        let rest = stem.strip_prefix(FILE_PREFIX)?;
        let (label, index) = rest.rsplit_once('_')?;
        if label.is_empty() || index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let index = index.parse::<usize>().ok()?;
        Some(Self::new(Category::from_label(label), index))
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        Self::parse_file_name(name)
    }
}
