use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Column holding the unique sample identifier.
pub const STEM_COLUMN: &str = "stem";
/// Column holding the directory-segment list literal.
pub const DIR_COLUMN: &str = "dir";
/// Column written by similarity ranking; synthesized when absent.
pub const DISTANCE_COLUMN: &str = "distance";

/// Stable row identity: position in `FeatureTable::all`, assigned at load
/// and never reused. Row ids are the only thing passed across
/// filter/sort boundaries.
pub type RowId = usize;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("dataset has no '{0}' column")]
    MissingColumn(&'static str),
    #[error("duplicate stem '{0}' (stems must be unique)")]
    DuplicateStem(String),
    #[error("dataset contains no rows")]
    Empty,
}

/// One sample: identity, path segments, and the numeric features the
/// analysis pipeline produced for it. Missing feature values are simply
/// absent from the map.
#[derive(Debug, Clone)]
pub struct SampleRecord {
    pub stem: String,
    pub dir: Vec<String>,
    features: HashMap<String, f64>,
    pub distance: Option<f64>,
}

impl SampleRecord {
    pub fn new(stem: impl Into<String>, dir: Vec<String>) -> Self {
        Self {
            stem: stem.into(),
            dir,
            features: HashMap::new(),
            distance: None,
        }
    }

    pub fn with_feature(mut self, name: &str, value: f64) -> Self {
        self.features.insert(name.to_string(), value);
        self
    }

    /// Value of a named feature, or `None` when the dataset had no usable
    /// number for this row.
    pub fn feature(&self, name: &str) -> Option<f64> {
        self.features.get(name).copied()
    }
}

/// The full sample table plus the current filtered view.
///
/// `all` is immutable after load (only the distance column is ever
/// rewritten); `filtered` is a row-id subset in view order, recreated by
/// every filter or ranking application.
#[derive(Debug)]
pub struct FeatureTable {
    all: Vec<SampleRecord>,
    by_stem: HashMap<String, RowId>,
    feature_columns: Vec<String>,
    filtered: Vec<RowId>,
    visible: Vec<bool>,
}

impl FeatureTable {
    /// Load the dataset from a CSV file on disk.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let file = File::open(path)?;
        let table = Self::load_from_reader(file)?;
        log::info!(
            "Loaded {} samples, {} feature columns from {}",
            table.len(),
            table.feature_columns.len(),
            path.display()
        );
        Ok(table)
    }

    /// Load the dataset from any reader producing CSV text.
    ///
    /// Required columns: `stem` (unique) and `dir`. Every other column is
    /// probed as a numeric feature column; cells that don't parse as a
    /// finite float are missing values, never errors. Columns where no
    /// cell parses at all are tolerated and ignored. A `distance` column
    /// is synthesized when the dataset lacks one.
    pub fn load_from_reader(reader: impl Read) -> Result<Self, LoadError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();

        let stem_idx = headers
            .iter()
            .position(|h| h == STEM_COLUMN)
            .ok_or(LoadError::MissingColumn(STEM_COLUMN))?;
        let dir_idx = headers
            .iter()
            .position(|h| h == DIR_COLUMN)
            .ok_or(LoadError::MissingColumn(DIR_COLUMN))?;
        let distance_idx = headers.iter().position(|h| h == DISTANCE_COLUMN);

        let mut rows: Vec<csv::StringRecord> = Vec::new();
        for result in csv_reader.records() {
            rows.push(result?);
        }
        if rows.is_empty() {
            return Err(LoadError::Empty);
        }

        // Feature columns are discovered, not declared: any column beyond
        // stem/dir/distance with at least one parsable cell counts. Pure
        // text columns are tolerated extras.
        let candidate_columns: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != stem_idx && *i != dir_idx && Some(*i) != distance_idx)
            .map(|(i, h)| (i, h.to_string()))
            .collect();
        let feature_columns: Vec<(usize, String)> = candidate_columns
            .into_iter()
            .filter(|(i, _)| rows.iter().any(|r| parse_cell(r.get(*i)).is_some()))
            .collect();

        let mut all = Vec::with_capacity(rows.len());
        let mut by_stem = HashMap::with_capacity(rows.len());

        for row in &rows {
            let stem = row.get(stem_idx).unwrap_or("").to_string();
            if by_stem.insert(stem.clone(), all.len()).is_some() {
                return Err(LoadError::DuplicateStem(stem));
            }

            let mut record = SampleRecord::new(stem, parse_dir(row.get(dir_idx).unwrap_or("")));
            for (idx, name) in &feature_columns {
                if let Some(value) = parse_cell(row.get(*idx)) {
                    record.features.insert(name.clone(), value);
                }
            }
            record.distance = distance_idx.and_then(|i| parse_cell(row.get(i)));
            all.push(record);
        }

        let n = all.len();
        Ok(Self {
            all,
            by_stem,
            feature_columns: feature_columns.into_iter().map(|(_, n)| n).collect(),
            filtered: (0..n).collect(),
            visible: vec![true; n],
        })
    }

    /// Build a table directly from records (embedding, tests).
    pub fn from_records(records: Vec<SampleRecord>) -> Result<Self, LoadError> {
        if records.is_empty() {
            return Err(LoadError::Empty);
        }
        let mut by_stem = HashMap::with_capacity(records.len());
        let mut feature_columns: Vec<String> = Vec::new();
        for (id, record) in records.iter().enumerate() {
            if by_stem.insert(record.stem.clone(), id).is_some() {
                return Err(LoadError::DuplicateStem(record.stem.clone()));
            }
            for name in record.features.keys() {
                if !feature_columns.contains(name) {
                    feature_columns.push(name.clone());
                }
            }
        }
        feature_columns.sort();
        let n = records.len();
        Ok(Self {
            all: records,
            by_stem,
            feature_columns,
            filtered: (0..n).collect(),
            visible: vec![true; n],
        })
    }

    /// Number of rows in the full table.
    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Discovered numeric feature columns, in dataset order.
    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    pub fn has_feature_column(&self, name: &str) -> bool {
        self.feature_columns.iter().any(|c| c == name)
    }

    pub fn row(&self, id: RowId) -> &SampleRecord {
        &self.all[id]
    }

    /// Row id for a stem, resolved against the full table.
    pub fn row_id(&self, stem: &str) -> Option<RowId> {
        self.by_stem.get(stem).copied()
    }

    /// Current filtered view: row ids in view order.
    pub fn filtered(&self) -> &[RowId] {
        &self.filtered
    }

    /// Record at a position of the filtered view.
    pub fn row_at(&self, view_pos: usize) -> Option<&SampleRecord> {
        self.filtered.get(view_pos).map(|&id| &self.all[id])
    }

    /// Record for a stem, only while it is visible in the filtered view.
    /// Absent means "selection no longer visible", not an error.
    pub fn row_by_key(&self, stem: &str) -> Option<&SampleRecord> {
        let id = self.row_id(stem)?;
        if self.visible[id] {
            Some(&self.all[id])
        } else {
            None
        }
    }

    /// Whether a stem currently passes the active filter.
    pub fn is_visible(&self, stem: &str) -> bool {
        self.row_id(stem).is_some_and(|id| self.visible[id])
    }

    /// Replace the filtered view. Row ids come from a transform over this
    /// same table, so range validity is a debug assertion, not a check.
    pub fn apply_filtered(&mut self, rows: Vec<RowId>) {
        debug_assert!(rows.iter().all(|&id| id < self.all.len()));
        self.visible.fill(false);
        for &id in &rows {
            self.visible[id] = true;
        }
        self.filtered = rows;
    }

    /// Write one distance value. The similarity ranking is the only
    /// caller; values persist across later filters until the next ranking.
    pub fn set_distance(&mut self, id: RowId, distance: Option<f64>) {
        self.all[id].distance = distance;
    }
}

fn parse_cell(cell: Option<&str>) -> Option<f64> {
    cell.and_then(|c| c.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Parse the `dir` list literal. The ingestion tools write Python-style
/// `['Drums', 'Kicks']`; JSON-style double quotes are accepted too.
fn parse_dir(raw: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\'' || c == '"' {
            let quote = c;
            let mut segment = String::new();
            for d in chars.by_ref() {
                if d == quote {
                    break;
                }
                segment.push(d);
            }
            segments.push(segment);
        }
    }
    segments
}
