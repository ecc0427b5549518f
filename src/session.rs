use crate::filter::{self, PatternError};
use crate::similarity::{self, Metric, SimilarityError};
use crate::spatial::{PlotPoint, SpatialIndex};
use crate::table::{FeatureTable, SampleRecord};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error(transparent)]
    Similarity(#[from] SimilarityError),
    #[error("unknown axis column '{0}'")]
    UnknownColumn(String),
    #[error("unknown sample '{0}'")]
    UnknownStem(String),
    #[error("no reference sample selected")]
    NoReference,
    #[error("spatial index not built (no axes set, or nothing to plot)")]
    IndexNotBuilt,
}

/// Outcome of a filter change, for the UI status line.
#[derive(Debug, PartialEq, Eq)]
pub struct FilterOutcome {
    /// Rows in the new filtered view.
    pub matched: usize,
    /// The similarity reference fell out of view. The reference and the
    /// distance column are kept; the UI should surface this before the
    /// next similarity request.
    pub reference_hidden: bool,
}

/// Composition root of the browser core.
///
/// Owns the table, the active filter pattern, the axis pair, the
/// reference stem, and the derived spatial index, and applies the pure
/// filter/ranking transforms so that table, index, and view are never
/// observable in a mutually inconsistent state. Single-owner and
/// single-threaded by design; callers serialize access.
pub struct BrowserSession {
    table: FeatureTable,
    pattern: String,
    axes: Option<(String, String)>,
    reference: Option<String>,
    index: Option<SpatialIndex>,
}

impl BrowserSession {
    pub fn new(table: FeatureTable) -> Self {
        Self {
            table,
            pattern: String::new(),
            axes: None,
            reference: None,
            index: None,
        }
    }

    pub fn table(&self) -> &FeatureTable {
        &self.table
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn axes(&self) -> Option<(&str, &str)> {
        self.axes.as_ref().map(|(x, y)| (x.as_str(), y.as_str()))
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    /// Filtered view in current order.
    pub fn rows(&self) -> impl Iterator<Item = &SampleRecord> {
        self.table.filtered().iter().map(|&id| self.table.row(id))
    }

    /// Apply a new filter pattern. On a pattern error nothing changes and
    /// the previous view stays in place.
    pub fn set_filter(&mut self, pattern: &str) -> Result<FilterOutcome, SessionError> {
        let rows = filter::filter_rows(&self.table, pattern)?;
        let matched = rows.len();

        self.pattern = pattern.to_string();
        self.table.apply_filtered(rows);
        self.rebuild_index();

        let reference_hidden = self
            .reference
            .as_deref()
            .is_some_and(|stem| !self.table.is_visible(stem));
        if reference_hidden {
            log::warn!(
                "Reference sample '{}' no longer matches the filter; \
                 distance column is stale until the next ranking",
                self.reference.as_deref().unwrap_or_default()
            );
        }

        Ok(FilterOutcome {
            matched,
            reference_hidden,
        })
    }

    /// Choose the two feature columns plotted on x and y.
    pub fn set_axes(&mut self, x_col: &str, y_col: &str) -> Result<(), SessionError> {
        for col in [x_col, y_col] {
            if !self.table.has_feature_column(col) {
                return Err(SessionError::UnknownColumn(col.to_string()));
            }
        }
        self.axes = Some((x_col.to_string(), y_col.to_string()));
        self.rebuild_index();
        Ok(())
    }

    /// Select the reference sample for similarity ranking. The stem must
    /// exist in the full table; it is not required to pass the current
    /// filter (that is re-checked at ranking time).
    pub fn set_reference(&mut self, stem: &str) -> Result<(), SessionError> {
        if self.table.row_id(stem).is_none() {
            return Err(SessionError::UnknownStem(stem.to_string()));
        }
        self.reference = Some(stem.to_string());
        Ok(())
    }

    pub fn clear_reference(&mut self) {
        self.reference = None;
    }

    /// Rank the filtered view by distance to the reference and make the
    /// ranking the new view. All-or-nothing: on any error the table,
    /// distance column, and index are untouched.
    pub fn compute_similarity(
        &mut self,
        features: &[String],
        metric: Metric,
    ) -> Result<(), SessionError> {
        let reference = self.reference.as_deref().ok_or(SessionError::NoReference)?;
        let ranking = similarity::rank(&self.table, reference, features, metric)?;

        for &(id, distance) in &ranking.distances {
            self.table.set_distance(id, distance);
        }
        self.table.apply_filtered(ranking.order);
        self.rebuild_index();
        Ok(())
    }

    /// Resolve a plot coordinate to the nearest visible sample.
    pub fn pick_nearest(&self, x: f64, y: f64) -> Result<&SampleRecord, SessionError> {
        let index = self.index.as_ref().ok_or(SessionError::IndexNotBuilt)?;
        let (row, _) = index.nearest(x, y);
        Ok(self.table.row(row))
    }

    /// Rebuild the index from the current view and axes. Rows missing a
    /// value on either axis have no plot position and are skipped; no
    /// plottable rows (or no axes yet) leaves the index unbuilt.
    fn rebuild_index(&mut self) {
        self.index = None;
        let Some((x_col, y_col)) = &self.axes else {
            return;
        };

        let points: Vec<PlotPoint> = self
            .table
            .filtered()
            .iter()
            .filter_map(|&id| {
                let row = self.table.row(id);
                match (row.feature(x_col), row.feature(y_col)) {
                    (Some(x), Some(y)) => Some(PlotPoint { x, y, row: id }),
                    _ => None,
                }
            })
            .collect();

        match SpatialIndex::build(points) {
            Ok(index) => self.index = Some(index),
            Err(e) => log::debug!("Spatial index skipped: {e}"),
        }
    }
}
