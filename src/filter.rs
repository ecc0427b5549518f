use crate::table::{FeatureTable, RowId};
use regex::RegexBuilder;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatternError {
    #[error("invalid filter pattern: {0}")]
    Syntax(#[from] regex::Error),
}

/// Filter the full table by a case-insensitive regex over the stem
/// column, substring semantics. Returns row ids in their original table
/// order; an empty pattern resets to the full table.
///
/// Pure: the caller decides what to do with the view. On a syntax error
/// nothing changes, so the previous view stays valid.
pub fn filter_rows(table: &FeatureTable, pattern: &str) -> Result<Vec<RowId>, PatternError> {
    if pattern.is_empty() {
        return Ok((0..table.len()).collect());
    }

    let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
    Ok((0..table.len())
        .filter(|&id| regex.is_match(&table.row(id).stem))
        .collect())
}
