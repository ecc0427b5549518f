use crate::table::{FeatureTable, RowId};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Norm products below this count as zero vectors for cosine distance.
const NORM_EPSILON: f64 = 1e-10;

#[derive(Error, Debug)]
pub enum SimilarityError {
    #[error("reference sample '{0}' is not in the current filtered view")]
    ReferenceNotFound(String),
    #[error("feature subset is empty")]
    EmptyFeatureSet,
    #[error("unknown feature column '{0}'")]
    UnknownFeature(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Euclidean,
    Cosine,
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "euclidean" => Ok(Self::Euclidean),
            "cosine" => Ok(Self::Cosine),
            other => Err(format!("unknown metric '{other}' (euclidean, cosine)")),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Euclidean => write!(f, "euclidean"),
            Self::Cosine => write!(f, "cosine"),
        }
    }
}

/// Result of ranking the filtered view against a reference.
///
/// `order` is the new view order (ascending distance, missing distances
/// last, ties stable); `distances` carries one entry per row of the view
/// for write-back into the table. Both refer to rows by id, so they stay
/// valid however the view was previously sorted.
pub struct Ranking {
    pub order: Vec<RowId>,
    pub distances: Vec<(RowId, Option<f64>)>,
}

/// Rank the current filtered view by distance to a reference sample over
/// a feature subset. Pure: the session applies the result to the table.
///
/// A row's distance is undefined (`None`) when the reference or the row
/// itself is missing any feature of the subset; such rows sort after all
/// rows with a real distance and are never dropped.
pub fn rank(
    table: &FeatureTable,
    reference: &str,
    features: &[String],
    metric: Metric,
) -> Result<Ranking, SimilarityError> {
    if features.is_empty() {
        return Err(SimilarityError::EmptyFeatureSet);
    }
    for name in features {
        if !table.has_feature_column(name) {
            return Err(SimilarityError::UnknownFeature(name.clone()));
        }
    }

    let reference_row = table
        .row_by_key(reference)
        .ok_or_else(|| SimilarityError::ReferenceNotFound(reference.to_string()))?;
    let reference_vector: Option<Vec<f64>> = features
        .iter()
        .map(|name| reference_row.feature(name))
        .collect();

    let distances: Vec<(RowId, Option<f64>)> = table
        .filtered()
        .iter()
        .map(|&id| {
            let distance = reference_vector.as_deref().and_then(|ref_vec| {
                let row = table.row(id);
                let vector: Option<Vec<f64>> =
                    features.iter().map(|name| row.feature(name)).collect();
                vector.map(|v| metric.distance(&v, ref_vec))
            });
            (id, distance)
        })
        .collect();

    // Stable ascending sort; None sorts after every real distance so
    // equal distances keep their pre-sort relative order.
    let mut order: Vec<(RowId, Option<f64>)> = distances.clone();
    order.sort_by(|a, b| compare_distances(a.1, b.1));

    Ok(Ranking {
        order: order.into_iter().map(|(id, _)| id).collect(),
        distances,
    })
}

impl Metric {
    fn distance(self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            Self::Euclidean => euclidean_distance(a, b),
            Self::Cosine => cosine_distance(a, b),
        }
    }
}

fn compare_distances(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Cosine distance: 1 - a·b/(‖a‖·‖b‖). A vanishing norm product yields
/// similarity 0, i.e. distance 1.
fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < NORM_EPSILON {
        1.0
    } else {
        1.0 - dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::SampleRecord;

    fn table() -> FeatureTable {
        FeatureTable::from_records(vec![
            SampleRecord::new("A", vec![]).with_feature("f1", 0.0),
            SampleRecord::new("B", vec![]).with_feature("f1", 1.0),
            SampleRecord::new("C", vec![]).with_feature("f1", 5.0),
        ])
        .unwrap()
    }

    fn ranked_stems(table: &FeatureTable, ranking: &Ranking) -> Vec<String> {
        ranking
            .order
            .iter()
            .map(|&id| table.row(id).stem.clone())
            .collect()
    }

    #[test]
    fn euclidean_self_distance_is_zero() {
        let table = table();
        let ranking = rank(&table, "A", &["f1".into()], Metric::Euclidean).unwrap();
        let (_, d) = ranking.distances[0];
        assert!(d.unwrap().abs() < 1e-9);
    }

    #[test]
    fn euclidean_ranks_by_distance_from_reference() {
        let table = table();
        let ranking = rank(&table, "A", &["f1".into()], Metric::Euclidean).unwrap();
        assert_eq!(ranked_stems(&table, &ranking), vec!["A", "B", "C"]);
        let distances: Vec<f64> = ranking.distances.iter().map(|(_, d)| d.unwrap()).collect();
        assert_eq!(distances, vec![0.0, 1.0, 5.0]);
    }

    #[test]
    fn cosine_orthogonal_and_parallel() {
        let table = FeatureTable::from_records(vec![
            SampleRecord::new("ref", vec![])
                .with_feature("x", 1.0)
                .with_feature("y", 0.0),
            SampleRecord::new("ortho", vec![])
                .with_feature("x", 0.0)
                .with_feature("y", 1.0),
            SampleRecord::new("parallel", vec![])
                .with_feature("x", 2.0)
                .with_feature("y", 0.0),
        ])
        .unwrap();

        let ranking = rank(&table, "ref", &["x".into(), "y".into()], Metric::Cosine).unwrap();

        let distance_of = |stem: &str| {
            let id = table.row_id(stem).unwrap();
            ranking
                .distances
                .iter()
                .find(|(rid, _)| *rid == id)
                .unwrap()
                .1
                .unwrap()
        };
        assert!((distance_of("ortho") - 1.0).abs() < 1e-9);
        assert!(distance_of("parallel").abs() < 1e-9);
        assert!(distance_of("ref").abs() < 1e-9);
    }

    #[test]
    fn missing_feature_sorts_last_without_dropping_the_row() {
        let table = FeatureTable::from_records(vec![
            SampleRecord::new("gap", vec![]),
            SampleRecord::new("ref", vec![]).with_feature("f1", 0.0),
            SampleRecord::new("near", vec![]).with_feature("f1", 2.0),
        ])
        .unwrap();

        let ranking = rank(&table, "ref", &["f1".into()], Metric::Euclidean).unwrap();
        assert_eq!(ranked_stems(&table, &ranking), vec!["ref", "near", "gap"]);
        let gap_id = table.row_id("gap").unwrap();
        let (_, d) = *ranking
            .distances
            .iter()
            .find(|(id, _)| *id == gap_id)
            .unwrap();
        assert_eq!(d, None);
    }

    #[test]
    fn missing_reference_feature_undefines_every_distance() {
        let table = FeatureTable::from_records(vec![
            SampleRecord::new("ref", vec![]).with_feature("f1", 1.0),
            SampleRecord::new("other", vec![])
                .with_feature("f1", 2.0)
                .with_feature("f2", 3.0),
        ])
        .unwrap();

        let ranking = rank(
            &table,
            "ref",
            &["f1".into(), "f2".into()],
            Metric::Euclidean,
        )
        .unwrap();
        assert!(ranking.distances.iter().all(|(_, d)| d.is_none()));
        // Order unchanged: all-None is one big tie
        assert_eq!(ranked_stems(&table, &ranking), vec!["ref", "other"]);
    }

    #[test]
    fn equal_distances_keep_pre_sort_order() {
        let table = FeatureTable::from_records(vec![
            SampleRecord::new("ref", vec![]).with_feature("f1", 0.0),
            SampleRecord::new("left", vec![]).with_feature("f1", -1.0),
            SampleRecord::new("right", vec![]).with_feature("f1", 1.0),
        ])
        .unwrap();

        let ranking = rank(&table, "ref", &["f1".into()], Metric::Euclidean).unwrap();
        assert_eq!(ranked_stems(&table, &ranking), vec!["ref", "left", "right"]);
    }

    #[test]
    fn empty_feature_set_is_rejected() {
        let table = table();
        assert!(matches!(
            rank(&table, "A", &[], Metric::Euclidean),
            Err(SimilarityError::EmptyFeatureSet)
        ));
    }

    #[test]
    fn unknown_feature_is_rejected() {
        let table = table();
        assert!(matches!(
            rank(&table, "A", &["bogus".into()], Metric::Euclidean),
            Err(SimilarityError::UnknownFeature(name)) if name == "bogus"
        ));
    }

    #[test]
    fn reference_outside_filtered_view_is_rejected() {
        let mut table = table();
        table.apply_filtered(vec![1, 2]); // A filtered out
        assert!(matches!(
            rank(&table, "A", &["f1".into()], Metric::Euclidean),
            Err(SimilarityError::ReferenceNotFound(stem)) if stem == "A"
        ));
    }

    #[test]
    fn ranking_covers_only_the_filtered_view() {
        let mut table = table();
        table.apply_filtered(vec![2, 1]);
        let ranking = rank(&table, "B", &["f1".into()], Metric::Euclidean).unwrap();
        assert_eq!(ranked_stems(&table, &ranking), vec!["B", "C"]);
        assert_eq!(ranking.distances.len(), 2);
    }
}
