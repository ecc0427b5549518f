use crate::table::RowId;
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpatialError {
    #[error("cannot build a spatial index from zero points")]
    EmptyIndex,
}

/// One plotted sample: coordinates on the two chosen axis columns plus a
/// back-reference into the table. The index never owns row data.
#[derive(Debug, Clone)]
pub struct PlotPoint {
    pub x: f64,
    pub y: f64,
    pub row: RowId,
}

struct Node {
    point: PlotPoint,
    /// Position in the view the index was built from; the tie-breaker
    /// for equidistant points (lowest wins).
    seq: usize,
    left: Option<usize>,
    right: Option<usize>,
}

/// 2-D nearest-neighbor index for plot point-picking.
///
/// A disposable cache over one (filtered view, axis pair) snapshot: any
/// change to either invalidates it and the session rebuilds before the
/// next query. Implemented as a kd-tree with an explicit
/// (distance, view position) comparison so equidistant hits resolve
/// deterministically; a crate tree would leave that tie unspecified.
pub struct SpatialIndex {
    nodes: Vec<Node>,
    root: usize,
}

impl SpatialIndex {
    /// Build from the plotted points in view order.
    pub fn build(points: Vec<PlotPoint>) -> Result<Self, SpatialError> {
        if points.is_empty() {
            return Err(SpatialError::EmptyIndex);
        }
        let mut items: Vec<(PlotPoint, usize)> =
            points.into_iter().enumerate().map(|(seq, p)| (p, seq)).collect();
        let mut nodes = Vec::with_capacity(items.len());
        let root = build_subtree(&mut items, 0, &mut nodes);
        Ok(Self { nodes, root })
    }

    /// Row of the point nearest to (x, y) by Euclidean distance, with the
    /// distance itself. Equidistant points resolve to the lowest view
    /// position.
    pub fn nearest(&self, x: f64, y: f64) -> (RowId, f64) {
        let mut best = Candidate {
            dist_sq: f64::INFINITY,
            seq: usize::MAX,
            row: 0,
        };
        self.search(self.root, 0, x, y, &mut best);
        (best.row, best.dist_sq.sqrt())
    }

    fn search(&self, node_idx: usize, depth: usize, x: f64, y: f64, best: &mut Candidate) {
        let node = &self.nodes[node_idx];
        let dx = node.point.x - x;
        let dy = node.point.y - y;
        let dist_sq = dx * dx + dy * dy;
        if dist_sq < best.dist_sq || (dist_sq == best.dist_sq && node.seq < best.seq) {
            *best = Candidate {
                dist_sq,
                seq: node.seq,
                row: node.point.row,
            };
        }

        let (query_coord, node_coord) = if depth % 2 == 0 {
            (x, node.point.x)
        } else {
            (y, node.point.y)
        };
        let (near, far) = if query_coord < node_coord {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(i) = near {
            self.search(i, depth + 1, x, y, best);
        }
        // Non-strict bound: equidistant points beyond the splitting plane
        // must still be visited for the tie-break to hold.
        let plane = query_coord - node_coord;
        if let Some(i) = far {
            if plane * plane <= best.dist_sq {
                self.search(i, depth + 1, x, y, best);
            }
        }
    }
}

struct Candidate {
    dist_sq: f64,
    seq: usize,
    row: RowId,
}

fn build_subtree(items: &mut [(PlotPoint, usize)], depth: usize, nodes: &mut Vec<Node>) -> usize {
    let axis = depth % 2;
    items.sort_unstable_by(|a, b| {
        coord(&a.0, axis)
            .partial_cmp(&coord(&b.0, axis))
            .unwrap_or(Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });
    let mid = items.len() / 2;
    let (point, seq) = items[mid].clone();

    let left = if mid > 0 {
        Some(build_subtree(&mut items[..mid], depth + 1, nodes))
    } else {
        None
    };
    let right = if mid + 1 < items.len() {
        Some(build_subtree(&mut items[mid + 1..], depth + 1, nodes))
    } else {
        None
    };

    nodes.push(Node {
        point,
        seq,
        left,
        right,
    });
    nodes.len() - 1
}

fn coord(p: &PlotPoint, axis: usize) -> f64 {
    if axis == 0 { p.x } else { p.y }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f64, y: f64, row: RowId) -> PlotPoint {
        PlotPoint { x, y, row }
    }

    #[test]
    fn empty_points_are_rejected() {
        assert!(matches!(
            SpatialIndex::build(vec![]),
            Err(SpatialError::EmptyIndex)
        ));
    }

    #[test]
    fn exact_hit_returns_that_row() {
        let index = SpatialIndex::build(vec![
            point(0.0, 0.0, 10),
            point(1.0, 0.0, 11),
            point(10.0, 10.0, 12),
        ])
        .unwrap();
        let (row, dist) = index.nearest(1.0, 0.0);
        assert_eq!(row, 11);
        assert!(dist.abs() < 1e-12);
    }

    #[test]
    fn nearest_of_offset_query() {
        let index = SpatialIndex::build(vec![
            point(0.0, 0.0, 0),
            point(1.0, 0.0, 1),
            point(10.0, 10.0, 2),
        ])
        .unwrap();
        let (row, _) = index.nearest(8.0, 9.0);
        assert_eq!(row, 2);
        let (row, _) = index.nearest(0.4, 0.1);
        assert_eq!(row, 0);
    }

    #[test]
    fn equidistant_points_resolve_to_lowest_view_position() {
        // Query sits exactly between the two rows, on both orderings.
        let index = SpatialIndex::build(vec![point(0.0, 0.0, 7), point(2.0, 0.0, 3)]).unwrap();
        assert_eq!(index.nearest(1.0, 0.0).0, 7);

        let index = SpatialIndex::build(vec![point(2.0, 0.0, 3), point(0.0, 0.0, 7)]).unwrap();
        assert_eq!(index.nearest(1.0, 0.0).0, 3);
    }

    #[test]
    fn rebuild_is_deterministic() {
        let points: Vec<PlotPoint> = (0..25)
            .map(|i| point((i % 5) as f64 * 0.7, (i / 5) as f64 * 1.3, i))
            .collect();
        let a = SpatialIndex::build(points.clone()).unwrap();
        let b = SpatialIndex::build(points).unwrap();

        for (qx, qy) in [(0.0, 0.0), (1.6, 2.1), (3.0, 5.2), (-1.0, 0.4), (2.8, 2.6)] {
            assert_eq!(a.nearest(qx, qy).0, b.nearest(qx, qy).0);
        }
    }

    #[test]
    fn duplicated_coordinates_match_linear_scan_with_tie_break() {
        // Many rows share plot positions; the winner must always be the
        // lowest view position among the equidistant ones.
        let points: Vec<PlotPoint> = (0..200)
            .map(|i| point((i % 10) as f64, ((i / 10) % 5) as f64, i))
            .collect();
        let index = SpatialIndex::build(points.clone()).unwrap();

        for (qx, qy) in [(0.0, 0.0), (9.0, 4.0), (4.5, 2.5), (3.0, 1.0), (-1.0, 7.0)] {
            let brute = points
                .iter()
                .enumerate()
                .min_by(|(sa, a), (sb, b)| {
                    let da = (a.x - qx).powi(2) + (a.y - qy).powi(2);
                    let db = (b.x - qx).powi(2) + (b.y - qy).powi(2);
                    da.partial_cmp(&db).unwrap().then(sa.cmp(sb))
                })
                .map(|(_, p)| p.row)
                .unwrap();
            assert_eq!(index.nearest(qx, qy).0, brute, "query ({qx}, {qy})");
        }
    }

    #[test]
    fn matches_linear_scan() {
        let points: Vec<PlotPoint> = vec![
            point(0.2, 4.1, 0),
            point(3.3, 1.0, 1),
            point(-2.0, 2.5, 2),
            point(0.9, -0.7, 3),
            point(5.5, 5.5, 4),
            point(1.1, 1.1, 5),
            point(-3.4, -2.2, 6),
        ];
        let index = SpatialIndex::build(points.clone()).unwrap();

        for (qx, qy) in [(0.0, 0.0), (4.0, 4.0), (-2.5, 1.0), (1.0, -1.0), (9.0, -9.0)] {
            let brute = points
                .iter()
                .min_by(|a, b| {
                    let da = (a.x - qx).powi(2) + (a.y - qy).powi(2);
                    let db = (b.x - qx).powi(2) + (b.y - qy).powi(2);
                    da.partial_cmp(&db).unwrap()
                })
                .unwrap()
                .row;
            assert_eq!(index.nearest(qx, qy).0, brute, "query ({qx}, {qy})");
        }
    }
}
