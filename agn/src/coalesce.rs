//! Vegetation polygon coalescing.
//!
//! Autogen tiles frequently describe a single forest or field as a grid of
//! small axis-aligned rectangles. Coalescing merges neighboring rectangles of
//! the same vegetation type into larger ones, first along the east-west axis
//! and then along the north-south axis.
//!
//! Rectangles are expected as closed clockwise rings starting at the
//! north-west corner:
//!
//! ```text
//!  0,4 ──── 1
//!   │       │
//!   3 ───── 2
//! ```
//!
//! Polygons whose edges cannot be extracted unambiguously are never merged.

use smallvec::SmallVec;
use tracing::debug;

use crate::Error;
use crate::chunk::VegetationPolygon;
use crate::geometry::Vertex;

/// Default closeness tolerance in tile-local units.
pub const DEFAULT_TOLERANCE: f64 = 0.01;

/// Default multiple of the tolerance used for boundary snapping.
pub const DEFAULT_SNAP_FACTOR: f64 = 2.;

/// Vertex indices forming one side of a polygon.
pub type Edge = SmallVec<[usize; 4]>;

/// Get all vertices within `tolerance` of the westernmost vertex.
pub fn all_western(vertices: &[Vertex], tolerance: f64) -> Edge {
    let Some(min_x) = vertices.iter().map(|vertex| vertex.x).reduce(f64::min) else {
        return Edge::new();
    };

    vertices
        .iter()
        .enumerate()
        .filter(|(_, vertex)| (vertex.x - min_x).abs() < tolerance)
        .map(|(index, _)| index)
        .collect()
}

/// Get the vertices on the western edge.
///
/// Returns an empty edge unless all westernmost vertices form one contiguous
/// run.
pub fn western(vertices: &[Vertex]) -> Edge {
    streak(vertices, f64::min)
}

/// Get the vertices on the eastern edge.
///
/// Returns an empty edge unless all easternmost vertices form one contiguous
/// run.
pub fn eastern(vertices: &[Vertex]) -> Edge {
    streak(vertices, f64::max)
}

/// Get the northern vertex of each side, ordered west to east.
pub fn northern(vertices: &[Vertex], west: &[usize], east: &[usize]) -> Option<[usize; 2]> {
    Some([pick(vertices, west, |a, b| b > a)?, pick(vertices, east, |a, b| b > a)?])
}

/// Get the southern vertex of each side, ordered west to east.
pub fn southern(vertices: &[Vertex], west: &[usize], east: &[usize]) -> Option<[usize; 2]> {
    Some([pick(vertices, west, |a, b| b < a)?, pick(vertices, east, |a, b| b < a)?])
}

/// Pick one vertex of a two-vertex side, preferring the second one if
/// `prefer_second` holds for their y coordinates.
fn pick(vertices: &[Vertex], side: &[usize], prefer_second: fn(f64, f64) -> bool) -> Option<usize> {
    let &[first, second] = side else { return None };
    if prefer_second(vertices[first].y, vertices[second].y) { Some(second) } else { Some(first) }
}

/// Get the contiguous run of vertices at the extreme x coordinate.
fn streak(vertices: &[Vertex], extreme: fn(f64, f64) -> f64) -> Edge {
    let Some(x) = vertices.iter().map(|vertex| vertex.x).reduce(extreme) else {
        return Edge::new();
    };

    // Skip the first vertex of closed rings, since it is repeated at the end.
    let closed = vertices.len() > 1 && vertices.first() == vertices.last();
    let start = usize::from(closed);

    let edge: Edge = (start..vertices.len()).filter(|&index| vertices[index].x == x).collect();
    if edge.windows(2).all(|pair| pair[1] == pair[0] + 1) { edge } else { Edge::new() }
}

/// Convert an edge to a vertex pair.
fn pair(edge: &[usize]) -> Option<[usize; 2]> {
    match edge {
        &[first, second] => Some([first, second]),
        _ => None,
    }
}

/// Required offset of a merge candidate's edge.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Direction {
    /// Candidate edge must lie strictly north of the primary edge.
    North,
    /// Candidate edge must lie strictly south of the primary edge.
    South,
}

/// Result of a coalescing run.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub struct CoalesceStats {
    /// Polygons modified by boundary snapping.
    pub snapped: usize,
    /// Polygons absorbed by their western neighbor.
    pub merged_east_west: usize,
    /// Polygons absorbed by their northern neighbor.
    pub merged_north_south: usize,
}

impl CoalesceStats {
    /// Total number of polygons removed.
    pub fn merged(&self) -> usize {
        self.merged_east_west + self.merged_north_south
    }
}

/// Pending absorption of one polygon by another.
struct Merge {
    candidate: usize,
    targets: [usize; 2],
    replacement: [Vertex; 2],
}

/// Vegetation polygon merger.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Coalescer {
    /// Maximum distance between vertices considered identical.
    pub tolerance: f64,
    /// Multiple of the tolerance for snapping vertices to the tile boundary.
    pub snap_factor: f64,
}

impl Default for Coalescer {
    fn default() -> Self {
        Self { tolerance: DEFAULT_TOLERANCE, snap_factor: DEFAULT_SNAP_FACTOR }
    }
}

impl Coalescer {
    pub fn new(tolerance: f64, snap_factor: f64) -> Self {
        Self { tolerance, snap_factor }
    }

    /// Snap polygons to the tile boundary, then merge them until no more
    /// neighbors can be absorbed.
    ///
    /// If snapping fails, polygons before the degenerate one are left snapped
    /// and no merging takes place.
    pub fn coalesce(&self, polygons: &mut Vec<VegetationPolygon>) -> Result<CoalesceStats, Error> {
        let initial = polygons.len();
        let mut stats = CoalesceStats { snapped: self.snap(polygons)?, ..Default::default() };

        loop {
            let east_west = self.merge_east_west(polygons, None);
            let north_south = self.merge_north_south(polygons);

            stats.merged_east_west += east_west;
            stats.merged_north_south += north_south;

            if east_west + north_south == 0 {
                break;
            }
        }

        debug!("Coalesced {initial} vegetation polygons into {}: {stats:?}", polygons.len());

        Ok(stats)
    }

    /// Snap western and northern vertices close to the tile boundary onto it.
    ///
    /// Returns the number of modified polygons. Only polygons modified by
    /// snapping are checked for a collapsed second and third vertex, which
    /// fails with [`Error::DegeneratePolygon`].
    pub fn snap(&self, polygons: &mut [VegetationPolygon]) -> Result<usize, Error> {
        let threshold = self.tolerance * self.snap_factor;
        let mut snapped = 0;

        for (index, polygon) in polygons.iter_mut().enumerate() {
            let vertices = &mut polygon.vertices;

            let west = all_western(vertices, self.tolerance);
            let east = eastern(vertices);
            let north = northern(vertices, &west, &east);

            let mut modified = false;
            for &i in &west {
                let x = &mut vertices[i].x;
                if *x != 0. && x.abs() < threshold {
                    *x = 0.;
                    modified = true;
                }
            }
            for i in north.into_iter().flatten() {
                let y = &mut vertices[i].y;
                if *y != 0. && y.abs() < threshold {
                    *y = 0.;
                    modified = true;
                }
            }

            if !modified {
                continue;
            }
            snapped += 1;

            if vertices.len() >= 3 && vertices[1].y == vertices[2].y {
                return Err(Error::DegeneratePolygon(index));
            }
        }

        Ok(snapped)
    }

    /// Extend polygons eastward by absorbing their eastern neighbors.
    ///
    /// Returns the number of absorbed polygons.
    pub fn merge_east_west(
        &self,
        polygons: &mut Vec<VegetationPolygon>,
        direction: Option<Direction>,
    ) -> usize {
        let mut merged = 0;
        let mut cursor = 0;

        while cursor < polygons.len() {
            match self.east_neighbor(polygons, cursor, direction) {
                Some(merge) => {
                    cursor = Self::apply(polygons, cursor, merge);
                    merged += 1;
                },
                None => cursor += 1,
            }
        }

        merged
    }

    /// Extend polygons southward by absorbing their southern neighbors.
    ///
    /// Returns the number of absorbed polygons.
    pub fn merge_north_south(&self, polygons: &mut Vec<VegetationPolygon>) -> usize {
        let mut merged = 0;
        let mut cursor = 0;

        while cursor < polygons.len() {
            match self.south_neighbor(polygons, cursor) {
                Some(merge) => {
                    cursor = Self::apply(polygons, cursor, merge);
                    merged += 1;
                },
                None => cursor += 1,
            }
        }

        merged
    }

    /// Absorb a candidate into the primary polygon.
    ///
    /// Returns the primary's index after the candidate's removal, so it can be
    /// examined again.
    fn apply(polygons: &mut Vec<VegetationPolygon>, primary: usize, merge: Merge) -> usize {
        let vertices = &mut polygons[primary].vertices;
        let closed = vertices.len() > 1 && vertices.first() == vertices.last();
        let last = vertices.len() - 1;

        for (target, vertex) in merge.targets.into_iter().zip(merge.replacement) {
            vertices[target] = vertex;

            // Keep the duplicated first and last vertex of closed rings in sync.
            if closed && target == last {
                vertices[0] = vertex;
            } else if closed && target == 0 {
                vertices[last] = vertex;
            }
        }

        polygons.remove(merge.candidate);

        if merge.candidate < primary { primary - 1 } else { primary }
    }

    /// Find the closest polygon whose western edge touches the primary's
    /// eastern edge.
    fn east_neighbor(
        &self,
        polygons: &[VegetationPolygon],
        primary: usize,
        direction: Option<Direction>,
    ) -> Option<Merge> {
        let polygon = &polygons[primary];
        let east = pair(&eastern(&polygon.vertices))?;
        let [east0, east1] = east.map(|i| polygon.vertices[i]);

        let mut best: Option<(usize, f64, f64)> = None;
        for (index, candidate) in polygons.iter().enumerate() {
            if index == primary || candidate.vegetation_type != polygon.vegetation_type {
                continue;
            }

            let Some(west) = pair(&western(&candidate.vertices)) else { continue };
            let [west0, west1] = west.map(|i| candidate.vertices[i]);

            // Shared edges are wound in opposite directions.
            if !self.touches(east0, west1, direction) || !self.touches(east1, west0, direction) {
                continue;
            }

            let x_gap = (west1.x - east0.x).abs() + (west0.x - east1.x).abs();
            let y_gap = (west1.y - east0.y).abs() + (west0.y - east1.y).abs();
            if best.is_none_or(|(_, best_x, best_y)| x_gap < best_x && y_gap < best_y) {
                best = Some((index, x_gap, y_gap));
            }
        }

        let (candidate, ..) = best?;
        let vertices = &polygons[candidate].vertices;
        let [far0, far1] = pair(&eastern(vertices))?.map(|i| vertices[i]);

        let aligned = (far0.y - east0.y).abs() < self.tolerance
            && (far1.y - east1.y).abs() < self.tolerance;
        aligned.then_some(Merge { candidate, targets: east, replacement: [far0, far1] })
    }

    /// Find the closest polygon whose northern edge touches the primary's
    /// southern edge.
    fn south_neighbor(&self, polygons: &[VegetationPolygon], primary: usize) -> Option<Merge> {
        let polygon = &polygons[primary];
        let vertices = &polygon.vertices;
        let south = southern(vertices, &western(vertices), &eastern(vertices))?;
        let [south0, south1] = south.map(|i| vertices[i]);

        let mut best: Option<(usize, f64, f64)> = None;
        for (index, candidate) in polygons.iter().enumerate() {
            if index == primary || candidate.vegetation_type != polygon.vegetation_type {
                continue;
            }

            let vertices = &candidate.vertices;
            let Some(north) = northern(vertices, &western(vertices), &eastern(vertices)) else {
                continue;
            };
            let [north0, north1] = north.map(|i| vertices[i]);

            if !south0.is_close(north0, self.tolerance) || !south1.is_close(north1, self.tolerance)
            {
                continue;
            }

            let x_gap = (north0.x - south0.x).abs() + (north1.x - south1.x).abs();
            let y_gap = (north0.y - south0.y).abs() + (north1.y - south1.y).abs();
            if best.is_none_or(|(_, best_x, best_y)| x_gap < best_x && y_gap < best_y) {
                best = Some((index, x_gap, y_gap));
            }
        }

        let (candidate, ..) = best?;
        let vertices = &polygons[candidate].vertices;
        let [far0, far1] = southern(vertices, &western(vertices), &eastern(vertices))?
            .map(|i| vertices[i]);

        let below = far0.y < south0.y && far1.y < south1.y;
        let aligned = (far0.x - south0.x).abs() < self.tolerance
            && (far1.x - south1.x).abs() < self.tolerance;
        (below && aligned).then_some(Merge { candidate, targets: south, replacement: [far0, far1] })
    }

    /// Check if `other` is within tolerance of `vertex`, in the required
    /// direction.
    fn touches(&self, vertex: Vertex, other: Vertex, direction: Option<Direction>) -> bool {
        let delta = other - vertex;
        if delta.x.abs() >= self.tolerance {
            return false;
        }

        match direction {
            None => delta.y.abs() < self.tolerance,
            Some(Direction::North) => delta.y > 0. && delta.y < self.tolerance,
            Some(Direction::South) => delta.y < 0. && delta.y > -self.tolerance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Identifier;

    const FOREST: Identifier = Identifier::from_bytes([1; 16]);
    const FIELD: Identifier = Identifier::from_bytes([2; 16]);

    /// Create a closed clockwise rectangle.
    fn rect(kind: Identifier, west: f64, east: f64, south: f64, north: f64) -> VegetationPolygon {
        VegetationPolygon::new(kind, vec![
            Vertex::new(west, north),
            Vertex::new(east, north),
            Vertex::new(east, south),
            Vertex::new(west, south),
            Vertex::new(west, north),
        ])
    }

    fn extent(polygon: &VegetationPolygon) -> (f64, f64, f64, f64) {
        let xs = polygon.vertices.iter().map(|vertex| vertex.x);
        let ys = polygon.vertices.iter().map(|vertex| vertex.y);
        (
            xs.clone().fold(f64::MAX, f64::min),
            xs.fold(f64::MIN, f64::max),
            ys.clone().fold(f64::MAX, f64::min),
            ys.fold(f64::MIN, f64::max),
        )
    }

    #[test]
    fn rectangle_edges() {
        let polygon = rect(FOREST, 0.1, 0.4, 0.2, 0.6);
        let vertices = &polygon.vertices;

        let west = western(vertices);
        let east = eastern(vertices);
        assert_eq!(west.as_slice(), &[3, 4]);
        assert_eq!(east.as_slice(), &[1, 2]);
        assert_eq!(all_western(vertices, 0.01).as_slice(), &[0, 3, 4]);

        assert_eq!(northern(vertices, &west, &east), Some([4, 1]));
        assert_eq!(southern(vertices, &west, &east), Some([3, 2]));
    }

    #[test]
    fn irregular_edges() {
        let vertices = [
            Vertex::new(0., 1.),
            Vertex::new(1., 1.),
            Vertex::new(0., 0.5),
            Vertex::new(1., 0.),
            Vertex::new(0., 0.),
            Vertex::new(0., 1.),
        ];

        assert!(western(&vertices).is_empty());
        assert!(eastern(&vertices).is_empty());
        assert_eq!(northern(&vertices, &[4, 5], &[]), None);
        assert!(western(&[]).is_empty());
    }

    #[test]
    fn merge_east_west() {
        let mut polygons = vec![
            rect(FOREST, 0., 0.3, 0.2, 0.5),
            rect(FOREST, 0.305, 0.6, 0.2, 0.5),
        ];

        let stats = Coalescer::default().coalesce(&mut polygons).unwrap();

        assert_eq!(stats, CoalesceStats { snapped: 0, merged_east_west: 1, merged_north_south: 0 });
        assert_eq!(polygons.len(), 1);
        assert_eq!(extent(&polygons[0]), (0., 0.6, 0.2, 0.5));
    }

    #[test]
    fn merge_with_earlier_candidate() {
        let mut polygons = vec![
            rect(FOREST, 0.3, 0.6, 0.2, 0.5),
            rect(FIELD, 0.6, 0.9, 0.2, 0.5),
            rect(FOREST, 0., 0.3, 0.2, 0.5),
        ];

        let merged = Coalescer::default().merge_east_west(&mut polygons, None);

        assert_eq!(merged, 1);
        assert_eq!(polygons.len(), 2);
        assert_eq!(polygons[0].vegetation_type, FIELD);
        assert_eq!(extent(&polygons[1]), (0., 0.6, 0.2, 0.5));
    }

    #[test]
    fn different_types_never_merge() {
        let mut polygons = vec![rect(FOREST, 0., 0.3, 0.2, 0.5), rect(FIELD, 0.3, 0.6, 0.2, 0.5)];
        let original = polygons.clone();

        let stats = Coalescer::default().coalesce(&mut polygons).unwrap();

        assert_eq!(stats.merged(), 0);
        assert_eq!(polygons, original);
    }

    #[test]
    fn directional_merge() {
        let coalescer = Coalescer::default();

        let mut polygons =
            vec![rect(FOREST, 0., 0.3, 0.2, 0.5), rect(FOREST, 0.3, 0.6, 0.205, 0.505)];
        assert_eq!(coalescer.merge_east_west(&mut polygons, Some(Direction::South)), 0);
        assert_eq!(coalescer.merge_east_west(&mut polygons, Some(Direction::North)), 1);
        assert_eq!(polygons[0].vertices[1], Vertex::new(0.6, 0.505));
        assert_eq!(polygons[0].vertices[2], Vertex::new(0.6, 0.205));
    }

    #[test]
    fn merge_north_south() {
        let mut polygons = vec![
            rect(FOREST, 0.1, 0.4, 0.2, 0.5),
            rect(FOREST, 0.1, 0.4, 0.5, 0.8),
            rect(FOREST, 0.1, 0.4, 0.8, 0.9),
        ];

        let merged = Coalescer::default().merge_north_south(&mut polygons);

        assert_eq!(merged, 2);
        assert_eq!(polygons.len(), 1);
        assert_eq!(extent(&polygons[0]), (0.1, 0.4, 0.2, 0.9));
    }

    #[test]
    fn coalesce_grid() {
        let mut polygons = vec![
            rect(FOREST, 0., 0.5, 0.5, 1.),
            rect(FOREST, 0.5, 1., 0.5, 1.),
            rect(FOREST, 0., 0.5, 0., 0.5),
            rect(FOREST, 0.5, 1., 0., 0.5),
            rect(FIELD, 0.2, 0.3, 0.2, 0.3),
        ];

        let coalescer = Coalescer::default();
        let stats = coalescer.coalesce(&mut polygons).unwrap();

        assert_eq!(stats.merged_east_west, 2);
        assert_eq!(stats.merged_north_south, 1);
        assert_eq!(polygons.len(), 2);
        assert_eq!(extent(&polygons[0]), (0., 1., 0., 1.));

        let once = polygons.clone();
        let stats = coalescer.coalesce(&mut polygons).unwrap();
        assert_eq!(stats, CoalesceStats::default());
        assert_eq!(polygons, once);
    }

    #[test]
    fn snap_to_boundary() {
        let mut polygons = vec![rect(FOREST, 0.005, 0.3, 0.2, 0.5), rect(FOREST, 0.05, 0.3, 0.6, 0.9)];

        let snapped = Coalescer::new(0.017, 2.).snap(&mut polygons).unwrap();

        assert_eq!(snapped, 1);
        assert_eq!(extent(&polygons[0]).0, 0.);
        assert_eq!(extent(&polygons[1]).0, 0.05);
    }

    #[test]
    fn merge_rings_starting_south_east() {
        let ring = |west: f64, east: f64, south: f64, north: f64| {
            VegetationPolygon::new(FOREST, vec![
                Vertex::new(east, south),
                Vertex::new(west, south),
                Vertex::new(west, north),
                Vertex::new(east, north),
                Vertex::new(east, south),
            ])
        };
        let coalescer = Coalescer::default();

        let mut polygons = vec![ring(0., 0.3, 0.2, 0.5), ring(0.3, 0.6, 0.2, 0.5)];
        assert_eq!(coalescer.merge_east_west(&mut polygons, None), 1);
        assert_eq!(polygons[0].vertices, vec![
            Vertex::new(0.6, 0.2),
            Vertex::new(0., 0.2),
            Vertex::new(0., 0.5),
            Vertex::new(0.6, 0.5),
            Vertex::new(0.6, 0.2),
        ]);

        let mut polygons = vec![ring(0., 0.3, 0.5, 0.8), ring(0., 0.3, 0.2, 0.5)];
        assert_eq!(coalescer.merge_north_south(&mut polygons), 1);
        assert_eq!(polygons[0].vertices, vec![
            Vertex::new(0.3, 0.2),
            Vertex::new(0., 0.2),
            Vertex::new(0., 0.8),
            Vertex::new(0.3, 0.8),
            Vertex::new(0.3, 0.2),
        ]);
    }

    #[test]
    fn snap_northern_pair() {
        let open = VegetationPolygon::new(FOREST, vec![
            Vertex::new(0.1, -0.015),
            Vertex::new(0.4, -0.015),
            Vertex::new(0.4, -0.3),
            Vertex::new(0.1, -0.3),
        ]);
        let closed = rect(FOREST, 0.1, 0.4, -0.3, -0.015);
        let mut polygons = vec![open, closed.clone()];

        let snapped = Coalescer::default().snap(&mut polygons).unwrap();

        assert_eq!(snapped, 1);
        assert_eq!(polygons[0].vertices, vec![
            Vertex::new(0.1, 0.),
            Vertex::new(0.4, 0.),
            Vertex::new(0.4, -0.3),
            Vertex::new(0.1, -0.3),
        ]);
        assert_eq!(polygons[1], closed);
    }

    #[test]
    fn snap_degenerate() {
        let mut polygons = vec![VegetationPolygon::new(FOREST, vec![
            Vertex::new(0.005, 1.),
            Vertex::new(1., 0.5),
            Vertex::new(1., 0.5),
            Vertex::new(0.005, 0.),
            Vertex::new(0.005, 1.),
        ])];

        let result = Coalescer::default().snap(&mut polygons);
        assert!(matches!(result, Err(Error::DegeneratePolygon(0))));
    }
}
