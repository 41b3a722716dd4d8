//! Geometric model of the building: points, shared edges, cells, floors.
//!
//! The [`Geometry`] owns four arenas and every cross-reference between
//! them is an index into one of those arenas: a [`Segment`] knows the two
//! cells it separates, an [`Element`] knows the segments along its
//! boundary. [`Geometry::build`] derives all of it from the raw polygons.
//! Once built, the geometry is read-only for the whole search.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{Error, Result};

/// A 2D vertex pinned to a floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
  /// Identifier unique within the geometry.
  pub no: u32,
  /// X coordinate.
  pub x: f64,
  /// Y coordinate.
  pub y: f64,
  /// Arena index of the floor the point lies on.
  pub floor: usize,
}

/// An edge shared by at most two cells.
///
/// Two segments are considered the same edge when they join the same pair
/// of points, in either order.
#[derive(Debug, Clone)]
pub struct Segment {
  /// First endpoint, as a point arena index.
  pub p1: usize,
  /// Second endpoint, as a point arena index.
  pub p2: usize,
  /// Euclidean length.
  pub length: f64,
  /// Floor of the endpoints.
  pub floor: usize,
  /// Incident cells, bound during [`Geometry::build`]. An outer wall has
  /// one; an interior edge has two.
  pub cells: [Option<usize>; 2],
}

impl Segment {
  /// The cell on the other side of the edge from `elt`, if any.
  pub fn next_of(&self, elt: usize) -> Option<usize> {
    match self.cells {
      [Some(e), other] if e == elt => other,
      [other, Some(e)] if e == elt => other,
      _ => None,
    }
  }

  // Binds one more incident cell. False once two other cells already
  // claimed the edge.
  fn attach(&mut self, elt: usize) -> bool {
    match &mut self.cells {
      [slot @ None, _] | [_, slot @ None] => {
        *slot = Some(elt);
        true
      }
      [Some(a), Some(b)] => *a == elt || *b == elt,
    }
  }
}

/// A polygonal cell, the atomic unit of lot assignment.
#[derive(Debug, Clone)]
pub struct Element {
  /// Identifier unique within the geometry.
  pub no: u32,
  /// Arena index of the floor the cell belongs to.
  pub floor: usize,
  /// Polygon vertices as point arena indices. [`Geometry::build`] closes
  /// the ring by re-appending the first vertex.
  pub points: Vec<usize>,
  /// Boundary segments in vertex order, filled by [`Geometry::build`].
  pub segments: Vec<usize>,
  /// Polygon area, computed by [`Geometry::build`].
  pub area: f64,
  /// The cell may belong to the circulation lot.
  pub common: bool,
  /// The cell must belong to the circulation lot. Implies `common`.
  pub imposed: bool,
  /// The cell is a building entrance. Implies `imposed`.
  pub exit: bool,
  /// Signed fitness bonus per unit area.
  pub bonus: f64,
  /// Position in the geometry's element arena.
  pub index: usize,
}

impl Element {
  /// Creates an open cell on the floor with arena index `floor`.
  pub fn new(no: u32, floor: usize) -> Self {
    Element {
      no,
      floor,
      points: Vec::new(),
      segments: Vec::new(),
      area: 0.0,
      common: false,
      imposed: false,
      exit: false,
      bonus: 0.0,
      index: 0,
    }
  }

  /// Appends a polygon vertex.
  pub fn add_point(&mut self, point: usize) {
    self.points.push(point);
  }

  // Closes the polygon ring and derives the area with the shoelace
  // formula. Fails on degenerate polygons.
  fn close(&mut self, points: &[Point]) -> Result<()> {
    if self.points.len() < 3 {
      return Err(Error::TooFewPoints(self.no));
    }
    self.points.push(self.points[0]);
    let mut area = 0.0;
    for pair in self.points.windows(2) {
      let (p1, p2) = (&points[pair[0]], &points[pair[1]]);
      area += p2.x * p1.y - p1.x * p2.y;
    }
    self.area = (area * 0.5).abs();
    if self.area == 0.0 {
      return Err(Error::ZeroArea(self.no));
    }
    Ok(())
  }
}

/// A floor and the cells on it.
#[derive(Debug, Clone)]
pub struct Floor {
  /// Identifier unique within the geometry.
  pub no: u32,
  /// Cells on this floor, filled by [`Geometry::build`].
  pub elements: Vec<usize>,
}

impl Floor {
  /// Creates an empty floor.
  pub fn new(no: u32) -> Self {
    Floor {
      no,
      elements: Vec::new(),
    }
  }
}

/// The planar subdivision of the building.
#[derive(Debug, Clone, Default)]
pub struct Geometry {
  /// Point arena.
  pub points: Vec<Point>,
  /// Segment arena, filled by [`Geometry::build`].
  pub segments: Vec<Segment>,
  /// Element arena.
  pub elements: Vec<Element>,
  /// Floor arena.
  pub floors: Vec<Floor>,
}

impl Geometry {
  /// Creates an empty geometry.
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers a point. Fails on a duplicate identifier.
  pub fn add_point(&mut self, point: Point) -> Result<usize> {
    if self.points.iter().any(|p| p.no == point.no) {
      return Err(Error::DuplicatePoint(point.no));
    }
    self.points.push(point);
    Ok(self.points.len() - 1)
  }

  /// Registers a cell and assigns its arena index. Fails on a duplicate
  /// identifier.
  pub fn add_element(&mut self, mut element: Element) -> Result<usize> {
    if self.elements.iter().any(|e| e.no == element.no) {
      return Err(Error::DuplicateElement(element.no));
    }
    element.index = self.elements.len();
    self.elements.push(element);
    Ok(self.elements.len() - 1)
  }

  /// Registers a floor. Fails on a duplicate identifier.
  pub fn add_floor(&mut self, floor: Floor) -> Result<usize> {
    if self.floors.iter().any(|f| f.no == floor.no) {
      return Err(Error::DuplicateFloor(floor.no));
    }
    self.floors.push(floor);
    Ok(self.floors.len() - 1)
  }

  /// Looks up a point by identifier.
  pub fn point_by_no(&self, no: u32) -> Option<usize> {
    self.points.iter().position(|p| p.no == no)
  }

  /// Looks up an element by identifier.
  pub fn element_by_no(&self, no: u32) -> Option<usize> {
    self.elements.iter().position(|e| e.no == no)
  }

  /// Derives everything the search needs from the raw polygons: closes
  /// each cell, computes its area, deduplicates the shared edges, binds
  /// every edge to its incident cells and buckets cells into floors.
  pub fn build(&mut self) -> Result<()> {
    for elt in &mut self.elements {
      elt.close(&self.points)?;
    }

    // deduplicate edges by unordered endpoint pair
    let mut by_endpoints: HashMap<(usize, usize), usize> = HashMap::new();
    for elt_idx in 0..self.elements.len() {
      let pairs: Vec<(usize, usize)> = self.elements[elt_idx]
        .points
        .windows(2)
        .map(|pair| (pair[0], pair[1]))
        .collect();
      for (p, q) in pairs {
        let key = (p.min(q), p.max(q));
        let seg_idx = match by_endpoints.get(&key) {
          Some(&idx) => idx,
          None => {
            let (a, b) = (&self.points[p], &self.points[q]);
            self.segments.push(Segment {
              p1: p,
              p2: q,
              length: ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt(),
              floor: a.floor,
              cells: [None, None],
            });
            by_endpoints.insert(key, self.segments.len() - 1);
            self.segments.len() - 1
          }
        };
        if !self.segments[seg_idx].attach(elt_idx) {
          let seg = &self.segments[seg_idx];
          return Err(Error::NonPlanar(
            self.points[seg.p1].no,
            self.points[seg.p2].no,
          ));
        }
        self.elements[elt_idx].segments.push(seg_idx);
      }
    }

    // bucket cells into their floors
    for elt_idx in 0..self.elements.len() {
      let floor = self.elements[elt_idx].floor;
      if let Some(floor) = self.floors.get_mut(floor) {
        floor.elements.push(elt_idx);
      }
    }

    debug!(
      points = self.points.len(),
      segments = self.segments.len(),
      elements = self.elements.len(),
      floors = self.floors.len(),
      "geometry built"
    );
    Ok(())
  }
}

/// Builds a single-floor grid of `nx` by `ny` unit squares, element
/// indices in row-major order. The shared fixture of most test modules.
#[cfg(test)]
pub(crate) fn grid(nx: usize, ny: usize) -> Geometry {
  let mut geom = Geometry::new();
  geom.add_floor(Floor::new(0)).unwrap();
  for y in 0..=ny {
    for x in 0..=nx {
      geom
        .add_point(Point {
          no: (y * (nx + 1) + x) as u32,
          x: x as f64,
          y: y as f64,
          floor: 0,
        })
        .unwrap();
    }
  }
  for y in 0..ny {
    for x in 0..nx {
      let mut elt = Element::new((y * nx + x) as u32, 0);
      let sw = y * (nx + 1) + x;
      for p in [sw, sw + 1, sw + nx + 2, sw + nx + 1] {
        elt.add_point(p);
      }
      geom.add_element(elt).unwrap();
    }
  }
  geom.build().unwrap();
  geom
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_close_triangle() {
    let mut geom = Geometry::new();
    geom.add_floor(Floor::new(0)).unwrap();
    for (no, x, y) in [(0, 0.0, 0.0), (1, 4.0, 0.0), (2, 0.0, 3.0)] {
      geom.add_point(Point { no, x, y, floor: 0 }).unwrap();
    }
    let mut elt = Element::new(0, 0);
    for p in [0, 1, 2] {
      elt.add_point(p);
    }
    geom.add_element(elt).unwrap();
    geom.build().unwrap();

    let elt = &geom.elements[0];
    assert_eq!(elt.area, 6.0);
    assert_eq!(elt.segments.len(), 3);
    assert_eq!(elt.points.len(), 4);
    assert_eq!(elt.points[0], elt.points[3]);
  }

  #[test]
  fn test_close_rejects_degenerate_polygons() {
    let mut geom = Geometry::new();
    for (no, x, y) in [(0, 0.0, 0.0), (1, 1.0, 0.0), (2, 2.0, 0.0)] {
      geom.add_point(Point { no, x, y, floor: 0 }).unwrap();
    }
    let mut two_points = Element::new(0, 0);
    two_points.add_point(0);
    two_points.add_point(1);
    geom.add_element(two_points).unwrap();
    assert!(matches!(geom.build(), Err(Error::TooFewPoints(0))));

    let mut geom = Geometry::new();
    for (no, x, y) in [(0, 0.0, 0.0), (1, 1.0, 0.0), (2, 2.0, 0.0)] {
      geom.add_point(Point { no, x, y, floor: 0 }).unwrap();
    }
    let mut flat = Element::new(0, 0);
    for p in [0, 1, 2] {
      flat.add_point(p);
    }
    geom.add_element(flat).unwrap();
    assert!(matches!(geom.build(), Err(Error::ZeroArea(0))));
  }

  #[test]
  fn test_duplicate_identifiers_are_rejected() {
    let mut geom = Geometry::new();
    geom
      .add_point(Point {
        no: 7,
        x: 0.0,
        y: 0.0,
        floor: 0,
      })
      .unwrap();
    assert!(matches!(
      geom.add_point(Point {
        no: 7,
        x: 1.0,
        y: 1.0,
        floor: 0,
      }),
      Err(Error::DuplicatePoint(7))
    ));
    geom.add_element(Element::new(1, 0)).unwrap();
    assert!(matches!(
      geom.add_element(Element::new(1, 0)),
      Err(Error::DuplicateElement(1))
    ));
    geom.add_floor(Floor::new(0)).unwrap();
    assert!(matches!(
      geom.add_floor(Floor::new(0)),
      Err(Error::DuplicateFloor(0))
    ));
  }

  #[test]
  fn test_grid_adjacency() {
    let geom = grid(2, 2);
    // 4 unit squares: 12 distinct edges, 4 of them interior
    assert_eq!(geom.elements.len(), 4);
    assert_eq!(geom.segments.len(), 12);
    let interior = geom
      .segments
      .iter()
      .filter(|s| s.cells.iter().all(Option::is_some))
      .count();
    assert_eq!(interior, 4);
    for elt in &geom.elements {
      assert_eq!(elt.segments.len(), 4);
      assert_eq!(elt.area, 1.0);
    }
    assert_eq!(geom.floors[0].elements.len(), 4);
  }

  #[test]
  fn test_next_of_crosses_shared_edges() {
    let geom = grid(2, 1);
    let shared = geom
      .segments
      .iter()
      .position(|s| s.cells.iter().all(Option::is_some))
      .unwrap();
    assert_eq!(geom.segments[shared].next_of(0), Some(1));
    assert_eq!(geom.segments[shared].next_of(1), Some(0));
    let outer = geom
      .segments
      .iter()
      .position(|s| s.cells[1].is_none())
      .unwrap();
    let owner = geom.segments[outer].cells[0].unwrap();
    assert_eq!(geom.segments[outer].next_of(owner), None);
  }

  #[test]
  fn test_attach_rejects_a_third_element() {
    let mut seg = Segment {
      p1: 0,
      p2: 1,
      length: 1.0,
      floor: 0,
      cells: [None, None],
    };
    assert!(seg.attach(0));
    assert!(seg.attach(1));
    assert!(seg.attach(0)); // already incident
    assert!(!seg.attach(2));
  }
}
