//! A lot: a contiguous group of cells with its maintained border.
//!
//! A [`Lot`] never owns geometry; it records member cell indices and the
//! indices of the border segments, and reads everything else from the
//! shared [`Geometry`](crate::geometry::Geometry) and its owning
//! solution's distribution slice. Graph traversals use per-call scratch
//! vectors, so concurrent reads of one geometry are safe.

use crate::geometry::Geometry;

/// A contiguous group of cells forming a candidate apartment or the
/// common circulation space.
#[derive(Debug, Clone, Default)]
pub struct Lot {
  /// Position of this lot within its owning solution.
  pub index: usize,
  /// True iff this is the circulation lot (it holds an entrance).
  pub common: bool,
  /// Benefit per unit area, set by the evaluator.
  pub fitness: f64,
  /// Identifier of the matched lot type, if the evaluator found one.
  pub type_no: Option<u32>,
  /// Accumulated member area.
  pub area: f64,
  /// Accumulated border length.
  pub length: f64,
  /// Member cell indices.
  pub elements: Vec<usize>,
  /// Border segments: edges with exactly one side inside the lot.
  pub border: Vec<usize>,
}

impl Lot {
  /// Creates an empty lot at position `index`.
  pub fn new(index: usize) -> Self {
    Lot {
      index,
      ..Default::default()
    }
  }

  /// Number of member cells.
  pub fn len(&self) -> usize {
    self.elements.len()
  }

  /// True when the lot holds no cell.
  pub fn is_empty(&self) -> bool {
    self.elements.is_empty()
  }

  /// True iff `elt` is assigned to this lot.
  pub fn contains(&self, elt: Option<usize>, distribution: &[Option<usize>]) -> bool {
    elt.is_some_and(|e| distribution[e] == Some(self.index))
  }

  /// The cell on the outer side of one of this lot's border segments.
  pub fn neighbor_across(
    &self,
    seg: usize,
    geom: &Geometry,
    distribution: &[Option<usize>],
  ) -> Option<usize> {
    let cells = geom.segments[seg].cells;
    if self.contains(cells[0], distribution) {
      cells[1]
    } else {
      cells[0]
    }
  }

  /// Adds a cell without touching the border, so that members may arrive
  /// in any order. The caller finishes with [`Lot::build_border`].
  pub fn add_element(&mut self, elt: usize, geom: &Geometry, distribution: &mut [Option<usize>]) {
    debug_assert!(
      !self.elements.contains(&elt),
      "cell E{} added to its lot twice",
      geom.elements[elt].no
    );
    self.elements.push(elt);
    distribution[elt] = Some(self.index);
    if geom.elements[elt].exit {
      self.common = true;
    }
    self.area += geom.elements[elt].area;
  }

  /// Merges a neighboring cell, updating the border incrementally: each
  /// of its edges leaves the border when the far side is already a
  /// member, and enters it otherwise. Returns false when the cell is
  /// already a member.
  pub fn merge_element(
    &mut self,
    elt: usize,
    geom: &Geometry,
    distribution: &mut [Option<usize>],
  ) -> bool {
    if self.elements.contains(&elt) {
      return false;
    }
    self.elements.push(elt);
    for &seg in &geom.elements[elt].segments {
      if self.contains(geom.segments[seg].next_of(elt), distribution) {
        self.remove_border_segment(seg, geom);
      } else {
        self.add_border_segment(seg, geom);
      }
    }
    distribution[elt] = Some(self.index);
    self.area += geom.elements[elt].area;
    true
  }

  /// Removes a member cell, updating the border incrementally. Returns
  /// false when the cell is not a member.
  pub fn remove_element(
    &mut self,
    elt: usize,
    geom: &Geometry,
    distribution: &mut [Option<usize>],
  ) -> bool {
    let Some(pos) = self.elements.iter().position(|&e| e == elt) else {
      return false;
    };
    self.elements.remove(pos);
    for &seg in &geom.elements[elt].segments {
      if self.contains(geom.segments[seg].next_of(elt), distribution) {
        self.add_border_segment(seg, geom);
      } else {
        self.remove_border_segment(seg, geom);
      }
    }
    distribution[elt] = None;
    self.area -= geom.elements[elt].area;
    true
  }

  /// Rebuilds the border from scratch: an edge is a border edge iff
  /// exactly one of its sides lies in the lot.
  pub fn build_border(&mut self, geom: &Geometry, distribution: &[Option<usize>]) {
    self.border.clear();
    self.length = 0.0;
    for i in 0..self.elements.len() {
      let elt = self.elements[i];
      for &seg in &geom.elements[elt].segments {
        if !self.contains(geom.segments[seg].next_of(elt), distribution) {
          self.add_border_segment(seg, geom);
        }
      }
    }
  }

  fn add_border_segment(&mut self, seg: usize, geom: &Geometry) {
    self.border.push(seg);
    self.length += geom.segments[seg].length;
  }

  fn remove_border_segment(&mut self, seg: usize, geom: &Geometry) {
    if let Some(pos) = self.border.iter().position(|&s| s == seg) {
      self.border.remove(pos);
      self.length -= geom.segments[seg].length;
    }
  }

  /// Would the lot's induced cell graph stay connected without `removed`?
  ///
  /// `removed` must be a member. A single-cell lot and an imposed cell
  /// both refuse outright.
  pub fn still_connex(
    &self,
    removed: usize,
    geom: &Geometry,
    distribution: &[Option<usize>],
  ) -> bool {
    if distribution[removed] != Some(self.index) {
      return false;
    }
    if self.elements.len() < 2 || geom.elements[removed].imposed {
      return false;
    }
    // pre-mark `removed` so the walk cannot pass through it
    let mut mark = vec![false; geom.elements.len()];
    mark[removed] = true;
    // any surviving neighbor works as the start of the walk
    let start = geom.elements[removed].segments.iter().find_map(|&seg| {
      geom.segments[seg]
        .next_of(removed)
        .filter(|&n| distribution[n] == Some(self.index))
    });
    let Some(start) = start else {
      return false;
    };
    mark[start] = true;
    self.spread_marks(&mut mark, vec![start], geom, distribution);
    // connected iff every member ended up marked
    self.elements.iter().all(|&e| mark[e])
  }

  /// Would the lot keep its required connection without `removed`: the
  /// circulation lot must keep every cell reachable from an entrance, any
  /// other lot must keep a border contact with the circulation lot.
  pub fn still_connected(
    &self,
    removed: usize,
    geom: &Geometry,
    distribution: &[Option<usize>],
  ) -> bool {
    if distribution[removed] == Some(0) {
      if self.common {
        if geom.elements[removed].imposed {
          return false;
        }
        // flood the marks from every entrance, walking around `removed`
        let mut mark = vec![false; geom.elements.len()];
        let mut exits = Vec::new();
        for &e in &self.elements {
          if geom.elements[e].exit {
            mark[e] = true;
            exits.push(e);
          }
        }
        mark[removed] = true;
        self.spread_marks(&mut mark, exits, geom, distribution);
        self.elements.iter().all(|&e| mark[e])
      } else {
        // some other border contact with circulation must survive
        self.border.iter().any(|&seg| {
          self
            .neighbor_across(seg, geom, distribution)
            .is_some_and(|n| n != removed && distribution[n] == Some(0))
        })
      }
    } else if distribution[removed] != Some(self.index) {
      true
    } else {
      // losing a member: a border edge away from it must still touch
      // the circulation lot
      self.border.iter().any(|&seg| {
        let cells = geom.segments[seg].cells;
        if cells[0] == Some(removed) || cells[1] == Some(removed) {
          return false;
        }
        self
          .neighbor_across(seg, geom, distribution)
          .is_some_and(|n| n != removed && distribution[n] == Some(0))
      })
    }
  }

  // Depth-first diffusion of the marks through in-lot neighbors.
  fn spread_marks(
    &self,
    mark: &mut [bool],
    mut stack: Vec<usize>,
    geom: &Geometry,
    distribution: &[Option<usize>],
  ) {
    while let Some(e) = stack.pop() {
      for &seg in &geom.elements[e].segments {
        if let Some(next) = geom.segments[seg].next_of(e) {
          if !mark[next] && distribution[next] == Some(self.index) {
            mark[next] = true;
            stack.push(next);
          }
        }
      }
    }
  }

  /// The border vertices in traversal order, assuming the border is one
  /// simple cycle.
  pub fn point_list(&self, geom: &Geometry) -> Vec<usize> {
    if self.border.is_empty() {
      return Vec::new();
    }
    let mut visited = vec![false; self.border.len()];
    visited[0] = true;
    let first = &geom.segments[self.border[0]];
    let mut points = vec![first.p1, first.p2];
    // stitch segments end to end until the cycle closes
    while points.len() != self.border.len() {
      let mut matched = false;
      for (i, &seg) in self.border.iter().enumerate() {
        if visited[i] {
          continue;
        }
        let s = &geom.segments[seg];
        let last = points[points.len() - 1];
        if s.p1 == last {
          points.push(s.p2);
        } else if s.p2 == last {
          points.push(s.p1);
        } else {
          continue;
        }
        visited[i] = true;
        matched = true;
        break;
      }
      if !matched {
        break;
      }
    }
    points
  }
}
