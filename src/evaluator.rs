//! Scores solutions against the type catalog.

use tracing::trace;

use crate::{geometry::Geometry, solution::Solution, types::TypeCatalog};

/// Computes per-lot and per-solution fitness.
///
/// Every lot but the circulation lot is bracketed by area into a type and
/// earns that type's benefit per unit area, adjusted by cell bonuses and
/// a compactness term weighted by `alpha`. A solution violating a type's
/// count bounds, or containing an apartment lot no type covers, is worth
/// zero.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
  types: &'a TypeCatalog,
  alpha: f64,
}

impl<'a> Evaluator<'a> {
  /// Creates an evaluator over `types` with compactness coefficient
  /// `alpha`.
  pub fn new(types: &'a TypeCatalog, alpha: f64) -> Self {
    Evaluator { types, alpha }
  }

  /// Scores `sol` and leaves its lots in canonical order.
  pub fn evaluate(&self, sol: &mut Solution, geom: &Geometry) {
    if sol.lots.is_empty() {
      sol.set_lots(geom);
    }
    sol.fitness = 0.0;
    let mut sum_area = match sol.lots.first() {
      Some(circulation) => circulation.area,
      None => return,
    };
    let mut counts = vec![0usize; self.types.len()];
    for lot in sol.lots.iter_mut().skip(1) {
      lot.fitness = 0.0;
      lot.type_no = None;
      // bracket the lot by area
      for (t, ty) in self.types.iter().enumerate() {
        if lot.area > ty.area_min && lot.area <= ty.area_max {
          lot.fitness = lot.area * ty.benefit;
          lot.type_no = Some(ty.no);
          counts[t] += 1;
        }
      }
      // cell bonuses only count on a typed lot
      if lot.fitness > 0.0 {
        for &elt in &lot.elements {
          lot.fitness += geom.elements[elt].bonus * geom.elements[elt].area;
        }
      }
      // compactness: a shape with more area per squared perimeter is
      // rewarded when alpha is positive
      if lot.length > 0.0 {
        lot.fitness *= 1.0 + self.alpha * (lot.area / (lot.length * lot.length) - 1.0);
      }
      sol.fitness += lot.fitness;
      sum_area += lot.area;
    }
    // count bounds zero the solution outright, as does an untyped lot
    let mut typed = 0;
    for (t, ty) in self.types.iter().enumerate() {
      typed += counts[t];
      if counts[t] < ty.nb_min || counts[t] > ty.nb_max {
        sol.fitness = 0.0;
      }
    }
    if typed != sol.lots.len().saturating_sub(1) {
      sol.fitness = 0.0;
    }
    // reduce benefits to unit area
    for lot in sol.lots.iter_mut().skip(1) {
      if lot.area > 0.0 {
        lot.fitness /= lot.area;
      }
    }
    if sum_area > 0.0 {
      sol.fitness /= sum_area;
    }
    trace!(fitness = sol.fitness, lots = sol.lots.len(), "evaluated");
    sol.sort_lots();
  }
}
