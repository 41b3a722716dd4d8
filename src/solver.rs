//! The search driver: random seeding, then swap-neighborhood improvement.

use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info};
use typed_builder::TypedBuilder;

use crate::{
  evaluator::Evaluator,
  geometry::Geometry,
  lot::Lot,
  population::Population,
  solution::Solution,
  types::TypeCatalog,
};

/// Population-based stochastic local search over floor partitions.
///
/// The solver owns the geometry and the population. Each [`Solver::run`]
/// call performs one iteration: during the seeding phase it draws a fresh
/// random partition and, when the population admits it, floods the
/// population with its whole swap neighborhood; during the improvement
/// phase it expands the neighborhood of every retained solution and stops
/// as soon as no candidate makes the cut.
///
/// # Examples
/// ```no_run
/// use lotir::{geometry::Geometry, solver::Solver};
///
/// let geometry = Geometry::new();
/// let mut solver = Solver::builder().geometry(geometry).seed(Some(42)).build();
/// while solver.run() {}
/// let best = solver.population().solutions().first();
/// ```
#[derive(TypedBuilder, Debug)]
pub struct Solver {
  /// The built, read-only geometry to partition.
  geometry: Geometry,
  /// Solutions loaded before the search; re-evaluated on the first run.
  #[builder(default)]
  population: Population,
  /// The type catalog; the default five-type catalog is installed when
  /// this stays empty.
  #[builder(default)]
  types: TypeCatalog,
  /// Population capacity.
  #[builder(default = 100)]
  nb_sols: usize,
  /// Seeding-phase iteration budget; derived from the geometry when
  /// `None`.
  #[builder(default)]
  init_it: Option<u64>,
  /// Improvement-phase iteration budget; derived from the geometry when
  /// `None`.
  #[builder(default)]
  end_it: Option<u64>,
  /// Compactness coefficient.
  #[builder(default = 0.0)]
  alpha: f64,
  /// Seed for the random stream; a `None` seeds from entropy.
  #[builder(default)]
  seed: Option<u64>,
  #[builder(setter(skip), default)]
  current_it: u64,
  #[builder(setter(skip), default)]
  min_lots: usize,
  #[builder(setter(skip), default)]
  max_lots: usize,
  #[builder(setter(skip), default)]
  rng: Option<StdRng>,
}

impl Solver {
  /// The geometry being partitioned.
  pub fn geometry(&self) -> &Geometry {
    &self.geometry
  }

  /// The ranked solutions found so far.
  pub fn population(&self) -> &Population {
    &self.population
  }

  /// The type catalog in use.
  pub fn types(&self) -> &TypeCatalog {
    &self.types
  }

  /// Iterations performed so far.
  pub fn current_iteration(&self) -> u64 {
    self.current_it
  }

  /// The seeding budget; resolved on the first [`Solver::run`] call.
  pub fn init_it(&self) -> Option<u64> {
    self.init_it
  }

  /// The improvement budget; resolved on the first [`Solver::run`] call.
  pub fn end_it(&self) -> Option<u64> {
    self.end_it
  }

  /// The population capacity.
  pub fn nb_sols(&self) -> usize {
    self.nb_sols
  }

  /// The compactness coefficient.
  pub fn alpha(&self) -> f64 {
    self.alpha
  }

  /// Performs one search iteration. Returns `false` once the iteration
  /// budget is exhausted or the improvement phase stops making progress.
  pub fn run(&mut self) -> bool {
    if self.current_it == 0 {
      self.init();
      self.population.sort_solutions();
    }
    self.current_it += 1;
    let init_it = self.init_it.unwrap_or(0);
    let end_it = self.end_it.unwrap_or(0);
    if self.current_it > init_it + end_it {
      return false;
    }
    if self.current_it <= init_it {
      self.seeding_step();
    } else if !self.improvement_step() {
      info!(iteration = self.current_it, "improvement converged");
      return false;
    }
    self.population.stats();
    true
  }

  // Lazy initialization before the first iteration: default catalog,
  // random stream, lot count bounds and iteration budgets.
  fn init(&mut self) {
    if self.types.is_empty() {
      self.types = TypeCatalog::default_catalog();
    }
    self.rng = Some(match self.seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_entropy(),
    });

    // the seeding width: every cell reachable across the border of the
    // all-common lot can host a seed
    let mut probe = Solution::new(&self.geometry);
    let mut commons = Lot::new(0);
    for elt in 0..self.geometry.elements.len() {
      if self.geometry.elements[elt].common {
        commons.add_element(elt, &self.geometry, &mut probe.distribution);
      }
    }
    commons.build_border(&self.geometry, &probe.distribution);
    let mut reachable = vec![false; self.geometry.elements.len()];
    for &seg in &commons.border {
      if let Some(elt) = commons.neighbor_across(seg, &self.geometry, &probe.distribution) {
        reachable[elt] = true;
      }
    }
    self.max_lots = reachable.iter().filter(|&&r| r).count();
    self.max_lots = self
      .max_lots
      .min(self.types.iter().map(|t| t.nb_max).sum());
    self.min_lots = self.types.iter().map(|t| t.nb_min).sum::<usize>().max(1);

    if self.init_it.is_none() {
      self.init_it = Some(250 * self.max_lots as u64);
    }
    if self.end_it.is_none() {
      self.end_it = Some(10 * self.max_lots as u64);
    }
    self.population.resize(self.nb_sols);

    // preloaded solutions enter the ranking with fresh fitnesses
    let evaluator = Evaluator::new(&self.types, self.alpha);
    for sol in self.population.solutions_mut() {
      evaluator.evaluate(sol, &self.geometry);
    }
    self.population.stats();

    debug!(
      min_lots = self.min_lots,
      max_lots = self.max_lots,
      init_it = ?self.init_it,
      end_it = ?self.end_it,
      "solver initialized"
    );
  }

  // One seeding iteration: a fresh random partition, and on admission the
  // expansion of its whole swap neighborhood.
  fn seeding_step(&mut self) {
    let nb_seeds = {
      let rng = self.rng.as_mut().expect("rng is seeded in init");
      rnd(rng, self.min_lots, self.max_lots)
    };
    let mut sol = Solution::new(&self.geometry);
    {
      let rng = self.rng.as_mut().expect("rng is seeded in init");
      sol.rnd_set(nb_seeds, &self.geometry, rng);
    }
    Evaluator::new(&self.types, self.alpha).evaluate(&mut sol, &self.geometry);
    if !self.population.insert_solution(sol.clone()) {
      return;
    }
    let mut scratch = Population::new();
    scratch.resize(self.population.len());
    self.expand_into(&sol, &mut scratch);
    for candidate in scratch.into_solutions() {
      self.population.insert_solution(candidate);
    }
  }

  // One improvement iteration: expand the neighborhood of every retained
  // solution through a scratch population, then promote the survivors.
  // False when nothing was promoted.
  fn improvement_step(&mut self) -> bool {
    let mut scratch = Population::new();
    scratch.resize(self.population.len());
    for i in 0..self.population.len() {
      self.expand_into(&self.population.solutions()[i], &mut scratch);
    }
    let mut promoted = 0;
    for candidate in scratch.into_solutions() {
      if self.population.insert_solution(candidate) {
        promoted += 1;
      }
    }
    promoted > 0
  }

  // Clone-swap-evaluate every (lot, border segment) pair of `source`.
  // The candidates are independent, so they are evaluated in parallel;
  // insertion stays sequential because its order decides ties.
  fn expand_into(&self, source: &Solution, scratch: &mut Population) {
    let pairs: Vec<(usize, usize)> = source
      .lots
      .iter()
      .enumerate()
      .flat_map(|(j, lot)| (0..lot.border.len()).map(move |k| (j, k)))
      .collect();
    let evaluator = Evaluator::new(&self.types, self.alpha);
    let geometry = &self.geometry;
    let candidates: Vec<Solution> = pairs
      .into_par_iter()
      .map(|(j, k)| {
        let mut candidate = source.clone();
        candidate.swap(j, k, geometry);
        evaluator.evaluate(&mut candidate, geometry);
        candidate
      })
      .collect();
    for candidate in candidates {
      scratch.insert_solution(candidate);
    }
  }
}

// The clamped draw used for the seed count: `high` when the range is
// empty, otherwise uniform in `[low, high)`.
fn rnd<R: Rng>(rng: &mut R, low: usize, high: usize) -> usize {
  if high <= low {
    high
  } else {
    rng.gen_range(low..high)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{geometry::grid, types::LotType};

  // 2x2 grid with one entrance cell, a catalog bracketing every plausible
  // flat area, and explicit budgets
  fn solver(init_it: u64, end_it: u64) -> Solver {
    let mut geom = grid(2, 2);
    geom.elements[0].common = true;
    geom.elements[0].imposed = true;
    geom.elements[0].exit = true;
    let mut types = TypeCatalog::new();
    types
      .add(LotType {
        no: 1,
        benefit: 2.0,
        area_min: 0.5,
        area_max: 4.0,
        nb_min: 0,
        nb_max: 1000,
      })
      .unwrap();
    Solver::builder()
      .geometry(geom)
      .types(types)
      .nb_sols(5)
      .init_it(Some(init_it))
      .end_it(Some(end_it))
      .seed(Some(7))
      .build()
  }

  #[test]
  fn test_exhausted_budget_stops_immediately() {
    let mut solver = solver(0, 0);
    // preload one valid partition: the entrance alone in circulation
    let mut sol = Solution::new(solver.geometry());
    sol.distribution = vec![Some(0), Some(1), Some(1), Some(1)];
    let mut popu = Population::new();
    popu.add_solution(sol);
    solver.population = popu;

    assert!(!solver.run());
    assert_eq!(solver.population().len(), 1);
    assert_eq!(solver.population().solutions()[0].distribution[0], Some(0));
    // the preloaded fitness was recomputed during init
    assert!(solver.population().solutions()[0].fitness > 0.0);
  }

  #[test]
  fn test_budgets_default_from_the_geometry() {
    let mut geom = grid(2, 2);
    geom.elements[0].common = true;
    geom.elements[0].imposed = true;
    geom.elements[0].exit = true;
    let mut solver = Solver::builder().geometry(geom).seed(Some(1)).build();
    assert_eq!(solver.init_it(), None);
    solver.run();
    // two cells border the all-common lot, capped by nothing smaller
    assert_eq!(solver.init_it(), Some(500));
    assert_eq!(solver.end_it(), Some(20));
  }

  #[test]
  fn test_seeding_fills_the_population() {
    let mut solver = solver(50, 0);
    let mut iterations = 0;
    while solver.run() {
      iterations += 1;
    }
    assert_eq!(iterations, 50);
    assert!(!solver.population().is_empty());
    assert!(solver.population().len() <= 5);
    // the ranking is non-increasing and free of duplicates
    let sols = solver.population().solutions();
    for pair in sols.windows(2) {
      assert!(pair[0].fitness >= pair[1].fitness);
      assert!(pair[0] != pair[1]);
    }
    // every retained partition is complete and keeps the entrance in
    // circulation
    for sol in sols {
      assert!(sol.distribution.iter().all(Option::is_some));
      assert_eq!(sol.distribution[0], Some(0));
    }
  }

  #[test]
  fn test_improvement_converges_before_its_budget() {
    // a tiny instance exhausts its neighborhood quickly: the improvement
    // phase must end the run on its own, not by budget
    let mut solver = solver(20, 1000);
    while solver.run() {}
    let stopped_at = solver.current_iteration();
    assert!(stopped_at > 20);
    assert!(stopped_at < 1020);
  }

  #[test]
  fn test_fixed_seed_reproduces_the_search() {
    let run = || {
      let mut solver = solver(30, 10);
      while solver.run() {}
      solver
        .population()
        .solutions()
        .iter()
        .map(|s| s.distribution.clone())
        .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
  }

  #[test]
  fn test_rnd_draw_is_clamped() {
    let mut rng = StdRng::seed_from_u64(0);
    assert_eq!(rnd(&mut rng, 3, 3), 3);
    assert_eq!(rnd(&mut rng, 5, 2), 2);
    for _ in 0..50 {
      let draw = rnd(&mut rng, 1, 4);
      assert!((1..4).contains(&draw));
    }
  }
}
