//! Ranked, bounded collection of solutions.

use itertools::{Itertools, MinMaxResult};

use crate::solution::Solution;

/// Fitness summary of a population.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stats {
  /// Smallest fitness present.
  pub min: f64,
  /// Mean fitness.
  pub mean: f64,
  /// Largest fitness present.
  pub max: f64,
}

/// The ranked set of solutions retained by the search.
///
/// Solutions are kept in non-increasing fitness order, deduplicated by
/// partition equality, and bounded by a capacity; an insertion past a full
/// tail is rejected.
#[derive(Debug, Clone)]
pub struct Population {
  solutions: Vec<Solution>,
  size_max: usize,
  /// Ordered-insertion attempts performed so far.
  pub nb_test: u64,
  stats: Stats,
}

impl Default for Population {
  fn default() -> Self {
    Population {
      solutions: Vec::new(),
      size_max: usize::MAX,
      nb_test: 0,
      stats: Stats::default(),
    }
  }
}

impl Population {
  /// Creates an empty population with unbounded capacity.
  pub fn new() -> Self {
    Self::default()
  }

  /// The retained solutions, best first.
  pub fn solutions(&self) -> &[Solution] {
    &self.solutions
  }

  /// Mutable access for re-evaluation; the caller is expected to restore
  /// the ranking with [`Population::sort_solutions`] afterwards.
  pub fn solutions_mut(&mut self) -> &mut [Solution] {
    &mut self.solutions
  }

  /// Consumes the population, yielding the solutions best first.
  pub fn into_solutions(self) -> Vec<Solution> {
    self.solutions
  }

  /// Number of retained solutions.
  pub fn len(&self) -> usize {
    self.solutions.len()
  }

  /// True when nothing was retained yet.
  pub fn is_empty(&self) -> bool {
    self.solutions.is_empty()
  }

  /// The capacity.
  pub fn size_max(&self) -> usize {
    self.size_max
  }

  /// Appends a solution without ranking it, for populations loaded from a
  /// file before their fitnesses exist.
  pub fn add_solution(&mut self, sol: Solution) {
    self.solutions.push(sol);
  }

  /// Inserts a solution at its rank. Equal fitness lands after the
  /// existing peers, and a full population rejects anything ranking at or
  /// past its tail. Returns whether the solution was admitted.
  pub fn insert_solution(&mut self, sol: Solution) -> bool {
    if self.solutions.is_empty() && self.size_max > 0 {
      self.solutions.push(sol);
      return true;
    }
    if self.solutions.iter().any(|s| *s == sol) {
      return false;
    }
    self.nb_test += 1;
    // scan past every at-least-as-fit entry
    let pos = self
      .solutions
      .iter()
      .position(|s| sol.fitness > s.fitness)
      .unwrap_or(self.solutions.len());
    if pos == self.solutions.len() {
      if self.solutions.len() >= self.size_max {
        return false;
      }
      self.solutions.push(sol);
      return true;
    }
    if self.solutions.len() >= self.size_max {
      self.solutions.pop();
    }
    self.solutions.insert(pos, sol);
    true
  }

  /// Changes the capacity, dropping the tail when shrinking.
  pub fn resize(&mut self, size_max: usize) {
    self.solutions.truncate(size_max);
    self.size_max = size_max;
  }

  /// Restores the ranking: stable sort by decreasing fitness.
  pub fn sort_solutions(&mut self) {
    self.solutions.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
  }

  /// Recomputes and returns the fitness statistics; all zeros when empty.
  pub fn stats(&mut self) -> Stats {
    self.stats = if self.solutions.is_empty() {
      Stats::default()
    } else {
      let (min, max) = match self.solutions.iter().map(|s| s.fitness).minmax() {
        MinMaxResult::NoElements => (0.0, 0.0),
        MinMaxResult::OneElement(only) => (only, only),
        MinMaxResult::MinMax(min, max) => (min, max),
      };
      let mean =
        self.solutions.iter().map(|s| s.fitness).sum::<f64>() / self.solutions.len() as f64;
      Stats { min, mean, max }
    };
    self.stats
  }

  /// The statistics computed by the last [`Population::stats`] call.
  pub fn last_stats(&self) -> Stats {
    self.stats
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  // distinct single-cell partitions with a chosen fitness
  fn sol(tag: usize, fitness: f64) -> Solution {
    Solution {
      fitness,
      distribution: vec![Some(tag)],
      lots: Vec::new(),
    }
  }

  fn fitnesses(popu: &Population) -> Vec<f64> {
    popu.solutions().iter().map(|s| s.fitness).collect()
  }

  #[test]
  fn test_insert_keeps_decreasing_order() {
    let mut popu = Population::new();
    for (tag, fitness) in [(0, 1.0), (1, 5.0), (2, 3.0), (3, 4.0)] {
      assert!(popu.insert_solution(sol(tag, fitness)));
    }
    assert_eq!(fitnesses(&popu), [5.0, 4.0, 3.0, 1.0]);
  }

  #[test]
  fn test_insert_rejects_duplicates() {
    let mut popu = Population::new();
    assert!(popu.insert_solution(sol(0, 1.0)));
    assert!(!popu.insert_solution(sol(0, 1.0)));
    assert_eq!(popu.len(), 1);
  }

  #[test]
  fn test_equal_fitness_fills_up_then_rejects() {
    // three equal-fitness solutions against capacity 2: ties insert
    // after their peers, so the third finds no tail slot
    let mut popu = Population::new();
    popu.resize(2);
    assert!(popu.insert_solution(sol(0, 10.0)));
    assert!(popu.insert_solution(sol(1, 10.0)));
    assert!(!popu.insert_solution(sol(2, 10.0)));
    assert_eq!(popu.len(), 2);
  }

  #[test]
  fn test_better_solution_evicts_the_tail() {
    let mut popu = Population::new();
    popu.resize(2);
    assert!(popu.insert_solution(sol(0, 1.0)));
    assert!(popu.insert_solution(sol(1, 2.0)));
    assert!(popu.insert_solution(sol(2, 3.0)));
    assert_eq!(fitnesses(&popu), [3.0, 2.0]);
  }

  #[test]
  fn test_zero_capacity_rejects_everything() {
    let mut popu = Population::new();
    popu.resize(0);
    assert!(!popu.insert_solution(sol(0, 1.0)));
  }

  #[test]
  fn test_resize_drops_the_tail() {
    let mut popu = Population::new();
    for tag in 0..5 {
      popu.insert_solution(sol(tag, tag as f64));
    }
    popu.resize(2);
    assert_eq!(popu.len(), 2);
    assert_eq!(fitnesses(&popu), [4.0, 3.0]);
  }

  #[test]
  fn test_stats() {
    let mut popu = Population::new();
    assert_eq!(popu.stats(), Stats::default());
    for (tag, fitness) in [(0, 1.0), (1, 2.0), (2, 6.0)] {
      popu.insert_solution(sol(tag, fitness));
    }
    let stats = popu.stats();
    assert_eq!(stats.min, 1.0);
    assert_eq!(stats.mean, 3.0);
    assert_eq!(stats.max, 6.0);
    assert_eq!(popu.last_stats(), stats);
  }

  #[test]
  fn test_sort_solutions_is_stable() {
    let mut popu = Population::new();
    popu.add_solution(sol(0, 1.0));
    popu.add_solution(sol(1, 3.0));
    popu.add_solution(sol(2, 3.0));
    popu.sort_solutions();
    assert_eq!(fitnesses(&popu), [3.0, 3.0, 1.0]);
    // the two peers kept their relative order
    assert_eq!(popu.solutions()[0].distribution, vec![Some(1)]);
    assert_eq!(popu.solutions()[1].distribution, vec![Some(2)]);
  }
}
