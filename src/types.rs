//! The lot type catalog: area brackets, unit benefits and count bounds.

use crate::error::{Error, Result};

/// A lot classification.
///
/// A lot whose area falls in the half-open bracket `(area_min, area_max]`
/// is of this type and earns `benefit` per unit of habitable area. A
/// solution must contain between `nb_min` and `nb_max` lots of the type to
/// be worth anything at all.
#[derive(Debug, Clone, PartialEq)]
pub struct LotType {
  /// Identifier unique within the catalog.
  pub no: u32,
  /// Value of one unit of habitable area, relative to the other types.
  pub benefit: f64,
  /// Exclusive lower area bound.
  pub area_min: f64,
  /// Inclusive upper area bound.
  pub area_max: f64,
  /// Minimum number of lots of this type per solution.
  pub nb_min: usize,
  /// Maximum number of lots of this type per solution.
  pub nb_max: usize,
}

/// Insertion-ordered catalog of lot types.
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
  types: Vec<LotType>,
}

impl TypeCatalog {
  /// Creates an empty catalog.
  pub fn new() -> Self {
    Self::default()
  }

  /// The five-type catalog installed when no type was configured.
  pub fn default_catalog() -> Self {
    let types = [
      (1, 70.0, 30.0, 45.0),
      (2, 80.0, 45.0, 60.0),
      (3, 100.0, 60.0, 75.0),
      (4, 50.0, 75.0, 85.0),
      (5, 40.0, 85.0, 100.0),
    ]
    .into_iter()
    .map(|(no, benefit, area_min, area_max)| LotType {
      no,
      benefit,
      area_min,
      area_max,
      nb_min: 0,
      nb_max: 1000,
    })
    .collect();
    TypeCatalog { types }
  }

  /// Registers a type. Fails when its identifier is already present.
  pub fn add(&mut self, ty: LotType) -> Result<()> {
    if self.types.iter().any(|t| t.no == ty.no) {
      return Err(Error::DuplicateType(ty.no));
    }
    self.types.push(ty);
    Ok(())
  }

  /// Types in insertion order.
  pub fn iter(&self) -> impl Iterator<Item = &LotType> {
    self.types.iter()
  }

  /// Number of registered types.
  pub fn len(&self) -> usize {
    self.types.len()
  }

  /// True when no type was configured.
  pub fn is_empty(&self) -> bool {
    self.types.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn some_type(no: u32) -> LotType {
    LotType {
      no,
      benefit: 1.0,
      area_min: 0.0,
      area_max: 10.0,
      nb_min: 0,
      nb_max: 1000,
    }
  }

  #[test]
  fn test_add_keeps_insertion_order() {
    let mut catalog = TypeCatalog::new();
    catalog.add(some_type(3)).unwrap();
    catalog.add(some_type(1)).unwrap();
    catalog.add(some_type(2)).unwrap();
    let nos: Vec<u32> = catalog.iter().map(|t| t.no).collect();
    assert_eq!(nos, [3, 1, 2]);
  }

  #[test]
  fn test_add_rejects_duplicate() {
    let mut catalog = TypeCatalog::new();
    catalog.add(some_type(1)).unwrap();
    assert!(matches!(
      catalog.add(some_type(1)),
      Err(Error::DuplicateType(1))
    ));
    assert_eq!(catalog.len(), 1);
  }

  #[test]
  fn test_default_catalog_brackets_are_contiguous() {
    let catalog = TypeCatalog::default_catalog();
    assert_eq!(catalog.len(), 5);
    for (a, b) in catalog.iter().zip(catalog.iter().skip(1)) {
      assert_eq!(a.area_max, b.area_min);
    }
  }
}
