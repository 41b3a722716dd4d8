//! Error types shared across the crate.
//!
//! Only invalid input and broken invariants surface as [`Error`]s. Rejected
//! search moves (a refused swap, a merge that finds its cell already
//! placed) are ordinary control flow and stay boolean.

use std::io;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while describing a problem.
#[derive(Debug, Error)]
pub enum Error {
  /// A point identifier was defined twice.
  #[error("point P{0} is already defined")]
  DuplicatePoint(u32),
  /// An element identifier was defined twice.
  #[error("element E{0} is already defined")]
  DuplicateElement(u32),
  /// A floor identifier was defined twice.
  #[error("floor F{0} is already defined")]
  DuplicateFloor(u32),
  /// A lot type identifier was defined twice.
  #[error("type T{0} is already defined")]
  DuplicateType(u32),
  /// A command referenced a point that was never defined.
  #[error("point P{0} is not defined")]
  UnknownPoint(u32),
  /// A command referenced an element that was never defined.
  #[error("element E{0} is not defined")]
  UnknownElement(u32),
  /// An element polygon has fewer than three vertices.
  #[error("element E{0} has fewer than 3 points")]
  TooFewPoints(u32),
  /// An element polygon encloses no area.
  #[error("element E{0} has zero area")]
  ZeroArea(u32),
  /// An edge is claimed by more than two elements, so the cells do not
  /// form a planar subdivision.
  #[error("edge between P{0} and P{1} is shared by more than two elements")]
  NonPlanar(u32, u32),
  /// An `A` line used a parameter code outside 1..=4.
  #[error("parameter A{0} does not exist")]
  UnknownParameter(u32),
  /// A character that belongs to no token.
  #[error("unexpected character {0:?}")]
  UnexpectedCharacter(char),
  /// A command was truncated by the end of input.
  #[error("unexpected end of file")]
  UnexpectedEof,
  /// A token of the wrong kind where a command was expected.
  #[error("expected a command letter")]
  ExpectedCommand,
  /// A non-numeric token where a number was expected.
  #[error("expected a number")]
  ExpectedNumber,
  /// A fractional or negative number where a natural number was expected.
  #[error("got {0} instead of a natural number")]
  ExpectedNatural(f64),
  /// An element or lot listed a different number of items than announced.
  #[error("{kind} {no} has the wrong number of {items}")]
  CountMismatch {
    /// Either `"element"` or `"lot"`.
    kind: &'static str,
    /// Identifier of the faulty definition.
    no: u32,
    /// Either `"points"` or `"elements"`.
    items: &'static str,
  },
  /// An `L` line appeared before any `S` line.
  #[error("lot defined outside of a solution")]
  LotOutsideSolution,
  /// Any other error, annotated with the source line it came from.
  #[error("line {line}: {source}")]
  At {
    /// 1-based source line.
    line: usize,
    /// The underlying error.
    #[source]
    source: Box<Error>,
  },
  /// The underlying file could not be read or written.
  #[error(transparent)]
  Io(#[from] io::Error),
}

impl Error {
  /// Annotates the error with the source line it was detected on.
  pub(crate) fn at(self, line: usize) -> Self {
    Error::At {
      line,
      source: Box::new(self),
    }
  }
}
