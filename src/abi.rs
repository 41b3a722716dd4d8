//! The `.abi` text format: problem reader and solution writer.
//!
//! The format is line-oriented and whitespace tokenized. Every line starts
//! with a single command letter followed by numbers; `#` opens a comment
//! running to the end of the line:
//!
//! ```text
//! A1 5000          # algorithm parameter (1 initIT, 2 endIT, 3 nbSols, 4 alpha)
//! T1 70 30 45 0 1000   # type: no benefit areaMin areaMax nbMin nbMax
//! F0               # begin floor 0
//! P1 0 0           # point: no x y, on the current floor
//! E1 4 1 2 3 4     # element: no k p1..pk
//! C2  I3  X1       # common / imposed / exit element
//! B2 0.5           # element bonus
//! S0 1.96          # begin solution (fitness is recomputed on load)
//! L0 0 0 1 1       # lot: no typeNo fitness k e1..ek
//! ```

use std::{fs, io::Write, path::Path};

use itertools::Itertools;

use crate::{
  error::{Error, Result},
  geometry::{Element, Floor, Geometry, Point},
  population::Population,
  solution::Solution,
  solver::Solver,
  types::{LotType, TypeCatalog},
};

/// Everything a problem file describes.
#[derive(Debug, Default)]
pub struct Document {
  /// The built geometry.
  pub geometry: Geometry,
  /// Solutions preloaded from the file, not yet evaluated.
  pub population: Population,
  /// The type catalog; empty when the file defines no types.
  pub types: TypeCatalog,
  /// Seeding-phase budget (`A1`), when the file sets one.
  pub init_it: Option<u64>,
  /// Improvement-phase budget (`A2`), when the file sets one.
  pub end_it: Option<u64>,
  /// Population capacity (`A3`), when the file sets one.
  pub nb_sols: Option<usize>,
  /// Compactness coefficient (`A4`), when the file sets one.
  pub alpha: Option<f64>,
}

impl Document {
  /// Moves the document into a ready-to-run [`Solver`].
  pub fn into_solver(self, seed: Option<u64>) -> Solver {
    Solver::builder()
      .geometry(self.geometry)
      .population(self.population)
      .types(self.types)
      .nb_sols(self.nb_sols.unwrap_or(100))
      .init_it(self.init_it)
      .end_it(self.end_it)
      .alpha(self.alpha.unwrap_or(0.0))
      .seed(seed)
      .build()
  }
}

/// Reads and parses a problem file, building its geometry.
pub fn read(path: impl AsRef<Path>) -> Result<Document> {
  parse(&fs::read_to_string(path)?)
}

/// Parses a problem description, building its geometry.
pub fn parse(source: &str) -> Result<Document> {
  let tokens = scan(source)?;
  Parser::new(tokens).run()
}

/// Writes the solver's geometry, parameters and ranked solutions in the
/// same grammar the reader accepts.
pub fn write(path: impl AsRef<Path>, solver: &Solver) -> Result<()> {
  let mut out = fs::File::create(path)?;
  write_to(&mut out, solver)
}

/// Writes the solver state to an arbitrary sink.
pub fn write_to<W: Write>(mut out: W, solver: &Solver) -> Result<()> {
  let geom = solver.geometry();

  writeln!(out, "A1\t{}", solver.init_it().map_or(-1, |v| v as i64))?;
  writeln!(out, "A2\t{}", solver.end_it().map_or(-1, |v| v as i64))?;
  writeln!(out, "A3\t{}", solver.nb_sols())?;
  writeln!(out, "A4\t{:.2}", solver.alpha())?;

  for ty in solver.types().iter() {
    writeln!(
      out,
      "T{}\t{:.2}\t{:.2}\t{:.2}\t{}\t{}",
      ty.no, ty.benefit, ty.area_min, ty.area_max, ty.nb_min, ty.nb_max
    )?;
  }

  for (floor_idx, floor) in geom.floors.iter().enumerate() {
    writeln!(out, "F{}", floor.no)?;
    for pt in geom.points.iter().filter(|p| p.floor == floor_idx) {
      writeln!(out, "P{}\t{:.2}\t{:.2}", pt.no, pt.x, pt.y)?;
    }
    for &e in &floor.elements {
      let elt = &geom.elements[e];
      write!(out, "E{}\t{}", elt.no, elt.points.len() - 1)?;
      for &p in &elt.points[..elt.points.len() - 1] {
        write!(out, "\t{}", geom.points[p].no)?;
      }
      writeln!(out)?;
    }
    // each flagged element appears once, under its strongest flag
    for &e in &floor.elements {
      let elt = &geom.elements[e];
      if elt.common && !elt.imposed {
        writeln!(out, "C{}", elt.no)?;
      }
    }
    for &e in &floor.elements {
      let elt = &geom.elements[e];
      if elt.imposed && !elt.exit {
        writeln!(out, "I{}", elt.no)?;
      }
    }
    for &e in &floor.elements {
      if geom.elements[e].exit {
        writeln!(out, "X{}", geom.elements[e].no)?;
      }
    }
    for &e in &floor.elements {
      let elt = &geom.elements[e];
      if elt.bonus != 0.0 {
        writeln!(out, "B{}\t{:.2}", elt.no, elt.bonus)?;
      }
    }
  }

  for (i, sol) in solver.population().solutions().iter().enumerate() {
    writeln!(out, "S{}\t{:.2}", i, sol.fitness)?;
    for (j, lot) in sol.lots.iter().enumerate() {
      write!(
        out,
        "L{}\t{}\t{:.2}\t{}",
        j,
        lot.type_no.unwrap_or(0),
        lot.fitness,
        lot.elements.len()
      )?;
      for &e in lot
        .elements
        .iter()
        .sorted_by_key(|&&e| geom.elements[e].no)
      {
        write!(out, "\t{}", geom.elements[e].no)?;
      }
      writeln!(out)?;
    }
  }
  Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
  Command(char),
  Number(f64),
}

// Turns the source into (token, line) pairs.
fn scan(source: &str) -> Result<Vec<(Token, usize)>> {
  let mut chars = source.chars().peekable();
  let mut line = 1;
  let mut tokens = Vec::new();
  while let Some(&c) = chars.peek() {
    match c {
      '\n' => {
        line += 1;
        chars.next();
      }
      ' ' | '\t' | '\r' => {
        chars.next();
      }
      '#' => {
        while chars.peek().is_some_and(|&c| c != '\n') {
          chars.next();
        }
      }
      c if c.is_ascii_alphabetic() => {
        tokens.push((Token::Command(c), line));
        chars.next();
      }
      c if c.is_ascii_digit() || c == '-' || c == '.' => {
        let mut literal = String::new();
        while chars
          .peek()
          .is_some_and(|&c| c.is_ascii_digit() || c == '-' || c == '.')
        {
          literal.push(chars.next().expect("peeked"));
        }
        let value = literal
          .parse::<f64>()
          .map_err(|_| Error::UnexpectedCharacter(c).at(line))?;
        tokens.push((Token::Number(value), line));
      }
      c => return Err(Error::UnexpectedCharacter(c).at(line)),
    }
  }
  Ok(tokens)
}

// Executes the command stream against a document under construction.
struct Parser {
  tokens: Vec<(Token, usize)>,
  pos: usize,
  doc: Document,
  // arena index of the floor the P/E commands land on
  floor: usize,
  solutions: Vec<Solution>,
}

impl Parser {
  fn new(tokens: Vec<(Token, usize)>) -> Self {
    Parser {
      tokens,
      pos: 0,
      doc: Document::default(),
      floor: 0,
      solutions: Vec::new(),
    }
  }

  fn run(mut self) -> Result<Document> {
    while let Some((token, line)) = self.next_token() {
      let Token::Command(cmd) = token else {
        return Err(Error::ExpectedCommand.at(line));
      };
      match cmd {
        'A' => self.parameter(line)?,
        'T' => self.type_definition(line)?,
        'F' => self.floor_definition(line)?,
        'P' => self.point_definition(line)?,
        'E' => self.element_definition(line)?,
        'C' => self.flag(line, |elt| elt.common = true)?,
        'I' => self.flag(line, |elt| {
          elt.common = true;
          elt.imposed = true;
        })?,
        'X' => self.flag(line, |elt| {
          elt.common = true;
          elt.imposed = true;
          elt.exit = true;
        })?,
        'B' => self.bonus(line)?,
        'S' => self.solution_definition(line)?,
        'L' => self.lot_definition(line)?,
        other => return Err(Error::UnexpectedCharacter(other).at(line)),
      }
    }
    self.doc.geometry.build()?;
    for sol in self.solutions.drain(..) {
      self.doc.population.add_solution(sol);
    }
    Ok(self.doc)
  }

  fn next_token(&mut self) -> Option<(Token, usize)> {
    let token = self.tokens.get(self.pos).copied();
    self.pos += 1;
    token
  }

  // the next token as a number
  fn number(&mut self) -> Result<(f64, usize)> {
    match self.next_token() {
      Some((Token::Number(value), line)) => Ok((value, line)),
      Some((Token::Command(_), line)) => Err(Error::ExpectedNumber.at(line)),
      None => Err(Error::UnexpectedEof),
    }
  }

  // the next token as a non-negative integer
  fn natural(&mut self) -> Result<(u32, usize)> {
    let (value, line) = self.number()?;
    if value.fract() != 0.0 || value < 0.0 {
      return Err(Error::ExpectedNatural(value).at(line));
    }
    Ok((value as u32, line))
  }

  // every consecutive number token, for counted lists
  fn numbers_until_command(&mut self) -> Vec<(f64, usize)> {
    let mut numbers = Vec::new();
    while let Some((Token::Number(value), line)) = self.tokens.get(self.pos).copied() {
      numbers.push((value, line));
      self.pos += 1;
    }
    numbers
  }

  fn parameter(&mut self, line: usize) -> Result<()> {
    let (code, _) = self.natural()?;
    let (value, value_line) = self.number()?;
    // budgets and capacity are integers; a negative value leaves the
    // parameter unset
    let integer = |value: f64| -> Result<Option<u64>> {
      if value.fract() != 0.0 {
        return Err(Error::ExpectedNatural(value).at(value_line));
      }
      Ok((value >= 0.0).then_some(value as u64))
    };
    match code {
      1 => self.doc.init_it = integer(value)?,
      2 => self.doc.end_it = integer(value)?,
      3 => self.doc.nb_sols = integer(value)?.map(|v| v as usize),
      4 => self.doc.alpha = Some(value),
      code => return Err(Error::UnknownParameter(code).at(line)),
    }
    Ok(())
  }

  fn type_definition(&mut self, line: usize) -> Result<()> {
    let (no, _) = self.natural()?;
    let (benefit, _) = self.number()?;
    let (area_min, _) = self.number()?;
    let (area_max, _) = self.number()?;
    let (nb_min, _) = self.natural()?;
    let (nb_max, _) = self.natural()?;
    self
      .doc
      .types
      .add(LotType {
        no,
        benefit,
        area_min,
        area_max,
        nb_min: nb_min as usize,
        nb_max: nb_max as usize,
      })
      .map_err(|e| e.at(line))
  }

  fn floor_definition(&mut self, line: usize) -> Result<()> {
    let (no, _) = self.natural()?;
    self.floor = self
      .doc
      .geometry
      .add_floor(Floor::new(no))
      .map_err(|e| e.at(line))?;
    Ok(())
  }

  fn point_definition(&mut self, line: usize) -> Result<()> {
    let (no, _) = self.natural()?;
    let (x, _) = self.number()?;
    let (y, _) = self.number()?;
    self
      .doc
      .geometry
      .add_point(Point {
        no,
        x,
        y,
        floor: self.floor,
      })
      .map_err(|e| e.at(line))?;
    Ok(())
  }

  fn element_definition(&mut self, line: usize) -> Result<()> {
    let (no, _) = self.natural()?;
    let (count, _) = self.natural()?;
    let points = self.numbers_until_command();
    if points.len() != count as usize {
      return Err(
        Error::CountMismatch {
          kind: "element",
          no,
          items: "points",
        }
        .at(line),
      );
    }
    let mut elt = Element::new(no, self.floor);
    for (value, value_line) in points {
      if value.fract() != 0.0 || value < 0.0 {
        return Err(Error::ExpectedNatural(value).at(value_line));
      }
      let point = self
        .doc
        .geometry
        .point_by_no(value as u32)
        .ok_or_else(|| Error::UnknownPoint(value as u32).at(value_line))?;
      elt.add_point(point);
    }
    self.doc.geometry.add_element(elt).map_err(|e| e.at(line))?;
    Ok(())
  }

  fn flag(&mut self, line: usize, set: impl FnOnce(&mut Element)) -> Result<()> {
    let (no, _) = self.natural()?;
    let elt = self
      .doc
      .geometry
      .element_by_no(no)
      .ok_or_else(|| Error::UnknownElement(no).at(line))?;
    set(&mut self.doc.geometry.elements[elt]);
    Ok(())
  }

  fn bonus(&mut self, line: usize) -> Result<()> {
    let (no, _) = self.natural()?;
    let (value, _) = self.number()?;
    let elt = self
      .doc
      .geometry
      .element_by_no(no)
      .ok_or_else(|| Error::UnknownElement(no).at(line))?;
    self.doc.geometry.elements[elt].bonus = value;
    Ok(())
  }

  fn solution_definition(&mut self, _line: usize) -> Result<()> {
    let (_no, _) = self.natural()?;
    let (fitness, _) = self.number()?;
    let mut sol = Solution::new(&self.doc.geometry);
    sol.fitness = fitness;
    self.solutions.push(sol);
    Ok(())
  }

  fn lot_definition(&mut self, line: usize) -> Result<()> {
    let (no, _) = self.natural()?;
    let (_type_no, _) = self.natural()?;
    let (_lot_fitness, _) = self.number()?;
    let (count, _) = self.natural()?;
    let elements = self.numbers_until_command();
    if elements.len() != count as usize {
      return Err(
        Error::CountMismatch {
          kind: "lot",
          no,
          items: "elements",
        }
        .at(line),
      );
    }
    let Some(sol) = self.solutions.last_mut() else {
      return Err(Error::LotOutsideSolution.at(line));
    };
    for (value, value_line) in elements {
      if value.fract() != 0.0 || value < 0.0 {
        return Err(Error::ExpectedNatural(value).at(value_line));
      }
      let elt = self
        .doc
        .geometry
        .element_by_no(value as u32)
        .ok_or_else(|| Error::UnknownElement(value as u32).at(value_line))?;
      if elt >= sol.distribution.len() {
        return Err(Error::UnknownElement(value as u32).at(value_line));
      }
      sol.distribution[elt] = Some(no as usize);
    }
    Ok(())
  }
}
