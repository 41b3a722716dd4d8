//! Command-line shell around the solver: read a problem file, iterate
//! until the search stops, print the running statistics, write the ranked
//! solutions back out.

use std::{
  io::{self, Write},
  path::PathBuf,
};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use lotir::abi;

#[derive(Parser, Debug)]
#[command(version, about = "Partition building floors into housing lots")]
struct Args {
  /// Input problem file; prompted for when absent.
  input: Option<PathBuf>,

  /// Output file; defaults to `<input stem>_solved.abi`.
  output: Option<PathBuf>,

  /// Seed for the random stream, for reproducible runs.
  #[arg(long)]
  seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  let args = Args::parse();
  let input = match args.input {
    Some(path) => path,
    None => PathBuf::from(prompt("Type the input file name: ")?),
  };
  let input = with_abi_extension(input);
  let output = args
    .output
    .map(with_abi_extension)
    .unwrap_or_else(|| solved_name(&input));
  println!("Input file: {}", input.display());
  println!("Output file: {}", output.display());

  let document =
    abi::read(&input).with_context(|| format!("cannot read {}", input.display()))?;
  let mut solver = document.into_solver(args.seed);

  println!();
  println!("             statistics              ");
  println!("-------------------------------------");
  println!(" iter   minimum    average    maximum");
  println!("-------------------------------------");
  while solver.run() {
    let it = solver.current_iteration();
    // the seeding phase is long; sample it every 1000 iterations
    let seeding = solver.init_it().is_some_and(|init| it < init);
    if !seeding || it % 1000 == 0 {
      let stats = solver.population().last_stats();
      println!(
        "{:>5} {:>8.2} {:>10.2} {:>10.2}",
        it, stats.min, stats.mean, stats.max
      );
    }
  }
  println!("-------------------------------------");

  abi::write(&output, &solver)
    .with_context(|| format!("cannot write {}", output.display()))?;
  println!();
  println!("Results saved in {}", output.display());
  Ok(())
}

fn prompt(message: &str) -> anyhow::Result<String> {
  print!("{message}");
  io::stdout().flush()?;
  let mut answer = String::new();
  io::stdin().read_line(&mut answer)?;
  let answer = answer.trim();
  anyhow::ensure!(!answer.is_empty(), "no file name given");
  Ok(answer.to_string())
}

// appends the `.abi` extension when it is missing
fn with_abi_extension(path: PathBuf) -> PathBuf {
  if path.extension().is_some_and(|ext| ext == "abi") {
    path
  } else {
    let mut name = path.into_os_string();
    name.push(".abi");
    PathBuf::from(name)
  }
}

// `foo.abi` -> `foo_solved.abi`
fn solved_name(input: &PathBuf) -> PathBuf {
  let name = input.to_string_lossy();
  let stem = name.strip_suffix(".abi").unwrap_or(&name);
  PathBuf::from(format!("{stem}_solved.abi"))
}
