use std::path::PathBuf;

use clap::Parser;
use log::info;

use sweepdd::bdd::Bdd;
use sweepdd::diagram::Diagram;
use sweepdd::dot::to_dot;
use sweepdd::exec_policy::{ExecPolicy, MemoryMode};
use sweepdd::memory::Config;
use sweepdd::types::Label;

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of queens.
    #[arg(long, value_name = "INT", default_value = "8")]
    n: usize,

    /// Memory budget in MiB.
    #[arg(long, value_name = "MIB", default_value = "128")]
    memory: usize,

    /// Always use the external-memory data structures.
    #[arg(long)]
    external: bool,

    /// Log every sweep.
    #[arg(long, short)]
    verbose: bool,

    /// Write the solution BDD in DOT format to this file.
    #[arg(long, value_name = "PATH")]
    dot: Option<PathBuf>,
}

/// Variable of the cell in row `i` and column `j`.
fn var(n: usize, i: usize, j: usize) -> Label {
    (i * n + j) as Label
}

/// A queen on `(i, j)` and none on the cells it attacks.
fn place(bdd: &Bdd, n: usize, i: usize, j: usize) -> std::io::Result<Diagram> {
    let mut literals = vec![(var(n, i, j), true)];
    for k in 0..n {
        for l in 0..n {
            if (k, l) == (i, j) {
                continue;
            }
            let attacked = k == i || l == j || k + j == i + l || k + l == i + j;
            if attacked {
                literals.push((var(n, k, l), false));
            }
        }
    }
    bdd.cube(literals)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Cli::parse();

    simplelog::TermLogger::init(
        if args.verbose {
            simplelog::LevelFilter::Debug
        } else {
            simplelog::LevelFilter::Info
        },
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();
    println!("args = {:?}", args);

    let mut policy = ExecPolicy::default();
    if args.external {
        policy = policy.with_memory_mode(MemoryMode::External);
    }
    let config = Config::default()
        .with_memory_limit(args.memory * 1024 * 1024)
        .with_policy(policy);
    let bdd = Bdd::new(config);
    println!("bdd = {:?}", bdd);

    // Encode N-queens problem:
    // - every row holds a queen
    // - a queen attacks nothing else on its row, column and diagonals
    let n = args.n;
    println!("Encoding n-queens problem with n = {}", n);
    let mut res = bdd.one()?;
    for i in 0..n {
        let mut row = bdd.zero()?;
        for j in 0..n {
            row = bdd.apply_or(&row, &place(&bdd, n, i, j)?)?;
        }
        res = bdd.apply_and(&res, &row)?;
        info!("rows 0..={}: {} nodes on {} levels", i, res.size(), res.levels());
    }

    let solutions = bdd.sat_count(&res, (n * n) as Label)?;
    println!("res of size {} has {} solutions", res.size(), solutions);

    if let Some(path) = args.dot {
        std::fs::write(&path, to_dot(&res)?)?;
        println!("Written DOT to {}", path.display());
    }

    let time_total = time_total.elapsed();
    println!("Done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}
