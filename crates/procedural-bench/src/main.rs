use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{ArgAction, Parser, ValueEnum};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use procedural_interpreter::{Interpreter, ReturnKind};
use procedural_syntax::ast::*;
use procedural_syntax::Error;

#[derive(Parser, Debug)]
#[command(name = "procedural-bench", about = "Measure call/return throughput per return kind")]
struct Cli {
    /// Return kind(s) to benchmark. If omitted, runs all of them.
    #[arg(short = 'k', long = "kind", value_enum, action = ArgAction::Append)]
    kinds: Vec<KindArg>,

    /// Iterations per kind (measured)
    #[arg(short = 'n', long = "iterations", default_value_t = 10)]
    iterations: u32,

    /// Warmup iterations (not measured)
    #[arg(short = 'w', long = "warmup", default_value_t = 2)]
    warmup: u32,

    /// Function calls per iteration
    #[arg(long = "calls", default_value_t = 10_000)]
    calls: i64,

    /// Blocks wrapped around the `return` inside the called function
    #[arg(long = "depth", default_value_t = 3)]
    depth: usize,

    /// Output JSON file path; default: benchmark/results/<timestamp>.json
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// List benchmark cases and exit
    #[arg(long = "list", default_value_t = false)]
    list: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum KindArg {
    Reference,
    Integer,
    Float,
    Boolean,
    Unit,
}

impl From<KindArg> for ReturnKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Reference => ReturnKind::Reference,
            KindArg::Integer => ReturnKind::Integer,
            KindArg::Float => ReturnKind::Float,
            KindArg::Boolean => ReturnKind::Boolean,
            KindArg::Unit => ReturnKind::Unit,
        }
    }
}

#[derive(Debug, Serialize)]
struct BenchResult {
    kind: String,
    iterations: u32,
    calls: i64,
    depth: usize,
    avg_ms: f64,
    min_ms: f64,
    max_ms: f64,
    ns_per_call: f64,
    returns_caught: u64,
}

#[derive(Debug, Serialize)]
struct OutputDoc {
    timestamp: String,
    procedural_version: String,
    benchmarks: Vec<BenchResult>,
}

fn workspace_root() -> PathBuf {
    // crates/procedural-bench -> crates -> root
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest
        .ancestors()
        .nth(2)
        .map(Path::to_path_buf)
        .unwrap_or(manifest)
}

fn return_stmt(kind: ReturnKind) -> Stmt {
    match kind {
        ReturnKind::Reference => ret(ident("payload")),
        ReturnKind::Integer => ret(ident("i")),
        ReturnKind::Float => ret(float(0.5)),
        ReturnKind::Boolean => ret(lt(ident("i"), int(0))),
        ReturnKind::Unit => ret_unit(),
    }
}

/// fun produce(i): <depth blocks> return <kind> end
/// let payload = [1, 2, 3]
/// let k = 0
/// while k < calls: produce(k) k = k + 1 end
fn build_program(kind: ReturnKind, calls: i64, depth: usize) -> Program {
    let produce = Function::new(
        "produce",
        vec![Param::new("i")],
        nest_blocks(depth, vec![return_stmt(kind)]),
    );
    Program::new(vec![
        Item::Function(produce),
        Item::Stmt(let_("payload", Expr::List(vec![int(1), int(2), int(3)]))),
        Item::Stmt(let_("k", int(0))),
        Item::Stmt(while_(
            lt(ident("k"), int(calls)),
            vec![
                expr_stmt(call("produce", vec![ident("k")])),
                assign("k", add(ident("k"), int(1))),
            ],
        )),
    ])
}

fn run_once(kind: ReturnKind, calls: i64, depth: usize) -> Result<u64, Error> {
    let mut interp = Interpreter::new();
    interp.run(build_program(kind, calls, depth))?;
    Ok(interp.stats().returns(kind))
}

fn measure(kind: ReturnKind, cli: &Cli) -> Result<BenchResult, Error> {
    for _ in 0..cli.warmup {
        run_once(kind, cli.calls, cli.depth)?;
    }

    let mut samples = Vec::with_capacity(cli.iterations as usize);
    let mut returns_caught = 0;
    for i in 0..cli.iterations {
        let t = Instant::now();
        returns_caught = run_once(kind, cli.calls, cli.depth)?;
        let ms = dur_ms(t.elapsed());
        debug!(%kind, iteration = i, ms, "iteration finished");
        samples.push(ms);
    }

    let (avg, min, max) = stats(&samples);
    let ns_per_call = if cli.calls > 0 { avg * 1_000_000.0 / cli.calls as f64 } else { 0.0 };
    Ok(BenchResult {
        kind: kind.to_string(),
        iterations: cli.iterations,
        calls: cli.calls,
        depth: cli.depth,
        avg_ms: avg,
        min_ms: min,
        max_ms: max,
        ns_per_call,
        returns_caught,
    })
}

fn dur_ms(d: std::time::Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn stats(vals: &[f64]) -> (f64, f64, f64) {
    if vals.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let min = vals.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = vals.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let avg = vals.iter().sum::<f64>() / (vals.len() as f64);
    (avg, min, max)
}

fn selected_kinds(cli: &Cli) -> Vec<ReturnKind> {
    if cli.kinds.is_empty() {
        ReturnKind::ALL.to_vec()
    } else {
        let mut kinds: Vec<ReturnKind> = Vec::new();
        for k in cli.kinds.iter().copied().map(ReturnKind::from) {
            if !kinds.contains(&k) {
                kinds.push(k);
            }
        }
        kinds
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let kinds = selected_kinds(&cli);

    if cli.list {
        println!("Benchmark cases:");
        for k in &kinds {
            println!("- {}", k);
        }
        return;
    }

    let mut results = Vec::new();
    for kind in kinds {
        let result = match measure(kind, &cli) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("{}: {}", "Runtime error".red().bold(), e.to_string().red());
                std::process::exit(1);
            }
        };
        let expected = if cli.iterations > 0 { cli.calls.max(0) as u64 } else { 0 };
        if result.returns_caught != expected {
            eprintln!(
                "{}: {} caught {} returns, expected {}",
                "Mismatch".red().bold(),
                kind,
                result.returns_caught,
                expected
            );
            std::process::exit(1);
        }

        println!(
            "{:>10}: avg={:.3}ms min={:.3}ms max={:.3}ms | {:.1}ns/call | depth={}",
            kind.as_str().cyan().bold(),
            result.avg_ms,
            result.min_ms,
            result.max_ms,
            result.ns_per_call,
            result.depth
        );
        info!(%kind, avg_ms = result.avg_ms, "benchmark finished");
        results.push(result);
    }

    let out_path = match cli.output.clone() {
        Some(p) => p,
        None => {
            // Windows-safe filename timestamp
            let ts_file = chrono::Utc::now().format("%Y-%m-%d_%H-%M-%SZ").to_string();
            workspace_root().join("benchmark/results").join(format!("{}.json", ts_file))
        }
    };

    let doc = OutputDoc {
        timestamp: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        procedural_version: env!("CARGO_PKG_VERSION").to_string(),
        benchmarks: results,
    };

    if let Err(e) = write_report(&out_path, &doc) {
        eprintln!("{}: {}", "Failed to write results".red().bold(), e);
        std::process::exit(1);
    }
    println!("\n{} {}", "Saved results to".green(), out_path.display());
}

fn write_report(path: &Path, doc: &OutputDoc) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(doc)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, json)
}
