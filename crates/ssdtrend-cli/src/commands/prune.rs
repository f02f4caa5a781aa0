//! `ssdtrend prune`: drop constant and stationary series.

use std::path::Path;

use ssdtrend_core::canonical::write_files;
use ssdtrend_core::{annotate, prune};

pub fn run(path: &str, output: &str, stem: &str, p_value: f64, dry_run: bool) {
    if !(p_value > 0.0 && p_value < 1.0) {
        eprintln!("--p-value must lie in (0, 1), got {p_value}");
        std::process::exit(1);
    }
    let ds = super::read_dataset(path);
    let report = annotate(&ds, p_value);

    println!("Stationarity at p > {p_value}");
    for (label, count) in report.counts() {
        println!("  {label:<12} {count:>6}");
    }

    let prunable: Vec<_> = report.prunable().collect();
    if dry_run {
        println!();
        for e in &prunable {
            println!("  would drop {}.{} ({})", e.object, e.field, e.class.label());
        }
        return;
    }

    let pruned = prune::prune(&ds, p_value);
    match write_files(&pruned, Path::new(output), stem) {
        Ok(files) => {
            println!();
            println!("Dropped {} series", prunable.len());
            println!("  {}", files.sections.display());
            println!("  {}", files.rows.display());
        }
        Err(e) => super::fail(&e),
    }
}
