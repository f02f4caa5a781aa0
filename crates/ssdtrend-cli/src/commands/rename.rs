//! `ssdtrend rename`: bring legacy snapshot names onto the clock convention.

use std::path::Path;

use ssdtrend_core::{Error, normalize_legacy_name};

pub fn run(dir: &str, dry_run: bool) {
    let root = Path::new(dir);
    let entries = std::fs::read_dir(root).unwrap_or_else(|e| super::fail(&Error::io(root, e)));

    let mut renames: Vec<(String, String)> = entries
        .flatten()
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            normalize_legacy_name(&name).map(|new| (name, new))
        })
        .collect();
    renames.sort();

    if renames.is_empty() {
        println!("No legacy snapshot names in {dir}");
        return;
    }

    let mut done = 0;
    for (old, new) in &renames {
        let target = root.join(new);
        if target.exists() {
            eprintln!("  skip {old}: {new} already exists");
            continue;
        }
        if dry_run {
            println!("  {old} -> {new}");
            continue;
        }
        match std::fs::rename(root.join(old), &target) {
            Ok(()) => {
                println!("  {old} -> {new}");
                done += 1;
            }
            Err(e) => eprintln!("  {old}: {e}"),
        }
    }
    if !dry_run {
        println!("Renamed {done} of {} file(s)", renames.len());
    }
}
