//! `ssdtrend profile`: per-object matrix profiles over the parallel layer.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ssdtrend_core::canonical::write_files;
use ssdtrend_core::transform::install_matrix_profile;
use ssdtrend_core::{Error, ProfileOptions, Stationarity, profile_dataset};

pub struct ProfileCommandConfig<'a> {
    pub path: &'a str,
    pub config_path: Option<&'a str>,
    pub objects: Option<&'a str>,
    pub window: Option<usize>,
    pub top_k: usize,
    pub timeout_sec: Option<u64>,
    pub output_path: Option<&'a str>,
    pub install_dir: Option<&'a str>,
}

pub fn run(cmd: ProfileCommandConfig<'_>) {
    let config = super::load_config(cmd.config_path);
    let ds = Arc::new(super::read_dataset(cmd.path));
    let objects = cmd.objects.map(super::parse_object_ids).unwrap_or_default();

    let mut options = ProfileOptions::from(&config);
    options.top_k = cmd.top_k;
    if let Some(w) = cmd.window {
        options.window = w;
    }
    if let Some(t) = cmd.timeout_sec {
        options.parallel.timeout = Duration::from_secs(t);
    }

    let report = profile_dataset(Arc::clone(&ds), &objects, &options);

    println!("Matrix profile, window {}", report.window);
    for object in &report.objects {
        println!();
        println!("{} {}", object.object, object.name);
        for s in &object.series {
            let class = match s.stationarity {
                Stationarity::Stationary { p_value } | Stationarity::Varying { p_value } => {
                    format!("{} (p={p_value:.3})", s.stationarity.label())
                }
                other => other.label().to_string(),
            };
            if s.skipped.is_some() {
                println!("  {:<40} {:<24} no profile", s.field, class);
            } else {
                println!(
                    "  {:<40} {:<24} discords {:?}  motifs {:?}",
                    s.field,
                    class,
                    s.discords,
                    s.motifs.iter().map(|m| (m.index, m.neighbor)).collect::<Vec<_>>()
                );
            }
        }
    }
    if !report.timed_out.is_empty() {
        println!();
        println!("Timed out:");
        for uid in &report.timed_out {
            println!("  {uid}");
        }
    }

    if let Some(path) = cmd.output_path {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => super::write_json(path, &json),
            Err(e) => super::fail(&Error::from(e)),
        }
    }

    if let Some(dir) = cmd.install_dir {
        let mut installed = (*ds).clone();
        let mut count = 0;
        for object in &report.objects {
            for s in object.series.iter().filter(|s| s.skipped.is_none()) {
                if install_matrix_profile(
                    &mut installed,
                    object.object,
                    &s.field,
                    options.window,
                    options.fill,
                    options.seed,
                )
                .is_some()
                {
                    count += 1;
                }
            }
        }
        match write_files(&installed, Path::new(dir), &config.output_stem) {
            Ok(files) => println!("Installed {count} profile series into {}", files.sections.display()),
            Err(e) => super::fail(&e),
        }
    }
}
