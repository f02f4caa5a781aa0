pub mod forecast;
pub mod ingest;
pub mod inspect;
pub mod nlog;
pub mod profile;
pub mod prune;
pub mod rename;

use std::path::Path;

use ssdtrend_core::{Dataset, Error, ObjectId, PipelineConfig};

/// Print `err` and exit with its documented code.
pub fn fail(err: &Error) -> ! {
    eprintln!("Error: {err}");
    std::process::exit(err.exit_code());
}

/// Load the pipeline configuration, or defaults when no file is given.
pub fn load_config(path: Option<&str>) -> PipelineConfig {
    match path {
        Some(p) => PipelineConfig::load(Path::new(p)).unwrap_or_else(|e| fail(&e)),
        None => PipelineConfig::default(),
    }
}

/// Read a canonical `.ini` or `.tsv` file.
pub fn read_dataset(path: &str) -> Dataset {
    ssdtrend_core::read_path(Path::new(path)).unwrap_or_else(|e| fail(&e))
}

/// Parse one object id, exiting on a bad value.
pub fn parse_object_id(s: &str) -> ObjectId {
    s.parse().unwrap_or_else(|e: String| {
        eprintln!("{e}");
        std::process::exit(1);
    })
}

/// Parse a comma-separated object id list.
pub fn parse_object_ids(list: &str) -> Vec<ObjectId> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_object_id)
        .collect()
}

/// Write `json` to `path`, reporting where it went.
pub fn write_json(path: &str, json: &str) {
    match std::fs::write(path, json) {
        Ok(()) => println!("Results written to {path}"),
        Err(e) => fail(&Error::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_ids() {
        assert_eq!(
            parse_object_ids("uid-7, 240,,uid-9"),
            vec![ObjectId(7), ObjectId(240), ObjectId(9)]
        );
        assert!(parse_object_ids("").is_empty());
    }
}
