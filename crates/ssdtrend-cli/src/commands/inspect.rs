//! `ssdtrend inspect`: summarise a canonical file.

use ssdtrend_core::validity::DEFAULT_VALIDITY_THRESHOLD;
use ssdtrend_core::{Dataset, Domain, Error, ObjectId, ValidityGate, extract_device_signature};

pub fn run(path: &str, object: Option<&str>, header: Option<&str>, json: bool) {
    let ds = super::read_dataset(path);
    if json {
        let Some(o) = object else {
            eprintln!("--json needs --object");
            std::process::exit(1);
        };
        let uid = super::parse_object_id(o);
        let Some(obj) = ds.object(uid) else {
            eprintln!("{uid} is not in the dataset");
            std::process::exit(1);
        };
        match serde_json::to_string_pretty(&obj.to_tree()) {
            Ok(text) => println!("{text}"),
            Err(e) => super::fail(&Error::from(e)),
        }
        return;
    }
    let timestamps = ds.timestamps();

    println!("{path}");
    println!(
        "  {} snapshot(s), {} objects, {} fields",
        ds.snapshot_count(),
        ds.object_count(),
        ds.schema().field_count()
    );
    if let (Some(first), Some(last)) = (timestamps.first(), timestamps.last()) {
        println!("  {first} .. {last}");
    }

    let verdict = ValidityGate::new(DEFAULT_VALIDITY_THRESHOLD).evaluate(&ds);
    println!(
        "  validity gate at {:.2}: {} ({} empty field(s))",
        verdict.threshold,
        if verdict.accepted { "accepted" } else { "rejected" },
        verdict.broken.len()
    );
    for o in verdict.failing_objects() {
        println!("    {} {}/{} empty", o.object, o.broken, o.fields);
    }

    if let Some(h) = header {
        let extraction = extract_device_signature(&ds, super::parse_object_id(h));
        println!();
        println!("Header {}: payload {:?}", extraction.header_uid, extraction.validity);
        if let Some(sig) = extraction.signature {
            println!("  status      {}", sig.status());
            for (label, value) in [
                ("failure", sig.failure_mode),
                ("fw", sig.fw_revision),
                ("bl", sig.bl_revision),
                ("serial", sig.serial_number),
            ] {
                if let Some(v) = value {
                    println!("  {label:<11} {v}");
                }
            }
        }
    }

    match object {
        Some(o) => show_object(&ds, super::parse_object_id(o)),
        None => {
            println!();
            println!("{:<16} {:<28} {:>7}", "Object", "Name", "Fields");
            println!("{}", "-".repeat(53));
            for obj in ds.objects() {
                println!(
                    "{:<16} {:<28} {:>7}",
                    obj.uid.to_string(),
                    obj.name,
                    obj.fields.len()
                );
            }
        }
    }
}

fn show_object(ds: &Dataset, uid: ObjectId) {
    let Some(obj) = ds.object(uid) else {
        eprintln!("{uid} is not in the dataset");
        std::process::exit(1);
    };
    println!();
    println!("{} {} (ref {})", obj.uid, obj.name, obj.reference.as_deref().unwrap_or("-"));
    println!("{:<40} {:<12} {:>9} {:<20}", "Field", "Domain", "Observed", "Last");
    println!("{}", "-".repeat(84));
    for (path, series) in &obj.fields {
        let domain = ds.schema().domain(uid, path).unwrap_or(Domain::Unknown);
        let observed = series.iter().filter(|r| r.is_observed()).count();
        let last = series
            .iter()
            .rev()
            .find(|r| r.is_observed())
            .map(|r| r.to_string())
            .unwrap_or_default();
        println!(
            "{:<40} {:<12} {:>4}/{:<4} {:<20}",
            path,
            domain.label(),
            observed,
            series.len(),
            last
        );
    }
}
