//! End-to-end tests over small on-disk corpora.

use std::fs;
use std::path::Path;

use ssdtrend_core::adapter::{Transform, split};
use ssdtrend_core::clock::SnapshotStamp;
use ssdtrend_core::dump::DumpParser;
use ssdtrend_core::validity::ERROR_LOG_FILE;
use ssdtrend_core::{
    DatasetBuilder, Domain, Error, FillPolicy, ModelSurface, MpOutcome, ObjectId, PayloadValidity,
    PipelineConfig, Reading, SplitRatios, TIMESTAMP_UID, ValidityGate, corpus, matrix_profile_of,
    read_path, read_rows, read_sections, write_rows, write_sections,
};

const FOO: &str = "FooObj, Core 0, Uid 7, Major 1, Minor 0, Data Area 0, byte Size 16, ref-xyz";

fn write_corpus(dir: &Path, snapshots: &[(&str, String)]) {
    for (name, text) in snapshots {
        fs::write(dir.join(name), text).unwrap();
    }
}

fn config(input: &Path, output: &Path) -> PipelineConfig {
    PipelineConfig {
        snapshot_directory: input.to_path_buf(),
        output_directory: output.to_path_buf(),
        noise_seed: Some(1),
        ..Default::default()
    }
}

#[test]
fn scenario_a_single_snapshot() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_corpus(
        input.path(),
        &[(
            "drive_2021-03-04-05-06-07-123456.txt",
            format!("{FOO}\n    bar : 42\n    baz : hello\n"),
        )],
    );
    let (outcome, outputs) = corpus::run(&config(input.path(), output.path())).unwrap();
    let ds = &outcome.dataset;

    assert_eq!(ds.object_count(), 2);
    let foo = ds.object(ObjectId(7)).unwrap();
    assert_eq!(foo.name, "FooObj");
    assert_eq!(foo.reference.as_deref(), Some("ref-xyz"));
    assert_eq!(foo.series("core").unwrap(), &[Reading::Int(0)]);
    assert_eq!(foo.series("bar").unwrap(), &[Reading::Int(42)]);
    assert_eq!(foo.series("baz").unwrap(), &[Reading::Text("hello".into())]);
    assert_eq!(ds.timestamps(), vec!["2021-03-04-05-06-07-123456"]);

    let ini = fs::read_to_string(&outputs.files.sections).unwrap();
    assert!(ini.contains("[uid-7]\nbar = [42]\nbaz = ['hello']\ncore = [0]\nname = FooObj\nref = ref-xyz\nuid = 7\n"));
    assert!(outputs.manifest.exists());
    assert_eq!(outcome.header.validity, PayloadValidity::Unknown);
}

#[test]
fn scenario_b_missing_field_in_second_snapshot() {
    let input = tempfile::tempdir().unwrap();
    write_corpus(
        input.path(),
        &[
            (
                "drive_2021-01-01-00-00-00-0.txt",
                format!("{FOO}\n    bar : 42\n    baz : hello\n"),
            ),
            ("drive_2021-01-02-00-00-00-0.txt", format!("{FOO}\n    bar : 43\n")),
        ],
    );
    let outcome = corpus::ingest(&config(input.path(), input.path())).unwrap();
    let ds = &outcome.dataset;
    let uid = ObjectId(7);
    assert_eq!(ds.series(uid, "bar").unwrap(), &[Reading::Int(42), Reading::Int(43)]);
    assert_eq!(
        ds.series(uid, "baz").unwrap(),
        &[Reading::Text("hello".into()), Reading::Text(String::new())]
    );
    assert_eq!(ds.series(uid, "core").unwrap(), &[Reading::Int(0), Reading::Int(0)]);
}

#[test]
fn scenario_c_domain_conflict() {
    let input = tempfile::tempdir().unwrap();
    write_corpus(
        input.path(),
        &[
            ("d_2021-01-01-00-00-00-0.txt", format!("{FOO}\n    x : 5\n")),
            ("d_2021-01-01-00-00-01-0.txt", format!("{FOO}\n    x : hello\n")),
        ],
    );
    let ds = corpus::ingest(&config(input.path(), input.path())).unwrap().dataset;
    let uid = ObjectId(7);
    let x = ds.series(uid, "x").unwrap();
    assert_eq!(x, &[Reading::Int(5), Reading::Text("hello".into())]);
    assert_eq!(ds.schema().domain(uid, "x"), Some(Domain::Enumeration));

    let out = matrix_profile_of(x, Domain::Enumeration, 1, FillPolicy::ForwardFill, Some(1));
    assert!(matches!(out, MpOutcome::Unchanged(_)));
    assert_eq!(out.apply(x), x.to_vec());
}

#[test]
fn scenario_d_validity_rejection() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let mut body = String::from(FOO);
    body.push('\n');
    for i in 0..3 {
        body.push_str(&format!("    good{i} : {i}\n"));
    }
    for i in 0..7 {
        body.push_str(&format!("    empty{i} :\n"));
    }
    let snapshots: Vec<(String, String)> = (0..3)
        .map(|s| (format!("d_2021-01-01-00-00-0{s}-0.txt"), body.clone()))
        .collect();
    for (name, text) in &snapshots {
        fs::write(input.path().join(name), text).unwrap();
    }

    let err = corpus::run(&config(input.path(), output.path())).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    let Error::Rejected(rejection) = err else {
        panic!("expected a rejection");
    };
    assert_eq!(rejection.broken.len(), 7);
    assert_eq!(rejection.snapshots_read.len(), 3);
    assert!(rejection.schema.domain(ObjectId(7), "good0").is_some());

    let report = fs::read_to_string(output.path().join(ERROR_LOG_FILE)).unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines.len(), 7);
    assert!(lines.contains(&"(uid-7, empty0)"));
    assert!(!output.path().join("time-series.ini").exists());
}

#[test]
fn scenario_e_periodic_matrix_profile() {
    let readings: Vec<Reading> = [0, 1, 2, 3, 0, 1, 2, 3, 0, 1, 2, 3]
        .iter()
        .map(|&v| Reading::Int(v))
        .collect();
    let out = matrix_profile_of(&readings, Domain::Integer, 4, FillPolicy::ForwardFill, Some(7));
    let mp = out.profile().unwrap();
    assert_eq!(mp.profile.len(), 12 - 4 + 1);
    assert!(mp.profile.iter().all(|&d| (0.0..1e-3).contains(&d)));
}

#[test]
fn scenario_f_temporal_split() {
    let v: Vec<f64> = (0..100).map(f64::from).collect();
    let s = split(&v, SplitRatios::default());
    assert_eq!((s.train.len(), s.validation.len(), s.test.len()), (70, 20, 10));
    assert_eq!(*s.train.last().unwrap(), 69.0);
    assert_eq!(*s.validation.last().unwrap(), 89.0);
    let mut all: Vec<f64> = s.train.iter().chain(s.validation).chain(s.test).copied().collect();
    all.dedup();
    assert_eq!(all.len(), 100);
}

#[test]
fn alignment_and_clock_invariants() {
    let input = tempfile::tempdir().unwrap();
    let other = "Other, Core 1, Uid 9, Major 1, Minor 0, Data Area 0, byte Size 4, r9";
    write_corpus(
        input.path(),
        &[
            ("dev_3_2021-05-01-00-00-00-0.txt", format!("{FOO}\n    a : 3\n")),
            ("dev_1_2021-05-01-00-00-00-0.txt", format!("{FOO}\n    a : 1\n")),
            ("dev_2020-12-31-23-59-59-999999.txt", format!("{other}\n    b : 7\n")),
            (
                "dev_2021-06-01-00-00-00-5.txt",
                format!("{FOO}\n    a : 4\n    c :\n        d : x\n{other}\n    b : 8\n"),
            ),
        ],
    );
    let outcome = corpus::ingest(&config(input.path(), input.path())).unwrap();
    let ds = &outcome.dataset;
    let n = outcome.snapshots.len();
    assert_eq!(n, 4);

    for object in ds.objects() {
        for (path, s) in &object.fields {
            assert_eq!(s.len(), n, "{}.{path}", object.uid);
        }
    }

    let stamps: Vec<SnapshotStamp> = ds
        .timestamps()
        .iter()
        .map(|t| SnapshotStamp::parse(t).unwrap())
        .collect();
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(stamps.len(), n);
    assert!(ds.object(TIMESTAMP_UID).is_some());
    assert_eq!(ds.timestamps()[3], "2021-06-01-00-00-00-500000");

    let a = ds.series(ObjectId(7), "a").unwrap();
    assert_eq!(a, &[Reading::Null, Reading::Int(1), Reading::Int(3), Reading::Int(4)]);
    assert_eq!(ds.series(ObjectId(7), "c.d").unwrap()[3], Reading::Text("x".into()));
    assert_eq!(ds.series(ObjectId(9), "core").unwrap()[1], Reading::Null);
}

#[test]
fn schema_only_grows() {
    let parser = DumpParser::default();
    let texts = [
        format!("{FOO}\n    a : 1\n"),
        format!("{FOO}\n    b : 2\n"),
        format!("{FOO}\n    a : x\n"),
        String::from("nothing here\n"),
    ];
    let mut builder = DatasetBuilder::new();
    let mut previous = builder.schema().clone();
    for (i, text) in texts.iter().enumerate() {
        let parsed = parser.parse(text, "mem");
        builder.add_snapshot(format!("t{i}"), &parsed.blocks);
        assert!(builder.schema().is_superset_of(&previous));
        previous = builder.schema().clone();
    }
    let (ds, diag) = builder.close();
    assert_eq!(ds.snapshot_count(), 4);
    assert_eq!(diag.absent.get(&ObjectId(7)), Some(&vec![3]));
}

#[test]
fn canonical_files_round_trip() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_corpus(
        input.path(),
        &[
            (
                "d_2021-01-01-00-00-00-0.txt",
                format!("{FOO}\n    bar : 42\n    baz : it's, odd\n    n :\n        m : 007\n"),
            ),
            ("d_2021-01-02-00-00-00-0.txt", format!("{FOO}\n    bar : -1\n")),
        ],
    );
    let (outcome, outputs) = corpus::run(&config(input.path(), output.path())).unwrap();
    let ds = outcome.dataset;

    assert_eq!(read_path(&outputs.files.sections).unwrap(), ds);
    assert_eq!(read_path(&outputs.files.rows).unwrap(), ds);
    assert_eq!(write_sections(&read_sections(&write_sections(&ds), "m").unwrap()), write_sections(&ds));
    assert_eq!(write_rows(&read_rows(&write_rows(&ds), "m").unwrap()), write_rows(&ds));

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&outputs.manifest).unwrap()).unwrap();
    assert_eq!(manifest["fingerprint"], ssdtrend_core::fingerprint(&ds));
    assert_eq!(manifest["snapshots"].as_array().unwrap().len(), 2);
}

#[test]
fn header_signature_from_corpus() {
    let input = tempfile::tempdir().unwrap();
    let header = "Header, Core 0, Uid 240, Major 1, Minor 0, Data Area 0, byte Size 64, hdr";
    write_corpus(
        input.path(),
        &[
            (
                "d_2021-01-01-00-00-00-0.txt",
                format!("{header}\n    reasonId :\n        reason :\n            reasonCode : 0\n        fwRevision : FW9\n        reserved : 1\n"),
            ),
            (
                "d_2021-01-02-00-00-00-0.txt",
                format!("{header}\n    reasonId :\n        reason :\n            reasonCode : 5\n        fwRevision : FW9\n"),
            ),
        ],
    );
    let outcome = corpus::ingest(&config(input.path(), input.path())).unwrap();
    assert_eq!(outcome.header.validity, PayloadValidity::Verified);
    let sig = outcome.header.signature.unwrap();
    assert_eq!(sig.reason_code, Some(5));
    assert_eq!(sig.status(), "1 : ASSERT detected");
    assert_eq!(sig.fw_revision.as_deref(), Some("FW9"));
}

#[test]
fn gate_is_monotone_in_threshold() {
    let input = tempfile::tempdir().unwrap();
    write_corpus(
        input.path(),
        &[(
            "d_2021-01-01-00-00-00-0.txt",
            format!("{FOO}\n    a : 1\n    b :\n    c : 3\n    d :\n"),
        )],
    );
    let ds = corpus::ingest(&config(input.path(), input.path())).unwrap().dataset;
    let mut accepted_before = true;
    for t in [1.0, 0.75, 0.5, 0.25, 0.0] {
        let accepted = ValidityGate::new(t).evaluate(&ds).accepted;
        assert!(accepted_before || !accepted);
        accepted_before = accepted;
    }
}

#[test]
fn surface_materialises_snapshot_length_vectors() {
    let input = tempfile::tempdir().unwrap();
    let snapshots: Vec<(String, String)> = (0..12)
        .map(|i| {
            (
                format!("d_2021-01-01-00-00-{i:02}-0.txt"),
                format!("{FOO}\n    wave : {}\n    mode : {}\n", i % 4, if i % 2 == 0 { "on" } else { "off" }),
            )
        })
        .collect();
    for (name, text) in &snapshots {
        fs::write(input.path().join(name), text).unwrap();
    }
    let config = config(input.path(), input.path());
    let ds = corpus::ingest(&config).unwrap().dataset;
    let surface = ModelSurface::new(&ds, &config).unwrap();

    let raw = surface.materialise(ObjectId(7), "wave", Transform::Raw).unwrap();
    assert_eq!(raw.len(), 12);
    let mp = surface
        .materialise(ObjectId(7), "wave", Transform::MatrixProfile { window: 4 })
        .unwrap();
    assert_eq!(mp.len(), 12);
    assert!(mp.iter().all(|&d| d >= 0.0));
    let mode = surface.materialise(ObjectId(7), "mode", Transform::Raw).unwrap();
    assert_eq!(&mode[..2], &[1.0, 0.0]);

    let pruned = surface.prune(0.05);
    assert_eq!(ssdtrend_core::prune::prune(&pruned, 0.05), pruned);
    assert!(pruned.series(ObjectId(7), "core").is_some());
}
