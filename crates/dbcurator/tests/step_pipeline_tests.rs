//! End-to-end runs of curations built from the real step kinds.

mod common;

use chrono::{TimeZone, Utc};

use common::*;
use dbcurator::curation::{DatabaseInclusionStep, FastaSource, HeaderTransform, StepDescriptor};
use dbcurator::executor::RunState;
use dbcurator::fasta::{ManipulatorKind, MatchMode, TextMode};
use dbcurator::store::CurationStore;

const SPROT: &str = "http://www.example.org/downloads/sprot.fasta.gz";

fn upload_records() -> Vec<(&'static str, &'static str)> {
    vec![
        (">sp|P1|ALB_HUMAN Serum albumin", "mkwvtf"),
        (">sp|P2|ALB_MOUSE Serum albumin", "mkwvta"),
        (">sp|P3|INS_HUMAN Insulin", "malwmr"),
    ]
}

#[test]
fn test_upload_filter_and_append_decoys() {
    let harness = TestHarness::new();
    let upload = harness.write_upload("mixed.fasta", &upload_records());
    let curation = CurationBuilder::new("human_decoys")
        .upload(&upload)
        .filter("human", TextMode::Simple, MatchMode::Any)
        .decoy(ManipulatorKind::Reversal, false)
        .build();

    let result = harness.run(curation);
    assert_eq!(result.status.run_state(), RunState::Completed);

    let records = read_records(result.curation.artifact_file().unwrap());
    assert_eq!(records.len(), 4);
    assert_eq!(records[0], (">sp|P1|ALB_HUMAN Serum albumin".to_string(), "MKWVTF".to_string()));
    assert_eq!(records[1].0, ">sp|P3|INS_HUMAN Insulin");
    assert!(records[2].0.starts_with(">Reversed_sp|P1|ALB_HUMAN"));
    assert_eq!(records[2].1, "FTVWKM");
    assert_eq!(records[3].1, "RMWLAM");

    let counts: Vec<i64> = result
        .status
        .completed_step_validations()
        .iter()
        .map(|v| v.completion_count())
        .collect();
    assert_eq!(counts, vec![3, 2, 4]);
}

#[test]
fn test_overwriting_decoys_replace_targets() {
    let harness = TestHarness::new();
    let upload = harness.write_upload("mixed.fasta", &upload_records());
    let curation = CurationBuilder::new("decoys_only")
        .upload(&upload)
        .filter("MOUSE", TextMode::Regex, MatchMode::None)
        .decoy(ManipulatorKind::Scramble, true)
        .build();

    let result = harness.run(curation);
    let records = read_records(result.curation.artifact_file().unwrap());
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|(h, _)| h.starts_with(">Scrambled_")));
    let mut residues: Vec<char> = records[0].1.chars().collect();
    residues.sort_unstable();
    assert_eq!(residues.into_iter().collect::<String>(), "FKMTVW");
}

#[test]
fn test_header_transform_step_rewrites_headers() {
    let harness = TestHarness::new();
    let curation = CurationBuilder::new("renamed")
        .manual(">sp|P1|ALB_HUMAN Serum albumin", "MKV")
        .manual(">custom header", "MLL")
        .transform("uniprot accession", r"^>sp\|(\w+)\|(\S+)", ">$1 $2")
        .build();

    let result = harness.run(curation);
    assert_eq!(
        read_headers(result.curation.artifact_file().unwrap()),
        vec![">P1 ALB_HUMAN Serum albumin".to_string(), ">custom header".to_string()]
    );
}

#[test]
fn test_inclusion_downloads_and_applies_source_transform() {
    let harness = TestHarness::new();
    let mut source = FastaSource::new("Sprot", SPROT)
        .with_transform(HeaderTransform::new("uniprot", r"^>sp\|(\w+)\|", ">$1 "));
    harness.store.add_source(&mut source).unwrap();
    harness.fetcher.publish(
        SPROT,
        Some(Utc.with_ymd_and_hms(2026, 2, 3, 4, 5, 6).unwrap()),
        gzipped_fasta(&[(">sp|Q1|ONE_YEAST first", "MKV"), (">sp|Q2|TWO_YEAST second", "MAL")]),
    );

    let curation = CurationBuilder::new("yeast")
        .include("Sprot")
        .manual(">extra", "WWW")
        .build();
    let result = harness.run(curation);

    assert_eq!(result.status.run_state(), RunState::Completed);
    assert!(result.has_message("We have completed getting an archive."));
    assert_eq!(
        read_headers(result.curation.artifact_file().unwrap()),
        vec![
            ">Q1 ONE_YEAST first".to_string(),
            ">Q2 TWO_YEAST second".to_string(),
            ">extra".to_string()
        ]
    );

    // The archive entry is now part of the step's persisted configuration.
    let stored = harness.store.curation_by_short_name("yeast").unwrap().unwrap();
    match stored.steps()[0].lock().descriptor() {
        Some(StepDescriptor::DatabaseInclusion { url, source }) => {
            assert_eq!(url, "Sprot");
            assert_eq!(source.unwrap().source_url, SPROT);
        }
        other => panic!("unexpected descriptor {:?}", other),
    }
    assert_eq!(harness.fetcher.download_count(), 1);
}

#[test]
fn test_inclusion_reruns_use_the_recorded_archive() {
    let harness = TestHarness::new();
    harness.fetcher.publish(
        SPROT,
        Some(Utc.with_ymd_and_hms(2026, 2, 3, 4, 5, 6).unwrap()),
        gzipped_fasta(&[(">sp|Q1|ONE_YEAST first", "MKV")]),
    );

    let first = harness.run(CurationBuilder::new("yeast").include(SPROT).build());
    assert_eq!(first.status.run_state(), RunState::Completed);
    let second = harness.run(first.curation);
    assert_eq!(second.status.run_state(), RunState::Completed);
    assert_eq!(harness.fetcher.download_count(), 1);
    assert!(!second.has_message("We have completed getting an archive."));
}

#[test]
fn test_inclusion_of_unreachable_source_fails_the_step() {
    let harness = TestHarness::new();
    let curation = CurationBuilder::new("unreachable")
        .manual(">first", "MKV")
        .step(dbcurator::curation::StepHandle::new(DatabaseInclusionStep::new(
            "http://www.example.org/never-published.fasta",
        )))
        .build();

    let result = harness.run(curation);
    assert_eq!(result.status.run_state(), RunState::Failed { step: 2 });
    assert!(result.has_message("Step failed: Download error:"));
    assert!(harness.archive_files().is_empty());
}

#[test]
fn test_bundled_inclusion() {
    let harness = TestHarness::with_bundled(&["classpath:/contaminants.fasta"]);
    let locator = harness.write_bundled(
        "contaminants.fasta",
        &[(">CONT_TRYP trypsin", "IVGG"), (">CONT_KER keratin", "MSCR")],
    );

    let result = harness.run(CurationBuilder::new("contaminants").include(&locator).build());
    assert_eq!(result.status.run_state(), RunState::Completed);
    assert_eq!(read_records(result.curation.artifact_file().unwrap()).len(), 2);
    assert_eq!(result.curation.simple_description(), "Database contaminants");
}
