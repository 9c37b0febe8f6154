use std::collections::BTreeSet;
use std::fs;

use lc_corpus::{
    convert_bio_to_stanford, extract_gazetteer, read_bio_gazetteer, write_bio_gazetteer,
    write_empty_gazetteer, Gazetteer, GazetteerEntry, GazetteerOptions, Instance,
};

fn sample_instances() -> Vec<Instance> {
    vec![
        Instance::from_pairs([
            ("Barack", "B-PER"),
            ("Obama", "I-PER"),
            ("met", "O"),
            ("Angela", "B-PER"),
            ("Merkel", "I-PER"),
            ("in", "O"),
            ("New", "B-LOC"),
            ("York", "I-LOC"),
        ]),
        Instance::from_pairs([
            ("Obama", "B-PER"),
            ("left", "O"),
            ("New", "B-LOC"),
            ("York", "I-LOC"),
            ("in", "O"),
        ]),
    ]
}

fn entry(text: &str, label: &str) -> GazetteerEntry {
    GazetteerEntry::new(text, label)
}

#[test]
fn set_mode_deduplicates_in_first_seen_order() {
    let gaz = extract_gazetteer(&sample_instances(), &GazetteerOptions::default());
    assert!(matches!(gaz, Gazetteer::Set(_)));
    let entries: Vec<_> = gaz.iter().cloned().collect();
    assert_eq!(
        entries,
        vec![
            entry("Barack Obama", "PER"),
            entry("met", "O"),
            entry("Angela Merkel", "PER"),
            entry("in", "O"),
            entry("New York", "LOC"),
            entry("Obama", "PER"),
            entry("left", "O"),
        ]
    );
}

#[test]
fn repeat_mode_keeps_duplicates() {
    let opts = GazetteerOptions {
        repeat: true,
        ..GazetteerOptions::default()
    };
    let gaz = extract_gazetteer(&sample_instances(), &opts);
    assert_eq!(gaz.len(), 9);
    let new_york = gaz.iter().filter(|e| e.text == "New York").count();
    assert_eq!(new_york, 2);
}

#[test]
fn bio_artifact_roundtrips_entry_set() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("gaz.tab");
    let gaz = extract_gazetteer(&sample_instances(), &GazetteerOptions::default());
    write_bio_gazetteer(gaz.iter(), &path, "O").expect("write");

    let text = fs::read_to_string(&path).expect("read");
    assert!(text.starts_with("Barack B-PER\nObama I-PER\nmet O\n"));
    assert!(text.ends_with("left O\n\n"));

    let reread: BTreeSet<_> = read_bio_gazetteer(&path, "O")
        .expect("reread")
        .into_iter()
        .collect();
    let original: BTreeSet<_> = gaz.iter().cloned().collect();
    assert_eq!(reread, original);
}

#[test]
fn adjacent_spans_with_same_label_stay_separate() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("gaz.tab");
    let entries = vec![entry("New York", "LOC"), entry("Boston", "LOC")];
    write_bio_gazetteer(&entries, &path, "O").expect("write");
    assert_eq!(read_bio_gazetteer(&path, "O").expect("reread"), entries);
}

#[test]
fn stanford_conversion_emits_label_first() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let bio = dir.path().join("gaz.tab");
    let stanford = dir.path().join("gaz.tab.tmp");
    let entries = vec![entry("New York", "LOC"), entry("the", "O")];
    write_bio_gazetteer(&entries, &bio, "O").expect("write");
    let count = convert_bio_to_stanford(&bio, &stanford, "O").expect("convert");
    assert_eq!(count, 2);
    assert_eq!(
        fs::read_to_string(&stanford).expect("read"),
        "LOC New York\nO the\n"
    );
}

#[test]
fn empty_budget_yields_empty_artifacts() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let bio = dir.path().join("gaz.tab");
    let stanford = dir.path().join("gaz.tab.tmp");
    write_empty_gazetteer(&bio).expect("write");
    assert_eq!(fs::metadata(&bio).expect("meta").len(), 0);
    assert_eq!(convert_bio_to_stanford(&bio, &stanford, "O").expect("convert"), 0);
    assert_eq!(fs::read_to_string(&stanford).expect("read"), "");
}
