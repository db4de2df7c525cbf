use std::fs;
use tempfile::tempdir;

use strata_cli::commands::{encode, inspect};
use strata_core::CodecParams;

fn encoded_dir(td: &std::path::Path) -> std::path::PathBuf {
    let tree = td.join("tree");
    fs::create_dir(&tree).unwrap();
    fs::write(tree.join("a.txt"), vec![b'a'; 3000]).unwrap();
    fs::write(tree.join("b.txt"), vec![b'b'; 3000]).unwrap();

    let frames = td.join("frames");
    encode::execute(
        tree.to_str().unwrap(),
        frames.to_str().unwrap(),
        CodecParams::new(3, 2, 512),
    )
    .unwrap();
    frames
}

#[test]
fn inspect_healthy_directory() {
    let td = tempdir().unwrap();
    let frames = encoded_dir(td.path());

    let report = inspect::inspect_dir(frames.to_str().unwrap()).unwrap();
    assert_eq!(report.skipped_files, 0);
    assert_eq!(report.survey.archives.len(), 1);

    let archive = &report.survey.archives[0];
    assert!(archive.recoverable());
    assert_eq!(archive.empty_stripes, 0);
    assert_eq!(archive.frames as u64, archive.layout.stripe_count() * 5);
}

#[test]
fn inspect_reports_first_short_stripe() {
    let td = tempdir().unwrap();
    let frames = encoded_dir(td.path());

    let mut files: Vec<_> = fs::read_dir(&frames)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().map_or(false, |e| e == "frame"))
        .collect();
    files.sort();
    // stripe 1 keeps only two of its five frames
    for path in &files[5..8] {
        fs::remove_file(path).unwrap();
    }
    fs::write(frames.join("notes.txt"), b"not a frame").unwrap();

    let report = inspect::inspect_dir(frames.to_str().unwrap()).unwrap();
    assert_eq!(report.skipped_files, 1);

    let archive = &report.survey.archives[0];
    assert_eq!(archive.first_unrecoverable, Some(1));
    let stripe = archive.stripes.iter().find(|s| s.stripe == 1).unwrap();
    assert_eq!((stripe.available, stripe.required), (2, 3));
    assert!(!stripe.recoverable);
}

#[test]
fn inspect_writes_json_report() {
    let td = tempdir().unwrap();
    let frames = encoded_dir(td.path());
    let json_path = td.path().join("report.json");

    inspect::execute(frames.to_str().unwrap(), json_path.to_str()).unwrap();

    let text = fs::read_to_string(&json_path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    let archive = &json["survey"]["archives"][0];
    assert_eq!(archive["layout"]["params"]["data_shards"], 3);
    assert!(archive["first_unrecoverable"].is_null());
}

#[test]
fn inspect_missing_directory_fails() {
    let td = tempdir().unwrap();
    let err = inspect::inspect_dir(td.path().join("nope").to_str().unwrap()).unwrap_err();
    assert_eq!(strata_cli::exit_code(&err), 2);
}
