use super::*;
use crate::commands::{grade, parse_answer_params};
use crate::error_map::error_code;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use mp_formula::SeededRandom;
use mp_problem::ParamMap;

fn temp_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time should be monotonic")
        .as_nanos();
    std::env::temp_dir().join(format!("mathprob-rs-{}-{}", name, nanos))
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent should be created");
    }
    fs::write(path, content).expect("file should be written");
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn answer_flags_collect_repeated_keys() {
    let params = parse_answer_params(&[
        "INP_c=1".to_string(),
        "INP_c=4".to_string(),
        "ANSWER=a=b".to_string(),
    ])
    .expect("valid flags");
    assert_eq!(params.get("INP_c"), Some(&vec!["1".to_string(), "4".to_string()]));
    assert_eq!(params.get("ANSWER"), Some(&vec!["a=b".to_string()]));

    let missing = parse_answer_params(&["ANSWER".to_string()]).expect_err("no separator");
    assert_eq!(missing.code, "CLI_ANSWER_INVALID");
    let unnamed = parse_answer_params(&["=3".to_string()]).expect_err("no key");
    assert_eq!(unnamed.code, "CLI_ANSWER_INVALID");
}

#[test]
fn collect_problem_files_walks_directories_in_order() {
    let root = temp_path("collect");
    write_file(&root.join("b").join("two.xml"), "<problem/>");
    write_file(&root.join("a").join("one.XML"), "<problem/>");
    write_file(&root.join("notes.txt"), "skip");

    let files = collect_problem_files(std::slice::from_ref(&root)).expect("scan");
    let names = files
        .iter()
        .map(|path| {
            path.strip_prefix(&root)
                .expect("under root")
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["a/one.XML".to_string(), "b/two.xml".to_string()]);

    let missing = collect_problem_files(&[root.join("absent")]).expect_err("missing path");
    assert_eq!(error_code(&missing), "CLI_SOURCE_NOT_FOUND");
}

#[test]
fn load_problem_rejects_documents_that_fall_back_to_dummy() {
    let path = temp_path("broken").join("broken.xml");
    write_file(&path, r#"<problem type="numeric"><ref-base>x.y</ref-base></problem>"#);
    let error = load_problem(&path).expect_err("dummy problem");
    assert_eq!(error_code(&error), "CLI_PROBLEM_INVALID");
}

#[test]
fn grade_reports_numeric_answers() {
    let mut template = load_problem(&fixture("numeric_sum.xml")).expect("fixture loads");
    let realization = template
        .try_realize(&mut SeededRandom::new(Some(9)), &Default::default())
        .expect("realization");
    let instance = template.install(realization);
    let total = template
        .eval_context
        .value("total")
        .and_then(|value| value.as_integer())
        .expect("total generated");

    let mut params = ParamMap::new();
    params.insert("ANSWER".to_string(), vec![total.to_string()]);
    let report = grade(&mut template, &instance, &params).expect("graded");
    assert!(report.answered);
    assert!(report.correct);
    assert_eq!(report.reference, "arith.sum");
    assert!(report
        .html
        .contains(&format!("value='{}' name='ANSWER'", total)));

    let report = grade(&mut template, &instance, &ParamMap::new()).expect("graded");
    assert!(!report.answered);
    assert!(!report.correct);
}

#[test]
fn run_cli_from_args_reports_usage_errors() {
    assert_ne!(run_cli_from_args(["mp", "unknown-command"]), 0);
    assert_ne!(run_cli_from_args(["mp", "realize"]), 0);
}

#[test]
fn run_cli_from_args_checks_fixture_files() {
    let path = fixture("choice_capital.xml");
    let code = run_cli_from_args(["mp", "check", "--strict", path.to_string_lossy().as_ref()]);
    assert_eq!(code, 0);
}
