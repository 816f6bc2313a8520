use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const PLAN: &str = r#"{
    "resource_changes": [
        {
            "address": "aws_s3_bucket.logs",
            "type": "aws_s3_bucket",
            "change": {"actions": ["create"], "before": null, "after": {"bucket": "logs"}}
        },
        {
            "address": "aws_instance.web",
            "type": "aws_instance",
            "change": {
                "actions": ["update"],
                "before": {"instance_type": "t3.small", "ami": "ami-1"},
                "after": {"instance_type": "t3.large", "ami": "ami-1"}
            }
        }
    ]
}"#;

const POLICY: &str = r#"{
    // logging buckets may be created
    "permittedCreates": [
        {"addressRegex": "aws_s3_bucket\\..*", "typeRegex": "aws_s3_bucket"},
    ],
    /* instance resizes are fine */
    "permittedUpdates": [
        {
            "addressRegex": "aws_instance\\..*",
            "typeRegex": "aws_instance",
            "permittedUpdates": [{"addressRegex": "\\.instance_type"}],
        },
    ],
}"#;

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn plangate() -> Command {
    let mut cmd = Command::cargo_bin("plangate").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn covered_plan_is_allowed() {
    let dir = TempDir::new().unwrap();
    let plan = write(&dir, "plan.json", PLAN);
    let policy = write(&dir, "policy.json", POLICY);

    plangate()
        .arg(&plan)
        .arg(&policy)
        .assert()
        .success()
        .stdout(predicate::str::contains("Create: aws_s3_bucket.logs - aws_s3_bucket"))
        .stdout(predicate::str::contains(
            "Update diff: .instance_type - t3.small != t3.large",
        ))
        .stdout(predicate::str::ends_with("Final Outcome: Allowed\n"));
}

#[test]
fn uncovered_diff_is_denied() {
    let dir = TempDir::new().unwrap();
    let plan = write(&dir, "plan.json", &PLAN.replace(r#""t3.large", "ami": "ami-1""#, r#""t3.large", "ami": "ami-2""#));
    let policy = write(&dir, "policy.json", POLICY);

    plangate()
        .arg(&plan)
        .arg(&policy)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Update diff: .ami - ami-1 != ami-2\n   DENIED"))
        .stdout(predicate::str::ends_with("Final Outcome: DENIED\n"));
}

#[test]
fn policies_are_merged_across_files() {
    let dir = TempDir::new().unwrap();
    let plan = write(&dir, "plan.json", PLAN);
    let creates = write(
        &dir,
        "creates.json",
        r#"{"permittedCreates": [{"addressRegex": ".*", "typeRegex": ".*"}]}"#,
    );
    let updates = write(
        &dir,
        "updates.json",
        r#"{"permittedUpdates": [{"addressRegex": ".*", "typeRegex": "aws_instance",
            "permittedUpdates": [{"addressRegex": ".*"}]}]}"#,
    );

    plangate().arg(&plan).arg(&creates).assert().code(1);
    plangate()
        .arg(&plan)
        .arg(&creates)
        .arg(&updates)
        .assert()
        .success();
}

#[test]
fn json_format_reports_entries() {
    let dir = TempDir::new().unwrap();
    let plan = write(&dir, "plan.json", PLAN);
    let policy = write(&dir, "policy.json", POLICY);

    let output = plangate()
        .arg("--format")
        .arg("json")
        .arg(&plan)
        .arg(&policy)
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["verdict"], "Allowed");
    assert_eq!(value["entries"][0]["decision"], "existence");
    assert_eq!(value["entries"][1]["diffs"][0]["address"], ".instance_type");
}

#[test]
fn sensitive_values_stay_out_of_when_lines() {
    let dir = TempDir::new().unwrap();
    let plan = write(
        &dir,
        "plan.json",
        r#"{"resource_changes": [{
            "address": "aws_db_instance.main",
            "type": "aws_db_instance",
            "change": {
                "actions": ["update"],
                "before": {"password": "hunter2", "size": 10},
                "after": {"password": "hunter2", "size": 20},
                "before_sensitive": {"password": true},
                "after_sensitive": {"password": true}
            }
        }]}"#,
    );
    let policy = write(
        &dir,
        "policy.json",
        r#"{"permittedUpdates": [{
            "addressRegex": ".*",
            "typeRegex": ".*",
            "permittedUpdates": [{
                "addressRegex": "\\.size",
                "when": [{"address": ".password", "beforeRegex": "hunter2"}]
            }]
        }]}"#,
    );

    plangate()
        .arg(&plan)
        .arg(&policy)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "When: Match .password: (sensitive value) == hunter2",
        ))
        .stdout(predicate::str::contains("(sensitive value) == *"));

    plangate()
        .arg("--format")
        .arg("json")
        .arg(&plan)
        .arg(&policy)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"before\": \"hunter2\"").not());
}

#[test]
fn bad_regex_fails_closed() {
    let dir = TempDir::new().unwrap();
    let plan = write(&dir, "plan.json", PLAN);
    let policy = write(
        &dir,
        "policy.json",
        r#"{"permittedCreates": [{"addressRegex": "(", "typeRegex": ".*"}]}"#,
    );

    plangate()
        .arg(&plan)
        .arg(&policy)
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("invalid regex"));
}

#[test]
fn unreadable_plan_fails_closed() {
    let dir = TempDir::new().unwrap();
    let policy = write(&dir, "policy.json", POLICY);

    plangate()
        .arg(dir.path().join("missing.json"))
        .arg(&policy)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing.json"));
}

#[test]
fn missing_policy_argument_is_a_usage_error() {
    plangate().arg("plan.json").assert().code(2);
    plangate().assert().code(2);
}
