use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const SCRUBBED: [&str; 9] = [
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "AWS_PROFILE",
    "AWS_REGION",
    "AWS_DEFAULT_REGION",
    "OPENAI_API_KEY",
    "AWS_INSIGHTS_MODEL",
    "AWS_INSIGHTS_SCAN_PERIOD",
];

fn cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("aws-insights").unwrap();
    for key in SCRUBBED {
        cmd.env_remove(key);
    }
    cmd.env("HOME", home.path())
        .env("AWS_INSIGHTS_HOME", home.path().join("state"));
    cmd
}

#[test]
fn offline_cost_explains_and_records_nothing() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .args(["cost", "--mode", "offline"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No live AWS credentials"));
    assert!(!home.path().join("state").join("jobs.json").exists());
}

#[test]
fn offline_lambda_is_skipped() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .args(["--mode", "offline", "lambda"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Offline mode"));
    assert!(!home.path().join("state").join("jobs.json").exists());
}

#[test]
fn auto_mode_without_credentials_stays_offline() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .arg("security")
        .assert()
        .success()
        .stdout(predicate::str::contains("Offline mode"));
}

#[test]
fn live_mode_without_credentials_fails() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .args(["iam", "--mode", "live"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no AWS credentials"));
}

#[test]
fn usage_on_empty_ledger() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .arg("usage")
        .assert()
        .success()
        .stdout(predicate::str::contains("No jobs recorded yet."));
}

#[test]
fn tf_without_plan_gives_guidance() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .arg("tf")
        .assert()
        .success()
        .stdout(predicate::str::contains("--tf-plan"));
}

#[test]
fn tf_plan_without_api_key_fails() {
    let home = TempDir::new().unwrap();
    let plan = home.path().join("plan.json");
    std::fs::write(&plan, r#"{"resource_changes": []}"#).unwrap();
    cmd(&home)
        .arg("tf")
        .arg("--tf-plan")
        .arg(&plan)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No API key configured"));
}

#[test]
fn rejects_unknown_mode() {
    let home = TempDir::new().unwrap();
    cmd(&home).args(["cost", "--mode", "sometimes"]).assert().failure();
}
