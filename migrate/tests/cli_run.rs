//! CLI tests for `update-migrate` commands.
//!
//! Spawns the binary in a scratch project and verifies exit codes, printed
//! notices and the run record for current, behind, succeeded and failed runs.

use std::fs;
use std::process::{Command, Output};

use update_migrate::core::types::Outcome;
use update_migrate::exit_codes;
use update_migrate::io::init::MigratePaths;
use update_migrate::io::run_log::load_run_record;
use update_migrate::test_support::TestProject;

fn migrate(project: &TestProject, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_update-migrate"))
        .current_dir(project.path())
        .args(args)
        .output()
        .expect("update-migrate")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn init_creates_config_and_refuses_rerun() {
    let temp = tempfile::tempdir().expect("tempdir");
    let init = |force: bool| {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_update-migrate"));
        cmd.current_dir(temp.path())
            .args(["init", "--name", "Acme", "--prefix", "acme"]);
        if force {
            cmd.arg("--force");
        }
        cmd.status().expect("update-migrate init")
    };

    assert_eq!(init(false).code(), Some(exit_codes::OK));
    assert!(MigratePaths::new(temp.path()).config_path.is_file());
    assert_eq!(init(false).code(), Some(exit_codes::INVALID));
    assert_eq!(init(true).code(), Some(exit_codes::OK));
}

#[test]
fn status_reports_behind_then_current() {
    let project = TestProject::new("1.1.0").expect("project");
    project.record_version("1.0.0").expect("record");
    project.write_step("1.1.0", "true").expect("step");

    let status = migrate(&project, &["status"]);
    assert_eq!(status.status.code(), Some(exit_codes::BEHIND));
    assert!(stdout(&status).contains("1 step(s) pending"));

    let run = migrate(&project, &["run"]);
    assert_eq!(run.status.code(), Some(exit_codes::OK));

    let status = migrate(&project, &["status"]);
    assert_eq!(status.status.code(), Some(exit_codes::OK));
    assert!(stdout(&status).starts_with("current: recorded 1.1.0"));
}

#[test]
fn plan_prints_pending_versions_in_order() {
    let project = TestProject::new("1.4.0").expect("project");
    project.record_version("1.2.0").expect("record");
    for version in ["1.4.0", "1.2.0", "1.10.0", "1.3.0"] {
        project.write_step(version, "true").expect("step");
    }

    let plan = migrate(&project, &["plan"]);
    assert_eq!(plan.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&plan), "1.3.0\n1.4.0\n");

    let plan = migrate(&project, &["plan", "--target", "1.10"]);
    assert_eq!(stdout(&plan), "1.3.0\n1.4.0\n1.10.0\n");
}

#[test]
fn successful_run_prints_notice_and_writes_record() {
    let project = TestProject::new("1.4.0").expect("project");
    project.record_version("1.2.0").expect("record");
    project
        .write_step("1.3.0", "echo 1.3.0 >> applied.log")
        .expect("step");
    project
        .write_step("1.4.0", "echo \"$UPDATE_MIGRATE_VERSION\" >> applied.log")
        .expect("step");

    let run = migrate(&project, &["run"]);
    assert_eq!(run.status.code(), Some(exit_codes::OK));
    assert_eq!(
        stdout(&run),
        "Acme - Success updating to version 1.4.0\n\
         Updates for version 1.3.0 applied.\n\
         Updates for version 1.4.0 applied.\n\
         All updates have been applied successfully.\n"
    );
    assert_eq!(
        fs::read_to_string(project.path().join("applied.log")).expect("log"),
        "1.3.0\n1.4.0\n"
    );
    assert_eq!(
        project.recorded_version().expect("state").as_deref(),
        Some("1.4.0")
    );

    let record = load_run_record(&MigratePaths::new(project.path()).last_run_path).expect("record");
    assert_eq!(record.outcome, Outcome::Succeeded);
    assert_eq!(record.applied, vec!["1.3.0", "1.4.0"]);

    let rerun = migrate(&project, &["run"]);
    assert_eq!(rerun.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&rerun), "Acme is current at 1.4.0\n");
}

#[test]
fn failing_step_exits_failed_with_html_notice() {
    let project = TestProject::new("1.4.0").expect("project");
    project.record_version("1.2.0").expect("record");
    project.write_step("1.3.0", "true").expect("step");
    project
        .write_step("1.4.0", "echo 'column missing' >&2; exit 3")
        .expect("step");

    let run = migrate(&project, &["run", "--html"]);
    assert_eq!(run.status.code(), Some(exit_codes::FAILED));
    let html = stdout(&run);
    assert!(html.contains("Acme - Error updating to version 1.4.0"));
    assert!(html.contains("column missing"));
    assert!(html.contains("Acme will not have any effect until the issues are resolved."));

    assert_eq!(
        project.recorded_version().expect("state").as_deref(),
        Some("1.3.0")
    );
    let paths = MigratePaths::new(project.path());
    let record = load_run_record(&paths.last_run_path).expect("record");
    assert_eq!(record.outcome, Outcome::Failed);
    assert!(!paths.lock_path.exists());
}

#[test]
fn held_lock_is_an_invocation_error() {
    let project = TestProject::new("1.1.0").expect("project");
    project.write_step("1.1.0", "true").expect("step");
    let paths = MigratePaths::new(project.path());
    fs::write(&paths.lock_path, format!("{}\n", std::process::id())).expect("lock");

    let run = migrate(&project, &["run"]);
    assert_eq!(run.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&run.stderr).contains("another migration run holds"));
    assert_eq!(project.recorded_version().expect("state"), None);
}

#[test]
fn compare_prints_ordering() {
    let project = TestProject::new("1.0.0").expect("project");
    let output = migrate(&project, &["compare", "1.5", "1.5.0"]);
    assert_eq!(stdout(&output), "=\n");
    let output = migrate(&project, &["compare", "1.10", "1.9"]);
    assert_eq!(stdout(&output), ">\n");
}
