use assert_cmd::Command;
use std::path::{Path, PathBuf};

fn routes_csv(dir: &Path) -> PathBuf {
    let path = dir.join("routes.csv");
    std::fs::write(
        &path,
        "Source,Destination,Overlay ID,Underlay CID,Next Hop Primary,SDWAN policy\n\
         AppA,Payroll,OV1,U1,GW1,gold\n\
         AppB,Billing,OV2,U2,GW2,silver\n\
         AppC,payroll-eu,OV1,U1,GW3,gold\n",
    )
    .unwrap();
    path
}

fn sdwan_flow() -> Command {
    let mut cmd = Command::cargo_bin("sdwan-flow").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

#[test]
fn lists_destinations_sorted() {
    let dir = tempfile::tempdir().unwrap();
    let csv = routes_csv(dir.path());
    let out = stdout_of(sdwan_flow().arg(&csv).args(["--schema", "single-underlay", "--list"]));
    assert_eq!(out, "Billing\nPayroll\npayroll-eu\n");
}

#[test]
fn dot_output_for_substring_query() {
    let dir = tempfile::tempdir().unwrap();
    let csv = routes_csv(dir.path());
    let out = stdout_of(sdwan_flow().arg(&csv).args([
        "--schema",
        "single-underlay",
        "--contains",
        "PAYROLL",
        "--format",
        "dot",
    ]));
    assert!(out.starts_with("digraph flow {"));
    assert!(out.contains(r#""AppA" -> "OV1" [label="Source to Overlay"];"#));
    assert!(out.contains(r#""AppC" -> "OV1" [label="Source to Overlay"];"#));
    assert!(!out.contains("AppB"));
}

#[test]
fn html_and_details_files() {
    let dir = tempfile::tempdir().unwrap();
    let csv = routes_csv(dir.path());
    let html = dir.path().join("flow.html");
    let details = dir.path().join("details.csv");
    let out = stdout_of(
        sdwan_flow()
            .arg(&csv)
            .args(["--schema", "single-underlay", "--destination", "Billing"])
            .arg("--output")
            .arg(&html)
            .arg("--details")
            .arg(&details),
    );
    assert!(out.starts_with("1 rows matched, 4 nodes, 3 edges"));

    let page = std::fs::read_to_string(&html).unwrap();
    assert!(page.contains("Flow for destination: Billing"));
    let table = std::fs::read_to_string(&details).unwrap();
    assert!(table.starts_with("Field,Match 1\nSource,AppB\n"));
}

#[test]
fn missing_columns_fail() {
    let dir = tempfile::tempdir().unwrap();
    let csv = routes_csv(dir.path());
    let assert = sdwan_flow().arg(&csv).arg("--list").assert().failure().code(1);
    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("Missing columns in uploaded file: overlay"));
}

#[test]
fn no_match_is_a_warning() {
    let dir = tempfile::tempdir().unwrap();
    let csv = routes_csv(dir.path());
    let assert = sdwan_flow()
        .arg(&csv)
        .args(["--schema", "single-underlay", "--destination", "CRM"])
        .assert()
        .success();
    let output = assert.get_output();
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8(output.stderr.clone()).unwrap();
    assert!(stderr.contains("No matching destination found for 'CRM'"));
}

#[test]
fn usage_errors_exit_with_two() {
    sdwan_flow().assert().failure().code(2);
    sdwan_flow().args(["x.csv", "--format", "svg", "--list"]).assert().failure().code(2);
}
