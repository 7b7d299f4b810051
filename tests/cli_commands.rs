//! Binary-level tests: exit codes and output of the `elapi` commands.
//!
//! Every test runs the binary in a sandbox with its own project directory,
//! HOME and XDG directories, so no real configuration is picked up. None
//! of them reach the network.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new(config: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("project")).unwrap();
        std::fs::create_dir_all(dir.path().join("home")).unwrap();
        std::fs::write(dir.path().join("project").join("elapi.yaml"), config).unwrap();
        Self { dir }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    #[allow(deprecated)]
    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("elapi").unwrap();
        cmd.current_dir(self.path("project"))
            .env_clear()
            .env("HOME", self.path("home"))
            .env("XDG_CONFIG_HOME", self.path("home/.config"))
            .env("XDG_DATA_HOME", self.path("home/.local/share"));
        cmd
    }
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

// ---------------------------------------------------------------------------
// configuration
// ---------------------------------------------------------------------------

#[test]
fn show_config_reports_missing_token() {
    let sandbox = Sandbox::new("host: https://x/api/v2\n");
    let output = sandbox
        .cmd()
        .args(["show-config", "-F", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let rows = stdout_json(&output);
    let row = |key: &str| {
        rows.as_array()
            .unwrap()
            .iter()
            .find(|r| r["key"] == key)
            .cloned()
            .unwrap()
    };
    assert_eq!(row("api_token")["value"], "Missing()");
    assert_eq!(row("api_token")["source"], "DEFAULT");
    assert_eq!(row("timeout")["value"], "90");
    assert_eq!(row("timeout")["source"], "DEFAULT");
    assert_eq!(row("verify_ssl")["value"], "true");
    assert_eq!(row("enable_http2")["value"], "false");
    assert!(
        row("export_dir")["value"]
            .as_str()
            .unwrap()
            .ends_with("Downloads")
    );
    assert_eq!(row("host")["value"], "https://x/api/v2");
    assert!(
        row("host")["source"]
            .as_str()
            .unwrap()
            .ends_with("elapi.yaml")
    );
}

#[test]
fn show_config_masks_token_and_honours_overrides() {
    let sandbox = Sandbox::new("host: https://x/api/v2\napi_token: 3-abcdefghijklmnop\n");
    let output = sandbox
        .cmd()
        .args(["show-config", "-F", "json", "-O", "timeout: 5"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let text = String::from_utf8(output.stdout.clone()).unwrap();
    assert!(!text.contains("abcdefghijklmnop"));
    let rows = stdout_json(&output);
    let timeout = rows
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["key"] == "timeout")
        .unwrap();
    assert_eq!(timeout["value"], "5");
    assert_eq!(timeout["source"], "CLI");
}

#[test]
fn env_override_is_reported_as_env() {
    let sandbox = Sandbox::new("host: https://x/api/v2\n");
    let output = sandbox
        .cmd()
        .env("ELAPI_VERIFY_SSL", "false")
        .args(["show-config", "-F", "json"])
        .output()
        .unwrap();
    let rows = stdout_json(&output);
    let verify = rows
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["key"] == "verify_ssl")
        .unwrap();
    assert_eq!(verify["value"], "false");
    assert_eq!(verify["source"], "ENV");
}

#[test]
fn malformed_override_exits_1() {
    Sandbox::new("host: https://x/api/v2\n")
        .cmd()
        .args(["-O", "[1, 2]", "show-config"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid override"));
}

#[test]
fn broken_config_file_exits_1() {
    Sandbox::new("host: [unclosed\n")
        .cmd()
        .arg("show-config")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Note:"));
}

// ---------------------------------------------------------------------------
// API commands (all fail before any request is sent)
// ---------------------------------------------------------------------------

#[test]
fn get_without_token_exits_1() {
    Sandbox::new("host: https://x/api/v2\n")
        .cmd()
        .args(["get", "users"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("`api_token` is missing"))
        .stderr(predicate::str::contains("Note:"));
}

#[test]
fn unsupported_endpoint_exits_1() {
    Sandbox::new("host: https://x/api/v2\napi_token: 3-abcdefghijklmnop\n")
        .cmd()
        .args(["get", "nope"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unsupported endpoint"))
        .stderr(predicate::str::contains("experiments"));
}

#[test]
fn malformed_data_exits_1() {
    Sandbox::new("host: https://x/api/v2\napi_token: 3-abcdefghijklmnop\n")
        .cmd()
        .args(["post", "experiments", "-d", "[unclosed"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid --data"));
}

#[test]
fn malformed_query_exits_1() {
    Sandbox::new("host: https://x/api/v2\napi_token: 3-abcdefghijklmnop\n")
        .cmd()
        .args(["get", "experiments", "-q", "novalue"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("expected key=value"));
}

// ---------------------------------------------------------------------------
// cleanup
// ---------------------------------------------------------------------------

#[test]
fn cleanup_removes_tmp_dir() {
    let sandbox = Sandbox::new("");
    let tmp = sandbox.path("home/.local/share/elapi/tmp");
    std::fs::create_dir_all(&tmp).unwrap();
    std::fs::write(tmp.join("leftover"), "x").unwrap();

    sandbox
        .cmd()
        .arg("cleanup")
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed"))
        .stderr(predicate::str::contains("deprecated"));
    assert!(!tmp.exists());

    sandbox
        .cmd()
        .arg("cleanup")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to clean up"));
}

// ---------------------------------------------------------------------------
// bill-teams
// ---------------------------------------------------------------------------

fn billing_sandbox() -> Sandbox {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("bills");
    let config = format!(
        "plugin:\n  bill_teams:\n    root_directory: {}\n    unit_price: 10\n    currency: CHF\n",
        root.display()
    );
    std::fs::create_dir_all(dir.path().join("project")).unwrap();
    std::fs::create_dir_all(dir.path().join("home")).unwrap();
    std::fs::write(dir.path().join("project").join("elapi.yaml"), config).unwrap();

    let period_dir = root.join("2024").join("03");
    std::fs::create_dir_all(&period_dir).unwrap();
    write_snapshots(&period_dir);
    Sandbox { dir }
}

fn write_snapshots(dir: &Path) {
    let teams = serde_json::json!([
        {"team_id": 1, "team_name": "Alpha", "created_at": "2020-01-01 00:00:00",
         "active_members": 3, "owners": [], "on_trial": false},
        {"team_id": 2, "team_name": "Beta", "created_at": "2024-03-20 00:00:00",
         "active_members": 8, "owners": [], "on_trial": true},
    ]);
    let owners = serde_json::json!({
        "1": {"owner_name": "Ada", "owner_email": "ada@x.org", "cost_center": "CC-9"}
    });
    std::fs::write(dir.join("teams_info.json"), teams.to_string()).unwrap();
    std::fs::write(dir.join("owners_info.json"), owners.to_string()).unwrap();
}

#[test]
fn generate_table_bills_once_per_period() {
    let sandbox = billing_sandbox();
    let period = ["--year", "2024", "--month", "3"];

    let output = sandbox
        .cmd()
        .args(["bill-teams", "generate-table"])
        .args(period)
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");
    let rows = stdout_json(&output);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["team_id"], 1);
    assert_eq!(rows[0]["owner_name"], "Ada");
    assert_eq!(rows[0]["cost_center"], "CC-9");
    assert_eq!(rows[0]["total"].as_f64(), Some(30.0));
    assert_eq!(rows[0]["currency"], "CHF");
    assert_eq!(rows[0]["period"], "2024-03");

    let again = sandbox
        .cmd()
        .args(["bill-teams", "generate-table"])
        .args(period)
        .output()
        .unwrap();
    assert!(again.status.success());
    assert_eq!(stdout_json(&again), serde_json::json!([]));

    sandbox
        .cmd()
        .args(["bill-teams", "registry", "include", "1"])
        .args(period)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already billed"))
        .stderr(predicate::str::contains("Note:"));

    sandbox
        .cmd()
        .args(["bill-teams", "registry", "include", "1", "--force"])
        .args(period)
        .assert()
        .success()
        .stdout(predicate::str::contains("team 1: included"));
}

#[test]
fn dry_run_leaves_registry_unchanged() {
    let sandbox = billing_sandbox();
    let period = ["--year", "2024", "--month", "3"];

    for _ in 0..2 {
        let output = sandbox
            .cmd()
            .args(["bill-teams", "generate-table", "--dry-run"])
            .args(period)
            .output()
            .unwrap();
        assert!(output.status.success());
        assert_eq!(stdout_json(&output).as_array().unwrap().len(), 1);
    }

    let output = sandbox
        .cmd()
        .args(["bill-teams", "registry", "show"])
        .args(period)
        .output()
        .unwrap();
    let overview = stdout_json(&output);
    assert_eq!(overview[0]["billing_counter"], 0);
    assert_eq!(overview[0]["state"], "undecided");
}

#[test]
fn exempted_team_is_not_billed() {
    let sandbox = billing_sandbox();
    let period = ["--year", "2024", "--month", "3"];

    sandbox
        .cmd()
        .args(["bill-teams", "generate-table", "--dry-run"])
        .args(period)
        .assert()
        .success();
    sandbox
        .cmd()
        .args(["bill-teams", "registry", "exempt", "1"])
        .args(period)
        .assert()
        .success()
        .stdout(predicate::str::contains("team 1: exempted"));

    let output = sandbox
        .cmd()
        .args(["bill-teams", "generate-table", "-F", "csv"])
        .args(period)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(!String::from_utf8(output.stdout).unwrap().contains("Alpha"));
}

#[test]
fn owners_info_requires_configured_path() {
    billing_sandbox()
        .cmd()
        .args(["bill-teams", "owners-info"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("owners_info_path"));
}

/// A local address with nothing listening on it.
fn refused_host() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/api/v2")
}

fn unreachable_api_sandbox() -> (Sandbox, PathBuf) {
    let sandbox = Sandbox::new("");
    let root = sandbox.path("bills");
    let config = format!(
        "host: {}\napi_token: 3-abcdefghijklmnop\nunsafe_api_token_warning: false\n\
         plugin:\n  bill_teams:\n    root_directory: {}\n    unit_price: 10\n    retry_backoff: 0.01\n",
        refused_host(),
        root.display()
    );
    std::fs::write(sandbox.path("project/elapi.yaml"), config).unwrap();
    (sandbox, root)
}

#[test]
fn teams_info_gives_up_quietly_when_api_is_unreachable() {
    let (sandbox, _) = unreachable_api_sandbox();
    sandbox
        .cmd()
        .args(["bill-teams", "teams-info", "--year", "2024", "--month", "3"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("retrying"))
        .stderr(predicate::str::contains("giving up on team information"));
}

#[test]
fn store_info_writes_nothing_when_api_is_unreachable() {
    let (sandbox, root) = unreachable_api_sandbox();
    sandbox
        .cmd()
        .args(["bill-teams", "store-info", "--year", "2024", "--month", "3"])
        .assert()
        .success()
        .stderr(predicate::str::contains("giving up on team information"));
    assert!(!root.join("2024").join("03").join("teams_info.json").exists());
}
