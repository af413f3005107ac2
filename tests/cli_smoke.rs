//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use tempfile::TempDir;

fn write_inputs(provider: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let class = format!(
        r#"{{
            "name": "test-mc",
            "provider": "{provider}",
            "providerSpec": {{
                "metro": "ny",
                "machineType": "c3.small.x86",
                "OS": "alpine_3.13",
                "projectID": "abcdefg",
                "tags": ["kubernetes.io/cluster/shoot-test: 1", "kubernetes.io/role/test: 1"]
            }}
        }}"#
    );
    std::fs::write(dir.path().join("class.json"), class)
        .unwrap_or_else(|err| panic!("write class: {err}"));
    std::fs::write(
        dir.path().join("secret.json"),
        r#"{"apiToken": "dummy-token", "userData": "dummy-user-data"}"#,
    )
    .unwrap_or_else(|err| panic!("write secret: {err}"));
    dir
}

#[test]
fn cli_help_lists_subcommands() {
    let mut cmd = cargo_bin_cmd!("metal-provider");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(contains("create"))
        .stdout(contains("delete"))
        .stdout(contains("status"))
        .stdout(contains("list"));
}

#[test]
fn cli_rejects_foreign_provider_before_any_request() {
    let dir = write_inputs("AWS");
    let mut cmd = cargo_bin_cmd!("metal-provider");
    cmd.current_dir(dir.path());
    cmd.env("METAL_API_URL", "http://127.0.0.1:9");
    cmd.args([
        "create",
        "--class",
        "class.json",
        "--secret",
        "secret.json",
        "--machine",
        "machine-0",
    ]);

    cmd.assert()
        .failure()
        .code(1)
        .stdout("")
        .stderr(contains("code = [InvalidArgument]"))
        .stderr(contains(
            "Requested for Provider 'AWS', we only support 'EquinixMetal'",
        ));
}

#[test]
fn cli_requires_provider_id_for_delete() {
    let dir = write_inputs("EquinixMetal");
    let mut cmd = cargo_bin_cmd!("metal-provider");
    cmd.current_dir(dir.path());
    cmd.args([
        "delete",
        "--class",
        "class.json",
        "--secret",
        "secret.json",
        "--machine",
        "machine-0",
    ]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("--provider-id is required for delete"));
}

#[test]
fn cli_reports_actionable_config_errors() {
    let dir = write_inputs("EquinixMetal");
    let mut cmd = cargo_bin_cmd!("metal-provider");
    cmd.current_dir(dir.path());
    cmd.env("METAL_HTTP_TIMEOUT_SECS", "0");
    cmd.args(["list", "--class", "class.json", "--secret", "secret.json"]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("METAL_HTTP_TIMEOUT_SECS"))
        .stderr(contains("metal-provider.toml"));
}

#[test]
fn cli_reports_unparseable_config_values() {
    let dir = write_inputs("EquinixMetal");
    let mut cmd = cargo_bin_cmd!("metal-provider");
    cmd.current_dir(dir.path());
    cmd.env("METAL_HTTP_TIMEOUT_SECS", "soon");
    cmd.args(["list", "--class", "class.json", "--secret", "secret.json"]);

    cmd.assert()
        .failure()
        .code(1)
        .stdout("")
        .stderr(contains("configuration parsing failed"));
}
