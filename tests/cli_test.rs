use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `nimbus` run from an empty project directory with an isolated home.
fn nimbus(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("nimbus").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env_remove("NIMBUS_PROVIDER_ENDPOINT")
        .env_remove("NIMBUS_CLIENT_TIMEOUT")
        .env_remove("NIMBUS_PROXY")
        .env_remove("RUST_LOG")
        .env_remove("NIMBUS_LOG");
    cmd
}

#[test]
fn test_version_flag() {
    let home = TempDir::new().unwrap();
    nimbus(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("nimbus "));
}

#[test]
fn test_version_wins_over_help() {
    let home = TempDir::new().unwrap();
    nimbus(&home)
        .args(["--version", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("nimbus "))
        .stdout(predicate::str::contains("contextual help").not());
}

#[test]
fn test_no_arguments_prints_general_help() {
    let home = TempDir::new().unwrap();
    nimbus(&home)
        .assert()
        .success()
        .stdout(predicate::str::contains("contextual help"))
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("info"));
}

#[test]
fn test_command_help() {
    let home = TempDir::new().unwrap();
    nimbus(&home)
        .args(["deploy", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--stage"))
        .stdout(predicate::str::contains("before:deploy:initialize"));
}

#[test]
fn test_nested_command_help() {
    let home = TempDir::new().unwrap();
    nimbus(&home)
        .args(["deploy", "function", "--h"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--function"));
}

#[test]
fn test_unknown_command_fails() {
    let home = TempDir::new().unwrap();
    nimbus(&home)
        .arg("destroy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Command \"destroy\" not found"))
        .stderr(predicate::str::contains("contextual help"));
}

#[test]
fn test_missing_required_option_fails() {
    let home = TempDir::new().unwrap();
    nimbus(&home)
        .args(["deploy", "function"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing required option \"--function\""));
}

#[test]
fn test_no_deploy_runs_without_provider() {
    let home = TempDir::new().unwrap();
    std::fs::write(
        home.path().join("service.toml"),
        "service = \"demo\"\n\n[functions.hello]\nhandler = \"handler.hello\"\n",
    )
    .unwrap();

    nimbus(&home).args(["deploy", "--noDeploy", "true"]).assert().success();
}

#[test]
fn test_provider_call_without_endpoint_fails() {
    let home = TempDir::new().unwrap();
    nimbus(&home)
        .arg("info")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: Provider configuration error"));
}

#[test]
fn test_version_ignores_broken_service_file() {
    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join("service.toml"), "service = [\n").unwrap();

    nimbus(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("nimbus "));
}

#[test]
fn test_help_ignores_invalid_timeout() {
    let home = TempDir::new().unwrap();
    nimbus(&home)
        .arg("--help")
        .env("NIMBUS_CLIENT_TIMEOUT", "soon")
        .assert()
        .success()
        .stdout(predicate::str::contains("contextual help"));
}

#[test]
fn test_broken_service_file_fails_dispatch() {
    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join("service.toml"), "service = [\n").unwrap();

    nimbus(&home)
        .arg("deploy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: Configuration error"))
        .stderr(predicate::str::contains("service.toml"));
}

#[test]
fn test_broken_config_file_fails_dispatch() {
    let home = TempDir::new().unwrap();
    std::fs::create_dir(home.path().join(".nimbus")).unwrap();
    std::fs::write(home.path().join(".nimbus").join("config.toml"), "retry = 3\n").unwrap();

    nimbus(&home)
        .args(["deploy", "--noDeploy", "true"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: Configuration error"))
        .stderr(predicate::str::contains("config.toml"));
}
