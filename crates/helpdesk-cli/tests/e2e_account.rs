//! E2E tests for identity, token storage and configuration layering.

mod support;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use predicates::prelude::*;
use support::{MockDesk, hd, hd_json};
use tempfile::TempDir;

fn jwt(user_id: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"user_id":{user_id}}}"#));
    format!("{header}.{payload}.sig")
}

#[test]
fn whoami_reads_profile_from_token() {
    let desk = MockDesk::start("open", "alice");
    let dir = TempDir::new().unwrap();

    let (ok, json, stderr) = hd_json(
        hd(dir.path(), &desk.base)
            .env("HELPDESK_TOKEN", jwt(7))
            .args(["whoami", "--json"]),
    );
    assert!(ok, "whoami failed: {stderr}");
    assert_eq!(json["profile"]["username"], "alice");
    assert_eq!(json["source"], "token");
    assert_eq!(desk.requests("GET", "/details/personal_details/7/").len(), 1);
}

#[test]
fn user_env_skips_profile_lookup() {
    let desk = MockDesk::start("open", "alice");
    let dir = TempDir::new().unwrap();

    hd(dir.path(), &desk.base)
        .env("HELPDESK_USER", "carol")
        .env("FORMAT", "text")
        .arg("whoami")
        .assert()
        .success()
        .stdout("carol\n");
    assert!(desk.seen().is_empty());
}

#[test]
fn missing_token_is_reported_with_hint() {
    let desk = MockDesk::start("open", "alice");
    let dir = TempDir::new().unwrap();

    hd(dir.path(), &desk.base)
        .env_remove("HELPDESK_TOKEN")
        .arg("whoami")
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1003"))
        .stderr(predicate::str::contains("hd token set"));
    assert!(desk.seen().is_empty());
}

#[test]
fn stored_token_is_used_and_cleared() {
    let desk = MockDesk::start("open", "alice");
    let dir = TempDir::new().unwrap();

    hd(dir.path(), &desk.base)
        .env_remove("HELPDESK_TOKEN")
        .args(["token", "set", &jwt(7)])
        .assert()
        .success()
        .stdout(predicate::str::contains("Token saved"));
    assert!(dir.path().join("credentials.toml").exists());

    let (ok, json, stderr) = hd_json(
        hd(dir.path(), &desk.base)
            .env_remove("HELPDESK_TOKEN")
            .args(["whoami", "--json"]),
    );
    assert!(ok, "whoami failed: {stderr}");
    assert_eq!(json["profile"]["username"], "alice");

    hd(dir.path(), &desk.base)
        .args(["token", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Token removed"));
    hd(dir.path(), &desk.base)
        .args(["token", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No token was stored"));
}

#[test]
fn config_file_supplies_url_user_and_output() {
    let desk = MockDesk::start("open", "alice");
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        format!("api_url = \"{}\"\noutput = \"json\"\nuser = \"alice\"\n", desk.base),
    )
    .unwrap();

    let mut cmd = hd(dir.path(), &desk.base);
    cmd.env_remove("HELPDESK_API_URL");
    let (ok, json, stderr) = hd_json(cmd.arg("whoami"));
    assert!(ok, "whoami failed: {stderr}");
    assert_eq!(json["source"], "config");
    assert_eq!(json["profile"]["username"], "alice");
}

#[test]
fn api_url_flag_beats_env() {
    let desk = MockDesk::start("open", "alice");
    let dir = TempDir::new().unwrap();

    hd(dir.path(), "http://127.0.0.1:9/")
        .args(["choices", "--api-url", &desk.base, "--json"])
        .assert()
        .success();
    assert_eq!(desk.requests("GET", "/ticket/ticket/choices/").len(), 1);
}

#[test]
fn malformed_config_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.toml"), "api_url = [").unwrap();

    hd(dir.path(), "http://127.0.0.1:9/")
        .arg("choices")
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1002"));
}

#[test]
fn completions_are_generated_offline() {
    let dir = TempDir::new().unwrap();
    hd(dir.path(), "http://127.0.0.1:9/")
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_hd()"))
        .stdout(predicate::str::contains("start-work"));
}
