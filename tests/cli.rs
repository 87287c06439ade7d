use assert_cmd::Command;
use mockito::Matcher;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>World</title>
    <item>
      <title>Central banks hold rates</title>
      <link>https://news.example.com/content/1</link>
      <description>Policymakers signal patience.</description>
      <pubDate>Mon, 06 May 2024 08:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

/// Command with an isolated config dir, no user, and a non-terminal stdin.
fn headliner(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("headliner").unwrap();
    cmd.current_dir(home.path())
        .env("HEADLINER_HOME", home.path())
        .env("RUST_LOG", "off")
        .env_remove("HEADLINER_USER")
        .env_remove("HEADLINER_FEED_URL")
        .env_remove("HEADLINER_SESSION_COOKIE")
        .env_remove("HEADLINER_BROWSER_URL")
        .write_stdin("");
    cmd
}

fn as_user(home: &TempDir, user: &str) -> Command {
    let mut cmd = headliner(home);
    cmd.env("HEADLINER_USER", user);
    cmd
}

fn prefs_of(home: &TempDir, user: &str) -> Value {
    let output = as_user(home, user).args(["prefs", "get"]).output().unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

fn stored(home: &TempDir) -> Value {
    let raw = fs::read_to_string(home.path().join("credentials.json")).unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[test]
fn missing_user_without_terminal_is_a_config_error() {
    let home = TempDir::new().unwrap();

    headliner(&home)
        .args(["prefs", "get"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("HEADLINER_USER"));

    assert!(!home.path().join("credentials.json").exists());
}

#[test]
fn first_command_auto_registers_with_default_instructions() {
    let home = TempDir::new().unwrap();

    let prefs = prefs_of(&home, "alice");
    let obj = prefs.as_object().unwrap();
    assert_eq!(obj.len(), 1);
    assert!(obj["instructions"].as_str().unwrap().contains("HEADLINE"));

    let db = stored(&home);
    assert!(db["users"]["alice"]["registered"].is_string());
}

#[test]
fn registration_timestamp_survives_later_commands() {
    let home = TempDir::new().unwrap();
    prefs_of(&home, "alice");
    let first = stored(&home)["users"]["alice"]["registered"].clone();

    as_user(&home, "alice")
        .args(["prefs", "update", "tone", "dry"])
        .assert()
        .success();

    assert_eq!(stored(&home)["users"]["alice"]["registered"], first);
}

#[test]
fn set_then_update_merges_topics() {
    let home = TempDir::new().unwrap();

    as_user(&home, "bob")
        .args(["prefs", "set", r#"{"topics":["AI"]}"#])
        .assert()
        .success();
    as_user(&home, "bob")
        .args(["prefs", "update", "topics", r#"["AI","markets"]"#])
        .assert()
        .success();

    assert_eq!(prefs_of(&home, "bob"), json!({ "topics": ["AI", "markets"] }));
}

#[test]
fn non_object_preferences_are_rejected() {
    let home = TempDir::new().unwrap();

    for bad in [r#""a string""#, "42", "null", "[1,2]", "not json"] {
        as_user(&home, "carl")
            .args(["prefs", "set", bad])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("Validation Error"));
    }

    as_user(&home, "carl")
        .args(["prefs", "set", "{}"])
        .assert()
        .success();
    assert_eq!(prefs_of(&home, "carl"), json!({}));
}

#[test]
fn reset_restores_exact_defaults_and_clears_context() {
    let home = TempDir::new().unwrap();
    let defaults = prefs_of(&home, "dana");

    as_user(&home, "dana")
        .args(["prefs", "set", r#"{"a":1}"#])
        .assert()
        .success();
    as_user(&home, "dana")
        .args(["prefs", "update", "b", "2"])
        .assert()
        .success();
    as_user(&home, "dana")
        .args(["user", "reset"])
        .assert()
        .success();

    assert_eq!(prefs_of(&home, "dana"), defaults);
    assert_eq!(stored(&home)["users"]["dana"]["context"], json!({}));
}

#[test]
fn delete_then_reset_reports_not_found() {
    let home = TempDir::new().unwrap();
    prefs_of(&home, "eve");

    as_user(&home, "eve")
        .args(["user", "delete"])
        .assert()
        .success();
    assert!(stored(&home)["users"].get("eve").is_none());

    as_user(&home, "eve")
        .args(["user", "reset"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("eve"));
    as_user(&home, "eve")
        .args(["user", "delete"])
        .assert()
        .code(4);
}

#[test]
fn corrupt_credentials_file_is_treated_as_empty() {
    let home = TempDir::new().unwrap();
    fs::write(home.path().join("credentials.json"), "{ this is not json").unwrap();

    let prefs = prefs_of(&home, "fay");
    assert!(prefs["instructions"].as_str().unwrap().contains("HEADLINE"));
    assert!(stored(&home)["users"]["fay"].is_object());
}

#[test]
fn user_list_marks_current_user() {
    let home = TempDir::new().unwrap();
    prefs_of(&home, "gus");
    prefs_of(&home, "hal");

    as_user(&home, "hal")
        .args(["user", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gus"))
        .stdout(predicate::str::contains("hal *"));
}

#[test]
fn user_list_needs_no_identity() {
    let home = TempDir::new().unwrap();
    prefs_of(&home, "gus");

    headliner(&home)
        .args(["user", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gus"))
        .stdout(predicate::str::contains("*").not());
}

#[test]
fn hand_edited_records_survive_a_new_registration() {
    let home = TempDir::new().unwrap();
    fs::write(
        home.path().join("credentials.json"),
        r#"{"users":{
            "alice":{"registered":"2024-01-01T09:00:00Z","preferences":{"tone":"dry"}},
            "bob":{"registered":"2024-03-01T12:00:00","preferences":{"topics":["AI"]},"context":[]},
            "dee":{"preferences":{"lang":"de"}}
        }}"#,
    )
    .unwrap();

    prefs_of(&home, "carol");

    let db = stored(&home);
    assert_eq!(db["users"]["alice"]["preferences"], json!({ "tone": "dry" }));
    assert_eq!(db["users"]["alice"]["registered"], json!("2024-01-01T09:00:00Z"));
    assert_eq!(db["users"]["bob"]["preferences"], json!({ "topics": ["AI"] }));
    assert_eq!(db["users"]["bob"]["registered"], json!("2024-03-01T12:00:00Z"));
    assert_eq!(db["users"]["dee"]["preferences"], json!({ "lang": "de" }));
    assert!(db["users"]["dee"]["registered"].is_string());
    assert!(db["users"]["carol"].is_object());
}

#[test]
fn headlines_print_preferences_and_record_context() {
    let home = TempDir::new().unwrap();
    let mut server = mockito::Server::new();
    let _feed = server
        .mock("GET", "/world")
        .match_query(Matcher::UrlEncoded("format".into(), "rss".into()))
        .with_status(200)
        .with_header("content-type", "application/rss+xml")
        .with_body(FEED)
        .create();

    as_user(&home, "ida")
        .env("HEADLINER_FEED_URL", server.url())
        .args(["headlines", "--section", "world"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# Preferences for ida"))
        .stdout(predicate::str::contains("1. Central banks hold rates"))
        .stdout(predicate::str::contains("https://news.example.com/content/1"));

    let last = &stored(&home)["users"]["ida"]["context"]["last_headlines"];
    assert_eq!(last["section"], json!("world"));
    assert_eq!(last["count"], json!(1));
}

#[test]
fn headlines_json_output() {
    let home = TempDir::new().unwrap();
    let mut server = mockito::Server::new();
    let _feed = server
        .mock("GET", "/")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(FEED)
        .create();

    let output = as_user(&home, "jon")
        .env("HEADLINER_FEED_URL", server.url())
        .args(["headlines", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let body: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["user"], json!("jon"));
    assert_eq!(body["section"], json!("home"));
    assert_eq!(body["headlines"][0]["title"], json!("Central banks hold rates"));
    assert!(body["preferences"]["instructions"].is_string());
}

#[test]
fn unknown_section_is_a_validation_error() {
    let home = TempDir::new().unwrap();

    as_user(&home, "kim")
        .args(["headlines", "--section", "sport"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Unknown section"));
}

#[test]
fn feed_failure_is_a_collaborator_error() {
    let home = TempDir::new().unwrap();
    let mut server = mockito::Server::new();
    let _feed = server
        .mock("GET", "/markets")
        .match_query(Matcher::Any)
        .with_status(500)
        .create();

    as_user(&home, "lee")
        .env("HEADLINER_FEED_URL", server.url())
        .args(["headlines", "-s", "markets"])
        .assert()
        .code(5);
}

#[test]
fn sections_needs_no_user() {
    let home = TempDir::new().unwrap();

    headliner(&home)
        .arg("sections")
        .assert()
        .success()
        .stdout(predicate::str::contains("technology"));
}
