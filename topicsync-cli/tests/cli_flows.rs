use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use mockito::{Matcher, Mock, Server, ServerGuard};
use predicates::str::contains;
use tempfile::TempDir;

use topicsync_core::settings::{
    CHAT_TOKEN_VAR, CHAT_URL_VAR, DRY_RUN_VAR, PAGING_TOKEN_VAR, PAGING_URL_VAR,
};
use topicsync_core::{store, ChannelId, ScheduleEntry};

fn topicsync_cmd(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("topicsync").expect("topicsync binary");
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1")
        .env_remove(DRY_RUN_VAR)
        .env_remove(PAGING_TOKEN_VAR)
        .env_remove(CHAT_TOKEN_VAR);
    cmd
}

fn with_services(mut cmd: Command, server: &ServerGuard) -> Command {
    cmd.env(PAGING_TOKEN_VAR, "pd-token")
        .env(CHAT_TOKEN_VAR, "xoxb-token")
        .env(PAGING_URL_VAR, server.url())
        .env(CHAT_URL_VAR, server.url());
    cmd
}

fn seed(home: &Path, channel: &str, schedule: &str, name: &str) {
    store::add_schedule_at(home, &ChannelId::from(channel), ScheduleEntry::new(schedule, name))
        .expect("seed config");
}

fn mock_oncall(server: &mut ServerGuard, schedule: &str, user: &str) -> (Mock, Mock) {
    let users = server
        .mock("GET", format!("/schedules/{schedule}/users").as_str())
        .match_query(Matcher::Any)
        .match_header("authorization", "Token token=pd-token")
        .with_status(200)
        .with_body(format!(r#"{{"users":[{{"id":"P1","name":"{user}"}}]}}"#))
        .create();
    let overrides = server
        .mock("GET", format!("/schedules/{schedule}/overrides").as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"overrides":[]}"#)
        .create();
    (users, overrides)
}

fn mock_topic(server: &mut ServerGuard, channel: &str, topic: &str) -> Mock {
    server
        .mock("POST", "/conversations.info")
        .match_body(Matcher::UrlEncoded("channel".into(), channel.into()))
        .with_status(200)
        .with_body(format!(
            r#"{{"ok":true,"channel":{{"id":"{channel}","topic":{{"value":"{topic}"}}}}}}"#
        ))
        .create()
}

#[test]
fn config_add_list_show_remove_flow() {
    let home = TempDir::new().expect("home");

    topicsync_cmd(home.path())
        .args(["config", "add", "C1", "--schedule", "S1=Primary", "-s", "S2=Secondary"])
        .assert()
        .success()
        .stdout(contains("added schedule S1 as 'Primary' to 'C1'"));

    let assert = topicsync_cmd(home.path())
        .args(["config", "list", "--json"])
        .assert()
        .success();
    let payload: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("list json");
    let channels = payload["channels"].as_array().expect("channels array");
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0]["channel"], "C1");
    assert_eq!(channels[0]["schedules"][0]["schedule"], "S1");
    assert_eq!(channels[0]["schedules"][1]["name"], "Secondary");

    topicsync_cmd(home.path())
        .args(["config", "show", "C1"])
        .assert()
        .success()
        .stdout(contains("1. Primary  [S1]"))
        .stdout(contains("2. Secondary  [S2]"));

    topicsync_cmd(home.path())
        .args(["config", "add", "C1", "--schedule", "S1=Again"])
        .assert()
        .failure()
        .stderr(contains("already configured"));

    topicsync_cmd(home.path())
        .args(["config", "remove", "C1", "--schedule", "S2"])
        .assert()
        .success()
        .stdout(contains("(1 left)"));

    topicsync_cmd(home.path())
        .args(["config", "remove", "C1"])
        .assert()
        .success();

    topicsync_cmd(home.path())
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(contains("No channels configured."));
}

#[test]
fn malformed_schedule_argument_is_rejected() {
    let home = TempDir::new().expect("home");
    topicsync_cmd(home.path())
        .args(["config", "add", "C1", "--schedule", "S1"])
        .assert()
        .failure()
        .stderr(contains("<SCHEDULE_ID>=<Name>"));
    assert!(!store::config_path_at(home.path(), &ChannelId::from("C1")).exists());
}

#[test]
fn sync_without_credentials_fails_before_any_request() {
    let home = TempDir::new().expect("home");
    seed(home.path(), "C1", "S1", "Primary");

    topicsync_cmd(home.path())
        .env(CHAT_TOKEN_VAR, "xoxb-token")
        .arg("sync")
        .assert()
        .failure()
        .stderr(contains(PAGING_TOKEN_VAR));
}

#[test]
fn dry_run_sync_reads_but_never_writes() {
    let home = TempDir::new().expect("home");
    seed(home.path(), "C1", "S1", "Primary");

    let mut server = Server::new();
    let (users, overrides) = mock_oncall(&mut server, "S1", "Alice");
    let info = mock_topic(&mut server, "C1", "Bob | Ask in #ops");
    let set_topic = server
        .mock("POST", "/conversations.setTopic")
        .expect(0)
        .create();

    with_services(topicsync_cmd(home.path()), &server)
        .args(["sync", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("[dry-run]"))
        .stdout(contains("Primary: Alice | Ask in #ops"))
        .stdout(contains("1 dry-run"));

    users.assert();
    overrides.assert();
    info.assert();
    set_topic.assert();
}

#[test]
fn dry_run_env_var_is_honoured_by_presence() {
    let home = TempDir::new().expect("home");
    seed(home.path(), "C1", "S1", "Primary");

    let mut server = Server::new();
    let _oncall = mock_oncall(&mut server, "S1", "Alice");
    let _info = mock_topic(&mut server, "C1", "Bob | Ask in #ops");
    let set_topic = server
        .mock("POST", "/conversations.setTopic")
        .expect(0)
        .create();

    with_services(topicsync_cmd(home.path()), &server)
        .env(DRY_RUN_VAR, "")
        .arg("sync")
        .assert()
        .success()
        .stdout(contains("1 dry-run"));
    set_topic.assert();
}

#[test]
fn sync_applies_topic_and_keeps_suffix() {
    let home = TempDir::new().expect("home");
    seed(home.path(), "C1", "S1", "Primary");

    let mut server = Server::new();
    let _oncall = mock_oncall(&mut server, "S1", "Alice");
    let _info = mock_topic(&mut server, "C1", "Bob | Ask in #ops");
    let set_topic = server
        .mock("POST", "/conversations.setTopic")
        .match_header("authorization", "Bearer xoxb-token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("channel".into(), "C1".into()),
            Matcher::UrlEncoded("topic".into(), "Primary: Alice | Ask in #ops".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"ok":true}"#)
        .expect(1)
        .create();

    with_services(topicsync_cmd(home.path()), &server)
        .arg("sync")
        .assert()
        .success()
        .stdout(contains("1 applied"));
    set_topic.assert();
}

#[test]
fn one_failing_channel_fails_the_run_but_not_the_others() {
    let home = TempDir::new().expect("home");
    seed(home.path(), "C1", "S1", "Primary");
    seed(home.path(), "C2", "S9", "Broken");

    let mut server = Server::new();
    let _oncall = mock_oncall(&mut server, "S1", "Alice");
    let _missing = server
        .mock("GET", "/schedules/S9/users")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"error":{"message":"Not Found"}}"#)
        .create();
    let _missing_overrides = server
        .mock("GET", "/schedules/S9/overrides")
        .match_query(Matcher::Any)
        .with_status(404)
        .create();
    let _info = mock_topic(&mut server, "C1", "old | keep");
    let set_topic = server
        .mock("POST", "/conversations.setTopic")
        .match_body(Matcher::UrlEncoded("channel".into(), "C1".into()))
        .with_status(200)
        .with_body(r#"{"ok":true}"#)
        .expect(1)
        .create();

    with_services(topicsync_cmd(home.path()), &server)
        .arg("sync")
        .assert()
        .failure()
        .stdout(contains("invalid schedule S9"))
        .stdout(contains("1 applied"))
        .stderr(contains("1 of 2 channel(s) failed"));
    set_topic.assert();
}

#[test]
fn diff_previews_without_writing() {
    let home = TempDir::new().expect("home");
    seed(home.path(), "C1", "S1", "Primary");
    seed(home.path(), "C2", "S2", "Backup");

    let mut server = Server::new();
    let _s1 = mock_oncall(&mut server, "S1", "Alice");
    let _s2 = mock_oncall(&mut server, "S2", "Carol");
    let _c1 = mock_topic(&mut server, "C1", "Bob | Ask in #ops");
    let _c2 = mock_topic(&mut server, "C2", "Backup: Carol | quiet");
    let set_topic = server
        .mock("POST", "/conversations.setTopic")
        .expect(0)
        .create();

    with_services(topicsync_cmd(home.path()), &server)
        .arg("diff")
        .assert()
        .success()
        .stdout(contains("--- a/C1"))
        .stdout(contains("+Primary: Alice | Ask in #ops"))
        .stdout(contains("No differences for 'C2'."));
    set_topic.assert();
}

#[test]
fn unknown_channel_filter_is_an_error() {
    let home = TempDir::new().expect("home");
    seed(home.path(), "C1", "S1", "Primary");

    let server = Server::new();
    with_services(topicsync_cmd(home.path()), &server)
        .args(["sync", "--channel", "C404"])
        .assert()
        .failure()
        .stderr(contains("no config for channel 'C404'"));
}

#[test]
fn daemon_status_reports_not_running_without_socket() {
    let home = TempDir::new().expect("home");
    let assert = topicsync_cmd(home.path())
        .args(["daemon", "status"])
        .assert()
        .success();
    let payload: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("status json");
    assert_eq!(payload["running"], false);
    assert!(payload["socket"]
        .as_str()
        .expect("socket path")
        .ends_with("daemon.sock"));
}

#[test]
fn daemon_sync_without_daemon_fails() {
    let home = TempDir::new().expect("home");
    topicsync_cmd(home.path())
        .args(["daemon", "sync"])
        .assert()
        .failure()
        .stderr(contains("daemon is not running"));
}

#[test]
fn corrupt_config_file_fails_only_its_channel() {
    let home = TempDir::new().expect("home");
    seed(home.path(), "C1", "S1", "Primary");
    std::fs::write(
        store::config_path_at(home.path(), &ChannelId::from("C2")),
        "channel: C2\nschedules: oops\n",
    )
    .expect("write corrupt config");

    let assert = topicsync_cmd(home.path())
        .args(["config", "list", "--json"])
        .assert()
        .success();
    let payload: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("list json");
    assert_eq!(payload["channels"].as_array().map(Vec::len), Some(1));
    assert_eq!(payload["invalid"][0]["channel"], "C2");

    let mut server = Server::new();
    let _oncall = mock_oncall(&mut server, "S1", "Alice");
    let _info = mock_topic(&mut server, "C1", "old | keep");
    let set_topic = server
        .mock("POST", "/conversations.setTopic")
        .match_body(Matcher::UrlEncoded("channel".into(), "C1".into()))
        .with_status(200)
        .with_body(r#"{"ok":true}"#)
        .expect(1)
        .create();

    with_services(topicsync_cmd(home.path()), &server)
        .arg("sync")
        .assert()
        .failure()
        .stdout(contains("C2.yaml"))
        .stdout(contains("1 applied"))
        .stdout(contains("1 failed"))
        .stderr(contains("1 of 2 channel(s) failed"));
    set_topic.assert();
}
