use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread;

use assert_cmd::Command;
use predicates::str::contains;

#[test]
fn prints_help() {
    Command::cargo_bin("reporter").unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("--client"));
}

#[test]
fn config_without_report_section_fails() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("sync.yml");
    fs::write(
        &cfg,
        "global:\n  rclone:\n    paths:\n      log_dir: /tmp\n      conf_file: /etc/rclone.conf\n",
    )
    .unwrap();
    Command::cargo_bin("reporter").unwrap()
        .env("RUST_LOG", "info")
        .args(["--client", "acme", "--vm", "a1", "--status", "0", "-c"])
        .arg(&cfg)
        .assert()
        .code(1)
        .stdout(contains("global.report"));
}

#[test]
fn unreachable_sink_fails() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("sync.yml");
    fs::write(
        &cfg,
        "global:\n  report:\n    url: http://127.0.0.1:9/topic\n  rclone:\n    paths:\n      log_dir: /tmp\n      conf_file: /etc/rclone.conf\n",
    )
    .unwrap();
    Command::cargo_bin("reporter").unwrap()
        .args(["--client", "acme", "--vm", "a1", "--status", "2", "-c"])
        .arg(&cfg)
        .assert()
        .code(1);
}

/// Accepts one request, answers 200 and hands back its body.
fn one_shot_sink() -> (String, thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/topic", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut len = 0;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if line == "\r\n" {
                break;
            }
            if let Some((k, v)) = line.split_once(':') {
                if k.eq_ignore_ascii_case("content-length") {
                    len = v.trim().parse().unwrap();
                }
            }
        }
        let mut body = vec![0; len];
        reader.read_exact(&mut body).unwrap();
        let mut stream = stream;
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .unwrap();
        String::from_utf8(body).unwrap()
    });
    (url, handle)
}

#[test]
fn raw_status_and_weekly_window_reach_the_sink() {
    let dir = tempfile::tempdir().unwrap();
    let (url, sink) = one_shot_sink();
    let cfg = dir.path().join("sync.yml");
    fs::write(
        &cfg,
        format!(
            "global:\n  report:\n    url: {url}\n    window: \"03:15\"\n  rclone:\n    paths:\n      log_dir: /tmp\n      conf_file: /etc/rclone.conf\n"
        ),
    )
    .unwrap();
    Command::cargo_bin("reporter").unwrap()
        .args(["--client", "acme", "--vm", "a1", "--status", "3", "--gap", "2", "-c"])
        .arg(&cfg)
        .assert()
        .success();
    let body: serde_json::Value = serde_json::from_str(&sink.join().unwrap()).unwrap();
    assert_eq!(body["client"], "acme");
    let b = &body["backups"][0];
    assert_eq!(b["result"], "3");
    assert_eq!(b["gap"], 2);
    assert_eq!(b["days"][4], serde_json::json!({ "friday": "03:15" }));
}
