use std::io::{BufRead, BufReader};
use std::net::SocketAddr;
use std::process::{Child, Command as StdCommand, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use assert_cmd::Command;
use predicates as pred;
use reqwest::StatusCode;
use serde_json::{Value, json};

const EXE: &str = env!("CARGO_BIN_EXE_balance_ledger");

#[test]
fn refuses_to_start_with_unknown_strategy() {
    let mut cmd = Command::new(EXE);
    cmd.env("LEDGER_BIND_ADDR", "127.0.0.1:0")
        .env("LEDGER_STRATEGY", "eventual");

    cmd.assert()
        .failure()
        .stderr(pred::str::contains("InvalidStrategy"))
        .stderr(pred::str::contains("eventual"));
}

#[test]
fn refuses_to_start_with_malformed_number() {
    let mut cmd = Command::new(EXE);
    cmd.env("LEDGER_BIND_ADDR", "127.0.0.1:0")
        .env("LEDGER_LOCK_TTL_SECS", "soon");

    cmd.assert()
        .failure()
        .stderr(pred::str::contains("LEDGER_LOCK_TTL_SECS"))
        .stderr(pred::str::contains("soon"));
}

/// Kills the server when the test ends, pass or fail.
struct Server {
    child: Child,
    addr: SocketAddr,
}

impl Server {
    /// Starts the binary on an OS-assigned port and waits for it to log the
    /// address it bound.
    fn start(envs: &[(&str, &str)]) -> Self {
        let mut child = StdCommand::new(EXE)
            .env("LEDGER_BIND_ADDR", "127.0.0.1:0")
            .env("RUST_LOG", "info")
            .env_remove("REDIS_HOST")
            .env_remove("REDIS_PORT")
            .envs(envs.iter().copied())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn server");

        let stderr = child.stderr.take().expect("piped stderr");
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            // Keep draining so the server never blocks on a full pipe.
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                if let Some(addr) = listening_addr(&line) {
                    let _ = tx.send(addr);
                }
            }
        });

        let addr = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("server never logged its address");
        Server { child, addr }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn listening_addr(line: &str) -> Option<SocketAddr> {
    if !line.contains("ledger listening") {
        return None;
    }
    let (_, rest) = line.split_once("addr=")?;
    rest.split_whitespace().next()?.parse().ok()
}

#[test]
fn reads_address_from_log_line() {
    let line = "2024-01-01T00:00:00Z  INFO balance_ledger: ledger listening \
                addr=127.0.0.1:41234 strategy=optimistic";
    assert_eq!(
        listening_addr(line),
        Some("127.0.0.1:41234".parse().unwrap())
    );
    assert_eq!(listening_addr("INFO balance_ledger: using in-process store"), None);
}

#[tokio::test]
async fn serves_reset_and_charge_over_http() {
    let server = Server::start(&[("LEDGER_STRATEGY", "pessimistic")]);
    let client = reqwest::Client::new();

    let reset = client.post(server.url("/reset")).send().await.unwrap();
    assert_eq!(reset.status(), StatusCode::NO_CONTENT);

    let charge = client
        .post(server.url("/charge"))
        .json(&json!({"charges": 30}))
        .send()
        .await
        .unwrap();
    assert_eq!(charge.status(), StatusCode::OK);
    assert_eq!(
        charge.json::<Value>().await.unwrap(),
        json!({"isAuthorized": true, "remainingBalance": 70, "charges": 30})
    );

    let denied = client
        .post(server.url("/charge"))
        .json(&json!({"charges": 1000, "strategy": "cas"}))
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::OK);
    assert_eq!(
        denied.json::<Value>().await.unwrap(),
        json!({"isAuthorized": false, "remainingBalance": 70, "charges": 0})
    );
}

#[tokio::test]
async fn rejects_bad_requests_over_http() {
    let server = Server::start(&[]);
    let client = reqwest::Client::new();

    let malformed = client
        .post(server.url("/charge"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    let body = malformed.json::<Value>().await.unwrap();
    assert!(body["error"].is_string(), "{body}");

    let negative = client
        .post(server.url("/charge"))
        .json(&json!({"charges": -5}))
        .send()
        .await
        .unwrap();
    assert_eq!(negative.status(), StatusCode::BAD_REQUEST);
}
