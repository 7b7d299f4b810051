//! `fetch_teams_info` against a local HTTP server that answers like
//! eLabFTW's `teams`, `users` and `users/{id}` endpoints.

use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use elapi::api::{Client, ClientSettings};
use elapi::config::ApiToken;
use elapi::plugins::bill_teams::Period;
use elapi::plugins::bill_teams::info::fetch_teams_info;

fn route(path: &str) -> (&'static str, &'static str) {
    match path {
        "/api/v2/teams" => (
            "200 OK",
            r#"[{"id": 1, "name": "Alpha", "created_at": "2018-02-01 09:00:00"},
                {"id": 2, "name": "Beta", "created_at": "2024-05-28 09:00:00"}]"#,
        ),
        "/api/v2/users" => ("200 OK", r#"[{"userid": 10}, {"userid": 11}]"#),
        "/api/v2/users/10" => (
            "200 OK",
            r#"{"userid": 10, "fullname": "Ada", "email": "ada@x.org",
                "teams": [{"id": 1, "is_owner": 1, "is_archived": 0},
                          {"id": 2, "is_owner": 1, "is_archived": 0}]}"#,
        ),
        "/api/v2/users/11" => (
            "200 OK",
            r#"{"userid": 11, "fullname": "Bob", "email": "bob@x.org",
                "teams": [{"id": 1, "is_owner": 0, "is_archived": 0},
                          {"id": 2, "is_owner": 0, "is_archived": 1}]}"#,
        ),
        _ => ("404 Not Found", r#"{"code": 404}"#),
    }
}

async fn serve() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut data = Vec::new();
                let mut buf = [0u8; 2048];
                while !String::from_utf8_lossy(&data).contains("\r\n\r\n") {
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    data.extend_from_slice(&buf[..n]);
                }
                let text = String::from_utf8_lossy(&data).to_string();
                let path = text.split_whitespace().nth(1).unwrap_or("/").to_string();
                let (status, body) = route(&path);
                let reply = format!(
                    "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(reply.as_bytes()).await;
            });
        }
    });
    format!("http://{addr}/api/v2")
}

fn client(host: String) -> Client {
    Client::new(ClientSettings {
        host,
        token: ApiToken::new("3-test-token"),
        timeout: Duration::from_secs(5),
        verify_ssl: true,
        enable_http2: false,
    })
    .unwrap()
}

#[tokio::test]
async fn builds_team_info_from_api() {
    let host = serve().await;
    let period = Period::new(2024, 5).unwrap();
    let teams = fetch_teams_info(&client(host), period, 30, 4).await.unwrap();

    assert_eq!(teams.len(), 2);
    let alpha = &teams[0];
    assert_eq!(alpha.team_name, "Alpha");
    assert_eq!(alpha.active_members, 2);
    assert_eq!(alpha.owners.len(), 1);
    assert_eq!(alpha.owners[0].fullname, "Ada");
    assert!(!alpha.on_trial);

    let beta = &teams[1];
    assert_eq!(beta.active_members, 1);
    assert!(beta.on_trial);
}

#[tokio::test]
async fn missing_endpoint_is_a_critical_failure() {
    let host = serve().await;
    let client = client(format!("{host}/missing"));
    let err = fetch_teams_info(&client, Period::new(2024, 5).unwrap(), 0, 4)
        .await
        .unwrap_err();
    let err: elapi::error::ValidationError = err.into();
    assert!(err.is_critical());
}
