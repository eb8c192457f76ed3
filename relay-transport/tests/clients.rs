#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{net::SocketAddr, time::Duration};

use pretty_assertions::assert_eq;
use relay_common::Credentials;
use relay_transport::{ClientError, ClientTimeouts, Pop3Client, SmtpClient};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpListener,
    task::JoinHandle,
};

/// A server that sends `greeting`, then answers each received line with the
/// next reply from `replies`, and returns every line it read.
///
/// Lines received between a `354` reply and the lone `.` are recorded but
/// not answered.
async fn scripted(
    greeting: &'static str,
    replies: Vec<&'static str>,
) -> (SocketAddr, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut received = Vec::new();

        writer.write_all(greeting.as_bytes()).await.unwrap();

        let mut in_data = false;
        let mut replies = replies.into_iter();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            let line = line.trim_end_matches(['\r', '\n']).to_string();
            received.push(line.clone());

            if in_data && line != "." {
                continue;
            }
            in_data = false;

            let Some(reply) = replies.next() else {
                break;
            };
            writer.write_all(reply.as_bytes()).await.unwrap();
            in_data = reply.starts_with("354");
        }

        received
    });

    (addr, handle)
}

fn credentials() -> Credentials {
    Credentials {
        username: "user".to_string(),
        password: "secret".to_string(),
    }
}

fn timeouts() -> ClientTimeouts {
    ClientTimeouts {
        connect_secs: 5,
        command_secs: 5,
        data_secs: 5,
    }
}

#[tokio::test]
async fn test_smtp_delivery_session() {
    let (addr, server) = scripted(
        "220 mock ESMTP\r\n",
        vec![
            "250-mock\r\n250 AUTH LOGIN PLAIN\r\n",
            "250 OK\r\n",
            "250 OK\r\n",
            "354 Go ahead\r\n",
            "250 Queued\r\n",
            "221 Bye\r\n",
        ],
    )
    .await;

    let mut client = SmtpClient::connect("127.0.0.1", addr.port(), false, timeouts())
        .await
        .unwrap();
    client.read_greeting().await.unwrap();
    let ehlo = client.ehlo("relay.local").await.unwrap();
    assert!(ehlo.advertises("AUTH"));
    client.mail_from("<a@x.com>").await.unwrap();
    assert!(client.rcpt_to("b@y.com").await.unwrap().is_success());
    client.data().await.unwrap();
    client
        .send_data("Subject: hi\n\n.leading dot\nlast line")
        .await
        .unwrap();
    client.quit().await.unwrap();
    drop(client);

    assert_eq!(
        server.await.unwrap(),
        vec![
            "EHLO relay.local",
            "MAIL FROM:<a@x.com>",
            "RCPT TO:<b@y.com>",
            "DATA",
            "Subject: hi",
            "",
            "..leading dot",
            "last line",
            ".",
            "QUIT",
        ]
    );
}

#[tokio::test]
async fn test_auth_login_falls_back_to_plain() {
    let (addr, server) = scripted(
        "220 mock\r\n",
        vec!["504 Unrecognised mechanism\r\n", "235 Authenticated\r\n"],
    )
    .await;

    let mut client = SmtpClient::connect("127.0.0.1", addr.port(), false, timeouts())
        .await
        .unwrap();
    client.read_greeting().await.unwrap();
    let response = client.login(&credentials()).await.unwrap();
    assert_eq!(response.code, 235);
    drop(client);

    // base64("\0user\0secret")
    assert_eq!(
        server.await.unwrap(),
        vec!["AUTH LOGIN", "AUTH PLAIN AHVzZXIAc2VjcmV0"]
    );
}

#[tokio::test]
async fn test_auth_login_success() {
    let (addr, server) = scripted(
        "220 mock\r\n",
        vec![
            "334 VXNlcm5hbWU6\r\n",
            "334 UGFzc3dvcmQ6\r\n",
            "235 Authenticated\r\n",
        ],
    )
    .await;

    let mut client = SmtpClient::connect("127.0.0.1", addr.port(), false, timeouts())
        .await
        .unwrap();
    client.read_greeting().await.unwrap();
    client.login(&credentials()).await.unwrap();
    drop(client);

    assert_eq!(
        server.await.unwrap(),
        vec!["AUTH LOGIN", "dXNlcg==", "c2VjcmV0"]
    );
}

#[tokio::test]
async fn test_both_auth_mechanisms_rejected() {
    let (addr, _server) = scripted(
        "220 mock\r\n",
        vec!["535 No\r\n", "535 Still no\r\n"],
    )
    .await;

    let mut client = SmtpClient::connect("127.0.0.1", addr.port(), false, timeouts())
        .await
        .unwrap();
    client.read_greeting().await.unwrap();

    assert!(matches!(
        client.login(&credentials()).await,
        Err(ClientError::AuthenticationFailed { code: 535, .. })
    ));
}

#[tokio::test]
async fn test_refused_greeting() {
    let (addr, _server) = scripted("554 Go away\r\n", vec![]).await;

    let mut client = SmtpClient::connect("127.0.0.1", addr.port(), false, timeouts())
        .await
        .unwrap();

    assert!(matches!(
        client.read_greeting().await,
        Err(ClientError::Rejected { code: 554, .. })
    ));
}

#[tokio::test]
async fn test_command_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let _silent = tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
    });

    let mut client = SmtpClient::connect(
        "127.0.0.1",
        port,
        false,
        ClientTimeouts {
            command_secs: 1,
            ..timeouts()
        },
    )
    .await
    .unwrap();

    assert!(matches!(
        client.read_greeting().await,
        Err(ClientError::Timeout { .. })
    ));
}

#[tokio::test]
async fn test_pop3_login() {
    let (addr, server) = scripted(
        "+OK POP3 ready\r\n",
        vec!["+OK\r\n", "+OK Logged in\r\n", "+OK Bye\r\n"],
    )
    .await;

    let mut client = Pop3Client::connect("127.0.0.1", addr.port(), false, timeouts())
        .await
        .unwrap();
    client.login(&credentials()).await.unwrap();
    drop(client);

    assert_eq!(
        server.await.unwrap(),
        vec!["USER user", "PASS secret", "QUIT"]
    );
}

#[tokio::test]
async fn test_pop3_bad_password() {
    let (addr, _server) = scripted(
        "+OK POP3 ready\r\n",
        vec!["+OK\r\n", "-ERR Invalid login\r\n"],
    )
    .await;

    let mut client = Pop3Client::connect("127.0.0.1", addr.port(), false, timeouts())
        .await
        .unwrap();

    match client.login(&credentials()).await {
        Err(ClientError::Pop3 { command, message }) => {
            assert_eq!(command, "PASS");
            assert_eq!(message, "Invalid login");
        }
        other => panic!("Expected POP3 error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    assert!(matches!(
        SmtpClient::connect("127.0.0.1", port, false, timeouts()).await,
        Err(ClientError::Io(_))
    ));
}
