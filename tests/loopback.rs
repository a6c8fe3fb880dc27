//! End-to-end sessions over the loopback interface.

use std::sync::Arc;
use std::time::Duration;

use kcp_session::prelude::*;
use tokio::net::UdpSocket;

fn cipher(password: &[u8]) -> Arc<dyn BlockCrypt> {
    let key = derive_key(password, b"loopback salt").unwrap();
    Arc::new(AesBlockCrypt::new(&key).unwrap())
}

async fn socket_pair() -> (UdpSocket, UdpSocket) {
    let a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let b = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    a.connect(b.local_addr().unwrap()).await.unwrap();
    b.connect(a.local_addr().unwrap()).await.unwrap();
    (a, b)
}

async fn session_pair(conv: u32, crypt: Option<Arc<dyn BlockCrypt>>) -> (Session, Session) {
    let (a, b) = socket_pair().await;
    let config = SessionConfig::builder().conv(conv).build();

    let mut left = Session::new(config.clone());
    left.connect_socket(a, crypt.clone()).await.unwrap();
    let mut right = Session::new(config);
    right.connect_socket(b, crypt).await.unwrap();
    (left, right)
}

/// Tick both sessions until `want` bytes arrive at `receiver`.
async fn pump(sender: &mut Session, receiver: &mut Session, want: usize) -> Vec<u8> {
    let mut received = Vec::new();
    let mut buf = vec![0u8; 8192];
    for _ in 0..400 {
        sender.update();
        receiver.update();
        loop {
            let n = receiver.recv(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
        }
        if received.len() >= want {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    received
}

#[tokio::test]
async fn encrypted_hello_arrives_exactly() {
    let (mut client, mut server) = session_pair(1, Some(cipher(b"demo pass"))).await;
    assert_eq!(client.header_size(), 20);

    assert_eq!(client.send(b"Hello KCP: 1").unwrap(), 12);
    let received = pump(&mut client, &mut server, 12).await;
    assert_eq!(received, b"Hello KCP: 1");
}

#[tokio::test]
async fn plain_sessions_echo() {
    let (mut client, mut server) = session_pair(2, None).await;
    assert_eq!(client.header_size(), 0);

    client.send(b"ping").unwrap();
    assert_eq!(pump(&mut client, &mut server, 4).await, b"ping");

    server.send(b"pong").unwrap();
    assert_eq!(pump(&mut server, &mut client, 4).await, b"pong");
}

#[tokio::test]
async fn messages_arrive_in_order() {
    let (mut client, mut server) = session_pair(3, Some(cipher(b"order"))).await;

    let mut expected = Vec::new();
    for i in 1..=10 {
        let message = format!("Hello KCP: {i}");
        // Keep below the send window.
        assert!(client.send(message.as_bytes()).unwrap() > 0);
        expected.extend_from_slice(message.as_bytes());
    }

    assert_eq!(pump(&mut client, &mut server, expected.len()).await, expected);
}

#[tokio::test]
async fn large_message_is_reassembled() {
    let (mut client, mut server) = session_pair(4, Some(cipher(b"large"))).await;

    let message: Vec<u8> = (0..20_000u32).map(|i| (i % 253) as u8).collect();
    assert_eq!(client.send(&message).unwrap(), message.len());

    assert_eq!(pump(&mut client, &mut server, message.len()).await, message);
}

#[tokio::test]
async fn mismatched_keys_never_deliver() {
    let (a, b) = socket_pair().await;
    let config = SessionConfig::builder().conv(5).build();

    let mut client = Session::new(config.clone());
    client.connect_socket(a, Some(cipher(b"right"))).await.unwrap();
    let mut server = Session::new(config);
    server.connect_socket(b, Some(cipher(b"wrong"))).await.unwrap();

    client.send(b"secret").unwrap();

    let mut buf = [0u8; 64];
    let mut integrity_failures = 0;
    for _ in 0..40 {
        client.update();
        server.update();
        match server.recv(&mut buf) {
            Ok(n) => assert_eq!(n, 0),
            Err(err) => {
                assert!(err.is_integrity_failure());
                integrity_failures += 1;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(integrity_failures > 0);
}

#[tokio::test]
async fn accept_adopts_client_conversation() {
    let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let crypt = cipher(b"accept");

    let mut client = Session::new(SessionConfig::default());
    client
        .connect("127.0.0.1", port, Some(crypt.clone()))
        .await
        .unwrap();
    client.send(b"Hello KCP: 1").unwrap();
    client.update();

    let mut server = Session::new(SessionConfig::default());
    let from = tokio::time::timeout(Duration::from_secs(5), server.accept(listener, Some(crypt)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(from, client.local_addr().unwrap());
    assert_eq!(server.peer_addr().unwrap(), from);

    assert_eq!(pump(&mut client, &mut server, 12).await, b"Hello KCP: 1");

    server.send(b"Hello KCP: 1").unwrap();
    assert_eq!(pump(&mut server, &mut client, 12).await, b"Hello KCP: 1");
}

#[tokio::test]
async fn connect_unresolvable_host() {
    let mut session = Session::new(SessionConfig::default());
    let err = session
        .connect("host.invalid", 9, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Resolve(_)));
    assert!(!session.is_connected());
}

#[tokio::test]
async fn reconnect_after_close() {
    let (mut client, mut server) = session_pair(6, None).await;
    client.close();
    client.close();
    assert!(!client.is_connected());

    let (a, b) = socket_pair().await;
    client.connect_socket(a, None).await.unwrap();
    server.connect_socket(b, None).await.unwrap();
    assert!(client.is_connected());

    client.send(b"again").unwrap();
    assert_eq!(pump(&mut client, &mut server, 5).await, b"again");
}

#[tokio::test]
async fn small_receive_buffer_still_delivers() {
    let (a, b) = socket_pair().await;
    let config = SessionConfig::builder().conv(7).recv_buffer_capacity(64).build();

    let mut client = Session::new(config.clone());
    client.connect_socket(a, None).await.unwrap();
    let mut server = Session::new(config);
    server.connect_socket(b, None).await.unwrap();

    let message = [7u8; 200];
    assert_eq!(client.send(&message).unwrap(), 200);
    assert_eq!(pump(&mut client, &mut server, 200).await, message);
}
