//! Echo client and server.
//!
//! Environment:
//! - `KCP_MODE`: `client` (default) or `server`
//! - `KCP_HOST` / `KCP_PORT`: server the client talks to (default `127.0.0.1:10000`)
//! - `KCP_BIND`: address the server listens on (default `0.0.0.0:10000`)
//! - `KCP_PASSWORD` / `KCP_SALT`: key material (default `demo pass` / `demo salt`);
//!   an empty password disables encryption
//! - `KCP_LOG`: tracing filter (default `info`)

use std::env;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use kcp_session::prelude::*;
use tokio::net::UdpSocket;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type DemoResult<T> = Result<T, Box<dyn Error>>;

const TICK: Duration = Duration::from_millis(10);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

fn var(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Errors caused by a single bad datagram; the loop logs them and goes on.
fn is_recoverable(err: &SessionError) -> bool {
    err.is_silent_drop() || matches!(err, SessionError::Arq(_))
}

fn cipher() -> DemoResult<Option<Arc<dyn BlockCrypt>>> {
    let password = var("KCP_PASSWORD", "demo pass");
    if password.is_empty() {
        return Ok(None);
    }
    let salt = var("KCP_SALT", "demo salt");
    let key = derive_key(password.as_bytes(), salt.as_bytes())?;
    Ok(Some(Arc::new(AesBlockCrypt::new(&key)?)))
}

#[tokio::main]
async fn main() -> DemoResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("KCP_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let crypt = cipher()?;
    match var("KCP_MODE", "client").as_str() {
        "client" => run_client(crypt).await,
        "server" => run_server(crypt).await,
        other => Err(format!("unknown KCP_MODE: {other}").into()),
    }
}

async fn run_client(crypt: Option<Arc<dyn BlockCrypt>>) -> DemoResult<()> {
    let host = var("KCP_HOST", "127.0.0.1");
    let port: u16 = var("KCP_PORT", "10000").parse()?;

    let mut session = Session::new(SessionConfig::default());
    session.connect(&host, port, crypt.clone()).await?;
    info!(%host, port, encrypted = crypt.is_some(), "begin kcp session");

    let mut ticker = tokio::time::interval(TICK);
    let mut buf = vec![0u8; 1024];
    let mut counter = 0u64;

    loop {
        ticker.tick().await;

        if !session.is_connected() {
            warn!("link lost, reconnecting");
            tokio::time::sleep(RECONNECT_DELAY).await;
            session.close();
            session.connect(&host, port, crypt.clone()).await?;
            continue;
        }
        session.update();

        let text = format!("Hello KCP: {}", counter + 1);
        if session.send(text.as_bytes())? > 0 {
            counter += 1;
        }

        loop {
            match session.recv(&mut buf) {
                Ok(0) => break,
                Ok(n) => info!(reply = %String::from_utf8_lossy(&buf[..n]), "received"),
                Err(err) if is_recoverable(&err) => warn!(%err, "datagram dropped"),
                Err(err) => return Err(err.into()),
            }
        }
    }
}

async fn run_server(crypt: Option<Arc<dyn BlockCrypt>>) -> DemoResult<()> {
    let bind = var("KCP_BIND", "0.0.0.0:10000");

    loop {
        let socket = UdpSocket::bind(&bind).await?;
        info!(%bind, encrypted = crypt.is_some(), "waiting for client");

        let mut session = Session::new(SessionConfig::default());
        let peer = session.accept(socket, crypt.clone()).await?;
        info!(%peer, "client connected");

        echo(&mut session).await?;
        session.close();
        info!(%peer, "client gone");
    }
}

async fn echo(session: &mut Session) -> DemoResult<()> {
    let mut ticker = tokio::time::interval(TICK);
    let mut buf = vec![0u8; 64 * 1024];

    while session.is_connected() {
        ticker.tick().await;
        session.update();

        loop {
            match session.recv(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if session.send(&buf[..n])? == 0 {
                        warn!(len = n, "send window full, reply dropped");
                    }
                }
                Err(err) if is_recoverable(&err) => warn!(%err, "datagram dropped"),
                Err(err) => return Err(err.into()),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stray_datagrams_are_recoverable() {
        let conv = SessionError::Arq(ArqError::ConvMismatch {
            expected: 1,
            actual: 2,
        });
        assert!(is_recoverable(&conv));
        assert!(is_recoverable(&SessionError::Frame(FrameError::TooShort {
            len: 3,
            min: 21,
        })));

        assert!(!is_recoverable(&SessionError::NotConnected));
        assert!(!is_recoverable(&SessionError::Io(std::io::Error::other("closed"))));
    }
}
