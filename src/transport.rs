//! Persistent connections to sensor endpoints.
//!
//! Workers only see the [`Connector`] and [`FrameStream`] traits, so the
//! network side can be swapped for a scripted endpoint in tests.

use crate::error::TransportError;
use crate::types::RawFrame;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep_until, timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Protocol level ping/pong settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeepAlive {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for KeepAlive {
    fn default() -> Self {
        KeepAlive {
            interval: Duration::from_secs(20),
            timeout: Duration::from_secs(20),
        }
    }
}

#[async_trait]
pub trait FrameStream: Send {
    /// Wait for the next data message. Any error means the connection is gone.
    async fn next_frame(&mut self) -> Result<RawFrame, TransportError>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn FrameStream>, TransportError>;
}

/// WebSocket client connector.
#[derive(Clone, Debug, Default)]
pub struct WsConnector {
    keepalive: KeepAlive,
}

impl WsConnector {
    pub fn new(keepalive: KeepAlive) -> Self {
        WsConnector { keepalive }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn FrameStream>, TransportError> {
        let handshake = timeout(self.keepalive.timeout, connect_async(url))
            .await
            .map_err(|_| TransportError::Connect {
                url: url.to_string(),
                reason: format!("handshake timed out after {:?}", self.keepalive.timeout),
            })?;

        let (ws, _response) = handshake.map_err(|e| TransportError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Box::new(WsFrameStream {
            ws,
            keepalive: self.keepalive,
            next_ping: Instant::now() + self.keepalive.interval,
            pong_deadline: None,
        }))
    }
}

pub struct WsFrameStream {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    keepalive: KeepAlive,
    next_ping: Instant,
    pong_deadline: Option<Instant>,
}

#[async_trait]
impl FrameStream for WsFrameStream {
    async fn next_frame(&mut self) -> Result<RawFrame, TransportError> {
        loop {
            let wake = self.pong_deadline.unwrap_or(self.next_ping);
            tokio::select! {
                msg = self.ws.next() => match msg {
                    Some(Ok(Message::Binary(bytes))) => return Ok(RawFrame::Binary(bytes)),
                    Some(Ok(Message::Text(text))) => return Ok(RawFrame::Text(text)),
                    Some(Ok(Message::Pong(_))) => self.pong_deadline = None,
                    Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
                    // pings are answered by tungstenite itself
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(TransportError::WebSocket(e)),
                },
                _ = sleep_until(wake) => {
                    if self.pong_deadline.is_some() {
                        return Err(TransportError::KeepaliveTimeout(self.keepalive.timeout));
                    }
                    self.ws.send(Message::Ping(Vec::new())).await?;
                    let now = Instant::now();
                    self.pong_deadline = Some(now + self.keepalive.timeout);
                    self.next_ping = now + self.keepalive.interval;
                }
            }
        }
    }
}

#[cfg(test)]
pub mod scripted {
    //! Connector that replays canned sessions instead of opening sockets.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::watch;

    #[derive(Clone, Debug)]
    pub enum Step {
        Frame(RawFrame),
        /// Connection drops
        Fault,
        /// Nothing ever arrives again
        Hang,
    }

    #[derive(Clone, Debug)]
    pub enum Session {
        Refuse,
        Accept(Vec<Step>),
    }

    pub struct ScriptedConnector {
        sessions: Mutex<VecDeque<Session>>,
        attempts_tx: watch::Sender<usize>,
    }

    impl ScriptedConnector {
        pub fn new(sessions: Vec<Session>) -> Self {
            let (attempts_tx, _) = watch::channel(0);
            ScriptedConnector {
                sessions: Mutex::new(sessions.into()),
                attempts_tx,
            }
        }

        pub fn attempts(&self) -> usize {
            *self.attempts_tx.borrow()
        }

        pub fn watch_attempts(&self) -> watch::Receiver<usize> {
            self.attempts_tx.subscribe()
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self, url: &str) -> Result<Box<dyn FrameStream>, TransportError> {
            self.attempts_tx.send_modify(|n| *n += 1);
            let next = self.sessions.lock().unwrap().pop_front();
            match next {
                Some(Session::Accept(steps)) => Ok(Box::new(ScriptedStream {
                    steps: steps.into(),
                })),
                Some(Session::Refuse) => Err(TransportError::Connect {
                    url: url.to_string(),
                    reason: "refused".to_string(),
                }),
                None => std::future::pending().await,
            }
        }
    }

    struct ScriptedStream {
        steps: VecDeque<Step>,
    }

    #[async_trait]
    impl FrameStream for ScriptedStream {
        async fn next_frame(&mut self) -> Result<RawFrame, TransportError> {
            match self.steps.pop_front() {
                Some(Step::Frame(frame)) => Ok(frame),
                Some(Step::Fault) | None => Err(TransportError::Closed),
                Some(Step::Hang) => std::future::pending().await,
            }
        }
    }
}
