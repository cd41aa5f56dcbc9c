//! BattlEye RCon client.
//!
//! Owns the UDP session with the game server: login, keep-alive,
//! acknowledging server messages, reassembling command responses and
//! reconnecting with backoff. Everything the server says is published as
//! [`RconEvent`]s; callers talk to the client through an [`RconHandle`].

use std::net::SocketAddr;
use std::time::Duration;

use backon::BackoffBuilder;
use futures::{SinkExt, StreamExt};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::udp::UdpFramed;
use tracing::{debug, error, info, warn};

use crate::common::error::{RconError, RconResult};
use crate::common::RconEvent;
use crate::config::types::BattlEyeConfig;
use crate::protocol::battleye::codec::BattlEyeCodec;
use crate::protocol::battleye::packets::{ClientPacket, ResponseAssembler, ServerPacket};

type Reply = Option<oneshot::Sender<RconResult<()>>>;

/// Requests accepted by the RCon client task.
#[derive(Debug)]
pub enum RconRequest {
    /// Start (or keep) a session.
    Login { reply: Reply },
    /// End the session and stop reconnecting.
    Logout { reply: Reply },
    /// Send a command to the server.
    Command { command: String, reply: Reply },
}

/// Cloneable handle used to control the RCon client.
#[derive(Debug, Clone)]
pub struct RconHandle {
    requests_tx: mpsc::UnboundedSender<RconRequest>,
}

impl RconHandle {
    pub fn new(requests_tx: mpsc::UnboundedSender<RconRequest>) -> Self {
        Self { requests_tx }
    }

    /// Ask the client to log in. Login failures are reported as events.
    pub async fn login(&self) -> RconResult<()> {
        self.request(|reply| RconRequest::Login { reply }).await
    }

    /// End the current session.
    pub async fn logout(&self) -> RconResult<()> {
        self.request(|reply| RconRequest::Logout { reply }).await
    }

    /// Send a command and wait until it has been written to the socket.
    pub async fn send_command(&self, command: impl Into<String>) -> RconResult<()> {
        let command = command.into();
        self.request(|reply| RconRequest::Command { command, reply }).await
    }

    /// Queue a command without waiting for the outcome.
    pub fn send_command_detached(&self, command: impl Into<String>) -> RconResult<()> {
        self.requests_tx
            .send(RconRequest::Command {
                command: command.into(),
                reply: None,
            })
            .map_err(|_| RconError::ClientGone)
    }

    async fn request<F>(&self, build: F) -> RconResult<()>
    where
        F: FnOnce(Reply) -> RconRequest,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests_tx
            .send(build(Some(reply_tx)))
            .map_err(|_| RconError::ClientGone)?;
        reply_rx.await.map_err(|_| RconError::ClientGone)?
    }
}

fn respond(reply: Reply, result: RconResult<()>) {
    if let Some(reply) = reply {
        // The requester may have given up waiting
        let _ = reply.send(result);
    }
}

/// Create an exponential backoff iterator for RCon reconnection.
/// 5s initial, 5min max, factor 1.1, with jitter, unlimited retries.
fn rcon_backoff() -> impl Iterator<Item = Duration> {
    backon::ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(5))
        .with_max_delay(Duration::from_secs(300))
        .with_factor(1.1)
        .with_jitter()
        .without_max_times()
        .build()
}

/// An authenticated session with the server.
struct Session {
    framed: UdpFramed<BattlEyeCodec>,
    server: SocketAddr,
    next_seq: u8,
    last_message_seq: Option<u8>,
    assembler: ResponseAssembler,
    last_seen: Instant,
}

impl Session {
    async fn send(&mut self, packet: ClientPacket) -> RconResult<()> {
        self.framed.send((packet, self.server)).await
    }

    async fn send_command(&mut self, command: &str) -> RconResult<()> {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.send(ClientPacket::Command {
            seq,
            command: command.to_string(),
        })
        .await
    }
}

pub struct RconClient {
    config: BattlEyeConfig,
    events_tx: mpsc::UnboundedSender<RconEvent>,
    requests_rx: mpsc::UnboundedReceiver<RconRequest>,
    shutdown_rx: watch::Receiver<bool>,
    /// Whether the operator wants a session (cleared by logout).
    want_session: bool,
    stopping: bool,
}

impl RconClient {
    pub fn new(
        config: BattlEyeConfig,
        events_tx: mpsc::UnboundedSender<RconEvent>,
        requests_rx: mpsc::UnboundedReceiver<RconRequest>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            events_tx,
            requests_rx,
            shutdown_rx,
            want_session: true,
            stopping: false,
        }
    }

    /// Run until shutdown, keeping a session open while one is wanted.
    pub async fn run(mut self) {
        let mut backoff = rcon_backoff();

        while !self.stopping {
            if !self.want_session {
                self.wait_idle(None).await;
                continue;
            }

            info!(
                "Connecting to BattlEye RCon at {}:{}...",
                self.config.address, self.config.port
            );

            match self.connect().await {
                Ok(None) => debug!("RCon login abandoned"),
                Ok(Some(session)) => {
                    info!("BattlEye RCon login successful");
                    backoff = rcon_backoff();
                    self.emit(RconEvent::Connected);

                    match self.run_session(session).await {
                        Ok(()) => info!("BattlEye RCon session closed"),
                        Err(e) => {
                            error!("BattlEye RCon session error: {}", e);
                            self.emit(RconEvent::Error(e.to_string()));
                        }
                    }
                    self.emit(RconEvent::Disconnected);
                }
                Err(e) => {
                    error!("BattlEye RCon login failed: {}", e);
                    self.emit(RconEvent::Error(e.to_string()));
                }
            }

            if self.stopping || !self.want_session {
                continue;
            }

            let delay = backoff.next().unwrap_or(Duration::from_secs(300));
            info!("Reconnecting to RCon in {:.1} seconds...", delay.as_secs_f64());
            self.wait_idle(Some(delay)).await;
        }

        info!("RCon client stopped");
    }

    /// Serve requests while no session is open.
    ///
    /// Returns when `delay` elapses, a login is requested, logout is
    /// requested during a reconnect delay, or shutdown begins.
    async fn wait_idle(&mut self, delay: Option<Duration>) {
        let sleep = tokio::time::sleep(delay.unwrap_or(Duration::MAX));
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep, if delay.is_some() => return,

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        self.stopping = true;
                        return;
                    }
                }

                request = self.requests_rx.recv() => {
                    let Some(request) = request else {
                        self.stopping = true;
                        return;
                    };

                    match request {
                        RconRequest::Login { reply } => {
                            let was_idle = !self.want_session;
                            self.want_session = true;
                            respond(reply, Ok(()));
                            if was_idle || delay.is_some() {
                                return;
                            }
                        }
                        RconRequest::Logout { reply } => {
                            let was_wanted = self.want_session;
                            self.want_session = false;
                            respond(reply, Ok(()));
                            if was_wanted {
                                return;
                            }
                        }
                        RconRequest::Command { command, reply } => {
                            warn!("Dropping RCon command '{}' - not connected", command);
                            respond(reply, Err(RconError::NotConnected));
                        }
                    }
                }
            }
        }
    }

    /// Open a socket and log in.
    ///
    /// Returns `None` when logout or shutdown arrives before the server
    /// answers. Commands received meanwhile are refused.
    async fn connect(&mut self) -> RconResult<Option<Session>> {
        let host = self.config.address.clone();
        let port = self.config.port;

        let server = tokio::net::lookup_host((host.as_str(), port))
            .await
            .map_err(|source| RconError::ConnectFailed {
                host: host.clone(),
                port,
                source,
            })?
            .next()
            .ok_or_else(|| RconError::ConnectFailed {
                host: host.clone(),
                port,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no address resolved"),
            })?;

        let bind_addr = if server.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await?;
        let mut framed = UdpFramed::new(socket, BattlEyeCodec::new());

        debug!("Sending RCon login to {}", server);
        framed
            .send((
                ClientPacket::Login {
                    password: self.config.password.clone(),
                },
                server,
            ))
            .await?;

        let seconds = self.config.connection_timeout_secs;
        let deadline = tokio::time::sleep(Duration::from_secs(seconds));
        tokio::pin!(deadline);

        let success = loop {
            tokio::select! {
                packet = framed.next() => {
                    match packet {
                        Some(Ok((ServerPacket::LoginResponse { success }, from))) if from == server => {
                            break success;
                        }
                        Some(Ok((packet, from))) => {
                            debug!("Ignoring {:?} from {} while logging in", packet, from);
                        }
                        Some(Err(RconError::Io(e))) => return Err(RconError::Io(e)),
                        Some(Err(e)) => warn!("Dropping malformed RCon packet: {}", e),
                        None => {
                            return Err(RconError::InvalidPacket {
                                message: "socket closed during login".to_string(),
                            })
                        }
                    }
                }

                _ = &mut deadline => return Err(RconError::Timeout { seconds }),

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        self.stopping = true;
                        return Ok(None);
                    }
                }

                request = self.requests_rx.recv() => {
                    match request {
                        Some(RconRequest::Login { reply }) => respond(reply, Ok(())),
                        Some(RconRequest::Logout { reply }) => {
                            info!("RCon logout requested during login");
                            self.want_session = false;
                            respond(reply, Ok(()));
                            return Ok(None);
                        }
                        Some(RconRequest::Command { command, reply }) => {
                            warn!("Dropping RCon command '{}' - still logging in", command);
                            respond(reply, Err(RconError::NotConnected));
                        }
                        None => {
                            self.stopping = true;
                            return Ok(None);
                        }
                    }
                }
            }
        };

        if !success {
            return Err(RconError::AuthFailed {
                reason: "server rejected the password".to_string(),
            });
        }

        Ok(Some(Session {
            framed,
            server,
            next_seq: 0,
            last_message_seq: None,
            assembler: ResponseAssembler::new(),
            last_seen: Instant::now(),
        }))
    }

    /// Drive an open session until logout, shutdown or failure.
    async fn run_session(&mut self, mut session: Session) -> RconResult<()> {
        let keep_alive = Duration::from_secs(self.config.keep_alive_secs);
        let timeout_secs = self.config.connection_timeout_secs;
        let timeout = Duration::from_secs(timeout_secs);

        let mut keepalive_interval = tokio::time::interval_at(Instant::now() + keep_alive, keep_alive);
        keepalive_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let deadline = session.last_seen + timeout;

            tokio::select! {
                packet = session.framed.next() => {
                    match packet {
                        Some(Ok((packet, from))) => {
                            if from != session.server {
                                debug!("Ignoring RCon packet from unexpected peer {}", from);
                                continue;
                            }
                            session.last_seen = Instant::now();
                            self.handle_packet(&mut session, packet).await?;
                        }
                        Some(Err(RconError::Io(e))) => return Err(RconError::Io(e)),
                        Some(Err(e)) => warn!("Dropping malformed RCon packet: {}", e),
                        None => return Ok(()),
                    }
                }

                _ = keepalive_interval.tick() => {
                    debug!("Sending RCon keep-alive");
                    session.send_command("").await?;
                }

                _ = tokio::time::sleep_until(deadline) => {
                    return Err(RconError::Timeout { seconds: timeout_secs });
                }

                request = self.requests_rx.recv() => {
                    match request {
                        Some(RconRequest::Login { reply }) => {
                            debug!("RCon login requested while already connected");
                            respond(reply, Ok(()));
                        }
                        Some(RconRequest::Logout { reply }) => {
                            info!("RCon logout requested");
                            self.want_session = false;
                            respond(reply, Ok(()));
                            return Ok(());
                        }
                        Some(RconRequest::Command { command, reply }) => {
                            info!("RCon command: {}", command);
                            match session.send_command(&command).await {
                                Ok(()) => respond(reply, Ok(())),
                                Err(e) => {
                                    respond(reply, Err(RconError::NotConnected));
                                    return Err(e);
                                }
                            }
                        }
                        None => {
                            self.stopping = true;
                            return Ok(());
                        }
                    }
                }

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("Shutdown signal received - logging out of RCon");
                        self.stopping = true;
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn handle_packet(&mut self, session: &mut Session, packet: ServerPacket) -> RconResult<()> {
        match packet {
            ServerPacket::ServerMessage { seq, message } => {
                session.send(ClientPacket::Ack { seq }).await?;

                if session.last_message_seq == Some(seq) {
                    debug!("Ignoring retransmitted RCon message {}", seq);
                    return Ok(());
                }
                session.last_message_seq = Some(seq);
                self.emit(RconEvent::Message(message));
            }
            ServerPacket::CommandResponse { part: None, body, .. } => {
                if !body.is_empty() {
                    self.emit(RconEvent::Message(String::from_utf8_lossy(&body).into_owned()));
                }
            }
            ServerPacket::CommandResponse {
                seq,
                part: Some(header),
                body,
            } => {
                if let Some(full) = session.assembler.push(seq, header, body) {
                    self.emit(RconEvent::Message(full));
                }
            }
            ServerPacket::LoginResponse { .. } => {
                debug!("Ignoring late RCon login response");
            }
        }
        Ok(())
    }

    fn emit(&self, event: RconEvent) {
        if let Err(e) = self.events_tx.send(event) {
            debug!("RCon event channel closed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, BytesMut};
    use tokio_test::assert_ok;

    use super::*;

    struct Harness {
        server: UdpSocket,
        events_rx: mpsc::UnboundedReceiver<RconEvent>,
        handle: RconHandle,
        shutdown_tx: watch::Sender<bool>,
        task: tokio::task::JoinHandle<()>,
    }

    async fn start(password: &str) -> Harness {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = BattlEyeConfig {
            address: "127.0.0.1".to_string(),
            port: server.local_addr().unwrap().port(),
            password: password.to_string(),
            connection_timeout_secs: 5,
            keep_alive_secs: 30,
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let client = RconClient::new(config, events_tx, requests_rx, shutdown_rx);
        let task = tokio::spawn(client.run());

        Harness {
            server,
            events_rx,
            handle: RconHandle::new(requests_tx),
            shutdown_tx,
            task,
        }
    }

    /// Wrap a packet body in the BE envelope.
    fn frame(body: &[u8]) -> Vec<u8> {
        let mut payload = vec![0xFF];
        payload.extend_from_slice(body);

        let mut out = BytesMut::new();
        out.put_slice(b"BE");
        out.put_u32_le(crc32fast::hash(&payload));
        out.put_slice(&payload);
        out.to_vec()
    }

    /// Receive a datagram and return the bytes after the `0xFF` marker.
    async fn recv_body(server: &UdpSocket) -> (Vec<u8>, SocketAddr) {
        let mut buf = [0u8; 1024];
        let (n, peer) = server.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..2], b"BE");
        assert_eq!(buf[6], 0xFF);
        (buf[7..n].to_vec(), peer)
    }

    #[tokio::test]
    async fn test_session_relays_messages_and_commands() {
        let mut h = start("secret").await;

        let (login, peer) = recv_body(&h.server).await;
        assert_eq!(login, b"\x00secret");
        h.server.send_to(&frame(&[0x00, 0x01]), peer).await.unwrap();
        assert_eq!(h.events_rx.recv().await, Some(RconEvent::Connected));

        h.server
            .send_to(&frame(b"\x02\x07Player #3 Bob (76.1.1.1:2304) connected"), peer)
            .await
            .unwrap();
        assert_eq!(
            h.events_rx.recv().await,
            Some(RconEvent::Message("Player #3 Bob (76.1.1.1:2304) connected".to_string()))
        );
        let (ack, _) = recv_body(&h.server).await;
        assert_eq!(ack, vec![0x02, 0x07]);

        assert_ok!(h.handle.send_command("players").await);
        let (command, _) = recv_body(&h.server).await;
        assert_eq!(command, b"\x01\x00players");

        h.server
            .send_to(&frame(b"\x01\x00\x00\x02\x01(0 players in total)"), peer)
            .await
            .unwrap();
        h.server
            .send_to(&frame(b"\x01\x00\x00\x02\x00Players on server:\n"), peer)
            .await
            .unwrap();
        assert_eq!(
            h.events_rx.recv().await,
            Some(RconEvent::Message(
                "Players on server:\n(0 players in total)".to_string()
            ))
        );

        h.shutdown_tx.send(true).unwrap();
        assert_eq!(h.events_rx.recv().await, Some(RconEvent::Disconnected));
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_retransmitted_message_emitted_once() {
        let mut h = start("secret").await;

        let (_, peer) = recv_body(&h.server).await;
        h.server.send_to(&frame(&[0x00, 0x01]), peer).await.unwrap();
        assert_eq!(h.events_rx.recv().await, Some(RconEvent::Connected));

        let message = frame(b"\x02\x01RCon admin #0 logged in");
        h.server.send_to(&message, peer).await.unwrap();
        h.server.send_to(&message, peer).await.unwrap();
        h.server.send_to(&frame(b"\x02\x02next"), peer).await.unwrap();

        assert_eq!(
            h.events_rx.recv().await,
            Some(RconEvent::Message("RCon admin #0 logged in".to_string()))
        );
        assert_eq!(h.events_rx.recv().await, Some(RconEvent::Message("next".to_string())));

        h.shutdown_tx.send(true).unwrap();
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_password_reports_error() {
        let mut h = start("wrong").await;

        let (_, peer) = recv_body(&h.server).await;
        h.server.send_to(&frame(&[0x00, 0x00]), peer).await.unwrap();

        match h.events_rx.recv().await {
            Some(RconEvent::Error(message)) => assert!(message.contains("Authentication failed")),
            other => panic!("unexpected event {:?}", other),
        }

        // Commands are refused while waiting to reconnect
        assert!(matches!(
            h.handle.send_command("players").await,
            Err(RconError::NotConnected)
        ));

        h.shutdown_tx.send(true).unwrap();
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_requests_answered_while_login_pending() {
        let h = start("secret").await;

        // The server never answers the login
        let (login, _) = recv_body(&h.server).await;
        assert_eq!(login, b"\x00secret");

        let wait = Duration::from_secs(1);
        let result = tokio::time::timeout(wait, h.handle.send_command("players")).await;
        assert!(matches!(result, Ok(Err(RconError::NotConnected))));

        assert_ok!(assert_ok!(tokio::time::timeout(wait, h.handle.logout()).await));
        assert!(matches!(
            tokio::time::timeout(wait, h.handle.send_command("players")).await,
            Ok(Err(RconError::NotConnected))
        ));

        h.shutdown_tx.send(true).unwrap();
        assert_ok!(assert_ok!(tokio::time::timeout(wait, h.task).await));
    }

    #[tokio::test]
    async fn test_shutdown_while_login_pending() {
        let mut h = start("secret").await;
        let _ = recv_body(&h.server).await;

        h.shutdown_tx.send(true).unwrap();
        assert_ok!(assert_ok!(tokio::time::timeout(Duration::from_secs(1), h.task).await));
        // Never connected, so no lifecycle events
        assert!(h.events_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_logout_stops_session_until_login() {
        let mut h = start("secret").await;

        let (_, peer) = recv_body(&h.server).await;
        h.server.send_to(&frame(&[0x00, 0x01]), peer).await.unwrap();
        assert_eq!(h.events_rx.recv().await, Some(RconEvent::Connected));

        assert_ok!(h.handle.logout().await);
        assert_eq!(h.events_rx.recv().await, Some(RconEvent::Disconnected));
        assert!(matches!(
            h.handle.send_command("players").await,
            Err(RconError::NotConnected)
        ));

        assert_ok!(h.handle.login().await);
        let (login, peer) = recv_body(&h.server).await;
        assert_eq!(login, b"\x00secret");
        h.server.send_to(&frame(&[0x00, 0x01]), peer).await.unwrap();
        assert_eq!(h.events_rx.recv().await, Some(RconEvent::Connected));

        h.shutdown_tx.send(true).unwrap();
        h.task.await.unwrap();
    }
}
