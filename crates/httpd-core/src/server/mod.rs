mod connection;

use std::{
    io::{self, ErrorKind},
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use indexmap::IndexMap;
use mio::{Events, Interest, Poll, Token, net::TcpListener};

use self::connection::{ConnOutcome, Connection};
use crate::{
    chat,
    config::ServerConfig,
    error::ServerStartupError,
    logging::{AccessLog, ErrorLog},
};

/// Slot/token reserved for the listening socket.
const LISTENER: Token = Token(0);
/// How long one readiness wait blocks before we re-check the shutdown flag.
/// Keeps the loop a blocking wait in spirit without making shutdown hang on
/// an idle server.
const POLL_TIMEOUT: Duration = Duration::from_millis(200);

/// The event loop: owns the listener, the readiness primitive, and the
/// connection registry. Everything here runs on a single thread — there is
/// no locking anywhere in this module.
pub struct Server {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    /// Connection Registry: insertion-ordered, keyed by the same token the
    /// readiness primitive uses, giving O(1) lookup by token and
    /// insertion-order iteration for fair broadcast dispatch.
    conns: IndexMap<Token, Connection>,
    next_token: usize,
    config: ServerConfig,
    access_log: AccessLog,
    error_log: ErrorLog,
}

impl Server {
    pub fn bind(config: ServerConfig) -> Result<Self, ServerStartupError> {
        let poll = Poll::new().map_err(ServerStartupError::Poll)?;

        let mut listener = TcpListener::bind(config.bind_addr)
            .map_err(|e| ServerStartupError::Bind(config.bind_addr, e))?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)
            .map_err(|e| ServerStartupError::Bind(config.bind_addr, e))?;

        std::fs::create_dir_all(&config.logs_dir)
            .map_err(|e| ServerStartupError::LogOpen(config.logs_dir.clone(), e))?;
        let access_log = AccessLog::open(&config.logs_dir.join("access.log"))
            .map_err(|e| ServerStartupError::LogOpen(config.logs_dir.join("access.log"), e))?;
        let error_log = ErrorLog::open(&config.logs_dir.join("error.log"))
            .map_err(|e| ServerStartupError::LogOpen(config.logs_dir.join("error.log"), e))?;

        chat::ensure_exists(&config.logs_dir)
            .map_err(|e| ServerStartupError::ChatLogInit(chat::log_path(&config.logs_dir), e))?;

        Ok(Self {
            poll,
            events: Events::with_capacity(128),
            listener,
            conns: IndexMap::new(),
            next_token: 1,
            config,
            access_log,
            error_log,
        })
    }

    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the event loop until `shutdown` is observed set. Never returns
    /// `Err` except on a non-transient readiness-wait failure.
    pub fn run(&mut self, shutdown: &AtomicBool) -> io::Result<()> {
        while !shutdown.load(Ordering::Relaxed) {
            self.run_once()?;
        }
        self.shutdown();
        Ok(())
    }

    /// Runs a single readiness wait + dispatch pass. Exposed separately so
    /// tests can drive the loop deterministically instead of racing a
    /// background thread against a timeout.
    pub fn run_once(&mut self) -> io::Result<()> {
        match self.poll.poll(&mut self.events, Some(POLL_TIMEOUT)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(e),
        }

        let tokens: Vec<Token> = self.events.iter().map(|e| e.token()).collect();
        let accept_listener = self.events.iter().any(|e| e.token() == LISTENER && e.is_readable());
        if accept_listener {
            self.accept_all();
        }

        for token in tokens {
            if token == LISTENER {
                continue;
            }
            // An event can be stale if an earlier event in this same batch
            // already closed the connection (e.g. it was a chat receiver
            // collapsed by a publish processed moments ago).
            let Some(event) = self.events.iter().find(|e| e.token() == token) else { continue };
            let (is_broken, is_readable, is_writable) =
                (event.is_error() || event.is_read_closed() || event.is_write_closed(), event.is_readable(), event.is_writable());
            if !self.conns.contains_key(&token) {
                continue;
            }

            if is_broken {
                self.close(token);
                continue;
            }

            let outcome = if is_readable {
                self.dispatch_readable(token)
            } else if is_writable {
                self.dispatch_writable(token)
            } else {
                None
            };

            match outcome {
                None => {}
                Some(ConnOutcome::Close) => self.close(token),
                Some(ConnOutcome::Continue) => self.sync_interest(token),
                Some(ConnOutcome::ChatComplete(body)) => self.publish(token, body),
            }
        }
        Ok(())
    }

    fn dispatch_readable(&mut self, token: Token) -> Option<ConnOutcome> {
        let conn = self.conns.get_mut(&token)?;
        Some(conn.on_readable(&self.config, &mut self.access_log, &mut self.error_log))
    }

    fn dispatch_writable(&mut self, token: Token) -> Option<ConnOutcome> {
        let conn = self.conns.get_mut(&token)?;
        Some(conn.on_writable())
    }

    /// Drains the listener until it would block, since the readiness
    /// primitive is edge-triggered.
    fn accept_all(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut socket, peer_addr)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;
                    if let Err(err) =
                        self.poll.registry().register(&mut socket, token, Interest::READABLE)
                    {
                        tracing::warn!(?err, "failed to register accepted connection");
                        continue;
                    }
                    httpd_utils::safe_assert!(
                        !self.conns.contains_key(&token),
                        "token {token:?} reused while still live"
                    );
                    let mut conn = Connection::new(socket, peer_addr);
                    conn.registered_interest = Some(Interest::READABLE);
                    self.conns.insert(token, conn);
                    tracing::debug!(?peer_addr, "accepted connection");
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(err) => {
                    // Non-fatal: log and keep serving other connections.
                    tracing::warn!(?err, "accept failed");
                    break;
                }
            }
        }
    }

    /// Re-registers a connection's readiness interest if its FSM state just
    /// changed what it wants to be woken up for. Parking (`ChatReceiver`)
    /// deregisters entirely.
    fn sync_interest(&mut self, token: Token) {
        let Some(conn) = self.conns.get_mut(&token) else { return };
        let desired = conn.desired_interest();
        if desired == conn.registered_interest {
            return;
        }
        let result = match (conn.registered_interest, desired) {
            (None, Some(interest)) => self.poll.registry().register(&mut conn.socket, token, interest),
            (Some(_), Some(interest)) => self.poll.registry().reregister(&mut conn.socket, token, interest),
            (Some(_), None) => self.poll.registry().deregister(&mut conn.socket),
            (None, None) => {
                httpd_utils::safe_panic!("sync_interest called with nothing registered and nothing desired");
                Ok(())
            }
        };
        match result {
            Ok(()) => conn.registered_interest = desired,
            Err(err) => tracing::warn!(?err, "failed to sync readiness interest"),
        }
    }

    /// Chat Multicaster: append the publish to the log, close the sender,
    /// then rearm every parked receiver to replay the full (now-longer) log.
    fn publish(&mut self, sender: Token, body: Vec<u8>) {
        self.close(sender);

        if let Err(err) = chat::append(&self.config.logs_dir, &body) {
            tracing::warn!(?err, "failed to append chat publish");
            return;
        }

        let receiver_tokens: Vec<Token> =
            self.conns.iter().filter(|(_, c)| c.is_chat_receiver()).map(|(t, _)| *t).collect();

        for token in receiver_tokens {
            let log_file = match chat::open_for_replay(&self.config.logs_dir) {
                Ok(f) => f,
                Err(err) => {
                    tracing::warn!(?err, "failed to open chat log for replay");
                    continue;
                }
            };
            if let Some(conn) = self.conns.get_mut(&token) {
                if conn.rearm_as_receiver(log_file).is_err() {
                    self.close(token);
                    continue;
                }
            }
            self.sync_interest(token);
        }
    }

    /// Destroys a connection: deregisters it, shuts down the socket, and
    /// drops any open file handle. The registry stays order-preserving via
    /// `shift_remove`.
    fn close(&mut self, token: Token) {
        if let Some(mut conn) = self.conns.shift_remove(&token) {
            let _ = self.poll.registry().deregister(&mut conn.socket);
            let _ = conn.socket.shutdown(std::net::Shutdown::Both);
        }
    }

    fn shutdown(&mut self) {
        let tokens: Vec<Token> = self.conns.keys().copied().collect();
        for token in tokens {
            self.close(token);
        }
        let _ = self.poll.registry().deregister(&mut self.listener);
    }
}
