use std::{
    fs::File,
    io::{self, ErrorKind},
    net::SocketAddr,
};

use mio::{Interest, net::TcpStream};

use crate::{
    buffer::ConnBuffer,
    config::ServerConfig,
    http::{self, request, response::Status},
    logging::{AccessLog, ErrorLog},
};

/// `file` is folded into `SendingResponse` because it's only ever
/// meaningful there.
pub(crate) enum ConnState {
    ReceivingRequest,
    SendingResponse { file: Option<File> },
    /// Parked: zero readiness interest until a publish rearms it.
    ChatReceiver,
    ChatSender { body_ptr: usize, content_length: usize },
}

/// What the event loop should do after dispatching one readiness event to a
/// connection.
pub(crate) enum ConnOutcome {
    /// Stay open; interest will be re-synced from `desired_interest()`.
    Continue,
    /// Tear the connection down.
    Close,
    /// A publish just completed: append the carried body to the chat log,
    /// close this sender, and rearm every parked `ChatReceiver`.
    ChatComplete(Vec<u8>),
}

pub(crate) struct Connection {
    pub(crate) socket: TcpStream,
    pub(crate) peer_addr: SocketAddr,
    state: ConnState,
    buffer: ConnBuffer,
    /// What's currently registered with the OS poller, so the caller can
    /// diff against `desired_interest()` and register/reregister/deregister
    /// only on an actual change.
    pub(crate) registered_interest: Option<Interest>,
}

impl Connection {
    pub(crate) fn new(socket: TcpStream, peer_addr: SocketAddr) -> Self {
        Self {
            socket,
            peer_addr,
            state: ConnState::ReceivingRequest,
            buffer: ConnBuffer::new(),
            registered_interest: None,
        }
    }

    /// The interest this connection wants right now. `None` means parked.
    pub(crate) fn desired_interest(&self) -> Option<Interest> {
        match &self.state {
            ConnState::ReceivingRequest | ConnState::ChatSender { .. } => Some(Interest::READABLE),
            ConnState::SendingResponse { .. } => Some(Interest::WRITABLE),
            ConnState::ChatReceiver => None,
        }
    }

    pub(crate) fn is_chat_receiver(&self) -> bool {
        matches!(self.state, ConnState::ChatReceiver)
    }

    /// Handles a readable event. Preconditions: state is
    /// `ReceivingRequest` or `ChatSender`. Edge-triggered readiness only
    /// fires once per arrival, so this drains the socket in a loop until a
    /// read would block (or the connection leaves a read-interested state)
    /// rather than consuming a single chunk per event.
    pub(crate) fn on_readable(
        &mut self,
        cfg: &ServerConfig,
        access_log: &mut AccessLog,
        error_log: &mut ErrorLog,
    ) -> ConnOutcome {
        loop {
            if !matches!(self.state, ConnState::ReceivingRequest | ConnState::ChatSender { .. }) {
                return ConnOutcome::Continue;
            }

            if self.buffer.is_full() && self.buffer.grow().is_err() {
                return ConnOutcome::Close;
            }

            match self.buffer.read_from(&mut self.socket) {
                Ok(0) => return ConnOutcome::Close,
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::WouldBlock => return ConnOutcome::Continue,
                Err(_) => return ConnOutcome::Close,
            }

            let outcome = match self.state {
                ConnState::ReceivingRequest => match self.buffer.find_header_end() {
                    Some(header_end) => {
                        let parsed = request::parse(self.buffer.received(), header_end);
                        match parsed {
                            Ok(req) => self.handle_parsed_request(req, cfg, access_log, error_log),
                            Err(_) => ConnOutcome::Close,
                        }
                    }
                    None => ConnOutcome::Continue,
                },
                ConnState::ChatSender { body_ptr, content_length } => {
                    self.check_chat_complete(body_ptr, content_length)
                }
                _ => ConnOutcome::Continue,
            };

            if matches!(outcome, ConnOutcome::Close | ConnOutcome::ChatComplete(_)) {
                return outcome;
            }
            // `Continue`: loop back and keep draining — the top-of-loop state
            // check handles the case where the request just finished parsing
            // and moved to `SendingResponse`/`ChatReceiver`.
        }
    }

    fn handle_parsed_request(
        &mut self,
        req: request::ParsedRequest,
        cfg: &ServerConfig,
        access_log: &mut AccessLog,
        error_log: &mut ErrorLog,
    ) -> ConnOutcome {
        if req.is_post {
            if req.content_length == 0 {
                self.state = ConnState::ChatReceiver;
                return ConnOutcome::Continue;
            }
            self.state =
                ConnState::ChatSender { body_ptr: req.body_offset, content_length: req.content_length };
            return self.check_chat_complete(req.body_offset, req.content_length);
        }

        let path = http::resolve_path(&cfg.document_root, &req.url);
        let file = path.and_then(|p| File::open(p).ok());
        match file {
            Some(file) => {
                access_log.log_get(&req.url, Status::Ok200.code(), Status::Ok200.reason());
                self.respond(Status::Ok200, Some(file))
            }
            None => {
                error_log.log_get(&req.url, Status::NotFound404.code(), Status::NotFound404.reason());
                let not_found = File::open(&cfg.not_found_path).ok();
                self.respond(Status::NotFound404, not_found)
            }
        }
    }

    fn respond(&mut self, status: Status, file: Option<File>) -> ConnOutcome {
        match http::response::write(&mut self.buffer, status) {
            Ok(()) => {
                self.state = ConnState::SendingResponse { file };
                ConnOutcome::Continue
            }
            Err(_) => ConnOutcome::Close,
        }
    }

    fn check_chat_complete(&mut self, body_ptr: usize, content_length: usize) -> ConnOutcome {
        if body_ptr + content_length > self.buffer.len() {
            return ConnOutcome::Continue;
        }
        let body = self.buffer.received()[body_ptr..body_ptr + content_length].to_vec();
        ConnOutcome::ChatComplete(body)
    }

    /// Send / file streamer. Preconditions: state is `SendingResponse`.
    /// Edge-triggered readiness only fires once per socket becoming
    /// writable, so this drains the header and every refilled file chunk in
    /// a loop until a write would block, instead of stopping after the
    /// first (often tiny) header write and stalling with the body unsent.
    pub(crate) fn on_writable(&mut self) -> ConnOutcome {
        loop {
            let ConnState::SendingResponse { ref mut file } = self.state else {
                return ConnOutcome::Continue;
            };

            match self.buffer.write_to(&mut self.socket) {
                Ok(0) => return ConnOutcome::Close,
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::WouldBlock => return ConnOutcome::Continue,
                Err(_) => return ConnOutcome::Close,
            }

            if !self.buffer.send_complete() {
                continue;
            }

            match file {
                None => return ConnOutcome::Close,
                Some(f) => match self.buffer.refill_from_file(f) {
                    Ok(0) => return ConnOutcome::Close,
                    Ok(_) => {}
                    Err(_) => return ConnOutcome::Close,
                },
            }
        }
    }

    /// Rearms a parked `ChatReceiver` to stream the whole chat log back to
    /// it.
    pub(crate) fn rearm_as_receiver(&mut self, chat_log: File) -> io::Result<()> {
        http::response::write(&mut self.buffer, Status::Ok200)
            .map_err(|_| io::Error::new(ErrorKind::Other, "response header overflow"))?;
        self.state = ConnState::SendingResponse { file: Some(chat_log) };
        Ok(())
    }
}
