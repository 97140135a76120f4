//! Primary duplex control channel.
//!
//! One socket per presentation view, owned by a reader thread that hands
//! parsed envelopes to the dispatcher in arrival order. Transport faults
//! never propagate past this module: they end the thread and drop the
//! `connected` flag. There is no automatic reconnect.

use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};
use url::Url;

use crate::commands::dispatcher::Dispatcher;
use crate::commands::parse_frame;
use crate::session::Session;
use crate::view::SharedViewState;

/// Read timeout on the socket; doubles as the stop-flag poll interval.
const READ_POLL: Duration = Duration::from_millis(50);

/// Keepalive interval. The server answers a bare `ping` text frame with
/// `pong`.
const PING_INTERVAL: Duration = Duration::from_secs(25);

type ControlSocket = WebSocket<MaybeTlsStream<TcpStream>>;

/// Owner of the control socket.
pub struct ControlConnection {
    state: SharedViewState,
    dispatcher: Arc<Dispatcher>,
    stop: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl ControlConnection {
    pub fn new(state: SharedViewState, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            state,
            dispatcher,
            stop: Arc::new(AtomicBool::new(false)),
            reader: Mutex::new(None),
        }
    }

    /// Connect `{server}/ws/{client_id}` and start the reader thread.
    /// A failed connect leaves `connected` false and returns the error.
    pub fn open(&self, server_url: &str, session: &Session) -> Result<()> {
        let mut reader = self.reader.lock().unwrap();
        if reader.is_some() {
            debug!("control channel already open");
            return Ok(());
        }

        let endpoint = control_endpoint(server_url, &session.client_id)?;
        let (socket, response) = tungstenite::connect(endpoint.as_str())
            .with_context(|| format!("control channel connect to {endpoint}"))?;
        set_read_timeout(&socket);

        info!(
            "control channel connected as {} ({})",
            session.client_id,
            response.status()
        );
        self.state.lock().unwrap().connected = true;
        self.stop.store(false, Ordering::SeqCst);

        let state = self.state.clone();
        let dispatcher = self.dispatcher.clone();
        let stop = self.stop.clone();
        *reader = Some(thread::spawn(move || {
            read_loop(socket, state, dispatcher, stop)
        }));
        Ok(())
    }

    /// Close the channel. Safe to call repeatedly or before `open`.
    pub fn close(&self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.reader.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ControlConnection {
    fn drop(&mut self) {
        self.close();
    }
}

fn control_endpoint(server_url: &str, client_id: &str) -> Result<Url> {
    let raw = format!("{}/ws/{}", server_url.trim_end_matches('/'), client_id);
    Url::parse(&raw).with_context(|| format!("invalid control endpoint {raw}"))
}

fn set_read_timeout(socket: &ControlSocket) {
    match socket.get_ref() {
        MaybeTlsStream::Plain(stream) => {
            let _ = stream.set_read_timeout(Some(READ_POLL));
        }
        MaybeTlsStream::NativeTls(stream) => {
            let _ = stream.get_ref().set_read_timeout(Some(READ_POLL));
        }
        _ => {}
    }
}

fn read_loop(
    mut socket: ControlSocket,
    state: SharedViewState,
    dispatcher: Arc<Dispatcher>,
    stop: Arc<AtomicBool>,
) {
    let mut last_ping = Instant::now();

    loop {
        if stop.load(Ordering::SeqCst) {
            break;
        }

        if last_ping.elapsed() >= PING_INTERVAL {
            let _ = socket.send(Message::text("ping"));
            last_ping = Instant::now();
        }

        match socket.read() {
            Ok(Message::Text(text)) => handle_frame(text.as_str(), &dispatcher),
            Ok(Message::Ping(payload)) => {
                let _ = socket.send(Message::Pong(payload));
            }
            Ok(Message::Close(_)) => {
                info!("control channel closed by server");
                break;
            }
            // Binary frames do not occur on this channel
            Ok(_) => {}
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                thread::sleep(READ_POLL);
            }
            Err(err) => {
                warn!("control channel error: {err}");
                break;
            }
        }
    }

    let _ = socket.close(None);
    let _ = socket.flush();
    state.lock().unwrap().connected = false;
    info!("control channel disconnected");
}

/// Parse and dispatch one inbound text frame. Bad frames are dropped, the
/// channel stays open.
fn handle_frame(raw: &str, dispatcher: &Arc<Dispatcher>) {
    // Keepalive reply, not a command
    if raw == "pong" {
        return;
    }
    match parse_frame(raw) {
        Some(envelope) => dispatcher.dispatch(envelope),
        None => debug!("dropping unparsable control frame: {raw:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentProvider, DrawOp, RawImage, RenderHost};
    use crate::view::highlight::HighlightInstruction;
    use crate::view::ViewState;

    struct NullDoc;

    impl DocumentProvider for NullDoc {
        fn page_count(&self) -> u32 {
            0
        }

        fn page_width(&self, _page: u32) -> f32 {
            612.0
        }

        fn operator_list(&self, _page: u32) -> Result<Vec<DrawOp>> {
            Ok(Vec::new())
        }

        fn image_object(&self, _page: u32, _object: &str) -> Result<RawImage> {
            anyhow::bail!("no objects")
        }
    }

    struct NullHost;

    impl RenderHost for NullHost {
        fn scroll_to_page(&self, _page: u32) {}
        fn apply_highlight(&self, _page: u32, _instruction: &HighlightInstruction) {}
        fn clear_annotations(&self) {}
        fn show_bitmap(&self, _bitmap: &image::RgbaImage) {}
    }

    #[test]
    fn endpoint_includes_client_id() {
        let url = control_endpoint("ws://127.0.0.1:8000", "client_ab12").unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:8000/ws/client_ab12");

        // Trailing slash must not double up
        let url = control_endpoint("ws://example.com/", "c1").unwrap();
        assert_eq!(url.as_str(), "ws://example.com/ws/c1");
    }

    #[test]
    fn close_is_idempotent_and_safe_before_open() {
        let state = ViewState::new_shared();
        let dispatcher = Arc::new(Dispatcher::new(
            state.clone(),
            Arc::new(NullDoc),
            Arc::new(NullHost),
        ));
        let connection = ControlConnection::new(state.clone(), dispatcher);

        connection.close();
        connection.close();
        assert!(!state.lock().unwrap().connected);
    }

    #[test]
    fn failed_connect_leaves_connected_false() {
        let state = ViewState::new_shared();
        let dispatcher = Arc::new(Dispatcher::new(
            state.clone(),
            Arc::new(NullDoc),
            Arc::new(NullHost),
        ));
        let connection = ControlConnection::new(state.clone(), dispatcher);

        // Nothing listens on this port
        let session = Session::new("c1", "doc", "token");
        assert!(connection.open("ws://127.0.0.1:9", &session).is_err());
        assert!(!state.lock().unwrap().connected);
    }
}
