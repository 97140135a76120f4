//! End-to-end control channel test against a loopback WebSocket server.

use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use lectern::document::{DocumentProvider, DrawOp, RawImage, RenderHost};
use lectern::view::highlight::{HighlightInstruction, HighlightKind};
use lectern::{Engine, EngineConfig, Session};
use tungstenite::Message;

struct FakeDoc;

impl DocumentProvider for FakeDoc {
    fn page_count(&self) -> u32 {
        5
    }

    fn page_width(&self, _page: u32) -> f32 {
        612.0
    }

    fn operator_list(&self, _page: u32) -> Result<Vec<DrawOp>> {
        Ok(vec![DrawOp::PaintInlineImage {
            image: RawImage::Raw {
                width: 1,
                height: 1,
                data: vec![128],
            },
        }])
    }

    fn image_object(&self, _page: u32, _object: &str) -> Result<RawImage> {
        anyhow::bail!("no referenced objects in this document")
    }
}

#[derive(Default)]
struct RecordingHost {
    scrolls: Mutex<Vec<u32>>,
}

impl RenderHost for RecordingHost {
    fn scroll_to_page(&self, page: u32) {
        self.scrolls.lock().unwrap().push(page);
    }

    fn apply_highlight(&self, _page: u32, _instruction: &HighlightInstruction) {}
    fn clear_annotations(&self) {}
    fn show_bitmap(&self, _bitmap: &image::RgbaImage) {}
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn frames_drive_view_state_in_arrival_order() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut ws = tungstenite::accept(stream).unwrap();

        // Keepalive noise and garbage must be swallowed without closing
        // the channel or disturbing later commands.
        ws.send(Message::text(r#"{"type":"navigate","data":{"page":"3"}}"#))
            .unwrap();
        ws.send(Message::text("pong")).unwrap();
        ws.send(Message::text("definitely not json")).unwrap();
        ws.send(Message::text(r#"{"type":"warp","data":{}}"#)).unwrap();
        ws.send(Message::text(
            r#"{"type":"highlight","data":{"page":"2","start":"10","end":"20"}}"#,
        ))
        .unwrap();
        ws.send(Message::text(r#"{"type":"zoom","data":{"delta":"5"}}"#))
            .unwrap();
        ws.send(Message::text(
            r#"{"type":"speech","data":{"text":"all commands sent"}}"#,
        ))
        .unwrap();

        // Hold the socket open until the client saw everything, then die
        thread::sleep(Duration::from_millis(500));
    });

    let session = Session::new("client_test", "doc-1", "token");
    let config = EngineConfig {
        server_url: format!("ws://127.0.0.1:{port}"),
        ..Default::default()
    };
    let host = Arc::new(RecordingHost::default());
    let engine = Engine::new(session, config, Arc::new(FakeDoc), host.clone());

    engine.connect().expect("loopback connect");
    assert!(wait_until(Duration::from_secs(2), || {
        engine.state().lock().unwrap().connected
    }));

    // The speech frame is last; once it lands, everything before it has
    // been dispatched.
    assert!(wait_until(Duration::from_secs(5), || {
        engine.state().lock().unwrap().transcript == "all commands sent"
    }));

    {
        let state = engine.state().lock().unwrap();
        assert_eq!(state.active_page, 2, "highlight navigates to its page");
        assert_eq!(state.zoom_level, 3.0, "delta 5 clamps to the ceiling");
        let region = &state.highlights[&2];
        assert_eq!(region.start_index, 10);
        assert_eq!(region.end_index, 20);
        assert_eq!(region.kind, HighlightKind::Marker);
        assert_eq!(region.color, "yellow");
    }
    assert_eq!(*host.scrolls.lock().unwrap(), vec![3, 2]);

    // Server went away: connected must drop without any reconnect attempt
    server.join().unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        !engine.state().lock().unwrap().connected
    }));

    engine.shutdown();
    engine.shutdown();
}

#[test]
fn shutdown_while_connected_is_clean() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut ws = tungstenite::accept(stream).unwrap();
        // Serve until the client closes
        loop {
            match ws.read() {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    });

    let session = Session::new("client_quit", "doc-1", "token");
    let config = EngineConfig {
        server_url: format!("ws://127.0.0.1:{port}"),
        ..Default::default()
    };
    let engine = Engine::new(
        session,
        config,
        Arc::new(FakeDoc),
        Arc::new(RecordingHost::default()),
    );

    engine.connect().expect("loopback connect");
    assert!(wait_until(Duration::from_secs(2), || {
        engine.state().lock().unwrap().connected
    }));

    engine.shutdown();
    assert!(!engine.state().lock().unwrap().connected);

    server.join().unwrap();
}
