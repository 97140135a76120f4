//! Audio capture pipeline: microphone → 16-bit PCM → audio channel.
//!
//! Driven solely by the listening toggle. One worker thread owns both the
//! capture graph and the audio socket for its whole life, so teardown order
//! is enforced structurally: the capture graph is stopped and the
//! microphone released before the channel closes, and no frame is sent
//! once teardown begins.

pub mod capture;

use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};
use url::Url;

use crate::view::SharedViewState;
use self::capture::{encode_pcm, AudioSource};

/// Transcript shown when the microphone cannot be acquired.
pub const MIC_ERROR_TRANSCRIPT: &str = "Microphone unavailable";

/// Samples drained per frame (~85ms at 48kHz).
const FRAME_SAMPLES: usize = 4096;

/// Worker sleep while the ring buffer is empty.
const DRAIN_POLL: Duration = Duration::from_millis(10);

/// Read timeout on the audio socket; only used to poll for a server close.
const CLOSE_POLL: Duration = Duration::from_millis(5);

/// Lifecycle of the capture side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Requesting,
    Streaming,
    Stopping,
}

/// Frame sink for the pipeline; production sends over the audio WebSocket,
/// tests record.
pub trait AudioChannel {
    fn send_frame(&mut self, frame: &[u8]) -> Result<()>;

    /// True once the remote side closed or the transport failed.
    fn remote_closed(&mut self) -> bool;

    fn close(&mut self);
}

/// Connects the audio channel for a client id.
pub trait AudioTransport: Send + Sync {
    fn connect(&self, client_id: &str) -> Result<Box<dyn AudioChannel>>;
}

/// WebSocket transport at `{server}/ws/audio/{client_id}`.
pub struct WsAudioTransport {
    server_url: String,
}

impl WsAudioTransport {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
        }
    }
}

impl AudioTransport for WsAudioTransport {
    fn connect(&self, client_id: &str) -> Result<Box<dyn AudioChannel>> {
        let raw = format!(
            "{}/ws/audio/{}",
            self.server_url.trim_end_matches('/'),
            client_id
        );
        let endpoint =
            Url::parse(&raw).with_context(|| format!("invalid audio endpoint {raw}"))?;
        let (socket, _response) = tungstenite::connect(endpoint.as_str())
            .with_context(|| format!("audio channel connect to {endpoint}"))?;

        match socket.get_ref() {
            MaybeTlsStream::Plain(stream) => {
                let _ = stream.set_read_timeout(Some(CLOSE_POLL));
            }
            MaybeTlsStream::NativeTls(stream) => {
                let _ = stream.get_ref().set_read_timeout(Some(CLOSE_POLL));
            }
            _ => {}
        }
        Ok(Box::new(WsAudioChannel { socket }))
    }
}

struct WsAudioChannel {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
}

impl AudioChannel for WsAudioChannel {
    fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.socket.send(Message::Binary(frame.to_vec().into()))?;
        Ok(())
    }

    fn remote_closed(&mut self) -> bool {
        match self.socket.read() {
            Ok(Message::Close(_)) => true,
            // Server chatter on the audio channel is ignored
            Ok(_) => false,
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                false
            }
            Err(_) => true,
        }
    }

    fn close(&mut self) {
        let _ = self.socket.close(None);
        let _ = self.socket.flush();
    }
}

/// Owner of the audio subsystem; one per presentation view.
pub struct AudioPipeline {
    state: SharedViewState,
    source: Arc<dyn AudioSource>,
    transport: Arc<dyn AudioTransport>,
    client_id: String,
    phase: Arc<Mutex<PipelineState>>,
    stop: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AudioPipeline {
    pub fn new(
        state: SharedViewState,
        source: Arc<dyn AudioSource>,
        transport: Arc<dyn AudioTransport>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            state,
            source,
            transport,
            client_id: client_id.into(),
            phase: Arc::new(Mutex::new(PipelineState::Idle)),
            stop: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    pub fn phase(&self) -> PipelineState {
        *self.phase.lock().unwrap()
    }

    /// Toggle listening. Idempotent in both directions.
    pub fn set_listening(&self, on: bool) {
        if on {
            self.start();
        } else {
            self.stop();
        }
    }

    fn start(&self) {
        let mut worker = self.worker.lock().unwrap();
        if let Some(handle) = worker.take() {
            if !handle.is_finished() {
                // Already listening
                *worker = Some(handle);
                return;
            }
            let _ = handle.join();
        }

        *self.phase.lock().unwrap() = PipelineState::Requesting;
        self.state.lock().unwrap().listening = true;
        self.stop.store(false, Ordering::SeqCst);

        let client_id = self.client_id.clone();
        let source = self.source.clone();
        let transport = self.transport.clone();
        let state = self.state.clone();
        let phase = self.phase.clone();
        let stop = self.stop.clone();
        *worker = Some(thread::spawn(move || {
            run_capture(client_id, source, transport, state, phase, stop);
        }));
    }

    /// Tear down. Safe to invoke redundantly from unmount, navigation-away,
    /// or error paths.
    fn stop(&self) {
        {
            let mut phase = self.phase.lock().unwrap();
            if *phase == PipelineState::Requesting || *phase == PipelineState::Streaming {
                *phase = PipelineState::Stopping;
            }
        }
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
        self.state.lock().unwrap().listening = false;
        *self.phase.lock().unwrap() = PipelineState::Idle;
    }
}

impl Drop for AudioPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Worker body. Owns the channel and the capture handle; both die here.
fn run_capture(
    client_id: String,
    source: Arc<dyn AudioSource>,
    transport: Arc<dyn AudioTransport>,
    state: SharedViewState,
    phase: Arc<Mutex<PipelineState>>,
    stop: Arc<AtomicBool>,
) {
    // Channel first, microphone second: the microphone is only requested
    // once there is an open socket to stream into.
    // Transport faults are status-only; no transcript message
    let mut channel = match transport.connect(&client_id) {
        Ok(channel) => channel,
        Err(err) => {
            warn!("audio channel connect failed: {err:#}");
            finish(&state, &phase);
            return;
        }
    };

    // Toggled off while the socket was connecting
    if stop.load(Ordering::SeqCst) {
        channel.close();
        finish(&state, &phase);
        return;
    }

    let mut handle = match source.open() {
        Ok(handle) => handle,
        Err(err) => {
            warn!("microphone unavailable: {err:#}");
            channel.close();
            fail(&state, &phase);
            return;
        }
    };

    *phase.lock().unwrap() = PipelineState::Streaming;
    info!("audio streaming started ({} Hz mono)", capture::SAMPLE_RATE);

    let mut buf = vec![0.0f32; FRAME_SAMPLES];
    while !stop.load(Ordering::SeqCst) {
        if channel.remote_closed() {
            info!("audio channel closed by server");
            break;
        }

        let n = handle.read_samples(&mut buf);
        if n == 0 {
            thread::sleep(DRAIN_POLL);
            continue;
        }

        let frame = encode_pcm(&buf[..n]);
        if let Err(err) = channel.send_frame(&frame) {
            warn!("audio frame send failed: {err}");
            break;
        }
    }

    // Ordered teardown: stop capture and release the microphone before the
    // channel closes, so no frame can chase a closing socket.
    drop(handle);
    channel.close();
    finish(&state, &phase);
}

/// Normal exit: listening off, back to idle.
fn finish(state: &SharedViewState, phase: &Arc<Mutex<PipelineState>>) {
    state.lock().unwrap().listening = false;
    *phase.lock().unwrap() = PipelineState::Idle;
}

/// Acquisition failure: like finish, plus the user-visible error state.
fn fail(state: &SharedViewState, phase: &Arc<Mutex<PipelineState>>) {
    {
        let mut state = state.lock().unwrap();
        state.listening = false;
        state.set_transcript(MIC_ERROR_TRANSCRIPT);
    }
    *phase.lock().unwrap() = PipelineState::Idle;
}
