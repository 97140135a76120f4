//! Engine wiring: one value owning both channels and the shared view state.
//!
//! Constructed once per presentation view with an explicit [`Session`] and
//! the two collaborator implementations; destroyed when the view is torn
//! down, which closes both channels and runs full audio teardown.

use std::sync::Arc;

use anyhow::Result;

use crate::audio::capture::{AudioSource, CpalSource};
use crate::audio::{AudioPipeline, AudioTransport, PipelineState, WsAudioTransport};
use crate::commands::dispatcher::Dispatcher;
use crate::control::ControlConnection;
use crate::document::{DocumentProvider, RenderHost};
use crate::session::Session;
use crate::view::{viewport, SharedViewState, ViewState};

/// Construction-time knobs. One server base URL covers both channels.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub server_url: String,
    /// Fixed horizontal margin subtracted from the container width when
    /// fitting a page.
    pub page_margin: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8000".to_string(),
            page_margin: 40.0,
        }
    }
}

pub struct Engine {
    session: Session,
    config: EngineConfig,
    state: SharedViewState,
    dispatcher: Arc<Dispatcher>,
    control: ControlConnection,
    audio: AudioPipeline,
    provider: Arc<dyn DocumentProvider>,
}

impl Engine {
    /// Engine with the production backends (cpal microphone, WebSocket
    /// audio transport).
    pub fn new(
        session: Session,
        config: EngineConfig,
        provider: Arc<dyn DocumentProvider>,
        host: Arc<dyn RenderHost>,
    ) -> Self {
        let source = Arc::new(CpalSource);
        let transport = Arc::new(WsAudioTransport::new(config.server_url.clone()));
        Self::with_backends(session, config, provider, host, source, transport)
    }

    /// Engine with explicit capture and transport backends.
    pub fn with_backends(
        session: Session,
        config: EngineConfig,
        provider: Arc<dyn DocumentProvider>,
        host: Arc<dyn RenderHost>,
        source: Arc<dyn AudioSource>,
        transport: Arc<dyn AudioTransport>,
    ) -> Self {
        let state = ViewState::new_shared();
        let dispatcher = Arc::new(Dispatcher::new(state.clone(), provider.clone(), host));
        dispatcher.document_loaded(provider.page_count());

        let control = ControlConnection::new(state.clone(), dispatcher.clone());
        let audio = AudioPipeline::new(state.clone(), source, transport, session.client_id.clone());

        Self {
            session,
            config,
            state,
            dispatcher,
            control,
            audio,
            provider,
        }
    }

    /// Open the control channel for this session.
    pub fn connect(&self) -> Result<()> {
        self.control.open(&self.config.server_url, &self.session)
    }

    /// Toggle the audio capture pipeline.
    pub fn set_listening(&self, on: bool) {
        self.audio.set_listening(on);
    }

    pub fn audio_phase(&self) -> PipelineState {
        self.audio.phase()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> &SharedViewState {
        &self.state
    }

    /// Dispatcher handle for collaborator lifecycle hooks
    /// (`document_loaded`, `page_scrolled_into_view`).
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Container width changed: recompute the base display scale from the
    /// active page's intrinsic width.
    pub fn container_resized(&self, container_width: f32) {
        let active_page = self.state.lock().unwrap().active_page;
        let page_width = self.provider.page_width(active_page);
        let scale =
            viewport::recompute_base_scale(container_width, page_width, self.config.page_margin);
        self.state.lock().unwrap().set_base_scale(scale);
    }

    /// Tear down both channels. Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        self.audio.set_listening(false);
        self.control.close();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
