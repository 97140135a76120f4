//! Demo harness: wires the engine to a live control server and drives it
//! from the terminal. The document and render host are synthetic; this
//! binary exercises the engine, it does not render anything.

use std::io::{self, BufRead};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::Parser;
use log::{info, LevelFilter};
use rand::distributions::Alphanumeric;
use rand::Rng;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use lectern::document::{DocumentProvider, DrawOp, PageArena, RawImage, RenderHost};
use lectern::view::highlight::HighlightInstruction;
use lectern::{Engine, EngineConfig, Session};

#[derive(Parser)]
#[command(
    name = "lectern",
    about = "Remote-controlled presentation engine (demo harness)"
)]
struct Args {
    /// WebSocket server base URL; serves both the control and audio channels
    #[arg(long, default_value = "ws://127.0.0.1:8000")]
    server: String,

    /// Document id this view presents
    #[arg(long, default_value = "demo-doc")]
    document: String,

    /// Auth token forwarded by the outer application
    #[arg(long, default_value = "")]
    token: String,

    /// Client id; generated when omitted
    #[arg(long)]
    client_id: Option<String>,

    /// Container width in pixels, for base-scale fitting
    #[arg(long, default_value_t = 1280.0)]
    width: f32,

    /// Page count of the synthetic demo document
    #[arg(long, default_value_t = 5)]
    pages: u32,
}

/// Synthetic document: letter-width pages, two embedded images on page 1.
struct DemoDocument {
    pages: u32,
}

impl DocumentProvider for DemoDocument {
    fn page_count(&self) -> u32 {
        self.pages
    }

    fn page_width(&self, _page: u32) -> f32 {
        612.0
    }

    fn operator_list(&self, page: u32) -> Result<Vec<DrawOp>> {
        if page == 1 {
            let gradient: Vec<u8> = (0..64).map(|i| (i * 4) as u8).collect();
            Ok(vec![
                DrawOp::Other,
                DrawOp::PaintInlineImage {
                    image: RawImage::Raw {
                        width: 8,
                        height: 8,
                        data: gradient,
                    },
                },
                DrawOp::PaintImage {
                    object: "img1".into(),
                },
                DrawOp::Other,
            ])
        } else {
            Ok(vec![DrawOp::Other])
        }
    }

    fn image_object(&self, _page: u32, _object: &str) -> Result<RawImage> {
        // 2x2 RGB checker
        Ok(RawImage::Raw {
            width: 2,
            height: 2,
            data: vec![255, 0, 0, 0, 0, 255, 0, 0, 255, 255, 0, 0],
        })
    }
}

/// Render host that logs every request instead of painting.
struct LoggingHost {
    arena: Mutex<PageArena<()>>,
}

impl LoggingHost {
    fn new(pages: u32) -> Self {
        let mut arena = PageArena::new();
        // The demo mounts every page up front; a real host mounts and
        // unmounts from its view lifecycle hooks.
        for page in 1..=pages {
            arena.mount(page, ());
        }
        Self {
            arena: Mutex::new(arena),
        }
    }
}

impl RenderHost for LoggingHost {
    fn scroll_to_page(&self, page: u32) {
        if self.arena.lock().unwrap().is_mounted(page) {
            info!("render: scroll page {page} into view");
        } else {
            info!("render: page {page} not mounted, scroll skipped");
        }
    }

    fn apply_highlight(&self, page: u32, instruction: &HighlightInstruction) {
        info!(
            "render: highlight page {page} tokens {}..{} {:?}",
            instruction.start_index, instruction.end_index, instruction.style
        );
    }

    fn clear_annotations(&self) {
        info!("render: clear annotations");
    }

    fn show_bitmap(&self, bitmap: &image::RgbaImage) {
        info!("render: show {}x{} bitmap", bitmap.width(), bitmap.height());
    }
}

fn generate_client_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(4)
        .map(char::from)
        .collect();
    format!("client_{}", suffix.to_lowercase())
}

fn print_status(engine: &Engine) {
    let state = engine.state().lock().unwrap();
    info!(
        "page {}/{} zoom {:.2} base {:.2} connected={} listening={} transcript={:?}",
        state.active_page,
        state.num_pages,
        state.zoom_level,
        state.base_scale,
        state.connected,
        state.listening,
        state.transcript
    );
}

fn main() -> Result<()> {
    let args = Args::parse();
    TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let client_id = args.client_id.clone().unwrap_or_else(generate_client_id);
    info!("session client id: {client_id}");

    let session = Session::new(client_id, args.document.clone(), args.token.clone());
    let provider = Arc::new(DemoDocument { pages: args.pages });
    let host = Arc::new(LoggingHost::new(args.pages));
    let config = EngineConfig {
        server_url: args.server.clone(),
        ..Default::default()
    };

    let engine = Engine::new(session, config, provider, host);
    engine.container_resized(args.width);
    engine.connect()?;

    info!("console commands: listen on | listen off | status | quit");
    for line in io::stdin().lock().lines() {
        let line = line?;
        match line.trim() {
            "listen on" => engine.set_listening(true),
            "listen off" => engine.set_listening(false),
            "status" => print_status(&engine),
            "quit" | "exit" => break,
            "" => {}
            other => info!("unknown console command {other:?}"),
        }
    }

    engine.shutdown();
    Ok(())
}
