//! Startup wiring: tracing, preferences, content scan, audio, then the
//! frame driver handoff.

use std::path::Path;

use anyhow::{Context, Result};
use content::{ContentLibrary, LanguageTable};
use engine::{AudioHost, FrameConfig, OverlayLog, ResourceLoader};
use preprocess::Preprocessor;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::prefs::Prefs;
use crate::shared::GameShared;
use crate::states::LogoState;
use crate::synth;

pub fn run(args: Cli) -> Result<()> {
    let overlay_log = OverlayLog::default();
    initialise_tracing(&overlay_log);

    let prefs_path = Prefs::default_path();
    let mut prefs = match &prefs_path {
        Ok(path) => Prefs::load_or_default(path).unwrap_or_else(|err| {
            warn!(error = %err, "preferences unreadable, using defaults");
            Prefs::default()
        }),
        Err(err) => {
            warn!(error = %err, "no config directory, preferences disabled");
            Prefs::default()
        }
    };

    let content_root = args.content_dir.clone();
    let library = ContentLibrary::scan(&content_root)
        .with_context(|| format!("content scan failed at {}", content_root.display()))?;

    let language = args
        .language
        .clone()
        .unwrap_or_else(|| prefs.language.clone());
    let lang_path = content_root.join("lang").join(format!("{language}.toml"));
    let lang = match LanguageTable::load(&lang_path) {
        Ok(table) => {
            info!(language = %language, entries = table.len(), "language table loaded");
            table
        }
        Err(err) => {
            warn!(error = %err, "language table unavailable, keys will show raw");
            LanguageTable::empty()
        }
    };

    let requested_device = args
        .audio_device
        .clone()
        .or_else(|| prefs.audio_device.clone());
    let mut audio = if args.no_audio {
        info!("audio disabled (--no-audio)");
        AudioHost::disabled()
    } else {
        AudioHost::start(requested_device.as_deref())
    };
    register_clips(&mut audio);

    let resolved = audio.device_name().map(str::to_string);
    if !args.no_audio && resolved.is_some() && resolved != prefs.audio_device {
        prefs.audio_device = resolved;
        if let Ok(path) = &prefs_path {
            match prefs.persist(path) {
                Ok(()) => info!(path = %path.display(), "preferences updated"),
                Err(err) => warn!(error = %err, "failed to persist preferences"),
            }
        }
    }

    let shaders = build_preprocessor(&content_root);
    let shared = GameShared::new(library, lang, shaders);
    let resources = ResourceLoader::new(&content_root);

    let config = FrameConfig {
        title: "beatride".to_string(),
        size: args.size,
        overlay: args.overlay || prefs.overlay,
    };
    engine::frame::run(
        config,
        audio,
        resources,
        overlay_log,
        Box::new(LogoState::new(shared)),
    )
}

fn initialise_tracing(overlay: &OverlayLog) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(overlay.layer())
        .init();
}

fn register_clips(audio: &mut AudioHost) {
    audio.register_clip("move", synth::sine_blip(660.0, 0.09));
    audio.register_clip("confirm", synth::square_blip(440.0, 0.12));
    audio.register_clip("locked", synth::square_blip(110.0, 0.2));
    audio.register_clip("hum", synth::noise_hum(2.0));
}

/// Shared preprocessor for every state; the `common` include comes from the
/// content tree so shader sources can share helpers.
fn build_preprocessor(content_root: &Path) -> Preprocessor {
    let mut shaders = Preprocessor::new();
    let common = content_root.join("shaders").join("common.glsl");
    match std::fs::read_to_string(&common) {
        Ok(body) => shaders.add_include("common", body),
        Err(err) => warn!(path = %common.display(), error = %err, "common include unavailable"),
    }
    shaders
}
