use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "beatride",
    author,
    version,
    about = "Shader-driven rhythm ride demo"
)]
pub struct Cli {
    /// Content tree root holding `packs/`, `lang/`, and `shaders/`.
    #[arg(
        long,
        value_name = "DIR",
        env = "BEATRIDE_CONTENT_DIR",
        default_value = "content"
    )]
    pub content_dir: PathBuf,

    /// Language table to load from `<content>/lang/<LANG>.toml`; defaults to
    /// the persisted preference.
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Window size (e.g. `1280x720`).
    #[arg(
        long,
        value_name = "WIDTHxHEIGHT",
        value_parser = parse_window_size,
        default_value = "1280x720"
    )]
    pub size: (u32, u32),

    /// Output device name; overrides the persisted preference.
    #[arg(long, value_name = "NAME")]
    pub audio_device: Option<String>,

    /// Skip audio device setup entirely.
    #[arg(long)]
    pub no_audio: bool,

    /// Start with the debug overlay visible.
    #[arg(long)]
    pub overlay: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_window_size(value: &str) -> Result<(u32, u32), String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT format, e.g. 1280x720".to_string())?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in '{trimmed}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in '{trimmed}'"))?;
    if width == 0 || height == 0 {
        return Err("window dimensions must be greater than zero".to_string());
    }
    Ok((width, height))
}
