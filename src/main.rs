use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use flick::keybindings::{dispatch, Command, Flow, Key};
use flick::{DisplaySurface, FileDecoder, MediaList, SharedImage, Viewer, ViewerConfig, ViewerError};

/// Prints what would be on screen.
struct TerminalDisplay;

impl DisplaySurface for TerminalDisplay {
    fn show(&mut self, image: SharedImage) {
        let (src_w, src_h) = image.source_dimensions();
        let quality = if image.is_preview() { "preview" } else { "full" };
        println!(
            "image {}x{} ({}, source {}x{})",
            image.width(),
            image.height(),
            quality,
            src_w,
            src_h
        );
    }

    fn show_video_at(&mut self, path: &Path) {
        println!("video {}", path.display());
    }

    fn show_unavailable(&mut self, path: &Path) {
        println!("unavailable {}", path.display());
    }

    fn clear(&mut self) {
        println!("(empty)");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("flick=info".parse()?),
        )
        .init();

    let arg = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: flick <image-or-folder>")?;
    let target = std::fs::canonicalize(&arg)
        .with_context(|| format!("cannot open {}", arg.display()))?;

    let (folder, start) = if target.is_dir() {
        (target, None)
    } else {
        let folder = target
            .parent()
            .map(Path::to_path_buf)
            .context("file has no parent folder")?;
        (folder, Some(target))
    };

    let list = MediaList::scan_async(folder.clone()).await?;
    if list.is_empty() {
        bail!("no supported media in {}", folder.display());
    }

    let config = ViewerConfig::from_env();
    info!(?config, "Starting viewer");
    let mut viewer = Viewer::new(config, Arc::new(FileDecoder), TerminalDisplay)?;

    let first = list.paths()[0].clone();
    match viewer.select_in(list, start.as_deref().unwrap_or(&first)) {
        Ok(_) => {}
        Err(ViewerError::NotFound(path)) => {
            warn!(?path, "Not a supported media file, opening the first item");
            viewer.jump_to(0)?;
        }
        Err(e) => return Err(e.into()),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tick = tokio::time::interval(Duration::from_millis(16));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let Some(command) = Key::parse(&line).and_then(Command::from_key) else {
                    if !line.trim().is_empty() {
                        warn!(input = line.trim(), "Unknown key");
                    }
                    continue;
                };
                if dispatch(&mut viewer, command)? == Flow::Exit {
                    break;
                }
                if let Some(path) = viewer.current_path() {
                    println!("[{}/{}] {}", viewer.position().map_or(0, |i| i + 1), viewer.list().len(), path.display());
                }
            }
            _ = tick.tick() => {
                viewer.pump();
            }
        }
    }

    info!("Exiting");
    Ok(())
}
