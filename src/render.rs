//! Renderer collaborator interface. The core never touches GPU resources;
//! it hands the display layer two decoded images and a fade fraction.

use anyhow::Result;
use tracing::{debug, info};

use crate::config::FitMode;
use crate::decode::DecodedImage;

/// Display-side collaborator called once per tick.
///
/// `foreground` is the outgoing slide, `background` the incoming one; `fade`
/// runs 0 -> 1 over the transition. Either image may be absent while a slot
/// is still loading or has failed; implementations are expected to keep
/// showing what they have.
pub trait Renderer {
    fn present(
        &mut self,
        foreground: Option<&DecodedImage>,
        background: Option<&DecodedImage>,
        fade: f32,
        fit: FitMode,
    ) -> Result<()>;

    /// Show a status line instead of (or on top of) the slides, e.g. scan
    /// progress or "No images selected!".
    fn status(&mut self, line: &str) -> Result<()>;
}

/// Headless renderer that reports transitions through tracing. Keeps the
/// binary runnable without a display attached and keeps tests honest.
#[derive(Debug, Default)]
pub struct TraceRenderer {
    fading: bool,
    last_status: String,
}

impl Renderer for TraceRenderer {
    fn present(
        &mut self,
        foreground: Option<&DecodedImage>,
        background: Option<&DecodedImage>,
        fade: f32,
        fit: FitMode,
    ) -> Result<()> {
        if fade < 1.0 {
            if !self.fading {
                self.fading = true;
                debug!(
                    fg = foreground.map(|i| (i.width, i.height)).map(|(w, h)| format!("{w}x{h}")),
                    bg = background.map(|i| (i.width, i.height)).map(|(w, h)| format!("{w}x{h}")),
                    ?fit,
                    "transition started"
                );
            }
        } else if self.fading {
            self.fading = false;
            debug!("transition complete");
        }
        Ok(())
    }

    fn status(&mut self, line: &str) -> Result<()> {
        if line != self.last_status {
            info!(status = line);
            self.last_status = line.to_string();
        }
        Ok(())
    }
}
