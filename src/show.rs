//! Headless show driver: runs the scan / no-slides / slideshow state
//! machine at the display tick rate and feeds the renderer collaborator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::carousel::Carousel;
use crate::config::{Configuration, FitMode};
use crate::decode::DecodePool;
use crate::error::Error;
use crate::fade::FadeClock;
use crate::library::Library;
use crate::render::Renderer;

#[derive(Debug, Clone)]
pub struct ShowOptions {
    pub slide_delay: Duration,
    pub fade_duration: Duration,
    pub tick: Duration,
    pub fit: FitMode,
    pub shuffle: bool,
    pub ring_size: usize,
    pub reshuffle_after_passes: u32,
    /// Stop after this many full passes through the catalog; `None` runs
    /// until the keep-running flag is cleared.
    pub max_passes: Option<u64>,
}

impl ShowOptions {
    pub fn from_config(cfg: &Configuration) -> Self {
        Self {
            slide_delay: cfg.slide_delay,
            fade_duration: cfg.fade_duration,
            tick: cfg.tick(),
            fit: cfg.fit,
            shuffle: cfg.shuffle,
            ring_size: cfg.ring_size,
            reshuffle_after_passes: cfg.reshuffle_after_passes,
            max_passes: None,
        }
    }
}

enum State {
    InitScan,
    Scanning,
    NoSlides,
    Slideshow { carousel: Carousel, next_at: Instant },
}

/// Run the show loop until the keep-running flag clears or the configured
/// pass count is reached.
///
/// Individual file failures never abort the loop; the renderer is given a
/// status line instead of slides whenever there is nothing to display.
pub fn run_show(
    opts: &ShowOptions,
    library: &Library,
    pool: &DecodePool,
    renderer: &mut dyn Renderer,
    running: &AtomicBool,
) -> Result<()> {
    let mut state = State::InitScan;
    let mut passes: u64 = 0;

    while running.load(Ordering::Relaxed) {
        state = match state {
            State::InitScan => {
                // The scan thread is detached; completion is observed through
                // the library, not by joining.
                let _ = library
                    .start_scan(opts.shuffle)
                    .context("starting library scan")?;
                renderer.status("Scanning...")?;
                State::Scanning
            }

            State::Scanning => {
                if library.is_scanning() {
                    match library.current_entry() {
                        Some(entry) => {
                            renderer.status(&format!("Scanning: {}/{}", entry.dir, entry.file))?;
                        }
                        None => renderer.status("Scanning...")?,
                    }
                    State::Scanning
                } else {
                    match library.take_catalog() {
                        Some(Ok(catalog)) if catalog.is_empty() => {
                            warn!("scan selected no images");
                            State::NoSlides
                        }
                        Some(Ok(catalog)) => {
                            info!(
                                entries = catalog.entry_count(),
                                directories = catalog.dir_count(),
                                "catalog ready"
                            );
                            catalog.dump();
                            let fade = FadeClock::new(opts.fade_duration, opts.tick);
                            let mut carousel = Carousel::new(
                                catalog,
                                library.root().to_path_buf(),
                                opts.ring_size,
                                pool.handle(),
                                fade,
                            )?;
                            match carousel.prime() {
                                Ok(()) => State::Slideshow {
                                    carousel,
                                    next_at: Instant::now() + opts.slide_delay,
                                },
                                Err(err) => {
                                    error!(error = %err, "could not display a first slide");
                                    State::NoSlides
                                }
                            }
                        }
                        Some(Err(err)) => {
                            error!(error = %err, "library scan failed");
                            State::NoSlides
                        }
                        // Completed but already collected; keep waiting.
                        None => State::Scanning,
                    }
                }
            }

            State::NoSlides => {
                renderer.status("No images selected!")?;
                if opts.max_passes.is_some() {
                    return Err(Error::EmptyCatalog.into());
                }
                State::NoSlides
            }

            State::Slideshow {
                mut carousel,
                mut next_at,
            } => {
                // Harvest finished decodes every tick so a slide becomes
                // visible (and failed slots retry) without waiting for the
                // next advance.
                carousel.refresh();
                let fade = carousel.fade_tick();
                renderer.present(carousel.foreground(), carousel.background(), fade, opts.fit)?;

                if Instant::now() >= next_at {
                    let pass_complete = carousel.advance(1);
                    let entry = carousel.focus_entry();
                    debug!(dir = %entry.dir, file = %entry.file, "next slide");
                    next_at += opts.slide_delay;

                    if pass_complete {
                        passes += 1;
                        info!(passes, "catalog pass complete");
                        if let Some(max) = opts.max_passes {
                            if passes >= max {
                                return Ok(());
                            }
                        }
                        // A zero cadence reshuffles on every pass rather
                        // than dividing by zero.
                        if passes % u64::from(opts.reshuffle_after_passes.max(1)) == 0 {
                            // Rescan and reshuffle; the old carousel and any
                            // in-flight decodes are dropped wholesale.
                            state = State::InitScan;
                            continue;
                        }
                    }
                }
                State::Slideshow { carousel, next_at }
            }
        };

        std::thread::sleep(opts.tick);
    }
    info!("show loop stopped");
    Ok(())
}
