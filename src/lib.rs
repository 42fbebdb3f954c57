//! Slideshow core for a headless picture frame: library scanning, decode
//! workers, the slide carousel, and the show state machine. The display
//! layer plugs in through [`render::Renderer`].

pub mod carousel;
pub mod config;
pub mod decode;
pub mod error;
pub mod fade;
pub mod library;
pub mod render;
pub mod rules;
pub mod show;

pub use error::Error;
