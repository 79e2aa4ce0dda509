pub mod config;
pub mod encoding;
pub mod error;
pub mod font_assets;
pub mod frames;
pub mod generator;
pub mod library;
pub mod naming;
pub mod params;
#[cfg(feature = "server")]
pub mod server;
pub mod service;
pub mod text;

pub use error::{ScrollError, ScrollResult};
pub use generator::{generate, Generator};
pub use params::{Canvas, GenerationRequest, RenderParameters, Rgb8};
