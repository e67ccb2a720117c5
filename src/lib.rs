//! RFox Slides
//!
//! Render templated HTML slides to PNG images through a headless browser,
//! one at a time or as an ordered carousel.
//!
//! # Features
//!
//! - **CDP Backend** (default): drives headless Chrome over the DevTools protocol
//! - **Single Session**: one browser process shared by every render, started lazily
//!   and relaunched when it disconnects
//! - **Carousels**: slides stamped with `position`/`total` and rendered in order
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rfslides::{RenderConfig, SessionManager, SlideData, SlideRenderer, TemplateStore};
//! use rfslides::cdp::ChromeBackend;
//!
//! # async fn run() -> rfslides::Result<()> {
//! let config = RenderConfig::default();
//! let sessions = Arc::new(SessionManager::new(ChromeBackend::default()));
//! let renderer = SlideRenderer::new(TemplateStore::new("templates"), sessions.clone(), config);
//!
//! let slide = SlideData::new().with("layout_style", "centered").with("heading", "Hello");
//! let image = renderer.render_slide(&slide).await?;
//! println!("{}x{} {}", image.width, image.height, image.format);
//!
//! sessions.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod fields;
pub use fields::{SlideData, FIELDS};

pub mod inject;
pub use inject::inject;

pub mod template;
pub use template::TemplateStore;

pub mod session;
pub use session::SessionManager;

#[cfg(feature = "cdp")]
pub mod cdp;

pub mod renderer;
pub use renderer::SlideRenderer;

pub mod carousel;
pub use carousel::{render_carousel, CarouselSlide};

pub mod server;

pub mod config;

use std::fmt;

/// Fixed render target applied to every slide
///
/// Output images are `width * scale` by `height * scale` pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    /// CSS viewport width
    pub width: u32,
    /// CSS viewport height
    pub height: u32,
    /// Device scale factor
    pub scale: f64,
}

impl Geometry {
    pub fn output_width(&self) -> u32 {
        scaled(self.width, self.scale)
    }

    pub fn output_height(&self) -> u32 {
        scaled(self.height, self.scale)
    }
}

fn scaled(px: u32, scale: f64) -> u32 {
    (f64::from(px) * scale).round() as u32
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1350,
            scale: 2.0,
        }
    }
}

/// Configuration shared by every render
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Viewport and scale factor
    pub geometry: Geometry,
    /// Bound on content load (including fonts and images) in milliseconds
    pub timeout_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            geometry: Geometry::default(),
            timeout_ms: 15000,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<()> {
        let g = &self.geometry;
        if g.width == 0 || g.height == 0 {
            return Err(Error::ConfigError("width and height must be non-zero".into()));
        }
        if !(g.scale.is_finite() && g.scale > 0.0) {
            return Err(Error::ConfigError(format!("scale must be positive, got {}", g.scale)));
        }
        if self.timeout_ms == 0 {
            return Err(Error::ConfigError("timeout_ms must be non-zero".into()));
        }
        Ok(())
    }
}

/// Raster format of a rendered image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A captured slide
#[derive(Debug, Clone)]
pub struct RenderedImage {
    /// Encoded image bytes
    pub data: Vec<u8>,
    pub format: ImageFormat,
    /// Pixel width of the image
    pub width: u32,
    /// Pixel height of the image
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RenderConfig::default();
        assert_eq!(config.geometry.width, 1080);
        assert_eq!(config.geometry.height, 1350);
        assert_eq!(config.timeout_ms, 15000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_output_dimensions() {
        let g = Geometry { width: 1080, height: 1350, scale: 2.0 };
        assert_eq!((g.output_width(), g.output_height()), (2160, 2700));
        let g = Geometry { width: 333, height: 100, scale: 1.5 };
        assert_eq!((g.output_width(), g.output_height()), (500, 150));
    }

    #[test]
    fn test_invalid_config() {
        let mut config = RenderConfig::default();
        config.geometry.scale = 0.0;
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
        let config = RenderConfig { timeout_ms: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }
}
