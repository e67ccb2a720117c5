//! Command-line and environment configuration

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{Geometry, RenderConfig, Result};

#[derive(Debug, Parser)]
#[command(name = "rfslides", version, about = "Render templated HTML slides and carousels to PNG")]
pub struct Cli {
    #[command(flatten)]
    pub render: RenderArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the HTTP rendering API
    Serve {
        /// Port to listen on (all interfaces)
        #[arg(long, env = "PORT", default_value_t = 3000)]
        port: u16,
    },
    /// Render slides from a JSON file into PNG files
    Render {
        /// A slide object, an array of slides, or {"slides": [...]}
        input: PathBuf,
        /// Directory for slide-NN.png files
        #[arg(long, short, default_value = ".")]
        out_dir: PathBuf,
    },
    /// List available layout styles
    Styles,
}

/// Options shared by every subcommand
#[derive(Debug, Clone, Args)]
pub struct RenderArgs {
    /// Directory holding one <style>.html per layout
    #[arg(long, env = "TEMPLATES_DIR", default_value = "templates", global = true)]
    pub templates_dir: PathBuf,

    /// Chrome/Chromium executable to use instead of auto-detection
    #[arg(long, env = "CHROME_PATH", global = true)]
    pub chrome_path: Option<PathBuf>,

    /// Launch Chrome without its sandbox (needed in most containers)
    #[arg(long, env = "CHROME_NO_SANDBOX", global = true)]
    pub no_sandbox: bool,

    /// Viewport width in CSS pixels
    #[arg(long, default_value_t = 1080, global = true)]
    pub width: u32,

    /// Viewport height in CSS pixels
    #[arg(long, default_value_t = 1350, global = true)]
    pub height: u32,

    /// Device scale factor
    #[arg(long, default_value_t = 2.0, global = true)]
    pub scale: f64,

    /// Content load timeout in milliseconds
    #[arg(long, default_value_t = 15000, global = true)]
    pub timeout_ms: u64,
}

impl RenderArgs {
    pub fn render_config(&self) -> Result<RenderConfig> {
        let config = RenderConfig {
            geometry: Geometry {
                width: self.width,
                height: self.height,
                scale: self.scale,
            },
            timeout_ms: self.timeout_ms,
        };
        config.validate()?;
        Ok(config)
    }
}
