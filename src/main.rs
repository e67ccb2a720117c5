use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use log::{info, warn};
use serde_json::Value;

use rfslides::cdp::ChromeBackend;
use rfslides::config::{Cli, Command};
use rfslides::{render_carousel, server, SessionManager, SlideData, SlideRenderer, TemplateStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let templates = TemplateStore::new(&cli.render.templates_dir);

    let config = cli.render.render_config()?;
    let backend = ChromeBackend {
        executable: cli.render.chrome_path.clone(),
        sandbox: !cli.render.no_sandbox,
    };
    let sessions = Arc::new(SessionManager::new(backend));
    let renderer = Arc::new(SlideRenderer::new(templates, Arc::clone(&sessions), config));

    let outcome = match cli.command {
        Command::Serve { port } => {
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            server::serve(Arc::clone(&renderer), addr, shutdown_signal())
                .await
                .context("HTTP server failed")
        }
        Command::Render { input, out_dir } => render_file(&renderer, &input, &out_dir).await,
        Command::Styles => list_styles(renderer.templates()),
    };

    // The browser is the one resource that must not outlive the process.
    if let Err(e) = sessions.shutdown().await {
        warn!("Failed to close rendering session: {}", e);
    }
    outcome
}

fn list_styles(templates: &TemplateStore) -> anyhow::Result<()> {
    for style in templates.list_available_styles().context("listing templates")? {
        println!("{}", style);
    }
    Ok(())
}

async fn render_file(renderer: &SlideRenderer<ChromeBackend>, input: &Path, out_dir: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let json: Value = serde_json::from_str(&text).with_context(|| format!("parsing {}", input.display()))?;
    let slides: Vec<SlideData> = match json {
        Value::Array(items) => serde_json::from_value(Value::Array(items))?,
        Value::Object(mut map) => match map.remove("slides") {
            Some(slides) => serde_json::from_value(slides)?,
            None => vec![SlideData::from(map)],
        },
        _ => bail!("{} must hold a slide object or an array of slides", input.display()),
    };

    std::fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    for slide in render_carousel(renderer, &slides).await? {
        let path = out_dir.join(format!("slide-{:02}.png", slide.position));
        std::fs::write(&path, &slide.image.data).with_context(|| format!("writing {}", path.display()))?;
        info!("Wrote {} ({}x{})", path.display(), slide.image.width, slide.image.height);
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
