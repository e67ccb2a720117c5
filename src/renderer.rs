//! Single-slide rendering: template lookup, injection, capture

use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::session::{Backend, SessionManager};
use crate::{inject, Error, Geometry, ImageFormat, RenderConfig, RenderedImage, Result, SlideData, TemplateStore};

/// Turns slide data into images using a shared rendering session
pub struct SlideRenderer<B: Backend> {
    templates: TemplateStore,
    sessions: Arc<SessionManager<B>>,
    config: RenderConfig,
}

impl<B: Backend> SlideRenderer<B> {
    pub fn new(templates: TemplateStore, sessions: Arc<SessionManager<B>>, config: RenderConfig) -> Self {
        Self {
            templates,
            sessions,
            config,
        }
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    pub fn sessions(&self) -> &Arc<SessionManager<B>> {
        &self.sessions
    }

    pub fn geometry(&self) -> Geometry {
        self.config.geometry
    }

    /// Fill the slide's layout template without rendering it.
    pub fn fill(&self, slide: &SlideData) -> Result<String> {
        let style = slide.layout_style().ok_or(Error::MissingLayoutStyle)?;
        let template = self.templates.load(style)?;
        Ok(inject(&template, slide))
    }

    /// Render one slide. A single attempt; errors are returned as-is.
    pub async fn render_slide(&self, slide: &SlideData) -> Result<RenderedImage> {
        let markup = self.fill(slide)?;
        let geometry = self.config.geometry;
        debug!(
            "Rendering '{}' slide ({} bytes of markup)",
            slide.layout_style().unwrap_or_default(),
            markup.len()
        );

        let data = self
            .sessions
            .render(&markup, geometry, Duration::from_millis(self.config.timeout_ms))
            .await?;

        Ok(RenderedImage {
            data,
            format: ImageFormat::Png,
            width: geometry.output_width(),
            height: geometry.output_height(),
        })
    }
}
