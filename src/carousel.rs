//! Carousel batching
//!
//! Slides are stamped with their 1-based `position` and the batch `total`,
//! then rendered one after another through the shared session. The first
//! failure ends the batch; nothing rendered before it is returned.

use log::{info, warn};

use crate::session::Backend;
use crate::{Error, RenderedImage, Result, SlideData, SlideRenderer};

/// One rendered slide of a carousel
#[derive(Debug, Clone)]
pub struct CarouselSlide {
    /// 1-based position in the batch
    pub position: usize,
    /// Number of slides in the batch
    pub total: usize,
    pub image: RenderedImage,
}

/// Copy `slide` with `position` and `total` set, overriding any caller values.
pub fn stamp(slide: &SlideData, position: usize, total: usize) -> SlideData {
    let mut stamped = slide.clone();
    stamped.set("position", position);
    stamped.set("total", total);
    stamped
}

/// Render `slides` in order.
pub async fn render_carousel<B: Backend>(
    renderer: &SlideRenderer<B>,
    slides: &[SlideData],
) -> Result<Vec<CarouselSlide>> {
    if slides.is_empty() {
        return Err(Error::EmptyCarousel);
    }

    let total = slides.len();
    let mut rendered = Vec::with_capacity(total);
    for (i, slide) in slides.iter().enumerate() {
        let position = i + 1;
        let image = renderer
            .render_slide(&stamp(slide, position, total))
            .await
            .inspect_err(|e| warn!("Carousel aborted at slide {}/{}: {}", position, total, e))?;
        rendered.push(CarouselSlide { position, total, image });
    }

    info!("Rendered carousel of {} slides", total);
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::NoopBackend;
    use crate::{RenderConfig, SessionManager, TemplateStore};
    use serde_json::json;
    use std::sync::Arc;

    fn renderer() -> (tempfile::TempDir, NoopBackend, SlideRenderer<NoopBackend>) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("centered.html"), "{{heading}} {{position}}/{{total}}").unwrap();
        let backend = NoopBackend::new();
        let sessions = Arc::new(SessionManager::new(backend.clone()));
        let r = SlideRenderer::new(TemplateStore::new(dir.path()), sessions, RenderConfig::default());
        (dir, backend, r)
    }

    fn slide(heading: &str) -> SlideData {
        SlideData::new().with("layout_style", "centered").with("heading", heading)
    }

    #[test]
    fn stamp_overrides_caller_values() {
        let s = stamp(&slide("a").with("position", 9).with("total", "x"), 2, 3);
        assert_eq!(s.get("position"), Some(&json!(2)));
        assert_eq!(s.get("total"), Some(&json!(3)));
        assert_eq!(s.get("heading"), Some(&json!("a")));
    }

    #[tokio::test]
    async fn empty_carousel_is_rejected() {
        let (_dir, backend, r) = renderer();
        assert!(matches!(render_carousel(&r, &[]).await, Err(Error::EmptyCarousel)));
        assert_eq!(backend.stats().launches(), 0);
    }

    #[tokio::test]
    async fn results_follow_input_order() {
        let (_dir, backend, r) = renderer();
        let slides = vec![slide("a"), slide("b"), slide("c").with("position", 42)];
        let out = render_carousel(&r, &slides).await.unwrap();

        assert_eq!(out.len(), 3);
        for (i, s) in out.iter().enumerate() {
            assert_eq!(s.position, i + 1);
            assert_eq!(s.total, 3);
        }
        assert_eq!(backend.stats().rendered(), vec!["a 1/3", "b 2/3", "c 3/3"]);
        assert_eq!(backend.stats().launches(), 1);
        assert_eq!(backend.stats().open_surfaces(), 0);
    }

    #[tokio::test]
    async fn first_failure_aborts_the_batch() {
        let (_dir, backend, r) = renderer();
        let slides = vec![slide("a"), SlideData::new().with("layout_style", "missing"), slide("c")];
        let err = render_carousel(&r, &slides).await.unwrap_err();

        assert!(matches!(err, Error::TemplateNotFound(ref k) if k == "missing"));
        // the third slide was never attempted
        assert_eq!(backend.stats().rendered(), vec!["a 1/3"]);
    }
}
