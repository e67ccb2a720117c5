//! In-process backend that never starts a browser
//!
//! Every capture returns the same small PNG. Used by tests and for dry runs
//! of the HTTP surface where Chrome is not installed. The counters let tests
//! observe how many sessions and surfaces were created.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{Backend, Session, Surface};
use crate::{Geometry, Result};

/// A 1x1 transparent PNG.
pub const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4,
    0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae,
    0x42, 0x60, 0x82,
];

/// Shared counters for a [`NoopBackend`] and everything it creates.
#[derive(Debug, Default)]
pub struct NoopStats {
    pub launches: AtomicUsize,
    pub surfaces_opened: AtomicUsize,
    pub surfaces_released: AtomicUsize,
    /// Markup of every render, in the order they happened
    pub rendered: std::sync::Mutex<Vec<String>>,
}

impl NoopStats {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn open_surfaces(&self) -> usize {
        self.surfaces_opened.load(Ordering::SeqCst) - self.surfaces_released.load(Ordering::SeqCst)
    }

    pub fn rendered(&self) -> Vec<String> {
        self.rendered.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Backend whose sessions capture [`PLACEHOLDER_PNG`].
#[derive(Debug, Clone, Default)]
pub struct NoopBackend {
    stats: Arc<NoopStats>,
    launch_delay: Duration,
}

impl NoopBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make each launch block for `delay`, to widen start-up races in tests.
    pub fn with_launch_delay(mut self, delay: Duration) -> Self {
        self.launch_delay = delay;
        self
    }

    pub fn stats(&self) -> Arc<NoopStats> {
        Arc::clone(&self.stats)
    }
}

impl Backend for NoopBackend {
    type Session = NoopSession;

    fn launch(&self) -> Result<NoopSession> {
        if !self.launch_delay.is_zero() {
            std::thread::sleep(self.launch_delay);
        }
        self.stats.launches.fetch_add(1, Ordering::SeqCst);
        Ok(NoopSession { stats: Arc::clone(&self.stats) })
    }
}

pub struct NoopSession {
    stats: Arc<NoopStats>,
}

impl Session for NoopSession {
    type Surface = NoopSurface;

    fn is_connected(&self) -> bool {
        true
    }

    fn open_surface(&self, _geometry: Geometry) -> Result<NoopSurface> {
        self.stats.surfaces_opened.fetch_add(1, Ordering::SeqCst);
        Ok(NoopSurface { stats: Arc::clone(&self.stats) })
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

pub struct NoopSurface {
    stats: Arc<NoopStats>,
}

impl Surface for NoopSurface {
    fn render_and_capture(&mut self, markup: &str, _timeout: Duration) -> Result<Vec<u8>> {
        self.stats
            .rendered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(markup.to_string());
        Ok(PLACEHOLDER_PNG.to_vec())
    }

    fn release(&mut self) -> Result<()> {
        self.stats.surfaces_released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_a_png() {
        assert_eq!(&PLACEHOLDER_PNG[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn noop_surface_records_markup() {
        let backend = NoopBackend::new();
        let stats = backend.stats();
        let session = backend.launch().unwrap();
        let mut surface = session.open_surface(Geometry::default()).unwrap();
        let png = surface.render_and_capture("<p>x</p>", Duration::from_secs(1)).unwrap();
        surface.release().unwrap();

        assert_eq!(png, PLACEHOLDER_PNG);
        assert_eq!(stats.launches(), 1);
        assert_eq!(stats.open_surfaces(), 0);
        assert_eq!(stats.rendered(), vec!["<p>x</p>".to_string()]);
    }
}
