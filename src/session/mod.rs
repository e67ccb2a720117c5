//! Rendering session management
//!
//! A rendering engine is expensive to start, so a single session is shared by
//! every render. [`SessionManager`] owns it: the session is launched on first
//! use, checked for liveness on every acquisition and relaunched when it has
//! gone away. Each render gets its own short-lived [`Surface`], which is
//! released before the render call returns, whatever the outcome.
//!
//! The engine traits are synchronous. The manager runs every engine call on
//! tokio's blocking pool so async callers are never stalled by the browser.

pub mod noop;

pub use noop::NoopBackend;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{Error, Geometry, Result};

/// Something that can start a rendering engine.
pub trait Backend: Send + Sync + 'static {
    type Session: Session;

    /// Start the engine, blocking until it reports ready.
    fn launch(&self) -> Result<Self::Session>;
}

/// A running rendering engine.
pub trait Session: Send + Sync + 'static {
    type Surface: Surface;

    /// Whether the engine still answers.
    fn is_connected(&self) -> bool;

    /// Open a fresh, isolated surface sized to `geometry`.
    fn open_surface(&self, geometry: Geometry) -> Result<Self::Surface>;

    /// Shut the engine down.
    fn close(&self) -> Result<()>;
}

/// A per-render page inside a session.
pub trait Surface: Send {
    /// Load `markup`, wait for it (fonts and images included) and capture a PNG.
    ///
    /// Fails with `RenderTimeout` if loading takes longer than `timeout`.
    fn render_and_capture(&mut self, markup: &str, timeout: Duration) -> Result<Vec<u8>>;

    /// Dispose of the surface.
    fn release(&mut self) -> Result<()>;
}

/// Releases the wrapped surface when dropped.
struct SurfaceGuard<S: Surface> {
    surface: S,
}

impl<S: Surface> SurfaceGuard<S> {
    fn new(surface: S) -> Self {
        Self { surface }
    }
}

impl<S: Surface> std::ops::Deref for SurfaceGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.surface
    }
}

impl<S: Surface> std::ops::DerefMut for SurfaceGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

impl<S: Surface> Drop for SurfaceGuard<S> {
    fn drop(&mut self) {
        if let Err(e) = self.surface.release() {
            warn!("Failed to release render surface: {}", e);
        }
    }
}

/// Owner of the one shared rendering session.
pub struct SessionManager<B: Backend> {
    backend: Arc<B>,
    // Held across a launch so concurrent acquirers wait for the same start.
    slot: Arc<Mutex<Option<Arc<B::Session>>>>,
    launches: Arc<AtomicUsize>,
}

impl<B: Backend> SessionManager<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            slot: Arc::new(Mutex::new(None)),
            launches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Number of sessions launched so far.
    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Whether a session is currently held. Does not check liveness.
    pub async fn has_session(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Return the live session, launching one if there is none or the current
    /// one has disconnected.
    ///
    /// The check and any launch run on a spawned task that owns the slot
    /// lock, so a caller dropped mid-launch cannot let a second launch start.
    pub async fn acquire(&self) -> Result<Arc<B::Session>> {
        let slot = Arc::clone(&self.slot).lock_owned().await;
        let backend = Arc::clone(&self.backend);
        let launches = Arc::clone(&self.launches);

        tokio::spawn(ensure_session(slot, backend, launches))
            .await
            .map_err(|e| Error::SessionUnavailable(format!("session start task failed: {}", e)))?
    }

    /// Render `markup` on a fresh surface and return the captured PNG.
    ///
    /// The surface is released on every path. If the render fails and the
    /// session turns out to be dead, it is dropped so the next call relaunches.
    pub async fn render(&self, markup: &str, geometry: Geometry, timeout: Duration) -> Result<Vec<u8>> {
        let session = self.acquire().await?;
        let markup = markup.to_owned();
        let worker_session = Arc::clone(&session);

        let result = tokio::task::spawn_blocking(move || {
            let surface = worker_session.open_surface(geometry)?;
            let mut surface = SurfaceGuard::new(surface);
            surface.render_and_capture(&markup, timeout)
        })
        .await
        .map_err(|e| Error::RenderError(format!("render task failed: {}", e)))
        .and_then(|r| r);

        if let Err(e) = &result {
            debug!("Render failed: {}", e);
            self.invalidate_if_disconnected(&session).await;
        }
        result
    }

    /// Close the live session, if any.
    pub async fn shutdown(&self) -> Result<()> {
        let session = self.slot.lock().await.take();
        match session {
            Some(session) => {
                info!("Closing rendering session");
                tokio::task::spawn_blocking(move || session.close())
                    .await
                    .map_err(|e| Error::RenderError(format!("close task failed: {}", e)))?
            }
            None => Ok(()),
        }
    }

    async fn invalidate_if_disconnected(&self, session: &Arc<B::Session>) {
        let checked = Arc::clone(session);
        let alive = tokio::task::spawn_blocking(move || checked.is_connected())
            .await
            .unwrap_or(false);
        if alive {
            return;
        }
        let mut slot = self.slot.lock().await;
        // Another caller may already have replaced it.
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, session)) {
            warn!("Rendering session lost during render; it will be relaunched");
            if let Some(stale) = slot.take() {
                discard(stale);
            }
        }
    }
}

async fn ensure_session<B: Backend>(
    mut slot: OwnedMutexGuard<Option<Arc<B::Session>>>,
    backend: Arc<B>,
    launches: Arc<AtomicUsize>,
) -> Result<Arc<B::Session>> {
    if let Some(session) = slot.as_ref() {
        let current = Arc::clone(session);
        let alive = tokio::task::spawn_blocking(move || current.is_connected())
            .await
            .unwrap_or(false);
        if alive {
            return Ok(Arc::clone(session));
        }
        warn!("Rendering session disconnected; relaunching");
        if let Some(stale) = slot.take() {
            discard(stale);
        }
    }

    let session = tokio::task::spawn_blocking(move || backend.launch())
        .await
        .map_err(|e| Error::SessionUnavailable(format!("launch task failed: {}", e)))??;

    let session = Arc::new(session);
    *slot = Some(Arc::clone(&session));
    let n = launches.fetch_add(1, Ordering::SeqCst) + 1;
    info!("Rendering session started (launch #{})", n);
    Ok(session)
}

fn discard<S: Session>(session: Arc<S>) {
    tokio::task::spawn_blocking(move || {
        if let Err(e) = session.close() {
            debug!("Closing stale session failed: {}", e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[derive(Default)]
    struct Counters {
        launches: AtomicUsize,
        launching: AtomicUsize,
        max_launching: AtomicUsize,
        opened: AtomicUsize,
        released: AtomicUsize,
        closed: AtomicUsize,
    }

    struct FakeBackend {
        counters: Arc<Counters>,
        connected: Arc<AtomicBool>,
        fail_launch: bool,
        launch_delay: Duration,
        outcome: fn() -> Result<Vec<u8>>,
    }

    impl FakeBackend {
        fn new(outcome: fn() -> Result<Vec<u8>>) -> Self {
            Self {
                counters: Arc::default(),
                connected: Arc::new(AtomicBool::new(true)),
                fail_launch: false,
                launch_delay: Duration::from_millis(50),
                outcome,
            }
        }
    }

    struct FakeSession {
        counters: Arc<Counters>,
        connected: Arc<AtomicBool>,
        outcome: fn() -> Result<Vec<u8>>,
    }

    struct FakeSurface {
        counters: Arc<Counters>,
        outcome: fn() -> Result<Vec<u8>>,
    }

    impl Backend for FakeBackend {
        type Session = FakeSession;

        fn launch(&self) -> Result<FakeSession> {
            if self.fail_launch {
                return Err(Error::SessionUnavailable("no browser".into()));
            }
            let running = self.counters.launching.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.max_launching.fetch_max(running, Ordering::SeqCst);
            std::thread::sleep(self.launch_delay);
            self.counters.launching.fetch_sub(1, Ordering::SeqCst);
            self.counters.launches.fetch_add(1, Ordering::SeqCst);
            self.connected.store(true, Ordering::SeqCst);
            Ok(FakeSession {
                counters: self.counters.clone(),
                connected: self.connected.clone(),
                outcome: self.outcome,
            })
        }
    }

    impl Session for FakeSession {
        type Surface = FakeSurface;

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn open_surface(&self, _geometry: Geometry) -> Result<FakeSurface> {
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            Ok(FakeSurface { counters: self.counters.clone(), outcome: self.outcome })
        }

        fn close(&self) -> Result<()> {
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl Surface for FakeSurface {
        fn render_and_capture(&mut self, _markup: &str, _timeout: Duration) -> Result<Vec<u8>> {
            (self.outcome)()
        }

        fn release(&mut self) -> Result<()> {
            self.counters.released.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn ok_png() -> Result<Vec<u8>> {
        Ok(vec![1, 2, 3])
    }

    fn timed_out() -> Result<Vec<u8>> {
        Err(Error::RenderTimeout(15000))
    }

    fn panics() -> Result<Vec<u8>> {
        panic!("engine blew up")
    }

    const TIMEOUT: Duration = Duration::from_millis(15000);

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_acquire_launches_once() {
        let backend = FakeBackend::new(ok_png);
        let counters = backend.counters.clone();
        let manager = Arc::new(SessionManager::new(backend));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let m = manager.clone();
                tokio::spawn(async move { m.acquire().await.map(|_| ()) })
            })
            .collect();
        for t in tasks {
            t.await.unwrap().unwrap();
        }

        assert_eq!(counters.launches.load(Ordering::SeqCst), 1);
        assert_eq!(manager.launch_count(), 1);
    }

    #[tokio::test]
    async fn abandoned_acquire_does_not_start_second_launch() {
        let mut backend = FakeBackend::new(ok_png);
        backend.launch_delay = Duration::from_millis(300);
        let counters = backend.counters.clone();
        let manager = SessionManager::new(backend);

        // Caller gives up while the launch is still running
        let abandoned = tokio::time::timeout(Duration::from_millis(50), manager.acquire()).await;
        assert!(abandoned.is_err());

        let session = manager.acquire().await.unwrap();
        assert!(session.is_connected());
        assert_eq!(counters.max_launching.load(Ordering::SeqCst), 1);
        assert_eq!(counters.launches.load(Ordering::SeqCst), 1);
        assert_eq!(manager.launch_count(), 1);
    }

    #[tokio::test]
    async fn live_session_is_reused() {
        let manager = SessionManager::new(FakeBackend::new(ok_png));
        let a = manager.acquire().await.unwrap();
        let b = manager.acquire().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(manager.launch_count(), 1);
    }

    #[tokio::test]
    async fn disconnected_session_is_replaced() {
        let backend = FakeBackend::new(ok_png);
        let connected = backend.connected.clone();
        let manager = SessionManager::new(backend);

        let first = manager.acquire().await.unwrap();
        connected.store(false, Ordering::SeqCst);
        let second = manager.acquire().await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(manager.launch_count(), 2);
    }

    #[tokio::test]
    async fn launch_failure_is_session_unavailable() {
        let mut backend = FakeBackend::new(ok_png);
        backend.fail_launch = true;
        let manager = SessionManager::new(backend);
        assert!(matches!(manager.acquire().await, Err(Error::SessionUnavailable(_))));
        assert!(!manager.has_session().await);
    }

    #[tokio::test]
    async fn surface_released_after_success() {
        let backend = FakeBackend::new(ok_png);
        let counters = backend.counters.clone();
        let manager = SessionManager::new(backend);

        let png = manager.render("<p>hi</p>", Geometry::default(), TIMEOUT).await.unwrap();
        assert_eq!(png, vec![1, 2, 3]);
        assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
        assert_eq!(counters.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn surface_released_after_timeout() {
        let backend = FakeBackend::new(timed_out);
        let counters = backend.counters.clone();
        let manager = SessionManager::new(backend);

        let err = manager.render("<p>hi</p>", Geometry::default(), TIMEOUT).await.unwrap_err();
        assert!(matches!(err, Error::RenderTimeout(15000)));
        assert_eq!(counters.released.load(Ordering::SeqCst), 1);
        // the session is still connected, so it is kept
        assert!(manager.has_session().await);
    }

    #[tokio::test]
    async fn surface_released_after_panic() {
        let backend = FakeBackend::new(panics);
        let counters = backend.counters.clone();
        let manager = SessionManager::new(backend);

        let err = manager.render("<p>hi</p>", Geometry::default(), TIMEOUT).await.unwrap_err();
        assert!(matches!(err, Error::RenderError(_)));
        assert_eq!(counters.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dead_session_dropped_after_render_failure() {
        let backend = FakeBackend::new(timed_out);
        let connected = backend.connected.clone();
        let manager = SessionManager::new(backend);

        // the liveness check on acquire passes, then the engine dies mid-render
        let session = manager.acquire().await.unwrap();
        connected.store(false, Ordering::SeqCst);
        manager.invalidate_if_disconnected(&session).await;
        assert!(!manager.has_session().await);
    }

    #[tokio::test]
    async fn shutdown_closes_live_session() {
        let backend = FakeBackend::new(ok_png);
        let counters = backend.counters.clone();
        let manager = SessionManager::new(backend);

        manager.shutdown().await.unwrap();
        assert_eq!(counters.closed.load(Ordering::SeqCst), 0);

        manager.acquire().await.unwrap();
        manager.shutdown().await.unwrap();
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
        assert!(!manager.has_session().await);
    }
}
