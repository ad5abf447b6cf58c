//! Frame renderer with bounded frames in flight.
//!
//! A [`Renderer`] drives one render + present cycle per [`Renderer::render`] call. Before the
//! frame callback runs, the call takes a slot from a counting semaphore sized to the configured
//! number of frames in flight; if every slot is taken the calling thread blocks until a frame
//! finishes. That is the only backpressure there is: frames are never queued or dropped, and a
//! blocked call waits for as long as it takes.
//!
//! Per frame the states are `Idle -> SlotAcquired -> CallbackRunning -> Presented -> SlotReleased`.
//! Once a slot is taken the frame runs to completion, successful or not, and the slot is always
//! given back.

use crate::render::{RenderContext, RenderTarget, SurfaceFrame};
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

pub const DEFAULT_MAX_FRAMES_IN_FLIGHT: usize = crate::config::DEFAULT_MAX_FRAMES_IN_FLIGHT;
pub use crate::config::MAX_FRAMES_IN_FLIGHT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    SlotAcquired,
    CallbackRunning,
    Presented,
    SlotReleased,
}

pub struct Renderer {
    /// Shared backend context. Other renderers may hold the same one.
    context: Arc<dyn RenderContext>,
    /// One permit per frame that may be in flight. Fair, so waiters are admitted in call order.
    frames_in_flight: Semaphore,
    max_frames_in_flight: usize,
    is_valid: bool,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("context", &self.context.name())
            .field("max_frames_in_flight", &self.max_frames_in_flight)
            .field("frames_in_flight", &self.frames_in_flight())
            .field("is_valid", &self.is_valid)
            .finish()
    }
}

impl Renderer {
    /// Creates a renderer for `context`. An invalid context, or a capacity of zero or above
    /// [`MAX_FRAMES_IN_FLIGHT`], gives an invalid renderer whose `render` calls all fail without
    /// doing any work.
    pub fn new(context: Arc<dyn RenderContext>, max_frames_in_flight: usize) -> Self {
        let is_valid = context.is_valid()
            && max_frames_in_flight > 0
            && max_frames_in_flight <= MAX_FRAMES_IN_FLIGHT;
        if !is_valid {
            log::error!(
                "Renderer for context {} is invalid (context valid: {}, frames in flight: {})",
                context.name(),
                context.is_valid(),
                max_frames_in_flight
            );
        }

        Self {
            context,
            frames_in_flight: Semaphore::new(max_frames_in_flight.min(MAX_FRAMES_IN_FLIGHT)),
            max_frames_in_flight,
            is_valid,
        }
    }

    pub fn with_default_capacity(context: Arc<dyn RenderContext>) -> Self {
        Self::new(context, DEFAULT_MAX_FRAMES_IN_FLIGHT)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn context(&self) -> &Arc<dyn RenderContext> {
        &self.context
    }

    pub fn max_frames_in_flight(&self) -> usize {
        self.max_frames_in_flight
    }

    /// Frames that have taken a slot and not yet released it.
    pub fn frames_in_flight(&self) -> usize {
        self.max_frames_in_flight
            .min(MAX_FRAMES_IN_FLIGHT)
            .saturating_sub(self.frames_in_flight.available_permits())
    }

    /// Renders and presents one frame, blocking the calling thread while all slots are taken.
    ///
    /// Returns false when the renderer is invalid, `frame` is `None`, the callback returns false
    /// (nothing is presented then) or presenting fails. None of these are fatal: the next call
    /// runs normally.
    pub fn render<F>(&self, frame: Option<Box<dyn SurfaceFrame>>, callback: F) -> bool
    where
        F: FnOnce(&mut RenderTarget) -> bool,
    {
        let Some(frame) = self.check_preconditions(frame) else {
            return false;
        };

        match pollster::block_on(self.frames_in_flight.acquire()) {
            Ok(permit) => self.run_frame(permit, frame, callback),
            Err(e) => {
                log::error!("Frame slot unavailable: {e}");
                false
            }
        }
    }

    /// Same contract as [`Renderer::render`], but waits for a slot asynchronously.
    pub async fn render_async<F>(&self, frame: Option<Box<dyn SurfaceFrame>>, callback: F) -> bool
    where
        F: FnOnce(&mut RenderTarget) -> bool,
    {
        let Some(frame) = self.check_preconditions(frame) else {
            return false;
        };

        match self.frames_in_flight.acquire().await {
            Ok(permit) => self.run_frame(permit, frame, callback),
            Err(e) => {
                log::error!("Frame slot unavailable: {e}");
                false
            }
        }
    }

    fn check_preconditions(&self, frame: Option<Box<dyn SurfaceFrame>>) -> Option<Box<dyn SurfaceFrame>> {
        if !self.is_valid {
            log::debug!("Skipping frame: renderer is invalid");
            return None;
        }
        if frame.is_none() {
            log::debug!("Skipping frame: no drawable frame");
        }
        frame
    }

    /// Runs one frame with `permit` held. The permit is dropped on every path out of here.
    fn run_frame<F>(&self, permit: SemaphorePermit<'_>, frame: Box<dyn SurfaceFrame>, callback: F) -> bool
    where
        F: FnOnce(&mut RenderTarget) -> bool,
    {
        let frame_id = frame.frame_id();
        log::trace!("frame {frame_id}: {:?}", FrameState::SlotAcquired);

        let mut target = RenderTarget::new(frame.size(), frame_id);

        log::trace!("frame {frame_id}: {:?}", FrameState::CallbackRunning);
        let ok = if callback(&mut target) {
            match frame.present(target) {
                Ok(()) => {
                    log::trace!("frame {frame_id}: {:?}", FrameState::Presented);
                    true
                }
                Err(e) => {
                    log::warn!("frame {frame_id}: present failed: {e:#}");
                    false
                }
            }
        } else {
            log::debug!("frame {frame_id}: callback returned false, not presenting");
            false
        };

        drop(permit);
        log::trace!("frame {frame_id}: {:?}", FrameState::SlotReleased);
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::SurfaceSize;
    use crate::render::backends::null::NullContext;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn setup(capacity: usize) -> (Arc<NullContext>, Arc<Renderer>) {
        init_logging();
        let context = Arc::new(NullContext::new());
        let renderer = Arc::new(Renderer::new(context.clone(), capacity));
        (context, renderer)
    }

    #[test]
    fn invalid_context_makes_render_a_no_op() {
        init_logging();
        let context = Arc::new(NullContext::invalid());
        let renderer = Renderer::with_default_capacity(context.clone());
        assert!(!renderer.is_valid());

        let mut called = false;
        let ok = renderer.render(Some(context.frame(SurfaceSize::new(4, 4))), |_| {
            called = true;
            true
        });
        assert!(!ok);
        assert!(!called);
        assert_eq!(context.presented_frames(), 0);
    }

    #[test]
    fn zero_capacity_is_invalid() {
        let context = Arc::new(NullContext::new());
        assert!(!Renderer::new(context, 0).is_valid());
    }

    #[test]
    fn capacity_beyond_the_semaphore_limit_is_invalid() {
        let context = Arc::new(NullContext::new());
        let renderer = Renderer::new(context.clone(), usize::MAX);
        assert!(!renderer.is_valid());
        assert!(!renderer.render(Some(context.frame(SurfaceSize::new(1, 1))), |_| true));
        assert_eq!(renderer.frames_in_flight(), 0);

        assert!(Renderer::new(context, MAX_FRAMES_IN_FLIGHT).is_valid());
    }

    #[test]
    fn missing_frame_fails_without_running_callback() {
        let (_, renderer) = setup(3);
        let ok = renderer.render(None, |_| panic!("callback must not run"));
        assert!(!ok);
        assert_eq!(renderer.frames_in_flight(), 0);
    }

    #[test]
    fn successful_frame_is_presented() {
        let (context, renderer) = setup(3);
        let ok = renderer.render(Some(context.frame(SurfaceSize::new(8, 8))), |target| {
            assert_eq!(target.size(), SurfaceSize::new(8, 8));
            assert_eq!(renderer.frames_in_flight(), 1);
            true
        });
        assert!(ok);
        assert_eq!(context.presented_frames(), 1);
        assert_eq!(renderer.frames_in_flight(), 0);
    }

    #[test]
    fn failed_frames_release_their_slot() {
        let (context, renderer) = setup(2);

        // More consecutive failures than slots: if any slot leaked, a later call would block forever.
        for _ in 0..5 {
            assert!(!renderer.render(Some(context.frame(SurfaceSize::new(1, 1))), |_| false));
        }
        assert_eq!(renderer.frames_in_flight(), 0);
        assert_eq!(context.presented_frames(), 0);

        context.set_fail_presents(true);
        for _ in 0..5 {
            assert!(!renderer.render(Some(context.frame(SurfaceSize::new(1, 1))), |_| true));
        }
        assert_eq!(renderer.frames_in_flight(), 0);

        context.set_fail_presents(false);
        assert!(renderer.render(Some(context.frame(SurfaceSize::new(1, 1))), |_| true));
        assert_eq!(context.presented_frames(), 1);
    }

    #[test]
    fn frame_after_failed_frame_runs_normally() {
        let (context, renderer) = setup(1);
        assert!(!renderer.render(Some(context.frame(SurfaceSize::new(1, 1))), |_| false));

        let mut ran = false;
        assert!(renderer.render(Some(context.frame(SurfaceSize::new(1, 1))), |_| {
            ran = true;
            true
        }));
        assert!(ran);
    }

    #[test]
    fn in_flight_frames_never_exceed_capacity() {
        const K: usize = 3;
        let (context, renderer) = setup(K);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let started = Arc::new(Barrier::new(K + 1));

        let workers: Vec<_> = (0..=K)
            .map(|_| {
                let renderer = renderer.clone();
                let context = context.clone();
                let current = current.clone();
                let peak = peak.clone();
                let started = started.clone();
                thread::spawn(move || {
                    started.wait();
                    renderer.render(Some(context.frame(SurfaceSize::new(1, 1))), |_| {
                        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(50));
                        current.fetch_sub(1, Ordering::SeqCst);
                        true
                    })
                })
            })
            .collect();

        for w in workers {
            assert!(w.join().unwrap());
        }
        assert!(peak.load(Ordering::SeqCst) <= K);
        assert_eq!(context.presented_frames(), (K + 1) as u64);
    }

    #[test]
    fn second_frame_waits_for_the_only_slot() {
        let (context, renderer) = setup(1);

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let first = {
            let renderer = renderer.clone();
            let context = context.clone();
            thread::spawn(move || {
                renderer.render(Some(context.frame(SurfaceSize::new(1, 1))), move |_| {
                    entered_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    true
                })
            })
        };
        entered_rx.recv().unwrap();

        let (second_tx, second_rx) = mpsc::channel();
        let second = {
            let renderer = renderer.clone();
            let context = context.clone();
            thread::spawn(move || {
                renderer.render(Some(context.frame(SurfaceSize::new(1, 1))), move |_| {
                    second_tx.send(()).unwrap();
                    true
                })
            })
        };

        // The second callback must not start while the first frame holds the slot.
        assert!(second_rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(renderer.frames_in_flight(), 1);

        release_tx.send(()).unwrap();
        assert!(first.join().unwrap());

        second_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(second.join().unwrap());
        assert_eq!(context.presented_frames(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn async_renders_share_the_same_gate() {
        let (context, renderer) = setup(2);
        let peak = Arc::new(AtomicUsize::new(0));

        let frames = (0..6).map(|_| {
            let renderer = renderer.clone();
            let frame = context.frame(SurfaceSize::new(1, 1));
            let peak = peak.clone();
            async move {
                renderer
                    .render_async(Some(frame), |_| {
                        peak.fetch_max(renderer.frames_in_flight(), Ordering::SeqCst);
                        true
                    })
                    .await
            }
        });

        let results = futures::future::join_all(frames).await;
        assert!(results.into_iter().all(|ok| ok));
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(context.presented_frames(), 6);
    }
}
