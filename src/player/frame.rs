//! Frame hand-off from the engine thread into the host surface.
//!
//! A single slot guarded by a short mutex: the engine overwrites it, the host
//! takes it on repaint. Resizing bumps the surface generation so frames
//! rendered for the old geometry are thrown away.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
  Rgba,
  Bgra,
}

impl PixelFormat {
  pub fn bytes_per_pixel(self) -> u32 {
    4
  }
}

/// A decoded image ready for presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
  pub width: u32,
  pub height: u32,
  pub format: PixelFormat,
  /// Bytes per row.
  pub stride: u32,
  pub pixels: Vec<u8>,
  /// Presentation timestamp in seconds.
  pub pts: f64,
  /// Surface generation the frame was rendered for.
  pub generation: u64,
}

impl Frame {
  /// Whether `pixels` holds a full image for the declared geometry.
  pub fn is_complete(&self) -> bool {
    let row = self.width as u64 * self.format.bytes_per_pixel() as u64;
    self.stride as u64 >= row && self.pixels.len() as u64 >= self.stride as u64 * self.height as u64
  }
}

/// Geometry and native handle of a host surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceInfo {
  pub width: u32,
  pub height: u32,
  /// Platform window id (X11 window, HWND, NSView) if the surface has one.
  pub native_handle: Option<i64>,
}

/// The host drawable a player renders into. Lives on the host thread.
pub trait Surface {
  fn info(&self) -> SurfaceInfo;

  fn is_valid(&self) -> bool {
    true
  }

  fn resize(&mut self, width: u32, height: u32);

  fn present(&mut self, frame: &Frame);

  /// Called once when the owning player is disposed.
  fn release(&mut self) {}
}

/// What the engine should render for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTarget {
  pub width: u32,
  pub height: u32,
  pub generation: u64,
}

/// Presentation counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
  pub presented: u64,
  /// Replaced before the host presented them.
  pub dropped: u64,
  /// Rendered for an outdated surface generation.
  pub stale: u64,
}

#[derive(Default)]
struct SlotState {
  pending: Option<Frame>,
  width: u32,
  height: u32,
  generation: u64,
  stats: FrameStats,
}

struct FrameSlot {
  state: Mutex<SlotState>,
  redraw: AtomicBool,
  wake: Arc<Notify>,
}

/// Engine-side producer handle.
#[derive(Clone)]
pub struct FrameSink {
  slot: Arc<FrameSlot>,
}

impl FrameSink {
  pub fn target(&self) -> FrameTarget {
    let state = self.slot.state.lock();
    FrameTarget {
      width: state.width,
      height: state.height,
      generation: state.generation,
    }
  }

  /// Store `frame` for the next repaint. Returns false for a stale frame.
  pub fn submit(&self, frame: Frame) -> bool {
    {
      let mut state = self.slot.state.lock();
      if frame.generation != state.generation {
        state.stats.stale += 1;
        log::debug!(
          "Discarding frame for generation {} (current {})",
          frame.generation,
          state.generation
        );
        return false;
      }
      if state.pending.replace(frame).is_some() {
        state.stats.dropped += 1;
      }
      // redraw flag and slot change under the same lock
      self.slot.redraw.store(true, Ordering::Release);
    }
    self.slot.wake.notify_one();
    true
  }
}

/// Host-side end of the slot, owning the surface.
pub(crate) struct FramePipeline {
  slot: Arc<FrameSlot>,
  surface: Option<Box<dyn Surface>>,
}

impl FramePipeline {
  pub(crate) fn new(surface: Box<dyn Surface>, wake: Arc<Notify>) -> (FrameSink, Self) {
    let info = surface.info();
    let slot = Arc::new(FrameSlot {
      state: Mutex::new(SlotState {
        width: info.width,
        height: info.height,
        ..SlotState::default()
      }),
      redraw: AtomicBool::new(false),
      wake,
    });
    let sink = FrameSink { slot: slot.clone() };
    (
      sink,
      Self {
        slot,
        surface: Some(surface),
      },
    )
  }

  pub(crate) fn surface_info(&self) -> Option<SurfaceInfo> {
    self.surface.as_ref().map(|surface| surface.info())
  }

  pub(crate) fn surface_valid(&self) -> bool {
    self.surface.as_ref().is_some_and(|surface| surface.is_valid())
  }

  /// Present the pending frame, if any.
  pub(crate) fn present(&mut self) -> bool {
    let Some(surface) = self.surface.as_mut() else {
      return false;
    };
    let mut state = self.slot.state.lock();
    self.slot.redraw.store(false, Ordering::Release);
    let Some(frame) = state.pending.take() else {
      return false;
    };
    surface.present(&frame);
    state.stats.presented += 1;
    true
  }

  pub(crate) fn resize(&mut self, width: u32, height: u32) -> bool {
    let Some(surface) = self.surface.as_mut() else {
      return false;
    };
    let mut state = self.slot.state.lock();
    surface.resize(width, height);
    state.width = width;
    state.height = height;
    state.generation += 1;
    state.pending = None;
    self.slot.redraw.store(false, Ordering::Release);
    true
  }

  pub(crate) fn needs_redraw(&self) -> bool {
    self.slot.redraw.load(Ordering::Acquire)
  }

  pub(crate) fn stats(&self) -> FrameStats {
    self.slot.state.lock().stats
  }

  /// Drop any pending frame and hand the surface back to its owner.
  pub(crate) fn release(&mut self) {
    {
      let mut state = self.slot.state.lock();
      state.pending = None;
      // bump so late submissions are rejected
      state.generation += 1;
    }
    self.slot.redraw.store(false, Ordering::Release);
    if let Some(mut surface) = self.surface.take() {
      surface.release();
    }
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use std::cell::RefCell;
  use std::rc::Rc;

  /// In-memory surface recording what was presented.
  #[derive(Clone, Default)]
  pub(crate) struct MemorySurface {
    pub presented: Rc<RefCell<Vec<f64>>>,
    pub size: Rc<RefCell<(u32, u32)>>,
    pub released: Rc<RefCell<bool>>,
    pub handle: Option<i64>,
    pub invalid: bool,
  }

  impl MemorySurface {
    pub(crate) fn new(width: u32, height: u32) -> Self {
      let surface = Self::default();
      *surface.size.borrow_mut() = (width, height);
      surface
    }
  }

  impl Surface for MemorySurface {
    fn info(&self) -> SurfaceInfo {
      let (width, height) = *self.size.borrow();
      SurfaceInfo {
        width,
        height,
        native_handle: self.handle,
      }
    }

    fn is_valid(&self) -> bool {
      !self.invalid
    }

    fn resize(&mut self, width: u32, height: u32) {
      *self.size.borrow_mut() = (width, height);
    }

    fn present(&mut self, frame: &Frame) {
      self.presented.borrow_mut().push(frame.pts);
    }

    fn release(&mut self) {
      *self.released.borrow_mut() = true;
    }
  }

  pub(crate) fn frame(target: FrameTarget, pts: f64) -> Frame {
    Frame {
      width: target.width,
      height: target.height,
      format: PixelFormat::Rgba,
      stride: target.width * 4,
      pixels: vec![0; (target.width * target.height * 4) as usize],
      pts,
      generation: target.generation,
    }
  }

  fn pipeline() -> (FrameSink, FramePipeline, MemorySurface) {
    let surface = MemorySurface::new(4, 2);
    let (sink, pipeline) = FramePipeline::new(Box::new(surface.clone()), Arc::new(Notify::new()));
    (sink, pipeline, surface)
  }

  #[test]
  fn test_latest_frame_wins() {
    let (sink, mut pipeline, surface) = pipeline();
    let target = sink.target();
    assert_eq!((target.width, target.height, target.generation), (4, 2, 0));

    assert!(!pipeline.needs_redraw());
    for i in 0..5 {
      assert!(sink.submit(frame(target, i as f64)));
    }
    assert!(pipeline.needs_redraw());
    assert!(pipeline.present());
    assert!(!pipeline.present());
    assert_eq!(*surface.presented.borrow(), vec![4.0]);
    assert_eq!(
      pipeline.stats(),
      FrameStats {
        presented: 1,
        dropped: 4,
        stale: 0
      }
    );
  }

  #[test]
  fn test_redraw_flag_matches_slot_under_contention() {
    let (sink, mut pipeline, _surface) = pipeline();
    let target = sink.target();
    let producer = std::thread::spawn(move || {
      for i in 0..2000 {
        sink.submit(frame(target, i as f64));
      }
    });
    while !producer.is_finished() {
      pipeline.present();
    }
    producer.join().unwrap();

    // a raised flag always has a frame behind it
    if pipeline.needs_redraw() {
      assert!(pipeline.present());
    }
    assert!(!pipeline.needs_redraw());
    let stats = pipeline.stats();
    assert_eq!(stats.presented + stats.dropped, 2000);
  }

  #[test]
  fn test_resize_rejects_stale_frames() {
    let (sink, mut pipeline, surface) = pipeline();
    let old = sink.target();
    assert!(sink.submit(frame(old, 1.0)));

    assert!(pipeline.resize(8, 6));
    assert_eq!(*surface.size.borrow(), (8, 6));
    // pending frame for the old geometry is gone
    assert!(!pipeline.present());

    assert!(!sink.submit(frame(old, 2.0)));
    let current = sink.target();
    assert_eq!((current.width, current.height, current.generation), (8, 6, 1));
    assert!(sink.submit(frame(current, 3.0)));
    assert!(pipeline.present());
    assert_eq!(*surface.presented.borrow(), vec![3.0]);
    assert_eq!(pipeline.stats().stale, 1);
  }

  #[test]
  fn test_release_stops_presentation() {
    let (sink, mut pipeline, surface) = pipeline();
    let target = sink.target();
    pipeline.release();
    assert!(*surface.released.borrow());
    assert!(!sink.submit(frame(target, 1.0)));
    assert!(!pipeline.present());
    assert!(!pipeline.resize(1, 1));
    assert!(pipeline.surface_info().is_none());
    assert!(!pipeline.surface_valid());
  }

  #[test]
  fn test_frame_completeness() {
    let target = FrameTarget {
      width: 2,
      height: 2,
      generation: 0,
    };
    let mut f = frame(target, 0.0);
    assert!(f.is_complete());
    f.pixels.truncate(10);
    assert!(!f.is_complete());
  }
}
