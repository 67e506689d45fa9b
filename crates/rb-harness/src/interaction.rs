//! Drag-phase frame rate.

use crate::clock::Clock;
use crate::metrics::{FpsReading, SharedMetrics};
use rb_render::DragHooks;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

pub type SharedController = Rc<RefCell<InteractionController>>;

/// Tracks one drag gesture at a time. The render loop calls [`tick`] every
/// frame; it is the only writer of the frame counter.
///
/// [`tick`]: InteractionController::tick
pub struct InteractionController {
    dragging: bool,
    frames: u64,
    started: Duration,
    clock: Rc<dyn Clock>,
    metrics: SharedMetrics,
}

impl InteractionController {
    pub fn new(clock: Rc<dyn Clock>, metrics: SharedMetrics) -> Self {
        Self {
            dragging: false,
            frames: 0,
            started: Duration::ZERO,
            clock,
            metrics,
        }
    }

    pub fn shared(clock: Rc<dyn Clock>, metrics: SharedMetrics) -> SharedController {
        Rc::new(RefCell::new(Self::new(clock, metrics)))
    }

    /// Drag hooks that forward into `controller`.
    pub fn hooks(controller: &SharedController) -> DragHooks {
        let on_start = Rc::clone(controller);
        let on_end = Rc::clone(controller);
        DragHooks::new(
            move || on_start.borrow_mut().drag_start(),
            move || on_end.borrow_mut().drag_end(),
        )
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Frames counted in the current (or last) gesture.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn drag_start(&mut self) {
        self.dragging = true;
        self.frames = 0;
        self.started = self.clock.now();
        let mut metrics = self.metrics.borrow_mut();
        metrics.is_user_dragging = true;
        metrics.fps_drag = Some(FpsReading::InProgress);
    }

    pub fn drag_end(&mut self) {
        if !self.dragging {
            return;
        }
        self.dragging = false;
        let elapsed = self.clock.now().saturating_sub(self.started);
        let fps = FpsReading::from_frames(self.frames, elapsed);
        log::debug!("drag ended: {} frames in {elapsed:?} ({fps} fps)", self.frames);
        let mut metrics = self.metrics.borrow_mut();
        metrics.is_user_dragging = false;
        metrics.fps_drag = Some(fps);
    }

    pub fn tick(&mut self) {
        if self.dragging {
            self.frames += 1;
        }
    }
}
