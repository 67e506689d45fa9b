//! One benchmark session: a container, the active backend, and the render
//! loop that drives it.
//!
//! At most one backend is attached at a time. Starting a backend first
//! stops the loop and releases the previous one, so its drawables and
//! resize observer are gone before the next adapter claims the container.
//!
//! There is no free-running frame callback. The render loop is a bounded
//! for-loop the caller drives: `run_frames(n)` ticks a `tokio` interval at
//! `frame_interval_ms` and renders once per tick, stopping after `n` ticks
//! or as soon as the backend is torn down.

use crate::activity::{ActivityError, ActivityLoader};
use crate::clock::{Clock, millis_between};
use crate::config::BenchConfig;
use crate::interaction::{InteractionController, SharedController};
use crate::metrics::{BUILD_FAILED, Metrics, SharedMetrics};
use crate::probe::MemoryProbe;
use rb_core::Fetcher;
use rb_core::model::Scene;
use rb_render::{BackendKind, Container, Group, Handle, Registry, RenderContext, Surface};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};

/// Id of the host container every backend draws into.
pub const CONTAINER_ID: &str = "render-host";

pub struct Session {
    config: BenchConfig,
    registry: Registry,
    container: Container,
    ctx: RenderContext,
    clock: Rc<dyn Clock>,
    probe: Box<dyn MemoryProbe>,
    metrics: SharedMetrics,
    controller: SharedController,
    activity: ActivityLoader,
    handle: Handle,
    active: Option<BackendKind>,
    dispatched: Duration,
    last_tick: Option<Duration>,
}

impl Session {
    pub fn new(
        config: BenchConfig,
        fetcher: Arc<dyn Fetcher>,
        clock: Rc<dyn Clock>,
        probe: Box<dyn MemoryProbe>,
    ) -> Self {
        let metrics = Metrics::shared();
        let controller = InteractionController::shared(Rc::clone(&clock), Rc::clone(&metrics));
        let activity = ActivityLoader::new(
            config.activity_template.clone(),
            Arc::clone(&fetcher),
            Rc::clone(&clock),
            Rc::clone(&metrics),
        );
        let ctx = RenderContext::new(fetcher)
            .with_chunk_size(config.chunk_size)
            .with_seed(config.seed);
        Self {
            registry: Registry::with_defaults(),
            container: Container::new(CONTAINER_ID, config.width, config.height),
            ctx,
            clock,
            probe,
            metrics,
            controller,
            activity,
            handle: Handle::empty(),
            active: None,
            dispatched: Duration::ZERO,
            last_tick: None,
            config,
        }
    }

    /// Replace the adapter registry (e.g. to benchmark a subset).
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn active(&self) -> Option<BackendKind> {
        self.active
    }

    /// The live record, for display surfaces that poll it.
    pub fn metrics(&self) -> SharedMetrics {
        Rc::clone(&self.metrics)
    }

    pub fn snapshot(&self) -> Metrics {
        self.metrics.borrow().clone()
    }

    pub fn is_dragging(&self) -> bool {
        self.controller.borrow().is_dragging()
    }

    pub fn activity(&self) -> Option<u32> {
        self.activity.current()
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Build `scene` with the `kind` backend, recording `buildTime`
    /// (`-1` when the contract returns an empty handle).
    pub async fn start(&mut self, kind: BackendKind, scene: &Scene) -> bool {
        self.stop();
        self.metrics.borrow_mut().reset_for_build();

        let started = self.clock.now();
        self.dispatched = started;
        let hooks = InteractionController::hooks(&self.controller);
        self.handle = self
            .registry
            .create(kind, Some(&self.container), scene, hooks, &self.ctx)
            .await;

        if self.handle.is_empty() {
            self.metrics.borrow_mut().build_time = Some(BUILD_FAILED);
            log::error!("{kind} renderer produced no handle, build time recorded as failed");
            return false;
        }

        let build = millis_between(started, self.clock.now());
        self.metrics.borrow_mut().build_time = Some(build);
        self.active = Some(kind);
        log::info!(
            "{kind}: {} drawables built in {build:.1} ms",
            self.handle.drawable_count()
        );
        true
    }

    /// Wait for outstanding resources and record `settleTime`.
    pub async fn settle(&mut self) -> Option<f64> {
        self.handle.surface_mut()?.settle().await;
        let ms = millis_between(self.dispatched, self.clock.now());
        self.metrics.borrow_mut().settle_time = Some(ms);
        Some(ms)
    }

    /// Stop the loop and release the active backend. Safe to call when
    /// nothing is attached.
    pub fn stop(&mut self) {
        if let Some(kind) = self.active.take() {
            log::info!("{kind}: torn down");
        }
        self.handle.release();
        self.activity.reset();
        self.last_tick = None;
    }

    // ─── Render loop ─────────────────────────────────────────────────────

    /// One render-loop tick: count the drag frame, let the backend redraw,
    /// sample memory.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        let dt = self.last_tick.map_or(Duration::ZERO, |t| now.saturating_sub(t));
        self.last_tick = Some(now);

        self.controller.borrow_mut().tick();

        let Some(surface) = self.handle.surface_mut() else {
            return;
        };
        surface.frame(dt);
        let heap = self.probe.sample_mb();

        let mut metrics = self.metrics.borrow_mut();
        metrics.frames += 1;
        metrics.heap = heap;
    }

    /// Run the loop for `frames` ticks at the configured interval. Ends
    /// early if the backend is torn down.
    pub async fn run_frames(&mut self, frames: u32) {
        let mut interval = self.interval();
        for _ in 0..frames {
            interval.tick().await;
            if self.handle.is_empty() {
                break;
            }
            self.tick();
        }
    }

    fn interval(&self) -> Interval {
        let mut interval = tokio::time::interval(self.config.frame_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    }

    // ─── Input ───────────────────────────────────────────────────────────

    pub fn pointer_down(&mut self, x: f32, y: f32) -> bool {
        self.handle
            .surface_mut()
            .is_some_and(|s| s.pointer_down(x, y))
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) -> bool {
        self.handle
            .surface_mut()
            .is_some_and(|s| s.pointer_move(x, y))
    }

    pub fn pointer_up(&mut self) -> bool {
        self.handle.surface_mut().is_some_and(|s| s.pointer_up())
    }

    pub fn wheel(&mut self, x: f32, y: f32, delta_y: f32) -> bool {
        self.handle
            .surface_mut()
            .is_some_and(|s| s.wheel(x, y, delta_y))
    }

    /// Center of the topmost draggable drawable.
    pub fn find_draggable(&self) -> Option<(f32, f32)> {
        let surface = self.handle.surface()?;
        Group::ALL
            .into_iter()
            .rev()
            .flat_map(|group| surface.drawables(group).into_iter().rev())
            .find(|d| d.shape.draggable && !d.overlay)
            .map(|d| d.bounds.center())
    }

    /// Scripted gesture: press at `from`, move right by the configured step
    /// once per frame for `frames` frames, release.
    pub async fn drag(&mut self, from: (f32, f32), frames: u32) -> bool {
        if !self.pointer_down(from.0, from.1) {
            log::warn!("nothing draggable at ({}, {})", from.0, from.1);
            return false;
        }
        let mut interval = self.interval();
        for step in 1..=frames {
            interval.tick().await;
            let x = from.0 + step as f32 * self.config.drag_step;
            self.pointer_move(x, from.1);
            self.tick();
        }
        self.pointer_up()
    }

    // ─── Commands ────────────────────────────────────────────────────────

    /// Randomize every drawable's paint; records `lastMutation`.
    pub fn mutate(&mut self) -> Option<usize> {
        let started = self.clock.now();
        let touched = self.handle.surface_mut()?.mutate();
        self.record_mutation(started);
        Some(touched)
    }

    pub fn toggle_arrow_color(&mut self) -> Option<usize> {
        let started = self.clock.now();
        let toggled = self.handle.surface_mut()?.toggle_arrow_color();
        self.record_mutation(started);
        Some(toggled)
    }

    fn record_mutation(&self, started: Duration) {
        let ms = millis_between(started, self.clock.now());
        self.metrics.borrow_mut().last_mutation = Some(ms);
    }

    /// Swap in the next activity scene. `None` when nothing is attached.
    pub async fn advance_activity(&mut self) -> Option<Result<usize, ActivityError>> {
        let surface: &mut dyn Surface = self.handle.surface_mut()?;
        Some(self.activity.advance(surface).await)
    }

    pub fn play(&mut self) -> Option<usize> {
        Some(self.handle.surface_mut()?.play())
    }

    pub fn pause(&mut self) -> Option<usize> {
        Some(self.handle.surface_mut()?.pause())
    }

    pub fn resize(&self, width: u32, height: u32) {
        self.container.resize(width, height);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}
