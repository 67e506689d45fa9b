//! The renderer contract.
//!
//! Every backend adapter implements [`Renderer`]: given a target container and
//! a scene it materializes every shape as a native drawable and returns a
//! [`Handle`]. The harness drives the handle through the object-safe
//! [`Surface`] trait and never learns which backend sits behind it.

use crate::container::Container;
use crate::text::FontBook;
use async_trait::async_trait;
use rb_core::model::{Scene, Shape, ShapeType};
use rb_core::{Bounds, Fetcher, ShapeId};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

// ─── Backend identity ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Immediate-mode raster canvas.
    Canvas,
    /// Retained scene graph.
    Scene,
    /// DOM-style vector graphics.
    Svg,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [BackendKind::Canvas, BackendKind::Scene, BackendKind::Svg];

    pub const fn as_str(self) -> &'static str {
        match self {
            BackendKind::Canvas => "canvas",
            BackendKind::Scene => "scene",
            BackendKind::Svg => "svg",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown backend `{s}` (expected canvas, scene or svg)"))
    }
}

/// How a backend gets pixels on screen after a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrawMode {
    /// The render loop must force a redraw every frame.
    Forced,
    /// Changes are live as soon as they are applied.
    Automatic,
}

// ─── Groups & readiness ──────────────────────────────────────────────────

/// Drawable groups. `Dynamic` paints above `Base` and is swapped
/// independently by the activity loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    Base,
    Dynamic,
}

impl Group {
    pub const ALL: [Group; 2] = [Group::Base, Group::Dynamic];

    pub const fn index(self) -> usize {
        match self {
            Group::Base => 0,
            Group::Dynamic => 1,
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Group::Base => "base",
            Group::Dynamic => "dynamic",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    /// Every synchronous shape is materialized; resources may still be loading.
    SceneBuilt,
    /// No resource load is outstanding.
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub phase: BuildPhase,
    pub pending: usize,
}

impl Readiness {
    pub fn from_pending(pending: usize) -> Self {
        let phase = if pending == 0 {
            BuildPhase::Settled
        } else {
            BuildPhase::SceneBuilt
        };
        Self { phase, pending }
    }

    pub fn is_settled(&self) -> bool {
        self.phase == BuildPhase::Settled
    }
}

// ─── Injected collaborators ──────────────────────────────────────────────

/// Drag lifecycle callbacks. Each fires exactly once per gesture, no matter
/// how many drawables the gesture touches.
pub struct DragHooks {
    on_start: Box<dyn FnMut()>,
    on_end: Box<dyn FnMut()>,
}

impl DragHooks {
    pub fn new(on_start: impl FnMut() + 'static, on_end: impl FnMut() + 'static) -> Self {
        Self {
            on_start: Box::new(on_start),
            on_end: Box::new(on_end),
        }
    }

    pub fn none() -> Self {
        Self::new(|| {}, || {})
    }

    pub(crate) fn start(&mut self) {
        (self.on_start)();
    }

    pub(crate) fn end(&mut self) {
        (self.on_end)();
    }
}

impl Default for DragHooks {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for DragHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DragHooks")
    }
}

/// Shared settings and collaborators handed to every adapter.
#[derive(Clone)]
pub struct RenderContext {
    pub fetcher: Arc<dyn Fetcher>,
    /// Shapes materialized per batch before yielding to the scheduler.
    pub chunk_size: usize,
    /// Mutation palette seed; `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Face used by backends that paint glyphs themselves.
    pub fonts: Option<Arc<FontBook>>,
}

impl RenderContext {
    pub const DEFAULT_CHUNK_SIZE: usize = 2000;
    pub const DEFAULT_SEED: u64 = 0x5EED;

    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            seed: Some(Self::DEFAULT_SEED),
            fonts: FontBook::system(),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_fonts(mut self, fonts: Option<Arc<FontBook>>) -> Self {
        self.fonts = fonts;
        self
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("chunk_size", &self.chunk_size)
            .field("seed", &self.seed)
            .field("fonts", &self.fonts.as_ref().map(|f| f.source()))
            .finish_non_exhaustive()
    }
}

// ─── Introspection records ───────────────────────────────────────────────

/// What a drawable currently shows, as seen from outside the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawableInfo {
    pub id: ShapeId,
    pub shape_type: ShapeType,
    pub group: Group,
    /// Current shape state, including mutations.
    pub shape: Shape,
    /// Bounds after drag and scale.
    pub bounds: Bounds,
    pub scale: f32,
    pub overlay: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaPhase {
    Loading,
    Ready,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub id: ShapeId,
    pub phase: MediaPhase,
    pub playing: bool,
    pub position: Duration,
    pub overlay_text: Option<String>,
}

// ─── Contract ────────────────────────────────────────────────────────────

/// A backend adapter.
#[async_trait(?Send)]
pub trait Renderer {
    fn kind(&self) -> BackendKind;

    /// Build `scene` into `target`. Never fails: a missing or busy target
    /// yields an empty handle and an error log.
    async fn create(
        &self,
        target: Option<&Container>,
        scene: &Scene,
        hooks: DragHooks,
        ctx: &RenderContext,
    ) -> Handle;
}

/// A live, attached backend.
#[async_trait(?Send)]
pub trait Surface: Any {
    fn kind(&self) -> BackendKind;
    fn redraw_mode(&self) -> RedrawMode;

    /// Per-tick hook: accept landed resources, follow container resizes,
    /// advance playing media, and redraw when the backend needs it.
    fn frame(&mut self, dt: Duration);

    /// Force one redraw now.
    fn redraw(&mut self);

    fn readiness(&self) -> Readiness;

    /// Wait until every outstanding resource load has landed.
    async fn settle(&mut self);

    fn drawable_count(&self) -> usize;
    fn group_len(&self, group: Group) -> usize;
    fn drawables(&self, group: Group) -> Vec<DrawableInfo>;

    /// Materialize `scene` into `group`, after anything already there.
    async fn populate(&mut self, group: Group, scene: &Scene);

    /// Remove every drawable in `group` and discard its in-flight loads.
    fn clear_group(&mut self, group: Group);

    /// Randomize fill/stroke of every drawable and force one redraw.
    /// Returns the number of drawables touched.
    fn mutate(&mut self) -> usize;

    /// Swap dynamic `arrow` drawables between green and red strokes.
    fn toggle_arrow_color(&mut self) -> usize;

    fn pointer_down(&mut self, x: f32, y: f32) -> bool;
    fn pointer_move(&mut self, x: f32, y: f32) -> bool;
    fn pointer_up(&mut self) -> bool;
    fn wheel(&mut self, x: f32, y: f32, delta_y: f32) -> bool;

    fn play(&mut self) -> usize;
    fn pause(&mut self) -> usize;
    fn media(&self) -> Vec<MediaInfo>;

    /// Release the container, disconnect observers, drop every drawable.
    /// Idempotent.
    fn detach(&mut self);

    fn as_any(&self) -> &dyn Any;
}

/// Result of [`Renderer::create`]. An empty handle is the failure value.
#[derive(Default)]
pub struct Handle {
    surface: Option<Box<dyn Surface>>,
}

impl Handle {
    pub fn new(surface: Box<dyn Surface>) -> Self {
        Self {
            surface: Some(surface),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.surface.is_none()
    }

    pub fn kind(&self) -> Option<BackendKind> {
        self.surface.as_ref().map(|s| s.kind())
    }

    pub fn surface(&self) -> Option<&dyn Surface> {
        self.surface.as_deref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut (dyn Surface + 'static)> {
        self.surface.as_deref_mut()
    }

    pub fn drawable_count(&self) -> usize {
        self.surface.as_ref().map_or(0, |s| s.drawable_count())
    }

    /// Concrete backend access, mainly for inspection in tests.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.surface.as_ref()?.as_any().downcast_ref::<T>()
    }

    /// Detach the surface and leave the handle empty.
    pub fn release(&mut self) {
        if let Some(mut surface) = self.surface.take() {
            surface.detach();
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.surface {
            Some(s) => write!(f, "Handle({}, {} drawables)", s.kind(), s.drawable_count()),
            None => f.write_str("Handle(empty)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_parses_case_insensitively() {
        assert_eq!("SVG".parse::<BackendKind>(), Ok(BackendKind::Svg));
        assert_eq!(" canvas ".parse::<BackendKind>(), Ok(BackendKind::Canvas));
        assert!("webgl".parse::<BackendKind>().is_err());
    }

    #[test]
    fn readiness_follows_pending_count() {
        assert!(Readiness::from_pending(0).is_settled());
        assert_eq!(Readiness::from_pending(3).phase, BuildPhase::SceneBuilt);
    }

    #[test]
    fn empty_handle_reports_nothing() {
        let mut handle = Handle::empty();
        assert!(handle.is_empty());
        assert_eq!(handle.kind(), None);
        assert_eq!(handle.drawable_count(), 0);
        handle.release();
        assert!(handle.is_empty());
    }
}
