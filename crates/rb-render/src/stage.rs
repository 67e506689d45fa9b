//! Backend-neutral drawable management.
//!
//! `Stage<B>` owns everything the backends have in common: the two drawable
//! groups, chunked scene materialization, asynchronous resource insertion,
//! drag and wheel gestures, the mutate and arrow-color commands, media,
//! resize observation and teardown. A backend only turns shapes into native
//! nodes, keeps those nodes current, and presents them.

use crate::container::{Container, ContainerLease, Size};
use crate::contract::{
    BackendKind, DragHooks, DrawableInfo, Group, Handle, MediaInfo, Readiness, RedrawMode,
    RenderContext, Surface,
};
use crate::drawable::{Drawable, Placement, Role};
use crate::hit::hit_test;
use crate::media::{self, MediaState};
use crate::palette::Palette;
use crate::raster::{self, Resource, ResourceError};
use async_trait::async_trait;
use rb_core::model::{Rgb, Scene, Shape, ShapeKind};
use rb_core::{FetchError, Fetcher, ShapeId};
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

/// Text written into every text drawable by the mutate command.
pub const UPDATED_TEXT: &str = "Updated!";

/// Shape name targeted by the arrow-color command.
pub const ARROW_NAME: &str = "arrow";

/// Wheel zoom factor per notch.
pub const SCALE_STEP: f32 = 1.1;

/// What a graphics backend must provide.
pub trait NativeBackend: 'static {
    type Node: 'static;

    const KIND: BackendKind;
    const REDRAW: RedrawMode;

    fn attach(&mut self, size: Size);
    fn resize(&mut self, size: Size);

    /// Build a node for a synchronously materialized shape. `None` means the
    /// backend cannot draw this shape; it is skipped with a warning.
    fn build(&mut self, shape: &Shape) -> Option<Self::Node>;

    /// Build a node for an `image`/`ecad` shape whose resource has landed.
    fn build_resource(&mut self, shape: &Shape, resource: &Resource) -> Option<Self::Node>;

    /// Bring `node` in line with its shape (after a mutation) and placement
    /// (after a drag or wheel).
    fn update(&mut self, node: &mut Self::Node, shape: &Shape, placement: &Placement);

    /// Draw both groups, base first.
    fn present(&mut self, layers: [&[Drawable<Self::Node>]; 2]);

    fn detach(&mut self);
}

enum Outcome {
    Resource(Result<Resource, ResourceError>),
    Metadata(Result<(), FetchError>),
    /// The load task unwound or was cancelled before reporting.
    Abandoned,
}

/// A finished background load, tagged with the group generation it was
/// started under.
struct Landed {
    group: Group,
    generation: u64,
    order: usize,
    shape: Shape,
    outcome: Outcome,
}

/// Reports a load task's result to its stage exactly once. Dropping it
/// unsent (a panic in the fetcher, a cancelled task) reports
/// `Outcome::Abandoned` so the pending count still drains.
struct Delivery {
    tx: mpsc::UnboundedSender<Landed>,
    slot: Option<(Group, u64, usize, Shape)>,
}

impl Delivery {
    fn new(tx: mpsc::UnboundedSender<Landed>, group: Group, generation: u64, order: usize, shape: Shape) -> Self {
        Self {
            tx,
            slot: Some((group, generation, order, shape)),
        }
    }

    fn send(mut self, outcome: Outcome) {
        self.deliver(outcome);
    }

    fn deliver(&mut self, outcome: Outcome) {
        if let Some((group, generation, order, shape)) = self.slot.take() {
            // The stage may be gone by now; nothing to deliver then.
            let _ = self.tx.send(Landed {
                group,
                generation,
                order,
                shape,
                outcome,
            });
        }
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        self.deliver(Outcome::Abandoned);
    }
}

struct Gesture {
    group: Group,
    order: (usize, u8),
    last: (f32, f32),
}

pub struct Stage<B: NativeBackend> {
    backend: B,
    layers: [Vec<Drawable<B::Node>>; 2],
    next_order: [usize; 2],
    /// Bumped on every clear so loads started before it are discarded.
    generations: [u64; 2],
    pending: [usize; 2],
    media: Vec<MediaState>,
    gesture: Option<Gesture>,
    hooks: DragHooks,
    palette: Palette,
    fetcher: Arc<dyn Fetcher>,
    chunk_size: usize,
    landed_tx: mpsc::UnboundedSender<Landed>,
    landed_rx: mpsc::UnboundedReceiver<Landed>,
    lease: Option<ContainerLease>,
    observer: Option<watch::Receiver<Size>>,
    size: Size,
    presents: u64,
}

impl<B: NativeBackend> Stage<B> {
    /// Attach `backend` to `target` and build `scene` into the base group.
    pub async fn create(
        mut backend: B,
        target: Option<&Container>,
        scene: &Scene,
        hooks: DragHooks,
        ctx: &RenderContext,
    ) -> Handle {
        let Some(container) = target else {
            log::error!("{} renderer: target container is missing", B::KIND);
            return Handle::empty();
        };
        let lease = match container.claim(B::KIND) {
            Ok(lease) => lease,
            Err(e) => {
                log::error!("{} renderer: {e}", B::KIND);
                return Handle::empty();
            }
        };

        let started = Instant::now();
        let size = lease.size();
        backend.attach(size);
        let observer = lease.observe();
        let (landed_tx, landed_rx) = mpsc::unbounded_channel();

        let mut stage = Stage {
            backend,
            layers: [Vec::with_capacity(scene.len()), Vec::new()],
            next_order: [0; 2],
            generations: [0; 2],
            pending: [0; 2],
            media: Vec::new(),
            gesture: None,
            hooks,
            palette: Palette::new(ctx.seed),
            fetcher: Arc::clone(&ctx.fetcher),
            chunk_size: ctx.chunk_size.max(1),
            landed_tx,
            landed_rx,
            lease: Some(lease),
            observer: Some(observer),
            size,
            presents: 0,
        };

        stage.populate_group(Group::Base, scene).await;
        stage.redraw_now();
        log::info!(
            "{} renderer built {} drawables on {} in {:?} ({} resources pending)",
            B::KIND,
            stage.drawable_total(),
            container.id(),
            started.elapsed(),
            stage.pending_total()
        );
        Handle::new(Box::new(stage))
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn layer(&self, group: Group) -> &[Drawable<B::Node>] {
        &self.layers[group.index()]
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Number of presents issued so far.
    pub fn presents(&self) -> u64 {
        self.presents
    }

    fn layer_refs(&self) -> [&[Drawable<B::Node>]; 2] {
        [&self.layers[0], &self.layers[1]]
    }

    fn drawable_total(&self) -> usize {
        self.layers.iter().map(Vec::len).sum()
    }

    fn pending_total(&self) -> usize {
        self.pending.iter().sum()
    }

    fn sync_container(&self) {
        if let Some(lease) = &self.lease {
            lease.set_attached(self.drawable_total());
        }
    }

    fn redraw_now(&mut self) {
        if self.lease.is_none() {
            return;
        }
        let [base, dynamic] = &self.layers;
        self.backend.present([base, dynamic]);
        self.presents += 1;
    }

    /// Redraw after a command. Automatic backends already show the change.
    fn refresh(&mut self) {
        if B::REDRAW == RedrawMode::Forced {
            self.redraw_now();
        }
    }

    // ─── Materialization ─────────────────────────────────────────────────

    async fn populate_group(&mut self, group: Group, scene: &Scene) {
        let generation = self.generations[group.index()];
        for (n, chunk) in scene.shapes().chunks(self.chunk_size).enumerate() {
            if n > 0 {
                // Let input and timers run between batches.
                tokio::task::yield_now().await;
            }
            for shape in chunk {
                let order = self.next_order[group.index()];
                self.next_order[group.index()] += 1;
                self.materialize(group, generation, order, shape);
            }
        }
        self.sync_container();
    }

    fn materialize(&mut self, group: Group, generation: u64, order: usize, shape: &Shape) {
        match shape.kind {
            ShapeKind::Image { .. } | ShapeKind::Ecad { .. } => {
                self.spawn_resource(group, generation, order, shape.clone());
            }
            ShapeKind::Video { .. } => self.materialize_video(group, generation, order, shape),
            ShapeKind::Rect { .. }
            | ShapeKind::Line { .. }
            | ShapeKind::Polygon { .. }
            | ShapeKind::Text { .. } => {
                self.insert_built(group, (order, 0), Role::Shape, shape.clone());
            }
        }
    }

    fn insert_built(&mut self, group: Group, order: (usize, u8), role: Role, shape: Shape) -> bool {
        match self.backend.build(&shape) {
            Some(node) => {
                insert_ordered(&mut self.layers[group.index()], Drawable::new(shape, order, role, node));
                true
            }
            None => {
                log::warn!(
                    "{} renderer cannot draw {} {}, skipped",
                    B::KIND,
                    shape.shape_type(),
                    shape.id
                );
                false
            }
        }
    }

    fn spawn_resource(&mut self, group: Group, generation: u64, order: usize, shape: Shape) {
        self.pending[group.index()] += 1;
        let target = shape.clone();
        let delivery = Delivery::new(self.landed_tx.clone(), group, generation, order, shape);
        let fetcher = Arc::clone(&self.fetcher);
        tokio::spawn(async move {
            let result = raster::load_resource(fetcher.as_ref(), &target).await;
            delivery.send(Outcome::Resource(result));
        });
    }

    fn materialize_video(&mut self, group: Group, generation: u64, order: usize, shape: &Shape) {
        let ShapeKind::Video { url, .. } = &shape.kind else {
            return;
        };
        if !self.insert_built(group, (order, 0), Role::Media, shape.clone()) {
            return;
        }
        let overlay = overlay_shape(shape.id, self.size);
        self.insert_built(group, (order, 1), Role::Overlay, overlay);
        self.media.push(MediaState::new(shape.id, group, order));

        self.pending[group.index()] += 1;
        let delivery = Delivery::new(self.landed_tx.clone(), group, generation, order, shape.clone());
        let fetcher = Arc::clone(&self.fetcher);
        let url = url.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch(&url).await.map(|bytes| {
                log::trace!("video metadata for {url}: {} bytes", bytes.len());
            });
            delivery.send(Outcome::Metadata(result));
        });
    }

    /// Apply one finished load. Returns whether anything visible changed.
    fn accept(&mut self, landed: Landed) -> bool {
        let g = landed.group.index();
        if landed.generation != self.generations[g] {
            log::debug!(
                "discarding stale {} load for {}",
                landed.shape.shape_type(),
                landed.shape.id
            );
            return false;
        }
        self.pending[g] = self.pending[g].saturating_sub(1);

        match landed.outcome {
            Outcome::Resource(Ok(resource)) => {
                let Some(node) = self.backend.build_resource(&landed.shape, &resource) else {
                    log::warn!(
                        "{} renderer cannot draw {} {}, skipped",
                        B::KIND,
                        landed.shape.shape_type(),
                        landed.shape.id
                    );
                    return false;
                };
                let drawable = Drawable::new(landed.shape, (landed.order, 0), Role::Shape, node);
                insert_ordered(&mut self.layers[g], drawable);
                self.sync_container();
                true
            }
            Outcome::Resource(Err(e)) => {
                log::warn!(
                    "{} renderer: {} {} not loaded: {e}",
                    B::KIND,
                    landed.shape.shape_type(),
                    landed.shape.id
                );
                false
            }
            Outcome::Abandoned if matches!(landed.shape.kind, ShapeKind::Video { .. }) => {
                log::warn!("video {} metadata task ended without a result", landed.shape.id);
                self.metadata_landed(landed.group, landed.order, false)
            }
            Outcome::Abandoned => {
                log::warn!(
                    "{} renderer: {} {} load task ended without a result",
                    B::KIND,
                    landed.shape.shape_type(),
                    landed.shape.id
                );
                false
            }
            Outcome::Metadata(result) => {
                if let Err(e) = &result {
                    log::warn!("video {} metadata not loaded: {e}", landed.shape.id);
                }
                self.metadata_landed(landed.group, landed.order, result.is_ok())
            }
        }
    }

    fn metadata_landed(&mut self, group: Group, order: usize, ok: bool) -> bool {
        let Some(state) = self.media.iter_mut().find(|m| m.group == group && m.order == order) else {
            return false;
        };
        match state.metadata(ok) {
            Some(text) => {
                let text = text.to_string();
                self.set_overlay_text(group, order, &text)
            }
            None => false,
        }
    }

    fn set_overlay_text(&mut self, group: Group, order: usize, text: &str) -> bool {
        let size = self.size;
        let Some(d) = find_mut(&mut self.layers[group.index()], (order, 1)) else {
            return false;
        };
        if let ShapeKind::Text { value, .. } = &mut d.shape.kind {
            *value = text.to_string();
        }
        center_in(&mut d.shape, size);
        self.backend.update(&mut d.node, &d.shape, &d.placement);
        true
    }

    /// Accept landed loads, follow resizes, advance media.
    fn pump(&mut self, dt: Duration) -> bool {
        let mut changed = false;
        while let Ok(landed) = self.landed_rx.try_recv() {
            changed |= self.accept(landed);
        }

        if let Some(observer) = self.observer.as_mut()
            && observer.has_changed().unwrap_or(false)
        {
            let size = *observer.borrow_and_update();
            self.resize(size);
            changed = true;
        }

        for m in &mut self.media {
            changed |= m.advance(dt);
        }
        changed
    }

    fn resize(&mut self, size: Size) {
        self.size = size;
        self.backend.resize(size);
        for layer in &mut self.layers {
            for d in layer.iter_mut().filter(|d| d.role == Role::Overlay) {
                center_in(&mut d.shape, size);
                self.backend.update(&mut d.node, &d.shape, &d.placement);
            }
        }
        log::debug!("{} renderer resized to {size}", B::KIND);
    }

    fn clear(&mut self, group: Group) {
        let g = group.index();
        if self.gesture.as_ref().is_some_and(|gesture| gesture.group == group) {
            self.gesture = None;
            self.hooks.end();
        }
        self.generations[g] += 1;
        self.pending[g] = 0;
        self.next_order[g] = 0;
        self.layers[g].clear();
        self.media.retain(|m| m.group != group);
    }
}

// ─── Surface ─────────────────────────────────────────────────────────────

#[async_trait(?Send)]
impl<B: NativeBackend> Surface for Stage<B> {
    fn kind(&self) -> BackendKind {
        B::KIND
    }

    fn redraw_mode(&self) -> RedrawMode {
        B::REDRAW
    }

    fn frame(&mut self, dt: Duration) {
        if self.lease.is_none() {
            return;
        }
        self.pump(dt);
        if B::REDRAW == RedrawMode::Forced {
            self.redraw_now();
        }
    }

    fn redraw(&mut self) {
        self.redraw_now();
    }

    fn readiness(&self) -> Readiness {
        Readiness::from_pending(self.pending_total())
    }

    async fn settle(&mut self) {
        let mut changed = false;
        while self.pending_total() > 0 {
            match self.landed_rx.recv().await {
                Some(landed) => changed |= self.accept(landed),
                None => break,
            }
        }
        if changed {
            self.refresh();
        }
    }

    fn drawable_count(&self) -> usize {
        self.drawable_total()
    }

    fn group_len(&self, group: Group) -> usize {
        self.layers[group.index()].len()
    }

    fn drawables(&self, group: Group) -> Vec<DrawableInfo> {
        self.layers[group.index()]
            .iter()
            .map(|d| DrawableInfo {
                id: d.shape.id,
                shape_type: d.shape.shape_type(),
                group,
                shape: d.shape.clone(),
                bounds: d.bounds(),
                scale: d.placement.scale,
                overlay: d.role == Role::Overlay,
            })
            .collect()
    }

    async fn populate(&mut self, group: Group, scene: &Scene) {
        if self.lease.is_none() {
            log::warn!("{} renderer is detached, ignoring populate", B::KIND);
            return;
        }
        self.populate_group(group, scene).await;
        self.refresh();
    }

    fn clear_group(&mut self, group: Group) {
        self.clear(group);
        self.sync_container();
    }

    fn mutate(&mut self) -> usize {
        let started = Instant::now();
        let mut touched = 0;
        for layer in &mut self.layers {
            for d in layer.iter_mut().filter(|d| d.role != Role::Overlay) {
                recolor(&mut d.shape, self.palette.color());
                self.backend.update(&mut d.node, &d.shape, &d.placement);
                touched += 1;
            }
        }
        self.refresh();
        log::info!(
            "{} mutate: {touched} drawables in {:?}",
            B::KIND,
            started.elapsed()
        );
        touched
    }

    fn toggle_arrow_color(&mut self) -> usize {
        let started = Instant::now();
        let mut toggled = 0;
        let layer = &mut self.layers[Group::Dynamic.index()];
        for d in layer
            .iter_mut()
            .filter(|d| d.shape.name.as_deref() == Some(ARROW_NAME))
        {
            let next = if d.shape.style.stroke == Some(Rgb::GREEN) {
                Rgb::RED
            } else {
                Rgb::GREEN
            };
            d.shape.style.stroke = Some(next);
            self.backend.update(&mut d.node, &d.shape, &d.placement);
            toggled += 1;
        }
        self.refresh();
        log::info!(
            "{} arrow color: {toggled} drawables in {:?}",
            B::KIND,
            started.elapsed()
        );
        toggled
    }

    fn pointer_down(&mut self, x: f32, y: f32) -> bool {
        if self.gesture.is_some() || self.lease.is_none() {
            return false;
        }
        let Some((group, index)) = hit_test(self.layer_refs(), x, y) else {
            return false;
        };
        let d = &self.layers[group.index()][index];
        if !d.shape.draggable {
            return false;
        }
        log::trace!("drag start on {} at ({x}, {y})", d.shape.id);
        self.gesture = Some(Gesture {
            group,
            order: d.order,
            last: (x, y),
        });
        self.hooks.start();
        true
    }

    fn pointer_move(&mut self, x: f32, y: f32) -> bool {
        let Some(gesture) = self.gesture.as_mut() else {
            return false;
        };
        let (dx, dy) = (x - gesture.last.0, y - gesture.last.1);
        gesture.last = (x, y);
        let (group, order) = (gesture.group, gesture.order);

        let Some(d) = find_mut(&mut self.layers[group.index()], order) else {
            return false;
        };
        d.placement.dx += dx;
        d.placement.dy += dy;
        self.backend.update(&mut d.node, &d.shape, &d.placement);
        true
    }

    fn pointer_up(&mut self) -> bool {
        match self.gesture.take() {
            Some(_) => {
                self.hooks.end();
                true
            }
            None => false,
        }
    }

    fn wheel(&mut self, x: f32, y: f32, delta_y: f32) -> bool {
        let Some((group, index)) = hit_test(self.layer_refs(), x, y) else {
            return false;
        };
        let d = &mut self.layers[group.index()][index];
        if !d.shape.scaleable {
            return false;
        }
        let factor = if delta_y < 0.0 {
            SCALE_STEP
        } else {
            1.0 / SCALE_STEP
        };
        d.placement.scale *= factor;
        self.backend.update(&mut d.node, &d.shape, &d.placement);
        true
    }

    fn play(&mut self) -> usize {
        let mut finished_overlays = Vec::new();
        for m in &mut self.media {
            if m.play() {
                finished_overlays.push((m.group, m.order));
            }
        }
        for (group, order) in finished_overlays {
            let layer = &mut self.layers[group.index()];
            if let Ok(i) = layer.binary_search_by(|d| d.order.cmp(&(order, 1))) {
                layer.remove(i);
            }
        }
        self.sync_container();
        self.refresh();
        self.media.iter().filter(|m| m.playing).count()
    }

    fn pause(&mut self) -> usize {
        let mut paused = 0;
        for m in self.media.iter_mut().filter(|m| m.playing) {
            m.pause();
            paused += 1;
        }
        self.refresh();
        paused
    }

    fn media(&self) -> Vec<MediaInfo> {
        self.media.iter().map(MediaState::info).collect()
    }

    fn detach(&mut self) {
        let Some(lease) = self.lease.take() else {
            return;
        };
        if self.gesture.take().is_some() {
            self.hooks.end();
        }
        self.observer = None;
        for group in Group::ALL {
            let g = group.index();
            self.generations[g] += 1;
            self.pending[g] = 0;
            self.layers[g].clear();
        }
        self.media.clear();
        self.backend.detach();
        drop(lease);
        log::debug!("{} renderer detached", B::KIND);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<B: NativeBackend> Drop for Stage<B> {
    fn drop(&mut self) {
        Surface::detach(self);
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────

fn insert_ordered<N>(layer: &mut Vec<Drawable<N>>, drawable: Drawable<N>) {
    let at = layer.partition_point(|d| d.order < drawable.order);
    layer.insert(at, drawable);
}

fn find_mut<N>(layer: &mut [Drawable<N>], order: (usize, u8)) -> Option<&mut Drawable<N>> {
    let i = layer.binary_search_by(|d| d.order.cmp(&order)).ok()?;
    layer.get_mut(i)
}

fn recolor(shape: &mut Shape, color: Rgb) {
    match &mut shape.kind {
        ShapeKind::Rect { .. } | ShapeKind::Polygon { .. } => shape.style.fill = Some(color),
        ShapeKind::Line { .. } => shape.style.stroke = Some(color),
        ShapeKind::Text { value, .. } => {
            shape.style.fill = Some(color);
            *value = UPDATED_TEXT.to_string();
        }
        ShapeKind::Image { .. } | ShapeKind::Ecad { .. } | ShapeKind::Video { .. } => {
            shape.style.stroke = Some(color);
        }
    }
}

fn overlay_shape(media: ShapeId, size: Size) -> Shape {
    let mut shape = Shape::text(&format!("{media}-overlay"), 0.0, 0.0, media::LOADING_TEXT)
        .with_fill(Rgb::BLACK);
    if let ShapeKind::Text { font, .. } = &mut shape.kind {
        font.size = Some(media::OVERLAY_FONT_SIZE);
    }
    center_in(&mut shape, size);
    shape
}

fn center_in(shape: &mut Shape, size: Size) {
    let b = shape.bounds();
    shape.x = (size.width as f32 - b.width) / 2.0;
    shape.y = (size.height as f32 - b.height) / 2.0;
}
