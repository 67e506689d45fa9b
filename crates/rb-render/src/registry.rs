use crate::canvas::CanvasRenderer;
use crate::container::Container;
use crate::contract::{BackendKind, DragHooks, Handle, RenderContext, Renderer};
use crate::scene::SceneRenderer;
use crate::svg::SvgRenderer;
use rb_core::model::Scene;
use std::collections::HashMap;

/// Backend selection by kind. The harness only ever goes through here, so
/// adding a backend means registering one more adapter.
#[derive(Default)]
pub struct Registry {
    adapters: HashMap<BackendKind, Box<dyn Renderer>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the canvas, scene-graph and SVG adapters.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CanvasRenderer));
        registry.register(Box::new(SceneRenderer));
        registry.register(Box::new(SvgRenderer));
        registry
    }

    /// Add an adapter, replacing any previous one of the same kind.
    pub fn register(&mut self, adapter: Box<dyn Renderer>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    pub fn get(&self, kind: BackendKind) -> Option<&dyn Renderer> {
        self.adapters.get(&kind).map(|a| a.as_ref())
    }

    /// Registered kinds in canonical order.
    pub fn kinds(&self) -> Vec<BackendKind> {
        BackendKind::ALL
            .into_iter()
            .filter(|k| self.adapters.contains_key(k))
            .collect()
    }

    pub async fn create(
        &self,
        kind: BackendKind,
        target: Option<&Container>,
        scene: &Scene,
        hooks: DragHooks,
        ctx: &RenderContext,
    ) -> Handle {
        match self.get(kind) {
            Some(adapter) => adapter.create(target, scene, hooks, ctx).await,
            None => {
                log::error!("no {kind} adapter registered");
                Handle::empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_kind() {
        assert_eq!(Registry::with_defaults().kinds(), BackendKind::ALL.to_vec());
        assert!(Registry::new().kinds().is_empty());
    }

    #[tokio::test]
    async fn unknown_adapter_gives_empty_handle() {
        let ctx = RenderContext::new(std::sync::Arc::new(rb_core::MemoryFetcher::new()));
        let container = Container::new("host", 10, 10);
        let handle = Registry::new()
            .create(BackendKind::Svg, Some(&container), &Scene::new(), DragHooks::none(), &ctx)
            .await;
        assert!(handle.is_empty());
        assert_eq!(container.owner(), None);
    }
}
