//! Dynamic content: activity scenes swapped into the dynamic group.

use crate::clock::{Clock, millis_between};
use crate::metrics::SharedMetrics;
use rb_core::model::Scene;
use rb_core::{FetchError, Fetcher};
use rb_render::{Group, Surface};
use std::rc::Rc;
use std::sync::Arc;

/// Placeholder replaced by the activity number in the URL template.
pub const ID_PLACEHOLDER: &str = "{id}";
pub const DEFAULT_TEMPLATE: &str = "/data/activity{id}.json";

#[derive(Debug, thiserror::Error)]
pub enum ActivityError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("activity {location} is not a scene: {source}")]
    Decode {
        location: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Walks activity documents `1, 2, 3, ...`. A failed fetch resets the
/// sequence so the next advance starts again at 1.
pub struct ActivityLoader {
    counter: Option<u32>,
    template: String,
    fetcher: Arc<dyn Fetcher>,
    clock: Rc<dyn Clock>,
    metrics: SharedMetrics,
}

impl ActivityLoader {
    pub fn new(
        template: impl Into<String>,
        fetcher: Arc<dyn Fetcher>,
        clock: Rc<dyn Clock>,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            counter: None,
            template: template.into(),
            fetcher,
            clock,
            metrics,
        }
    }

    /// The activity currently shown, if any.
    pub fn current(&self) -> Option<u32> {
        self.counter
    }

    pub fn location(&self, id: u32) -> String {
        self.template.replace(ID_PLACEHOLDER, &id.to_string())
    }

    /// Back to the start of the sequence, e.g. after a backend switch.
    pub fn reset(&mut self) {
        self.counter = None;
    }

    /// Replace the dynamic group with the next activity scene. The base
    /// group is never touched. On failure the dynamic group stays empty.
    pub async fn advance(&mut self, surface: &mut dyn Surface) -> Result<usize, ActivityError> {
        let started = self.clock.now();
        surface.clear_group(Group::Dynamic);

        let id = self.counter.map_or(1, |n| n + 1);
        self.counter = Some(id);
        let location = self.location(id);

        let scene = match self.fetch(&location).await {
            Ok(scene) => scene,
            Err(e) => {
                log::warn!("failed to load activity {id}: {e}");
                self.counter = None;
                surface.redraw();
                return Err(e);
            }
        };

        surface.populate(Group::Dynamic, &scene).await;
        let elapsed = millis_between(started, self.clock.now());
        self.metrics.borrow_mut().last_activity = Some(elapsed);
        log::info!(
            "activity {id}: {} shapes from {location} in {elapsed:.1} ms",
            scene.len()
        );
        Ok(surface.group_len(Group::Dynamic))
    }

    async fn fetch(&self, location: &str) -> Result<Scene, ActivityError> {
        let bytes = self.fetcher.fetch(location).await?;
        serde_json::from_slice(&bytes).map_err(|source| ActivityError::Decode {
            location: location.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::metrics::Metrics;
    use rb_core::MemoryFetcher;

    fn loader(fetcher: MemoryFetcher) -> ActivityLoader {
        ActivityLoader::new(
            DEFAULT_TEMPLATE,
            Arc::new(fetcher),
            Rc::new(ManualClock::new()),
            Metrics::shared(),
        )
    }

    #[test]
    fn template_substitutes_id() {
        let l = loader(MemoryFetcher::new());
        assert_eq!(l.location(3), "/data/activity3.json");
        assert_eq!(l.current(), None);
    }

    #[tokio::test]
    async fn non_array_document_is_a_decode_error() {
        let l = loader(MemoryFetcher::new().with("/data/activity1.json", r#"{"shapes": []}"#));
        assert!(matches!(
            l.fetch("/data/activity1.json").await,
            Err(ActivityError::Decode { .. })
        ));
        assert!(matches!(
            l.fetch("/data/activity9.json").await,
            Err(ActivityError::Fetch(FetchError::NotFound(_)))
        ));
    }
}
