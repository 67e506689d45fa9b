//! Loading scenes from fetchable locations.

use crate::fetch::{FetchError, Fetcher};
use crate::model::Scene;
use crate::worker::parse_off_thread;

/// Document format, chosen by the location's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneFormat {
    /// Array of shape records.
    Json,
    /// Designer XML, parsed off-thread.
    Xml,
}

impl SceneFormat {
    pub fn from_location(location: &str) -> Self {
        let path = location.split(['?', '#']).next().unwrap_or_default();
        if path.to_ascii_lowercase().ends_with(".json") {
            SceneFormat::Json
        } else {
            SceneFormat::Xml
        }
    }
}

/// Fetch and decode a scene. Fetch or parse failures are logged and yield
/// an empty scene.
pub async fn load_scene(fetcher: &dyn Fetcher, location: &str) -> Scene {
    match try_load_scene(fetcher, location).await {
        Ok(scene) => {
            log::info!("loaded {} shapes from {location}", scene.len());
            scene
        }
        Err(e) => {
            log::error!("failed to fetch scene {location}: {e}");
            Scene::new()
        }
    }
}

/// Like [`load_scene`], but a failed fetch is reported instead of degraded.
/// Undecodable documents still produce an empty scene.
pub async fn try_load_scene(fetcher: &dyn Fetcher, location: &str) -> Result<Scene, FetchError> {
    let bytes = fetcher.fetch(location).await?;
    Ok(match SceneFormat::from_location(location) {
        SceneFormat::Json => Scene::from_json_slice(&bytes),
        SceneFormat::Xml => parse_off_thread(String::from_utf8_lossy(&bytes).into_owned()).await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryFetcher;

    #[test]
    fn format_follows_extension() {
        assert_eq!(SceneFormat::from_location("/data/activity1.json"), SceneFormat::Json);
        assert_eq!(SceneFormat::from_location("/data/a.JSON?x=1"), SceneFormat::Json);
        assert_eq!(SceneFormat::from_location("/data/diagram.xml"), SceneFormat::Xml);
        assert_eq!(SceneFormat::from_location("/data/diagram"), SceneFormat::Xml);
    }

    #[tokio::test]
    async fn loads_both_formats() {
        let fetcher = MemoryFetcher::new()
            .with("/a.json", r#"[{"type":"rect","id":"j"}]"#)
            .with(
                "/a.xml",
                r#"<R><DesignerItem ID="x"><Content><Rectangle/></Content></DesignerItem></R>"#,
            );
        assert_eq!(load_scene(&fetcher, "/a.json").await.shapes()[0].id.as_str(), "j");
        assert_eq!(load_scene(&fetcher, "/a.xml").await.shapes()[0].id.as_str(), "x");
    }

    #[tokio::test]
    async fn missing_scene_degrades_or_errors() {
        let fetcher = MemoryFetcher::new();
        assert!(load_scene(&fetcher, "/nope.json").await.is_empty());
        assert!(try_load_scene(&fetcher, "/nope.json").await.is_err());
    }
}
