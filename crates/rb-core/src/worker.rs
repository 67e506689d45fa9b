//! Background scene parsing.
//!
//! Parsing a large designer document takes long enough to stall the
//! interaction loop, so it runs on a dedicated thread. Each request gets
//! exactly one reply: the parsed scene, or an empty one when parsing could
//! not run.

use crate::model::Scene;
use crate::parser::parse_scene_xml;
use std::thread;
use tokio::sync::oneshot;

/// Submit one document for parsing; the receiver resolves with the scene.
pub fn spawn_parse(xml: String) -> oneshot::Receiver<Scene> {
    let (tx, rx) = oneshot::channel();
    let spawned = thread::Builder::new()
        .name("scene-parser".into())
        .spawn(move || {
            // The requester may have given up; nothing to deliver then.
            let _ = tx.send(parse_scene_xml(&xml));
        });
    if let Err(e) = spawned {
        // The closure (and its sender) is dropped, so the receiver sees a
        // closed channel and the caller falls back to an empty scene.
        log::error!("failed to start scene parser thread: {e}");
    }
    rx
}

/// Parse `xml` off the calling thread and wait for the result.
pub async fn parse_off_thread(xml: String) -> Scene {
    match spawn_parse(xml).await {
        Ok(scene) => scene,
        Err(_) => {
            log::error!("scene parser exited without a reply, using empty scene");
            Scene::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parses_on_worker_thread() {
        let xml = r##"<Root>
            <DesignerItem ID="w1" Left="1" Top="2" Width="3" Height="4">
                <Content><Rectangle Fill="#FF0000FF"/></Content>
            </DesignerItem>
        </Root>"##;
        let scene = parse_off_thread(xml.to_string()).await;
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.shapes()[0].id.as_str(), "w1");
    }

    #[tokio::test]
    async fn malformed_input_replies_with_empty_scene() {
        let scene = parse_off_thread("<Root>".to_string()).await;
        assert!(scene.is_empty());
    }

    #[tokio::test]
    async fn concurrent_requests_each_get_their_reply() {
        let doc = |id: &str| {
            format!(
                r#"<R><DesignerItem ID="{id}"><Content><Rectangle/></Content></DesignerItem></R>"#
            )
        };
        let a = spawn_parse(doc("first"));
        let b = spawn_parse(doc("second"));
        assert_eq!(b.await.unwrap().shapes()[0].id.as_str(), "second");
        assert_eq!(a.await.unwrap().shapes()[0].id.as_str(), "first");
    }
}
