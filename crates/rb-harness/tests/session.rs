//! Integration tests: session lifecycle, render loop, drag FPS, activities.

use pretty_assertions::assert_eq;
use rb_core::MemoryFetcher;
use rb_core::model::{Rgb, Scene};
use rb_harness::{
    ActivityError, BUILD_FAILED, BenchConfig, FpsReading, ManualClock, MemoryProbe, NoProbe, Session,
};
use rb_render::{BackendKind, Group, Registry};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

// ─── Helpers ─────────────────────────────────────────────────────────────

struct FixedProbe(f64);

impl MemoryProbe for FixedProbe {
    fn sample_mb(&self) -> Option<f64> {
        Some(self.0)
    }
}

fn plant() -> Scene {
    Scene::from_json_str(include_str!("fixtures/plant.json"))
}

fn fetcher() -> MemoryFetcher {
    MemoryFetcher::new()
        .with("/data/activity1.json", include_str!("fixtures/activity1.json"))
        .with("/data/activity2.json", include_str!("fixtures/activity2.json"))
}

fn config() -> BenchConfig {
    BenchConfig {
        width: 800,
        height: 600,
        frame_interval_ms: 1,
        ..BenchConfig::default()
    }
}

fn session_with(probe: Box<dyn MemoryProbe>) -> (Session, Rc<ManualClock>) {
    let clock = Rc::new(ManualClock::new());
    let session = Session::new(config(), Arc::new(fetcher()), clock.clone(), probe);
    (session, clock)
}

fn session() -> (Session, Rc<ManualClock>) {
    session_with(Box::new(NoProbe))
}

// ─── Build & teardown ────────────────────────────────────────────────────

#[tokio::test]
async fn build_time_is_recorded() {
    let (mut session, _clock) = session();
    assert!(session.start(BackendKind::Canvas, &plant()).await);
    let metrics = session.snapshot();
    assert_eq!(metrics.build_time, Some(0.0));
    assert_eq!(metrics.fps_idle, FpsReading::NotAvailable);
    assert_eq!(session.handle().drawable_count(), 5);
}

#[tokio::test]
async fn missing_adapter_records_failed_build() {
    let (session, _clock) = session();
    let mut session = session.with_registry(Registry::new());
    assert!(!session.start(BackendKind::Svg, &plant()).await);
    assert_eq!(session.snapshot().build_time, Some(BUILD_FAILED));
    assert!(session.handle().is_empty());
    assert_eq!(session.active(), None);
}

#[tokio::test]
async fn switching_backends_releases_the_container() {
    let (mut session, _clock) = session();
    for kind in [BackendKind::Canvas, BackendKind::Scene, BackendKind::Svg] {
        assert!(session.start(kind, &plant()).await);
        let container = session.container();
        assert_eq!(container.owner(), Some(kind));
        assert_eq!(container.observer_count(), 1);
        assert_eq!(container.attached_count(), 5);
    }
    session.stop();
    assert_eq!(session.container().owner(), None);
    assert_eq!(session.container().attached_count(), 0);
    assert_eq!(session.container().observer_count(), 0);
}

// ─── Render loop ─────────────────────────────────────────────────────────

#[tokio::test]
async fn loop_counts_frames_and_samples_memory() {
    let (mut session, _clock) = session_with(Box::new(FixedProbe(42.5)));
    session.tick();
    assert_eq!(session.snapshot().frames, 0, "no handle, no sample");

    session.start(BackendKind::Scene, &plant()).await;
    session.run_frames(5).await;
    let metrics = session.snapshot();
    assert_eq!(metrics.frames, 5);
    assert_eq!(metrics.heap, Some(42.5));
}

#[tokio::test]
async fn loop_runs_only_the_requested_ticks() {
    let (mut session, _clock) = session();
    session.start(BackendKind::Canvas, &plant()).await;
    session.run_frames(0).await;
    assert_eq!(session.snapshot().frames, 0);
    session.run_frames(3).await;
    assert_eq!(session.snapshot().frames, 3);

    session.stop();
    session.run_frames(10).await;
    assert_eq!(session.snapshot().frames, 3, "a torn-down backend ends the loop");
}

#[tokio::test]
async fn drag_fps_follows_manual_clock() {
    let (mut session, clock) = session();
    session.start(BackendKind::Svg, &plant()).await;

    let (x, y) = session.find_draggable().unwrap();
    assert_eq!((x, y), (70.0, 70.0));
    assert!(session.pointer_down(x, y));
    assert!(session.is_dragging());
    assert_eq!(session.snapshot().fps_drag, Some(FpsReading::InProgress));

    for step in 1..=60 {
        clock.advance(Duration::from_millis(33));
        session.pointer_move(x + step as f32, y);
        session.tick();
    }
    clock.advance(Duration::from_millis(20));
    assert!(session.pointer_up());

    let metrics = session.snapshot();
    assert!(!metrics.is_user_dragging);
    assert_eq!(metrics.fps_drag.map(|f| f.to_string()).as_deref(), Some("30.0"));
}

#[tokio::test]
async fn scripted_drag_produces_a_rate() {
    let (mut session, clock) = session();
    session.start(BackendKind::Canvas, &plant()).await;
    let from = session.find_draggable().unwrap();
    clock.advance(Duration::from_millis(1));
    assert!(session.drag(from, 10).await);
    // The manual clock did not move during the gesture.
    assert_eq!(session.snapshot().fps_drag, Some(FpsReading::NotAvailable));
    assert_eq!(session.snapshot().frames, 10);
}

#[tokio::test]
async fn teardown_mid_drag_closes_the_gesture() {
    let (mut session, _clock) = session();
    session.start(BackendKind::Scene, &plant()).await;
    let (x, y) = session.find_draggable().unwrap();
    assert!(session.pointer_down(x, y));
    session.stop();
    assert!(!session.is_dragging());
    assert!(!session.snapshot().is_user_dragging);
}

// ─── Commands ────────────────────────────────────────────────────────────

#[tokio::test]
async fn mutation_is_timed() {
    let (mut session, _clock) = session();
    assert_eq!(session.mutate(), None);
    session.start(BackendKind::Canvas, &plant()).await;
    assert_eq!(session.mutate(), Some(5));
    assert_eq!(session.snapshot().last_mutation, Some(0.0));
}

#[tokio::test]
async fn activity_sequence_resets_after_failure() {
    let (mut session, _clock) = session();
    session.start(BackendKind::Svg, &plant()).await;

    assert_eq!(session.advance_activity().await.unwrap().unwrap(), 3);
    assert_eq!(session.activity(), Some(1));
    assert_eq!(session.advance_activity().await.unwrap().unwrap(), 2);
    assert_eq!(session.activity(), Some(2));
    assert!(session.snapshot().last_activity.is_some());

    let failed = session.advance_activity().await.unwrap();
    assert!(matches!(failed, Err(ActivityError::Fetch(_))));
    assert_eq!(session.activity(), None);
    let surface = session.handle().surface().unwrap();
    assert_eq!(surface.group_len(Group::Dynamic), 0);
    assert_eq!(surface.group_len(Group::Base), 5);

    assert_eq!(session.advance_activity().await.unwrap().unwrap(), 3);
    assert_eq!(session.activity(), Some(1));
}

#[tokio::test]
async fn arrows_toggle_after_activity_load() {
    let (mut session, _clock) = session();
    session.start(BackendKind::Canvas, &plant()).await;
    session.advance_activity().await.unwrap().unwrap();

    assert_eq!(session.toggle_arrow_color(), Some(2));
    let strokes: Vec<_> = session
        .handle()
        .surface()
        .unwrap()
        .drawables(Group::Dynamic)
        .iter()
        .filter(|d| d.shape.name.as_deref() == Some("arrow"))
        .map(|d| d.shape.style.stroke)
        .collect();
    assert_eq!(strokes, [Some(Rgb::GREEN), Some(Rgb::GREEN)]);
}

#[tokio::test]
async fn backend_switch_restarts_activities() {
    let (mut session, _clock) = session();
    session.start(BackendKind::Scene, &plant()).await;
    session.advance_activity().await.unwrap().unwrap();
    session.advance_activity().await.unwrap().unwrap();

    session.start(BackendKind::Canvas, &plant()).await;
    assert_eq!(session.activity(), None);
    session.advance_activity().await.unwrap().unwrap();
    assert_eq!(session.activity(), Some(1));
}
