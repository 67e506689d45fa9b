use crate::metrics::Metrics;

/// Shown for fields that have no value yet.
pub const UNSET: &str = "—";

/// Stats panel text, one field per line.
pub fn render(metrics: &Metrics) -> String {
    let fps_drag = metrics
        .fps_drag
        .map_or_else(|| UNSET.to_string(), |fps| fps.to_string());
    let lines = [
        format!("Build {} ms", number(metrics.build_time, 0)),
        format!("Settle {} ms", number(metrics.settle_time, 0)),
        format!("Idle FPS {}", metrics.fps_idle),
        format!("Drag FPS {fps_drag}"),
        format!("Heap {} MB", number(metrics.heap, 1)),
        format!("Mutation {} ms", number(metrics.last_mutation, 1)),
        format!("Activity {} ms", number(metrics.last_activity, 1)),
        format!("Frames {}", metrics.frames),
    ];
    lines.join("\n")
}

fn number(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| UNSET.to_string(), |v| format!("{v:.decimals$}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{BUILD_FAILED, FpsReading};
    use pretty_assertions::assert_eq;

    #[test]
    fn fresh_record_shows_dashes() {
        let text = render(&Metrics::default());
        assert_eq!(
            text,
            "Build — ms\nSettle — ms\nIdle FPS N/A\nDrag FPS —\nHeap — MB\nMutation — ms\nActivity — ms\nFrames 0"
        );
    }

    #[test]
    fn values_are_rounded() {
        let metrics = Metrics {
            build_time: Some(123.6),
            fps_drag: Some(FpsReading::Rate(59.94)),
            heap: Some(51.26),
            frames: 240,
            ..Metrics::default()
        };
        let text = render(&metrics);
        assert!(text.starts_with("Build 124 ms\n"));
        assert!(text.contains("Drag FPS 59.9\n"));
        assert!(text.contains("Heap 51.3 MB\n"));
        assert!(text.ends_with("Frames 240"));
    }

    #[test]
    fn failed_build_shows_sentinel() {
        let metrics = Metrics {
            build_time: Some(BUILD_FAILED),
            ..Metrics::default()
        };
        assert!(render(&metrics).starts_with("Build -1 ms"));
    }
}
