//! The session metrics record.
//!
//! One record lives for the whole session. Renderer build completion, drag
//! lifecycle events, commands and the render-loop tick each overwrite their
//! own fields in place; a display surface polls it through [`SharedMetrics`].

use serde::{Serialize, Serializer};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

/// `buildTime` value recorded when the renderer contract fails.
pub const BUILD_FAILED: f64 = -1.0;

pub type SharedMetrics = Rc<RefCell<Metrics>>;

/// A frame-rate field: unknown, measuring, or a rate with one decimal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FpsReading {
    /// A gesture is being measured.
    InProgress,
    NotAvailable,
    Rate(f64),
}

impl FpsReading {
    /// Rate over `frames` ticks in `elapsed`, or `NotAvailable` when either
    /// is zero.
    pub fn from_frames(frames: u64, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        if secs > 0.0 && frames > 0 {
            FpsReading::Rate((frames as f64 / secs * 10.0).round() / 10.0)
        } else {
            FpsReading::NotAvailable
        }
    }
}

impl fmt::Display for FpsReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FpsReading::InProgress => f.write_str("-"),
            FpsReading::NotAvailable => f.write_str("N/A"),
            FpsReading::Rate(rate) => write!(f, "{rate:.1}"),
        }
    }
}

impl Serialize for FpsReading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    /// Dispatch to handle availability, ms; `BUILD_FAILED` on contract failure.
    pub build_time: Option<f64>,
    /// Dispatch until every async resource landed, ms.
    pub settle_time: Option<f64>,
    /// Reserved; never measured.
    pub fps_idle: FpsReading,
    pub fps_drag: Option<FpsReading>,
    /// Memory sample, MiB.
    pub heap: Option<f64>,
    pub is_user_dragging: bool,
    pub last_mutation: Option<f64>,
    pub last_activity: Option<f64>,
    pub frames: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            build_time: None,
            settle_time: None,
            fps_idle: FpsReading::NotAvailable,
            fps_drag: None,
            heap: None,
            is_user_dragging: false,
            last_mutation: None,
            last_activity: None,
            frames: 0,
        }
    }
}

impl Metrics {
    pub fn shared() -> SharedMetrics {
        Rc::new(RefCell::new(Metrics::default()))
    }

    /// Clear the per-backend fields before a new build. `heap` keeps its
    /// last sample.
    pub fn reset_for_build(&mut self) {
        self.build_time = None;
        self.settle_time = None;
        self.fps_drag = None;
        self.is_user_dragging = false;
        self.last_mutation = None;
        self.last_activity = None;
        self.frames = 0;
    }
}
