pub mod codec;
pub mod fetch;
pub mod id;
pub mod model;
pub mod parser;
pub mod source;
pub mod worker;
pub mod xml;

pub use codec::shape_from_value;
pub use fetch::{FetchError, Fetcher, FsFetcher, MemoryFetcher};
pub use id::ShapeId;
pub use model::*;
pub use parser::{parse_float, parse_points, parse_scene_xml};
pub use source::{SceneFormat, load_scene, try_load_scene};
pub use worker::{parse_off_thread, spawn_parse};
