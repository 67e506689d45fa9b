pub mod canvas;
pub mod container;
pub mod contract;
pub mod drawable;
pub mod hit;
pub mod media;
pub mod palette;
pub mod raster;
pub mod registry;
pub mod scene;
pub mod stage;
pub mod svg;
pub mod text;

pub use canvas::{CanvasBackend, CanvasRenderer};
pub use container::{Container, ContainerBusy, ContainerLease, Size};
pub use contract::{
    BackendKind, BuildPhase, DragHooks, DrawableInfo, Group, Handle, MediaInfo, MediaPhase,
    Readiness, RedrawMode, RenderContext, Renderer, Surface,
};
pub use drawable::{Drawable, Placement, Role};
pub use raster::{RasterImage, Resource, ResourceError};
pub use registry::Registry;
pub use scene::{SceneBackend, SceneRenderer};
pub use stage::{NativeBackend, Stage};
pub use svg::{SvgBackend, SvgRenderer};
pub use text::{FontBook, FontError};
