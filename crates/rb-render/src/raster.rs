//! Resource loading and decoding for `image` and `ecad` shapes.
//!
//! Bytes come from the injected fetcher; decoding runs on the blocking pool
//! so large bitmaps do not stall the interaction thread. Every backend gets
//! premultiplied RGBA8 pixels; vector artwork additionally keeps its markup
//! so DOM-style backends can embed it as elements.

use rb_core::model::{Shape, ShapeKind};
use rb_core::{FetchError, Fetcher};
use resvg::{tiny_skia, usvg};
use std::sync::Arc;

/// Largest raster edge produced from vector artwork.
const MAX_DIM: u32 = 16_384;

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to decode image {location}: {source}")]
    Image {
        location: String,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to parse vector artwork {location}: {source}")]
    Svg {
        location: String,
        #[source]
        source: usvg::Error,
    },

    #[error("{location}: invalid raster size {width}x{height}")]
    InvalidSize {
        location: String,
        width: f32,
        height: f32,
    },

    #[error("{0} is not a loadable resource")]
    NotAResource(String),

    #[error("decoding task failed: {0}")]
    Task(String),
}

/// Premultiplied RGBA8 pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Arc<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub enum Resource {
    Bitmap(RasterImage),
    Vector { markup: String, raster: RasterImage },
}

impl Resource {
    pub fn raster(&self) -> &RasterImage {
        match self {
            Resource::Bitmap(raster) | Resource::Vector { raster, .. } => raster,
        }
    }
}

/// Fetch and decode the resource behind an `image` or `ecad` shape.
pub async fn load_resource(fetcher: &dyn Fetcher, shape: &Shape) -> Result<Resource, ResourceError> {
    let (url, w, h, vector) = match &shape.kind {
        ShapeKind::Image { url, w, h } => (url.clone(), *w, *h, false),
        ShapeKind::Ecad { url, w, h } => (url.clone(), *w, *h, true),
        _ => return Err(ResourceError::NotAResource(shape.id.to_string())),
    };

    let bytes = fetcher.fetch(&url).await?;
    tokio::task::spawn_blocking(move || -> Result<Resource, ResourceError> {
        if vector {
            let raster = rasterize_svg(&url, &bytes, (w, h))?;
            let markup = String::from_utf8_lossy(&bytes).into_owned();
            Ok(Resource::Vector { markup, raster })
        } else {
            decode_image(&url, &bytes).map(Resource::Bitmap)
        }
    })
    .await
    .map_err(|e| ResourceError::Task(e.to_string()))?
}

/// Decode encoded image bytes and convert to premultiplied RGBA8.
pub fn decode_image(location: &str, bytes: &[u8]) -> Result<RasterImage, ResourceError> {
    let decoded = image::load_from_memory(bytes).map_err(|source| ResourceError::Image {
        location: location.to_string(),
        source,
    })?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(RasterImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

/// Rasterize SVG artwork at `size` (falling back to its intrinsic size for
/// non-positive dimensions).
pub fn rasterize_svg(
    location: &str,
    bytes: &[u8],
    size: (f32, f32),
) -> Result<RasterImage, ResourceError> {
    let opts = usvg::Options::default();
    let tree = usvg::Tree::from_data(bytes, &opts).map_err(|source| ResourceError::Svg {
        location: location.to_string(),
        source,
    })?;

    let intrinsic = tree.size();
    let width = if size.0 > 0.0 { size.0 } else { intrinsic.width() };
    let height = if size.1 > 0.0 { size.1 } else { intrinsic.height() };
    let invalid = || ResourceError::InvalidSize {
        location: location.to_string(),
        width,
        height,
    };
    if !width.is_finite() || !height.is_finite() || width <= 0.0 || height <= 0.0 {
        return Err(invalid());
    }
    let (px_w, px_h) = (width.ceil() as u32, height.ceil() as u32);
    if px_w > MAX_DIM || px_h > MAX_DIM {
        return Err(invalid());
    }

    let mut pixmap = tiny_skia::Pixmap::new(px_w, px_h).ok_or_else(invalid)?;
    let sx = px_w as f32 / intrinsic.width();
    let sy = px_h as f32 / intrinsic.height();
    resvg::render(&tree, tiny_skia::Transform::from_scale(sx, sy), &mut pixmap.as_mut());

    Ok(RasterImage {
        width: px_w,
        height: px_h,
        rgba8_premul: Arc::new(pixmap.take()),
    })
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}
