//! Fonts and glyph layout for text drawables.
//!
//! Text is laid out left to right from a single face, glyph by glyph, with
//! the top of the line at the shape origin (the same anchor the SVG backend
//! gets from `dominant-baseline="hanging"`). There is no shaping, kerning or
//! per-family fallback: `fontFamily` only matters to the SVG backend.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use fontdue::{Font, FontSettings};
use rb_core::Rgb;
use walkdir::WalkDir;

/// Directories searched for a system face.
pub const FONT_DIRS: &[&str] = &[
    "/usr/share/fonts",
    "/usr/local/share/fonts",
    "/System/Library/Fonts",
    "/Library/Fonts",
    "C:\\Windows\\Fonts",
];

/// Faces preferred during discovery, best first.
const PREFERRED: &[&str] = &[
    "DejaVuSans.ttf",
    "LiberationSans-Regular.ttf",
    "NotoSans-Regular.ttf",
    "Arial.ttf",
    "arial.ttf",
    "Helvetica.ttf",
];

static SYSTEM: LazyLock<Option<Arc<FontBook>>> = LazyLock::new(|| {
    let book = FontBook::discover(FONT_DIRS.iter().map(Path::new));
    match &book {
        Some(book) => log::debug!("text face: {}", book.source()),
        None => log::warn!("no system font found, text drawables will not paint"),
    }
    book.map(Arc::new)
});

#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("failed to read font {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid font {source_name}: {reason}")]
    Parse {
        source_name: String,
        reason: &'static str,
    },
}

/// One loaded face plus its raw bytes (the vello backend encodes glyph
/// runs against the bytes).
pub struct FontBook {
    font: Font,
    data: Arc<Vec<u8>>,
    source: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedGlyph {
    pub ch: char,
    pub id: u16,
    /// Pen position relative to the line start.
    pub x: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub glyphs: Vec<PlacedGlyph>,
    pub width: f32,
    /// Distance from the line top to the baseline.
    pub ascent: f32,
    pub height: f32,
}

/// 8-bit coverage mask for a laid-out line.
#[derive(Debug, Clone, PartialEq)]
pub struct Coverage {
    pub width: u32,
    pub height: u32,
    pub alpha: Vec<u8>,
}

impl Coverage {
    /// Premultiplied RGBA8 pixels in `color` at `opacity`.
    pub fn tint(&self, color: Rgb, opacity: f32) -> Vec<u8> {
        let opacity = opacity.clamp(0.0, 1.0);
        let mut out = Vec::with_capacity(self.alpha.len() * 4);
        for &coverage in &self.alpha {
            let a = (coverage as f32 * opacity).round() as u16;
            let premul = |c: u8| ((c as u16 * a + 127) / 255) as u8;
            out.extend_from_slice(&[premul(color.r()), premul(color.g()), premul(color.b()), a as u8]);
        }
        out
    }

    pub fn is_blank(&self) -> bool {
        self.alpha.iter().all(|&a| a == 0)
    }
}

impl FontBook {
    pub fn from_bytes(bytes: Vec<u8>, source: &str) -> Result<Self, FontError> {
        let data = Arc::new(bytes);
        let font = Font::from_bytes(data.as_slice(), FontSettings::default()).map_err(|reason| {
            FontError::Parse {
                source_name: source.to_string(),
                reason,
            }
        })?;
        Ok(Self {
            font,
            data,
            source: source.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, FontError> {
        let bytes = std::fs::read(path).map_err(|source| FontError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(bytes, &path.display().to_string())
    }

    /// First loadable face under `dirs`, preferring well-known sans faces.
    pub fn discover<'a>(dirs: impl IntoIterator<Item = &'a Path>) -> Option<Self> {
        let mut candidates: Vec<PathBuf> = dirs
            .into_iter()
            .filter(|dir| dir.is_dir())
            .flat_map(|dir| WalkDir::new(dir).max_depth(4).into_iter().filter_map(Result::ok))
            .map(walkdir::DirEntry::into_path)
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("otf"))
            })
            .collect();
        candidates.sort_by_key(|path| {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let rank = PREFERRED.iter().position(|p| *p == name).unwrap_or(PREFERRED.len());
            (rank, path.clone())
        });

        candidates.iter().find_map(|path| match Self::load(path) {
            Ok(book) => Some(book),
            Err(e) => {
                log::debug!("skipping font: {e}");
                None
            }
        })
    }

    /// The discovered system face, loaded once per process.
    pub fn system() -> Option<Arc<FontBook>> {
        SYSTEM.clone()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn data(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.data)
    }

    pub fn layout(&self, text: &str, size: f32) -> TextLayout {
        let (ascent, descent) = self
            .font
            .horizontal_line_metrics(size)
            .map_or((size * 0.8, -size * 0.2), |m| (m.ascent, m.descent));
        let mut pen = 0.0;
        let mut glyphs = Vec::with_capacity(text.len());
        for ch in text.chars().filter(|c| !c.is_control()) {
            glyphs.push(PlacedGlyph {
                ch,
                id: self.font.lookup_glyph_index(ch),
                x: pen,
            });
            pen += self.font.metrics(ch, size).advance_width;
        }
        TextLayout {
            glyphs,
            width: pen,
            ascent,
            height: ascent - descent,
        }
    }

    /// Coverage for one line of `text`; `None` when it has no extent.
    pub fn rasterize(&self, text: &str, size: f32) -> Option<Coverage> {
        let layout = self.layout(text, size);
        let width = layout.width.ceil() as u32;
        let height = layout.height.ceil() as u32;
        if width == 0 || height == 0 {
            return None;
        }

        let mut alpha = vec![0u8; width as usize * height as usize];
        for glyph in &layout.glyphs {
            let (m, bitmap) = self.font.rasterize(glyph.ch, size);
            let left = (glyph.x + m.xmin as f32).round() as i32;
            let top = (layout.ascent - m.ymin as f32 - m.height as f32).round() as i32;
            for row in 0..m.height {
                let ty = top + row as i32;
                if ty < 0 || ty >= height as i32 {
                    continue;
                }
                for col in 0..m.width {
                    let tx = left + col as i32;
                    if tx < 0 || tx >= width as i32 {
                        continue;
                    }
                    let i = ty as usize * width as usize + tx as usize;
                    alpha[i] = alpha[i].max(bitmap[row * m.width + col]);
                }
            }
        }
        Some(Coverage {
            width,
            height,
            alpha,
        })
    }
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook").field("source", &self.source).finish_non_exhaustive()
    }
}
