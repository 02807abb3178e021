//! Placeholder images returned instead of a file
//!
//! A fixed 150×45 JPEG with a short message. "Access denied" and
//! "Not found" look the same apart from the text.

use std::io::Cursor;
use std::sync::Arc;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use super::error::AssetError;

pub const PLACEHOLDER_WIDTH: u32 = 150;
pub const PLACEHOLDER_HEIGHT: u32 = 45;
pub const PLACEHOLDER_CONTENT_TYPE: &str = "image/jpeg";

const GLYPH_SIZE: u32 = 8;
const MARGIN: u32 = 5;
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const BORDER: Rgb<u8> = Rgb([190, 190, 190]);
const INK: Rgb<u8> = Rgb([40, 40, 40]);

/// Which message a placeholder carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderKind {
    AccessDenied,
    NotFound,
}

impl PlaceholderKind {
    pub fn message(&self) -> &'static str {
        match self {
            PlaceholderKind::AccessDenied => "Access denied",
            PlaceholderKind::NotFound => "Not found",
        }
    }

    /// Status for the plain-text fallback when rendering fails
    fn fallback_status(&self) -> StatusCode {
        match self {
            PlaceholderKind::AccessDenied => StatusCode::FORBIDDEN,
            PlaceholderKind::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

/// Render a message onto a fresh placeholder canvas and encode it as JPEG
pub fn render_placeholder(message: &str) -> Result<Vec<u8>, AssetError> {
    let mut canvas = RgbImage::from_pixel(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT, BACKGROUND);
    draw_border(&mut canvas);
    draw_text(&mut canvas, message);

    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(canvas)
        .write_to(&mut buffer, ImageFormat::Jpeg)
        .map_err(|e| AssetError::Render {
            reason: format!("Failed to encode placeholder: {}", e),
        })?;

    Ok(buffer.into_inner())
}

fn draw_border(canvas: &mut RgbImage) {
    let (w, h) = canvas.dimensions();
    for x in 0..w {
        canvas.put_pixel(x, 0, BORDER);
        canvas.put_pixel(x, h - 1, BORDER);
    }
    for y in 0..h {
        canvas.put_pixel(0, y, BORDER);
        canvas.put_pixel(w - 1, y, BORDER);
    }
}

/// Draw the message centred, scaled up as far as it fits inside the margins
fn draw_text(canvas: &mut RgbImage, message: &str) {
    let (w, h) = canvas.dimensions();
    let usable_w = w - 2 * MARGIN;
    let usable_h = h - 2 * MARGIN;

    // clip messages too long for one line
    let max_chars = (usable_w / GLYPH_SIZE) as usize;
    let glyphs: Vec<[u8; 8]> = message
        .chars()
        .take(max_chars)
        .map(|c| BASIC_FONTS.get(c).unwrap_or([0; 8]))
        .collect();
    if glyphs.is_empty() {
        return;
    }

    let text_w = glyphs.len() as u32 * GLYPH_SIZE;
    let scale = (usable_w / text_w).min(usable_h / GLYPH_SIZE).max(1);
    let origin_x = (w - text_w * scale) / 2;
    let origin_y = (h - GLYPH_SIZE * scale) / 2;

    for (i, glyph) in glyphs.iter().enumerate() {
        let glyph_x = origin_x + i as u32 * GLYPH_SIZE * scale;
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_SIZE {
                if bits & (1 << col) == 0 {
                    continue;
                }
                let px = glyph_x + col * scale;
                let py = origin_y + row as u32 * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        canvas.put_pixel(px + dx, py + dy, INK);
                    }
                }
            }
        }
    }
}

/// Rendered placeholders, one per kind
#[derive(Clone, Default)]
pub struct PlaceholderCache {
    images: Arc<DashMap<PlaceholderKind, Arc<Vec<u8>>>>,
}

impl PlaceholderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached image for a kind, rendering it on first use
    pub async fn get_or_render(&self, kind: PlaceholderKind) -> Result<Arc<Vec<u8>>, AssetError> {
        if let Some(cached) = self.images.get(&kind) {
            return Ok(Arc::clone(cached.value()));
        }

        let data = tokio::task::spawn_blocking(move || render_placeholder(kind.message()))
            .await
            .map_err(|e| AssetError::Render {
                reason: format!("Task join error: {}", e),
            })??;

        let data = Arc::new(data);
        self.images.insert(kind, Arc::clone(&data));
        Ok(data)
    }

    /// Number of rendered placeholders
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Build the HTTP response for a placeholder.
    ///
    /// Falls back to a plain-text status response if rendering fails.
    pub async fn response(&self, kind: PlaceholderKind) -> Response {
        match self.get_or_render(kind).await {
            Ok(data) => (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, PLACEHOLDER_CONTENT_TYPE),
                    (header::CACHE_CONTROL, "no-store"),
                ],
                data.as_ref().clone(),
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Placeholder '{}' unavailable: {}", kind.message(), e);
                (
                    kind.fallback_status(),
                    [
                        (header::CONTENT_TYPE, "text/plain"),
                        (header::CACHE_CONTROL, "no-store"),
                    ],
                    kind.message(),
                )
                    .into_response()
            }
        }
    }
}
