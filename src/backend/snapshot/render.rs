//! Log-to-raster rendering
//!
//! Folds an ordered event log into a transparent PNG plus the world-space
//! origin it must be blitted at. The contract downstream renderers rely on:
//! drawing the image at `(offset_x, offset_y)` and then replaying events
//! with `seq` greater than the snapshot's reproduces a full replay.
//!
//! The pass structure mirrors replay semantics exactly: everything at or
//! before the last `clear` is dead, strokes named by any surviving `delete`
//! are skipped, and the rest is drawn in log order.

use std::collections::HashSet;
use std::sync::OnceLock;

use ab_glyph::{Font, ScaleFont};
use thiserror::Error;
use tiny_skia::{
    LineCap, LineJoin, Paint, PathBuilder, Pixmap, PremultipliedColorU8, Rect, Stroke, Transform,
};

use crate::shared::event::{DrawEvent, EventBody, Point, ShapeKind, ShapePayload, StrokePayload,
    TextPayload};

/// Fixed world-space padding added around the content bounding box.
const PADDING: f64 = 100.0;
/// Upper bound on either raster dimension.
const MAX_DIMENSION: u32 = 16384;
/// Approximate glyph advance as a fraction of the font size.
const TEXT_CHAR_WIDTH: f64 = 0.6;
/// Line height as a fraction of the font size.
const TEXT_LINE_HEIGHT: f64 = 1.3;

/// A rendered snapshot: PNG bytes plus the world-space origin.
#[derive(Debug, Clone)]
pub struct SnapshotImage {
    pub png: Vec<u8>,
    pub offset_x: f64,
    pub offset_y: f64,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to allocate a {width}x{height} raster")]
    Allocation { width: u32, height: u32 },
    #[error("png encoding failed: {0}")]
    Encode(String),
}

/// Render a board's event log into a snapshot image.
pub fn render_snapshot(events: &[DrawEvent]) -> Result<SnapshotImage, RenderError> {
    let (pixmap, offset_x, offset_y) = render_to_pixmap(events)?;
    let png = pixmap
        .encode_png()
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    Ok(SnapshotImage {
        png,
        offset_x,
        offset_y,
    })
}

/// The raster half of [`render_snapshot`], split out so tests can assert on
/// pixels without decoding PNG.
pub(crate) fn render_to_pixmap(events: &[DrawEvent]) -> Result<(Pixmap, f64, f64), RenderError> {
    let survivors = surviving_suffix(events);
    let deleted = deleted_stroke_ids(survivors);

    let Some(bounds) = content_bounds(survivors, &deleted) else {
        // Nothing renderable: a 1x1 transparent image at the world origin.
        let pixmap = Pixmap::new(1, 1).ok_or(RenderError::Allocation {
            width: 1,
            height: 1,
        })?;
        return Ok((pixmap, 0.0, 0.0));
    };

    let width = ((bounds.max_x - bounds.min_x + 2.0 * PADDING).ceil() as u32)
        .clamp(1, MAX_DIMENSION);
    let height = ((bounds.max_y - bounds.min_y + 2.0 * PADDING).ceil() as u32)
        .clamp(1, MAX_DIMENSION);

    let mut pixmap = Pixmap::new(width, height)
        .ok_or(RenderError::Allocation { width, height })?;

    // World → raster translation.
    let tx = (-bounds.min_x + PADDING) as f32;
    let ty = (-bounds.min_y + PADDING) as f32;
    let transform = Transform::from_translate(tx, ty);

    for event in survivors {
        match &event.body {
            EventBody::Stroke(stroke) => {
                if !deleted.contains(stroke.stroke_id.as_str()) {
                    draw_stroke(&mut pixmap, transform, stroke);
                }
            }
            EventBody::Shape(shape) => {
                if !deleted.contains(shape.stroke_id.as_str()) {
                    draw_shape(&mut pixmap, transform, shape);
                }
            }
            EventBody::Text(text) => {
                if !deleted.contains(text.stroke_id.as_str()) {
                    draw_text(&mut pixmap, (tx, ty), text);
                }
            }
            EventBody::Delete(_) | EventBody::Clear => {}
        }
    }

    Ok((pixmap, bounds.min_x - PADDING, bounds.min_y - PADDING))
}

/// Events after the last `clear`; everything at or before it is discarded.
fn surviving_suffix(events: &[DrawEvent]) -> &[DrawEvent] {
    match events
        .iter()
        .rposition(|e| matches!(e.body, EventBody::Clear))
    {
        Some(idx) => &events[idx + 1..],
        None => events,
    }
}

/// Stroke ids referenced by any `delete` in the surviving suffix. Unknown
/// ids land in the set too and simply never match, which makes deletes of
/// unknown strokes a no-op.
fn deleted_stroke_ids(survivors: &[DrawEvent]) -> HashSet<&str> {
    let mut deleted = HashSet::new();
    for event in survivors {
        if let EventBody::Delete(d) = &event.body {
            deleted.extend(d.stroke_ids.iter().map(String::as_str));
        }
    }
    deleted
}

struct Bounds {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Bounds {
    fn include(&mut self, x: f64, y: f64, pad: f64) {
        self.min_x = self.min_x.min(x - pad);
        self.min_y = self.min_y.min(y - pad);
        self.max_x = self.max_x.max(x + pad);
        self.max_y = self.max_y.max(y + pad);
    }
}

/// Axis-aligned bounding box of everything that will actually be drawn, with
/// stroke/shape width used as padding and the approximate text metrics of
/// the renderer. `None` when nothing renderable survives.
fn content_bounds(survivors: &[DrawEvent], deleted: &HashSet<&str>) -> Option<Bounds> {
    let mut bounds = Bounds {
        min_x: f64::INFINITY,
        min_y: f64::INFINITY,
        max_x: f64::NEG_INFINITY,
        max_y: f64::NEG_INFINITY,
    };
    let mut any = false;

    for event in survivors {
        match &event.body {
            EventBody::Stroke(stroke) if !deleted.contains(stroke.stroke_id.as_str()) => {
                for point in &stroke.points {
                    bounds.include(point.x, point.y, stroke.width);
                    any = true;
                }
            }
            EventBody::Shape(shape) if !deleted.contains(shape.stroke_id.as_str()) => {
                bounds.include(shape.start.x, shape.start.y, shape.width);
                bounds.include(shape.end.x, shape.end.y, shape.width);
                any = true;
            }
            EventBody::Text(text) if !deleted.contains(text.stroke_id.as_str()) => {
                let (w, h) = text_extent(text);
                bounds.include(text.position.x, text.position.y, 0.0);
                bounds.include(text.position.x + w, text.position.y + h, 0.0);
                any = true;
            }
            _ => {}
        }
    }

    any.then_some(bounds)
}

/// Approximate extent of a text block: `0.6·font_size` per character of the
/// longest line, `1.3·font_size` per line.
fn text_extent(text: &TextPayload) -> (f64, f64) {
    let longest = text.text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
    let lines = text.text.lines().count().max(1);
    (
        longest as f64 * TEXT_CHAR_WIDTH * text.font_size,
        lines as f64 * TEXT_LINE_HEIGHT * text.font_size,
    )
}

/// Parse `#rgb` / `#rrggbb` colors; anything unparseable renders black.
fn parse_color(color: &str, opacity: Option<f64>) -> (u8, u8, u8, u8) {
    let alpha = (opacity.unwrap_or(1.0).clamp(0.0, 1.0) * 255.0).round() as u8;
    let hex = color.trim().trim_start_matches('#');
    let (r, g, b) = match hex.len() {
        3 => {
            let parse = |i: usize| u8::from_str_radix(&hex[i..=i], 16).map(|v| v * 17);
            match (parse(0), parse(1), parse(2)) {
                (Ok(r), Ok(g), Ok(b)) => (r, g, b),
                _ => (0, 0, 0),
            }
        }
        6 => {
            let parse = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
            match (parse(0), parse(2), parse(4)) {
                (Ok(r), Ok(g), Ok(b)) => (r, g, b),
                _ => (0, 0, 0),
            }
        }
        _ => (0, 0, 0),
    };
    (r, g, b, alpha)
}

fn make_paint(color: &str, opacity: Option<f64>) -> Paint<'static> {
    let (r, g, b, a) = parse_color(color, opacity);
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;
    paint
}

fn round_stroke(width: f64) -> Stroke {
    Stroke {
        width: width.max(0.1) as f32,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    }
}

fn polyline_path(points: &[Point]) -> Option<tiny_skia::Path> {
    let mut pb = PathBuilder::new();
    let first = points.first()?;
    pb.move_to(first.x as f32, first.y as f32);
    for point in &points[1..] {
        pb.line_to(point.x as f32, point.y as f32);
    }
    pb.finish()
}

fn draw_stroke(pixmap: &mut Pixmap, transform: Transform, stroke: &StrokePayload) {
    let paint = make_paint(&stroke.color, stroke.opacity);

    if stroke.points.len() == 1 {
        // A tap: a filled dot of the stroke width.
        let p = stroke.points[0];
        let radius = (stroke.width / 2.0).max(0.5) as f32;
        if let Some(path) = PathBuilder::from_circle(p.x as f32, p.y as f32, radius) {
            pixmap.fill_path(
                &path,
                &paint,
                tiny_skia::FillRule::Winding,
                transform,
                None,
            );
        }
        return;
    }

    if let Some(path) = polyline_path(&stroke.points) {
        pixmap.stroke_path(&path, &paint, &round_stroke(stroke.width), transform, None);
    }
}

fn draw_shape(pixmap: &mut Pixmap, transform: Transform, shape: &ShapePayload) {
    let paint = make_paint(&shape.color, shape.opacity);
    let stroke = round_stroke(shape.width);

    let (x0, y0) = (shape.start.x as f32, shape.start.y as f32);
    let (x1, y1) = (shape.end.x as f32, shape.end.y as f32);

    let path = match shape.shape_type {
        ShapeKind::Line => {
            let mut pb = PathBuilder::new();
            pb.move_to(x0, y0);
            pb.line_to(x1, y1);
            pb.finish()
        }
        ShapeKind::Rectangle => {
            Rect::from_ltrb(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
                .map(PathBuilder::from_rect)
        }
        ShapeKind::Ellipse => Rect::from_ltrb(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
            .and_then(PathBuilder::from_oval),
    };

    if let Some(path) = path {
        pixmap.stroke_path(&path, &paint, &stroke, transform, None);
    }
}

/// A system sans-serif face, located once per process. Containers without
/// any installed font render no glyph coverage; text then contributes only
/// its metric extent, which keeps the offset contract intact.
fn system_font() -> Option<&'static ab_glyph::FontVec> {
    static FONT: OnceLock<Option<ab_glyph::FontVec>> = OnceLock::new();
    FONT.get_or_init(|| {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        let query = fontdb::Query {
            families: &[fontdb::Family::SansSerif],
            ..fontdb::Query::default()
        };
        let id = db.query(&query).or_else(|| db.faces().next().map(|f| f.id))?;
        let (data, index) = db.with_face_data(id, |data, index| (data.to_vec(), index))?;
        match ab_glyph::FontVec::try_from_vec_and_index(data, index) {
            Ok(font) => Some(font),
            Err(e) => {
                tracing::warn!("[Snapshot] unusable system font: {e}");
                None
            }
        }
    })
    .as_ref()
}

fn draw_text(pixmap: &mut Pixmap, translate: (f32, f32), text: &TextPayload) {
    let Some(font) = system_font() else {
        return;
    };
    let color = parse_color(&text.color, None);
    let scaled = font.as_scaled(ab_glyph::PxScale::from(text.font_size as f32));
    let line_height = (TEXT_LINE_HEIGHT * text.font_size) as f32;
    let fallback_advance = (TEXT_CHAR_WIDTH * text.font_size) as f32;

    let origin_x = text.position.x as f32 + translate.0;
    let mut baseline_y = text.position.y as f32 + translate.1 + scaled.ascent();

    for line in text.text.lines() {
        let mut pen_x = origin_x;
        for ch in line.chars() {
            let glyph_id = font.glyph_id(ch);
            let advance = if glyph_id.0 == 0 {
                fallback_advance
            } else {
                scaled.h_advance(glyph_id)
            };
            let glyph = glyph_id.with_scale_and_position(
                ab_glyph::PxScale::from(text.font_size as f32),
                ab_glyph::point(pen_x, baseline_y),
            );
            if let Some(outlined) = font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|gx, gy, coverage| {
                    let px = bounds.min.x as i32 + gx as i32;
                    let py = bounds.min.y as i32 + gy as i32;
                    blend_pixel(pixmap, px, py, color, coverage);
                });
            }
            pen_x += advance;
        }
        baseline_y += line_height;
    }
}

/// Source-over blend of one coverage sample into the premultiplied pixmap.
fn blend_pixel(pixmap: &mut Pixmap, x: i32, y: i32, rgba: (u8, u8, u8, u8), coverage: f32) {
    if x < 0 || y < 0 || x >= pixmap.width() as i32 || y >= pixmap.height() as i32 {
        return;
    }
    let coverage = coverage.clamp(0.0, 1.0);
    if coverage <= 0.0 {
        return;
    }

    let (r, g, b, a) = rgba;
    let src_a = (f32::from(a) / 255.0) * coverage;
    let src_r = f32::from(r) / 255.0 * src_a;
    let src_g = f32::from(g) / 255.0 * src_a;
    let src_b = f32::from(b) / 255.0 * src_a;

    let idx = y as usize * pixmap.width() as usize + x as usize;
    let pixels = pixmap.pixels_mut();
    let dst = pixels[idx];
    let inv = 1.0 - src_a;

    let out_a = src_a + f32::from(dst.alpha()) / 255.0 * inv;
    let out_r = src_r + f32::from(dst.red()) / 255.0 * inv;
    let out_g = src_g + f32::from(dst.green()) / 255.0 * inv;
    let out_b = src_b + f32::from(dst.blue()) / 255.0 * inv;

    let to_u8 = |v: f32| (v * 255.0).round().clamp(0.0, 255.0) as u8;
    let out_a8 = to_u8(out_a);
    if let Some(px) = PremultipliedColorU8::from_rgba(
        to_u8(out_r).min(out_a8),
        to_u8(out_g).min(out_a8),
        to_u8(out_b).min(out_a8),
        out_a8,
    ) {
        pixels[idx] = px;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::event::DeletePayload;

    fn event(seq: i64, body: EventBody) -> DrawEvent {
        DrawEvent {
            board_id: "b1".into(),
            seq,
            user_id: "u1".into(),
            timestamp: 0,
            body,
        }
    }

    fn stroke(id: &str, points: &[(f64, f64)], width: f64) -> EventBody {
        EventBody::Stroke(StrokePayload {
            stroke_id: id.into(),
            color: "#ff0000".into(),
            width,
            opacity: None,
            points: points.iter().map(|&(x, y)| Point { x, y }).collect(),
        })
    }

    #[test]
    fn empty_log_renders_one_transparent_pixel_at_origin() {
        let (pixmap, ox, oy) = render_to_pixmap(&[]).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (1, 1));
        assert_eq!((ox, oy), (0.0, 0.0));
        assert_eq!(pixmap.pixel(0, 0).unwrap().alpha(), 0);
    }

    #[test]
    fn offset_is_min_extent_minus_padding() {
        let events = [event(1, stroke("s1", &[(10.0, 30.0), (20.0, 40.0)], 4.0))];
        let (pixmap, ox, oy) = render_to_pixmap(&events).unwrap();
        // Extent is point range expanded by the stroke width on each side.
        assert_eq!(ox, 10.0 - 4.0 - 100.0);
        assert_eq!(oy, 30.0 - 4.0 - 100.0);
        // 10..20 expanded by 4 is 18 wide, plus 100 padding per side.
        assert_eq!(pixmap.width(), 218);
        assert_eq!(pixmap.height(), 218);
    }

    #[test]
    fn stroke_paints_pixels_in_raster_space() {
        let events = [event(1, stroke("s1", &[(0.0, 0.0), (10.0, 0.0)], 6.0))];
        let (pixmap, ox, oy) = render_to_pixmap(&events).unwrap();
        // World (5, 0) maps to raster (5 - ox, 0 - oy).
        let px = (5.0 - ox) as u32;
        let py = (0.0 - oy) as u32;
        let pixel = pixmap.pixel(px, py).unwrap();
        assert!(pixel.alpha() > 0, "expected ink on the stroke centerline");
        assert!(pixel.red() > 0);
        assert_eq!(pixel.green(), 0);
    }

    #[test]
    fn clear_discards_everything_at_or_before_it() {
        let events = [
            event(1, stroke("s1", &[(0.0, 0.0), (500.0, 500.0)], 2.0)),
            event(2, EventBody::Clear),
        ];
        let (pixmap, ox, oy) = render_to_pixmap(&events).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (1, 1));
        assert_eq!((ox, oy), (0.0, 0.0));
    }

    #[test]
    fn content_after_clear_survives() {
        let events = [
            event(1, stroke("old", &[(9000.0, 9000.0), (9100.0, 9100.0)], 2.0)),
            event(2, EventBody::Clear),
            event(3, stroke("new", &[(0.0, 0.0), (10.0, 10.0)], 2.0)),
        ];
        let (_, ox, oy) = render_to_pixmap(&events).unwrap();
        // Bounds come from the post-clear stroke only.
        assert_eq!(ox, 0.0 - 2.0 - 100.0);
        assert_eq!(oy, 0.0 - 2.0 - 100.0);
    }

    #[test]
    fn deleted_strokes_do_not_render_or_extend_bounds() {
        let events = [
            event(1, stroke("keep", &[(0.0, 0.0), (10.0, 10.0)], 2.0)),
            event(2, stroke("gone", &[(5000.0, 5000.0), (5100.0, 5100.0)], 2.0)),
            event(
                3,
                EventBody::Delete(DeletePayload {
                    stroke_ids: vec!["gone".into(), "never-existed".into()],
                }),
            ),
        ];
        let (pixmap, ox, _) = render_to_pixmap(&events).unwrap();
        assert_eq!(ox, -102.0);
        // 0..10 expanded by 2 is 14 wide, plus padding.
        assert_eq!(pixmap.width(), 214);
    }

    #[test]
    fn delete_of_unknown_ids_alone_renders_empty() {
        let events = [event(
            1,
            EventBody::Delete(DeletePayload {
                stroke_ids: vec!["ghost".into()],
            }),
        )];
        let (pixmap, _, _) = render_to_pixmap(&events).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (1, 1));
    }

    #[test]
    fn text_extent_uses_approximate_metrics() {
        let text = TextPayload {
            stroke_id: "t1".into(),
            text: "hello\nhi".into(),
            position: Point { x: 0.0, y: 0.0 },
            color: "#000000".into(),
            font_size: 20.0,
        };
        let (w, h) = text_extent(&text);
        assert_eq!(w, 5.0 * 0.6 * 20.0);
        assert_eq!(h, 2.0 * 1.3 * 20.0);
    }

    #[test]
    fn raster_dimensions_are_clamped() {
        let events = [event(
            1,
            stroke("huge", &[(0.0, 0.0), (100_000.0, 0.0)], 1.0),
        )];
        let (pixmap, _, _) = render_to_pixmap(&events).unwrap();
        assert_eq!(pixmap.width(), 16384);
    }

    #[test]
    fn single_point_stroke_renders_a_dot() {
        let events = [event(1, stroke("dot", &[(50.0, 50.0)], 8.0))];
        let (pixmap, ox, oy) = render_to_pixmap(&events).unwrap();
        let px = (50.0 - ox) as u32;
        let py = (50.0 - oy) as u32;
        assert!(pixmap.pixel(px, py).unwrap().alpha() > 0);
    }

    #[test]
    fn color_parsing_handles_short_hex_and_garbage() {
        assert_eq!(parse_color("#f00", None), (255, 0, 0, 255));
        assert_eq!(parse_color("#00ff00", Some(0.5)), (0, 255, 0, 128));
        assert_eq!(parse_color("cornflower", None), (0, 0, 0, 255));
    }
}
