use tiny_skia::{
    FillRule, FilterQuality, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke, Transform,
};

use crate::banner::BannerImage;
use crate::config::CardConfig;
use crate::error::CardstockError;
use crate::font::{FontHandle, FontResolver, FontWeight};
use crate::layout::CardLayout;
use crate::qr::QrBitmap;
use crate::types::{Color, PxRect};

// Finished card raster. Always exactly the configured page size in pixels.
#[derive(Debug, Clone)]
pub struct RenderedCard {
    pixmap: Pixmap,
}

impl RenderedCard {
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn into_pixmap(self) -> Pixmap {
        self.pixmap
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, CardstockError> {
        self.pixmap
            .encode_png()
            .map_err(|err| CardstockError::Render(format!("png encode failed: {err}")))
    }
}

// Compositing order: background, banner, QR backing and symbol, the fitted
// text stack, the card border last.
pub fn render(
    layout: &CardLayout,
    qr: &QrBitmap,
    banner: &BannerImage,
    config: &CardConfig,
    resolver: &FontResolver,
) -> Result<RenderedCard, CardstockError> {
    let width = config.width_px();
    let height = config.height_px();
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| CardstockError::Render("card canvas allocation failed".to_string()))?;
    pixmap.fill(to_sk_color(config.palette.background));

    draw_banner(&mut pixmap, banner, layout.banner_box);
    draw_qr(&mut pixmap, qr, layout, config);
    draw_text_stack(&mut pixmap, layout, config, resolver);
    draw_border(&mut pixmap, config);

    Ok(RenderedCard { pixmap })
}

fn draw_banner(pixmap: &mut Pixmap, banner: &BannerImage, target: PxRect) {
    if banner.width() == 0 || banner.height() == 0 || target.width == 0 || target.height == 0 {
        return;
    }
    let sx = target.width as f32 / banner.width() as f32;
    let sy = target.height as f32 / banner.height() as f32;
    let mut paint = PixmapPaint::default();
    paint.quality = FilterQuality::Bilinear;
    let transform = Transform::from_row(sx, 0.0, 0.0, sy, target.x as f32, target.y as f32);
    pixmap.draw_pixmap(0, 0, banner.pixmap().as_ref(), &paint, transform, None);
}

fn draw_qr(pixmap: &mut Pixmap, qr: &QrBitmap, layout: &CardLayout, config: &CardConfig) {
    let backing = layout.zones.qr_backing;
    if let Some(rect) = Rect::from_xywh(
        backing.x as f32,
        backing.y as f32,
        backing.width as f32,
        backing.height as f32,
    ) {
        let mut paint = Paint::default();
        paint.set_color(to_sk_color(config.palette.qr_backing));
        paint.anti_alias = false;
        pixmap.fill_rect(rect, &paint, Transform::identity(), None);

        let frame = PathBuilder::from_rect(rect);
        let mut frame_paint = Paint::default();
        frame_paint.set_color(to_sk_color(config.palette.qr_frame));
        frame_paint.anti_alias = true;
        let stroke = Stroke {
            width: 1.0,
            ..Stroke::default()
        };
        pixmap.stroke_path(&frame, &frame_paint, &stroke, Transform::identity(), None);
    }

    // Whole-pixel blit, nearest quality: modules must stay crisp.
    let zone = layout.zones.qr;
    let qx = zone.x as i32 + (zone.width.saturating_sub(qr.side_px()) / 2) as i32;
    let qy = zone.y as i32 + (zone.height.saturating_sub(qr.side_px()) / 2) as i32;
    pixmap.draw_pixmap(
        qx,
        qy,
        qr.pixmap().as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
}

fn draw_text_stack(
    pixmap: &mut Pixmap,
    layout: &CardLayout,
    config: &CardConfig,
    resolver: &FontResolver,
) {
    let fit = &layout.fit;
    let zone = layout.zones.text;
    if zone.width == 0 || zone.height == 0 || fit.line_count() == 0 {
        return;
    }
    let advance = fit.font_px + config.line_gap_px;
    let block_h = fit.block_height_px(config);
    let mut y = zone.y as f32 + ((zone.height as f32 - block_h) / 2.0).max(0.0);

    let bold = resolver.resolve(FontWeight::Bold, fit.font_px);
    for line in &fit.name_lines {
        draw_centered_line(pixmap, &bold, line, zone, y, config.palette.text);
        y += advance;
    }
    // The step into the detail block is the fixed name gap, not the
    // regular line advance.
    if !fit.name_lines.is_empty() && !fit.detail_lines.is_empty() {
        y += config.name_gap_px as f32 - advance;
    }
    let regular = resolver.resolve(FontWeight::Regular, fit.font_px);
    for line in &fit.detail_lines {
        draw_centered_line(pixmap, &regular, line, zone, y, config.palette.text);
        y += advance;
    }
}

fn draw_centered_line(
    pixmap: &mut Pixmap,
    handle: &FontHandle,
    text: &str,
    zone: PxRect,
    top_y: f32,
    color: Color,
) {
    if text.is_empty() {
        return;
    }
    let width = handle.measure(text);
    let x = zone.x as f32 + ((zone.width as f32 - width) / 2.0).max(0.0);
    let baseline = top_y + handle.ascent_px();
    if let Some(path) = handle.line_path(text, x, baseline) {
        pixmap.fill_path(
            &path,
            &fill_paint(color),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
    }
}

fn draw_border(pixmap: &mut Pixmap, config: &CardConfig) {
    if config.border_width_px <= 0.0 {
        return;
    }
    let inset = config.border_width_px / 2.0;
    let x1 = config.width_px() as f32 - inset;
    let y1 = config.height_px() as f32 - inset;
    let Some(path) = rounded_rect_path(inset, inset, x1, y1, config.corner_radius_px()) else {
        return;
    };
    let stroke = Stroke {
        width: config.border_width_px,
        ..Stroke::default()
    };
    pixmap.stroke_path(
        &path,
        &fill_paint(config.palette.border),
        &stroke,
        Transform::identity(),
        None,
    );
}

// Corner arcs approximated by cubics. A radius that cannot fit collapses to
// a plain rectangle.
fn rounded_rect_path(x0: f32, y0: f32, x1: f32, y1: f32, radius: f32) -> Option<tiny_skia::Path> {
    if !(x1 > x0 && y1 > y0) {
        return None;
    }
    let r = radius.clamp(0.0, ((x1 - x0) / 2.0).min((y1 - y0) / 2.0));
    let mut pb = PathBuilder::new();
    if r <= 0.5 {
        pb.push_rect(Rect::from_ltrb(x0, y0, x1, y1)?);
        return pb.finish();
    }
    const K: f32 = 0.552_284_75;
    let c = r * K;
    pb.move_to(x0 + r, y0);
    pb.line_to(x1 - r, y0);
    pb.cubic_to(x1 - r + c, y0, x1, y0 + r - c, x1, y0 + r);
    pb.line_to(x1, y1 - r);
    pb.cubic_to(x1, y1 - r + c, x1 - r + c, y1, x1 - r, y1);
    pb.line_to(x0 + r, y1);
    pb.cubic_to(x0 + r - c, y1, x0, y1 - r + c, x0, y1 - r);
    pb.line_to(x0, y0 + r);
    pb.cubic_to(x0, y0 + r - c, x0 + r - c, y0, x0 + r, y0);
    pb.close();
    pb.finish()
}

fn fill_paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(to_sk_color(color));
    paint.anti_alias = true;
    paint
}

fn to_sk_color(color: Color) -> tiny_skia::Color {
    let r = color.r.clamp(0.0, 1.0);
    let g = color.g.clamp(0.0, 1.0);
    let b = color.b.clamp(0.0, 1.0);
    tiny_skia::Color::from_rgba(r, g, b, 1.0)
        .unwrap_or_else(|| tiny_skia::Color::from_rgba8(0, 0, 0, 255))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::layout_card;
    use crate::record::MemberRecord;
    use image::RgbaImage;

    fn resolver() -> FontResolver {
        FontResolver::new(Vec::new(), None)
    }

    fn banner(width: u32, height: u32, rgba: [u8; 4]) -> BannerImage {
        let mut img = RgbaImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgba(rgba);
        }
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        BannerImage::from_bytes(&bytes, None).unwrap()
    }

    fn render_card(record: &MemberRecord, config: &CardConfig) -> RenderedCard {
        let resolver = resolver();
        let art = banner(40, 20, [220, 30, 30, 255]);
        let layout = layout_card(record, config, art.aspect(), &resolver);
        let qr = crate::qr::encode(&record.identifier, layout.zones.qr.width, config.qr_quiet_modules)
            .unwrap();
        render(&layout, &qr, &art, config, &resolver).unwrap()
    }

    fn rgb_at(card: &RenderedCard, x: u32, y: u32) -> (u8, u8, u8) {
        let data = card.pixmap().data();
        let at = ((y * card.width() + x) * 4) as usize;
        (data[at], data[at + 1], data[at + 2])
    }

    #[test]
    fn output_dimensions_are_exact_regardless_of_content() {
        let config = CardConfig::default();
        let short = render_card(&MemberRecord::new("A1", "Ann", "Family", 2, 1), &config);
        assert_eq!((short.width(), short.height()), (750, 1200));
        let long_name = "Maximiliana Wolfeschlegelsteinhausen ".repeat(8);
        let long = render_card(
            &MemberRecord::new("A2", long_name.trim(), "Family Plus", 2, 4),
            &config,
        );
        assert_eq!((long.width(), long.height()), (750, 1200));
    }

    #[test]
    fn background_fills_unused_areas() {
        let config = CardConfig::default();
        let card = render_card(&MemberRecord::new("A1", "Ann", "Family", 2, 1), &config);
        // Left of the QR backing, inside the card body.
        assert_eq!(rgb_at(&card, 60, 500), (229, 226, 209));
    }

    #[test]
    fn banner_is_letterboxed_with_background_bands() {
        let config = CardConfig::default();
        let card = render_card(&MemberRecord::new("A1", "Ann", "Family", 2, 1), &config);
        // Aspect 2.0 into a 750x400 zone: box is 750x375 at y=12.
        let (r, g, _b) = rgb_at(&card, 375, 200);
        assert!(r > 180 && g < 80, "banner area should be red-ish");
        assert_eq!(rgb_at(&card, 375, 4), (229, 226, 209));
        assert_eq!(rgb_at(&card, 375, 394), (229, 226, 209));
    }

    #[test]
    fn qr_backing_is_white_and_symbol_has_ink() {
        let config = CardConfig::default();
        let card = render_card(&MemberRecord::new("A1", "Ann", "Family", 2, 1), &config);
        // Inside the backing pad, left of the symbol.
        assert_eq!(rgb_at(&card, 210, 600), (255, 255, 255));
        let mut dark = 0usize;
        for y in 450..750 {
            for x in 225..525 {
                if rgb_at(&card, x, y).0 < 40 {
                    dark += 1;
                }
            }
        }
        assert!(dark > 500, "expected QR ink, found {dark} dark pixels");
    }

    #[test]
    fn text_zone_carries_ink() {
        let config = CardConfig::default();
        let card = render_card(&MemberRecord::new("A1", "Ann", "Family", 2, 1), &config);
        let zone = crate::layout::compute_zones(&config).text;
        let mut dark = 0usize;
        for y in zone.y..zone.bottom() {
            for x in zone.x..zone.x + zone.width {
                if rgb_at(&card, x, y).0 < 40 {
                    dark += 1;
                }
            }
        }
        assert!(dark > 100, "expected text ink, found {dark} dark pixels");
    }

    #[test]
    fn border_is_stroked_only_when_enabled() {
        let config = CardConfig::default();
        let card = render_card(&MemberRecord::new("A1", "Ann", "Family", 2, 1), &config);
        let (r, _g, _b) = rgb_at(&card, 375, 1);
        assert!(r < 100, "expected border ink at the top edge");

        let mut borderless = CardConfig::default();
        borderless.border_width_px = 0.0;
        let card = render_card(&MemberRecord::new("A1", "Ann", "Family", 2, 1), &borderless);
        assert_eq!(rgb_at(&card, 375, 1), (229, 226, 209));
    }

    #[test]
    fn png_encoding_round_trips_dimensions() {
        let config = CardConfig::default();
        let card = render_card(&MemberRecord::new("A1", "Ann", "Family", 2, 1), &config);
        let png = card.encode_png().unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), 750);
        assert_eq!(decoded.height(), 1200);
    }

    #[test]
    fn qr_embedded_in_the_card_round_trips() {
        let config = CardConfig::default();
        let card = render_card(
            &MemberRecord::new("CTBA-000123", "Ann", "Family", 2, 1),
            &config,
        );
        let data = card.pixmap().data();
        let width = card.width();
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            width as usize,
            card.height() as usize,
            |x, y| {
                let at = ((y as u32 * width + x as u32) * 4) as usize;
                let r = data[at] as u16;
                let g = data[at + 1] as u16;
                let b = data[at + 2] as u16;
                ((r + g + b) / 3) as u8
            },
        );
        let grids = prepared.detect_grids();
        assert_eq!(grids.len(), 1, "expected exactly one QR symbol on the card");
        let (_meta, content) = grids[0].decode().unwrap();
        assert_eq!(content, "CTBA-000123");
    }
}
