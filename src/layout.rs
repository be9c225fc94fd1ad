use std::collections::HashMap;

use crate::config::CardConfig;
use crate::font::{FontHandle, FontResolver, FontWeight};
use crate::record::MemberRecord;
use crate::types::PxRect;

const ELLIPSIS: &str = "\u{2026}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardZones {
    pub banner: PxRect,
    pub qr: PxRect,
    pub qr_backing: PxRect,
    pub text: PxRect,
}

impl CardZones {
    // Largest rect inside the banner zone that keeps the source aspect
    // ratio, centered. Residual zone space stays background-colored.
    pub fn banner_box(&self, aspect: f32) -> PxRect {
        let zone = self.banner;
        if zone.width == 0 || zone.height == 0 {
            return zone;
        }
        if !aspect.is_finite() || aspect <= 0.0 {
            return zone;
        }
        let zone_aspect = zone.width as f32 / zone.height as f32;
        let (w, h) = if aspect >= zone_aspect {
            let h = (zone.width as f32 / aspect).round().max(1.0) as u32;
            (zone.width, h.min(zone.height))
        } else {
            let w = (zone.height as f32 * aspect).round().max(1.0) as u32;
            (w.min(zone.width), zone.height)
        };
        PxRect::new(
            zone.x + (zone.width - w) / 2,
            zone.y + (zone.height - h) / 2,
            w,
            h,
        )
    }
}

pub fn compute_zones(config: &CardConfig) -> CardZones {
    let width = config.width_px();
    let height = config.height_px();

    let banner_h = ((height as f32 * config.banner_frac).round() as u32).min(height);
    let banner = PxRect::new(0, 0, width, banner_h);

    let qr_side = ((width as f32 * config.qr_frac).round() as u32)
        .clamp(1, width.max(1));
    let qr_x = (width.saturating_sub(qr_side)) / 2;
    let qr_y = (height.saturating_sub(qr_side)) / 2;
    let qr = PxRect::new(qr_x, qr_y, qr_side, qr_side);

    let pad = config.qr_pad_px();
    let backing_x = qr_x.saturating_sub(pad);
    let backing_y = qr_y.saturating_sub(pad);
    let backing_right = (qr_x + qr_side + pad).min(width);
    let backing_bottom = (qr_y + qr_side + pad).min(height);
    let qr_backing = PxRect::new(
        backing_x,
        backing_y,
        backing_right.saturating_sub(backing_x),
        backing_bottom.saturating_sub(backing_y),
    );

    let text_w = ((width as f32 * config.text_width_frac).round() as u32).clamp(1, width.max(1));
    let text_x = (width.saturating_sub(text_w)) / 2;
    let text_top = (qr_backing.bottom() + config.zone_gap_px).min(height);
    let text_bottom = height.saturating_sub(config.zone_gap_px).max(text_top);
    let text = PxRect::new(text_x, text_top, text_w, text_bottom - text_top);

    CardZones {
        banner,
        qr,
        qr_backing,
        text,
    }
}

// name_lines draw bold; detail_lines draw regular, in display order (the
// fixed year line, membership lines, household counts).
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutResult {
    pub font_px: f32,
    pub name_lines: Vec<String>,
    pub detail_lines: Vec<String>,
    pub truncated: bool,
}

impl LayoutResult {
    pub fn line_count(&self) -> usize {
        self.name_lines.len() + self.detail_lines.len()
    }

    // Lines advance by font_px + line_gap_px, except the step from the name
    // block into the detail block, which is the fixed name_gap_px.
    pub fn block_height_px(&self, config: &CardConfig) -> f32 {
        let lines = self.line_count();
        if lines == 0 {
            return 0.0;
        }
        let advance = self.font_px + config.line_gap_px;
        let mut height = lines as f32 * advance - config.line_gap_px;
        if !self.name_lines.is_empty() && !self.detail_lines.is_empty() {
            height += config.name_gap_px as f32 - advance;
        }
        height
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardLayout {
    pub zones: CardZones,
    pub banner_box: PxRect,
    pub fit: LayoutResult,
}

// Wrap at the maximum font size, step down until the stack fits the text
// zone, and at the minimum size truncate trailing lines behind an ellipsis.
// The largest fitting size wins.
pub fn layout_card(
    record: &MemberRecord,
    config: &CardConfig,
    banner_aspect: f32,
    resolver: &FontResolver,
) -> CardLayout {
    let zones = compute_zones(config);
    let banner_box = zones.banner_box(banner_aspect);
    let max_width = zones.text.width as f32;
    let zone_height = zones.text.height as f32;

    let mut size = config.font_max_px;
    let mut last = wrap_at_size(record, config, resolver, size, max_width);
    loop {
        if last.block_height_px(config) <= zone_height {
            return CardLayout {
                zones,
                banner_box,
                fit: last,
            };
        }
        if size <= config.font_min_px + f32::EPSILON {
            break;
        }
        size = (size - config.font_step_px).max(config.font_min_px);
        last = wrap_at_size(record, config, resolver, size, max_width);
    }

    let fit = truncate_to_zone(last, config, resolver, max_width, zone_height);
    CardLayout {
        zones,
        banner_box,
        fit,
    }
}

fn wrap_at_size(
    record: &MemberRecord,
    config: &CardConfig,
    resolver: &FontResolver,
    size: f32,
    max_width: f32,
) -> LayoutResult {
    let bold = resolver.resolve(FontWeight::Bold, size);
    let regular = resolver.resolve(FontWeight::Regular, size);

    let name_lines = wrap_line(&bold, record.name.trim(), max_width);
    let mut detail_lines = wrap_line(&regular, &config.year_line(), max_width);
    detail_lines.extend(wrap_line(&regular, record.membership.trim(), max_width));
    if let Some(counts) = record.counts_line() {
        detail_lines.extend(wrap_line(&regular, &counts, max_width));
    }

    LayoutResult {
        font_px: size,
        name_lines,
        detail_lines,
        truncated: false,
    }
}

// Drop lines off the tail until the stack fits, then mark the cut with an
// ellipsis on the last surviving line. Always keeps at least one line.
fn truncate_to_zone(
    mut fit: LayoutResult,
    config: &CardConfig,
    resolver: &FontResolver,
    max_width: f32,
    zone_height: f32,
) -> LayoutResult {
    while fit.line_count() > 1 && fit.block_height_px(config) > zone_height {
        if fit.detail_lines.pop().is_none() {
            fit.name_lines.pop();
        }
    }
    let (last, weight) = if let Some(line) = fit.detail_lines.last_mut() {
        (line, FontWeight::Regular)
    } else if let Some(line) = fit.name_lines.last_mut() {
        (line, FontWeight::Bold)
    } else {
        fit.truncated = true;
        return fit;
    };
    let handle = resolver.resolve(weight, fit.font_px);
    *last = ellipsize(&handle, last, max_width);
    fit.truncated = true;
    fit
}

// Greedy wrap breaking only on whitespace; a word wider than the available
// width on its own is hard-broken per character.
fn wrap_line(handle: &FontHandle, text: &str, max_width: f32) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let space_width = handle.measure(" ");
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_width = 0.0f32;

    for word in text.split_whitespace() {
        let word_width = handle.measure(word);
        if current.is_empty() {
            if word_width > max_width {
                lines.extend(split_long_word(handle, word, max_width));
            } else {
                current.push_str(word);
                current_width = word_width;
            }
        } else {
            let next_width = current_width + space_width + word_width;
            if next_width <= max_width {
                current.push(' ');
                current.push_str(word);
                current_width = next_width;
            } else {
                lines.push(std::mem::take(&mut current));
                if word_width > max_width {
                    lines.extend(split_long_word(handle, word, max_width));
                    current_width = 0.0;
                } else {
                    current.push_str(word);
                    current_width = word_width;
                }
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn split_long_word(handle: &FontHandle, word: &str, max_width: f32) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_width = 0.0f32;
    let mut ascii_widths: [Option<f32>; 128] = [None; 128];
    let mut other_widths: HashMap<char, f32> = HashMap::new();

    for ch in word.chars() {
        let w = if (ch as u32) < 128 {
            let idx = ch as usize;
            match ascii_widths[idx] {
                Some(value) => value,
                None => {
                    let value = handle.measure(&ch.to_string());
                    ascii_widths[idx] = Some(value);
                    value
                }
            }
        } else if let Some(value) = other_widths.get(&ch) {
            *value
        } else {
            let value = handle.measure(&ch.to_string());
            other_widths.insert(ch, value);
            value
        };
        let mut next_width = current_width + w;
        if !current.is_empty() && next_width > max_width {
            parts.push(std::mem::take(&mut current));
            next_width = w;
        }
        current.push(ch);
        current_width = next_width;
    }
    if !current.is_empty() {
        parts.push(current);
    }
    if parts.is_empty() {
        parts.push(String::new());
    }
    parts
}

fn ellipsize(handle: &FontHandle, text: &str, max_width: f32) -> String {
    let mut out = text.to_string();
    loop {
        let mut candidate = out.clone();
        candidate.push_str(ELLIPSIS);
        if handle.measure(&candidate) <= max_width || out.is_empty() {
            return candidate;
        }
        out.pop();
        while !out.is_empty() && out.ends_with(' ') {
            out.pop();
        }
    }
}
