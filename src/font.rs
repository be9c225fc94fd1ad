use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use tiny_skia::PathBuilder;
use ttf_parser::OutlineBuilder;

use crate::config::CardConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontWeight {
    Regular,
    Bold,
}

// A usable face at a fixed pixel size. BuiltIn is the terminal fallback: a
// flat 0.6 em advance per character, drawn as placeholder boxes.
#[derive(Debug, Clone)]
pub struct FontHandle {
    size_px: f32,
    face: FaceSource,
}

#[derive(Debug, Clone)]
enum FaceSource {
    Loaded(Arc<Vec<u8>>),
    BuiltIn,
}

impl FontHandle {
    pub fn size_px(&self) -> f32 {
        self.size_px
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.face, FaceSource::BuiltIn)
    }

    // Unmapped characters take half an em, both here and in line_path, so
    // measurement always agrees with what gets drawn.
    pub fn measure(&self, text: &str) -> f32 {
        match &self.face {
            FaceSource::Loaded(data) => {
                let Ok(face) = ttf_parser::Face::parse(data, 0) else {
                    return builtin_advance(self.size_px) * text.chars().count() as f32;
                };
                let units_per_em = face.units_per_em().max(1) as f32;
                let mut total = 0.0f32;
                for ch in text.chars() {
                    total += char_advance(&face, ch, self.size_px, units_per_em);
                }
                total
            }
            FaceSource::BuiltIn => builtin_advance(self.size_px) * text.chars().count() as f32,
        }
    }

    pub fn ascent_px(&self) -> f32 {
        match &self.face {
            FaceSource::Loaded(data) => {
                let Ok(face) = ttf_parser::Face::parse(data, 0) else {
                    return self.size_px * 0.8;
                };
                let units_per_em = face.units_per_em().max(1) as f32;
                (face.ascender() as f32 / units_per_em) * self.size_px
            }
            FaceSource::BuiltIn => self.size_px * 0.8,
        }
    }

    // One fill path for a whole line. None when nothing is drawable (e.g.
    // only spaces). Fill with a winding rule.
    pub fn line_path(&self, text: &str, baseline_x: f32, baseline_y: f32) -> Option<tiny_skia::Path> {
        match &self.face {
            FaceSource::Loaded(data) => outline_line(data, text, self.size_px, baseline_x, baseline_y),
            FaceSource::BuiltIn => placeholder_line(text, self.size_px, baseline_x, baseline_y),
        }
    }
}

fn builtin_advance(size_px: f32) -> f32 {
    (size_px * 0.6).max(1.0)
}

fn char_advance(face: &ttf_parser::Face<'_>, ch: char, size_px: f32, units_per_em: f32) -> f32 {
    let Some(gid) = face.glyph_index(ch) else {
        return size_px * 0.5;
    };
    let advance_units = face.glyph_hor_advance(gid).unwrap_or(0) as f32;
    let advance = (advance_units / units_per_em) * size_px;
    if advance <= 0.0 { size_px * 0.5 } else { advance }
}

fn outline_line(
    data: &[u8],
    text: &str,
    size_px: f32,
    baseline_x: f32,
    baseline_y: f32,
) -> Option<tiny_skia::Path> {
    let face = ttf_parser::Face::parse(data, 0).ok()?;
    let units_per_em = face.units_per_em().max(1) as f32;
    let scale = size_px / units_per_em;

    let mut builder = PathBuilder::new();
    let mut pen_x = 0.0f32;
    for ch in text.chars() {
        let Some(gid) = face.glyph_index(ch) else {
            pen_x += size_px * 0.5;
            continue;
        };
        let mut sink = GlyphSink {
            builder: &mut builder,
            origin_x: baseline_x + pen_x,
            origin_y: baseline_y,
            scale,
        };
        face.outline_glyph(gid, &mut sink);
        pen_x += char_advance(&face, ch, size_px, units_per_em);
    }
    builder.finish()
}

fn placeholder_line(
    text: &str,
    size_px: f32,
    baseline_x: f32,
    baseline_y: f32,
) -> Option<tiny_skia::Path> {
    let advance = builtin_advance(size_px);
    let mut builder = PathBuilder::new();
    let mut pen_x = baseline_x;
    for ch in text.chars() {
        if !ch.is_whitespace() {
            push_placeholder_box(&mut builder, pen_x, baseline_y, size_px, advance);
        }
        pen_x += advance;
    }
    builder.finish()
}

// Outer loop clockwise, inner loop reversed, so a winding fill leaves the
// middle of the box empty.
fn push_placeholder_box(
    builder: &mut PathBuilder,
    pen_x: f32,
    baseline_y: f32,
    size_px: f32,
    advance: f32,
) {
    let inset = advance * 0.14;
    let x0 = pen_x + inset;
    let x1 = pen_x + advance - inset;
    let y1 = baseline_y;
    let y0 = baseline_y - size_px * 0.70;
    builder.move_to(x0, y0);
    builder.line_to(x1, y0);
    builder.line_to(x1, y1);
    builder.line_to(x0, y1);
    builder.close();

    let t = (size_px * 0.08).max(0.75);
    if x1 - x0 > 2.0 * t && y1 - y0 > 2.0 * t {
        builder.move_to(x0 + t, y0 + t);
        builder.line_to(x0 + t, y1 - t);
        builder.line_to(x1 - t, y1 - t);
        builder.line_to(x1 - t, y0 + t);
        builder.close();
    }
}

// Font units are y-up; the canvas is y-down. Flip while scaling.
struct GlyphSink<'a> {
    builder: &'a mut PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl OutlineBuilder for GlyphSink<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        self.builder
            .move_to(self.origin_x + x * self.scale, self.origin_y - y * self.scale);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.builder
            .line_to(self.origin_x + x * self.scale, self.origin_y - y * self.scale);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.builder.quad_to(
            self.origin_x + x1 * self.scale,
            self.origin_y - y1 * self.scale,
            self.origin_x + x * self.scale,
            self.origin_y - y * self.scale,
        );
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.builder.cubic_to(
            self.origin_x + x1 * self.scale,
            self.origin_y - y1 * self.scale,
            self.origin_x + x2 * self.scale,
            self.origin_y - y2 * self.scale,
            self.origin_x + x * self.scale,
            self.origin_y - y * self.scale,
        );
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    weight: FontWeight,
    size_milli: i64,
}

// Resolves (weight, size) against the family chain: bundled dir, system
// font dirs, then the built-in face. Never fails. Cache entries are
// write-once and idempotent.
#[derive(Debug)]
pub struct FontResolver {
    families: Vec<String>,
    bundle_dir: Option<PathBuf>,
    cache: Mutex<HashMap<CacheKey, FontHandle>>,
}

impl FontResolver {
    pub fn new(families: Vec<String>, bundle_dir: Option<PathBuf>) -> Self {
        Self {
            families,
            bundle_dir,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &CardConfig) -> Self {
        Self::new(config.font_families.clone(), config.font_dir.clone())
    }

    pub fn resolve(&self, weight: FontWeight, size_px: f32) -> FontHandle {
        let size_px = if size_px.is_finite() && size_px > 0.0 {
            size_px
        } else {
            1.0
        };
        let key = CacheKey {
            weight,
            size_milli: (size_px as f64 * 1000.0).round() as i64,
        };
        if let Ok(cache) = self.cache.lock() {
            if let Some(handle) = cache.get(&key) {
                return handle.clone();
            }
        }
        let face = self.locate_face(weight);
        let handle = FontHandle { size_px, face };
        if let Ok(mut cache) = self.cache.lock() {
            cache.entry(key).or_insert_with(|| handle.clone());
        }
        handle
    }

    fn locate_face(&self, weight: FontWeight) -> FaceSource {
        if let Some(dir) = &self.bundle_dir {
            for family in &self.families {
                for file_name in family_file_candidates(family, weight) {
                    let path = dir.join(&file_name);
                    let Ok(bytes) = fs::read(&path) else {
                        continue;
                    };
                    if ttf_parser::Face::parse(&bytes, 0).is_ok() {
                        return FaceSource::Loaded(Arc::new(bytes));
                    }
                }
            }
        }
        for family in &self.families {
            if let Some(bytes) = resolve_system_face(family, weight) {
                return FaceSource::Loaded(bytes);
            }
        }
        FaceSource::BuiltIn
    }
}

static SYSTEM_FACE_CACHE: OnceLock<Mutex<HashMap<String, Option<Arc<Vec<u8>>>>>> = OnceLock::new();

fn resolve_system_face(family: &str, weight: FontWeight) -> Option<Arc<Vec<u8>>> {
    let key = format!("{}#{:?}", normalize_family(family), weight);
    if key.starts_with('#') {
        return None;
    }
    let cache = SYSTEM_FACE_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    if let Ok(cache_guard) = cache.lock() {
        if let Some(entry) = cache_guard.get(&key) {
            return entry.clone();
        }
    }
    let loaded = load_face_from_dirs(family, weight);
    if let Ok(mut cache_guard) = cache.lock() {
        cache_guard.insert(key, loaded.clone());
    }
    loaded
}

fn load_face_from_dirs(family: &str, weight: FontWeight) -> Option<Arc<Vec<u8>>> {
    let candidates = family_file_candidates(family, weight);
    for dir in system_font_dirs() {
        for file_name in &candidates {
            let path = dir.join(file_name);
            let Ok(bytes) = fs::read(&path) else {
                continue;
            };
            if ttf_parser::Face::parse(&bytes, 0).is_ok() {
                return Some(Arc::new(bytes));
            }
        }
    }
    None
}

fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    #[cfg(target_os = "windows")]
    {
        dirs.push(PathBuf::from(r"C:\Windows\Fonts"));
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/share/fonts/truetype"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join(".fonts"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    if let Ok(extra) = std::env::var("CARDSTOCK_FONT_DIR") {
        for path in std::env::split_paths(&extra) {
            if !path.as_os_str().is_empty() {
                dirs.push(path);
            }
        }
    }

    dirs
}

// Known distribution file names first, then synthesized Family-Style.ttf
// shapes; the opposite weight trails as a closest-available substitute.
fn family_file_candidates(family: &str, weight: FontWeight) -> Vec<String> {
    let (known_regular, known_bold): (&[&str], &[&str]) = match normalize_family(family).as_str() {
        "arial" => (&["arial.ttf", "Arial.ttf"], &["arialbd.ttf", "Arial Bold.ttf"]),
        "helvetica" => (&["Helvetica.ttf"], &["Helvetica-Bold.ttf"]),
        "liberation sans" => (
            &["LiberationSans-Regular.ttf"],
            &["LiberationSans-Bold.ttf"],
        ),
        "dejavu sans" => (&["DejaVuSans.ttf"], &["DejaVuSans-Bold.ttf"]),
        "noto sans" => (&["NotoSans-Regular.ttf"], &["NotoSans-Bold.ttf"]),
        "league spartan" => (
            &["LeagueSpartan-Regular.ttf", "LeagueSpartan-Regular.otf"],
            &["LeagueSpartan-Bold.ttf", "LeagueSpartan-Bold.otf"],
        ),
        _ => (&[], &[]),
    };

    let stem = family.replace(' ', "");
    let synth_regular = vec![
        format!("{stem}-Regular.ttf"),
        format!("{stem}Regular.ttf"),
        format!("{stem}.ttf"),
    ];
    let synth_bold = vec![
        format!("{stem}-Bold.ttf"),
        format!("{stem}Bold.ttf"),
        format!("{stem}.ttf"),
    ];

    let mut out: Vec<String> = Vec::new();
    let ordered: [Vec<String>; 2] = match weight {
        FontWeight::Regular => [
            known_regular
                .iter()
                .map(|s| s.to_string())
                .chain(synth_regular)
                .collect(),
            known_bold
                .iter()
                .map(|s| s.to_string())
                .chain(synth_bold)
                .collect(),
        ],
        FontWeight::Bold => [
            known_bold
                .iter()
                .map(|s| s.to_string())
                .chain(synth_bold)
                .collect(),
            known_regular
                .iter()
                .map(|s| s.to_string())
                .chain(synth_regular)
                .collect(),
        ],
    };
    for group in ordered {
        for candidate in group {
            if candidate.is_empty() {
                continue;
            }
            if !out.iter().any(|existing| existing.eq_ignore_ascii_case(&candidate)) {
                out.push(candidate);
            }
        }
    }
    out
}

fn normalize_family(family: &str) -> String {
    family.trim().trim_matches('"').trim_matches('\'').to_ascii_lowercase()
}
