use base64::Engine;
use tiny_skia::Pixmap;

use crate::error::CardstockError;

// Decoded banner artwork, shared by every card in a run.
#[derive(Debug, Clone)]
pub struct BannerImage {
    pixmap: Pixmap,
}

impl BannerImage {
    // Accepts a filesystem path or an inline data: URI. Unreadable or
    // undecodable sources are fatal input errors.
    pub fn open(source: &str) -> Result<Self, CardstockError> {
        if let Some((mime, data)) = parse_data_uri(source) {
            return Self::from_bytes(&data, Some(&mime));
        }
        let bytes = std::fs::read(source)
            .map_err(|err| CardstockError::Input(format!("banner {source}: {err}")))?;
        Self::from_bytes(&bytes, None)
    }

    pub fn from_bytes(data: &[u8], mime: Option<&str>) -> Result<Self, CardstockError> {
        let pixmap = decode_to_pixmap(data, mime)
            .ok_or_else(|| CardstockError::Input("banner image cannot be decoded".to_string()))?;
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn aspect(&self) -> f32 {
        if self.pixmap.height() == 0 {
            return 1.0;
        }
        self.pixmap.width() as f32 / self.pixmap.height() as f32
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }
}

fn decode_to_pixmap(data: &[u8], mime: Option<&str>) -> Option<Pixmap> {
    let format = if let Some(mime) = mime {
        if mime.contains("png") {
            Some(image::ImageFormat::Png)
        } else if mime.contains("jpeg") || mime.contains("jpg") {
            Some(image::ImageFormat::Jpeg)
        } else {
            None
        }
    } else {
        image::guess_format(data).ok()
    };

    let decoded = if let Some(format) = format {
        image::load_from_memory_with_format(data, format).ok()?
    } else {
        image::load_from_memory(data).ok()?
    };
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut pixmap = Pixmap::new(width, height)?;
    let src = rgba.as_raw();
    let dst = pixmap.data_mut();
    for (src_px, dst_px) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
        let a = src_px[3];
        dst_px[0] = premul_u8(src_px[0], a);
        dst_px[1] = premul_u8(src_px[1], a);
        dst_px[2] = premul_u8(src_px[2], a);
        dst_px[3] = a;
    }
    Some(pixmap)
}

fn premul_u8(channel: u8, alpha: u8) -> u8 {
    let prod = (channel as u16) * (alpha as u16) + 127;
    ((prod + (prod >> 8)) >> 8) as u8
}

fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    if !uri.starts_with("data:") {
        return None;
    }
    let (header, payload) = uri.split_once(',')?;
    let mime = header
        .trim_start_matches("data:")
        .split(';')
        .next()
        .filter(|v| !v.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.contains(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .ok()?
    } else {
        payload.as_bytes().to_vec()
    };
    Some((mime, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let mut img = RgbaImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgba(rgba);
        }
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn decodes_png_bytes_and_reports_aspect() {
        let banner = BannerImage::from_bytes(&png_bytes(40, 20, [10, 20, 30, 255]), None).unwrap();
        assert_eq!((banner.width(), banner.height()), (40, 20));
        assert_eq!(banner.aspect(), 2.0);
    }

    #[test]
    fn decodes_base64_data_uris() {
        let payload =
            base64::engine::general_purpose::STANDARD.encode(png_bytes(8, 8, [1, 2, 3, 255]));
        let uri = format!("data:image/png;base64,{payload}");
        let banner = BannerImage::open(&uri).unwrap();
        assert_eq!((banner.width(), banner.height()), (8, 8));
    }

    #[test]
    fn alpha_is_premultiplied_on_decode() {
        let banner = BannerImage::from_bytes(&png_bytes(1, 1, [255, 0, 0, 128]), None).unwrap();
        let data = banner.pixmap().data();
        // 255 * 128/255 rounds to 128.
        assert_eq!(data[0], 128);
        assert_eq!(data[3], 128);
    }

    #[test]
    fn unreadable_sources_are_fatal_input_errors() {
        let missing = BannerImage::open("/no/such/banner.png").unwrap_err();
        assert!(missing.is_fatal());
        let garbage = BannerImage::from_bytes(b"not an image", None).unwrap_err();
        assert!(garbage.is_fatal());
    }
}
