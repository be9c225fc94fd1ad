use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::CardstockError;
use crate::render::RenderedCard;
use crate::types::{Pt, Size};

// Writes the one-page PDF atomically: bytes go to a uniquely named temp
// file in the destination's directory, renamed into place as the last step.
// On any failure the temp file is removed and the destination is untouched.
pub fn package_card(
    card: &RenderedCard,
    page: Size,
    destination: &Path,
) -> Result<(), CardstockError> {
    let bytes = pdf_bytes(card, page);
    let dir = destination.parent().filter(|p| !p.as_os_str().is_empty());
    let dir = dir.unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|err| {
        CardstockError::Packaging(format!("temp file in {}: {err}", dir.display()))
    })?;
    tmp.write_all(&bytes)
        .and_then(|_| tmp.flush())
        .map_err(|err| CardstockError::Packaging(format!("temp write: {err}")))?;
    tmp.persist(destination).map_err(|err| {
        CardstockError::Packaging(format!("rename into {}: {}", destination.display(), err.error))
    })?;
    Ok(())
}

pub fn pdf_bytes(card: &RenderedCard, page: Size) -> Vec<u8> {
    let width = fmt_pt(page.width);
    let height = fmt_pt(page.height);

    let catalog = "<< /Type /Catalog /Pages 2 0 R >>".to_string();
    let pages = "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string();
    let page_obj = format!(
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {width} {height}] \
         /Resources << /XObject << /Im1 5 0 R >> >> /Contents 4 0 R >>"
    );
    let contents = stream_object(&format!("q\n{width} 0 0 {height} 0 0 cm\n/Im1 Do\nQ"));
    let image = card_image_object(card);
    let info = "<< /Producer (cardstock) >>".to_string();

    build_pdf(vec![catalog, pages, page_obj, contents, image, info], 1, Some(6))
}

fn build_pdf(objects: Vec<String>, catalog_id: usize, info_id: Option<usize>) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

    let mut offsets = Vec::new();
    for (index, obj) in objects.iter().enumerate() {
        offsets.push(out.len());
        let obj_id = index + 1;
        out.extend_from_slice(format!("{} 0 obj\n", obj_id).as_bytes());
        out.extend_from_slice(obj.as_bytes());
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }

    let mut trailer = format!(
        "trailer\n<< /Size {} /Root {} 0 R",
        objects.len() + 1,
        catalog_id
    );
    if let Some(info_id) = info_id {
        trailer.push_str(&format!(" /Info {} 0 R", info_id));
    }
    trailer.push_str(&format!(" >>\nstartxref\n{}\n%%EOF", xref_start));
    out.extend_from_slice(trailer.as_bytes());

    out
}

// The card canvas is opaque by construction, so pixels only need
// demultiplying, never an SMask.
fn card_image_object(card: &RenderedCard) -> String {
    let pixmap = card.pixmap();
    let mut rgb = Vec::with_capacity((pixmap.width() * pixmap.height() * 3) as usize);
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        rgb.push(color.red());
        rgb.push(color.green());
        rgb.push(color.blue());
    }
    let stream_data = encode_stream_data(&flate_compress(&rgb));
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceRGB \
         /BitsPerComponent 8 /Length {} /Filter [/ASCIIHexDecode /FlateDecode] >>\nstream\n{}\nendstream",
        pixmap.width(),
        pixmap.height(),
        stream_data.as_bytes().len(),
        stream_data
    )
}

fn stream_object(content: &str) -> String {
    let length = content.as_bytes().len();
    format!("<< /Length {} >>\nstream\n{}\nendstream", length, content)
}

fn encode_stream_data(data: &[u8]) -> String {
    let mut hex = ascii_hex_encode(data);
    hex.push('>');
    hex
}

fn ascii_hex_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for (index, byte) in data.iter().enumerate() {
        let _ = write!(&mut out, "{:02X}", byte);
        if index % 32 == 31 {
            out.push('\n');
        }
    }
    out
}

fn flate_compress(data: &[u8]) -> Vec<u8> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}

fn fmt_pt(value: Pt) -> String {
    let milli = value.to_milli_i64();
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        format!("{}{}", sign, int_part)
    } else {
        let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banner::BannerImage;
    use crate::config::CardConfig;
    use crate::font::FontResolver;
    use crate::layout::layout_card;
    use crate::record::MemberRecord;
    use image::RgbaImage;

    fn sample_card() -> RenderedCard {
        let config = CardConfig::default();
        let resolver = FontResolver::new(Vec::new(), None);
        let mut img = RgbaImage::new(30, 10);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgba([50, 90, 140, 255]);
        }
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let banner = BannerImage::from_bytes(&bytes, None).unwrap();
        let record = MemberRecord::new("A1", "Ann", "Family", 2, 1);
        let layout = layout_card(&record, &config, banner.aspect(), &resolver);
        let qr = crate::qr::encode("A1", layout.zones.qr.width, config.qr_quiet_modules).unwrap();
        crate::render::render(&layout, &qr, &banner, &config, &resolver).unwrap()
    }

    #[test]
    fn bytes_carry_header_xref_and_eof() {
        let bytes = pdf_bytes(&sample_card(), Size::card_portrait());
        assert!(bytes.starts_with(b"%PDF-1.4\n"));
        assert!(bytes.ends_with(b"%%EOF"));
        let text = String::from_utf8_lossy(&bytes);
        let tail = &text[text.rfind("startxref\n").unwrap() + "startxref\n".len()..];
        let startxref: usize = tail.lines().next().unwrap().trim().parse().unwrap();
        assert_eq!(&bytes[startxref..startxref + 4], b"xref");
        assert!(text.contains("/Im1 Do"));
    }

    #[test]
    fn document_parses_with_one_page_and_card_media_box() {
        let bytes = pdf_bytes(&sample_card(), Size::card_portrait());
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let (_, page_id) = pages.into_iter().next().unwrap();
        let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        let values: Vec<i64> = media_box.iter().map(|v| v.as_i64().unwrap()).collect();
        assert_eq!(values, vec![0, 0, 180, 288]);
    }

    #[test]
    fn packaging_is_atomic_and_leaves_no_temp_files() {
        let dir = std::env::temp_dir().join("cardstock-pdf-atomic");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let dest = dir.join("ann.pdf");
        package_card(&sample_card(), Size::card_portrait(), &dest).unwrap();
        assert!(dest.is_file());
        let entries: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("ann.pdf")]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_destination_directory_is_a_packaging_error() {
        let dest = std::env::temp_dir()
            .join("cardstock-pdf-none")
            .join("nested")
            .join("ann.pdf");
        let err = package_card(&sample_card(), Size::card_portrait(), &dest).unwrap_err();
        assert!(matches!(err, CardstockError::Packaging(_)));
        assert!(!err.is_fatal());
        assert!(!dest.exists());
    }

    #[test]
    fn point_formatting_trims_trailing_zeroes() {
        assert_eq!(fmt_pt(Pt::from_f32(180.0)), "180");
        assert_eq!(fmt_pt(Pt::from_f32(100.5)), "100.5");
        assert_eq!(fmt_pt(Pt::from_f32(0.0)), "0");
        assert_eq!(fmt_pt(Pt::from_milli_i64(-1500)), "-1.5");
    }
}
