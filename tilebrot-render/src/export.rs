//! PNG export with embedded metadata (tEXt chunks).

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use tracing::debug;

use tilebrot_core::Viewport;

use crate::buffer::RenderBuffer;

/// What produced an exported image, written as tEXt chunks.
#[derive(Debug, Clone)]
pub struct ExportMetadata {
    pub viewport: Viewport,
    pub max_iterations: u32,
    pub color_buckets: u32,
    pub epoch: u64,
}

/// Write `image` as an 8-bit RGBA PNG at `path`.
///
/// Uses the `png` crate directly so the viewport can ride along as text
/// chunks readable by exiftool and most image viewers.
pub fn export_png(image: &RenderBuffer, path: &Path, meta: &ExportMetadata) -> crate::Result<()> {
    let writer = BufWriter::new(File::create(path)?);

    let mut encoder = png::Encoder::new(writer, image.width, image.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);

    encoder.add_text_chunk("Software".to_string(), "Tilebrot".to_string())?;
    for (key, value) in metadata_pairs(image, meta) {
        encoder.add_text_chunk(key, value)?;
    }

    let mut png_writer = encoder.write_header()?;
    png_writer.write_image_data(&image.pixels)?;

    debug!(
        width = image.width,
        height = image.height,
        path = %path.display(),
        "Exported PNG"
    );
    Ok(())
}

fn metadata_pairs(image: &RenderBuffer, meta: &ExportMetadata) -> Vec<(String, String)> {
    let vp = &meta.viewport;
    vec![
        (
            "Tilebrot.Viewport".into(),
            format!("{} {} {} {}", vp.x, vp.y, vp.width, vp.height),
        ),
        (
            "Tilebrot.Resolution".into(),
            format!("{}x{}", image.width, image.height),
        ),
        ("Tilebrot.MaxIterations".into(), meta.max_iterations.to_string()),
        ("Tilebrot.ColorBuckets".into(), meta.color_buckets.to_string()),
        ("Tilebrot.Epoch".into(), meta.epoch.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn meta() -> ExportMetadata {
        ExportMetadata {
            viewport: Viewport::REFERENCE,
            max_iterations: 5000,
            color_buckets: 150,
            epoch: 3,
        }
    }

    #[test]
    fn export_creates_valid_png() {
        let dir = std::env::temp_dir().join("tilebrot_test_export");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("frame.png");
        export_png(&RenderBuffer::new(4, 4), &path, &meta()).expect("export should succeed");

        let mut file = File::open(&path).expect("file should exist");
        let mut header = [0u8; 8];
        file.read_exact(&mut header).expect("should read header");
        assert_eq!(&header, b"\x89PNG\r\n\x1a\n");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn export_embeds_text_chunks() {
        let dir = std::env::temp_dir().join("tilebrot_test_export_meta");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("meta.png");
        export_png(&RenderBuffer::new(2, 2), &path, &meta()).expect("export should succeed");

        let decoder = png::Decoder::new(File::open(&path).expect("file should exist"));
        let reader = decoder.read_info().expect("should read info");
        let texts = &reader.info().uncompressed_latin1_text;
        assert!(texts
            .iter()
            .any(|t| t.keyword == "Tilebrot.Viewport" && t.text == "-2.5 -1.125 4 2.5"));
        assert!(texts
            .iter()
            .any(|t| t.keyword == "Tilebrot.Resolution" && t.text == "2x2"));
        assert!(texts.iter().any(|t| t.keyword == "Tilebrot.Epoch" && t.text == "3"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let path = std::env::temp_dir()
            .join("tilebrot_no_such_dir")
            .join("nested")
            .join("x.png");
        let err = export_png(&RenderBuffer::new(1, 1), &path, &meta()).unwrap_err();
        assert!(matches!(err, crate::RenderError::Io(_)));
    }
}
