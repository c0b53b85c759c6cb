//! PNG encoding for composited tile buffers.
//!
//! Tiles carry the basemap blended with a continuous-alpha overlay, so the
//! colour count routinely exceeds an indexed palette; everything is written
//! as RGBA (colour type 6), zlib-compressed at the fast level since tiles
//! are encoded on the request path.

use std::io::Write;

use crate::RenderError;

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Encode an RGBA buffer (4 bytes per pixel, row-major) as a PNG.
pub fn encode_rgba(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, RenderError> {
    if pixels.len() != (width as usize) * (height as usize) * 4 {
        return Err(RenderError::BufferShape {
            expected: (width as usize) * (height as usize) * 4,
            actual: pixels.len(),
        });
    }

    let mut png = Vec::with_capacity(pixels.len() / 4);
    png.extend_from_slice(&PNG_SIGNATURE);

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.push(8); // bit depth
    ihdr.push(6); // colour type: RGBA
    ihdr.push(0); // compression method
    ihdr.push(0); // filter method
    ihdr.push(0); // interlace method
    write_chunk(&mut png, b"IHDR", &ihdr);

    write_chunk(&mut png, b"IDAT", &deflate_scanlines(pixels, width as usize)?);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Prefix each scanline with the "no filter" byte and zlib-compress.
fn deflate_scanlines(pixels: &[u8], width: usize) -> Result<Vec<u8>, RenderError> {
    let stride = width * 4;
    let mut raw = Vec::with_capacity(pixels.len() + pixels.len() / stride);
    for row in pixels.chunks_exact(stride) {
        raw.push(0); // filter type: none
        raw.extend_from_slice(row);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(&raw)?;
    Ok(encoder.finish()?)
}

fn write_chunk(png: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(kind);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(kind);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_and_ihdr_fields_are_correct() {
        let pixels = vec![0u8; 2 * 3 * 4];
        let png = encode_rgba(&pixels, 2, 3).unwrap();

        assert_eq!(&png[0..8], &PNG_SIGNATURE);
        // IHDR: length, type, then width/height
        assert_eq!(&png[12..16], b"IHDR");
        assert_eq!(u32::from_be_bytes(png[16..20].try_into().unwrap()), 2);
        assert_eq!(u32::from_be_bytes(png[20..24].try_into().unwrap()), 3);
        assert_eq!(png[25], 6, "colour type should be RGBA");
        assert_eq!(&png[png.len() - 8..png.len() - 4], b"IEND");
    }

    #[test]
    fn chunk_crc_covers_type_and_data() {
        let mut out = Vec::new();
        write_chunk(&mut out, b"IEND", &[]);
        let crc = u32::from_be_bytes(out[8..12].try_into().unwrap());
        assert_eq!(crc, crc32fast::hash(b"IEND"));
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        let err = encode_rgba(&[0u8; 7], 2, 2).unwrap_err();
        assert!(matches!(err, RenderError::BufferShape { .. }));
    }
}
