//! Locating and decoding embedded page images.
//!
//! The page's image index space is defined by scanning its operator list in
//! document order and collecting every image-painting operation, inline or
//! referenced. An out-of-range ordinal and an undecodable buffer are both
//! non-events: the caller treats them as "nothing to show".

use anyhow::Result;
use image::RgbaImage;
use log::debug;

use super::{DocumentProvider, DrawOp, RawImage};

/// Find the `index`-th image painted on `page` and decode it.
pub fn locate_and_decode(
    provider: &dyn DocumentProvider,
    page: u32,
    index: i64,
) -> Result<Option<RgbaImage>> {
    let ops = provider.operator_list(page)?;

    let mut images: Vec<RawImageSource> = Vec::new();
    for op in ops {
        match op {
            DrawOp::PaintImage { object } => images.push(RawImageSource::Referenced(object)),
            DrawOp::PaintInlineImage { image } => images.push(RawImageSource::Inline(image)),
            DrawOp::Other => {}
        }
    }

    if index < 0 || index as usize >= images.len() {
        debug!(
            "image index {index} out of range on page {page} ({} images)",
            images.len()
        );
        return Ok(None);
    }

    let raw = match images.into_iter().nth(index as usize) {
        Some(RawImageSource::Inline(image)) => image,
        Some(RawImageSource::Referenced(object)) => provider.image_object(page, &object)?,
        None => return Ok(None),
    };

    Ok(decode_image(raw))
}

enum RawImageSource {
    Referenced(String),
    Inline(RawImage),
}

/// Decode an image object into a dense RGBA bitmap.
pub fn decode_image(raw: RawImage) -> Option<RgbaImage> {
    match raw {
        RawImage::Bitmap(bitmap) => Some(bitmap),
        RawImage::Raw {
            width,
            height,
            data,
        } => decode_raw_pixels(width, height, &data),
    }
}

/// Expand a raw sample buffer into row-major RGBA by exact byte-length
/// match: `4wh` copies all channels, `3wh` forces alpha to 255, `wh`
/// replicates the gray sample into RGB with alpha 255. Any other length is
/// a decode failure; a partial or garbled image is never surfaced.
pub fn decode_raw_pixels(width: u32, height: u32, data: &[u8]) -> Option<RgbaImage> {
    if width == 0 || height == 0 {
        return None;
    }
    let size = (width as usize) * (height as usize);

    let components = if data.len() == size * 4 {
        4
    } else if data.len() == size * 3 {
        3
    } else if data.len() == size {
        1
    } else {
        return None;
    };

    let mut rgba = Vec::with_capacity(size * 4);
    match components {
        1 => {
            for &gray in data {
                rgba.extend_from_slice(&[gray, gray, gray, 255]);
            }
        }
        3 => {
            for px in data.chunks_exact(3) {
                rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
            }
        }
        _ => rgba.extend_from_slice(data),
    }

    RgbaImage::from_raw(width, height, rgba)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use image::Rgba;

    struct FakeDoc {
        ops: Vec<DrawOp>,
    }

    impl DocumentProvider for FakeDoc {
        fn page_count(&self) -> u32 {
            1
        }

        fn page_width(&self, _page: u32) -> f32 {
            612.0
        }

        fn operator_list(&self, _page: u32) -> Result<Vec<DrawOp>> {
            Ok(self.ops.clone())
        }

        fn image_object(&self, _page: u32, object: &str) -> Result<RawImage> {
            match object {
                "im0" => Ok(RawImage::Raw {
                    width: 1,
                    height: 1,
                    data: vec![7],
                }),
                other => Err(anyhow!("unknown object {other}")),
            }
        }
    }

    #[test]
    fn rgb_expands_with_opaque_alpha() {
        // 2x1 RGB buffer, len 6 == 3*2
        let bitmap = decode_raw_pixels(2, 1, &[10, 20, 30, 40, 50, 60]).unwrap();
        assert_eq!(bitmap.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
        assert_eq!(bitmap.get_pixel(1, 0), &Rgba([40, 50, 60, 255]));
    }

    #[test]
    fn grayscale_replicates_into_rgb() {
        let bitmap = decode_raw_pixels(2, 2, &[0, 85, 170, 255]).unwrap();
        assert_eq!(bitmap.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(bitmap.get_pixel(1, 0), &Rgba([85, 85, 85, 255]));
        assert_eq!(bitmap.get_pixel(0, 1), &Rgba([170, 170, 170, 255]));
        assert_eq!(bitmap.get_pixel(1, 1), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn rgba_copies_verbatim() {
        let bitmap = decode_raw_pixels(1, 1, &[1, 2, 3, 4]).unwrap();
        assert_eq!(bitmap.get_pixel(0, 0), &Rgba([1, 2, 3, 4]));
    }

    #[test]
    fn mismatched_lengths_fail_cleanly() {
        assert!(decode_raw_pixels(2, 2, &[1, 2, 3]).is_none());
        assert!(decode_raw_pixels(2, 2, &[0; 5]).is_none());
        assert!(decode_raw_pixels(2, 2, &[0; 13]).is_none());
        assert!(decode_raw_pixels(0, 4, &[]).is_none());
    }

    #[test]
    fn bitmap_fast_path_passes_through() {
        let source = RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 9]));
        let decoded = decode_image(RawImage::Bitmap(source.clone())).unwrap();
        assert_eq!(decoded, source);
    }

    #[test]
    fn index_space_counts_only_image_ops() {
        let doc = FakeDoc {
            ops: vec![
                DrawOp::Other,
                DrawOp::PaintImage {
                    object: "im0".into(),
                },
                DrawOp::Other,
                DrawOp::PaintInlineImage {
                    image: RawImage::Raw {
                        width: 1,
                        height: 1,
                        data: vec![1, 2, 3],
                    },
                },
            ],
        };

        // Index 0 is the referenced object, index 1 the inline image
        let first = locate_and_decode(&doc, 1, 0).unwrap().unwrap();
        assert_eq!(first.get_pixel(0, 0), &Rgba([7, 7, 7, 255]));

        let second = locate_and_decode(&doc, 1, 1).unwrap().unwrap();
        assert_eq!(second.get_pixel(0, 0), &Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn out_of_range_ordinals_are_silent() {
        let doc = FakeDoc {
            ops: vec![DrawOp::PaintImage {
                object: "im0".into(),
            }],
        };
        assert!(locate_and_decode(&doc, 1, 99).unwrap().is_none());
        assert!(locate_and_decode(&doc, 1, -1).unwrap().is_none());
    }
}
