use std::io::{Cursor, Seek, Write};

use tiff::encoder::colortype::{ColorType, Gray16, Gray8, RGB16, RGB8};
use tiff::encoder::compression::DeflateLevel;
use tiff::encoder::{Compression, TiffEncoder, TiffValue};
use tiff::tags::Predictor;
use tracing::debug;

use crate::image_pipeline::common::error::Fault;
use crate::image_pipeline::output::{ProcessedImage, Samples};
use crate::image_pipeline::tiff::types::{TiffCompression, TiffOptions};
use crate::image_pipeline::tiff::writer::TiffWriter;

pub struct StandardTiffWriter;

fn encode_error(e: tiff::TiffError) -> Fault {
    Fault::IoCorrupt(format!("TIFF encoding failed: {e}"))
}

fn write_samples<C, W>(encoder: &mut TiffEncoder<W>, image: &ProcessedImage, data: &[C::Inner]) -> Result<(), Fault>
where
    C: ColorType,
    [C::Inner]: TiffValue,
    W: Write + Seek,
{
    encoder
        .write_image::<C>(image.width as u32, image.height as u32, data)
        .map_err(encode_error)
}

impl TiffWriter for StandardTiffWriter {
    fn write_tiff(&self, image: &ProcessedImage, output: &mut dyn Write, options: &TiffOptions) -> Result<(), Fault> {
        debug!(
            width = image.width,
            height = image.height,
            colors = image.colors,
            bits = image.bits(),
            "Encoding TIFF image"
        );

        let mut buffer = Vec::new();

        let compression = match options.compression {
            TiffCompression::None => Compression::Uncompressed,
            TiffCompression::Lzw => Compression::Lzw,
            TiffCompression::DeflateFast => Compression::Deflate(DeflateLevel::Fast),
            TiffCompression::DeflateBalanced => Compression::Deflate(DeflateLevel::Balanced),
            TiffCompression::DeflateBest => Compression::Deflate(DeflateLevel::Best),
        };

        let mut encoder = TiffEncoder::new(Cursor::new(&mut buffer))
            .map_err(encode_error)?
            .with_compression(compression);

        if let Some(predictor_val) = options.predictor {
            let predictor = match predictor_val {
                2 => Predictor::Horizontal,
                _ => Predictor::None,
            };
            encoder = encoder.with_predictor(predictor);
        }

        match (&image.samples, image.colors) {
            (Samples::Eight(data), 1) => write_samples::<Gray8, _>(&mut encoder, image, data)?,
            (Samples::Eight(data), 3) => write_samples::<RGB8, _>(&mut encoder, image, data)?,
            (Samples::Sixteen(data), 1) => write_samples::<Gray16, _>(&mut encoder, image, data)?,
            (Samples::Sixteen(data), 3) => write_samples::<RGB16, _>(&mut encoder, image, data)?,
            (_, colors) => {
                return Err(Fault::IoCorrupt(format!("cannot encode {colors} color channels")));
            }
        }

        output.write_all(&buffer)?;

        debug!(bytes = buffer.len(), "TIFF encoding complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_pipeline::tiff::types::TiffOptions;

    fn rgb16(width: usize, height: usize) -> ProcessedImage {
        let data = (0..width * height * 3).map(|v| (v * 100) as u16).collect();
        ProcessedImage { width, height, colors: 3, samples: Samples::Sixteen(data) }
    }

    fn decode(bytes: Vec<u8>) -> (u32, u32, tiff::ColorType) {
        let mut decoder = tiff::decoder::Decoder::new(Cursor::new(bytes)).unwrap();
        let (w, h) = decoder.dimensions().unwrap();
        (w, h, decoder.colortype().unwrap())
    }

    #[test]
    fn test_writes_rgb16() {
        let mut out = Vec::new();
        StandardTiffWriter.write_tiff(&rgb16(5, 3), &mut out, &TiffOptions::default()).unwrap();
        assert_eq!(decode(out), (5, 3, tiff::ColorType::RGB(16)));
    }

    #[test]
    fn test_writes_compressed_gray8() {
        let image = ProcessedImage { width: 4, height: 2, colors: 1, samples: Samples::Eight(vec![7; 8]) };
        let options = TiffOptions::builder()
            .compression(TiffCompression::DeflateBest)
            .predictor(Some(2))
            .build();
        let mut out = Vec::new();
        StandardTiffWriter.write_tiff(&image, &mut out, &options).unwrap();
        assert_eq!(decode(out), (4, 2, tiff::ColorType::Gray(8)));
    }

    #[test]
    fn test_rejects_unknown_channel_count() {
        let image = ProcessedImage { width: 1, height: 1, colors: 2, samples: Samples::Eight(vec![0; 2]) };
        let err = StandardTiffWriter
            .write_tiff(&image, &mut Vec::new(), &TiffOptions::default())
            .unwrap_err();
        assert!(matches!(err, Fault::IoCorrupt(_)));
    }
}
