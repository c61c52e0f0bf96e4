//! Develops a RAW file into a 16-bit TIFF.
//!
//! ```text
//! cargo run --example develop_raw -- input.arw output.tiff [--half] [--document]
//! ```

use anyhow::{Context, bail};
use rawstage_rs::image_pipeline::{ProcessingOptions, RawProcessor, TiffCompression, TiffOptions};
use rawstage_rs::logger;

use tracing::info;

fn main() -> anyhow::Result<()> {
    logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let paths: Vec<&String> = args.iter().filter(|a| !a.starts_with("--")).collect();
    let [input, output] = paths.as_slice() else {
        bail!("usage: develop_raw <input> <output.tiff> [--half] [--document]");
    };
    let half = args.iter().any(|a| a == "--half");
    let document = args.iter().any(|a| a == "--document");

    let options = ProcessingOptions::builder()
        .half_size(half)
        .output_bps(16)
        .tiff(TiffOptions::builder().compression(TiffCompression::Lzw).predictor(Some(2)).build())
        .build();
    let mut processor = RawProcessor::new(options);
    processor.set_progress_callback(Box::new(|stage, current, total| {
        tracing::debug!(%stage, current, total, "progress");
        rawstage_rs::image_pipeline::ProgressAction::Continue
    }));

    processor.open_file(input).with_context(|| format!("opening {input}"))?;
    if let Some(id) = processor.identification() {
        info!(make = %id.make, model = %id.model, "Camera");
    }
    info!(decoder = processor.decoder_info()?.name, "Decoder selected");

    processor.unpack().context("unpacking raw data")?;
    if document {
        processor.process_document_mode()?;
    } else {
        processor.process_full()?;
    }

    let format = processor.mem_image_format();
    info!(width = format.width, height = format.height, colors = format.colors, "Writing TIFF");
    processor.write_tiff(output).with_context(|| format!("writing {output}"))?;
    processor.timings().log_summary();

    info!("Done");
    Ok(())
}
