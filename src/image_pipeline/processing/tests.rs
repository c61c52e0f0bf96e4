use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;

use crate::image_pipeline::banding::{BandingOptions, BandingStatus};
use crate::image_pipeline::black_level::BlackSubtraction;
use crate::image_pipeline::common::error::{ErrorCode, Fault, ProcessingError};
use crate::image_pipeline::options::ProcessingOptions;
use crate::image_pipeline::output::{ProcessedImage, Samples};
use crate::image_pipeline::processing::RawProcessor;
use crate::image_pipeline::progress::{ProgressAction, ProgressStage};
use crate::image_pipeline::raw::{
    ColorState, CropBox, DataStream, DecoderId, DiagonalLayout, FilterPattern, Identification,
    RawBuffer, RawDecoder, SensorGeometry, UnpackedDecoder,
};
use crate::image_pipeline::strategies::{ProcessingStrategies, StageContext, StandardStrategies};
use crate::image_pipeline::tiff::{StandardTiffWriter, TiffOptions, TiffWriter};

#[derive(Clone)]
struct MockDecoder {
    should_fail: bool,
    identification: Identification,
    samples: Vec<u16>,
}

impl MockDecoder {
    /// `width x height` RGGB sensor whose photosite `(row, col)` reads `value(row, col)`.
    fn bayer(width: usize, height: usize, value: impl Fn(usize, usize) -> u16) -> Self {
        let identification = Identification {
            make: "Mock".to_string(),
            model: "Sensor".to_string(),
            geometry: SensorGeometry::bayer(width, height, FilterPattern::RGGB),
            color: ColorState { maximum: 4095, ..Default::default() },
            raw_count: 1,
            decoder: Some(DecoderId::RawLoaderCfa),
            data_offset: 0,
            zero_is_bad: false,
            is_foveon: false,
        };
        let samples = (0..height).flat_map(|row| (0..width).map(move |col| (row, col))).map(|(r, c)| value(r, c)).collect();
        Self { should_fail: false, identification, samples }
    }
}

impl RawDecoder for MockDecoder {
    fn identify(&mut self, _stream: &mut dyn DataStream) -> Result<Identification, Fault> {
        Ok(self.identification.clone())
    }

    fn load_raw(
        &mut self,
        _stream: &mut dyn DataStream,
        target: &mut RawBuffer,
        _geometry: &SensorGeometry,
        _color: &mut ColorState,
    ) -> Result<(), Fault> {
        if self.should_fail {
            return Err(Fault::DecodeRaw("Mock decode error".to_string()));
        }
        let data = target
            .as_bayer_mut()
            .ok_or_else(|| Fault::DecodeRaw("expected a single-plane buffer".to_string()))?;
        data.copy_from_slice(&self.samples);
        Ok(())
    }
}

struct MockWriter {
    should_fail: bool,
    written_data: Arc<Mutex<Vec<ProcessedImage>>>,
}

impl TiffWriter for MockWriter {
    fn write_tiff(&self, image: &ProcessedImage, _output: &mut dyn Write, _options: &TiffOptions) -> Result<(), Fault> {
        if self.should_fail {
            return Err(Fault::IoCorrupt("Mock encode error".to_string()));
        }
        self.written_data.lock().unwrap().push(image.clone());
        Ok(())
    }
}

/// Delegates to the standard strategies and records which steps ran.
struct RecordingStrategies {
    calls: Arc<Mutex<Vec<&'static str>>>,
    fail_interpolate: Option<fn() -> anyhow::Error>,
}

impl RecordingStrategies {
    fn log(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }
}

impl ProcessingStrategies for RecordingStrategies {
    fn remove_zeroes(&self, ctx: &mut StageContext) -> anyhow::Result<()> {
        self.log("remove_zeroes");
        StandardStrategies.remove_zeroes(ctx)
    }

    fn scale_colors(&self, ctx: &mut StageContext) -> anyhow::Result<()> {
        self.log("scale_colors");
        StandardStrategies.scale_colors(ctx)
    }

    fn pre_interpolate(&self, ctx: &mut StageContext) -> anyhow::Result<()> {
        self.log("pre_interpolate");
        StandardStrategies.pre_interpolate(ctx)
    }

    fn interpolate(&self, ctx: &mut StageContext) -> anyhow::Result<()> {
        self.log("interpolate");
        if let Some(fail) = self.fail_interpolate {
            return Err(fail());
        }
        StandardStrategies.interpolate(ctx)
    }

    fn mix_green(&self, ctx: &mut StageContext) -> anyhow::Result<()> {
        self.log("mix_green");
        StandardStrategies.mix_green(ctx)
    }

    fn median_filter(&self, ctx: &mut StageContext) -> anyhow::Result<()> {
        self.log("median_filter");
        StandardStrategies.median_filter(ctx)
    }

    fn fuji_rotate(&self, ctx: &mut StageContext) -> anyhow::Result<()> {
        self.log("fuji_rotate");
        StandardStrategies.fuji_rotate(ctx)
    }

    fn convert_to_rgb(&self, ctx: &mut StageContext) -> anyhow::Result<()> {
        self.log("convert_to_rgb");
        StandardStrategies.convert_to_rgb(ctx)
    }

    fn stretch(&self, ctx: &mut StageContext) -> anyhow::Result<()> {
        self.log("stretch");
        StandardStrategies.stretch(ctx)
    }
}

fn kernel_failure() -> anyhow::Error {
    anyhow!("kernel exploded")
}

fn allocation_failure() -> anyhow::Error {
    Fault::Alloc("no room".to_string()).into()
}

type TestProcessor<S = StandardStrategies> = RawProcessor<MockDecoder, S, MockWriter>;

fn processor(decoder: MockDecoder, options: ProcessingOptions) -> (TestProcessor, Arc<Mutex<Vec<ProcessedImage>>>) {
    let written = Arc::new(Mutex::new(Vec::new()));
    let writer = MockWriter { should_fail: false, written_data: written.clone() };
    (RawProcessor::with_custom(decoder, StandardStrategies, writer, options), written)
}

fn recording(
    decoder: MockDecoder,
    fail_interpolate: Option<fn() -> anyhow::Error>,
) -> (TestProcessor<RecordingStrategies>, Arc<Mutex<Vec<&'static str>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let strategies = RecordingStrategies { calls: calls.clone(), fail_interpolate };
    let writer = MockWriter { should_fail: false, written_data: Arc::new(Mutex::new(Vec::new())) };
    (RawProcessor::with_custom(decoder, strategies, writer, ProcessingOptions::default()), calls)
}

fn gradient() -> MockDecoder {
    MockDecoder::bayer(8, 8, |row, col| 100 + (row * 8 + col) as u16)
}

fn unpacked<S: ProcessingStrategies, W: TiffWriter, D: RawDecoder>(p: &mut RawProcessor<D, S, W>) {
    p.open_buffer(vec![0u8; 16]).unwrap();
    p.unpack().unwrap();
}

#[test]
fn test_calls_before_open_are_out_of_order() {
    let (mut p, _) = processor(gradient(), ProcessingOptions::default());
    assert_eq!(p.unpack().unwrap_err().code(), ErrorCode::OutOfOrderCall);
    assert_eq!(p.raw2image().unwrap_err().code(), ErrorCode::OutOfOrderCall);
    assert_eq!(p.process_full().unwrap_err().code(), ErrorCode::OutOfOrderCall);
    assert_eq!(p.decoder_info().unwrap_err().code(), ErrorCode::OutOfOrderCall);
    assert_eq!(p.adjust_sizes_info_only().unwrap_err().code(), ErrorCode::OutOfOrderCall);
    assert!(p.progress_flags().is_empty());
}

#[test]
fn test_open_reaches_size_adjust() {
    let (mut p, _) = processor(gradient(), ProcessingOptions::default());
    p.open_buffer(vec![0u8; 16]).unwrap();

    let flags = p.progress_flags();
    assert!(flags.contains(ProgressStage::Open));
    assert!(flags.contains(ProgressStage::Identify));
    assert_eq!(flags.latest(), Some(ProgressStage::SizeAdjust));
    assert_eq!((p.geometry().iwidth, p.geometry().iheight), (8, 8));
    assert_eq!(p.identification().map(|id| id.make.as_str()), Some("Mock"));
    assert_eq!(p.decoder_info().unwrap().name, "rawloader::decode()");
}

#[test]
fn test_open_empty_buffer_is_io_error() {
    let (mut p, _) = processor(gradient(), ProcessingOptions::default());
    let err = p.open_buffer(Vec::new()).unwrap_err();
    assert!(matches!(err, ProcessingError::IoError(_)));
}

#[test]
fn test_missing_file_is_io_error() {
    let (mut p, _) = processor(gradient(), ProcessingOptions::default());
    let err = p.open_file("/nonexistent/frame.raw").unwrap_err();
    assert_eq!(err.code(), ErrorCode::IoError);
}

#[test]
fn test_file_without_raw_data_is_unsupported() {
    let mut decoder = gradient();
    decoder.identification.raw_count = 0;
    let (mut p, _) = processor(decoder, ProcessingOptions::default());

    let err = p.open_buffer(vec![0u8; 16]).unwrap_err();
    assert!(matches!(err, ProcessingError::FileUnsupported));
    assert!(p.progress_flags().is_empty());
}

#[test]
fn test_half_size_shrinks_working_size() {
    let options = ProcessingOptions::builder().half_size(true).build();
    let (mut p, _) = processor(MockDecoder::bayer(7, 5, |_, _| 1), options);
    p.open_buffer(vec![0u8; 16]).unwrap();
    assert_eq!((p.geometry().iwidth, p.geometry().iheight), (4, 3));
}

#[test]
fn test_diagonal_sensor_bookkeeping() {
    let mut decoder = MockDecoder::bayer(8, 8, |_, _| 1);
    let geometry = &mut decoder.identification.geometry;
    geometry.top_margin = 1;
    geometry.raw_height = 6;
    geometry.diagonal = Some(DiagonalLayout { fuji_width: 3, fuji_layout: false, fwidth: 0, fheight: 0 });
    let (mut p, _) = processor(decoder, ProcessingOptions::default());
    p.open_buffer(vec![0u8; 16]).unwrap();

    let g = p.geometry();
    let layout = g.diagonal.unwrap();
    assert_eq!((layout.fwidth, layout.fheight), (8, 8));
    assert_eq!((g.width, g.height), (6, 6));
    assert_eq!(g.raw_height, 8);
}

#[test]
fn test_shot_select_out_of_range() {
    let options = ProcessingOptions::builder().shot_select(1).build();
    let (mut p, _) = processor(gradient(), options);
    p.open_buffer(vec![0u8; 16]).unwrap();

    let err = p.unpack().unwrap_err();
    assert!(matches!(err, ProcessingError::NoSuchImage { requested: 1, available: 1 }));
    // precondition failures leave the session as it was
    assert_eq!(p.progress_flags().latest(), Some(ProgressStage::SizeAdjust));
}

#[test]
fn test_unpack_without_decoder_is_unspecified() {
    let mut decoder = gradient();
    decoder.identification.decoder = None;
    let (mut p, _) = processor(decoder, ProcessingOptions::default());
    p.open_buffer(vec![0u8; 16]).unwrap();
    assert_eq!(p.unpack().unwrap_err().code(), ErrorCode::Unspecified);
    assert_eq!(p.decoder_info().unwrap_err().code(), ErrorCode::Unspecified);
}

#[test]
fn test_unpack_normalizes_black_and_measures_maxima() {
    let mut decoder = gradient();
    decoder.identification.color.black = 10;
    decoder.identification.color.cblack = [4, 6, 5, 4];
    let (mut p, _) = processor(decoder, ProcessingOptions::default());
    unpacked(&mut p);

    assert_eq!(p.color().black, 14);
    assert_eq!(p.color().cblack, [0, 2, 1, 0]);
    // brightest photosites sit in the last 2x2 cell
    assert_eq!(p.color().channel_maximum, [154, 155, 163, 162]);
    assert!(matches!(p.raw(), Some(RawBuffer::Bayer { .. })));
    assert_eq!(p.progress_flags().latest(), Some(ProgressStage::LoadRaw));

    let again = p.unpack().unwrap_err();
    assert_eq!(again.code(), ErrorCode::OutOfOrderCall);
    assert!(p.raw().is_some());
}

#[test]
fn test_decode_failure_recycles_session() {
    let mut decoder = gradient();
    decoder.should_fail = true;
    let (mut p, _) = processor(decoder, ProcessingOptions::default());
    p.open_buffer(vec![0u8; 16]).unwrap();

    let err = p.unpack().unwrap_err();
    assert_eq!(err.code(), ErrorCode::DataError);
    assert!(p.progress_flags().is_empty());
    assert!(p.raw().is_none());
    assert!(p.identification().is_none());
}

#[test]
fn test_progress_callback_reports_load_raw() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (mut p, _) = processor(gradient(), ProcessingOptions::default());
    let log = seen.clone();
    p.set_progress_callback(Box::new(move |stage, current, total| {
        log.lock().unwrap().push((stage, current, total));
        ProgressAction::Continue
    }));
    unpacked(&mut p);

    let seen = seen.lock().unwrap();
    assert_eq!(*seen, vec![(ProgressStage::LoadRaw, 0, 2), (ProgressStage::LoadRaw, 1, 2)]);
}

#[test]
fn test_cancel_from_callback() {
    let (mut p, _) = processor(gradient(), ProcessingOptions::default());
    unpacked(&mut p);
    p.set_progress_callback(Box::new(|stage, _, _| {
        if stage == ProgressStage::Interpolate { ProgressAction::Cancel } else { ProgressAction::Continue }
    }));

    let err = p.process_full().unwrap_err();
    assert!(matches!(err, ProcessingError::CancelledByCallback));
    assert_eq!(err.code(), ErrorCode::CancelledByCallback);
    assert!(p.progress_flags().is_empty());
    assert!(p.image().is_none());
}

#[test]
fn test_raw2image_and_free_image() {
    let (mut p, _) = processor(gradient(), ProcessingOptions::default());
    unpacked(&mut p);
    p.raw2image().unwrap();

    let image = p.image().unwrap();
    assert_eq!((image.width, image.height), (8, 8));
    assert_eq!(image.get(0, 0), [100, 0, 0, 0]);
    assert_eq!(image.get(1, 1), [0, 0, 109, 0]);

    p.free_image();
    assert!(p.image().is_none());
    assert_eq!(p.progress_flags().latest(), Some(ProgressStage::LoadRaw));
}

#[test]
fn test_subtract_black_needs_an_image() {
    let mut decoder = gradient();
    decoder.identification.color.black = 20;
    let (mut p, _) = processor(decoder, ProcessingOptions::default());
    unpacked(&mut p);
    assert_eq!(p.subtract_black().unwrap_err().code(), ErrorCode::OutOfOrderCall);

    p.raw2image().unwrap();
    assert_eq!(p.subtract_black().unwrap(), BlackSubtraction::Offsets);
    assert_eq!(p.image().unwrap().get(0, 0)[0], 80);
    assert_eq!(p.color().maximum, 4075);
    assert_eq!(p.subtract_black().unwrap(), BlackSubtraction::MaximumOnly);
}

#[test]
fn test_user_overrides_apply_on_conversion() {
    let options = ProcessingOptions::builder()
        .user_flip(Some(90))
        .user_black(Some(50))
        .user_sat(Some(1000))
        .build();
    let (mut p, _) = processor(gradient(), options);
    unpacked(&mut p);
    p.raw2image().unwrap();
    assert_eq!(p.geometry().flip, 6);
    assert_eq!(p.color().black, 50);

    assert!(p.adjust_maximum().unwrap());
    assert_eq!(p.color().maximum, 1000);
}

#[test]
fn test_crop_box_is_applied() {
    let options = ProcessingOptions::builder().cropbox(Some(CropBox::new(2, 2, 4, 4))).build();
    let (mut p, _) = processor(gradient(), options);
    unpacked(&mut p);
    p.raw2image_ex().unwrap();

    let image = p.image().unwrap();
    assert_eq!((image.width, image.height), (4, 4));
    assert_eq!(image.get(0, 0)[0], 100 + 2 * 8 + 2);
}

#[test]
fn test_bad_crop_recycles_session() {
    let options = ProcessingOptions::builder().cropbox(Some(CropBox::new(10, 0, 4, 4))).build();
    let (mut p, _) = processor(gradient(), options);
    unpacked(&mut p);

    let err = p.raw2image_ex().unwrap_err();
    assert!(matches!(err, ProcessingError::BadCrop));
    assert!(p.progress_flags().is_empty());
    assert!(p.raw().is_none());
}

#[test]
fn test_document_mode_keeps_photosites() {
    let (mut p, _) = processor(gradient(), ProcessingOptions::default());
    unpacked(&mut p);
    p.process_document_mode().unwrap();

    let flags = p.progress_flags();
    assert!(flags.contains(ProgressStage::PreInterpolate));
    assert!(flags.contains(ProgressStage::ConvertRgb));
    assert!(flags.contains(ProgressStage::Stretch));
    assert!(!flags.contains(ProgressStage::ScaleColors));
    assert!(!flags.contains(ProgressStage::Interpolate));

    assert_eq!(p.geometry().colors, 1);
    let image = p.image().unwrap();
    for row in 0..8 {
        for col in 0..8 {
            assert_eq!(image.get(row, col)[0], 100 + (row * 8 + col) as u16);
        }
    }
}

#[test]
fn test_stage_order_per_entry_point() {
    let (mut p, calls) = recording(gradient(), None);
    unpacked(&mut p);
    p.process_document_mode().unwrap();
    assert_eq!(*calls.lock().unwrap(), vec!["pre_interpolate", "mix_green", "median_filter", "convert_to_rgb"]);

    calls.lock().unwrap().clear();
    p.process_full().unwrap();
    assert_eq!(
        *calls.lock().unwrap(),
        vec![
            "scale_colors",
            "pre_interpolate",
            "interpolate",
            "mix_green",
            "median_filter",
            "fuji_rotate",
            "convert_to_rgb",
            "stretch",
        ]
    );
}

#[test]
fn test_strategy_errors_keep_their_kind() {
    let (mut p, _) = recording(gradient(), Some(kernel_failure));
    unpacked(&mut p);
    let err = p.process_full().unwrap_err();
    assert!(matches!(err, ProcessingError::Unspecified(_)));
    assert!(p.progress_flags().is_empty());

    let (mut p, _) = recording(gradient(), Some(allocation_failure));
    unpacked(&mut p);
    assert_eq!(p.process_full().unwrap_err().code(), ErrorCode::OutOfMemory);
}

#[test]
fn test_full_processing_of_flat_field() {
    let (mut p, _) = processor(MockDecoder::bayer(8, 8, |_, _| 1000), ProcessingOptions::default());
    unpacked(&mut p);
    p.process_full().unwrap();

    let expected = (1000.0f32 * (65535.0 / 4095.0)) as u16;
    let image = p.image().unwrap();
    assert!(image.pixels.iter().all(|px| px[..3] == [expected; 3]));
    assert_eq!(p.geometry().colors, 3);
    assert!(p.progress_flags().contains(ProgressStage::Interpolate));
    assert!(p.timings().get_step("Interpolating").is_some());
}

#[test]
fn test_half_size_processing() {
    let options = ProcessingOptions::builder().half_size(true).build();
    let (mut p, _) = processor(MockDecoder::bayer(8, 8, |_, _| 500), options);
    unpacked(&mut p);
    p.process_full().unwrap();

    let image = p.image().unwrap();
    assert_eq!((image.width, image.height), (4, 4));
    assert_eq!(p.geometry().filters, FilterPattern::None);
    assert_eq!(p.geometry().colors, 3);
    assert!(!p.progress_flags().contains(ProgressStage::Interpolate));
}

#[test]
fn test_banding_runs_when_configured() {
    let options = ProcessingOptions::builder().banding(Some(BandingOptions { thresholds: [8.0; 4] })).build();
    let (mut p, _) = processor(gradient(), options);
    unpacked(&mut p);
    p.raw2image().unwrap();
    // 8x8 is below the minimum extent
    assert_eq!(p.remove_banding().unwrap(), BandingStatus::TooSmall);
    p.process_full().unwrap();
}

#[test]
fn test_exposure_correction_scales_maximum() {
    let options = ProcessingOptions::builder()
        .exposure(Some(crate::image_pipeline::exposure::ExposureOptions { shift: 0.5, preserve: 0.0 }))
        .build();
    let (mut p, _) = processor(gradient(), options);
    unpacked(&mut p);
    p.raw2image().unwrap();
    p.exposure_correction().unwrap();
    assert_eq!(p.image().unwrap().get(0, 0)[0], 50);
    assert_eq!(p.color().maximum, 2047);
}

#[test]
fn test_output_requires_pre_interpolation() {
    let (mut p, written) = processor(gradient(), ProcessingOptions::default());
    unpacked(&mut p);
    p.raw2image().unwrap();
    assert_eq!(p.make_mem_image().unwrap_err().code(), ErrorCode::OutOfOrderCall);
    let mut out = Cursor::new(Vec::new());
    assert_eq!(p.write_tiff_to(&mut out).unwrap_err().code(), ErrorCode::OutOfOrderCall);
    assert!(written.lock().unwrap().is_empty());
}

#[test]
fn test_mem_image_and_tiff_output() {
    let options = ProcessingOptions::builder().output_bps(16).build();
    let (mut p, written) = processor(gradient(), options);
    unpacked(&mut p);
    p.process_full().unwrap();

    let format = p.mem_image_format();
    assert_eq!((format.width, format.height, format.colors, format.bps), (8, 8, 3, 16));
    let image = p.make_mem_image().unwrap();
    assert!(matches!(image.samples, Samples::Sixteen(ref data) if data.len() == 8 * 8 * 3));

    let mut out = Cursor::new(Vec::new());
    p.write_tiff_to(&mut out).unwrap();
    assert_eq!(written.lock().unwrap().len(), 1);
    assert!(p.progress_flags().contains(ProgressStage::Flip));
}

#[test]
fn test_writer_failure_recycles_session() {
    let writer = MockWriter { should_fail: true, written_data: Arc::new(Mutex::new(Vec::new())) };
    let mut p = RawProcessor::with_custom(gradient(), StandardStrategies, writer, ProcessingOptions::default());
    unpacked(&mut p);
    p.process_full().unwrap();

    let err = p.write_tiff_to(&mut Cursor::new(Vec::new())).unwrap_err();
    assert_eq!(err.code(), ErrorCode::IoError);
    assert!(p.image().is_none());
}

#[test]
fn test_adjust_sizes_info_only() {
    let mut decoder = MockDecoder::bayer(8, 6, |_, _| 1);
    decoder.identification.geometry.flip = 5;
    decoder.identification.geometry.pixel_aspect = 0.5;
    let (mut p, _) = processor(decoder, ProcessingOptions::default());
    p.open_buffer(vec![0u8; 16]).unwrap();
    p.adjust_sizes_info_only().unwrap();

    // stretched to 8x12, then transposed
    assert_eq!((p.geometry().iwidth, p.geometry().iheight), (12, 8));
    assert!(p.progress_flags().contains(ProgressStage::FujiRotate));
    assert!(p.progress_flags().contains(ProgressStage::Flip));
    assert_eq!(p.unpack().unwrap_err().code(), ErrorCode::OutOfOrderCall);
}

#[test]
fn test_adjust_sizes_for_diagonal_sensor() {
    let mut decoder = MockDecoder::bayer(24, 24, |_, _| 1);
    decoder.identification.geometry.raw_height = 20;
    decoder.identification.geometry.diagonal =
        Some(DiagonalLayout { fuji_width: 10, fuji_layout: false, fwidth: 0, fheight: 0 });
    let (mut p, _) = processor(decoder, ProcessingOptions::default());
    p.open_buffer(vec![0u8; 16]).unwrap();
    assert_eq!((p.geometry().width, p.geometry().height), (20, 20));
    p.adjust_sizes_info_only().unwrap();

    // back to the 24x24 frame, then 9 / sqrt(0.5) by 15 / sqrt(0.5)
    assert_eq!((p.geometry().width, p.geometry().height), (24, 24));
    assert_eq!((p.geometry().iwidth, p.geometry().iheight), (12, 21));
    assert!(!p.progress_flags().contains(ProgressStage::Flip));
}

#[test]
fn test_end_to_end_unpacked_file() {
    let geometry = SensorGeometry::bayer(16, 16, FilterPattern::RGGB);
    let color = ColorState { black: 64, maximum: 4095, ..Default::default() };
    let decoder = UnpackedDecoder::new(geometry, color, 12, 8);

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("frame.raw");
    let mut bytes = vec![0u8; 8];
    for i in 0..256u16 {
        bytes.extend_from_slice(&(64 + i * 8).to_le_bytes());
    }
    std::fs::write(&input, bytes).unwrap();

    let options = ProcessingOptions::builder().output_bps(16).build();
    let mut p = RawProcessor::with_custom(decoder, StandardStrategies, StandardTiffWriter, options);
    p.open_file(&input).unwrap();
    p.unpack().unwrap();
    p.process_full().unwrap();

    let output = dir.path().join("frame.tiff");
    p.write_tiff(&output).unwrap();
    let written = std::fs::read(&output).unwrap();
    assert_eq!(&written[..2], b"II");
    assert!(p.progress_flags().contains(ProgressStage::Flip));
}
