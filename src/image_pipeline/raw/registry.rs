//! Decoder descriptors.
//!
//! Identification selects one [`DecoderId`]; everything downstream learns the
//! sample layout from [`describe`] and nowhere else.

use crate::image_pipeline::common::error::{ProcessingError, Result};
use crate::image_pipeline::raw::types::{DecoderDescriptor, LayoutClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderId {
    AdobeDngLosslessJpeg,
    AdobeDngUncompressed,
    Canon600,
    Fuji,
    CanonCompressed,
    LosslessJpeg,
    CanonSraw,
    Kodak262,
    KodakC330,
    KodakC603,
    KodakDc120,
    KodakEasy,
    KodakJpeg,
    KodakRadc,
    KodakRgb,
    KodakYrgb,
    KodakYcbcr,
    LeafHdr,
    MinoltaRd175,
    NikonCompressed,
    NikonYuv,
    Nokia,
    Olympus,
    Packed,
    Panasonic,
    Pentax,
    PhaseOne,
    PhaseOneCompressed,
    PhaseOneHasselblad,
    Quicktake100,
    Rollei,
    Sinar4Shot,
    SmalV6,
    SmalV9,
    SonyArw,
    SonyArw2,
    SonyArq,
    SonySrf,
    EightBit,
    Foveon,
    Redcine,
    ImaconFull,
    HasselbladFull,
    Samsung,
    Unpacked,
    RawLoaderCfa,
    RawLoaderLinear,
}

/// (name, layout, provisional) for decoders whose layout does not depend on the filter pattern.
fn fixed_entry(id: DecoderId) -> (&'static str, LayoutClass, bool) {
    use DecoderId::*;
    use LayoutClass::*;
    match id {
        Canon600 => ("canon_600_load_raw()", FlatfieldBayer, false),
        Fuji => ("fuji_load_raw()", FlatfieldBayer, false),
        CanonCompressed => ("canon_compressed_load_raw()", FlatfieldBayer, false),
        LosslessJpeg => ("lossless_jpeg_load_raw()", FlatfieldBayer, false),
        CanonSraw => ("canon_sraw_load_raw()", Legacy, false),
        Kodak262 => ("kodak_262_load_raw()", FlatfieldBayer, true),
        KodakC330 => ("kodak_c330_load_raw()", FlatfieldBayer, false),
        KodakC603 => ("kodak_c603_load_raw()", FlatfieldBayer, false),
        KodakDc120 => ("kodak_dc120_load_raw()", FlatfieldBayer, false),
        KodakEasy => ("kodak_easy_load_raw()", FlatfieldBayer, false),
        KodakJpeg => ("kodak_jpeg_load_raw()", FlatfieldBayer, true),
        KodakRadc => ("kodak_radc_load_raw()", FourComponent, false),
        KodakRgb => ("kodak_rgb_load_raw()", FourComponent, true),
        KodakYrgb => ("kodak_yrgb_load_raw()", FourComponent, false),
        KodakYcbcr => ("kodak_ycbcr_load_raw()", FourComponent, true),
        MinoltaRd175 => ("minolta_rd175_load_raw()", FlatfieldBayer, true),
        NikonCompressed => ("nikon_compressed_load_raw()", FlatfieldBayer, false),
        NikonYuv => ("nikon_yuv_load_raw()", FlatfieldBayer, false),
        Nokia => ("nokia_load_raw()", FlatfieldBayer, true),
        Olympus => ("olympus_load_raw()", FlatfieldBayer, false),
        Packed => ("packed_load_raw()", FlatfieldBayer, false),
        Panasonic => ("panasonic_load_raw()", FlatfieldBayer, false),
        Pentax => ("pentax_load_raw()", FlatfieldBayer, false),
        PhaseOne => ("phase_one_load_raw()", FlatfieldBayer, false),
        PhaseOneCompressed => ("phase_one_load_raw_c()", FlatfieldBayer, false),
        PhaseOneHasselblad => ("hasselblad_load_raw()", FlatfieldBayer, false),
        Quicktake100 => ("quicktake_100_load_raw()", FlatfieldBayer, true),
        Rollei => ("rollei_load_raw()", FlatfieldBayer, true),
        Sinar4Shot => ("sinar_4shot_load_raw()", FourComponent, true),
        SmalV6 => ("smal_v6_load_raw()", FlatfieldBayer, true),
        SmalV9 => ("smal_v9_load_raw()", FlatfieldBayer, true),
        SonyArw => ("sony_arw_load_raw()", FlatfieldBayer, false),
        SonyArw2 => ("sony_arw2_load_raw()", FlatfieldBayer, false),
        SonyArq => ("sony_arq_load_raw()", FourComponent, false),
        SonySrf => ("sony_load_raw()", FlatfieldBayer, false),
        EightBit => ("eight_bit_load_raw()", FlatfieldBayer, false),
        Foveon => ("foveon_load_raw()", Legacy, false),
        Redcine => ("redcine_load_raw()", FlatfieldBayer, false),
        ImaconFull => ("imacon_full_load_raw()", FourComponent, false),
        HasselbladFull => ("hasselblad_full_load_raw()", FlatfieldBayer, false),
        Samsung => ("samsung_load_raw()", FlatfieldBayer, false),
        Unpacked => ("unpacked_load_raw()", FlatfieldBayer2, false),
        RawLoaderCfa => ("rawloader::decode()", FlatfieldBayer, false),
        RawLoaderLinear => ("rawloader::decode()", FourComponent, false),
        AdobeDngLosslessJpeg => ("lossless_dng_load_raw()", FlatfieldBayer, false),
        AdobeDngUncompressed => ("packed_dng_load_raw()", FlatfieldBayer, false),
        LeafHdr => ("leaf_hdr_load_raw()", FlatfieldBayer, false),
    }
}

/// Describes the selected decoding strategy.
///
/// DNG and Leaf HDR decoders switch to four-component storage when the sensor has no
/// mosaic.
pub fn describe(selected: Option<DecoderId>, has_filters: bool) -> Result<DecoderDescriptor> {
    let id = selected
        .ok_or_else(|| ProcessingError::Unspecified("no decoder selected".to_string()))?;
    let (name, mut layout, provisional) = fixed_entry(id);
    if matches!(
        id,
        DecoderId::AdobeDngLosslessJpeg | DecoderId::AdobeDngUncompressed | DecoderId::LeafHdr
    ) && !has_filters
    {
        layout = LayoutClass::FourComponent;
    }
    Ok(DecoderDescriptor { name, layout, provisional })
}
