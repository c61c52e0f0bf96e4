//! Debayering module for interpolating full color from a mosaic image

mod cpu_debayer;

pub use cpu_debayer::CpuDebayer;
