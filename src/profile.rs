//! Per-mode camera configuration profiles.
//!
//! Pure data: the mapping from [`CameraMode`] to the hardware tuning knobs
//! that mode needs. No state, no failure modes. Keeping this mapping out of
//! the coordinator means new modes only touch this module.

use serde::{Deserialize, Serialize};

use crate::state::CameraMode;

/// Capture resolution preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// 640x480; cheapest preview.
    Low,
    /// 1280x720; enough detail for QR decoding without burning battery.
    Medium,
    /// 1920x1080; detection models want the extra pixels.
    High,
}

impl Resolution {
    /// Pixel dimensions of the preset.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Resolution::Low => (640, 480),
            Resolution::Medium => (1280, 720),
            Resolution::High => (1920, 1080),
        }
    }
}

/// Which physical lens to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LensDirection {
    /// World-facing lens.
    Back,
    /// User-facing lens.
    Front,
}

/// Pixel format handed to the frame consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormatGroup {
    /// Planar YUV; the luminance plane is what QR decoders read.
    Yuv420,
    /// Interleaved BGRA; what the detection pipeline's tensors expect.
    Bgra8888,
}

/// Immutable per-mode hardware configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CameraConfiguration {
    /// Capture resolution preset.
    pub resolution: Resolution,
    /// Physical lens selection.
    pub lens_direction: LensDirection,
    /// Pixel format delivered on the frame stream.
    pub image_format_group: ImageFormatGroup,
    /// Whether the audio pipeline is opened alongside video.
    pub enable_audio: bool,
}

/// The canonical configuration for `mode`.
///
/// `CameraMode::None` maps to the QR (cheapest) profile so the function
/// stays total; the coordinator never opens hardware for `None`.
pub fn configuration_for(mode: CameraMode) -> CameraConfiguration {
    match mode {
        CameraMode::QrScanning | CameraMode::None => CameraConfiguration {
            resolution: Resolution::Medium,
            lens_direction: LensDirection::Back,
            image_format_group: ImageFormatGroup::Yuv420,
            enable_audio: false,
        },
        CameraMode::MlDetection => CameraConfiguration {
            resolution: Resolution::High,
            lens_direction: LensDirection::Back,
            image_format_group: ImageFormatGroup::Bgra8888,
            enable_audio: false,
        },
    }
}
