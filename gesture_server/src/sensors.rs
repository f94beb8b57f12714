//! Sensors module.
//!
use std::{fmt, ops::Deref, str::FromStr};

use anyhow::{anyhow, Result};
use image::RgbImage;
use rscam::{Config, Frame};
use simple_error::simple_error;

/// Pixel formats the camera can be asked for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PixelFormat {
    /// Motion JPEG, every frame is a complete JPEG image.
    Mjpg,
    /// Packed 24 bit RGB.
    Rgb3,
}

impl PixelFormat {
    pub fn fourcc(&self) -> &'static [u8] {
        match self {
            PixelFormat::Mjpg => b"MJPG",
            PixelFormat::Rgb3 => b"RGB3",
        }
    }

    /// Decode a raw frame of this format.
    pub fn decode(&self, data: &[u8], resolution: (u32, u32)) -> Result<RgbImage> {
        match self {
            PixelFormat::Mjpg => Ok(turbojpeg::decompress_image(data)?),
            PixelFormat::Rgb3 => RgbImage::from_raw(resolution.0, resolution.1, data.to_vec())
                .ok_or_else(|| {
                    anyhow!(
                        "RGB3 frame of {} bytes does not match resolution {:?}",
                        data.len(),
                        resolution
                    )
                }),
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PixelFormat::Mjpg => "MJPG",
            PixelFormat::Rgb3 => "RGB3",
        })
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MJPG" => Ok(PixelFormat::Mjpg),
            "RGB3" => Ok(PixelFormat::Rgb3),
            _ => Err(format!("unsupported pixel format {s}, use MJPG or RGB3")),
        }
    }
}

/// Requested capture resolution.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Resolution {
    /// Highest resolution the camera supports.
    Max,
    Exact(u32, u32),
}

impl Resolution {
    pub fn exact(&self) -> Option<(u32, u32)> {
        match self {
            Resolution::Max => None,
            Resolution::Exact(width, height) => Some((*width, *height)),
        }
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("max") {
            return Ok(Resolution::Max);
        }

        let parse = || -> Option<Resolution> {
            let (width, height) = s.split_once(['x', 'X'])?;
            let (width, height) = (width.trim().parse().ok()?, height.trim().parse().ok()?);
            (width > 0 && height > 0).then_some(Resolution::Exact(width, height))
        };

        parse().ok_or_else(|| format!("invalid resolution {s}, expected WIDTHxHEIGHT or max"))
    }
}

/// Anything delivering raw frames in a fixed format and resolution.
pub trait FrameSource {
    type Frame: Deref<Target = [u8]>;

    fn format(&self) -> PixelFormat;
    fn resolution(&self) -> (u32, u32);
    fn capture_raw(&mut self) -> Result<Self::Frame>;
}

/// Initialized, running camera.
pub struct Camera {
    cam: rscam::Camera,
    format: PixelFormat,
    resolution: (u32, u32),
}

impl Camera {
    /// Open a video device on a Linux machine and start capturing.
    ///
    /// Without a resolution or frame rate, the highest one supported by the
    /// device for `format` is selected.
    pub fn open(
        device_name: &str,
        format: PixelFormat,
        resolution: Option<(u32, u32)>,
        frame_rate: Option<u32>,
    ) -> Result<Self> {
        let mut cam = rscam::Camera::new(device_name)?;
        log_supported_formats(&cam, format);
        let fourcc = format.fourcc();

        log::info!("Using camera {}", device_name);

        let resolution = resolution
            .map(Ok)
            .unwrap_or_else(|| get_max_resolution(&cam, fourcc))?;

        let interval = frame_rate
            .map(|fps| Ok((1, fps.max(1))))
            .unwrap_or_else(|| get_max_frame_rate(&cam, fourcc, resolution))?;

        cam.start(&Config {
            interval,
            resolution,
            format: fourcc,
            ..Default::default()
        })?;
        log::info!(
            "Capturing {}x{} {} at interval {}/{} s",
            resolution.0,
            resolution.1,
            format,
            interval.0,
            interval.1
        );

        Ok(Self {
            cam,
            format,
            resolution,
        })
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    /// Capture a frame as delivered by the device.
    pub fn capture_raw(&self) -> Result<Frame> {
        Ok(self.cam.capture()?)
    }

    /// Capture and decode a frame.
    pub fn capture(&self) -> Result<RgbImage> {
        let frame = self.capture_raw()?;
        self.format.decode(&frame[..], self.resolution)
    }
}

impl FrameSource for Camera {
    type Frame = Frame;

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    fn capture_raw(&mut self) -> Result<Frame> {
        Camera::capture_raw(self)
    }
}

/// Get the maximum supported resolution for the given format.
fn get_max_resolution(cam: &rscam::Camera, format: &[u8]) -> Result<(u32, u32)> {
    let resolution_info = cam.resolutions(format)?;
    log::debug!("Found resolutions: {:?}", &resolution_info);
    match resolution_info {
        rscam::ResolutionInfo::Discretes(resolutions) => resolutions
            .iter()
            // Map to iterator over ((width, height) num_pixels)
            .map(|res| (res, res.0 * res.1))
            // Get the highest resolution in terms of number of pixels
            .max_by(|a, b| a.1.cmp(&b.1))
            // Extract width and height values
            .map(|res| *res.0),
        rscam::ResolutionInfo::Stepwise {
            min: _,
            max,
            step: _,
        } => Some(max),
    }
    .ok_or_else(|| simple_error!("No resolution found").into())
}

/// Get the maximum supported frame rate for the given format and resolution.
fn get_max_frame_rate(
    cam: &rscam::Camera,
    format: &[u8],
    resolution: (u32, u32),
) -> Result<(u32, u32)> {
    let interval_info = cam.intervals(format, resolution)?;
    log::debug!("Found frame rates: {:?}", &interval_info);
    match interval_info {
        // Intervals are (numerator, denominator) in seconds, the shortest one
        // is the highest frame rate.
        rscam::IntervalInfo::Discretes(intervals) => intervals
            .iter()
            .filter(|(numerator, _)| *numerator > 0)
            .max_by(|a, b| (a.1 as f32 / a.0 as f32).total_cmp(&(b.1 as f32 / b.0 as f32)))
            .copied(),
        rscam::IntervalInfo::Stepwise {
            min,
            max: _,
            step: _,
        } => Some(min),
    }
    .ok_or_else(|| simple_error!("No frame rate found").into())
}

fn log_supported_formats(cam: &rscam::Camera, format: PixelFormat) {
    let formats: Vec<_> = cam.formats().filter_map(|fmt| fmt.ok()).collect();
    log::debug!(
        "Supported formats: {:?}, using format {}",
        formats,
        format
    );
}
