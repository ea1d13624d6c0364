//! V4L2 still capture via the `v4l` crate.

use crate::frame::{self, Frame, PixelFormat};
use serde::Serialize;
use std::io;
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

const REQUESTED_WIDTH: u32 = 640;
const REQUESTED_HEIGHT: u32 = 480;
const STREAM_BUFFERS: u32 = 4;
/// Extra dequeues allowed beyond warmup while waiting for a lit frame.
const MAX_DARK_RETRIES: usize = 8;
const DARK_FRAME_RATIO: f32 = 0.95;
const MAX_DEVICE_INDEX: u32 = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("device busy: {0}")]
    DeviceBusy(String),
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("video capture not supported by {0}")]
    CaptureNotSupported(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
}

impl CameraError {
    fn from_open(device_path: &str, err: &io::Error) -> Self {
        let detail = format!("{device_path}: {err}");
        match err.raw_os_error() {
            Some(libc::EACCES) | Some(libc::EPERM) => CameraError::PermissionDenied(detail),
            Some(libc::EBUSY) => CameraError::DeviceBusy(detail),
            Some(libc::ENOENT) | Some(libc::ENODEV) | Some(libc::ENXIO) => CameraError::DeviceNotFound(detail),
            _ => match err.kind() {
                io::ErrorKind::PermissionDenied => CameraError::PermissionDenied(detail),
                io::ErrorKind::NotFound => CameraError::DeviceNotFound(detail),
                _ => CameraError::CaptureFailed(detail),
            },
        }
    }
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Open V4L2 device. Dropping it closes the file descriptor.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pixel_format: PixelFormat,
}

impl Camera {
    /// Open a V4L2 camera device by path (e.g., "/dev/video0").
    pub fn open(device_path: &str) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| CameraError::from_open(device_path, &e))?;
        let caps = device
            .query_caps()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to query capabilities: {e}")))?;

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::CaptureNotSupported(device_path.to_string()));
        }

        let mut fmt = device
            .format()
            .map_err(|e| CameraError::FormatNegotiationFailed(format!("failed to get format: {e}")))?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = REQUESTED_WIDTH;
        fmt.height = REQUESTED_HEIGHT;

        let negotiated = device
            .set_format(&fmt)
            .map_err(|e| CameraError::FormatNegotiationFailed(format!("failed to set format: {e}")))?;
        let pixel_format = pixel_format_for(negotiated.fourcc)?;

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?negotiated.fourcc,
            "negotiated format"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
            pixel_format,
        })
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Capture one lit still.
    ///
    /// Discards `warmup` frames so auto exposure can settle, then returns
    /// the first frame that is not dark.
    pub fn capture_still(&self, warmup: usize) -> Result<Frame, CameraError> {
        let mut stream = MmapStream::with_buffers(&self.device, BufType::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| CameraError::CaptureFailed(format!("failed to create mmap stream: {e}")))?;

        let mut dark_skipped = 0usize;
        for attempt in 0..warmup + MAX_DARK_RETRIES {
            let (buf, meta) = stream
                .next()
                .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;
            if attempt < warmup {
                continue;
            }

            let rgb = frame::to_rgb(self.pixel_format, buf, self.width, self.height)
                .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
            if frame::is_dark_frame(&rgb, DARK_FRAME_RATIO) {
                dark_skipped += 1;
                tracing::debug!(seq = meta.sequence, "skipping dark frame");
                continue;
            }

            tracing::debug!(seq = meta.sequence, dark_skipped, "still captured");
            return Ok(Frame {
                rgb,
                width: self.width,
                height: self.height,
                sequence: meta.sequence,
            });
        }

        Err(CameraError::CaptureFailed(format!(
            "no lit frame after {dark_skipped} dark frames"
        )))
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        (0..MAX_DEVICE_INDEX)
            .map(|i| format!("/dev/video{i}"))
            .filter(|path| Path::new(path).exists())
            .filter_map(|path| {
                let caps = Device::with_path(&path).ok()?.query_caps().ok()?;
                caps.capabilities
                    .contains(v4l::capability::Flags::VIDEO_CAPTURE)
                    .then(|| DeviceInfo {
                        name: caps.card.clone(),
                        driver: caps.driver.clone(),
                        bus: caps.bus.clone(),
                        path,
                    })
            })
            .collect()
    }
}

fn pixel_format_for(fourcc: FourCC) -> Result<PixelFormat, CameraError> {
    match &fourcc.repr {
        b"YUYV" => Ok(PixelFormat::Yuyv),
        b"GREY" => Ok(PixelFormat::Grey),
        b"Y16 " | b"Y16\0" => Ok(PixelFormat::Y16),
        b"RGB3" => Ok(PixelFormat::Rgb24),
        _ => Err(CameraError::FormatNegotiationFailed(format!(
            "unsupported pixel format: {fourcc:?} (need YUYV, GREY, Y16 or RGB3)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_error_mapping() {
        let denied = io::Error::from_raw_os_error(libc::EACCES);
        assert!(matches!(
            CameraError::from_open("/dev/video0", &denied),
            CameraError::PermissionDenied(_)
        ));
        let busy = io::Error::from_raw_os_error(libc::EBUSY);
        assert!(matches!(CameraError::from_open("/dev/video0", &busy), CameraError::DeviceBusy(_)));
        let gone = io::Error::from_raw_os_error(libc::ENODEV);
        assert!(matches!(CameraError::from_open("/dev/video0", &gone), CameraError::DeviceNotFound(_)));
        let other = io::Error::new(io::ErrorKind::Other, "ioctl");
        assert!(matches!(CameraError::from_open("/dev/video0", &other), CameraError::CaptureFailed(_)));
    }

    #[test]
    fn test_pixel_format_negotiation() {
        assert_eq!(pixel_format_for(FourCC::new(b"YUYV")).unwrap(), PixelFormat::Yuyv);
        assert_eq!(pixel_format_for(FourCC::new(b"GREY")).unwrap(), PixelFormat::Grey);
        assert_eq!(pixel_format_for(FourCC::new(b"Y16 ")).unwrap(), PixelFormat::Y16);
        assert_eq!(pixel_format_for(FourCC::new(b"RGB3")).unwrap(), PixelFormat::Rgb24);
        assert!(pixel_format_for(FourCC::new(b"MJPG")).is_err());
    }

    #[test]
    fn test_open_missing_device() {
        let err = Camera::open("/dev/bioage-no-such-camera").err();
        assert_eq!(err, Some(CameraError::DeviceNotFound("/dev/bioage-no-such-camera".into())));
    }
}
