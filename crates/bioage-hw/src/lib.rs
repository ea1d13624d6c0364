//! bioage-hw: Hardware abstraction for still capture.
//!
//! Provides V4L2-based camera access and conversion of raw buffers to RGB.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo};
pub use frame::{Frame, FrameError, PixelFormat};
