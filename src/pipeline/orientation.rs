// SPDX-License-Identifier: GPL-3.0-only

//! Sensor-to-display orientation correction

use super::types::PresentableImage;
use crate::capture::SensorRotation;
use crate::errors::RenderError;
use image::imageops;

/// Rotate an image clockwise by the sensor mounting rotation
///
/// `SensorRotation::None` hands the input back untouched.
pub fn rotate(image: PresentableImage, rotation: SensorRotation) -> PresentableImage {
    let pixels = match rotation {
        SensorRotation::None => return image,
        SensorRotation::Rotate90 => imageops::rotate90(&image.image),
        SensorRotation::Rotate180 => imageops::rotate180(&image.image),
        SensorRotation::Rotate270 => imageops::rotate270(&image.image),
    };
    PresentableImage {
        image: pixels,
        ..image
    }
}

/// Rotate by an angle in degrees (clockwise, any multiple of 90)
pub fn rotate_degrees(image: PresentableImage, degrees: i32) -> Result<PresentableImage, RenderError> {
    let rotation =
        SensorRotation::from_degrees_int(degrees).ok_or(RenderError::UnsupportedRotation(degrees))?;
    Ok(rotate(image, rotation))
}
