use dicom::pixeldata::{
    DecodedPixelData, PhotometricInterpretation, PixelDecoder, PixelRepresentation,
    PlanarConfiguration,
};
use std::path::Path;
use thiserror::Error;

use crate::model::codec::object_from_record;
use crate::model::{PixelPayload, PixelShape, Record};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("record has no pixel data")]
    NoPixelData,
    #[error("requested slice {requested}, but only {available} slice(s) are available")]
    SliceOutOfRange { requested: u32, available: u32 },
    #[error("pixel buffer holds {actual} bytes, slice needs {expected}")]
    ShortBuffer { expected: usize, actual: usize },
    #[error("{0}")]
    Layout(String),
    #[error("failed to decode pixel data: {0}")]
    Decode(#[from] dicom::pixeldata::Error),
    #[error("unsupported photometric interpretation `{0}`")]
    Unsupported(String),
    #[error("failed to save preview: {0}")]
    Save(#[from] image::ImageError),
}

/// An RGBA rendering of one slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Preview {
    pub fn save_png(&self, path: &Path) -> Result<(), RenderError> {
        image::save_buffer(
            path,
            &self.rgba,
            self.width,
            self.height,
            image::ExtendedColorType::Rgba8,
        )?;
        Ok(())
    }
}

pub struct SlicePreview;

impl SlicePreview {
    /// Renders the middle slice, the one the viewer shows by default.
    pub fn render_middle_slice(record: &Record) -> Result<Preview, RenderError> {
        if record.pixels().is_none() {
            return Err(RenderError::NoPixelData);
        }
        Self::render(record, record.declared_shape().frames / 2)
    }

    pub fn render(record: &Record, slice: u32) -> Result<Preview, RenderError> {
        let pixels = record.pixels().ok_or(RenderError::NoPixelData)?;
        let shape = record.declared_shape();
        if slice >= shape.frames {
            return Err(RenderError::SliceOutOfRange {
                requested: slice,
                available: shape.frames,
            });
        }

        // The decoder indexes frames without overflow checks, so the declared
        // geometry has to fit before it sees the record.
        let slice_end = frame_len(shape)
            .and_then(|len| len.checked_mul(slice as usize + 1))
            .ok_or_else(|| {
                RenderError::Layout(format!(
                    "declared geometry {}x{}x{} with {} frame(s) does not fit in memory",
                    shape.columns, shape.rows, shape.samples_per_pixel, shape.frames
                ))
            })?;
        if let PixelPayload::Native(bytes) = &pixels.payload {
            if bytes.len() < slice_end {
                return Err(RenderError::ShortBuffer {
                    expected: slice_end,
                    actual: bytes.len(),
                });
            }
        }

        let object = object_from_record(record).map_err(RenderError::Layout)?;
        let decoded = object.decode_pixel_data()?;
        if slice >= decoded.number_of_frames() {
            return Err(RenderError::SliceOutOfRange {
                requested: slice,
                available: decoded.number_of_frames(),
            });
        }

        let rgba = match decoded.photometric_interpretation() {
            photometric if photometric.is_monochrome() => monochrome_to_rgba(&decoded, slice)?,
            PhotometricInterpretation::Rgb => rgb_to_rgba(&decoded, slice)?,
            other => {
                let name = other.as_str().to_string();
                let image = decoded
                    .to_dynamic_image(slice)
                    .map_err(|err| RenderError::Unsupported(format!("{name}: {err}")))?;
                return Ok(Preview {
                    width: image.width(),
                    height: image.height(),
                    rgba: image.into_rgba8().into_raw(),
                });
            }
        };

        Ok(Preview {
            width: decoded.columns(),
            height: decoded.rows(),
            rgba,
        })
    }
}

/// Bytes of one frame, or `None` for an empty or unaddressable geometry.
fn frame_len(shape: PixelShape) -> Option<usize> {
    let bytes_per_sample = usize::from(shape.bits_allocated).div_ceil(8);
    usize::from(shape.rows)
        .checked_mul(usize::from(shape.columns))?
        .checked_mul(usize::from(shape.samples_per_pixel))?
        .checked_mul(bytes_per_sample)
        .filter(|len| *len > 0)
}

fn monochrome_to_rgba(decoded: &DecodedPixelData<'_>, frame: u32) -> Result<Vec<u8>, RenderError> {
    let invert = matches!(
        decoded.photometric_interpretation(),
        PhotometricInterpretation::Monochrome1
    );

    let grays = if decoded.bits_allocated() <= 8
        && decoded.pixel_representation() == PixelRepresentation::Unsigned
    {
        decoded.to_vec_frame::<u8>(frame)?
    } else {
        // signed and wide samples are stretched over their own range
        let samples = decoded.to_vec_frame::<f32>(frame)?;
        let range = value_range(samples.iter().copied());
        samples.iter().map(|value| stretch(*value, range)).collect()
    };

    Ok(grays
        .into_iter()
        .map(|gray| if invert { 255 - gray } else { gray })
        .flat_map(|gray| [gray, gray, gray, 255])
        .collect())
}

fn rgb_to_rgba(decoded: &DecodedPixelData<'_>, frame: u32) -> Result<Vec<u8>, RenderError> {
    let pixel_count = decoded.columns() as usize * decoded.rows() as usize;
    let planar = decoded.planar_configuration() == PlanarConfiguration::PixelFirst;

    if decoded.bits_allocated() <= 8 {
        let samples = if planar {
            interleave_planes(decoded.frame_data(frame)?, pixel_count)?
        } else {
            decoded.to_vec_frame::<u8>(frame)?
        };
        return Ok(samples
            .chunks_exact(3)
            .flat_map(|pixel| [pixel[0], pixel[1], pixel[2], 255])
            .collect());
    }

    let samples: Vec<f32> = if planar {
        interleave_planes(&decoded.frame_data_ow(frame)?, pixel_count)?
            .into_iter()
            .map(f32::from)
            .collect()
    } else {
        decoded.to_vec_frame::<f32>(frame)?
    };
    let ranges: [Option<(f32, f32)>; 3] = [0, 1, 2]
        .map(|channel| value_range(samples.iter().skip(channel).step_by(3).copied()));

    Ok(samples
        .chunks_exact(3)
        .flat_map(|pixel| {
            [
                stretch(pixel[0], ranges[0]),
                stretch(pixel[1], ranges[1]),
                stretch(pixel[2], ranges[2]),
                255,
            ]
        })
        .collect())
}

/// Reorders `RRR..GGG..BBB..` into `RGBRGB..`.
fn interleave_planes<T: Copy>(samples: &[T], pixel_count: usize) -> Result<Vec<T>, RenderError> {
    if pixel_count == 0 || samples.len() < pixel_count * 3 {
        return Err(RenderError::Layout(format!(
            "planar RGB buffer of {} samples is too small for {pixel_count} pixels",
            samples.len()
        )));
    }
    let (red, rest) = samples.split_at(pixel_count);
    let (green, blue) = rest.split_at(pixel_count);

    let mut interleaved = Vec::with_capacity(pixel_count * 3);
    for idx in 0..pixel_count {
        interleaved.extend_from_slice(&[red[idx], green[idx], blue[idx]]);
    }
    Ok(interleaved)
}

fn value_range(values: impl Iterator<Item = f32>) -> Option<(f32, f32)> {
    values.fold(None, |range, value| match range {
        None => Some((value, value)),
        Some((min, max)) => Some((min.min(value), max.max(value))),
    })
}

fn stretch(value: f32, range: Option<(f32, f32)>) -> u8 {
    match range {
        Some((min, max)) if max > min => {
            ((value - min) / (max - min) * 255.0).clamp(0.0, 255.0).round() as u8
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, PixelData};
    use crate::test_support::sample_record;
    use dicom::core::VR;
    use dicom::dictionary_std::tags;

    fn sixteen_bit(mut record: Record, representation: u64, samples: Vec<u8>) -> Record {
        record.insert(Field::text(tags::NUMBER_OF_FRAMES, VR::IS, "1"));
        record.insert(Field::unsigned(tags::BITS_ALLOCATED, VR::US, 16));
        record.insert(Field::unsigned(tags::BITS_STORED, VR::US, 16));
        record.insert(Field::unsigned(tags::HIGH_BIT, VR::US, 15));
        record.insert(Field::unsigned(
            tags::PIXEL_REPRESENTATION,
            VR::US,
            representation,
        ));
        let shape = record.declared_shape();
        record.set_pixels(Some(PixelData {
            vr: VR::OW,
            shape,
            payload: PixelPayload::Native(samples),
        }));
        record
    }

    #[test]
    fn middle_slice_of_a_monochrome_volume() {
        let preview = SlicePreview::render_middle_slice(&sample_record()).unwrap();
        assert_eq!((preview.width, preview.height), (2, 2));
        // slice 1 of 3 holds 40, 50, 60, 70
        assert_eq!(&preview.rgba[..4], &[40, 40, 40, 255]);
        assert_eq!(&preview.rgba[12..], &[70, 70, 70, 255]);
    }

    #[test]
    fn monochrome1_is_inverted() {
        let mut record = sample_record();
        record.insert(Field::text(
            tags::PHOTOMETRIC_INTERPRETATION,
            VR::CS,
            "MONOCHROME1",
        ));
        let preview = SlicePreview::render(&record, 0).unwrap();
        assert_eq!(&preview.rgba[..4], &[255, 255, 255, 255]);
    }

    #[test]
    fn sixteen_bit_samples_are_normalized() {
        let samples: [u16; 4] = [100, 200, 300, 1100];
        let bytes = samples.iter().flat_map(|value| value.to_le_bytes()).collect();
        let record = sixteen_bit(sample_record(), 0, bytes);

        let preview = SlicePreview::render(&record, 0).unwrap();
        assert_eq!(preview.rgba[0], 0);
        assert_eq!(preview.rgba[12], 255);
    }

    #[test]
    fn signed_samples_keep_their_order() {
        let samples: [i16; 4] = [-1000, 0, 1000, 2000];
        let bytes = samples.iter().flat_map(|value| value.to_le_bytes()).collect();
        let record = sixteen_bit(sample_record(), 1, bytes);

        let preview = SlicePreview::render(&record, 0).unwrap();
        let grays: Vec<u8> = preview.rgba.chunks_exact(4).map(|pixel| pixel[0]).collect();
        assert_eq!(grays, vec![0, 85, 170, 255]);
    }

    #[test]
    fn planar_rgb_is_interleaved() {
        let mut record = sample_record();
        record.insert(Field::text(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "RGB"));
        record.insert(Field::text(tags::NUMBER_OF_FRAMES, VR::IS, "1"));
        record.insert(Field::unsigned(tags::SAMPLES_PER_PIXEL, VR::US, 3));
        record.insert(Field::unsigned(tags::PLANAR_CONFIGURATION, VR::US, 1));
        let shape = record.declared_shape();
        let planes = [[1u8, 2, 3, 4], [10, 20, 30, 40], [100, 110, 120, 130]].concat();
        record.set_pixels(Some(PixelData {
            vr: VR::OB,
            shape,
            payload: PixelPayload::Native(planes),
        }));

        let preview = SlicePreview::render(&record, 0).unwrap();
        assert_eq!(&preview.rgba[..8], &[1, 10, 100, 255, 2, 20, 110, 255]);
    }

    #[test]
    fn out_of_range_slices_are_rejected() {
        let err = SlicePreview::render(&sample_record(), 3).unwrap_err();
        assert!(matches!(
            err,
            RenderError::SliceOutOfRange {
                requested: 3,
                available: 3
            }
        ));
    }

    #[test]
    fn oversized_geometry_is_an_error() {
        let mut record = sample_record();
        record.insert(Field::text(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "RGB"));
        record.insert(Field::text(tags::NUMBER_OF_FRAMES, VR::IS, "4000000000"));
        record.insert(Field::unsigned(tags::ROWS, VR::US, 65535));
        record.insert(Field::unsigned(tags::COLUMNS, VR::US, 65535));
        record.insert(Field::unsigned(tags::SAMPLES_PER_PIXEL, VR::US, 3));
        record.insert(Field::unsigned(tags::BITS_ALLOCATED, VR::US, 16));

        let err = SlicePreview::render_middle_slice(&record).unwrap_err();
        assert!(matches!(
            err,
            RenderError::Layout(_) | RenderError::ShortBuffer { .. }
        ));
    }

    #[test]
    fn buffer_shorter_than_declared_is_an_error() {
        let mut record = sample_record();
        record.insert(Field::unsigned(tags::ROWS, VR::US, 512));
        record.insert(Field::unsigned(tags::COLUMNS, VR::US, 512));

        let err = SlicePreview::render_middle_slice(&record).unwrap_err();
        assert!(matches!(
            err,
            RenderError::ShortBuffer {
                expected: 524_288,
                actual: 12
            }
        ));
    }

    #[test]
    fn render_does_not_touch_the_record() {
        let record = sample_record();
        let snapshot = record.clone();
        SlicePreview::render_middle_slice(&record).unwrap();
        assert_eq!(record, snapshot);
    }

    #[test]
    fn previews_save_as_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.png");
        let preview = SlicePreview::render_middle_slice(&sample_record()).unwrap();
        preview.save_png(&path).unwrap();
        assert!(path.metadata().unwrap().len() > 0);
    }
}
