//! Image to feature vector conversion.
//! This is the only per-record transform in the pipeline: decode, resize to
//! 128x128, grayscale, and flatten to a vector of intensities in [0, 1].

use image::imageops::FilterType;
use log::warn;
use ndarray::Array1;

use crate::error::Result;
use crate::models::{Example, IndexedRecord};
use crate::session::Session;

pub const TARGET_WIDTH: u32 = 128;
pub const TARGET_HEIGHT: u32 = 128;
pub const FEATURE_VECTOR_LENGTH: usize = (TARGET_WIDTH * TARGET_HEIGHT) as usize;

// Averages over the source area when downscaling.
const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// The feature vector used for any image that fails to decode.
pub fn empty_features() -> Array1<f64>
{
	Array1::zeros(FEATURE_VECTOR_LENGTH)
}

/// Decodes `bytes` and converts the image into a row-major vector of
/// FEATURE_VECTOR_LENGTH grayscale intensities, each divided by 255.
/// Returns the decode error instead of degrading; see `image_to_features()`.
pub fn try_image_to_features(bytes: &[u8]) -> Result<Array1<f64>>
{
	let img = image::load_from_memory(bytes)?;

	// Aspect ratio is not preserved.
	let resized = img.resize_exact(TARGET_WIDTH, TARGET_HEIGHT, RESIZE_FILTER);

	// A single luma channel, so one sample per pixel. into_raw() is already row-major.
	let gray = resized.to_luma8();
	let features = gray
		.into_raw()
		.into_iter()
		.map(|intensity| (intensity as f64) / 255.)
		.collect::<Array1<f64>>();

	Ok(features)
}

/// Total version of `try_image_to_features()`.
/// Bytes that cannot be decoded (empty, truncated beyond repair, not an image)
/// produce a vector of zeros of the usual length, so one bad file never aborts a run.
pub fn image_to_features(bytes: &[u8]) -> Array1<f64>
{
	try_image_to_features(bytes).unwrap_or_else(|_| empty_features())
}

/// Converts every record into an `Example` in parallel on the session's pool.
/// Returns the examples (in input order) and the number of records that failed to decode.
pub fn extract_features(session: &Session, records: Vec<IndexedRecord>) -> (Vec<Example>, usize)
{
	let results = session.map(records, |indexed| {
		let (features, degraded) = match try_image_to_features(&indexed.record.content) {
			Ok(features) => (features, false),
			Err(e) => {
				warn!("Unable to decode {:?}, using an empty feature vector: {}", indexed.record.path, e);
				(empty_features(), true)
			}
		};
		let example = Example
		{
			id: indexed.record.id,
			path: indexed.record.path,
			label: indexed.label,
			features,
		};
		(example, degraded)
	});

	let degraded_count = results.iter().filter(|(_, degraded)| *degraded).count();
	let examples = results.into_iter().map(|(example, _)| example).collect();
	(examples, degraded_count)
}

#[cfg(test)]
mod tests
{
	use std::io::Cursor;

	use approx::assert_abs_diff_eq;
	use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
	use uuid::Uuid;

	use super::*;
	use crate::models::ImageRecord;

	fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8>
	{
		let mut bytes = Cursor::new(Vec::new());
		image.write_to(&mut bytes, format).unwrap();
		bytes.into_inner()
	}

	fn solid_gray(width: u32, height: u32, value: u8, format: ImageFormat) -> Vec<u8>
	{
		encode(DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([value]))), format)
	}

	#[test]
	fn empty_bytes_produce_zero_vector()
	{
		let features = image_to_features(&[]);
		assert_eq!(features.len(), FEATURE_VECTOR_LENGTH);
		assert!(features.iter().all(|&v| v == 0.0));
	}

	#[test]
	fn garbage_bytes_produce_zero_vector()
	{
		let garbage: Vec<u8> = (0..4096).map(|i| (i * 31 % 251) as u8).collect();
		let features = image_to_features(&garbage);
		assert_eq!(features, empty_features());
		assert!(try_image_to_features(&garbage).is_err());
	}

	#[test]
	fn truncated_image_keeps_shape_and_range()
	{
		let bytes = solid_gray(300, 200, 180, ImageFormat::Jpeg);
		let truncated = &bytes[..bytes.len() / 3];
		let features = image_to_features(truncated);
		assert_eq!(features.len(), FEATURE_VECTOR_LENGTH);
		assert!(features.iter().all(|&v| (0.0..=1.0).contains(&v)));
	}

	#[test]
	fn white_images_of_any_size_are_all_ones()
	{
		for (width, height) in [(1, 1), (64, 32), (128, 128), (517, 301)] {
			let features = image_to_features(&solid_gray(width, height, 255, ImageFormat::Png));
			assert_eq!(features.len(), FEATURE_VECTOR_LENGTH);
			for v in features.iter() {
				assert_abs_diff_eq!(*v, 1.0, epsilon = 1e-9);
			}
		}
	}

	#[test]
	fn black_images_are_all_zeros()
	{
		for (width, height) in [(3, 7), (256, 256)] {
			let features = image_to_features(&solid_gray(width, height, 0, ImageFormat::Png));
			assert!(features.iter().all(|&v| v == 0.0));
		}
	}

	#[test]
	fn jpeg_white_is_close_to_one()
	{
		let features = image_to_features(&solid_gray(640, 480, 255, ImageFormat::Jpeg));
		assert!(features.iter().all(|&v| v > 0.98 && v <= 1.0));
	}

	#[test]
	fn color_input_is_reduced_to_one_channel()
	{
		let image = RgbImage::from_pixel(50, 50, Rgb([255, 255, 255]));
		let features = image_to_features(&encode(DynamicImage::ImageRgb8(image), ImageFormat::Png));
		assert_eq!(features.len(), FEATURE_VECTOR_LENGTH);
		assert!(features.iter().all(|&v| (v - 1.0).abs() < 1e-9));
	}

	#[test]
	fn features_are_row_major()
	{
		// Top half white, bottom half black, at the target resolution so no filtering happens.
		let image = GrayImage::from_fn(TARGET_WIDTH, TARGET_HEIGHT, |_, y| {
			if y < TARGET_HEIGHT / 2 { Luma([255]) } else { Luma([0]) }
		});
		let features = image_to_features(&encode(DynamicImage::ImageLuma8(image), ImageFormat::Png));
		let half = FEATURE_VECTOR_LENGTH / 2;
		assert!(features.iter().take(half).all(|&v| v == 1.0));
		assert!(features.iter().skip(half).all(|&v| v == 0.0));
	}

	#[test]
	fn extraction_is_deterministic()
	{
		let image = GrayImage::from_fn(333, 211, |x, y| Luma([((x * 7 + y * 13) % 256) as u8]));
		let bytes = encode(DynamicImage::ImageLuma8(image), ImageFormat::Jpeg);
		let first = image_to_features(&bytes);
		let second = image_to_features(&bytes);
		assert_eq!(first.len(), FEATURE_VECTOR_LENGTH);
		assert!(first.iter().zip(second.iter()).all(|(a, b)| a.to_bits() == b.to_bits()));
		assert!(first.iter().all(|&v| (0.0..=1.0).contains(&v)));
	}

	#[test]
	fn extract_features_counts_degraded_records()
	{
		let session = Session::builder().num_threads(2).build().unwrap();
		let record = |content: Vec<u8>, label: usize| IndexedRecord
		{
			record: ImageRecord { id: Uuid::new_v4(), path: format!("/data/{}.jpeg", label), content },
			label_string: String::new(),
			label,
		};
		let records = vec![
			record(solid_gray(20, 20, 255, ImageFormat::Png), 0),
			record(b"not an image".to_vec(), 1),
			record(solid_gray(20, 20, 0, ImageFormat::Png), 2),
		];

		let (examples, degraded) = extract_features(&session, records);

		assert_eq!(degraded, 1);
		assert_eq!(examples.iter().map(|e| e.label).collect::<Vec<_>>(), vec![0, 1, 2]);
		assert!(examples[0].features.iter().all(|&v| v == 1.0));
		assert_eq!(examples[1].features, empty_features());
		assert_eq!(examples[1].path, "/data/1.jpeg");
	}
}
