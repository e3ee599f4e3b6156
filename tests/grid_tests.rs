//! Grid composition and reply-layout tests for the image pipeline.

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use tokio_txt2img_relay::core::engine::{GenerateRequest, ImagePipeline, TextToImage, compose_grid};

/// Engine returning a fixed set of images on every full pass.
struct FixedEngine {
    images: Vec<RgbImage>,
}

#[async_trait]
impl TextToImage for FixedEngine {
    async fn generate(
        &self,
        _prompt: &str,
        request: &GenerateRequest,
    ) -> anyhow::Result<Vec<RgbImage>> {
        if request.is_warmup() {
            return Ok(vec![tile(8, [0, 0, 0])]);
        }
        Ok(self.images.clone())
    }
}

fn tile(size: u32, color: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(size, size, Rgb(color))
}

fn pipeline(images: Vec<RgbImage>, four_images: bool) -> ImagePipeline {
    ImagePipeline::new(Box::new(FixedEngine { images }), four_images)
}

#[test]
fn test_marker_tiles_land_at_documented_offsets() {
    let markers = [[255u8, 0, 0], [0, 255, 0], [0, 0, 255], [255, 255, 0]];
    let tiles: Vec<RgbImage> = markers.iter().map(|&c| tile(16, c)).collect();

    let canvas = compose_grid(&tiles).unwrap();

    assert_eq!(canvas.dimensions(), (32, 32));
    // Row-major generation order: (0,0), (W,0), (0,H), (W,H).
    assert_eq!(canvas.get_pixel(0, 0), &Rgb(markers[0]));
    assert_eq!(canvas.get_pixel(16, 0), &Rgb(markers[1]));
    assert_eq!(canvas.get_pixel(0, 16), &Rgb(markers[2]));
    assert_eq!(canvas.get_pixel(16, 16), &Rgb(markers[3]));
    // Interior of each quadrant, not just the corner pixel.
    assert_eq!(canvas.get_pixel(15, 15), &Rgb(markers[0]));
    assert_eq!(canvas.get_pixel(31, 31), &Rgb(markers[3]));
}

#[tokio::test]
async fn test_four_red_tiles_composite_into_solid_red_canvas() {
    let red = [255u8, 0, 0];
    let pipeline = pipeline(vec![tile(512, red); 4], true);

    let png = pipeline.generate("a red cat").await.unwrap();
    let canvas = image::load_from_memory(&png).unwrap().to_rgb8();

    assert_eq!(canvas.dimensions(), (1024, 1024));
    for (x, y) in [(0, 0), (1023, 0), (0, 1023), (1023, 1023), (512, 512)] {
        assert_eq!(canvas.get_pixel(x, y), &Rgb(red), "pixel at ({x},{y})");
    }
}

#[tokio::test]
async fn test_grid_mode_fails_with_three_images() {
    let pipeline = pipeline(vec![tile(16, [9, 9, 9]); 3], true);
    assert!(pipeline.generate("a red cat").await.is_err());
}

#[tokio::test]
async fn test_single_image_mode_returns_one_tile_as_png() {
    let blue = [0u8, 0, 255];
    let pipeline = pipeline(vec![tile(16, blue)], false);

    let png = pipeline.generate("a blue square").await.unwrap();
    let decoded = image::load_from_memory(&png).unwrap().to_rgb8();

    assert_eq!(decoded.dimensions(), (16, 16));
    assert_eq!(decoded.get_pixel(8, 8), &Rgb(blue));
}

#[tokio::test]
async fn test_single_image_mode_fails_when_engine_returns_nothing() {
    let pipeline = pipeline(Vec::new(), false);
    assert!(pipeline.generate("a blue square").await.is_err());
}
