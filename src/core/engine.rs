//! Text-to-image pipeline: warm-up, reply layout, grid compositing.

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use image::{ImageFormat, RgbImage};
use log::error;
use std::io::Cursor;

/// Generated images are square at this edge length.
pub const IMAGE_SIZE: u32 = 512;

/// Number of variations composited in grid mode.
const GRID_IMAGES: u32 = 4;

/// Parameters for one engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub width: u32,
    pub height: u32,
    /// Inference step count; `None` lets the engine use its default.
    pub steps: Option<u32>,
    /// How many variations of the prompt to render in this invocation.
    pub count: u32,
}

impl GenerateRequest {
    /// A minimal single-step pass whose output is thrown away.
    pub fn warmup() -> Self {
        GenerateRequest {
            width: IMAGE_SIZE,
            height: IMAGE_SIZE,
            steps: Some(1),
            count: 1,
        }
    }

    pub fn full(count: u32) -> Self {
        GenerateRequest {
            width: IMAGE_SIZE,
            height: IMAGE_SIZE,
            steps: None,
            count,
        }
    }

    pub fn is_warmup(&self) -> bool {
        self.steps == Some(1)
    }
}

/// The generation engine seam. Implemented by the diffusion sidecar client in
/// infrastructure and by mocks in tests. Invocations are slow (seconds) and
/// strictly serial per instance.
#[async_trait]
pub trait TextToImage: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        request: &GenerateRequest,
    ) -> anyhow::Result<Vec<RgbImage>>;
}

/// Engine adapter owning the reply-image layout.
///
/// Every call runs a discarded 1-step warm-up pass first; the underlying
/// engine produces degraded output on its first real invocation otherwise.
pub struct ImagePipeline {
    engine: Box<dyn TextToImage>,
    four_images: bool,
}

impl ImagePipeline {
    pub fn new(engine: Box<dyn TextToImage>, four_images: bool) -> Self {
        ImagePipeline {
            engine,
            four_images,
        }
    }

    /// Renders the prompt and returns PNG bytes: a single square image, or in
    /// grid mode four variations composited onto one 2x2 canvas.
    pub async fn generate(&self, prompt: &str) -> anyhow::Result<Vec<u8>> {
        let prompt = prompt.trim();

        // Warm-up pass; output discarded, errors still count as failure.
        self.engine
            .generate(prompt, &GenerateRequest::warmup())
            .await
            .context("warm-up pass failed")?;

        if self.four_images {
            self.txt2img_four(prompt).await
        } else {
            self.txt2img_one(prompt).await
        }
    }

    async fn txt2img_one(&self, prompt: &str) -> anyhow::Result<Vec<u8>> {
        let images = self.engine.generate(prompt, &GenerateRequest::full(1)).await?;
        let image = images
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("engine returned no image"))?;
        encode_png(&image)
    }

    async fn txt2img_four(&self, prompt: &str) -> anyhow::Result<Vec<u8>> {
        let images = self
            .engine
            .generate(prompt, &GenerateRequest::full(GRID_IMAGES))
            .await?;
        let canvas = compose_grid(&images).inspect_err(|_| {
            error!(
                "txt2img_four failed, not enough images, images.len={}",
                images.len()
            )
        })?;
        encode_png(&canvas)
    }
}

/// Tiles the first four images onto a 2x2 canvas, row-major in generation
/// order. Offsets derive from the first tile's dimensions. Fails when fewer
/// than four tiles are given.
pub fn compose_grid(tiles: &[RgbImage]) -> anyhow::Result<RgbImage> {
    if tiles.len() < GRID_IMAGES as usize {
        return Err(anyhow!(
            "expected {GRID_IMAGES} tiles, got {}",
            tiles.len()
        ));
    }
    let (width, height) = tiles[0].dimensions();
    let mut canvas = RgbImage::new(width * 2, height * 2);
    for (i, tile) in tiles.iter().take(GRID_IMAGES as usize).enumerate() {
        let x = (i as u32 % 2) * width;
        let y = (i as u32 / 2) * height;
        image::imageops::replace(&mut canvas, tile, i64::from(x), i64::from(y));
    }
    Ok(canvas)
}

/// Lossless re-encode to PNG.
pub fn encode_png(image: &RgbImage) -> anyhow::Result<Vec<u8>> {
    let mut content = Cursor::new(Vec::new());
    image
        .write_to(&mut content, ImageFormat::Png)
        .context("failed to encode PNG")?;
    Ok(content.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(size: u32, color: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(size, size, Rgb(color))
    }

    #[test]
    fn test_compose_grid_places_tiles_row_major() {
        let tiles = vec![
            solid(8, [255, 0, 0]),
            solid(8, [0, 255, 0]),
            solid(8, [0, 0, 255]),
            solid(8, [255, 255, 0]),
        ];

        let canvas = compose_grid(&tiles).unwrap();

        assert_eq!(canvas.dimensions(), (16, 16));
        assert_eq!(canvas.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(canvas.get_pixel(8, 0), &Rgb([0, 255, 0]));
        assert_eq!(canvas.get_pixel(0, 8), &Rgb([0, 0, 255]));
        assert_eq!(canvas.get_pixel(8, 8), &Rgb([255, 255, 0]));
    }

    #[test]
    fn test_compose_grid_rejects_short_tile_sets() {
        assert!(compose_grid(&[]).is_err());

        let three = vec![solid(8, [1, 1, 1]), solid(8, [2, 2, 2]), solid(8, [3, 3, 3])];
        assert!(compose_grid(&three).is_err());
    }

    #[test]
    fn test_encode_png_round_trips() {
        let image = solid(4, [7, 8, 9]);

        let png = encode_png(&image).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();

        assert_eq!(decoded.dimensions(), (4, 4));
        assert_eq!(decoded.get_pixel(3, 3), &Rgb([7, 8, 9]));
    }

    #[test]
    fn test_warmup_request_is_single_step() {
        let request = GenerateRequest::warmup();
        assert!(request.is_warmup());
        assert_eq!(request.count, 1);
        assert_eq!((request.width, request.height), (IMAGE_SIZE, IMAGE_SIZE));
    }

    #[test]
    fn test_full_request_uses_engine_default_steps() {
        let request = GenerateRequest::full(4);
        assert!(!request.is_warmup());
        assert_eq!(request.steps, None);
        assert_eq!(request.count, 4);
    }
}
