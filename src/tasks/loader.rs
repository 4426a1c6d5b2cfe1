use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use image::imageops::{self, FilterType};
use tokio::select;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::events::{DecodedTexture, MipLevel, TextureBatch};

// Decodes an image to RGBA8 and builds a box-filtered mip chain down to 1x1.
// Rows stay in file order (top row first); nothing is flipped.
pub fn decode_texture(path: &Path) -> Result<DecodedTexture> {
    let img = image::ImageReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .with_guessed_format()?
        .decode()
        .with_context(|| format!("failed to decode {}", path.display()))?
        .to_rgba8();

    let (width, height) = img.dimensions();
    let mut mips = Vec::new();
    let mut level = img;
    loop {
        let (w, h) = level.dimensions();
        let next = (w > 1 || h > 1).then(|| {
            imageops::resize(&level, (w / 2).max(1), (h / 2).max(1), FilterType::Triangle)
        });
        mips.push(MipLevel {
            width: w,
            height: h,
            pixels: level.into_raw(),
        });
        match next {
            Some(next) => level = next,
            None => break,
        }
    }

    Ok(DecodedTexture {
        source: path.to_path_buf(),
        width,
        height,
        mips,
    })
}

/// Loads every source with at most `max_in_flight` concurrent decodes.
///
/// Failed entries are logged and dropped; survivors keep their relative order.
/// Returns `None` if `cancel` fires first, in which case partial results are
/// discarded.
pub async fn load_batch(
    sources: Vec<PathBuf>,
    generation: u64,
    max_in_flight: usize,
    cancel: CancellationToken,
) -> Option<TextureBatch> {
    let max_in_flight = max_in_flight.max(1);
    let mut slots: Vec<Option<DecodedTexture>> = sources.iter().map(|_| None).collect();
    let mut queue = sources.into_iter().enumerate();
    let mut tasks: JoinSet<(usize, PathBuf, Result<DecodedTexture>)> = JoinSet::new();

    loop {
        while tasks.len() < max_in_flight {
            let Some((index, path)) = queue.next() else {
                break;
            };
            tasks.spawn(async move {
                let p = path.clone();
                let res = tokio::task::spawn_blocking(move || decode_texture(&p))
                    .await
                    .context("decode task panicked")
                    .and_then(|r| r);
                (index, path, res)
            });
        }

        select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(generation, "texture batch cancelled");
                tasks.abort_all();
                return None;
            }
            joined = tasks.join_next() => {
                match joined {
                    Some(Ok((index, path, Ok(texture)))) => {
                        debug!(path = %path.display(), width = texture.width, height = texture.height, "texture loaded");
                        slots[index] = Some(texture);
                    }
                    Some(Ok((_, path, Err(err)))) => {
                        warn!(path = %path.display(), error = ?err, "failed to load texture");
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "texture task failed");
                    }
                    None => break,
                }
            }
        }
    }

    Some(TextureBatch {
        generation,
        textures: slots.into_iter().flatten().collect(),
    })
}

/// Loads one source through [`load_batch`]; a failed decode becomes an error.
pub async fn load_single(source: PathBuf, cancel: CancellationToken) -> Result<DecodedTexture> {
    let display = source.display().to_string();
    let Some(batch) = load_batch(vec![source], 0, 1, cancel).await else {
        bail!("loading {display} was cancelled");
    };
    batch
        .textures
        .into_iter()
        .next()
        .with_context(|| format!("failed to load {display}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_halves_to_one_pixel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        image::RgbaImage::from_pixel(8, 2, image::Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let tex = decode_texture(&path).unwrap();
        assert_eq!((tex.width, tex.height), (8, 2));
        let dims: Vec<(u32, u32)> = tex.mips.iter().map(|m| (m.width, m.height)).collect();
        assert_eq!(dims, vec![(8, 2), (4, 1), (2, 1), (1, 1)]);
        assert!(
            tex.mips
                .iter()
                .all(|m| m.pixels.len() == (m.width * m.height * 4) as usize)
        );
        assert!((tex.aspect_ratio() - 4.0).abs() < f32::EPSILON);
    }

    #[test]
    fn rows_are_not_flipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.png");
        let img = image::RgbaImage::from_fn(1, 2, |_, y| {
            if y == 0 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 0, 255, 255])
            }
        });
        img.save(&path).unwrap();
        let tex = decode_texture(&path).unwrap();
        assert_eq!(&tex.mips[0].pixels[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(decode_texture(Path::new("/definitely/not/here.png")).is_err());
    }
}
