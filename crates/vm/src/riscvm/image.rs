use std::path::Path;

use thiserror::Error;

use crate::riscvm::consts::WORD_SIZE;

/// A raw little-endian RV32I program, copied verbatim to the ROM base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatImage {
    bytes: Box<[u8]>,
}

#[derive(Error, Debug)]
pub enum ImageLoadingError {
    #[error("failed to open image file")]
    FileOpen(#[from] std::io::Error),
    #[error("image is empty")]
    Empty,
    #[error("image of {size} bytes does not fit into {capacity} bytes")]
    TooLarge { size: usize, capacity: u32 },
}

impl FlatImage {
    pub fn load(path: impl AsRef<Path>) -> Result<FlatImage, ImageLoadingError> {
        let path = path.as_ref();
        tracing::trace!("loading flat image at {:?}", path);

        let bytes = std::fs::read(path)?;
        let image = FlatImage::from_bytes(bytes)?;
        if image.len() % WORD_SIZE as usize != 0 {
            tracing::warn!(
                "image size {} is not a multiple of the word size, the tail reads as zero padded",
                image.len()
            );
        }

        tracing::debug!("loaded image of {} bytes", image.len());
        Ok(image)
    }

    pub fn from_bytes(bytes: impl Into<Box<[u8]>>) -> Result<FlatImage, ImageLoadingError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(ImageLoadingError::Empty);
        }
        Ok(FlatImage { bytes })
    }

    /// Fails with [`ImageLoadingError::TooLarge`] when the image does not fit
    /// into `capacity` bytes.
    pub fn check_fits(&self, capacity: u32) -> Result<(), ImageLoadingError> {
        if self.len() > capacity as usize {
            return Err(ImageLoadingError::TooLarge {
                size: self.len(),
                capacity,
            });
        }
        Ok(())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn len(&self) -> usize {
        self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn empty_image_is_rejected() {
        assert!(matches!(
            FlatImage::from_bytes(Vec::new()),
            Err(ImageLoadingError::Empty)
        ));
    }

    #[test]
    fn bytes_are_kept_verbatim() {
        let image = FlatImage::from_bytes(vec![0x93, 0x00, 0x50, 0x00, 0x37, 0x51]).unwrap();
        assert_eq!(image.bytes(), &[0x93u8, 0x00, 0x50, 0x00, 0x37, 0x51]);
    }

    #[test]
    fn fits() {
        let image = FlatImage::from_bytes(vec![0; 16]).unwrap();
        assert!(image.check_fits(16).is_ok());
        assert!(matches!(
            image.check_fits(12),
            Err(ImageLoadingError::TooLarge {
                size: 16,
                capacity: 12
            })
        ));
    }

    #[test]
    fn missing_file() {
        let result = FlatImage::load("this/path/does/not/exist.bin");
        assert!(matches!(result, Err(ImageLoadingError::FileOpen(_))));
    }

    #[test]
    fn load_from_disk() {
        let path = std::env::temp_dir().join(format!("rnv-image-{}.bin", std::process::id()));
        std::fs::write(&path, 0x0050_0093u32.to_le_bytes()).unwrap();
        let image = FlatImage::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(image.bytes(), &0x0050_0093u32.to_le_bytes());
    }
}
