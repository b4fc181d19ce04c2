//! MNIST dataset in IDX format.
//!
//! The inference core only needs flat, row-major, `[0, 1]`-normalized feature
//! buffers. This module produces them from the four IDX files of the MNIST
//! distribution:
//!
//! - images: big-endian `magic=2051, count, rows, cols`, then `count*rows*cols`
//!   `u8` pixels (normalized by `/255`)
//! - labels: big-endian `magic=2049, count`, then `count` `u8` labels

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use log::debug;

use crate::{Error, Result};

pub const IMAGE_MAGIC: u32 = 2051;
pub const LABEL_MAGIC: u32 = 2049;

/// Which half of the distribution to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    fn prefix(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "t10k",
        }
    }

    pub fn images_file(self) -> String {
        format!("{}-images-idx3-ubyte", self.prefix())
    }

    pub fn labels_file(self) -> String {
        format!("{}-labels-idx1-ubyte", self.prefix())
    }
}

/// Normalized images stored contiguously, one row per sample.
#[derive(Debug, Clone)]
pub struct Images {
    pixels: Vec<f32>,
    len: usize,
    rows: usize,
    cols: usize,
}

impl Images {
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `(rows, cols)` of a single image.
    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Features per sample (`rows * cols`).
    #[inline]
    pub fn features(&self) -> usize {
        self.rows * self.cols
    }

    /// Flat `(len, features)` row-major buffer.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.pixels
    }

    /// Single image as a `features`-long row.
    #[inline]
    pub fn image(&self, idx: usize) -> &[f32] {
        let f = self.features();
        &self.pixels[idx * f..(idx + 1) * f]
    }
}

/// One split of the dataset: images plus parallel labels.
#[derive(Debug, Clone)]
pub struct Mnist {
    pub images: Images,
    pub labels: Vec<u8>,
}

impl Mnist {
    /// Read `split` from a directory holding the raw IDX files.
    pub fn load<P: AsRef<Path>>(dir: P, split: Split) -> Result<Self> {
        let dir = dir.as_ref();
        let images = read_images(BufReader::new(File::open(dir.join(split.images_file()))?))?;
        let labels = read_labels(BufReader::new(File::open(dir.join(split.labels_file()))?))?;

        if images.len() != labels.len() {
            return Err(Error::InvalidData(format!(
                "{split:?} split has {} images but {} labels",
                images.len(),
                labels.len()
            )));
        }
        debug!(
            "read {split:?} split: {} samples of {}x{}",
            images.len(),
            images.rows,
            images.cols
        );
        Ok(Self { images, labels })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Parse an IDX3 image stream.
pub fn read_images<R: Read>(mut reader: R) -> Result<Images> {
    expect_magic(&mut reader, IMAGE_MAGIC, "image")?;
    let len = read_be_u32(&mut reader)? as usize;
    let rows = read_be_u32(&mut reader)? as usize;
    let cols = read_be_u32(&mut reader)? as usize;

    let total = len
        .checked_mul(rows)
        .and_then(|v| v.checked_mul(cols))
        .ok_or_else(|| {
            Error::InvalidFormat(format!("image header {len}x{rows}x{cols} overflows usize"))
        })?;

    let raw = read_payload(&mut reader, total)?;
    let pixels = raw.into_iter().map(|p| f32::from(p) / 255.0).collect();

    Ok(Images {
        pixels,
        len,
        rows,
        cols,
    })
}

/// Parse an IDX1 label stream.
pub fn read_labels<R: Read>(mut reader: R) -> Result<Vec<u8>> {
    expect_magic(&mut reader, LABEL_MAGIC, "label")?;
    let len = read_be_u32(&mut reader)? as usize;
    read_payload(&mut reader, len)
}

/// Read exactly `len` bytes. The buffer grows with the data actually read, so
/// a header that overstates the payload fails as a short read.
fn read_payload<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut raw = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut raw)?;
    if raw.len() != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("IDX payload ended after {} of {len} bytes", raw.len()),
        )
        .into());
    }
    Ok(raw)
}

fn expect_magic<R: Read>(reader: &mut R, expected: u32, kind: &str) -> Result<()> {
    let magic = read_be_u32(reader)?;
    if magic != expected {
        return Err(Error::InvalidFormat(format!(
            "bad {kind} file magic {magic}; expected {expected}"
        )));
    }
    Ok(())
}

fn read_be_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0_u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}
