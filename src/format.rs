//! HBNN model files.
//!
//! A compact little-endian layout holding the weights of an [`Mlp`] whose
//! topology is already known:
//!
//! ```text
//! "HBNN"                      4 bytes, not NUL-terminated
//! layer_count                 u32
//! per layer:
//!   rows (out_features)       u32
//!   cols (in_features)        u32
//!   weights                   rows * cols f32, row-major
//!   bias_len                  u32 (must equal rows)
//!   bias                      bias_len f32
//! ```
//!
//! Design notes:
//! - The file never defines topology. Every declared shape must match the
//!   layers of the `Mlp` it is loaded into.
//! - Loading is all-or-nothing: blocks are staged and validated before any
//!   layer is overwritten, so a rejected file leaves the model untouched.
//! - Short reads surface as [`Error::Io`] (`UnexpectedEof`), separate from
//!   [`Error::InvalidFormat`].

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use log::{debug, info, warn};

use crate::{Error, Mlp, Result};

pub const MAGIC: [u8; 4] = *b"HBNN";

/// Validated parameters for one layer, not yet committed.
struct StagedLayer {
    weights: Vec<f32>,
    bias: Vec<f32>,
}

impl Mlp {
    /// Load weights from an HBNN file into this network.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::open(path)?;
        self.load_from_reader(BufReader::new(file))?;
        info!(
            "loaded {} layers from {}",
            self.num_layers(),
            path.display()
        );
        Ok(())
    }

    /// Load weights from any byte stream in HBNN layout.
    pub fn load_from_reader<R: Read>(&mut self, mut reader: R) -> Result<()> {
        let staged = self.stage(&mut reader)?;

        if has_trailing_bytes(&mut reader) {
            warn!("ignoring trailing bytes after the last HBNN layer");
        }

        for (layer, block) in self.layers_mut().iter_mut().zip(staged) {
            layer.set_parameters(block.weights, block.bias)?;
        }
        Ok(())
    }

    fn stage<R: Read>(&self, reader: &mut R) -> Result<Vec<StagedLayer>> {
        let mut magic = [0_u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(Error::InvalidFormat(format!(
                "bad magic {magic:?}; expected {MAGIC:?} (\"HBNN\")"
            )));
        }

        let layer_count = read_u32(reader)? as usize;
        if layer_count != self.num_layers() {
            return Err(Error::InvalidFormat(format!(
                "file declares {layer_count} layers, model has {}",
                self.num_layers()
            )));
        }

        let mut staged = Vec::with_capacity(layer_count);
        for (idx, layer) in self.layers().iter().enumerate() {
            let (out_features, in_features) = layer.shape();

            let rows = read_u32(reader)? as usize;
            let cols = read_u32(reader)? as usize;
            if (rows, cols) != (out_features, in_features) {
                return Err(Error::InvalidFormat(format!(
                    "layer {idx} weight shape ({rows}, {cols}) does not match \
                     model ({out_features}, {in_features})"
                )));
            }
            let weights = read_f32s(reader, rows * cols)?;

            let bias_len = read_u32(reader)? as usize;
            if bias_len != out_features {
                return Err(Error::InvalidFormat(format!(
                    "layer {idx} bias length {bias_len} does not match out_features {out_features}"
                )));
            }
            let bias = read_f32s(reader, bias_len)?;

            debug!("staged layer {idx}: {rows}x{cols} weights, {bias_len} biases");
            staged.push(StagedLayer { weights, bias });
        }
        Ok(staged)
    }

    /// Save this network's weights as an HBNN file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Write this network's weights in HBNN layout.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&MAGIC)?;
        write_u32(&mut writer, self.num_layers())?;
        for layer in self.layers() {
            let (rows, cols) = layer.shape();
            write_u32(&mut writer, rows)?;
            write_u32(&mut writer, cols)?;
            write_f32s(&mut writer, layer.weights())?;
            write_u32(&mut writer, layer.bias().len())?;
            write_f32s(&mut writer, layer.bias())?;
        }
        Ok(())
    }
}

/// Every block is already validated here, so a failing read only loses the
/// trailing-data warning.
fn has_trailing_bytes<R: Read>(reader: &mut R) -> bool {
    let mut byte = [0_u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(read) => return read > 0,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("could not check for trailing bytes after the last HBNN layer: {e}");
                return false;
            }
        }
    }
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0_u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_f32s<R: Read>(reader: &mut R, len: usize) -> Result<Vec<f32>> {
    let mut bytes = vec![0_u8; len * 4];
    reader.read_exact(&mut bytes)?;
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn write_u32<W: Write>(writer: &mut W, value: usize) -> Result<()> {
    let value = u32::try_from(value).map_err(|_| {
        Error::InvalidData(format!("{value} does not fit the u32 HBNN header field"))
    })?;
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_f32s<W: Write>(writer: &mut W, values: &[f32]) -> Result<()> {
    for v in values {
        writer.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Layer;

    fn model() -> Mlp {
        Mlp::from_layers(vec![
            Layer::from_parts(3, 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![0.1, 0.2]).unwrap(),
            Layer::from_parts(2, 2, vec![7.0, 8.0, 9.0, 10.0], vec![0.3, 0.4]).unwrap(),
        ])
        .unwrap()
    }

    fn bytes_of(mlp: &Mlp) -> Vec<u8> {
        let mut buf = Vec::new();
        mlp.write_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn writes_the_documented_layout() {
        let buf = bytes_of(&model());
        assert_eq!(&buf[..4], b"HBNN");
        assert_eq!(u32::from_le_bytes(buf[4..8].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(buf[8..12].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(buf[12..16].try_into().unwrap()), 3);
        assert_eq!(f32::from_le_bytes(buf[16..20].try_into().unwrap()), 1.0);
        // header + per layer (rows, cols, weights, bias_len, bias)
        assert_eq!(buf.len(), 8 + (12 + 24 + 8) + (12 + 16 + 8));
    }

    #[test]
    fn loads_into_matching_topology() {
        let src = model();
        let mut dst = Mlp::new(&[3, 2, 2]).unwrap();
        dst.load_from_reader(bytes_of(&src).as_slice()).unwrap();
        for (a, b) in src.layers().iter().zip(dst.layers()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = bytes_of(&model());
        buf[3] = b'M';
        let mut dst = Mlp::new(&[3, 2, 2]).unwrap();
        let err = dst.load_from_reader(buf.as_slice()).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)), "{err}");
    }

    #[test]
    fn rejects_layer_count_mismatch() {
        let buf = bytes_of(&model());
        let mut dst = Mlp::new(&[3, 2, 2, 2]).unwrap();
        let err = dst.load_from_reader(buf.as_slice()).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)), "{err}");
    }

    #[test]
    fn late_shape_mismatch_leaves_every_layer_untouched() {
        // First layer matches, second does not.
        let buf = bytes_of(&model());
        let mut dst = Mlp::new(&[3, 2, 3]).unwrap();
        let before = dst.clone();
        let err = dst.load_from_reader(buf.as_slice()).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)), "{err}");
        for (a, b) in before.layers().iter().zip(dst.layers()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn rejects_bias_length_mismatch() {
        let mut buf = bytes_of(&model());
        // bias_len of the first layer sits after header(8) + rows/cols(8) + weights(24).
        buf[40..44].copy_from_slice(&0_u32.to_le_bytes());
        let mut dst = Mlp::new(&[3, 2, 2]).unwrap();
        let err = dst.load_from_reader(buf.as_slice()).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)), "{err}");
    }

    #[test]
    fn truncated_file_is_an_io_error() {
        let buf = bytes_of(&model());
        let mut dst = Mlp::new(&[3, 2, 2]).unwrap();
        let before = dst.clone();
        let err = dst.load_from_reader(&buf[..buf.len() - 2]).unwrap_err();
        match err {
            Error::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("expected io error, got {other}"),
        }
        assert_eq!(before.layers(), dst.layers());
    }

    #[test]
    fn trailing_bytes_are_tolerated() {
        let mut buf = bytes_of(&model());
        buf.extend_from_slice(&[0xAB; 5]);
        let mut dst = Mlp::new(&[3, 2, 2]).unwrap();
        dst.load_from_reader(buf.as_slice()).unwrap();
        assert_eq!(dst.layers(), model().layers());
    }

    /// Serves `data`, then fails each read with the queued error kinds.
    struct FailingTail<'a> {
        data: &'a [u8],
        errors: Vec<std::io::ErrorKind>,
    }

    impl Read for FailingTail<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.data.is_empty() {
                return self.data.read(buf);
            }
            match self.errors.pop() {
                Some(kind) => Err(kind.into()),
                None => Ok(0),
            }
        }
    }

    #[test]
    fn read_errors_after_the_last_layer_do_not_fail_the_load() {
        let buf = bytes_of(&model());
        for errors in [
            vec![std::io::ErrorKind::Interrupted],
            vec![std::io::ErrorKind::Other, std::io::ErrorKind::Interrupted],
            vec![std::io::ErrorKind::ConnectionReset],
        ] {
            let mut dst = Mlp::new(&[3, 2, 2]).unwrap();
            let reader = FailingTail {
                data: &buf,
                errors,
            };
            dst.load_from_reader(reader).unwrap();
            assert_eq!(dst.layers(), model().layers());
        }
    }
}
