use std::io::ErrorKind;
use std::path::Path;

use mlp_infer::{Error, Mlp};

/// Hand-assembled HBNN bytes for a 4 -> 2 -> 2 network.
fn hbnn_bytes(magic: &[u8; 4], layers: &[(u32, u32, &[f32], &[f32])]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(magic);
    buf.extend_from_slice(&(layers.len() as u32).to_le_bytes());
    for (rows, cols, weights, bias) in layers {
        buf.extend_from_slice(&rows.to_le_bytes());
        buf.extend_from_slice(&cols.to_le_bytes());
        for w in *weights {
            buf.extend_from_slice(&w.to_le_bytes());
        }
        buf.extend_from_slice(&(bias.len() as u32).to_le_bytes());
        for b in *bias {
            buf.extend_from_slice(&b.to_le_bytes());
        }
    }
    buf
}

const HIDDEN_W: [f32; 8] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0,
];
const HIDDEN_B: [f32; 2] = [0.0, 0.0];
const OUT_W: [f32; 4] = [2.0, 0.0, 0.0, 1.0];
const OUT_B: [f32; 2] = [0.0, 0.5];

fn well_formed() -> Vec<u8> {
    hbnn_bytes(
        b"HBNN",
        &[(2, 4, &HIDDEN_W, &HIDDEN_B), (2, 2, &OUT_W, &OUT_B)],
    )
}

fn write(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn well_formed_file_loads_and_drives_forward() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "model.bin", &well_formed());

    let mut mlp = Mlp::new(&[4, 2, 2]).unwrap();
    mlp.load(&path).unwrap();
    assert_eq!(mlp.layer(0).unwrap().weights(), &HIDDEN_W);
    assert_eq!(mlp.layer(1).unwrap().bias(), &OUT_B);

    // hidden = relu([1, 2]) = [1, 2]; logits = [2, 2.5]
    let mut out = Vec::new();
    mlp.forward(&[1.0, 2.0, 3.0, 4.0], &mut out).unwrap();
    let norm = (2.0_f32.exp() + 2.5_f32.exp()).ln();
    assert!((out[0] - (2.0 - norm)).abs() < 1e-5);
    assert!((out[1] - (2.5 - norm)).abs() < 1e-5);
    assert_eq!(mlp.classify(&[1.0, 2.0, 3.0, 4.0]).unwrap(), 1);
}

#[test]
fn altered_magic_fails_without_touching_weights() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = well_formed();
    bytes[..4].copy_from_slice(b"NNBH");
    let path = write(dir.path(), "model.bin", &bytes);

    let mut mlp = Mlp::new(&[4, 2, 2]).unwrap();
    let err = mlp.load(&path).unwrap_err();
    assert!(matches!(err, Error::InvalidFormat(_)), "{err}");
    assert!(mlp.layers().iter().all(|l| l.weights().iter().all(|&w| w == 0.0)));
}

#[test]
fn mismatched_second_layer_rolls_back_the_first() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = hbnn_bytes(
        b"HBNN",
        &[(2, 4, &HIDDEN_W, &HIDDEN_B), (3, 2, &[0.0; 6], &[0.0; 3])],
    );
    let path = write(dir.path(), "model.bin", &bytes);

    let mut mlp = Mlp::new(&[4, 2, 2]).unwrap();
    let good = write(dir.path(), "good.bin", &well_formed());
    mlp.load(&good).unwrap();
    let before = mlp.clone();

    let err = mlp.load(&path).unwrap_err();
    assert!(matches!(err, Error::InvalidFormat(_)), "{err}");
    assert_eq!(before.layers(), mlp.layers());
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut mlp = Mlp::new(&[4, 2, 2]).unwrap();
    match mlp.load(dir.path().join("absent.bin")) {
        Err(Error::Io(e)) => assert_eq!(e.kind(), ErrorKind::NotFound),
        other => panic!("expected io error, got {other:?}"),
    }
}

#[test]
fn empty_file_is_a_short_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "empty.bin", &[]);
    let mut mlp = Mlp::new(&[4, 2, 2]).unwrap();
    match mlp.load(&path) {
        Err(Error::Io(e)) => assert_eq!(e.kind(), ErrorKind::UnexpectedEof),
        other => panic!("expected io error, got {other:?}"),
    }
}

#[test]
fn save_then_load_is_bit_exact() {
    let dir = tempfile::tempdir().unwrap();
    let src_path = write(dir.path(), "src.bin", &well_formed());
    let mut src = Mlp::new(&[4, 2, 2]).unwrap();
    src.load(&src_path).unwrap();

    let copy_path = dir.path().join("copy.bin");
    src.save(&copy_path).unwrap();
    assert_eq!(std::fs::read(&copy_path).unwrap(), well_formed());

    let mut dst = Mlp::new(&[4, 2, 2]).unwrap();
    dst.load(&copy_path).unwrap();
    assert_eq!(src.layers(), dst.layers());
}
