//! Save a small model as HBNN, load it into a fresh topology and classify.
//!
//! cargo run --example classify

use mlp_infer::{InferConfig, Kernel, Layer, Mlp};

fn main() -> mlp_infer::Result<()> {
    // 2 -> 3 -> 2: the hidden layer passes both inputs through plus their mean,
    // the output layer scores each input against that mean.
    let trained = Mlp::from_layers(vec![
        Layer::from_parts(
            2,
            3,
            vec![1.0, 0.0, 0.0, 1.0, 0.5, 0.5],
            vec![0.0, 0.0, 0.0],
        )?,
        Layer::from_parts(3, 2, vec![2.0, 0.0, -1.0, 0.0, 2.0, -1.0], vec![0.0, 0.0])?,
    ])?;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("classify.bin");
    trained.save(&path)?;

    let mut mlp = Mlp::new(&[2, 3, 2])?
        .with_config(InferConfig::default().with_kernel(Kernel::Lanes))?;
    mlp.load(&path)?;

    let samples = [0.9, 0.1, 0.2, 0.8, 0.6, 0.4];
    let mut classes = Vec::new();
    mlp.classify_batch(3, &samples, &mut classes)?;

    let mut log_probs = Vec::new();
    mlp.forward_batch(3, &samples, &mut log_probs)?;
    for (k, (x, lp)) in samples.chunks(2).zip(log_probs.chunks(2)).enumerate() {
        println!(
            "sample {k} {x:?} -> class {} (p = {:.3}, {:.3})",
            classes[k],
            lp[0].exp(),
            lp[1].exp()
        );
    }
    assert_eq!(classes, vec![0, 1, 0]);
    Ok(())
}
