use anyhow::Result;
use candle_core::Tensor;
use candle_nn::Optimizer;
use rand::rngs::StdRng;
use rand::Rng;

use crate::datasets::GraphBatch;
use crate::models::GraphRegressor;

/// Mean absolute error between score and target tensors.
pub fn mae(scores: &Tensor, targets: &Tensor) -> Result<f64> {
    Ok((scores - targets)?.abs()?.mean_all()?.to_scalar::<f32>()? as f64)
}

/// One optimizer pass over the loader. Returns (epoch loss, epoch MAE),
/// both averaged over batches.
pub fn train_epoch<O: Optimizer>(
    model: &dyn GraphRegressor,
    optimizer: &mut O,
    loader: &[GraphBatch],
    rng: &mut StdRng,
) -> Result<(f64, f64)> {
    let mut epoch_loss = 0.0;
    let mut epoch_mae = 0.0;
    for batch in loader {
        // positional encodings are an explicit optional input; when present
        // their sign is randomized per feature dimension each step
        let flipped;
        let batch = if let Some(pos_enc) = &batch.pos_enc {
            flipped = GraphBatch {
                pos_enc: Some(sign_flip(pos_enc, rng)?),
                ..batch.clone()
            };
            &flipped
        } else {
            batch
        };
        let scores = model.forward_t(batch, true)?;
        let loss = model.loss(&scores, &batch.ys)?;
        optimizer.backward_step(&loss)?;
        epoch_loss += loss.to_scalar::<f32>()? as f64;
        epoch_mae += mae(&scores, &batch.ys)?;
    }
    let num_batches = loader.len().max(1) as f64;
    Ok((epoch_loss / num_batches, epoch_mae / num_batches))
}

/// Evaluation pass, no parameter updates and no sign flips.
pub fn evaluate(model: &dyn GraphRegressor, loader: &[GraphBatch]) -> Result<(f64, f64)> {
    let mut epoch_loss = 0.0;
    let mut epoch_mae = 0.0;
    for batch in loader {
        let scores = model.forward_t(batch, false)?;
        let loss = model.loss(&scores, &batch.ys)?;
        epoch_loss += loss.to_scalar::<f32>()? as f64;
        epoch_mae += mae(&scores, &batch.ys)?;
    }
    let num_batches = loader.len().max(1) as f64;
    Ok((epoch_loss / num_batches, epoch_mae / num_batches))
}

fn sign_flip(pos_enc: &Tensor, rng: &mut StdRng) -> Result<Tensor> {
    let (_, dim) = pos_enc.dims2()?;
    let flips: Vec<f32> = (0..dim)
        .map(|_| if rng.gen_bool(0.5) { 1.0 } else { -1.0 })
        .collect();
    let sign = Tensor::from_vec(flips, (1, dim), pos_enc.device())?;
    Ok(pos_enc.broadcast_mul(&sign)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::{AdamW, ParamsAdamW, VarBuilder, VarMap};
    use rand::SeedableRng;

    use crate::datasets::{collate, Graph};
    use crate::models::{gnn_model, NetParams};

    fn toy_loader() -> Vec<GraphBatch> {
        let device = Device::Cpu;
        let graph = Graph {
            num_nodes: 3,
            edges: vec![(0, 1), (1, 0), (1, 2), (2, 1)],
            node_feat: Tensor::ones((3, 4), DType::F32, &device).unwrap(),
            edge_feat: Tensor::ones((4, 1), DType::F32, &device).unwrap(),
            edge_weight: Some(Tensor::full(1.5f32, (4, 1), &device).unwrap()),
        };
        vec![collate(&[(&graph, 1.0), (&graph, 2.0)], &device).unwrap()]
    }

    #[test]
    fn one_epoch_updates_and_reports_finite_metrics() {
        let varmap = VarMap::new();
        let vs = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let model = gnn_model("UnionSNN", NetParams::new(4), vs).unwrap();
        let mut optimizer = AdamW::new(
            varmap.all_vars(),
            ParamsAdamW {
                lr: 1e-3,
                ..Default::default()
            },
        )
        .unwrap();
        let loader = toy_loader();
        let mut rng = StdRng::seed_from_u64(0);
        let (loss, train_mae) =
            train_epoch(model.as_ref(), &mut optimizer, &loader, &mut rng).unwrap();
        assert!(loss.is_finite());
        assert!(train_mae.is_finite());
        let (val_loss, val_mae) = evaluate(model.as_ref(), &loader).unwrap();
        assert!(val_loss.is_finite());
        assert!(val_mae.is_finite());
    }
}
