use ferrite_grad::{Activation, Dense, Graph, LossType, Matrix, Optimizer, Result};

fn main() -> Result<()> {
    let mut graph = Graph::new();

    let x = graph.from_slice(&[0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0], 4, 2)?;
    let y = graph.from_slice(&[0.0, 1.0, 1.0, 0.0], 4, 1)?;

    let hidden = Dense::from_matrices(
        &mut graph,
        Matrix::from_vec(2, 2, vec![0.15, -0.61, -0.26, 0.35])?,
        Matrix::from_vec(1, 2, vec![-0.25, 0.68])?,
        Activation::ReLU,
    )?;
    let output = Dense::from_matrices(
        &mut graph,
        Matrix::from_vec(2, 1, vec![-0.45, 0.96])?,
        Matrix::from_vec(1, 1, vec![0.78])?,
        Activation::Identity,
    )?;

    let mut optimizer = Optimizer::sgd(0.01);
    optimizer.add_params(&graph, &hidden.params());
    optimizer.add_params(&graph, &output.params());

    let epochs = 32;
    let mark = graph.checkpoint();
    for i in 0..epochs {
        let h = hidden.forward(&mut graph, x)?;
        let pred = output.forward(&mut graph, h)?;
        let loss = LossType::SumSquared.apply(&mut graph, pred, y)?;

        println!("{i}:{:.6}", graph.item(loss)?);

        graph.backward(loss)?;
        optimizer.step(&mut graph);
        optimizer.zero_grad(&mut graph);
        graph.rewind(mark);
    }
    Ok(())
}
