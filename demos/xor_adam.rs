use ferrite_grad::{Activation, Dense, Graph, LossType, Matrix, Optimizer, Result};

fn main() -> Result<()> {
    let mut graph = Graph::new();

    let x = graph.from_slice(&[0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0], 4, 2)?;
    let y = graph.from_slice(&[0.0, 1.0, 1.0, 0.0], 4, 1)?;

    let hidden = Dense::from_matrices(
        &mut graph,
        Matrix::from_vec(2, 2, vec![0.15, -0.61, -0.26, 0.35])?,
        Matrix::from_vec(1, 2, vec![-0.25, 0.68])?,
        Activation::Tanh,
    )?;
    let output = Dense::from_matrices(
        &mut graph,
        Matrix::from_vec(2, 1, vec![-0.45, 0.96])?,
        Matrix::from_vec(1, 1, vec![0.78])?,
        Activation::Identity,
    )?;

    let mut optimizer = Optimizer::adam(0.03);
    optimizer.add_params(&graph, &hidden.params());
    optimizer.add_params(&graph, &output.params());

    let epochs = 250;
    let mark = graph.checkpoint();
    let mut last_loss = 0.0;
    for i in 0..epochs {
        let h = hidden.forward(&mut graph, x)?;
        let pred = output.forward(&mut graph, h)?;
        let loss = LossType::MeanSquared.apply(&mut graph, pred, y)?;

        last_loss = graph.item(loss)?;
        println!("{i}:{last_loss:.6}");

        graph.backward(loss)?;
        optimizer.step(&mut graph);
        optimizer.zero_grad(&mut graph);
        graph.rewind(mark);
    }

    let h = hidden.forward(&mut graph, x)?;
    let pred = output.forward(&mut graph, h)?;
    let predicted: Vec<&str> = graph
        .value(pred)
        .data
        .iter()
        .map(|&p| if p >= 0.5 { "1" } else { "0" })
        .collect();

    println!("--------------------");
    println!("Final loss: {last_loss:.6}");
    println!("Final prediction: [{}]", predicted.join(" "));
    println!("Expected predictions: [0 1 1 0]");
    Ok(())
}
