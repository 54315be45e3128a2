use ferrite_checkpoint::{checkpoint, ArchitectureDescriptor, CheckpointError, Network};

fn main() -> Result<(), CheckpointError> {
    env_logger::init();

    let descriptor = ArchitectureDescriptor::new(784, 10, vec![512, 256, 128]);
    let network = Network::seeded(descriptor.clone(), 2024)?;

    println!("Network architecture:");
    println!("  Input:   {} features", descriptor.input_size);
    for (i, width) in descriptor.hidden_sizes.iter().enumerate() {
        println!("  Hidden{}: {} neurons (ReLU)", i + 1, width);
    }
    println!("  Output:  {} classes (log-softmax)", descriptor.output_size);
    if let Some(count) = descriptor.parameter_count() {
        println!("  Parameters: {count}");
    }

    let dir = std::env::temp_dir().join("ferrite-checkpoint-demo");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("classifier.fnnc");

    network.save(&path)?;
    println!("\nSaved checkpoint to {}", path.display());

    let restored = checkpoint::rehydrate_file(&path)?;
    let input: Vec<f32> = (0..784).map(|i| ((i * 31) % 255) as f32 / 255.0).collect();
    let before = network.predict(&input)?;
    let after = restored.predict(&input)?;
    println!("Predictions identical after reload: {}", before == after);

    // Same weights, narrower architecture: rehydration must refuse.
    let narrow = ArchitectureDescriptor::new(784, 10, vec![400, 200, 100]);
    let foreign = Network::seeded(narrow, 7)?.parameters();
    let bytes = checkpoint::encode(&descriptor, &foreign)?;
    match checkpoint::rehydrate(&bytes) {
        Err(CheckpointError::ShapeMismatch { mismatches }) => {
            println!("\nIncompatible checkpoint rejected ({} keys):", mismatches.len());
            for m in &mismatches {
                println!("  {m}");
            }
        }
        Err(e) => println!("\nIncompatible checkpoint rejected: {e}"),
        Ok(_) => println!("\nIncompatible checkpoint was accepted?!"),
    }

    Ok(())
}
