//! Example of driving runlink-core directly from Rust against the in-memory
//! engine: one run with a config, five logged steps, then finish.

use std::sync::Arc;

use runlink_core::{with_config, with_run_name, KeyValueMap, RecordingEngine, Session, Value};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_target(false)
        .compact()
        .init();

    // 1. A session over the engine. Setup happens on the first run.
    let engine = Arc::new(RecordingEngine::new());
    let session = Session::new(engine.clone());

    // 2. Create the run with its config
    let config = KeyValueMap::from_pairs([
        ("param1", Value::Int(4)),
        ("param2", Value::Double(4.2)),
        ("param3", Value::from("x")),
    ])?;
    let mut run = session.init_run([with_config(config), with_run_name("rust_logging")])?;
    println!("Started run with handle {}", run.handle());

    // 3. Log a few steps
    for i in 0..5 {
        let mut step = KeyValueMap::new();
        step.insert("val", (i as f64 * 0.1).sin())?;
        step.insert("cat", "dog")?;
        run.log(&step)?;
    }

    // 4. Finish, then tear the engine down
    run.finish()?;
    session.shutdown();

    println!("Engine received {} calls:", engine.calls().len());
    for call in engine.calls() {
        println!("  {}", serde_json::to_string(&call)?);
    }
    Ok(())
}
