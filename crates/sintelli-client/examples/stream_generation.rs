//! Streams one generation to stdout.
//!
//! ```text
//! SINTELLI_API_KEY=... cargo run -p sintelli-client --example stream_generation -- "prompt"
//! ```
use std::io::Write as _;
use std::time::Duration;

use futures::StreamExt as _;
use sintelli_client::observability::init_tracing;
use sintelli_client::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Write a haiku about rivers".to_string());
    let model = std::env::var("SINTELLI_MODEL_ID").unwrap_or_else(|_| "sintelli/chat@latest".into());

    let client = Client::from_env()?;
    let mut stream = client
        .generation(prompt)
        .model_id(model)
        .timeout(Duration::from_secs(60))
        .stream();

    let abort = stream.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort.abort();
        }
    });

    let mut stdout = std::io::stdout();
    while let Some(item) = stream.next().await {
        match item? {
            GenerationEvent::Session { session_id } => eprintln!("[session {session_id}]"),
            GenerationEvent::Data { delta, .. } => {
                if let Some(text) = delta.text {
                    write!(stdout, "{text}")?;
                    stdout.flush()?;
                }
            }
            GenerationEvent::Billing { cost, cost_per_mtk } => {
                eprintln!("\n[cost {cost} at {cost_per_mtk}/Mtok]");
            }
        }
    }
    Ok(())
}
