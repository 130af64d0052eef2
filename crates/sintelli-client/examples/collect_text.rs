//! Two-turn conversation that resumes the server session.
use sintelli_client::observability::init_tracing;
use sintelli_client::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let model = std::env::var("SINTELLI_MODEL_ID").unwrap_or_else(|_| "sintelli/chat@latest".into());
    let client = Client::from_env()?;
    let session = client.session(model);

    let first = session.send("Remember the number 7.").collect().await?;
    println!("{}", first.text());

    let second = session.send("Which number did I ask you to remember?").collect_text().await?;
    println!("{second}");
    println!("session: {:?}", session.session_id());
    Ok(())
}
