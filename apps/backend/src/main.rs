#[tokio::main]
async fn main() -> anyhow::Result<()> {
    marginalia_backend::run().await
}
