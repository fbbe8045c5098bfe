#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bacportal::run().await
}
