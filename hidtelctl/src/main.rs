use anyhow::Result;

mod async_hid_impl;
mod cli;
mod rdesc;

#[tokio::main]
async fn main() -> Result<()> {
    cli::execute().await
}
