use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = pagerag_api::Args::parse();

	pagerag_api::run(args).await
}
