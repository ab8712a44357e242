use std::sync::Arc;

use pagerag_service::PageRagService;
use pagerag_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<PageRagService>,
}
impl AppState {
	pub async fn new(config: pagerag_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema(config.storage.postgres.vector_dim).await?;

		Ok(Self::from_service(PageRagService::new(config, db)))
	}

	pub fn from_service(service: PageRagService) -> Self {
		Self { service: Arc::new(service) }
	}
}
