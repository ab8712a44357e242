use uuid::Uuid;

use pagerag_config::Postgres;
use pagerag_storage::{
	db::Db,
	models::DocumentPage,
	pages::{self, PagePredicate},
};
use pagerag_testkit::TestDatabase;

const VECTOR_DIM: u32 = 3;

fn page(number: i32, company: &str, content: &str, embedding: [f32; 3]) -> DocumentPage {
	DocumentPage {
		id: Uuid::new_v4(),
		file_hash: format!("hash-{company}"),
		source_file: format!("{company}_10q_2024_q3.pdf"),
		page: number,
		company_name: Some(company.to_string()),
		doc_type: Some("10-q".to_string()),
		fiscal_year: Some(2024),
		fiscal_quarter: Some("q3".to_string()),
		content: content.to_string(),
		embedding: embedding.to_vec(),
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PAGERAG_PG_DSN to run."]
async fn schema_bootstrap_is_idempotent() {
	let Some(base_dsn) = pagerag_testkit::env_dsn() else {
		eprintln!("Skipping schema_bootstrap_is_idempotent; set PAGERAG_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 1, vector_dim: VECTOR_DIM };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema(VECTOR_DIM).await.expect("Failed to ensure schema.");
	db.ensure_schema(VECTOR_DIM).await.expect("Failed to re-run schema.");

	let count: i64 = sqlx::query_scalar(
		"SELECT count(*) FROM information_schema.tables WHERE table_name = 'document_pages'",
	)
	.fetch_one(&db.pool)
	.await
	.expect("Failed to query schema tables.");

	assert_eq!(count, 1);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PAGERAG_PG_DSN to run."]
async fn nearest_filters_and_orders_by_cosine_distance() {
	let Some(base_dsn) = pagerag_testkit::env_dsn() else {
		eprintln!("Skipping nearest_filters_and_orders_by_cosine_distance; set PAGERAG_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 1, vector_dim: VECTOR_DIM };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema(VECTOR_DIM).await.expect("Failed to ensure schema.");

	let near = page(1, "amazon", "## Net sales\n\nTotal net sales increased 11%.", [1.0, 0.0, 0.0]);
	let far = page(2, "amazon", "Net sales by segment.", [0.0, 1.0, 0.0]);
	let other = page(1, "apple", "Net sales by category.", [1.0, 0.0, 0.0]);
	let unrelated = page(3, "amazon", "Risk factors.", [1.0, 0.1, 0.0]);

	for row in [&near, &far, &other, &unrelated] {
		pages::insert_page(&db.pool, row).await.expect("Failed to insert page.");
	}

	let predicate = PagePredicate {
		company_name: Some("amazon".to_string()),
		keywords: vec!["NET SALES".to_string()],
		..Default::default()
	};
	let found = pages::nearest(&db.pool, &[1.0, 0.0, 0.0], &predicate, 10)
		.await
		.expect("Failed to query nearest pages.");
	let ids = found.iter().map(|p| p.id).collect::<Vec<_>>();

	assert_eq!(ids, vec![near.id, far.id]);
	assert_eq!(found[0].embedding, vec![1.0, 0.0, 0.0]);

	let none = pages::nearest(
		&db.pool,
		&[1.0, 0.0, 0.0],
		&PagePredicate { company_name: Some("tesla".to_string()), ..Default::default() },
		10,
	)
	.await
	.expect("Failed to query nearest pages.");

	assert!(none.is_empty());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
