use uuid::Uuid;

use crate::{Error, Result, vector};

/// One ingested filing page. Immutable once written.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentPage {
	pub id: Uuid,
	pub file_hash: String,
	pub source_file: String,
	pub page: i32,
	pub company_name: Option<String>,
	pub doc_type: Option<String>,
	pub fiscal_year: Option<i32>,
	pub fiscal_quarter: Option<String>,
	pub content: String,
	pub embedding: Vec<f32>,
}

/// Row shape with the embedding selected as `embedding::text`.
#[derive(Debug, sqlx::FromRow)]
pub struct DocumentPageRow {
	pub id: Uuid,
	pub file_hash: String,
	pub source_file: String,
	pub page: i32,
	pub company_name: Option<String>,
	pub doc_type: Option<String>,
	pub fiscal_year: Option<i32>,
	pub fiscal_quarter: Option<String>,
	pub content: String,
	pub embedding: String,
}
impl TryFrom<DocumentPageRow> for DocumentPage {
	type Error = Error;

	fn try_from(row: DocumentPageRow) -> Result<Self> {
		let embedding = vector::parse(&row.embedding)?;

		Ok(Self {
			id: row.id,
			file_hash: row.file_hash,
			source_file: row.source_file,
			page: row.page,
			company_name: row.company_name,
			doc_type: row.doc_type,
			fiscal_year: row.fiscal_year,
			fiscal_quarter: row.fiscal_quarter,
			content: row.content,
			embedding,
		})
	}
}
