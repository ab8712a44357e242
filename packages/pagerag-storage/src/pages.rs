use sqlx::{PgExecutor, Postgres, QueryBuilder};

use crate::{
	Result,
	models::{DocumentPage, DocumentPageRow},
	vector,
};

const PAGE_COLUMNS: &str = "\
SELECT
\tid,
\tfile_hash,
\tsource_file,
\tpage,
\tcompany_name,
\tdoc_type,
\tfiscal_year,
\tfiscal_quarter,
\tcontent,
\tembedding::text AS embedding
FROM document_pages
WHERE ";

/// Metadata equality constraints plus an optional keyword disjunction over page content.
///
/// Absent fields impose no constraint; an empty predicate matches every page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PagePredicate {
	pub company_name: Option<String>,
	pub doc_type: Option<String>,
	pub fiscal_year: Option<i32>,
	pub fiscal_quarter: Option<String>,
	pub keywords: Vec<String>,
}
impl PagePredicate {
	pub fn is_unconstrained(&self) -> bool {
		self.company_name.is_none()
			&& self.doc_type.is_none()
			&& self.fiscal_year.is_none()
			&& self.fiscal_quarter.is_none()
			&& self.keywords().next().is_none()
	}

	/// Evaluates the predicate in memory with the same semantics as the SQL rendering.
	pub fn matches(&self, page: &DocumentPage) -> bool {
		if self.company_name.is_some() && self.company_name != page.company_name {
			return false;
		}
		if self.doc_type.is_some() && self.doc_type != page.doc_type {
			return false;
		}
		if self.fiscal_year.is_some() && self.fiscal_year != page.fiscal_year {
			return false;
		}
		if self.fiscal_quarter.is_some() && self.fiscal_quarter != page.fiscal_quarter {
			return false;
		}

		let mut keywords = self.keywords().peekable();

		if keywords.peek().is_none() {
			return true;
		}

		let content = page.content.to_lowercase();

		keywords.any(|kw| content.contains(&kw.to_lowercase()))
	}

	fn keywords(&self) -> impl Iterator<Item = &str> {
		self.keywords.iter().map(|kw| kw.trim()).filter(|kw| !kw.is_empty())
	}

	fn push_sql(&self, builder: &mut QueryBuilder<'_, Postgres>) {
		let mut clauses = 0;
		let mut and = |builder: &mut QueryBuilder<'_, Postgres>| {
			if clauses > 0 {
				builder.push(" AND ");
			}

			clauses += 1;
		};

		if let Some(company_name) = &self.company_name {
			and(builder);
			builder.push("company_name = ").push_bind(company_name.clone());
		}
		if let Some(doc_type) = &self.doc_type {
			and(builder);
			builder.push("doc_type = ").push_bind(doc_type.clone());
		}
		if let Some(fiscal_year) = self.fiscal_year {
			and(builder);
			builder.push("fiscal_year = ").push_bind(fiscal_year);
		}
		if let Some(fiscal_quarter) = &self.fiscal_quarter {
			and(builder);
			builder.push("fiscal_quarter = ").push_bind(fiscal_quarter.clone());
		}

		let keywords = self.keywords().collect::<Vec<_>>();

		if !keywords.is_empty() {
			and(builder);
			builder.push("(");

			for (i, kw) in keywords.into_iter().enumerate() {
				if i > 0 {
					builder.push(" OR ");
				}

				builder.push("content ILIKE ").push_bind(format!("%{}%", escape_like(kw)));
			}

			builder.push(")");
		}
		if clauses == 0 {
			builder.push("TRUE");
		}
	}
}

/// Returns up to `limit` pages matching `predicate`, nearest first by cosine distance.
pub async fn nearest<'e, E>(
	executor: E,
	query_vec: &[f32],
	predicate: &PagePredicate,
	limit: i64,
) -> Result<Vec<DocumentPage>>
where
	E: PgExecutor<'e>,
{
	let mut builder = nearest_query(query_vec, predicate, limit);
	let rows: Vec<DocumentPageRow> = builder.build_query_as().fetch_all(executor).await?;

	rows.into_iter().map(DocumentPage::try_from).collect()
}

pub async fn insert_page<'e, E>(executor: E, page: &DocumentPage) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO document_pages (
\tid,
\tfile_hash,
\tsource_file,
\tpage,
\tcompany_name,
\tdoc_type,
\tfiscal_year,
\tfiscal_quarter,
\tcontent,
\tembedding
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10::text::vector)
ON CONFLICT (file_hash, page) DO NOTHING",
	)
	.bind(page.id)
	.bind(page.file_hash.as_str())
	.bind(page.source_file.as_str())
	.bind(page.page)
	.bind(page.company_name.as_deref())
	.bind(page.doc_type.as_deref())
	.bind(page.fiscal_year)
	.bind(page.fiscal_quarter.as_deref())
	.bind(page.content.as_str())
	.bind(vector::to_pg(&page.embedding))
	.execute(executor)
	.await?;

	Ok(())
}

fn nearest_query(
	query_vec: &[f32],
	predicate: &PagePredicate,
	limit: i64,
) -> QueryBuilder<'static, Postgres> {
	let mut builder = QueryBuilder::new(PAGE_COLUMNS);

	predicate.push_sql(&mut builder);
	builder.push("\nORDER BY embedding <=> ");
	builder.push_bind(vector::to_pg(query_vec));
	builder.push("::text::vector ASC\nLIMIT ");
	builder.push_bind(limit);

	builder
}

fn escape_like(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());

	for ch in raw.chars() {
		if matches!(ch, '%' | '_' | '\\') {
			out.push('\\');
		}

		out.push(ch);
	}

	out
}
