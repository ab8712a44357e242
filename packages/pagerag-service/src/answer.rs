use std::time::Instant;

use pagerag_storage::models::DocumentPage;

use crate::{PageRagService, oracle};

pub const WEB_SEARCH_TAG: &str = "[WEB_SEARCH]";

/// Renders retrieved pages for grading and synthesis. No pages render as an empty string.
pub fn format_documents(docs: &[DocumentPage]) -> String {
	let mut lines = Vec::with_capacity(docs.len() * 12);

	for (i, doc) in docs.iter().enumerate() {
		lines.push(format!("--- Document {} ---", i + 1));
		lines.push(format!("company_name: {}", or_none(doc.company_name.as_deref())));
		lines.push(format!("doc_type: {}", or_none(doc.doc_type.as_deref())));
		lines.push(format!(
			"fiscal_year: {}",
			doc.fiscal_year.map(|year| year.to_string()).unwrap_or_else(|| "None".to_string())
		));
		lines.push(format!("fiscal_quarter: {}", or_none(doc.fiscal_quarter.as_deref())));
		lines.push(format!("page: {}", doc.page));
		lines.push(format!("source_file: {}", doc.source_file));
		lines.push(format!("file_hash: {}", doc.file_hash));
		lines.push(String::new());
		lines.push("Content:".to_string());
		lines.push(doc.content.clone());
		lines.push(String::new());
	}

	lines.join("\n")
}

/// Joins retrieved text and web snippets into one context block. Either side may be empty.
pub fn compose_context_block(retrieved: &str, web: &str) -> String {
	match (retrieved.is_empty(), web.is_empty()) {
		(_, true) => retrieved.to_string(),
		(true, false) => format!("{WEB_SEARCH_TAG}\n{web}"),
		(false, false) => format!("{retrieved}\n\n{WEB_SEARCH_TAG}\n{web}"),
	}
}

fn or_none(value: Option<&str>) -> &str {
	value.unwrap_or("None")
}

fn system_prompt(language: &str) -> String {
	format!(
		"You are a financial analyst. Answer strictly from the provided documents.\n\
Requirements:\n\
- Answer in {language}.\n\
- Use Markdown.\n\
- Use tables for comparisons.\n\
- If the documents do not contain the data, say so plainly."
	)
}

impl PageRagService {
	/// Answers the original question over the joined context. Never fails: an empty completion or
	/// an unavailable model yields the configured fallback message.
	pub async fn synthesize(&self, query: &str, context: &str) -> String {
		let started = Instant::now();
		let cfg = &self.cfg.providers.llm;
		let messages = oracle::chat_messages(
			&system_prompt(&self.cfg.answer.language),
			&format!("Question: {query}\n\nDocuments:\n{context}"),
		);

		tracing::debug!(context_chars = context.len(), "Synthesizing answer.");

		match self.providers.llm.complete_text(cfg, &messages, cfg.answer_temperature).await {
			Ok(answer) if !answer.trim().is_empty() => {
				tracing::info!(
					answer_chars = answer.len(),
					elapsed_ms = started.elapsed().as_millis() as u64,
					"Answer generated."
				);

				answer
			},
			Ok(_) => {
				tracing::warn!("Language model returned an empty answer.");

				self.cfg.answer.empty_answer_message.clone()
			},
			Err(err) => {
				tracing::warn!(error = %err, "Answer synthesis failed.");

				self.cfg.answer.empty_answer_message.clone()
			},
		}
	}
}
