//! BM25Plus keyword reranking over heading-delimited page text.

use std::collections::HashMap;

use regex::Regex;

use pagerag_storage::models::DocumentPage;

use crate::search::ranking::cmp_f32_desc;

const HEADING_PATTERN: &str = r"^#+\s+";
const K1: f32 = 1.5;
const B: f32 = 0.75;
const DELTA: f32 = 1.0;

/// Reorders `docs` by BM25Plus score against `keywords` and keeps the best `k`.
///
/// Empty `docs` or `keywords` come back untouched and untruncated. Equal scores keep their input
/// order.
pub fn rerank(docs: Vec<DocumentPage>, keywords: &[String], k: usize) -> Vec<DocumentPage> {
	if docs.is_empty() || keywords.is_empty() {
		return docs;
	}

	let heading = Regex::new(HEADING_PATTERN).ok();
	let corpus = docs
		.iter()
		.map(|doc| document_tokens(&doc.content, heading.as_ref()))
		.collect::<Vec<_>>();
	let scores = Bm25Plus::new(&corpus).scores(&query_tokens(keywords));
	let mut order = (0..docs.len()).collect::<Vec<_>>();

	order.sort_by(|&a, &b| cmp_f32_desc(scores[a], scores[b]));

	let mut slots = docs.into_iter().map(Some).collect::<Vec<_>>();

	order.into_iter().take(k).filter_map(|index| slots[index].take()).collect()
}

/// Pairs every Markdown heading section with the section that follows it.
///
/// Sections are separated by blank lines. Sections that are neither a heading nor the body right
/// after one are dropped.
pub fn heading_chunks(text: &str, heading: Option<&Regex>) -> Vec<String> {
	let Some(heading) = heading else { return Vec::new() };
	let sections = text.split("\n\n").map(str::trim).collect::<Vec<_>>();
	let mut chunks = Vec::new();
	let mut i = 0;

	while i < sections.len() {
		let section = sections[i];

		if !heading.is_match(section) {
			i += 1;

			continue;
		}

		match sections.get(i + 1) {
			Some(body) => {
				chunks.push(format!("{section}\n\n{body}"));

				i += 2;
			},
			None => {
				chunks.push(section.to_string());

				i += 1;
			},
		}
	}

	chunks
}

fn document_tokens(content: &str, heading: Option<&Regex>) -> Vec<String> {
	let chunks = heading_chunks(content, heading);
	let text = if chunks.is_empty() { content.to_string() } else { chunks.join(" ") };

	text.to_lowercase().split_whitespace().map(str::to_string).collect()
}

fn query_tokens(keywords: &[String]) -> Vec<String> {
	keywords.join(" ").to_lowercase().split_whitespace().map(str::to_string).collect()
}

struct Bm25Plus {
	doc_freqs: Vec<HashMap<String, u32>>,
	doc_lens: Vec<f32>,
	avgdl: f32,
	idf: HashMap<String, f32>,
}
impl Bm25Plus {
	fn new(corpus: &[Vec<String>]) -> Self {
		let mut doc_freqs = Vec::with_capacity(corpus.len());
		let mut doc_lens = Vec::with_capacity(corpus.len());
		let mut df: HashMap<String, u32> = HashMap::new();

		for tokens in corpus {
			let mut freqs: HashMap<String, u32> = HashMap::new();

			for token in tokens {
				*freqs.entry(token.clone()).or_default() += 1;
			}
			for token in freqs.keys() {
				*df.entry(token.clone()).or_default() += 1;
			}

			doc_lens.push(tokens.len() as f32);
			doc_freqs.push(freqs);
		}

		let n = corpus.len() as f32;
		let avgdl = if corpus.is_empty() { 0.0 } else { doc_lens.iter().sum::<f32>() / n };
		let idf =
			df.into_iter().map(|(token, freq)| (token, ((n + 1.0) / freq as f32).ln())).collect();

		Self { doc_freqs, doc_lens, avgdl, idf }
	}

	fn scores(&self, query: &[String]) -> Vec<f32> {
		let mut scores = vec![0.0_f32; self.doc_freqs.len()];

		for token in query {
			// Terms absent from the corpus carry no weight.
			let Some(&idf) = self.idf.get(token) else { continue };

			for (i, freqs) in self.doc_freqs.iter().enumerate() {
				let tf = freqs.get(token).copied().unwrap_or(0) as f32;
				let len_norm = if self.avgdl > 0.0 { self.doc_lens[i] / self.avgdl } else { 0.0 };

				scores[i] += idf * (DELTA + tf * (K1 + 1.0) / (K1 * (1.0 - B + B * len_norm) + tf));
			}
		}

		scores
	}
}

#[cfg(test)]
mod tests {
	use uuid::Uuid;

	use super::*;

	fn page(content: &str) -> DocumentPage {
		DocumentPage {
			id: Uuid::new_v4(),
			file_hash: "hash".to_string(),
			source_file: "filing.pdf".to_string(),
			page: 1,
			company_name: None,
			doc_type: None,
			fiscal_year: None,
			fiscal_quarter: None,
			content: content.to_string(),
			embedding: Vec::new(),
		}
	}

	fn contents(docs: &[DocumentPage]) -> Vec<&str> {
		docs.iter().map(|doc| doc.content.as_str()).collect()
	}

	fn keywords(items: &[&str]) -> Vec<String> {
		items.iter().map(|item| item.to_string()).collect()
	}

	#[test]
	fn pairs_headings_with_following_section() {
		let heading = Regex::new(HEADING_PATTERN).ok();
		let text = "Cover page\n\n## Net sales\n\nTotal net sales rose.\n\nFootnote\n\n# Outlook";

		assert_eq!(
			heading_chunks(text, heading.as_ref()),
			vec!["## Net sales\n\nTotal net sales rose.".to_string(), "# Outlook".to_string()]
		);
		assert!(heading_chunks("#hashtag is not a heading", heading.as_ref()).is_empty());
	}

	#[test]
	fn empty_keywords_return_input_untruncated() {
		let docs = vec![page("a"), page("b"), page("c")];
		let out = rerank(docs, &[], 1);

		assert_eq!(contents(&out), vec!["a", "b", "c"]);
	}

	#[test]
	fn ranks_matching_pages_first_and_truncates() {
		let docs = vec![
			page("Risk factors and forward looking statements."),
			page("## Consolidated Statements of Operations\n\nNet revenue grew. Revenue was strong."),
			page("Revenue recognition policy."),
		];
		let out = rerank(docs, &keywords(&["revenue", "net revenue"]), 2);

		assert_eq!(out.len(), 2);
		assert!(out[0].content.starts_with("## Consolidated"));
		assert_eq!(out[1].content, "Revenue recognition policy.");
	}

	#[test]
	fn headings_restrict_scored_text() {
		// The keyword sits outside any heading section on the second page, so it does not count.
		let docs = vec![
			page("## Balance sheet\n\nTotal assets.\n\nStray text\n\ncash flow mention"),
			page("## Cash flow\n\nCash flow from operations."),
		];
		let out = rerank(docs, &keywords(&["cash"]), 2);

		assert!(out[0].content.starts_with("## Cash flow"));
	}

	#[test]
	fn ties_keep_input_order() {
		let docs = vec![page("alpha"), page("beta"), page("gamma")];
		let out = rerank(docs, &keywords(&["unseen"]), 3);

		assert_eq!(contents(&out), vec!["alpha", "beta", "gamma"]);
	}

	#[test]
	fn reranking_is_idempotent() {
		let docs = vec![
			page("operating income rose"),
			page("net income and operating income"),
			page("nothing relevant"),
			page("income"),
		];
		let kws = keywords(&["operating income", "net income"]);
		let once = rerank(docs, &kws, 3);
		let first = contents(&once).into_iter().map(str::to_string).collect::<Vec<_>>();
		let twice = rerank(once, &kws, 3);

		assert_eq!(contents(&twice), first);
	}

	#[test]
	fn bm25_plus_floor_keeps_partial_matches_positive() {
		let corpus = vec![
			vec!["revenue".to_string(), "growth".to_string()],
			vec!["assets".to_string()],
		];
		let scores = Bm25Plus::new(&corpus).scores(&["revenue".to_string(), "assets".to_string()]);

		assert!(scores[0] > 0.0);
		assert!(scores[1] > 0.0);

		// idf = ln(3/1); tf = 0 still earns idf * delta.
		let idf = 3.0_f32.ln();
		let assets_tf = 2.5 / (1.5 * (1.0 - 0.75 + 0.75 * (1.0 / 1.5)) + 1.0);
		let expected = idf * DELTA + idf * (DELTA + assets_tf);

		assert!((scores[1] - expected).abs() < 1e-5);
	}
}
