use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::Result;

/// Returns rendered search snippets, or an empty string when the provider is unconfigured or the
/// request fails for any reason.
pub async fn search(cfg: &pagerag_config::WebSearchProviderConfig, query: &str) -> String {
	if !cfg.is_configured() {
		tracing::warn!("Web search endpoint or API key is missing, skipping web search.");

		return String::new();
	}

	match fetch(cfg, query).await {
		Ok(json) => {
			let rendered = render_results(&json, cfg.max_results as usize);

			tracing::info!(chars = rendered.len(), "Web search finished.");

			rendered
		},
		Err(err) => {
			tracing::warn!(error = %err, "Web search request failed.");

			String::new()
		},
	}
}

async fn fetch(cfg: &pagerag_config::WebSearchProviderConfig, query: &str) -> Result<Value> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let body = serde_json::json!({
		"query": query,
		"search_depth": cfg.search_depth,
		"max_results": cfg.max_results,
	});
	let res = client
		.post(&cfg.endpoint)
		.headers(crate::auth_headers(&cfg.api_key, &serde_json::Map::new())?)
		.json(&body)
		.send()
		.await?;

	Ok(res.error_for_status()?.json().await?)
}

/// Renders `results[]` as `- title\ncontent\nurl` blocks separated by blank lines.
pub fn render_results(json: &Value, max_results: usize) -> String {
	let Some(results) = json.get("results").and_then(|v| v.as_array()) else {
		return String::new();
	};
	let mut blocks = Vec::new();

	for item in results.iter().take(max_results) {
		let field = |name: &str| item.get(name).and_then(|v| v.as_str()).unwrap_or_default().trim();
		let title = field("title");
		let content = field("content");
		let url = field("url");

		if title.is_empty() && content.is_empty() {
			continue;
		}

		blocks.push(format!("- {title}\n{content}\n{url}").trim().to_string());
	}

	blocks.join("\n\n")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn renders_titles_content_and_urls() {
		let json = serde_json::json!({
			"results": [
				{ "title": "Apple 10-K", "content": "Net sales rose.", "url": "https://example.com/a" },
				{ "title": "", "content": "", "url": "https://example.com/empty" },
				{ "title": "Press release", "content": "Q3 results.", "url": "" }
			]
		});

		assert_eq!(
			render_results(&json, 3),
			"- Apple 10-K\nNet sales rose.\nhttps://example.com/a\n\n- Press release\nQ3 results."
		);
	}

	#[test]
	fn respects_max_results() {
		let json = serde_json::json!({
			"results": [
				{ "title": "one", "content": "a" },
				{ "title": "two", "content": "b" }
			]
		});

		assert_eq!(render_results(&json, 1), "- one\na");
	}

	#[test]
	fn missing_results_render_empty() {
		assert_eq!(render_results(&serde_json::json!({ "error": "quota" }), 3), "");
	}

	#[tokio::test]
	async fn unconfigured_search_returns_empty() {
		let cfg = pagerag_config::WebSearchProviderConfig::default();

		assert_eq!(search(&cfg, "apple revenue").await, "");
	}
}
