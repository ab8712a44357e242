//! Corrective retrieval controller.
//!
//! A request walks `Decompose -> Retrieve -> Grade -> {Rewrite | WebFallback | AppendContext} ->
//! AppendContext -> {Retrieve | Synthesize} -> Done`. [`transition`] is pure and owns every
//! branching decision; [`PageRagService::run_corrective`] only performs the I/O each step asks for
//! and feeds the outcome back as an [`Event`].
//!
//! Per sub-query there are at most two retrievals (the original text and one rewrite) followed by
//! at most one web search.

use std::time::Duration;

use serde::Serialize;

use crate::{
	Error, PageRagService, Result,
	answer::{self, compose_context_block},
	dump,
	planner::QueryPlanner,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
	Decompose,
	Retrieve,
	Grade,
	Rewrite,
	WebFallback,
	AppendContext,
	Synthesize,
	Done,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
	Decomposed(Vec<String>),
	Retrieved { text: String, doc_count: usize },
	Graded { is_relevant: bool },
	Rewritten(String),
	WebSearched(String),
	Advanced,
	Synthesized(String),
}
impl Event {
	fn name(&self) -> &'static str {
		match self {
			Self::Decomposed(_) => "decomposed",
			Self::Retrieved { .. } => "retrieved",
			Self::Graded { .. } => "graded",
			Self::Rewritten(_) => "rewritten",
			Self::WebSearched(_) => "web_searched",
			Self::Advanced => "advanced",
			Self::Synthesized(_) => "synthesized",
		}
	}
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SubQueryTrace {
	pub query: String,
	pub rewritten_query: Option<String>,
	pub retrieval_attempts: u32,
	pub doc_counts: Vec<usize>,
	pub is_relevant: bool,
	pub web_search_used: bool,
	pub context_appended: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct QueryTrace {
	pub sub_queries: Vec<SubQueryTrace>,
}

/// Mutable per-request retrieval state. Owned by exactly one in-flight request.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
	pub original_query: String,
	pub sub_queries: Vec<String>,
	pub index: usize,
	pub current_query: String,
	pub rewrite_attempted: bool,
	pub retrieved_text: String,
	pub web_text: String,
	pub is_relevant: bool,
	pub contexts: Vec<String>,
	pub answer: Option<String>,
	pub trace: QueryTrace,
}
impl Session {
	pub fn new(original_query: &str) -> Self {
		Self {
			original_query: original_query.to_string(),
			sub_queries: Vec::new(),
			index: 0,
			current_query: String::new(),
			rewrite_attempted: false,
			retrieved_text: String::new(),
			web_text: String::new(),
			is_relevant: false,
			contexts: Vec::new(),
			answer: None,
			trace: QueryTrace::default(),
		}
	}

	pub fn joined_context(&self) -> String {
		self.contexts.join("\n\n")
	}

	fn current_trace(&mut self) -> Option<&mut SubQueryTrace> {
		self.trace.sub_queries.last_mut()
	}

	fn start_sub_query(&mut self, index: usize) {
		let query = self.sub_queries[index].clone();

		self.index = index;
		self.current_query = query.clone();
		self.rewrite_attempted = false;
		self.retrieved_text.clear();
		self.web_text.clear();
		self.is_relevant = false;
		self.trace.sub_queries.push(SubQueryTrace { query, ..Default::default() });
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct State {
	pub step: Step,
	pub session: Session,
}
impl State {
	pub fn new(original_query: &str) -> Self {
		Self { step: Step::Decompose, session: Session::new(original_query) }
	}
}

pub fn transition(state: State, event: Event) -> Result<State> {
	let State { step, mut session } = state;
	let next = match (step, event) {
		(Step::Decompose, Event::Decomposed(queries)) => {
			let mut queries = queries
				.into_iter()
				.map(|q| q.trim().to_string())
				.filter(|q| !q.is_empty())
				.collect::<Vec<_>>();

			if queries.is_empty() {
				queries.push(session.original_query.clone());
			}

			session.sub_queries = queries;
			session.contexts.clear();
			session.start_sub_query(0);

			Step::Retrieve
		},
		(Step::Retrieve, Event::Retrieved { text, doc_count }) => {
			session.retrieved_text = text;

			if let Some(trace) = session.current_trace() {
				trace.retrieval_attempts += 1;
				trace.doc_counts.push(doc_count);
			}

			Step::Grade
		},
		(Step::Grade, Event::Graded { is_relevant }) => {
			session.is_relevant = is_relevant;

			if let Some(trace) = session.current_trace() {
				trace.is_relevant = is_relevant;
			}

			if is_relevant {
				Step::AppendContext
			} else if !session.rewrite_attempted {
				Step::Rewrite
			} else {
				Step::WebFallback
			}
		},
		(Step::Rewrite, Event::Rewritten(query)) => {
			session.current_query = query.clone();
			session.rewrite_attempted = true;

			if let Some(trace) = session.current_trace() {
				trace.rewritten_query = Some(query);
			}

			Step::Retrieve
		},
		(Step::WebFallback, Event::WebSearched(text)) => {
			session.web_text = text;

			if let Some(trace) = session.current_trace() {
				trace.web_search_used = true;
			}

			Step::AppendContext
		},
		(Step::AppendContext, Event::Advanced) => {
			let block = compose_context_block(&session.retrieved_text, &session.web_text);

			if !block.is_empty() {
				session.contexts.push(block);

				if let Some(trace) = session.current_trace() {
					trace.context_appended = true;
				}
			}

			let next_index = session.index + 1;

			if next_index < session.sub_queries.len() {
				session.start_sub_query(next_index);

				Step::Retrieve
			} else {
				session.index = next_index;
				session.current_query.clear();
				session.rewrite_attempted = false;
				session.retrieved_text.clear();
				session.web_text.clear();
				session.is_relevant = false;

				Step::Synthesize
			}
		},
		(Step::Synthesize, Event::Synthesized(answer)) => {
			session.answer = Some(answer);

			Step::Done
		},
		(step, event) => {
			return Err(Error::InvalidState {
				message: format!("Event {} is not valid in step {step:?}.", event.name()),
			});
		},
	};

	Ok(State { step: next, session })
}

impl PageRagService {
	/// Drives one question through the controller and returns the answer with its trace.
	pub async fn run_corrective(
		&self,
		query: &str,
		k: usize,
		fetch_k: usize,
	) -> Result<(String, QueryTrace)> {
		let planner = self.planner();
		let mut state = State::new(query);

		loop {
			let session = &state.session;
			let event = match state.step {
				Step::Decompose => Event::Decomposed(planner.decompose(&session.original_query).await),
				Step::Retrieve =>
					self.retrieve_step(&planner, &session.current_query, k, fetch_k).await?,
				Step::Grade => {
					let is_relevant = if session.retrieved_text.is_empty() {
						tracing::info!(sub_query = %session.current_query, "No documents to grade.");

						false
					} else {
						planner.grade(&session.current_query, &session.retrieved_text).await
					};

					Event::Graded { is_relevant }
				},
				Step::Rewrite => Event::Rewritten(planner.rewrite(&session.current_query).await),
				Step::WebFallback => Event::WebSearched(self.web_fallback(&session.current_query).await),
				Step::AppendContext => {
					tracing::info!(
						sub_query_index = session.index,
						sub_query = %session.current_query,
						is_relevant = session.is_relevant,
						rewrite_attempted = session.rewrite_attempted,
						web_chars = session.web_text.len(),
						"Sub-query finished."
					);

					Event::Advanced
				},
				Step::Synthesize => Event::Synthesized(
					self.synthesize(&session.original_query, &session.joined_context()).await,
				),
				Step::Done => break,
			};
			let from = state.step;

			state = transition(state, event)?;

			tracing::debug!(
				from = ?from,
				to = ?state.step,
				sub_query_index = state.session.index,
				"Controller transition."
			);
		}

		let Session { answer, trace, .. } = state.session;
		let answer = answer.ok_or_else(|| Error::InvalidState {
			message: "Controller finished without an answer.".to_string(),
		})?;

		Ok((answer, trace))
	}

	async fn retrieve_step(
		&self,
		planner: &QueryPlanner<'_>,
		query: &str,
		k: usize,
		fetch_k: usize,
	) -> Result<Event> {
		tracing::info!(sub_query = %query, "Retrieving pages.");

		let filters = planner.extract_filters(query).await;
		let keywords = planner.generate_keywords(query).await;
		let docs = self.search_pages(query, &filters, &keywords, k, fetch_k).await?;
		let text = answer::format_documents(&docs);

		dump::persist_retrieved(self.cfg.retrieval.debug_dump_dir.as_deref(), &text).await;

		Ok(Event::Retrieved { text, doc_count: docs.len() })
	}

	async fn web_fallback(&self, query: &str) -> String {
		let cfg = &self.cfg.providers.web_search;
		let limit = Duration::from_millis(cfg.timeout_ms);

		match tokio::time::timeout(limit, self.providers.web_search.search(cfg, query)).await {
			Ok(text) => text,
			Err(_) => {
				tracing::warn!(timeout_ms = cfg.timeout_ms, "Web search timed out.");

				String::new()
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn step(state: State, event: Event) -> State {
		transition(state, event).expect("transition failed")
	}

	fn decomposed(queries: &[&str]) -> State {
		step(
			State::new("original question"),
			Event::Decomposed(queries.iter().map(|q| q.to_string()).collect()),
		)
	}

	fn retrieved(text: &str) -> Event {
		Event::Retrieved { text: text.to_string(), doc_count: usize::from(!text.is_empty()) }
	}

	#[test]
	fn decompose_initializes_first_sub_query() {
		let state = decomposed(&["amazon revenue", "apple revenue"]);

		assert_eq!(state.step, Step::Retrieve);
		assert_eq!(state.session.index, 0);
		assert_eq!(state.session.current_query, "amazon revenue");
		assert!(!state.session.rewrite_attempted);
		assert!(state.session.contexts.is_empty());
		assert_eq!(state.session.trace.sub_queries.len(), 1);
	}

	#[test]
	fn empty_decomposition_uses_original_query() {
		let state = decomposed(&[]);

		assert_eq!(state.session.sub_queries, vec!["original question".to_string()]);
		assert_eq!(state.session.current_query, "original question");

		let blank = decomposed(&["  ", ""]);

		assert_eq!(blank.session.sub_queries, vec!["original question".to_string()]);
	}

	#[test]
	fn relevant_first_attempt_goes_straight_to_append() {
		let state = step(decomposed(&["q1"]), retrieved("docs"));

		assert_eq!(state.step, Step::Grade);

		let state = step(state, Event::Graded { is_relevant: true });

		assert_eq!(state.step, Step::AppendContext);

		let state = step(state, Event::Advanced);

		assert_eq!(state.step, Step::Synthesize);
		assert_eq!(state.session.contexts, vec!["docs".to_string()]);
		assert_eq!(state.session.index, 1);

		let trace = &state.session.trace.sub_queries[0];

		assert_eq!(trace.retrieval_attempts, 1);
		assert!(trace.rewritten_query.is_none());
		assert!(!trace.web_search_used);
	}

	#[test]
	fn first_failure_rewrites_and_retries() {
		let state = step(step(decomposed(&["q1"]), retrieved("")), Event::Graded { is_relevant: false });

		assert_eq!(state.step, Step::Rewrite);

		let state = step(state, Event::Rewritten("q1 rewritten".to_string()));

		assert_eq!(state.step, Step::Retrieve);
		assert_eq!(state.session.current_query, "q1 rewritten");
		assert!(state.session.rewrite_attempted);
	}

	#[test]
	fn second_failure_falls_back_to_web_once() {
		let state = step(decomposed(&["q1"]), retrieved(""));
		let state = step(state, Event::Graded { is_relevant: false });
		let state = step(state, Event::Rewritten("q1 rewritten".to_string()));
		let state = step(state, retrieved("weak docs"));
		let state = step(state, Event::Graded { is_relevant: false });

		assert_eq!(state.step, Step::WebFallback);

		let state = step(state, Event::WebSearched("- snippet".to_string()));

		assert_eq!(state.step, Step::AppendContext);

		let state = step(state, Event::Advanced);

		assert_eq!(state.session.contexts, vec!["weak docs\n\n[WEB_SEARCH]\n- snippet".to_string()]);

		let trace = &state.session.trace.sub_queries[0];

		assert_eq!(trace.retrieval_attempts, 2);
		assert_eq!(trace.doc_counts, vec![0, 1]);
		assert!(trace.web_search_used);
	}

	#[test]
	fn empty_block_is_not_appended() {
		let state = step(decomposed(&["q1", "q2"]), retrieved(""));
		let state = step(state, Event::Graded { is_relevant: false });
		let state = step(state, Event::Rewritten("q1b".to_string()));
		let state = step(state, retrieved(""));
		let state = step(state, Event::Graded { is_relevant: false });
		let state = step(state, Event::WebSearched(String::new()));
		let state = step(state, Event::Advanced);

		assert!(state.session.contexts.is_empty());
		assert_eq!(state.step, Step::Retrieve);
		assert_eq!(state.session.index, 1);
		assert_eq!(state.session.current_query, "q2");
		assert!(!state.session.rewrite_attempted);
		assert!(state.session.web_text.is_empty());
		assert!(!state.session.trace.sub_queries[0].context_appended);
	}

	#[test]
	fn contexts_accumulate_in_sub_query_order() {
		let mut state = decomposed(&["a", "b", "c"]);

		for text in ["A", "B", "C"] {
			state = step(state, retrieved(text));
			state = step(state, Event::Graded { is_relevant: true });
			state = step(state, Event::Advanced);
		}

		assert_eq!(state.step, Step::Synthesize);
		assert_eq!(state.session.joined_context(), "A\n\nB\n\nC");

		let state = step(state, Event::Synthesized("answer".to_string()));

		assert_eq!(state.step, Step::Done);
		assert_eq!(state.session.answer.as_deref(), Some("answer"));
	}

	#[test]
	fn rejects_events_out_of_order() {
		let state = State::new("q");

		assert!(matches!(
			transition(state.clone(), Event::Advanced),
			Err(Error::InvalidState { .. })
		));
		assert!(transition(state, retrieved("docs")).is_err());

		let done = State { step: Step::Done, session: Session::new("q") };

		assert!(transition(done, Event::Synthesized("again".to_string())).is_err());
	}
}
