use serde::{Deserialize, Serialize};

use pagerag_storage::pages::PagePredicate;

use crate::oracle::OracleSchema;

pub const MIN_FISCAL_YEAR: i32 = 1950;
pub const MAX_FISCAL_YEAR: i32 = 2050;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocType {
	#[serde(rename = "10-k")]
	TenK,
	#[serde(rename = "10-q")]
	TenQ,
	#[serde(rename = "8-k")]
	EightK,
	#[serde(rename = "other")]
	Other,
}
impl DocType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::TenK => "10-k",
			Self::TenQ => "10-q",
			Self::EightK => "8-k",
			Self::Other => "other",
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FiscalQuarter {
	Q1,
	Q2,
	Q3,
	Q4,
}
impl FiscalQuarter {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Q1 => "q1",
			Self::Q2 => "q2",
			Self::Q3 => "q3",
			Self::Q4 => "q4",
		}
	}
}

/// Sparse metadata constraints for one retrieval call. Absent fields impose no constraint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
	#[serde(default)]
	pub company_name: Option<String>,
	#[serde(default)]
	pub doc_type: Option<DocType>,
	#[serde(default)]
	pub fiscal_year: Option<i32>,
	#[serde(default)]
	pub fiscal_quarter: Option<FiscalQuarter>,
}
impl FilterSet {
	/// Company names are stored lowercase at ingestion; blank names impose no constraint.
	pub fn normalized(mut self) -> Self {
		self.company_name = self
			.company_name
			.map(|name| name.trim().to_lowercase())
			.filter(|name| !name.is_empty());

		self
	}

	pub fn to_predicate(&self, keywords: &[String]) -> PagePredicate {
		PagePredicate {
			company_name: self.company_name.clone(),
			doc_type: self.doc_type.map(|doc_type| doc_type.as_str().to_string()),
			fiscal_year: self.fiscal_year,
			fiscal_quarter: self.fiscal_quarter.map(|quarter| quarter.as_str().to_string()),
			keywords: keywords.to_vec(),
		}
	}
}
impl OracleSchema for FilterSet {
	const NAME: &'static str = "extract_filters";

	fn shape() -> &'static str {
		r#"{"company_name": string|null, "doc_type": "10-k"|"10-q"|"8-k"|"other"|null, "fiscal_year": integer|null, "fiscal_quarter": "q1"|"q2"|"q3"|"q4"|null}"#
	}

	fn validate(&self) -> Result<(), String> {
		match self.fiscal_year {
			Some(year) if !(MIN_FISCAL_YEAR..=MAX_FISCAL_YEAR).contains(&year) =>
				Err(format!("fiscal_year must be in the range {MIN_FISCAL_YEAR}-{MAX_FISCAL_YEAR}.")),
			_ => Ok(()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_sparse_filters() {
		let filters: FilterSet = serde_json::from_value(serde_json::json!({
			"company_name": "amazon",
			"doc_type": "10-q",
			"fiscal_year": 2024,
			"fiscal_quarter": "q3"
		}))
		.expect("parse failed");

		assert_eq!(filters.doc_type, Some(DocType::TenQ));
		assert_eq!(filters.fiscal_quarter, Some(FiscalQuarter::Q3));

		let sparse: FilterSet =
			serde_json::from_value(serde_json::json!({ "company_name": "tesla", "doc_type": null }))
				.expect("parse failed");

		assert_eq!(sparse.doc_type, None);
		assert_eq!(sparse.fiscal_year, None);
	}

	#[test]
	fn rejects_unknown_doc_type_and_out_of_range_year() {
		assert!(
			serde_json::from_value::<FilterSet>(serde_json::json!({ "doc_type": "s-1" })).is_err()
		);

		let filters = FilterSet { fiscal_year: Some(1900), ..Default::default() };

		assert!(filters.validate().is_err());
	}

	#[test]
	fn converts_to_predicate() {
		let filters = FilterSet {
			company_name: Some("  Amazon ".to_string()),
			doc_type: Some(DocType::TenQ),
			fiscal_year: Some(2024),
			fiscal_quarter: Some(FiscalQuarter::Q3),
		}
		.normalized();
		let predicate = filters.to_predicate(&["net sales".to_string()]);

		assert_eq!(predicate.company_name.as_deref(), Some("amazon"));
		assert_eq!(predicate.doc_type.as_deref(), Some("10-q"));
		assert_eq!(predicate.fiscal_quarter.as_deref(), Some("q3"));
		assert_eq!(predicate.keywords, vec!["net sales".to_string()]);
		assert!(FilterSet::default().to_predicate(&[]).is_unconstrained());
	}
}
