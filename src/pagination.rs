//! `Link` header pagination: next-page discovery, endpoint derivation, and page merging.
//!
//! Servers announce further pages with RFC 8288 links such as
//! `<https://host/services/4.0/groups?page=2>; rel="next"`. The client turns the next URL back
//! into an endpoint relative to its base, fetches it, and folds every page into one value.

// self
use crate::_prelude::*;

/// Returns the target of the first `rel="next"` entry in a raw `Link` header.
pub fn next_link(header: &str) -> Option<&str> {
	let mut rest = header;

	while let Some(open) = rest.find('<') {
		let after_open = &rest[open + 1..];
		let close = after_open.find('>')?;
		let target = after_open[..close].trim();
		let params_and_more = &after_open[close + 1..];
		let params_end = params_and_more.find('<').unwrap_or(params_and_more.len());
		let params = &params_and_more[..params_end];

		if params.split(';').any(is_next_relation) {
			return Some(target);
		}

		rest = &params_and_more[params_end..];
	}

	None
}

fn is_next_relation(param: &str) -> bool {
	let Some((name, value)) = param.split_once('=') else {
		return false;
	};

	if !name.trim().eq_ignore_ascii_case("rel") {
		return false;
	}

	// `rel` may hold a space-separated list of relation types; strip trailing link separators.
	value
		.trim()
		.trim_end_matches(',')
		.trim_matches('"')
		.split_ascii_whitespace()
		.any(|rel| rel.eq_ignore_ascii_case("next"))
}

/// Converts a next-page URL into an endpoint the client can join onto its base URL.
///
/// When the URL's path starts with `prefix`, the prefix is stripped and the query string is
/// forwarded unchanged. Any other URL is returned whole so it resolves as absolute.
pub fn derive_endpoint(next: &Url, prefix: &str) -> String {
	match next.path().strip_prefix(prefix) {
		Some(relative) => match next.query() {
			Some(query) => format!("{relative}?{query}"),
			None => relative.to_owned(),
		},
		None => next.to_string(),
	}
}

/// Folds `page` into `acc`.
///
/// Arrays concatenate. Objects merge key by key: array values concatenate and every other value
/// is last-write-wins. Any other combination takes the later page.
pub fn merge_page(acc: &mut Value, page: Value) {
	match (acc, page) {
		(Value::Array(items), Value::Array(more)) => items.extend(more),
		(Value::Object(fields), Value::Object(more)) =>
			for (key, value) in more {
				match value {
					Value::Array(more_items) => match fields.get_mut(&key) {
						Some(Value::Array(items)) => items.extend(more_items),
						_ => {
							fields.insert(key, Value::Array(more_items));
						},
					},
					value => {
						fields.insert(key, value);
					},
				}
			},
		(acc, page) => *acc = page,
	}
}
