// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sectioned key/value metadata and the global/local merge.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Placeholder written in place of redacted values.
pub const REDACTED: &str = "[REDACTED]";

/// Mapping from section name to a mapping from key to value.
///
/// Ordered so that serialization is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataSet {
	sections: BTreeMap<String, BTreeMap<String, Value>>,
}

impl MetadataSet {
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets `key` in `section`, creating the section if needed.
	///
	/// A `null` value removes the key instead.
	pub fn add_metadata(
		&mut self,
		section: impl Into<String>,
		key: impl Into<String>,
		value: impl Into<Value>,
	) {
		let section = section.into();
		let key = key.into();
		match value.into() {
			Value::Null => self.clear_metadata(&section, Some(&key)),
			value => {
				self.sections.entry(section).or_default().insert(key, value);
			}
		}
	}

	/// Adds every entry of `values` to `section`.
	pub fn add_section<I, K, V>(&mut self, section: impl Into<String>, values: I)
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<Value>,
	{
		let section = section.into();
		for (key, value) in values {
			self.add_metadata(section.clone(), key, value);
		}
	}

	/// Removes a whole section, or a single key when `key` is given.
	pub fn clear_metadata(&mut self, section: &str, key: Option<&str>) {
		match key {
			None => {
				self.sections.remove(section);
			}
			Some(key) => {
				if let Some(entries) = self.sections.get_mut(section) {
					entries.remove(key);
					if entries.is_empty() {
						self.sections.remove(section);
					}
				}
			}
		}
	}

	pub fn get_section(&self, section: &str) -> Option<&BTreeMap<String, Value>> {
		self.sections.get(section)
	}

	pub fn get_metadata(&self, section: &str, key: &str) -> Option<&Value> {
		self.sections.get(section)?.get(key)
	}

	pub fn is_empty(&self) -> bool {
		self.sections.is_empty()
	}

	pub fn sections(&self) -> impl Iterator<Item = &str> {
		self.sections.keys().map(String::as_str)
	}

	/// Combines process-wide metadata with per-event metadata.
	///
	/// The result holds the union of sections and keys. When a `(section,
	/// key)` pair exists in both, the value from `local` replaces the one
	/// from `global` wholesale. Neither input is modified and the result
	/// shares no storage with them.
	pub fn merge(global: &MetadataSet, local: &MetadataSet) -> MetadataSet {
		let mut merged = global.clone();
		for (section, entries) in &local.sections {
			let target = merged.sections.entry(section.clone()).or_default();
			for (key, value) in entries {
				target.insert(key.clone(), value.clone());
			}
		}
		merged
	}

	/// View that serializes this set with the values of sensitive keys
	/// replaced by [`REDACTED`].
	///
	/// A key is sensitive when it contains any of `redacted_keys`, ignoring
	/// ASCII case. Nested objects are redacted at every depth.
	pub fn redacted<'a>(&'a self, redacted_keys: &'a [String]) -> Redacted<'a> {
		Redacted {
			set: self,
			redacted_keys,
		}
	}
}

/// Serializable redacted view of a [`MetadataSet`].
#[derive(Debug, Clone, Copy)]
pub struct Redacted<'a> {
	set: &'a MetadataSet,
	redacted_keys: &'a [String],
}

impl Redacted<'_> {
	fn is_sensitive(&self, key: &str) -> bool {
		let key = key.to_ascii_lowercase();
		self.redacted_keys
			.iter()
			.any(|needle| key.contains(&needle.to_ascii_lowercase()))
	}

	fn redact_value(&self, value: &Value) -> Value {
		match value {
			Value::Object(map) => Value::Object(
				map.iter()
					.map(|(k, v)| {
						let v = if self.is_sensitive(k) {
							Value::String(REDACTED.to_string())
						} else {
							self.redact_value(v)
						};
						(k.clone(), v)
					})
					.collect(),
			),
			Value::Array(items) => Value::Array(items.iter().map(|v| self.redact_value(v)).collect()),
			other => other.clone(),
		}
	}
}

impl Serialize for Redacted<'_> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		if self.redacted_keys.is_empty() {
			return self.set.serialize(serializer);
		}

		let mut map = serializer.serialize_map(Some(self.set.sections.len()))?;
		for (section, entries) in &self.set.sections {
			let entries: BTreeMap<&str, Value> = entries
				.iter()
				.map(|(k, v)| {
					let v = if self.is_sensitive(k) {
						Value::String(REDACTED.to_string())
					} else {
						self.redact_value(v)
					};
					(k.as_str(), v)
				})
				.collect();
			map.serialize_entry(section, &entries)?;
		}
		map.end()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use serde_json::json;

	fn set_from(value: Value) -> MetadataSet {
		serde_json::from_value(value).unwrap()
	}

	#[test]
	fn local_overrides_global_per_key() {
		let global = set_from(json!({"device": {"foo": "bar"}}));
		let local = set_from(json!({"device": {"foo": "baz", "extra": "qux"}}));

		let merged = MetadataSet::merge(&global, &local);

		assert_eq!(
			serde_json::to_value(&merged).unwrap(),
			json!({"device": {"foo": "baz", "extra": "qux"}})
		);
	}

	#[test]
	fn merge_keeps_sections_from_both_sides() {
		let global = set_from(json!({"app": {"flag": true}}));
		let local = set_from(json!({"request": {"path": "/cart"}}));

		let merged = MetadataSet::merge(&global, &local);

		assert_eq!(merged.get_metadata("app", "flag"), Some(&json!(true)));
		assert_eq!(merged.get_metadata("request", "path"), Some(&json!("/cart")));
	}

	#[test]
	fn merge_with_empty_side_returns_the_other() {
		let global = set_from(json!({"app": {"flag": true}}));
		let empty = MetadataSet::new();

		assert_eq!(MetadataSet::merge(&global, &empty), global);
		assert_eq!(MetadataSet::merge(&empty, &global), global);
	}

	#[test]
	fn merged_result_is_independent_of_global() {
		let mut global = set_from(json!({"app": {"flag": true}}));
		let merged = MetadataSet::merge(&global, &MetadataSet::new());

		global.add_metadata("app", "flag", false);

		assert_eq!(merged.get_metadata("app", "flag"), Some(&json!(true)));
	}

	#[test]
	fn nested_local_value_replaces_wholesale() {
		let global = set_from(json!({"s": {"k": {"a": 1, "b": 2}}}));
		let local = set_from(json!({"s": {"k": {"a": 3}}}));

		let merged = MetadataSet::merge(&global, &local);

		assert_eq!(merged.get_metadata("s", "k"), Some(&json!({"a": 3})));
	}

	#[test]
	fn null_value_removes_key_and_empty_section() {
		let mut set = MetadataSet::new();
		set.add_metadata("app", "flag", true);
		set.add_metadata("app", "flag", Value::Null);
		assert!(set.get_section("app").is_none());
	}

	#[test]
	fn add_section_and_clear() {
		let mut set = MetadataSet::new();
		set.add_section("user", [("plan", "pro"), ("region", "eu")]);
		assert_eq!(set.get_section("user").map(|s| s.len()), Some(2));

		set.clear_metadata("user", Some("plan"));
		assert_eq!(set.get_metadata("user", "plan"), None);
		assert_eq!(set.get_metadata("user", "region"), Some(&json!("eu")));

		set.clear_metadata("user", None);
		assert!(set.is_empty());
	}

	#[test]
	fn redaction_hides_sensitive_keys_at_any_depth() {
		let set = set_from(json!({
			"login": {
				"Password": "hunter2",
				"form": {"user_password": "x", "name": "alice"},
				"items": [{"password": "y"}]
			}
		}));
		let keys = vec!["password".to_string()];

		let json = serde_json::to_value(set.redacted(&keys)).unwrap();

		assert_eq!(
			json,
			json!({
				"login": {
					"Password": REDACTED,
					"form": {"user_password": REDACTED, "name": "alice"},
					"items": [{"password": REDACTED}]
				}
			})
		);
		assert_eq!(set.get_metadata("login", "Password"), Some(&json!("hunter2")));
	}

	fn arb_set() -> impl Strategy<Value = MetadataSet> {
		prop::collection::btree_map(
			"[a-c]",
			prop::collection::btree_map("[a-d]", any::<i64>(), 0..4),
			0..3,
		)
		.prop_map(|sections| {
			let mut set = MetadataSet::new();
			for (section, entries) in sections {
				set.add_section(section, entries);
			}
			set
		})
	}

	proptest! {
		#[test]
		fn merge_is_pure_and_repeatable(global in arb_set(), local in arb_set()) {
			let global_before = global.clone();
			let local_before = local.clone();

			let first = MetadataSet::merge(&global, &local);
			let second = MetadataSet::merge(&global, &local);

			prop_assert_eq!(&first, &second);
			prop_assert_eq!(&global, &global_before);
			prop_assert_eq!(&local, &local_before);
		}

		#[test]
		fn local_value_wins(global in arb_set(), local in arb_set()) {
			let merged = MetadataSet::merge(&global, &local);
			for section in local.sections() {
				for (key, value) in local.get_section(section).unwrap() {
					prop_assert_eq!(merged.get_metadata(section, key), Some(value));
				}
			}
			for section in global.sections() {
				for (key, value) in global.get_section(section).unwrap() {
					if local.get_metadata(section, key).is_none() {
						prop_assert_eq!(merged.get_metadata(section, key), Some(value));
					}
				}
			}
		}
	}
}
