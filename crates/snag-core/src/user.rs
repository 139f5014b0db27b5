// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The user an event is attributed to.

use serde::{Deserialize, Serialize};

/// User information attached to an event.
///
/// Every field serializes, `null` when unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
	pub id: Option<String>,
	pub email: Option<String>,
	pub name: Option<String>,
}

impl User {
	pub fn new(id: Option<String>, email: Option<String>, name: Option<String>) -> Self {
		Self { id, email, name }
	}

	pub fn is_empty(&self) -> bool {
		self.id.is_none() && self.email.is_none() && self.name.is_none()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unset_fields_serialize_as_null() {
		let user = User {
			id: Some("u-1".to_string()),
			..Default::default()
		};
		assert_eq!(
			serde_json::to_value(&user).unwrap(),
			serde_json::json!({"id": "u-1", "email": null, "name": null})
		);
		assert!(!user.is_empty());
		assert!(User::default().is_empty());
	}
}
