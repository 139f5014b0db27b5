// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Breadcrumbs: a trail of actions leading up to an event.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::EventError;

/// Category of a breadcrumb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreadcrumbType {
	Manual,
	Error,
	Log,
	Navigation,
	Process,
	Request,
	State,
	User,
}

impl fmt::Display for BreadcrumbType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Manual => write!(f, "manual"),
			Self::Error => write!(f, "error"),
			Self::Log => write!(f, "log"),
			Self::Navigation => write!(f, "navigation"),
			Self::Process => write!(f, "process"),
			Self::Request => write!(f, "request"),
			Self::State => write!(f, "state"),
			Self::User => write!(f, "user"),
		}
	}
}

impl FromStr for BreadcrumbType {
	type Err = EventError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"manual" => Ok(Self::Manual),
			"error" => Ok(Self::Error),
			"log" => Ok(Self::Log),
			"navigation" => Ok(Self::Navigation),
			"process" => Ok(Self::Process),
			"request" => Ok(Self::Request),
			"state" => Ok(Self::State),
			"user" => Ok(Self::User),
			_ => Err(EventError::InvalidBreadcrumbType(s.to_string())),
		}
	}
}

/// A timestamped record of something the application did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumb {
	#[serde(serialize_with = "serialize_timestamp")]
	pub timestamp: DateTime<Utc>,
	pub name: String,
	#[serde(rename = "type")]
	pub kind: BreadcrumbType,
	#[serde(rename = "metaData")]
	pub metadata: BTreeMap<String, Value>,
}

impl Breadcrumb {
	pub fn new(name: impl Into<String>, kind: BreadcrumbType) -> Self {
		Self {
			timestamp: Utc::now(),
			name: name.into(),
			kind,
			metadata: BTreeMap::new(),
		}
	}

	pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.metadata.insert(key.into(), value.into());
		self
	}
}

impl Default for Breadcrumb {
	fn default() -> Self {
		Self::new(String::new(), BreadcrumbType::Manual)
	}
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
	serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}
