// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Five-field cron specifications.
//!
//! `minute hour day-of-month month day-of-week`, each field being `*` or a
//! comma-separated list of `N`, `A-B`, `*/S` or `A-B/S`. Months accept
//! `jan`..`dec`, weekdays accept `sun`..`sat` (`0` and `7` are both Sunday).
//!
//! A `*` field is stored as an empty list and matches anything. Day matching
//! follows the classic cron rule: when both day fields are restricted, a day
//! matching either one is due.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Timelike};

use crate::error::{JobError, Result};

const MONTH_NAMES: [&str; 12] = [
	"jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const DAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

#[derive(Debug, Clone, Copy)]
struct FieldSpec {
	name: &'static str,
	min: u32,
	max: u32,
	names: &'static [&'static str],
	/// Value that `names[0]` maps to.
	names_base: u32,
}

const MINUTE: FieldSpec = FieldSpec {
	name: "minute",
	min: 0,
	max: 59,
	names: &[],
	names_base: 0,
};
const HOUR: FieldSpec = FieldSpec {
	name: "hour",
	min: 0,
	max: 23,
	names: &[],
	names_base: 0,
};
const DAY_OF_MONTH: FieldSpec = FieldSpec {
	name: "day-of-month",
	min: 1,
	max: 31,
	names: &[],
	names_base: 0,
};
const MONTH: FieldSpec = FieldSpec {
	name: "month",
	min: 1,
	max: 12,
	names: &MONTH_NAMES,
	names_base: 1,
};
// 7 is accepted as Sunday and folded to 0 after parsing.
const DAY_OF_WEEK: FieldSpec = FieldSpec {
	name: "day-of-week",
	min: 0,
	max: 7,
	names: &DAY_NAMES,
	names_base: 0,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCron {
	expression: String,
	minutes: Vec<u32>,
	hours: Vec<u32>,
	days_of_month: Vec<u32>,
	months: Vec<u32>,
	days_of_week: Vec<u32>,
}

impl JobCron {
	pub fn parse(expression: &str) -> Result<Self> {
		let fields: Vec<&str> = expression.split_whitespace().collect();
		let [minute, hour, dom, month, dow] = fields.as_slice() else {
			return Err(invalid(
				expression,
				format!("expected 5 fields, found {}", fields.len()),
			));
		};

		let mut days_of_week = parse_field(expression, dow, DAY_OF_WEEK)?;
		if days_of_week.contains(&7) {
			days_of_week.retain(|d| *d != 7);
			if !days_of_week.contains(&0) {
				days_of_week.insert(0, 0);
			}
		}

		Ok(Self {
			expression: fields.join(" "),
			minutes: parse_field(expression, minute, MINUTE)?,
			hours: parse_field(expression, hour, HOUR)?,
			days_of_month: parse_field(expression, dom, DAY_OF_MONTH)?,
			months: parse_field(expression, month, MONTH)?,
			days_of_week,
		})
	}

	pub fn expression(&self) -> &str {
		&self.expression
	}

	pub fn minutes(&self) -> &[u32] {
		&self.minutes
	}

	pub fn hours(&self) -> &[u32] {
		&self.hours
	}

	pub fn days_of_month(&self) -> &[u32] {
		&self.days_of_month
	}

	pub fn months(&self) -> &[u32] {
		&self.months
	}

	/// Sunday is 0.
	pub fn days_of_week(&self) -> &[u32] {
		&self.days_of_week
	}

	/// Whether a job with this spec is due at `at` (minute resolution).
	pub fn is_show_time<T: Datelike + Timelike>(&self, at: &T) -> bool {
		field_matches(&self.months, at.month())
			&& self.day_matches(at.day(), at.weekday().num_days_from_sunday())
			&& field_matches(&self.hours, at.hour())
			&& field_matches(&self.minutes, at.minute())
	}

	fn day_matches(&self, day_of_month: u32, day_of_week: u32) -> bool {
		match (self.days_of_month.is_empty(), self.days_of_week.is_empty()) {
			(true, true) => true,
			(false, true) => self.days_of_month.contains(&day_of_month),
			(true, false) => self.days_of_week.contains(&day_of_week),
			(false, false) => {
				self.days_of_month.contains(&day_of_month) || self.days_of_week.contains(&day_of_week)
			}
		}
	}
}

impl FromStr for JobCron {
	type Err = JobError;

	fn from_str(s: &str) -> Result<Self> {
		JobCron::parse(s)
	}
}

impl fmt::Display for JobCron {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.expression)
	}
}

fn field_matches(values: &[u32], value: u32) -> bool {
	values.is_empty() || values.contains(&value)
}

fn invalid(expression: &str, message: String) -> JobError {
	JobError::InvalidCron {
		expression: expression.to_string(),
		message,
	}
}

fn parse_field(expression: &str, field: &str, spec: FieldSpec) -> Result<Vec<u32>> {
	if field == "*" {
		return Ok(Vec::new());
	}

	let mut values = Vec::new();
	for item in field.split(',') {
		let (range, step) = match item.split_once('/') {
			Some((range, step)) => {
				let step: u32 = step
					.parse()
					.ok()
					.filter(|s| *s > 0)
					.ok_or_else(|| invalid(expression, format!("bad step '{step}' in {} field", spec.name)))?;
				(range, step)
			}
			None => (item, 1),
		};

		let (start, end) = if range == "*" {
			(spec.min, spec.max)
		} else if let Some((a, b)) = range.split_once('-') {
			(parse_value(expression, a, spec)?, parse_value(expression, b, spec)?)
		} else {
			let v = parse_value(expression, range, spec)?;
			// `N/S` runs from N to the end of the field.
			(v, if step > 1 { spec.max } else { v })
		};

		if start > end {
			return Err(invalid(
				expression,
				format!("range {start}-{end} is reversed in {} field", spec.name),
			));
		}
		values.extend((start..=end).step_by(step as usize));
	}

	values.sort_unstable();
	values.dedup();
	Ok(values)
}

fn parse_value(expression: &str, token: &str, spec: FieldSpec) -> Result<u32> {
	let lower = token.to_ascii_lowercase();
	let value = match spec.names.iter().position(|n| *n == lower) {
		Some(index) => index as u32 + spec.names_base,
		None => token
			.parse()
			.map_err(|_| invalid(expression, format!("'{token}' is not valid in {} field", spec.name)))?,
	};

	if value < spec.min || value > spec.max {
		return Err(invalid(
			expression,
			format!(
				"{value} is outside {}..={} in {} field",
				spec.min, spec.max, spec.name
			),
		));
	}
	Ok(value)
}
