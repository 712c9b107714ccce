use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, NaiveTime, TimeDelta, TimeZone, Timelike, Weekday};
use thiserror::Error;

const TIME_FORMAT: &str = "%H:%M";
const DISPLAY_FORMAT: &str = "%-I:%M %p";

/// Weekly hours as delivered by the place source: a day name mapped to a list of
/// `[open, close]` intervals in 24-hour `HH:mm` notation.
pub type RawHours = BTreeMap<String, Vec<Vec<String>>>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HoursError {
	#[error("unrecognized day <key='{0}'>")]
	UnknownDay(String),
	#[error("no intervals listed for {0}")]
	EmptyDay(Weekday),
	#[error("interval for {day} has {len} endpoints, expected 2")]
	IntervalArity { day: Weekday, len: usize },
	#[error("invalid time <value='{value}'> for {day}, expected HH:mm: {source}")]
	InvalidTime {
		day: Weekday,
		value: String,
		source: chrono::ParseError,
	},
}

/// Opening interval for a single day.
///
/// A closing time earlier than the opening time spans into the following day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayHours {
	open: NaiveTime,
	close: NaiveTime,
}

impl DayHours {
	#[must_use]
	pub const fn new(open: NaiveTime, close: NaiveTime) -> Self {
		Self { open, close }
	}

	#[must_use]
	pub const fn open(&self) -> NaiveTime {
		self.open
	}

	#[must_use]
	pub const fn close(&self) -> NaiveTime {
		self.close
	}

	#[must_use]
	pub fn is_overnight(&self) -> bool {
		self.close < self.open
	}

	/// Offset of the opening instant from the opening day's midnight.
	#[must_use]
	pub fn open_offset(&self) -> TimeDelta {
		since_midnight(self.open)
	}

	/// Offset of the closing instant from the opening day's midnight, advanced by a whole day
	/// for overnight spans.
	#[must_use]
	pub fn close_offset(&self) -> TimeDelta {
		let offset = since_midnight(self.close);
		if self.is_overnight() {
			offset + TimeDelta::days(1)
		} else {
			offset
		}
	}

	#[must_use]
	pub fn open_time_string(&self) -> String {
		self.open.format(DISPLAY_FORMAT).to_string()
	}

	#[must_use]
	pub fn close_time_string(&self) -> String {
		self.close.format(DISPLAY_FORMAT).to_string()
	}
}

fn since_midnight(time: NaiveTime) -> TimeDelta {
	TimeDelta::seconds(i64::from(time.num_seconds_from_midnight()))
}

/// Weekly opening hours. A day without an entry is a closed day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenHours {
	days: HashMap<Weekday, DayHours>,
}

impl OpenHours {
	pub fn from_days(days: impl IntoIterator<Item = (Weekday, DayHours)>) -> Self {
		Self {
			days: days.into_iter().collect(),
		}
	}

	/// Validates raw per-day intervals.
	///
	/// Only the last interval listed for a day is kept, multiple intervals per day are not
	/// supported.
	pub fn from_raw(raw: &RawHours) -> Result<Self, HoursError> {
		raw.iter()
			.map(|(key, intervals)| {
				let day = key
					.trim()
					.parse::<Weekday>()
					.map_err(|_| HoursError::UnknownDay(key.clone()))?;

				let interval = intervals.last().ok_or(HoursError::EmptyDay(day))?;

				let [open, close] = interval.as_slice() else {
					return Err(HoursError::IntervalArity {
						day,
						len: interval.len(),
					});
				};

				Ok((
					day,
					DayHours::new(parse_time(day, open)?, parse_time(day, close)?),
				))
			})
			.collect::<Result<HashMap<_, _>, _>>()
			.map(|days| Self { days })
	}

	#[must_use]
	pub fn day(&self, day: Weekday) -> Option<DayHours> {
		self.days.get(&day).copied()
	}

	/// Hours listed for the weekday of `at`, in `at`'s own time zone.
	#[must_use]
	pub fn hours_on<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> Option<DayHours> {
		self.day(at.weekday())
	}

	/// Whether the place lists hours for the weekday of `at`.
	///
	/// The open and close bounds are not consulted, any listed interval counts as open for the
	/// whole day.
	#[must_use]
	pub fn is_open<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> bool {
		self.hours_on(at).is_some()
	}

	/// `None` when the place is closed on that day.
	#[must_use]
	pub fn open_time_string<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> Option<String> {
		self.hours_on(at).map(|hours| hours.open_time_string())
	}

	/// `None` when the place is closed on that day.
	#[must_use]
	pub fn close_time_string<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> Option<String> {
		self.hours_on(at).map(|hours| hours.close_time_string())
	}

	#[must_use]
	pub fn open_days(&self) -> usize {
		self.days.len()
	}
}

fn parse_time(day: Weekday, value: &str) -> Result<NaiveTime, HoursError> {
	NaiveTime::parse_from_str(value, TIME_FORMAT).map_err(|source| HoursError::InvalidTime {
		day,
		value: value.to_string(),
		source,
	})
}
