//! Parser and evaluator for the POSIX `TZ` tail rule appended to TZif v2+
//! files: `std offset [dst [offset] [,start[/time],end[/time]]]`.
//!
//! Offsets in the wire grammar use the POSIX sign convention (west of UTC
//! is positive). Everywhere past parsing, this crate stores offsets with
//! the opposite sign so that "east of UTC is positive" holds uniformly,
//! matching the convention used by the TZif type records.

use crate::builder::TypeRecord;
use crate::error::{TzError, TzResult};
use crate::utils;

/// One side of a `Mm.w.d` / `Jn` / `n` transition rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionDay {
    /// `Jn`: 1..=365, Feb 29 is never counted.
    Julian(u16),
    /// `n`: 0..=365, Feb 29 counts on leap years.
    JulianZero(u16),
    /// `Mm.w.d`: month (1..=12), week (1..=5, 5 = last), day-of-week (0..=6, Sunday=0).
    MonthWeekDay { month: u8, week: u8, day: u8 },
}

/// A rule side paired with its local time-of-day (default 02:00:00).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionDateTime {
    pub day: TransitionDay,
    pub time_of_day: i32,
}

const DEFAULT_TRANSITION_TIME: i32 = 2 * 3600;

/// The DST half of a tail rule: its offset and the two transition sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DstRule {
    pub abbr: String,
    /// Offset east of UTC, in seconds.
    pub offset: i32,
    pub start: TransitionDateTime,
    pub end: TransitionDateTime,
}

/// The fully decomposed POSIX tail rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailRule {
    pub std_abbr: String,
    /// Offset east of UTC, in seconds.
    pub std_offset: i32,
    pub dst: Option<DstRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct YearTransitions {
    dst_start_utc: i64,
    dst_end_utc: i64,
}

impl TailRule {
    /// Parse the bytes of a TZif footer (without the framing newlines).
    pub fn parse(s: &str) -> TzResult<Self> {
        let mut p = Parser::new(s);
        let std_abbr = p.abbr()?;
        let std_west_offset = p.offset(DEFAULT_STD_OFFSET_HOURS)?;
        let std_offset = -std_west_offset;

        if p.is_empty() {
            return Ok(Self {
                std_abbr,
                std_offset,
                dst: None,
            });
        }

        let dst_abbr = p.abbr()?;
        let dst_west_offset = if p.peek_is_digit_or_sign() {
            p.offset(DEFAULT_STD_OFFSET_HOURS)?
        } else {
            // Absent DST offset defaults to one hour less west (i.e. one
            // hour more east) than the standard offset.
            std_west_offset - 3600
        };
        let dst_offset = -dst_west_offset;

        let (start, end) = if p.consume(',') {
            let start = p.transition_date_time()?;
            p.expect(',')?;
            let end = p.transition_date_time()?;
            (start, end)
        } else {
            (
                TransitionDateTime {
                    day: TransitionDay::MonthWeekDay {
                        month: 3,
                        week: 2,
                        day: 0,
                    },
                    time_of_day: DEFAULT_TRANSITION_TIME,
                },
                TransitionDateTime {
                    day: TransitionDay::MonthWeekDay {
                        month: 11,
                        week: 1,
                        day: 0,
                    },
                    time_of_day: DEFAULT_TRANSITION_TIME,
                },
            )
        };

        Ok(Self {
            std_abbr,
            std_offset,
            dst: Some(DstRule {
                abbr: dst_abbr,
                offset: dst_offset,
                start,
                end,
            }),
        })
    }

    pub fn std_type(&self) -> TypeRecord {
        TypeRecord::new(self.std_offset, false, 0, self.std_abbr.clone())
    }

    fn dst_type(&self, dst: &DstRule) -> TypeRecord {
        TypeRecord::new(dst.offset, true, dst.offset - self.std_offset, dst.abbr.clone())
    }

    /// Compute the UTC instants of the DST start/end transitions for a
    /// given calendar year. Returns `None` when the rule has no DST half.
    fn year_transitions(&self, year: i32, dst: &DstRule) -> YearTransitions {
        let dst_start_utc = instant_for_rule(year, &dst.start, self.std_offset);
        let dst_end_utc = instant_for_rule(year, &dst.end, dst.offset);
        YearTransitions {
            dst_start_utc,
            dst_end_utc,
        }
    }

    /// `transitions_for(year) -> (start_instant_utc, end_instant_utc)`.
    ///
    /// Returns `None` when the rule has no DST half, in which case it
    /// yields a single constant type and never emits transitions.
    pub fn transitions_for(&self, year: i32) -> Option<(i64, i64)> {
        let dst = self.dst.as_ref()?;
        let yt = self.year_transitions(year, dst);
        if yt.dst_start_utc > yt.dst_end_utc {
            Some((yt.dst_end_utc, yt.dst_start_utc))
        } else {
            Some((yt.dst_start_utc, yt.dst_end_utc))
        }
    }

    /// Resolve the applicable type for a UTC instant at or past the last
    /// recorded transition.
    pub fn type_at_utc(&self, seconds: i64) -> TypeRecord {
        let Some(dst) = &self.dst else {
            return self.std_type();
        };
        let year = utils::year_for_seconds(seconds);
        let yt = self.year_transitions(year, dst);
        let inverted = yt.dst_end_utc < yt.dst_start_utc;
        let in_dst = if inverted {
            !(yt.dst_end_utc..yt.dst_start_utc).contains(&seconds)
        } else {
            (yt.dst_start_utc..yt.dst_end_utc).contains(&seconds)
        };
        if in_dst {
            self.dst_type(dst)
        } else {
            self.std_type()
        }
    }

    /// Resolve the applicable type for a local (wall-clock) instant at or
    /// past the last recorded wall transition, disambiguating a gap or
    /// overlap by `fold` the same way the transition-table lookup does.
    pub fn resolve_local(&self, local_seconds: i64, fold: u8) -> TypeRecord {
        let Some(dst) = &self.dst else {
            return self.std_type();
        };

        let (is_transition_day, mut is_dst) =
            cmp_seconds_to_transitions(&dst.start.day, &dst.end.day, local_seconds);

        if is_transition_day {
            let time = utils::seconds_in_day(local_seconds);
            let transition_time = if is_dst {
                dst.start.time_of_day
            } else {
                dst.end.time_of_day
            };
            let transition_diff = if is_dst {
                dst.offset - self.std_offset
            } else {
                self.std_offset - dst.offset
            };
            let window = offset_range(
                i64::from(transition_time) + i64::from(transition_diff),
                i64::from(transition_time),
            );
            if window.contains(&time) {
                // `is_dst` true means this is the start-of-DST (gap)
                // transition; false means the end-of-DST (overlap) one.
                // Either way, fold=0 is the pre-transition side and
                // fold=1 the post-transition side.
                return match (is_dst, fold) {
                    (true, 0) | (false, 1) => self.std_type(),
                    _ => self.dst_type(dst),
                };
            }
            if time < window.start {
                is_dst = !is_dst;
            }
        }

        if is_dst {
            self.dst_type(dst)
        } else {
            self.std_type()
        }
    }
}

fn instant_for_rule(year: i32, dt: &TransitionDateTime, local_offset: i32) -> i64 {
    let year_start = utils::epoch_days_for_year(year) * utils::SECONDS_PER_DAY;
    let leap = utils::is_leap_year(year);
    let days = match dt.day {
        TransitionDay::JulianZero(day) => i64::from(day),
        TransitionDay::Julian(day) => {
            // `Jn` never counts Feb 29; shift by one once we're past it on
            // a leap year so the day count lines up with a zero-based
            // day-in-year index.
            let day = i64::from(day);
            if leap && day >= 60 {
                day
            } else {
                day - 1
            }
        }
        TransitionDay::MonthWeekDay { month, week, day } => {
            month_week_day_to_day_in_year(year_start, month, week, day, leap)
        }
    };
    year_start + days * utils::SECONDS_PER_DAY + i64::from(dt.time_of_day) - i64::from(local_offset)
}

fn month_week_day_to_day_in_year(year_start: i64, month: u8, week: u8, day: u8, leap: bool) -> i64 {
    let days_to_month = utils::days_before_month(month, leap);
    let days_in_month = utils::days_in_month(month, leap);

    let month_start_weekday =
        utils::day_of_week(year_start + i64::from(days_to_month) * utils::SECONDS_PER_DAY);

    let day = u16::from(day);
    let week = u16::from(week);
    let month_start_weekday = u16::from(month_start_weekday);

    let mut day_of_month = (week - u16::from(month_start_weekday <= day)) * 7 + day - month_start_weekday;
    // `week == 5` means "last occurrence"; clamp if that spills past the
    // month's length.
    if day_of_month + 1 > days_in_month {
        day_of_month -= 7;
    }

    i64::from(days_to_month) + i64::from(day_of_month)
}

fn cmp_seconds_to_transitions(start: &TransitionDay, end: &TransitionDay, seconds: i64) -> (bool, bool) {
    let year = utils::year_for_seconds(seconds);
    match (start, end) {
        (
            TransitionDay::MonthWeekDay {
                month: sm,
                week: sw,
                day: sd,
            },
            TransitionDay::MonthWeekDay {
                month: em,
                week: ew,
                day: ed,
            },
        ) => {
            let day_in_year = utils::day_in_year(seconds, year);
            let leap = utils::is_leap_year(year);
            let start_day = utils::days_before_month(*sm, leap)
                + week_day_ordinal(year, *sm, *sw, *sd, leap);
            let end_day =
                utils::days_before_month(*em, leap) + week_day_ordinal(year, *em, *ew, *ed, leap);
            classify(start_day, end_day, day_in_year)
        }
        (TransitionDay::Julian(start), TransitionDay::Julian(end)) => {
            let day_in_year = julian_day_in_year(seconds, year);
            classify(*start, *end, day_in_year)
        }
        (TransitionDay::JulianZero(start), TransitionDay::JulianZero(end)) => {
            let day_in_year = utils::day_in_year(seconds, year);
            classify(*start, *end, day_in_year)
        }
        _ => {
            // A mismatched pair of day kinds can only come from a
            // malformed tail rule; the parser never constructs one.
            (false, false)
        }
    }
}

fn week_day_ordinal(year: i32, month: u8, week: u8, day: u8, leap: bool) -> u16 {
    let days_to_month = utils::days_before_month(month, leap);
    let year_start_day_of_week =
        utils::day_of_week_from_epoch_day(utils::epoch_days_for_year(year));
    let month_start_weekday =
        (u16::from(year_start_day_of_week) + days_to_month).rem_euclid(7) as u16;
    let day = u16::from(day);
    let week = u16::from(week);
    let days_in_month = utils::days_in_month(month, leap);

    let mut day_of_month = (week - u16::from(month_start_weekday <= day)) * 7 + day - month_start_weekday;
    if day_of_month + 1 > days_in_month {
        day_of_month -= 7;
    }
    day_of_month
}

fn julian_day_in_year(seconds: i64, year: i32) -> u16 {
    let raw = utils::day_in_year(seconds, year);
    // Convert from the zero-based calendar day-in-year to the `Jn`
    // convention, which never counts Feb 29.
    if utils::is_leap_year(year) && raw >= 60 {
        raw
    } else {
        raw + 1
    }
}

fn classify(start: u16, end: u16, at: u16) -> (bool, bool) {
    let is_transition = start == at || end == at;
    let is_dst = if start > end {
        at < end || start <= at
    } else {
        start <= at && at < end
    };
    (is_transition, is_dst)
}

fn offset_range(a: i64, b: i64) -> std::ops::Range<i64> {
    if a < b {
        a..b
    } else {
        b..a
    }
}

const DEFAULT_STD_OFFSET_HOURS: i32 = 0;

struct Parser<'a> {
    rest: &'a str,
}

impl<'a> Parser<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s.trim() }
    }

    fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    fn peek_is_digit_or_sign(&self) -> bool {
        self.rest
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit() || c == '+' || c == '-')
    }

    fn consume(&mut self, c: char) -> bool {
        if self.rest.starts_with(c) {
            self.rest = &self.rest[c.len_utf8()..];
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> TzResult<()> {
        if self.consume(c) {
            Ok(())
        } else {
            Err(TzError::malformed_data().with_message(format!("expected '{c}' in POSIX TZ string")))
        }
    }

    fn abbr(&mut self) -> TzResult<String> {
        if self.consume('<') {
            let end = self
                .rest
                .find('>')
                .ok_or_else(|| TzError::malformed_data().with_message("unterminated '<' abbreviation"))?;
            let abbr = self.rest[..end].to_string();
            self.rest = &self.rest[end + 1..];
            return Ok(abbr);
        }
        let end = self
            .rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(self.rest.len());
        if end < 3 {
            return Err(TzError::malformed_data().with_message("abbreviation must be at least 3 characters"));
        }
        let abbr = self.rest[..end].to_string();
        self.rest = &self.rest[end..];
        Ok(abbr)
    }

    /// Parses a POSIX `[+-]hh[:mm[:ss]]` offset and returns seconds in the
    /// POSIX (west-positive) sign convention.
    fn offset(&mut self, default_hours: i32) -> TzResult<i32> {
        let negative = if self.consume('-') {
            true
        } else {
            self.consume('+');
            false
        };
        let hours = self.number().unwrap_or(default_hours as i64);
        let minutes = if self.consume(':') { self.number().unwrap_or(0) } else { 0 };
        let seconds = if self.consume(':') { self.number().unwrap_or(0) } else { 0 };
        let magnitude = hours * 3600 + minutes * 60 + seconds;
        Ok(if negative { -(magnitude as i32) } else { magnitude as i32 })
    }

    fn number(&mut self) -> Option<i64> {
        let end = self
            .rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(self.rest.len());
        if end == 0 {
            return None;
        }
        let n: i64 = self.rest[..end].parse().ok()?;
        self.rest = &self.rest[end..];
        Some(n)
    }

    fn transition_date_time(&mut self) -> TzResult<TransitionDateTime> {
        let day = self.transition_day()?;
        let time_of_day = if self.consume('/') {
            self.time_of_day()?
        } else {
            DEFAULT_TRANSITION_TIME
        };
        Ok(TransitionDateTime { day, time_of_day })
    }

    fn transition_day(&mut self) -> TzResult<TransitionDay> {
        if self.consume('J') {
            let n = self
                .number()
                .ok_or_else(|| TzError::malformed_data().with_message("expected Julian day number"))?;
            return Ok(TransitionDay::Julian(n as u16));
        }
        if self.consume('M') {
            let month = self
                .number()
                .ok_or_else(|| TzError::malformed_data().with_message("expected month in Mm.w.d rule"))?;
            self.expect('.')?;
            let week = self
                .number()
                .ok_or_else(|| TzError::malformed_data().with_message("expected week in Mm.w.d rule"))?;
            self.expect('.')?;
            let day = self
                .number()
                .ok_or_else(|| TzError::malformed_data().with_message("expected day in Mm.w.d rule"))?;
            return Ok(TransitionDay::MonthWeekDay {
                month: month as u8,
                week: week as u8,
                day: day as u8,
            });
        }
        let n = self
            .number()
            .ok_or_else(|| TzError::malformed_data().with_message("expected a transition day"))?;
        Ok(TransitionDay::JulianZero(n as u16))
    }

    fn time_of_day(&mut self) -> TzResult<i32> {
        // Reuse the offset grammar: POSIX time-of-day shares the
        // `[+-]hh[:mm[:ss]]` shape, sign is permitted but rarely present.
        self.offset(2)
    }
}
