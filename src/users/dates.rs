//! The single date-time format used for `dob` and `created_at`,
//! e.g. `2018-11-09T16:22:21+00:00`.

use time::{
    format_description::FormatItem, macros::format_description, OffsetDateTime,
};

pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
);

pub fn parse(value: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value, DATE_FORMAT).ok()
}

/// True only if `value` parses and formats back to the identical string.
pub fn is_exact_date(value: &str) -> bool {
    parse(value)
        .and_then(|date| date.format(DATE_FORMAT).ok())
        .is_some_and(|formatted| formatted == value)
}

pub fn format(date: OffsetDateTime) -> anyhow::Result<String> {
    Ok(date.format(DATE_FORMAT)?)
}

pub fn now() -> anyhow::Result<String> {
    format(OffsetDateTime::now_utc())
}

/// Whole years elapsed between `born` and `now`, measured in the birth offset.
pub fn age_at(born: OffsetDateTime, now: OffsetDateTime) -> i64 {
    let now = now.to_offset(born.offset());
    let mut years = i64::from(now.year() - born.year());
    if (u8::from(now.month()), now.day(), now.time())
        < (u8::from(born.month()), born.day(), born.time())
    {
        years -= 1;
    }
    years
}
