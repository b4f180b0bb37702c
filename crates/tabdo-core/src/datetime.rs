use chrono::{
  DateTime,
  Local,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  Offset,
  TimeDelta,
  TimeZone,
  Utc
};

const DATE_TIME_FORMATS: [&str; 2] = [
  "%Y-%m-%dT%H:%M:%S",
  "%Y-%m-%dT%H:%M"
];

/// Parses the forms a date or
/// datetime input produces, plus RFC
/// 3339, into one instant so mixed
/// forms order correctly. Values
/// without an offset are local time;
/// a bare date is local midnight.
#[must_use]
pub fn parse_due(
  raw: &str
) -> Option<DateTime<Utc>> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      trimmed, "%Y-%m-%d"
    )
  {
    return local_to_utc(
      date.and_time(NaiveTime::MIN)
    );
  }

  for format in DATE_TIME_FORMATS {
    if let Ok(dt) =
      NaiveDateTime::parse_from_str(
        trimmed, format
      )
    {
      return local_to_utc(dt);
    }
  }

  DateTime::parse_from_rfc3339(trimmed)
    .ok()
    .map(|dt| dt.with_timezone(&Utc))
}

/// A wall-clock time skipped by a DST
/// change has no local instant; it
/// takes the offset in force at that
/// moment in UTC instead.
fn local_to_utc(
  naive: NaiveDateTime
) -> Option<DateTime<Utc>> {
  if let Some(dt) = Local
    .from_local_datetime(&naive)
    .earliest()
  {
    return Some(
      dt.with_timezone(&Utc)
    );
  }

  let offset = Local
    .offset_from_utc_datetime(&naive)
    .fix()
    .local_minus_utc();
  naive
    .checked_sub_signed(
      TimeDelta::seconds(i64::from(
        offset
      ))
    )
    .map(|dt| dt.and_utc())
}
