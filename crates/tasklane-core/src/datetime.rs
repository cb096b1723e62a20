use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  Local,
  NaiveDate,
  TimeDelta,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

/// Timezone in which "today" and relative date expressions are evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Zone {
  Local,
  Named(Tz)
}

impl Zone {
  /// Resolves the configured IANA id; empty or invalid falls back to the
  /// system local zone.
  pub fn from_config(
    raw: Option<&str>
  ) -> Self {
    let Some(raw) = raw else {
      return Self::Local;
    };
    let trimmed = raw.trim();
    if trimmed.is_empty()
      || trimmed
        .eq_ignore_ascii_case("local")
    {
      return Self::Local;
    }

    match trimmed.parse::<Tz>() {
      | Ok(tz) => {
        tracing::debug!(
          timezone = %trimmed,
          "configured timezone"
        );
        Self::Named(tz)
      }
      | Err(err) => {
        tracing::warn!(
          timezone = %trimmed,
          error = %err,
          "failed to parse timezone id; using local time"
        );
        Self::Local
      }
    }
  }

  #[must_use]
  pub fn today(
    &self,
    now: DateTime<Utc>
  ) -> NaiveDate {
    match self {
      | Self::Local => {
        now
          .with_timezone(&Local)
          .date_naive()
      }
      | Self::Named(tz) => {
        now.with_timezone(tz).date_naive()
      }
    }
  }
}

#[must_use]
pub fn format_date(
  date: NaiveDate
) -> String {
  date.format("%Y-%m-%d").to_string()
}

fn relative_re() -> &'static Regex {
  static RE: OnceLock<Regex> =
    OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(
      r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dw])$"
    )
    .unwrap_or_else(|err| {
      unreachable!(
        "static regex is valid: {err}"
      )
    })
  })
}

/// Parses a due-date expression relative to `today`.
///
/// Accepts `YYYY-MM-DD`, `today`, `tomorrow`, `yesterday`, `+Nd`, `-Nd`,
/// `+Nw` and weekday names (the next such day, never today).
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return shift(today, 1);
    }
    | "yesterday" => {
      return shift(today, -1);
    }
    | _ => {}
  }

  if let Some(caps) =
    relative_re().captures(&lower)
  {
    let num: i64 = caps["num"]
      .parse()
      .context("relative offset out of range")?;
    let sign = if &caps["sign"] == "-" {
      -1
    } else {
      1
    };
    let days = match &caps["unit"] {
      | "w" => num.checked_mul(7),
      | _ => Some(num)
    }
    .and_then(|d| d.checked_mul(sign))
    .ok_or_else(|| {
      anyhow!(
        "relative offset '{token}' is \
         out of range"
      )
    })?;
    return shift(today, days);
  }

  if let Some(weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today, weekday
    ));
  }

  NaiveDate::parse_from_str(
    token, "%Y-%m-%d"
  )
  .with_context(|| {
    format!(
      "unrecognized date '{token}'; \
       use YYYY-MM-DD, today, \
       tomorrow, +3d or a weekday"
    )
  })
}

/// Parses `YYYY-MM` into the first day of that month.
pub fn parse_month(
  input: &str
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let (year, month) = token
    .split_once('-')
    .ok_or_else(|| {
      anyhow!(
        "expected YYYY-MM, got '{token}'"
      )
    })?;
  let year: i32 =
    year.parse().with_context(|| {
      format!("invalid year in '{token}'")
    })?;
  let month: u32 =
    month.parse().with_context(|| {
      format!(
        "invalid month in '{token}'"
      )
    })?;
  NaiveDate::from_ymd_opt(year, month, 1)
    .ok_or_else(|| {
      anyhow!(
        "month out of range: '{token}'"
      )
    })
}

fn shift(
  date: NaiveDate,
  days: i64
) -> anyhow::Result<NaiveDate> {
  TimeDelta::try_days(days)
    .and_then(|delta| {
      date.checked_add_signed(delta)
    })
    .ok_or_else(|| {
      anyhow!(
        "date offset of {days} days is \
         out of range"
      )
    })
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_signed(Duration::days(
      delta
    ))
    .unwrap_or(from)
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    Zone,
    parse_date_expr,
    parse_month
  };

  fn tuesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, 17)
      .expect("valid date")
  }

  #[test]
  fn parses_iso_date() {
    let parsed = parse_date_expr(
      "2026-03-05",
      tuesday()
    )
    .expect("parse iso");
    assert_eq!(
      parsed.to_string(),
      "2026-03-05"
    );
  }

  #[test]
  fn parses_named_days() {
    assert_eq!(
      parse_date_expr("Tomorrow", tuesday())
        .expect("tomorrow")
        .to_string(),
      "2026-02-18"
    );
    assert_eq!(
      parse_date_expr("today", tuesday())
        .expect("today"),
      tuesday()
    );
  }

  #[test]
  fn parses_relative_offsets() {
    assert_eq!(
      parse_date_expr("+3d", tuesday())
        .expect("+3d")
        .to_string(),
      "2026-02-20"
    );
    assert_eq!(
      parse_date_expr("-1w", tuesday())
        .expect("-1w")
        .to_string(),
      "2026-02-10"
    );
  }

  #[test]
  fn weekday_name_is_never_today() {
    assert_eq!(
      parse_date_expr("wednesday", tuesday())
        .expect("wednesday")
        .to_string(),
      "2026-02-18"
    );
    assert_eq!(
      parse_date_expr("tue", tuesday())
        .expect("tue")
        .to_string(),
      "2026-02-24"
    );
  }

  #[test]
  fn rejects_garbage() {
    assert!(
      parse_date_expr("someday", tuesday())
        .is_err()
    );
    assert!(parse_month("2026-13").is_err());
    assert_eq!(
      parse_month("2026-10")
        .expect("month")
        .to_string(),
      "2026-10-01"
    );
  }

  #[test]
  fn huge_offsets_are_errors() {
    for expr in [
      "+200000000000000d",
      "+2000000000000000000w",
      "-9223372036854775807w"
    ] {
      let err = parse_date_expr(
        expr,
        tuesday()
      )
      .expect_err(expr);
      assert!(
        err
          .to_string()
          .contains("out of range"),
        "{expr}: {err}"
      );
    }
  }

  #[test]
  fn named_zone_moves_today_across_midnight() {
    let now = Utc
      .with_ymd_and_hms(
        2026, 10, 16, 20, 0, 0
      )
      .single()
      .expect("valid now");
    let tokyo =
      Zone::from_config(Some("Asia/Tokyo"));
    assert_eq!(
      tokyo.today(now).to_string(),
      "2026-10-17"
    );
    assert_eq!(
      Zone::from_config(Some("Not/AZone")),
      Zone::Local
    );
  }
}
