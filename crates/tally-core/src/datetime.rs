use anyhow::{Context, anyhow};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Parse a user-typed deadline expression into UTC. Calendar inputs are read
/// as local time.
///
/// Accepted forms: `now`, `today`, `tomorrow`, `YYYY-MM-DD`,
/// `YYYY-MM-DDTHH:MM` (a space also works), and relative `+Nd` / `+Nh` /
/// `+Nm` offsets from now.
pub fn parse_deadline(input: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    let token = input.trim();
    let lower = token.to_ascii_lowercase();

    match lower.as_str() {
        "now" => return Ok(now),
        "today" => {
            let date = now.with_timezone(&Local).date_naive();
            return local_midnight(date);
        }
        "tomorrow" => {
            let today = parse_deadline("today", now)?;
            return Ok(today + Duration::days(1));
        }
        _ => {}
    }

    if let Some(rest) = token.strip_prefix('+') {
        return parse_relative(rest, now);
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(token, "%Y-%m-%dT%H:%M") {
        return local_to_utc(naive);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(token, "%Y-%m-%d %H:%M") {
        return local_to_utc(naive);
    }
    if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        return local_midnight(date);
    }

    Err(anyhow!("unrecognized deadline expression: {token}"))
}

fn parse_relative(rest: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    let rest = rest.trim();
    let (digits, unit) = rest.split_at(rest.len().saturating_sub(1));
    let amount: i64 = digits
        .parse()
        .with_context(|| format!("invalid relative deadline: +{rest}"))?;

    let offset = match unit {
        "d" => Duration::try_days(amount),
        "h" => Duration::try_hours(amount),
        "m" => Duration::try_minutes(amount),
        other => return Err(anyhow!("unknown relative unit '{other}' (expected d, h or m)")),
    };
    let offset = offset.ok_or_else(|| anyhow!("invalid relative deadline: +{rest}"))?;
    Ok(now + offset)
}

fn local_midnight(date: NaiveDate) -> anyhow::Result<DateTime<Utc>> {
    let naive = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("failed to construct midnight for {date}"))?;
    local_to_utc(naive)
}

fn local_to_utc(naive: NaiveDateTime) -> anyhow::Result<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("local time {naive} does not exist"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_and_relative_offsets() {
        let now = Utc::now();
        assert_eq!(parse_deadline("now", now).expect("parse"), now);
        assert_eq!(
            parse_deadline("+2d", now).expect("parse"),
            now + Duration::days(2)
        );
        assert_eq!(
            parse_deadline("+3h", now).expect("parse"),
            now + Duration::hours(3)
        );
        assert_eq!(
            parse_deadline("+45m", now).expect("parse"),
            now + Duration::minutes(45)
        );
    }

    #[test]
    fn calendar_forms_parse() {
        let now = Utc::now();
        assert!(parse_deadline("2026-09-01", now).is_ok());
        assert!(parse_deadline("2026-09-01T18:30", now).is_ok());
        assert!(parse_deadline("2026-09-01 18:30", now).is_ok());
    }

    #[test]
    fn tomorrow_is_a_day_past_today() {
        let now = Utc::now();
        let today = parse_deadline("today", now).expect("today");
        let tomorrow = parse_deadline("tomorrow", now).expect("tomorrow");
        assert_eq!(tomorrow - today, Duration::days(1));
    }

    #[test]
    fn junk_is_rejected() {
        let now = Utc::now();
        assert!(parse_deadline("someday", now).is_err());
        assert!(parse_deadline("+5x", now).is_err());
        assert!(parse_deadline("+d", now).is_err());
    }

    #[test]
    fn absurd_relative_offsets_error_instead_of_panicking() {
        let now = Utc::now();
        assert!(parse_deadline("+9999999999999999d", now).is_err());
        assert!(parse_deadline("+9223372036854775807h", now).is_err());
        assert!(parse_deadline("+99999999999999999999m", now).is_err());
    }
}
