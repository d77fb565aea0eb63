//! Access token expiry parsing
//!
//! Parses a human-supplied duration expression ("1h", "30m", "3600") into
//! whole seconds with defensive defaulting. The edge-case policy here is a
//! protocol contract:
//!
//! - unparseable / empty            -> default 3600s (warn)
//! - value <= 0                     -> default 3600s
//! - value > 30 days                -> default 3600s (too large, not clamped)
//! - value < 60s                    -> clamp up to 60s
//!
//! Pure aside from logging; callers evaluate it fresh on every issuance so a
//! changed expression takes effect without restart.

/// Default access token TTL: one hour.
pub const DEFAULT_EXPIRY_SECONDS: i64 = 3600;

/// Minimum usable TTL; shorter values are clamped, not defaulted.
pub const MIN_EXPIRY_SECONDS: i64 = 60;

/// Maximum TTL: 30 days. Anything larger falls back to the default.
pub const MAX_EXPIRY_SECONDS: i64 = 86_400 * 30;

/// Parse an expiry expression into whole seconds.
///
/// Accepts a bare integer (seconds) or `<integer><unit>` with unit one of
/// s/sec/second/seconds, m/min/minute/minutes, h/hr/hour/hours, d/day/days.
/// Case-insensitive; surrounding whitespace is ignored.
pub fn parse_expiry(expression: &str) -> i64 {
    let normalized = expression.trim().to_ascii_lowercase();

    if normalized.is_empty() {
        tracing::warn!(default = DEFAULT_EXPIRY_SECONDS, "Empty expiry expression, using default");
        return DEFAULT_EXPIRY_SECONDS;
    }

    // Bare integer: already seconds.
    if let Ok(seconds) = normalized.parse::<i64>() {
        return validate_seconds(seconds, &normalized);
    }

    let digits_end = normalized
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(normalized.len());
    let (digits, rest) = normalized.split_at(digits_end);
    let unit = rest.trim_start();

    let value: i64 = match digits.parse() {
        Ok(v) => v,
        Err(_) => {
            tracing::warn!(
                provided = %expression,
                default = DEFAULT_EXPIRY_SECONDS,
                "Unparseable expiry expression, using default"
            );
            return DEFAULT_EXPIRY_SECONDS;
        }
    };

    let multiplier: i64 = match unit {
        "s" | "sec" | "second" | "seconds" => 1,
        "m" | "min" | "minute" | "minutes" => 60,
        "h" | "hr" | "hour" | "hours" => 3_600,
        "d" | "day" | "days" => 86_400,
        _ => {
            tracing::warn!(
                provided = %expression,
                default = DEFAULT_EXPIRY_SECONDS,
                "Unknown expiry unit, using default"
            );
            return DEFAULT_EXPIRY_SECONDS;
        }
    };

    match value.checked_mul(multiplier) {
        Some(seconds) => validate_seconds(seconds, &normalized),
        None => {
            tracing::warn!(provided = %expression, "Expiry expression overflows, using default");
            DEFAULT_EXPIRY_SECONDS
        }
    }
}

fn validate_seconds(seconds: i64, provided: &str) -> i64 {
    if seconds <= 0 {
        tracing::warn!(provided = %provided, "Non-positive expiry, using default");
        return DEFAULT_EXPIRY_SECONDS;
    }
    if seconds > MAX_EXPIRY_SECONDS {
        tracing::warn!(
            provided = %provided,
            maximum = MAX_EXPIRY_SECONDS,
            "Expiry too long, using default"
        );
        return DEFAULT_EXPIRY_SECONDS;
    }
    if seconds < MIN_EXPIRY_SECONDS {
        tracing::warn!(
            provided = %provided,
            minimum = MIN_EXPIRY_SECONDS,
            "Expiry too short, clamping to minimum"
        );
        return MIN_EXPIRY_SECONDS;
    }
    seconds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_expressions() {
        assert_eq!(parse_expiry("1h"), 3600);
        assert_eq!(parse_expiry("30m"), 1800);
        assert_eq!(parse_expiry("7d"), 604_800);
        assert_eq!(parse_expiry("2hr"), 7200);
        assert_eq!(parse_expiry("120seconds"), 120);
        assert_eq!(parse_expiry("5 min"), 300);
    }

    #[test]
    fn test_bare_integer_is_seconds() {
        assert_eq!(parse_expiry("3600"), 3600);
        assert_eq!(parse_expiry("120"), 120);
    }

    #[test]
    fn test_case_and_whitespace() {
        assert_eq!(parse_expiry(" 1H "), 3600);
        assert_eq!(parse_expiry("30M"), 1800);
    }

    #[test]
    fn test_too_short_is_clamped_not_defaulted() {
        assert_eq!(parse_expiry("45s"), 60);
        assert_eq!(parse_expiry("1s"), 60);
        assert_eq!(parse_expiry("45"), 60);
    }

    #[test]
    fn test_too_long_is_defaulted_not_clamped() {
        assert_eq!(parse_expiry("999d"), 3600);
        assert_eq!(parse_expiry("31d"), 3600);
        assert_eq!(parse_expiry(&(86_400 * 30 + 1).to_string()), 3600);
    }

    #[test]
    fn test_boundary_values() {
        assert_eq!(parse_expiry("30d"), 86_400 * 30);
        assert_eq!(parse_expiry("60"), 60);
        assert_eq!(parse_expiry("1m"), 60);
    }

    #[test]
    fn test_invalid_falls_back_to_default() {
        assert_eq!(parse_expiry(""), 3600);
        assert_eq!(parse_expiry("   "), 3600);
        assert_eq!(parse_expiry("soon"), 3600);
        assert_eq!(parse_expiry("1w"), 3600);
        assert_eq!(parse_expiry("h1"), 3600);
        assert_eq!(parse_expiry("-5"), 3600);
        assert_eq!(parse_expiry("0"), 3600);
        assert_eq!(parse_expiry("0h"), 3600);
        assert_eq!(parse_expiry("99999999999999999999d"), 3600);
    }
}
