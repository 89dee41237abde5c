//! Date/time columns: pattern translation and the three supported representations.
//!
//! Patterns are written with the familiar letter notation (`yyyy-MM-dd HH:mm:ss`)
//! and translated once, at schema build time, into a `chrono` format string.

use chrono::format::ParseErrorKind;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::coerce::CoercionError;
use crate::schema::{SchemaError, TemporalRepr};

/// A validated date pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatePattern {
    source: String,
    format: String,
    has_time: bool,
    has_offset: bool,
}

impl DatePattern {
    pub fn parse(pattern: &str) -> Result<Self, SchemaError> {
        let Translated {
            format,
            has_time,
            has_offset,
        } = translate(pattern)?;
        Ok(Self {
            source: pattern.to_string(),
            format,
            has_time,
            has_offset,
        })
    }

    /// The pattern as declared.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The equivalent `chrono` format string.
    pub fn format(&self) -> &str {
        &self.format
    }

    fn fail(&self, cell: &str, source: chrono::ParseError) -> CoercionError {
        CoercionError::Temporal {
            value: cell.to_string(),
            pattern: self.source.clone(),
            source,
        }
    }
}

/// A field type a date column can be written into. The implementing type
/// decides which representation the column uses.
pub trait Temporal: Sized + Send + Sync + 'static {
    const REPRESENTATION: TemporalRepr;

    fn parse(cell: &str, pattern: &DatePattern) -> Result<Self, CoercionError>;
}

impl Temporal for NaiveDate {
    const REPRESENTATION: TemporalRepr = TemporalRepr::Date;

    fn parse(cell: &str, pattern: &DatePattern) -> Result<Self, CoercionError> {
        NaiveDate::parse_from_str(cell, pattern.format()).map_err(|e| pattern.fail(cell, e))
    }
}

impl Temporal for NaiveDateTime {
    const REPRESENTATION: TemporalRepr = TemporalRepr::DateTime;

    fn parse(cell: &str, pattern: &DatePattern) -> Result<Self, CoercionError> {
        NaiveDateTime::parse_from_str(cell, pattern.format()).map_err(|e| pattern.fail(cell, e))
    }
}

/// Instants are read in UTC unless the pattern carries an offset. A pattern
/// without any time field yields midnight; one with only some of them
/// (an hour but no minute) is a parse failure.
impl Temporal for DateTime<Utc> {
    const REPRESENTATION: TemporalRepr = TemporalRepr::Instant;

    fn parse(cell: &str, pattern: &DatePattern) -> Result<Self, CoercionError> {
        let format = pattern.format();
        if pattern.has_offset {
            return DateTime::parse_from_str(cell, format)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| pattern.fail(cell, e));
        }
        let naive = match NaiveDateTime::parse_from_str(cell, format) {
            Ok(dt) => dt,
            Err(e) if e.kind() == ParseErrorKind::NotEnough && !pattern.has_time => {
                NaiveDate::parse_from_str(cell, format)
                    .map(|d| d.and_time(NaiveTime::MIN))
                    .map_err(|e| pattern.fail(cell, e))?
            }
            Err(e) => return Err(pattern.fail(cell, e)),
        };
        Ok(Utc.from_utc_datetime(&naive))
    }
}

struct Translated {
    format: String,
    has_time: bool,
    has_offset: bool,
}

/// Supported letters: `y u M L d D H h m s S a E Z X x`. A fraction run
/// (`S` to `SSSSSSSSS`) right after a `.` reads a dot and any number of
/// digits; without the dot only `SSS`, `SSSSSS` and `SSSSSSSSS` are
/// accepted, as fixed widths. `X` runs also accept `Z` for UTC.
fn translate(pattern: &str) -> Result<Translated, SchemaError> {
    let invalid = |reason: String| SchemaError::InvalidPattern {
        pattern: pattern.to_string(),
        reason,
    };

    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut has_time = false;
    let mut has_offset = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            // '' is a literal quote, otherwise quoted text runs to the next quote
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            let mut j = i + 1;
            loop {
                match chars.get(j) {
                    None => return Err(invalid("unterminated quote".into())),
                    Some('\'') if chars.get(j + 1) == Some(&'\'') => {
                        out.push('\'');
                        j += 2;
                    }
                    Some('\'') => break,
                    Some('%') => {
                        out.push_str("%%");
                        j += 1;
                    }
                    Some(&other) => {
                        out.push(other);
                        j += 1;
                    }
                }
            }
            i = j + 1;
            continue;
        }

        if !c.is_ascii_alphabetic() {
            if c == '%' {
                out.push_str("%%");
            } else {
                out.push(c);
            }
            i += 1;
            continue;
        }

        let run = chars[i..].iter().take_while(|&&x| x == c).count();
        has_time |= matches!(c, 'H' | 'h' | 'm' | 's' | 'S' | 'a');
        has_offset |= matches!(c, 'Z' | 'X' | 'x');
        if c == 'S' && (1..=9).contains(&run) && out.ends_with('.') {
            out.pop();
            out.push_str("%.f");
            i += run;
            continue;
        }
        let spec = match (c, run) {
            ('y' | 'u', 2) => "%y",
            ('y' | 'u', _) => "%Y",
            ('M' | 'L', 1 | 2) => "%m",
            ('M' | 'L', 3) => "%b",
            ('M' | 'L', _) => "%B",
            ('d', 1 | 2) => "%d",
            ('D', 1..=3) => "%j",
            ('H', 1 | 2) => "%H",
            ('h', 1 | 2) => "%I",
            ('m', 1 | 2) => "%M",
            ('s', 1 | 2) => "%S",
            ('S', 3) => "%3f",
            ('S', 6) => "%6f",
            ('S', 9) => "%9f",
            ('a', 1) => "%p",
            ('E', 1..=3) => "%a",
            ('E', _) => "%A",
            ('X', 1..=3) => "%#z",
            ('Z', 1..=3) | ('x', 1 | 2) => "%z",
            ('x', 3) => "%:z",
            _ => {
                let field = c.to_string().repeat(run);
                return Err(invalid(format!("unsupported field '{field}'")));
            }
        };
        out.push_str(spec);
        i += run;
    }
    Ok(Translated {
        format: out,
        has_time,
        has_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn translates_common_patterns() {
        let format = |p: &str| translate(p).unwrap().format;
        assert_eq!(format("yyyy-MM-dd HH:mm:ss"), "%Y-%m-%d %H:%M:%S");
        assert_eq!(format("dd/MM/yy"), "%d/%m/%y");
        assert_eq!(format("yyyy-MM-dd'T'HH:mm:ssSSSXXX"), "%Y-%m-%dT%H:%M:%S%3f%#z");
        assert_eq!(format("yyyy-MM-dd'T'HH:mm:ss.SSSxxx"), "%Y-%m-%dT%H:%M:%S%.f%:z");
        assert_eq!(format("d MMM yyyy 'at' h a"), "%d %b %Y at %I %p");
        assert_eq!(format("'o''clock' 100%"), "o'clock 100%%");
    }

    #[test]
    fn unknown_letters_are_rejected() {
        assert!(matches!(translate("yyyy-QQ"), Err(SchemaError::InvalidPattern { .. })));
        assert!(matches!(translate("'open"), Err(SchemaError::InvalidPattern { .. })));
        assert!(matches!(translate("ssSS"), Err(SchemaError::InvalidPattern { .. })));
    }

    #[test]
    fn short_fractions_follow_a_dot() {
        assert_eq!(translate("ss.S").unwrap().format, "%S%.f");
        assert_eq!(translate("ss.SS").unwrap().format, "%S%.f");

        let p = DatePattern::parse("yyyy-MM-dd HH:mm:ss.SS").unwrap();
        let dt = NaiveDateTime::parse("2023-01-05 10:00:00.25", &p).unwrap();
        assert_eq!(dt.nanosecond(), 250_000_000);
    }

    #[test]
    fn time_and_offset_letters_are_tracked() {
        let date_only = translate("yyyy-MM-dd 'at' EEEE").unwrap();
        assert!(!date_only.has_time && !date_only.has_offset);
        assert!(translate("yyyy-MM-dd HH").unwrap().has_time);
        assert!(translate("h a").unwrap().has_time);
        assert!(translate("yyyy-MM-dd Z").unwrap().has_offset);
    }

    #[test]
    fn date_time_representation_parses() {
        let p = DatePattern::parse("yyyy-MM-dd HH:mm:ss").unwrap();
        let dt = NaiveDateTime::parse("2023-01-05 10:00:00", &p).unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day(), dt.hour()), (2023, 1, 5, 10));
    }

    #[test]
    fn date_representation_parses() {
        let p = DatePattern::parse("dd/MM/yyyy").unwrap();
        let d = NaiveDate::parse("05/01/2023", &p).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2023, 1, 5).unwrap());
    }

    #[test]
    fn instant_from_date_only_pattern_is_midnight_utc() {
        let p = DatePattern::parse("yyyy-MM-dd").unwrap();
        let at = <DateTime<Utc>>::parse("2023-01-05", &p).unwrap();
        assert_eq!(at.to_rfc3339(), "2023-01-05T00:00:00+00:00");
    }

    #[test]
    fn instant_keeps_time_fields() {
        let p = DatePattern::parse("yyyy-MM-dd HH:mm:ss").unwrap();
        let at = <DateTime<Utc>>::parse("2023-01-05 10:11:12", &p).unwrap();
        assert_eq!(at.to_rfc3339(), "2023-01-05T10:11:12+00:00");
    }

    #[test]
    fn instant_with_partial_time_fails() {
        let p = DatePattern::parse("yyyy-MM-dd HH").unwrap();
        let err = <DateTime<Utc>>::parse("2023-01-05 10", &p).unwrap_err();
        match err {
            CoercionError::Temporal { value, .. } => assert_eq!(value, "2023-01-05 10"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn instant_accepts_zulu_suffix() {
        let p = DatePattern::parse("yyyy-MM-dd'T'HH:mm:ssXXX").unwrap();
        let at = <DateTime<Utc>>::parse("2023-01-05T10:00:00Z", &p).unwrap();
        assert_eq!(at.to_rfc3339(), "2023-01-05T10:00:00+00:00");
    }

    #[test]
    fn instant_honours_offset() {
        let p = DatePattern::parse("yyyy-MM-dd HH:mm XXX").unwrap();
        let at = <DateTime<Utc>>::parse("2023-01-05 10:00 +02:00", &p).unwrap();
        assert_eq!(at.hour(), 8);
    }

    #[test]
    fn every_representation_surfaces_parse_failures() {
        let p = DatePattern::parse("yyyy-MM-dd").unwrap();
        let temporal =
            |r: Result<(), CoercionError>| matches!(r, Err(CoercionError::Temporal { .. }));
        assert!(temporal(NaiveDate::parse("nope", &p).map(drop)));
        assert!(temporal(<DateTime<Utc>>::parse("nope", &p).map(drop)));
        let p = DatePattern::parse("yyyy-MM-dd HH:mm:ss").unwrap();
        assert!(temporal(NaiveDateTime::parse("2023-01-05", &p).map(drop)));
    }
}
