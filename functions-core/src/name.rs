//! Formatting and parsing of the platform's fully-qualified resource names.
//!
//! A function's fully-qualified name has the shape
//! `projects/{project}/locations/{location}/functions/{short}`; a location's is the
//! `projects/{project}/locations/{location}` prefix of that. Both are validated against
//! the regexes below before being accepted anywhere in the system.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Detail, Error};

/// Short function names: a leading letter, then letters/digits/`_`/`-`, ending in an
/// alphanumeric, 2-63 characters total.
pub static FUNCTION_NAME_PATTERN: &str = r"^[A-Za-z][A-Za-z0-9_-]{0,61}[A-Za-z0-9]$";

/// Operation names: `operations/{id}` where `{id}` is lower-case Latin letters, digits,
/// and hyphens.
pub static OPERATION_NAME_PATTERN: &str = r"^operations/[a-z0-9-]+$";

static FUNCTION_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(FUNCTION_NAME_PATTERN).expect("valid function name regex"));

static OPERATION_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9-]+$").expect("valid operation id regex"));

static FQ_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^projects/([^/]+)/locations/([^/]+)/functions/([^/]+)$")
        .expect("valid fully-qualified name regex")
});

static LOCATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^projects/([^/]+)/locations/([^/]+)$").expect("valid location regex")
});

/// A parsed `projects/{project}/locations/{location}` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub project: String,
    pub location: String,
}

/// A parsed `projects/{project}/locations/{location}/functions/{short}` name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub project: String,
    pub location: String,
    pub short: String,
}

/// Validates a short function name against [`FUNCTION_NAME_PATTERN`].
pub fn validate_short_name(short: &str) -> Result<(), Error> {
    if FUNCTION_NAME_RE.is_match(short) {
        Ok(())
    } else {
        Err(Error::invalid_argument(
            format!(
                "Invalid value '{}': Function name must contain only letters, numbers, \
                 underscores or dashes, start with a letter, and end with a letter or a number.",
                short
            ),
            vec![Detail::bad_request("name", "must match the function name pattern")],
        ))
    }
}

/// Validates an operation name (`operations/{id}`) against [`OPERATION_NAME_PATTERN`].
pub fn validate_operation_name(name: &str) -> Result<(), Error> {
    let id = name.strip_prefix("operations/").ok_or_else(|| {
        Error::invalid_argument(
            format!(
                "Invalid value '{}': Operation name must contain only lower case Latin \
                 letters, digits and hyphens (-).",
                name
            ),
            vec![Detail::bad_request("name", "missing operations/ prefix")],
        )
    })?;
    if OPERATION_ID_RE.is_match(id) {
        Ok(())
    } else {
        Err(Error::invalid_argument(
            format!(
                "Invalid value '{}': Operation name must contain only lower case Latin \
                 letters, digits and hyphens (-).",
                name
            ),
            vec![Detail::bad_request("name", "must match the operation id pattern")],
        ))
    }
}

/// Formats a fully-qualified function name from its parts, validating the short name.
pub fn format_name(project: &str, location: &str, short: &str) -> Result<String, Error> {
    validate_short_name(short)?;
    Ok(format!(
        "projects/{}/locations/{}/functions/{}",
        project, location, short
    ))
}

/// Parses a fully-qualified function name into its parts.
pub fn parse_name(fqname: &str) -> Result<ParsedName, Error> {
    let caps = FQ_NAME_RE.captures(fqname).ok_or_else(|| {
        Error::invalid_argument(
            format!(
                "Invalid value '{}': name must match projects/{{project}}/locations/{{location}}/functions/{{name}}.",
                fqname
            ),
            vec![Detail::bad_request("name", "malformed fully-qualified name")],
        )
    })?;
    let short = caps[3].to_string();
    validate_short_name(&short)?;
    Ok(ParsedName {
        project: caps[1].to_string(),
        location: caps[2].to_string(),
        short,
    })
}

/// Formats a `projects/{project}/locations/{location}` prefix.
pub fn format_location(project: &str, location: &str) -> String {
    format!("projects/{}/locations/{}", project, location)
}

/// Parses a `projects/{project}/locations/{location}` prefix.
pub fn parse_location(location: &str) -> Result<Location, Error> {
    let caps = LOCATION_RE.captures(location).ok_or_else(|| {
        Error::invalid_argument(
            format!(
                "Invalid value '{}': location must match projects/{{project}}/locations/{{location}}.",
                location
            ),
            vec![Detail::bad_request("location", "malformed location")],
        )
    })?;
    Ok(Location {
        project: caps[1].to_string(),
        location: caps[2].to_string(),
    })
}

/// Generates a new operation name of the shape `operations/{uuid}`.
pub fn new_operation_name() -> String {
    format!("operations/{}", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_formats_and_parses_a_round_trip() {
        let fqname = format_name("proj", "us-central1", "hello").unwrap();
        assert_eq!(fqname, "projects/proj/locations/us-central1/functions/hello");

        let parsed = parse_name(&fqname).unwrap();
        assert_eq!(parsed.project, "proj");
        assert_eq!(parsed.location, "us-central1");
        assert_eq!(parsed.short, "hello");
    }

    #[test]
    fn it_rejects_short_names_starting_with_a_digit() {
        assert!(format_name("proj", "us-central1", "1hello").is_err());
    }

    #[test]
    fn it_rejects_short_names_ending_with_a_dash() {
        assert!(format_name("proj", "us-central1", "hello-").is_err());
    }

    #[test]
    fn it_accepts_mixed_case_short_names() {
        assert!(validate_short_name("HelloWorld").is_ok());
    }

    #[test]
    fn it_rejects_malformed_fully_qualified_names() {
        assert!(parse_name("not-a-name").is_err());
    }

    #[test]
    fn it_formats_and_parses_locations() {
        let location = format_location("proj", "us-central1");
        assert_eq!(location, "projects/proj/locations/us-central1");
        let parsed = parse_location(&location).unwrap();
        assert_eq!(parsed.project, "proj");
        assert_eq!(parsed.location, "us-central1");
    }

    #[test]
    fn it_validates_operation_names() {
        assert!(validate_operation_name("operations/abc-123").is_ok());
        assert!(validate_operation_name("operations/ABC").is_err());
        assert!(validate_operation_name("abc-123").is_err());
    }

    #[test]
    fn it_generates_well_formed_operation_names() {
        let name = new_operation_name();
        assert!(validate_operation_name(&name).is_ok());
    }
}
