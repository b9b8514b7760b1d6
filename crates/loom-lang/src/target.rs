//! The assignment left-hand-side matcher.
//!
//! The parser and the builder API both go through [`parse_target`], so the two
//! front ends accept exactly the same left-hand sides.

use std::sync::OnceLock;

use regex::Regex;

use crate::ast::{Target, TargetBase};
use crate::error::SyntaxError;

const IDENTIFIER: &str = r"[_A-Za-z][_A-Za-z0-9]*";
const INDEX: &str = r"-?(?:0|[1-9][0-9]*)";

fn lhs_matcher() -> &'static Regex {
    static LHS: OnceLock<Regex> = OnceLock::new();
    LHS.get_or_init(|| {
        let pattern = format!(
            r"^(?P<name1>{id})(?:(?:\[(?P<index>{ix})\])?\.(?P<name2>{id}))?$",
            id = IDENTIFIER,
            ix = INDEX,
        );
        Regex::new(&pattern).expect("lhs pattern is a valid regex")
    })
}

/// Match `lhs` against `name1 [ '[' index ']' ] [ '.' name2 ]`.
///
/// Errors carry the offending text and a column of 1; callers with source
/// positions overwrite `line`/`col`.
pub fn parse_target(lhs: &str) -> Result<Target, SyntaxError> {
    let invalid = || {
        SyntaxError::new(format!("invalid assignment left-hand side {:?}", lhs), 1, 1).with_snippet(lhs)
    };
    let caps = lhs_matcher().captures(lhs).ok_or_else(invalid)?;

    let name1 = caps["name1"].to_string();
    let Some(name2) = caps.name("name2") else {
        return Ok(Target::Name(name1));
    };
    let attr = name2.as_str().to_string();
    let base = match caps.name("index") {
        Some(index) => {
            let index = index.as_str().parse::<i64>().map_err(|_| {
                SyntaxError::new(format!("index {} out of range", index.as_str()), 1, 1).with_snippet(lhs)
            })?;
            TargetBase::Index { name: name1, index }
        }
        None => TargetBase::Name(name1),
    };
    Ok(Target::Getattr { base, attr })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name() {
        assert_eq!(parse_target("slider").unwrap(), Target::Name("slider".into()));
    }

    #[test]
    fn name_dot_attr() {
        assert_eq!(
            parse_target("slider.value").unwrap(),
            Target::Getattr { base: TargetBase::Name("slider".into()), attr: "value".into() }
        );
    }

    #[test]
    fn indexed_attr() {
        assert_eq!(
            parse_target("items[2].value").unwrap(),
            Target::Getattr { base: TargetBase::Index { name: "items".into(), index: 2 }, attr: "value".into() }
        );
        assert_eq!(
            parse_target("items[-1].value").unwrap(),
            Target::Getattr { base: TargetBase::Index { name: "items".into(), index: -1 }, attr: "value".into() }
        );
        assert!(parse_target("items[0].value").is_ok());
    }

    #[test]
    fn rejected_shapes() {
        for bad in ["a.b.c", "a[x]", "a[1]", "a[x].b", "1a", "a.", "a[01].b", "", "a .b", "a[99999999999999999999].b"] {
            let err = parse_target(bad).unwrap_err();
            assert_eq!(err.snippet.as_deref(), Some(bad));
        }
    }
}
