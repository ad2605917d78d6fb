use std::time::Duration;

use winnow::ascii::multispace0;
use winnow::combinator::{alt, opt};
use winnow::error::{ContextError, ErrMode, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{literal, take_while};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

pub fn ident<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    // First character must be alphabetic or underscore (not digit).
    if !input.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        return Err(ErrMode::Backtrack(ContextError::new()));
    }
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)
}

/// Dotted name, e.g. `acme.ops.live.foo`. A bare ident is also accepted.
pub fn dotted_name(input: &mut &str) -> ModalResult<String> {
    let first = ident.parse_next(input)?;
    let mut name = first.to_string();
    loop {
        if opt(literal(".")).parse_next(input)?.is_some() {
            let next = winnow::combinator::cut_err(ident)
                .context(StrContext::Expected(StrContextValue::Description(
                    "name segment after '.'",
                )))
                .parse_next(input)?;
            name.push('.');
            name.push_str(next);
        } else {
            return Ok(name);
        }
    }
}

// ---------------------------------------------------------------------------
// Strings
// ---------------------------------------------------------------------------

/// Double-quoted string literal.
pub fn dq_string(input: &mut &str) -> ModalResult<String> {
    literal("\"").parse_next(input)?;
    let content = take_while(0.., |c: char| c != '"').parse_next(input)?;
    winnow::combinator::cut_err(literal("\""))
        .context(StrContext::Expected(StrContextValue::Description(
            "closing double quote",
        )))
        .parse_next(input)?;
    Ok(content.to_string())
}

/// Single-quoted string literal. SLQ reserves these for timestamps.
pub fn sq_string(input: &mut &str) -> ModalResult<String> {
    literal("'").parse_next(input)?;
    let content = take_while(0.., |c: char| c != '\'').parse_next(input)?;
    winnow::combinator::cut_err(literal("'"))
        .context(StrContext::Expected(StrContextValue::Description(
            "closing single quote",
        )))
        .parse_next(input)?;
    Ok(content.to_string())
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// Signed integer literal: digits with an optional leading `-`.
/// Backtracks if the digits are followed by a decimal point.
pub fn integer(input: &mut &str) -> ModalResult<i64> {
    let saved = *input;
    let neg = opt(literal("-")).parse_next(input)?.is_some();
    let digits = take_while(1.., |c: char| c.is_ascii_digit()).parse_next(input)?;
    if input.starts_with('.') {
        *input = saved;
        return Err(ErrMode::Backtrack(ContextError::new()));
    }
    let v: i64 = digits.parse().map_err(|_| {
        *input = saved;
        ErrMode::Backtrack(ContextError::new())
    })?;
    Ok(if neg { -v } else { v })
}

/// Float literal: digits, a decimal point, digits. Optional leading `-`.
pub fn float(input: &mut &str) -> ModalResult<f64> {
    let saved = *input;
    let neg = opt(literal("-")).parse_next(input)?.is_some();
    let int_part = take_while(1.., |c: char| c.is_ascii_digit()).parse_next(input)?;
    if opt(literal(".")).parse_next(input)?.is_none() {
        *input = saved;
        return Err(ErrMode::Backtrack(ContextError::new()));
    }
    let frac_part = winnow::combinator::cut_err(take_while(1.., |c: char| c.is_ascii_digit()))
        .context(StrContext::Expected(StrContextValue::Description(
            "digits after decimal point",
        )))
        .parse_next(input)?;
    let s = format!("{int_part}.{frac_part}");
    let v: f64 = s.parse().map_err(|_| ErrMode::Cut(ContextError::new()))?;
    Ok(if neg { -v } else { v })
}

// ---------------------------------------------------------------------------
// Durations
// ---------------------------------------------------------------------------

/// Unit suffix of a duration literal. Returns the unit width.
pub fn duration_unit(input: &mut &str) -> ModalResult<Duration> {
    alt((
        kw("milliseconds").value(Duration::from_millis(1)),
        kw("seconds").value(Duration::from_secs(1)),
        kw("minutes").value(Duration::from_secs(60)),
    ))
    .parse_next(input)
}

/// Duration literal: `INTEGER (milliseconds|seconds|minutes)`.
pub fn duration_value(input: &mut &str) -> ModalResult<Duration> {
    let saved = *input;
    let amount = take_while(1.., |c: char| c.is_ascii_digit()).parse_next(input)?;
    let amount: u32 = amount.parse().map_err(|_| {
        *input = saved;
        ErrMode::Backtrack(ContextError::new())
    })?;
    ws_skip.parse_next(input)?;
    let unit = duration_unit
        .context(StrContext::Expected(StrContextValue::Description(
            "duration unit (milliseconds|seconds|minutes)",
        )))
        .parse_next(input)?;
    Ok(unit * amount)
}

// ---------------------------------------------------------------------------
// Whitespace & comments
// ---------------------------------------------------------------------------

/// Skip whitespace and `# ...` line comments.
pub fn ws_skip(input: &mut &str) -> ModalResult<()> {
    loop {
        let _ = multispace0.parse_next(input)?;
        if opt(literal("#")).parse_next(input)?.is_some() {
            let _ = take_while(0.., |c: char| c != '\n').parse_next(input)?;
        } else {
            break;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Keyword matching with word boundary
// ---------------------------------------------------------------------------

/// Match an exact keyword string, ensuring it's not a prefix of a longer
/// identifier (i.e. the next character is not alphanumeric or `_`).
pub fn kw<'a>(keyword: &'static str) -> impl FnMut(&mut &'a str) -> ModalResult<()> {
    move |input: &mut &'a str| {
        let saved = *input;
        literal(keyword).parse_next(input)?;
        if input.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_') {
            *input = saved;
            return Err(ErrMode::Backtrack(ContextError::new()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn run<T>(mut parser: impl Parser<&'static str, T, ErrMode<ContextError>>, s: &'static str) -> T {
        let mut input = s;
        parser.parse_next(&mut input).unwrap()
    }

    #[test]
    fn ident_rejects_leading_digit() {
        let mut input = "1abc";
        assert!(ident.parse_next(&mut input).is_err());
    }

    #[test]
    fn dotted_name_accepts_four_parts() {
        assert_eq!(run(dotted_name, "acme.ops.live.foo"), "acme.ops.live.foo");
    }

    #[test]
    fn integer_backtracks_on_float() {
        let mut input = "1.5";
        assert!(integer.parse_next(&mut input).is_err());
        assert_eq!(input, "1.5");
    }

    #[test]
    fn negative_numbers() {
        assert_eq!(run(integer, "-42"), -42);
        assert_eq!(run(float, "-1.25"), -1.25);
    }

    #[test]
    fn duration_units() {
        assert_eq!(run(duration_value, "250 milliseconds"), Duration::from_millis(250));
        assert_eq!(run(duration_value, "10 seconds"), Duration::from_secs(10));
        assert_eq!(run(duration_value, "2 minutes"), Duration::from_secs(120));
    }

    #[test]
    fn kw_requires_word_boundary() {
        let mut input = "fromage";
        assert!(kw("from").parse_next(&mut input).is_err());
        assert_eq!(input, "fromage");
    }

    #[test]
    fn ws_skip_eats_comments() {
        let mut input = "  # a comment\n  x";
        ws_skip.parse_next(&mut input).unwrap();
        assert_eq!(input, "x");
    }
}
