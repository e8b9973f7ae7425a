//! The two auxiliary mini-languages: parameter files (dotted
//! designators with optional literal values, used to override config
//! from the outside) and target lists.

use crate::syntax::ast::RawValue;
use crate::syntax::lexer::{tokenize, Token};
use crate::syntax::ParseError;

/// One `desig [= value]` override; a bare designator means `true`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamOverride {
    pub desig: Vec<String>,
    pub value: RawValue,
}

/// Parse a parameter list: whitespace-separated
/// `desig [= value] [;]` pairs.
pub fn parse_params(input: &str) -> Result<Vec<ParamOverride>, ParseError> {
    let tokens = tokenize(input)?;
    let mut out = Vec::new();
    let mut pos = 0;

    while pos < tokens.len() {
        if tokens[pos].token == Token::Semi {
            pos += 1;
            continue;
        }
        let mut desig = Vec::new();
        loop {
            match &tokens.get(pos).map(|s| &s.token) {
                Some(Token::Ident(name)) => {
                    desig.push(name.clone());
                    pos += 1;
                }
                _ => {
                    let (row, col) = tokens
                        .get(pos)
                        .map(|s| (s.row, s.col))
                        .unwrap_or((1, 1));
                    return Err(ParseError::new("expected designator", row, col));
                }
            }
            if tokens.get(pos).map(|s| &s.token) == Some(&Token::Dot) {
                pos += 1;
            } else {
                break;
            }
        }
        let value = if tokens.get(pos).map(|s| &s.token) == Some(&Token::Eq) {
            pos += 1;
            let spanned = tokens.get(pos).ok_or_else(|| {
                let last = tokens.last().unwrap();
                ParseError::new("expected a value", last.row, last.col)
            })?;
            pos += 1;
            match &spanned.token {
                Token::Str(s) => RawValue::Str(s.clone()),
                Token::Int(i) => RawValue::Int(*i),
                Token::Real(r) => RawValue::Real(*r),
                Token::Symbol(s) => RawValue::Symbol(s.clone()),
                Token::Path(p) => RawValue::Path(p.clone()),
                Token::Ident(w) if w == "true" => RawValue::Bool(true),
                Token::Ident(w) if w == "false" => RawValue::Bool(false),
                other => {
                    return Err(ParseError::new(
                        format!("expected a literal, found {}", other),
                        spanned.row,
                        spanned.col,
                    ));
                }
            }
        } else {
            RawValue::Bool(true)
        };
        out.push(ParamOverride { desig, value });
    }
    Ok(out)
}

/// Parse a target list: whitespace-separated identifiers.
pub fn parse_targets(input: &str) -> Result<Vec<String>, ParseError> {
    let mut out = Vec::new();
    for (nr, line) in input.lines().enumerate() {
        for word in line.split_whitespace() {
            let ok = word
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
                && word.chars().next().map(|c| !c.is_ascii_digit()).unwrap_or(false);
            if !ok {
                return Err(ParseError::new(
                    format!("`{}` is not a target name", word),
                    nr as u32 + 1,
                    1,
                ));
            }
            out.push(word.to_string());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides() {
        let p = parse_params("hello.cflags = \"-O3\"; moc_path = /opt/qt/moc verbose").unwrap();
        assert_eq!(p.len(), 3);
        assert_eq!(p[0].desig, vec!["hello", "cflags"]);
        assert_eq!(p[0].value, RawValue::Str("-O3".into()));
        assert_eq!(p[1].value, RawValue::Path("/opt/qt/moc".into()));
        assert_eq!(p[2].desig, vec!["verbose"]);
        assert_eq!(p[2].value, RawValue::Bool(true));
    }

    #[test]
    fn parses_target_lists() {
        assert_eq!(
            parse_targets(" hello   world\nlib1 ").unwrap(),
            vec!["hello", "world", "lib1"]
        );
        assert!(parse_targets("a b/c").is_err());
    }
}
