//! Tokenizer for the loader's SQL subset.
//!
//! The grammar the evaluator accepts is the closed set of statements the
//! loader emits, so the token inventory is small: quoted identifiers, string
//! and numeric literals, bare words, and a handful of operators.

use std::sync::OnceLock;

use regex::Regex;

/// One lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `"identifier"`
    Quoted(String),
    /// `'string'` with `''` unescaped.
    Str(String),
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// Bare word: keyword, alias, or function name.
    Word(String),
    /// Operator or punctuation.
    Sym(String),
}

impl Token {
    /// Whether this is the given keyword, case-insensitively.
    #[must_use]
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }
}

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^\s*(?:"(?P<quoted>[^"]*)"|'(?P<str>(?:[^']|'')*)'|(?P<float>-?\d+\.\d+)|(?P<int>-?\d+)|(?P<word>[A-Za-z_][A-Za-z0-9_]*)|(?P<sym><=|>=|<>|[=<>(),.*]))"#,
        )
        .expect("token pattern")
    })
}

/// Split `sql` into tokens.
pub fn tokenize(sql: &str) -> Result<Vec<Token>, String> {
    let mut rest = sql;
    let mut tokens = Vec::new();
    while !rest.trim_start().is_empty() {
        let Some(caps) = token_regex().captures(rest) else {
            let tail: String = rest.trim_start().chars().take(20).collect();
            return Err(format!("unrecognized syntax near {tail:?}"));
        };
        let token = if let Some(m) = caps.name("quoted") {
            Token::Quoted(m.as_str().to_string())
        } else if let Some(m) = caps.name("str") {
            Token::Str(m.as_str().replace("''", "'"))
        } else if let Some(m) = caps.name("float") {
            Token::Float(
                m.as_str()
                    .parse()
                    .map_err(|_| format!("bad float literal {:?}", m.as_str()))?,
            )
        } else if let Some(m) = caps.name("int") {
            Token::Int(
                m.as_str()
                    .parse()
                    .map_err(|_| format!("bad integer literal {:?}", m.as_str()))?,
            )
        } else if let Some(m) = caps.name("word") {
            Token::Word(m.as_str().to_string())
        } else if let Some(m) = caps.name("sym") {
            Token::Sym(m.as_str().to_string())
        } else {
            return Err("empty token match".to_string());
        };
        tokens.push(token);
        rest = &rest[caps.get(0).map_or(0, |m| m.end())..];
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_basic_select() {
        let tokens = tokenize("Select A.\"id\" From \"T\" A Where A.\"id\"=3").unwrap();
        assert_eq!(tokens[0], Token::Word("Select".to_string()));
        assert_eq!(tokens[1], Token::Word("A".to_string()));
        assert_eq!(tokens[2], Token::Sym(".".to_string()));
        assert_eq!(tokens[3], Token::Quoted("id".to_string()));
        assert!(tokens[4].is_keyword("from"));
        assert_eq!(tokens.last(), Some(&Token::Int(3)));
    }

    #[test]
    fn test_tokenize_literals() {
        let tokens = tokenize("'o''brien' -4 2.5 <= <>").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Str("o'brien".to_string()),
                Token::Int(-4),
                Token::Float(2.5),
                Token::Sym("<=".to_string()),
                Token::Sym("<>".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_rejects_garbage() {
        assert!(tokenize("Select ;;;").is_err());
    }
}
