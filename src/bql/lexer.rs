//! BQL lexer — tokenizes a query string.

use crate::{Error, Result};

/// A token from the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub text: String,
}

/// Source span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Keywords
    Match, Create, Merge, Set, Delete, Detach, Return, Where, On,
    And, Or, Not, Xor, Is, Null,
    Contains, Starts, Ends, With,

    // Literals
    Integer, StringLiteral,

    // Identifiers
    Identifier,

    // Punctuation
    LParen, RParen, LBrace, RBrace,
    Colon, Comma, Dot, DotDot,
    Eq,
    Similar,    // =~
    Dash,       // -
    Arrow,      // ->
    LBracket, RBracket,
    Pipe, Star,

    Eof,
}

impl TokenKind {
    /// Human-readable name for expected-token lists in parse errors.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Match => "MATCH",
            TokenKind::Create => "CREATE",
            TokenKind::Merge => "MERGE",
            TokenKind::Set => "SET",
            TokenKind::Delete => "DELETE",
            TokenKind::Detach => "DETACH",
            TokenKind::Return => "RETURN",
            TokenKind::Where => "WHERE",
            TokenKind::On => "ON",
            TokenKind::And => "AND",
            TokenKind::Or => "OR",
            TokenKind::Not => "NOT",
            TokenKind::Xor => "XOR",
            TokenKind::Is => "IS",
            TokenKind::Null => "NULL",
            TokenKind::Contains => "CONTAINS",
            TokenKind::Starts => "STARTS",
            TokenKind::Ends => "ENDS",
            TokenKind::With => "WITH",
            TokenKind::Integer => "an integer",
            TokenKind::StringLiteral => "a string literal",
            TokenKind::Identifier => "an identifier",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::Colon => "':'",
            TokenKind::Comma => "','",
            TokenKind::Dot => "'.'",
            TokenKind::DotDot => "'..'",
            TokenKind::Eq => "'='",
            TokenKind::Similar => "'=~'",
            TokenKind::Dash => "'-'",
            TokenKind::Arrow => "'->'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Pipe => "'|'",
            TokenKind::Star => "'*'",
            TokenKind::Eof => "end of query",
        }
    }
}

/// Tokenize a BQL query string.
///
/// Keywords are case-insensitive; identifiers and type labels are
/// case-sensitive. Whitespace and `--` line comments are ignored, but a
/// `-->` sequence is relation syntax, not a comment.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => { chars.next(); }

            // String literals: double quotes, \" and \\ escapes only
            '"' => {
                chars.next();
                let start = pos;
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some((_, '\\')) => match chars.next() {
                            Some((_, '"')) => s.push('"'),
                            Some((_, '\\')) => s.push('\\'),
                            Some((_, c)) => { s.push('\\'); s.push(c); }
                            None => return Err(Error::Parse {
                                position: start,
                                message: "unterminated string literal".into(),
                            }),
                        },
                        Some((end, '"')) => {
                            tokens.push(Token {
                                kind: TokenKind::StringLiteral,
                                span: Span { start, end: end + 1 },
                                text: s,
                            });
                            break;
                        }
                        Some((_, c)) => s.push(c),
                        None => return Err(Error::Parse {
                            position: start,
                            message: "unterminated string literal".into(),
                        }),
                    }
                }
            }

            // Integers (hop counts)
            c if c.is_ascii_digit() => {
                let start = pos;
                let mut num = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_digit() {
                        num.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Integer,
                    span: Span { start, end: start + num.len() },
                    text: num,
                });
            }

            // Identifiers and keywords
            c if c.is_alphabetic() || c == '_' => {
                let start = pos;
                let mut ident = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let kind = keyword_or_ident(&ident);
                tokens.push(Token {
                    kind,
                    span: Span { start, end: start + ident.len() },
                    text: ident,
                });
            }

            '(' => { chars.next(); tokens.push(punct(TokenKind::LParen, pos, "(")); }
            ')' => { chars.next(); tokens.push(punct(TokenKind::RParen, pos, ")")); }
            '{' => { chars.next(); tokens.push(punct(TokenKind::LBrace, pos, "{")); }
            '}' => { chars.next(); tokens.push(punct(TokenKind::RBrace, pos, "}")); }
            '[' => { chars.next(); tokens.push(punct(TokenKind::LBracket, pos, "[")); }
            ']' => { chars.next(); tokens.push(punct(TokenKind::RBracket, pos, "]")); }
            ',' => { chars.next(); tokens.push(punct(TokenKind::Comma, pos, ",")); }
            ':' => { chars.next(); tokens.push(punct(TokenKind::Colon, pos, ":")); }
            '|' => { chars.next(); tokens.push(punct(TokenKind::Pipe, pos, "|")); }
            '*' => { chars.next(); tokens.push(punct(TokenKind::Star, pos, "*")); }

            '.' => {
                chars.next();
                if matches!(chars.peek(), Some(&(_, '.'))) {
                    chars.next();
                    tokens.push(punct(TokenKind::DotDot, pos, ".."));
                } else {
                    tokens.push(punct(TokenKind::Dot, pos, "."));
                }
            }

            '=' => {
                chars.next();
                if matches!(chars.peek(), Some(&(_, '~'))) {
                    chars.next();
                    tokens.push(punct(TokenKind::Similar, pos, "=~"));
                } else {
                    tokens.push(punct(TokenKind::Eq, pos, "="));
                }
            }

            '-' => {
                chars.next();
                match chars.peek() {
                    // ->
                    Some(&(_, '>')) => {
                        chars.next();
                        tokens.push(punct(TokenKind::Arrow, pos, "->"));
                    }
                    // "--" starts a line comment unless it is the head of "-->"
                    Some(&(_, '-')) => {
                        if matches!(chars.clone().nth(1), Some((_, '>'))) {
                            tokens.push(punct(TokenKind::Dash, pos, "-"));
                        } else {
                            while chars.peek().map_or(false, |&(_, c)| c != '\n') {
                                chars.next();
                            }
                        }
                    }
                    _ => tokens.push(punct(TokenKind::Dash, pos, "-")),
                }
            }

            other => {
                return Err(Error::Parse {
                    position: pos,
                    message: format!("unexpected character '{other}'"),
                });
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span { start: input.len(), end: input.len() },
        text: String::new(),
    });

    Ok(tokens)
}

fn punct(kind: TokenKind, pos: usize, text: &str) -> Token {
    Token {
        kind,
        span: Span { start: pos, end: pos + text.len() },
        text: text.to_string(),
    }
}

fn keyword_or_ident(s: &str) -> TokenKind {
    match s.to_uppercase().as_str() {
        "MATCH" => TokenKind::Match,
        "CREATE" => TokenKind::Create,
        "MERGE" => TokenKind::Merge,
        "SET" => TokenKind::Set,
        "DELETE" => TokenKind::Delete,
        "DETACH" => TokenKind::Detach,
        "RETURN" => TokenKind::Return,
        "WHERE" => TokenKind::Where,
        "ON" => TokenKind::On,
        "AND" => TokenKind::And,
        "OR" => TokenKind::Or,
        "NOT" => TokenKind::Not,
        "XOR" => TokenKind::Xor,
        "IS" => TokenKind::Is,
        "NULL" => TokenKind::Null,
        "CONTAINS" => TokenKind::Contains,
        "STARTS" => TokenKind::Starts,
        "ENDS" => TokenKind::Ends,
        "WITH" => TokenKind::With,
        _ => TokenKind::Identifier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_match() {
        let tokens = tokenize("MATCH (n) RETURN n").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![
            TokenKind::Match,
            TokenKind::LParen,
            TokenKind::Identifier,
            TokenKind::RParen,
            TokenKind::Return,
            TokenKind::Identifier,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let tokens = tokenize("match (n) return n").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Match);
        assert_eq!(tokens[4].kind, TokenKind::Return);
    }

    #[test]
    fn relationship_syntax() {
        let tokens = tokenize("(a)-[:CHILD*1..3]->(b)").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![
            TokenKind::LParen,
            TokenKind::Identifier, // a
            TokenKind::RParen,
            TokenKind::Dash,
            TokenKind::LBracket,
            TokenKind::Colon,
            TokenKind::Identifier, // CHILD
            TokenKind::Star,
            TokenKind::Integer,
            TokenKind::DotDot,
            TokenKind::Integer,
            TokenKind::RBracket,
            TokenKind::Arrow,
            TokenKind::LParen,
            TokenKind::Identifier, // b
            TokenKind::RParen,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn anonymous_relation_is_not_a_comment() {
        let tokens = tokenize("(a)-->(b)").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![
            TokenKind::LParen,
            TokenKind::Identifier,
            TokenKind::RParen,
            TokenKind::Dash,
            TokenKind::Arrow,
            TokenKind::LParen,
            TokenKind::Identifier,
            TokenKind::RParen,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn line_comments_are_ignored() {
        let tokens = tokenize("MATCH (n) -- find the node\nRETURN n").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert!(!kinds.contains(&TokenKind::Dash));
        assert_eq!(kinds[4], TokenKind::Return);
    }

    #[test]
    fn string_escapes() {
        let tokens = tokenize(r#""say \"hi\" \\ there""#).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].text, r#"say "hi" \ there"#);
    }

    #[test]
    fn unterminated_string() {
        assert!(tokenize("MATCH (n {name: \"open").is_err());
    }

    #[test]
    fn similar_operator() {
        let tokens = tokenize("n.name =~ \"x\"").unwrap();
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Similar));
    }

    #[test]
    fn unexpected_character_reports_position() {
        let err = tokenize("MATCH (n) RETURN n;").unwrap_err();
        match err {
            Error::Parse { position, .. } => assert_eq!(position, 18),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
