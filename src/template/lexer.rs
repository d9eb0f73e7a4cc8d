//! Tokenizer for directive bodies.

use crate::error::TemplateError;

/// Words that cannot be used as binding or scope names.
pub(crate) const KEYWORDS: &[&str] = &[
    "if", "else", "end", "for", "in", "let", "true", "false", "null", "undefined",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Punct {
    Dot,
    Comma,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Bang,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    And,
    Or,
    Question,
    Colon,
    Assign,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Punct(Punct),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    /// Byte offset in the template source.
    pub offset: usize,
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if is_ident_start(c) => chars.all(is_ident_continue),
        _ => false,
    }
}

pub(crate) fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Tokenize `body`, which starts at byte `base` of the template source.
pub(crate) fn tokenize(body: &str, base: usize) -> Result<Vec<Spanned>, TemplateError> {
    let bytes = body.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        let offset = base + pos;

        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        if !c.is_ascii() {
            // U+2028, U+2029 and other unicode spacing separate tokens too
            if let Some(ch) = body[pos..].chars().next().filter(|ch| ch.is_whitespace()) {
                pos += ch.len_utf8();
                continue;
            }
        }

        if is_ident_start(c as char) {
            let start = pos;
            while pos < bytes.len() && is_ident_continue(bytes[pos] as char) {
                pos += 1;
            }
            tokens.push(Spanned {
                token: Token::Ident(body[start..pos].to_string()),
                offset,
            });
            continue;
        }

        if c.is_ascii_digit() {
            let start = pos;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
            if pos + 1 < bytes.len() && bytes[pos] == b'.' && bytes[pos + 1].is_ascii_digit() {
                pos += 1;
                while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            let number = body[start..pos].parse::<f64>().map_err(|e| TemplateError::Syntax {
                offset,
                message: format!("invalid number: {}", e),
            })?;
            tokens.push(Spanned {
                token: Token::Number(number),
                offset,
            });
            continue;
        }

        if c == b'\'' || c == b'"' {
            let (text, consumed) = string_literal(&body[pos..], c as char, offset)?;
            tokens.push(Spanned {
                token: Token::Str(text),
                offset,
            });
            pos += consumed;
            continue;
        }

        let (punct, len) = punct(&bytes[pos..]).ok_or_else(|| TemplateError::Syntax {
            offset,
            message: format!(
                "unexpected character {:?}",
                body[pos..].chars().next().unwrap_or_default()
            ),
        })?;
        tokens.push(Spanned {
            token: Token::Punct(punct),
            offset,
        });
        pos += len;
    }

    Ok(tokens)
}

fn punct(rest: &[u8]) -> Option<(Punct, usize)> {
    let three = rest.get(..3);
    let two = rest.get(..2);
    match (three, two, rest[0]) {
        (Some(b"==="), _, _) => Some((Punct::StrictEq, 3)),
        (Some(b"!=="), _, _) => Some((Punct::StrictNe, 3)),
        (_, Some(b"=="), _) => Some((Punct::Eq, 2)),
        (_, Some(b"!="), _) => Some((Punct::Ne, 2)),
        (_, Some(b"<="), _) => Some((Punct::Le, 2)),
        (_, Some(b">="), _) => Some((Punct::Ge, 2)),
        (_, Some(b"&&"), _) => Some((Punct::And, 2)),
        (_, Some(b"||"), _) => Some((Punct::Or, 2)),
        (_, _, b'.') => Some((Punct::Dot, 1)),
        (_, _, b',') => Some((Punct::Comma, 1)),
        (_, _, b'[') => Some((Punct::LBracket, 1)),
        (_, _, b']') => Some((Punct::RBracket, 1)),
        (_, _, b'(') => Some((Punct::LParen, 1)),
        (_, _, b')') => Some((Punct::RParen, 1)),
        (_, _, b'!') => Some((Punct::Bang, 1)),
        (_, _, b'+') => Some((Punct::Plus, 1)),
        (_, _, b'-') => Some((Punct::Minus, 1)),
        (_, _, b'*') => Some((Punct::Star, 1)),
        (_, _, b'/') => Some((Punct::Slash, 1)),
        (_, _, b'%') => Some((Punct::Percent, 1)),
        (_, _, b'<') => Some((Punct::Lt, 1)),
        (_, _, b'>') => Some((Punct::Gt, 1)),
        (_, _, b'?') => Some((Punct::Question, 1)),
        (_, _, b':') => Some((Punct::Colon, 1)),
        (_, _, b'=') => Some((Punct::Assign, 1)),
        _ => None,
    }
}

/// Parse a quoted string at the start of `rest`. Returns the text and the
/// number of bytes consumed, quotes included.
fn string_literal(rest: &str, quote: char, offset: usize) -> Result<(String, usize), TemplateError> {
    let mut text = String::new();
    let mut chars = rest.char_indices().skip(1);

    while let Some((i, c)) = chars.next() {
        match c {
            c if c == quote => return Ok((text, i + c.len_utf8())),
            '\\' => {
                let (_, escaped) = chars.next().ok_or_else(|| unterminated(offset))?;
                text.push(match escaped {
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    '0' => '\0',
                    other => other,
                });
            }
            c => text.push(c),
        }
    }

    Err(unterminated(offset))
}

fn unterminated(offset: usize) -> TemplateError {
    TemplateError::Syntax {
        offset,
        message: "unterminated string literal".to_string(),
    }
}
