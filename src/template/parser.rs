//! Recursive-descent compiler from scanned segments to a [`Node`] tree.
//!
//! Identifiers are resolved while parsing: the scope name becomes
//! [`Expr::Scope`], `for`/`let` bindings become environment slots, and any
//! other bare name reads a field of the scope object. The generated source
//! listing is written alongside the tree.

use super::ast::{BinaryOp, Branch, Expr, Node};
use super::lexer::{is_keyword, tokenize, Punct, Spanned, Token};
use super::scanner::{DirectiveKind, Segment};
use crate::error::TemplateError;
use crate::types::Value;

/// Output of compilation.
pub(crate) struct Compiled {
    pub nodes: Vec<Node>,
    pub source: String,
}

pub(crate) fn compile(segments: &[Segment<'_>], scope: &str) -> Result<Compiled, TemplateError> {
    let mut compiler = Compiler {
        scope,
        names: Vec::new(),
        frames: vec![Frame::Root(Vec::new())],
        source: SourceWriter::new(scope),
    };

    for segment in segments {
        match *segment {
            Segment::Text(text) => {
                let depth = compiler.depth();
                compiler.source.line(depth, &format!("_p += '{}';", escape_literal(text)));
                compiler.body().push(Node::Text(text.to_string()));
            }
            Segment::Directive { kind, body, offset } => {
                compiler.directive(kind, body, offset)?;
            }
        }
    }

    compiler.finish()
}

/// Escape text for inclusion in a single-quoted literal of the listing.
pub(crate) fn escape_literal(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '\r' => escaped.push_str("\\r"),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            '\u{2028}' => escaped.push_str("\\u2028"),
            '\u{2029}' => escaped.push_str("\\u2029"),
            c => escaped.push(c),
        }
    }
    escaped
}

struct SourceWriter {
    text: String,
}

impl SourceWriter {
    fn new(scope: &str) -> Self {
        Self {
            text: format!("fn({}) {{\n  let _p = '';\n", scope),
        }
    }

    fn line(&mut self, depth: usize, line: &str) {
        for _ in 0..=depth {
            self.text.push_str("  ");
        }
        self.text.push_str(line);
        self.text.push('\n');
    }

    fn finish(mut self) -> String {
        self.text.push_str("  return _p;\n}");
        self.text
    }
}

enum Frame {
    Root(Vec<Node>),
    If {
        keyword_offset: usize,
        done: Vec<Branch>,
        /// `None` once inside the `else` arm.
        condition: Option<Expr>,
        body: Vec<Node>,
        mark: usize,
    },
    For {
        keyword_offset: usize,
        iterable: Expr,
        with_index: bool,
        body: Vec<Node>,
        mark: usize,
    },
}

struct Compiler<'c> {
    scope: &'c str,
    /// Binding names by environment slot.
    names: Vec<String>,
    frames: Vec<Frame>,
    source: SourceWriter,
}

impl<'c> Compiler<'c> {
    fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    fn body(&mut self) -> &mut Vec<Node> {
        match self.frames.last_mut() {
            Some(Frame::Root(nodes)) => nodes,
            Some(Frame::If { body, .. }) | Some(Frame::For { body, .. }) => body,
            None => unreachable!("root frame is never popped"),
        }
    }

    fn directive(&mut self, kind: DirectiveKind, body: &str, offset: usize) -> Result<(), TemplateError> {
        let tokens = tokenize(body, offset)?;
        let end = offset + body.len();
        let text = body.trim();
        let depth = self.depth();

        match kind {
            DirectiveKind::Interpolate => {
                let expr = self.expression(&tokens, end)?;
                self.source.line(depth, &format!("_p += ({}) ?? '';", text));
                self.body().push(Node::Interpolate(expr));
            }
            DirectiveKind::Escape => {
                let expr = self.expression(&tokens, end)?;
                self.source.line(depth, &format!("_p += escape(({}) ?? '');", text));
                self.body().push(Node::Escape(expr));
            }
            DirectiveKind::Evaluate => self.statement(&tokens, end, text)?,
        }
        Ok(())
    }

    fn expression(&self, tokens: &[Spanned], end: usize) -> Result<Expr, TemplateError> {
        let mut parser = ExprParser {
            tokens,
            pos: 0,
            end,
            compiler: self,
        };
        let expr = parser.conditional()?;
        parser.expect_end()?;
        Ok(expr)
    }

    fn statement(&mut self, tokens: &[Spanned], end: usize, text: &str) -> Result<(), TemplateError> {
        let (keyword, offset) = match tokens.first() {
            Some(Spanned {
                token: Token::Ident(word),
                offset,
            }) => (word.as_str(), *offset),
            Some(other) => return Err(expected_statement(other.offset)),
            None => return Err(expected_statement(end)),
        };
        let rest = &tokens[1..];
        let depth = self.depth();

        match keyword {
            "if" => {
                let condition = self.expression(rest, end)?;
                self.source.line(depth, &format!("if ({}) {{", text[2..].trim()));
                let mark = self.names.len();
                self.frames.push(Frame::If {
                    keyword_offset: offset,
                    done: Vec::new(),
                    condition: Some(condition),
                    body: Vec::new(),
                    mark,
                });
            }
            "else" => self.else_branch(rest, end, offset, text)?,
            "end" => {
                if let Some(extra) = rest.first() {
                    return Err(unexpected(extra.offset));
                }
                self.end_block(offset)?;
            }
            "for" => self.for_block(rest, end, offset, text)?,
            "let" => {
                let (name, name_offset) = match rest {
                    [Spanned {
                        token: Token::Ident(name),
                        offset,
                    }, Spanned {
                        token: Token::Punct(Punct::Assign),
                        ..
                    }, ..] => (name.clone(), *offset),
                    [first, ..] => return Err(unexpected(first.offset)),
                    [] => return Err(unexpected_end(end)),
                };
                self.check_binding(&name, name_offset)?;
                let value = self.expression(&rest[2..], end)?;
                self.source.line(depth, &format!("{};", text));
                self.names.push(name);
                self.body().push(Node::Let(value));
            }
            _ => return Err(expected_statement(offset)),
        }
        Ok(())
    }

    fn else_branch(
        &mut self,
        rest: &[Spanned],
        end: usize,
        offset: usize,
        text: &str,
    ) -> Result<(), TemplateError> {
        let mark = match self.frames.last() {
            Some(Frame::If {
                condition: Some(_),
                mark,
                ..
            }) => *mark,
            _ => {
                return Err(TemplateError::UnexpectedKeyword {
                    keyword: "else".to_string(),
                    offset,
                })
            }
        };
        // bindings made in the previous arm end with it
        self.names.truncate(mark);

        let next_condition = match rest.first() {
            None => None,
            Some(Spanned {
                token: Token::Ident(word),
                ..
            }) if word == "if" => Some(self.expression(&rest[1..], end)?),
            Some(other) => return Err(unexpected(other.offset)),
        };

        if let Some(Frame::If {
            done,
            condition,
            body,
            ..
        }) = self.frames.last_mut()
        {
            if let Some(previous) = condition.take() {
                done.push(Branch {
                    condition: previous,
                    body: std::mem::take(body),
                });
            }
            *condition = next_condition;
        }

        let header = match text.strip_prefix("else").map(str::trim) {
            Some(cond) if cond.starts_with("if") => format!("}} else if ({}) {{", cond[2..].trim()),
            _ => "} else {".to_string(),
        };
        let depth = self.depth() - 1;
        self.source.line(depth, &header);
        Ok(())
    }

    fn for_block(
        &mut self,
        rest: &[Spanned],
        end: usize,
        offset: usize,
        text: &str,
    ) -> Result<(), TemplateError> {
        let mut bindings = Vec::new();
        let mut pos = 0;
        loop {
            match rest.get(pos) {
                Some(Spanned {
                    token: Token::Ident(name),
                    offset,
                }) if name != "in" => {
                    self.check_binding(name, *offset)?;
                    bindings.push(name.clone());
                    pos += 1;
                }
                Some(other) => return Err(unexpected(other.offset)),
                None => return Err(unexpected_end(end)),
            }
            match rest.get(pos) {
                Some(Spanned {
                    token: Token::Punct(Punct::Comma),
                    ..
                }) if bindings.len() == 1 => pos += 1,
                Some(Spanned {
                    token: Token::Ident(word),
                    ..
                }) if word == "in" => {
                    pos += 1;
                    break;
                }
                Some(other) => return Err(unexpected(other.offset)),
                None => return Err(unexpected_end(end)),
            }
        }

        let iterable = self.expression(&rest[pos..], end)?;
        let depth = self.depth();
        self.source.line(depth, &format!("for ({}) {{", text[3..].trim()));

        let mark = self.names.len();
        let with_index = bindings.len() == 2;
        self.names.extend(bindings);
        self.frames.push(Frame::For {
            keyword_offset: offset,
            iterable,
            with_index,
            body: Vec::new(),
            mark,
        });
        Ok(())
    }

    fn end_block(&mut self, offset: usize) -> Result<(), TemplateError> {
        let node = match self.frames.pop() {
            Some(Frame::If {
                mut done,
                condition,
                body,
                mark,
                ..
            }) => {
                self.names.truncate(mark);
                let otherwise = match condition {
                    Some(condition) => {
                        done.push(Branch { condition, body });
                        Vec::new()
                    }
                    None => body,
                };
                Node::If {
                    branches: done,
                    otherwise,
                }
            }
            Some(Frame::For {
                iterable,
                with_index,
                body,
                mark,
                ..
            }) => {
                self.names.truncate(mark);
                Node::For {
                    iterable,
                    with_index,
                    body,
                }
            }
            Some(root @ Frame::Root(_)) => {
                self.frames.push(root);
                return Err(TemplateError::UnexpectedKeyword {
                    keyword: "end".to_string(),
                    offset,
                });
            }
            None => unreachable!("root frame is never popped"),
        };

        let depth = self.depth();
        self.source.line(depth, "}");
        self.body().push(node);
        Ok(())
    }

    fn check_binding(&self, name: &str, offset: usize) -> Result<(), TemplateError> {
        if name == self.scope {
            return Err(TemplateError::ShadowedScope {
                name: name.to_string(),
                offset,
            });
        }
        if is_keyword(name) {
            return Err(TemplateError::Syntax {
                offset,
                message: format!("`{}` is a reserved word", name),
            });
        }
        Ok(())
    }

    fn resolve(&self, name: &str) -> Expr {
        if let Some(slot) = self.names.iter().rposition(|n| n == name) {
            Expr::Var(slot)
        } else if name == self.scope {
            Expr::Scope
        } else {
            Expr::Member(Box::new(Expr::Scope), name.to_string())
        }
    }

    fn finish(mut self) -> Result<Compiled, TemplateError> {
        match self.frames.pop() {
            Some(Frame::Root(nodes)) => Ok(Compiled {
                nodes,
                source: self.source.finish(),
            }),
            Some(Frame::If { keyword_offset, .. }) => Err(TemplateError::UnterminatedBlock {
                keyword: "if".to_string(),
                offset: keyword_offset,
            }),
            Some(Frame::For { keyword_offset, .. }) => Err(TemplateError::UnterminatedBlock {
                keyword: "for".to_string(),
                offset: keyword_offset,
            }),
            None => unreachable!("root frame is never popped"),
        }
    }
}

fn expected_statement(offset: usize) -> TemplateError {
    TemplateError::Syntax {
        offset,
        message: "expected `if`, `else`, `end`, `for` or `let`".to_string(),
    }
}

fn unexpected(offset: usize) -> TemplateError {
    TemplateError::Syntax {
        offset,
        message: "unexpected token".to_string(),
    }
}

fn unexpected_end(offset: usize) -> TemplateError {
    TemplateError::Syntax {
        offset,
        message: "unexpected end of directive".to_string(),
    }
}

/// Precedence-climbing expression parser over one directive's tokens.
struct ExprParser<'p, 'c> {
    tokens: &'p [Spanned],
    pos: usize,
    /// Offset reported when the tokens run out.
    end: usize,
    compiler: &'p Compiler<'c>,
}

impl<'p, 'c> ExprParser<'p, 'c> {
    fn peek(&self) -> Option<&'p Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |s| s.offset)
    }

    fn eat(&mut self, punct: Punct) -> bool {
        if self.peek() == Some(&Token::Punct(punct)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: Punct, what: &str) -> Result<(), TemplateError> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(TemplateError::Syntax {
                offset: self.offset(),
                message: format!("expected {}", what),
            })
        }
    }

    fn expect_end(&self) -> Result<(), TemplateError> {
        if self.pos < self.tokens.len() {
            return Err(unexpected(self.offset()));
        }
        Ok(())
    }

    fn conditional(&mut self) -> Result<Expr, TemplateError> {
        let condition = self.or()?;
        if !self.eat(Punct::Question) {
            return Ok(condition);
        }
        let then = self.conditional()?;
        self.expect(Punct::Colon, "`:`")?;
        let otherwise = self.conditional()?;
        Ok(Expr::Conditional(
            Box::new(condition),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    fn or(&mut self) -> Result<Expr, TemplateError> {
        let mut left = self.and()?;
        while self.eat(Punct::Or) {
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, TemplateError> {
        let mut left = self.binary(0)?;
        while self.eat(Punct::And) {
            let right = self.binary(0)?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// Left-associative binary levels: equality, relational, additive,
    /// multiplicative.
    fn binary(&mut self, level: usize) -> Result<Expr, TemplateError> {
        const LEVELS: &[&[(Punct, BinaryOp)]] = &[
            &[
                (Punct::Eq, BinaryOp::Eq),
                (Punct::Ne, BinaryOp::Ne),
                (Punct::StrictEq, BinaryOp::StrictEq),
                (Punct::StrictNe, BinaryOp::StrictNe),
            ],
            &[
                (Punct::Lt, BinaryOp::Lt),
                (Punct::Le, BinaryOp::Le),
                (Punct::Gt, BinaryOp::Gt),
                (Punct::Ge, BinaryOp::Ge),
            ],
            &[(Punct::Plus, BinaryOp::Add), (Punct::Minus, BinaryOp::Sub)],
            &[
                (Punct::Star, BinaryOp::Mul),
                (Punct::Slash, BinaryOp::Div),
                (Punct::Percent, BinaryOp::Rem),
            ],
        ];

        let Some(operators) = LEVELS.get(level) else {
            return self.unary();
        };

        let mut left = self.binary(level + 1)?;
        loop {
            let op = operators
                .iter()
                .find(|(punct, _)| self.peek() == Some(&Token::Punct(*punct)))
                .map(|(_, op)| *op);
            let Some(op) = op else { break };
            self.pos += 1;
            let right = self.binary(level + 1)?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, TemplateError> {
        if self.eat(Punct::Bang) {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        if self.eat(Punct::Minus) {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, TemplateError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(Punct::Dot) {
                match self.peek() {
                    Some(Token::Ident(name)) => {
                        self.pos += 1;
                        expr = Expr::Member(Box::new(expr), name.clone());
                    }
                    _ => {
                        return Err(TemplateError::Syntax {
                            offset: self.offset(),
                            message: "expected a property name after `.`".to_string(),
                        })
                    }
                }
            } else if self.eat(Punct::LBracket) {
                let index = self.conditional()?;
                self.expect(Punct::RBracket, "`]`")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, TemplateError> {
        let offset = self.offset();
        let token = self.peek().ok_or_else(|| unexpected_end(offset))?;
        self.pos += 1;

        let expr = match token {
            Token::Number(n) => Expr::Literal(number_literal(*n)),
            Token::Str(s) => Expr::Literal(Value::String(s.clone())),
            Token::Ident(word) => match word.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" => Expr::Literal(Value::Null),
                "undefined" => Expr::Undefined,
                word if is_keyword(word) => {
                    return Err(TemplateError::Syntax {
                        offset,
                        message: format!("unexpected `{}`", word),
                    })
                }
                name => self.compiler.resolve(name),
            },
            Token::Punct(Punct::LParen) => {
                let inner = self.conditional()?;
                self.expect(Punct::RParen, "`)`")?;
                inner
            }
            Token::Punct(_) => return Err(unexpected(offset)),
        };
        Ok(expr)
    }
}

fn number_literal(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}
