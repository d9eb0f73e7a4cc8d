//! Tree-walking interpreter for compiled templates.
//!
//! Values follow JavaScript rules where templates can observe them:
//! truthiness, `+` concatenation, `==` treating null and undefined alike,
//! and number formatting (`1.0` renders as `1`).

use super::ast::{BinaryOp, Expr, Node};
use crate::error::RenderError;
use crate::types::{is_truthy, Value};
use serde_json::Number;
use std::cmp::Ordering;

/// Replace `& < > " ' /` with HTML entities.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    push_escaped(&mut out, text);
    out
}

fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            c => out.push(c),
        }
    }
}

pub(crate) fn render(nodes: &[Node], data: &Value, size_hint: usize) -> Result<String, RenderError> {
    let mut machine = Machine {
        data,
        env: Vec::new(),
        out: String::with_capacity(size_hint),
    };
    machine.exec(nodes)?;
    Ok(machine.out)
}

/// A value during evaluation: borrowed from the data object where possible.
#[derive(Clone, Debug)]
enum Slot<'a> {
    Undefined,
    Borrowed(&'a Value),
    Owned(Value),
}

impl<'a> Slot<'a> {
    fn value(&self) -> Option<&Value> {
        match self {
            Slot::Undefined => None,
            Slot::Borrowed(v) => Some(*v),
            Slot::Owned(v) => Some(v),
        }
    }

    fn is_nullish(&self) -> bool {
        matches!(self.value(), None | Some(Value::Null))
    }

    fn truthy(&self) -> bool {
        self.value().map_or(false, is_truthy)
    }

    fn number(&self) -> Option<f64> {
        match self.value() {
            Some(Value::Number(n)) => n.as_f64(),
            _ => None,
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self.value() {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self.value() {
            None => "undefined",
            Some(Value::Null) => "null",
            Some(Value::Bool(_)) => "boolean",
            Some(Value::Number(_)) => "number",
            Some(Value::String(_)) => "string",
            Some(Value::Array(_)) => "array",
            Some(Value::Object(_)) => "object",
        }
    }

    fn to_js_string(&self) -> String {
        match self.value() {
            None => "undefined".to_string(),
            Some(value) => js_string(value),
        }
    }

    /// Read a property, JavaScript style.
    fn property(self, key: Key) -> Result<Slot<'a>, RenderError> {
        if self.is_nullish() {
            return Err(RenderError::NullAccess {
                property: key.to_string(),
                target: self.type_name(),
            });
        }
        let slot = match self {
            Slot::Undefined => Slot::Undefined,
            Slot::Borrowed(value) => match lookup(value, &key) {
                Lookup::Found(child) => Slot::Borrowed(child),
                Lookup::Computed(v) => Slot::Owned(v),
                Lookup::Missing => Slot::Undefined,
            },
            Slot::Owned(value) => {
                let found = lookup(&value, &key);
                match found {
                    Lookup::Found(child) => Slot::Owned(child.clone()),
                    Lookup::Computed(v) => Slot::Owned(v),
                    Lookup::Missing => Slot::Undefined,
                }
            }
        };
        Ok(slot)
    }
}

enum Key {
    Name(String),
    Index(usize),
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Index(i) => write!(f, "{}", i),
        }
    }
}

enum Lookup<'v> {
    Found(&'v Value),
    Computed(Value),
    Missing,
}

fn lookup<'v>(value: &'v Value, key: &Key) -> Lookup<'v> {
    let found = |v: Option<&'v Value>| v.map_or(Lookup::Missing, Lookup::Found);
    match (value, key) {
        (Value::Object(map), Key::Name(name)) => found(map.get(name)),
        (Value::Object(map), Key::Index(i)) => found(map.get(&i.to_string())),
        (Value::Array(items), Key::Index(i)) => found(items.get(*i)),
        (Value::Array(items), Key::Name(name)) if name == "length" => {
            Lookup::Computed(Value::from(items.len()))
        }
        (Value::Array(items), Key::Name(name)) => {
            found(name.parse::<usize>().ok().and_then(|i| items.get(i)))
        }
        (Value::String(s), Key::Name(name)) if name == "length" => {
            Lookup::Computed(Value::from(s.encode_utf16().count()))
        }
        (Value::String(s), Key::Index(i)) => s
            .chars()
            .nth(*i)
            .map_or(Lookup::Missing, |c| Lookup::Computed(Value::String(c.to_string()))),
        _ => Lookup::Missing,
    }
}

fn js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                if item.is_null() {
                    String::new()
                } else {
                    js_string(item)
                }
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn format_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    let f = n.as_f64().unwrap_or(f64::NAN);
    if f == 0.0 {
        "0".to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e21 {
        format!("{:.0}", f)
    } else {
        f.to_string()
    }
}

fn number_value(op: &'static str, f: f64) -> Result<Value, RenderError> {
    if !f.is_finite() {
        return Err(RenderError::Arithmetic(op));
    }
    if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
        return Ok(Value::from(f as i64));
    }
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or(RenderError::Arithmetic(op))
}

fn loose_eq(left: &Slot<'_>, right: &Slot<'_>) -> bool {
    if left.is_nullish() || right.is_nullish() {
        return left.is_nullish() && right.is_nullish();
    }
    strict_eq(left, right)
}

fn strict_eq(left: &Slot<'_>, right: &Slot<'_>) -> bool {
    match (left.value(), right.value()) {
        (None, None) => true,
        (Some(Value::Number(a)), Some(Value::Number(b))) => a.as_f64() == b.as_f64(),
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn compare(left: &Slot<'_>, right: &Slot<'_>) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (left.number(), right.number()) {
        return a.partial_cmp(&b);
    }
    if let (Some(a), Some(b)) = (left.as_str(), right.as_str()) {
        return Some(a.cmp(b));
    }
    None
}

struct Machine<'a> {
    data: &'a Value,
    env: Vec<Slot<'a>>,
    out: String,
}

impl<'a> Machine<'a> {
    fn exec(&mut self, nodes: &[Node]) -> Result<(), RenderError> {
        for node in nodes {
            match node {
                Node::Text(text) => self.out.push_str(text),
                Node::Interpolate(expr) => {
                    let value = self.eval(expr)?;
                    if !value.is_nullish() {
                        let text = value.to_js_string();
                        self.out.push_str(&text);
                    }
                }
                Node::Escape(expr) => {
                    let value = self.eval(expr)?;
                    if !value.is_nullish() {
                        let text = value.to_js_string();
                        push_escaped(&mut self.out, &text);
                    }
                }
                Node::If {
                    branches,
                    otherwise,
                } => {
                    let mut chosen: &[Node] = otherwise;
                    for branch in branches {
                        if self.eval(&branch.condition)?.truthy() {
                            chosen = &branch.body;
                            break;
                        }
                    }
                    let mark = self.env.len();
                    let result = self.exec(chosen);
                    self.env.truncate(mark);
                    result?;
                }
                Node::For {
                    iterable,
                    with_index,
                    body,
                } => self.exec_for(iterable, *with_index, body)?,
                Node::Let(expr) => {
                    let value = self.eval(expr)?;
                    self.env.push(value);
                }
            }
        }
        Ok(())
    }

    fn exec_for(&mut self, iterable: &Expr, with_index: bool, body: &[Node]) -> Result<(), RenderError> {
        let items: Vec<Slot<'a>> = match self.eval(iterable)? {
            Slot::Borrowed(Value::Array(items)) => items.iter().map(Slot::Borrowed).collect(),
            Slot::Owned(Value::Array(items)) => items.into_iter().map(Slot::Owned).collect(),
            other => return Err(RenderError::NotIterable(other.type_name())),
        };

        let mark = self.env.len();
        let mut result = Ok(());
        for (index, item) in items.into_iter().enumerate() {
            self.env.truncate(mark);
            self.env.push(item);
            if with_index {
                self.env.push(Slot::Owned(Value::from(index)));
            }
            result = self.exec(body);
            if result.is_err() {
                break;
            }
        }
        self.env.truncate(mark);
        result
    }

    fn eval(&self, expr: &Expr) -> Result<Slot<'a>, RenderError> {
        Ok(match expr {
            Expr::Literal(value) => Slot::Owned(value.clone()),
            Expr::Undefined => Slot::Undefined,
            Expr::Scope => Slot::Borrowed(self.data),
            Expr::Var(slot) => self.env.get(*slot).cloned().unwrap_or(Slot::Undefined),
            Expr::Member(target, name) => self.eval(target)?.property(Key::Name(name.clone()))?,
            Expr::Index(target, index) => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                let key = match index.number() {
                    Some(n) if n >= 0.0 && n.fract() == 0.0 => Key::Index(n as usize),
                    _ => Key::Name(index.to_js_string()),
                };
                target.property(key)?
            }
            Expr::Not(inner) => Slot::Owned(Value::Bool(!self.eval(inner)?.truthy())),
            Expr::Neg(inner) => {
                let value = self.eval(inner)?;
                match value.number() {
                    Some(n) => Slot::Owned(number_value("-", -n)?),
                    None => {
                        return Err(RenderError::NotANumber {
                            op: "-",
                            left: value.type_name(),
                            right: "nothing",
                        })
                    }
                }
            }
            Expr::And(left, right) => {
                let left = self.eval(left)?;
                if left.truthy() {
                    self.eval(right)?
                } else {
                    left
                }
            }
            Expr::Or(left, right) => {
                let left = self.eval(left)?;
                if left.truthy() {
                    left
                } else {
                    self.eval(right)?
                }
            }
            Expr::Conditional(condition, then, otherwise) => {
                if self.eval(condition)?.truthy() {
                    self.eval(then)?
                } else {
                    self.eval(otherwise)?
                }
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Slot::Owned(binary(*op, &left, &right)?)
            }
        })
    }
}

fn binary(op: BinaryOp, left: &Slot<'_>, right: &Slot<'_>) -> Result<Value, RenderError> {
    let symbol = op.symbol();
    let numbers = || match (left.number(), right.number()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(RenderError::NotANumber {
            op: symbol,
            left: left.type_name(),
            right: right.type_name(),
        }),
    };

    match op {
        BinaryOp::Add => {
            if let (Some(a), Some(b)) = (left.number(), right.number()) {
                return number_value(symbol, a + b);
            }
            if left.as_str().is_some() || right.as_str().is_some() {
                return Ok(Value::String(left.to_js_string() + &right.to_js_string()));
            }
            numbers().map(|_| Value::Null)
        }
        BinaryOp::Sub => numbers().and_then(|(a, b)| number_value(symbol, a - b)),
        BinaryOp::Mul => numbers().and_then(|(a, b)| number_value(symbol, a * b)),
        BinaryOp::Div => numbers().and_then(|(a, b)| number_value(symbol, a / b)),
        BinaryOp::Rem => numbers().and_then(|(a, b)| number_value(symbol, a % b)),
        BinaryOp::Lt => Ok(Value::Bool(compare(left, right) == Some(Ordering::Less))),
        BinaryOp::Le => Ok(Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        ))),
        BinaryOp::Gt => Ok(Value::Bool(compare(left, right) == Some(Ordering::Greater))),
        BinaryOp::Ge => Ok(Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        ))),
        BinaryOp::Eq => Ok(Value::Bool(loose_eq(left, right))),
        BinaryOp::Ne => Ok(Value::Bool(!loose_eq(left, right))),
        BinaryOp::StrictEq => Ok(Value::Bool(strict_eq(left, right))),
        BinaryOp::StrictNe => Ok(Value::Bool(!strict_eq(left, right))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escape_html_table() {
        assert_eq!(
            escape_html(r#"<a href="/x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;&#x2F;x&quot;&gt;Tom &amp; &#x27;Jerry&#x27;&lt;&#x2F;a&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_js_string() {
        assert_eq!(js_string(&json!(1.0)), "1");
        assert_eq!(js_string(&json!(1.5)), "1.5");
        assert_eq!(js_string(&json!(-0.0)), "0");
        assert_eq!(js_string(&json!([1, null, "a"])), "1,,a");
        assert_eq!(js_string(&json!({"a": 1})), "[object Object]");
        assert_eq!(js_string(&json!(true)), "true");
    }

    #[test]
    fn test_equality() {
        let null = Slot::Owned(Value::Null);
        let undefined = Slot::Undefined;
        let one = Slot::Owned(json!(1));
        let one_float = Slot::Owned(json!(1.0));

        assert!(loose_eq(&null, &undefined));
        assert!(!strict_eq(&null, &undefined));
        assert!(strict_eq(&one, &one_float));
        assert!(!loose_eq(&one, &null));
    }

    #[test]
    fn test_binary_arithmetic() {
        let two = Slot::Owned(json!(2));
        let three = Slot::Owned(json!(3));
        let text = Slot::Owned(json!("n="));

        assert_eq!(binary(BinaryOp::Add, &two, &three).unwrap(), json!(5));
        assert_eq!(binary(BinaryOp::Div, &three, &two).unwrap(), json!(1.5));
        assert_eq!(binary(BinaryOp::Add, &text, &two).unwrap(), json!("n=2"));
        assert_eq!(
            binary(BinaryOp::Div, &two, &Slot::Owned(json!(0))),
            Err(RenderError::Arithmetic("/"))
        );
        assert!(matches!(
            binary(BinaryOp::Sub, &text, &two),
            Err(RenderError::NotANumber { op: "-", .. })
        ));
        assert_eq!(binary(BinaryOp::Lt, &two, &three).unwrap(), json!(true));
        assert_eq!(binary(BinaryOp::Ge, &text, &two).unwrap(), json!(false));
    }

    #[test]
    fn test_property_lookup() {
        let data = json!({"items": [10, 20], "name": "héllo"});
        let root = Slot::Borrowed(&data);

        let items = root.clone().property(Key::Name("items".into())).unwrap();
        let length = items.clone().property(Key::Name("length".into())).unwrap();
        assert_eq!(length.value(), Some(&json!(2)));
        assert_eq!(
            items.property(Key::Index(1)).unwrap().value(),
            Some(&json!(20))
        );

        let name = root.clone().property(Key::Name("name".into())).unwrap();
        assert_eq!(
            name.property(Key::Name("length".into())).unwrap().value(),
            Some(&json!(5))
        );

        let missing = root.property(Key::Name("nope".into())).unwrap();
        assert!(matches!(
            missing.property(Key::Name("x".into())),
            Err(RenderError::NullAccess { target: "undefined", .. })
        ));
    }
}
