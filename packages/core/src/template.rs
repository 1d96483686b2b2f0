//! URI templates (RFC 6570, levels 1–4) with partial binding.
//!
//! [`UriTemplate::expand`] turns a template and a set of [`Variables`] into a
//! concrete URI. [`UriTemplate::bind`] supplies only some of the variables
//! and returns a [`TemplateBinding`] that remembers what is still missing.
//!
//! # Unknown variables
//!
//! Expansion is **strict**: supplying a variable the template does not
//! declare is a [`TemplateError::UnknownVariable`]. Declared variables that
//! are not supplied are *undefined* and dropped from the output, as the RFC
//! prescribes (`{?a,b}` with only `a` gives `?a=x`).
//!
//! Nothing here touches the network or the identity map.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// Errors from parsing, binding, or expanding a template.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unterminated expression in template {0:?}")]
    Unterminated(String),

    #[error("empty expression in template {0:?}")]
    EmptyExpression(String),

    #[error("invalid variable specification {spec:?} in template {template:?}")]
    InvalidVariable { spec: String, template: String },

    #[error("operator {op:?} is reserved and not supported (template {template:?})")]
    UnsupportedOperator { op: char, template: String },

    #[error("variable {name:?} is not declared by template {template:?}")]
    UnknownVariable { name: String, template: String },

    /// A templated link was dereferenced (fetched or followed) before its
    /// variables were supplied.
    #[error("template {template:?} must be expanded before it can be followed (missing: {})", missing.join(", "))]
    Unbound {
        template: String,
        missing: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A value bound to a template variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateValue {
    Str(String),
    List(Vec<String>),
    /// Associative array; order is kept.
    Assoc(Vec<(String, String)>),
}

impl TemplateValue {
    /// Empty lists and empty associative arrays count as undefined.
    fn is_undefined(&self) -> bool {
        match self {
            TemplateValue::Str(_) => false,
            TemplateValue::List(items) => items.is_empty(),
            TemplateValue::Assoc(pairs) => pairs.is_empty(),
        }
    }

    /// Convert a JSON value. `null` yields `None` (undefined).
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(TemplateValue::Str(s.clone())),
            Value::Array(items) => Some(TemplateValue::List(items.iter().map(scalar).collect())),
            Value::Object(map) => Some(TemplateValue::Assoc(
                map.iter().map(|(k, v)| (k.clone(), scalar(v))).collect(),
            )),
            other => Some(TemplateValue::Str(other.to_string())),
        }
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl From<&str> for TemplateValue {
    fn from(s: &str) -> Self {
        TemplateValue::Str(s.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(s: String) -> Self {
        TemplateValue::Str(s)
    }
}

impl From<&String> for TemplateValue {
    fn from(s: &String) -> Self {
        TemplateValue::Str(s.clone())
    }
}

macro_rules! display_value {
    ($($t:ty),*) => {
        $(impl From<$t> for TemplateValue {
            fn from(v: $t) -> Self {
                TemplateValue::Str(v.to_string())
            }
        })*
    };
}

display_value!(i32, i64, u32, u64, usize, bool);

impl From<Vec<String>> for TemplateValue {
    fn from(items: Vec<String>) -> Self {
        TemplateValue::List(items)
    }
}

impl From<Vec<&str>> for TemplateValue {
    fn from(items: Vec<&str>) -> Self {
        TemplateValue::List(items.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<(String, String)>> for TemplateValue {
    fn from(pairs: Vec<(String, String)>) -> Self {
        TemplateValue::Assoc(pairs)
    }
}

impl From<Vec<(&str, &str)>> for TemplateValue {
    fn from(pairs: Vec<(&str, &str)>) -> Self {
        TemplateValue::Assoc(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

/// Variable name → value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables(BTreeMap<String, TemplateValue>);

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<TemplateValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<TemplateValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&TemplateValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge `other` into `self`; values in `other` replace existing ones.
    pub fn extend(&mut self, other: &Variables) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }
}

impl<K: Into<String>, V: Into<TemplateValue>> FromIterator<(K, V)> for Variables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Simple,
    Reserved,
    Fragment,
    Label,
    Path,
    PathParam,
    Query,
    QueryContinuation,
}

struct OpSpec {
    first: &'static str,
    sep: &'static str,
    named: bool,
    if_empty: &'static str,
    allow_reserved: bool,
}

impl Operator {
    fn from_char(c: char) -> Option<Self> {
        Some(match c {
            '+' => Operator::Reserved,
            '#' => Operator::Fragment,
            '.' => Operator::Label,
            '/' => Operator::Path,
            ';' => Operator::PathParam,
            '?' => Operator::Query,
            '&' => Operator::QueryContinuation,
            _ => return None,
        })
    }

    fn spec(self) -> OpSpec {
        let (first, sep, named, if_empty, allow_reserved) = match self {
            Operator::Simple => ("", ",", false, "", false),
            Operator::Reserved => ("", ",", false, "", true),
            Operator::Fragment => ("#", ",", false, "", true),
            Operator::Label => (".", ".", false, "", false),
            Operator::Path => ("/", "/", false, "", false),
            Operator::PathParam => (";", ";", true, "", false),
            Operator::Query => ("?", "&", true, "=", false),
            Operator::QueryContinuation => ("&", "&", true, "=", false),
        };
        OpSpec {
            first,
            sep,
            named,
            if_empty,
            allow_reserved,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct VarSpec {
    name: String,
    explode: bool,
    prefix: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Expression { op: Operator, vars: Vec<VarSpec> },
}

/// `varname [ ":" max-length | "*" ]`
static VARSPEC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((?:[A-Za-z0-9_]|%[0-9A-Fa-f]{2})(?:\.?(?:[A-Za-z0-9_]|%[0-9A-Fa-f]{2}))*)(?::([1-9][0-9]{0,3})|(\*))?$")
        .expect("invalid varspec regex")
});

/// A parsed URI template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    raw: String,
    parts: Vec<Part>,
}

impl UriTemplate {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let mut parts = Vec::new();
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            if open > 0 {
                parts.push(Part::Literal(rest[..open].to_string()));
            }
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| TemplateError::Unterminated(template.to_string()))?;
            parts.push(parse_expression(&after[..close], template)?);
            rest = &after[close + 1..];
        }
        if !rest.is_empty() {
            parts.push(Part::Literal(rest.to_string()));
        }
        Ok(Self {
            raw: template.to_string(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Declared variable names in order of first appearance.
    pub fn variables(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for part in &self.parts {
            if let Part::Expression { vars, .. } = part {
                for v in vars {
                    if !seen.contains(&v.name.as_str()) {
                        seen.push(v.name.as_str());
                    }
                }
            }
        }
        seen
    }

    pub fn declares(&self, name: &str) -> bool {
        self.variables().contains(&name)
    }

    /// `true` when the template has at least one expression.
    pub fn is_templated(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::Expression { .. }))
    }

    /// Expand with `vars`. Undeclared names are an error; missing ones are
    /// dropped.
    pub fn expand(&self, vars: &Variables) -> Result<String, TemplateError> {
        self.check_declared(vars)?;
        Ok(self.render(vars))
    }

    /// Supply some of the variables, deferring the rest.
    pub fn bind(&self, vars: &Variables) -> Result<TemplateBinding, TemplateError> {
        TemplateBinding::new(self.clone()).bind(vars)
    }

    fn check_declared(&self, vars: &Variables) -> Result<(), TemplateError> {
        let declared = self.variables();
        match vars.names().find(|n| !declared.contains(n)) {
            Some(name) => Err(TemplateError::UnknownVariable {
                name: name.to_string(),
                template: self.raw.clone(),
            }),
            None => Ok(()),
        }
    }

    fn render(&self, vars: &Variables) -> String {
        let mut out = String::with_capacity(self.raw.len());
        for part in &self.parts {
            match part {
                Part::Literal(text) => push_encoded(&mut out, text, true),
                Part::Expression { op, vars: specs } => expand_expression(&mut out, *op, specs, vars),
            }
        }
        out
    }
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_expression(body: &str, template: &str) -> Result<Part, TemplateError> {
    let mut chars = body.chars();
    let op = match chars.next() {
        None => return Err(TemplateError::EmptyExpression(template.to_string())),
        Some(c) if "=,!@|".contains(c) => {
            return Err(TemplateError::UnsupportedOperator {
                op: c,
                template: template.to_string(),
            })
        }
        Some(c) => Operator::from_char(c),
    };
    let list = match op {
        Some(_) => chars.as_str(),
        None => body,
    };
    let mut vars = Vec::new();
    for spec in list.split(',') {
        let caps = VARSPEC_RE
            .captures(spec)
            .ok_or_else(|| TemplateError::InvalidVariable {
                spec: spec.to_string(),
                template: template.to_string(),
            })?;
        vars.push(VarSpec {
            name: caps[1].to_string(),
            prefix: caps.get(2).and_then(|m| m.as_str().parse().ok()),
            explode: caps.get(3).is_some(),
        });
    }
    Ok(Part::Expression {
        op: op.unwrap_or(Operator::Simple),
        vars,
    })
}

// ---------------------------------------------------------------------------
// Expansion
// ---------------------------------------------------------------------------

fn expand_expression(out: &mut String, op: Operator, specs: &[VarSpec], vars: &Variables) {
    let spec = op.spec();
    let mut first = true;
    for var in specs {
        let value = match vars.get(&var.name) {
            Some(v) if !v.is_undefined() => v,
            _ => continue,
        };
        out.push_str(if first { spec.first } else { spec.sep });
        first = false;

        match value {
            TemplateValue::Str(s) => {
                if spec.named {
                    push_encoded(out, &var.name, true);
                    if s.is_empty() {
                        out.push_str(spec.if_empty);
                        continue;
                    }
                    out.push('=');
                }
                let s = match var.prefix {
                    Some(n) => s.chars().take(n).collect::<String>(),
                    None => s.clone(),
                };
                push_encoded(out, &s, spec.allow_reserved);
            }
            TemplateValue::List(items) if !var.explode => {
                if spec.named {
                    push_encoded(out, &var.name, true);
                    out.push('=');
                }
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    push_encoded(out, item, spec.allow_reserved);
                }
            }
            TemplateValue::Assoc(pairs) if !var.explode => {
                if spec.named {
                    push_encoded(out, &var.name, true);
                    out.push('=');
                }
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    push_encoded(out, k, spec.allow_reserved);
                    out.push(',');
                    push_encoded(out, v, spec.allow_reserved);
                }
            }
            TemplateValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(spec.sep);
                    }
                    if spec.named {
                        push_encoded(out, &var.name, true);
                        if item.is_empty() {
                            out.push_str(spec.if_empty);
                            continue;
                        }
                        out.push('=');
                    }
                    push_encoded(out, item, spec.allow_reserved);
                }
            }
            TemplateValue::Assoc(pairs) => {
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        out.push_str(spec.sep);
                    }
                    push_encoded(out, k, spec.allow_reserved);
                    if v.is_empty() && spec.named {
                        out.push_str(spec.if_empty);
                        continue;
                    }
                    out.push('=');
                    push_encoded(out, v, spec.allow_reserved);
                }
            }
        }
    }
}

const RESERVED: &str = ":/?#[]@!$&'()*+,;=";

fn is_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-._~".contains(c)
}

/// Percent-encode `s`, keeping unreserved characters and, when
/// `allow_reserved` is set, reserved characters and existing pct-triplets.
fn push_encoded(out: &mut String, s: &str, allow_reserved: bool) {
    let bytes = s.as_bytes();
    let mut buf = [0u8; 4];
    for (i, c) in s.char_indices() {
        if is_unreserved(c) || (allow_reserved && RESERVED.contains(c)) {
            out.push(c);
        } else if allow_reserved
            && c == '%'
            && bytes.len() > i + 2
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            out.push(c);
        } else {
            out.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
        }
    }
}

// ---------------------------------------------------------------------------
// Partial binding
// ---------------------------------------------------------------------------

/// A template with some variables supplied.
///
/// Not fetchable by itself. `remaining()` is always exactly the declared
/// variables minus the bound ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateBinding {
    template: UriTemplate,
    bound: Variables,
}

impl TemplateBinding {
    /// A binding with nothing supplied yet.
    pub fn new(template: UriTemplate) -> Self {
        Self {
            template,
            bound: Variables::new(),
        }
    }

    pub fn template(&self) -> &UriTemplate {
        &self.template
    }

    pub fn bound(&self) -> &Variables {
        &self.bound
    }

    /// Declared variables not yet supplied.
    pub fn remaining(&self) -> BTreeSet<String> {
        self.template
            .variables()
            .into_iter()
            .filter(|v| !self.bound.contains(v))
            .map(str::to_string)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.remaining().is_empty()
    }

    /// Supply more variables. Rebinding a name replaces its value.
    pub fn bind(&self, vars: &Variables) -> Result<TemplateBinding, TemplateError> {
        self.template.check_declared(vars)?;
        let mut bound = self.bound.clone();
        bound.extend(vars);
        Ok(Self {
            template: self.template.clone(),
            bound,
        })
    }

    /// Expand with what is bound; anything remaining is treated as undefined.
    pub fn expand(&self) -> String {
        self.template.render(&self.bound)
    }
}
