//! Bind marker translation.
//!
//! Templates use `?` for positional values and `@name` for named values.
//! They become Oracle `:1, :2, ...` or `:name` markers depending on
//! [`PlaceholderStyle`]. Text inside string literals (including `q'[...]'`),
//! quoted identifiers and comments is copied untouched. `@` directly after an
//! identifier is a database link (`t@remote`), not a marker.
//!
//! A template that already uses native `:1` / `:name` markers is passed
//! through unchanged; mixing native and portable markers is rejected.

use crate::config::{DialectConfig, PlaceholderStyle};
use crate::error::{OrmError, OrmResult};
use crate::statement::{Binds, ResultShape, Statement, marker_name};
use crate::types::TypeMapper;
use crate::value::{ToValue, Value};
use std::collections::{BTreeMap, HashMap};

/// Values for a template: positional values consumed in order, plus named
/// values looked up by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    positional: Vec<Value>,
    named: Vec<(String, Value)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positional(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            named: Vec::new(),
        }
    }

    pub fn named<N: Into<String>>(pairs: impl IntoIterator<Item = (N, Value)>) -> Self {
        Self {
            positional: Vec::new(),
            named: pairs.into_iter().map(|(n, v)| (n.into(), v)).collect(),
        }
    }

    /// Append a positional value.
    pub fn bind(mut self, value: impl ToValue) -> Self {
        self.positional.push(value.to_value());
        self
    }

    /// Add a named value. Names match case-insensitively and a later value
    /// for the same name wins.
    pub fn bind_named(mut self, name: impl Into<String>, value: impl ToValue) -> Self {
        self.named.push((name.into(), value.to_value()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.named
            .iter()
            .rev()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Self::positional(values)
    }
}

impl From<BTreeMap<String, Value>> for Args {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self::named(map)
    }
}

impl From<HashMap<String, Value>> for Args {
    fn from(map: HashMap<String, Value>) -> Self {
        Self::named(map)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Text(&'a str),
    Positional,
    Named(&'a str),
    /// A native marker including its colon.
    Native(&'a str),
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b == b'#' || b >= 0x80
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn unterminated(what: &str) -> OrmError {
    OrmError::translation(format!("unterminated {what} in SQL template"))
}

/// Index just past a `'...'` or `"..."` run starting at `start`.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> OrmResult<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return Ok(i + 1);
        }
        i += 1;
    }
    Err(unterminated(if quote == b'\'' {
        "string literal"
    } else {
        "quoted identifier"
    }))
}

/// Whether the `q` at `i` starts an alternative-quote literal (`q'`/`nq'`).
fn starts_q_quote(bytes: &[u8], i: usize) -> bool {
    if bytes.get(i + 1) != Some(&b'\'') {
        return false;
    }
    match i {
        0 => true,
        _ if !is_ident_byte(bytes[i - 1]) => true,
        1 => matches!(bytes[0], b'n' | b'N'),
        _ => matches!(bytes[i - 1], b'n' | b'N') && !is_ident_byte(bytes[i - 2]),
    }
}

fn skip_q_quote(template: &str, start: usize) -> OrmResult<usize> {
    let rest = &template[start + 2..];
    let open = rest
        .chars()
        .next()
        .ok_or_else(|| unterminated("q-quoted literal"))?;
    let close = match open {
        '[' => ']',
        '{' => '}',
        '(' => ')',
        '<' => '>',
        c => c,
    };
    let body = start + 2 + open.len_utf8();
    let mut terminator = String::with_capacity(2);
    terminator.push(close);
    terminator.push('\'');
    template[body..]
        .find(&terminator)
        .map(|off| body + off + terminator.len())
        .ok_or_else(|| unterminated("q-quoted literal"))
}

fn scan(template: &str) -> OrmResult<Vec<Token<'_>>> {
    let bytes = template.as_bytes();
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let next = bytes.get(i + 1).copied();
        match bytes[i] {
            b'\'' => i = skip_quoted(bytes, i, b'\'')?,
            b'"' => i = skip_quoted(bytes, i, b'"')?,
            b'-' if next == Some(b'-') => {
                i = template[i..].find('\n').map_or(bytes.len(), |n| i + n + 1);
            }
            b'/' if next == Some(b'*') => {
                i = template[i + 2..]
                    .find("*/")
                    .map(|n| i + 2 + n + 2)
                    .ok_or_else(|| unterminated("block comment"))?;
            }
            b'q' | b'Q' if starts_q_quote(bytes, i) => i = skip_q_quote(template, i)?,
            b'?' => {
                flush(&mut tokens, template, text_start, i);
                tokens.push(Token::Positional);
                i += 1;
                text_start = i;
            }
            b'@' if next.is_some_and(is_name_start)
                && (i == 0 || !(is_ident_byte(bytes[i - 1]) || bytes[i - 1] == b'"')) =>
            {
                let end = name_end(bytes, i + 1);
                flush(&mut tokens, template, text_start, i);
                tokens.push(Token::Named(&template[i + 1..end]));
                i = end;
                text_start = i;
            }
            b':' if next.is_some_and(is_name_byte)
                && (i == 0 || !(is_ident_byte(bytes[i - 1]) || bytes[i - 1] == b':')) =>
            {
                let end = name_end(bytes, i + 1);
                flush(&mut tokens, template, text_start, i);
                tokens.push(Token::Native(&template[i..end]));
                i = end;
                text_start = i;
            }
            _ => i += 1,
        }
    }
    flush(&mut tokens, template, text_start, bytes.len());
    Ok(tokens)
}

fn flush<'a>(tokens: &mut Vec<Token<'a>>, template: &'a str, from: usize, to: usize) {
    if from < to {
        tokens.push(Token::Text(&template[from..to]));
    }
}

fn name_end(bytes: &[u8], from: usize) -> usize {
    let mut end = from;
    while end < bytes.len() && is_name_byte(bytes[end]) {
        end += 1;
    }
    end
}

/// Native markers (without the colon) in order of appearance.
pub fn native_markers(sql: &str) -> OrmResult<Vec<String>> {
    Ok(scan(sql)?
        .into_iter()
        .filter_map(|t| match t {
            Token::Native(m) => Some(m[1..].to_string()),
            _ => None,
        })
        .collect())
}

/// Bind names are case-insensitive, so `@P1` collides with `:p1` too.
fn is_generated_name(name: &str) -> bool {
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    let lower = name.to_ascii_lowercase();
    ["p", "ret"]
        .iter()
        .any(|prefix| lower.strip_prefix(prefix).is_some_and(digits))
}

/// Accumulates native SQL and binds while a statement is assembled.
///
/// Builders call [`Emitter::bind`] for each value; raw fragments go through
/// [`Emitter::template`] so numbering continues across the whole statement.
#[derive(Debug)]
pub(crate) struct Emitter<'a> {
    config: &'a DialectConfig,
    pub(crate) sql: String,
    positional: Vec<Value>,
    named: Vec<(String, Value)>,
    /// Markers emitted so far, in-binds and out-binds.
    markers: usize,
    outs: usize,
}

impl<'a> Emitter<'a> {
    pub(crate) fn new(config: &'a DialectConfig) -> Self {
        Self {
            config,
            sql: String::new(),
            positional: Vec::new(),
            named: Vec::new(),
            markers: 0,
            outs: 0,
        }
    }

    pub(crate) fn config(&self) -> &'a DialectConfig {
        self.config
    }

    pub(crate) fn push_str(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    pub(crate) fn push(&mut self, c: char) {
        self.sql.push(c);
    }

    /// Append a fresh marker bound to an already-encoded value.
    pub(crate) fn bind(&mut self, value: Value) {
        self.markers += 1;
        let name = marker_name(self.config.placeholder_style, self.markers);
        self.sql.push(':');
        self.sql.push_str(&name);
        match self.config.placeholder_style {
            PlaceholderStyle::Numbered => self.positional.push(value),
            PlaceholderStyle::Named => self.named.push((name, value)),
        }
    }

    fn bind_named(&mut self, name: &str, value: &Value) -> OrmResult<()> {
        match self.config.placeholder_style {
            PlaceholderStyle::Numbered => {
                self.bind(TypeMapper::new(self.config).encode_untyped(value.clone()));
            }
            PlaceholderStyle::Named => {
                if is_generated_name(name) {
                    return Err(OrmError::translation(format!(
                        "bind name @{name} collides with generated marker names"
                    )));
                }
                // @v and @V are one bind; the first spelling is kept.
                let bound = self
                    .named
                    .iter()
                    .find(|(n, _)| n.eq_ignore_ascii_case(name))
                    .map(|(n, _)| n.clone());
                self.sql.push(':');
                match bound {
                    Some(existing) => self.sql.push_str(&existing),
                    None => {
                        self.sql.push_str(name);
                        self.named.push((
                            name.to_string(),
                            TypeMapper::new(self.config).encode_untyped(value.clone()),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Append an out-bind marker and return its name (without the colon).
    pub(crate) fn out_marker(&mut self) -> String {
        self.markers += 1;
        self.outs += 1;
        let name = match self.config.placeholder_style {
            PlaceholderStyle::Numbered => self.markers.to_string(),
            PlaceholderStyle::Named => format!("ret{}", self.outs),
        };
        self.sql.push(':');
        self.sql.push_str(&name);
        name
    }

    /// Translate a portable fragment into the statement.
    pub(crate) fn template(&mut self, template: &str, args: &Args) -> OrmResult<()> {
        let tokens = scan(template)?;
        if tokens.iter().any(|t| matches!(t, Token::Native(_))) {
            return Err(OrmError::translation(
                "native :n / :name markers are not allowed in fragments; use ? or @name",
            ));
        }
        self.emit_tokens(&tokens, args)
    }

    fn emit_tokens(&mut self, tokens: &[Token<'_>], args: &Args) -> OrmResult<()> {
        let mut used = 0;
        for token in tokens {
            match token {
                Token::Text(s) => self.sql.push_str(s),
                Token::Positional => {
                    let value = args.positional.get(used).ok_or_else(|| {
                        OrmError::translation(format!(
                            "not enough positional values: {} given",
                            args.positional.len()
                        ))
                    })?;
                    used += 1;
                    let value = TypeMapper::new(self.config).encode_untyped(value.clone());
                    self.bind(value);
                }
                Token::Named(name) => {
                    let value = args.lookup(name).ok_or_else(|| {
                        OrmError::translation(format!("unbound named parameter @{name}"))
                    })?;
                    self.bind_named(name, value)?;
                }
                Token::Native(m) => self.sql.push_str(m),
            }
        }
        if used < args.positional.len() {
            return Err(OrmError::translation(format!(
                "too many positional values: {} given, {used} used",
                args.positional.len()
            )));
        }
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (String, Binds) {
        let binds = match self.config.placeholder_style {
            PlaceholderStyle::Numbered => Binds::Positional(self.positional),
            PlaceholderStyle::Named => Binds::Named(self.named),
        };
        (self.sql, binds)
    }
}

/// Translate a portable template into a native statement.
pub fn translate(template: &str, args: Args, config: &DialectConfig) -> OrmResult<Statement> {
    let tokens = scan(template)?;
    let native = tokens.iter().any(|t| matches!(t, Token::Native(_)));
    let portable = tokens
        .iter()
        .any(|t| matches!(t, Token::Positional | Token::Named(_)));

    if native && portable {
        return Err(OrmError::translation(
            "cannot mix native :n / :name markers with ? or @name markers",
        ));
    }

    if native {
        let mapper = TypeMapper::new(config);
        let binds = if args.named.is_empty() {
            Binds::Positional(
                args.positional
                    .into_iter()
                    .map(|v| mapper.encode_untyped(v))
                    .collect(),
            )
        } else if args.positional.is_empty() {
            Binds::Named(
                args.named
                    .into_iter()
                    .map(|(n, v)| (n, mapper.encode_untyped(v)))
                    .collect(),
            )
        } else {
            return Err(OrmError::translation(
                "native markers take either positional or named values, not both",
            ));
        };
        return Ok(Statement::new(template, binds, ResultShape::Rows));
    }

    let mut emitter = Emitter::new(config);
    emitter.emit_tokens(&tokens, &args)?;
    let (sql, binds) = emitter.into_parts();
    Ok(Statement::new(sql, binds, ResultShape::Rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered() -> DialectConfig {
        DialectConfig::default()
    }

    fn named() -> DialectConfig {
        DialectConfig::default().placeholder_style(PlaceholderStyle::Named)
    }

    fn positional(stmt: &Statement) -> &[Value] {
        match &stmt.binds {
            Binds::Positional(v) => v,
            other => panic!("expected positional binds, got {other:?}"),
        }
    }

    #[test]
    fn positional_markers_are_numbered() {
        let stmt = translate(
            "SELECT * FROM t WHERE a = ? AND b = ?",
            Args::new().bind(1).bind("x"),
            &numbered(),
        )
        .unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM t WHERE a = :1 AND b = :2");
        assert_eq!(positional(&stmt), &[Value::Int(1), Value::Text("x".into())]);
        stmt.validate().unwrap();
    }

    #[test]
    fn repeated_names_duplicate_values_when_numbered() {
        let stmt = translate(
            "SELECT * FROM t WHERE a = @v OR b = @v",
            Args::new().bind_named("v", 7),
            &numbered(),
        )
        .unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM t WHERE a = :1 OR b = :2");
        assert_eq!(positional(&stmt), &[Value::Int(7), Value::Int(7)]);
        stmt.validate().unwrap();
    }

    #[test]
    fn repeated_names_reuse_one_bind_when_named() {
        let stmt = translate(
            "SELECT * FROM t WHERE a = @v OR b = @v AND c = ?",
            Args::new().bind_named("v", 7).bind(true),
            &named(),
        )
        .unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM t WHERE a = :v OR b = :v AND c = :p1");
        assert_eq!(
            stmt.binds,
            Binds::Named(vec![
                ("v".into(), Value::Int(7)),
                ("p1".into(), Value::Int(1)),
            ])
        );
        stmt.validate().unwrap();
    }

    #[test]
    fn names_differing_only_in_case_are_one_bind() {
        let stmt = translate(
            "SELECT * FROM t WHERE a = @v OR b = @V",
            Args::new().bind_named("v", 7),
            &named(),
        )
        .unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM t WHERE a = :v OR b = :v");
        assert_eq!(stmt.binds, Binds::Named(vec![("v".into(), Value::Int(7))]));
        stmt.validate().unwrap();

        let stmt = translate("SELECT @Id FROM DUAL", Args::new().bind_named("ID", 1), &numbered())
            .unwrap();
        assert_eq!(positional(&stmt), &[Value::Int(1)]);
    }

    #[test]
    fn generated_marker_names_are_reserved_in_any_case() {
        for name in ["p1", "P2", "ret1", "Ret3", "RET4"] {
            let template = format!("SELECT @{name} FROM DUAL");
            let err = translate(&template, Args::new().bind_named(name, 1), &named()).unwrap_err();
            assert!(err.to_string().contains("collides"), "{name}: {err}");
        }
        translate(
            "SELECT @pad, @p FROM DUAL",
            Args::new().bind_named("pad", 1).bind_named("p", 2),
            &named(),
        )
        .unwrap();
    }

    #[test]
    fn unbound_and_miscounted_values_fail() {
        let err = translate("SELECT @missing FROM DUAL", Args::new(), &numbered()).unwrap_err();
        assert!(err.to_string().contains("unbound named parameter @missing"));

        assert!(translate("SELECT ?, ? FROM DUAL", Args::new().bind(1), &numbered()).is_err());
        assert!(translate("SELECT ? FROM DUAL", Args::new().bind(1).bind(2), &numbered()).is_err());

        // unused named values are fine
        translate("SELECT 1 FROM DUAL", Args::new().bind_named("x", 1), &numbered()).unwrap();
    }

    #[test]
    fn markers_inside_literals_and_comments_are_ignored() {
        let sql = "SELECT '?', \"a?b\", q'[it's ?]', Q'{@x}' -- ? here\nFROM t /* @y ? */ WHERE c = ?";
        let stmt = translate(sql, Args::new().bind(1), &numbered()).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT '?', \"a?b\", q'[it's ?]', Q'{@x}' -- ? here\nFROM t /* @y ? */ WHERE c = :1"
        );
    }

    #[test]
    fn escaped_quotes_stay_inside_literals() {
        let stmt = translate("SELECT 'it''s ?' FROM t WHERE a = ?", Args::new().bind(1), &numbered())
            .unwrap();
        assert_eq!(stmt.sql, "SELECT 'it''s ?' FROM t WHERE a = :1");
    }

    #[test]
    fn database_links_are_not_markers() {
        let stmt = translate("SELECT * FROM orders@remote WHERE id = ?", Args::new().bind(1), &numbered())
            .unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM orders@remote WHERE id = :1");
    }

    #[test]
    fn native_markers_pass_through() {
        let stmt = translate(
            "SELECT * FROM t WHERE a = :1 AND b = :2",
            Args::new().bind(1).bind(2),
            &numbered(),
        )
        .unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM t WHERE a = :1 AND b = :2");
        assert_eq!(positional(&stmt).len(), 2);

        let err = translate("SELECT * FROM t WHERE a = :1 AND b = ?", Args::new().bind(1), &numbered())
            .unwrap_err();
        assert!(err.to_string().contains("cannot mix"));
    }

    #[test]
    fn assignment_is_not_a_marker() {
        assert!(native_markers("BEGIN x := 1; END;").unwrap().is_empty());
        assert_eq!(native_markers("a = :1 AND b = :name").unwrap(), vec!["1", "name"]);
    }

    #[test]
    fn unterminated_constructs_fail() {
        assert!(translate("SELECT 'abc", Args::new(), &numbered()).is_err());
        assert!(translate("SELECT q'[abc' FROM DUAL", Args::new(), &numbered()).is_err());
        assert!(translate("SELECT 1 /* open", Args::new(), &numbered()).is_err());
    }

    #[test]
    fn generated_names_are_reserved_in_named_style() {
        let err = translate("SELECT @p1 FROM DUAL", Args::new().bind_named("p1", 1), &named())
            .unwrap_err();
        assert!(err.to_string().contains("collides"));
    }

    #[test]
    fn map_arguments() {
        let mut map = BTreeMap::new();
        map.insert("id".to_string(), Value::Int(5));
        let stmt = translate("DELETE FROM t WHERE id = @id", map.into(), &numbered()).unwrap();
        assert_eq!(positional(&stmt), &[Value::Int(5)]);
    }

    #[test]
    fn adversarial_values_never_reach_sql() {
        let evil = "x'; DROP TABLE users; --";
        let stmt = translate("SELECT * FROM t WHERE name = ?", Args::new().bind(evil), &numbered())
            .unwrap();
        assert!(!stmt.sql.contains("DROP"));
        assert!(!stmt.sql.contains(';'));
        assert_eq!(positional(&stmt), &[Value::Text(evil.into())]);
    }
}
