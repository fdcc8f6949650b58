//! Safe SQL identifier handling.
//!
//! This module provides [`Ident`] which represents an Oracle identifier
//! (owner/table/column), supporting dotted notation and quoted parts.
//!
//! Every rendered part is double-quoted, so reserved words, mixed case and
//! special characters are always safe:
//!
//! - Bare parts are cased per [`IdentifierCase`] and may contain any
//!   character except `"`, `.` and NUL.
//! - Quoted parts (`"Exact Name"`) keep their spelling.
//! - Parts longer than the configured maximum are shortened to a stable
//!   prefix plus a hash suffix.
//!
//! Oracle cannot represent `"` or NUL inside a quoted identifier, so names
//! containing them are rejected rather than escaped.
//!
//! # Example
//! ```ignore
//! use oradialect::DialectConfig;
//! use oradialect::ident::Ident;
//!
//! let config = DialectConfig::default();
//! let t = Ident::parse("app.users")?;
//! assert_eq!(t.render(&config), r#""APP"."USERS""#);
//! # Ok::<(), oradialect::OrmError>(())
//! ```

use crate::config::{DialectConfig, IdentifierCase};
use crate::error::{OrmError, OrmResult};
use sha2::{Digest, Sha256};

/// Hex characters of the hash suffix used when shortening.
const HASH_SUFFIX_LEN: usize = 8;

/// A part of a SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentPart {
    /// Bare identifier: cased per configuration before quoting.
    Bare(String),
    /// Quoted identifier: spelling kept exactly.
    Quoted(String),
    /// `*` in `table.*`.
    Star,
}

/// A SQL identifier (column, table, or owner-qualified name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub parts: Vec<IdentPart>,
}

fn check_chars(name: &str) -> OrmResult<()> {
    if name.contains('\0') {
        return Err(OrmError::validation(
            "Identifier cannot contain NUL character",
        ));
    }
    if name.contains('"') {
        return Err(OrmError::validation(format!(
            "Identifier cannot contain a double quote: {name:?}"
        )));
    }
    Ok(())
}

impl Ident {
    /// Create a single-part identifier with exact spelling.
    pub fn quoted(name: &str) -> OrmResult<Self> {
        if name.is_empty() {
            return Err(OrmError::validation("Empty quoted identifier"));
        }
        check_chars(name)?;
        Ok(Self {
            parts: vec![IdentPart::Quoted(name.to_string())],
        })
    }

    /// Parse an identifier string, supporting dotted and quoted forms.
    ///
    /// - Dotted: `owner.table.column`
    /// - Quoted: `"CamelCase"."UserTable"`
    /// - Mixed: `app."UserTable".id`
    pub fn parse(s: &str) -> OrmResult<Self> {
        if s.is_empty() {
            return Err(OrmError::validation("Identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(OrmError::validation(
                "Identifier cannot contain NUL character",
            ));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            // Consume '.' between parts (but require there is a next part).
            if !parts.is_empty() {
                match chars.next() {
                    Some('.') => {
                        if chars.peek().is_none() {
                            return Err(OrmError::validation("Trailing '.' in identifier"));
                        }
                    }
                    Some(c) => {
                        return Err(OrmError::validation(format!(
                            "Expected '.' between identifier parts, got '{c}'"
                        )));
                    }
                    None => break,
                }
            }

            // Quoted identifier part.
            if chars.peek() == Some(&'"') {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(c) => name.push(c),
                        None => return Err(OrmError::validation("Unclosed quoted identifier")),
                    }
                }
                if name.is_empty() {
                    return Err(OrmError::validation("Empty quoted identifier"));
                }
                if chars.peek().is_some_and(|c| *c != '.') {
                    return Err(OrmError::validation(format!(
                        "Unexpected characters after quoted identifier in {s:?}"
                    )));
                }
                parts.push(IdentPart::Quoted(name));
                continue;
            }

            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                if c == '"' {
                    return Err(OrmError::validation(format!(
                        "Identifier cannot contain a double quote: {s:?}"
                    )));
                }
                name.push(c);
                chars.next();
            }
            if name.is_empty() {
                return Err(OrmError::validation("Empty identifier segment"));
            }
            if name == "*" {
                parts.push(IdentPart::Star);
            } else {
                parts.push(IdentPart::Bare(name));
            }
        }

        if parts.is_empty() {
            return Err(OrmError::validation("Empty identifier"));
        }
        if parts[..parts.len() - 1]
            .iter()
            .any(|p| matches!(p, IdentPart::Star))
        {
            return Err(OrmError::validation("'*' is only allowed as the last part"));
        }

        Ok(Self { parts })
    }

    /// Render the identifier as SQL.
    pub fn render(&self, config: &DialectConfig) -> String {
        let mut out = String::new();
        self.write_sql(config, &mut out);
        out
    }

    pub(crate) fn write_sql(&self, config: &DialectConfig, out: &mut String) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            match part {
                IdentPart::Star => out.push('*'),
                IdentPart::Bare(s) => {
                    out.push('"');
                    out.push_str(&shorten(&apply_case(s, config.identifier_case), config.max_identifier_length));
                    out.push('"');
                }
                IdentPart::Quoted(s) => {
                    out.push('"');
                    out.push_str(&shorten(s, config.max_identifier_length));
                    out.push('"');
                }
            }
        }
    }

    /// The last part's stored (unquoted) name, as the data dictionary spells it.
    pub fn stored_name(&self, config: &DialectConfig) -> Option<String> {
        match self.parts.last()? {
            IdentPart::Bare(s) => Some(shorten(
                &apply_case(s, config.identifier_case),
                config.max_identifier_length,
            )),
            IdentPart::Quoted(s) => Some(shorten(s, config.max_identifier_length)),
            IdentPart::Star => None,
        }
    }
}

fn apply_case(s: &str, case: IdentifierCase) -> String {
    match case {
        IdentifierCase::Upper => s.to_uppercase(),
        IdentifierCase::Preserve => s.to_string(),
    }
}

/// Deterministically shorten `name` to at most `max_len` bytes.
///
/// Names that fit are returned unchanged. Longer names keep a prefix cut on a
/// char boundary followed by `_` and the first eight hex digits of the name's
/// SHA-256, so two long names sharing a prefix do not collide.
pub fn shorten(name: &str, max_len: usize) -> String {
    if name.len() <= max_len {
        return name.to_string();
    }
    let digest = Sha256::digest(name.as_bytes());
    let mut hash = String::with_capacity(HASH_SUFFIX_LEN);
    for byte in digest.iter().take(HASH_SUFFIX_LEN / 2) {
        hash.push_str(&format!("{byte:02X}"));
    }

    let mut keep = max_len.saturating_sub(HASH_SUFFIX_LEN + 1);
    while keep > 0 && !name.is_char_boundary(keep) {
        keep -= 1;
    }
    format!("{}_{}", &name[..keep], hash)
}

/// Quote an identifier (possibly dotted) for the configured dialect.
pub fn quote_identifier(name: &str, config: &DialectConfig) -> OrmResult<String> {
    Ok(Ident::parse(name)?.render(config))
}

/// The name as stored in the data dictionary (cased and shortened), for a
/// single-part identifier. Used to compare declared names with introspected ones.
pub fn stored_name(name: &str, config: &DialectConfig) -> OrmResult<String> {
    Ident::parse(name)?
        .stored_name(config)
        .ok_or_else(|| OrmError::validation(format!("'{name}' is not a name")))
}

/// Convert an input into an [`Ident`].
///
/// This is mainly for ergonomics in builder APIs.
pub trait IntoIdent {
    fn into_ident(self) -> OrmResult<Ident>;
}

impl IntoIdent for Ident {
    fn into_ident(self) -> OrmResult<Ident> {
        Ok(self)
    }
}

impl IntoIdent for &Ident {
    fn into_ident(self) -> OrmResult<Ident> {
        Ok(self.clone())
    }
}

impl IntoIdent for &str {
    fn into_ident(self) -> OrmResult<Ident> {
        Ident::parse(self)
    }
}

impl IntoIdent for String {
    fn into_ident(self) -> OrmResult<Ident> {
        Ident::parse(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upper() -> DialectConfig {
        DialectConfig::default()
    }

    fn preserve() -> DialectConfig {
        DialectConfig::default().identifier_case(IdentifierCase::Preserve)
    }

    #[test]
    fn ident_simple() {
        let ident = Ident::parse("users").unwrap();
        assert_eq!(ident.render(&upper()), r#""USERS""#);
        assert_eq!(ident.render(&preserve()), r#""users""#);
    }

    #[test]
    fn ident_dotted() {
        let ident = Ident::parse("app.users").unwrap();
        assert_eq!(ident.render(&upper()), r#""APP"."USERS""#);
    }

    #[test]
    fn ident_quoted_keeps_case() {
        let ident = Ident::parse(r#""CamelCase".id"#).unwrap();
        assert_eq!(ident.render(&upper()), r#""CamelCase"."ID""#);
    }

    #[test]
    fn ident_star() {
        let ident = Ident::parse("u.*").unwrap();
        assert_eq!(ident.render(&upper()), r#""U".*"#);
        assert!(Ident::parse("*.u").is_err());
    }

    #[test]
    fn reserved_words_and_spaces_are_quoted() {
        assert_eq!(quote_identifier("order", &upper()).unwrap(), r#""ORDER""#);
        assert_eq!(
            quote_identifier("my table", &preserve()).unwrap(),
            r#""my table""#
        );
    }

    #[test]
    fn injection_attempts_stay_inside_quotes() {
        let quoted = quote_identifier("users; drop table users; --", &preserve()).unwrap();
        assert_eq!(quoted, r#""users; drop table users; --""#);
    }

    #[test]
    fn ident_rejects_unsafe() {
        assert!(Ident::parse("").is_err());
        assert!(Ident::parse(r#"a"b"#).is_err());
        assert!(Ident::parse("a\0b").is_err());
        assert!(Ident::parse("schema..table").is_err());
        assert!(Ident::parse("schema.").is_err());
        assert!(Ident::parse(r#""unclosed"#).is_err());
        assert!(Ident::parse(r#""a"x"#).is_err());
    }

    #[test]
    fn short_names_are_unchanged() {
        assert_eq!(shorten("USERS", 30), "USERS");
        let exact = "A".repeat(30);
        assert_eq!(shorten(&exact, 30), exact);
    }

    #[test]
    fn long_names_are_shortened_deterministically() {
        let a = format!("{}_ALPHA", "X".repeat(40));
        let b = format!("{}_BRAVO", "X".repeat(40));
        let sa = shorten(&a, 30);
        let sb = shorten(&b, 30);
        assert_eq!(sa.len(), 30);
        assert_eq!(sb.len(), 30);
        assert_ne!(sa, sb);
        assert_eq!(sa, shorten(&a, 30));
        assert!(sa.starts_with(&"X".repeat(21)));
    }

    #[test]
    fn shortening_respects_char_boundaries() {
        let name = "é".repeat(40);
        let s = shorten(&name, 30);
        assert!(s.len() <= 30);
        assert!(s.is_char_boundary(s.len()));
    }

    #[test]
    fn stored_name_applies_case_and_length() {
        let config = upper().max_identifier_length(30);
        assert_eq!(stored_name("users", &config).unwrap(), "USERS");
        let long = "a".repeat(50);
        assert_eq!(stored_name(&long, &config).unwrap().len(), 30);
    }
}
