//! Cross-store identity keys.

use crate::error::{RecordError, RecordResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between the components of a composite identity key.
pub const KEY_SEPARATOR: char = '\x1f';

/// Escapes a literal [`KEY_SEPARATOR`] or itself inside a component of the
/// composite form.
pub const KEY_ESCAPE: char = '\\';

/// The `(name, context, type)` triple that identifies a logical entity
/// across stores.
///
/// Stores do not share primary key spaces, so records are matched by
/// this key alone. Two records with the same key are the same entity at
/// possibly different revisions, whatever their field values.
///
/// Components may contain any character. In the composite form a
/// [`KEY_SEPARATOR`] or [`KEY_ESCAPE`] inside a component is preceded by
/// [`KEY_ESCAPE`], so distinct triples always give distinct composites.
/// The name and type name must be non-empty; an empty context denotes the
/// root context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityKey {
    name: String,
    context_name: String,
    type_name: String,
}

impl IdentityKey {
    /// Creates an identity key, validating each component.
    pub fn new(
        name: impl Into<String>,
        context_name: impl Into<String>,
        type_name: impl Into<String>,
    ) -> RecordResult<Self> {
        let name = name.into();
        let context_name = context_name.into();
        let type_name = type_name.into();

        check_component("name", &name, false)?;
        check_component("context name", &context_name, true)?;
        check_component("type name", &type_name, false)?;

        Ok(Self {
            name,
            context_name,
            type_name,
        })
    }

    /// Parses a composite key produced by [`IdentityKey::composite`].
    pub fn parse(composite: &str) -> RecordResult<Self> {
        let malformed = || RecordError::MalformedKey(composite.to_owned());

        let mut parts = vec![String::new()];
        let mut chars = composite.chars();
        while let Some(c) = chars.next() {
            match c {
                KEY_ESCAPE => {
                    let escaped = chars.next().ok_or_else(malformed)?;
                    if escaped != KEY_ESCAPE && escaped != KEY_SEPARATOR {
                        return Err(malformed());
                    }
                    parts.last_mut().ok_or_else(malformed)?.push(escaped);
                }
                KEY_SEPARATOR => parts.push(String::new()),
                c => parts.last_mut().ok_or_else(malformed)?.push(c),
            }
        }

        let mut parts = parts.into_iter();
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(name), Some(context), Some(type_name), None) => {
                Self::new(name, context, type_name)
            }
            _ => Err(malformed()),
        }
    }

    /// Returns the record name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the owning context name.
    pub fn context_name(&self) -> &str {
        &self.context_name
    }

    /// Returns the record type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Renders the key as `name \x1f context \x1f type`, escaping
    /// separators inside components.
    pub fn composite(&self) -> String {
        let mut out = String::with_capacity(
            self.name.len() + self.context_name.len() + self.type_name.len() + 2,
        );
        push_escaped(&mut out, &self.name);
        out.push(KEY_SEPARATOR);
        push_escaped(&mut out, &self.context_name);
        out.push(KEY_SEPARATOR);
        push_escaped(&mut out, &self.type_name);
        out
    }
}

fn push_escaped(out: &mut String, component: &str) {
    for c in component.chars() {
        if c == KEY_SEPARATOR || c == KEY_ESCAPE {
            out.push(KEY_ESCAPE);
        }
        out.push(c);
    }
}

fn check_component(component: &'static str, value: &str, allow_empty: bool) -> RecordResult<()> {
    if !allow_empty && value.is_empty() {
        return Err(RecordError::InvalidName {
            component,
            value: value.to_owned(),
        });
    }
    Ok(())
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.type_name, self.context_name, self.name)
    }
}

impl From<IdentityKey> for String {
    fn from(key: IdentityKey) -> Self {
        key.composite()
    }
}

impl TryFrom<String> for IdentityKey {
    type Error = RecordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        IdentityKey::parse(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn composite_and_parse_are_inverse() {
        let key = IdentityKey::new("host1", "dc1", "Server").unwrap();
        assert_eq!(key.composite(), "host1\u{1f}dc1\u{1f}Server");
        assert_eq!(IdentityKey::parse(&key.composite()).unwrap(), key);
    }

    #[test]
    fn empty_context_is_allowed() {
        let key = IdentityKey::new("root", "", "Project").unwrap();
        assert_eq!(IdentityKey::parse(&key.composite()).unwrap(), key);
    }

    #[test]
    fn rejects_empty_name() {
        assert!(matches!(
            IdentityKey::new("", "dc1", "Server"),
            Err(RecordError::InvalidName { component: "name", .. })
        ));
        assert!(IdentityKey::new("host1", "dc1", "").is_err());
    }

    #[test]
    fn parse_rejects_wrong_arity() {
        assert!(matches!(
            IdentityKey::parse("host1\u{1f}dc1"),
            Err(RecordError::MalformedKey(_))
        ));
        assert!(IdentityKey::parse("a\u{1f}b\u{1f}c\u{1f}d").is_err());
    }

    #[test]
    fn separator_inside_components_is_escaped() {
        let key = IdentityKey::new("a\u{1f}b", "dc\\1", "Server").unwrap();
        assert_eq!(key.composite(), "a\\\u{1f}b\u{1f}dc\\\\1\u{1f}Server");
        assert_eq!(IdentityKey::parse(&key.composite()).unwrap(), key);

        // naive splitting would confuse these two
        let shifted = IdentityKey::new("a", "b\u{1f}", "Server").unwrap();
        assert_ne!(shifted.composite(), key.composite());
    }

    #[test]
    fn parse_rejects_dangling_escape() {
        assert!(matches!(
            IdentityKey::parse("host1\u{1f}dc1\u{1f}Server\\"),
            Err(RecordError::MalformedKey(_))
        ));
        assert!(IdentityKey::parse("ho\\st\u{1f}dc1\u{1f}Server").is_err());
    }

    #[test]
    fn display_is_readable() {
        let key = IdentityKey::new("host1", "dc1", "Server").unwrap();
        assert_eq!(key.to_string(), "Server:dc1/host1");
    }

    #[test]
    fn serializes_as_composite_string() {
        let key = IdentityKey::new("host1", "dc1", "Server").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"host1\\u001fdc1\\u001fServer\"");
        let back: IdentityKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    proptest! {
        #[test]
        fn distinct_triples_give_distinct_composites(
            a in "[a-z\\\\\x1f]{1,8}", b in "[a-z\\\\\x1f]{0,8}", c in "[A-Z][a-z]{0,6}",
            d in "[a-z\\\\\x1f]{1,8}", e in "[a-z\\\\\x1f]{0,8}", f in "[A-Z][a-z]{0,6}",
        ) {
            let left = IdentityKey::new(a.clone(), b.clone(), c.clone()).unwrap();
            let right = IdentityKey::new(d.clone(), e.clone(), f.clone()).unwrap();
            prop_assert_eq!((a, b, c) == (d, e, f), left.composite() == right.composite());
            prop_assert_eq!(IdentityKey::parse(&left.composite()).unwrap(), left);
        }
    }
}
