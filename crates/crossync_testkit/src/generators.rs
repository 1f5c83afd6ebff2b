//! Property-based test generators using proptest.
//!
//! Provides strategies for generating records that satisfy the
//! fixture record types.

use crate::fixtures::server_type;
use crossync_record::{IdentityKey, Record};
use proptest::prelude::*;

/// Strategy for generating valid record names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9-]{0,15}").expect("Invalid regex")
}

/// Strategy for generating context names, empty included.
pub fn context_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("(dc[0-9])?").expect("Invalid regex")
}

/// Strategy for generating dotted IPv4 addresses.
pub fn ip_strategy() -> impl Strategy<Value = String> {
    prop::array::uniform4(any::<u8>())
        .prop_map(|[a, b, c, d]| format!("{a}.{b}.{c}.{d}"))
}

/// Strategy for generating identity keys.
pub fn identity_key_strategy() -> impl Strategy<Value = IdentityKey> {
    (name_strategy(), context_strategy(), "[A-Z][a-z]{2,8}")
        .prop_map(|(name, context, ty)| {
            IdentityKey::new(name, context, ty).expect("Generated key is valid")
        })
}

/// Strategy for generating `Server` records with optional port and os.
pub fn server_strategy() -> impl Strategy<Value = Record> {
    (
        name_strategy(),
        context_strategy(),
        ip_strategy(),
        prop::option::of(1..=65535i64),
        prop::option::of(prop::sample::select(vec!["linux", "freebsd", "windows"])),
    )
        .prop_map(|(name, context, ip, port, os)| {
            let mut record = Record::new(name, context, server_type())
                .and_then(|r| r.with_field("ip", ip))
                .expect("Generated server is valid");
            if let Some(port) = port {
                record.set("port", port).expect("port is an int field");
            }
            if let Some(os) = os {
                record.set("os", os).expect("os is a string field");
            }
            record.commit();
            record
        })
}

/// Strategy for generating `Server` records with pairwise distinct
/// identity keys.
pub fn distinct_servers_strategy(
    min: usize,
    max: usize,
) -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec(server_strategy(), min..max).prop_map(|records| {
        let mut seen = std::collections::HashSet::new();
        records
            .into_iter()
            .filter(|r| seen.insert(r.identity_key().clone()))
            .collect()
    })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn generated_servers_validate(record in server_strategy()) {
            prop_assert!(record.validate().is_ok());
            prop_assert!(!record.is_dirty());
        }

        #[test]
        fn generated_keys_parse_back(key in identity_key_strategy()) {
            let parsed = IdentityKey::parse(&key.composite()).unwrap();
            prop_assert_eq!(parsed, key);
        }

        #[test]
        fn distinct_servers_have_unique_keys(records in distinct_servers_strategy(1, 20)) {
            let keys: std::collections::HashSet<_> =
                records.iter().map(|r| r.identity_key().clone()).collect();
            prop_assert_eq!(keys.len(), records.len());
        }
    }
}
