//! Field-merge rules for enrichment.
//!
//! Every rule takes `(base, incoming)` and mutates the base copy under a
//! documented policy. The invariant across all of them: a key already
//! present in the base record is never overwritten.

use serde_json::Value;

use crate::types::Record;

/// Prefix for flattened identity attribute fields.
const ATTR_PREFIX: &str = "client_attr_";

/// Prefix for identity fields that collide with a base field.
const COLLISION_PREFIX: &str = "client_";

/// Expands a nested `attributes` object into prefixed scalar fields
/// (`client_attr_<key>`).
pub fn flatten_attributes(base: &mut Record, attrs: &Record) {
    for (key, value) in attrs {
        base.insert(format!("{}{}", ATTR_PREFIX, key), value.clone());
    }
}

/// Projects a nested `certificate` object into named scalar fields.
/// Absent certificate fields are simply omitted.
pub fn flatten_certificate(base: &mut Record, cert: &Record) {
    for (source, target) in [
        ("issuer", "cert_issuer"),
        ("subject", "cert_subject"),
        ("expiryDate", "cert_expiry"),
    ] {
        if let Some(value) = cert.get(source) {
            base.insert(target.to_string(), value.clone());
        }
    }
}

/// Merges `incoming` top-level fields into `base` under the collision
/// rule: an absent key is added as-is; a present key is added under
/// `<prefix><key>` instead, leaving the base value untouched.
pub fn merge_fields(base: &mut Record, incoming: Record, prefix: &str) {
    for (key, value) in incoming {
        if base.contains_key(&key) {
            base.insert(format!("{}{}", prefix, key), value);
        } else {
            base.insert(key, value);
        }
    }
}

/// Applies a full identity lookup result to a base session record:
/// flattens `attributes` and `certificate`, then merges the remaining
/// top-level fields under the `client_` collision prefix.
pub fn merge_identity(base: &mut Record, mut identity: Record) {
    if let Some(Value::Object(attrs)) = identity.remove("attributes") {
        flatten_attributes(base, &attrs);
    }
    if let Some(Value::Object(cert)) = identity.remove("certificate") {
        flatten_certificate(base, &cert);
    }
    merge_fields(base, identity, COLLISION_PREFIX);
}
