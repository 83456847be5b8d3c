//! User-defined aliases: templates evaluated in place of an unknown
//! command name, with `$1..$N` positional substitution and
//! `$N[default]` fallbacks.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::error::EvalError;

/// Where alias templates live. The VM only ever reads; definition and
/// removal happen through the concrete store an embedder keeps.
pub trait AliasStore: Send + Sync {
    fn lookup(&self, name: &str) -> Option<String>;
}

/// Shared in-memory store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryAliases {
    inner: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryAliases {
    pub fn new() -> Self {
        MemoryAliases::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn set(&self, name: &str, template: &str) {
        self.lock().insert(name.to_string(), template.to_string());
    }

    pub fn remove(&self, name: &str) -> bool {
        self.lock().remove(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}

impl AliasStore for MemoryAliases {
    fn lookup(&self, name: &str) -> Option<String> {
        self.lock().get(name).cloned()
    }
}

/// Substitute `$1..$N` (and `$N[default]`) in an alias template with the
/// call's positional values. Unsupplied positions fall back to their
/// default, or to an empty string. `$0` is reserved.
pub fn expand_alias(template: &str, values: &[String]) -> Result<String, EvalError> {
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::with_capacity(template.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '$' || !matches!(chars.get(i + 1), Some(c) if c.is_ascii_digit()) {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        i += 1;
        let digits_start = i;
        while matches!(chars.get(i), Some(c) if c.is_ascii_digit()) {
            i += 1;
        }
        let position: usize = chars[digits_start..i]
            .iter()
            .collect::<String>()
            .parse()
            .map_err(|_| EvalError::InvalidName {
                name: template.to_string(),
                message: "unreadable positional reference".to_string(),
            })?;
        if position == 0 {
            return Err(EvalError::InvalidName {
                name: "$0".to_string(),
                message: "positional references start at $1".to_string(),
            });
        }
        let mut default = None;
        if chars.get(i) == Some(&'[') {
            let close = chars[i..].iter().position(|&c| c == ']');
            if let Some(rel) = close {
                default = Some(chars[i + 1..i + rel].iter().collect::<String>());
                i += rel + 1;
            }
        }
        match values.get(position - 1) {
            Some(value) => out.push_str(value),
            None => out.push_str(default.as_deref().unwrap_or("")),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_positionals() {
        let out = expand_alias("search -m $1 --limit $2", &["res.partner".into(), "5".into()])
            .unwrap();
        assert_eq!(out, "search -m res.partner --limit 5");
    }

    #[test]
    fn default_applies_when_unsupplied() {
        let out = expand_alias("gen -mi $1[1] -ma $2[10]", &["5".into()]).unwrap();
        assert_eq!(out, "gen -mi 5 -ma 10");
    }

    #[test]
    fn missing_value_without_default_is_empty() {
        assert_eq!(expand_alias("print $1", &[]).unwrap(), "print ");
    }

    #[test]
    fn zero_is_rejected() {
        assert!(matches!(
            expand_alias("print $0", &[]),
            Err(EvalError::InvalidName { .. })
        ));
    }

    #[test]
    fn dollar_without_digit_passes_through() {
        assert_eq!(expand_alias("print $var", &[]).unwrap(), "print $var");
    }

    #[test]
    fn store_clones_share_templates() {
        let store = MemoryAliases::new();
        let view = store.clone();
        store.set("sp", "search -m res.partner");
        assert_eq!(view.lookup("sp").as_deref(), Some("search -m res.partner"));
        assert!(view.remove("sp"));
        assert!(store.lookup("sp").is_none());
    }
}
