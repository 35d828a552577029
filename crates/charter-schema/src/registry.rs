//! # Validator Extension Registry
//!
//! Named, overridable table of extension validators and host-defined
//! coercions. A [`Registry`] is an explicit value: the compiler takes one by
//! reference, [`Registry::global`] returns the shared process-wide instance,
//! and tests build isolated instances with [`Registry::new`].
//!
//! ## Snapshot semantics
//!
//! Compilation resolves every declared name and binds its parameters,
//! producing a [`BoundCheck`] that the compiled model owns. Registering or
//! overriding a name afterwards changes only models compiled afterwards.
//! Both tables sit behind a `parking_lot::RwLock`, so registration is safe
//! while other threads compile.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde_json::Value;

use crate::constraint::Pattern;
use crate::value::{compare_numbers, values_equal};

/// A validator with its parameters bound: `(value) -> ok | message`.
pub type BoundCheck = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// A host-defined coercion. Unlike the built-ins it may fail.
pub type CustomCoercion = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

/// An extension validator.
pub trait Extension: Send + Sync {
    /// Validate `params` and bind them into a check.
    ///
    /// Called once per declaration at compile time. An `Err` becomes a
    /// compilation error naming the validator.
    fn bind(&self, params: &Value) -> Result<BoundCheck, String>;
}

/// Adapter for plain `(value, params)` functions.
struct FnExtension<F>(Arc<F>);

impl<F> Extension for FnExtension<F>
where
    F: Fn(&Value, &Value) -> Result<(), String> + Send + Sync + 'static,
{
    fn bind(&self, params: &Value) -> Result<BoundCheck, String> {
        let f = Arc::clone(&self.0);
        let params = params.clone();
        Ok(Arc::new(move |value| f(value, &params)))
    }
}

/// A built-in validator: a parameter binder.
struct Builtin(fn(&Value) -> Result<BoundCheck, String>);

impl Extension for Builtin {
    fn bind(&self, params: &Value) -> Result<BoundCheck, String> {
        (self.0)(params)
    }
}

/// Process-wide or isolated table of validators and custom coercions.
pub struct Registry {
    validators: RwLock<HashMap<String, Arc<dyn Extension>>>,
    coercions: RwLock<HashMap<String, CustomCoercion>>,
}

impl Registry {
    /// A registry holding the built-in validators.
    pub fn new() -> Self {
        let registry = Self {
            validators: RwLock::new(HashMap::new()),
            coercions: RwLock::new(HashMap::new()),
        };
        {
            let mut validators = registry.validators.write();
            for (name, binder) in BUILTINS {
                validators.insert((*name).to_string(), Arc::new(Builtin(*binder)));
            }
        }
        registry
    }

    /// The shared process-wide registry.
    pub fn global() -> Arc<Registry> {
        static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Registry::new())))
    }

    /// Register an extension validator under `name`, replacing any existing
    /// entry. Returns the replaced entry.
    pub fn register(
        &self,
        name: impl Into<String>,
        extension: impl Extension + 'static,
    ) -> Option<Arc<dyn Extension>> {
        let name = name.into();
        let previous = self.validators.write().insert(name.clone(), Arc::new(extension));
        if previous.is_some() {
            tracing::warn!(validator = %name, "overriding registered validator");
        } else {
            tracing::debug!(validator = %name, "registered validator");
        }
        previous
    }

    /// Register a `(value, params)` function as a validator.
    pub fn register_fn<F>(&self, name: impl Into<String>, check: F) -> Option<Arc<dyn Extension>>
    where
        F: Fn(&Value, &Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.register(name, FnExtension(Arc::new(check)))
    }

    /// Register a custom coercion under `name`, replacing any existing entry.
    ///
    /// Built-in coercion names resolve first and cannot be shadowed.
    pub fn register_coercion<F>(&self, name: impl Into<String>, coerce: F) -> Option<CustomCoercion>
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        let name = name.into();
        let previous = self.coercions.write().insert(name.clone(), Arc::new(coerce));
        if previous.is_some() {
            tracing::warn!(coercion = %name, "overriding registered coercion");
        }
        previous
    }

    /// Look up a validator.
    pub fn validator(&self, name: &str) -> Option<Arc<dyn Extension>> {
        self.validators.read().get(name).cloned()
    }

    /// Look up a custom coercion.
    pub fn coercion(&self, name: &str) -> Option<CustomCoercion> {
        self.coercions.read().get(name).cloned()
    }

    /// Registered validator names, sorted.
    pub fn validator_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.validators.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut coercions: Vec<String> = self.coercions.read().keys().cloned().collect();
        coercions.sort();
        f.debug_struct("Registry")
            .field("validators", &self.validator_names())
            .field("coercions", &coercions)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Built-in validators
// ---------------------------------------------------------------------------

type Binder = fn(&Value) -> Result<BoundCheck, String>;

const BUILTINS: &[(&str, Binder)] = &[
    ("non_empty_string", non_empty_string),
    ("is_positive", is_positive),
    ("only_allow", only_allow),
    ("greater_than_or_equal_to", greater_than_or_equal_to),
    ("less_than_or_equal_to", less_than_or_equal_to),
    ("max_length", max_length),
    ("min_length", min_length),
    ("matches_regex", matches_regex),
    ("no_capital_characters", no_capital_characters),
    ("no_special_characters", no_special_characters),
];

/// Pull a parameter out of `params`: either the value under one of `keys`,
/// or `params` itself when it is not an object.
fn param<'p>(params: &'p Value, keys: &[&str]) -> Option<&'p Value> {
    match params {
        Value::Object(map) => keys.iter().find_map(|k| map.get(*k)),
        Value::Null => None,
        other => Some(other),
    }
}

fn number_param(params: &Value, keys: &[&str]) -> Result<serde_json::Number, String> {
    match param(params, keys) {
        Some(Value::Number(n)) => Ok(n.clone()),
        Some(other) => Err(format!("expected a number, got {other}")),
        None => Err(format!("missing parameter ({})", keys.join(" | "))),
    }
}

fn count_param(params: &Value, keys: &[&str]) -> Result<usize, String> {
    match param(params, keys).and_then(Value::as_u64) {
        Some(n) => usize::try_from(n).map_err(|e| e.to_string()),
        None => Err(format!("missing non-negative integer parameter ({})", keys.join(" | "))),
    }
}

fn non_empty_string(_: &Value) -> Result<BoundCheck, String> {
    Ok(Arc::new(|value| match value {
        Value::String(s) if s.trim().is_empty() => Err("string must not be empty".into()),
        _ => Ok(()),
    }))
}

fn is_positive(_: &Value) -> Result<BoundCheck, String> {
    Ok(Arc::new(|value| match value {
        Value::Number(n) if n.as_f64().is_some_and(|f| f > 0.0) => Ok(()),
        Value::Number(n) => Err(format!("value must be positive, got {n}")),
        _ => Ok(()),
    }))
}

fn only_allow(params: &Value) -> Result<BoundCheck, String> {
    let allowed = match param(params, &["allowed_values", "values"]) {
        Some(Value::Array(values)) => values.clone(),
        _ => return Err("expected a list of allowed values".into()),
    };
    Ok(Arc::new(move |value| {
        if allowed.iter().any(|a| values_equal(a, value)) {
            Ok(())
        } else {
            Err(format!(
                "value {value} is not allowed; allowed values: {}",
                Value::Array(allowed.clone())
            ))
        }
    }))
}

fn greater_than_or_equal_to(params: &Value) -> Result<BoundCheck, String> {
    let threshold = number_param(params, &["threshold", "value", "n", "min"])?;
    Ok(Arc::new(move |value| match value {
        Value::Number(n) => match compare_numbers(n, &threshold) {
            Some(std::cmp::Ordering::Less) | None => {
                Err(format!("value must be greater than or equal to {threshold}, got {n}"))
            }
            _ => Ok(()),
        },
        _ => Ok(()),
    }))
}

fn less_than_or_equal_to(params: &Value) -> Result<BoundCheck, String> {
    let threshold = number_param(params, &["threshold", "value", "n", "max"])?;
    Ok(Arc::new(move |value| match value {
        Value::Number(n) => match compare_numbers(n, &threshold) {
            Some(std::cmp::Ordering::Greater) | None => {
                Err(format!("value must be less than or equal to {threshold}, got {n}"))
            }
            _ => Ok(()),
        },
        _ => Ok(()),
    }))
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

fn max_length(params: &Value) -> Result<BoundCheck, String> {
    let limit = count_param(params, &["max_length", "max", "n", "value"])?;
    Ok(Arc::new(move |value| match length_of(value) {
        Some(len) if len > limit => Err(format!("length must be at most {limit}, got {len}")),
        _ => Ok(()),
    }))
}

fn min_length(params: &Value) -> Result<BoundCheck, String> {
    let limit = count_param(params, &["min_length", "min", "n", "value"])?;
    Ok(Arc::new(move |value| match length_of(value) {
        Some(len) if len < limit => Err(format!("length must be at least {limit}, got {len}")),
        _ => Ok(()),
    }))
}

fn matches_regex(params: &Value) -> Result<BoundCheck, String> {
    let source = param(params, &["pattern", "regex"])
        .and_then(Value::as_str)
        .ok_or_else(|| "expected a pattern string".to_string())?;
    let pattern = Pattern::new(source).map_err(|e| e.to_string())?;
    Ok(Arc::new(move |value| match value {
        Value::String(s) if !pattern.is_match(s) => {
            Err(format!("string does not match pattern '{}'", pattern.as_str()))
        }
        _ => Ok(()),
    }))
}

fn no_capital_characters(_: &Value) -> Result<BoundCheck, String> {
    Ok(Arc::new(|value| match value {
        Value::String(s) if s.chars().any(char::is_uppercase) => {
            Err("string must not contain capital letters".into())
        }
        _ => Ok(()),
    }))
}

fn no_special_characters(_: &Value) -> Result<BoundCheck, String> {
    Ok(Arc::new(|value| match value {
        Value::String(s) if s.chars().any(|c| !(c.is_alphanumeric() || c.is_whitespace())) => {
            Err("string must contain only letters, digits, and spaces".into())
        }
        _ => Ok(()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bound(registry: &Registry, name: &str, params: Value) -> BoundCheck {
        registry.validator(name).unwrap().bind(&params).unwrap()
    }

    #[test]
    fn builtins_present() {
        let registry = Registry::new();
        for name in [
            "non_empty_string",
            "is_positive",
            "only_allow",
            "greater_than_or_equal_to",
            "max_length",
            "min_length",
            "less_than_or_equal_to",
            "matches_regex",
            "no_capital_characters",
            "no_special_characters",
        ] {
            assert!(registry.validator(name).is_some(), "{name}");
        }
    }

    #[test]
    fn non_empty_string_and_is_positive() {
        let r = Registry::new();
        let check = bound(&r, "non_empty_string", Value::Null);
        assert!(check(&json!("x")).is_ok());
        assert!(check(&json!("  ")).is_err());
        let check = bound(&r, "is_positive", Value::Null);
        assert!(check(&json!(0.5)).is_ok());
        assert!(check(&json!(0)).is_err());
    }

    #[test]
    fn parameters_accept_bare_or_keyed_forms() {
        let r = Registry::new();
        let keyed = bound(&r, "greater_than_or_equal_to", json!({"threshold": 18}));
        let bare = bound(&r, "greater_than_or_equal_to", json!(18));
        for check in [keyed, bare] {
            assert!(check(&json!(18)).is_ok());
            assert!(check(&json!(17.9)).is_err());
        }
        let check = bound(&r, "only_allow", json!({"allowed_values": ["a", "b"]}));
        assert!(check(&json!("a")).is_ok());
        assert!(check(&json!("c")).is_err());
        let check = bound(&r, "max_length", json!({"max_length": 3}));
        assert!(check(&json!("abc")).is_ok());
        assert!(check(&json!([1, 2, 3, 4])).is_err());
    }

    #[test]
    fn bad_parameters_rejected_at_bind() {
        let r = Registry::new();
        let ext = r.validator("greater_than_or_equal_to").unwrap();
        assert!(ext.bind(&Value::Null).is_err());
        assert!(ext.bind(&json!({"threshold": "x"})).is_err());
        let ext = r.validator("matches_regex").unwrap();
        assert!(ext.bind(&json!("(")).is_err());
    }

    #[test]
    fn character_class_checks() {
        let r = Registry::new();
        let caps = bound(&r, "no_capital_characters", Value::Null);
        assert!(caps(&json!("abc")).is_ok());
        assert!(caps(&json!("aBc")).is_err());
        let special = bound(&r, "no_special_characters", Value::Null);
        assert!(special(&json!("abc 123")).is_ok());
        assert!(special(&json!("abc!")).is_err());
    }

    #[test]
    fn registration_overrides_last_wins() {
        let r = Registry::new();
        assert!(r.register_fn("is_even", |v, _| match v.as_i64() {
            Some(n) if n % 2 != 0 => Err("odd".into()),
            _ => Ok(()),
        })
        .is_none());
        let check = bound(&r, "is_even", Value::Null);
        assert!(check(&json!(3)).is_err());

        let previous = r.register_fn("is_even", |_, _| Ok(()));
        assert!(previous.is_some());
        assert!(bound(&r, "is_even", Value::Null)(&json!(3)).is_ok());
        // The earlier binding is a snapshot.
        assert!(check(&json!(3)).is_err());
    }

    #[test]
    fn isolated_instances_do_not_share() {
        let a = Registry::new();
        let b = Registry::new();
        a.register_fn("only_in_a", |_, _| Ok(()));
        assert!(a.validator("only_in_a").is_some());
        assert!(b.validator("only_in_a").is_none());
    }

    #[test]
    fn custom_coercion_round_trip() {
        let r = Registry::new();
        r.register_coercion("cents", |v| match v.as_f64() {
            Some(f) => Ok(json!((f * 100.0).round() as i64)),
            None => Err(format!("cannot convert {v} to cents")),
        });
        let coerce = r.coercion("cents").unwrap();
        assert_eq!(coerce(json!(1.25)).unwrap(), json!(125));
        assert!(coerce(json!("x")).is_err());
    }
}
