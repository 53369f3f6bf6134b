//! Typed per-entity parameter storage.
//!
//! Parameters are grouped under a [`Keyword`] (one set per physical model,
//! e.g. `flow` or `transport`) and then by parameter name. Discretization
//! capabilities declare the keyword they read so the dispatcher can reject a
//! missing set before any numerical work starts.

use std::collections::BTreeMap;

use crate::registry::names::validated_name;

validated_name!(
    /// Validated key of a parameter set.
    Keyword,
    "parameter keyword"
);

/// A single parameter value.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ParamValue {
    /// Uniform value.
    Scalar(f64),
    /// One value per geometric primitive (cells, faces, ...).
    Array(Vec<f64>),
}

/// Keyword-grouped parameter sets of a single entity.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Parameters {
    sets: BTreeMap<Keyword, BTreeMap<String, ParamValue>>,
}

impl Parameters {
    /// Creates an empty parameter store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `value` to `name` under `keyword`.
    ///
    /// Returns the previous value, if any.
    pub fn set(
        &mut self,
        keyword: &Keyword,
        name: impl Into<String>,
        value: ParamValue,
    ) -> Option<ParamValue> {
        self.sets
            .entry(keyword.clone())
            .or_default()
            .insert(name.into(), value)
    }

    /// Returns the value stored for `name` under `keyword`.
    pub fn get(&self, keyword: &Keyword, name: &str) -> Option<&ParamValue> {
        self.sets.get(keyword).and_then(|set| set.get(name))
    }

    /// Returns a scalar value, or `None` if absent or not a scalar.
    pub fn scalar(&self, keyword: &Keyword, name: &str) -> Option<f64> {
        match self.get(keyword, name)? {
            ParamValue::Scalar(v) => Some(*v),
            ParamValue::Array(_) => None,
        }
    }

    /// Returns an array value, or `None` if absent or not an array.
    pub fn array(&self, keyword: &Keyword, name: &str) -> Option<&[f64]> {
        match self.get(keyword, name)? {
            ParamValue::Array(v) => Some(v),
            ParamValue::Scalar(_) => None,
        }
    }

    /// Whether any parameter was stored under `keyword`.
    pub fn has_keyword(&self, keyword: &Keyword) -> bool {
        self.sets.contains_key(keyword)
    }

    /// Declares an (initially empty) parameter set under `keyword`.
    pub fn declare(&mut self, keyword: &Keyword) {
        self.sets.entry(keyword.clone()).or_default();
    }

    /// Iterates over keywords in sorted order.
    pub fn keywords(&self) -> impl Iterator<Item = &Keyword> {
        self.sets.keys()
    }
}
