// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core data types shared across all NIMBUS components.
//!
//! The relay moves [`DataPoint`]s from the local historical store to the cloud
//! platform. A point carries a hierarchical [`PointName`], a typed
//! [`TagValue`], an optional engineering unit, and a UTC timestamp. Cloud
//! credentials are modeled by [`LinkCredentials`] with an explicit placeholder
//! state so an unprovisioned gateway is distinguishable from a configured one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Identifiers
// =============================================================================

/// Hierarchical name of a local tag (e.g. `"furnace2/temperature/inlet"`).
///
/// The raw string is kept verbatim; structural interpretation (child device,
/// fragment, series) is performed by the tag-name resolver.
///
/// # Examples
///
/// ```
/// use nimbus_core::types::PointName;
///
/// let name = PointName::new("boiler/pressure");
/// assert_eq!(name.as_str(), "boiler/pressure");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointName(String);

impl PointName {
    /// Creates a new point name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the name and returns the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PointName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PointName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for PointName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Values
// =============================================================================

/// Declared storage type of a local tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    /// Boolean tag.
    Bool,
    /// 64-bit signed integer tag.
    Int,
    /// 64-bit floating point tag.
    Float,
    /// UTF-8 string tag.
    Text,
}

impl TagKind {
    /// Returns the kind name used in logs and configuration.
    pub fn name(&self) -> &'static str {
        match self {
            TagKind::Bool => "bool",
            TagKind::Int => "int",
            TagKind::Float => "float",
            TagKind::Text => "text",
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A sampled tag value.
///
/// The set of variants is closed: the local store only produces these four
/// shapes and every downstream stage (aggregation, codec) matches on them
/// exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer value.
    Int(i64),
    /// 64-bit floating point value.
    Float(f64),
    /// UTF-8 string value.
    Text(String),
}

impl TagValue {
    /// Returns the value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TagValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as an integer, if it is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TagValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a float, widening integers and booleans.
    ///
    /// Booleans widen as `false -> 0.0`, `true -> 1.0`. Text never converts.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TagValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            TagValue::Int(i) => Some(*i as f64),
            TagValue::Float(f) => Some(*f),
            TagValue::Text(_) => None,
        }
    }

    /// Returns the value as a string slice, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns `true` for boolean and numeric values.
    ///
    /// Only these participate in aggregation; text values are relayed as
    /// individual events.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, TagValue::Text(_))
    }

    /// Returns the declared kind of this value.
    pub fn kind(&self) -> TagKind {
        match self {
            TagValue::Bool(_) => TagKind::Bool,
            TagValue::Int(_) => TagKind::Int,
            TagValue::Float(_) => TagKind::Float,
            TagValue::Text(_) => TagKind::Text,
        }
    }

    /// Returns the type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    /// Converts the value to its JSON representation.
    ///
    /// Booleans are encoded as numbers (`0` / `1`) because the platform's
    /// measurement schema only accepts numeric series values.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            TagValue::Bool(b) => serde_json::json!(if *b { 1 } else { 0 }),
            TagValue::Int(i) => serde_json::json!(i),
            TagValue::Float(f) => serde_json::json!(f),
            TagValue::Text(s) => serde_json::json!(s),
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Bool(b) => write!(f, "{}", b),
            TagValue::Int(i) => write!(f, "{}", i),
            TagValue::Float(v) => write!(f, "{}", v),
            TagValue::Text(s) => write!(f, "{}", s),
        }
    }
}

macro_rules! impl_from_for_tag_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for TagValue {
                fn from(v: $ty) -> Self {
                    TagValue::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_for_tag_value! {
    bool => Bool,
    i32 => Int,
    i64 => Int,
    f64 => Float,
    String => Text,
    &str => Text,
}

// =============================================================================
// Data Points
// =============================================================================

/// A single sample pulled from the local historical store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Hierarchical tag name.
    pub name: PointName,
    /// Sampled value.
    pub value: TagValue,
    /// Engineering unit, when the store recorded one.
    pub unit: Option<String>,
    /// Sample timestamp (UTC).
    pub timestamp: DateTime<Utc>,
}

impl DataPoint {
    /// Creates a data point stamped with the current time.
    pub fn new(name: impl Into<PointName>, value: impl Into<TagValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            unit: None,
            timestamp: Utc::now(),
        }
    }

    /// Sets an explicit timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the engineering unit.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// Placeholder written into credential fields before provisioning has run.
pub const CREDENTIAL_PLACEHOLDER: &str = "<not-set>";

/// Credentials for one cloud channel.
///
/// The same shape is used for the operator-supplied bootstrap credentials and
/// for the device credentials issued by the platform. Device credentials start
/// life as placeholders and are overwritten exactly once by a successful
/// provisioning exchange.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkCredentials {
    /// Tenant identifier.
    pub tenant: String,
    /// Account user name.
    pub username: String,
    /// Account password.
    pub password: String,
}

impl LinkCredentials {
    /// Creates a credential set.
    pub fn new(
        tenant: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Creates the placeholder set an unprovisioned gateway starts with.
    pub fn placeholder() -> Self {
        Self {
            tenant: CREDENTIAL_PLACEHOLDER.to_string(),
            username: CREDENTIAL_PLACEHOLDER.to_string(),
            password: CREDENTIAL_PLACEHOLDER.to_string(),
        }
    }

    /// Returns `true` while any field still holds the placeholder value.
    pub fn is_placeholder(&self) -> bool {
        self.tenant == CREDENTIAL_PLACEHOLDER
            || self.username == CREDENTIAL_PLACEHOLDER
            || self.password == CREDENTIAL_PLACEHOLDER
    }

    /// Login in the `tenant/username` form expected by the platform.
    pub fn login(&self) -> String {
        format!("{}/{}", self.tenant, self.username)
    }
}

impl fmt::Debug for LinkCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkCredentials")
            .field("tenant", &self.tenant)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

// =============================================================================
// Inventory
// =============================================================================

/// Hardware identity announced to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareInfo {
    /// Serial number.
    pub serial: String,
    /// Hardware model.
    pub model: String,
    /// Hardware revision.
    pub revision: String,
}

/// Installed firmware announced to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareInfo {
    /// Firmware name.
    pub name: String,
    /// Firmware version.
    pub version: String,
    /// Source URL the image was installed from.
    #[serde(default)]
    pub url: String,
}

/// One installed software package announced to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftwareItem {
    /// Package name.
    pub name: String,
    /// Package version.
    pub version: String,
    /// Source URL.
    #[serde(default)]
    pub url: String,
}

// =============================================================================
// Tests
// =============================================================================
