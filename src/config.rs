//! Registry configuration
//!
//! Which wire format an unannotated number is written in is a matter of
//! project policy, so it lives here rather than in the codecs. The built-in
//! default writes integers as zig-zag VLQ (`w64`) and floats as `f64`;
//! building with the feature `compact_numeric_defaults` switches to `v64`
//! and `f32`.
//!
//! A [`CodecConfig`] is fixed for the lifetime of the
//! [`FormatRegistry`](crate::registry::FormatRegistry) built from it, since
//! the codecs it caches bake the defaults in.

use serde::{Deserialize, Serialize};

use crate::error::{UsageError, UsageResult};
use crate::format::Format;

/// Wire formats used for numbers without an explicit format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumericDefaults {
    pub int: Format,
    /// Also used for both halves of a complex number
    pub float: Format,
}

impl Default for NumericDefaults {
    fn default() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(feature = "compact_numeric_defaults")] {
                Self { int: Format::V64, float: Format::F32 }
            } else {
                Self { int: Format::W64, float: Format::F64 }
            }
        }
    }
}

impl NumericDefaults {
    /// Checks that `int` is an integer format and `float` a float format.
    ///
    /// `vn` and `wn` are refused as the integer default: they decode every
    /// value as a big integer, so plain ints would not come back unchanged.
    pub fn validate(&self) -> UsageResult<()> {
        if !self.int.is_integer() || matches!(self.int, Format::Vn | Format::Wn) {
            return Err(UsageError::IncompatibleFormatOverride {
                format: self.int,
                shape: "int".into(),
            });
        }
        if !self.float.is_float() {
            return Err(UsageError::IncompatibleFormatOverride {
                format: self.float,
                shape: "float".into(),
            });
        }
        Ok(())
    }
}

/// Settings for a [`FormatRegistry`](crate::registry::FormatRegistry)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub numeric: NumericDefaults,
    /// Whether a named type with no registered codec may be written as an
    /// opaque binary blob instead of failing resolution.
    ///
    /// Decoding such blobs from untrusted input is not safe; leave this off
    /// unless every input is trusted.
    pub allow_opaque_fallback: bool,
}

impl CodecConfig {
    #[must_use]
    pub fn with_numeric(mut self, int: Format, float: Format) -> Self {
        self.numeric = NumericDefaults { int, float };
        self
    }

    #[must_use]
    pub fn with_opaque_fallback(mut self, allow: bool) -> Self {
        self.allow_opaque_fallback = allow;
        self
    }

    pub fn validate(&self) -> UsageResult<()> {
        self.numeric.validate()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    #[cfg(not(feature = "compact_numeric_defaults"))]
    fn builtin_defaults() {
        let cfg = CodecConfig::default();
        assert_eq!(cfg.numeric.int, Format::W64);
        assert_eq!(cfg.numeric.float, Format::F64);
        assert!(!cfg.allow_opaque_fallback);
    }

    #[test]
    fn rejects_mismatched_defaults() {
        let cfg = CodecConfig::default().with_numeric(Format::F32, Format::F64);
        assert!(matches!(
            cfg.validate(),
            Err(UsageError::IncompatibleFormatOverride { format: Format::F32, .. })
        ));
        let cfg = CodecConfig::default().with_numeric(Format::U8, Format::Utf8);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_unbounded_int_default() {
        for f in [Format::Vn, Format::Wn] {
            let cfg = CodecConfig::default().with_numeric(f, Format::F64);
            assert!(matches!(
                cfg.validate(),
                Err(UsageError::IncompatibleFormatOverride { format, .. }) if format == f
            ));
        }
        let cfg = CodecConfig::default().with_numeric(Format::I64, Format::F64);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserializes_partial() {
        let cfg: CodecConfig =
            serde_json::from_str(r#"{"numeric": {"int": "v32"}, "allow_opaque_fallback": true}"#)
                .unwrap();
        assert_eq!(cfg.numeric.int, Format::V32);
        assert_eq!(cfg.numeric.float, NumericDefaults::default().float);
        assert!(cfg.allow_opaque_fallback);
    }
}
