// ── Status record model ──
//
// Typed view of one backend status line. Every field has a documented
// default so a partial or older backend message still decodes.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use strum::{EnumIter, EnumString, IntoEnumIterator};

use crate::error::DecodeError;

// ── Mode ─────────────────────────────────────────────────────────────

/// Shelter operating mode, as sent to the backend.
///
/// Parses from the single-character wire code or the long name
/// (`"r"` and `"radiation"` are equivalent). `Display` renders the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum Mode {
    #[strum(serialize = "n", serialize = "normal")]
    Normal,
    #[strum(serialize = "r", serialize = "radiation")]
    Radiation,
    #[strum(serialize = "g", serialize = "gas")]
    Gas,
    #[strum(serialize = "o", serialize = "oxygen", serialize = "oxygen-low")]
    OxygenLow,
}

impl Mode {
    /// The single-character wire code.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Normal => "n",
            Self::Radiation => "r",
            Self::Gas => "g",
            Self::OxygenLow => "o",
        }
    }

    /// Human-readable name.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Radiation => "radiation",
            Self::Gas => "toxic gas",
            Self::OxygenLow => "oxygen low",
        }
    }

    /// Exact match on a wire code. Long names are not accepted here.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::iter().find(|mode| mode.code() == code)
    }

    /// Bytes written to the transport for this command: the code plus `\n`.
    pub(crate) fn wire_line(self) -> Vec<u8> {
        format!("{}\n", self.code()).into_bytes()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ── ModeCode ─────────────────────────────────────────────────────────

/// Mode reported by the backend.
///
/// The backend is the source of truth for valid modes, so codes this
/// client does not know are kept verbatim instead of failing the decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModeCode {
    Known(Mode),
    Unrecognized(String),
}

impl ModeCode {
    pub fn known(&self) -> Option<Mode> {
        match self {
            Self::Known(mode) => Some(*mode),
            Self::Unrecognized(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(mode) => mode.code(),
            Self::Unrecognized(raw) => raw,
        }
    }
}

impl From<String> for ModeCode {
    fn from(raw: String) -> Self {
        Mode::from_code(&raw).map_or(Self::Unrecognized(raw), Self::Known)
    }
}

impl From<ModeCode> for String {
    fn from(code: ModeCode) -> Self {
        match code {
            ModeCode::Known(mode) => mode.code().to_owned(),
            ModeCode::Unrecognized(raw) => raw,
        }
    }
}

impl fmt::Display for ModeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── SensorReadings ───────────────────────────────────────────────────

/// The four environmental readings. Missing or `null` values read as `0.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorReadings {
    #[serde(deserialize_with = "null_as_default")]
    pub radiation: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub toxic_gas: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub co2: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub oxygen: f64,
}

// ── StatusRecord ─────────────────────────────────────────────────────

/// One decoded backend status message.
///
/// Immutable once built: fields are only reachable through accessors, and
/// the session hands records out as `Arc<StatusRecord>` snapshots.
///
/// Wire shape (keys dictated by the backend):
///
/// ```json
/// {"mode":"r","sensor":{"radiation":5.0,"toxic_gas":0,"co2":400,"oxygen":21},
///  "alert_message":"HIGH RAD","action_plan":"SHIELD","prediction_water":12.3}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    #[serde(default)]
    mode: Option<ModeCode>,

    #[serde(rename = "sensor", default, deserialize_with = "null_as_default")]
    sensors: SensorReadings,

    #[serde(default, deserialize_with = "null_as_default")]
    alert_message: String,

    #[serde(default, deserialize_with = "null_as_default")]
    action_plan: String,

    /// `None` until the backend has produced a prediction.
    #[serde(rename = "prediction_water", default)]
    predicted_water_usage: Option<f64>,
}

impl StatusRecord {
    /// Decode one complete line (without its terminator).
    pub fn from_line(line: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(line)?)
    }

    pub fn mode(&self) -> Option<&ModeCode> {
        self.mode.as_ref()
    }

    pub fn sensors(&self) -> &SensorReadings {
        &self.sensors
    }

    pub fn alert_message(&self) -> &str {
        &self.alert_message
    }

    pub fn action_plan(&self) -> &str {
        &self.action_plan
    }

    pub fn predicted_water_usage(&self) -> Option<f64> {
        self.predicted_water_usage
    }
}

/// Treat an explicit JSON `null` the same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;

    use super::*;

    const EXAMPLE: &str = r#"{"mode":"r","sensor":{"radiation":5.0,"toxic_gas":0,"co2":400,"oxygen":21},"alert_message":"HIGH RAD","action_plan":"SHIELD","prediction_water":12.3}"#;

    #[test]
    fn decodes_full_status_line() {
        let record = StatusRecord::from_line(EXAMPLE).unwrap();

        assert_eq!(record.mode(), Some(&ModeCode::Known(Mode::Radiation)));
        assert_eq!(record.sensors().radiation, 5.0);
        assert_eq!(record.sensors().toxic_gas, 0.0);
        assert_eq!(record.sensors().co2, 400.0);
        assert_eq!(record.sensors().oxygen, 21.0);
        assert_eq!(record.alert_message(), "HIGH RAD");
        assert_eq!(record.action_plan(), "SHIELD");
        assert_eq!(record.predicted_water_usage(), Some(12.3));
    }

    #[test]
    fn decoding_same_line_twice_is_equal() {
        let a = StatusRecord::from_line(EXAMPLE).unwrap();
        let b = StatusRecord::from_line(EXAMPLE).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        // The backend's idle report carries no mode key at all.
        let record = StatusRecord::from_line(
            r#"{"sensor":{"radiation":10},"alert_message":"SYSTEM NORMAL"}"#,
        )
        .unwrap();

        assert_eq!(record.mode(), None);
        assert_eq!(record.sensors().radiation, 10.0);
        assert_eq!(record.sensors().oxygen, 0.0);
        assert_eq!(record.alert_message(), "SYSTEM NORMAL");
        assert_eq!(record.action_plan(), "");
        assert_eq!(record.predicted_water_usage(), None);
    }

    #[test]
    fn nulls_read_as_defaults() {
        let record = StatusRecord::from_line(
            r#"{"mode":null,"sensor":null,"alert_message":null,"action_plan":null,"prediction_water":null}"#,
        )
        .unwrap();
        assert_eq!(record, StatusRecord::default());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let record =
            StatusRecord::from_line(r#"{"mode":"g","firmware":"2.1","sensor":{"co2":900,"humidity":40}}"#)
                .unwrap();
        assert_eq!(record.mode().and_then(ModeCode::known), Some(Mode::Gas));
        assert_eq!(record.sensors().co2, 900.0);
    }

    #[test]
    fn unknown_mode_code_is_preserved() {
        let record = StatusRecord::from_line(r#"{"mode":"x"}"#).unwrap();
        assert_eq!(record.mode(), Some(&ModeCode::Unrecognized("x".into())));
        assert_eq!(record.mode().unwrap().as_str(), "x");
        assert_eq!(record.mode().unwrap().known(), None);
    }

    #[test]
    fn wrong_field_type_is_rejected() {
        let err = StatusRecord::from_line(r#"{"sensor":{"radiation":"high"}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)), "got: {err:?}");
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(StatusRecord::from_line("42").is_err());
        assert!(StatusRecord::from_line("[1,2]").is_err());
    }

    #[test]
    fn mode_parses_codes_and_names() {
        assert_eq!(Mode::from_str("r").unwrap(), Mode::Radiation);
        assert_eq!(Mode::from_str("Radiation").unwrap(), Mode::Radiation);
        assert_eq!(Mode::from_str("oxygen").unwrap(), Mode::OxygenLow);
        assert_eq!(Mode::from_str("oxygen-low").unwrap(), Mode::OxygenLow);
        assert!(Mode::from_str("x").is_err());
    }

    #[test]
    fn mode_display_and_wire_line_match_code() {
        for mode in Mode::iter() {
            assert_eq!(mode.to_string(), mode.code());
            assert_eq!(Mode::from_code(mode.code()), Some(mode));

            assert_eq!(mode.wire_line(), [mode.code().as_bytes(), b"\n"].concat());
        }
        assert_eq!(Mode::from_code("radiation"), None);
        assert_eq!(Mode::from_code("R"), None);
    }

    #[test]
    fn mode_code_serializes_back_to_raw_string() {
        let json = serde_json::to_string(&ModeCode::Unrecognized("zz".into())).unwrap();
        assert_eq!(json, r#""zz""#);
        let json = serde_json::to_string(&ModeCode::Known(Mode::Gas)).unwrap();
        assert_eq!(json, r#""g""#);
    }
}
