use log::warn;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Requested state of a writable line. `Absent` leaves the line untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PinState {
    On,
    Off,
    #[default]
    Absent,
}

impl PinState {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) if s == "1" || s == "on" => PinState::On,
            Value::String(s) if s == "0" || s == "off" => PinState::Off,
            Value::Number(n) if n.as_f64() == Some(1.0) => PinState::On,
            Value::Number(n) if n.as_f64() == Some(0.0) => PinState::Off,
            _ => PinState::Absent,
        }
    }

    pub fn from_attribute(obj: &Map<String, Value>, name: &str) -> Self {
        obj.get(name).map(Self::from_value).unwrap_or_default()
    }

    pub fn level(&self) -> Option<u8> {
        match self {
            PinState::On => Some(1),
            PinState::Off => Some(0),
            PinState::Absent => None,
        }
    }
}

impl<'de> Deserialize<'de> for PinState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

/// Geofence transition reported by the location client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Geofence {
    Entered,
    Exited,
    #[default]
    Other,
}

impl<'de> Deserialize<'de> for Geofence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value.as_str() {
            Some("entered") => Geofence::Entered,
            Some("exited") => Geofence::Exited,
            _ => Geofence::Other,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LocationPayload {
    pub location: Geofence,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuxPinsPayload {
    pub porch_light: PinState,
    pub spare1: PinState,
    pub spare2: PinState,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BankPayload {
    pub one: PinState,
    pub two: PinState,
    pub three: PinState,
}

/// Parses a request body as a JSON object. Anything else is treated as an
/// empty object so that every field reads as absent.
pub fn parse_payload<T>(body: &[u8]) -> T
where
    T: for<'de> Deserialize<'de> + Default,
{
    if body.is_empty() {
        return T::default();
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(value @ Value::Object(_)) => serde_json::from_value(value).unwrap_or_else(|e| {
            warn!("ignoring unreadable payload: {e}");
            T::default()
        }),
        Ok(other) => {
            warn!("ignoring non-object payload: {other}");
            T::default()
        }
        Err(e) => {
            warn!("ignoring malformed payload: {e}");
            T::default()
        }
    }
}
