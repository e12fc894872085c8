use crate::domain::error::{MultiComError, MultiComResult};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Decoded configuration: device name to device option mapping, in document order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiComConfig {
    devices: Map<String, Value>,
}

impl MultiComConfig {
    /// Build from a decoded document root.
    ///
    /// The root is either the device mapping itself, or a mapping holding
    /// the device mapping under a `devices` key.
    pub fn from_value(root: Value) -> Result<Self, String> {
        let mut root = match root {
            Value::Object(map) => map,
            Value::Null => return Ok(Self::default()),
            other => return Err(format!("expected a mapping of devices, got {}", type_name(&other))),
        };

        if matches!(root.get("devices"), Some(Value::Object(_))) {
            if let Some(Value::Object(devices)) = root.remove("devices") {
                return Ok(Self { devices });
            }
        }

        Ok(Self { devices: root })
    }

    /// Merge another config into this one; entries of the same name are replaced in place.
    pub fn merge(&mut self, other: MultiComConfig) {
        for (name, options) in other.devices {
            self.devices.insert(name, options);
        }
    }

    pub fn devices(&self) -> impl Iterator<Item = DeviceConfig> + '_ {
        self.devices
            .iter()
            .map(|(name, options)| DeviceConfig::from_value(name, options))
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Option mapping of a single named device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    name: String,
    options: Map<String, Value>,
    shape_error: Option<String>,
}

impl DeviceConfig {
    pub fn new(name: impl Into<String>, options: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            options,
            shape_error: None,
        }
    }

    /// Wrap a raw decoded value; a non-mapping value is kept as a shape error
    /// that surfaces once a device type inspects it.
    pub fn from_value(name: &str, value: &Value) -> Self {
        match value {
            Value::Object(options) => Self::new(name, options.clone()),
            Value::Null => Self::new(name, Map::new()),
            other => Self {
                name: name.to_string(),
                options: Map::new(),
                shape_error: Some(format!(
                    "device options must be a mapping, got {}",
                    type_name(other)
                )),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fails when the device entry was not a mapping at all
    pub fn check_shape(&self) -> MultiComResult<()> {
        match &self.shape_error {
            Some(message) => Err(MultiComError::config(&self.name, message.clone())),
            None => Ok(()),
        }
    }

    /// Whether the key is present, even with a null value
    pub fn has(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    pub fn require(&self, key: &str) -> MultiComResult<&Value> {
        self.options
            .get(key)
            .ok_or_else(|| MultiComError::config(&self.name, format!("Missing config key: {}", key)))
    }

    pub fn require_str(&self, key: &str) -> MultiComResult<&str> {
        let value = self.require(key)?;
        value.as_str().ok_or_else(|| self.invalid(key, "a string", value))
    }

    pub fn require_u32(&self, key: &str) -> MultiComResult<u32> {
        let value = self.require(key)?;
        value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0)
            .ok_or_else(|| self.invalid(key, "a positive integer", value))
    }

    pub fn require_f64(&self, key: &str) -> MultiComResult<f64> {
        let value = self.require(key)?;
        value.as_f64().ok_or_else(|| self.invalid(key, "a number", value))
    }

    /// A single string or a sequence of strings, normalized to a list
    pub fn require_str_list(&self, key: &str) -> MultiComResult<Vec<String>> {
        let value = self.require(key)?;
        match value {
            Value::String(s) => Ok(vec![s.clone()]),
            Value::Array(items) if !items.is_empty() => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| self.invalid(key, "a string or a list of strings", value))
                })
                .collect(),
            _ => Err(self.invalid(key, "a string or a list of strings", value)),
        }
    }

    /// Optional string-to-string mapping, in document order; absent or null yields an empty list
    pub fn optional_str_map(&self, key: &str) -> MultiComResult<Vec<(String, String)>> {
        match self.options.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => Ok((k.clone(), s.clone())),
                    other => Err(MultiComError::config(
                        &self.name,
                        format!(
                            "Invalid value for {} entry '{}': expected a string, got {}",
                            key,
                            k,
                            type_name(other)
                        ),
                    )),
                })
                .collect(),
            Some(other) => Err(self.invalid(key, "a mapping", other)),
        }
    }

    pub fn invalid(&self, key: &str, expected: &str, got: &Value) -> MultiComError {
        MultiComError::config(
            &self.name,
            format!("Invalid value for {}: {}, expected {}", key, got, expected),
        )
    }
}

/// Serial parity setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

impl Parity {
    pub const ALL: [Parity; 3] = [Parity::None, Parity::Even, Parity::Odd];

    pub fn as_str(&self) -> &'static str {
        match self {
            Parity::None => "none",
            Parity::Even => "even",
            Parity::Odd => "odd",
        }
    }
}

impl FromStr for Parity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|parity| parity.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<_> = Self::ALL.iter().map(Parity::as_str).collect();
                format!("Invalid parity value: {}, expected one of: {}", s, valid.join(", "))
            })
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn device(value: Value) -> DeviceConfig {
        DeviceConfig::from_value("devA", &value)
    }

    #[test]
    fn test_parity_parsing() {
        assert_eq!("none".parse::<Parity>().unwrap(), Parity::None);
        assert_eq!("even".parse::<Parity>().unwrap(), Parity::Even);
        assert_eq!("odd".parse::<Parity>().unwrap(), Parity::Odd);

        let err = "mark".parse::<Parity>().unwrap_err();
        assert_eq!(err, "Invalid parity value: mark, expected one of: none, even, odd");
    }

    #[test]
    fn test_legacy_devices_root() {
        let config = MultiComConfig::from_value(json!({
            "devices": { "devA": { "tty_path": "/dev/ttyS0" } }
        }))
        .unwrap();
        let names: Vec<_> = config.devices().map(|d| d.name().to_string()).collect();
        assert_eq!(names, vec!["devA"]);
    }

    #[test]
    fn test_non_mapping_root_rejected() {
        assert!(MultiComConfig::from_value(json!(["devA"])).is_err());
        assert!(MultiComConfig::from_value(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_merge_replaces_in_place() {
        let mut config = MultiComConfig::from_value(json!({
            "a": { "baud": 1 },
            "b": { "baud": 2 }
        }))
        .unwrap();
        config.merge(
            MultiComConfig::from_value(json!({ "c": { "baud": 3 }, "a": { "baud": 4 } })).unwrap(),
        );

        let devices: Vec<_> = config.devices().collect();
        let names: Vec<_> = devices.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(devices[0].require_u32("baud").unwrap(), 4);
    }

    #[test]
    fn test_missing_key_names_key() {
        let err = device(json!({ "tty_path": "/dev/ttyS0" }))
            .require_u32("baud")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed parsing config for 'devA': Missing config key: baud"
        );
    }

    #[test]
    fn test_invalid_values() {
        let config = device(json!({ "baud": "fast", "timeout_s": "soon", "tty_path": 5 }));
        assert!(config.require_u32("baud").unwrap_err().to_string().contains("baud"));
        assert!(config.require_f64("timeout_s").is_err());
        assert!(config.require_str_list("tty_path").is_err());
        assert!(device(json!({ "baud": 0 })).require_u32("baud").is_err());
    }

    #[test]
    fn test_str_list_normalization() {
        let single = device(json!({ "tty_path": "/dev/ttyUSB*" }));
        assert_eq!(single.require_str_list("tty_path").unwrap(), vec!["/dev/ttyUSB*"]);

        let many = device(json!({ "tty_path": ["/dev/ttyNONE*", "/dev/ttyUSB0"] }));
        assert_eq!(
            many.require_str_list("tty_path").unwrap(),
            vec!["/dev/ttyNONE*", "/dev/ttyUSB0"]
        );
    }

    #[test]
    fn test_str_map_keeps_order() {
        let config = device(json!({ "highlight": { "z": "1", "a": "2", "m": "3" } }));
        let keys: Vec<_> = config
            .optional_str_map("highlight")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["z", "a", "m"]);

        assert!(device(json!({})).optional_str_map("highlight").unwrap().is_empty());
        assert!(device(json!({ "highlight": null })).optional_str_map("highlight").unwrap().is_empty());
        assert!(device(json!({ "highlight": ["x"] })).optional_str_map("highlight").is_err());
    }

    #[test]
    fn test_shape_error() {
        let config = DeviceConfig::from_value("devA", &json!("ttyS0"));
        assert!(config.check_shape().is_err());
        assert!(!config.has("tty_path"));
    }
}
