use serde::{Deserialize, Serialize};

/// A concrete decoded value of a decision variable, as applied to the
/// simulation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    // Int before Float so untagged deserialization keeps whole numbers integral.
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Numeric view of the value; `None` for text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the value shape, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Float(_) => "float",
            Self::Int(_) => "integer",
            Self::Text(_) => "text",
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_views() {
        assert_eq!(ParamValue::Float(2.5).as_f64(), Some(2.5));
        assert_eq!(ParamValue::Int(4).as_f64(), Some(4.0));
        assert_eq!(ParamValue::Text("maize".into()).as_f64(), None);
        assert_eq!(ParamValue::Text("maize".into()).as_text(), Some("maize"));
    }

    #[test]
    fn display_formats_raw_value() {
        assert_eq!(ParamValue::Float(1.25).to_string(), "1.25");
        assert_eq!(ParamValue::Int(-3).to_string(), "-3");
        assert_eq!(ParamValue::from("early").to_string(), "early");
    }

    #[test]
    fn untagged_serde_round_trip() {
        let values = vec![
            ParamValue::Float(0.5),
            ParamValue::Int(12),
            ParamValue::Text("short-season".into()),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[0.5,12,"short-season"]"#);
        let back: Vec<ParamValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(values, back);
    }
}
