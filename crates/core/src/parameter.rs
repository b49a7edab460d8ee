use crate::{Error, LogicalType, ParamDirection, Result, Value};

const DEFAULT_OUTPUT_DIMENSION: usize = 255;
const SHORT_INT_DIMENSION: usize = 2;
const LONG_INT_DIMENSION: usize = 8;
const DATE_DIMENSION: usize = 19;
const TIMESTAMP_DIMENSION: usize = 26;

/// A typed, directional bind value.
///
/// `dimension` is the byte capacity of the native buffer for scalar types and
/// the element count for arrays. Parameters are owned by the caller; the
/// database only borrows them for the duration of one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    direction: ParamDirection,
    dimension: usize,
    value: Value,
    type_name: Option<String>,
}

impl Parameter {
    /// An input parameter sized to its value.
    pub fn input(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            direction: ParamDirection::In,
            dimension: default_dimension(&value),
            value,
            type_name: None,
        }
    }

    pub fn output(name: impl Into<String>, logical_type: LogicalType, dimension: usize) -> Self {
        Self {
            name: name.into(),
            direction: ParamDirection::Out,
            dimension,
            value: Value::null(logical_type),
            type_name: None,
        }
    }

    pub fn in_out(name: impl Into<String>, value: impl Into<Value>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            direction: ParamDirection::InOut,
            dimension,
            value: value.into(),
            type_name: None,
        }
    }

    pub fn array(name: impl Into<String>, elements: Vec<String>) -> Self {
        Self::input(name, Value::Array(elements))
    }

    #[must_use]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    #[must_use]
    pub fn with_direction(mut self, direction: ParamDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Names the server-side collection type an array is constructed as.
    #[must_use]
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn direction(&self) -> ParamDirection {
        self.direction
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn logical_type(&self) -> LogicalType {
        self.value.logical_type()
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// The value as it is handed to the native buffer: character data longer
    /// than the declared dimension is clipped.
    #[must_use]
    pub fn bind_value(&self) -> Value {
        self.value.truncated(self.dimension)
    }

    /// Replaces the value, keeping the logical type fixed.
    pub fn set_value(&mut self, value: Value) -> Result<()> {
        if value.logical_type() != self.logical_type() {
            return Err(Error::invalid_state(format!(
                "parameter `{}` is {} and cannot hold a {} value",
                self.name,
                self.logical_type(),
                value.logical_type()
            )));
        }
        self.value = value;
        Ok(())
    }

    /// Elements of an array parameter.
    #[must_use]
    pub fn elements(&self) -> &[String] {
        match &self.value {
            Value::Array(elements) => elements,
            _ => &[],
        }
    }
}

fn default_dimension(value: &Value) -> usize {
    match value {
        Value::ShortInt(_) => SHORT_INT_DIMENSION,
        Value::LongInt(_) => LONG_INT_DIMENSION,
        Value::Date(_) => DATE_DIMENSION,
        Value::Timestamp(_) => TIMESTAMP_DIMENSION,
        Value::Array(elements) => elements.len(),
        Value::Binary(bytes) => bytes.as_ref().map_or(0, Vec::len),
        Value::Cursor => 0,
        other => other
            .as_text()
            .map_or(DEFAULT_OUTPUT_DIMENSION, |text| text.len().max(1)),
    }
}

#[cfg(test)]
mod tests {
    use super::Parameter;
    use crate::{LogicalType, ParamDirection, Value};

    #[test]
    fn input_parameters_are_sized_to_their_value() {
        let session = Parameter::input("sessionId", "abc");
        assert_eq!(session.dimension(), 3);
        assert_eq!(session.direction(), ParamDirection::In);

        let service = Parameter::input("serviceId", 7_i64);
        assert_eq!(service.logical_type(), LogicalType::LongInt);

        let list = Parameter::array("ids", vec!["1".to_string(), "2".to_string()]);
        assert_eq!(list.dimension(), 2);
        assert_eq!(list.elements().len(), 2);
    }

    #[test]
    fn bind_value_clips_to_dimension() {
        let parameter = Parameter::input("name", "overflowing").with_dimension(4);
        assert_eq!(parameter.bind_value(), Value::from("over"));
        assert_eq!(parameter.value(), &Value::from("overflowing"));
    }

    #[test]
    fn set_value_rejects_type_changes() {
        let mut parameter = Parameter::output("count", LogicalType::LongInt, 8);
        assert!(parameter.is_null());
        parameter
            .set_value(Value::LongInt(Some(3)))
            .expect("same logical type is accepted");
        assert!(parameter.set_value(Value::from("3")).is_err());
    }
}
