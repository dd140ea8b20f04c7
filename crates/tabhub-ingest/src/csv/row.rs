use super::SinkError;
use crate::transform::{ColumnRegistry, NativeValue};

/// One ingested row: column names paired with values, in source column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: Vec<(String, NativeValue)>,
}

impl Row {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, value: NativeValue) {
        self.values.push((column.into(), value));
    }

    pub fn get(&self, column: &str) -> Option<&NativeValue> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NativeValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Storage representation keyed by column name.
    ///
    /// Values of columns missing from `columns` are kept as strings.
    pub fn to_storage(
        &self,
        columns: &ColumnRegistry,
    ) -> Result<serde_json::Map<String, serde_json::Value>, SinkError> {
        let mut object = serde_json::Map::with_capacity(self.values.len());
        for (name, value) in &self.values {
            let stored = match (columns.column_by_name(name), value) {
                (_, NativeValue::Null) => serde_json::Value::Null,
                (Some(column), _) => match column.to_storage(value) {
                    Ok(stored) => stored,
                    // Raw text kept after a failed conversion
                    Err(_) if matches!(value, NativeValue::String(_)) => {
                        serde_json::Value::String(value.to_string())
                    },
                    Err(source) => {
                        return Err(SinkError::Validation {
                            column: name.clone(),
                            source,
                        })
                    },
                },
                (None, _) => serde_json::Value::String(value.to_string()),
            };
            object.insert(name.clone(), stored);
        }
        Ok(object)
    }
}

impl FromIterator<(String, NativeValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, NativeValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::transform::{ColumnSpec, ColumnType};

    #[test]
    fn test_to_storage() {
        let registry = ColumnRegistry::from_specs(vec![
            ("id", ColumnSpec::new(ColumnType::UInt8)),
            ("when", ColumnSpec::new(ColumnType::Date)),
        ])
        .unwrap();

        let mut row = Row::default();
        row.push("id", NativeValue::Int(4));
        row.push("when", NativeValue::from("not a date"));
        row.push("extra", NativeValue::from("x"));
        row.push("missing", NativeValue::Null);

        let stored = row.to_storage(&registry).unwrap();
        assert_eq!(
            serde_json::Value::Object(stored),
            serde_json::json!({"id": 4, "when": "not a date", "extra": "x", "missing": null})
        );
        assert_eq!(row.get("id"), Some(&NativeValue::Int(4)));
        assert_eq!(row.len(), 4);
    }
}
