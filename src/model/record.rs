//! A single entity instance: one value slot per declared field.

use crate::model::{FieldValue, Model, ModelConfig, ID_FIELD};
use serde::ser::{Serialize, SerializeMap, Serializer};

#[derive(Clone, Debug)]
pub struct Record {
    config: Model,
    values: Vec<FieldValue>,
}

impl Record {
    /// All slots start unset.
    pub fn new(config: Model) -> Self {
        let values = vec![FieldValue::Null; config.fields.len()];
        Record { config, values }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn model(&self) -> &Model {
        &self.config
    }

    pub fn table_name(&self) -> &str {
        &self.config.table_name
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.config.field_index(name).map(|i| &self.values[i])
    }

    /// Set a slot by field name. Returns false when the model has no such field.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> bool {
        match self.config.field_index(name) {
            Some(i) => {
                self.values[i] = value.into();
                true
            }
            None => false,
        }
    }

    /// Integer value of a reference-like field; unset and null read as 0.
    pub fn get_i64(&self, name: &str) -> i64 {
        self.get(name).and_then(FieldValue::as_i64).unwrap_or(0)
    }

    pub fn id(&self) -> i64 {
        self.get_i64(ID_FIELD)
    }

    pub fn set_id(&mut self, id: i64) {
        self.set(ID_FIELD, id);
    }

    /// Field definitions paired with their current values, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&crate::model::FieldDef, &FieldValue)> {
        self.config.fields.iter().zip(self.values.iter())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (def, value) in self.iter() {
            map.serialize_entry(&def.name, value)?;
        }
        map.end()
    }
}
