use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use quarry_array::DataType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

pub type SchemaRef = Arc<Schema>;

#[derive(Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn try_new(fields: Vec<Field>) -> Result<Self> {
        let mut names = HashSet::new();

        for field in &fields {
            anyhow::ensure!(!field.name.is_empty(), "schema contains an empty field name");
            if !names.insert(&field.name) {
                anyhow::bail!("schema contains duplicate field name: '{}'", field.name);
            }
        }

        Ok(Self { fields })
    }

    pub fn field(&self, name: &str) -> Option<(usize, &Field)> {
        self.fields.iter().enumerate().find(|(_, f)| f.name == name)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn column_names(&self) -> Vec<String> {
        self.fields.iter().map(|field| field.name.clone()).collect()
    }
}
