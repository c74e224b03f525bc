use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Opaque id of the server a result table comes from.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Serialize, Deserialize)]
#[display(fmt = "{}", _0)]
pub struct ServerInstance(String);

impl ServerInstance {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ServerInstance {
    fn from(name: &str) -> Self {
        ServerInstance(name.to_string())
    }
}

impl From<String> for ServerInstance {
    fn from(name: String) -> Self {
        ServerInstance(name)
    }
}
