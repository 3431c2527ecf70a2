//! Schema registry mapping packet name to compiled [`PacketSchema`].
//!
//! Built once at process startup and passed explicitly into the consumer
//! that needs it — not a process-wide singleton.
use std::collections::HashMap;

use crate::schema::PacketSchema;
use crate::schemas;

pub struct SchemaRegistry {
    schemas: HashMap<String, PacketSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    /// A registry pre-populated with every schema this crate ships.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(schemas::adcs_css_vector::schema());
        registry.register(schemas::adcs_current_state::schema());
        registry.register(schemas::adcs_meas_rw_speed::schema());
        registry.register(schemas::eps_ses_temp::schema());
        registry
    }

    pub fn register(&mut self, schema: PacketSchema) {
        self.schemas.insert(schema.name.to_string(), schema);
    }

    pub fn get(&self, packet_name: &str) -> Option<&PacketSchema> {
        self.schemas.get(packet_name)
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let registry = SchemaRegistry::with_builtins();
        assert!(registry.get("HEALTH_ADCS_CSS_VECTOR").is_some());
        assert!(registry.get("HEALTH_ADCS_CURRENT_STATE").is_some());
        assert!(registry.get("HEALTH_ADCS_MEAS_RW_SPEED").is_some());
        assert!(registry.get("NOPE").is_none());
    }
}
