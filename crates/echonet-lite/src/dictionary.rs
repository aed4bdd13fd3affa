//! Class/property metadata lookup (§4.A).
//!
//! The dictionary *source file format* is out of scope (§1): this module
//! only defines the lookup capability and a trivial in-memory
//! implementation. A production deployment supplies its own loader behind
//! the same trait; if loading fails, an empty dictionary still lets the
//! rest of the system run, since typed decoding (`crate::objects`) never
//! depends on it.

use std::collections::HashMap;

use crate::types::ClassCode;

/// Metadata about a single property, keyed within its owning [`ClassInfo`].
#[derive(Debug, Clone)]
pub struct PropertyInfo {
    pub description: String,
}

/// Metadata about a device class.
#[derive(Debug, Clone, Default)]
pub struct ClassInfo {
    pub description: String,
    properties: HashMap<u8, PropertyInfo>,
}

impl ClassInfo {
    pub fn new(description: impl Into<String>) -> Self {
        Self { description: description.into(), properties: HashMap::new() }
    }

    pub fn with_property(mut self, epc: u8, description: impl Into<String>) -> Self {
        self.properties.insert(epc, PropertyInfo { description: description.into() });
        self
    }

    pub fn property(&self, epc: u8) -> Option<&PropertyInfo> {
        self.properties.get(&epc)
    }
}

/// `get(ClassCode) -> ClassInfo?` (§4.A contract).
pub trait ClassDictionary {
    fn get(&self, class: ClassCode) -> Option<&ClassInfo>;
}

/// An in-memory dictionary built from a fixed set of entries. Used both as
/// the "empty on load failure" fallback and as the default reference
/// dictionary for the two classes this bridge understands.
#[derive(Debug, Default)]
pub struct StaticDictionary {
    classes: HashMap<ClassCode, ClassInfo>,
}

impl StaticDictionary {
    /// An empty dictionary: descriptions degrade to `None`, but typed
    /// decoding in `crate::objects` is unaffected (§4.A Lifecycle).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (ClassCode, ClassInfo)>) -> Self {
        Self { classes: entries.into_iter().collect() }
    }

    /// The built-in description set for Home Aircon and Smart Meter, the
    /// two classes this bridge decodes (§4.A: "hard-coded class handlers
    /// for the two supported classes").
    pub fn builtin() -> Self {
        use crate::types::{CLASS_HOME_AIRCON, CLASS_SMART_METER};
        Self::from_entries([
            (
                CLASS_HOME_AIRCON,
                ClassInfo::new("Home Air Conditioner")
                    .with_property(0x81, "Installation location")
                    .with_property(0xBB, "Measured room temperature")
                    .with_property(0xBE, "Measured outdoor temperature"),
            ),
            (
                CLASS_SMART_METER,
                ClassInfo::new("Low-Voltage Smart Electricity Meter")
                    .with_property(0xD3, "Coefficient")
                    .with_property(0xE1, "Unit for cumulative amounts of electric energy")
                    .with_property(0xE7, "Measured instantaneous power")
                    .with_property(0xE8, "Measured instantaneous currents"),
            ),
        ])
    }
}

impl ClassDictionary for StaticDictionary {
    fn get(&self, class: ClassCode) -> Option<&ClassInfo> {
        self.classes.get(&class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CLASS_HOME_AIRCON;

    #[test]
    fn empty_dictionary_has_no_entries() {
        let dict = StaticDictionary::empty();
        assert!(dict.get(CLASS_HOME_AIRCON).is_none());
    }

    #[test]
    fn builtin_dictionary_describes_aircon_temperature_properties() {
        let dict = StaticDictionary::builtin();
        let aircon = dict.get(CLASS_HOME_AIRCON).unwrap();
        assert_eq!(aircon.property(0xBB).unwrap().description, "Measured room temperature");
        assert!(aircon.property(0x00).is_none());
    }
}
