//! Mapper options.

use serde::{Deserialize, Serialize};

use crate::generator::Strategy;

/// Options controlling how entity mappers are compiled.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperOptions {
    /// Accessor strategy.
    pub strategy: Strategy,

    /// When the generated strategy cannot compile an entity, use reflection
    /// instead of failing.
    pub fallback_to_reflection: bool,
}

impl MapperOptions {
    pub fn reflection() -> Self {
        Self {
            strategy: Strategy::Reflection,
            ..Self::default()
        }
    }

    pub fn with_fallback(mut self) -> Self {
        self.fallback_to_reflection = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = MapperOptions::default();
        assert_eq!(options.strategy, Strategy::Generated);
        assert!(!options.fallback_to_reflection);
    }

    #[test]
    fn test_from_yaml() {
        let options: MapperOptions =
            serde_yaml::from_str("strategy: reflection\nfallback_to_reflection: true\n").unwrap();
        assert_eq!(options, MapperOptions::reflection().with_fallback());
    }
}
