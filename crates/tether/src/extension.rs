//! Extension contract and catalog

use crate::essentials::Essentials;
use crate::{CommandRegistry, Result, TetherError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// A bundle of commands contributed to the registry
pub trait Extension: Send + Sync {
    /// Name used in configuration
    fn name(&self) -> &str;

    /// Add this extension's commands
    fn register(&self, registry: &mut CommandRegistry) -> Result<()>;
}

/// Extensions available for loading, by name
#[derive(Default)]
pub struct ExtensionCatalog {
    extensions: HashMap<String, Arc<dyn Extension>>,
}

impl ExtensionCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the built-in extensions
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.add(Arc::new(Essentials));
        catalog
    }

    /// Make an extension available, replacing one of the same name
    pub fn add(&mut self, extension: Arc<dyn Extension>) {
        self.extensions.insert(extension.name().to_string(), extension);
    }

    /// Whether an extension is known
    pub fn contains(&self, name: &str) -> bool {
        self.extensions.contains_key(name)
    }

    /// Register the named extensions in order.
    ///
    /// Every name is checked before anything is registered. Command name
    /// clashes between extensions surface as `DuplicateCommand`.
    pub fn load<S: AsRef<str>>(&self, names: &[S], registry: &mut CommandRegistry) -> Result<()> {
        let extensions = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.extensions
                    .get(name)
                    .cloned()
                    .ok_or_else(|| TetherError::UnknownExtension(name.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        for extension in extensions {
            extension.register(registry)?;
            info!("Loaded extension: {}", extension.name());
        }
        Ok(())
    }
}
