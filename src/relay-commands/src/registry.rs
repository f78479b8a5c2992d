//! Command registry for managing loaded specs.

use std::collections::HashMap;

use indexmap::IndexMap;
use indexmap::map::{IntoValues, Values};
use tracing::{debug, warn};

use crate::builtin;
use crate::spec::{CommandSpec, SpecError};

/// Registry of command specs.
///
/// Specs are kept in registration order, which the router uses to break
/// ties. Re-registering a name replaces the previous spec in place.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    /// Map of command names to specs.
    commands: IndexMap<String, CommandSpec>,
    /// Map of aliases to command names.
    aliases: HashMap<String, String>,
}

impl CommandRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in commands.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.extend(builtin::builtin_specs());
        registry
    }

    /// Register a spec after validating it.
    ///
    /// A spec with the same name is replaced, never merged, and the
    /// replaced spec is returned.
    pub fn register(&mut self, spec: CommandSpec) -> Result<Option<CommandSpec>, SpecError> {
        spec.validate()?;

        let name = spec.name.clone();
        self.aliases.retain(|_, target| target != &name);
        for alias in &spec.aliases {
            if let Some(previous) = self.aliases.insert(alias.clone(), name.clone())
                && previous != name
            {
                debug!(alias, from = %previous, to = %name, "alias reassigned");
            }
        }

        let replaced = self.commands.insert(name.clone(), spec);
        if let Some(old) = &replaced {
            debug!(command = %name, source = %old.source, "replaced existing command");
        }
        Ok(replaced)
    }

    /// Register every spec, skipping invalid ones with a warning.
    pub fn extend(&mut self, specs: impl IntoIterator<Item = CommandSpec>) {
        for spec in specs {
            let name = spec.name.clone();
            if let Err(e) = self.register(spec) {
                warn!(command = %name, "skipping invalid command: {e}");
            }
        }
    }

    /// Get a spec by name or alias. A real name always wins over an alias.
    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.get_exact(name).or_else(|| {
            self.aliases
                .get(name)
                .and_then(|real| self.commands.get(real))
        })
    }

    /// Get a spec by its own name only.
    pub fn get_exact(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.get(name)
    }

    /// Check if a command exists by name or alias.
    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name) || self.aliases.contains_key(name)
    }

    /// Registration index of a command.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.commands.get_index_of(name)
    }

    /// All specs in registration order.
    pub fn list(&self) -> Vec<&CommandSpec> {
        self.commands.values().collect()
    }

    /// All command names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Specs in `category`, compared case-insensitively.
    pub fn by_category(&self, category: &str) -> Vec<&CommandSpec> {
        self.commands
            .values()
            .filter(|spec| spec.category.eq_ignore_ascii_case(category))
            .collect()
    }

    /// Create an iterator over all specs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &CommandSpec> {
        self.commands.values()
    }
}

impl IntoIterator for CommandRegistry {
    type Item = CommandSpec;
    type IntoIter = IntoValues<String, CommandSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_values()
    }
}

impl<'a> IntoIterator for &'a CommandRegistry {
    type Item = &'a CommandSpec;
    type IntoIter = Values<'a, String, CommandSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.values()
    }
}
