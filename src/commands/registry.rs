use std::collections::{hash_map::Values, HashMap};

use super::{Command, CommandDescriptor};
use crate::dispatch::cooldown::Cooldowns;

/// A command together with its cooldown table.
pub struct Registered<T: Send + Sync + 'static> {
    pub command: Box<dyn Command<T>>,
    pub cooldowns: Cooldowns,
}

impl<T: Send + Sync + 'static> Registered<T> {
    pub fn descriptor(&self) -> &CommandDescriptor {
        self.command.descriptor()
    }
}

pub struct Registry<T: Send + Sync + 'static> {
    commands: HashMap<&'static str, Registered<T>>,
}

impl<T: Send + Sync + 'static> Registry<T> {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Replaces any command already registered under the same name.
    pub fn register(&mut self, command: impl Command<T> + 'static) {
        let name = command.descriptor().name;
        self.commands.insert(
            name,
            Registered {
                command: Box::new(command),
                cooldowns: Cooldowns::new(),
            },
        );
    }

    pub fn with(mut self, command: impl Command<T> + 'static) -> Self {
        self.register(command);
        self
    }

    pub fn find(&self, name: &str) -> Option<&Registered<T>> {
        self.commands
            .get(name)
            .filter(|registered| registered.command.matches(name))
    }

    pub fn values(&self) -> Values<'_, &'static str, Registered<T>> {
        self.commands.values()
    }

    pub fn descriptors(&self) -> Vec<&CommandDescriptor> {
        let mut descriptors: Vec<_> = self.values().map(Registered::descriptor).collect();
        descriptors.sort_by_key(|descriptor| descriptor.name);
        descriptors
    }
}

impl<T: Send + Sync + 'static> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}
