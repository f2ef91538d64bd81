//! Merged command catalog across backend roles.

use std::collections::BTreeMap;

use crate::descriptor::{CommandDescriptor, Flavor};

/// All descriptors served by the gateway, keyed by catalog number.
/// Iteration order is catalog order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    commands: BTreeMap<u32, CommandDescriptor>,
}

impl Catalog {
    /// Start from the primary role's descriptors; all are [`Flavor::Standard`].
    pub fn from_primary(descriptors: BTreeMap<u32, CommandDescriptor>) -> Self {
        let commands = descriptors
            .into_iter()
            .map(|(k, mut d)| {
                d.flavor = Flavor::Standard;
                (k, d)
            })
            .collect();
        Self { commands }
    }

    /// Append a secondary role's descriptors after the primary ones.
    ///
    /// Keys are renumbered to start right after the current maximum so
    /// they never collide. `pg` commands become [`Flavor::PgTarget`], the
    /// rest [`Flavor::TellTarget`].
    pub fn merge_secondary(&mut self, descriptors: BTreeMap<u32, CommandDescriptor>) {
        let mut next = self.commands.keys().next_back().map_or(0, |max| max + 1);
        for (_, mut desc) in descriptors {
            desc.flavor = if desc.is_pg_command() {
                Flavor::PgTarget
            } else {
                Flavor::TellTarget
            };
            desc.key = next;
            self.commands.insert(next, desc);
            next += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn get(&self, key: u32) -> Option<&CommandDescriptor> {
        self.commands.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.commands.values()
    }
}
