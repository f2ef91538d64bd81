//! Route table: compiled route keys and their overloads.

use std::collections::HashMap;

use crate::catalog::Catalog;
use crate::compile::{compile, BasePath};
use crate::descriptor::{CommandDescriptor, Flavor, Permission};
use crate::method::{HttpMethod, MethodSet};
use crate::signature::{concise_sig, ArgDescriptor};

/// One compiled overload registered at a route key.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteEntry {
    pub key: u32,
    /// Residual tokens bound from the query string.
    pub params: Vec<ArgDescriptor>,
    pub help: String,
    pub module: String,
    pub permission: Permission,
    pub flavor: Flavor,
    pub methods: MethodSet,
}

impl RouteEntry {
    pub fn allows(&self, method: HttpMethod) -> bool {
        self.methods.contains(method)
    }

    /// Usage of the residual parameters, e.g. `<pool> <var>`.
    pub fn param_usage(&self) -> String {
        concise_sig(&self.params)
    }
}

/// All overloads at one route key, in catalog order.
///
/// Never empty. `methods` is the union over every entry and is what the
/// HTTP surface admits; each entry re-checks its own methods.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSlot {
    entries: Vec<RouteEntry>,
    methods: MethodSet,
}

impl RouteSlot {
    fn new(entry: RouteEntry) -> Self {
        Self {
            methods: entry.methods.clone(),
            entries: vec![entry],
        }
    }

    fn push(&mut self, entry: RouteEntry) {
        self.methods.union_with(&entry.methods);
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn methods(&self) -> &MethodSet {
        &self.methods
    }

    pub fn has_flavor(&self, flavor: Flavor) -> bool {
        self.entries.iter().any(|e| e.flavor == flavor)
    }
}

/// Frozen routing structure built once at startup and shared read-only
/// by every request.
#[derive(Debug, Clone)]
pub struct RouteTable {
    base: BasePath,
    routes: HashMap<String, RouteSlot>,
    /// Every descriptor, sorted by concise form, for discovery.
    commands: Vec<CommandDescriptor>,
}

impl RouteTable {
    pub fn build(base: BasePath, catalog: &Catalog) -> Self {
        let mut routes: HashMap<String, RouteSlot> = HashMap::new();
        for desc in catalog.iter() {
            let route = compile(&base, &desc.signature, desc.flavor);
            let entry = RouteEntry {
                key: desc.key,
                params: route.params,
                help: desc.help.clone(),
                module: desc.module.clone(),
                permission: desc.permission.clone(),
                flavor: desc.flavor,
                methods: desc.permission.methods(),
            };
            match routes.get_mut(&route.path) {
                Some(slot) => slot.push(entry),
                None => {
                    routes.insert(route.path, RouteSlot::new(entry));
                }
            }
        }

        let mut commands: Vec<CommandDescriptor> = catalog.iter().cloned().collect();
        commands.sort_by_cached_key(|d| (d.concise(), d.key));

        tracing::debug!("urls added: {}", routes.len());
        Self {
            base,
            routes,
            commands,
        }
    }

    pub fn base(&self) -> &BasePath {
        &self.base
    }

    pub fn get(&self, key: &str) -> Option<&RouteSlot> {
        self.routes.get(key)
    }

    /// Number of distinct route keys.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn commands(&self) -> &[CommandDescriptor] {
        &self.commands
    }
}
