use std::{any::TypeId, collections::HashMap, fmt::Debug, sync::Arc};

use crate::{
    descriptor::{direct_hook, HookFn},
    types::{DynError, Injectable, TypeInfo},
};

/// Zero argument methods of one component type, callable by name
#[derive(Clone)]
pub struct MethodTable {
    info: TypeInfo,
    methods: HashMap<String, Arc<HookFn>>,
}
impl Debug for MethodTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.methods.keys().collect();
        names.sort();
        f.debug_struct("MethodTable")
            .field("type", &self.info.type_name)
            .field("methods", &names)
            .finish()
    }
}
impl MethodTable {
    pub fn contains(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    pub(crate) fn get(&self, method: &str) -> Option<&Arc<HookFn>> {
        self.methods.get(method)
    }
}

/// Method tables keyed by the concrete component type
///
/// Named init and destroy hooks are resolved here against the type of the created instance.
#[derive(Clone, Debug, Default)]
pub struct MethodTables {
    tables: HashMap<TypeId, MethodTable>,
}
impl MethodTables {
    /// Registers `method` for components of type `C`, replacing an earlier registration
    pub fn register<C, E>(
        &mut self,
        name: impl Into<String>,
        method: impl Fn(&C) -> Result<(), E> + Send + Sync + 'static,
    ) where
        C: Injectable,
        E: Into<DynError>,
    {
        let info = TypeInfo::of::<C>();
        self.tables
            .entry(info.type_id)
            .or_insert_with(|| MethodTable {
                info,
                methods: HashMap::new(),
            })
            .methods
            .insert(name.into(), direct_hook(method));
    }

    pub fn table(&self, type_id: TypeId) -> Option<&MethodTable> {
        self.tables.get(&type_id)
    }

    pub(crate) fn lookup(&self, type_id: TypeId, method: &str) -> Option<&Arc<HookFn>> {
        self.table(type_id)?.get(method)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::types::Instance;

    #[derive(Default)]
    struct Pool {
        opened: AtomicUsize,
    }

    #[test]
    fn methods_are_found_by_type_and_name() {
        let mut tables = MethodTables::default();
        tables.register("open", |pool: &Pool| {
            pool.opened.fetch_add(1, Ordering::SeqCst);
            Ok::<_, DynError>(())
        });

        let instance = Instance::new(Pool::default());
        let open = tables
            .lookup(TypeId::of::<Pool>(), "open")
            .expect("open is registered");
        open(&instance).unwrap();

        assert_eq!(instance.get::<Pool>().unwrap().opened.load(Ordering::SeqCst), 1);
        assert!(tables.lookup(TypeId::of::<Pool>(), "close").is_none());
        assert!(tables.lookup(TypeId::of::<String>(), "open").is_none());
        assert!(tables.table(TypeId::of::<Pool>()).unwrap().contains("open"));
    }
}
