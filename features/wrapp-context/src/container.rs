use std::{any::type_name, fmt::Debug, sync::Arc};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use wrapp_config::PropertySource;

use crate::{
    errors::{HookError, RequireError},
    initiator::run_hook,
    methods::MethodTables,
    processor::Pipeline,
    registry::{Candidate, ComponentState, DescriptorRegistry},
    types::{Instance, TypeInfo},
};

/// Everything a started container serves lookups from
#[derive(Default)]
pub(crate) struct Snapshot {
    pub(crate) registry: DescriptorRegistry,
    pub(crate) properties: PropertySource,
    pub(crate) methods: MethodTables,
    pub(crate) pipeline: Pipeline,
}

impl Snapshot {
    fn instance(&self, index: usize) -> Option<&Instance> {
        self.registry.entry(index)?.instance.as_ref()
    }
}

/// Container holding all started components
///
/// Lookups read an immutable snapshot and never block, closing the container swaps in an
/// empty snapshot.
#[derive(Clone)]
pub struct ApplicationContext(Arc<ApplicationContextInner>);
struct ApplicationContextInner {
    snapshot: ArcSwap<Snapshot>,
    close: Mutex<()>,
}

impl Debug for ApplicationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.0.snapshot.load();
        let mut map = f.debug_struct("ApplicationContext");
        for entry in snapshot.registry.entries() {
            let type_name = entry
                .instance
                .as_ref()
                .map_or(entry.descriptor.declared_type().type_name, |instance| {
                    instance.info().type_name
                });
            map.field(
                entry.descriptor.name(),
                &format_args!("{type_name} ({:?})", entry.state),
            );
        }
        map.finish()
    }
}

impl ApplicationContext {
    pub(crate) fn new(snapshot: Snapshot) -> Self {
        Self(Arc::new(ApplicationContextInner {
            snapshot: ArcSwap::from_pointee(snapshot),
            close: Mutex::new(()),
        }))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.snapshot.load().registry.contains(name)
    }

    /// Names of all components in registration order
    pub fn names(&self) -> Vec<String> {
        self.0
            .snapshot
            .load()
            .registry
            .names()
            .map(str::to_owned)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.snapshot.load().registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.snapshot.load().registry.is_empty()
    }

    pub fn state(&self, name: &str) -> Option<ComponentState> {
        self.0.snapshot.load().registry.state(name)
    }

    /// The property source the components were configured from
    pub fn properties(&self) -> PropertySource {
        self.0.snapshot.load().properties.clone()
    }

    /// Returns the component named `name`
    pub fn get_by_name(&self, name: &str) -> Result<Instance, RequireError> {
        let snapshot = self.0.snapshot.load();
        snapshot
            .registry
            .index_of(name)
            .and_then(|index| snapshot.instance(index))
            .cloned()
            .ok_or_else(|| RequireError::NoSuchComponent(format!("name '{name}'")))
    }

    /// Returns the single component of type `T`, or the single primary one among several
    pub fn get<T: ?Sized + 'static>(&self) -> Result<Arc<T>, RequireError> {
        let snapshot = self.0.snapshot.load();
        match snapshot.registry.unique_index(TypeInfo::of::<T>().type_id) {
            Candidate::Unique(index) => downcast(&snapshot, index),
            Candidate::None => Err(RequireError::NoSuchComponent(format!(
                "type '{}'",
                type_name::<T>()
            ))),
            Candidate::Ambiguous(candidates) => Err(RequireError::NoUniqueComponent {
                required: type_name::<T>(),
                candidates,
            }),
        }
    }

    /// Returns the component named `name` as `T`
    pub fn get_named<T: ?Sized + 'static>(&self, name: &str) -> Result<Arc<T>, RequireError> {
        let snapshot = self.0.snapshot.load();
        match snapshot.registry.named_index(name, TypeInfo::of::<T>())? {
            Some(index) => downcast(&snapshot, index),
            None => Err(RequireError::NoSuchComponent(format!("name '{name}'"))),
        }
    }

    /// Like [ApplicationContext::get] but returns None instead of failing
    pub fn find<T: ?Sized + 'static>(&self) -> Option<Arc<T>> {
        self.get().ok()
    }

    /// Like [ApplicationContext::get_named] but returns None instead of failing
    pub fn find_named<T: ?Sized + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.get_named(name).ok()
    }

    /// All components of type `T`, ordered by their order and then by name
    ///
    /// Fails with [RequireError::DowncastFailed] if a matching component was substituted by an
    /// instance that is no longer a `T`.
    pub fn get_all<T: ?Sized + 'static>(&self) -> Result<Vec<Arc<T>>, RequireError> {
        let snapshot = self.0.snapshot.load();
        snapshot
            .registry
            .indices_by_type(TypeInfo::of::<T>().type_id)
            .into_iter()
            .map(|index| downcast(&snapshot, index))
            .collect()
    }

    /// Runs all destroy hooks in registration order and clears the container
    ///
    /// Hooks target the restored instances. A failing hook does not stop the others, the
    /// first failure is returned once all of them ran. Closing twice is a caller error.
    pub fn close(&self) -> Result<(), HookError> {
        let _guard = self.0.close.lock();
        let snapshot = self.0.snapshot.swap(Arc::new(Snapshot::default()));
        tracing::debug!("Closing context with {} components", snapshot.registry.len());

        let mut first_error = None;
        for entry in snapshot.registry.entries() {
            let (Some(hook), Some(instance)) = (&entry.descriptor.destroy, &entry.instance) else {
                continue;
            };

            let name = entry.descriptor.name();
            let target = snapshot.pipeline.restore(instance.clone(), name);
            tracing::debug!("Running destroy hook of '{name}'");
            if let Err(error) = run_hook(&snapshot.methods, hook, "destroy", name, &target) {
                tracing::error!("{error}");
                first_error.get_or_insert(error);
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn downcast<T: ?Sized + 'static>(snapshot: &Snapshot, index: usize) -> Result<Arc<T>, RequireError> {
    let entry = snapshot
        .registry
        .entry(index)
        .ok_or_else(|| RequireError::NoSuchComponent(format!("index {index}")))?;
    let instance = entry
        .instance
        .as_ref()
        .ok_or_else(|| RequireError::NoSuchComponent(format!("name '{}'", entry.descriptor.name())))?;

    instance.get::<T>().ok_or_else(|| RequireError::DowncastFailed {
        name: entry.descriptor.name().to_owned(),
        required_type: type_name::<T>(),
        actual_type: instance.info().type_name,
    })
}
