use wrapp_config::PropertySource;

use crate::{
    container::ApplicationContext,
    descriptor::ComponentDescriptor,
    errors::InitError,
    initiator::ContextInitiator,
    methods::MethodTables,
    registry::DescriptorRegistry,
    types::{DynError, Injectable},
};

/// Collects descriptors, named methods and properties, then starts the container
///
/// ```rust
/// use wrapp_context::{Autowired, ComponentDescriptor, ContextBuilder, Param};
/// use wrapp_config::PropertySource;
///
/// struct Db { url: String }
/// struct Service { db: std::sync::Arc<Db> }
///
/// let context = ContextBuilder::new()
///     .properties(PropertySource::new([("db.url", "sqlite::memory:")]))
///     .register(ComponentDescriptor::constructor(
///         "db",
///         [Param::value::<String>("${db.url}")],
///         |args| args.value::<String>(0).map(|url| Db { url }),
///     ))
///     .register(ComponentDescriptor::constructor(
///         "service",
///         [Param::autowired::<Db>(Autowired::required())],
///         |args| args.component::<Db>(0).map(|db| Service { db }),
///     ))
///     .build()
///     .unwrap();
///
/// let service = context.get::<Service>().unwrap();
/// assert_eq!(service.db.url, "sqlite::memory:");
/// ```
#[derive(Default)]
pub struct ContextBuilder {
    descriptors: Vec<ComponentDescriptor>,
    properties: PropertySource,
    methods: MethodTables,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the property source scalar parameters are resolved from
    pub fn properties(mut self, properties: PropertySource) -> Self {
        self.properties = properties;
        self
    }

    pub fn register(mut self, descriptor: impl Into<ComponentDescriptor>) -> Self {
        self.descriptors.push(descriptor.into());
        self
    }

    pub fn register_all(mut self, descriptors: impl IntoIterator<Item = ComponentDescriptor>) -> Self {
        self.descriptors.extend(descriptors);
        self
    }

    /// Makes `method` callable by name as init or destroy hook of components of type `C`
    pub fn method<C, E>(
        mut self,
        name: impl Into<String>,
        method: impl Fn(&C) -> Result<(), E> + Send + Sync + 'static,
    ) -> Self
    where
        C: Injectable,
        E: Into<DynError>,
    {
        self.methods.register(name, method);
        self
    }

    /// Registers all descriptors and runs start-up
    ///
    /// Fails on the first error, no partially started container is returned.
    pub fn build(self) -> Result<ApplicationContext, InitError> {
        let ContextBuilder {
            descriptors,
            properties,
            methods,
        } = self;

        let mut registry = DescriptorRegistry::new();
        for descriptor in descriptors {
            registry.register(descriptor)?;
        }

        let snapshot = ContextInitiator::new(registry, properties, methods).initiate()?;
        Ok(ApplicationContext::new(snapshot))
    }
}

/// Starts a container from `descriptors`, resolving scalars from `properties`
pub fn start(
    descriptors: impl IntoIterator<Item = ComponentDescriptor>,
    properties: PropertySource,
) -> Result<ApplicationContext, InitError> {
    ContextBuilder::new()
        .properties(properties)
        .register_all(descriptors)
        .build()
}
