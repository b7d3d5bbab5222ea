use std::sync::Arc;

use wrapp_config::PropertySource;

use crate::{
    container::Snapshot,
    descriptor::{AutowiredMarker, Hook, Param, ValueMarker},
    errors::{HookError, InitError, RegistryError, RequireError},
    factories::{Arg, Args, Origin},
    methods::MethodTables,
    processor::{ContextHandle, Pipeline, PostProcessor},
    registry::{Candidate, ComponentState, DescriptorRegistry, RegistryEntry},
    types::{DynError, Instance},
};

/// Builds the object graph of a registry
///
/// Start-up runs in five phases:
/// 1. Configuration components, their factory methods build other components
/// 2. Post-processors, appended to the pipeline in creation order
/// 3. Every component still uncreated, dependencies are created on demand
/// 4. Field and setter injection into the restored instances
/// 5. Init hooks in registration order
pub(crate) struct ContextInitiator {
    registry: DescriptorRegistry,
    properties: PropertySource,
    methods: MethodTables,
    pipeline: Pipeline,
    /// Names of the components currently being created, innermost last
    creating: Vec<String>,
}

impl ContextInitiator {
    pub(crate) fn new(registry: DescriptorRegistry, properties: PropertySource, methods: MethodTables) -> Self {
        ContextInitiator {
            registry,
            properties,
            methods,
            pipeline: Pipeline::default(),
            creating: Vec::new(),
        }
    }

    pub(crate) fn registry(&self) -> &DescriptorRegistry {
        &self.registry
    }

    pub(crate) fn properties(&self) -> &PropertySource {
        &self.properties
    }

    pub(crate) fn initiate(mut self) -> Result<Snapshot, InitError> {
        let span = tracing::debug_span!("context.start", components = self.registry.len());
        let _enter = span.enter();

        if let Err(error) = self.try_initiate() {
            tracing::error!("Aborted start-up: {error}");
            return Err(error);
        }

        tracing::debug!("Started context with {} components", self.registry.len());
        Ok(Snapshot {
            registry: self.registry,
            properties: self.properties,
            methods: self.methods,
            pipeline: self.pipeline,
        })
    }

    fn try_initiate(&mut self) -> Result<(), InitError> {
        self.registry.validate()?;

        let configurations = self.registry.indices_where(|descriptor| descriptor.is_configuration());
        tracing::debug!("Creating {} configuration components", configurations.len());
        for index in configurations {
            self.create_early(index)?;
        }

        let processors = self.registry.indices_where(|descriptor| descriptor.is_post_processor());
        tracing::debug!("Creating {} post-processors", processors.len());
        let mut created = Vec::with_capacity(processors.len());
        for index in processors {
            created.push((index, self.create_early(index)?));
        }
        for (index, instance) in created {
            self.register_processor(index, instance)?;
        }

        let remaining = self.registry.indices_where(|_| true);
        tracing::debug!("Creating remaining components");
        for index in remaining {
            if self.state(index) == ComponentState::Uncreated {
                self.create_early(index)?;
            }
        }

        tracing::debug!("Injecting members");
        for index in 0..self.registry.len() {
            self.inject(index)?;
        }

        tracing::debug!("Running init hooks");
        for index in 0..self.registry.len() {
            self.initialize(index)?;
        }

        Ok(())
    }

    fn register_processor(&mut self, index: usize, instance: Instance) -> Result<(), InitError> {
        let name = self.name(index);
        let processor = instance
            .get::<dyn PostProcessor>()
            .ok_or_else(|| RequireError::DowncastFailed {
                name: name.clone(),
                required_type: std::any::type_name::<dyn PostProcessor>(),
                actual_type: instance.info().type_name,
            })?;

        tracing::debug!("Added post-processor '{name}' to the pipeline");
        self.pipeline.push(name, processor);
        Ok(())
    }

    /// Creates the component at `index` unless it already exists
    ///
    /// References among the parameters are created recursively. A component requested while
    /// it is being created closes a cycle and aborts start-up.
    pub(crate) fn create_early(&mut self, index: usize) -> Result<Instance, InitError> {
        let name = self.name(index);
        let entry = self.entry(index)?;
        match (entry.state, &entry.instance) {
            (ComponentState::Creating, _) => {
                let start = self.creating.iter().position(|creating| *creating == name).unwrap_or(0);
                let mut chain = self.creating[start..].to_vec();
                chain.push(name.clone());
                return Err(InitError::CircularDependency { name, chain });
            }
            (_, Some(instance)) => return Ok(instance.clone()),
            (_, None) => {}
        }

        let span = tracing::debug_span!("component.create", name = %name);
        let _enter = span.enter();

        self.entry_mut(index)?.state = ComponentState::Creating;
        self.creating.push(name.clone());
        let instance = self.construct(index, &name);
        self.creating.pop();
        let instance = match instance {
            Ok(instance) => instance,
            Err(error) => {
                self.entry_mut(index)?.state = ComponentState::Uncreated;
                return Err(error);
            }
        };

        let entry = self.entry_mut(index)?;
        entry.state = ComponentState::Created;
        entry.instance = Some(instance.clone());
        tracing::debug!("Created component '{name}' of type '{}'", instance.info());

        self.post_process(index, &name, instance)
    }

    fn construct(&mut self, index: usize, name: &str) -> Result<Instance, InitError> {
        let entry = self.entry(index)?;
        let configuration = entry.descriptor.is_configuration();
        let params = entry.descriptor.params.clone();

        let mut args = Vec::with_capacity(params.len());
        for (position, param) in params.iter().enumerate() {
            let site = format!("parameter {position}");
            if configuration && param.autowired.is_some() {
                return Err(InitError::AutowiredInConfiguration {
                    component: name.to_owned(),
                    site,
                });
            }
            match self.resolve(name, &site, param)? {
                Some(arg) => args.push(arg),
                None => args.push(Arg::Component(None)),
            }
        }
        let args = Args::new(args);

        let owner = self.entry(index)?.descriptor.factory_owner().map(str::to_owned);
        let owner = match owner {
            Some(owner) => Some(self.factory_owner(name, owner)?),
            None => None,
        };

        let failed = |error: DynError| InitError::FactoryFailed {
            component: name.to_owned(),
            error: Arc::new(error),
        };
        let consumed = || -> DynError { "constructor was already called".into() };

        let entry = self.entry_mut(index)?;
        let value = match (&mut entry.descriptor.origin, owner) {
            (Origin::Constructor(construct), _) => {
                let construct = construct.take().ok_or_else(|| failed(consumed()))?;
                construct(&args).map_err(failed)?
            }
            (Origin::Factory { call, .. }, Some(owner)) => {
                let call = call.take().ok_or_else(|| failed(consumed()))?;
                call(&owner, &args).map_err(failed)?
            }
            (Origin::Factory { owner, .. }, None) => {
                return Err(failed(format!("factory owner '{owner}' was not created").into()))
            }
        };

        let descriptor = &entry.descriptor;
        Ok(Instance::from_parts(descriptor.concrete, value, descriptor.views.clone()))
    }

    /// The restored instance of the owner a factory method is called on
    fn factory_owner(&mut self, component: &str, owner: String) -> Result<Instance, InitError> {
        let index = self
            .registry
            .index_of(&owner)
            .ok_or_else(|| RegistryError::MissingFactoryOwner {
                component: component.to_owned(),
                owner: owner.clone(),
            })?;
        let instance = self.create_early(index)?;
        Ok(self.pipeline.restore(instance, &owner))
    }

    fn post_process(&mut self, index: usize, name: &str, original: Instance) -> Result<Instance, InitError> {
        if self.pipeline.is_empty() {
            return Ok(original);
        }

        let pipeline = self.pipeline.clone();
        let mut instance = original.clone();
        for processor in pipeline.iter() {
            let mut handle = ContextHandle::new(self);
            instance = processor.before_initialization(instance, name, &mut handle)?;
        }

        if instance.same(&original) {
            return Ok(instance);
        }

        let entry = self.entry_mut(index)?;
        let declared = entry.descriptor.declared;
        if !instance.satisfies(declared.type_id) {
            return Err(InitError::IncompatibleSubstitute {
                component: name.to_owned(),
                declared: declared.type_name,
                substitute: instance.info().type_name,
            });
        }

        tracing::debug!("Component '{name}' was substituted by a '{}'", instance.info());
        entry.instance = Some(instance.clone());
        Ok(instance)
    }

    fn inject(&mut self, index: usize) -> Result<(), InitError> {
        let name = self.name(index);
        let entry = self.entry(index)?;
        if entry.state >= ComponentState::Injected {
            return Ok(());
        }
        let target = self.stored(index)?;
        let target = self.pipeline.restore(target, &name);

        let points: Vec<(String, Param)> = self
            .entry(index)?
            .descriptor
            .injections
            .iter()
            .map(|point| (point.member.clone(), point.param.clone()))
            .collect();

        let mut resolved = Vec::with_capacity(points.len());
        for (member, param) in points {
            let site = format!("member '{member}'");
            resolved.push(self.resolve(&name, &site, &param)?);
        }

        let entry = self.entry(index)?;
        for (point, arg) in entry.descriptor.injections.iter().zip(resolved) {
            // Optional references without a candidate leave the member untouched
            let Some(arg) = arg else { continue };

            tracing::trace!("Injecting '{}' into '{name}'", point.member);
            (point.setter)(&target, arg).map_err(|error| InitError::InjectionFailed {
                component: name.clone(),
                member: point.member.clone(),
                error: Arc::new(error),
            })?;
        }

        self.entry_mut(index)?.state = ComponentState::Injected;
        Ok(())
    }

    fn initialize(&mut self, index: usize) -> Result<(), InitError> {
        let name = self.name(index);
        let target = self.stored(index)?;
        let target = self.pipeline.restore(target, &name);

        let entry = self.entry(index)?;
        if let Some(hook) = &entry.descriptor.init {
            tracing::debug!("Running init hook of '{name}'");
            run_hook(&self.methods, hook, "init", &name, &target)?;
        }

        self.entry_mut(index)?.state = ComponentState::Initialized;
        Ok(())
    }

    /// Resolves one parameter or injection point
    ///
    /// Returns None for an optional reference without a unique candidate.
    fn resolve(&mut self, component: &str, site: &str, param: &Param) -> Result<Option<Arg>, InitError> {
        match (&param.value, &param.autowired) {
            (Some(value), None) => self.resolve_value(component, value).map(Some),
            (None, Some(autowired)) => self.resolve_component(component, autowired),
            (None, None) => Err(InitError::InvalidParameter {
                component: component.to_owned(),
                site: site.to_owned(),
                reason: "carries neither a value nor an autowired marker",
            }),
            (Some(_), Some(_)) => Err(InitError::InvalidParameter {
                component: component.to_owned(),
                site: site.to_owned(),
                reason: "carries both a value and an autowired marker",
            }),
        }
    }

    fn resolve_value(&self, component: &str, marker: &ValueMarker) -> Result<Arg, InitError> {
        tracing::trace!("Resolving '{}' as '{}' for '{component}'", marker.expr, marker.target);
        self.properties
            .get_required_any(&marker.expr, marker.target.type_id, marker.target.type_name)
            .map(Arg::Value)
            .map_err(|error| InitError::Property {
                component: component.to_owned(),
                error,
            })
    }

    fn resolve_component(&mut self, component: &str, marker: &AutowiredMarker) -> Result<Option<Arg>, InitError> {
        let found = match &marker.spec.name {
            Some(name) => self.registry.named_index(name, marker.target)?,
            None => match self.registry.unique_index(marker.target.type_id) {
                Candidate::Unique(index) => Some(index),
                Candidate::None => None,
                Candidate::Ambiguous(candidates) => {
                    tracing::debug!(
                        "No unique '{}' for '{component}' among {candidates:?}",
                        marker.target
                    );
                    None
                }
            },
        };

        match found {
            Some(index) => {
                let instance = self.create_early(index)?;
                if !instance.satisfies(marker.target.type_id) {
                    return Err(RequireError::DowncastFailed {
                        name: self.name(index),
                        required_type: marker.target.type_name,
                        actual_type: instance.info().type_name,
                    }
                    .into());
                }
                Ok(Some(Arg::Component(Some(instance))))
            }
            None if marker.spec.required => Err(InitError::UnsatisfiedDependency {
                component: component.to_owned(),
                dependency: marker.target.type_name,
                name: marker.spec.name.clone(),
            }),
            None => Ok(None),
        }
    }

    fn state(&self, index: usize) -> ComponentState {
        self.registry
            .entry(index)
            .map_or(ComponentState::Uncreated, |entry| entry.state)
    }

    fn name(&self, index: usize) -> String {
        self.registry
            .entry(index)
            .map(|entry| entry.descriptor.name().to_owned())
            .unwrap_or_default()
    }

    fn stored(&self, index: usize) -> Result<Instance, InitError> {
        let entry = self.entry(index)?;
        entry.instance.clone().ok_or_else(|| {
            RequireError::NoSuchComponent(format!("name '{}'", entry.descriptor.name())).into()
        })
    }

    fn entry(&self, index: usize) -> Result<&RegistryEntry, InitError> {
        self.registry
            .entry(index)
            .ok_or_else(|| RequireError::NoSuchComponent(format!("index {index}")).into())
    }

    fn entry_mut(&mut self, index: usize) -> Result<&mut RegistryEntry, InitError> {
        self.registry
            .entry_mut(index)
            .ok_or_else(|| RequireError::NoSuchComponent(format!("index {index}")).into())
    }
}

/// Runs an init or destroy hook against `target`
pub(crate) fn run_hook(
    methods: &MethodTables,
    hook: &Hook,
    kind: &'static str,
    component: &str,
    target: &Instance,
) -> Result<(), HookError> {
    let call = match hook {
        Hook::Direct(call) => call,
        Hook::Named(method) => methods
            .lookup(target.info().type_id, method)
            .ok_or_else(|| HookError::MethodNotFound {
                component: component.to_owned(),
                method: method.clone(),
                type_name: target.info().type_name,
            })?,
    };

    call(target).map_err(|error| HookError::Failed {
        component: component.to_owned(),
        hook: kind,
        error: Arc::new(error),
    })
}
