use std::{
    any::{type_name, TypeId},
    collections::BTreeMap,
    fmt::Debug,
    marker::PhantomData,
    sync::Arc,
};

use crate::{
    errors::ArgError,
    factories::{Arg, Args, Origin},
    processor::PostProcessor,
    types::{DynError, Injectable, Instance, TypeInfo, View},
};

/// Order of descriptors which did not ask for a specific position, sorts last
pub const UNORDERED: i32 = i32::MAX;

pub(crate) type SetterFn = dyn Fn(&Instance, Arg) -> Result<(), DynError> + Send + Sync;
pub(crate) type HookFn = dyn Fn(&Instance) -> Result<(), DynError> + Send + Sync;

/// Kind of the type a descriptor was declared for
///
/// Only concrete types are instantiated, the others are admitted by scanners but skipped by
/// the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeKind {
    #[default]
    Concrete,
    Interface,
    Marker,
    Enumeration,
}
impl TypeKind {
    pub fn is_instantiable(self) -> bool {
        matches!(self, TypeKind::Concrete)
    }
}

/// How a reference dependency is looked up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Autowired {
    /// Look up by name instead of by type, the found component must still match the type
    pub name: Option<String>,
    /// Fail if no unique candidate exists
    pub required: bool,
}
impl Default for Autowired {
    fn default() -> Self {
        Self::required()
    }
}
impl Autowired {
    pub fn required() -> Self {
        Autowired {
            name: None,
            required: true,
        }
    }

    pub fn optional() -> Self {
        Autowired {
            name: None,
            required: false,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Scalar marker: a property key or `${key[:default]}` expression and the target type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueMarker {
    pub expr: String,
    pub target: TypeInfo,
}

/// Reference marker: the lookup and the type of the dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutowiredMarker {
    pub spec: Autowired,
    pub target: TypeInfo,
}

/// A constructor or factory parameter
///
/// A valid parameter carries exactly one marker. Parameters with none or both are accepted
/// here and rejected when the component is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Param {
    pub(crate) value: Option<ValueMarker>,
    pub(crate) autowired: Option<AutowiredMarker>,
}
impl Param {
    /// Scalar parameter resolved from the property source
    pub fn value<V: Send + Sync + 'static>(expr: impl Into<String>) -> Self {
        Param::unmarked().with_value::<V>(expr)
    }

    /// Reference parameter resolved from the registry
    pub fn autowired<T: ?Sized + 'static>(spec: Autowired) -> Self {
        Param::unmarked().with_autowired::<T>(spec)
    }

    /// Required reference parameter looked up by type
    pub fn component<T: ?Sized + 'static>() -> Self {
        Param::autowired::<T>(Autowired::required())
    }

    pub fn unmarked() -> Self {
        Param::default()
    }

    pub fn with_value<V: Send + Sync + 'static>(mut self, expr: impl Into<String>) -> Self {
        self.value = Some(ValueMarker {
            expr: expr.into(),
            target: TypeInfo::of::<V>(),
        });
        self
    }

    pub fn with_autowired<T: ?Sized + 'static>(mut self, spec: Autowired) -> Self {
        self.autowired = Some(AutowiredMarker {
            spec,
            target: TypeInfo::of::<T>(),
        });
        self
    }

    pub fn value_marker(&self) -> Option<&ValueMarker> {
        self.value.as_ref()
    }

    pub fn autowired_marker(&self) -> Option<&AutowiredMarker> {
        self.autowired.as_ref()
    }
}

/// A field or one-argument setter populated after all components exist
pub struct InjectionPoint {
    pub(crate) member: String,
    pub(crate) param: Param,
    pub(crate) setter: Box<SetterFn>,
}
impl Debug for InjectionPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InjectionPoint")
            .field("member", &self.member)
            .field("param", &self.param)
            .finish()
    }
}
impl InjectionPoint {
    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn param(&self) -> &Param {
        &self.param
    }
}

/// Initialization or teardown hook
#[derive(Clone)]
pub(crate) enum Hook {
    /// Closure over the component
    Direct(Arc<HookFn>),
    /// Method name looked up in the method table of the component's type
    Named(String),
}
impl Debug for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Hook::Direct(_) => f.write_str("Direct(..)"),
            Hook::Named(name) => f.debug_tuple("Named").field(name).finish(),
        }
    }
}

/// Metadata describing how to build one named component
pub struct ComponentDescriptor {
    pub(crate) name: String,
    pub(crate) declared: TypeInfo,
    pub(crate) concrete: TypeInfo,
    pub(crate) views: Arc<[View]>,
    pub(crate) kind: TypeKind,
    pub(crate) origin: Origin,
    pub(crate) params: Vec<Param>,
    pub(crate) injections: Vec<InjectionPoint>,
    pub(crate) order: i32,
    pub(crate) primary: bool,
    pub(crate) configuration: bool,
    pub(crate) init: Option<Hook>,
    pub(crate) destroy: Option<Hook>,
    pub(crate) annotations: BTreeMap<&'static str, String>,
}

impl Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("name", &self.name)
            .field("declared", &self.declared.type_name)
            .field("factory_owner", &self.factory_owner())
            .field("order", &self.order)
            .field("primary", &self.primary)
            .field("configuration", &self.configuration)
            .finish_non_exhaustive()
    }
}

impl ComponentDescriptor {
    /// Component built by calling `construct` with the resolved `params`
    pub fn constructor<C, E>(
        name: impl Into<String>,
        params: impl IntoIterator<Item = Param>,
        construct: impl FnOnce(&Args) -> Result<C, E> + Send + Sync + 'static,
    ) -> DescriptorBuilder<C>
    where
        C: Injectable,
        E: Into<DynError>,
    {
        DescriptorBuilder::new(name.into(), Origin::constructor(construct), params)
    }

    /// Component built by calling factory `method` on the component named `owner`
    pub fn factory<C, O, E>(
        name: impl Into<String>,
        owner: impl Into<String>,
        method: &'static str,
        params: impl IntoIterator<Item = Param>,
        call: impl FnOnce(&O, &Args) -> Result<C, E> + Send + Sync + 'static,
    ) -> DescriptorBuilder<C>
    where
        C: Injectable,
        O: Injectable,
        E: Into<DynError>,
    {
        DescriptorBuilder::new(
            name.into(),
            Origin::factory(owner.into(), method, call),
            params,
        )
    }

    /// Component which already exists
    pub fn instance<C: Injectable>(name: impl Into<String>, component: C) -> DescriptorBuilder<C> {
        Self::constructor(name, [], move |_| Ok::<_, DynError>(component))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type this component is looked up and substituted as
    pub fn declared_type(&self) -> TypeInfo {
        self.declared
    }

    /// The type the constructor or factory produces
    pub fn concrete_type(&self) -> TypeInfo {
        self.concrete
    }

    /// All types a lookup may use to find this component
    pub fn types(&self) -> impl Iterator<Item = TypeInfo> + '_ {
        self.views.iter().map(|view| view.info)
    }

    pub fn satisfies(&self, type_id: TypeId) -> bool {
        self.views.iter().any(|view| view.info.type_id == type_id)
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn is_configuration(&self) -> bool {
        self.configuration
    }

    pub fn is_post_processor(&self) -> bool {
        self.satisfies(TypeId::of::<dyn PostProcessor>())
    }

    /// Name of the owning component for factory descriptors
    pub fn factory_owner(&self) -> Option<&str> {
        self.origin.owner()
    }

    pub fn factory_method(&self) -> Option<&'static str> {
        match &self.origin {
            Origin::Factory { method, .. } => Some(method),
            Origin::Constructor(_) => None,
        }
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn injection_points(&self) -> &[InjectionPoint] {
        &self.injections
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

/// Typed builder for a [ComponentDescriptor] producing a `C`
pub struct DescriptorBuilder<C> {
    descriptor: ComponentDescriptor,
    views: Vec<View>,
    _component: PhantomData<fn() -> C>,
}

impl<C: Injectable> DescriptorBuilder<C> {
    fn new(name: String, origin: Origin, params: impl IntoIterator<Item = Param>) -> Self {
        DescriptorBuilder {
            descriptor: ComponentDescriptor {
                name,
                declared: TypeInfo::of::<C>(),
                concrete: TypeInfo::of::<C>(),
                views: Arc::new([]),
                kind: TypeKind::Concrete,
                origin,
                params: params.into_iter().collect(),
                injections: Vec::new(),
                order: UNORDERED,
                primary: false,
                configuration: false,
                init: None,
                destroy: None,
                annotations: BTreeMap::new(),
            },
            views: vec![View::concrete::<C>()],
            _component: PhantomData,
        }
    }

    /// Position when scanning and sorting candidates, lower sorts first
    pub fn order(mut self, order: i32) -> Self {
        self.descriptor.order = order;
        self
    }

    /// Preferred candidate when a type lookup matches several components
    pub fn primary(mut self) -> Self {
        self.descriptor.primary = true;
        self
    }

    /// Created before every other component, its parameters may not reference components
    pub fn configuration(mut self) -> Self {
        self.descriptor.configuration = true;
        self
    }

    pub fn kind(mut self, kind: TypeKind) -> Self {
        self.descriptor.kind = kind;
        self
    }

    /// Attaches metadata read by collaborators such as interceptors
    pub fn annotate(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.descriptor.annotations.insert(key, value.into());
        self
    }

    /// Lets type lookups for `T` find this component, usually a `dyn Trait` implemented by `C`
    pub fn implements<T: ?Sized + Send + Sync + 'static>(mut self, cast: fn(Arc<C>) -> Arc<T>) -> Self {
        if !self.views.iter().any(|view| view.info.type_id == TypeId::of::<T>()) {
            self.views.push(View::alias(cast));
        }
        self
    }

    /// Like [DescriptorBuilder::implements], and makes `T` the declared type
    ///
    /// A post-processor may only substitute the component with an instance of the declared
    /// type, so components meant to be proxied are declared as the trait the proxy implements.
    pub fn declare_as<T: ?Sized + Send + Sync + 'static>(mut self, cast: fn(Arc<C>) -> Arc<T>) -> Self {
        self.descriptor.declared = TypeInfo::of::<T>();
        self.implements(cast)
    }

    /// Registers the component into the post-processor pipeline during start-up
    pub fn post_processor(self) -> Self
    where
        C: PostProcessor,
    {
        self.implements::<dyn PostProcessor>(|processor| processor)
    }

    /// Populates `member` with the scalar resolved from `expr`
    pub fn inject_value<V: Send + Sync + 'static>(
        self,
        member: impl Into<String>,
        expr: impl Into<String>,
        set: impl Fn(&C, V) + Send + Sync + 'static,
    ) -> Self {
        self.inject_raw(member, Param::value::<V>(expr), move |component, arg| match arg {
            Arg::Value(value) => {
                let value = value.downcast::<V>().map_err(|_| ArgError::NotAValue {
                    index: 0,
                    expected: type_name::<V>(),
                })?;
                set(component, *value);
                Ok(())
            }
            Arg::Component(_) => Err(ArgError::NotAValue {
                index: 0,
                expected: type_name::<V>(),
            }
            .into()),
        })
    }

    /// Populates `member` with the component found through `spec`
    ///
    /// The setter is skipped if an optional dependency has no unique candidate.
    pub fn inject_component<T: ?Sized + Send + Sync + 'static>(
        self,
        member: impl Into<String>,
        spec: Autowired,
        set: impl Fn(&C, Arc<T>) + Send + Sync + 'static,
    ) -> Self {
        self.inject_raw(member, Param::autowired::<T>(spec), move |component, arg| {
            let not_a_component = || ArgError::NotAComponent {
                index: 0,
                expected: type_name::<T>(),
            };
            match arg {
                Arg::Component(Some(instance)) => {
                    set(component, instance.get::<T>().ok_or_else(not_a_component)?);
                    Ok(())
                }
                Arg::Component(None) => Ok(()),
                Arg::Value(_) => Err(not_a_component().into()),
            }
        })
    }

    /// Populates `member` through an arbitrary parameter and setter
    pub fn inject_raw(
        mut self,
        member: impl Into<String>,
        param: Param,
        set: impl Fn(&C, Arg) -> Result<(), DynError> + Send + Sync + 'static,
    ) -> Self {
        let setter = move |target: &Instance, arg: Arg| {
            let component = target.get::<C>().ok_or(ArgError::NotAComponent {
                index: 0,
                expected: type_name::<C>(),
            })?;
            set(&component, arg)
        };

        self.descriptor.injections.push(InjectionPoint {
            member: member.into(),
            param,
            setter: Box::new(setter),
        });
        self
    }

    /// Runs after all components were created and injected
    pub fn init<E: Into<DynError>>(mut self, hook: impl Fn(&C) -> Result<(), E> + Send + Sync + 'static) -> Self {
        self.descriptor.init = Some(Hook::Direct(direct_hook(hook)));
        self
    }

    /// Runs the method registered under `method` for the component's type after creation
    pub fn init_method(mut self, method: impl Into<String>) -> Self {
        self.descriptor.init = Some(Hook::Named(method.into()));
        self
    }

    /// Runs when the container is closed
    pub fn destroy<E: Into<DynError>>(mut self, hook: impl Fn(&C) -> Result<(), E> + Send + Sync + 'static) -> Self {
        self.descriptor.destroy = Some(Hook::Direct(direct_hook(hook)));
        self
    }

    /// Runs the method registered under `method` for the component's type on close
    pub fn destroy_method(mut self, method: impl Into<String>) -> Self {
        self.descriptor.destroy = Some(Hook::Named(method.into()));
        self
    }

    pub fn build(mut self) -> ComponentDescriptor {
        self.descriptor.views = self.views.into();
        self.descriptor
    }
}

impl<C: Injectable> From<DescriptorBuilder<C>> for ComponentDescriptor {
    fn from(builder: DescriptorBuilder<C>) -> Self {
        builder.build()
    }
}

pub(crate) fn direct_hook<C, E>(hook: impl Fn(&C) -> Result<(), E> + Send + Sync + 'static) -> Arc<HookFn>
where
    C: Injectable,
    E: Into<DynError>,
{
    Arc::new(move |target: &Instance| {
        let component = target.get::<C>().ok_or_else(|| -> DynError {
            format!(
                "hook expects a '{}' but the component is a '{}'",
                type_name::<C>(),
                target.info().type_name
            )
            .into()
        })?;
        hook(&component).map_err(Into::into)
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    trait Greeter: Send + Sync {}
    struct English;
    impl Greeter for English {}

    #[test]
    fn builder_defaults() {
        let descriptor = ComponentDescriptor::instance("english", English).build();

        assert_eq!(descriptor.name(), "english");
        assert_eq!(descriptor.order(), UNORDERED);
        assert_eq!(descriptor.declared_type(), TypeInfo::of::<English>());
        assert_eq!(descriptor.kind(), TypeKind::Concrete);
        assert!(!descriptor.is_primary());
        assert!(!descriptor.is_configuration());
        assert!(!descriptor.is_post_processor());
        assert_eq!(descriptor.factory_owner(), None);
    }

    #[test]
    fn declared_type_and_aliases() {
        let descriptor = ComponentDescriptor::instance("english", English)
            .declare_as::<dyn Greeter>(|c| c)
            .order(3)
            .primary()
            .annotate("around", "logger")
            .build();

        assert_eq!(descriptor.declared_type(), TypeInfo::of::<dyn Greeter>());
        assert_eq!(descriptor.concrete_type(), TypeInfo::of::<English>());
        assert!(descriptor.satisfies(TypeId::of::<English>()));
        assert!(descriptor.satisfies(TypeId::of::<dyn Greeter>()));
        assert_eq!(descriptor.types().count(), 2);
        assert_eq!(descriptor.annotation("around"), Some("logger"));
        assert_eq!(descriptor.order(), 3);
        assert!(descriptor.is_primary());
    }

    #[test]
    fn factory_descriptors_name_their_owner() {
        struct Config;
        let descriptor = ComponentDescriptor::factory(
            "english",
            "config",
            "english",
            [Param::value::<String>("${greeting}")],
            |_: &Config, _| Ok::<_, DynError>(English),
        )
        .build();

        assert_eq!(descriptor.factory_owner(), Some("config"));
        assert_eq!(descriptor.factory_method(), Some("english"));
        assert_eq!(descriptor.params().len(), 1);
    }

    #[test]
    fn params_record_their_markers() {
        let param = Param::value::<u16>("${port}").with_autowired::<English>(Autowired::optional().named("en"));

        assert_eq!(
            param.value_marker(),
            Some(&ValueMarker {
                expr: "${port}".to_string(),
                target: TypeInfo::of::<u16>()
            })
        );
        let autowired = param.autowired_marker().unwrap();
        assert_eq!(autowired.spec.name.as_deref(), Some("en"));
        assert!(!autowired.spec.required);
        assert_eq!(Param::unmarked().value_marker(), None);
    }
}
