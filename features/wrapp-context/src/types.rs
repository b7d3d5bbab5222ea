use std::{
    any::{Any, TypeId},
    fmt::Debug,
    sync::Arc,
};

/// Error type returned by user supplied constructors, factories, setters and hooks
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// The container may be shared between threads once built
/// So anything managed by it needs to be Send + Sync + 'static
pub trait Injectable: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Injectable for T {}

pub(crate) type AnyArc = Arc<dyn Any + Send + Sync + 'static>;
type CastFn = dyn Fn(&AnyArc) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync;

/// Type Name and Type Id
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}
impl std::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name)
    }
}
impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }
}

/// A type an [Instance] can be retrieved as
///
/// Every instance has a view of its concrete type. Further views turn the concrete `Arc<C>`
/// into `Arc<dyn Trait>`, which is how a component satisfies an interface.
#[derive(Clone)]
pub struct View {
    pub info: TypeInfo,
    cast: Arc<CastFn>,
}
impl Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("View").field(&self.info.type_name).finish()
    }
}
impl View {
    pub fn concrete<C: Injectable>() -> View {
        View {
            info: TypeInfo::of::<C>(),
            cast: Arc::new(|value: &AnyArc| {
                value
                    .clone()
                    .downcast::<C>()
                    .ok()
                    .map(|concrete| Box::new(concrete) as Box<dyn Any + Send + Sync>)
            }),
        }
    }

    pub fn alias<C, T>(cast: fn(Arc<C>) -> Arc<T>) -> View
    where
        C: Injectable,
        T: ?Sized + Send + Sync + 'static,
    {
        View {
            info: TypeInfo::of::<T>(),
            cast: Arc::new(move |value: &AnyArc| {
                value
                    .clone()
                    .downcast::<C>()
                    .ok()
                    .map(|concrete| Box::new(cast(concrete)) as Box<dyn Any + Send + Sync>)
            }),
        }
    }
}

/// A created component
///
/// Cloning an instance is cheap and keeps pointing at the same component.
#[derive(Clone)]
pub struct Instance {
    info: TypeInfo,
    value: AnyArc,
    views: Arc<[View]>,
}
impl Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.info.type_name)
            .field("views", &self.views)
            .finish()
    }
}

impl Instance {
    /// Wraps a value which can only be retrieved as its concrete type
    pub fn new<C: Injectable>(value: C) -> Self {
        Self::builder(Arc::new(value)).build()
    }

    /// Starts building an instance which may be retrieved through additional views
    pub fn builder<C: Injectable>(value: Arc<C>) -> InstanceBuilder<C> {
        InstanceBuilder {
            value,
            views: vec![View::concrete::<C>()],
        }
    }

    pub(crate) fn from_parts(info: TypeInfo, value: AnyArc, views: Arc<[View]>) -> Self {
        Instance { info, value, views }
    }

    /// Type of the concrete value
    pub fn info(&self) -> TypeInfo {
        self.info
    }

    /// All types this instance can be retrieved as
    pub fn views(&self) -> impl Iterator<Item = TypeInfo> + '_ {
        self.views.iter().map(|view| view.info)
    }

    pub fn satisfies(&self, type_id: TypeId) -> bool {
        self.views.iter().any(|view| view.info.type_id == type_id)
    }

    /// Retrieves the instance as `T`, returns None if no view for `T` exists
    pub fn get<T: ?Sized + 'static>(&self) -> Option<Arc<T>> {
        let view = self
            .views
            .iter()
            .find(|view| view.info.type_id == TypeId::of::<T>())?;

        (view.cast)(&self.value)?
            .downcast::<Arc<T>>()
            .ok()
            .map(|boxed| *boxed)
    }

    /// Returns true if both instances point at the same component
    pub fn same(&self, other: &Instance) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.value), Arc::as_ptr(&other.value))
    }
}

pub struct InstanceBuilder<C: Injectable> {
    value: Arc<C>,
    views: Vec<View>,
}
impl<C: Injectable> InstanceBuilder<C> {
    /// Allows retrieving the instance as `T`, usually a `dyn Trait` implemented by `C`
    pub fn implements<T: ?Sized + Send + Sync + 'static>(mut self, cast: fn(Arc<C>) -> Arc<T>) -> Self {
        if !self.views.iter().any(|view| view.info.type_id == TypeId::of::<T>()) {
            self.views.push(View::alias(cast));
        }
        self
    }

    pub fn build(self) -> Instance {
        Instance {
            info: TypeInfo::of::<C>(),
            value: self.value,
            views: self.views.into(),
        }
    }
}
