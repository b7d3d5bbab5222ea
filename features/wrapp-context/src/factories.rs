use std::{any::type_name, sync::Arc};

use wrapp_config::convert::AnyValue;

use crate::{
    errors::ArgError,
    types::{AnyArc, DynError, Instance},
};

/// Creates a component from its resolved arguments, called exactly once
pub(crate) type ConstructFn = dyn FnOnce(&Args) -> Result<AnyArc, DynError> + Send + Sync;
/// Creates a component by calling a factory method on its owning component, called exactly once
pub(crate) type FactoryFn = dyn FnOnce(&Instance, &Args) -> Result<AnyArc, DynError> + Send + Sync;

/// How a descriptor's component comes into existence
pub(crate) enum Origin {
    Constructor(Option<Box<ConstructFn>>),
    Factory {
        owner: String,
        method: &'static str,
        call: Option<Box<FactoryFn>>,
    },
}

impl Origin {
    pub(crate) fn constructor<C, E>(
        construct: impl FnOnce(&Args) -> Result<C, E> + Send + Sync + 'static,
    ) -> Self
    where
        C: Send + Sync + 'static,
        E: Into<DynError>,
    {
        Origin::Constructor(Some(Box::new(move |args: &Args| {
            construct(args)
                .map(|component| Arc::new(component) as AnyArc)
                .map_err(Into::into)
        })))
    }

    pub(crate) fn factory<C, O, E>(
        owner: String,
        method: &'static str,
        call: impl FnOnce(&O, &Args) -> Result<C, E> + Send + Sync + 'static,
    ) -> Self
    where
        C: Send + Sync + 'static,
        O: Send + Sync + 'static,
        E: Into<DynError>,
    {
        Origin::Factory {
            owner,
            method,
            call: Some(Box::new(move |owner: &Instance, args: &Args| {
                let owner = owner.get::<O>().ok_or_else(|| -> DynError {
                    format!(
                        "owner of factory method '{method}' is a '{}', not a '{}'",
                        owner.info().type_name,
                        type_name::<O>()
                    )
                    .into()
                })?;
                call(&owner, args)
                    .map(|component| Arc::new(component) as AnyArc)
                    .map_err(Into::into)
            })),
        }
    }

    pub(crate) fn owner(&self) -> Option<&str> {
        match self {
            Origin::Constructor(_) => None,
            Origin::Factory { owner, .. } => Some(owner),
        }
    }
}

/// A resolved constructor, factory or injection argument
pub enum Arg {
    /// Scalar converted from the property source
    Value(AnyValue),
    /// Reference to another component, `None` if an optional dependency had no unique candidate
    Component(Option<Instance>),
}

impl std::fmt::Debug for Arg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arg::Value(_) => f.write_str("Value(..)"),
            Arg::Component(instance) => f.debug_tuple("Component").field(instance).finish(),
        }
    }
}

/// Positional arguments handed to constructors and factory methods
#[derive(Debug, Default)]
pub struct Args {
    args: Vec<Arg>,
}

impl Args {
    pub(crate) fn new(args: Vec<Arg>) -> Self {
        Args { args }
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Returns a copy of the scalar argument at `index`
    pub fn value<T: Clone + 'static>(&self, index: usize) -> Result<T, ArgError> {
        match self.get(index)? {
            Arg::Value(value) => value.downcast_ref::<T>().cloned().ok_or(ArgError::NotAValue {
                index,
                expected: type_name::<T>(),
            }),
            Arg::Component(_) => Err(ArgError::NotAValue {
                index,
                expected: type_name::<T>(),
            }),
        }
    }

    /// Returns the component argument at `index`, failing if it was not resolved
    pub fn component<T: ?Sized + 'static>(&self, index: usize) -> Result<Arc<T>, ArgError> {
        self.optional_component(index)?.ok_or(ArgError::Unresolved {
            index,
            expected: type_name::<T>(),
        })
    }

    /// Returns the component argument at `index`, `None` if an optional dependency was not found
    pub fn optional_component<T: ?Sized + 'static>(
        &self,
        index: usize,
    ) -> Result<Option<Arc<T>>, ArgError> {
        let not_a_component = || ArgError::NotAComponent {
            index,
            expected: type_name::<T>(),
        };

        match self.get(index)? {
            Arg::Component(Some(instance)) => instance.get::<T>().map(Some).ok_or_else(not_a_component),
            Arg::Component(None) => Ok(None),
            Arg::Value(_) => Err(not_a_component()),
        }
    }

    fn get(&self, index: usize) -> Result<&Arg, ArgError> {
        self.args.get(index).ok_or(ArgError::OutOfRange {
            index,
            len: self.args.len(),
        })
    }
}
