use std::sync::Arc;

use thiserror::Error;
use wrapp_config::PropertyError;

use crate::types::DynError;

/// Errors while populating or querying the descriptor registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Two descriptors share a name
    #[error("Duplicate component name: '{0}'")]
    DuplicateName(String),
    /// A name based lookup found a component of an incompatible type
    #[error("Required type '{required}' but component '{name}' has type '{actual}'")]
    TypeMismatch {
        name: String,
        required: &'static str,
        actual: &'static str,
    },
    /// A factory descriptor refers to an owner which is not registered
    #[error("Factory component '{component}' refers to unknown owner '{owner}'")]
    MissingFactoryOwner { component: String, owner: String },
}

/// Errors when trying to get a component from the container
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequireError {
    /// No component matches the lookup
    #[error("No component defined with {0}")]
    NoSuchComponent(String),
    /// More than one component matches a type lookup and none is a unique primary
    #[error("No unique component of type '{required}', candidates: {candidates:?}")]
    NoUniqueComponent {
        required: &'static str,
        candidates: Vec<String>,
    },
    /// A name based lookup found a component of an incompatible type
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The component was found but cannot be retrieved as the requested type
    #[error("Failed to downcast '{name}', required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        name: String,
        required_type: &'static str,
        actual_type: &'static str,
    },
}

/// Errors raised by lifecycle hooks
#[derive(Error, Debug, Clone)]
pub enum HookError {
    /// A hook refers to a method name that is not registered for the component's type
    #[error("Method '{method}' not found for component '{component}' of type '{type_name}'")]
    MethodNotFound {
        component: String,
        method: String,
        type_name: &'static str,
    },
    /// The hook itself returned an error
    #[error("{hook} hook of component '{component}' failed - error: {error}")]
    Failed {
        component: String,
        hook: &'static str,
        error: Arc<DynError>,
    },
}

/// Errors when resolving a constructor, factory or injection argument
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgError {
    #[error("Argument {index} is out of range, {len} arguments were resolved")]
    OutOfRange { index: usize, len: usize },
    #[error("Argument {index} is not a value of type '{expected}'")]
    NotAValue { index: usize, expected: &'static str },
    #[error("Argument {index} is not a component of type '{expected}'")]
    NotAComponent { index: usize, expected: &'static str },
    #[error("Argument {index} of type '{expected}' was not resolved")]
    Unresolved { index: usize, expected: &'static str },
}

/// Errors while starting the container
///
/// Every error aborts start-up, no partially built container is published.
#[derive(Error, Debug, Clone)]
pub enum InitError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Require(#[from] RequireError),

    #[error(transparent)]
    Hook(#[from] HookError),

    /// A scalar argument could not be resolved from the property source
    #[error("Failed to resolve property for component '{component}': {error}")]
    Property {
        component: String,
        #[source]
        error: PropertyError,
    },

    /// A component was requested while it was still being created
    #[error("Circular dependency detected when creating component '{name}' through {chain:?}")]
    CircularDependency { name: String, chain: Vec<String> },

    /// A required reference has no unique candidate
    #[error("Missing component of type '{dependency}'{} when creating component '{component}'", name_hint(.name))]
    UnsatisfiedDependency {
        component: String,
        dependency: &'static str,
        name: Option<String>,
    },

    /// A parameter or injection point carries zero or both markers
    #[error("Invalid {site} of component '{component}': {reason}")]
    InvalidParameter {
        component: String,
        site: String,
        reason: &'static str,
    },

    /// Configuration components must not reference other components at construction time
    #[error("Cannot autowire {site} when creating configuration component '{component}'")]
    AutowiredInConfiguration { component: String, site: String },

    /// A post-processor returned an instance that does not satisfy the declared type
    #[error("Post-processor substituted component '{component}' with '{substitute}' which is not a '{declared}'")]
    IncompatibleSubstitute {
        component: String,
        declared: &'static str,
        substitute: &'static str,
    },

    /// A constructor or factory failed
    #[error("Factory for '{component}' failed - error: {error}")]
    FactoryFailed {
        component: String,
        error: Arc<DynError>,
    },

    /// Setting a field or calling a setter failed
    #[error("Injecting '{member}' into component '{component}' failed - error: {error}")]
    InjectionFailed {
        component: String,
        member: String,
        error: Arc<DynError>,
    },

    /// A post-processor failed while processing a component
    #[error("Post-processing component '{component}' failed - error: {error}")]
    ProcessorFailed {
        component: String,
        error: Arc<DynError>,
    },
}

impl InitError {
    /// Wraps an error raised by a post-processor
    pub fn processor(component: &str, error: impl Into<DynError>) -> Self {
        InitError::ProcessorFailed {
            component: component.to_owned(),
            error: Arc::new(error.into()),
        }
    }
}

fn name_hint(name: &Option<String>) -> String {
    match name {
        Some(name) => format!(" named '{name}'"),
        None => String::new(),
    }
}
