//! Wrapp Context builds a fully wired graph of singleton components.
//!
//! Wrapp Context is split into four parts:
//! 1. Descriptors: how to build one named component, its parameters, injection points and hooks
//! 2. The Registry: all descriptors of a container with name and type lookups
//! 3. Start-up: creates, post-processes, injects and initializes every component
//! 4. The ApplicationContext: the query surface once start-up completed
//!
//! Components are shared as `Arc`s and may be retrieved as their concrete type or as any
//! `dyn Trait` they were registered to implement.

pub mod builder;
pub mod container;
pub mod descriptor;
pub mod errors;
pub mod factories;
mod initiator;
pub mod methods;
pub mod processor;
pub mod registry;
pub mod types;

pub use builder::{start, ContextBuilder};
pub use container::ApplicationContext;
pub use descriptor::{Autowired, ComponentDescriptor, DescriptorBuilder, Param, TypeKind, UNORDERED};
pub use errors::{HookError, InitError, RegistryError, RequireError};
pub use factories::{Arg, Args};
pub use processor::{ContextHandle, PostProcessor};
pub use registry::{ComponentState, DescriptorRegistry};
pub use types::{DynError, Injectable, Instance, TypeInfo};
