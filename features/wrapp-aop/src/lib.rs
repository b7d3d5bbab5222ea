//! Wrapp AOP intercepts method calls of container components.
//!
//! Components annotated with [AROUND] are replaced during start-up by a proxy built through
//! a weaver registered on the [AroundProxyPostProcessor]. The proxy implements the same trait
//! as the component, holds the original and routes each call through an [Advice], which
//! notifies the [Interceptor] named by the annotation.

pub mod errors;
pub mod interceptor;
pub mod processor;

pub use errors::AopError;
pub use interceptor::{Advice, Interceptor, JoinPoint};
pub use processor::{AroundExt, AroundProxyPostProcessor, AROUND};
