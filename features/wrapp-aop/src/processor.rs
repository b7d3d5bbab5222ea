use std::{any::TypeId, collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use wrapp_context::{
    ContextHandle, DescriptorBuilder, InitError, Injectable, Instance, PostProcessor,
};

use crate::{
    errors::AopError,
    interceptor::{Advice, Interceptor},
};

/// Descriptor annotation naming the interceptor of a component
pub const AROUND: &str = "around";

type WeaveFn = dyn Fn(Instance, Advice) -> Option<Instance> + Send + Sync;

/// Replaces components annotated with [AROUND] by proxies routing calls through the
/// named interceptor
///
/// Proxies are built by weavers registered per concrete component type. Originals are kept
/// so injection and lifecycle hooks still reach the component itself.
#[derive(Default)]
pub struct AroundProxyPostProcessor {
    weavers: HashMap<TypeId, Arc<WeaveFn>>,
    originals: Mutex<HashMap<String, Instance>>,
}

impl std::fmt::Debug for AroundProxyPostProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AroundProxyPostProcessor")
            .field("weavers", &self.weavers.len())
            .field("proxied", &self.originals.lock().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AroundProxyPostProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers how to wrap components of type `C`
    ///
    /// The returned instance must satisfy the declared type of the wrapped component.
    pub fn weave<C: Injectable>(mut self, weaver: impl Fn(Arc<C>, Advice) -> Instance + Send + Sync + 'static) -> Self {
        let weave = move |instance: Instance, advice: Advice| {
            instance.get::<C>().map(|component| weaver(component, advice))
        };
        self.weavers.insert(TypeId::of::<C>(), Arc::new(weave));
        self
    }

    fn proxy(
        &self,
        instance: Instance,
        name: &str,
        handler: &str,
        context: &mut ContextHandle<'_>,
    ) -> Result<Instance, InitError> {
        let fail = |error: AopError| InitError::processor(name, error);

        if !context.contains(handler) {
            return Err(fail(AopError::HandlerNotFound {
                component: name.to_owned(),
                handler: handler.to_owned(),
            }));
        }

        let interceptor = context
            .require(handler)?
            .get::<dyn Interceptor>()
            .ok_or_else(|| {
                fail(AopError::HandlerNotInterceptor {
                    component: name.to_owned(),
                    handler: handler.to_owned(),
                })
            })?;

        let no_weaver = || {
            fail(AopError::NoWeaver {
                component: name.to_owned(),
                type_name: instance.info().type_name,
            })
        };
        let weave = self.weavers.get(&instance.info().type_id).ok_or_else(no_weaver)?;
        weave(instance.clone(), Advice::new(name, interceptor)).ok_or_else(no_weaver)
    }
}

impl PostProcessor for AroundProxyPostProcessor {
    fn before_initialization(
        &self,
        instance: Instance,
        name: &str,
        context: &mut ContextHandle<'_>,
    ) -> Result<Instance, InitError> {
        let Some(handler) = context
            .descriptor(name)
            .and_then(|descriptor| descriptor.annotation(AROUND))
            .map(str::to_owned)
        else {
            return Ok(instance);
        };

        let proxy = self.proxy(instance.clone(), name, &handler, context)?;

        tracing::debug!("Component '{name}' is intercepted by '{handler}'");
        self.originals.lock().insert(name.to_owned(), instance);
        Ok(proxy)
    }

    fn restore_original(&self, instance: Instance, name: &str) -> Instance {
        self.originals.lock().get(name).cloned().unwrap_or(instance)
    }
}

/// Annotates a descriptor with the interceptor it is proxied through
pub trait AroundExt {
    fn around(self, handler: impl Into<String>) -> Self;
}

impl<C: Injectable> AroundExt for DescriptorBuilder<C> {
    fn around(self, handler: impl Into<String>) -> Self {
        self.annotate(AROUND, handler)
    }
}
