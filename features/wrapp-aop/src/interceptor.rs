use std::{fmt::Display, sync::Arc};

/// A method call on an intercepted component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinPoint<'a> {
    pub component: &'a str,
    pub method: &'static str,
}

/// Handler invoked around every advised method call
pub trait Interceptor: Send + Sync {
    fn before(&self, _point: &JoinPoint<'_>) {}

    fn after(&self, _point: &JoinPoint<'_>) {}

    /// Called instead of [Interceptor::after] when the call returned an error
    fn after_error(&self, _point: &JoinPoint<'_>, _error: &dyn Display) {}
}

/// Binds an interceptor to one component
///
/// Proxies hold an advice and route each forwarded method call through it.
#[derive(Clone)]
pub struct Advice {
    component: String,
    handler: Arc<dyn Interceptor>,
}

impl std::fmt::Debug for Advice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Advice")
            .field("component", &self.component)
            .finish_non_exhaustive()
    }
}

impl Advice {
    pub fn new(component: impl Into<String>, handler: Arc<dyn Interceptor>) -> Self {
        Advice {
            component: component.into(),
            handler,
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Runs `call` between the handler's `before` and `after`
    pub fn around<R>(&self, method: &'static str, call: impl FnOnce() -> R) -> R {
        let point = self.point(method);
        self.handler.before(&point);
        let result = call();
        self.handler.after(&point);
        result
    }

    /// Like [Advice::around], reports errors through `after_error`
    pub fn around_result<T, E: Display>(
        &self,
        method: &'static str,
        call: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        let point = self.point(method);
        self.handler.before(&point);
        let result = call();
        match &result {
            Ok(_) => self.handler.after(&point),
            Err(error) => self.handler.after_error(&point, error),
        }
        result
    }

    fn point(&self, method: &'static str) -> JoinPoint<'_> {
        JoinPoint {
            component: &self.component,
            method,
        }
    }
}
