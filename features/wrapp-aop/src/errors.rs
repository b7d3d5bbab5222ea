use thiserror::Error;

/// Errors while weaving interceptors into components
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AopError {
    /// The handler named by the `around` annotation is not registered
    #[error("Interceptor '{handler}' of component '{component}' not found")]
    HandlerNotFound { component: String, handler: String },
    /// The handler exists but cannot be retrieved as an interceptor
    #[error("Component '{handler}' intercepting '{component}' does not implement Interceptor")]
    HandlerNotInterceptor { component: String, handler: String },
    /// No weaver is registered for the type of the component
    #[error("No weaver registered for component '{component}' of type '{type_name}'")]
    NoWeaver {
        component: String,
        type_name: &'static str,
    },
}
