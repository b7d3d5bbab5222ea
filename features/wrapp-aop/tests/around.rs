use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use wrapp_aop::{Advice, AopError, AroundExt, AroundProxyPostProcessor, Interceptor, JoinPoint};
use wrapp_config::PropertySource;
use wrapp_context::{start, ComponentDescriptor, DynError, InitError, Instance, TypeInfo};

trait Greeter: Send + Sync {
    fn greet(&self, name: &str) -> String;
}

#[derive(Default)]
struct English {
    punctuation: Mutex<String>,
}
impl Greeter for English {
    fn greet(&self, name: &str) -> String {
        format!("hello {name}{}", self.punctuation.lock())
    }
}

struct GreeterProxy {
    target: Arc<English>,
    advice: Advice,
}
impl Greeter for GreeterProxy {
    fn greet(&self, name: &str) -> String {
        self.advice.around("greet", || self.target.greet(name))
    }
}

#[derive(Default)]
struct CallLog {
    calls: Mutex<Vec<String>>,
}
impl Interceptor for CallLog {
    fn before(&self, point: &JoinPoint<'_>) {
        self.calls.lock().push(format!("{}::{}", point.component, point.method));
    }
}

fn processor() -> ComponentDescriptor {
    let processor = AroundProxyPostProcessor::new().weave(|target: Arc<English>, advice| {
        Instance::builder(Arc::new(GreeterProxy { target, advice }))
            .implements::<dyn Greeter>(|proxy| proxy)
            .build()
    });
    ComponentDescriptor::instance("aroundProcessor", processor)
        .post_processor()
        .build()
}

fn english() -> wrapp_context::DescriptorBuilder<English> {
    ComponentDescriptor::instance("english", English::default())
        .declare_as::<dyn Greeter>(|english| english)
        .inject_value::<String>("punctuation", "${greeting.punctuation:!}", |english, value| {
            *english.punctuation.lock() = value;
        })
}

#[test]
fn annotated_components_are_proxied() {
    let context = start(
        [
            processor(),
            english().around("callLog").build(),
            ComponentDescriptor::instance("callLog", CallLog::default())
                .implements::<dyn Interceptor>(|log| log)
                .build(),
        ],
        PropertySource::default(),
    )
    .unwrap();

    let greeter = context.get::<dyn Greeter>().unwrap();
    assert_eq!(greeter.greet("world"), "hello world!");
    assert_eq!(greeter.greet("rust"), "hello rust!");

    let log = context.get::<CallLog>().unwrap();
    assert_eq!(*log.calls.lock(), vec!["english::greet", "english::greet"]);
    assert_eq!(
        context.get_by_name("english").unwrap().info(),
        TypeInfo::of::<GreeterProxy>()
    );
}

#[test]
fn components_without_annotation_are_left_alone() {
    let context = start(
        [processor(), english().build()],
        PropertySource::default(),
    )
    .unwrap();

    assert_eq!(
        context.get_by_name("english").unwrap().info(),
        TypeInfo::of::<English>()
    );
}

fn aop_error(error: InitError) -> AopError {
    match error {
        InitError::ProcessorFailed { component, error } => {
            assert_eq!(component, "english");
            error
                .downcast_ref::<AopError>()
                .cloned()
                .unwrap_or_else(|| panic!("unexpected processor error: {error}"))
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_handler_aborts_start_up() {
    let result = start(
        [processor(), english().around("callLog").build()],
        PropertySource::default(),
    );

    assert_eq!(
        aop_error(result.unwrap_err()),
        AopError::HandlerNotFound {
            component: "english".to_string(),
            handler: "callLog".to_string()
        }
    );
}

#[test]
fn handler_must_be_an_interceptor() {
    let result = start(
        [
            processor(),
            english().around("callLog").build(),
            ComponentDescriptor::instance("callLog", CallLog::default()).build(),
        ],
        PropertySource::default(),
    );

    assert_eq!(
        aop_error(result.unwrap_err()),
        AopError::HandlerNotInterceptor {
            component: "english".to_string(),
            handler: "callLog".to_string()
        }
    );
}

#[test]
fn types_without_weaver_cannot_be_proxied() {
    struct Plain;

    let result = start(
        [
            processor(),
            ComponentDescriptor::constructor("english", [], |_| Ok::<_, DynError>(Plain))
                .around("callLog")
                .build(),
            ComponentDescriptor::instance("callLog", CallLog::default())
                .implements::<dyn Interceptor>(|log| log)
                .build(),
        ],
        PropertySource::default(),
    );

    assert_eq!(
        aop_error(result.unwrap_err()),
        AopError::NoWeaver {
            component: "english".to_string(),
            type_name: std::any::type_name::<Plain>()
        }
    );
}
