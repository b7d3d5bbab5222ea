use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use pretty_assertions::assert_eq;
use wrapp_config::PropertySource;
use wrapp_context::{
    start, Args, ComponentDescriptor, ContextHandle, DynError, InitError, Instance, Param,
    PostProcessor, RequireError, TypeInfo,
};

trait Greeter: Send + Sync {
    fn greet(&self) -> String;
}

#[derive(Default, Clone)]
struct Flags {
    initialized: Arc<Mutex<bool>>,
    destroyed: Arc<Mutex<bool>>,
}

#[derive(Default)]
struct Polite {
    name: Mutex<Option<String>>,
    flags: Flags,
}
impl Greeter for Polite {
    fn greet(&self) -> String {
        format!("hello {}", self.name.lock().unwrap().as_deref().unwrap_or("nobody"))
    }
}

struct Shouting {
    inner: Arc<dyn Greeter>,
}
impl Greeter for Shouting {
    fn greet(&self) -> String {
        self.inner.greet().to_uppercase()
    }
}

/// Wraps every greeter into a [Shouting] proxy
#[derive(Default)]
struct ShoutingProcessor {
    originals: Mutex<HashMap<String, Instance>>,
}
impl PostProcessor for ShoutingProcessor {
    fn before_initialization(
        &self,
        instance: Instance,
        name: &str,
        _: &mut ContextHandle<'_>,
    ) -> Result<Instance, InitError> {
        let Some(inner) = instance.get::<dyn Greeter>() else {
            return Ok(instance);
        };

        self.originals.lock().unwrap().insert(name.to_owned(), instance);
        Ok(Instance::builder(Arc::new(Shouting { inner }))
            .implements::<dyn Greeter>(|shouting| shouting)
            .build())
    }

    fn restore_original(&self, instance: Instance, name: &str) -> Instance {
        self.originals
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or(instance)
    }
}

fn polite(flags: Flags) -> ComponentDescriptor {
    ComponentDescriptor::constructor("polite", [], move |_| {
        Ok::<_, DynError>(Polite {
            name: Mutex::new(None),
            flags,
        })
    })
    .declare_as::<dyn Greeter>(|polite| polite)
    .inject_value::<String>("name", "${user:world}", |polite, name| {
        *polite.name.lock().unwrap() = Some(name);
    })
    .init(|polite: &Polite| {
        *polite.flags.initialized.lock().unwrap() = true;
        Ok::<_, DynError>(())
    })
    .destroy(|polite: &Polite| {
        *polite.flags.destroyed.lock().unwrap() = true;
        Ok::<_, DynError>(())
    })
    .build()
}

fn shouting() -> ComponentDescriptor {
    ComponentDescriptor::instance("shouting", ShoutingProcessor::default())
        .post_processor()
        .build()
}

#[test]
fn proxies_are_served_while_originals_are_injected() {
    let flags = Flags::default();
    let context = start(
        [polite(flags.clone()), shouting()],
        PropertySource::default(),
    )
    .unwrap();

    let greeter = context.get::<dyn Greeter>().unwrap();
    assert_eq!(greeter.greet(), "HELLO WORLD");
    assert_eq!(
        context.get_by_name("polite").unwrap().info(),
        TypeInfo::of::<Shouting>()
    );

    // The stored instance is the proxy, so the concrete type is no longer retrievable
    assert!(matches!(
        context.get::<Polite>().err(),
        Some(RequireError::DowncastFailed { name, .. }) if name == "polite"
    ));

    // Hooks are typed over the concrete component and run against the original
    assert!(*flags.initialized.lock().unwrap());
    context.close().unwrap();
    assert!(*flags.destroyed.lock().unwrap());
}

#[test]
fn processors_apply_in_creation_order_and_restore_in_reverse() {
    let events = Arc::new(Mutex::new(Vec::<String>::new()));

    struct Tagging {
        tag: &'static str,
        events: Arc<Mutex<Vec<String>>>,
    }
    impl PostProcessor for Tagging {
        fn before_initialization(
            &self,
            instance: Instance,
            name: &str,
            _: &mut ContextHandle<'_>,
        ) -> Result<Instance, InitError> {
            if name == "target" {
                self.events.lock().unwrap().push(format!("before {}", self.tag));
            }
            Ok(instance)
        }

        fn restore_original(&self, instance: Instance, name: &str) -> Instance {
            if name == "target" {
                self.events.lock().unwrap().push(format!("restore {}", self.tag));
            }
            instance
        }
    }

    start(
        [
            ComponentDescriptor::instance("target", 7_u32).build(),
            ComponentDescriptor::instance(
                "second",
                Tagging {
                    tag: "second",
                    events: events.clone(),
                },
            )
            .post_processor()
            .order(2)
            .build(),
            ComponentDescriptor::instance(
                "first",
                Tagging {
                    tag: "first",
                    events: events.clone(),
                },
            )
            .post_processor()
            .order(1)
            .build(),
        ],
        PropertySource::default(),
    )
    .unwrap();

    let events = events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "before first",
            "before second",
            // injection
            "restore second",
            "restore first",
            // init
            "restore second",
            "restore first",
        ]
    );
}

#[test]
fn substitutes_must_satisfy_the_declared_type() {
    struct Replacing;
    impl PostProcessor for Replacing {
        fn before_initialization(
            &self,
            instance: Instance,
            name: &str,
            _: &mut ContextHandle<'_>,
        ) -> Result<Instance, InitError> {
            match name {
                "polite" => Ok(Instance::new(42_u32)),
                _ => Ok(instance),
            }
        }
    }

    let result = start(
        [
            polite(Flags::default()),
            ComponentDescriptor::instance("replacing", Replacing)
                .post_processor()
                .build(),
        ],
        PropertySource::default(),
    );

    match result.unwrap_err() {
        InitError::IncompatibleSubstitute {
            component,
            declared,
            substitute,
        } => {
            assert_eq!(component, "polite");
            assert_eq!(declared, std::any::type_name::<dyn Greeter>());
            assert_eq!(substitute, "u32");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn processors_can_require_collaborators_through_the_handle() {
    struct Prefix(String);
    struct Prefixed {
        prefix: Arc<Prefix>,
        inner: Arc<dyn Greeter>,
    }
    impl Greeter for Prefixed {
        fn greet(&self) -> String {
            format!("{} {}", self.prefix.0, self.inner.greet())
        }
    }

    struct Prefixing;
    impl PostProcessor for Prefixing {
        fn before_initialization(
            &self,
            instance: Instance,
            name: &str,
            context: &mut ContextHandle<'_>,
        ) -> Result<Instance, InitError> {
            if context.descriptor(name).and_then(|d| d.annotation("prefix")).is_none() {
                return Ok(instance);
            }
            let Some(inner) = instance.get::<dyn Greeter>() else {
                return Ok(instance);
            };

            let prefix = context.require_as::<Prefix>("prefix")?;
            Ok(Instance::builder(Arc::new(Prefixed { prefix, inner }))
                .implements::<dyn Greeter>(|prefixed| prefixed)
                .build())
        }
    }

    let context = start(
        [
            ComponentDescriptor::instance("greeter", Polite::default())
                .declare_as::<dyn Greeter>(|polite| polite)
                .annotate("prefix", "prefix")
                .build(),
            ComponentDescriptor::instance("prefixing", Prefixing)
                .post_processor()
                .build(),
            ComponentDescriptor::instance("prefix", Prefix("well,".to_string())).build(),
        ],
        PropertySource::default(),
    )
    .unwrap();

    assert_eq!(
        context.get::<dyn Greeter>().unwrap().greet(),
        "well, hello nobody"
    );
}

#[test]
fn substituted_components_are_not_served_as_their_concrete_type() {
    let context = start([polite(Flags::default()), shouting()], PropertySource::default()).unwrap();

    assert_eq!(context.get_all::<dyn Greeter>().unwrap().len(), 1);
    assert_eq!(
        context.get_all::<Polite>().err(),
        Some(RequireError::DowncastFailed {
            name: "polite".to_string(),
            required_type: std::any::type_name::<Polite>(),
            actual_type: std::any::type_name::<Shouting>(),
        })
    );
}

#[test]
fn references_to_a_substituted_concrete_type_fail() {
    struct User {
        _polite: Arc<Polite>,
    }

    let result = start(
        [
            polite(Flags::default()),
            shouting(),
            ComponentDescriptor::constructor("user", [Param::component::<Polite>()], |args: &Args| {
                Ok::<_, DynError>(User {
                    _polite: args.component(0)?,
                })
            })
            .build(),
        ],
        PropertySource::default(),
    );

    match result.unwrap_err() {
        InitError::Require(RequireError::DowncastFailed {
            name,
            required_type,
            actual_type,
        }) => {
            assert_eq!(name, "polite");
            assert_eq!(required_type, std::any::type_name::<Polite>());
            assert_eq!(actual_type, std::any::type_name::<Shouting>());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn failed_creation_can_be_retried() {
    struct Flaky;

    struct Warming {
        errors: Arc<Mutex<Vec<String>>>,
    }
    impl PostProcessor for Warming {
        fn before_initialization(
            &self,
            instance: Instance,
            name: &str,
            context: &mut ContextHandle<'_>,
        ) -> Result<Instance, InitError> {
            if name == "alpha" {
                if let Err(error) = context.require("flaky") {
                    self.errors.lock().unwrap().push(error.to_string());
                }
            }
            Ok(instance)
        }
    }

    let errors = Arc::new(Mutex::new(Vec::new()));
    let result = start(
        [
            ComponentDescriptor::instance("alpha", 1_u8).build(),
            ComponentDescriptor::constructor("flaky", [Param::value::<String>("${flaky.url}")], |_| {
                Ok::<_, DynError>(Flaky)
            })
            .build(),
            ComponentDescriptor::instance(
                "warming",
                Warming {
                    errors: errors.clone(),
                },
            )
            .post_processor()
            .build(),
        ],
        PropertySource::default(),
    );

    // The second attempt reports the missing property again instead of a cycle
    assert!(matches!(
        result.unwrap_err(),
        InitError::Property { component, .. } if component == "flaky"
    ));
    assert_eq!(errors.lock().unwrap().len(), 1);
}
