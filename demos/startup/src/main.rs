use std::{sync::Arc, time::Duration};

use anyhow::Context;
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;
use wrapp_aop::{Advice, AroundExt, AroundProxyPostProcessor, Interceptor, JoinPoint};
use wrapp_config::PropertySource;
use wrapp_context::{Args, Autowired, ComponentDescriptor, ContextBuilder, DynError, Instance, Param};

const CONFIG: &str = include_str!("../config.toml");

/// Provides the order store through a factory method
struct StoreConfig;
impl StoreConfig {
    fn order_store(&self, url: String, capacity: usize, flush_every: Duration) -> OrderStore {
        OrderStore {
            url,
            orders: Mutex::new(Vec::with_capacity(capacity)),
            flush_every,
        }
    }
}

struct OrderStore {
    url: String,
    orders: Mutex<Vec<String>>,
    flush_every: Duration,
}

trait Orders: Send + Sync {
    fn place(&self, item: &str) -> usize;
}

struct OrderService {
    store: Arc<OrderStore>,
}
impl Orders for OrderService {
    fn place(&self, item: &str) -> usize {
        let mut orders = self.store.orders.lock();
        orders.push(item.to_owned());
        orders.len()
    }
}

struct OrderServiceProxy {
    target: Arc<OrderService>,
    advice: Advice,
}
impl Orders for OrderServiceProxy {
    fn place(&self, item: &str) -> usize {
        self.advice.around("place", || self.target.place(item))
    }
}

struct Tracing;
impl Interceptor for Tracing {
    fn before(&self, point: &JoinPoint<'_>) {
        tracing::info!("-> {}::{}", point.component, point.method);
    }

    fn after(&self, point: &JoinPoint<'_>) {
        tracing::info!("<- {}::{}", point.component, point.method);
    }
}

fn descriptors() -> Vec<ComponentDescriptor> {
    let around = AroundProxyPostProcessor::new().weave(|target: Arc<OrderService>, advice| {
        Instance::builder(Arc::new(OrderServiceProxy { target, advice }))
            .implements::<dyn Orders>(|proxy| proxy)
            .build()
    });

    vec![
        ComponentDescriptor::instance("aroundProcessor", around)
            .post_processor()
            .build(),
        ComponentDescriptor::instance("tracing", Tracing)
            .implements::<dyn Interceptor>(|tracing| tracing)
            .build(),
        ComponentDescriptor::instance("storeConfig", StoreConfig)
            .configuration()
            .build(),
        ComponentDescriptor::factory(
            "orderStore",
            "storeConfig",
            "order_store",
            [
                Param::value::<String>("${store.url}"),
                Param::value::<usize>("${store.capacity:8}"),
                Param::value::<Duration>("${store.flush_every:1s}"),
            ],
            |config: &StoreConfig, args: &Args| {
                Ok::<_, DynError>(config.order_store(args.value(0)?, args.value(1)?, args.value(2)?))
            },
        )
        .order(0)
        .init_method("connect")
        .destroy_method("flush")
        .build(),
        ComponentDescriptor::constructor(
            "orderService",
            [Param::autowired::<OrderStore>(Autowired::required())],
            |args: &Args| Ok::<_, DynError>(OrderService { store: args.component(0)? }),
        )
        .declare_as::<dyn Orders>(|service| service)
        .around("tracing")
        .build(),
    ]
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    let table: toml::Table = toml::from_str(CONFIG).context("Failed to parse the demo configuration")?;
    let properties = PropertySource::builder().with_table(&table).with_env().build();
    let audience: String = properties.get_required("${greeting.audience}")?;

    let context = ContextBuilder::new()
        .properties(properties)
        .method("connect", |store: &OrderStore| {
            tracing::info!("Connected to {} (flushing every {:?})", store.url, store.flush_every);
            Ok::<_, DynError>(())
        })
        .method("flush", |store: &OrderStore| {
            tracing::info!("Flushed {} orders to {}", store.orders.lock().len(), store.url);
            Ok::<_, DynError>(())
        })
        .register_all(descriptors())
        .build()
        .context("Failed to start the context")?;

    println!("{context:#?}");

    let orders = context.get::<dyn Orders>()?;
    for item in ["coffee", "bagel"] {
        let count = orders.place(item);
        tracing::info!("Placed {item} for {audience}, {count} orders so far");
    }

    context.close()?;
    Ok(())
}
