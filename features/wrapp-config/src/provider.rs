use std::{
    any::{type_name, TypeId},
    collections::HashMap,
    fmt::Display,
};

use crate::{
    convert::{AnyValue, Converters},
    errors::{PropertyError, RegisterConverterError},
    placeholder::PropertyExpr,
};

/// Immutable key/value mapping with placeholder resolution and typed access.
///
/// Keys may be looked up directly (`app.name`) or through a placeholder expression
/// (`${app.name}`, `${app.name:default}`). Stored values are themselves resolved when they
/// use the placeholder syntax, so `url = "${host:localhost}"` yields the value of `host`.
#[derive(Debug, Clone, Default)]
pub struct PropertySource {
    properties: HashMap<String, String>,
    converters: Converters,
}

impl PropertySource {
    /// Creates a property source from the given pairs with the default converters
    pub fn new<K, V>(properties: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::builder().with_properties(properties).build()
    }

    pub fn builder() -> PropertySourceBuilder {
        PropertySourceBuilder::default()
    }

    /// Returns true if `key` is present in the mapping, without resolving anything
    pub fn contains(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn converters(&self) -> &Converters {
        &self.converters
    }

    /// Resolves `key` to its string value
    ///
    /// `key` may be a plain key or a `${key[:default]}` expression. Defaults are resolved
    /// recursively, so `${a:${b:lit}}` falls back to `b` and then to `lit`.
    pub fn get(&self, key: &str) -> Result<Option<String>, PropertyError> {
        let mut chain = Vec::new();
        let value = self.resolve(key, &mut chain)?;
        tracing::trace!("Resolved property '{key}' to {value:?}");
        Ok(value)
    }

    /// Resolves `key` and converts it to `T`
    pub fn get_as<T: Send + Sync + 'static>(&self, key: &str) -> Result<Option<T>, PropertyError> {
        self.get_any(key, TypeId::of::<T>(), type_name::<T>())?
            .map(|value| downcast_converted::<T>(value))
            .transpose()
    }

    /// Resolves `key` and converts it to `T`, returning `default` if the key is absent
    pub fn get_or<T: Send + Sync + 'static>(&self, key: &str, default: T) -> Result<T, PropertyError> {
        Ok(self.get_as(key)?.unwrap_or(default))
    }

    /// Resolves `key` and converts it to `T`, failing if the key is absent
    pub fn get_required<T: Send + Sync + 'static>(&self, key: &str) -> Result<T, PropertyError> {
        self.get_as(key)?
            .ok_or_else(|| PropertyError::MissingProperty { key: key.to_owned() })
    }

    /// Type erased variant of [PropertySource::get_as], the target is identified by its id
    pub fn get_any(
        &self,
        key: &str,
        target: TypeId,
        target_name: &'static str,
    ) -> Result<Option<AnyValue>, PropertyError> {
        // Fail on unsupported targets even if the key is absent
        if !self.converters.supports(target) {
            return Err(PropertyError::UnsupportedType(target_name));
        }

        let Some(value) = self.get(key)? else {
            return Ok(None);
        };

        match self.converters.convert_any(target, &value) {
            Some(Ok(converted)) => Ok(Some(converted)),
            Some(Err(reason)) => Err(PropertyError::ConversionFailed {
                key: key.to_owned(),
                value,
                target: target_name,
                reason,
            }),
            None => Err(PropertyError::UnsupportedType(target_name)),
        }
    }

    /// Type erased variant of [PropertySource::get_required]
    pub fn get_required_any(
        &self,
        key: &str,
        target: TypeId,
        target_name: &'static str,
    ) -> Result<AnyValue, PropertyError> {
        self.get_any(key, target, target_name)?
            .ok_or_else(|| PropertyError::MissingProperty { key: key.to_owned() })
    }

    fn resolve(&self, key: &str, chain: &mut Vec<String>) -> Result<Option<String>, PropertyError> {
        if let Some(expr) = PropertyExpr::parse(key) {
            return match (self.resolve(expr.key, chain)?, expr.default) {
                (Some(value), _) => Ok(Some(value)),
                (None, Some(default)) => self.resolve_value(default, chain),
                (None, None) => Ok(None),
            };
        }

        let Some(raw) = self.properties.get(key) else {
            return Ok(None);
        };

        if chain.iter().any(|resolving| resolving == key) {
            return Err(PropertyError::CircularPlaceholder {
                key: key.to_owned(),
                chain: chain.clone(),
            });
        }

        chain.push(key.to_owned());
        let resolved = self.resolve_value(raw, chain);
        chain.pop();
        resolved
    }

    /// Values and defaults are literals unless they use the placeholder syntax
    fn resolve_value(
        &self,
        value: &str,
        chain: &mut Vec<String>,
    ) -> Result<Option<String>, PropertyError> {
        match PropertyExpr::parse(value) {
            Some(_) => self.resolve(value, chain),
            None => Ok(Some(value.to_owned())),
        }
    }
}

fn downcast_converted<T: 'static>(value: AnyValue) -> Result<T, PropertyError> {
    value
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| PropertyError::UnsupportedType(type_name::<T>()))
}

/// Collects properties from several sources, later sources override earlier ones
#[derive(Debug, Default)]
pub struct PropertySourceBuilder {
    properties: HashMap<String, String>,
    converters: Converters,
}

impl PropertySourceBuilder {
    /// Adds all environment variables of the current process
    pub fn with_env(self) -> Self {
        self.with_properties(std::env::vars())
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_properties<K, V>(mut self, properties: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.properties.extend(
            properties
                .into_iter()
                .map(|(key, value)| (key.into(), value.into())),
        );
        self
    }

    /// Adds an already parsed TOML table
    ///
    /// Nested tables are flattened to dotted keys and array items are addressed as
    /// `key[index]`, e.g. `[server] ports = [80, 443]` yields `server.ports[1] = "443"`.
    pub fn with_table(mut self, table: &toml::Table) -> Self {
        for (key, value) in table {
            flatten_into(&mut self.properties, key.clone(), value);
        }
        self
    }

    /// Registers an additional converter for `T`
    pub fn with_converter<T, E>(
        mut self,
        convert: impl Fn(&str) -> Result<T, E> + Send + Sync + 'static,
    ) -> Result<Self, RegisterConverterError>
    where
        T: Send + Sync + 'static,
        E: Display,
    {
        self.converters.add(convert)?;
        Ok(self)
    }

    pub fn build(self) -> PropertySource {
        tracing::debug!("Built property source with {} properties", self.properties.len());
        PropertySource {
            properties: self.properties,
            converters: self.converters,
        }
    }
}

fn flatten_into(properties: &mut HashMap<String, String>, key: String, value: &toml::Value) {
    match value {
        toml::Value::Table(table) => {
            for (child, value) in table {
                flatten_into(properties, format!("{key}.{child}"), value);
            }
        }
        toml::Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                flatten_into(properties, format!("{key}[{index}]"), value);
            }
        }
        toml::Value::String(value) => {
            properties.insert(key, value.clone());
        }
        scalar => {
            properties.insert(key, scalar.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;

    fn source() -> PropertySource {
        PropertySource::new([
            ("app.name", "summer"),
            ("app.title", "${app.name}"),
            ("server.port", "8080"),
            ("server.url", "${server.host:localhost}"),
            ("jdbc.timeout", "30s"),
            ("flag", "true"),
        ])
    }

    #[test]
    fn plain_key_lookup() {
        let props = source();
        assert_eq!(props.get("app.name").unwrap(), Some("summer".to_string()));
        assert_eq!(props.get("app.missing").unwrap(), None);
    }

    #[test]
    fn placeholder_lookup_with_default() {
        let props = source();
        assert_eq!(props.get("${app.name}").unwrap(), Some("summer".to_string()));
        assert_eq!(
            props.get("${app.version:1.0}").unwrap(),
            Some("1.0".to_string())
        );
        assert_eq!(props.get("${app.version}").unwrap(), None);
    }

    #[test]
    fn stored_values_are_resolved() {
        let props = source();
        assert_eq!(props.get("app.title").unwrap(), Some("summer".to_string()));
        assert_eq!(
            props.get("${server.url}").unwrap(),
            Some("localhost".to_string())
        );
    }

    #[test]
    fn nested_defaults() {
        let props = PropertySource::new([("b", "from-b")]);
        assert_eq!(props.get("${a:${b:lit}}").unwrap(), Some("from-b".to_string()));
        assert_eq!(props.get("${a:${c:lit}}").unwrap(), Some("lit".to_string()));

        let props = PropertySource::new([("a", "x")]);
        assert_eq!(props.get("${a:${b:lit}}").unwrap(), Some("x".to_string()));
    }

    #[test]
    fn typed_access() {
        let props = source();
        assert_eq!(props.get_required::<u16>("${server.port}").unwrap(), 8080);
        assert_eq!(
            props.get_required::<Duration>("jdbc.timeout").unwrap(),
            Duration::from_secs(30)
        );
        assert!(props.get_required::<bool>("flag").unwrap());
        assert_eq!(props.get_or::<u32>("${pool.size}", 4).unwrap(), 4);
        assert_eq!(props.get_as::<u32>("${pool.size}").unwrap(), None);
    }

    #[test]
    fn missing_required_property() {
        let err = source().get_required::<u64>("${timeout}").unwrap_err();
        assert_eq!(
            err,
            PropertyError::MissingProperty {
                key: "${timeout}".to_string()
            }
        );
    }

    #[test]
    fn unsupported_target_type() {
        struct Unknown;
        let err = source().get_as::<Unknown>("app.name").err().unwrap();
        assert_eq!(err, PropertyError::UnsupportedType(type_name::<Unknown>()));
    }

    #[test]
    fn conversion_failure_names_the_key() {
        let err = source().get_required::<u16>("app.name").unwrap_err();
        assert!(matches!(
            err,
            PropertyError::ConversionFailed { ref key, ref value, .. }
                if key == "app.name" && value == "summer"
        ));
    }

    #[test]
    fn self_reference_is_detected() {
        let props = PropertySource::new([("a", "${b}"), ("b", "${a}")]);
        let err = props.get("a").unwrap_err();
        assert!(matches!(err, PropertyError::CircularPlaceholder { ref key, .. } if key == "a"));
    }

    #[test]
    fn later_sources_override_earlier_ones() {
        let props = PropertySource::builder()
            .with_property("server.port", "80")
            .with_properties([("server.port", "8080")])
            .build();
        assert_eq!(props.get_required::<u16>("server.port").unwrap(), 8080);
    }

    #[test]
    fn nested_tables_are_flattened() {
        let table: toml::Table = toml::from_str(
            r#"
            [server]
            host = "example.com"
            port = 8443
            tls = true
            ports = [80, 443]

            [server.limits]
            ratio = 0.5
            "#,
        )
        .unwrap();

        let props = PropertySource::builder().with_table(&table).build();
        assert_eq!(
            props.get("server.host").unwrap(),
            Some("example.com".to_string())
        );
        assert_eq!(props.get_required::<u16>("server.port").unwrap(), 8443);
        assert!(props.get_required::<bool>("server.tls").unwrap());
        assert_eq!(props.get_required::<u16>("server.ports[1]").unwrap(), 443);
        assert_eq!(props.get_required::<f64>("server.limits.ratio").unwrap(), 0.5);
    }

    #[test]
    fn custom_converter_through_builder() {
        #[derive(Debug, PartialEq)]
        struct Mode(String);

        let props = PropertySource::builder()
            .with_property("mode", "fast")
            .with_converter::<Mode, std::convert::Infallible>(|s| Ok(Mode(s.to_uppercase())))
            .unwrap()
            .build();

        assert_eq!(
            props.get_required::<Mode>("mode").unwrap(),
            Mode("FAST".to_string())
        );
    }
}
