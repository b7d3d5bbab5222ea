use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    fmt::Display,
    path::PathBuf,
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

use crate::errors::RegisterConverterError;

/// A converted, type erased value
pub type AnyValue = Box<dyn Any + Send + Sync>;

type ConvertFn = dyn Fn(&str) -> Result<AnyValue, String> + Send + Sync;

#[derive(Clone)]
struct Converter {
    target: &'static str,
    convert: Arc<ConvertFn>,
}

/// String to typed value converters, keyed by the target type
#[derive(Clone)]
pub struct Converters {
    by_type: HashMap<TypeId, Converter>,
}

impl Default for Converters {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for Converters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut targets: Vec<_> = self.by_type.values().map(|c| c.target).collect();
        targets.sort_unstable();
        f.debug_tuple("Converters").field(&targets).finish()
    }
}

impl Converters {
    /// A registry without any converter
    pub fn empty() -> Self {
        Self {
            by_type: HashMap::new(),
        }
    }

    /// A registry with converters for strings, booleans, numbers, durations, paths and
    /// chrono date/time values
    pub fn with_defaults() -> Self {
        let mut converters = Self::empty();
        converters.insert::<String, _>(|s| Ok(s.to_owned()));
        converters.insert::<PathBuf, _>(|s| Ok(PathBuf::from(s)));
        converters.insert::<bool, _>(parse_bool);
        converters.insert::<char, _>(|s| parse_trimmed::<char>(s));

        converters.insert::<i8, _>(parse_trimmed::<i8>);
        converters.insert::<i16, _>(parse_trimmed::<i16>);
        converters.insert::<i32, _>(parse_trimmed::<i32>);
        converters.insert::<i64, _>(parse_trimmed::<i64>);
        converters.insert::<i128, _>(parse_trimmed::<i128>);
        converters.insert::<isize, _>(parse_trimmed::<isize>);
        converters.insert::<u8, _>(parse_trimmed::<u8>);
        converters.insert::<u16, _>(parse_trimmed::<u16>);
        converters.insert::<u32, _>(parse_trimmed::<u32>);
        converters.insert::<u64, _>(parse_trimmed::<u64>);
        converters.insert::<u128, _>(parse_trimmed::<u128>);
        converters.insert::<usize, _>(parse_trimmed::<usize>);
        converters.insert::<f32, _>(parse_trimmed::<f32>);
        converters.insert::<f64, _>(parse_trimmed::<f64>);

        converters.insert::<Duration, _>(|s| {
            humantime::parse_duration(s.trim()).map_err(|e| e.to_string())
        });
        converters.insert::<NaiveDate, _>(parse_trimmed::<NaiveDate>);
        converters.insert::<NaiveTime, _>(parse_trimmed::<NaiveTime>);
        converters.insert::<NaiveDateTime, _>(parse_trimmed::<NaiveDateTime>);
        converters.insert::<DateTime<FixedOffset>, _>(|s| {
            DateTime::parse_from_rfc3339(s.trim()).map_err(|e| e.to_string())
        });

        converters
    }

    /// Add a converter for `T`
    ///
    /// Fails if a converter for `T` is already registered.
    pub fn add<T, E>(
        &mut self,
        convert: impl Fn(&str) -> Result<T, E> + Send + Sync + 'static,
    ) -> Result<&mut Self, RegisterConverterError>
    where
        T: Send + Sync + 'static,
        E: Display,
    {
        if self.supports(TypeId::of::<T>()) {
            return Err(RegisterConverterError::AlreadyRegistered(type_name::<T>()));
        }

        self.insert::<T, _>(move |s| convert(s).map_err(|e| e.to_string()));
        Ok(self)
    }

    /// Returns true if values can be converted to the type with the given id
    pub fn supports(&self, target: TypeId) -> bool {
        self.by_type.contains_key(&target)
    }

    /// Converts `value` into the type with id `target`
    ///
    /// Returns `None` if no converter is registered, otherwise the converter's outcome.
    pub fn convert_any(&self, target: TypeId, value: &str) -> Option<Result<AnyValue, String>> {
        self.by_type
            .get(&target)
            .map(|converter| (converter.convert)(value))
    }

    fn insert<T, F>(&mut self, convert: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&str) -> Result<T, String> + Send + Sync + 'static,
    {
        let converter = Converter {
            target: type_name::<T>(),
            convert: Arc::new(move |s| convert(s).map(|v| Box::new(v) as AnyValue)),
        };
        self.by_type.insert(TypeId::of::<T>(), converter);
    }
}

fn parse_trimmed<T>(s: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: Display,
{
    s.trim().parse::<T>().map_err(|e| e.to_string())
}

fn parse_bool(s: &str) -> Result<bool, String> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if s.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(format!("expected 'true' or 'false', got '{s}'"))
    }
}
