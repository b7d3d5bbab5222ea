use std::{fmt::Debug, sync::Arc};

use wrapp_config::PropertySource;

use crate::{
    descriptor::ComponentDescriptor,
    errors::{InitError, RequireError},
    initiator::ContextInitiator,
    types::Instance,
};

/// Stage allowed to substitute components right after their creation
///
/// Processors are components themselves. They are created before all other regular
/// components and applied in their creation order.
pub trait PostProcessor: Send + Sync {
    /// Called after `instance` was created and stored under `name`
    ///
    /// The returned instance replaces the stored one and must satisfy the declared type.
    fn before_initialization(
        &self,
        instance: Instance,
        name: &str,
        context: &mut ContextHandle<'_>,
    ) -> Result<Instance, InitError>;

    /// Undoes a substitution made by [PostProcessor::before_initialization]
    ///
    /// Injection, init hooks and destroy hooks target the restored instance.
    fn restore_original(&self, instance: Instance, _name: &str) -> Instance {
        instance
    }
}

/// Processors in the order they are applied
#[derive(Clone, Default)]
pub(crate) struct Pipeline {
    processors: Vec<(String, Arc<dyn PostProcessor>)>,
}

impl Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.processors.iter().map(|(name, _)| name))
            .finish()
    }
}

impl Pipeline {
    pub(crate) fn push(&mut self, name: String, processor: Arc<dyn PostProcessor>) {
        self.processors.push((name, processor));
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<dyn PostProcessor>> + '_ {
        self.processors.iter().map(|(_, processor)| processor)
    }

    /// Peels off substitutions, last applied processor first
    pub(crate) fn restore(&self, instance: Instance, name: &str) -> Instance {
        self.processors
            .iter()
            .rev()
            .fold(instance, |instance, (_, processor)| {
                processor.restore_original(instance, name)
            })
    }
}

/// Access to the container while it is being started
///
/// Handed to post-processors so they can inspect descriptors and obtain collaborators,
/// requiring a component which was not created yet creates it on the spot.
pub struct ContextHandle<'a> {
    initiator: &'a mut ContextInitiator,
}

impl<'a> ContextHandle<'a> {
    pub(crate) fn new(initiator: &'a mut ContextInitiator) -> Self {
        ContextHandle { initiator }
    }

    pub fn descriptor(&self, name: &str) -> Option<&ComponentDescriptor> {
        self.initiator.registry().find(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.initiator.registry().contains(name)
    }

    pub fn properties(&self) -> &PropertySource {
        self.initiator.properties()
    }

    /// Returns the component named `name`, creating it first if necessary
    pub fn require(&mut self, name: &str) -> Result<Instance, InitError> {
        let index = self
            .initiator
            .registry()
            .index_of(name)
            .ok_or_else(|| RequireError::NoSuchComponent(format!("name '{name}'")))?;
        self.initiator.create_early(index)
    }

    /// Like [ContextHandle::require] and retrieves the component as `T`
    pub fn require_as<T: ?Sized + 'static>(&mut self, name: &str) -> Result<Arc<T>, InitError> {
        let instance = self.require(name)?;
        instance.get::<T>().ok_or_else(|| {
            RequireError::DowncastFailed {
                name: name.to_owned(),
                required_type: std::any::type_name::<T>(),
                actual_type: instance.info().type_name,
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;

    struct Recording {
        label: &'static str,
        restored: Arc<Mutex<Vec<&'static str>>>,
    }
    impl PostProcessor for Recording {
        fn before_initialization(
            &self,
            instance: Instance,
            _: &str,
            _: &mut ContextHandle<'_>,
        ) -> Result<Instance, InitError> {
            Ok(instance)
        }

        fn restore_original(&self, instance: Instance, _: &str) -> Instance {
            self.restored.lock().unwrap().push(self.label);
            instance
        }
    }

    #[test]
    fn restores_in_reverse_order() {
        let restored = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::default();
        for label in ["first", "second", "third"] {
            pipeline.push(
                label.to_string(),
                Arc::new(Recording {
                    label,
                    restored: restored.clone(),
                }),
            );
        }

        let instance = Instance::new(42_u8);
        let result = pipeline.restore(instance.clone(), "answer");

        assert!(result.same(&instance));
        assert_eq!(*restored.lock().unwrap(), vec!["third", "second", "first"]);
    }
}
