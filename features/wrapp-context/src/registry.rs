use std::{any::TypeId, fmt::Debug};

use indexmap::IndexMap;

use crate::{
    descriptor::ComponentDescriptor,
    errors::RegistryError,
    types::{Instance, TypeInfo},
};

/// Lifecycle of a registered component
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ComponentState {
    Uncreated,
    /// Being created, requesting the component now means there is a cycle
    Creating,
    Created,
    Injected,
    Initialized,
}

pub(crate) struct RegistryEntry {
    pub(crate) descriptor: ComponentDescriptor,
    pub(crate) state: ComponentState,
    /// Set exactly once, holds the last substitution made by the post-processors
    pub(crate) instance: Option<Instance>,
}

/// Result of a type lookup expecting a single candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Candidate {
    None,
    Unique(usize),
    Ambiguous(Vec<String>),
}

/// All descriptors of a container, kept in registration order
#[derive(Default)]
pub struct DescriptorRegistry {
    entries: IndexMap<String, RegistryEntry>,
}

impl Debug for DescriptorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (name, entry) in &self.entries {
            map.entry(name, &entry.state);
        }
        map.finish()
    }
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a descriptor, returns false if its kind cannot be instantiated and it was skipped
    pub fn register(&mut self, descriptor: ComponentDescriptor) -> Result<bool, RegistryError> {
        if self.entries.contains_key(descriptor.name()) {
            return Err(RegistryError::DuplicateName(descriptor.name().to_owned()));
        }

        if !descriptor.kind().is_instantiable() {
            tracing::debug!(
                "Skipping component '{}' of kind {:?}",
                descriptor.name(),
                descriptor.kind()
            );
            return Ok(false);
        }

        tracing::trace!(
            "Registered component '{}' of type '{}'",
            descriptor.name(),
            descriptor.declared_type()
        );
        self.entries.insert(
            descriptor.name().to_owned(),
            RegistryEntry {
                descriptor,
                state: ComponentState::Uncreated,
                instance: None,
            },
        );
        Ok(true)
    }

    /// Checks that every factory descriptor refers to a registered owner
    pub fn validate(&self) -> Result<(), RegistryError> {
        for entry in self.entries.values() {
            if let Some(owner) = entry.descriptor.factory_owner() {
                if !self.entries.contains_key(owner) {
                    return Err(RegistryError::MissingFactoryOwner {
                        component: entry.descriptor.name().to_owned(),
                        owner: owner.to_owned(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ComponentDescriptor> + '_ {
        self.entries.values().map(|entry| &entry.descriptor)
    }

    pub fn find(&self, name: &str) -> Option<&ComponentDescriptor> {
        self.entries.get(name).map(|entry| &entry.descriptor)
    }

    pub fn state(&self, name: &str) -> Option<ComponentState> {
        self.entries.get(name).map(|entry| entry.state)
    }

    /// All descriptors satisfying `T`, ordered by their order and then by name
    pub fn find_by_type<T: ?Sized + 'static>(&self) -> Vec<&ComponentDescriptor> {
        self.indices_by_type(TypeId::of::<T>())
            .into_iter()
            .filter_map(|index| self.entry(index))
            .map(|entry| &entry.descriptor)
            .collect()
    }

    /// The single descriptor satisfying `T`, or the single primary one among several
    ///
    /// Returns None if nothing matches or the match is ambiguous.
    pub fn find_unique<T: ?Sized + 'static>(&self) -> Option<&ComponentDescriptor> {
        match self.unique_index(TypeId::of::<T>()) {
            Candidate::Unique(index) => self.entry(index).map(|entry| &entry.descriptor),
            Candidate::None | Candidate::Ambiguous(_) => None,
        }
    }

    /// Looks `name` up and checks that it satisfies `T`
    pub fn find_unique_named<T: ?Sized + 'static>(
        &self,
        name: &str,
    ) -> Result<Option<&ComponentDescriptor>, RegistryError> {
        Ok(self
            .named_index(name, TypeInfo::of::<T>())?
            .and_then(|index| self.entry(index))
            .map(|entry| &entry.descriptor))
    }

    pub(crate) fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.get_index_of(name)
    }

    pub(crate) fn entry(&self, index: usize) -> Option<&RegistryEntry> {
        self.entries.get_index(index).map(|(_, entry)| entry)
    }

    pub(crate) fn entry_mut(&mut self, index: usize) -> Option<&mut RegistryEntry> {
        self.entries.get_index_mut(index).map(|(_, entry)| entry)
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = &RegistryEntry> + '_ {
        self.entries.values()
    }

    pub(crate) fn indices_by_type(&self, type_id: TypeId) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .entries
            .values()
            .enumerate()
            .filter(|(_, entry)| entry.descriptor.satisfies(type_id))
            .map(|(index, _)| index)
            .collect();
        self.sort(&mut indices);
        indices
    }

    /// Indices of all descriptors matching `filter`, ordered by their order and then by name
    pub(crate) fn indices_where(&self, filter: impl Fn(&ComponentDescriptor) -> bool) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .entries
            .values()
            .enumerate()
            .filter(|(_, entry)| filter(&entry.descriptor))
            .map(|(index, _)| index)
            .collect();
        self.sort(&mut indices);
        indices
    }

    pub(crate) fn unique_index(&self, type_id: TypeId) -> Candidate {
        let candidates = self.indices_by_type(type_id);
        match candidates.as_slice() {
            [] => Candidate::None,
            [single] => Candidate::Unique(*single),
            _ => {
                let primaries: Vec<usize> = candidates
                    .iter()
                    .copied()
                    .filter(|index| {
                        self.entry(*index)
                            .is_some_and(|entry| entry.descriptor.is_primary())
                    })
                    .collect();

                match primaries.as_slice() {
                    [primary] => Candidate::Unique(*primary),
                    _ => Candidate::Ambiguous(
                        candidates
                            .iter()
                            .filter_map(|index| self.entry(*index))
                            .map(|entry| entry.descriptor.name().to_owned())
                            .collect(),
                    ),
                }
            }
        }
    }

    pub(crate) fn named_index(&self, name: &str, required: TypeInfo) -> Result<Option<usize>, RegistryError> {
        let Some((index, _, entry)) = self.entries.get_full(name) else {
            return Ok(None);
        };

        if !entry.descriptor.satisfies(required.type_id) {
            return Err(RegistryError::TypeMismatch {
                name: name.to_owned(),
                required: required.type_name,
                actual: entry.descriptor.declared_type().type_name,
            });
        }
        Ok(Some(index))
    }

    fn sort(&self, indices: &mut [usize]) {
        indices.sort_by_cached_key(|index| {
            self.entry(*index)
                .map(|entry| (entry.descriptor.order(), entry.descriptor.name().to_owned()))
        });
    }
}
