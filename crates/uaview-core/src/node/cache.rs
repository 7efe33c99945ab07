// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Attribute cache of one node.
//!
//! The class-specific part is a closed enum with one variant per node class.
//! Each attribute has one projection method returning the slot for that
//! attribute, or `None` when the node's class does not have it. Every reader
//! and writer goes through these projections, so the set of applicable
//! attributes per class is defined in exactly one place.
//!
//! A slot is `None` until fetched, `Some(None)` when the server reported no
//! value, and `Some(Some(v))` otherwise. Slots are replaced whole.

use std::collections::HashMap;

use crate::error::ConversionError;
use crate::types::{AttributeId, LocalizedText, NodeClass, NodeId, QualifiedName, ReferenceDescription};
use crate::variant::{DataValue, FromVariant};

/// One cache entry; see the module docs for the three states.
pub type Slot<T> = Option<Option<T>>;

// =============================================================================
// CacheValue
// =============================================================================

/// A type that can be stored in a cache slot.
pub trait CacheValue: Clone + Send + 'static {
    /// Extracts the slot content from a read or notification result.
    ///
    /// `Ok(None)` means "fetched as empty".
    fn decode(value: &DataValue) -> Result<Option<Self>, ConversionError>;
}

impl CacheValue for DataValue {
    fn decode(value: &DataValue) -> Result<Option<Self>, ConversionError> {
        Ok(Some(value.clone()))
    }
}

macro_rules! variant_cache_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl CacheValue for $ty {
                fn decode(value: &DataValue) -> Result<Option<Self>, ConversionError> {
                    if value.value.is_empty() {
                        return Ok(None);
                    }
                    <$ty as FromVariant>::from_variant(&value.value).map(Some)
                }
            }
        )*
    };
}

variant_cache_value!(bool, u8, u32, i32, f64, NodeId, QualifiedName, LocalizedText, Vec<u32>);

// =============================================================================
// Attribute sets
// =============================================================================

/// Attributes every node class has.
#[derive(Debug, Clone, Default)]
pub struct CommonAttributes {
    /// BrowseName.
    pub browse_name: Slot<QualifiedName>,
    /// DisplayName.
    pub display_name: Slot<LocalizedText>,
    /// Description.
    pub description: Slot<LocalizedText>,
    /// WriteMask.
    pub write_mask: Slot<u32>,
    /// UserWriteMask.
    pub user_write_mask: Slot<u32>,
}

/// Class-specific attributes.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum ClassAttributes {
    Object {
        event_notifier: Slot<u8>,
    },
    Variable {
        value: Slot<DataValue>,
        data_type: Slot<NodeId>,
        value_rank: Slot<i32>,
        array_dimensions: Slot<Vec<u32>>,
        access_level: Slot<u8>,
        user_access_level: Slot<u8>,
        minimum_sampling_interval: Slot<f64>,
        historizing: Slot<bool>,
    },
    Method {
        executable: Slot<bool>,
        user_executable: Slot<bool>,
    },
    ObjectType {
        is_abstract: Slot<bool>,
    },
    VariableType {
        value: Slot<DataValue>,
        data_type: Slot<NodeId>,
        value_rank: Slot<i32>,
        array_dimensions: Slot<Vec<u32>>,
        is_abstract: Slot<bool>,
    },
    ReferenceType {
        is_abstract: Slot<bool>,
        symmetric: Slot<bool>,
        inverse_name: Slot<LocalizedText>,
    },
    DataType {
        is_abstract: Slot<bool>,
    },
    View {
        contains_no_loops: Slot<bool>,
        event_notifier: Slot<u8>,
    },
}

impl ClassAttributes {
    /// Creates an empty attribute set for `class`.
    pub fn empty(class: NodeClass) -> Self {
        match class {
            NodeClass::Object => Self::Object {
                event_notifier: None,
            },
            NodeClass::Variable => Self::Variable {
                value: None,
                data_type: None,
                value_rank: None,
                array_dimensions: None,
                access_level: None,
                user_access_level: None,
                minimum_sampling_interval: None,
                historizing: None,
            },
            NodeClass::Method => Self::Method {
                executable: None,
                user_executable: None,
            },
            NodeClass::ObjectType => Self::ObjectType { is_abstract: None },
            NodeClass::VariableType => Self::VariableType {
                value: None,
                data_type: None,
                value_rank: None,
                array_dimensions: None,
                is_abstract: None,
            },
            NodeClass::ReferenceType => Self::ReferenceType {
                is_abstract: None,
                symmetric: None,
                inverse_name: None,
            },
            NodeClass::DataType => Self::DataType { is_abstract: None },
            NodeClass::View => Self::View {
                contains_no_loops: None,
                event_notifier: None,
            },
        }
    }

    /// Returns the node class this set belongs to.
    pub fn node_class(&self) -> NodeClass {
        match self {
            Self::Object { .. } => NodeClass::Object,
            Self::Variable { .. } => NodeClass::Variable,
            Self::Method { .. } => NodeClass::Method,
            Self::ObjectType { .. } => NodeClass::ObjectType,
            Self::VariableType { .. } => NodeClass::VariableType,
            Self::ReferenceType { .. } => NodeClass::ReferenceType,
            Self::DataType { .. } => NodeClass::DataType,
            Self::View { .. } => NodeClass::View,
        }
    }
}

// =============================================================================
// ApplyOutcome
// =============================================================================

/// Result of writing a value into the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// The slot now holds the value.
    Updated,
    /// The attribute is an identity attribute and never changes.
    Ignored,
    /// The node's class has no such attribute.
    NotApplicable,
    /// The attribute id is not one this client knows.
    Unknown,
    /// The value could not be converted; the slot was left untouched.
    Rejected(ConversionError),
    /// The slot was already filled and the caller asked not to overwrite.
    AlreadyCached,
}

impl ApplyOutcome {
    /// Returns `true` if the slot changed.
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated)
    }
}

// =============================================================================
// NodeAttributes
// =============================================================================

/// The complete cache of one node.
#[derive(Debug, Clone)]
pub struct NodeAttributes {
    /// Attributes every class has.
    pub common: CommonAttributes,
    /// Class-specific attributes.
    pub class: ClassAttributes,
    /// Forward hierarchical references, once browsed.
    pub forward_references: Option<Vec<ReferenceDescription>>,
    /// Inverse hierarchical references, once browsed.
    pub inverse_references: Option<Vec<ReferenceDescription>>,
    /// Notifications applied per attribute.
    generations: HashMap<AttributeId, u64>,
}

macro_rules! class_slot {
    ($(#[$doc:meta])* $name:ident: $ty:ty => $($variant:ident)|+) => {
        $(#[$doc])*
        pub fn $name(&mut self) -> Option<&mut Slot<$ty>> {
            match &mut self.class {
                $(ClassAttributes::$variant { $name, .. } => Some($name),)+
                #[allow(unreachable_patterns)]
                _ => None,
            }
        }
    };
}

impl NodeAttributes {
    /// Creates an empty cache for a node of `class`.
    pub fn new(class: NodeClass) -> Self {
        Self {
            common: CommonAttributes::default(),
            class: ClassAttributes::empty(class),
            forward_references: None,
            inverse_references: None,
            generations: HashMap::new(),
        }
    }

    // =========================================================================
    // Projections
    // =========================================================================

    /// BrowseName slot.
    pub fn browse_name(&mut self) -> Option<&mut Slot<QualifiedName>> {
        Some(&mut self.common.browse_name)
    }

    /// DisplayName slot.
    pub fn display_name(&mut self) -> Option<&mut Slot<LocalizedText>> {
        Some(&mut self.common.display_name)
    }

    /// Description slot.
    pub fn description(&mut self) -> Option<&mut Slot<LocalizedText>> {
        Some(&mut self.common.description)
    }

    /// WriteMask slot.
    pub fn write_mask(&mut self) -> Option<&mut Slot<u32>> {
        Some(&mut self.common.write_mask)
    }

    /// UserWriteMask slot.
    pub fn user_write_mask(&mut self) -> Option<&mut Slot<u32>> {
        Some(&mut self.common.user_write_mask)
    }

    class_slot!(
        /// EventNotifier slot.
        event_notifier: u8 => Object | View
    );
    class_slot!(
        /// Value slot.
        value: DataValue => Variable | VariableType
    );
    class_slot!(
        /// DataType slot.
        data_type: NodeId => Variable | VariableType
    );
    class_slot!(
        /// ValueRank slot.
        value_rank: i32 => Variable | VariableType
    );
    class_slot!(
        /// ArrayDimensions slot.
        array_dimensions: Vec<u32> => Variable | VariableType
    );
    class_slot!(
        /// AccessLevel slot.
        access_level: u8 => Variable
    );
    class_slot!(
        /// UserAccessLevel slot.
        user_access_level: u8 => Variable
    );
    class_slot!(
        /// MinimumSamplingInterval slot.
        minimum_sampling_interval: f64 => Variable
    );
    class_slot!(
        /// Historizing slot.
        historizing: bool => Variable
    );
    class_slot!(
        /// Executable slot.
        executable: bool => Method
    );
    class_slot!(
        /// UserExecutable slot.
        user_executable: bool => Method
    );
    class_slot!(
        /// IsAbstract slot.
        is_abstract: bool => ObjectType | VariableType | ReferenceType | DataType
    );
    class_slot!(
        /// Symmetric slot.
        symmetric: bool => ReferenceType
    );
    class_slot!(
        /// InverseName slot.
        inverse_name: LocalizedText => ReferenceType
    );
    class_slot!(
        /// ContainsNoLoops slot.
        contains_no_loops: bool => View
    );

    // =========================================================================
    // Type-erased access
    // =========================================================================

    /// Writes `value` into the slot for `attribute`, replacing any cached value.
    pub fn apply(&mut self, attribute: AttributeId, value: &DataValue) -> ApplyOutcome {
        let outcome = self.dispatch(attribute, &mut |slot| slot.store(value, true));
        if outcome.is_updated() {
            *self.generations.entry(attribute).or_default() += 1;
        }
        outcome
    }

    /// Number of values [`apply`](Self::apply) has stored for `attribute`.
    ///
    /// A writer compares it before and after a round trip to tell whether a
    /// newer value arrived meanwhile.
    pub fn generation(&self, attribute: AttributeId) -> u64 {
        self.generations.get(&attribute).copied().unwrap_or(0)
    }

    /// Writes `value` only if the slot for `attribute` has not been fetched.
    pub fn fill(&mut self, attribute: AttributeId, value: &DataValue) -> ApplyOutcome {
        self.dispatch(attribute, &mut |slot| slot.store(value, false))
    }

    /// Empties the slot for `attribute`. Returns `true` if it held a value.
    pub fn invalidate(&mut self, attribute: AttributeId) -> bool {
        let mut was_cached = false;
        self.dispatch(attribute, &mut |slot| {
            was_cached = slot.clear();
            ApplyOutcome::Updated
        });
        was_cached
    }

    /// Empties every slot and forgets browsed references.
    pub fn invalidate_all(&mut self) {
        let class = self.class.node_class();
        let generations = std::mem::take(&mut self.generations);
        *self = Self::new(class);
        self.generations = generations;
    }

    /// Returns `true` if the slot for `attribute` exists and is unfetched.
    pub fn is_missing(&mut self, attribute: AttributeId) -> bool {
        let mut missing = false;
        self.dispatch(attribute, &mut |slot| {
            missing = slot.is_missing();
            ApplyOutcome::Updated
        });
        missing
    }

    /// Returns `true` if nodes of `class` have `attribute`.
    pub fn is_applicable(class: NodeClass, attribute: AttributeId) -> bool {
        match attribute {
            AttributeId::NodeId | AttributeId::NodeClass => true,
            _ => {
                let mut scratch = Self::new(class);
                scratch.dispatch(attribute, &mut |_| ApplyOutcome::Updated) != ApplyOutcome::NotApplicable
            }
        }
    }

    /// Attributes with a cache slot for nodes of `class`.
    pub fn cached_attributes(class: NodeClass) -> Vec<AttributeId> {
        AttributeId::ALL
            .into_iter()
            .filter(|a| !matches!(a, AttributeId::NodeId | AttributeId::NodeClass))
            .filter(|a| Self::is_applicable(class, *a))
            .collect()
    }

    fn dispatch(
        &mut self,
        attribute: AttributeId,
        op: &mut dyn FnMut(&mut dyn ErasedSlot) -> ApplyOutcome,
    ) -> ApplyOutcome {
        fn run<T: CacheValue>(
            slot: Option<&mut Slot<T>>,
            op: &mut dyn FnMut(&mut dyn ErasedSlot) -> ApplyOutcome,
        ) -> ApplyOutcome {
            match slot {
                Some(slot) => op(slot),
                None => ApplyOutcome::NotApplicable,
            }
        }

        match attribute {
            AttributeId::NodeId | AttributeId::NodeClass => ApplyOutcome::Ignored,
            AttributeId::BrowseName => run(self.browse_name(), op),
            AttributeId::DisplayName => run(self.display_name(), op),
            AttributeId::Description => run(self.description(), op),
            AttributeId::WriteMask => run(self.write_mask(), op),
            AttributeId::UserWriteMask => run(self.user_write_mask(), op),
            AttributeId::IsAbstract => run(self.is_abstract(), op),
            AttributeId::Symmetric => run(self.symmetric(), op),
            AttributeId::InverseName => run(self.inverse_name(), op),
            AttributeId::ContainsNoLoops => run(self.contains_no_loops(), op),
            AttributeId::EventNotifier => run(self.event_notifier(), op),
            AttributeId::Value => run(self.value(), op),
            AttributeId::DataType => run(self.data_type(), op),
            AttributeId::ValueRank => run(self.value_rank(), op),
            AttributeId::ArrayDimensions => run(self.array_dimensions(), op),
            AttributeId::AccessLevel => run(self.access_level(), op),
            AttributeId::UserAccessLevel => run(self.user_access_level(), op),
            AttributeId::MinimumSamplingInterval => run(self.minimum_sampling_interval(), op),
            AttributeId::Historizing => run(self.historizing(), op),
            AttributeId::Executable => run(self.executable(), op),
            AttributeId::UserExecutable => run(self.user_executable(), op),
        }
    }
}

/// Slot operations that do not depend on the slot's value type.
trait ErasedSlot {
    fn store(&mut self, value: &DataValue, overwrite: bool) -> ApplyOutcome;
    fn clear(&mut self) -> bool;
    fn is_missing(&self) -> bool;
}

impl<T: CacheValue> ErasedSlot for Slot<T> {
    fn store(&mut self, value: &DataValue, overwrite: bool) -> ApplyOutcome {
        if !overwrite && self.is_some() {
            return ApplyOutcome::AlreadyCached;
        }
        match T::decode(value) {
            Ok(decoded) => {
                *self = Some(decoded);
                ApplyOutcome::Updated
            }
            Err(e) => ApplyOutcome::Rejected(e),
        }
    }

    fn clear(&mut self) -> bool {
        self.take().is_some()
    }

    fn is_missing(&self) -> bool {
        self.is_none()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::Variant;

    #[test]
    fn test_applicable_sets() {
        let variable = NodeAttributes::cached_attributes(NodeClass::Variable);
        assert!(variable.contains(&AttributeId::Value));
        assert!(variable.contains(&AttributeId::Historizing));
        assert!(!variable.contains(&AttributeId::IsAbstract));

        let variable_type = NodeAttributes::cached_attributes(NodeClass::VariableType);
        assert!(variable_type.contains(&AttributeId::IsAbstract));
        assert!(!variable_type.contains(&AttributeId::AccessLevel));

        let object = NodeAttributes::cached_attributes(NodeClass::Object);
        assert_eq!(
            object,
            vec![
                AttributeId::BrowseName,
                AttributeId::DisplayName,
                AttributeId::Description,
                AttributeId::WriteMask,
                AttributeId::UserWriteMask,
                AttributeId::EventNotifier,
            ]
        );

        let view = NodeAttributes::cached_attributes(NodeClass::View);
        assert!(view.contains(&AttributeId::ContainsNoLoops));
        assert!(view.contains(&AttributeId::EventNotifier));

        let reference_type = NodeAttributes::cached_attributes(NodeClass::ReferenceType);
        assert!(reference_type.contains(&AttributeId::InverseName));
        assert!(reference_type.contains(&AttributeId::Symmetric));
    }

    #[test]
    fn test_apply_overwrites_slot() {
        let mut cache = NodeAttributes::new(NodeClass::Object);
        assert_eq!(
            cache.apply(AttributeId::DisplayName, &DataValue::new(LocalizedText::from("Old"))),
            ApplyOutcome::Updated
        );
        assert_eq!(
            cache.apply(AttributeId::DisplayName, &DataValue::new(LocalizedText::from("Root"))),
            ApplyOutcome::Updated
        );
        assert_eq!(
            cache.common.display_name,
            Some(Some(LocalizedText::from("Root")))
        );
    }

    #[test]
    fn test_generation_counts_stored_notifications() {
        let mut cache = NodeAttributes::new(NodeClass::Variable);
        assert_eq!(cache.generation(AttributeId::Value), 0);

        cache.apply(AttributeId::Value, &DataValue::new(1.0f64));
        cache.apply(AttributeId::ValueRank, &DataValue::new("scalar"));
        cache.fill(AttributeId::AccessLevel, &DataValue::new(3u8));
        assert_eq!(cache.generation(AttributeId::Value), 1);
        assert_eq!(cache.generation(AttributeId::ValueRank), 0);
        assert_eq!(cache.generation(AttributeId::AccessLevel), 0);

        cache.invalidate_all();
        assert_eq!(cache.generation(AttributeId::Value), 1);
    }

    #[test]
    fn test_apply_identity_and_not_applicable() {
        let mut cache = NodeAttributes::new(NodeClass::Object);
        let value = DataValue::new(Variant::NodeId(NodeId::numeric(0, 1)));
        assert_eq!(cache.apply(AttributeId::NodeId, &value), ApplyOutcome::Ignored);
        assert_eq!(
            cache.apply(AttributeId::Value, &DataValue::new(1.0f64)),
            ApplyOutcome::NotApplicable
        );
        assert!(cache.value().is_none());
    }

    #[test]
    fn test_rejected_value_leaves_slot() {
        let mut cache = NodeAttributes::new(NodeClass::Variable);
        cache.apply(AttributeId::ValueRank, &DataValue::new(-1i32));
        let outcome = cache.apply(AttributeId::ValueRank, &DataValue::new("scalar"));
        assert!(matches!(outcome, ApplyOutcome::Rejected(_)));
        assert_eq!(cache.value_rank().cloned(), Some(Some(Some(-1))));
    }

    #[test]
    fn test_empty_value_is_fetched_empty() {
        let mut cache = NodeAttributes::new(NodeClass::Method);
        cache.apply(AttributeId::Description, &DataValue::new(Variant::Empty));
        assert_eq!(cache.common.description, Some(None));
        assert!(!cache.is_missing(AttributeId::Description));
        assert!(cache.is_missing(AttributeId::Executable));
    }

    #[test]
    fn test_fill_does_not_overwrite() {
        let mut cache = NodeAttributes::new(NodeClass::Variable);
        cache.apply(AttributeId::Value, &DataValue::new(5u32));
        assert_eq!(
            cache.fill(AttributeId::Value, &DataValue::new(6u32)),
            ApplyOutcome::AlreadyCached
        );
        let cached = cache.value().cloned().flatten().flatten();
        assert_eq!(cached.map(|dv| dv.value), Some(Variant::UInt32(5)));
    }

    #[test]
    fn test_invalidate() {
        let mut cache = NodeAttributes::new(NodeClass::Variable);
        cache.apply(AttributeId::Historizing, &DataValue::new(true));
        assert!(cache.invalidate(AttributeId::Historizing));
        assert!(!cache.invalidate(AttributeId::Historizing));
        assert!(cache.is_missing(AttributeId::Historizing));

        cache.apply(AttributeId::BrowseName, &DataValue::new(QualifiedName::new(0, "X")));
        cache.forward_references = Some(vec![]);
        cache.invalidate_all();
        assert!(cache.is_missing(AttributeId::BrowseName));
        assert!(cache.forward_references.is_none());
        assert_eq!(cache.class.node_class(), NodeClass::Variable);
    }
}
