// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Typed handles to address-space nodes.
//!
//! A [`Node`] is a cheap, clonable handle. Its class is fixed when the handle
//! is created and decides which attributes exist. Getters read through a
//! per-node cache: the first call performs one round trip, later calls are
//! served locally until the slot is invalidated or overwritten by a
//! subscription. Getters for attributes the class does not have return
//! [`AttributeValue::NotApplicable`] without touching the network.
//!
//! # Examples
//!
//! ```rust,ignore
//! let root = connection.root_node().await.expect("root exists");
//! if let AttributeValue::Value(name) = root.display_name().await? {
//!     println!("{name}");
//! }
//! for child in root.children().await? {
//!     println!("{} ({})", child.node_id(), child.node_class());
//! }
//! ```

pub mod cache;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::client::stats::ConnectionStats;
use crate::error::{OperationError, UaError, UaResult};
use crate::transport::UaTransport;
use crate::types::{
    AttributeId, BrowseDirection, LocalizedText, NodeClass, NodeId, QualifiedName,
    ReferenceDescription, StatusCode,
};
use crate::variant::{DataValue, Variant};

pub use cache::{ApplyOutcome, CacheValue, NodeAttributes, Slot};

// =============================================================================
// AttributeValue
// =============================================================================

/// Result of an attribute getter.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue<T> {
    /// The node's class has no such attribute.
    NotApplicable,
    /// The server reported no value.
    Empty,
    /// The attribute value.
    Value(T),
}

impl<T> AttributeValue<T> {
    /// Returns `true` for [`AttributeValue::NotApplicable`].
    pub fn is_not_applicable(&self) -> bool {
        matches!(self, Self::NotApplicable)
    }

    /// Returns the value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Converts into an `Option`, dropping the distinction between
    /// not applicable and empty.
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl<T> From<Option<T>> for AttributeValue<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Value(v),
            None => Self::Empty,
        }
    }
}

// =============================================================================
// SessionContext
// =============================================================================

/// What a node needs from the connection that created it.
#[derive(Clone)]
pub(crate) struct SessionContext {
    pub(crate) connection_id: u64,
    pub(crate) transport: Arc<dyn UaTransport>,
    pub(crate) stats: Arc<ConnectionStats>,
}

impl SessionContext {
    async fn read(&self, node_id: &NodeId, attribute: AttributeId) -> UaResult<DataValue> {
        let started = Instant::now();
        match self.transport.read_attribute(node_id, attribute).await {
            Ok(value) => {
                self.stats.record_read(started.elapsed());
                Ok(value)
            }
            Err(e) => {
                self.stats.record_error();
                Err(e)
            }
        }
    }
}

/// Classifies `node_id` with one NodeClass read and wraps it.
///
/// Unknown or unreadable nodes yield `Ok(None)`.
pub(crate) async fn resolve(ctx: &SessionContext, node_id: NodeId) -> UaResult<Option<Node>> {
    let data = ctx.read(&node_id, AttributeId::NodeClass).await?;
    if data.status.is_bad() {
        debug!(
            connection_id = ctx.connection_id,
            node_id = %node_id,
            status = %data.status,
            "Node lookup returned bad status"
        );
        return Ok(None);
    }

    let class = data
        .value
        .to::<u32>()
        .ok()
        .and_then(NodeClass::from_value);

    Ok(class.map(|class| Node::new(node_id, class, ctx.clone())))
}

// =============================================================================
// Node
// =============================================================================

/// Handle to one address-space entry.
///
/// Equality and hashing use the [`NodeId`] only; two handles created
/// independently for the same id compare equal.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

struct NodeInner {
    id: NodeId,
    class: NodeClass,
    ctx: SessionContext,
    attributes: Mutex<NodeAttributes>,
}

type Projection<T> = fn(&mut NodeAttributes) -> Option<&mut Slot<T>>;

impl Node {
    pub(crate) fn new(id: NodeId, class: NodeClass, ctx: SessionContext) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                id,
                class,
                ctx,
                attributes: Mutex::new(NodeAttributes::new(class)),
            }),
        }
    }

    /// Wraps a browse result, seeding names from the reference.
    fn from_reference(reference: &ReferenceDescription, class: NodeClass, ctx: SessionContext) -> Self {
        let node = Self::new(reference.node_id.clone(), class, ctx);
        {
            let mut attributes = node.inner.attributes.lock();
            attributes.common.browse_name = Some(Some(reference.browse_name.clone()));
            attributes.common.display_name = Some(Some(reference.display_name.clone()));
        }
        node
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Returns the node id.
    pub fn node_id(&self) -> &NodeId {
        &self.inner.id
    }

    /// Returns the node class.
    pub fn node_class(&self) -> NodeClass {
        self.inner.class
    }

    /// Returns the id of the connection this node belongs to.
    pub fn connection_id(&self) -> u64 {
        self.inner.ctx.connection_id
    }

    // =========================================================================
    // Cache plumbing
    // =========================================================================

    async fn cached<T: CacheValue>(
        &self,
        attribute: AttributeId,
        project: Projection<T>,
    ) -> UaResult<AttributeValue<T>> {
        {
            let mut attributes = self.inner.attributes.lock();
            match project(&mut attributes) {
                None => return Ok(AttributeValue::NotApplicable),
                Some(Some(cached)) => return Ok(cached.clone().into()),
                Some(None) => {}
            }
        }

        let fetched = self.fetch::<T>(attribute).await?;

        let mut attributes = self.inner.attributes.lock();
        let Some(slot) = project(&mut attributes) else {
            return Ok(AttributeValue::NotApplicable);
        };
        // A notification that landed during the read is newer than our result.
        match slot {
            Some(current) => Ok(current.clone().into()),
            None => {
                *slot = Some(fetched.clone());
                Ok(fetched.into())
            }
        }
    }

    async fn fetch<T: CacheValue>(&self, attribute: AttributeId) -> UaResult<Option<T>> {
        let data = self.inner.ctx.read(&self.inner.id, attribute).await?;
        if data.status == StatusCode::BAD_ATTRIBUTE_ID_INVALID {
            return Ok(None);
        }
        if data.status.is_bad() {
            return Err(UaError::operation(OperationError::bad_status(
                self.inner.id.to_string(),
                data.status,
            )));
        }
        trace!(node_id = %self.inner.id, attribute_id = attribute.value(), "Attribute fetched");
        T::decode(&data).map_err(UaError::from)
    }

    async fn write_cached<T: CacheValue>(
        &self,
        attribute: AttributeId,
        project: Projection<T>,
        value: T,
        wire: Variant,
    ) -> UaResult<()> {
        let generation = {
            let mut attributes = self.inner.attributes.lock();
            if project(&mut attributes).is_none() {
                return Err(self.not_applicable(&format!("write {attribute}")));
            }
            attributes.generation(attribute)
        };

        let started = Instant::now();
        let ctx = &self.inner.ctx;
        let status = match ctx
            .transport
            .write_attribute(&self.inner.id, attribute, DataValue::new(wire))
            .await
        {
            Ok(status) => status,
            Err(e) => {
                ctx.stats.record_error();
                return Err(e);
            }
        };
        ctx.stats.record_write(started.elapsed());

        if status.is_bad() {
            return Err(UaError::operation(OperationError::bad_status(
                self.inner.id.to_string(),
                status,
            )));
        }

        let mut attributes = self.inner.attributes.lock();
        // A notification that landed during the write is newer than our value.
        if attributes.generation(attribute) != generation {
            return Ok(());
        }
        if let Some(slot) = project(&mut attributes) {
            *slot = Some(Some(value));
        }
        Ok(())
    }

    fn not_applicable(&self, operation: &str) -> UaError {
        UaError::operation(OperationError::not_applicable(
            self.inner.id.to_string(),
            self.inner.class.name(),
            operation,
        ))
    }

    /// Writes a notification value into the cache.
    ///
    /// Unknown attribute ids are accepted and leave the cache untouched.
    pub(crate) fn apply_update(&self, attribute_id: u32, value: &DataValue) -> ApplyOutcome {
        let Some(attribute) = AttributeId::from_value(attribute_id) else {
            return ApplyOutcome::Unknown;
        };
        self.inner.attributes.lock().apply(attribute, value)
    }

    /// Returns `true` if `attribute` currently has a cached value.
    pub fn is_cached(&self, attribute: AttributeId) -> bool {
        let mut attributes = self.inner.attributes.lock();
        NodeAttributes::is_applicable(self.inner.class, attribute) && !attributes.is_missing(attribute)
    }

    /// Drops the cached value of `attribute`. Returns `true` if one existed.
    pub fn invalidate(&self, attribute: AttributeId) -> bool {
        self.inner.attributes.lock().invalidate(attribute)
    }

    /// Drops every cached value and browsed reference.
    pub fn invalidate_all(&self) {
        self.inner.attributes.lock().invalidate_all();
    }

    /// Fetches every applicable attribute that is not cached yet.
    ///
    /// Returns the number of attributes fetched.
    pub async fn read_all(&self) -> UaResult<usize> {
        let missing: Vec<AttributeId> = {
            let mut attributes = self.inner.attributes.lock();
            NodeAttributes::cached_attributes(self.inner.class)
                .into_iter()
                .filter(|a| attributes.is_missing(*a))
                .collect()
        };

        let mut fetched = 0;
        for attribute in missing {
            let data = self.inner.ctx.read(&self.inner.id, attribute).await?;
            let data = if data.status == StatusCode::BAD_ATTRIBUTE_ID_INVALID {
                DataValue::default()
            } else if data.status.is_bad() {
                return Err(UaError::operation(OperationError::bad_status(
                    self.inner.id.to_string(),
                    data.status,
                )));
            } else {
                data
            };

            let outcome = self.inner.attributes.lock().fill(attribute, &data);
            match outcome {
                ApplyOutcome::Updated => fetched += 1,
                ApplyOutcome::Rejected(e) => return Err(e.into()),
                _ => {}
            }
        }
        Ok(fetched)
    }

    // =========================================================================
    // Common attributes
    // =========================================================================

    /// BrowseName.
    pub async fn browse_name(&self) -> UaResult<AttributeValue<QualifiedName>> {
        self.cached(AttributeId::BrowseName, NodeAttributes::browse_name).await
    }

    /// DisplayName.
    pub async fn display_name(&self) -> UaResult<AttributeValue<LocalizedText>> {
        self.cached(AttributeId::DisplayName, NodeAttributes::display_name).await
    }

    /// Description.
    pub async fn description(&self) -> UaResult<AttributeValue<LocalizedText>> {
        self.cached(AttributeId::Description, NodeAttributes::description).await
    }

    /// WriteMask.
    pub async fn write_mask(&self) -> UaResult<AttributeValue<u32>> {
        self.cached(AttributeId::WriteMask, NodeAttributes::write_mask).await
    }

    /// UserWriteMask.
    pub async fn user_write_mask(&self) -> UaResult<AttributeValue<u32>> {
        self.cached(AttributeId::UserWriteMask, NodeAttributes::user_write_mask).await
    }

    // =========================================================================
    // Class-specific attributes
    // =========================================================================

    /// EventNotifier (Object, View).
    pub async fn event_notifier(&self) -> UaResult<AttributeValue<u8>> {
        self.cached(AttributeId::EventNotifier, NodeAttributes::event_notifier).await
    }

    /// Value (Variable, VariableType).
    pub async fn value(&self) -> UaResult<AttributeValue<DataValue>> {
        self.cached(AttributeId::Value, NodeAttributes::value).await
    }

    /// DataType (Variable, VariableType).
    pub async fn data_type(&self) -> UaResult<AttributeValue<NodeId>> {
        self.cached(AttributeId::DataType, NodeAttributes::data_type).await
    }

    /// ValueRank (Variable, VariableType).
    pub async fn value_rank(&self) -> UaResult<AttributeValue<i32>> {
        self.cached(AttributeId::ValueRank, NodeAttributes::value_rank).await
    }

    /// ArrayDimensions (Variable, VariableType).
    pub async fn array_dimensions(&self) -> UaResult<AttributeValue<Vec<u32>>> {
        self.cached(AttributeId::ArrayDimensions, NodeAttributes::array_dimensions).await
    }

    /// AccessLevel (Variable).
    pub async fn access_level(&self) -> UaResult<AttributeValue<u8>> {
        self.cached(AttributeId::AccessLevel, NodeAttributes::access_level).await
    }

    /// UserAccessLevel (Variable).
    pub async fn user_access_level(&self) -> UaResult<AttributeValue<u8>> {
        self.cached(AttributeId::UserAccessLevel, NodeAttributes::user_access_level).await
    }

    /// MinimumSamplingInterval in milliseconds (Variable).
    pub async fn minimum_sampling_interval(&self) -> UaResult<AttributeValue<f64>> {
        self.cached(
            AttributeId::MinimumSamplingInterval,
            NodeAttributes::minimum_sampling_interval,
        )
        .await
    }

    /// Historizing (Variable).
    pub async fn historizing(&self) -> UaResult<AttributeValue<bool>> {
        self.cached(AttributeId::Historizing, NodeAttributes::historizing).await
    }

    /// Executable (Method).
    pub async fn executable(&self) -> UaResult<AttributeValue<bool>> {
        self.cached(AttributeId::Executable, NodeAttributes::executable).await
    }

    /// UserExecutable (Method).
    pub async fn user_executable(&self) -> UaResult<AttributeValue<bool>> {
        self.cached(AttributeId::UserExecutable, NodeAttributes::user_executable).await
    }

    /// IsAbstract (ObjectType, VariableType, ReferenceType, DataType).
    pub async fn is_abstract(&self) -> UaResult<AttributeValue<bool>> {
        self.cached(AttributeId::IsAbstract, NodeAttributes::is_abstract).await
    }

    /// Symmetric (ReferenceType).
    pub async fn symmetric(&self) -> UaResult<AttributeValue<bool>> {
        self.cached(AttributeId::Symmetric, NodeAttributes::symmetric).await
    }

    /// InverseName (ReferenceType).
    pub async fn inverse_name(&self) -> UaResult<AttributeValue<LocalizedText>> {
        self.cached(AttributeId::InverseName, NodeAttributes::inverse_name).await
    }

    /// ContainsNoLoops (View).
    pub async fn contains_no_loops(&self) -> UaResult<AttributeValue<bool>> {
        self.cached(AttributeId::ContainsNoLoops, NodeAttributes::contains_no_loops).await
    }

    // =========================================================================
    // Setters
    // =========================================================================

    /// Writes BrowseName.
    pub async fn set_browse_name(&self, name: QualifiedName) -> UaResult<()> {
        let wire = Variant::from(name.clone());
        self.write_cached(AttributeId::BrowseName, NodeAttributes::browse_name, name, wire)
            .await
    }

    /// Writes DisplayName.
    pub async fn set_display_name(&self, text: LocalizedText) -> UaResult<()> {
        let wire = Variant::from(text.clone());
        self.write_cached(AttributeId::DisplayName, NodeAttributes::display_name, text, wire)
            .await
    }

    /// Writes Description.
    pub async fn set_description(&self, text: LocalizedText) -> UaResult<()> {
        let wire = Variant::from(text.clone());
        self.write_cached(AttributeId::Description, NodeAttributes::description, text, wire)
            .await
    }

    /// Writes WriteMask.
    pub async fn set_write_mask(&self, mask: u32) -> UaResult<()> {
        self.write_cached(AttributeId::WriteMask, NodeAttributes::write_mask, mask, mask.into())
            .await
    }

    /// Writes UserWriteMask.
    pub async fn set_user_write_mask(&self, mask: u32) -> UaResult<()> {
        self.write_cached(
            AttributeId::UserWriteMask,
            NodeAttributes::user_write_mask,
            mask,
            mask.into(),
        )
        .await
    }

    /// Writes EventNotifier (Object, View).
    pub async fn set_event_notifier(&self, flags: u8) -> UaResult<()> {
        self.write_cached(
            AttributeId::EventNotifier,
            NodeAttributes::event_notifier,
            flags,
            flags.into(),
        )
        .await
    }

    /// Writes Value (Variable, VariableType).
    pub async fn set_value(&self, value: impl Into<Variant>) -> UaResult<()> {
        let wire = value.into();
        let cached = DataValue::new(wire.clone());
        self.write_cached(AttributeId::Value, NodeAttributes::value, cached, wire)
            .await
    }

    /// Writes DataType (Variable, VariableType).
    pub async fn set_data_type(&self, data_type: NodeId) -> UaResult<()> {
        let wire = Variant::from(data_type.clone());
        self.write_cached(AttributeId::DataType, NodeAttributes::data_type, data_type, wire)
            .await
    }

    /// Writes ValueRank (Variable, VariableType).
    pub async fn set_value_rank(&self, rank: i32) -> UaResult<()> {
        self.write_cached(AttributeId::ValueRank, NodeAttributes::value_rank, rank, rank.into())
            .await
    }

    /// Writes ArrayDimensions (Variable, VariableType).
    pub async fn set_array_dimensions(&self, dimensions: Vec<u32>) -> UaResult<()> {
        let wire = Variant::from(dimensions.clone());
        self.write_cached(
            AttributeId::ArrayDimensions,
            NodeAttributes::array_dimensions,
            dimensions,
            wire,
        )
        .await
    }

    /// Writes AccessLevel (Variable).
    pub async fn set_access_level(&self, level: u8) -> UaResult<()> {
        self.write_cached(AttributeId::AccessLevel, NodeAttributes::access_level, level, level.into())
            .await
    }

    /// Writes UserAccessLevel (Variable).
    pub async fn set_user_access_level(&self, level: u8) -> UaResult<()> {
        self.write_cached(
            AttributeId::UserAccessLevel,
            NodeAttributes::user_access_level,
            level,
            level.into(),
        )
        .await
    }

    /// Writes MinimumSamplingInterval (Variable).
    pub async fn set_minimum_sampling_interval(&self, interval_ms: f64) -> UaResult<()> {
        self.write_cached(
            AttributeId::MinimumSamplingInterval,
            NodeAttributes::minimum_sampling_interval,
            interval_ms,
            interval_ms.into(),
        )
        .await
    }

    /// Writes Historizing (Variable).
    pub async fn set_historizing(&self, historizing: bool) -> UaResult<()> {
        self.write_cached(
            AttributeId::Historizing,
            NodeAttributes::historizing,
            historizing,
            historizing.into(),
        )
        .await
    }

    /// Writes Executable (Method).
    pub async fn set_executable(&self, executable: bool) -> UaResult<()> {
        self.write_cached(
            AttributeId::Executable,
            NodeAttributes::executable,
            executable,
            executable.into(),
        )
        .await
    }

    /// Writes UserExecutable (Method).
    pub async fn set_user_executable(&self, executable: bool) -> UaResult<()> {
        self.write_cached(
            AttributeId::UserExecutable,
            NodeAttributes::user_executable,
            executable,
            executable.into(),
        )
        .await
    }

    /// Writes IsAbstract (type nodes).
    pub async fn set_is_abstract(&self, is_abstract: bool) -> UaResult<()> {
        self.write_cached(
            AttributeId::IsAbstract,
            NodeAttributes::is_abstract,
            is_abstract,
            is_abstract.into(),
        )
        .await
    }

    /// Writes Symmetric (ReferenceType).
    pub async fn set_symmetric(&self, symmetric: bool) -> UaResult<()> {
        self.write_cached(
            AttributeId::Symmetric,
            NodeAttributes::symmetric,
            symmetric,
            symmetric.into(),
        )
        .await
    }

    /// Writes InverseName (ReferenceType).
    pub async fn set_inverse_name(&self, name: LocalizedText) -> UaResult<()> {
        let wire = Variant::from(name.clone());
        self.write_cached(AttributeId::InverseName, NodeAttributes::inverse_name, name, wire)
            .await
    }

    /// Writes ContainsNoLoops (View).
    pub async fn set_contains_no_loops(&self, no_loops: bool) -> UaResult<()> {
        self.write_cached(
            AttributeId::ContainsNoLoops,
            NodeAttributes::contains_no_loops,
            no_loops,
            no_loops.into(),
        )
        .await
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Browses hierarchical references in `direction` without caching.
    pub async fn browse(&self, direction: BrowseDirection) -> UaResult<Vec<ReferenceDescription>> {
        let ctx = &self.inner.ctx;
        match ctx.transport.browse(&self.inner.id, direction).await {
            Ok(references) => {
                ctx.stats.record_browse();
                Ok(references)
            }
            Err(e) => {
                ctx.stats.record_error();
                Err(e)
            }
        }
    }

    async fn cached_references(&self, direction: BrowseDirection) -> UaResult<Vec<ReferenceDescription>> {
        let cached = {
            let attributes = self.inner.attributes.lock();
            match direction {
                BrowseDirection::Inverse => attributes.inverse_references.clone(),
                _ => attributes.forward_references.clone(),
            }
        };
        if let Some(references) = cached {
            return Ok(references);
        }

        let references = self.browse(direction).await?;
        let mut attributes = self.inner.attributes.lock();
        let slot = match direction {
            BrowseDirection::Inverse => &mut attributes.inverse_references,
            _ => &mut attributes.forward_references,
        };
        Ok(slot.get_or_insert(references).clone())
    }

    /// Forward hierarchical references, cached after the first browse.
    pub async fn references(&self) -> UaResult<Vec<ReferenceDescription>> {
        self.cached_references(BrowseDirection::Forward).await
    }

    /// Child nodes reached by forward hierarchical references.
    ///
    /// Children are independent handles with their own caches.
    pub async fn children(&self) -> UaResult<Vec<Node>> {
        let references = self.references().await?;
        let mut children = Vec::with_capacity(references.len());
        for reference in &references {
            if let Some(child) = self.wrap_reference(reference).await? {
                children.push(child);
            }
        }
        Ok(children)
    }

    /// The node reached by the first inverse hierarchical reference.
    pub async fn parent(&self) -> UaResult<Option<Node>> {
        let references = self.cached_references(BrowseDirection::Inverse).await?;
        match references.first() {
            Some(reference) => self.wrap_reference(reference).await,
            None => Ok(None),
        }
    }

    async fn wrap_reference(&self, reference: &ReferenceDescription) -> UaResult<Option<Node>> {
        let ctx = self.inner.ctx.clone();
        match reference.node_class {
            Some(class) => Ok(Some(Self::from_reference(reference, class, ctx))),
            None => resolve(&ctx, reference.node_id.clone()).await,
        }
    }

    // =========================================================================
    // Methods
    // =========================================================================

    /// Calls `method_id` on this node and returns the output arguments.
    ///
    /// Only Object and ObjectType nodes carry methods.
    pub async fn call_method(&self, method_id: &NodeId, arguments: Vec<Variant>) -> UaResult<Vec<Variant>> {
        if !self.inner.class.can_call_methods() {
            return Err(self.not_applicable("call_method"));
        }

        let ctx = &self.inner.ctx;
        debug!(
            connection_id = ctx.connection_id,
            node_id = %self.inner.id,
            method_id = %method_id,
            "Calling method"
        );
        match ctx.transport.call_method(&self.inner.id, method_id, arguments).await {
            Ok(outputs) => {
                ctx.stats.record_call();
                Ok(outputs)
            }
            Err(e) => {
                ctx.stats.record_error();
                Err(e)
            }
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.inner.id)
            .field("class", &self.inner.class)
            .field("connection_id", &self.inner.ctx.connection_id)
            .finish()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.inner.id, self.inner.class)
    }
}

// =============================================================================
// Tests
// =============================================================================
