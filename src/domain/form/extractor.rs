//! Fillable-field discovery over the live form runtime.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};

use super::field::{is_present, FieldType, FormField, FormNode};
use crate::ports::{FieldChange, FieldProperty, FormRuntime};

/// Counts over the fillable-type leaf fields of a form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldStats {
    pub total: usize,
    pub required: usize,
    pub optional: usize,
    pub by_type: BTreeMap<String, usize>,
}

/// Walks the runtime's field tree and keeps the current fillable set.
pub struct FieldExtractor {
    runtime: Arc<dyn FormRuntime>,
    changes: broadcast::Receiver<FieldChange>,
    fillable: Vec<FormField>,
    leaves: Vec<FormField>,
}

impl FieldExtractor {
    /// Subscribes to the runtime's change feed.
    pub fn new(runtime: Arc<dyn FormRuntime>) -> Self {
        let changes = runtime.subscribe();
        Self {
            runtime,
            changes,
            fillable: Vec::new(),
            leaves: Vec::new(),
        }
    }

    pub fn runtime(&self) -> &Arc<dyn FormRuntime> {
        &self.runtime
    }

    /// True when the conversation should ask about this field.
    ///
    /// Containers are never fillable themselves.
    pub fn is_fillable(field: &FormField) -> bool {
        field.field_type.is_fillable_type()
            && !field.field_type.is_container()
            && !field.is_validly_filled()
            && field.is_interactive()
    }

    /// Rebuilds the fillable set from a fresh snapshot of the whole tree.
    pub fn extract_fillable_fields(&mut self) -> &[FormField] {
        let root = self.runtime.root();
        let mut fillable = Vec::new();
        let mut leaves = Vec::new();
        for child in root.ordered_children() {
            Self::visit(child, &mut fillable, &mut leaves);
        }
        tracing::debug!(
            fillable = fillable.len(),
            fields = leaves.len(),
            "extracted fillable fields"
        );
        self.fillable = fillable;
        self.leaves = leaves;
        &self.fillable
    }

    fn visit(node: &FormNode, fillable: &mut Vec<FormField>, leaves: &mut Vec<FormField>) {
        let field = &node.field;
        if field.field_type.is_container() || !node.children.is_empty() {
            if !field.is_interactive() {
                return;
            }
            for child in node.ordered_children() {
                Self::visit(child, fillable, leaves);
            }
            return;
        }
        if !field.field_type.is_fillable_type() {
            return;
        }
        leaves.push(field.clone());
        if Self::is_fillable(field) {
            fillable.push(field.clone());
        }
    }

    /// The fillable set from the last extraction, minus reactive removals.
    pub fn fillable_fields(&self) -> &[FormField] {
        &self.fillable
    }

    /// Resolves the runtime's invalid ids to snapshots, dropping unknown ids.
    pub fn invalid_fields(&self) -> Vec<FormField> {
        self.runtime
            .invalid_field_ids()
            .iter()
            .filter_map(|id| {
                let field = self.runtime.field(id);
                if field.is_none() {
                    tracing::debug!(field_id = %id, "invalid field no longer resolvable");
                }
                field
            })
            .collect()
    }

    /// Applies one change notification to the cached fillable set.
    ///
    /// A value change on a field that is now non-empty and invalid removes it.
    /// Returns true when a field was removed.
    pub fn handle_change(&mut self, change: &FieldChange) -> bool {
        let Some(value_change) = change
            .changes
            .iter()
            .find(|c| c.property == FieldProperty::Value)
        else {
            return false;
        };
        if !is_present(&value_change.current) {
            return false;
        }
        let invalid = self
            .runtime
            .field(&change.field_id)
            .map(|f| f.is_invalid())
            .unwrap_or(false);
        if !invalid {
            return false;
        }
        let before = self.fillable.len();
        self.fillable.retain(|f| f.id != change.field_id);
        let removed = self.fillable.len() != before;
        if removed {
            tracing::debug!(field_id = %change.field_id, "dropped invalid field from fillable set");
        }
        removed
    }

    /// Processes every pending change notification. Returns how many fields
    /// were removed.
    pub fn drain_changes(&mut self) -> usize {
        let mut removed = 0;
        loop {
            match self.changes.try_recv() {
                Ok(change) => {
                    if self.handle_change(&change) {
                        removed += 1;
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "field change feed lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        removed
    }

    /// Fresh snapshot of one field.
    pub fn field(&self, id: &str) -> Option<FormField> {
        self.runtime.field(id)
    }

    /// Fillable-type leaf fields of the given type.
    pub fn fields_by_type(&self, field_type: &FieldType) -> Vec<FormField> {
        self.leaves
            .iter()
            .filter(|f| &f.field_type == field_type)
            .cloned()
            .collect()
    }

    /// Required/optional/type counts over the last extraction.
    pub fn field_stats(&self) -> FieldStats {
        let mut stats = FieldStats {
            total: self.leaves.len(),
            ..FieldStats::default()
        };
        for field in &self.leaves {
            if field.required {
                stats.required += 1;
            }
            *stats
                .by_type
                .entry(field.field_type.as_str().to_string())
                .or_insert(0) += 1;
        }
        stats.optional = stats.total - stats.required;
        stats
    }
}
