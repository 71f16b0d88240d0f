use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::domain::{Candidate, CandidateId};
use super::stage::Stage;

/// The visible subset a select-all or range operation acts within.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "stage", rename_all = "snake_case")]
pub enum SelectionScope {
    AllVisible,
    Stage(Stage),
}

impl SelectionScope {
    /// Ids inside the scope, in visible order.
    pub fn members<'a>(&self, visible: &[&'a Candidate]) -> Vec<&'a CandidateId> {
        visible
            .iter()
            .copied()
            .filter(|candidate| match self {
                SelectionScope::AllVisible => true,
                SelectionScope::Stage(stage) => candidate.stage == *stage,
            })
            .map(|candidate| &candidate.id)
            .collect()
    }
}

/// Candidates chosen for bulk action plus the anchor used for range selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionSet {
    selected: BTreeSet<CandidateId>,
    anchor: Option<CandidateId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn contains(&self, id: &CandidateId) -> bool {
        self.selected.contains(id)
    }

    pub fn ids(&self) -> &BTreeSet<CandidateId> {
        &self.selected
    }

    pub fn anchor(&self) -> Option<&CandidateId> {
        self.anchor.as_ref()
    }

    /// Flips one id and makes it the range anchor.
    pub fn toggle(&mut self, id: &CandidateId) {
        if !self.selected.remove(id) {
            self.selected.insert(id.clone());
        }
        self.anchor = Some(id.clone());
    }

    /// Adds the contiguous span between the anchor and `target` in the scope's order.
    /// Without a usable anchor this is a plain toggle of `target`.
    pub fn select_range(
        &mut self,
        target: &CandidateId,
        scope: SelectionScope,
        visible: &[&Candidate],
    ) {
        let members = scope.members(visible);
        let anchor_index = self
            .anchor
            .as_ref()
            .and_then(|anchor| members.iter().position(|id| *id == anchor));
        let target_index = members.iter().position(|id| *id == target);

        match (anchor_index, target_index) {
            (Some(anchor_index), Some(target_index)) => {
                let start = anchor_index.min(target_index);
                let end = anchor_index.max(target_index);
                for id in &members[start..=end] {
                    self.selected.insert((*id).clone());
                }
                self.anchor = Some(target.clone());
            }
            _ => self.toggle(target),
        }
    }

    pub fn select_all(&mut self, scope: SelectionScope, visible: &[&Candidate]) {
        for id in scope.members(visible) {
            self.selected.insert(id.clone());
        }
    }

    /// Checkbox behavior: clears the scope when it is fully selected, fills it otherwise.
    pub fn toggle_all(&mut self, scope: SelectionScope, visible: &[&Candidate]) {
        if self.is_all_selected(scope, visible) {
            for id in scope.members(visible) {
                self.selected.remove(id);
            }
        } else {
            self.select_all(scope, visible);
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.anchor = None;
    }

    pub fn is_all_selected(&self, scope: SelectionScope, visible: &[&Candidate]) -> bool {
        let members = scope.members(visible);
        !members.is_empty() && members.iter().all(|id| self.selected.contains(*id))
    }

    pub fn is_partially_selected(&self, scope: SelectionScope, visible: &[&Candidate]) -> bool {
        let members = scope.members(visible);
        let chosen = members
            .iter()
            .filter(|id| self.selected.contains(**id))
            .count();
        chosen > 0 && chosen < members.len()
    }

    /// Drops ids that are no longer visible. Returns how many were removed.
    pub fn prune(&mut self, visible: &[&Candidate]) -> usize {
        let before = self.selected.len();
        self.selected
            .retain(|id| visible.iter().any(|candidate| &candidate.id == id));
        let anchor_visible = self
            .anchor
            .as_ref()
            .map_or(true, |anchor| visible.iter().any(|candidate| &candidate.id == anchor));
        if !anchor_visible {
            self.anchor = None;
        }
        before - self.selected.len()
    }
}
