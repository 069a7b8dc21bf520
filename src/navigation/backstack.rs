//! Pure back stack edits on a [`NavigationUpdate`] draft.

use super::entry::{ModalContext, NavigationEntry};
use super::state::NavigationUpdate;

impl NavigationUpdate {
    /// Push `entry`. With `single_top`, an entry for the same path on top is
    /// replaced in place instead.
    pub(crate) fn push(&mut self, entry: NavigationEntry, single_top: bool) {
        if single_top {
            if let Some(top) = self.back_stack.last_mut() {
                if top.path == entry.path {
                    let id = top.id;
                    let position = top.stack_position;
                    *top = NavigationEntry { id, ..entry }.at_position(position);
                    return;
                }
            }
        }

        if entry.is_modal() {
            if let Some(screen) = self.back_stack.iter().rev().find(|e| !e.is_modal()) {
                self.modal_contexts.push(ModalContext {
                    modal_entry: entry.clone(),
                    underlying_screen: screen.clone(),
                    navigated_away_to: None,
                });
            }
        } else if let Some(top) = self.back_stack.last().filter(|top| top.is_modal()) {
            let modal_id = top.id;
            if let Some(context) = self
                .modal_contexts
                .iter_mut()
                .find(|context| context.modal_entry.id == modal_id)
            {
                context.navigated_away_to = Some(entry.path.clone());
            }
        }

        let position = self.back_stack.len();
        self.back_stack.push(entry.at_position(position));
    }

    /// Remove the top entry. The last entry is never popped.
    pub(crate) fn pop(&mut self) -> Option<NavigationEntry> {
        if self.back_stack.len() <= 1 {
            return None;
        }
        let popped = self.back_stack.pop();
        self.prune_modal_contexts();
        popped
    }

    /// Pop entries above the most recent match; `inclusive` pops the match too.
    /// Returns `false` when nothing matches.
    pub(crate) fn pop_up_to(
        &mut self,
        matches: impl Fn(&NavigationEntry) -> bool,
        inclusive: bool,
    ) -> bool {
        let Some(index) = self.back_stack.iter().rposition(matches) else {
            return false;
        };
        self.back_stack.truncate(if inclusive { index } else { index + 1 });
        self.prune_modal_contexts();
        true
    }

    /// Keep only the root entry.
    pub(crate) fn clear_to_root(&mut self) -> bool {
        if self.back_stack.len() <= 1 {
            return false;
        }
        self.back_stack.truncate(1);
        self.prune_modal_contexts();
        true
    }

    pub(crate) fn clear_all(&mut self) {
        self.back_stack.clear();
        self.modal_contexts.clear();
    }

    /// Remove the most recent modal and everything pushed over it.
    pub(crate) fn dismiss_modal(&mut self) -> bool {
        let Some(index) = self.back_stack.iter().rposition(NavigationEntry::is_modal) else {
            return false;
        };
        self.back_stack.truncate(index);
        self.prune_modal_contexts();
        true
    }

    /// Retire contexts of removed modals; a modal back on top is no longer
    /// navigated away from.
    fn prune_modal_contexts(&mut self) {
        let back_stack = &self.back_stack;
        self.modal_contexts
            .retain(|context| back_stack.iter().any(|e| e.id == context.modal_entry.id));

        if let Some(top) = self.back_stack.last() {
            for context in &mut self.modal_contexts {
                if context.modal_entry.id == top.id {
                    context.navigated_away_to = None;
                }
            }
        }
    }
}
