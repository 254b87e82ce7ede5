//! Item ids and token checkpoints.
//!
//! Every step of a compiled rule takes an item id. A checkpoint remembers a token
//! position together with the item id that was current when it was taken, so when a
//! branch fails and the engine rolls back to an earlier item id, every checkpoint the
//! branch left behind goes with it.

use crate::{Engine, ParseError};

pub type ItemId = usize;

/// Called for each *accepted* checkpoint that a rollback removes. Returning `false`
/// refuses the rollback and aborts the parse with [`ParseError::Rejected`].
pub type RejectHook<C> = fn(&mut C, &Checkpoint) -> bool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub token_pos: usize,
    pub item_id: ItemId,
    /// Marked with `@` rather than `$`.
    pub accepted: bool,
}

impl<C> Engine<C> {
    /// Take a fresh item id. Returns the id that was current before the call.
    pub fn add_item(&mut self) -> ItemId {
        let id = self.item_id;
        self.item_id += 1;
        id
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    /// Roll back to `restore`, dropping every checkpoint taken after it.
    ///
    /// Returns `false` if the reject hook refused to drop an accepted checkpoint. The
    /// rollback still completes.
    pub fn reject_item(&mut self, restore: ItemId) -> bool {
        self.item_id = restore;
        let mut agreed = true;
        while let Some(top) = self.checkpoints.last().copied() {
            if top.item_id < restore {
                break;
            }
            self.checkpoints.pop();
            if top.accepted {
                if let Some(hook) = self.reject_hook {
                    if !hook(&mut self.context, &top) {
                        log::warn!("rollback of accepted item {} was refused", top.item_id);
                        agreed = false;
                    }
                }
            }
        }
        agreed
    }

    /// Remember the current token position. Returns the checkpoint's item id.
    pub fn push_token_pos(&mut self, accepted: bool) -> ItemId {
        let item_id = self.add_item();
        self.checkpoints.push(Checkpoint {
            token_pos: self.stream.token_pos(),
            item_id,
            accepted,
        });
        item_id
    }

    /// Pop the newest checkpoint and return the text consumed since it was taken.
    pub fn pushed_token_data(&mut self) -> Result<String, ParseError> {
        let checkpoint = self.checkpoints.pop().ok_or(ParseError::NoCheckpoint)?;
        self.token_data_from(checkpoint.token_pos)
    }

    /// Like [`pushed_token_data`](Engine::pushed_token_data) for the checkpoint at
    /// `index` (oldest first), without popping it.
    pub fn pushed_token_data_at(&self, index: usize) -> Result<String, ParseError> {
        let checkpoint = self.checkpoints.get(index).ok_or(ParseError::NoCheckpoint)?;
        self.token_data_from(checkpoint.token_pos)
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn clear_checkpoints(&mut self) {
        self.checkpoints.clear();
    }

    /// See [`RejectHook`].
    pub fn set_reject_hook(&mut self, hook: Option<RejectHook<C>>) {
        self.reject_hook = hook;
    }
}

#[cfg(test)]
mod tests {
    use super::{Checkpoint, RejectHook};
    use crate::Engine;

    fn refuse(calls: &mut usize, _: &Checkpoint) -> bool {
        *calls += 1;
        false
    }

    #[test]
    fn rollback_drops_later_checkpoints() {
        let mut engine = Engine::<()>::new();
        engine.set_input_text("abcdef");
        let restore = engine.item_id();
        engine.push_token_pos(false);
        engine.next_token().unwrap();
        engine.push_token_pos(true);
        engine.next_token().unwrap();
        assert_eq!(engine.checkpoints().len(), 2);
        assert_eq!(engine.pushed_token_data_at(0).unwrap(), "ab");

        assert!(engine.reject_item(restore + 1));
        assert_eq!(engine.checkpoints().len(), 1);
        assert_eq!(engine.item_id(), restore + 1);
        assert_eq!(engine.pushed_token_data().unwrap(), "ab");
        assert!(engine.pushed_token_data().is_err());
    }

    #[test]
    fn refused_rollbacks_are_reported() {
        let mut engine = Engine::with_context(0_usize);
        engine.set_reject_hook(Some(refuse as RejectHook<usize>));
        engine.set_input_text("x");
        engine.push_token_pos(false);
        assert!(engine.reject_item(0));
        engine.push_token_pos(true);
        assert!(!engine.reject_item(0));
        assert_eq!(*engine.context(), 1);
        assert!(engine.checkpoints().is_empty());
    }
}
