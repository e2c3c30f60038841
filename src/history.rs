use crate::command::Command;
use crate::error::{EditorError, Result};

/// Linear command log with a pointer.
///
/// `commands[..pointer]` is what the current raster was built from; anything
/// past the pointer is the redo branch, dropped by the next push.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    commands: Vec<Command>,
    pointer: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        if self.pointer < self.commands.len() {
            tracing::debug!(
                "Dropping {} redo entries",
                self.commands.len() - self.pointer
            );
            self.commands.truncate(self.pointer);
        }
        tracing::info!("History push: {}", command);
        self.commands.push(command);
        self.pointer += 1;
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// The prefix the current raster reflects.
    pub fn applied(&self) -> &[Command] {
        &self.commands[..self.pointer]
    }

    pub fn pointer(&self) -> usize {
        self.pointer
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.pointer > 0
    }

    pub fn can_redo(&self) -> bool {
        self.pointer < self.commands.len()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.pointer = 0;
    }

    /// Pointer value after one undo. Does not move the pointer.
    pub fn undo_target(&self) -> Result<usize> {
        if self.can_undo() {
            Ok(self.pointer - 1)
        } else {
            Err(EditorError::NothingToUndo)
        }
    }

    /// Pointer value after one redo. Does not move the pointer.
    pub fn redo_target(&self) -> Result<usize> {
        if self.can_redo() {
            Ok(self.pointer + 1)
        } else {
            Err(EditorError::NothingToRedo)
        }
    }

    /// Move the pointer once the raster has been rebuilt for it.
    pub(crate) fn set_pointer(&mut self, pointer: usize) {
        debug_assert!(pointer <= self.commands.len());
        self.pointer = pointer.min(self.commands.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn push_after_undo_truncates_redo_branch() {
        let mut history = History::new();
        history.push(Command::FlipHorizontal);
        history.push(Command::FlipVertical);
        history.push(Command::RotateLeft(90.0));
        history.set_pointer(history.undo_target().unwrap());
        history.set_pointer(history.undo_target().unwrap());
        assert_eq!(history.pointer(), 1);

        history.push(Command::Scale { width: 10, height: 5 });
        assert_eq!(
            history.commands(),
            &[Command::FlipHorizontal, Command::Scale { width: 10, height: 5 }]
        );
        assert_eq!(history.pointer(), 2);
        assert!(!history.can_redo());
    }

    #[test]
    fn targets_respect_bounds() {
        let mut history = History::new();
        assert!(matches!(history.undo_target(), Err(EditorError::NothingToUndo)));
        assert!(matches!(history.redo_target(), Err(EditorError::NothingToRedo)));

        history.push(Command::FlipVertical);
        assert_eq!(history.undo_target().unwrap(), 0);
        history.set_pointer(0);
        assert_eq!(history.redo_target().unwrap(), 1);
        assert!(history.applied().is_empty());
    }

    #[test]
    fn clear_empties_log() {
        let mut history = History::new();
        history.push(Command::RemoveBackground);
        history.clear();
        assert_eq!(history, History::new());
    }
}
