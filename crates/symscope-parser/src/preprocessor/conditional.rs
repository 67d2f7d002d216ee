//! Conditional compilation state
//!
//! One [`ConditionalFrame`] per open `#if` group. A region is active when
//! every enclosing frame took its current branch.

use serde::{Deserialize, Serialize};
use symscope_core::Location;
use thiserror::Error;

/// Misplaced conditional directive
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionalError {
    #[error("{0} without matching #if")]
    Unmatched(&'static str),

    #[error("{0} after #else")]
    AfterElse(&'static str),
}

/// State of one open `#if` group
#[derive(Debug, Clone)]
pub struct ConditionalFrame {
    /// Current branch is taken
    pub taken: bool,
    /// Some branch of this group has been taken
    pub any_taken: bool,
    /// Every enclosing group is active
    pub parent_active: bool,
    /// `#else` already seen
    pub seen_else: bool,
    /// Location of the opening directive
    pub opened_at: Location,
    /// Index of the current branch in the branch log
    branch: usize,
}

/// One branch of a conditional group, as recorded in the branch log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRecord {
    /// Directive that opened the branch, e.g. `#elif defined(BAR)`
    pub directive: String,
    pub location: Location,
    /// Directive that closed the branch
    pub end: Option<Location>,
    /// Nesting depth, 1 for an outermost group
    pub depth: usize,
    /// Branch text is active
    pub taken: bool,
}

/// Stack of open conditional groups plus the log of every branch seen
#[derive(Debug, Clone, Default)]
pub struct ConditionalStack {
    frames: Vec<ConditionalFrame>,
    branches: Vec<BranchRecord>,
}

impl ConditionalStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether text at the current position is active
    pub fn is_active(&self) -> bool {
        self.frames
            .last()
            .map_or(true, |f| f.parent_active && f.taken)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Open a group (`#if`, `#ifdef`, `#ifndef`). `condition` is ignored
    /// when the enclosing region is inactive. Returns whether the
    /// following region is active.
    pub fn push_if(&mut self, directive: impl Into<String>, condition: bool, location: Location) -> bool {
        let parent_active = self.is_active();
        let taken = parent_active && condition;
        let branch = self.record(directive.into(), location.clone(), taken, self.frames.len() + 1);
        self.frames.push(ConditionalFrame {
            taken,
            any_taken: taken,
            parent_active,
            seen_else: false,
            opened_at: location,
            branch,
        });
        taken
    }

    /// Whether an `#elif` at this point needs its expression evaluated.
    /// False when an earlier branch was taken or the group is inactive.
    pub fn elif_wants_evaluation(&self) -> bool {
        self.frames
            .last()
            .is_some_and(|f| f.parent_active && !f.any_taken && !f.seen_else)
    }

    pub fn elif(
        &mut self,
        directive: impl Into<String>,
        condition: bool,
        location: Location,
    ) -> Result<bool, ConditionalError> {
        let depth = self.frames.len();
        let Some(frame) = self.frames.last_mut() else {
            return Err(ConditionalError::Unmatched("#elif"));
        };
        let after_else = frame.seen_else;
        let taken = !after_else && frame.parent_active && !frame.any_taken && condition;
        frame.taken = taken;
        frame.any_taken |= taken;
        let previous = frame.branch;
        self.close_branch(previous, &location);
        let branch = self.record(directive.into(), location, taken, depth);
        if let Some(frame) = self.frames.last_mut() {
            frame.branch = branch;
        }
        if after_else {
            return Err(ConditionalError::AfterElse("#elif"));
        }
        Ok(taken)
    }

    pub fn else_(&mut self, location: Location) -> Result<bool, ConditionalError> {
        let depth = self.frames.len();
        let Some(frame) = self.frames.last_mut() else {
            return Err(ConditionalError::Unmatched("#else"));
        };
        let after_else = frame.seen_else;
        let taken = !after_else && frame.parent_active && !frame.any_taken;
        frame.taken = taken;
        frame.any_taken |= taken;
        frame.seen_else = true;
        let previous = frame.branch;
        self.close_branch(previous, &location);
        let branch = self.record("#else".to_string(), location, taken, depth);
        if let Some(frame) = self.frames.last_mut() {
            frame.branch = branch;
        }
        if after_else {
            return Err(ConditionalError::AfterElse("#else"));
        }
        Ok(taken)
    }

    pub fn endif(&mut self, location: Location) -> Result<bool, ConditionalError> {
        let frame = self
            .frames
            .pop()
            .ok_or(ConditionalError::Unmatched("#endif"))?;
        self.close_branch(frame.branch, &location);
        Ok(self.is_active())
    }

    /// Close every group still open at end of input, returning where each
    /// one was opened (outermost first)
    pub fn finish(&mut self, end: &Location) -> Vec<Location> {
        let open: Vec<ConditionalFrame> = self.frames.drain(..).collect();
        for frame in &open {
            self.close_branch(frame.branch, end);
        }
        open.into_iter().map(|f| f.opened_at).collect()
    }

    pub fn branches(&self) -> &[BranchRecord] {
        &self.branches
    }

    pub fn into_branches(self) -> Vec<BranchRecord> {
        self.branches
    }

    fn record(&mut self, directive: String, location: Location, taken: bool, depth: usize) -> usize {
        self.branches.push(BranchRecord {
            directive,
            location,
            end: None,
            depth,
            taken,
        });
        self.branches.len() - 1
    }

    fn close_branch(&mut self, index: usize, end: &Location) {
        if let Some(record) = self.branches.get_mut(index) {
            record.end = Some(end.clone());
        }
    }
}
