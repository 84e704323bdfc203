// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Operator confirmation.
//!
//! Destructive steps ask the operator before touching history. The prompt is
//! kept behind [`ConfirmPrompter`] so that orchestration logic never talks to
//! the terminal directly.

use inquire::Confirm;

/// Ask operator a yes/no question.
pub trait ConfirmPrompter {
    /// Prompt for confirmation, using `default` when operator just hits enter.
    ///
    /// # Errors
    ///
    /// - Return [`PromptError`] if the terminal cannot be read.
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool>;
}

/// Interactive confirmation through [`inquire`].
#[derive(Debug, Default, Clone, Copy)]
pub struct InquireConfirm;

impl ConfirmPrompter for InquireConfirm {
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool> {
        Ok(Confirm::new(prompt).with_default(default).prompt()?)
    }
}

/// Non-interactive confirmation for `--yes`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl ConfirmPrompter for AssumeYes {
    fn confirm(&mut self, _prompt: &str, _default: bool) -> Result<bool> {
        Ok(true)
    }
}

/// Pick prompter based on `--yes` flag.
pub fn prompter(assume_yes: bool) -> Box<dyn ConfirmPrompter> {
    if assume_yes {
        Box::new(AssumeYes)
    } else {
        Box::new(InquireConfirm)
    }
}

/// Prompt error types.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// Terminal interaction failed.
    #[error(transparent)]
    Inquire(#[from] inquire::InquireError),
}

/// Friendly result alias :3
pub type Result<T, E = PromptError> = std::result::Result<T, E>;
