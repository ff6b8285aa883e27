// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! User confirmation prompts.

use inquire::{Confirm, Text};
use tracing::warn;

/// Layer of indirection for asking the user things.
pub trait Prompt: Send + Sync {
    /// Ask user to confirm a list of items.
    ///
    /// Anything other than an explicit yes counts as decline.
    fn confirm(&self, message: &str, items: &[String]) -> bool;

    /// Ask user for free text, offering a default answer.
    ///
    /// Returns `None` if the prompt could not be shown.
    fn text(&self, message: &str, default: &str) -> Option<String>;
}

/// Interactive terminal prompts.
#[derive(Default, Debug, Clone, Copy)]
pub struct InquirePrompter;

impl Prompt for InquirePrompter {
    fn confirm(&self, message: &str, items: &[String]) -> bool {
        for item in items {
            println!("  {item}");
        }

        match Confirm::new(message).with_default(false).prompt() {
            Ok(answer) => answer,
            Err(error) => {
                warn!("confirmation failed, assuming no: {error}");
                false
            }
        }
    }

    fn text(&self, message: &str, default: &str) -> Option<String> {
        Text::new(message)
            .with_default(default)
            .prompt()
            .map_err(|error| warn!("prompt failed: {error}"))
            .ok()
    }
}

/// Non-interactive prompts that decline everything.
#[derive(Default, Debug, Clone, Copy)]
pub struct AlwaysDecline;

impl Prompt for AlwaysDecline {
    fn confirm(&self, _message: &str, _items: &[String]) -> bool {
        false
    }

    fn text(&self, _message: &str, default: &str) -> Option<String> {
        Some(default.to_string())
    }
}
