// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Hyprland dotfile release manager.
//!
//! Hyprrelease installs community maintained Hyprland dotfiles, and keeps
//! track of what version of them is installed. Neither task is as simple as
//! it sounds:
//!
//! - Dotfile bundles advertise their version through hosted releases, Git
//!   tags, branch names, or not at all. See [`version`] for how competing
//!   sources get merged into one answer.
//! - Dotfile bundles install themselves through scripts, README steps, or
//!   plain file copies. See [`install`] for the tiered strategy that copes
//!   with all of them.
//!
//! The [`manager::Manager`] type wires everything up into the workflows the
//! command-line interface exposes.

pub mod ai;
pub mod audit;
pub mod clone;
pub mod config;
pub mod install;
pub mod manager;
pub mod path;
pub mod registry;
pub mod safety;
pub mod store;
pub mod version;
