// Copyright 2026 Sitemind Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sitemind — a memory-backed web agent.
//!
//! Explores a site breadth-first through a real browser, builds a
//! durable semantic memory of it (pages, elements, actions, task
//! recipes), and reuses that memory to plan and execute later
//! natural-language tasks with fewer exploratory steps.

pub mod agent;
pub mod browser;
pub mod cli;
pub mod config;
pub mod executor;
pub mod explorer;
pub mod memory;
pub mod model;
pub mod planner;
pub mod tagger;
