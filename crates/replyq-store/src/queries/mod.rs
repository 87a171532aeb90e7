// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules for the record database.

pub mod channels;
pub mod messages;
pub mod templates;
