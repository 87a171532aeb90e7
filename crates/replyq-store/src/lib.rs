// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage layer for Replyq.
//!
//! Two concerns live here. The shared volatile store (job registries, job
//! documents, stats) sits behind [`StoreGateway`] with memory and SQLite-file
//! backends. The record database (messages, channels, templates) is a
//! WAL-mode SQLite file with embedded migrations and a single writer via
//! `tokio-rusqlite`.

pub mod database;
pub mod gateway;
pub mod memory;
pub mod migrations;
pub mod queries;
pub mod repository;
pub mod sqlite;

pub use database::Database;
pub use gateway::{StoreConnector, StoreGateway, connector_from_config};
pub use memory::{MemoryConnector, MemoryStore};
pub use repository::SqliteRecords;
pub use sqlite::{SqliteConnector, SqliteKvStore};
