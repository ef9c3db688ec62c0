//! Row types and repositories for the Taskosaur schema.
//!
//! Each entity exposes its queries as associated functions taking any
//! [`sqlx::PgExecutor`], so the same call works against the pool or inside a
//! transaction (`&mut *tx`). Functions that issue several statements take a
//! `&mut PgConnection` instead.

pub mod access;
pub mod charts;
pub mod inbox;
pub mod invitation;
pub mod member;
pub mod organization;
pub mod project;
pub mod role;
pub mod sprint;
pub mod task;
pub mod user;
pub mod workflow;
pub mod workspace;
