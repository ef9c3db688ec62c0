//! Business rules for the Taskosaur API.
//!
//! Every operation takes the caller as an [`access::Actor`] and resolves its
//! effective role through [`access::require`] before touching data. Services
//! return [`error::ServiceError`], which the server maps onto HTTP statuses.
//!
//! - [`auth`] - password login, JWT access/refresh tokens
//! - [`organizations`], [`workspaces`], [`projects`] - the tenancy tree
//! - [`members`] - membership management shared by all three levels
//! - [`tasks`], [`sprints`], [`workflows`] - work tracking
//! - [`invitations`] - email invitations and the [`mailer`] that sends them
//! - [`inbox`] - project email inboxes, rules and message ingestion
//! - [`charts`] - analytics aggregation

pub mod access;
pub mod auth;
pub mod charts;
pub mod crypto;
pub mod error;
pub mod inbox;
pub mod invitations;
pub mod mailer;
pub mod members;
pub mod organizations;
pub mod projects;
pub mod slugs;
pub mod sprints;
pub mod tasks;
pub mod users;
pub mod workflows;
pub mod workspaces;
