//! Generic persistence and service layer: soft-deletable, audited rows
//! behind a repository trait, and the capability traits services expose.

pub mod auditor;
pub mod entity;
pub mod page;
pub mod repository;
pub mod service;
