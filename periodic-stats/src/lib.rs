#![warn(clippy::all, clippy::pedantic)]

// disable some style lints
#![allow(clippy::needless_return, clippy::must_use_candidate, clippy::comparison_chain)]
#![allow(clippy::redundant_field_names, clippy::redundant_closure_for_method_calls)]
#![allow(clippy::unreadable_literal, clippy::option_if_let_else, clippy::range_plus_one)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc, clippy::module_name_repetitions)]

#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap, clippy::cast_lossless, clippy::cast_sign_loss)]
#![allow(clippy::default_trait_access, clippy::too_many_arguments)]

// Tests lints
#![cfg_attr(test, allow(clippy::float_cmp))]

//! Spatial statistics over sets of points in periodic simulation boxes.
//!
//! The [`locality`] module contains the periodic box geometry, the spatial
//! index and neighbor queries producing [`locality::NeighborList`]s, and the
//! solid-angle neighbor filter. The [`histogram`] module contains the
//! parallel accumulation and reduction engine shared by all binned
//! statistics, and [`statistics`] contains the concrete statistics built on
//! top of it.

pub mod types;
pub use types::*;

mod errors;
pub use self::errors::Error;

pub mod locality;
pub use locality::{PeriodicBox, NeighborList, NeighborQuery, QueryArgs};

pub mod host;
pub use host::{HostLock, NoHostLock};

pub mod histogram;
pub use histogram::{Histogram, WorkerPool};

pub mod statistics;
