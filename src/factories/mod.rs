//! # Factories: recipes for starting workers.
//!
//! A [`Factory`] declares which item keys its workers require, which keys
//! they are expected to provide, and a [`Start`] recipe the injector
//! invokes with a concrete [`Deps`] list once every required key is
//! available.
//!
//! - [`Factory`] — the registration bundle (id, requires, provides, start)
//! - [`Start`] / [`StartFn`] — the recipe trait and its closure adapter
//! - [`Deps`] — the ordered key→value list handed to a recipe

mod deps;
mod factory;
mod start;

pub use deps::Deps;
pub use factory::{Factory, FactoryId};
pub use start::{Start, StartFn};
