//! `engram-routing` – topic-keyed dispatch of payloads to handlers.
//!
//! - [`condition`] – [`Condition`], the declarative predicate attached to a
//!   routing rule.
//! - [`table`] – [`RoutingTable`], the [`Handler`] trait, and routing
//!   history / statistics.

pub mod condition;
pub mod table;

pub use condition::Condition;
pub use table::{
    FnHandler, Handler, RouteOutcome, RouteRecord, RouteVia, RoutingRule, RoutingStats,
    RoutingTable, TryFnHandler,
};
