//! # Router Module
//!
//! The router converts a request URL into a dispatch target (module,
//! controller, action and parameters) and back. Both directions go through
//! the same named [`Rule`]s, so every URL the application produces is one it
//! can route.
//!
//! ## Priority
//!
//! [`RuleBasedRouter`] tries rules from the most recently added to the oldest
//! and the first rule whose `matches` succeeds routes the request. Adding a
//! rule under an existing name replaces it and makes it the first one tried.
//! A request no rule matches is returned unchanged; dispatch then reports a
//! missing page.
//!
//! Unrouting always names its rule; an unknown name leaves the request
//! unchanged and logs a warning.
//!
//! ## Rules
//!
//! | Rule | Matches | Example |
//! |------|---------|---------|
//! | [`StaticRule`](rules::StaticRule) | one literal path | `about` |
//! | [`DynamicRule`](rules::DynamicRule) | literal and `:name` segments | `blog/:id` |
//! | [`RegexRule`](rules::RegexRule) | a regular expression, printf style format for URLs | `(.+)_(\d+)` / `%s_%d` |
//! | [`BasicQueryStringRule`](rules::BasicQueryStringRule) | one literal path, parameters in the query | `search?q=...` |
//! | [`CallbackWrapper`](rules::CallbackWrapper) | whatever the wrapped rule matches | |
//!
//! ## Example
//!
//! ```rust,ignore
//! use brrtmvc::router::{rules::DynamicRule, RuleBasedRouter};
//!
//! let mut router = RuleBasedRouter::new();
//! router.add_rule("blog.read", DynamicRule::new("blog/:id", [
//!     ("module", "blog"),
//!     ("controller", "post"),
//!     ("action", "read"),
//! ]));
//! ```

mod core;
pub mod rules;

pub use core::{Router, Rule, RuleBasedRouter};
