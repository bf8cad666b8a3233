//! # CLI Module
//!
//! Inspect the routing table of a YAML configured application from the
//! command line.
//!
//! ## Commands
//!
//! ### `routes`
//!
//! List the rules in the order they are tried:
//!
//! ```bash
//! brrtmvc routes --config app.yaml
//! ```
//!
//! ### `route`
//!
//! Route a URL and print the target as JSON:
//!
//! ```bash
//! brrtmvc route --config app.yaml /blog/42 --post comment=hi
//! ```
//!
//! ### `unroute`
//!
//! Build the canonical URL of a target with a named rule:
//!
//! ```bash
//! brrtmvc unroute --config app.yaml --rule post --param id=42
//! ```
//!
//! ## Usage from Code
//!
//! ```rust,ignore
//! use brrtmvc::cli::run_cli;
//!
//! run_cli()?;
//! ```

mod commands;


pub use commands::{route_report, routes_report, run_cli, unroute_report, Cli, Commands};
