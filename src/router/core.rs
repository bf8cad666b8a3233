use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::application::Application;
use crate::request::Request;

/// A named, stateless matcher/encoder.
///
/// `route` decodes a request URL into module, controller, action and
/// parameters; `unroute` encodes those back into a URL. `route` is only
/// called on requests for which `matches` returned `true`.
pub trait Rule {
    fn matches(&self, app: &Application, request: &Request) -> bool;

    fn route(&self, app: &Application, request: Request) -> Request;

    fn unroute(&self, app: &Application, request: Request) -> Request;
}

/// Converts requests to dispatch targets and back.
pub trait Router {
    /// Resolve module, controller, action and parameters. A request nothing
    /// matches is returned unmodified; dispatch will then report a missing page.
    fn route(&self, app: &Application, request: Request) -> Request;

    /// Encode the request's target into its URL using the rule named
    /// `rule_name`.
    fn unroute(&self, app: &Application, request: Request, rule_name: &str) -> Request;

    /// Access to the rule table when this router is rule based.
    fn as_rule_based(&self) -> Option<&RuleBasedRouter> {
        None
    }

    fn as_rule_based_mut(&mut self) -> Option<&mut RuleBasedRouter> {
        None
    }
}

/// Router over an ordered, named set of [`Rule`]s.
///
/// The most recently added rule is tried first. Adding a rule under an
/// existing name replaces the old rule and moves the name to the front.
#[derive(Default)]
pub struct RuleBasedRouter {
    rules: HashMap<String, Box<dyn Rule>>,
    /// Rule names, lowest priority first
    priority: Vec<String>,
}

impl RuleBasedRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `rule` under `name` with the highest priority.
    pub fn add_rule(&mut self, name: impl Into<String>, rule: impl Rule + 'static) -> &mut Self {
        self.add_boxed_rule(name, Box::new(rule))
    }

    pub fn add_boxed_rule(&mut self, name: impl Into<String>, rule: Box<dyn Rule>) -> &mut Self {
        let name = name.into();
        let replaced = self.remove_rule(&name);
        debug!(rule = %name, replaced, "Rule added");
        self.priority.push(name.clone());
        self.rules.insert(name, rule);
        self
    }

    /// Remove the rule named `name`. Returns whether it existed.
    pub fn remove_rule(&mut self, name: &str) -> bool {
        if self.rules.remove(name).is_none() {
            return false;
        }
        self.priority.retain(|n| n != name);
        true
    }

    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&dyn Rule> {
        self.rules.get(name).map(|r| r.as_ref())
    }

    /// Rule names in the order they are tried.
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.priority.iter().rev().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.priority.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.priority.is_empty()
    }
}

impl Router for RuleBasedRouter {
    fn route(&self, app: &Application, request: Request) -> Request {
        let match_start = Instant::now();
        let path = request.relevant_url_path();

        for name in self.rule_names() {
            let Some(rule) = self.rules.get(name) else {
                continue;
            };
            let matched = rule.matches(app, &request);
            debug!(rule = %name, path = %path, matched, "Route match attempt");
            if matched {
                let routed = rule.route(app, request);
                info!(
                    rule = %name,
                    path = %path,
                    module = ?routed.module(),
                    controller = ?routed.controller(),
                    action = ?routed.action(),
                    duration_us = match_start.elapsed().as_micros(),
                    "Route matched"
                );
                return routed;
            }
        }

        warn!(
            path = %path,
            rules = self.priority.len(),
            duration_us = match_start.elapsed().as_micros(),
            "No rule matched"
        );
        request
    }

    fn unroute(&self, app: &Application, request: Request, rule_name: &str) -> Request {
        match self.rules.get(rule_name) {
            Some(rule) => rule.unroute(app, request),
            None => {
                // Unknown names pass the request through unchanged.
                warn!(rule = %rule_name, "Unroute with unknown rule name");
                request
            }
        }
    }

    fn as_rule_based(&self) -> Option<&RuleBasedRouter> {
        Some(self)
    }

    fn as_rule_based_mut(&mut self) -> Option<&mut RuleBasedRouter> {
        Some(self)
    }
}
