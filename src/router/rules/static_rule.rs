use crate::application::Application;
use crate::request::{Params, Request};
use crate::router::Rule;

use super::{
    apply_target, collect_params, literal_path_matches, normalize_literal_path,
    replace_get_params, target_value, TARGET_KEYS,
};

/// Matches one literal path and dispatches it to a fixed target.
///
/// Fixed module, controller and action outrank whatever the request already
/// carries; fields the rule does not fix fall back to the request parameters.
///
/// ```rust,ignore
/// router.add_rule("about", StaticRule::new("about", [
///     ("module", "general"),
///     ("controller", "pages"),
///     ("action", "about"),
/// ]));
/// ```
pub struct StaticRule {
    path: String,
    params: Params,
}

impl StaticRule {
    pub fn new<I, K, V>(path: &str, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            path: normalize_literal_path(path),
            params: collect_params(params),
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }
}

impl Rule for StaticRule {
    fn matches(&self, _app: &Application, request: &Request) -> bool {
        literal_path_matches(&self.path, request)
    }

    fn route(&self, _app: &Application, mut request: Request) -> Request {
        request.set_get_params(self.params.clone());

        let mut target = request.params();
        for key in TARGET_KEYS {
            if let Some(fixed) = self.params.get(key) {
                target.insert(key.to_string(), fixed.clone());
            }
        }
        apply_target(&mut request, &target);
        request
    }

    fn unroute(&self, _app: &Application, mut request: Request) -> Request {
        let mut get_params = request.get_params().clone();
        // Fixed values come back on the next route.
        get_params.retain(|name, value| self.params.get(name) != Some(value));

        // Whatever the rule does not fix has to travel in the query string.
        for key in TARGET_KEYS {
            if self.params.contains_key(key) {
                continue;
            }
            match target_value(&request, key) {
                Some(value) => {
                    get_params.insert(key.to_string(), value.to_string());
                }
                None => {
                    get_params.remove(key);
                }
            }
        }

        replace_get_params(&mut request, get_params);
        request.set_relevant_path(&self.path);
        request
    }
}
