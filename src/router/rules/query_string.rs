use crate::application::Application;
use crate::request::{Params, Request};
use crate::router::Rule;

use super::{
    apply_target, collect_params, literal_path_matches, normalize_literal_path,
    replace_get_params, target_value, TARGET_KEYS,
};

/// Matches one literal path and keeps all variability in the query string.
///
/// Routing only fills in parameters the request does not carry. Unrouting
/// drops every parameter that equals its default, so the canonical URL stays
/// minimal.
pub struct BasicQueryStringRule {
    path: String,
    defaults: Params,
}

impl BasicQueryStringRule {
    pub fn new<I, K, V>(path: &str, defaults: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            path: normalize_literal_path(path),
            defaults: collect_params(defaults),
        }
    }

    #[must_use]
    pub fn defaults(&self) -> &Params {
        &self.defaults
    }
}

impl Rule for BasicQueryStringRule {
    fn matches(&self, _app: &Application, request: &Request) -> bool {
        literal_path_matches(&self.path, request)
    }

    fn route(&self, _app: &Application, mut request: Request) -> Request {
        let ambient = request.params();
        for (name, value) in &self.defaults {
            if !ambient.contains_key(name) {
                request.set_get_param(name.clone(), value.clone());
            }
        }

        let params = request.params();
        apply_target(&mut request, &params);
        request
    }

    fn unroute(&self, _app: &Application, mut request: Request) -> Request {
        let mut get_params = self.defaults.clone();
        get_params.extend(request.params());

        for key in TARGET_KEYS {
            match target_value(&request, key) {
                Some(value) => {
                    get_params.insert(key.to_string(), value.to_string());
                }
                None => {
                    get_params.remove(key);
                }
            }
        }
        get_params.retain(|name, value| self.defaults.get(name) != Some(value));

        replace_get_params(&mut request, get_params);
        request.set_relevant_path(&self.path);
        request
    }
}
