//! Rule implementations.
//!
//! All rules work on the relevant URL path, i.e. the decoded path with the
//! application's base path already removed.
//!
//! Precedence when several sources provide a value for the same field
//! (module, controller, action or any parameter): the ambient GET/POST
//! parameters win over path-captured values, which win over rule defaults.
//! [`StaticRule`] is the exception: its fixed module, controller and action
//! win over the ambient request.

mod callback;
mod dynamic;
mod query_string;
mod regex_rule;
mod static_rule;

pub use callback::{CallbackWrapper, RuleCallback};
pub use dynamic::DynamicRule;
pub use query_string::BasicQueryStringRule;
pub use regex_rule::RegexRule;
pub use static_rule::StaticRule;

use crate::request::{Params, Request};

pub(crate) const TARGET_KEYS: [&str; 3] = ["module", "controller", "action"];

/// `"a/b/"` becomes `"/a/b"`, `"/"` and `""` become `""`.
pub(crate) fn normalize_literal_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Exact comparison, both sides compared with a single trailing slash.
pub(crate) fn literal_path_matches(rule_path: &str, request: &Request) -> bool {
    let relevant = request.relevant_url_path();
    let path = format!("{}/", relevant.trim_end_matches('/'));
    path == format!("{rule_path}/")
}

pub(crate) fn collect_params<I, K, V>(params: I) -> Params
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    params
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Copy module, controller and action from `params` onto the request,
/// leaving fields without a value untouched.
pub(crate) fn apply_target(request: &mut Request, params: &Params) {
    if let Some(module) = params.get("module") {
        request.set_module(Some(module.clone()));
    }
    if let Some(controller) = params.get("controller") {
        request.set_controller(Some(controller.clone()));
    }
    if let Some(action) = params.get("action") {
        request.set_action(Some(action.clone()));
    }
}

pub(crate) fn target_value<'a>(request: &'a Request, key: &str) -> Option<&'a str> {
    match key {
        "module" => request.module(),
        "controller" => request.controller(),
        "action" => request.action(),
        _ => None,
    }
}

/// Overlay the request's module, controller and action (when set) on `params`.
pub(crate) fn overlay_target(params: &mut Params, request: &Request) {
    for key in TARGET_KEYS {
        if let Some(value) = target_value(request, key) {
            params.insert(key.to_string(), value.to_string());
        }
    }
}

/// Replace the GET parameters wholesale.
pub(crate) fn replace_get_params(request: &mut Request, params: Params) {
    request.clear_get_params();
    request.set_get_params(params);
}
