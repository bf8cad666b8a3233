use crate::application::Application;
use crate::request::{Params, Request};
use crate::router::Rule;

use super::{apply_target, collect_params, overlay_target, replace_get_params};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// Template rule made of literal and `:name` segments.
///
/// A request may have fewer segments than the template as long as every
/// missing variable has a default. Extracted values lose against GET/POST
/// parameters of the same name.
///
/// ```rust,ignore
/// router.add_rule("blog.read", DynamicRule::new("blog/:id", [
///     ("module", "blog"),
///     ("controller", "post"),
///     ("action", "read"),
/// ]));
/// ```
pub struct DynamicRule {
    segments: Vec<Segment>,
    params: Params,
}

impl DynamicRule {
    pub fn new<I, K, V>(path: &str, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let trimmed = path.trim_matches('/');
        let segments = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed
                .split('/')
                .map(|segment| match segment.strip_prefix(':') {
                    Some(name) => Segment::Variable(name.to_string()),
                    None => Segment::Literal(segment.to_string()),
                })
                .collect()
        };

        Self {
            segments,
            params: collect_params(params),
        }
    }

    #[must_use]
    pub fn defaults(&self) -> &Params {
        &self.params
    }

    /// Rule defaults overlaid with the values bound from the request path, or
    /// `None` when the path does not fit the template.
    fn extract_params(&self, request: &Request) -> Option<Params> {
        let relevant = request.relevant_url_path();
        let trimmed = relevant.trim_matches('/');
        let request_segments: Vec<&str> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').collect()
        };

        if request_segments.len() > self.segments.len() {
            return None;
        }

        let mut params = self.params.clone();
        for (index, segment) in self.segments.iter().enumerate() {
            let value = request_segments.get(index).copied();
            match segment {
                Segment::Literal(literal) => {
                    if value != Some(literal.as_str()) {
                        return None;
                    }
                }
                Segment::Variable(name) => match value {
                    Some(value) => {
                        params.insert(name.clone(), value.to_string());
                    }
                    None if self.params.contains_key(name) => {}
                    None => return None,
                },
            }
        }
        Some(params)
    }
}

impl Rule for DynamicRule {
    fn matches(&self, _app: &Application, request: &Request) -> bool {
        self.extract_params(request).is_some()
    }

    fn route(&self, _app: &Application, mut request: Request) -> Request {
        let Some(mut params) = self.extract_params(&request) else {
            return request;
        };
        params.extend(request.params());

        apply_target(&mut request, &params);
        request.set_get_params(params);
        request
    }

    fn unroute(&self, _app: &Application, mut request: Request) -> Request {
        let ambient = request.params();

        let mut params = self.params.clone();
        params.extend(ambient.clone());
        overlay_target(&mut params, &request);

        let mut residual = ambient;
        let mut relevant = String::new();
        for segment in &self.segments {
            relevant.push('/');
            match segment {
                Segment::Literal(literal) => relevant.push_str(literal),
                Segment::Variable(name) => {
                    let value = params.get(name).map(String::as_str).unwrap_or_default();
                    relevant.push_str(&urlencoding::encode(value));
                    residual.remove(name);
                }
            }
        }
        if relevant.is_empty() {
            relevant.push('/');
        }

        residual.retain(|name, value| self.params.get(name) != Some(value));
        replace_get_params(&mut request, residual);
        request.set_relevant_path(&relevant);
        request
    }
}
