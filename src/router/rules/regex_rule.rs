use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::application::Application;
use crate::request::{Params, Request};
use crate::router::Rule;

use super::{apply_target, collect_params, overlay_target, replace_get_params};

/// `%%`, `%s`, `%d`, `%u` and their positional forms (`%2$s`).
static FORMAT_DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"%(?:(%)|(?:(\d+)\$)?([sdu]))").expect("format directive regex should be valid")
});

/// Matches the relevant path against a regular expression and binds the
/// capture groups, in order, to `param_names`.
///
/// Names may repeat, binding the same value to several parameters. Unrouting
/// fills a printf style `format` with the named values in the same order.
///
/// ```rust,ignore
/// let rule = RegexRule::new(r"(.+)_(\d+)", "%s_%d", [("module", "blog")], ["title", "id"])?;
/// ```
#[derive(Debug)]
pub struct RegexRule {
    regex: Regex,
    format: String,
    params: Params,
    param_names: Vec<String>,
}

impl RegexRule {
    /// Compile `pattern`. Leading and trailing slashes of `pattern` and
    /// `format` are normalized to a single leading slash.
    pub fn new<I, K, V, N, S>(
        pattern: &str,
        format: &str,
        params: I,
        param_names: N,
    ) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
        N: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let regex = Regex::new(&format!("^/(?:{})$", pattern.trim_matches('/')))?;
        Ok(Self {
            regex,
            format: format!("/{}", format.trim_matches('/')),
            params: collect_params(params),
            param_names: param_names.into_iter().map(Into::into).collect(),
        })
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }

    #[must_use]
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Rule defaults with the capture groups bound on top.
    fn captured_params(&self, path: &str) -> Option<Params> {
        let captures = self.regex.captures(path)?;
        let mut params = self.params.clone();
        for (index, group) in captures.iter().skip(1).enumerate() {
            let (Some(group), Some(name)) = (group, self.param_names.get(index)) else {
                continue;
            };
            params.insert(name.clone(), group.as_str().to_string());
        }
        Some(params)
    }
}

impl Rule for RegexRule {
    fn matches(&self, _app: &Application, request: &Request) -> bool {
        self.regex.is_match(&request.relevant_url_path())
    }

    fn route(&self, _app: &Application, mut request: Request) -> Request {
        let Some(mut params) = self.captured_params(&request.relevant_url_path()) else {
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
        let args: Vec<String> = self
            .param_names
            .iter()
            .map(|name| {
                residual.remove(name);
                params.get(name).cloned().unwrap_or_default()
            })
            .collect();

        let relevant = format_path(&self.format, &args);
        residual.retain(|name, value| self.params.get(name) != Some(value));
        replace_get_params(&mut request, residual);
        request.set_relevant_path(&relevant);
        request
    }
}

/// Substitute `args` into `format`.
///
/// `%s` inserts the URL-encoded argument, `%d` and `%u` the leading integer of
/// the argument (`0` when there is none), `%%` a literal percent sign.
/// Missing arguments format as empty or zero.
pub(crate) fn format_path(format: &str, args: &[String]) -> String {
    let mut next = 0usize;
    FORMAT_DIRECTIVE
        .replace_all(format, |caps: &Captures<'_>| {
            if caps.get(1).is_some() {
                return "%".to_string();
            }
            let index = match caps.get(2).and_then(|m| m.as_str().parse::<usize>().ok()) {
                Some(position) => position.saturating_sub(1),
                None => {
                    let index = next;
                    next += 1;
                    index
                }
            };
            let arg = args.get(index).map(String::as_str).unwrap_or_default();
            match caps.get(3).map(|m| m.as_str()) {
                Some("d") => leading_integer(arg, true).to_string(),
                Some("u") => leading_integer(arg, false).to_string(),
                _ => urlencoding::encode(arg).into_owned(),
            }
        })
        .into_owned()
}

fn leading_integer(value: &str, signed: bool) -> i64 {
    let trimmed = value.trim_start();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) if signed => (true, rest),
        _ => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let magnitude = digits[..end].parse::<i64>().unwrap_or(0);
    if negative {
        -magnitude
    } else {
        magnitude
    }
}
