use crate::application::Application;
use crate::request::Request;
use crate::router::Rule;

/// Hook run by [`CallbackWrapper`] around the wrapped rule.
pub type RuleCallback = Box<dyn Fn(&Application, &mut Request)>;

/// Decorates a rule with an optional post-route and pre-unroute hook.
///
/// Typical use is turning rich parameters into URL-friendly ones and back,
/// e.g. expanding an entity id into an `id` and a `title` slug before
/// unrouting.
///
/// ```rust,ignore
/// router.add_rule("blog.read", CallbackWrapper::new(
///     DynamicRule::new("blog/:title/:id", [("module", "blog")]),
/// )
/// .before_unroute(|_app, req| {
///     let title = req.param("title").unwrap_or_default().to_lowercase().replace(' ', "-");
///     req.set_get_param("title", title);
/// }));
/// ```
pub struct CallbackWrapper<R> {
    rule: R,
    before_unroute: Option<RuleCallback>,
    after_route: Option<RuleCallback>,
}

impl<R: Rule> CallbackWrapper<R> {
    pub fn new(rule: R) -> Self {
        Self {
            rule,
            before_unroute: None,
            after_route: None,
        }
    }

    /// Called with the request before it is handed to the wrapped rule's
    /// `unroute`.
    #[must_use]
    pub fn before_unroute(mut self, callback: impl Fn(&Application, &mut Request) + 'static) -> Self {
        self.before_unroute = Some(Box::new(callback));
        self
    }

    /// Called with the request the wrapped rule's `route` produced.
    #[must_use]
    pub fn after_route(mut self, callback: impl Fn(&Application, &mut Request) + 'static) -> Self {
        self.after_route = Some(Box::new(callback));
        self
    }

    pub fn inner(&self) -> &R {
        &self.rule
    }
}

impl<R: Rule> Rule for CallbackWrapper<R> {
    fn matches(&self, app: &Application, request: &Request) -> bool {
        self.rule.matches(app, request)
    }

    fn route(&self, app: &Application, request: Request) -> Request {
        let mut request = self.rule.route(app, request);
        if let Some(callback) = &self.after_route {
            callback(app, &mut request);
        }
        request
    }

    fn unroute(&self, app: &Application, mut request: Request) -> Request {
        if let Some(callback) = &self.before_unroute {
            callback(app, &mut request);
        }
        self.rule.unroute(app, request)
    }
}
