//! Cachability policy: the pure decision function over request context.

use tracing::debug;

/// Per-request context consumed by the cachability decision.
///
/// Ephemeral: built by the host for each request, consumed once, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Request targets an admin/control surface.
    pub is_admin: bool,
    /// Pretty-URL (permalink) support is enabled site-wide.
    pub pretty_urls: bool,
    /// Requester is authenticated.
    pub is_authenticated: bool,
    /// Request carries a query string.
    pub has_query: bool,
    /// Request carries submitted form/body fields.
    pub has_form_body: bool,
    /// Request is a feed/syndication request.
    pub is_feed: bool,
    /// Raw request path.
    pub path: String,
}

impl RequestContext {
    /// A plain anonymous GET for `path`, the common cachable shape.
    pub fn anonymous_get(path: impl Into<String>) -> Self {
        Self {
            is_admin: false,
            pretty_urls: true,
            is_authenticated: false,
            has_query: false,
            has_form_body: false,
            is_feed: false,
            path: path.into(),
        }
    }
}

/// A registered veto predicate. Returning `false` vetoes the write.
pub type VetoPredicate = Box<dyn Fn(&RequestContext) -> bool + Send + Sync>;

/// Decides whether a request's response is eligible for the cache.
///
/// The base decision is fail-closed; registered vetoes run in
/// registration order and can only further restrict it, short-circuiting
/// on the first veto.
pub struct CachePolicy {
    exempt_substrings: Vec<String>,
    vetoes: Vec<VetoPredicate>,
}

impl CachePolicy {
    pub fn new(exempt_substrings: Vec<String>) -> Self {
        Self {
            exempt_substrings,
            vetoes: Vec::new(),
        }
    }

    /// Register a veto predicate. Predicates run after the base decision,
    /// in registration order.
    pub fn register_veto(&mut self, veto: VetoPredicate) {
        self.vetoes.push(veto);
    }

    pub fn is_cachable(&self, ctx: &RequestContext) -> bool {
        if ctx.is_admin
            || !ctx.pretty_urls
            || ctx.is_authenticated
            || ctx.has_query
            || ctx.has_form_body
            || ctx.is_feed
            || ctx.path.is_empty()
        {
            return false;
        }

        if let Some(pattern) = self
            .exempt_substrings
            .iter()
            .find(|pattern| ctx.path.contains(pattern.as_str()))
        {
            debug!(path = %ctx.path, pattern = %pattern, "request exempt from caching");
            return false;
        }

        for (index, veto) in self.vetoes.iter().enumerate() {
            if !veto(ctx) {
                debug!(path = %ctx.path, veto_index = index, "cachability vetoed");
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CachePolicy {
        CachePolicy::new(vec![
            "admin".to_string(),
            ".php".to_string(),
            "checkout".to_string(),
            "cart".to_string(),
        ])
    }

    #[test]
    fn plain_anonymous_get_is_cachable() {
        let ctx = RequestContext::anonymous_get("/hello-world/");
        assert!(policy().is_cachable(&ctx));
    }

    #[test]
    fn query_string_always_blocks() {
        // Regardless of every other field being in its most cachable state.
        let ctx = RequestContext {
            has_query: true,
            ..RequestContext::anonymous_get("/hello-world/")
        };
        assert!(!policy().is_cachable(&ctx));
    }

    #[test]
    fn each_context_flag_blocks() {
        let base = RequestContext::anonymous_get("/hello-world/");
        let blocked = [
            RequestContext {
                is_admin: true,
                ..base.clone()
            },
            RequestContext {
                pretty_urls: false,
                ..base.clone()
            },
            RequestContext {
                is_authenticated: true,
                ..base.clone()
            },
            RequestContext {
                has_form_body: true,
                ..base.clone()
            },
            RequestContext {
                is_feed: true,
                ..base.clone()
            },
            RequestContext {
                path: String::new(),
                ..base.clone()
            },
        ];
        for ctx in blocked {
            assert!(!policy().is_cachable(&ctx), "{ctx:?} should not be cachable");
        }
    }

    #[test]
    fn exempt_substring_blocks() {
        let ctx = RequestContext::anonymous_get("/checkout/step-1");
        assert!(!policy().is_cachable(&ctx));
    }

    #[test]
    fn exempt_matches_anywhere_in_path() {
        let ctx = RequestContext::anonymous_get("/shop/cart/");
        assert!(!policy().is_cachable(&ctx));
    }

    #[test]
    fn veto_chain_restricts() {
        let mut policy = policy();
        policy.register_veto(Box::new(|ctx| !ctx.path.starts_with("/preview")));

        assert!(policy.is_cachable(&RequestContext::anonymous_get("/hello-world/")));
        assert!(!policy.is_cachable(&RequestContext::anonymous_get("/preview/draft/")));
    }

    #[test]
    fn vetoes_run_in_order_and_short_circuit() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let second_calls = Arc::new(AtomicUsize::new(0));
        let counter = second_calls.clone();

        let mut policy = policy();
        policy.register_veto(Box::new(|_| false));
        policy.register_veto(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        }));

        assert!(!policy.is_cachable(&RequestContext::anonymous_get("/hello-world/")));
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn veto_cannot_widen() {
        let mut policy = policy();
        // A permissive predicate cannot resurrect a request the base
        // decision already rejected.
        policy.register_veto(Box::new(|_| true));

        let ctx = RequestContext {
            has_query: true,
            ..RequestContext::anonymous_get("/hello-world/")
        };
        assert!(!policy.is_cachable(&ctx));
    }
}
