//! Rewrite-rule generation for the front-end web server, plus the asset
//! URL filter that strips cache-busting version parameters.
//!
//! Pure text generation from configuration; no runtime state.

use crate::paths::ARTIFACT_FILENAME;

/// Cookies whose presence marks a session-bound request; such requests
/// must always reach the renderer.
const IDENTITY_COOKIES: &str = "session_test_cookie|comment_author|post_pass|logged_in|mobile_switch";

/// Asset query parameter carrying a cache-busting version.
const VERSION_PARAM: &str = "ver";

/// Generate the declarative rewrite block for the front-end server:
/// a pass-through rule for requests already targeting the cache alias, a
/// conditional rewrite serving cached artifacts directly, and long-lived
/// expiry headers for static asset types.
pub fn rewrite_block(base_path: &str, cache_alias: &str) -> String {
    let base = if base_path.is_empty() { "/" } else { base_path };
    let cache_url = collapse(&format!("{base}{cache_alias}"));

    format!(
        "<IfModule mod_rewrite.c>\n\
         \tRewriteEngine On\n\
         \tRewriteBase {base}\n\
         \tRewriteRule ^{cache_url}/ - [L]\n\
         \n\
         \tRewriteCond %{{REQUEST_METHOD}} !POST\n\
         \tRewriteCond %{{QUERY_STRING}} !.*=.*\n\
         \tRewriteCond %{{HTTP_COOKIE}} !({IDENTITY_COOKIES}) [NC]\n\
         \tRewriteCond %{{DOCUMENT_ROOT}}{cache_url}/$1/{ARTIFACT_FILENAME} -f\n\
         \tRewriteRule ^(.*)$ {cache_url}/$1/{ARTIFACT_FILENAME} [L]\n\
         \n\
         </IfModule>\n\
         <IfModule mod_expires.c>\n\
         \tExpiresActive On\n\
         \tExpiresByType image/jpg \"access plus 1 year\"\n\
         \tExpiresByType image/jpeg \"access plus 1 year\"\n\
         \tExpiresByType image/gif \"access plus 1 year\"\n\
         \tExpiresByType image/png \"access plus 1 year\"\n\
         \tExpiresByType text/css \"access plus 1 month\"\n\
         \tExpiresByType application/pdf \"access plus 1 month\"\n\
         \tExpiresByType text/x-javascript \"access plus 1 month\"\n\
         \tExpiresByType image/x-icon \"access plus 1 year\"\n\
         \tExpiresDefault \"access plus 1 weeks\"\n\
         </IfModule>\n\
         \n"
    )
}

/// Prepend the generated block to an existing ruleset.
pub fn prepend_rules(existing: &str, base_path: &str, cache_alias: &str) -> String {
    format!("{}{existing}", rewrite_block(base_path, cache_alias))
}

/// Strip exactly the cache-busting version parameter from an asset URL,
/// leaving every other parameter byte-for-byte untouched.
pub fn strip_version_param(src: &str) -> String {
    let Some((base, query)) = src.split_once('?') else {
        return src.to_string();
    };

    let retained: Vec<&str> = query
        .split('&')
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or(pair);
            key != VERSION_PARAM
        })
        .collect();

    if retained.is_empty() {
        base.to_string()
    } else {
        format!("{base}?{}", retained.join("&"))
    }
}

fn collapse(path: &str) -> String {
    let mut collapsed = String::with_capacity(path.len());
    let mut previous_was_slash = false;
    for ch in path.chars() {
        if ch == '/' {
            if !previous_was_slash {
                collapsed.push(ch);
            }
            previous_was_slash = true;
        } else {
            collapsed.push(ch);
            previous_was_slash = false;
        }
    }
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_contains_both_sections() {
        let block = rewrite_block("/", "/page-cache");
        assert!(block.contains("<IfModule mod_rewrite.c>"));
        assert!(block.contains("<IfModule mod_expires.c>"));
        assert!(block.contains("RewriteBase /"));
    }

    #[test]
    fn block_passes_through_cache_alias_requests() {
        let block = rewrite_block("/", "/page-cache");
        assert!(block.contains("RewriteRule ^/page-cache/ - [L]"));
    }

    #[test]
    fn conditional_rewrite_targets_existing_artifacts() {
        let block = rewrite_block("/", "/page-cache");
        assert!(block.contains("RewriteCond %{REQUEST_METHOD} !POST"));
        assert!(block.contains("RewriteCond %{QUERY_STRING} !.*=.*"));
        assert!(block.contains("/page-cache/$1/index.html -f"));
        assert!(block.contains("RewriteRule ^(.*)$ /page-cache/$1/index.html [L]"));
    }

    #[test]
    fn session_cookies_bypass_the_cache() {
        let block = rewrite_block("/", "/page-cache");
        assert!(block.contains("RewriteCond %{HTTP_COOKIE} !("));
        assert!(block.contains("logged_in"));
        assert!(block.contains("comment_author"));
    }

    #[test]
    fn sub_path_base_collapses_separators() {
        let block = rewrite_block("/blog/", "/page-cache");
        assert!(block.contains("RewriteBase /blog/"));
        assert!(block.contains("RewriteRule ^/blog/page-cache/ - [L]"));
        assert!(!block.contains("//page-cache"));
    }

    #[test]
    fn generated_block_is_prepended() {
        let combined = prepend_rules("# existing rules\n", "/", "/page-cache");
        assert!(combined.starts_with("<IfModule mod_rewrite.c>"));
        assert!(combined.ends_with("# existing rules\n"));
    }

    #[test]
    fn strips_only_the_version_param() {
        assert_eq!(
            strip_version_param("/assets/site.css?ver=1.2.3"),
            "/assets/site.css"
        );
        assert_eq!(
            strip_version_param("/assets/site.css?ver=1.2.3&media=print"),
            "/assets/site.css?media=print"
        );
        assert_eq!(
            strip_version_param("/assets/site.css?media=print&ver=1.2.3&cache=no"),
            "/assets/site.css?media=print&cache=no"
        );
    }

    #[test]
    fn other_params_stay_byte_identical() {
        assert_eq!(
            strip_version_param("/a.js?x=%20y&ver=9"),
            "/a.js?x=%20y"
        );
    }

    #[test]
    fn url_without_version_param_is_untouched() {
        assert_eq!(
            strip_version_param("/assets/site.css?media=print"),
            "/assets/site.css?media=print"
        );
        assert_eq!(strip_version_param("/assets/site.css"), "/assets/site.css");
    }

    #[test]
    fn version_substring_in_other_keys_is_kept() {
        assert_eq!(
            strip_version_param("/a.js?version=2&ver=1"),
            "/a.js?version=2"
        );
    }
}
