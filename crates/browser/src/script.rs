//! JavaScript snippets evaluated in the status form.
//!
//! Selectors and text are embedded as JSON string literals so arbitrary
//! configured values cannot break out of the expression.

use serde_json::Value;

fn lit(s: &str) -> String {
    Value::String(s.to_owned()).to_string()
}

const VISIBLE_FN: &str = "const visible = (el) => !!el \
    && !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length) \
    && getComputedStyle(el).visibility !== 'hidden';";

/// Set an input's value and fire the events a user would. Returns `false` when missing.
pub fn fill(selector: &str, value: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({sel}); if (!el) return false; \
         el.focus(); el.value = {val}; \
         el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
         el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
         return true; }})()",
        sel = lit(selector),
        val = lit(value),
    )
}

/// Click the first `<button>` whose text contains `text`. Returns `false` when none matches.
pub fn click_button_with_text(text: &str) -> String {
    format!(
        "(() => {{ const btn = Array.from(document.querySelectorAll('button')) \
         .find((b) => (b.innerText || b.textContent || '').includes({text})); \
         if (!btn) return false; btn.click(); return true; }})()",
        text = lit(text),
    )
}

/// Click the element matching `selector`. Returns `false` when missing.
pub fn click(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({sel}); if (!el) return false; \
         el.click(); return true; }})()",
        sel = lit(selector),
    )
}

/// Whether the element matching `selector` is rendered and visible.
pub fn is_visible(selector: &str) -> String {
    format!(
        "(() => {{ {VISIBLE_FN} return visible(document.querySelector({sel})); }})()",
        sel = lit(selector),
    )
}

/// One look at the DOM-evidence channel; deserializes into [`crate::observe::DomEvidence`].
pub fn dom_evidence(quota_selector: &str, quota_phrase: &str, vendor_selector: &str) -> String {
    format!(
        "(() => {{ {VISIBLE_FN} \
         const quota = document.querySelector({quota}); \
         const select = document.querySelector({vendor}); \
         return {{ \
           quota_text: visible(quota) && (quota.innerText || quota.textContent || '').includes({phrase}), \
           vendor_select_visible: visible(select), \
           option_count: select && select.options ? select.options.length : 0 \
         }}; }})()",
        quota = lit(quota_selector),
        vendor = lit(vendor_selector),
        phrase = lit(quota_phrase),
    )
}

/// Make every option of a `<select>` render at once. Returns `false` when missing.
pub fn expand_select(selector: &str) -> String {
    format!(
        "(() => {{ const s = document.querySelector({sel}); if (!s || !s.options) return false; \
         s.size = s.options.length; return true; }})()",
        sel = lit(selector),
    )
}
