//! In-page JavaScript used for DOM snapshots and interactions.
//!
//! Addresses are structural CSS paths derived in the page: an id
//! short-circuits the walk, siblings of the same tag are
//! disambiguated with `:nth-child`. They are valid only for the
//! current document state.

/// Shared helpers prepended to every snapshot expression.
const HELPERS_JS: &str = r#"
function cssPath(el) {
  if (!el) return '';
  let path = '';
  while (el.parentElement) {
    let name = el.tagName.toLowerCase();
    if (el.id) {
      name += '#' + el.id;
      path = name + (path ? '>' + path : '');
      break;
    }
    const sibs = Array.from(el.parentElement.children).filter(e => e.tagName === el.tagName);
    if (sibs.length > 1) {
      name += ':nth-child(' + ([...el.parentElement.children].indexOf(el) + 1) + ')';
    }
    path = name + (path ? '>' + path : '');
    el = el.parentElement;
  }
  return path;
}
function isVisible(el) {
  const style = window.getComputedStyle(el);
  return style && style.visibility !== 'hidden' && style.display !== 'none'
    && el.offsetHeight > 0 && el.offsetWidth > 0;
}
function isDisabled(el) {
  if (el.disabled) return true;
  if ((el.getAttribute('aria-disabled') || '') === 'true') return true;
  const cls = (typeof el.className === 'string' ? el.className : '');
  if (/(^|[\s_-])disabled([\s_-]|$)/i.test(cls)) return true;
  const style = window.getComputedStyle(el);
  return !!(style && style.pointerEvents === 'none');
}
function classesOf(el) {
  return typeof el.className === 'string' ? el.className : '';
}
"#;

/// Snapshot of visible interactive elements.
pub fn interactive_elements_expr() -> String {
    format!(
        r#"(() => {{
{HELPERS_JS}
return Array.from(document.querySelectorAll('button, a, input[type=submit], [role="button"]'))
  .filter(isVisible)
  .map(el => ({{
    tag: el.tagName.toLowerCase(),
    text: (el.innerText || el.value || '').slice(0, 200),
    aria_label: el.getAttribute('aria-label') || '',
    dom_id: el.id || '',
    classes: classesOf(el),
    address: cssPath(el),
    disabled: isDisabled(el)
  }}));
}})()"#
    )
}

/// Obstruction selector list: modals, popups, overlays, drawers,
/// sheets, cookie banners, newsletters.
const OBSTRUCTION_SELECTORS: &str = r#"'[role="dialog"]', '[aria-modal="true"]', '.modal', '.popup', '.drawer', '.sheet', '.flyout', '.overlay', '.dialog', '.newsletter', '.cookie', '.banner', '.side-modal', '.bottom-sheet', '[data-testid*="modal"]', '[data-testid*="popup"]', '[data-testid*="overlay"]'"#;

/// Snapshot of visible obstruction-shaped elements.
pub fn obstructions_expr() -> String {
    format!(
        r#"(() => {{
{HELPERS_JS}
const selectors = [{OBSTRUCTION_SELECTORS}].join(',');
return Array.from(document.querySelectorAll(selectors))
  .filter(isVisible)
  .map(el => ({{
    tag: el.tagName.toLowerCase(),
    text: (el.innerText || '').slice(0, 200),
    aria_label: el.getAttribute('aria-label') || '',
    dom_id: el.id || '',
    classes: classesOf(el),
    address: cssPath(el),
    disabled: false
  }}));
}})()"#
    )
}

/// Snapshot of visible form/selection controls: selects, radios,
/// checkboxes, free-text inputs, swatch-like pickers.
pub fn form_controls_expr() -> String {
    format!(
        r#"(() => {{
{HELPERS_JS}
const out = [];
function push(el, kind, options) {{
  out.push({{
    kind: kind,
    tag: el.tagName.toLowerCase(),
    text: (el.innerText || '').slice(0, 120),
    aria_label: el.getAttribute('aria-label') || '',
    dom_id: el.id || '',
    name: el.getAttribute('name') || '',
    placeholder: el.getAttribute('placeholder') || '',
    autocomplete: el.getAttribute('autocomplete') || '',
    max_length: el.maxLength > 0 ? el.maxLength : null,
    required: !!el.required,
    address: cssPath(el),
    options: options || []
  }});
}}
for (const el of document.querySelectorAll('select')) {{
  if (!isVisible(el)) continue;
  const labels = Array.from(el.options).map(o => o.label || o.text).slice(0, 20);
  push(el, 'select', labels);
}}
for (const el of document.querySelectorAll('input')) {{
  if (!isVisible(el)) continue;
  const type = (el.getAttribute('type') || 'text').toLowerCase();
  if (type === 'radio') push(el, 'radio');
  else if (type === 'checkbox') push(el, 'checkbox');
  else if (['text', 'email', 'tel', 'number', 'password', 'search'].includes(type)) push(el, 'text');
}}
for (const el of document.querySelectorAll('textarea')) {{
  if (isVisible(el)) push(el, 'text');
}}
const swatchLike = document.querySelectorAll('button, [role="button"], label');
for (const el of swatchLike) {{
  if (!isVisible(el)) continue;
  if (/(swatch|variant|option-value|product-option)/i.test(classesOf(el))) push(el, 'swatch');
}}
return out;
}})()"#
    )
}

/// Whether the element at `address` is currently visible.
pub fn visible_expr(address: &str) -> String {
    let quoted = js_string(address);
    format!(
        r#"(() => {{
{HELPERS_JS}
const el = document.querySelector({quoted});
return !!(el && isVisible(el));
}})()"#
    )
}

/// Whether the element at `address` is structurally disabled.
pub fn disabled_expr(address: &str) -> String {
    let quoted = js_string(address);
    format!(
        r#"(() => {{
{HELPERS_JS}
const el = document.querySelector({quoted});
return !!(el && isDisabled(el));
}})()"#
    )
}

/// Synthetic click fallback used when the element handle click fails.
pub fn click_expr(address: &str) -> String {
    let quoted = js_string(address);
    format!(
        r#"(() => {{
const el = document.querySelector({quoted});
if (!el) return false;
el.click();
return true;
}})()"#
    )
}

/// Select the option whose label contains `label`, firing the events
/// frameworks listen for.
pub fn select_by_label_expr(address: &str, label: &str) -> String {
    let quoted = js_string(address);
    let needle = js_string(&label.to_lowercase());
    format!(
        r#"(() => {{
const el = document.querySelector({quoted});
if (!el || el.tagName !== 'SELECT') return false;
const needle = {needle};
for (const opt of el.options) {{
  const text = ((opt.label || opt.text) || '').toLowerCase();
  if (text.includes(needle)) {{
    el.value = opt.value;
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return true;
  }}
}}
return false;
}})()"#
    )
}

/// Ensure a checkbox/radio is checked, via a real click so attached
/// handlers run.
pub fn set_checked_expr(address: &str) -> String {
    let quoted = js_string(address);
    format!(
        r#"(() => {{
const el = document.querySelector({quoted});
if (!el) return false;
if (!el.checked) el.click();
return !!el.checked;
}})()"#
    )
}

pub const VISIBLE_TEXT_EXPR: &str =
    "(() => document.body ? document.body.innerText : '')()";

pub const SCRIPT_SOURCES_EXPR: &str =
    "(() => Array.from(document.scripts).map(s => s.src).filter(Boolean))()";

pub const IFRAME_SOURCES_EXPR: &str =
    "(() => Array.from(document.querySelectorAll('iframe')).map(f => f.src).filter(Boolean))()";

/// Serialize a Rust string as a JavaScript string literal.
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}
