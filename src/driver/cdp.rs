//! `DriverPort` over a live chromiumoxide page.
//!
//! Element handles are indices into a window-side registry
//! (`window.__cpRegistry`) so the same node can be re-addressed across
//! calls. Every operation is a self-contained script evaluated on the page;
//! a navigation wipes the registry, and operations on wiped or detached
//! nodes report `Stale`. Click channels mirror what real input produces:
//! the direct channel hit-tests the click point and refuses to fire through
//! an intercepting overlay, which is exactly what lets the activation chain
//! fall back to the forced channel.

use super::{DriverError, DriverPort, ElementHandle, Strategy};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, SetCookiesParams};
use chromiumoxide::Page;
use serde_json::json;
use std::time::Duration;

pub struct CdpDriver {
    page: Page,
}

impl CdpDriver {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// Evaluate a snippet and parse its JSON result.
    async fn eval(&self, js: String) -> Result<serde_json::Value, DriverError> {
        let result = self
            .page
            .evaluate(js)
            .await
            .map_err(|e| DriverError::Eval(e.to_string()))?;
        result
            .into_value::<serde_json::Value>()
            .map_err(|e| DriverError::Eval(e.to_string()))
    }

    /// Interpret the `{stale}` / `{error}` envelope shared by node scripts.
    fn check_envelope(value: &serde_json::Value) -> Result<(), DriverError> {
        if value.get("stale").and_then(|v| v.as_bool()).unwrap_or(false) {
            return Err(DriverError::Stale);
        }
        if let Some(err) = value.get("error").and_then(|v| v.as_str()) {
            return Err(DriverError::Eval(err.to_string()));
        }
        Ok(())
    }

    fn strategy_args(strategy: &Strategy) -> (&'static str, String) {
        match strategy {
            Strategy::Css(sel) => ("css", js_string(sel)),
            Strategy::XPath(expr) => ("xpath", js_string(expr)),
        }
    }

    /// Resolve the first match of `strategy` under `scope` (or the document)
    /// into a registry handle.
    async fn resolve(
        &self,
        scope: Option<ElementHandle>,
        strategy: &Strategy,
    ) -> Result<Option<ElementHandle>, DriverError> {
        let (kind, sel) = Self::strategy_args(strategy);
        let scope_id = scope.map(|s| s.0 as i64).unwrap_or(-1);
        let js = format!(
            r#"(() => {{
    const reg = window.__cpRegistry = window.__cpRegistry || {{ seq: 0, nodes: {{}} }};
    let scope = document;
    if ({scope_id} >= 0) {{
        const s = reg.nodes[{scope_id}];
        if (!s || !document.contains(s)) return {{ stale: true }};
        scope = s;
    }}
    let el = null;
    try {{
        if ('{kind}' === 'css') {{
            el = scope.querySelector({sel});
        }} else {{
            const res = document.evaluate({sel}, scope, null,
                XPathResult.FIRST_ORDERED_NODE_TYPE, null);
            el = res.singleNodeValue;
        }}
    }} catch (e) {{
        return {{ error: String(e) }};
    }}
    if (!el) return {{ id: -1 }};
    const id = ++reg.seq;
    reg.nodes[id] = el;
    return {{ id: id }};
}})()"#
        );

        let value = self.eval(js).await?;
        Self::check_envelope(&value)?;
        match value.get("id").and_then(|v| v.as_i64()) {
            Some(id) if id > 0 => Ok(Some(ElementHandle(id as u64))),
            _ => Ok(None),
        }
    }

    /// Run a node-scoped script. `body` sees `el` and must return a JSON
    /// object envelope.
    async fn with_node(
        &self,
        el: ElementHandle,
        body: &str,
    ) -> Result<serde_json::Value, DriverError> {
        let id = el.0;
        let js = format!(
            r#"(() => {{
    const reg = window.__cpRegistry = window.__cpRegistry || {{ seq: 0, nodes: {{}} }};
    const el = reg.nodes[{id}];
    if (!el || !document.contains(el)) return {{ stale: true }};
    try {{
        {body}
    }} catch (e) {{
        return {{ error: String(e) }};
    }}
}})()"#
        );
        let value = self.eval(js).await?;
        Self::check_envelope(&value)?;
        Ok(value)
    }
}

/// JS string literal for embedding into a snippet.
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| String::from("\"\""))
}

#[async_trait]
impl DriverPort for CdpDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn refresh(&self) -> Result<(), DriverError> {
        self.page
            .reload()
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn query(&self, strategy: &Strategy) -> Result<Option<ElementHandle>, DriverError> {
        self.resolve(None, strategy).await
    }

    async fn query_within(
        &self,
        scope: ElementHandle,
        strategy: &Strategy,
    ) -> Result<Option<ElementHandle>, DriverError> {
        self.resolve(Some(scope), strategy).await
    }

    async fn query_all(&self, strategy: &Strategy) -> Result<Vec<ElementHandle>, DriverError> {
        let (kind, sel) = Self::strategy_args(strategy);
        let js = format!(
            r#"(() => {{
    const reg = window.__cpRegistry = window.__cpRegistry || {{ seq: 0, nodes: {{}} }};
    const found = [];
    try {{
        if ('{kind}' === 'css') {{
            document.querySelectorAll({sel}).forEach(el => found.push(el));
        }} else {{
            const res = document.evaluate({sel}, document, null,
                XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
            for (let i = 0; i < res.snapshotLength; i++) found.push(res.snapshotItem(i));
        }}
    }} catch (e) {{
        return {{ error: String(e) }};
    }}
    const ids = found.map(el => {{ const id = ++reg.seq; reg.nodes[id] = el; return id; }});
    return {{ ids: ids }};
}})()"#
        );

        let value = self.eval(js).await?;
        Self::check_envelope(&value)?;
        Ok(value
            .get("ids")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_u64())
                    .map(ElementHandle)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn text(&self, el: ElementHandle) -> Result<Option<String>, DriverError> {
        let value = self
            .with_node(
                el,
                "const t = (el.innerText || el.textContent || '').trim();\n\
                 return { text: t };",
            )
            .await?;
        Ok(value
            .get("text")
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
            .map(str::to_string))
    }

    async fn attribute(
        &self,
        el: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let name = js_string(name);
        let value = self
            .with_node(el, &format!("return {{ value: el.getAttribute({name}) }};"))
            .await?;
        Ok(value
            .get("value")
            .and_then(|v| v.as_str())
            .map(str::to_string))
    }

    async fn is_attached(&self, el: ElementHandle) -> Result<bool, DriverError> {
        match self.with_node(el, "return { ok: true };").await {
            Ok(_) => Ok(true),
            Err(DriverError::Stale) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn click(&self, el: ElementHandle) -> Result<(), DriverError> {
        let value = self
            .with_node(
                el,
                r#"el.scrollIntoView({ block: 'center' });
    const r = el.getBoundingClientRect();
    if (r.width < 1 || r.height < 1) return { error: 'element has no visible extent' };
    const x = r.left + r.width / 2;
    const y = r.top + r.height / 2;
    const hit = document.elementFromPoint(x, y);
    if (!hit || !(el === hit || el.contains(hit) || hit.contains(el))) {
        return { error: 'click point intercepted by another element' };
    }
    const opts = { bubbles: true, cancelable: true, view: window, clientX: x, clientY: y };
    for (const type of ['pointerdown', 'mousedown', 'pointerup', 'mouseup', 'click']) {
        hit.dispatchEvent(new MouseEvent(type, opts));
    }
    return { ok: true };"#,
            )
            .await?;
        match value.get("ok").and_then(|v| v.as_bool()) {
            Some(true) => Ok(()),
            _ => Err(DriverError::NotInteractable("direct click refused".into())),
        }
    }

    async fn click_forced(&self, el: ElementHandle) -> Result<(), DriverError> {
        self.with_node(
            el,
            "el.scrollIntoView({ block: 'center' });\nel.click();\nreturn { ok: true };",
        )
        .await?;
        Ok(())
    }

    async fn hover_click(&self, el: ElementHandle, pause: Duration) -> Result<(), DriverError> {
        self.with_node(
            el,
            r#"el.scrollIntoView({ block: 'center' });
    const r = el.getBoundingClientRect();
    const opts = { bubbles: true, cancelable: true, view: window,
                   clientX: r.left + r.width / 2, clientY: r.top + r.height / 2 };
    for (const type of ['pointerover', 'mouseover', 'mousemove']) {
        el.dispatchEvent(new MouseEvent(type, opts));
    }
    return { ok: true };"#,
        )
        .await?;

        tokio::time::sleep(pause).await;

        self.with_node(
            el,
            r#"const r = el.getBoundingClientRect();
    const opts = { bubbles: true, cancelable: true, view: window,
                   clientX: r.left + r.width / 2, clientY: r.top + r.height / 2 };
    for (const type of ['pointerdown', 'mousedown', 'pointerup', 'mouseup', 'click']) {
        el.dispatchEvent(new MouseEvent(type, opts));
    }
    return { ok: true };"#,
        )
        .await?;
        Ok(())
    }

    async fn type_text(&self, el: ElementHandle, text: &str) -> Result<(), DriverError> {
        let text = js_string(text);
        // Use the prototype value setter so framework-managed inputs see the
        // change, then fire input/change like real typing would.
        self.with_node(
            el,
            &format!(
                r#"el.focus();
    const proto = el.tagName === 'TEXTAREA'
        ? HTMLTextAreaElement.prototype
        : HTMLInputElement.prototype;
    const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
    setter.call(el, {text});
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return {{ ok: true }};"#
            ),
        )
        .await?;
        Ok(())
    }

    async fn get_cookie(&self, name: &str) -> Result<Option<String>, DriverError> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .map_err(|e| DriverError::Eval(e.to_string()))?;
        Ok(cookies
            .into_iter()
            .find(|c| c.name == name)
            .map(|c| c.value))
    }

    async fn set_cookie(
        &self,
        name: &str,
        value: &str,
        domain: &str,
    ) -> Result<(), DriverError> {
        let param: CookieParam = serde_json::from_value(json!({
            "name": name,
            "value": value,
            "domain": domain,
            "path": "/",
            "secure": true,
        }))
        .map_err(|e| DriverError::Eval(format!("cookie param: {e}")))?;

        self.page
            .execute(SetCookiesParams::new(vec![param]))
            .await
            .map_err(|e| DriverError::Eval(e.to_string()))?;
        Ok(())
    }

    async fn scroll_into_view(&self, el: ElementHandle) -> Result<(), DriverError> {
        self.with_node(
            el,
            "el.scrollIntoView({ block: 'center' });\nreturn { ok: true };",
        )
        .await?;
        Ok(())
    }

    async fn scroll_by(&self, x: i64, y: i64) -> Result<(), DriverError> {
        self.eval(format!("window.scrollBy({x}, {y}); true")).await?;
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> Result<(), DriverError> {
        self.eval("window.scrollTo(0, document.body.scrollHeight); true".to_string())
            .await?;
        Ok(())
    }

    async fn page_contains(&self, needle: &str) -> Result<bool, DriverError> {
        let needle = js_string(needle);
        let value = self
            .eval(format!(
                "(() => ({{ found: !!document.body && document.body.innerText.includes({needle}) }}))()"
            ))
            .await?;
        Ok(value.get("found").and_then(|v| v.as_bool()).unwrap_or(false))
    }
}
