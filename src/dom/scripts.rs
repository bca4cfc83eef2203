//! Page-context sources for every [`PageCall`].
//!
//! The page keeps a registry of the nodes it handed out, keyed by a random
//! per-document prefix plus a counter. Entries hold their node weakly, so a
//! node the page dropped gets collected and its key reports a stale
//! reference, the same as keys from a document a navigation replaced.

use crate::dom::remote::{PageCall, RemoteRef};
use crate::errors::Result;

pub const READY_STATE: &str = "document.readyState";
pub const CURRENT_URL: &str = "window.location.href";

/// Marker a page function returns when a registry key no longer resolves.
pub const STALE_MARKER: &str = "__pagePilotStale";

const RUNTIME: &str = r#"
(() => {
  if (window.__pagePilot) return window.__pagePilot;
  const prefix = Math.random().toString(36).slice(2, 10);
  const nodes = new Map();
  const keys = new WeakMap();
  const collected = new FinalizationRegistry((key) => nodes.delete(key));
  let next = 0;
  const SKIPPED = new Set(['HEAD', 'SCRIPT', 'STYLE', 'HTML', 'BODY', 'NOSCRIPT']);

  const remember = (node) => {
    let key = keys.get(node);
    if (key === undefined) {
      key = `${prefix}-${next++}`;
      keys.set(node, key);
      nodes.set(key, new WeakRef(node));
      collected.register(node, key);
    }
    return key;
  };

  const lookup = (key) => {
    const ref = nodes.get(key);
    return ref === undefined ? undefined : ref.deref();
  };

  const normalize = (text) => (text || '').replace(/\s+/g, ' ').trim().toLowerCase();

  const matches = (query, candidate) => {
    const pattern = query.pattern;
    if (pattern.kind === 'regex') {
      const regex = new RegExp(pattern.source, pattern.flags);
      if (query.mode === 'exact') {
        const found = (candidate || '').match(regex);
        return !!found && found[0] === candidate;
      }
      return regex.test(candidate || '');
    }
    const wanted = normalize(pattern.text);
    const actual = normalize(candidate);
    return query.mode === 'exact' ? actual === wanted : actual.includes(wanted);
  };

  const allElements = (root) => {
    const found = [];
    const walk = (scope) => {
      const iterator = document.createNodeIterator(scope, NodeFilter.SHOW_ELEMENT);
      let node;
      while ((node = iterator.nextNode())) {
        if (node !== scope) found.push(node);
        if (node.shadowRoot) walk(node.shadowRoot);
      }
    };
    walk(root);
    return found;
  };

  const isContent = (element) => !SKIPPED.has(element.tagName) && !element.closest('head');

  const candidateTexts = (element) => {
    const texts = [element.textContent];
    if (element.tagName === 'INPUT') texts.push(element.value, element.type);
    if (element.tagName === 'IMG') texts.push(element.alt);
    return texts;
  };

  const innermost = (matched) =>
    matched.filter((node) => !matched.some((other) => other !== node && node.contains(other)));

  const queryAll = (css) => allElements(document).filter((element) => element.matches(css));

  const deepActive = () => {
    let active = document.activeElement;
    while (active && active.shadowRoot && active.shadowRoot.activeElement) {
      active = active.shadowRoot.activeElement;
    }
    return active && active !== document.body ? [active] : [];
  };

  const deepHit = (x, y) => {
    let hit = document.elementFromPoint(x, y);
    while (hit && hit.shadowRoot) {
      const inner = hit.shadowRoot.elementFromPoint(x, y);
      if (!inner || inner === hit) break;
      hit = inner;
    }
    return hit;
  };

  const fire = (element, ...types) => {
    for (const type of types) element.dispatchEvent(new Event(type, { bubbles: true }));
  };

  const pickOption = (select, option) => {
    const options = Array.from(select.options);
    switch (option.by) {
      case 'index':
        return options[option.index];
      case 'text':
        return (
          options.find((o) => normalize(o.text) === normalize(option.text)) ||
          options.find((o) => o.value === option.text)
        );
      case 'value':
        return options.find((o) => o.value === option.value);
      case 'pattern': {
        const regex = new RegExp(option.source, option.flags);
        return options.find((o) => regex.test(o.text));
      }
    }
    return undefined;
  };

  const calls = {
    findByText(args) {
      const matched = allElements(document).filter(
        (element) =>
          isContent(element) &&
          (!args.scope || element.matches(args.scope)) &&
          candidateTexts(element).some((text) => matches(args.query, text))
      );
      return innermost(matched);
    },
    queryCss(args) {
      return queryAll(args.selector);
    },
    labelledControls(args) {
      if (args.strategy === 'inlineAdjacent') {
        return queryAll(args.control).filter((control) => {
          const next = control.nextSibling;
          return (
            next && next.nodeType === Node.TEXT_NODE && next.textContent.trim() !== '' &&
            matches(args.label, next.textContent)
          );
        });
      }
      const labels = queryAll('label').filter((label) => matches(args.label, label.textContent));
      const controls = [];
      for (const label of labels) {
        if (args.strategy === 'for') {
          const target = label.htmlFor && label.getRootNode().getElementById
            ? label.getRootNode().getElementById(label.htmlFor)
            : null;
          if (target && target.matches(args.control)) controls.push(target);
        } else {
          for (const child of label.children) {
            if (child.matches(args.control)) controls.push(child);
          }
        }
      }
      return controls;
    },
    activeElement() {
      return deepActive();
    },
    describe() {
      return {
        tag: this.tagName.toLowerCase(),
        type: this.getAttribute('type'),
        id: this.id || null,
        name: this.getAttribute('name'),
      };
    },
    isVisible() {
      const style = window.getComputedStyle(this);
      const rect = this.getBoundingClientRect();
      return style.visibility !== 'hidden' && style.display !== 'none' && rect.width > 0 && rect.height > 0;
    },
    isDisabled() {
      return this.disabled === true || !!this.closest('fieldset[disabled]') ||
        this.getAttribute('aria-disabled') === 'true';
    },
    isWritable() {
      if (this.disabled || this.readOnly) return false;
      return this.isContentEditable || ['INPUT', 'TEXTAREA', 'SELECT'].includes(this.tagName);
    },
    isChecked() {
      return !!this.checked;
    },
    text() {
      return ['INPUT', 'TEXTAREA', 'SELECT'].includes(this.tagName) ? String(this.value) : this.innerText;
    },
    value() {
      return 'value' in this ? String(this.value) : null;
    },
    scrollIntoView() {
      this.scrollIntoView({ block: 'center', inline: 'center' });
      return true;
    },
    hitTest() {
      const rect = this.getBoundingClientRect();
      const hit = deepHit(rect.left + rect.width / 2, rect.top + rect.height / 2);
      return !!hit && (hit === this || this.contains(hit));
    },
    focus() {
      this.focus();
      return deepActive()[0] === this;
    },
    clearValue() {
      if (this.isContentEditable) this.textContent = '';
      else this.value = '';
      fire(this, 'input', 'change');
      return true;
    },
    setChecked(args) {
      if (this.checked !== args.checked) {
        this.checked = args.checked;
        fire(this, 'click', 'input', 'change');
      }
      return this.checked;
    },
    selectOption(args) {
      const option = pickOption(this, args.option);
      if (!option) return null;
      this.selectedIndex = option.index;
      fire(this, 'input', 'change');
      return { text: option.text, value: option.value };
    },
    highlight() {
      const previous = this.style.outline;
      this.style.outline = '2px solid red';
      setTimeout(() => { this.style.outline = previous; }, 1000);
      return true;
    },
    scrollBy(args) {
      const target = this === document ? (document.scrollingElement || document.body) : this;
      target.scrollBy(args.x, args.y);
      return true;
    },
  };

  const run = (key, args) => {
    const target = key === null ? document : lookup(key);
    if (target === undefined) return { __pagePilotStale: true };
    try {
      const result = calls[args.call].call(target, args);
      if (Array.isArray(result)) return { nodes: result.map(remember) };
      return result === undefined ? null : result;
    } catch (error) {
      return { error: String(error), stack: error && error.stack ? String(error.stack) : '' };
    }
  };

  const boxOf = (key) => {
    const target = lookup(key);
    if (target === undefined) return { __pagePilotStale: true };
    if (!target.isConnected || target.getClientRects().length === 0) return null;
    const r = target.getBoundingClientRect();
    return [r.left, r.top, r.right, r.top, r.right, r.bottom, r.left, r.bottom];
  };

  const tag = (key, attribute) => {
    const target = lookup(key);
    if (target === undefined) return { __pagePilotStale: true };
    target.setAttribute(attribute, key);
    return true;
  };

  window.__pagePilot = { run, boxOf, tag };
  return window.__pagePilot;
})()
"#;

fn target_literal(target: Option<&RemoteRef>) -> Result<String> {
    Ok(match target {
        Some(reference) => serde_json::to_string(&reference.object_id)?,
        None => "null".to_string(),
    })
}

/// Expression running `call` against `target` (or `document`).
pub fn call_expression(target: Option<&RemoteRef>, call: &PageCall) -> Result<String> {
    Ok(format!(
        "{}.run({}, {})",
        RUNTIME.trim(),
        target_literal(target)?,
        serde_json::to_string(&call.arguments()?)?
    ))
}

/// Expression returning the border quad of `node`, `null` when not rendered.
pub fn box_expression(node: &RemoteRef) -> Result<String> {
    Ok(format!(
        "{}.boxOf({})",
        RUNTIME.trim(),
        target_literal(Some(node))?
    ))
}

/// Expression tagging `node` with `attribute` so CSS can find it.
pub fn tag_expression(node: &RemoteRef, attribute: &str) -> Result<String> {
    Ok(format!(
        "{}.tag({}, {})",
        RUNTIME.trim(),
        target_literal(Some(node))?,
        serde_json::to_string(attribute)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expressions_embed_json_arguments() {
        let expression = call_expression(
            Some(&RemoteRef::new("ab-1")),
            &PageCall::SetChecked { checked: true },
        )
        .unwrap();
        assert!(expression.ends_with(r#".run("ab-1", {"call":"setChecked","checked":true})"#));

        let document = call_expression(None, &PageCall::ActiveElement).unwrap();
        assert!(document.ends_with(r#".run(null, {"call":"activeElement"})"#));
    }

    #[test]
    fn every_call_has_a_page_function() {
        let calls = [
            "findByText", "queryCss", "labelledControls", "activeElement", "describe",
            "isVisible", "isDisabled", "isWritable", "isChecked", "text", "value",
            "scrollIntoView", "hitTest", "focus", "clearValue", "setChecked",
            "selectOption", "highlight", "scrollBy",
        ];
        for call in calls {
            assert!(RUNTIME.contains(&format!("{}(", call)), "missing {}", call);
        }
        assert!(RUNTIME.contains(STALE_MARKER));
    }

    #[test]
    fn registry_holds_nodes_weakly() {
        assert!(RUNTIME.contains("new WeakRef(node)"));
        assert!(RUNTIME.contains("keys.get(node)"));
    }
}
