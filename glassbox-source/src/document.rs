//! Document builder: normalized source + identifier → a complete,
//! self-contained execution document.
//!
//! The document is one Luau chunk carrying everything the sandbox needs:
//! the runtime bootstrap (`h`, `useState`, `useEffect`, render-to-markup),
//! base styling, a mount point, and a guarded harness that compiles and
//! runs the embedded source. Errors thrown by the component are caught,
//! serialized (message + truncated stack) and written into the mount as a
//! structured block — they never propagate to the host page.
//!
//! The sandbox strips `load`, so the harness compiles the embedded source
//! through a host-provided loader (`__glassbox_load`) and reports the mount
//! state through `__glassbox_report`.

use crate::escape::escape_embedded;
use crate::normalize::NormalizedSource;

/// Marker text the harness writes in front of every serialized error. The
/// outcome detector keys off this exact string.
pub const ERROR_MARKER: &str = "Preview Error:";

/// Stack traces serialized into the mount are truncated to this many chars.
pub const STACK_TRACE_LIMIT: usize = 500;

/// A complete, self-contained Luau chunk ready for the sandbox host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionDocument {
    chunk: String,
    identifier: String,
}

impl ExecutionDocument {
    pub fn chunk(&self) -> &str {
        &self.chunk
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Build the execution document. Never fails: the identifier is already
/// validated by normalization and the source is escaped for embedding.
pub fn build_document(normalized: &NormalizedSource) -> ExecutionDocument {
    // The source is substituted last so its text can never be read as a
    // template marker.
    let chunk = HARNESS_TEMPLATE
        .replace("@IDENTIFIER@", normalized.identifier().as_str())
        .replace("@STACK_LIMIT@", &STACK_TRACE_LIMIT.to_string())
        .replace("@SOURCE@", &escape_embedded(normalized.source()));

    ExecutionDocument {
        chunk,
        identifier: normalized.identifier().as_str().to_string(),
    }
}

const HARNESS_TEMPLATE: &str = r##"-- glassbox execution document (generated; do not edit)

local STYLE = {
    background = "#ffffff",
    padding = 16,
    error_background = "#fee2e2",
    error_color = "#dc2626",
}

-- runtime bootstrap ---------------------------------------------------------

local Runtime = {}
Runtime.pending = {}
Runtime.state = {}
Runtime.state_index = 0
Runtime.dirty = false

function Runtime.h(tag, props, ...)
    local node = { tag = tag, props = props or {}, children = {} }
    for i = 1, select("#", ...) do
        local child = select(i, ...)
        if child ~= nil then
            table.insert(node.children, child)
        end
    end
    return node
end

function Runtime.useState(initial)
    Runtime.state_index = Runtime.state_index + 1
    local slot = Runtime.state_index
    if Runtime.state[slot] == nil then
        Runtime.state[slot] = initial
    end
    local function set(value)
        Runtime.state[slot] = value
        Runtime.dirty = true
    end
    return Runtime.state[slot], set
end

function Runtime.useEffect(effect)
    table.insert(Runtime.pending, effect)
end

local function escape_text(value)
    value = string.gsub(value, "&", "&amp;")
    value = string.gsub(value, "<", "&lt;")
    value = string.gsub(value, ">", "&gt;")
    return value
end

local function render_node(node, out)
    if type(node) == "string" then
        table.insert(out, escape_text(node))
        return
    end
    if type(node) == "number" or type(node) == "boolean" then
        table.insert(out, tostring(node))
        return
    end
    if type(node) ~= "table" or node.tag == nil then
        return
    end
    local attrs = {}
    for key, value in pairs(node.props or {}) do
        local kind = type(value)
        if kind == "string" or kind == "number" or kind == "boolean" then
            table.insert(attrs, string.format(" %s=%q", tostring(key), tostring(value)))
        end
    end
    table.sort(attrs)
    table.insert(out, "<" .. tostring(node.tag) .. table.concat(attrs) .. ">")
    for _, child in ipairs(node.children or {}) do
        render_node(child, out)
    end
    table.insert(out, "</" .. tostring(node.tag) .. ">")
end

-- mount point ---------------------------------------------------------------

local mount = { children = 0, markup = "" }

local function report()
    __glassbox_report(mount.children, mount.markup)
end

local function render_into_mount(element)
    local out = {}
    if element ~= nil then
        render_node(element, out)
    end
    mount.markup = table.concat(out)
    if type(element) == "table" and element.tag ~= nil then
        mount.children = 1
    else
        mount.children = 0
    end
    report()
end

local function render_failure(message, stack)
    local out = {}
    table.insert(out, '<ErrorBlock background="' .. STYLE.error_background
        .. '" color="' .. STYLE.error_color .. '">')
    table.insert(out, escape_text("Preview Error: " .. message))
    if stack ~= nil and stack ~= "" then
        table.insert(out, "\n" .. escape_text(string.sub(stack, 1, @STACK_LIMIT@)))
    end
    table.insert(out, "</ErrorBlock>")
    mount.markup = table.concat(out)
    mount.children = 1
    report()
end

-- component scope -----------------------------------------------------------

local base = {
    math = math,
    string = string,
    table = table,
    tostring = tostring,
    tonumber = tonumber,
    pairs = pairs,
    ipairs = ipairs,
    select = select,
    type = type,
    pcall = pcall,
    error = error,
    assert = assert,
    print = print,
    h = Runtime.h,
    useState = Runtime.useState,
    useEffect = Runtime.useEffect,
}
local scope = setmetatable({}, { __index = base })

local function instantiate()
    Runtime.state_index = 0
    local component = scope["@IDENTIFIER@"]
    if component == nil then
        local available = {}
        for key, value in pairs(scope) do
            if type(value) == "function" and string.match(key, "^%u") then
                table.insert(available, key)
            end
        end
        table.sort(available)
        local hint = "none"
        if #available > 0 then
            hint = table.concat(available, ", ")
        end
        error('component "@IDENTIFIER@" is not defined. Available: ' .. hint, 0)
    end
    if type(component) == "function" then
        return component()
    end
    return component
end

local function trace(err)
    local stack = ""
    if debug ~= nil and type(debug.traceback) == "function" then
        stack = debug.traceback("", 2)
    end
    return { message = tostring(err), stack = stack }
end

-- guarded execution ---------------------------------------------------------

local ok, failure = xpcall(function()
    local chunk, load_err = __glassbox_load("@SOURCE@", scope)
    if chunk == nil then
        error("component source failed to compile: " .. tostring(load_err), 0)
    end
    chunk()
    render_into_mount(instantiate())
end, trace)

if not ok then
    render_failure(failure.message, failure.stack)
    return
end

-- settle pass: yield once, then flush queued effects and re-render if state
-- changed. This is where late asynchronous rendering happens.
coroutine.yield()

local flushed, flush_failure = xpcall(function()
    local queue = Runtime.pending
    Runtime.pending = {}
    for _, effect in ipairs(queue) do
        effect()
    end
    if Runtime.dirty then
        Runtime.dirty = false
        render_into_mount(instantiate())
    end
end, trace)

if not flushed then
    render_failure(flush_failure.message, flush_failure.stack)
end
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    #[test]
    fn test_document_embeds_identifier_and_source() {
        let normalized = normalize("function Widget()\n    return h(\"Text\", {})\nend");
        let document = build_document(&normalized);
        assert_eq!(document.identifier(), "Widget");
        assert!(document.chunk().contains("scope[\"Widget\"]"));
        assert!(document
            .chunk()
            .contains("function Widget()\\n    return h(\\\"Text\\\", {})\\nend"));
    }

    #[test]
    fn test_document_carries_error_marker() {
        let normalized = normalize("function Widget() end");
        let document = build_document(&normalized);
        assert!(document.chunk().contains(ERROR_MARKER));
    }

    #[test]
    fn test_no_placeholder_survives_substitution() {
        let normalized = normalize("function Widget() end");
        let document = build_document(&normalized);
        assert!(!document.chunk().contains("@IDENTIFIER@"));
        assert!(!document.chunk().contains("@SOURCE@"));
        assert!(!document.chunk().contains("@STACK_LIMIT@"));
    }

    #[test]
    fn test_source_text_cannot_inject_template_markers() {
        // A source that *contains* a marker token must land as inert string
        // content, because the source is substituted last.
        let normalized = normalize("function Widget()\n    return \"@IDENTIFIER@\"\nend");
        let document = build_document(&normalized);
        assert!(document.chunk().contains("\\\"@IDENTIFIER@\\\""));
    }
}
