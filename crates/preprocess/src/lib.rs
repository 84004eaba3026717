//! Stage-splitting GLSL source preprocessor.
//!
//! One shared source text goes in; vertex and fragment variants come out,
//! produced by a fixed pipeline: line-marker stamping, recursive include
//! resolution, `%{token}` substitution, stage-specific `in`/`out`/`varying`
//! rewriting, `[[attribute]]`-gated function filtering, macro and pragma
//! injection, and a final line-marker compaction pass.
//!
//! Types:
//! - [`Preprocessor`]: long-lived configuration (pragma, stage defines,
//!   keep-attributes, include table) plus the [`Preprocessor::process`]
//!   entry point.
//! - [`ProcessParams`]: per-call tokens and defines, consumed by value so
//!   they can never leak into a later call.
//! - [`ProcessedSources`]: the finished vertex/fragment pair.
//!
//! The pipeline never fails: missing includes become comment stubs, unbound
//! tokens become empty strings, and malformed GLSL is passed through for the
//! compiler to complain about later.

pub mod substitute;

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;

use crate::substitute::{balanced_close, replace_with, strip_matches};

/// Default pragma line prepended to every finished stage.
pub const DEFAULT_PRAGMA: &str = "#version 330 core";
/// Default macro distinguishing the vertex stage.
pub const DEFAULT_VERTEX_DEFINE: &str = "STAGE_VERTEX";
/// Default macro distinguishing the fragment stage.
pub const DEFAULT_FRAGMENT_DEFINE: &str = "STAGE_FRAGMENT";
/// Default attribute tag marking vertex-only functions.
pub const DEFAULT_VERTEX_ATTRIBUTE: &str = "vert";
/// Default attribute tag marking fragment-only functions.
pub const DEFAULT_FRAGMENT_ATTRIBUTE: &str = "frag";

/// Include resolution stops after this many passes, which bounds cyclic
/// include tables instead of looping forever.
const INCLUDE_PASS_LIMIT: usize = 8;

/// Per-call substitution inputs. The bundle is consumed by
/// [`Preprocessor::process`], making the single-use contract part of the
/// signature: a second call simply cannot see a previous call's tokens.
#[derive(Debug, Clone, Default)]
pub struct ProcessParams {
    /// `%{name}` replacements; unbound names substitute the empty string.
    pub tokens: BTreeMap<String, String>,
    /// Symbols injected as `#define <name>` lines, in sorted order.
    pub defines: BTreeSet<String>,
}

impl ProcessParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a token for this call only.
    pub fn with_token(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tokens.insert(name.into(), value.into());
        self
    }

    /// Adds a one-shot `#define` symbol for this call only.
    pub fn with_define(mut self, name: impl Into<String>) -> Self {
        self.defines.insert(name.into());
        self
    }
}

/// Finished stage texts, each derived independently from the same input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedSources {
    pub vertex: String,
    pub fragment: String,
}

/// Shader source preprocessor.
///
/// Owns the configuration that persists across calls: the pragma line, the
/// per-stage define symbols, the per-stage keep-attributes, and the include
/// table. Everything per-call travels in [`ProcessParams`].
#[derive(Debug)]
pub struct Preprocessor {
    pragma_line: String,
    vertex_define: String,
    fragment_define: String,
    vertex_attribute: String,
    fragment_attribute: String,
    includes: BTreeMap<String, String>,
    include_re: Regex,
    token_re: Regex,
    in_re: Regex,
    out_re: Regex,
    varying_re: Regex,
    function_re: Regex,
}

#[derive(Clone, Copy)]
enum Stage {
    Vertex,
    Fragment,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Preprocessor {
    pub fn new() -> Self {
        Self {
            pragma_line: DEFAULT_PRAGMA.to_string(),
            vertex_define: DEFAULT_VERTEX_DEFINE.to_string(),
            fragment_define: DEFAULT_FRAGMENT_DEFINE.to_string(),
            vertex_attribute: DEFAULT_VERTEX_ATTRIBUTE.to_string(),
            fragment_attribute: DEFAULT_FRAGMENT_ATTRIBUTE.to_string(),
            includes: BTreeMap::new(),
            include_re: Regex::new(r"(?m)^\s*#\s*include\s+<\s*(\w+)\s*>")
                .expect("include regex should compile"),
            token_re: Regex::new(r"%\{(\w+)\}").expect("token regex should compile"),
            in_re: Regex::new(r"(?m)^in\s+(\w+)\s+(\w+)\s*=\s*([0-9]+)\s*;")
                .expect("in regex should compile"),
            out_re: Regex::new(r"(?m)^out\s+(\w+)\s+(\w+)\s*=\s*([0-9]+)\s*;")
                .expect("out regex should compile"),
            varying_re: Regex::new(r"(?m)^varying\s+(\w+)\s+(\w+)\s*;")
                .expect("varying regex should compile"),
            function_re: Regex::new(r"(?m)^\s*\[\[\s*(\w+)\s*\]\]\s*(\w+\s+\w+\s*\(.*?\)[\s\S]*?\{)")
                .expect("function regex should compile"),
        }
    }

    /// Replaces the pragma line prepended to finished stages.
    pub fn set_pragma_line(&mut self, line: impl Into<String>) {
        self.pragma_line = line.into();
    }

    /// Replaces the vertex-stage define symbol.
    pub fn set_vertex_define(&mut self, symbol: impl Into<String>) {
        self.vertex_define = symbol.into();
    }

    /// Replaces the fragment-stage define symbol.
    pub fn set_fragment_define(&mut self, symbol: impl Into<String>) {
        self.fragment_define = symbol.into();
    }

    /// Replaces the attribute tag whose functions survive the vertex stage.
    pub fn set_vertex_attribute(&mut self, name: impl Into<String>) {
        self.vertex_attribute = name.into();
    }

    /// Replaces the attribute tag whose functions survive the fragment stage.
    pub fn set_fragment_attribute(&mut self, name: impl Into<String>) {
        self.fragment_attribute = name.into();
    }

    /// Registers (or replaces) an include body. Entries persist until
    /// [`Preprocessor::remove_include`] is called.
    pub fn add_include(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.includes.insert(name.into(), source.into());
    }

    pub fn remove_include(&mut self, name: &str) {
        self.includes.remove(name);
    }

    /// Runs the full pipeline, producing both stage variants from `source`.
    ///
    /// `params` is consumed; the persistent configuration (including the
    /// include table) is read but never modified.
    pub fn process(&self, source: &str, params: ProcessParams) -> ProcessedSources {
        let vertex = self.process_stage(source, Stage::Vertex, &params);
        let fragment = self.process_stage(source, Stage::Fragment, &params);
        ProcessedSources { vertex, fragment }
    }

    fn process_stage(&self, source: &str, stage: Stage, params: &ProcessParams) -> String {
        let (stage_define, remove_attribute) = match stage {
            Stage::Vertex => (&self.vertex_define, &self.fragment_attribute),
            Stage::Fragment => (&self.fragment_define, &self.vertex_attribute),
        };

        let mut text = stamp_line_markers(source);
        text = self.resolve_includes(text);
        text = self.substitute_tokens(text, params);
        text = self.rewrite_io_declarations(text, stage);
        text = self.filter_attributed_functions(text, remove_attribute);
        text = format!("#define {stage_define}\n{text}");
        text = inject_defines(text, params);
        text = format!("{}\n{}", self.pragma_line, text);
        compact_line_markers(&text)
    }

    /// Repeatedly substitutes `#include <name>` directives from the include
    /// table. A missing name turns into a comment stub preserving the
    /// directive. Any replacement (found or stub) triggers another pass, up
    /// to [`INCLUDE_PASS_LIMIT`] passes.
    fn resolve_includes(&self, mut text: String) -> String {
        for _ in 0..INCLUDE_PASS_LIMIT {
            let mut replaced = false;
            text = replace_with(&self.include_re, &text, |caps| {
                replaced = true;
                let directive = caps.get(0).map(|m| m.as_str()).unwrap_or("");
                let name = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                match self.includes.get(name) {
                    Some(body) => body.clone(),
                    None => format!("// {directive} // include not found"),
                }
            });
            if !replaced {
                break;
            }
        }
        text
    }

    fn substitute_tokens(&self, text: String, params: &ProcessParams) -> String {
        replace_with(&self.token_re, &text, |caps| {
            let name = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            params.tokens.get(name).cloned().unwrap_or_default()
        })
    }

    /// Maps the shared `in`/`out`/`varying` declarations onto the stage's
    /// perspective. Deleted declarations leave their newline behind.
    fn rewrite_io_declarations(&self, text: String, stage: Stage) -> String {
        match stage {
            Stage::Vertex => {
                let text = strip_matches(&self.out_re, &text);
                let text = self
                    .in_re
                    .replace_all(&text, "layout(location = $3) in $1 $2;");
                self.varying_re.replace_all(&text, "out $1 $2;").into_owned()
            }
            Stage::Fragment => {
                let text = self
                    .out_re
                    .replace_all(&text, "layout(location = $3) out $1 $2;");
                let text = strip_matches(&self.in_re, &text);
                self.varying_re.replace_all(&text, "in $1 $2;").into_owned()
            }
        }
    }

    /// Scans `[[attr]]`-annotated functions left to right. A function whose
    /// attribute differs from `remove_attribute` keeps its definition and
    /// loses only the marker; a matching function is deleted through its
    /// balanced closing brace. When the body never balances, the remainder
    /// of the text after the opening brace is kept as-is.
    fn filter_attributed_functions(&self, mut text: String, remove_attribute: &str) -> String {
        loop {
            let Some(caps) = self.function_re.captures(&text) else {
                break;
            };
            let whole = caps.get(0).expect("group 0 always matches");
            let (start, body_start) = (whole.start(), whole.end());
            let attribute = caps.get(1).map(|m| m.as_str()).unwrap_or("");

            if attribute != remove_attribute {
                let header = caps
                    .get(2)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                text.replace_range(start..body_start, &header);
            } else {
                match balanced_close(&text[body_start..]) {
                    Some(close) => text.replace_range(start..body_start + close + 1, ""),
                    None => text.replace_range(start..body_start, ""),
                }
            }
        }
        text
    }
}

/// Prefixes every input line with its own 1-based `#line` marker so
/// diagnostics survive the insertions and deletions made by later stages.
fn stamp_line_markers(source: &str) -> String {
    let mut out = String::with_capacity(source.len() * 2);
    for (index, line) in source.lines().enumerate() {
        out.push_str("#line ");
        out.push_str(&(index + 1).to_string());
        out.push('\n');
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Prepends one `#define` line per one-shot symbol, in sorted order.
fn inject_defines(text: String, params: &ProcessParams) -> String {
    if params.defines.is_empty() {
        return text;
    }
    let mut block = String::new();
    for name in &params.defines {
        block.push_str("#define ");
        block.push_str(name);
        block.push('\n');
    }
    block.push_str(&text);
    block
}

/// Drops `#line` markers made redundant by the final layout: a marker whose
/// number equals the running output line count adds no information. A kept
/// marker re-bases the counter; a marker with an unparsable number is
/// emitted as an ordinary line.
fn compact_line_markers(text: &str) -> String {
    let mut expected: i64 = 1;
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("#line ") {
            if let Ok(number) = rest.trim().parse::<i64>() {
                if number == expected {
                    continue;
                }
                expected = number - 1;
            }
        }
        out.push_str(line);
        out.push('\n');
        expected += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meaningful_lines(text: &str) -> Vec<&str> {
        text.lines()
            .filter(|line| {
                !line.starts_with("#version")
                    && !line.starts_with("#define")
                    && !line.starts_with("#line")
            })
            .collect()
    }

    #[test]
    fn plain_source_passes_through() {
        let pp = Preprocessor::new();
        let source = "float a = 1.0;\nvoid main() {\n    gl_Position = vec4(a);\n}\n";
        let out = pp.process(source, ProcessParams::new());
        let original: Vec<&str> = source.lines().collect();
        assert_eq!(meaningful_lines(&out.vertex), original);
        assert_eq!(meaningful_lines(&out.fragment), original);
    }

    #[test]
    fn pragma_and_stage_defines_lead_the_output() {
        let mut pp = Preprocessor::new();
        let out = pp.process("void main() {}\n", ProcessParams::new());
        assert!(out.vertex.starts_with("#version 330 core\n"));
        assert!(out.vertex.contains("#define STAGE_VERTEX\n"));
        assert!(out.fragment.contains("#define STAGE_FRAGMENT\n"));
        assert!(!out.vertex.contains("STAGE_FRAGMENT"));

        pp.set_pragma_line("#version 410 core");
        let out = pp.process("void main() {}\n", ProcessParams::new());
        assert!(out.vertex.starts_with("#version 410 core\n"));
    }

    #[test]
    fn includes_resolve_and_persist() {
        let mut pp = Preprocessor::new();
        pp.add_include("common", "float tau = 6.2831853;");
        let source = "#include <common>\nvoid main() {}\n";

        let first = pp.process(source, ProcessParams::new());
        assert!(first.vertex.contains("float tau"));
        assert!(!first.vertex.contains("#include"));

        // The include table is persistent configuration.
        let second = pp.process(source, ProcessParams::new());
        assert!(second.fragment.contains("float tau"));

        pp.remove_include("common");
        let third = pp.process(source, ProcessParams::new());
        assert!(third.vertex.contains("// include not found"));
    }

    #[test]
    fn missing_include_degrades_to_comment_stub() {
        let pp = Preprocessor::new();
        let out = pp.process("#include <nope>\n", ProcessParams::new());
        assert!(out.vertex.contains("// #include <nope> // include not found"));
    }

    #[test]
    fn cyclic_includes_terminate_with_bounded_output() {
        let mut pp = Preprocessor::new();
        pp.add_include("a", "#include <b>");
        pp.add_include("b", "#include <a>");
        let out = pp.process("#include <a>\n", ProcessParams::new());
        // Eight passes bound the expansion; the dangling directive survives.
        assert!(out.vertex.len() < 4096);
        assert!(out.vertex.contains("#include"));
    }

    #[test]
    fn tokens_substitute_and_are_single_use() {
        let pp = Preprocessor::new();
        let source = "float v = %{X};\n";

        let first = pp.process(source, ProcessParams::new().with_token("X", "1.5"));
        assert!(first.vertex.contains("float v = 1.5;"));

        let second = pp.process(source, ProcessParams::new());
        assert!(second.vertex.contains("float v = ;"));
        assert!(!second.vertex.contains("1.5"));
    }

    #[test]
    fn io_declarations_diverge_per_stage() {
        let pp = Preprocessor::new();
        let source = "in vec3 position = 0;\nout vec4 color = 0;\nvarying vec3 normal;\n";
        let out = pp.process(source, ProcessParams::new());

        assert!(out.vertex.contains("layout(location = 0) in vec3 position;"));
        assert!(out.vertex.contains("out vec3 normal;"));
        assert!(!out.vertex.contains("color"));

        assert!(out.fragment.contains("layout(location = 0) out vec4 color;"));
        assert!(out.fragment.contains("in vec3 normal;"));
        assert!(!out.fragment.contains("position"));
    }

    #[test]
    fn attributed_functions_split_by_stage() {
        let pp = Preprocessor::new();
        let source = "\
[[vert]] vec3 warp(vec3 p) { if (p.x > 0.0) { p.y = 0.0; } return p; }
[[frag]] vec4 tint(vec4 c) { return c * 0.5; }
void main() {}
";
        let out = pp.process(source, ProcessParams::new());

        assert!(out.vertex.contains("vec3 warp(vec3 p)"));
        assert!(!out.vertex.contains("tint"));
        assert!(!out.vertex.contains("[["));

        assert!(out.fragment.contains("vec4 tint(vec4 c)"));
        assert!(!out.fragment.contains("warp"));
        assert!(!out.fragment.contains("p.y = 0.0;"));
        assert!(!out.fragment.contains("[["));
    }

    #[test]
    fn unbalanced_function_body_keeps_the_remainder() {
        let pp = Preprocessor::new();
        let source = "[[frag]] void broken(float x) { no closing brace\nfloat keep = 1.0;\n";
        let out = pp.process(source, ProcessParams::new());
        assert!(!out.vertex.contains("broken"));
        assert!(out.vertex.contains("no closing brace"));
        assert!(out.vertex.contains("float keep = 1.0;"));
    }

    #[test]
    fn one_shot_defines_inject_sorted_above_stage_define() {
        let pp = Preprocessor::new();
        let params = ProcessParams::new().with_define("USE_FOG").with_define("DEBUG");
        let out = pp.process("void main() {}\n", params);

        let debug = out.vertex.find("#define DEBUG").expect("DEBUG injected");
        let fog = out.vertex.find("#define USE_FOG").expect("USE_FOG injected");
        let stage = out.vertex.find("#define STAGE_VERTEX").expect("stage define");
        assert!(debug < fog && fog < stage);

        let again = pp.process("void main() {}\n", ProcessParams::new());
        assert!(!again.vertex.contains("DEBUG"));
    }

    #[test]
    fn redundant_line_markers_are_compacted() {
        let pp = Preprocessor::new();
        let out = pp.process("float a = 1.0;\nfloat b = 2.0;\n", ProcessParams::new());
        // Injected lines shift numbering once, so only the first marker
        // survives compaction.
        assert_eq!(out.vertex.matches("#line").count(), 1);
        assert!(out.vertex.contains("#line 1\nfloat a = 1.0;\nfloat b = 2.0;\n"));
    }

    #[test]
    fn custom_attributes_and_defines_are_respected() {
        let mut pp = Preprocessor::new();
        pp.set_vertex_attribute("vs");
        pp.set_fragment_attribute("fs");
        pp.set_vertex_define("V");
        pp.set_fragment_define("F");

        let source = "[[vs]] void only_vertex(float a) { a += 1.0; }\n";
        let out = pp.process(source, ProcessParams::new());
        assert!(out.vertex.contains("only_vertex"));
        assert!(!out.fragment.contains("only_vertex"));
        assert!(out.vertex.contains("#define V\n"));
        assert!(out.fragment.contains("#define F\n"));
    }
}
