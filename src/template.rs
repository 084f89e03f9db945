//! Template Generator - policy template source
//!
//! Placeholders are emitted as opaque mustache text; rendering happens
//! elsewhere.

use crate::configuration::FactoryConfiguration;

const INDENT: &str = "  ";

pub fn generate(config: &FactoryConfiguration) -> String {
    if !config.wrap_with_policy() {
        return config.factory_template().to_string();
    }

    let body = body_lines(config.factory_template());
    let mut out = PolicyWriter::default();

    out.line("- !policy");
    out.enter();
    if config.include_identifier() {
        out.line("id: {{ id }}");
    }
    out.line("annotations:");
    out.line("{{# annotations }}");
    out.enter();
    out.line("{{ key }}: {{ value }}");
    out.leave();
    out.line("{{/ annotations }}");

    if body.is_empty() && config.variables().is_empty() {
        return out.finish();
    }

    out.blank();
    out.line("body:");

    if !config.variables().is_empty() {
        if config.with_variables_group() {
            out.line("- &variables");
            out.enter();
            for v in config.variables() {
                out.line(&format!("- !variable {}", v.identifier()));
            }
            out.leave();
            out.blank();
        } else {
            for v in config.variables() {
                out.line(&format!("- !variable {}", v.identifier()));
            }
        }
    }

    for line in body {
        out.line(line);
    }
    out.finish()
}

/// Body lines without trailing blank lines.
fn body_lines(template: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = template.lines().collect();
    while lines.last().map_or(false, |l| l.trim().is_empty()) {
        lines.pop();
    }
    lines
}

#[derive(Default)]
struct PolicyWriter {
    lines: Vec<String>,
    depth: usize,
}

impl PolicyWriter {
    fn enter(&mut self) {
        self.depth += 1;
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn line(&mut self, text: &str) {
        if text.trim().is_empty() {
            self.blank();
        } else {
            self.lines.push(format!("{}{}", INDENT.repeat(self.depth), text));
        }
    }

    fn blank(&mut self) {
        self.lines.push(String::new());
    }

    fn finish(self) -> String {
        self.lines.join("\n")
    }
}
