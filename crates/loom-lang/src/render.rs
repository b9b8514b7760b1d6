//! AST → source text.
//!
//! Output is canonical (4-space indentation, one item per line) and parses
//! back to an equal tree. Expressions are emitted as their stored source.

use std::fmt::Write;

use crate::ast::{Argument, Assignment, BodyItem, Construct, Define, Item, Module};

const INDENT: &str = "    ";

pub fn render_module(module: &Module) -> String {
    let mut out = String::new();
    for (i, item) in module.items.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        match item {
            Item::Define(d) => write_define(&mut out, d),
            Item::Construct(c) => write_construct(&mut out, c, 0),
        }
    }
    out
}

pub fn render_define(define: &Define) -> String {
    let mut out = String::new();
    write_define(&mut out, define);
    out
}

pub fn render_construct(construct: &Construct) -> String {
    let mut out = String::new();
    write_construct(&mut out, construct, 0);
    out
}

/// One line, without the trailing newline.
pub fn render_assignment(assignment: &Assignment) -> String {
    format!("{} {} {}", assignment.target, assignment.op, assignment.value.source)
}

/// The header line of a construct, without block or trailing colon.
pub fn render_construct_header(construct: &Construct) -> String {
    let mut out = construct.type_name.clone();
    if !construct.arguments.is_empty() {
        let args: Vec<String> = construct
            .arguments
            .iter()
            .map(|a| match a {
                Argument::Positional(e) => e.source.clone(),
                Argument::Keyword { name, value } => format!("{} = {}", name, value.source),
            })
            .collect();
        let _ = write!(out, "({})", args.join(", "));
    }
    if !construct.unpack.is_empty() {
        let _ = write!(out, " -> {}", construct.unpack.join(", "));
    }
    if !construct.captures.is_empty() {
        let captures: Vec<String> = construct.captures.iter().map(|c| format!("{} = {}", c.local, c.attr)).collect();
        let _ = write!(out, " [{}]", captures.join(", "));
    }
    out
}

fn write_define(out: &mut String, define: &Define) {
    let params = &define.parameters;
    let rendered: Vec<String> = params
        .names
        .iter()
        .enumerate()
        .map(|(i, name)| match params.default_for(i) {
            Some(default) => format!("{} = {}", name, default.source),
            None => name.clone(),
        })
        .collect();
    let _ = writeln!(out, "defn {}({}):", define.name, rendered.join(", "));
    if define.body.is_empty() {
        let _ = writeln!(out, "{}pass", INDENT);
    }
    for construct in &define.body {
        write_construct(out, construct, 1);
    }
}

fn write_construct(out: &mut String, construct: &Construct, depth: usize) {
    let indent = INDENT.repeat(depth);
    let header = render_construct_header(construct);
    if construct.body.is_empty() {
        let _ = writeln!(out, "{}{}", indent, header);
        return;
    }
    let _ = writeln!(out, "{}{}:", indent, header);
    for item in &construct.body {
        match item {
            BodyItem::Assignment(a) => {
                let _ = writeln!(out, "{}{}{}", indent, INDENT, render_assignment(a));
            }
            BodyItem::Construct(c) => write_construct(out, c, depth + 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;

    const SOURCE: &str = "\
defn Form(model, title = 'Untitled'):
    Window -> win:
        title << title + ' - ' + model.name
        Field(value = model.name) -> field [inner = text]:
            value := model.name
            text >> model.log(args.new)
        items[0].text = 'x'

Window:
    Label
";

    #[test]
    fn canonical_source_renders_verbatim() {
        let module = parse_str(SOURCE).unwrap();
        assert_eq!(render_module(&module), SOURCE);
    }

    #[test]
    fn render_then_parse_is_stable() {
        let messy = "defn F( a,b=1 ):\n  W(  1,k= 2 )->x:\n      v<<a . y\n      pass\n";
        let module = parse_str(messy).unwrap();
        let reparsed = parse_str(&render_module(&module)).unwrap();
        assert_eq!(module, reparsed);
    }

    #[test]
    fn empty_define_renders_pass() {
        let module = parse_str("defn F():\n    pass\n").unwrap();
        assert_eq!(render_module(&module), "defn F():\n    pass\n");
        assert_eq!(parse_str(&render_module(&module)).unwrap(), module);
    }
}
