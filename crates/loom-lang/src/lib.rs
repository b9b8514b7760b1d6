//! Lexer, parser, AST, builder API and renderer for the **Loom UI language**
//! (`.loom`).
//!
//! This crate knows nothing about widgets or evaluation so it can be consumed
//! by editor tooling and linters on its own.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`ast`] | `Module`, `Define`, `Construct`, `Assignment`, `Target`, `Expression` |
//! | [`builder`] | programmatic AST construction (`simple`, `delegate`, `bind`, `notify`) |
//! | [`error`] | `SyntaxError` |
//! | [`expr`] | host-expression AST and grammar |
//! | [`lexer`] | `Lexer`, `Token` |
//! | [`parser`] | `parse_str` entry point |
//! | [`render`] | AST → canonical source |
//! | [`target`] | the assignment left-hand-side matcher |
//!
//! # Quick start
//!
//! ```rust
//! use loom_lang::parse_str;
//!
//! let src = "
//! defn Form(model):
//!     Window -> win:
//!         title << model.name
//!         Field -> field:
//!             value := model.name
//! ";
//!
//! let module = parse_str(src).unwrap();
//! assert_eq!(module.define("Form").unwrap().body[0].type_name, "Window");
//! ```

pub mod ast;
pub mod builder;
pub mod error;
pub mod expr;
pub mod lexer;
pub mod parser;
pub mod render;
pub mod target;

pub use ast::{Expression, Module, Operator};
pub use error::SyntaxError;
pub use parser::parse_str;

#[cfg(test)]
mod parse_tests {
    use super::*;

    fn ok(src: &str) { parse_str(src).unwrap(); }
    fn err(src: &str) { parse_str(src).unwrap_err(); }

    #[test] fn empty_source() { ok(""); }
    #[test] fn bare_widget() { ok("Window\n"); }
    #[test] fn widget_with_pass() { ok("Window:\n    pass\n"); }
    #[test] fn nested_widgets() {
        ok("Window:\n    Form:\n        Label:\n            text = 'hi'\n");
    }
    #[test] fn comments_everywhere() {
        ok("# top\nWindow:  # trailing\n    # inside\n    title = 'x'  # after\n");
    }
    #[test] fn all_operators() {
        ok("Slider:\n    a = 1\n    b := m.x\n    c << m.y\n    d >> m.log(args.new)\n");
    }
    #[test] fn tabs_for_indentation() { ok("Window:\n\ttitle = 'x'\n"); }
    #[test] fn crlf_line_endings() { ok("Window:\r\n    title = 'x'\r\n"); }
    #[test] fn defn_and_top_level_widget() {
        ok("defn A(m):\n    Label\n\nWindow:\n    A(m)\n");
    }
    #[test] fn defn_without_params() { ok("defn A():\n    Label\n"); }
    #[test] fn expression_forms() {
        ok("W:\n    v << (m.x * 2 + 1) // 3 if m.on and not m.off else -1\n    w << [a, b][0].c\n");
    }
    #[test] fn string_concatenation_literals() { ok("W:\n    v = 'a' 'b'\n"); }
    #[test] fn explicit_line_continuation() { ok("W:\n    v = 1 + \\\n        2\n"); }
    #[test] fn err_missing_colon_in_defn() { err("defn A(m)\n    Label\n"); }
    #[test] fn err_unclosed_paren() { err("W(1, 2\n"); }
    #[test] fn err_empty_block() { err("W:\n\n"); }
    #[test] fn err_deep_lhs() { err("W:\n    a.b.c << 1\n"); }
    #[test] fn err_operator_without_rhs() { err("W:\n    a :=\n"); }
    #[test] fn err_capture_missing_attr() { err("W -> w [a = ]\n"); }
    #[test] fn err_arrow_without_name() { err("W ->\n"); }
}
