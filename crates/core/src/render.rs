//! Nested-brace rendering of tables
//!
//! # Format
//!
//! ```text
//! config {
//!     width = 640,
//!     fullscreen = false,
//!     sizes {
//!         1,
//!         2,
//!     }
//! }
//! ```
//!
//! One entry per line, one tab per nesting level, a trailing comma after
//! every scalar, strings unquoted. Nested tables open with their key (or
//! their own name when positional) and close with a bare `}`.
//!
//! Rendering is a diagnostic aid and never fails. Each visited table is
//! traversed through its cursor; an empty entry aborts that table's
//! traversal, resets its cursor and returns to the parent without the
//! closing brace.

use crate::table::Table;
use crate::value::Payload;
use std::fmt::Write;

impl Table {
    /// Render the table and everything nested in it
    pub fn render(&mut self) -> String {
        let mut out = String::new();
        let label = self.name().to_string();
        render_table(self, &label, 0, &mut out);
        out
    }

    /// Render to stdout
    pub fn print(&mut self) {
        print!("{}", self.render());
    }
}

fn render_table(table: &mut Table, label: &str, depth: usize, out: &mut String) {
    open(label, depth, out);
    table.reset_cursor();

    while let Some(index) = table.advance_cursor() {
        let entry = &mut table.entries_mut()[index];
        match entry.value.payload_mut() {
            Some(Payload::Table(inner)) => {
                let inner_label = if entry.key.is_empty() {
                    inner.name().to_string()
                } else {
                    entry.key.clone()
                };
                render_table(inner, &inner_label, depth + 1, out);
            }
            Some(scalar) => {
                indent(depth + 1, out);
                if !entry.key.is_empty() {
                    out.push_str(&entry.key);
                    out.push_str(" = ");
                }
                write_scalar(scalar, out);
                out.push_str(",\n");
            }
            None => {
                table.reset_cursor();
                return;
            }
        }
    }

    indent(depth, out);
    out.push_str("}\n");
}

fn open(label: &str, depth: usize, out: &mut String) {
    indent(depth, out);
    if !label.is_empty() {
        out.push_str(label);
        out.push(' ');
    }
    out.push_str("{\n");
}

fn indent(depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push('\t');
    }
}

fn write_scalar(payload: &Payload, out: &mut String) {
    // Writing to a String cannot fail
    let _ = match payload {
        Payload::Integer(v) => write!(out, "{}", v),
        Payload::Float(v) => write!(out, "{}", v),
        Payload::Double(v) => write!(out, "{}", v),
        Payload::Boolean(v) => write!(out, "{}", v),
        Payload::String(v) => write!(out, "{}", v),
        Payload::Table(_) => Ok(()),
    };
}

#[cfg(test)]
mod tests {
    use crate::table::{Table, TableMode};
    use crate::value::TaggedValue;

    #[test]
    fn test_render_flat_keyed() {
        let mut table = Table::named("config");
        table.add_named("width", 640_i64);
        table.add_named("ratio", 1.5_f64);
        table.add_named("fullscreen", false);
        table.add_named("title", "demo".to_string());

        assert_eq!(
            table.render(),
            "config {\n\twidth = 640,\n\tratio = 1.5,\n\tfullscreen = false,\n\ttitle = demo,\n}\n"
        );
    }

    #[test]
    fn test_render_indexed_values() {
        let mut table = Table::named("list");
        table.add_value(1_i64);
        table.add_value(true);
        assert_eq!(table.render(), "list {\n\t1,\n\ttrue,\n}\n");
    }

    #[test]
    fn test_render_nested_indentation() {
        let mut leaf = Table::new();
        leaf.add_value(3_i64);

        let mut middle = Table::new();
        middle.add_named("x", 1_i64);
        middle.add_named("leaf", leaf);
        middle.add_named("y", 2_i64);

        let mut root = Table::named("root");
        root.add_named("a", "first".to_string());
        root.add_named("middle", middle);
        root.add_named("b", "last".to_string());

        let expected = "root {\n\
                        \ta = first,\n\
                        \tmiddle {\n\
                        \t\tx = 1,\n\
                        \t\tleaf {\n\
                        \t\t\t3,\n\
                        \t\t}\n\
                        \t\ty = 2,\n\
                        \t}\n\
                        \tb = last,\n\
                        }\n";
        assert_eq!(root.render(), expected);
    }

    #[test]
    fn test_render_positional_nested_uses_table_name() {
        let mut inner = Table::named("point");
        inner.add_value(4_i64);
        let mut outer = Table::named("shapes");
        outer.add_value(inner);
        assert_eq!(outer.render(), "shapes {\n\tpoint {\n\t\t4,\n\t}\n}\n");
    }

    #[test]
    fn test_render_stops_at_unset_entry() {
        let mut table = Table::named("broken").with_mode(TableMode::Indexed);
        table.add_value(1_i64);
        table.add_entry("", TaggedValue::new());
        table.add_value(3_i64);

        let out = table.render();
        assert_eq!(out, "broken {\n\t1,\n");
        assert_eq!(table.cursor(), 0, "cursor resets after aborted traversal");
    }

    #[test]
    fn test_render_unset_nested_entry_parent_continues() {
        let mut inner = Table::new();
        inner.add_entry("bad", TaggedValue::new());
        let mut outer = Table::named("outer");
        outer.add_named("inner", inner);
        outer.add_named("after", 7_i64);

        assert_eq!(outer.render(), "outer {\n\tinner {\n\tafter = 7,\n}\n");
    }

    #[test]
    fn test_render_twice_is_stable() {
        let mut table = Table::named("t");
        table.add_named("k", 1_i64);
        let first = table.render();
        assert!(table.is_end());
        assert_eq!(table.render(), first);
    }
}
