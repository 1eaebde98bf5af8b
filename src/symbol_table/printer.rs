//! Text rendering of symbol tables and symbol references.

use std::fmt::Write;
use std::sync::Arc;

use crate::core::object::ContextObject;
use crate::symbol_table::SymbolTable;

/// `name` at displacement 0, `name+0x<hex>` otherwise.
pub fn format_reference(name: &str, displacement: u64) -> String {
    if displacement == 0 {
        name.to_string()
    } else {
        format!("{}+{:#x}", name, displacement)
    }
}

/// Renders a table and its children as an indented listing.
#[derive(Debug, Clone)]
pub struct SymbolTablePrinter {
    indent: usize,
    max_depth: usize,
}

impl Default for SymbolTablePrinter {
    fn default() -> Self {
        Self {
            indent: 2,
            max_depth: 16,
        }
    }
}

impl SymbolTablePrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    /// Children nested deeper than `max_depth` are elided.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn render(&self, table: &Arc<SymbolTable>) -> String {
        let mut out = String::new();
        self.render_table(table, 0, &mut out);
        out
    }

    fn render_table(&self, table: &Arc<SymbolTable>, depth: usize, out: &mut String) {
        let pad = " ".repeat(depth * self.indent);
        let _ = writeln!(out, "{}[{}] ({} symbols)", pad, table.name(), table.len());
        for (offset, symbol) in table.symbols() {
            let extent = match symbol.extent() {
                Some(size) => format!("{:#x}", size),
                None => "-".to_string(),
            };
            let _ = writeln!(
                out,
                "{}{}{:>#12x}  {:<18} {:>6}  {}",
                pad,
                " ".repeat(self.indent),
                offset,
                symbol.kind().to_string(),
                extent,
                symbol
            );
        }
        if depth >= self.max_depth {
            if !table.children().is_empty() {
                let _ = writeln!(out, "{}{}...", pad, " ".repeat(self.indent));
            }
            return;
        }
        for child in table.children() {
            self.render_table(&child, depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextConfig;
    use crate::context::Context;
    use crate::core::data_type::DataType;
    use crate::core::offset::Offset;
    use crate::core::symbol::{Symbol, SymbolKind};

    #[test]
    fn test_format_reference() {
        assert_eq!(format_reference("main", 0), "main");
        assert_eq!(format_reference("main", 4), "main+0x4");
        assert_eq!(format_reference("buf", 0x100), "buf+0x100");
    }

    #[test]
    fn test_render_nested() {
        let ctx = Context::new(ContextConfig::default());
        let global = SymbolTable::new(&ctx, "global");
        let locals = SymbolTable::new(&ctx, "main.locals");
        let int = DataType::scalar(&ctx, "int", 4, true);
        global.add_symbol(
            Offset::new(0x401000),
            Symbol::new(&ctx, SymbolKind::Function, "main", DataType::void(&ctx)),
        );
        locals.add_symbol(
            Offset::new(0x401004),
            Symbol::new(&ctx, SymbolKind::Variable, "i", int),
        );
        global.add_child(locals);

        let text = SymbolTablePrinter::new().render(&global);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("[global]"));
        assert!(lines[1].contains("0x401000") && lines[1].contains("void main"));
        assert!(lines[2].starts_with("  [main.locals]"));
        assert!(lines[3].contains("int i") && lines[3].contains("0x4"));

        let shallow = SymbolTablePrinter::new().with_max_depth(0).render(&global);
        assert!(shallow.lines().last().is_some_and(|l| l.trim() == "..."));
    }
}
