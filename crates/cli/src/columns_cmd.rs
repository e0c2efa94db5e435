use anyhow::Result;
use clap::ValueEnum;

use crate::context::AppContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn is_on(self) -> bool {
        self == Switch::On
    }
}

pub fn show(ctx: &AppContext, table: &str) -> Result<()> {
    let visibility = ctx.tables.column_visibility(table);
    if visibility.is_empty() {
        println!("{table}: all columns visible");
        return Ok(());
    }
    println!("{table}:");
    for (column, visible) in &visibility {
        println!("  {column:<24} {}", if *visible { "on" } else { "off" });
    }
    Ok(())
}

pub fn toggle(ctx: &AppContext, table: &str, column: &str, visible: bool) -> Result<()> {
    ctx.tables.toggle_column_visibility(table, column, visible);
    show(ctx, table)
}

pub fn reset(ctx: &AppContext, table: &str) -> Result<()> {
    ctx.tables.reset_column_visibility(table);
    println!("{table}: overrides cleared");
    Ok(())
}
