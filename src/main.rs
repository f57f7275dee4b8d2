mod app;
mod fleet_core;
mod model;
mod nav;
mod services;
mod theme;
mod ui;
mod widgets;

use anyhow::Result;

fn main() -> Result<()> {
    ui::run()
}
