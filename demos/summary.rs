use anyhow::{Context, Result};
use calvin::{open_container, CelFile, Container, Facade};

fn print_structure(container: &Container) {
    let header = container.root_header();
    println!("Container version {}, {} bytes", container.version(), container.len());
    for (idx, h) in header.walk().enumerate() {
        println!(
            "header[{idx}] type={} id={} created={} locale={} params={}",
            h.data_type(),
            h.file_id(),
            h.creation_date(),
            h.locale(),
            h.parameters().len()
        );
    }
    for group in container.data_groups() {
        println!("group {:?} ({} data sets)", group.name(), group.num_data_sets());
        for set in group.data_sets() {
            let columns: Vec<_> = set
                .columns()
                .iter()
                .map(|c| format!("{}:{:?}", c.name(), c.kind()))
                .collect();
            println!(
                "  set {:?} rows={} width={} [{}]",
                set.name(),
                set.num_rows(),
                set.row_width(),
                columns.join(", ")
            );
        }
    }
}

fn print_facade(facade: &Facade) {
    println!("chip type: {}", facade.chip_type.as_deref().unwrap_or("-"));
    println!("algorithm: {}", facade.algorithm_name.as_deref().unwrap_or("-"));
    println!("grid: {} x {}", facade.num_rows, facade.num_columns);
    for (key, value) in &facade.parameters {
        println!("  param {key} = {value}");
    }
    for (key, value) in &facade.statistics {
        println!("  stat {key} = {value}");
    }
}

fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .context("usage: summary <container>")?;
    let container = open_container(&path)?;
    print_structure(&container);
    print_facade(&Facade::new(&container)?);

    if let Ok(cel) = CelFile::new(&container) {
        for cell in cel.cells().take(5) {
            let cell = cell?;
            println!(
                "({}, {}) intensity={:.2} stddev={:.2} pixels={}",
                cell.x, cell.y, cell.intensity, cell.stddev, cell.pixels
            );
        }
    }
    Ok(())
}
