use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use gmx_model::{Dataset, FieldGroup};

use crate::commands::DescribeResult;
use crate::types::{MergeResult, RepartitionResult};

pub fn print_merge_summary(result: &MergeResult) {
    println!("Output: {}", result.output.display());
    println!("Alignment: {}", result.mode);
    if let Some(path) = &result.drop_report_path {
        println!("Drop report: {}", path.display());
    }

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Label"),
        header_cell("Path"),
        header_cell("Samples"),
        header_cell("Dropped"),
        header_cell("Rows"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);
    align_column(&mut table, 4, CellAlignment::Right);
    for input in &result.inputs {
        table.add_row(vec![
            Cell::new(&input.label).add_attribute(Attribute::Bold),
            dim_cell(input.path.display()),
            Cell::new(input.columns),
            count_cell(input.dropped, Color::Yellow),
            Cell::new(input.rows),
        ]);
    }
    table.add_row(vec![
        Cell::new("MERGED").add_attribute(Attribute::Bold),
        dim_cell(format!("{} partitions", result.partitions)),
        Cell::new(result.columns).add_attribute(Attribute::Bold),
        Cell::new(result.drop_report.total_dropped()),
        Cell::new(result.rows).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");
    println!("Row fields: {}", joined(&result.row_fields));
    println!("Entry fields: {}", joined(&result.entry_fields));
}

pub fn print_repartition_summary(result: &RepartitionResult) {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Property"), header_cell("Value")]);
    apply_table_style(&mut table);
    let strategy = if result.shuffle { "balanced" } else { "coalesced" };
    let rows = [
        ("Input", result.input.display().to_string()),
        ("Output", result.output.display().to_string()),
        ("Strategy", strategy.to_string()),
        (
            "Partitions",
            format!("{} -> {}", result.source_partitions, result.partitions),
        ),
        ("Rows", result.rows.to_string()),
        (
            "Partition size",
            format!("{}..={}", result.smallest, result.largest),
        ),
    ];
    for (name, value) in rows {
        table.add_row(vec![Cell::new(name).add_attribute(Attribute::Bold), Cell::new(value)]);
    }
    println!("{table}");
}

pub fn print_description(result: &DescribeResult) {
    let dataset = &result.dataset;
    let metadata = dataset.metadata();
    println!("Dataset: {} ({})", metadata.label, dataset.root().display());
    println!(
        "Created: {}",
        metadata.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "Samples: {}  Rows: {}  Partitions: {}",
        metadata.columns.len(),
        metadata.total_rows(),
        metadata.partitions.len()
    );
    if let Some(rows) = result.verified_rows {
        println!("Verified: {rows} rows read, all checksums match");
    }

    let mut fields = Table::new();
    fields.set_header(vec![
        header_cell("Group"),
        header_cell("Field"),
        header_cell("Type"),
    ]);
    apply_table_style(&mut fields);
    for (group, group_fields) in dataset.schema().groups() {
        for field in group_fields {
            fields.add_row(vec![
                group_cell(group),
                Cell::new(&field.name),
                dim_cell(&field.field_type),
            ]);
        }
    }
    println!("{fields}");

    let mut partitions = Table::new();
    partitions.set_header(vec![
        header_cell("#"),
        header_cell("Rows"),
        header_cell("First key"),
        header_cell("Last key"),
    ]);
    apply_table_style(&mut partitions);
    align_column(&mut partitions, 0, CellAlignment::Right);
    align_column(&mut partitions, 1, CellAlignment::Right);
    for (index, entry) in metadata.partitions.iter().enumerate() {
        partitions.add_row(vec![
            Cell::new(index),
            Cell::new(entry.rows),
            key_cell(entry.first_key.as_ref()),
            key_cell(entry.last_key.as_ref()),
        ]);
    }
    println!("{partitions}");
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(140);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label).add_attribute(Attribute::Bold)
}

fn dim_cell<T: std::fmt::Display>(value: T) -> Cell {
    Cell::new(value).add_attribute(Attribute::Dim)
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count == 0 {
        dim_cell("0")
    } else {
        Cell::new(count).fg(color)
    }
}

fn group_cell(group: FieldGroup) -> Cell {
    let color = match group {
        FieldGroup::RowKey => Color::Cyan,
        FieldGroup::Row => Color::Green,
        FieldGroup::Entry => Color::Magenta,
    };
    Cell::new(group).fg(color)
}

fn key_cell(key: Option<&gmx_model::RowKey>) -> Cell {
    match key {
        Some(key) => Cell::new(key),
        None => dim_cell("-"),
    }
}

fn joined(names: &[String]) -> String {
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(", ")
    }
}
