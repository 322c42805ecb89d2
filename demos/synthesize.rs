use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use calvin::{
    ColumnType, ContainerWriter, DataHeader, DataSetWriter, GroupWriter, Parameter,
    ParameterValue, Value, LOCALE_SIZE, PARAM_ALGORITHM_NAME, PARAM_CHIP_TYPE, PARAM_NUM_COLUMNS,
    PARAM_NUM_ROWS,
};

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let path = args.next().context("usage: synthesize <output> [rows] [cols]")?;
    let rows: usize = args.next().map_or(Ok(8), |s| s.parse())?;
    let cols: usize = args.next().map_or(Ok(8), |s| s.parse())?;

    let parent = DataHeader::new(
        "affymetrix-calvin-scan-acquisition",
        "scan-0001",
        "2024-01-01T00:00:00Z",
        [0u8; LOCALE_SIZE],
        vec![Parameter::new(
            "affymetrix-scanner-id",
            ParameterValue::Text("SYN-1".into()),
        )],
        vec![],
    );
    let header = DataHeader::new(
        "affymetrix-calvin-intensity",
        "cel-0001",
        "2024-01-02T00:00:00Z",
        [0u8; LOCALE_SIZE],
        vec![
            Parameter::new(PARAM_NUM_ROWS, ParameterValue::Int(rows as i32)),
            Parameter::new(PARAM_NUM_COLUMNS, ParameterValue::Int(cols as i32)),
            Parameter::new(PARAM_CHIP_TYPE, ParameterValue::Text("Synthetic".into())),
            Parameter::new(PARAM_ALGORITHM_NAME, ParameterValue::Text("Percentile".into())),
            Parameter::new(
                "affymetrix-algorithm-param-Percentile",
                ParameterValue::Int(75),
            ),
        ],
        vec![parent],
    );

    let mut intensity = DataSetWriter::new("Intensity").column("Intensity", ColumnType::F32);
    let mut stddev = DataSetWriter::new("StdDev").column("StdDev", ColumnType::F32);
    let mut pixel = DataSetWriter::new("Pixel").column("Pixel", ColumnType::I16);
    for i in 0..rows * cols {
        intensity.push_row(vec![Value::F32(100.0 + i as f32 * 3.25)]);
        stddev.push_row(vec![Value::F32(i as f32 / 8.0)]);
        pixel.push_row(vec![Value::I16(16)]);
    }
    let mut outlier = DataSetWriter::new("Outlier")
        .column("X", ColumnType::I16)
        .column("Y", ColumnType::I16);
    outlier.push_row(vec![Value::I16(0), Value::I16(0)]);
    let mask = DataSetWriter::new("Mask")
        .column("X", ColumnType::I16)
        .column("Y", ColumnType::I16);

    let mut group = GroupWriter::new("Default Group");
    for set in [intensity, stddev, pixel, outlier, mask] {
        group.push_data_set(set);
    }
    let mut writer = ContainerWriter::new(header);
    writer.push_group(group);
    let mut out = BufWriter::new(File::create(&path)?);
    writer.write(&mut out)?;
    out.flush()?;
    eprintln!("wrote {rows} x {cols} grid to {path}");
    Ok(())
}
