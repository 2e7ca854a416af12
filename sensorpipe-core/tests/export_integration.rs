//! Chunked export over the assembled module: pagination, resume,
//! degraded buffers and the latest-row endpoint

mod common;

use common::build_module;

use sensorpipe_core::{ExportCursor, PipelineConfig};

fn module_with_rows(rows: &[i32]) -> (sensorpipe_core::SensorModule, std::rc::Rc<sensorpipe_core::FixedClock>) {
    let mut config = PipelineConfig::new(1);
    config.sample_averaging = 1;
    let (mut module, clock, _) = build_module(config);

    for (t, x) in rows.iter().enumerate() {
        clock.set(t as u64);
        module.add_sample(&[*x]);
        module.service();
    }
    (module, clock)
}

#[test]
fn raw_export_resumes_across_fills() {
    let (mut module, _) = module_with_rows(&[1, 2, 3, 4]);

    // Rows are "t,v;\n" = 5 bytes each; buffer fits exactly two
    let mut buffer = [0u8; 10];
    let n = module.export_raw(&mut buffer, ExportCursor::Start);
    assert_eq!(&buffer[..n], b"0,1;\n1,2;\n");
    assert!(!module.export_complete());

    let n = module.export_raw(&mut buffer, ExportCursor::Resume);
    assert_eq!(&buffer[..n], b"2,3;\n3,4;\n");
    assert!(module.export_complete());
}

#[test]
fn scaled_export_applies_calibration() {
    let mut config = PipelineConfig::new(1);
    config.sample_averaging = 1;
    config.averaging_offset_scaling = 1;
    let (mut module, clock, _) = build_module(config);

    // Calibrate offset = -100, then record two normal rows
    module.measure_offset().unwrap();
    module.add_sample(&[100]);
    module.service();

    for (t, x) in [100, 200].iter().enumerate() {
        clock.set(t as u64);
        module.add_sample(&[*x]);
        module.service();
    }

    let mut buffer = [0u8; 64];
    let n = module.export_scaled(&mut buffer, ExportCursor::Start);
    assert_eq!(&buffer[..n], b"0,0;\n1,100;\n");

    // Raw export keeps the uncalibrated fixed-point values
    let n = module.export_raw(&mut buffer, ExportCursor::Start);
    assert_eq!(&buffer[..n], b"0,100;\n1,200;\n");
}

#[test]
fn undersized_buffer_degrades_to_filler() {
    let (mut module, _) = module_with_rows(&[123456789]);

    let mut tiny = [0u8; 4];
    let n = module.export_raw(&mut tiny, ExportCursor::Start);
    assert_eq!(&tiny[..n], b" ");
    assert!(!module.export_complete());

    // Same export finishes once a fitting buffer arrives
    let mut buffer = [0u8; 32];
    let n = module.export_raw(&mut buffer, ExportCursor::Resume);
    assert_eq!(&buffer[..n], b"0,123456789;\n");
    assert!(module.export_complete());
}

#[test]
fn restart_resets_abandoned_export() {
    let (mut module, _) = module_with_rows(&[1, 2, 3]);

    let mut buffer = [0u8; 5];
    let n = module.export_raw(&mut buffer, ExportCursor::Start);
    assert_eq!(&buffer[..n], b"0,1;\n");

    // Abandon, then a fresh Start walks the full history again
    let mut full = [0u8; 32];
    let n = module.export_raw(&mut full, ExportCursor::Start);
    assert_eq!(&full[..n], b"0,1;\n1,2;\n2,3;\n");
}

#[test]
fn latest_returns_newest_calibrated_row() {
    let (mut module, clock) = module_with_rows(&[10, 20]);

    let mut buffer = [0u8; 16];
    let n = module.export_latest(&mut buffer);
    assert_eq!(&buffer[..n], b"1,20;\n");

    clock.set(9);
    module.add_sample(&[30]);
    module.service();
    let n = module.export_latest(&mut buffer);
    assert_eq!(&buffer[..n], b"9,30;\n");
}

#[test]
fn latest_on_empty_history_is_empty() {
    let mut config = PipelineConfig::new(1);
    config.sample_averaging = 1;
    let (mut module, _, _) = build_module(config);

    let mut buffer = [0u8; 16];
    assert_eq!(module.export_latest(&mut buffer), 0);
}

#[test]
fn eviction_during_paused_export_drops_one_row_at_most() {
    let mut config = PipelineConfig::new(1);
    config.sample_averaging = 1;
    config.history_capacity = 3;
    let (mut module, clock, _) = build_module(config);

    for (t, x) in [1, 2, 3].iter().enumerate() {
        clock.set(t as u64);
        module.add_sample(&[*x]);
        module.service();
    }

    // Export the first row, leaving the bookmark on the second
    let mut buffer = [0u8; 5];
    let n = module.export_raw(&mut buffer, ExportCursor::Start);
    assert_eq!(&buffer[..n], b"0,1;\n");

    // A new window evicts the oldest row; the bookmarked second row survives
    clock.set(3);
    module.add_sample(&[4]);
    module.service();

    let mut full = [0u8; 32];
    let n = module.export_raw(&mut full, ExportCursor::Resume);
    assert_eq!(&full[..n], b"1,2;\n2,3;\n3,4;\n");
    assert!(module.export_complete());
}
