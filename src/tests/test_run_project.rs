use super::{parameters_json, MemoryOutput, RecordingProgress};
use crate::errors::SubterraError;
use crate::output::SinkOutput;
use crate::run_project;
use pretty_assertions::assert_eq;
use rstest::*;
use serde_json::json;

#[rstest]
fn should_write_every_results_table() {
    let output = MemoryOutput::default();
    let mut progress = RecordingProgress::default();

    let summary = run_project(
        parameters_json().to_string().as_bytes(),
        &output,
        &mut progress,
    )
    .unwrap();

    assert_eq!(summary.steps, 365);

    let profile = output.text("powerprofile_multi").unwrap();
    assert_eq!(profile.lines().count(), 366);
    assert!(profile.starts_with("day,power\n1,"));

    let timeseries = output.text("timeseries").unwrap();
    let mut lines = timeseries.lines();
    assert_eq!(
        lines.next(),
        Some("day,error,E_probe,E_flux,Delta_E,E_inout,Q_probe,E_storage")
    );
    assert_eq!(lines.count(), 365);
    assert!(timeseries.lines().nth(1).unwrap().ends_with(",,"));

    let temperatures = output.text("borehole_temperatures").unwrap();
    assert!(temperatures.starts_with("day,BH01\n"));
    assert_eq!(temperatures.lines().count(), 366);
    assert_eq!(output.text("electrical_energy").unwrap().lines().count(), 366);

    let snapshot = output.text("T_vertex_1.0a").unwrap();
    assert!(snapshot.starts_with("x,y,value\n"));
    assert!(output.text("snapshot_cells").unwrap().starts_with("v0,v1,v2\n"));

    assert_eq!(progress.records.first().unwrap().phase, "preparing");
    let last = progress.records.last().unwrap();
    assert_eq!(last.phase, "finalizing");
    assert_eq!(last.current_step, 365);
    assert_eq!(last.total_steps, 365);
    assert_eq!(last.percent, 100.);
}

#[rstest]
fn should_run_without_writing_to_a_sink() {
    let summary = run_project(
        parameters_json().to_string().as_bytes(),
        &SinkOutput,
        &mut RecordingProgress::default(),
    )
    .unwrap();

    assert_eq!(summary.steps, 365);
    assert!(summary.mean_absolute_residual.is_finite());
}

#[rstest]
#[case::missing_fields("/ground", json!({"thermalConductivity": 2.0}))]
#[case::negative_conductivity("/ground/thermalConductivity", json!(-1.0))]
#[case::zero_step("/time/timeStepHours", json!(0.0))]
#[case::no_years("/time/simulationYears", json!(0))]
fn should_reject_invalid_parameter_files(
    #[case] pointer: &str,
    #[case] replacement: serde_json::Value,
) {
    let mut value = parameters_json();
    *value.pointer_mut(pointer).unwrap() = replacement;
    let output = MemoryOutput::default();

    let error = run_project(
        value.to_string().as_bytes(),
        &output,
        &mut RecordingProgress::default(),
    )
    .unwrap_err();

    assert!(matches!(error, SubterraError::Configuration(_)));
    assert_eq!(error.exit_code(), 2);
    assert_eq!(output.text("timeseries"), None);
}

#[rstest]
fn should_reject_malformed_json() {
    let error = run_project(
        "{\"ground\":".as_bytes(),
        &MemoryOutput::default(),
        &mut RecordingProgress::default(),
    )
    .unwrap_err();

    assert!(matches!(error, SubterraError::Configuration(_)));
}
