mod test_run_project;

use crate::core::time_stepper::StepRecord;
use crate::fem::SnapshotGeometry;
use crate::input::{ingest, SimulationParameters};
use crate::output::Output;
use crate::output_writer::StepWriter;
use crate::progress::{ProgressRecord, ProgressSink};
use nalgebra::DVector;
use serde_json::json;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

/// A single borehole in a 24 m square, one year of daily steps.
pub(crate) fn parameters_json() -> serde_json::Value {
    json!({
        "ground": {
            "thermalConductivity": 2.0,
            "heatCapacityDensity": 2.0e6,
            "porosity": 0.0,
            "modelType": 3,
            "temperature": 283.15
        },
        "groundwater": {
            "thermalConductivity": 0.6,
            "density": 1000.0,
            "specificHeat": 4180.0,
            "velocityX": 0.0,
            "velocityY": 0.0
        },
        "mesh": {
            "xLength": 24.0,
            "yLength": 24.0,
            "xCenter": 0.0,
            "yCenter": 0.0,
            "boreholeDistance": 6.0,
            "meshFactor": 2.0,
            "meshFine": 0.5
        },
        "meshMode": {"type": "square", "rings": 0},
        "time": {"simulationYears": 1, "timeStepHours": 24.0},
        "power": {
            "coefficientA": -20.0,
            "coefficientB": 5.0,
            "pipeRadius": 0.1,
            "efficiency": 3.0
        },
        "temperatureHot": 308.15,
        "enableConvection": false
    })
}

pub(crate) fn parameters_from(value: &serde_json::Value) -> SimulationParameters {
    ingest(value.to_string().as_bytes()).unwrap()
}

#[derive(Debug, Default)]
pub(crate) struct RecordingWriter {
    pub records: Vec<StepRecord>,
    pub snapshots: Vec<(String, DVector<f64>)>,
    pub closed: usize,
}

impl StepWriter for RecordingWriter {
    fn append_step(&mut self, record: &StepRecord) -> anyhow::Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn append_snapshot(
        &mut self,
        label: &str,
        values: &DVector<f64>,
        _geometry: &SnapshotGeometry,
    ) -> anyhow::Result<()> {
        self.snapshots.push((label.to_string(), values.clone()));
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.closed += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordingProgress {
    pub records: Vec<ProgressRecord>,
}

impl ProgressSink for RecordingProgress {
    fn report(&mut self, record: &ProgressRecord) {
        self.records.push(record.clone());
    }
}

/// Collects everything written per location key in memory.
#[derive(Debug, Default)]
pub(crate) struct MemoryOutput {
    files: Rc<RefCell<HashMap<String, Vec<u8>>>>,
}

impl MemoryOutput {
    pub fn text(&self, key: &str) -> Option<String> {
        self.files
            .borrow()
            .get(key)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

struct MemoryFile {
    key: String,
    files: Rc<RefCell<HashMap<String, Vec<u8>>>>,
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.files
            .borrow_mut()
            .entry(self.key.clone())
            .or_default()
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Output for MemoryOutput {
    fn writer_for_location_key(&self, location_key: &str) -> anyhow::Result<impl Write> {
        self.files
            .borrow_mut()
            .insert(location_key.to_string(), vec![]);
        Ok(MemoryFile {
            key: location_key.to_string(),
            files: self.files.clone(),
        })
    }
}
