use crate::core::borehole_field::BoreholeField;
use crate::core::time_stepper::StepRecord;
use crate::fem::SnapshotGeometry;
use crate::output::Output;
use csv::{Writer, WriterBuilder};
use nalgebra::DVector;
use std::io::Write;

/// Steps between two flushes of the step files.
pub const FLUSH_INTERVAL: usize = 365;

const TIMESERIES_HEADINGS: [&str; 8] = [
    "day", "error", "E_probe", "E_flux", "Delta_E", "E_inout", "Q_probe", "E_storage",
];

/// Receives the results of a run. Append only: nothing written is ever read back.
pub trait StepWriter {
    fn append_step(&mut self, record: &StepRecord) -> anyhow::Result<()>;

    fn append_snapshot(
        &mut self,
        label: &str,
        values: &DVector<f64>,
        geometry: &SnapshotGeometry,
    ) -> anyhow::Result<()>;

    fn close(&mut self) -> anyhow::Result<()>;
}

fn optional_cell(value: Option<f64>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}

/// Writes step records as CSV tables to an [`Output`]:
/// * `timeseries` - energy balance terms per step
/// * `borehole_temperatures` - sampled temperature per borehole and step
/// * `electrical_energy` - heat pump draw per borehole and step
/// * one table of vertex values per snapshot, plus `snapshot_cells` once
pub struct CsvStepWriter<'o, O: Output> {
    output: &'o O,
    timeseries: Writer<Box<dyn Write + 'o>>,
    temperatures: Writer<Box<dyn Write + 'o>>,
    electrical: Writer<Box<dyn Write + 'o>>,
    steps_since_flush: usize,
    cells_written: bool,
}

impl<'o, O: Output> CsvStepWriter<'o, O> {
    pub fn new(output: &'o O, boreholes: &BoreholeField) -> anyhow::Result<Self> {
        let mut timeseries = Self::table(output, "timeseries")?;
        timeseries.write_record(TIMESERIES_HEADINGS)?;

        let headings: Vec<&str> = std::iter::once("day").chain(boreholes.names()).collect();
        let mut temperatures = Self::table(output, "borehole_temperatures")?;
        temperatures.write_record(&headings)?;
        let mut electrical = Self::table(output, "electrical_energy")?;
        electrical.write_record(&headings)?;

        Ok(Self {
            output,
            timeseries,
            temperatures,
            electrical,
            steps_since_flush: 0,
            cells_written: false,
        })
    }

    fn table(
        output: &'o O,
        location_key: &'static str,
    ) -> anyhow::Result<Writer<Box<dyn Write + 'o>>> {
        let writer: Box<dyn Write + 'o> = Box::new(output.writer_for_location_key(location_key)?);
        Ok(WriterBuilder::new().from_writer(writer))
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        self.timeseries.flush()?;
        self.temperatures.flush()?;
        self.electrical.flush()?;
        self.steps_since_flush = 0;

        Ok(())
    }
}

impl<O: Output> StepWriter for CsvStepWriter<'_, O> {
    fn append_step(&mut self, record: &StepRecord) -> anyhow::Result<()> {
        let balance = &record.balance;
        self.timeseries.write_record([
            record.day.to_string(),
            balance.residual.to_string(),
            balance.probe.to_string(),
            balance.flux.to_string(),
            balance.ground.to_string(),
            balance.in_out().to_string(),
            optional_cell(record.q_probe),
            optional_cell(record.e_storage),
        ])?;

        self.temperatures.write_record(
            std::iter::once(record.day.to_string()).chain(
                record
                    .borehole_temperatures
                    .iter()
                    .map(|temperature| optional_cell(temperature.value())),
            ),
        )?;
        self.electrical.write_record(
            std::iter::once(record.day.to_string()).chain(
                record
                    .electrical_energy
                    .iter()
                    .map(|draw| draw.energy().to_string()),
            ),
        )?;

        self.steps_since_flush += 1;
        if self.steps_since_flush >= FLUSH_INTERVAL {
            self.flush()?;
        }

        Ok(())
    }

    fn append_snapshot(
        &mut self,
        label: &str,
        values: &DVector<f64>,
        geometry: &SnapshotGeometry,
    ) -> anyhow::Result<()> {
        if self.output.is_noop() {
            return Ok(());
        }

        if !self.cells_written {
            let mut cells = Self::table(self.output, "snapshot_cells")?;
            cells.write_record(["v0", "v1", "v2"])?;
            for cell in &geometry.cells {
                cells.write_record(cell.map(|vertex| vertex.to_string()))?;
            }
            cells.flush()?;
            self.cells_written = true;
        }

        let mut snapshot =
            WriterBuilder::new().from_writer(self.output.writer_for_location_key(label)?);
        snapshot.write_record(["x", "y", "value"])?;
        for (point, value) in geometry.coordinates.iter().zip(values.iter()) {
            snapshot.write_record([point.x.to_string(), point.y.to_string(), value.to_string()])?;
        }
        snapshot.flush()?;

        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.flush()
    }
}
