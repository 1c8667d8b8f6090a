//! Output rendering for gate listings and simulation reports

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use sempool_resources::GateAvailability;

use crate::error::CliError;
use crate::simulate::SimulationReport;

/// Renders command results as tables or JSON
#[derive(Debug, Clone, Copy)]
pub struct OutputRenderer {
    json: bool,
}

impl OutputRenderer {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn render_gates(&self, gates: &[GateAvailability]) -> Result<(), CliError> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(gates)?);
            return Ok(());
        }

        if gates.is_empty() {
            println!("No resources registered.");
            return Ok(());
        }
        println!("{}", gates_table(gates));
        Ok(())
    }

    pub fn render_simulation(&self, report: &SimulationReport) -> Result<(), CliError> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(report)?);
            return Ok(());
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Resource").add_attribute(Attribute::Bold),
            Cell::new("Priority").add_attribute(Attribute::Bold),
            Cell::new("Tasks").add_attribute(Attribute::Bold),
            Cell::new("Permits (low/high)").add_attribute(Attribute::Bold),
            Cell::new("Peak in flight").add_attribute(Attribute::Bold),
            Cell::new("Elapsed").add_attribute(Attribute::Bold),
        ]);
        table.add_row(vec![
            Cell::new(&report.resource),
            Cell::new(report.priority),
            Cell::new(report.tasks),
            Cell::new(format!("{}/{}", report.permits.low, report.permits.high)),
            Cell::new(report.peak_in_flight),
            Cell::new(format!("{} ms", report.elapsed_ms)),
        ]);
        println!("{table}");
        Ok(())
    }
}

fn gates_table(gates: &[GateAvailability]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Resource").add_attribute(Attribute::Bold),
        Cell::new("Capacity").add_attribute(Attribute::Bold),
        Cell::new("Low tier").add_attribute(Attribute::Bold),
        Cell::new("High tier").add_attribute(Attribute::Bold),
        Cell::new("In flight").add_attribute(Attribute::Bold),
    ]);

    for gate in gates {
        let in_flight = gate.in_flight();
        let in_flight_cell = if in_flight == 0 {
            Cell::new(in_flight).fg(Color::Green)
        } else if gate.has_any_available() {
            Cell::new(in_flight).fg(Color::Yellow)
        } else {
            Cell::new(in_flight).fg(Color::Red)
        };

        table.add_row(vec![
            Cell::new(&gate.resource),
            Cell::new(gate.capacity),
            Cell::new(format!("{}/{}", gate.low_free, gate.permits.low)),
            Cell::new(format!("{}/{}", gate.high_free, gate.permits.high)),
            in_flight_cell,
        ]);
    }
    table
}
