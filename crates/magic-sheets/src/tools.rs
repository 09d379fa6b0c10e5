//! Tool schema offered to the model and parsing of its tool calls
//!
//! A raw call (name plus JSON argument text) is turned into a [`ToolCall`]
//! in one step, so everything downstream matches on variants instead of
//! comparing names.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::analysis::AnalysisRequest;
use crate::error::ToolError;
use crate::update::CellUpdate;
use magic_sheets_chart::ChartSpecification;

pub const SET_CELLS: &str = "set_spreadsheet_cells";
pub const CREATE_CHART: &str = "create_chart";
pub const EXECUTE_PYTHON: &str = "execute_python_code";

/// A tool invocation exactly as the completion service returned it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToolCall {
    pub name: String,
    /// JSON-encoded arguments object
    pub arguments: String,
}

impl RawToolCall {
    pub fn new<N: Into<String>, A: Into<String>>(name: N, arguments: A) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// A parsed tool invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    /// `set_spreadsheet_cells`: updates taken verbatim, targets unchecked
    SetCells(Vec<CellUpdate>),
    /// `create_chart`
    CreateChart(ChartSpecification),
    /// `execute_python_code`
    ExecutePython(AnalysisRequest),
}

#[derive(Deserialize)]
struct SetCellsArguments {
    #[serde(rename = "cellUpdates")]
    cell_updates: Vec<CellUpdate>,
}

impl ToolCall {
    /// Parse a raw call by its tool name
    pub fn parse(raw: &RawToolCall) -> Result<Self, ToolError> {
        match raw.name.as_str() {
            SET_CELLS => {
                let args: SetCellsArguments = arguments(raw)?;
                Ok(ToolCall::SetCells(args.cell_updates))
            }
            CREATE_CHART => Ok(ToolCall::CreateChart(arguments(raw)?)),
            EXECUTE_PYTHON => Ok(ToolCall::ExecutePython(arguments(raw)?)),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    /// Wire name of the tool
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::SetCells(_) => SET_CELLS,
            ToolCall::CreateChart(_) => CREATE_CHART,
            ToolCall::ExecutePython(_) => EXECUTE_PYTHON,
        }
    }
}

fn arguments<T: for<'de> Deserialize<'de>>(raw: &RawToolCall) -> Result<T, ToolError> {
    serde_json::from_str(&raw.arguments).map_err(|source| ToolError::Arguments {
        tool: raw.name.clone(),
        source,
    })
}

/// The fixed tool schema, in OpenAI `tools` format
pub fn tool_definitions() -> Value {
    json!([
        {
            "type": "function",
            "function": {
                "name": SET_CELLS,
                "description": "Set values to specified spreadsheet cells",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "cellUpdates": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "formula": { "type": "string" },
                                    "target": { "type": "string" }
                                },
                                "required": ["formula", "target"],
                                "additionalProperties": false
                            }
                        }
                    },
                    "required": ["cellUpdates"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": CREATE_CHART,
                "description": "Create a chart in the spreadsheet based on the type of chart specified by the user",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "type": {
                            "type": "string",
                            "enum": ["line", "bar", "pie", "scatter"],
                            "description": "The type of chart to create"
                        },
                        "title": {
                            "type": "string",
                            "description": "The title of the chart"
                        },
                        "data": {
                            "type": "array",
                            "items": {
                                "type": "array",
                                "items": { "type": ["string", "number"] }
                            },
                            "description": "The data for the chart, first row should contain headers"
                        }
                    },
                    "required": ["type", "title", "data"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": EXECUTE_PYTHON,
                "description": "Generate and execute Python code for data analysis using pandas and numpy. The sheet is available as the DataFrame `df`; print results as comma-separated rows.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "analysis_goal": {
                            "type": "string",
                            "description": "Clear description of what analysis needs to be performed"
                        },
                        "suggested_code": {
                            "type": "string",
                            "description": "The Python code to execute. Should use pandas and numpy appropriately."
                        },
                        "start_cell": {
                            "type": "string",
                            "description": "Cell where the first output row is written, e.g. A1"
                        }
                    },
                    "required": ["analysis_goal", "suggested_code"],
                    "additionalProperties": false
                }
            }
        }
    ])
}
