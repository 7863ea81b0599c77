use ahash::AHashMap;

pub type Arguments = AHashMap<String, String>;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(v) => v.fmt(f),
            Value::Text(v) => v.fmt(f),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

#[derive(Debug)]
pub enum RoutineError {
    MissingArgument(&'static str),
    EmptyArgument(&'static str),
    UnknownVariable(String),
    NotANumber(String),
    NonPositive(&'static str),
}

impl std::error::Error for RoutineError {}

impl std::fmt::Display for RoutineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutineError::MissingArgument(key) => {
                write!(f, "Missing required '{}' argument", key)
            }
            RoutineError::EmptyArgument(key) => write!(f, "'{}' cannot be empty", key),
            RoutineError::UnknownVariable(name) => {
                write!(f, "Variable '{}' not found in simulation results", name)
            }
            RoutineError::NotANumber(name) => write!(f, "Variable '{}' is not a number", name),
            RoutineError::NonPositive(name) => write!(f, "{} must be positive", name),
        }
    }
}

/// A routine bound to one model. Inputs and results share one variable table.
#[derive(Debug)]
pub struct SimulatorRoutine {
    model_path: String,
    variables: AHashMap<String, Value>,
}

impl SimulatorRoutine {
    pub fn new(model_path: impl Into<String>) -> SimulatorRoutine {
        let model_path = model_path.into();
        tracing::debug!(model = %model_path, "Routine initialized");
        SimulatorRoutine {
            model_path,
            variables: AHashMap::new(),
        }
    }

    pub fn model_path(&self) -> &str {
        &self.model_path
    }

    pub fn set_input(&mut self, args: &Arguments, value: Value) -> Result<(), RoutineError> {
        let name = variable_name(args)?;
        tracing::debug!(variable = name, %value, "Set input");
        self.variables.insert(name.to_string(), value);
        Ok(())
    }

    pub fn get_output(&self, args: &Arguments) -> Result<&Value, RoutineError> {
        let name = variable_name(args)?;
        self.variables
            .get(name)
            .ok_or_else(|| RoutineError::UnknownVariable(name.to_string()))
    }

    pub fn run_command(&mut self, args: &Arguments) -> Result<(), RoutineError> {
        let command = args.get("command").map_or("simulate", String::as_str);

        let exchanger = HeatExchanger {
            inlet_temp: self.number("inlet_temp", HeatExchanger::DEFAULT.inlet_temp)?,
            flow_rate: self.number("flow_rate", HeatExchanger::DEFAULT.flow_rate)?,
            heat_capacity: self.number("heat_capacity", HeatExchanger::DEFAULT.heat_capacity)?,
            heat_transfer: self.number("heat_transfer", HeatExchanger::DEFAULT.heat_transfer)?,
        };
        let output = exchanger.simulate()?;

        self.variables
            .insert("outlet_temp".to_string(), output.outlet_temp.into());
        self.variables
            .insert("heat_duty".to_string(), output.heat_duty.into());
        self.variables
            .insert("temperature_rise".to_string(), output.temperature_rise.into());
        self.variables
            .insert("efficiency".to_string(), output.efficiency.into());
        self.variables.insert(
            "status".to_string(),
            Value::Text(output.status.as_str().to_string()),
        );

        tracing::debug!(command, model = %self.model_path, ?output, "Command completed");
        Ok(())
    }

    fn number(&self, name: &str, default: f64) -> Result<f64, RoutineError> {
        match self.variables.get(name) {
            Some(Value::Number(v)) => Ok(*v),
            Some(Value::Text(_)) => Err(RoutineError::NotANumber(name.to_string())),
            None => Ok(default),
        }
    }
}

fn variable_name(args: &Arguments) -> Result<&str, RoutineError> {
    match args.get("variable") {
        None => Err(RoutineError::MissingArgument("variable")),
        Some(name) if name.is_empty() => Err(RoutineError::EmptyArgument("variable")),
        Some(name) => Ok(name.as_str()),
    }
}

pub fn variable(name: &str) -> Arguments {
    let mut args = Arguments::new();
    args.insert("variable".to_string(), name.to_string());
    args
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimulationStatus {
    Converged,
    WarningHighTemperature,
    ErrorCoolingDetected,
}

impl SimulationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationStatus::Converged => "converged",
            SimulationStatus::WarningHighTemperature => "warning_high_temperature",
            SimulationStatus::ErrorCoolingDetected => "error_cooling_detected",
        }
    }
}

/// Water heated by a fixed heat transfer rate, Q = m * Cp * dT.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeatExchanger {
    /// Celsius
    pub inlet_temp: f64,
    /// kg/s
    pub flow_rate: f64,
    /// J/(kg*K)
    pub heat_capacity: f64,
    /// W
    pub heat_transfer: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeatExchangerOutput {
    pub outlet_temp: f64,
    pub heat_duty: f64,
    pub temperature_rise: f64,
    pub efficiency: f64,
    pub status: SimulationStatus,
}

impl HeatExchanger {
    pub const DEFAULT: HeatExchanger = HeatExchanger {
        inlet_temp: 20.0,
        flow_rate: 1.0,
        heat_capacity: 4186.0,
        heat_transfer: 10000.0,
    };

    pub fn simulate(&self) -> Result<HeatExchangerOutput, RoutineError> {
        if self.flow_rate <= 0.0 {
            return Err(RoutineError::NonPositive("Flow rate"));
        }
        if self.heat_capacity <= 0.0 {
            return Err(RoutineError::NonPositive("Heat capacity"));
        }

        let delta_t = self.heat_transfer / (self.flow_rate * self.heat_capacity);
        let outlet_temp = self.inlet_temp + delta_t;
        let heat_duty = self.heat_transfer / 1000.0;

        // Assumes 95% of the transferred heat reaches the fluid.
        let max_rise = delta_t / 0.95;
        let efficiency = if max_rise > 0.0 {
            delta_t / max_rise * 100.0
        } else {
            0.0
        };

        let status = if outlet_temp > 100.0 {
            SimulationStatus::WarningHighTemperature
        } else if outlet_temp < self.inlet_temp {
            SimulationStatus::ErrorCoolingDetected
        } else {
            SimulationStatus::Converged
        };

        Ok(HeatExchangerOutput {
            outlet_temp: round2(outlet_temp),
            heat_duty: round2(heat_duty),
            temperature_rise: round2(delta_t),
            efficiency: round2(efficiency),
            status,
        })
    }
}

impl Default for HeatExchanger {
    fn default() -> Self {
        HeatExchanger::DEFAULT
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod test {
    use super::{
        variable, Arguments, HeatExchanger, RoutineError, SimulationStatus, SimulatorRoutine,
        Value,
    };

    #[test]
    fn default_exchanger_converges() {
        let output = HeatExchanger::default().simulate().unwrap();
        assert_eq!(2.39, output.temperature_rise);
        assert_eq!(22.39, output.outlet_temp);
        assert_eq!(10.0, output.heat_duty);
        assert_eq!(95.0, output.efficiency);
        assert_eq!(SimulationStatus::Converged, output.status);
    }

    #[test]
    fn exchanger_status() {
        let hot = HeatExchanger {
            heat_transfer: 400_000.0,
            ..Default::default()
        };
        assert_eq!(
            SimulationStatus::WarningHighTemperature,
            hot.simulate().unwrap().status
        );

        let cooling = HeatExchanger {
            heat_transfer: -10_000.0,
            ..Default::default()
        };
        let output = cooling.simulate().unwrap();
        assert_eq!(SimulationStatus::ErrorCoolingDetected, output.status);
        assert_eq!(0.0, output.efficiency);

        let stalled = HeatExchanger {
            flow_rate: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            stalled.simulate(),
            Err(RoutineError::NonPositive("Flow rate"))
        ));
    }

    #[test]
    fn routine_inputs_and_outputs() {
        let mut routine = SimulatorRoutine::new("heat_exchanger.py");
        routine
            .set_input(&variable("inlet_temp"), Value::Number(30.0))
            .unwrap();
        routine.run_command(&Arguments::new()).unwrap();

        assert_eq!(
            &Value::Number(32.39),
            routine.get_output(&variable("outlet_temp")).unwrap()
        );
        assert_eq!(
            &Value::Text("converged".to_string()),
            routine.get_output(&variable("status")).unwrap()
        );
    }

    #[test]
    fn routine_argument_errors() {
        let mut routine = SimulatorRoutine::new("heat_exchanger.py");

        assert!(matches!(
            routine.set_input(&Arguments::new(), Value::Number(1.0)),
            Err(RoutineError::MissingArgument("variable"))
        ));
        assert!(matches!(
            routine.set_input(&variable(""), Value::Number(1.0)),
            Err(RoutineError::EmptyArgument("variable"))
        ));
        assert!(matches!(
            routine.get_output(&variable("outlet_temp")),
            Err(RoutineError::UnknownVariable(_))
        ));

        routine
            .set_input(&variable("flow_rate"), Value::Text("fast".to_string()))
            .unwrap();
        assert!(matches!(
            routine.run_command(&Arguments::new()),
            Err(RoutineError::NotANumber(_))
        ));
    }
}
